//! The built-in Twig operators, filters, functions, tests and tags, plus
//! the Latte names of the few callables spelled differently in Latte.

use crate::ast::{BinaryOp, FilterKind, FunctionKind, TestKind, UnaryOp, Value};
use crate::environment::{
    Associativity::{Left, Right},
    Callable, Deprecation, EnvironmentBuilder, OperatorKind, Param,
};
use crate::tags;

fn required(name: &str) -> Param {
    Param::required(name)
}

fn optional(name: &str, default: Value) -> Param {
    Param::optional(name, default)
}

fn null(name: &str) -> Param {
    Param::optional(name, Value::Null)
}

pub(crate) fn register(builder: EnvironmentBuilder) -> EnvironmentBuilder {
    let builder = register_operators(builder);
    let builder = register_filters(builder);
    let builder = register_functions(builder);
    let builder = register_tests(builder);
    tags::register(builder)
        .latte_function("iterable", "is_iterable")
        .latte_function("source", "file_get_contents")
        .latte_filter("striptags", "stripHtml")
        .latte_filter("raw", "noescape")
        .latte_filter("title", "capitalize")
        .latte_filter("url_encode", "query")
}

fn register_operators(builder: EnvironmentBuilder) -> EnvironmentBuilder {
    use BinaryOp::*;
    use OperatorKind::Binary;

    let builder = builder
        .unary_operator("not", 50, UnaryOp::Not)
        .unary_operator("-", 500, UnaryOp::Neg)
        .unary_operator("+", 500, UnaryOp::Pos);

    let binary = [
        ("or", 10, Left, Binary(Or)),
        ("and", 15, Left, Binary(And)),
        ("b-or", 16, Left, Binary(BitOr)),
        ("b-xor", 17, Left, Binary(BitXor)),
        ("b-and", 18, Left, Binary(BitAnd)),
        ("==", 20, Left, Binary(Equal)),
        ("!=", 20, Left, Binary(NotEqual)),
        ("<=>", 20, Left, Binary(Spaceship)),
        ("<", 20, Left, Binary(Less)),
        (">", 20, Left, Binary(Greater)),
        (">=", 20, Left, Binary(GreaterEqual)),
        ("<=", 20, Left, Binary(LessEqual)),
        ("not in", 20, Left, Binary(NotIn)),
        ("in", 20, Left, Binary(In)),
        ("matches", 20, Left, Binary(Matches)),
        ("starts with", 20, Left, Binary(StartsWith)),
        ("ends with", 20, Left, Binary(EndsWith)),
        ("..", 25, Left, Binary(Range)),
        ("+", 30, Left, Binary(Add)),
        ("-", 30, Left, Binary(Sub)),
        ("~", 40, Left, Binary(Concat)),
        ("*", 60, Left, Binary(Mul)),
        ("/", 60, Left, Binary(Div)),
        ("//", 60, Left, Binary(FloorDiv)),
        ("%", 60, Left, Binary(Mod)),
        ("is", 100, Left, OperatorKind::Test),
        ("is not", 100, Left, OperatorKind::NotTest),
        ("**", 200, Right, Binary(Power)),
        ("??", 300, Right, Binary(NullCoalesce)),
    ];
    binary
        .into_iter()
        .fold(builder, |builder, (symbol, precedence, assoc, kind)| {
            builder.binary_operator(symbol, precedence, assoc, kind)
        })
}

fn register_filters(builder: EnvironmentBuilder) -> EnvironmentBuilder {
    let filter = |name: &str| Callable::new(name, FilterKind::Generic);
    let escape_params = || {
        [
            optional("strategy", Value::String("html".into())),
            null("charset"),
            optional("autoescape", Value::Bool(false)),
        ]
    };

    [
        filter("abs"),
        filter("batch").params([required("size"), null("fill"), optional("preserve_keys", Value::Bool(true))]),
        filter("capitalize"),
        filter("column").params([required("name"), null("index")]),
        filter("convert_encoding").params([required("to"), required("from")]),
        filter("data_uri").params([null("mime"), optional("parameters", Value::Array(Vec::new()))]),
        filter("date").params([null("format"), null("timezone")]),
        filter("date_modify").params([required("modifier")]),
        Callable::new("default", FilterKind::Default).params([optional("default", Value::String(String::new()))]),
        filter("e").params(escape_params()),
        filter("escape").params(escape_params()),
        filter("filter").params([required("arrow")]),
        filter("first"),
        filter("format").variadic(),
        filter("join").params([optional("glue", Value::String(String::new())), null("and")]),
        filter("json_encode").params([null("options")]),
        filter("keys"),
        filter("last"),
        filter("length"),
        filter("lower"),
        filter("map").params([required("arrow")]),
        filter("merge").params([required("arr2")]),
        filter("nl2br"),
        filter("number_format").params([null("decimal"), null("decimal_point"), null("thousand_sep")]),
        filter("raw"),
        filter("reduce").params([required("arrow"), null("initial")]),
        filter("replace").params([required("from")]),
        filter("reverse").params([optional("preserve_keys", Value::Bool(false))]),
        filter("round").params([optional("precision", Value::Int(0)), optional("method", Value::String("common".into()))]),
        filter("slice").params([required("start"), null("length"), optional("preserve_keys", Value::Bool(false))]),
        filter("sort").params([null("arrow")]),
        filter("spaceless").deprecated(Deprecation {
            since: Some("3.12".into()),
            alternative: None,
        }),
        filter("split").params([required("delimiter"), null("limit")]),
        filter("striptags").params([null("allowable_tags")]),
        filter("title"),
        filter("trim").params([null("character_mask"), optional("side", Value::String("both".into()))]),
        filter("upper"),
        filter("url_encode"),
    ]
    .into_iter()
    .fold(builder, EnvironmentBuilder::filter)
}

fn register_functions(builder: EnvironmentBuilder) -> EnvironmentBuilder {
    let function = |name: &str| Callable::new(name, FunctionKind::Generic);

    [
        function("constant").params([required("constant"), null("object")]),
        function("cycle").params([required("values"), required("position")]),
        function("date").params([null("date"), null("timezone")]),
        function("dump").variadic(),
        function("html_classes"),
        Callable::new("include", FunctionKind::Include).params([
            required("template"),
            optional("variables", Value::Array(Vec::new())),
            optional("with_context", Value::Bool(true)),
            optional("ignore_missing", Value::Bool(false)),
            optional("sandboxed", Value::Bool(false)),
        ]),
        function("max"),
        function("min"),
        function("random").params([null("values"), null("max")]),
        // Fixed parameter names regardless of the PHP version Twig runs on.
        function("range").params([required("low"), required("high"), optional("step", Value::Int(1))]),
        function("source").params([required("name"), optional("ignore_missing", Value::Bool(false))]),
    ]
    .into_iter()
    .fold(builder, EnvironmentBuilder::function)
}

fn register_tests(builder: EnvironmentBuilder) -> EnvironmentBuilder {
    [
        Callable::new("constant", TestKind::Constant).params([required("constant"), null("object")]),
        Callable::new("defined", TestKind::Defined),
        Callable::new("divisible by", TestKind::DivisibleBy)
            .params([required("num")])
            .one_mandatory_argument(),
        Callable::new("empty", TestKind::Generic),
        Callable::new("even", TestKind::Even),
        Callable::new("iterable", TestKind::Generic),
        Callable::new("none", TestKind::Null),
        Callable::new("null", TestKind::Null),
        Callable::new("odd", TestKind::Odd),
        Callable::new("same as", TestKind::SameAs)
            .params([required("value")])
            .one_mandatory_argument(),
    ]
    .into_iter()
    .fold(builder, EnvironmentBuilder::test)
}
