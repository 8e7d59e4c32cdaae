//! Frozen conversion configuration.
//!
//! An [`Environment`] bundles the operator table, the filter/function/test
//! call signatures, the Twig-to-Latte name remapping tables and the tag
//! parsers. It is assembled once through [`EnvironmentBuilder`] and never
//! mutated afterwards, so one instance can be shared by concurrent
//! conversions.

use std::borrow::Cow;
use std::sync::Arc;

use indexmap::IndexMap;
use latteify_lexer::{Scanner, Source, SyntaxError, TokenStream};
use log::debug;

use crate::ast::{BinaryOp, FilterKind, FunctionKind, ModuleNode, TestKind, UnaryOp, Value};
use crate::builtins;
use crate::parser::Parser;
use crate::tags::TagParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryOperator {
    pub precedence: u32,
    pub op: UnaryOp,
}

/// What a binary operator token builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Binary(BinaryOp),
    /// `is`: the right-hand side is a test.
    Test,
    /// `is not`
    NotTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOperator {
    pub precedence: u32,
    pub associativity: Associativity,
    pub kind: OperatorKind,
}

/// One declared parameter of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
}

impl Param {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
        }
    }

    pub fn optional(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            default: Some(default),
        }
    }
}

/// Declared parameters of a filter, function or test. For filters and
/// tests the filtered/tested value is implicit and not listed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deprecation {
    pub since: Option<String>,
    pub alternative: Option<String>,
}

/// A registered filter, function or test.
#[derive(Debug, Clone, PartialEq)]
pub struct Callable<K> {
    pub name: String,
    pub kind: K,
    /// `None` when the callable accepts positional arguments only.
    pub signature: Option<Signature>,
    pub deprecation: Option<Deprecation>,
    /// Tests such as `divisible by` take one argument without parentheses.
    pub one_mandatory_argument: bool,
}

impl<K> Callable<K> {
    pub fn new(name: &str, kind: K) -> Self {
        Self {
            name: name.to_string(),
            kind,
            signature: None,
            deprecation: None,
            one_mandatory_argument: false,
        }
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.signature.get_or_insert_with(Signature::default).params = params.into_iter().collect();
        self
    }

    pub fn variadic(mut self) -> Self {
        self.signature.get_or_insert_with(Signature::default).variadic = true;
        self
    }

    pub fn deprecated(mut self, deprecation: Deprecation) -> Self {
        self.deprecation = Some(deprecation);
        self
    }

    pub fn one_mandatory_argument(mut self) -> Self {
        self.one_mandatory_argument = true;
        self
    }
}

pub type FilterDef = Callable<FilterKind>;
pub type FunctionDef = Callable<FunctionKind>;
pub type TestDef = Callable<TestKind>;

/// Toggles for the optimizer pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Optimizations {
    /// Only flag `for` loops that actually use `loop` (or something that may).
    pub for_loop: bool,
    /// Drop `|raw` filters.
    pub raw_filter: bool,
}

impl Default for Optimizations {
    fn default() -> Self {
        Self {
            for_loop: true,
            raw_filter: true,
        }
    }
}

pub struct Environment {
    unary: IndexMap<String, UnaryOperator>,
    binary: IndexMap<String, BinaryOperator>,
    filters: IndexMap<String, FilterDef>,
    functions: IndexMap<String, FunctionDef>,
    tests: IndexMap<String, TestDef>,
    latte_filters: IndexMap<String, String>,
    latte_functions: IndexMap<String, String>,
    tags: IndexMap<String, Box<dyn TagParser>>,
    accept_undefined_filters: bool,
    accept_undefined_functions: bool,
    optimizations: Optimizations,
}

impl Default for Environment {
    fn default() -> Self {
        EnvironmentBuilder::new().build()
    }
}

impl Environment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    pub fn unary_operator(&self, symbol: &str) -> Option<&UnaryOperator> {
        self.unary.get(symbol)
    }

    pub fn binary_operator(&self, symbol: &str) -> Option<&BinaryOperator> {
        self.binary.get(symbol)
    }

    /// Every symbol the lexer must recognize as an operator.
    pub fn operator_symbols(&self) -> Vec<&str> {
        std::iter::once("=")
            .chain(self.unary.keys().map(String::as_str))
            .chain(self.binary.keys().map(String::as_str))
            .collect()
    }

    /// Look up a filter; in lenient mode unknown names resolve to a
    /// generic filter without a declared signature.
    pub fn filter(&self, name: &str) -> Option<Cow<'_, FilterDef>> {
        match self.filters.get(name) {
            Some(filter) => Some(Cow::Borrowed(filter)),
            None if self.accept_undefined_filters => {
                Some(Cow::Owned(Callable::new(name, FilterKind::Generic)))
            }
            None => None,
        }
    }

    pub fn function(&self, name: &str) -> Option<Cow<'_, FunctionDef>> {
        match self.functions.get(name) {
            Some(function) => Some(Cow::Borrowed(function)),
            None if self.accept_undefined_functions => {
                Some(Cow::Owned(Callable::new(name, FunctionKind::Generic)))
            }
            None => None,
        }
    }

    pub fn test(&self, name: &str) -> Option<&TestDef> {
        self.tests.get(name)
    }

    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    pub fn tag(&self, name: &str) -> Option<&dyn TagParser> {
        self.tags.get(name).map(|tag| tag.as_ref())
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Latte spelling of a Twig filter name.
    pub fn latte_filter_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.latte_filters.get(name).map_or(name, String::as_str)
    }

    /// Latte spelling of a Twig function name.
    pub fn latte_function_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.latte_functions.get(name).map_or(name, String::as_str)
    }

    pub fn optimizations(&self) -> Optimizations {
        self.optimizations
    }

    /// Tokenize `source` with this environment's operators.
    pub fn tokenize(&self, source: Arc<Source>) -> Result<TokenStream, SyntaxError> {
        let tokens = Scanner::tokenize(Arc::clone(&source), &self.operator_symbols())?;
        debug!(template = source.display_name(), tokens = tokens.len(); "Tokenized template");
        Ok(TokenStream::new(tokens, source))
    }

    /// Tokenize and parse `source` into a module.
    pub fn parse(&self, source: Arc<Source>) -> Result<ModuleNode, SyntaxError> {
        let stream = self.tokenize(source)?;
        Parser::parse(self, stream)
    }
}

/// Assembles an [`Environment`]. `new()` starts from the core Twig
/// operators, filters, functions, tests and tags.
pub struct EnvironmentBuilder {
    env: Environment,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        let env = Environment {
            unary: IndexMap::new(),
            binary: IndexMap::new(),
            filters: IndexMap::new(),
            functions: IndexMap::new(),
            tests: IndexMap::new(),
            latte_filters: IndexMap::new(),
            latte_functions: IndexMap::new(),
            tags: IndexMap::new(),
            accept_undefined_filters: false,
            accept_undefined_functions: false,
            optimizations: Optimizations::default(),
        };
        builtins::register(Self { env })
    }

    pub fn unary_operator(mut self, symbol: &str, precedence: u32, op: UnaryOp) -> Self {
        self.env
            .unary
            .insert(symbol.to_string(), UnaryOperator { precedence, op });
        self
    }

    pub fn binary_operator(
        mut self,
        symbol: &str,
        precedence: u32,
        associativity: Associativity,
        kind: OperatorKind,
    ) -> Self {
        self.env.binary.insert(
            symbol.to_string(),
            BinaryOperator {
                precedence,
                associativity,
                kind,
            },
        );
        self
    }

    pub fn filter(mut self, filter: FilterDef) -> Self {
        self.env.filters.insert(filter.name.clone(), filter);
        self
    }

    pub fn function(mut self, function: FunctionDef) -> Self {
        self.env.functions.insert(function.name.clone(), function);
        self
    }

    pub fn test(mut self, test: TestDef) -> Self {
        self.env.tests.insert(test.name.clone(), test);
        self
    }

    pub fn tag(mut self, tag: Box<dyn TagParser>) -> Self {
        self.env.tags.insert(tag.tag().to_string(), tag);
        self
    }

    /// Emit Twig filter `twig` as Latte filter `latte`.
    pub fn latte_filter(mut self, twig: &str, latte: &str) -> Self {
        self.env
            .latte_filters
            .insert(twig.to_string(), latte.to_string());
        self
    }

    /// Emit Twig function `twig` as Latte function `latte`.
    pub fn latte_function(mut self, twig: &str, latte: &str) -> Self {
        self.env
            .latte_functions
            .insert(twig.to_string(), latte.to_string());
        self
    }

    pub fn accept_undefined_filters(mut self, accept: bool) -> Self {
        self.env.accept_undefined_filters = accept;
        self
    }

    pub fn accept_undefined_functions(mut self, accept: bool) -> Self {
        self.env.accept_undefined_functions = accept;
        self
    }

    pub fn optimizations(mut self, optimizations: Optimizations) -> Self {
        self.env.optimizations = optimizations;
        self
    }

    pub fn build(self) -> Environment {
        debug!(
            filters = self.env.filters.len(),
            functions = self.env.functions.len(),
            tests = self.env.tests.len(),
            tags = self.env.tags.len();
            "Environment ready"
        );
        self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_core_operator_table() {
        let env = Environment::default();
        assert_eq!(env.binary_operator("*").map(|o| o.precedence), Some(60));
        assert_eq!(
            env.binary_operator("**").map(|o| o.associativity),
            Some(Associativity::Right)
        );
        assert_eq!(
            env.binary_operator("is not").map(|o| o.kind),
            Some(OperatorKind::NotTest)
        );
        assert_eq!(env.unary_operator("not").map(|o| o.precedence), Some(50));
        assert!(env.operator_symbols().contains(&"="));
    }

    #[test]
    fn test_strict_by_default() {
        let env = Environment::default();
        assert!(env.filter("upper").is_some());
        assert!(env.filter("no_such_filter").is_none());
        assert!(env.function("no_such_function").is_none());
    }

    #[test]
    fn test_lenient_callables() {
        let env = Environment::builder()
            .accept_undefined_filters(true)
            .accept_undefined_functions(true)
            .build();
        let filter = env.filter("truncate_words").unwrap();
        assert_eq!(filter.kind, FilterKind::Generic);
        assert_eq!(filter.signature, None);
        assert!(env.function("asset").is_some());
    }

    #[test]
    fn test_latte_name_remapping() {
        let env = Environment::builder().latte_filter("md", "markdown").build();
        assert_eq!(env.latte_filter_name("raw"), "noescape");
        assert_eq!(env.latte_filter_name("md"), "markdown");
        assert_eq!(env.latte_filter_name("upper"), "upper");
        assert_eq!(env.latte_function_name("iterable"), "is_iterable");
    }

    #[test]
    fn test_range_signature_uses_low_and_high() {
        let env = Environment::default();
        let range = env.function("range").unwrap();
        let names: Vec<&str> = range
            .signature
            .as_ref()
            .unwrap()
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["low", "high", "step"]);
    }

    #[test]
    fn test_core_tags_registered() {
        let env = Environment::default();
        for tag in ["block", "for", "if", "set", "include", "embed", "cache", "with"] {
            assert!(env.tag(tag).is_some(), "missing tag {tag}");
        }
    }
}
