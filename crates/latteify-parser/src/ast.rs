//! Abstract Syntax Tree for Twig templates.
//!
//! Contains statement-level nodes (text, prints, tags) and expression-level
//! nodes (operators, filters, calls, literals). Every parent owns its
//! children; cloning a subtree is a plain value copy.

use std::sync::Arc;

use indexmap::IndexMap;
use latteify_lexer::Source;

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Root of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNode {
    pub body: Vec<Node>,
    pub blocks: IndexMap<String, BlockNode>,
    pub macros: IndexMap<String, MacroNode>,
    /// Target of `{% extends %}` (or the embedded parent of an `embed`).
    pub parent: Option<Expr>,
    pub hooks: ModuleHooks,
    pub source: Arc<Source>,
}

impl ModuleNode {
    pub fn new(source: Arc<Source>) -> Self {
        Self {
            body: Vec::new(),
            blocks: IndexMap::new(),
            macros: IndexMap::new(),
            parent: None,
            hooks: ModuleHooks::default(),
            source,
        }
    }
}

/// Statement slots filled by node visitors rather than by template text.
/// They are never emitted as Latte.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleHooks {
    pub constructor_start: Vec<Node>,
    pub constructor_end: Vec<Node>,
    pub display_start: Vec<Node>,
    pub display_end: Vec<Node>,
    pub class_end: Vec<Node>,
}

/// A `{% block %}` definition, owned by the module and referenced from the body.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub name: String,
    pub body: Vec<Node>,
    pub line: usize,
}

/// A `{% macro %}` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroNode {
    pub name: String,
    /// Argument names with their default values (`null` when none given).
    pub arguments: Vec<(String, Expr)>,
    pub body: Vec<Node>,
    pub line: usize,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub line: usize,
}

impl Node {
    pub fn new(kind: NodeKind, line: usize) -> Self {
        Self { kind, line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Literal template text.
    Text(String),

    /// `{# ... #}`
    Comment(String),

    /// `{% verbatim %}...{% endverbatim %}`
    Verbatim(String),

    /// `{{ expr }}`
    Print(Expr),

    /// An expression that renders a statement of its own (an `include()`
    /// call, a macro call, a block reference) lifted out of its print.
    Output(Expr),

    /// Position of a named block in the body; the definition lives in
    /// [`ModuleNode::blocks`].
    BlockReference(String),

    /// `{% for key, value in sequence %}...{% else %}...{% endfor %}`
    For {
        key: Option<String>,
        value: String,
        sequence: Expr,
        body: Vec<Node>,
        else_body: Option<Vec<Node>>,
        /// Whether the body needs the `loop` iteration context.
        with_loop: bool,
    },

    /// `{% if %}...{% elseif %}...{% else %}...{% endif %}`
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },

    /// `{% set a, b = x, y %}` or `{% set a %}...{% endset %}`
    Set { names: Vec<String>, value: SetValue },

    /// `{% include expr with vars only ignore missing %}`
    Include(IncludeArgs),

    /// `{% embed %}` with its own block overrides.
    Embed {
        args: IncludeArgs,
        module: Box<ModuleNode>,
    },

    /// `{% import expr as alias %}` and the import half of `{% from %}`.
    Import { template: Expr, alias: String },

    /// `{% use "file" with a as b %}`
    Use {
        template: Expr,
        targets: Vec<(String, String)>,
    },

    /// `{% extends expr %}`
    Extends(Expr),

    /// `{% with vars only %}...{% endwith %}`
    With {
        variables: Option<Expr>,
        only: bool,
        body: Vec<Node>,
    },

    /// `{% apply filters %}...{% endapply %}`; the filter chain bottoms out
    /// in [`ExprKind::ApplyTarget`].
    Apply { filter: Expr, body: Vec<Node> },

    /// `{% autoescape strategy %}`; `None` for `false`.
    AutoEscape {
        strategy: Option<String>,
        body: Vec<Node>,
    },

    /// `{% sandbox %}` holding only includes.
    Sandbox(Vec<Node>),

    /// `{% cache key ttl(x) tags(y) %}`
    Cache {
        key: Expr,
        ttl: Option<Expr>,
        tags: Option<Expr>,
        body: Vec<Node>,
    },

    /// `{% do expr %}`
    Do(Expr),

    /// `{% flush %}`
    Flush,

    /// `{% deprecated "message" %}`
    Deprecated(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Exprs(Vec<Expr>),
    Capture(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeArgs {
    pub template: Expr,
    pub variables: Option<Expr>,
    pub only: bool,
    pub ignore_missing: bool,
    pub sandboxed: bool,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// A scalar or array constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<(Value, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    /// Outermost expression of a print; renders without wrapping parentheses.
    pub topmost: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Self {
            kind,
            line,
            topmost: false,
        }
    }

    pub fn constant(value: Value, line: usize) -> Self {
        Self::new(ExprKind::Constant(value), line)
    }

    pub fn string(value: impl Into<String>, line: usize) -> Self {
        Self::constant(Value::String(value.into()), line)
    }

    pub fn name(name: impl Into<String>, line: usize) -> Self {
        Self::new(
            ExprKind::Name {
                name: name.into(),
                is_defined_test: false,
            },
            line,
        )
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, line: usize) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        )
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(Value::Null))
    }
}

impl Default for Expr {
    fn default() -> Self {
        Expr::constant(Value::Null, 0)
    }
}

/// One call-site argument; `name` is set for `name = value` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

impl Argument {
    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal: `42`, `'text'`, `true`, `null`
    Constant(Value),

    /// Variable: `user`
    Name { name: String, is_defined_test: bool },

    /// Assignment target in `set`, `for`, `import ... as`
    AssignName(String),

    /// Array or hash literal as ordered key/value pairs: `[1, 2]`, `{a: 1}`
    Array(Vec<(Expr, Expr)>),

    /// `not a`, `-a`
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// `a + b`, `a ?? b`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `a ? b : c`
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// `user.name`, `items[0]`, `user.greet(x)`
    GetAttr {
        node: Box<Expr>,
        attribute: Box<Expr>,
        arguments: Vec<Expr>,
        call_type: CallType,
        is_defined_test: bool,
    },

    /// Call of a macro through an imported alias: `forms.input('name')`
    MethodCall {
        node: Box<Expr>,
        method: String,
        arguments: Vec<Argument>,
        is_defined_test: bool,
    },

    /// `value|name(args)`
    Filter {
        node: Box<Expr>,
        name: String,
        arguments: Vec<Argument>,
    },

    /// `name(args)`
    Function {
        name: String,
        kind: FunctionKind,
        arguments: Vec<Argument>,
        is_defined_test: bool,
    },

    /// `value is name(args)`
    Test {
        node: Box<Expr>,
        name: String,
        kind: TestKind,
        arguments: Vec<Argument>,
    },

    /// `(a, b) => a + b`
    Arrow { names: Vec<String>, body: Box<Expr> },

    /// `block('name')`, `block('name', 'file.twig')`
    BlockReference {
        name: Box<Expr>,
        template: Option<Box<Expr>>,
        is_defined_test: bool,
        output: bool,
    },

    /// `parent()` inside block `block`
    Parent { block: String, output: bool },

    /// Operand slot of an `apply` filter chain.
    ApplyTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Any,
    Array,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    Spaceship,
    Less,
    Greater,
    GreaterEqual,
    LessEqual,
    NotIn,
    In,
    Matches,
    StartsWith,
    EndsWith,
    Range,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Power,
    NullCoalesce,
}

/// Compile behavior selected for a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Generic,
    Include,
}

/// Compile behavior selected for a registered filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Generic,
    /// Rewritten to `??` when applied to a variable or attribute.
    Default,
}

/// Compile behavior selected for a registered test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Generic,
    Defined,
    Null,
    Even,
    Odd,
    DivisibleBy,
    SameAs,
    Constant,
}
