//! Latteify Parser
//!
//! Parses a Twig token stream into an Abstract Syntax Tree.
//! Includes the statement parser with one tag parser per `{% %}` keyword,
//! the precedence-climbing expression parser, and the frozen
//! [`Environment`] holding operators, call signatures and Latte name
//! remapping.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use latteify_lexer::Source;
//! use latteify_parser::{ast::NodeKind, Environment};
//!
//! let env = Environment::default();
//! let module = env.parse(Arc::new(Source::new("Hi {{ name }}", "hi.twig"))).unwrap();
//! assert!(matches!(module.body[1].kind, NodeKind::Print(_)));
//! ```

pub mod arguments;
pub mod ast;
mod builtins;
pub mod environment;
pub mod expr_parser;
pub mod parser;
pub mod tags;

pub use arguments::{bind_arguments, CallKind};
pub use ast::{Expr, ExprKind, ModuleNode, Node, NodeKind, Value};
pub use environment::{Environment, EnvironmentBuilder, Optimizations};
pub use parser::Parser;
pub use tags::TagParser;
