//! Rewrites Twig idioms that have no direct Latte counterpart.

use latteify_parser::ast::{Argument, ExprKind, FunctionKind, Node, NodeKind, Value};
use latteify_parser::Expr;

use super::NodeVisitor;

/// Filters rendered as PHP function calls, with the Latte function name.
const FILTER_FUNCTIONS: &[(&str, &str)] = &[
    ("reduce", "array_reduce"),
    ("merge", "array_merge"),
    ("map", "array_map"),
    ("filter", "array_filter"),
    ("column", "array_column"),
    ("keys", "array_keys"),
    ("json_encode", "json_encode"),
];

#[derive(Default)]
pub struct LatteVisitor;

impl LatteVisitor {
    pub fn new() -> Self {
        Self
    }
}

impl NodeVisitor for LatteVisitor {
    fn name(&self) -> &'static str {
        "latte"
    }

    fn priority(&self) -> i32 {
        255
    }

    fn leave_expr(&mut self, expr: Expr) -> Expr {
        match expr.kind {
            // Latte escapes output itself.
            ExprKind::Filter { node, name, .. } if name == "escape" || name == "e" => *node,
            ExprKind::Filter {
                node,
                name,
                arguments,
            } => match FILTER_FUNCTIONS.iter().find(|(filter, _)| *filter == name) {
                Some((_, function)) => {
                    let mut arguments: Vec<Argument> = std::iter::once(Argument::positional(*node))
                        .chain(arguments)
                        .collect();
                    if name == "map" {
                        arguments.reverse();
                    }
                    Expr::new(
                        ExprKind::Function {
                            name: function.to_string(),
                            kind: FunctionKind::Generic,
                            arguments,
                            is_defined_test: false,
                        },
                        expr.line,
                    )
                }
                None => Expr {
                    kind: ExprKind::Filter {
                        node,
                        name,
                        arguments,
                    },
                    ..expr
                },
            },
            ExprKind::Function {
                name,
                kind,
                arguments,
                is_defined_test,
            } if name == "html_classes" => Expr {
                kind: ExprKind::Function {
                    name,
                    kind,
                    arguments: expand_class_hashes(arguments),
                    is_defined_test,
                },
                ..expr
            },
            kind => Expr { kind, ..expr },
        }
    }

    fn leave_node(&mut self, mut node: Node) -> Option<Node> {
        if let NodeKind::Print(expr) = &mut node.kind {
            expr.topmost = true;
            let promote = matches!(
                expr.kind,
                ExprKind::Function {
                    kind: FunctionKind::Include,
                    ..
                } | ExprKind::MethodCall { .. }
            );
            if promote {
                let expr = std::mem::take(expr);
                return Some(Node::new(NodeKind::Output(expr), node.line));
            }
        }
        Some(node)
    }
}

/// `html_classes({a: x, b: y})` becomes `html_classes(x ? 'a', y ? 'b')`.
fn expand_class_hashes(arguments: Vec<Argument>) -> Vec<Argument> {
    let mut expanded = Vec::with_capacity(arguments.len());
    for argument in arguments {
        match argument.value.kind {
            ExprKind::Array(pairs) => {
                let line = argument.value.line;
                expanded.extend(pairs.into_iter().map(|(key, value)| {
                    Argument::positional(Expr::new(
                        ExprKind::Conditional {
                            test: Box::new(value),
                            then: Box::new(key),
                            otherwise: Box::new(Expr::constant(Value::Null, line)),
                        },
                        line,
                    ))
                }));
            }
            kind => expanded.push(Argument {
                value: Expr {
                    kind,
                    ..argument.value
                },
                ..argument
            }),
        }
    }
    expanded
}
