//! Turns `_self.name(...)` into macro calls and records a self-import on
//! modules that make them.

use latteify_parser::ast::{Argument, ExprKind, ModuleNode, Node, NodeKind};
use latteify_parser::Expr;

use super::NodeVisitor;

const SELF: &str = "_self";

#[derive(Default)]
pub struct MacroAutoImportVisitor {
    /// One entry per module being walked: whether it calls its own macros.
    modules: Vec<bool>,
}

impl MacroAutoImportVisitor {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_self_import(node: &Node) -> bool {
    matches!(&node.kind, NodeKind::Import { alias, .. } if alias == SELF)
}

impl NodeVisitor for MacroAutoImportVisitor {
    fn name(&self) -> &'static str {
        "macro_auto_import"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn enter_module(&mut self, _module: &mut ModuleNode) {
        self.modules.push(false);
    }

    fn leave_module(&mut self, module: &mut ModuleNode) {
        let has_macro_calls = self.modules.pop().unwrap_or(false);
        if has_macro_calls && !module.hooks.constructor_end.iter().any(is_self_import) {
            module.hooks.constructor_end.push(Node::new(
                NodeKind::Import {
                    template: Expr::name(SELF, 0),
                    alias: SELF.to_string(),
                },
                0,
            ));
        }
    }

    fn leave_expr(&mut self, expr: Expr) -> Expr {
        let Some(has_macro_calls) = self.modules.last_mut() else {
            return expr;
        };

        match expr.kind {
            ExprKind::GetAttr {
                node,
                attribute,
                arguments,
                is_defined_test,
                ..
            } if matches!(&node.kind, ExprKind::Name { name, .. } if name == SELF)
                && attribute.as_constant().and_then(|v| v.as_str()).is_some() =>
            {
                *has_macro_calls = true;
                let method = attribute
                    .as_constant()
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Expr {
                    kind: ExprKind::MethodCall {
                        node,
                        method,
                        arguments: arguments.into_iter().map(Argument::positional).collect(),
                        is_defined_test,
                    },
                    ..expr
                }
            }
            kind => Expr { kind, ..expr },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::visitor::traverse;
    use latteify_lexer::Source;
    use latteify_parser::Environment;
    use pretty_assertions::assert_eq;

    fn visit(code: &str) -> ModuleNode {
        let mut module = Environment::default()
            .parse(Arc::new(Source::new(code, "test.twig")))
            .unwrap();
        traverse(&mut MacroAutoImportVisitor::new(), &mut module);
        module
    }

    // =========================================================================
    // Self macro calls
    // =========================================================================

    #[test]
    fn test_self_call_becomes_macro_call() {
        let module = visit("{% macro hi(name) %}Hi {{ name }}{% endmacro %}{{ _self.hi('Bob') }}");

        let NodeKind::Print(expr) = &module.body[0].kind else {
            panic!("expected print");
        };
        let ExprKind::MethodCall {
            node,
            method,
            arguments,
            ..
        } = &expr.kind
        else {
            panic!("expected macro call, got {:?}", expr.kind);
        };
        assert_eq!(node.as_ref(), &Expr::name("_self", 1));
        assert_eq!(method, "hi");
        assert_eq!(arguments, &vec![Argument::positional(Expr::string("Bob", 1))]);
        assert_eq!(module.hooks.constructor_end.len(), 1);
        assert!(is_self_import(&module.hooks.constructor_end[0]));
    }

    #[test]
    fn test_no_self_call_no_import() {
        let module = visit("{{ user.name }}");
        assert!(module.hooks.constructor_end.is_empty());
    }

    #[test]
    fn test_import_added_once() {
        let mut module = visit("{{ _self.a() }}{{ _self.b() }}");
        traverse(&mut MacroAutoImportVisitor::new(), &mut module);
        assert_eq!(module.hooks.constructor_end.len(), 1);
    }
}
