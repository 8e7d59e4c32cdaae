//! AST rewriting passes run between parsing and code generation.
//!
//! A [`NodeVisitor`] sees every statement and expression of a module twice:
//! on the way down (`enter_*`, in place) and on the way up (`leave_*`, by
//! value, returning the replacement). Statements may be dropped by
//! returning `None` from [`NodeVisitor::leave_node`]. Embedded modules are
//! walked as modules of their own.

pub mod latte;
pub mod macro_auto_import;
pub mod optimizer;

use std::mem;

use latteify_parser::ast::{
    Argument, ExprKind, IncludeArgs, ModuleNode, Node, NodeKind, SetValue,
};
use latteify_parser::{Environment, Expr};

pub use latte::LatteVisitor;
pub use macro_auto_import::MacroAutoImportVisitor;
pub use optimizer::OptimizerVisitor;

pub trait NodeVisitor {
    /// Name used in log output.
    fn name(&self) -> &'static str;

    /// Visitors run in ascending priority; equal priorities keep their
    /// registration order.
    fn priority(&self) -> i32;

    fn enter_module(&mut self, _module: &mut ModuleNode) {}

    fn leave_module(&mut self, _module: &mut ModuleNode) {}

    fn enter_node(&mut self, _node: &mut Node) {}

    fn leave_node(&mut self, node: Node) -> Option<Node> {
        Some(node)
    }

    fn enter_expr(&mut self, _expr: &mut Expr) {}

    fn leave_expr(&mut self, expr: Expr) -> Expr {
        expr
    }
}

/// The standard pipeline for `env`, sorted by priority.
pub fn default_visitors(env: &Environment) -> Vec<Box<dyn NodeVisitor>> {
    let mut visitors: Vec<Box<dyn NodeVisitor>> = vec![
        Box::new(MacroAutoImportVisitor::new()),
        Box::new(OptimizerVisitor::new(env.optimizations())),
        Box::new(LatteVisitor::new()),
    ];
    visitors.sort_by_key(|v| v.priority());
    visitors
}

/// Walk the whole of `module` with `visitor`.
pub fn traverse(visitor: &mut dyn NodeVisitor, module: &mut ModuleNode) {
    visitor.enter_module(module);

    walk_nodes(visitor, &mut module.body);
    for block in module.blocks.values_mut() {
        walk_nodes(visitor, &mut block.body);
    }
    for mac in module.macros.values_mut() {
        for (_, default) in &mut mac.arguments {
            walk_expr(visitor, default);
        }
        walk_nodes(visitor, &mut mac.body);
    }
    if let Some(parent) = &mut module.parent {
        walk_expr(visitor, parent);
    }

    visitor.leave_module(module);
}

fn walk_nodes(visitor: &mut dyn NodeVisitor, nodes: &mut Vec<Node>) {
    *nodes = mem::take(nodes)
        .into_iter()
        .filter_map(|node| walk_node(visitor, node))
        .collect();
}

fn walk_node(visitor: &mut dyn NodeVisitor, mut node: Node) -> Option<Node> {
    visitor.enter_node(&mut node);

    match &mut node.kind {
        NodeKind::Text(_)
        | NodeKind::Comment(_)
        | NodeKind::Verbatim(_)
        | NodeKind::BlockReference(_)
        | NodeKind::Flush => {}
        NodeKind::Print(expr)
        | NodeKind::Output(expr)
        | NodeKind::Extends(expr)
        | NodeKind::Do(expr)
        | NodeKind::Deprecated(expr) => walk_expr(visitor, expr),
        NodeKind::For {
            sequence,
            body,
            else_body,
            ..
        } => {
            walk_expr(visitor, sequence);
            walk_nodes(visitor, body);
            if let Some(else_body) = else_body {
                walk_nodes(visitor, else_body);
            }
        }
        NodeKind::If {
            branches,
            else_body,
        } => {
            for (test, body) in branches {
                walk_expr(visitor, test);
                walk_nodes(visitor, body);
            }
            if let Some(else_body) = else_body {
                walk_nodes(visitor, else_body);
            }
        }
        NodeKind::Set { value, .. } => match value {
            SetValue::Exprs(values) => {
                for value in values {
                    walk_expr(visitor, value);
                }
            }
            SetValue::Capture(body) => walk_nodes(visitor, body),
        },
        NodeKind::Include(args) => walk_include_args(visitor, args),
        NodeKind::Embed { args, module } => {
            walk_include_args(visitor, args);
            traverse(visitor, module);
        }
        NodeKind::Import { template, .. } | NodeKind::Use { template, .. } => {
            walk_expr(visitor, template);
        }
        NodeKind::With {
            variables, body, ..
        } => {
            if let Some(variables) = variables {
                walk_expr(visitor, variables);
            }
            walk_nodes(visitor, body);
        }
        NodeKind::Apply { filter, body } => {
            walk_expr(visitor, filter);
            walk_nodes(visitor, body);
        }
        NodeKind::AutoEscape { body, .. } | NodeKind::Sandbox(body) => walk_nodes(visitor, body),
        NodeKind::Cache {
            key,
            ttl,
            tags,
            body,
        } => {
            walk_expr(visitor, key);
            if let Some(ttl) = ttl {
                walk_expr(visitor, ttl);
            }
            if let Some(tags) = tags {
                walk_expr(visitor, tags);
            }
            walk_nodes(visitor, body);
        }
    }

    visitor.leave_node(node)
}

fn walk_include_args(visitor: &mut dyn NodeVisitor, args: &mut IncludeArgs) {
    walk_expr(visitor, &mut args.template);
    if let Some(variables) = &mut args.variables {
        walk_expr(visitor, variables);
    }
}

fn walk_expr(visitor: &mut dyn NodeVisitor, expr: &mut Expr) {
    visitor.enter_expr(expr);

    match &mut expr.kind {
        ExprKind::Constant(_)
        | ExprKind::Name { .. }
        | ExprKind::AssignName(_)
        | ExprKind::Parent { .. }
        | ExprKind::ApplyTarget => {}
        ExprKind::Array(elements) => {
            for (key, value) in elements {
                walk_expr(visitor, key);
                walk_expr(visitor, value);
            }
        }
        ExprKind::Unary { operand, .. } => walk_expr(visitor, operand),
        ExprKind::Binary { left, right, .. } => {
            walk_expr(visitor, left);
            walk_expr(visitor, right);
        }
        ExprKind::Conditional {
            test,
            then,
            otherwise,
        } => {
            walk_expr(visitor, test);
            walk_expr(visitor, then);
            walk_expr(visitor, otherwise);
        }
        ExprKind::GetAttr {
            node,
            attribute,
            arguments,
            ..
        } => {
            walk_expr(visitor, node);
            walk_expr(visitor, attribute);
            for argument in arguments {
                walk_expr(visitor, argument);
            }
        }
        ExprKind::MethodCall {
            node, arguments, ..
        }
        | ExprKind::Filter {
            node, arguments, ..
        }
        | ExprKind::Test {
            node, arguments, ..
        } => {
            walk_expr(visitor, node);
            walk_arguments(visitor, arguments);
        }
        ExprKind::Function { arguments, .. } => walk_arguments(visitor, arguments),
        ExprKind::Arrow { body, .. } => walk_expr(visitor, body),
        ExprKind::BlockReference { name, template, .. } => {
            walk_expr(visitor, name);
            if let Some(template) = template {
                walk_expr(visitor, template);
            }
        }
    }

    let taken = mem::take(expr);
    *expr = visitor.leave_expr(taken);
}

fn walk_arguments(visitor: &mut dyn NodeVisitor, arguments: &mut [Argument]) {
    for argument in arguments {
        walk_expr(visitor, &mut argument.value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use latteify_lexer::Source;
    use latteify_parser::Value;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> ModuleNode {
        Environment::default()
            .parse(Arc::new(Source::new(code, "test.twig")))
            .unwrap()
    }

    /// Records the order of visits and rewrites integer constants.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl NodeVisitor for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn enter_module(&mut self, _module: &mut ModuleNode) {
            self.events.push("module".into());
        }

        fn leave_node(&mut self, node: Node) -> Option<Node> {
            match node.kind {
                NodeKind::Comment(_) => None,
                _ => Some(node),
            }
        }

        fn leave_expr(&mut self, expr: Expr) -> Expr {
            match expr.kind {
                ExprKind::Constant(Value::Int(n)) => {
                    self.events.push(format!("int {n}"));
                    Expr::constant(Value::Int(n * 10), expr.line)
                }
                ExprKind::Name { ref name, .. } => {
                    self.events.push(format!("name {name}"));
                    expr
                }
                _ => expr,
            }
        }
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    #[test]
    fn test_leave_expr_replaces_in_place() {
        let mut module = parse("{{ 1 + 2 }}");
        let mut recorder = Recorder::default();
        traverse(&mut recorder, &mut module);

        assert_eq!(recorder.events, vec!["module", "int 1", "int 2"]);
        let NodeKind::Print(expr) = &module.body[0].kind else {
            panic!("expected print");
        };
        let ExprKind::Binary { left, right, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(left.as_constant(), Some(&Value::Int(10)));
        assert_eq!(right.as_constant(), Some(&Value::Int(20)));
    }

    #[test]
    fn test_leave_node_can_drop_statements() {
        let mut module = parse("a{# note #}b");
        traverse(&mut Recorder::default(), &mut module);
        assert_eq!(module.body.len(), 2);
    }

    #[test]
    fn test_blocks_macros_and_embeds_are_visited() {
        let mut module = parse(concat!(
            "{% block a %}{{ x }}{% endblock %}",
            "{% macro m(y = 1) %}{{ z }}{% endmacro %}",
            "{% embed 'e.twig' %}{% block b %}{{ w }}{% endblock %}{% endembed %}",
        ));
        let mut recorder = Recorder::default();
        traverse(&mut recorder, &mut module);

        assert_eq!(
            recorder.events,
            vec!["module", "module", "name w", "name x", "int 1", "name z"]
        );
    }

    #[test]
    fn test_default_visitors_sorted_by_priority() {
        let visitors = default_visitors(&Environment::default());
        let names: Vec<_> = visitors.iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["macro_auto_import", "optimizer", "latte"]);
    }
}
