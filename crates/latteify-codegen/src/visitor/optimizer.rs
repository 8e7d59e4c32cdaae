//! Optimizer pass.
//!
//! - `for` loops keep the `loop` iteration context only when their body
//!   may use it.
//! - `|raw` filters are unwrapped.
//! - Printing a block reference or `parent()` becomes a plain output node.

use latteify_parser::ast::{ExprKind, Node, NodeKind, Value};
use latteify_parser::{Expr, Optimizations};

use super::NodeVisitor;

struct LoopScope {
    with_loop: bool,
    targets: Vec<String>,
}

pub struct OptimizerVisitor {
    optimizations: Optimizations,
    loops: Vec<LoopScope>,
}

impl OptimizerVisitor {
    pub fn new(optimizations: Optimizations) -> Self {
        Self {
            optimizations,
            loops: Vec::new(),
        }
    }

    fn add_loop_to_current(&mut self) {
        if let Some(scope) = self.loops.last_mut() {
            scope.with_loop = true;
        }
    }

    fn add_loop_to_all(&mut self) {
        for scope in &mut self.loops {
            scope.with_loop = true;
        }
    }

    fn is_loop_target(&self, name: &str) -> bool {
        self.loops
            .iter()
            .any(|scope| scope.targets.iter().any(|t| t == name))
    }

    fn is_loop_variable(&self, expr: &Expr) -> bool {
        matches!(&expr.kind, ExprKind::Name { name, .. } if name == "loop" && !self.is_loop_target(name))
    }
}

impl NodeVisitor for OptimizerVisitor {
    fn name(&self) -> &'static str {
        "optimizer"
    }

    fn priority(&self) -> i32 {
        255
    }

    fn enter_node(&mut self, node: &mut Node) {
        if !self.optimizations.for_loop {
            return;
        }

        match &node.kind {
            NodeKind::For { key, value, .. } => {
                let mut targets = vec![value.clone()];
                targets.extend(key.clone());
                self.loops.push(LoopScope {
                    with_loop: false,
                    targets,
                });
            }
            _ if self.loops.is_empty() => {}
            NodeKind::BlockReference(_) => self.add_loop_to_current(),
            NodeKind::Include(args) | NodeKind::Embed { args, .. } if !args.only => {
                self.add_loop_to_all();
            }
            _ => {}
        }
    }

    fn leave_node(&mut self, mut node: Node) -> Option<Node> {
        if self.optimizations.for_loop {
            if let NodeKind::For { with_loop, .. } = &mut node.kind {
                if let Some(scope) = self.loops.pop() {
                    *with_loop = scope.with_loop;
                }
            }
        }

        if let NodeKind::Print(expr) = &mut node.kind {
            match &mut expr.kind {
                ExprKind::BlockReference { output, .. } | ExprKind::Parent { output, .. } => {
                    *output = true;
                    let expr = std::mem::take(expr);
                    return Some(Node::new(NodeKind::Output(expr), node.line));
                }
                _ => {}
            }
        }

        Some(node)
    }

    fn enter_expr(&mut self, expr: &mut Expr) {
        if !self.optimizations.for_loop || self.loops.is_empty() {
            return;
        }

        match &expr.kind {
            ExprKind::Name { .. } if self.is_loop_variable(expr) => self.add_loop_to_current(),
            ExprKind::BlockReference { .. } | ExprKind::Parent { .. } => self.add_loop_to_current(),
            ExprKind::Function {
                name, arguments, ..
            } if name == "include" => {
                let without_context = arguments
                    .get(2)
                    .is_some_and(|a| a.value.as_constant() == Some(&Value::Bool(false)));
                if !without_context {
                    self.add_loop_to_all();
                }
            }
            ExprKind::GetAttr {
                node, attribute, ..
            } => {
                let dynamic = match attribute.as_constant() {
                    Some(value) => value.as_str() == Some("parent"),
                    None => true,
                };
                let current = self.loops.last().is_some_and(|scope| scope.with_loop);
                if dynamic && (current || self.is_loop_variable(node)) {
                    self.add_loop_to_all();
                }
            }
            _ => {}
        }
    }

    fn leave_expr(&mut self, expr: Expr) -> Expr {
        if !self.optimizations.raw_filter {
            return expr;
        }

        match expr.kind {
            ExprKind::Filter { node, name, .. } if name == "raw" => *node,
            kind => Expr { kind, ..expr },
        }
    }
}
