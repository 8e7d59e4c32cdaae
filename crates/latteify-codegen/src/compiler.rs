//! Latte code generator.
//!
//! Renders a (visited) module into Latte source. Every statement and
//! expression kind has one fixed rendering; the compiler itself only keeps
//! the output buffer, a counter for synthesized variable names and the
//! Latte-line to Twig-line debug map.

use std::collections::BTreeMap;
use std::sync::Arc;

use latteify_lexer::{Source, SyntaxError, SyntaxErrorKind};
use latteify_parser::ast::{
    Argument, BinaryOp, CallType, ExprKind, FunctionKind, IncludeArgs, MacroNode, ModuleNode,
    Node, NodeKind, SetValue, TestKind, UnaryOp, Value,
};
use latteify_parser::{Environment, Expr};

use crate::CodegenError;

/// Names with a fixed Latte spelling.
const SPECIAL_NAMES: &[(&str, &str)] = &[("loop", "$iterator")];

const RESERVED_MACRO_ARGUMENT: &str = "varargs";

/// Compile `module` into Latte source and its debug map.
pub fn compile(
    module: &ModuleNode,
    env: &Environment,
) -> Result<(String, Vec<(usize, usize)>), CodegenError> {
    let mut compiler = Compiler::new(env, Arc::clone(&module.source));
    compiler.compile_module(module)?;
    Ok(compiler.finish())
}

pub struct Compiler<'a> {
    env: &'a Environment,
    source: Arc<Source>,
    /// Modules being compiled; the last one owns the block definitions in scope.
    modules: Vec<&'a ModuleNode>,
    out: String,
    var_counter: usize,
    debug_info: BTreeMap<usize, usize>,
    counted: usize,
    line: usize,
    /// Names bound by the enclosing `foreach` loops.
    loop_targets: Vec<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(env: &'a Environment, source: Arc<Source>) -> Self {
        Self {
            env,
            source,
            modules: Vec::new(),
            out: String::new(),
            var_counter: 0,
            debug_info: BTreeMap::new(),
            counted: 0,
            line: 1,
            loop_targets: Vec::new(),
        }
    }

    /// The generated code and `(latte line, twig line)` pairs, sorted by
    /// Latte line.
    pub fn finish(self) -> (String, Vec<(usize, usize)>) {
        (self.out, self.debug_info.into_iter().collect())
    }

    pub fn raw(&mut self, code: &str) -> &mut Self {
        self.out.push_str(code);
        self
    }

    /// A fresh `__internal_N` variable name.
    pub fn var_name(&mut self) -> String {
        let name = format!("__internal_{}", self.var_counter);
        self.var_counter += 1;
        name
    }

    /// A string literal: bare when it is a plain symbol, single-quoted when
    /// it has no control characters, double-quoted with C escapes otherwise.
    pub fn string(&mut self, value: &str) -> &mut Self {
        if is_symbol(value) {
            return self.raw(value);
        }

        let mut quoted = String::with_capacity(value.len() + 2);
        if value.chars().any(|c| c.is_ascii_control() && c != '\x7f') {
            quoted.push('"');
            for c in value.chars() {
                match c {
                    '\\' => quoted.push_str("\\\\"),
                    '"' => quoted.push_str("\\\""),
                    '\n' => quoted.push_str("\\n"),
                    '\t' => quoted.push_str("\\t"),
                    '\r' => quoted.push_str("\\r"),
                    '\x07' => quoted.push_str("\\a"),
                    '\x08' => quoted.push_str("\\b"),
                    '\x0b' => quoted.push_str("\\v"),
                    '\x0c' => quoted.push_str("\\f"),
                    c if c.is_ascii_control() && c != '\x7f' => {
                        quoted.push_str(&format!("\\{:03o}", c as u32));
                    }
                    c => quoted.push(c),
                }
            }
            quoted.push('"');
        } else {
            quoted.push('\'');
            for c in value.chars() {
                if matches!(c, '\\' | '\'') {
                    quoted.push('\\');
                }
                quoted.push(c);
            }
            quoted.push('\'');
        }
        self.raw(&quoted)
    }

    /// The literal form of a constant.
    pub fn repr(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Null => self.raw("null"),
            Value::Bool(b) => self.raw(if *b { "true" } else { "false" }),
            Value::Int(n) => self.raw(&n.to_string()),
            Value::Float(f) => self.raw(&format_float(*f)),
            Value::String(s) => self.string(s),
            Value::Array(pairs) => {
                self.raw("[");
                let mut counter = 0i64;
                for (i, (key, item)) in pairs.iter().enumerate() {
                    if i > 0 {
                        self.raw(", ");
                    }
                    if *key != Value::Int(counter) {
                        self.repr(key);
                        let symbol = key.as_str().is_some_and(is_symbol);
                        self.raw(if symbol { ": " } else { " => " });
                    }
                    counter += 1;
                    self.repr(item);
                }
                self.raw("]")
            }
        }
    }

    // =========================================================================
    // Modules and statements
    // =========================================================================

    /// Render the body of `module` followed by its macro definitions.
    pub fn compile_module(&mut self, module: &'a ModuleNode) -> Result<(), CodegenError> {
        self.modules.push(module);
        self.nodes(&module.body)?;
        for mac in module.macros.values() {
            self.add_debug_info(mac.line);
            self.define(mac)?;
        }
        self.modules.pop();
        Ok(())
    }

    fn nodes(&mut self, nodes: &'a [Node]) -> Result<(), CodegenError> {
        for node in nodes {
            self.node(node)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &'a Node) -> Result<(), CodegenError> {
        if !matches!(node.kind, NodeKind::Text(_)) {
            self.add_debug_info(node.line);
        }

        match &node.kind {
            NodeKind::Text(text) => {
                self.raw(text);
            }
            NodeKind::Comment(text) => {
                self.raw("{*").raw(&text.replace("*}", "* }")).raw("*}");
            }
            NodeKind::Verbatim(text) => {
                self.raw("{syntax off}").raw(text).raw("{/syntax}");
            }
            NodeKind::Print(expr) => {
                let rendered = self.capture(|c| c.expr(expr))?;
                if rendered.starts_with('$') {
                    self.raw("{").raw(&rendered).raw("}");
                } else {
                    self.raw("{=").raw(&rendered).raw("}");
                }
            }
            NodeKind::Output(expr) => self.expr(expr)?,
            NodeKind::BlockReference(name) => {
                let body = self.block_body(name, node.line)?;
                self.raw("{block ").raw(name).raw("}");
                self.nodes(body)?;
                self.raw("{/block}");
            }
            NodeKind::For {
                key,
                value,
                sequence,
                body,
                else_body,
                ..
            } => {
                self.raw("{foreach ");
                self.expr(sequence)?;
                self.raw(" as ");
                if let Some(key) = key {
                    self.raw("$").raw(key).raw(" => ");
                }
                self.raw("$").raw(value).raw("}");
                let scope = self.loop_targets.len();
                self.loop_targets.extend(key.iter().cloned());
                self.loop_targets.push(value.clone());
                let rendered = self.nodes(body);
                self.loop_targets.truncate(scope);
                rendered?;
                if let Some(else_body) = else_body {
                    self.raw("{else}");
                    self.nodes(else_body)?;
                }
                self.raw("{/foreach}");
            }
            NodeKind::If {
                branches,
                else_body,
            } => {
                for (i, (test, body)) in branches.iter().enumerate() {
                    self.raw(if i == 0 { "{if " } else { "{elseif " });
                    self.expr(test)?;
                    self.raw("}");
                    self.nodes(body)?;
                }
                if let Some(else_body) = else_body {
                    self.raw("{else}");
                    self.nodes(else_body)?;
                }
                self.raw("{/if}");
            }
            NodeKind::Set { names, value } => match value {
                SetValue::Exprs(values) => {
                    self.raw("{var ");
                    for (i, (name, value)) in names.iter().zip(values).enumerate() {
                        if i > 0 {
                            self.raw(", ");
                        }
                        self.raw("$").raw(name).raw(" = ");
                        self.expr(value)?;
                    }
                    self.raw("}");
                }
                SetValue::Capture(body) => {
                    let name = names.first().map_or("", String::as_str);
                    self.raw("{capture $").raw(name).raw("}");
                    self.nodes(body)?;
                    self.raw("{/capture}");
                }
            },
            NodeKind::Include(args) => self.include(args, None)?,
            NodeKind::Embed { args, module } => self.include(args, Some(module.as_ref()))?,
            NodeKind::Import { template, .. } | NodeKind::Use { template, .. } => {
                self.raw("{import ");
                self.filename(template)?;
                self.raw("}");
            }
            NodeKind::Extends(template) => {
                self.raw("{layout ");
                self.filename(template)?;
                self.raw("}");
            }
            NodeKind::With {
                variables,
                only,
                body,
            } => self.with(variables.as_ref(), *only, body)?,
            NodeKind::Apply { filter, body } => {
                self.raw("{block");
                self.expr_at(filter, true)?;
                self.raw("}");
                self.nodes(body)?;
                self.raw("{/block}");
            }
            NodeKind::AutoEscape { body, .. } | NodeKind::Sandbox(body) => self.nodes(body)?,
            NodeKind::Cache {
                key,
                ttl,
                tags,
                body,
            } => {
                self.raw("{cache ");
                self.expr(key)?;
                if let Some(ttl) = ttl {
                    self.raw(", expire: ");
                    self.expr(ttl)?;
                }
                if let Some(tags) = tags {
                    self.raw(", tags: ");
                    self.expr(tags)?;
                }
                self.raw("}");
                self.nodes(body)?;
                self.raw("{/cache}");
            }
            NodeKind::Do(expr) => {
                self.raw("{do ");
                self.expr(expr)?;
                self.raw("}");
            }
            NodeKind::Flush => {
                self.raw("{do flush()}");
            }
            NodeKind::Deprecated(expr) => {
                self.raw("{do trigger_error(");
                self.expr(expr)?;
                self.raw(" . ");
                let notice = format!(
                    " (\"{}\" at line {}).",
                    self.source.display_name(),
                    node.line
                );
                self.string(&notice);
                self.raw(", E_USER_DEPRECATED) }");
            }
        }
        Ok(())
    }

    fn block_body(&self, name: &str, line: usize) -> Result<&'a [Node], CodegenError> {
        self.modules
            .last()
            .copied()
            .and_then(|module| module.blocks.get(name))
            .map(|block| block.body.as_slice())
            .ok_or_else(|| CodegenError::Internal {
                message: format!("Block \"{name}\" is referenced but not defined"),
                line,
            })
    }

    fn define(&mut self, mac: &'a MacroNode) -> Result<(), CodegenError> {
        if let Some((_, default)) = mac.arguments.iter().find(|(name, _)| name == RESERVED_MACRO_ARGUMENT) {
            return Err(SyntaxError::new(
                SyntaxErrorKind::InvalidConstruct,
                format!(
                    "The argument \"{RESERVED_MACRO_ARGUMENT}\" in macro \"{}\" cannot be defined because the variable \"{RESERVED_MACRO_ARGUMENT}\" is reserved for arbitrary arguments",
                    mac.name
                ),
                default.line,
                &self.source,
            )
            .into());
        }

        self.raw("{define ").raw(&mac.name);
        for (name, default) in &mac.arguments {
            self.raw(", $").raw(name);
            if !default.is_null_constant() {
                self.raw(" = ");
                self.expr(default)?;
            }
        }
        self.raw("}");
        self.nodes(&mac.body)?;
        self.raw("{/define}");
        Ok(())
    }

    fn include(&mut self, args: &IncludeArgs, embedded: Option<&'a ModuleNode>) -> Result<(), CodegenError> {
        if args.ignore_missing {
            self.raw("{try}\n");
        }

        self.raw(if embedded.is_some() {
            "{embed "
        } else if args.sandboxed {
            "{sandbox "
        } else {
            "{include "
        });
        self.filename(&args.template)?;
        if let Some(variables) = &args.variables {
            self.raw(", ");
            match &variables.kind {
                ExprKind::Array(pairs) => self.array_elements(pairs)?,
                _ => {
                    self.raw("...");
                    self.expr(variables)?;
                }
            }
        }
        self.raw("}");

        if let Some(module) = embedded {
            self.raw("\n");
            self.compile_module(module)?;
            self.raw("{/embed}");
        }

        if args.ignore_missing {
            self.raw("{/try}\n");
        }
        Ok(())
    }

    fn with(&mut self, variables: Option<&Expr>, only: bool, body: &'a [Node]) -> Result<(), CodegenError> {
        self.raw("{block}");
        if let Some(variables) = variables {
            match &variables.kind {
                ExprKind::Array(pairs) => {
                    if !pairs.is_empty() {
                        self.raw("\n{var ");
                        for (i, (key, value)) in pairs.iter().enumerate() {
                            if i > 0 {
                                self.raw(", ");
                            }
                            match key.as_constant().and_then(Value::as_str) {
                                Some(name) => {
                                    self.raw("$").raw(name);
                                }
                                None => self.expr(key)?,
                            }
                            self.raw(" = ");
                            self.expr(value)?;
                        }
                        self.raw("}");
                    }
                }
                _ => {
                    let name = self.var_name();
                    self.raw("\n{var $").raw(&name).raw(" = ");
                    self.expr(variables)?;
                    self.raw("}");
                }
            }
            if only {
                self.raw("{* WARNING: 'only' is not supported *}");
            }
        }
        self.nodes(body)?;
        self.raw("{/block}");
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        self.expr_at(expr, expr.topmost)
    }

    /// Render `expr`; a topmost expression drops its own parentheses.
    fn expr_at(&mut self, expr: &Expr, topmost: bool) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::Constant(value) => {
                self.repr(value);
            }
            ExprKind::Name {
                name,
                is_defined_test,
            } => {
                let special = SPECIAL_NAMES
                    .iter()
                    .find(|(twig, _)| twig == name)
                    .filter(|_| !self.loop_targets.contains(name))
                    .map(|(_, latte)| *latte);
                match (is_defined_test, special) {
                    (true, Some(_)) => self.raw("true"),
                    (true, None) => self.raw("isset($").raw(name).raw(")"),
                    (false, Some(latte)) => self.raw(latte),
                    (false, None) => self.raw("$").raw(name),
                };
            }
            ExprKind::AssignName(name) => {
                self.raw("$").raw(name);
            }
            ExprKind::Array(pairs) => {
                self.raw("[");
                self.array_elements(pairs)?;
                self.raw("]");
            }
            ExprKind::Unary { op, operand } => {
                self.raw(match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                });
                self.operand(operand)?;
            }
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, topmost, expr.line)?,
            ExprKind::Conditional {
                test,
                then,
                otherwise,
            } => {
                self.operand(test)?;
                self.raw(" ? ");
                self.operand(then)?;
                if !otherwise.is_null_constant() {
                    self.raw(" : ");
                    self.operand(otherwise)?;
                }
            }
            ExprKind::GetAttr {
                node,
                attribute,
                arguments,
                call_type,
                is_defined_test,
            } => {
                if *is_defined_test {
                    if *call_type == CallType::Method {
                        self.raw("true");
                        return Ok(());
                    }
                    self.raw("isset(");
                }
                self.operand(node)?;
                match attribute.as_constant() {
                    Some(Value::Int(index)) if *index >= 0 => {
                        self.raw(&format!("[{index}]"));
                    }
                    Some(Value::String(name)) if is_identifier(name) => {
                        self.raw("->").raw(name);
                    }
                    _ => {
                        self.raw("->{");
                        self.expr(attribute)?;
                        self.raw("}");
                    }
                }
                if *is_defined_test {
                    self.raw(")");
                }
                if *call_type == CallType::Method || !arguments.is_empty() {
                    self.raw("(");
                    for (i, argument) in arguments.iter().enumerate() {
                        if i > 0 {
                            self.raw(", ");
                        }
                        self.expr(argument)?;
                    }
                    self.raw(")");
                }
            }
            ExprKind::MethodCall {
                method,
                arguments,
                is_defined_test,
                ..
            } => {
                if *is_defined_test {
                    self.raw("true");
                } else {
                    self.raw("{include ").raw(method);
                    for argument in arguments {
                        self.raw(", ");
                        self.argument(argument)?;
                    }
                    self.raw("}");
                }
            }
            ExprKind::Filter {
                node,
                name,
                arguments,
            } => {
                if topmost {
                    self.expr_at(node, true)?;
                } else {
                    self.raw("(");
                    self.operand(node)?;
                }
                let env = self.env;
                self.raw("|").raw(env.latte_filter_name(name));
                for (i, argument) in arguments.iter().enumerate() {
                    self.raw(if i == 0 { ":" } else { ", " });
                    self.argument(argument)?;
                }
                if !topmost {
                    self.raw(")");
                }
            }
            ExprKind::Function {
                name,
                kind,
                arguments,
                is_defined_test,
            } => {
                if *kind == FunctionKind::Include {
                    self.raw("{include ");
                    for (i, argument) in arguments.iter().enumerate() {
                        if i == 0 {
                            self.filename(&argument.value)?;
                        } else {
                            self.raw(", ");
                            self.argument(argument)?;
                        }
                    }
                    self.raw("}");
                } else {
                    let env = self.env;
                    let latte = if name == "constant" && *is_defined_test {
                        "defined"
                    } else {
                        env.latte_function_name(name)
                    };
                    self.raw(latte);
                    self.call_arguments(arguments)?;
                }
            }
            ExprKind::Test {
                node,
                name,
                kind,
                arguments,
            } => self.test(node, name, *kind, arguments, expr.line)?,
            ExprKind::Arrow { names, body } => {
                self.raw("fn(");
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        self.raw(", ");
                    }
                    self.raw("$").raw(name);
                }
                self.raw(") => ");
                self.expr(body)?;
            }
            ExprKind::BlockReference {
                name,
                template,
                is_defined_test,
                ..
            } => {
                let constant = name.as_constant().and_then(Value::as_str);
                if *is_defined_test {
                    match constant {
                        Some(block) => {
                            self.raw("ifset ").raw(block);
                        }
                        None => {
                            self.raw("ifset block ");
                            self.expr(name)?;
                        }
                    }
                } else {
                    self.raw("{include ");
                    match constant {
                        Some(block) => {
                            self.raw(block);
                        }
                        None => self.expr(name)?,
                    }
                    if let Some(template) = template {
                        self.raw(" from ");
                        self.filename(template)?;
                    }
                    self.raw("}");
                }
            }
            ExprKind::Parent { .. } => {
                self.raw("{include parent}");
            }
            ExprKind::ApplyTarget => {}
        }
        Ok(())
    }

    /// Render an operand, grouping constructs that do not nest bare.
    fn operand(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        if matches!(expr.kind, ExprKind::Conditional { .. }) || is_infix_test(expr) {
            self.raw("(");
            self.expr_at(expr, false)?;
            self.raw(")");
            Ok(())
        } else {
            self.expr(expr)
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        topmost: bool,
        line: usize,
    ) -> Result<(), CodegenError> {
        let function = match op {
            BinaryOp::BitOr => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::Unsupported,
                    "Bitwise OR is not allowed in Latte",
                    line,
                    &self.source,
                )
                .into());
            }
            BinaryOp::Range => Some(("range", false)),
            BinaryOp::Matches => Some(("preg_match", true)),
            BinaryOp::StartsWith => Some(("str_starts_with", false)),
            BinaryOp::EndsWith => Some(("str_ends_with", false)),
            _ => None,
        };
        if let Some((name, swap)) = function {
            let (first, second) = if swap { (right, left) } else { (left, right) };
            self.raw(name).raw("(");
            self.expr(first)?;
            self.raw(", ");
            self.expr(second)?;
            self.raw(")");
            return Ok(());
        }

        match op {
            BinaryOp::NotIn => {
                self.raw("!in_array(");
                self.expr(left)?;
                self.raw(", ");
                self.expr(right)?;
                self.raw(", true)");
            }
            BinaryOp::FloorDiv => {
                self.raw("(int) floor(");
                self.operand(left)?;
                self.raw(" / ");
                self.operand(right)?;
                self.raw(")");
            }
            _ => {
                if !topmost {
                    self.raw("(");
                }
                self.operand(left)?;
                self.raw(" ").raw(binary_symbol(op)).raw(" ");
                self.operand(right)?;
                if !topmost {
                    self.raw(")");
                }
            }
        }
        Ok(())
    }

    fn test(
        &mut self,
        node: &Expr,
        name: &str,
        kind: TestKind,
        arguments: &[Argument],
        line: usize,
    ) -> Result<(), CodegenError> {
        let argument = |index: usize| {
            arguments
                .get(index)
                .map(|a| &a.value)
                .ok_or_else(|| CodegenError::Internal {
                    message: format!("Test \"{name}\" is missing argument {}", index + 1),
                    line,
                })
        };

        match kind {
            TestKind::Defined => self.expr(node)?,
            TestKind::Null => {
                self.operand(node)?;
                self.raw(" === null");
            }
            TestKind::Even => {
                self.operand(node)?;
                self.raw(" % 2 === 0");
            }
            TestKind::Odd => {
                self.operand(node)?;
                self.raw(" % 2 !== 0");
            }
            TestKind::DivisibleBy => {
                let divisor = argument(0)?;
                self.operand(node)?;
                self.raw(" % ");
                self.operand(divisor)?;
                self.raw(" === 0");
            }
            TestKind::SameAs => {
                let other = argument(0)?;
                self.operand(node)?;
                self.raw(" === ");
                self.operand(other)?;
            }
            TestKind::Constant => {
                let constant = argument(0)?;
                self.raw("constant(");
                if let Some(object) = arguments.get(1) {
                    self.raw("get_class(");
                    self.expr(&object.value)?;
                    self.raw(").\"::\".");
                }
                self.expr(constant)?;
                self.raw(") === ");
                self.operand(node)?;
            }
            TestKind::Generic => {
                let env = self.env;
                let function = env.latte_function_name(name).replace(' ', "_");
                self.raw(&function).raw("(");
                self.expr(node)?;
                for argument in arguments {
                    self.raw(", ");
                    self.argument(argument)?;
                }
                self.raw(")");
            }
        }
        Ok(())
    }

    fn argument(&mut self, argument: &Argument) -> Result<(), CodegenError> {
        if let Some(name) = &argument.name {
            self.raw(name).raw(": ");
        }
        self.expr(&argument.value)
    }

    fn call_arguments(&mut self, arguments: &[Argument]) -> Result<(), CodegenError> {
        self.raw("(");
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.raw(", ");
            }
            self.argument(argument)?;
        }
        self.raw(")");
        Ok(())
    }

    /// Hash elements without brackets; sequential integer keys are implied.
    fn array_elements(&mut self, pairs: &[(Expr, Expr)]) -> Result<(), CodegenError> {
        let mut counter = 0i64;
        for (i, (key, value)) in pairs.iter().enumerate() {
            if i > 0 {
                self.raw(", ");
            }
            let implicit = match key.as_constant() {
                Some(constant) => {
                    let implicit = *constant == Value::Int(counter);
                    counter += 1;
                    implicit
                }
                None => false,
            };
            if !implicit {
                self.expr(key)?;
                self.raw(" => ");
            }
            self.expr(value)?;
        }
        Ok(())
    }

    /// A template name with `.twig` extensions turned into `.latte`.
    fn filename(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        let rendered = self.capture(|c| c.expr(expr))?;
        self.raw(&rendered.replace(".twig", ".latte"));
        Ok(())
    }

    fn capture(
        &mut self,
        render: impl FnOnce(&mut Self) -> Result<(), CodegenError>,
    ) -> Result<String, CodegenError> {
        let start = self.out.len();
        render(self)?;
        Ok(self.out.split_off(start))
    }

    fn add_debug_info(&mut self, source_line: usize) {
        match self.out.get(self.counted..) {
            Some(tail) => self.line += tail.matches('\n').count(),
            None => self.line = 1 + self.out.matches('\n').count(),
        }
        self.counted = self.out.len();
        self.debug_info.entry(self.line).or_insert(source_line);
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "||",
        BinaryOp::And => "&&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::BitAnd => "&",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::Spaceship => "<=>",
        BinaryOp::Less => "<",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::LessEqual => "<=",
        BinaryOp::NotIn => "not in",
        BinaryOp::In => "in",
        BinaryOp::Matches => "matches",
        BinaryOp::StartsWith => "starts with",
        BinaryOp::EndsWith => "ends with",
        BinaryOp::Range => "..",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Concat => ".",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Power => "**",
        BinaryOp::NullCoalesce => "??",
    }
}

fn is_infix_test(expr: &Expr) -> bool {
    matches!(
        &expr.kind,
        ExprKind::Test { kind, .. } if !matches!(kind, TestKind::Generic | TestKind::Defined)
    )
}

/// `^\w+(-+\w+)*$` over ASCII word characters, excluding spellings that
/// would read back as a number or a keyword.
fn is_symbol(value: &str) -> bool {
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    !value.is_empty()
        && value.chars().all(|c| word(c) || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && !["true", "false", "null", "none"]
            .iter()
            .any(|keyword| value.eq_ignore_ascii_case(keyword))
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Locale-independent float literal that always reads back as a float.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        let literal = if value > 0.0 { "INF" } else { "-INF" };
        literal.to_string()
    } else {
        format!("{value:?}")
    }
}
