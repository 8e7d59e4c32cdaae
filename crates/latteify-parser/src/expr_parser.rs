//! Precedence-climbing expression parser.
//!
//! Implemented as further methods on [`Parser`] since filters, tests and
//! macro calls need the parser's block stack and imported symbols.

use latteify_lexer::{Number, SyntaxError, SyntaxErrorKind, Token, TokenKind};
use log::warn;

use crate::arguments::{bind_arguments, CallKind};
use crate::ast::{
    Argument, BinaryOp, CallType, Expr, ExprKind, FilterKind, TestKind, UnaryOp, Value,
};
use crate::environment::{Associativity, Deprecation, OperatorKind, TestDef};
use crate::parser::{Parser, SymbolKind};

/// Whole-token match of a Twig name: letter, underscore or non-ASCII,
/// then alphanumerics.
fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
}

fn starts_like_name(value: &str) -> bool {
    value
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii())
}

fn number_value(number: &Number) -> Value {
    match number {
        Number::Int(n) => Value::Int(*n),
        Number::Float(n) => Value::Float(*n),
    }
}

/// Scalars, arrays of constants and signed constants.
fn is_constant_expression(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Constant(_) => true,
        ExprKind::Array(elements) => elements
            .iter()
            .all(|(key, value)| is_constant_expression(key) && is_constant_expression(value)),
        ExprKind::Unary {
            op: UnaryOp::Neg | UnaryOp::Pos,
            operand,
        } => is_constant_expression(operand),
        _ => false,
    }
}

impl<'env> Parser<'env> {
    // =========================================================================
    // Operators
    // =========================================================================

    /// Parse a full expression, including a trailing conditional.
    pub fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_expression_with(0, false)
    }

    /// Parse binary operators binding at least as tight as `precedence`.
    /// `allow_arrow` accepts `x => expr` and `(a, b) => expr`.
    pub fn parse_expression_with(&mut self, precedence: u32, allow_arrow: bool) -> Result<Expr, SyntaxError> {
        if allow_arrow {
            if let Some(arrow) = self.parse_arrow()? {
                return Ok(arrow);
            }
        }

        let mut expr = self.parse_operand()?;
        loop {
            let token = self.stream.current().clone();
            let TokenKind::Operator(symbol) = &token.kind else {
                break;
            };
            let env = self.env;
            let Some(operator) = env.binary_operator(symbol) else {
                break;
            };
            if operator.precedence < precedence {
                break;
            }
            self.stream.next()?;

            expr = match operator.kind {
                OperatorKind::Test => self.parse_test_expression(expr)?,
                OperatorKind::NotTest => {
                    let test = self.parse_test_expression(expr)?;
                    Expr::new(
                        ExprKind::Unary {
                            op: UnaryOp::Not,
                            operand: Box::new(test),
                        },
                        self.stream.current().line(),
                    )
                }
                OperatorKind::Binary(op) => {
                    let next = match operator.associativity {
                        Associativity::Left => operator.precedence + 1,
                        Associativity::Right => operator.precedence,
                    };
                    let right = self.parse_expression_with(next, false)?;
                    Expr::binary(op, expr, right, token.line())
                }
            };
        }

        if precedence == 0 {
            return self.parse_conditional_expression(expr);
        }
        Ok(expr)
    }

    fn parse_arrow(&mut self) -> Result<Option<Expr>, SyntaxError> {
        let arrow = |token: &Token| token.kind == TokenKind::Arrow;

        // x => expr
        if arrow(self.stream.look(1)) {
            let line = self.stream.current().line();
            let name = self.stream.expect_name()?;
            self.stream.next()?;
            let body = self.parse_expression()?;
            return Ok(Some(Expr::new(
                ExprKind::Arrow {
                    names: vec![name],
                    body: Box::new(body),
                },
                line,
            )));
        }

        // (a, b) => expr, confirmed by lookahead before anything is consumed
        if !self.stream.current().is_punct('(') {
            return Ok(None);
        }
        let mut i = 2;
        while self.stream.look(i).is_punct(',') {
            i += 2;
        }
        if !self.stream.look(i).is_punct(')') || !arrow(self.stream.look(i + 1)) {
            return Ok(None);
        }

        let line = self.stream.next()?.line();
        let mut names = Vec::new();
        loop {
            names.push(self.stream.expect_name()?);
            if self.stream.next_if_punct(',').is_none() {
                break;
            }
        }
        self.stream.expect_punct(')', None)?;
        self.stream.next()?;
        let body = self.parse_expression()?;
        Ok(Some(Expr::new(
            ExprKind::Arrow {
                names,
                body: Box::new(body),
            },
            line,
        )))
    }

    /// A unary operator application, a parenthesized expression or a primary.
    fn parse_operand(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.stream.current().clone();

        if let TokenKind::Operator(symbol) = &token.kind {
            let env = self.env;
            if let Some(operator) = env.unary_operator(symbol) {
                self.stream.next()?;
                let operand = self.parse_expression_with(operator.precedence, false)?;
                let expr = Expr::new(
                    ExprKind::Unary {
                        op: operator.op,
                        operand: Box::new(operand),
                    },
                    token.line(),
                );
                return self.parse_postfix_expression(expr);
            }
        }

        if token.is_punct('(') {
            self.stream.next()?;
            let expr = self.parse_expression()?;
            self.stream
                .expect_punct(')', Some("An opened parenthesis is not properly closed"))?;
            return self.parse_postfix_expression(expr);
        }

        self.parse_primary_expression()
    }

    /// `a ? b : c`, `a ?: c` and `a ? b`.
    fn parse_conditional_expression(&mut self, mut expr: Expr) -> Result<Expr, SyntaxError> {
        while self.stream.next_if_punct('?').is_some() {
            let (then, otherwise) = if self.stream.next_if_punct(':').is_some() {
                (expr.clone(), self.parse_expression()?)
            } else {
                let then = self.parse_expression()?;
                let otherwise = if self.stream.next_if_punct(':').is_some() {
                    self.parse_expression()?
                } else {
                    Expr::string("", self.stream.current().line())
                };
                (then, otherwise)
            };

            expr = Expr::new(
                ExprKind::Conditional {
                    test: Box::new(expr),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                self.stream.current().line(),
            );
        }
        Ok(expr)
    }

    // =========================================================================
    // Primaries
    // =========================================================================

    pub fn parse_primary_expression(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.stream.current().clone();
        let line = token.line();

        let node = match &token.kind {
            TokenKind::Name(name) => {
                self.stream.next()?;
                match name.to_ascii_lowercase().as_str() {
                    "true" => Expr::constant(Value::Bool(true), line),
                    "false" => Expr::constant(Value::Bool(false), line),
                    "none" | "null" => Expr::constant(Value::Null, line),
                    _ if self.stream.current().is_punct('(') => self.parse_function_call(name, line)?,
                    _ => Expr::name(name.as_str(), line),
                }
            }
            TokenKind::Number(number) => {
                self.stream.next()?;
                Expr::constant(number_value(number), line)
            }
            TokenKind::String(_) | TokenKind::InterpolationStart => self.parse_string_expression()?,
            // Word operators are plain names in operand position.
            TokenKind::Operator(symbol) if is_name(symbol) => {
                self.stream.next()?;
                Expr::name(symbol.as_str(), line)
            }
            TokenKind::Operator(symbol) if self.env.unary_operator(symbol).is_some() => {
                let env = self.env;
                let op = env.unary_operator(symbol).map_or(UnaryOp::Not, |u| u.op);
                if op == UnaryOp::Not {
                    return Err(self.error(
                        SyntaxErrorKind::UnexpectedToken,
                        format!("Unexpected unary operator \"{symbol}\""),
                        line,
                    ));
                }
                self.stream.next()?;
                let operand = self.parse_primary_expression()?;
                Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    line,
                )
            }
            TokenKind::Punctuation('[') => self.parse_array_expression()?,
            TokenKind::Punctuation('{') => self.parse_hash_expression()?,
            TokenKind::Operator(symbol)
                if symbol == "="
                    && self
                        .stream
                        .previous()
                        .is_some_and(|p| p.is_operator("==") || p.is_operator("!=")) =>
            {
                return Err(self.error(
                    SyntaxErrorKind::UnexpectedToken,
                    "Unexpected operator of value \"=\". Did you try to use \"===\" or \"!==\" for strict comparison? Use \"is same as(value)\" instead",
                    line,
                ));
            }
            _ => {
                return Err(self.error(
                    SyntaxErrorKind::UnexpectedToken,
                    format!("Unexpected token {}", token.kind),
                    line,
                ))
            }
        };

        self.parse_postfix_expression(node)
    }

    /// A string literal, with `#{}` interpolations folded into `~`.
    fn parse_string_expression(&mut self) -> Result<Expr, SyntaxError> {
        let line = self.stream.current().line();
        let mut parts = Vec::new();
        // Two adjacent string tokens are two expressions, not one.
        let mut next_can_be_string = true;

        loop {
            if next_can_be_string {
                if let Some(token) = self.stream.next_if(|t| matches!(t.kind, TokenKind::String(_))) {
                    let line = token.line();
                    if let TokenKind::String(value) = token.kind {
                        parts.push(Expr::string(value, line));
                    }
                    next_can_be_string = false;
                    continue;
                }
            }
            if self
                .stream
                .next_if(|t| t.kind == TokenKind::InterpolationStart)
                .is_none()
            {
                break;
            }
            parts.push(self.parse_expression()?);
            self.stream.expect(
                |t| t.kind == TokenKind::InterpolationEnd,
                "\"end of string interpolation\"",
                None,
            )?;
            next_can_be_string = true;
        }

        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return Err(self.error(SyntaxErrorKind::UnexpectedToken, "A string was expected", line));
        };
        Ok(parts.fold(first, |left, right| {
            let line = right.line;
            Expr::binary(BinaryOp::Concat, left, right, line)
        }))
    }

    pub fn parse_array_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.stream
            .expect_punct('[', Some("An array element was expected"))?;
        let line = self.stream.current().line();

        let mut elements = Vec::new();
        while !self.stream.current().is_punct(']') {
            if !elements.is_empty() {
                self.stream
                    .expect_punct(',', Some("An array element must be followed by a comma"))?;
                if self.stream.current().is_punct(']') {
                    break;
                }
            }
            let value = self.parse_expression()?;
            let key = Expr::constant(Value::Int(elements.len() as i64), value.line);
            elements.push((key, value));
        }

        self.stream
            .expect_punct(']', Some("An opened array is not properly closed"))?;
        Ok(Expr::new(ExprKind::Array(elements), line))
    }

    pub fn parse_hash_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.stream
            .expect_punct('{', Some("A hash element was expected"))?;
        let line = self.stream.current().line();

        let mut elements = Vec::new();
        while !self.stream.current().is_punct('}') {
            if !elements.is_empty() {
                self.stream
                    .expect_punct(',', Some("A hash value must be followed by a comma"))?;
                if self.stream.current().is_punct('}') {
                    break;
                }
            }

            let token = self.stream.current().clone();
            let key = match &token.kind {
                TokenKind::Name(name) => {
                    self.stream.next()?;
                    // {a} is {a: a}
                    if self.stream.current().is_any_punct(&[',', '}']) {
                        elements.push((
                            Expr::string(name.as_str(), token.line()),
                            Expr::name(name.as_str(), token.line()),
                        ));
                        continue;
                    }
                    Expr::string(name.as_str(), token.line())
                }
                TokenKind::String(value) => {
                    self.stream.next()?;
                    Expr::string(value.as_str(), token.line())
                }
                TokenKind::Number(number) => {
                    self.stream.next()?;
                    Expr::constant(number_value(number), token.line())
                }
                TokenKind::Punctuation('(') => self.parse_expression()?,
                _ => {
                    return Err(self.error(
                        SyntaxErrorKind::UnexpectedToken,
                        format!(
                            "A hash key must be a quoted string, a number, a name, or an expression enclosed in parentheses (unexpected token {})",
                            token.kind
                        ),
                        token.line(),
                    ))
                }
            };

            self.stream
                .expect_punct(':', Some("A hash key must be followed by a colon (:)"))?;
            let value = self.parse_expression()?;
            elements.push((key, value));
        }

        self.stream
            .expect_punct('}', Some("An opened hash is not properly closed"))?;
        Ok(Expr::new(ExprKind::Array(elements), line))
    }

    // =========================================================================
    // Postfix
    // =========================================================================

    pub fn parse_postfix_expression(&mut self, mut node: Expr) -> Result<Expr, SyntaxError> {
        loop {
            let token = self.stream.current();
            if token.is_any_punct(&['.', '[']) {
                node = self.parse_subscript_expression(node)?;
            } else if token.is_punct('|') {
                self.stream.next()?;
                node = self.parse_filter_chain(node)?;
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_subscript_expression(&mut self, node: Expr) -> Result<Expr, SyntaxError> {
        let token = self.stream.next()?;
        let line = token.line();

        if token.is_punct('.') {
            let attribute_token = self.stream.next()?;
            let attribute = match &attribute_token.kind {
                TokenKind::Name(name) => Value::String(name.clone()),
                TokenKind::Number(number) => number_value(number),
                TokenKind::Operator(symbol) if starts_like_name(symbol) => Value::String(symbol.clone()),
                _ => {
                    return Err(self.error(
                        SyntaxErrorKind::UnexpectedToken,
                        "Expected name or number",
                        line,
                    ))
                }
            };

            let mut call_type = CallType::Any;
            let mut arguments = Vec::new();
            if self.stream.current().is_punct('(') {
                call_type = CallType::Method;
                arguments = self
                    .parse_arguments(false, false)?
                    .into_iter()
                    .map(|a| a.value)
                    .collect();
            }

            // alias.macro(...) on an imported template
            let alias = match &node.kind {
                ExprKind::Name { name, .. } => self
                    .imported_symbol(SymbolKind::Template, name)
                    .is_some(),
                _ => false,
            };
            if alias {
                let method = match attribute {
                    Value::String(name) => name,
                    Value::Int(n) => n.to_string(),
                    Value::Float(n) => n.to_string(),
                    _ => String::new(),
                };
                return Ok(Expr::new(
                    ExprKind::MethodCall {
                        node: Box::new(node),
                        method,
                        arguments: arguments.into_iter().map(Argument::positional).collect(),
                        is_defined_test: false,
                    },
                    line,
                ));
            }

            return Ok(Expr::new(
                ExprKind::GetAttr {
                    node: Box::new(node),
                    attribute: Box::new(Expr::constant(attribute, line)),
                    arguments,
                    call_type,
                    is_defined_test: false,
                },
                line,
            ));
        }

        // [expr] or a slice [start:length]
        let mut slice = false;
        let start = if self.stream.current().is_punct(':') {
            slice = true;
            Expr::constant(Value::Int(0), line)
        } else {
            self.parse_expression()?
        };
        if self.stream.next_if_punct(':').is_some() {
            slice = true;
        }

        if slice {
            let length = if self.stream.current().is_punct(']') {
                Expr::constant(Value::Null, line)
            } else {
                self.parse_expression()?
            };
            let arguments = vec![Argument::positional(start), Argument::positional(length)];
            let filter = self.build_filter(node, "slice", arguments, line)?;
            self.stream.expect_punct(']', None)?;
            return Ok(filter);
        }

        self.stream.expect_punct(']', None)?;
        Ok(Expr::new(
            ExprKind::GetAttr {
                node: Box::new(node),
                attribute: Box::new(start),
                arguments: Vec::new(),
                call_type: CallType::Array,
                is_defined_test: false,
            },
            line,
        ))
    }

    /// `name(args)|name...` after the first `|` has been consumed.
    pub fn parse_filter_chain(&mut self, mut node: Expr) -> Result<Expr, SyntaxError> {
        loop {
            let token = self.stream.expect(|t| t.name().is_some(), "\"name\"", None)?;
            let name = token.name().unwrap_or_default().to_string();
            let arguments = if self.stream.current().is_punct('(') {
                self.parse_arguments(true, true)?
            } else {
                Vec::new()
            };
            node = self.build_filter(node, &name, arguments, token.line())?;

            if self.stream.next_if_punct('|').is_none() {
                return Ok(node);
            }
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Parse a parenthesized argument list. Without `named`, `name = value`
    /// is not recognized.
    pub fn parse_arguments(&mut self, named: bool, allow_arrow: bool) -> Result<Vec<Argument>, SyntaxError> {
        self.stream.expect_punct(
            '(',
            Some("A list of arguments must begin with an opening parenthesis"),
        )?;

        let mut arguments = Vec::new();
        while !self.stream.current().is_punct(')') {
            if !arguments.is_empty() {
                self.stream
                    .expect_punct(',', Some("Arguments must be separated by a comma"))?;
                if self.stream.current().is_punct(')') {
                    break;
                }
            }

            let value = self.parse_expression_with(0, allow_arrow)?;
            if named {
                if let Some(equals) = self.stream.next_if_operator("=") {
                    let ExprKind::Name { name, .. } = value.kind else {
                        return Err(self.error(
                            SyntaxErrorKind::InvalidArguments,
                            "A parameter name must be a string",
                            equals.line(),
                        ));
                    };
                    let value = self.parse_expression_with(0, allow_arrow)?;
                    arguments.push(Argument {
                        name: Some(name),
                        value,
                    });
                    continue;
                }
            }
            arguments.push(Argument::positional(value));
        }

        self.stream.expect_punct(
            ')',
            Some("A list of arguments must be closed by a parenthesis"),
        )?;
        Ok(arguments)
    }

    /// Parse a macro signature: names with optional constant defaults.
    pub fn parse_macro_arguments(&mut self) -> Result<Vec<(String, Expr)>, SyntaxError> {
        self.stream.expect_punct(
            '(',
            Some("A list of arguments must begin with an opening parenthesis"),
        )?;

        let mut arguments: Vec<(String, Expr)> = Vec::new();
        while !self.stream.current().is_punct(')') {
            if !arguments.is_empty() {
                self.stream
                    .expect_punct(',', Some("Arguments must be separated by a comma"))?;
                if self.stream.current().is_punct(')') {
                    break;
                }
            }

            let token = self
                .stream
                .expect(|t| t.name().is_some(), "\"name\"", Some("An argument must be a name"))?;
            let name = token.name().unwrap_or_default().to_string();
            let default = match self.stream.next_if_operator("=") {
                Some(equals) => {
                    let value = self.parse_primary_expression()?;
                    if !is_constant_expression(&value) {
                        return Err(self.error(
                            SyntaxErrorKind::InvalidArguments,
                            "A default value for an argument must be a constant (a boolean, a string, a number, or an array)",
                            equals.line(),
                        ));
                    }
                    value
                }
                None => Expr::constant(Value::Null, self.stream.current().line()),
            };

            match arguments.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = default,
                None => arguments.push((name, default)),
            }
        }

        self.stream.expect_punct(
            ')',
            Some("A list of arguments must be closed by a parenthesis"),
        )?;
        Ok(arguments)
    }

    fn parse_function_call(&mut self, name: &str, line: usize) -> Result<Expr, SyntaxError> {
        match name {
            "parent" => {
                self.parse_arguments(false, false)?;
                let Some(block) = self.peek_block_stack().map(str::to_string) else {
                    return Err(self.error(
                        SyntaxErrorKind::InvalidConstruct,
                        "Calling \"parent\" outside a block is forbidden",
                        line,
                    ));
                };
                if self.parent().is_none() && !self.has_traits() {
                    return Err(self.error(
                        SyntaxErrorKind::InvalidConstruct,
                        "Calling \"parent\" on a template that does not extend nor \"use\" another template is forbidden",
                        line,
                    ));
                }
                Ok(Expr::new(ExprKind::Parent { block, output: false }, line))
            }
            "block" => {
                let mut arguments = self.parse_arguments(false, false)?.into_iter().map(|a| a.value);
                let Some(block) = arguments.next() else {
                    return Err(self.error(
                        SyntaxErrorKind::InvalidArguments,
                        "The \"block\" function takes one argument (the block name)",
                        line,
                    ));
                };
                Ok(Expr::new(
                    ExprKind::BlockReference {
                        name: Box::new(block),
                        template: arguments.next().map(Box::new),
                        is_defined_test: false,
                        output: false,
                    },
                    line,
                ))
            }
            "attribute" => {
                let mut arguments = self.parse_arguments(false, false)?.into_iter().map(|a| a.value);
                let (Some(node), Some(attribute)) = (arguments.next(), arguments.next()) else {
                    return Err(self.error(
                        SyntaxErrorKind::InvalidArguments,
                        "The \"attribute\" function takes at least two arguments (the variable and the attributes)",
                        line,
                    ));
                };
                let call_arguments = match arguments.next() {
                    Some(Expr {
                        kind: ExprKind::Array(elements),
                        ..
                    }) => elements.into_iter().map(|(_, value)| value).collect(),
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(Expr::new(
                    ExprKind::GetAttr {
                        node: Box::new(node),
                        attribute: Box::new(attribute),
                        arguments: call_arguments,
                        call_type: CallType::Any,
                        is_defined_test: false,
                    },
                    line,
                ))
            }
            _ => {
                if let Some(symbol) = self.imported_symbol(SymbolKind::Function, name).cloned() {
                    let arguments = self.parse_arguments(false, false)?;
                    return Ok(Expr::new(
                        ExprKind::MethodCall {
                            node: Box::new(symbol.node.unwrap_or_else(|| Expr::name(name, line))),
                            method: symbol.name,
                            arguments,
                            is_defined_test: false,
                        },
                        line,
                    ));
                }

                let arguments = self.parse_arguments(true, false)?;
                let env = self.env;
                let Some(function) = env.function(name) else {
                    return Err(self
                        .error(
                            SyntaxErrorKind::UnknownFunction,
                            format!("Unknown \"{name}\" function"),
                            line,
                        )
                        .with_suggestions(name, env.function_names()));
                };
                self.warn_deprecated("Function", name, function.deprecation.as_ref(), line);
                let arguments = bind_arguments(
                    CallKind::Function,
                    name,
                    function.signature.as_ref(),
                    arguments,
                    line,
                    self.stream.source(),
                )?;
                Ok(Expr::new(
                    ExprKind::Function {
                        name: name.to_string(),
                        kind: function.kind,
                        arguments,
                        is_defined_test: false,
                    },
                    line,
                ))
            }
        }
    }

    /// Resolve filter `name` and apply it to `node`.
    pub fn build_filter(
        &mut self,
        node: Expr,
        name: &str,
        arguments: Vec<Argument>,
        line: usize,
    ) -> Result<Expr, SyntaxError> {
        let env = self.env;
        let Some(filter) = env.filter(name) else {
            return Err(self
                .error(
                    SyntaxErrorKind::UnknownFilter,
                    format!("Unknown \"{name}\" filter"),
                    line,
                )
                .with_suggestions(name, env.filter_names()));
        };
        self.warn_deprecated("Filter", name, filter.deprecation.as_ref(), line);
        let arguments = bind_arguments(
            CallKind::Filter,
            name,
            filter.signature.as_ref(),
            arguments,
            line,
            self.stream.source(),
        )?;

        let defaultable = matches!(node.kind, ExprKind::Name { .. } | ExprKind::GetAttr { .. });
        if filter.kind == FilterKind::Default && defaultable {
            let fallback = arguments
                .into_iter()
                .next()
                .map_or_else(|| Expr::string("", node.line), |a| a.value);
            return Ok(Expr::binary(BinaryOp::NullCoalesce, node, fallback, line));
        }

        Ok(Expr::new(
            ExprKind::Filter {
                node: Box::new(node),
                name: name.to_string(),
                arguments,
            },
            line,
        ))
    }

    // =========================================================================
    // Tests
    // =========================================================================

    fn parse_test_expression(&mut self, node: Expr) -> Result<Expr, SyntaxError> {
        let (name, test) = self.parse_test_name(node.line)?;

        let arguments = if self.stream.current().is_punct('(') {
            self.parse_arguments(true, false)?
        } else if test.one_mandatory_argument {
            vec![Argument::positional(self.parse_primary_expression()?)]
        } else {
            Vec::new()
        };
        let line = self.stream.current().line();

        if test.kind == TestKind::Defined {
            let node = self.defined_operand(node, line)?;
            return Ok(Expr::new(
                ExprKind::Test {
                    node: Box::new(node),
                    name,
                    kind: test.kind,
                    arguments,
                },
                line,
            ));
        }

        self.warn_deprecated("Test", &name, test.deprecation.as_ref(), line);
        let arguments = bind_arguments(
            CallKind::Test,
            &name,
            test.signature.as_ref(),
            arguments,
            line,
            self.stream.source(),
        )?;
        Ok(Expr::new(
            ExprKind::Test {
                node: Box::new(node),
                name,
                kind: test.kind,
                arguments,
            },
            line,
        ))
    }

    /// A one- or two-word test name.
    fn parse_test_name(&mut self, line: usize) -> Result<(String, &'env TestDef), SyntaxError> {
        let env = self.env;
        let mut name = self.stream.expect_name()?;
        if let Some(test) = env.test(&name) {
            return Ok((name, test));
        }

        if let Some(second) = self.stream.current().name() {
            name = format!("{name} {second}");
            if let Some(test) = env.test(&name) {
                self.stream.next()?;
                return Ok((name, test));
            }
        }

        Err(self
            .error(
                SyntaxErrorKind::UnknownTest,
                format!("Unknown \"{name}\" test"),
                line,
            )
            .with_suggestions(&name, env.test_names()))
    }

    /// Flag the operand of `is defined`; constants are trivially defined.
    fn defined_operand(&self, mut node: Expr, line: usize) -> Result<Expr, SyntaxError> {
        if let ExprKind::Name { name, .. } = &node.kind {
            if let Some(symbol) = self.imported_symbol(SymbolKind::Function, name) {
                let alias = Expr::name(name.as_str(), node.line);
                node = Expr::new(
                    ExprKind::MethodCall {
                        node: Box::new(symbol.node.clone().unwrap_or(alias)),
                        method: symbol.name.clone(),
                        arguments: Vec::new(),
                        is_defined_test: false,
                    },
                    node.line,
                );
            }
        }

        match &mut node.kind {
            ExprKind::Name { is_defined_test, .. }
            | ExprKind::GetAttr { is_defined_test, .. }
            | ExprKind::BlockReference { is_defined_test, .. }
            | ExprKind::MethodCall { is_defined_test, .. } => *is_defined_test = true,
            ExprKind::Function {
                name,
                is_defined_test,
                ..
            } if name == "constant" => *is_defined_test = true,
            ExprKind::Constant(_) | ExprKind::Array(_) => {
                return Ok(Expr::constant(Value::Bool(true), node.line));
            }
            _ => {
                return Err(self.error(
                    SyntaxErrorKind::InvalidConstruct,
                    "The \"defined\" test only works with simple variables",
                    line,
                ))
            }
        }
        Ok(node)
    }

    fn warn_deprecated(&self, kind: &str, name: &str, deprecation: Option<&Deprecation>, line: usize) {
        let Some(deprecation) = deprecation else {
            return;
        };
        let mut message = format!("Twig {kind} \"{name}\" is deprecated");
        if let Some(since) = &deprecation.since {
            message.push_str(&format!(" since version {since}"));
        }
        if let Some(alternative) = &deprecation.alternative {
            message.push_str(&format!(". Use \"{alternative}\" instead"));
        }
        warn!(template = self.source().display_name(), line = line; "{message}");
    }

    // =========================================================================
    // Assignment targets
    // =========================================================================

    /// Comma-separated variable names for `set`, `for` and `with`.
    pub fn parse_assignment_expression(&mut self) -> Result<Vec<String>, SyntaxError> {
        let mut targets = Vec::new();
        loop {
            let token = self.stream.current().clone();
            let name = match &token.kind {
                TokenKind::Operator(symbol) if starts_like_name(symbol) => {
                    self.stream.next()?;
                    symbol.clone()
                }
                _ => {
                    let token = self.stream.expect(
                        |t| t.name().is_some(),
                        "\"name\"",
                        Some("Only variables can be assigned to"),
                    )?;
                    token.name().unwrap_or_default().to_string()
                }
            };
            if matches!(
                name.to_ascii_lowercase().as_str(),
                "true" | "false" | "none" | "null"
            ) {
                return Err(self.error(
                    SyntaxErrorKind::InvalidConstruct,
                    format!("You cannot assign a value to \"{name}\""),
                    token.line(),
                ));
            }
            targets.push(name);

            if self.stream.next_if_punct(',').is_none() {
                return Ok(targets);
            }
        }
    }

    /// Comma-separated expressions, the right-hand side of `set a, b = x, y`.
    pub fn parse_multitarget_expression(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut targets = Vec::new();
        loop {
            targets.push(self.parse_expression()?);
            if self.stream.next_if_punct(',').is_none() {
                return Ok(targets);
            }
        }
    }
}
