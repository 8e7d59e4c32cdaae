//! Statement parser for Twig templates.
//!
//! Walks the token stream, copying text through, turning `{{ }}` into
//! print nodes and dispatching `{% %}` tags to the tag parsers registered
//! on the [`Environment`]. Carries the state tags share while they recurse
//! into [`Parser::subparse`]: block definitions, the block nesting stack,
//! macros, the extends target and the imported-symbol scopes.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use latteify_lexer::{Source, SyntaxError, SyntaxErrorKind, TokenKind, TokenStream};
use log::trace;

use crate::ast::{BlockNode, Expr, MacroNode, ModuleNode, Node, NodeKind, SetValue};
use crate::environment::Environment;

/// The end tags a [`Parser::subparse`] call stops at, plus the opening tag
/// for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct EndTags<'a> {
    pub tag: &'a str,
    pub line: usize,
    pub names: &'a [&'a str],
}

/// Namespace of an imported symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A macro imported by name with `from`.
    Function,
    /// A template alias introduced by `import ... as`.
    Template,
}

/// Where an imported alias points.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSymbol {
    pub name: String,
    pub node: Option<Expr>,
}

#[derive(Debug, Default)]
struct ParserState {
    blocks: IndexMap<String, BlockNode>,
    block_stack: Vec<String>,
    macros: IndexMap<String, MacroNode>,
    parent: Option<Expr>,
    has_traits: bool,
    /// Innermost scope last; the bottom entry is the template scope.
    imported_symbols: Vec<HashMap<(SymbolKind, String), ImportedSymbol>>,
}

impl ParserState {
    fn new() -> Self {
        Self {
            imported_symbols: vec![HashMap::new()],
            ..Self::default()
        }
    }
}

/// Twig statement parser.
pub struct Parser<'env> {
    pub(crate) env: &'env Environment,
    pub(crate) stream: TokenStream,
    state: ParserState,
    var_counter: usize,
}

impl<'env> Parser<'env> {
    /// Create a new parser over `stream`.
    pub fn new(env: &'env Environment, stream: TokenStream) -> Self {
        Self {
            env,
            stream,
            state: ParserState::new(),
            var_counter: 0,
        }
    }

    /// Parse a token stream into a module.
    pub fn parse(env: &'env Environment, stream: TokenStream) -> Result<ModuleNode, SyntaxError> {
        let mut parser = Parser::new(env, stream);
        parser.parse_module()
    }

    fn parse_module(&mut self) -> Result<ModuleNode, SyntaxError> {
        let body = self.subparse(None, false)?;
        self.finish_module(body)
    }

    fn finish_module(&mut self, body: Vec<Node>) -> Result<ModuleNode, SyntaxError> {
        if self.state.parent.is_some() {
            self.check_child_body(&body, false)?;
        }
        if !self.state.block_stack.is_empty() || self.state.imported_symbols.len() != 1 {
            return Err(self.error(
                SyntaxErrorKind::Internal,
                "Unbalanced block or scope stack at end of template",
                self.stream.current().line(),
            ));
        }

        let mut module = ModuleNode::new(Arc::clone(self.stream.source()));
        module.body = body;
        module.blocks = std::mem::take(&mut self.state.blocks);
        module.macros = std::mem::take(&mut self.state.macros);
        module.parent = self.state.parent.take();
        Ok(module)
    }

    /// Parse an `embed` body as a template of its own whose parent is
    /// `parent`. The enclosing template's state is restored afterwards.
    pub fn parse_embedded(&mut self, parent: Expr, end: EndTags<'_>) -> Result<ModuleNode, SyntaxError> {
        let outer = std::mem::replace(&mut self.state, ParserState::new());
        self.state.parent = Some(parent);
        let module = self
            .subparse(Some(end), true)
            .and_then(|body| self.finish_module(body));
        self.state = outer;
        module
    }

    // =========================================================================
    // Body parsing
    // =========================================================================

    /// Parse statements until one of `end`'s tag names (or the end of the
    /// template when `end` is `None`). With `drop_needle` the end tag name
    /// is consumed; the caller still expects the closing `%}`.
    pub fn subparse(&mut self, end: Option<EndTags<'_>>, drop_needle: bool) -> Result<Vec<Node>, SyntaxError> {
        let mut body = Vec::new();

        loop {
            let token = self.stream.current().clone();
            let line = token.line();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Text(text) => {
                    self.stream.next()?;
                    body.push(Node::new(NodeKind::Text(text), line));
                }
                TokenKind::Comment(text) => {
                    self.stream.next()?;
                    body.push(Node::new(NodeKind::Comment(text), line));
                }
                TokenKind::Verbatim(text) => {
                    self.stream.next()?;
                    body.push(Node::new(NodeKind::Verbatim(text), line));
                }
                TokenKind::VarStart => {
                    self.stream.next()?;
                    let expr = self.parse_expression()?;
                    self.stream.expect_var_end()?;
                    body.push(Node::new(NodeKind::Print(expr), line));
                }
                TokenKind::BlockStart => {
                    self.stream.next()?;
                    let tag_token = self.stream.current().clone();
                    let Some(name) = tag_token.name().map(str::to_string) else {
                        return Err(self.error(
                            SyntaxErrorKind::UnexpectedToken,
                            "A block must start with a tag name",
                            tag_token.line(),
                        ));
                    };

                    if let Some(end) = end {
                        if end.names.contains(&name.as_str()) {
                            if drop_needle {
                                self.stream.next()?;
                            }
                            return Ok(body);
                        }
                    }

                    let env = self.env;
                    let Some(tag) = env.tag(&name) else {
                        return Err(self.unknown_tag(&name, tag_token.line(), end));
                    };
                    self.stream.next()?;
                    trace!("Parsing \"{}\" tag at line {}", name, tag_token.line());
                    if let Some(node) = tag.parse(self, &tag_token)? {
                        body.push(node);
                    }
                }
                _ => {
                    return Err(self.error(
                        SyntaxErrorKind::UnexpectedToken,
                        format!("Unexpected token {}", token.kind),
                        line,
                    ))
                }
            }
        }

        if let Some(end) = end {
            return Err(self.error(
                SyntaxErrorKind::UnexpectedEnd,
                format!(
                    "Unexpected end of template (expecting closing tag for the \"{}\" tag defined near line {})",
                    end.tag, end.line
                ),
                self.stream.current().line(),
            ));
        }
        Ok(body)
    }

    fn unknown_tag(&self, name: &str, line: usize, end: Option<EndTags<'_>>) -> SyntaxError {
        match end {
            Some(end) => self.error(
                SyntaxErrorKind::UnknownTag,
                format!(
                    "Unexpected \"{name}\" tag (expecting closing tag for the \"{}\" tag defined near line {})",
                    end.tag, end.line
                ),
                line,
            ),
            None => self
                .error(SyntaxErrorKind::UnknownTag, format!("Unknown \"{name}\" tag"), line)
                .with_suggestions(name, self.env.tag_names()),
        }
    }

    /// A child template may only hold whitespace, captures and block
    /// definitions at the top level.
    fn check_child_body(&self, nodes: &[Node], nested: bool) -> Result<(), SyntaxError> {
        for node in nodes {
            match &node.kind {
                NodeKind::Text(text) if !text.chars().all(char::is_whitespace) => {
                    return Err(self.error(
                        SyntaxErrorKind::InvalidConstruct,
                        "A template that extends another one cannot include content outside Twig blocks. Did you forget to put the content inside a {% block %} tag?",
                        node.line,
                    ));
                }
                NodeKind::BlockReference(_) if nested => {
                    return Err(self.error(
                        SyntaxErrorKind::InvalidConstruct,
                        "A block definition cannot be nested under non-capturing nodes",
                        node.line,
                    ));
                }
                NodeKind::Set {
                    value: SetValue::Capture(_),
                    ..
                }
                | NodeKind::Apply { .. } => {}
                NodeKind::For { body, else_body, .. } => {
                    self.check_child_body(body, true)?;
                    if let Some(else_body) = else_body {
                        self.check_child_body(else_body, true)?;
                    }
                }
                NodeKind::If { branches, else_body } => {
                    for (_, body) in branches {
                        self.check_child_body(body, true)?;
                    }
                    if let Some(else_body) = else_body {
                        self.check_child_body(else_body, true)?;
                    }
                }
                NodeKind::With { body, .. }
                | NodeKind::AutoEscape { body, .. }
                | NodeKind::Cache { body, .. }
                | NodeKind::Sandbox(body) => self.check_child_body(body, true)?,
                _ => {}
            }
        }
        Ok(())
    }

    // =========================================================================
    // Shared state for tag parsers
    // =========================================================================

    pub fn env(&self) -> &'env Environment {
        self.env
    }

    pub fn stream(&mut self) -> &mut TokenStream {
        &mut self.stream
    }

    pub fn source(&self) -> &Arc<Source> {
        self.stream.source()
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.state.blocks.contains_key(name)
    }

    pub fn block_line(&self, name: &str) -> Option<usize> {
        self.state.blocks.get(name).map(|b| b.line)
    }

    /// Register or replace a block; a replaced block keeps its position.
    pub fn set_block(&mut self, block: BlockNode) {
        self.state.blocks.insert(block.name.clone(), block);
    }

    pub fn push_block_stack(&mut self, name: &str) {
        self.state.block_stack.push(name.to_string());
    }

    pub fn pop_block_stack(&mut self) {
        self.state.block_stack.pop();
    }

    pub fn peek_block_stack(&self) -> Option<&str> {
        self.state.block_stack.last().map(String::as_str)
    }

    pub fn set_macro(&mut self, node: MacroNode) {
        self.state.macros.insert(node.name.clone(), node);
    }

    pub fn parent(&self) -> Option<&Expr> {
        self.state.parent.as_ref()
    }

    pub fn set_parent(&mut self, parent: Expr) {
        self.state.parent = Some(parent);
    }

    pub fn has_traits(&self) -> bool {
        self.state.has_traits
    }

    pub fn add_trait(&mut self) {
        self.state.has_traits = true;
    }

    /// True outside of macros and blocks.
    pub fn is_main_scope(&self) -> bool {
        self.state.imported_symbols.len() == 1
    }

    pub fn push_local_scope(&mut self) {
        self.state.imported_symbols.push(HashMap::new());
    }

    pub fn pop_local_scope(&mut self) {
        if self.state.imported_symbols.len() > 1 {
            self.state.imported_symbols.pop();
        }
    }

    /// Register `alias` in the innermost scope.
    pub fn add_imported_symbol(&mut self, kind: SymbolKind, alias: &str, name: Option<&str>, node: Option<Expr>) {
        let symbol = ImportedSymbol {
            name: name.unwrap_or(alias).to_string(),
            node,
        };
        if let Some(scope) = self.state.imported_symbols.last_mut() {
            scope.insert((kind, alias.to_string()), symbol);
        }
    }

    /// Resolve `alias`, innermost scope first.
    pub fn imported_symbol(&self, kind: SymbolKind, alias: &str) -> Option<&ImportedSymbol> {
        let key = (kind, alias.to_string());
        self.state
            .imported_symbols
            .iter()
            .rev()
            .find_map(|scope| scope.get(&key))
    }

    /// A fresh variable name for synthesized assignments.
    pub fn var_name(&mut self) -> String {
        let name = format!("__internal_{}", self.var_counter);
        self.var_counter += 1;
        name
    }

    pub fn error(&self, kind: SyntaxErrorKind, message: impl Into<String>, line: usize) -> SyntaxError {
        SyntaxError::new(kind, message, line, self.stream.source())
    }
}
