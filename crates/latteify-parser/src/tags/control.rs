//! Control-flow and region tags: `if`, `for`, `set`, `with`, `apply`,
//! `autoescape`, `sandbox`, `cache`, `do`, `flush`, `deprecated`.

use latteify_lexer::{SyntaxError, SyntaxErrorKind, Token, TokenKind};
use log::warn;

use super::TagParser;
use crate::ast::{Expr, ExprKind, Node, NodeKind, SetValue, Value};
use crate::parser::{EndTags, Parser};

fn block_end(token: &Token) -> bool {
    token.kind == TokenKind::BlockEnd
}

/// Parse `%}body{% <end> %}` for tags whose body runs to a single end tag.
fn parse_region(parser: &mut Parser<'_>, tag: &str, line: usize, end: &str) -> Result<Vec<Node>, SyntaxError> {
    parser.stream().expect_block_end()?;
    let body = parser.subparse(
        Some(EndTags {
            tag,
            line,
            names: &[end],
        }),
        true,
    )?;
    parser.stream().expect_block_end()?;
    Ok(body)
}

// ---------------------------------------------------------------------------
// if / for
// ---------------------------------------------------------------------------

pub struct IfTag;

impl TagParser for IfTag {
    fn tag(&self) -> &'static str {
        "if"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let fork = EndTags {
            tag: "if",
            line,
            names: &["elseif", "else", "endif"],
        };

        let test = parser.parse_expression()?;
        parser.stream().expect_block_end()?;
        let body = parser.subparse(Some(fork), false)?;
        let mut branches = vec![(test, body)];
        let mut else_body = None;

        loop {
            let end = parser.stream().next()?;
            match end.name() {
                Some("else") => {
                    parser.stream().expect_block_end()?;
                    let end_only = EndTags {
                        names: &["endif"],
                        ..fork
                    };
                    else_body = Some(parser.subparse(Some(end_only), false)?);
                }
                Some("elseif") => {
                    let test = parser.parse_expression()?;
                    parser.stream().expect_block_end()?;
                    let body = parser.subparse(Some(fork), false)?;
                    branches.push((test, body));
                }
                Some("endif") => break,
                _ => {
                    return Err(parser.error(
                        SyntaxErrorKind::UnexpectedToken,
                        format!(
                            "Unexpected end of template. Twig was looking for the following tags \"else\", \"elseif\", or \"endif\" to close the \"if\" block started at line {line}"
                        ),
                        end.line(),
                    ))
                }
            }
        }
        parser.stream().expect_block_end()?;

        Ok(Some(Node::new(NodeKind::If { branches, else_body }, line)))
    }
}

pub struct ForTag;

impl TagParser for ForTag {
    fn tag(&self) -> &'static str {
        "for"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let targets = parser.parse_assignment_expression()?;
        parser.stream().expect_operator("in")?;
        let sequence = parser.parse_expression()?;
        parser.stream().expect_block_end()?;

        let fork = EndTags {
            tag: "for",
            line,
            names: &["else", "endfor"],
        };
        let body = parser.subparse(Some(fork), false)?;
        let else_body = if parser.stream().next()?.is_name("else") {
            parser.stream().expect_block_end()?;
            let end = EndTags {
                names: &["endfor"],
                ..fork
            };
            Some(parser.subparse(Some(end), true)?)
        } else {
            None
        };
        parser.stream().expect_block_end()?;

        let mut targets = targets.into_iter();
        let (key, value) = match (targets.next(), targets.next()) {
            (Some(key), Some(value)) => (Some(key), value),
            (Some(value), None) => (None, value),
            _ => {
                return Err(parser.error(
                    SyntaxErrorKind::Internal,
                    "A for loop needs at least one target",
                    line,
                ))
            }
        };

        Ok(Some(Node::new(
            NodeKind::For {
                key,
                value,
                sequence,
                body,
                else_body,
                with_loop: true,
            },
            line,
        )))
    }
}

// ---------------------------------------------------------------------------
// Assignment and scoping
// ---------------------------------------------------------------------------

pub struct SetTag;

impl TagParser for SetTag {
    fn tag(&self) -> &'static str {
        "set"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let names = parser.parse_assignment_expression()?;

        let value = if parser.stream().next_if_operator("=").is_some() {
            let values = parser.parse_multitarget_expression()?;
            parser.stream().expect_block_end()?;
            if names.len() != values.len() {
                let line = parser.stream().current().line();
                return Err(parser.error(
                    SyntaxErrorKind::InvalidConstruct,
                    "When using set, you must have the same number of variables and assignments",
                    line,
                ));
            }
            SetValue::Exprs(values)
        } else {
            if names.len() > 1 {
                let line = parser.stream().current().line();
                return Err(parser.error(
                    SyntaxErrorKind::InvalidConstruct,
                    "When using set with a block, you cannot have a multi-target",
                    line,
                ));
            }
            SetValue::Capture(parse_region(parser, "set", line, "endset")?)
        };

        Ok(Some(Node::new(NodeKind::Set { names, value }, line)))
    }
}

pub struct WithTag;

impl TagParser for WithTag {
    fn tag(&self) -> &'static str {
        "with"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let mut variables = None;
        let mut only = false;
        if !block_end(parser.stream().current()) {
            variables = Some(parser.parse_expression()?);
            only = parser.stream().next_if_name("only").is_some();
        }
        let body = parse_region(parser, "with", line, "endwith")?;

        Ok(Some(Node::new(NodeKind::With { variables, only, body }, line)))
    }
}

// ---------------------------------------------------------------------------
// Output regions
// ---------------------------------------------------------------------------

pub struct ApplyTag;

impl TagParser for ApplyTag {
    fn tag(&self) -> &'static str {
        "apply"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let filter = parser.parse_filter_chain(Expr::new(ExprKind::ApplyTarget, line))?;
        let body = parse_region(parser, "apply", line, "endapply")?;

        Ok(Some(Node::new(NodeKind::Apply { filter, body }, line)))
    }
}

pub struct AutoEscapeTag;

impl TagParser for AutoEscapeTag {
    fn tag(&self) -> &'static str {
        "autoescape"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let strategy = if block_end(parser.stream().current()) {
            Some("html".to_string())
        } else {
            let expr = parser.parse_expression()?;
            match expr.kind {
                ExprKind::Constant(Value::String(strategy)) => Some(strategy),
                ExprKind::Constant(Value::Bool(false)) => None,
                _ => {
                    let line = parser.stream().current().line();
                    return Err(parser.error(
                        SyntaxErrorKind::InvalidConstruct,
                        "An escaping strategy must be a string or false",
                        line,
                    ))
                }
            }
        };
        let body = parse_region(parser, "autoescape", line, "endautoescape")?;

        Ok(Some(Node::new(NodeKind::AutoEscape { strategy, body }, line)))
    }
}

pub struct SandboxTag;

impl TagParser for SandboxTag {
    fn tag(&self) -> &'static str {
        "sandbox"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let mut body = parse_region(parser, "sandbox", line, "endsandbox")?;

        for node in &mut body {
            match &mut node.kind {
                NodeKind::Text(text) if text.chars().all(char::is_whitespace) => {}
                NodeKind::Include(args) => args.sandboxed = true,
                _ => {
                    return Err(parser.error(
                        SyntaxErrorKind::InvalidConstruct,
                        "Only \"include\" tags are allowed within a \"sandbox\" section",
                        node.line,
                    ))
                }
            }
        }

        Ok(Some(Node::new(NodeKind::Sandbox(body), line)))
    }
}

pub struct CacheTag;

impl TagParser for CacheTag {
    fn tag(&self) -> &'static str {
        "cache"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let key = parser.parse_expression()?;
        let mut ttl = None;
        let mut tags = None;

        while let Some(modifier) = parser.stream().current().name().map(str::to_string) {
            parser.stream().next()?;
            let arguments = parser.parse_arguments(false, false)?;
            let slot = match modifier.as_str() {
                "ttl" => &mut ttl,
                "tags" => &mut tags,
                _ => {
                    let line = parser.stream().current().line();
                    return Err(parser.error(
                        SyntaxErrorKind::InvalidConstruct,
                        format!("Unknown \"{modifier}\" configuration"),
                        line,
                    ))
                }
            };
            let count = arguments.len();
            let mut arguments = arguments.into_iter();
            match (arguments.next(), count) {
                (Some(argument), 1) => *slot = Some(argument.value),
                _ => {
                    let line = parser.stream().current().line();
                    return Err(parser.error(
                        SyntaxErrorKind::InvalidArguments,
                        format!("The \"{modifier}\" modifier takes exactly one argument ({count} given)"),
                        line,
                    ))
                }
            }
        }
        let body = parse_region(parser, "cache", line, "endcache")?;

        Ok(Some(Node::new(NodeKind::Cache { key, ttl, tags, body }, line)))
    }
}

// ---------------------------------------------------------------------------
// Single statements
// ---------------------------------------------------------------------------

pub struct DoTag;

impl TagParser for DoTag {
    fn tag(&self) -> &'static str {
        "do"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let expr = parser.parse_expression()?;
        parser.stream().expect_block_end()?;
        Ok(Some(Node::new(NodeKind::Do(expr), token.line())))
    }
}

pub struct FlushTag;

impl TagParser for FlushTag {
    fn tag(&self) -> &'static str {
        "flush"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        parser.stream().expect_block_end()?;
        Ok(Some(Node::new(NodeKind::Flush, token.line())))
    }
}

pub struct DeprecatedTag;

impl TagParser for DeprecatedTag {
    fn tag(&self) -> &'static str {
        "deprecated"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let expr = parser.parse_expression()?;
        parser.stream().expect_block_end()?;
        if let Some(message) = expr.as_constant().and_then(Value::as_str) {
            warn!(
                template = parser.source().display_name(),
                line = token.line();
                "Deprecated template: {message}"
            );
        }
        Ok(Some(Node::new(NodeKind::Deprecated(expr), token.line())))
    }
}
