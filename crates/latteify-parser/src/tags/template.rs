//! Template structure tags: `block`, `extends`, `macro`, `include`,
//! `embed`, `import`, `from`, `use`.

use latteify_lexer::{SyntaxError, SyntaxErrorKind, Token, TokenKind};

use super::{parse_include_arguments, TagParser};
use crate::ast::{BlockNode, Expr, ExprKind, MacroNode, Node, NodeKind};
use crate::parser::{EndTags, Parser, SymbolKind};

/// `name [as alias], ...`
fn parse_aliases(parser: &mut Parser<'_>) -> Result<Vec<(String, String)>, SyntaxError> {
    let mut targets = Vec::new();
    loop {
        let name = parser.stream().expect_name()?;
        let alias = match parser.stream().next_if_name("as") {
            Some(_) => parser.stream().expect_name()?,
            None => name.clone(),
        };
        targets.push((name, alias));
        if parser.stream().next_if_punct(',').is_none() {
            return Ok(targets);
        }
    }
}

/// Consume an optional repeated name after `end<tag>` and check it.
fn check_end_name(parser: &mut Parser<'_>, kind: &str, name: &str) -> Result<(), SyntaxError> {
    let Some(token) = parser.stream().next_if(|t| t.name().is_some()) else {
        return Ok(());
    };
    let given = token.name().unwrap_or_default();
    if given != name {
        let line = parser.stream().current().line();
        return Err(parser.error(
            SyntaxErrorKind::InvalidConstruct,
            format!("Expected end{kind} for {kind} \"{name}\" (but \"{given}\" given)"),
            line,
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Blocks and inheritance
// ---------------------------------------------------------------------------

pub struct BlockTag;

impl TagParser for BlockTag {
    fn tag(&self) -> &'static str {
        "block"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let name = parser.stream().expect_name()?;
        if let Some(defined) = parser.block_line(&name) {
            let line = parser.stream().current().line();
            return Err(parser.error(
                SyntaxErrorKind::DuplicateBlock,
                format!("The block '{name}' has already been defined line {defined}"),
                line,
            ));
        }

        // Registered before the body so a nested redefinition is caught.
        parser.set_block(BlockNode {
            name: name.clone(),
            body: Vec::new(),
            line,
        });
        parser.push_local_scope();
        parser.push_block_stack(&name);

        let body = if parser.stream().next_if(|t| t.kind == TokenKind::BlockEnd).is_some() {
            let end = EndTags {
                tag: "block",
                line,
                names: &["endblock"],
            };
            let body = parser.subparse(Some(end), true)?;
            check_end_name(parser, "block", &name)?;
            body
        } else {
            vec![Node::new(NodeKind::Print(parser.parse_expression()?), line)]
        };
        parser.stream().expect_block_end()?;

        parser.set_block(BlockNode {
            name: name.clone(),
            body,
            line,
        });
        parser.pop_block_stack();
        parser.pop_local_scope();

        Ok(Some(Node::new(NodeKind::BlockReference(name), line)))
    }
}

pub struct ExtendsTag;

impl TagParser for ExtendsTag {
    fn tag(&self) -> &'static str {
        "extends"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let misuse = if parser.peek_block_stack().is_some() {
            Some("Cannot use \"extend\" in a block")
        } else if !parser.is_main_scope() {
            Some("Cannot use \"extend\" in a macro")
        } else if parser.parent().is_some() {
            Some("Multiple extends tags are forbidden")
        } else {
            None
        };
        if let Some(message) = misuse {
            return Err(parser.error(SyntaxErrorKind::InvalidConstruct, message, line));
        }

        let parent = parser.parse_expression()?;
        parser.stream().expect_block_end()?;
        parser.set_parent(parent.clone());

        Ok(Some(Node::new(NodeKind::Extends(parent), line)))
    }
}

pub struct UseTag;

impl TagParser for UseTag {
    fn tag(&self) -> &'static str {
        "use"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let template = parser.parse_expression()?;
        if !matches!(template.kind, ExprKind::Constant(_)) {
            return Err(parser.error(
                SyntaxErrorKind::InvalidConstruct,
                "The template references in a \"use\" statement must be a string",
                line,
            ));
        }

        let targets = if parser.stream().next_if_name("with").is_some() {
            parse_aliases(parser)?
        } else {
            Vec::new()
        };
        parser.stream().expect_block_end()?;
        parser.add_trait();

        Ok(Some(Node::new(NodeKind::Use { template, targets }, line)))
    }
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

pub struct MacroTag;

impl TagParser for MacroTag {
    fn tag(&self) -> &'static str {
        "macro"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let name = parser.stream().expect_name()?;
        let arguments = parser.parse_macro_arguments()?;
        parser.stream().expect_block_end()?;

        parser.push_local_scope();
        let end = EndTags {
            tag: "macro",
            line,
            names: &["endmacro"],
        };
        let body = parser.subparse(Some(end), true)?;
        check_end_name(parser, "macro", &name)?;
        parser.pop_local_scope();
        parser.stream().expect_block_end()?;

        parser.set_macro(MacroNode {
            name,
            arguments,
            body,
            line,
        });
        Ok(None)
    }
}

pub struct ImportTag;

impl TagParser for ImportTag {
    fn tag(&self) -> &'static str {
        "import"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let template = parser.parse_expression()?;
        parser.stream().expect_name_value("as")?;
        let alias = parser.stream().expect_name()?;
        parser.stream().expect_block_end()?;
        parser.add_imported_symbol(SymbolKind::Template, &alias, None, None);

        Ok(Some(Node::new(NodeKind::Import { template, alias }, token.line())))
    }
}

pub struct FromTag;

impl TagParser for FromTag {
    fn tag(&self) -> &'static str {
        "from"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let template = parser.parse_expression()?;
        parser.stream().expect_name_value("import")?;
        let targets = parse_aliases(parser)?;
        parser.stream().expect_block_end()?;

        let var = parser.var_name();
        for (name, alias) in &targets {
            parser.add_imported_symbol(
                SymbolKind::Function,
                alias,
                Some(name),
                Some(Expr::name(var.as_str(), line)),
            );
        }

        Ok(Some(Node::new(NodeKind::Import { template, alias: var }, line)))
    }
}

// ---------------------------------------------------------------------------
// Inclusion
// ---------------------------------------------------------------------------

pub struct IncludeTag;

impl TagParser for IncludeTag {
    fn tag(&self) -> &'static str {
        "include"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let template = parser.parse_expression()?;
        let args = parse_include_arguments(parser, template)?;
        Ok(Some(Node::new(NodeKind::Include(args), token.line())))
    }
}

pub struct EmbedTag;

impl TagParser for EmbedTag {
    fn tag(&self) -> &'static str {
        "embed"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line();
        let parent = parser.parse_expression()?;
        let args = parse_include_arguments(parser, parent.clone())?;

        let end = EndTags {
            tag: "embed",
            line,
            names: &["endembed"],
        };
        let module = parser.parse_embedded(parent, end)?;
        parser.stream().expect_block_end()?;

        Ok(Some(Node::new(
            NodeKind::Embed {
                args,
                module: Box::new(module),
            },
            line,
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ast::{IncludeArgs, ModuleNode, Value};
    use crate::environment::Environment;
    use latteify_lexer::Source;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> Result<ModuleNode, SyntaxError> {
        Environment::default().parse(Arc::new(Source::new(code, "tags.twig")))
    }

    // =========================================================================
    // include
    // =========================================================================

    #[test]
    fn test_include_all_options() {
        let module = parse("{% include 'a.twig' ignore missing with {x: 1} only %}").unwrap();
        let NodeKind::Include(args) = &module.body[0].kind else {
            panic!("expected include");
        };
        assert_eq!(args.template, Expr::string("a.twig", 1));
        assert!(args.ignore_missing);
        assert!(args.only);
        assert!(args.variables.is_some());
        assert!(!args.sandboxed);
    }

    #[test]
    fn test_include_plain() {
        let module = parse("{% include name %}").unwrap();
        assert_eq!(
            module.body[0].kind,
            NodeKind::Include(IncludeArgs {
                template: Expr::name("name", 1),
                variables: None,
                only: false,
                ignore_missing: false,
                sandboxed: false,
            })
        );
    }

    #[test]
    fn test_ignore_requires_missing() {
        let err = parse("{% include 'a' ignore %}").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
    }

    // =========================================================================
    // import / from / use
    // =========================================================================

    #[test]
    fn test_import_node() {
        let module = parse("{% import 'forms.twig' as forms %}").unwrap();
        assert_eq!(
            module.body[0].kind,
            NodeKind::Import {
                template: Expr::string("forms.twig", 1),
                alias: "forms".into(),
            }
        );
    }

    #[test]
    fn test_from_uses_internal_alias() {
        let module = parse("{% from 'forms.twig' import input, textarea as area %}").unwrap();
        assert_eq!(
            module.body[0].kind,
            NodeKind::Import {
                template: Expr::string("forms.twig", 1),
                alias: "__internal_0".into(),
            }
        );
    }

    #[test]
    fn test_use_with_aliases() {
        let module = parse("{% use 'blocks.twig' with sidebar as side, footer %}").unwrap();
        assert_eq!(
            module.body[0].kind,
            NodeKind::Use {
                template: Expr::string("blocks.twig", 1),
                targets: vec![
                    ("sidebar".into(), "side".into()),
                    ("footer".into(), "footer".into()),
                ],
            }
        );
    }

    #[test]
    fn test_use_requires_string() {
        let err = parse("{% use name %}").unwrap_err();
        assert_eq!(err.message, "The template references in a \"use\" statement must be a string");
    }

    #[test]
    fn test_use_allows_parent_call() {
        let module = parse("{% use 'b.twig' %}{% block a %}{{ parent() }}{% endblock %}").unwrap();
        assert_eq!(module.blocks["a"].body.len(), 1);
    }

    // =========================================================================
    // macro
    // =========================================================================

    #[test]
    fn test_macro_end_name_mismatch() {
        let err = parse("{% macro a() %}{% endmacro b %}").unwrap_err();
        assert_eq!(err.message, "Expected endmacro for macro \"a\" (but \"b\" given)");
    }

    #[test]
    fn test_macro_body_and_defaults() {
        let module = parse("{% macro row(cells = [], cls = -1) %}<tr>{% endmacro row %}").unwrap();
        let m = &module.macros["row"];
        assert_eq!(m.arguments.len(), 2);
        assert_eq!(m.arguments[0].0, "cells");
        assert_eq!(m.body, vec![Node::new(NodeKind::Text("<tr>".into()), 1)]);
    }

    // =========================================================================
    // block / embed
    // =========================================================================

    #[test]
    fn test_block_nested_redefinition() {
        let err = parse("{% block a %}{% block a %}{% endblock %}{% endblock %}").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::DuplicateBlock);
    }

    #[test]
    fn test_block_with_end_name() {
        let module = parse("{% block title %}T{% endblock title %}").unwrap();
        assert_eq!(
            module.blocks["title"],
            BlockNode {
                name: "title".into(),
                body: vec![Node::new(NodeKind::Text("T".into()), 1)],
                line: 1,
            }
        );
    }

    #[test]
    fn test_embed_with_variables() {
        let module = parse("{% embed 'card.twig' with {title: 'x'} %}{% block body %}B{% endblock %}{% endembed %}").unwrap();
        let NodeKind::Embed { args, module: embedded } = &module.body[0].kind else {
            panic!("expected embed");
        };
        assert!(args.variables.is_some());
        assert!(module.blocks.is_empty());
        assert_eq!(embedded.blocks["body"].body, vec![Node::new(NodeKind::Text("B".into()), 1)]);
    }

    #[test]
    fn test_embed_parent_call() {
        let module =
            parse("{% embed 'card.twig' %}{% block body %}{{ parent() }}{% endblock %}{% endembed %}").unwrap();
        let NodeKind::Embed { module: embedded, .. } = &module.body[0].kind else {
            panic!("expected embed");
        };
        assert_eq!(embedded.parent, Some(Expr::constant(Value::String("card.twig".into()), 1)));
    }

    #[test]
    fn test_embed_rejects_loose_text() {
        let err = parse("{% embed 'card.twig' %}text{% endembed %}").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidConstruct);
    }
}
