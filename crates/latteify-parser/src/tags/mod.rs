//! Tag parsers, one per `{% tag %}` keyword.
//!
//! Each parser is called with the stream positioned just after the tag
//! name and must consume everything up to and including the closing
//! `%}` of its end tag. Block-structured tags recurse into
//! [`Parser::subparse`].

mod control;
mod template;

use latteify_lexer::{SyntaxError, Token};

use crate::ast::{Expr, IncludeArgs, Node};
use crate::environment::EnvironmentBuilder;
use crate::parser::Parser;

pub use control::{
    ApplyTag, AutoEscapeTag, CacheTag, DeprecatedTag, DoTag, FlushTag, ForTag, IfTag, SandboxTag, SetTag, WithTag,
};
pub use template::{BlockTag, EmbedTag, ExtendsTag, FromTag, ImportTag, IncludeTag, MacroTag, UseTag};

/// Parser for one tag keyword.
pub trait TagParser: Send + Sync {
    /// The keyword that opens this tag.
    fn tag(&self) -> &'static str;

    /// Parse the tag. `token` is the tag name token. Tags that only
    /// register state on the parser (`macro`) return `None`.
    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>, SyntaxError>;
}

/// Register every core tag.
pub(crate) fn register(builder: EnvironmentBuilder) -> EnvironmentBuilder {
    let tags: [Box<dyn TagParser>; 19] = [
        Box::new(ApplyTag),
        Box::new(AutoEscapeTag),
        Box::new(BlockTag),
        Box::new(CacheTag),
        Box::new(DeprecatedTag),
        Box::new(DoTag),
        Box::new(EmbedTag),
        Box::new(ExtendsTag),
        Box::new(FlushTag),
        Box::new(ForTag),
        Box::new(FromTag),
        Box::new(IfTag),
        Box::new(ImportTag),
        Box::new(IncludeTag),
        Box::new(MacroTag),
        Box::new(SandboxTag),
        Box::new(SetTag),
        Box::new(UseTag),
        Box::new(WithTag),
    ];
    tags.into_iter().fold(builder, EnvironmentBuilder::tag)
}

/// `[ignore missing] [with expr] [only] %}` shared by `include` and `embed`.
pub(crate) fn parse_include_arguments(parser: &mut Parser<'_>, template: Expr) -> Result<IncludeArgs, SyntaxError> {
    let mut ignore_missing = false;
    if parser.stream().next_if_name("ignore").is_some() {
        parser.stream().expect_name_value("missing")?;
        ignore_missing = true;
    }

    let mut variables = None;
    if parser.stream().next_if_name("with").is_some() {
        variables = Some(parser.parse_expression()?);
    }

    let only = parser.stream().next_if_name("only").is_some();
    parser.stream().expect_block_end()?;

    Ok(IncludeArgs {
        template,
        variables,
        only,
        ignore_missing,
        sandboxed: false,
    })
}
