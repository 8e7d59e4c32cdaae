//! Syntax diagnostics shared by every stage of the converter.

use std::sync::Arc;

use crate::source::Source;

/// Classification of a [`SyntaxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxErrorKind {
    UnterminatedTag,
    UnterminatedString,
    UnexpectedCharacter,
    UnexpectedToken,
    UnexpectedEnd,
    UnknownTag,
    UnknownFilter,
    UnknownFunction,
    UnknownTest,
    DuplicateBlock,
    InvalidArguments,
    InvalidConstruct,
    Unsupported,
    /// Broken parser or compiler invariant; never caused by template content alone.
    Internal,
}

/// A fatal template error with its line, originating source and optional
/// "did you mean" suggestions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}{hint} in \"{name}\" at line {line}.", hint = suggestion_hint(.suggestions), name = .template.display_name())]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub line: usize,
    pub template: Arc<Source>,
    pub suggestions: Vec<String>,
}

impl SyntaxError {
    pub fn new(
        kind: SyntaxErrorKind,
        message: impl Into<String>,
        line: usize,
        template: &Arc<Source>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            template: Arc::clone(template),
            suggestions: Vec::new(),
        }
    }

    /// Rank `candidates` against `name` and keep the close ones.
    pub fn with_suggestions<'a, I>(mut self, name: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.suggestions = suggest(name, candidates);
        self
    }
}

/// Candidates within `ceil(len / 3)` edits of `name`, or containing it,
/// ordered by edit distance.
pub fn suggest<'a, I>(name: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let threshold = name.chars().count().div_ceil(3);
    let mut ranked: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = strsim::levenshtein(name, candidate);
            (distance <= threshold || candidate.contains(name)).then_some((distance, candidate))
        })
        .collect();
    // Stable sort keeps registration order between equal distances.
    ranked.sort_by_key(|(distance, _)| *distance);
    ranked.into_iter().map(|(_, c)| c.to_string()).collect()
}

fn suggestion_hint(suggestions: &[String]) -> String {
    match suggestions {
        [] => String::new(),
        [only] => format!(". Did you mean \"{only}\"?"),
        [init @ .., last] => {
            let init: Vec<String> = init.iter().map(|s| format!("\"{s}\"")).collect();
            format!(". Did you mean {}, or \"{last}\"?", init.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source() -> Arc<Source> {
        Arc::new(Source::new("", "index.twig"))
    }

    #[test]
    fn test_display_without_suggestions() {
        let err = SyntaxError::new(SyntaxErrorKind::UnknownTag, "Unknown \"foo\" tag", 3, &source());
        assert_eq!(err.to_string(), "Unknown \"foo\" tag in \"index.twig\" at line 3.");
    }

    #[test]
    fn test_display_with_single_suggestion() {
        let err = SyntaxError::new(SyntaxErrorKind::UnknownFilter, "Unknown \"uper\" filter", 1, &source())
            .with_suggestions("uper", ["upper", "lower", "trim"]);
        assert_eq!(err.suggestions, vec!["upper".to_string()]);
        assert_eq!(
            err.to_string(),
            "Unknown \"uper\" filter. Did you mean \"upper\"? in \"index.twig\" at line 1."
        );
    }

    #[test]
    fn test_display_with_many_suggestions() {
        let err = SyntaxError::new(SyntaxErrorKind::UnknownTag, "Unknown \"en\" tag", 1, &source())
            .with_suggestions("en", ["endif", "endfor"]);
        assert_eq!(
            err.to_string(),
            "Unknown \"en\" tag. Did you mean \"endif\", or \"endfor\"? in \"index.twig\" at line 1."
        );
    }

    #[test]
    fn test_suggest_substring_match() {
        assert_eq!(suggest("foo", ["foobar", "bar"]), vec!["foobar".to_string()]);
    }

    #[test]
    fn test_suggest_orders_by_distance() {
        assert_eq!(
            suggest("blok", ["block", "bloks", "if"]),
            vec!["block".to_string(), "bloks".to_string()]
        );
    }

    #[test]
    fn test_suggest_rejects_distant_names() {
        assert!(suggest("include", ["for", "set", "if"]).is_empty());
    }
}
