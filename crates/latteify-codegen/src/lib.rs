//! Latteify Code Generator
//!
//! Runs the node visitor pipeline over a parsed Twig module and renders the
//! result as a Latte template.
//!
//! ```text
//! Source → tokenize → parse → visitors → compile → post-process → Conversion
//! ```
//!
//! # Example
//!
//! ```
//! use latteify_codegen::Converter;
//!
//! let converter = Converter::default();
//! let latte = converter.convert_str("{% for item in items %}{{ item }}{% endfor %}", "list.twig").unwrap();
//! assert_eq!(latte.code, "{foreach $items as $item}{$item}{/foreach}");
//! ```

pub mod compiler;
pub mod visitor;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use latteify_lexer::{Source, SyntaxError};
use latteify_parser::Environment;
use log::{debug, info};
use regex::Regex;

pub use compiler::{compile, Compiler};
pub use visitor::{default_visitors, traverse, NodeVisitor};

/// Conversion error.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Internal error at line {line}: {message}")]
    Internal { message: String, line: usize },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A converted template.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Latte source.
    pub code: String,
    /// `(latte line, twig line)` pairs for every emitted statement.
    pub debug_info: Vec<(usize, usize)>,
}

/// Convert one Twig template to Latte.
pub fn convert(source: Arc<Source>, env: &Environment) -> Result<Conversion, CodegenError> {
    let name = source.display_name().to_string();
    let mut module = env.parse(source)?;
    debug!(
        template = name.as_str(),
        blocks = module.blocks.len(),
        macros = module.macros.len();
        "Parsed template"
    );

    for mut visitor in default_visitors(env) {
        debug!(template = name.as_str(), visitor = visitor.name(); "Running node visitor");
        traverse(visitor.as_mut(), &mut module);
    }

    let (code, debug_info) = compile(&module, env)?;
    let code = post_process(&code)?;
    info!(template = name.as_str(), bytes = code.len(); "Converted template");

    Ok(Conversion { code, debug_info })
}

/// `class="{html_classes(...)}"` becomes `n:class="..."`.
fn post_process(code: &str) -> Result<String, CodegenError> {
    static HTML_CLASSES: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

    let regex = HTML_CLASSES
        .get_or_init(|| Regex::new(r#"(?i)\bclass=(["'])\{=?html_classes\((.*)\)\}"#))
        .as_ref()
        .map_err(|err| CodegenError::Internal {
            message: format!("Invalid post-processing pattern: {err}"),
            line: 0,
        })?;
    Ok(regex.replace_all(code, "n:class=${1}${2}").into_owned())
}

/// Converts templates with one frozen [`Environment`].
#[derive(Default)]
pub struct Converter {
    env: Environment,
}

impl Converter {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Convert template `code`; `name` is used in diagnostics.
    pub fn convert_str(&self, code: &str, name: &str) -> Result<Conversion, CodegenError> {
        convert(Arc::new(Source::new(code, name)), &self.env)
    }

    /// Read and convert the template at `path`.
    pub fn convert_file(&self, path: &Path) -> Result<Conversion, CodegenError> {
        let code = std::fs::read_to_string(path).map_err(|source| CodegenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let source = Source::new(code, name).with_path(path.display().to_string());
        convert(Arc::new(source), &self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latteify_lexer::SyntaxErrorKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn latte(code: &str) -> String {
        Converter::default().convert_str(code, "test.twig").unwrap().code
    }

    fn error(code: &str) -> SyntaxError {
        match Converter::default().convert_str(code, "test.twig") {
            Err(CodegenError::Syntax(err)) => err,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    // =========================================================================
    // End-to-end scenarios
    // =========================================================================

    #[test]
    fn test_sum_is_not_folded() {
        assert_eq!(latte("{{ 1 + 2 }}"), "{=1 + 2}");
    }

    #[test]
    fn test_loop_without_iteration_context() {
        let code = latte("{% for item in items %}{{ item }}{% endfor %}");
        assert_eq!(code, "{foreach $items as $item}{$item}{/foreach}");
        assert!(!code.contains("iterator"));
    }

    #[test]
    fn test_escape_filter_dropped() {
        assert_eq!(latte("{{ value|escape }}"), latte("{{ value }}"));
        assert_eq!(latte("{{ value|e }}"), "{$value}");
    }

    #[test]
    fn test_html_classes_to_ternaries() {
        assert_eq!(
            latte("{{ html_classes({'active': isActive, 'btn': true}) }}"),
            "{=html_classes($isActive ? active, true ? btn)}"
        );
    }

    #[test]
    fn test_html_classes_attribute_becomes_n_class() {
        assert_eq!(
            latte(r#"<a class="{{ html_classes({'active': isActive}) }}">"#),
            r#"<a n:class="$isActive ? active">"#
        );
    }

    #[test]
    fn test_named_block() {
        assert_eq!(
            latte("{% block content %}hi{% endblock %}"),
            "{block content}hi{/block}"
        );
    }

    #[test]
    fn test_duplicate_block_reports_first_line() {
        let err = error("{% block content %}a{% endblock %}\n{% block content %}b{% endblock %}");
        assert_eq!(err.kind, SyntaxErrorKind::DuplicateBlock);
        assert_eq!(err.line, 2);
        assert!(err.message.contains("line 1"), "{}", err.message);
    }

    #[test]
    fn test_unknown_filter_suggests() {
        let err = error("{{ name|uper }}");
        assert_eq!(err.kind, SyntaxErrorKind::UnknownFilter);
        assert!(err.message.contains("uper"));
        assert!(err.suggestions.contains(&"upper".to_string()));
    }

    #[test]
    fn test_ternary_shorthand_matches_full_form() {
        assert_eq!(latte("{{ a ?: b }}"), latte("{{ a ? a : b }}"));
    }

    #[test]
    fn test_test_operand_keeps_meaning() {
        assert_eq!(latte("{{ a is null ~ 'x' }}"), "{=($a === null) . x}");
        assert_eq!(latte("{{ a is odd + 1 }}"), "{=($a % 2 !== 0) + 1}");
    }

    #[test]
    fn test_empty_template() {
        assert_eq!(latte(""), "");
    }

    // =========================================================================
    // Post-processing
    // =========================================================================

    #[test]
    fn test_post_process_class_attribute() {
        assert_eq!(
            post_process(r#"<div class="{=html_classes($a ? on, b)}">"#).unwrap(),
            r#"<div n:class="$a ? on, b">"#
        );
        assert_eq!(
            post_process("<p CLASS='{html_classes($c)}'>").unwrap(),
            "<p n:class='$c'>"
        );
    }

    #[test]
    fn test_post_process_leaves_other_code() {
        let code = "{foreach $items as $item}{$item}{/foreach}<b class=\"x\">";
        assert_eq!(post_process(code).unwrap(), code);
    }

    // =========================================================================
    // Layouts, macros and includes
    // =========================================================================

    #[test]
    fn test_child_template() {
        let code = latte(concat!(
            "{% extends 'layout.twig' %}\n",
            "{% block title %}{{ parent() }} - Blog{% endblock %}\n",
        ));
        assert_eq!(
            code,
            "{layout 'layout.latte'}\n{block title}{include parent} - Blog{/block}\n"
        );
    }

    #[test]
    fn test_imported_macro_call_becomes_include() {
        let code = latte("{% import 'forms.twig' as forms %}{{ forms.input('email') }}");
        assert_eq!(code, "{import 'forms.latte'}{include input, email}");
    }

    #[test]
    fn test_from_import_call_becomes_include() {
        let code = latte("{% from 'forms.twig' import input as field %}{{ field('email') }}");
        assert_eq!(code, "{import 'forms.latte'}{include input, email}");
    }

    #[test]
    fn test_self_macro_call() {
        let code = latte("{% macro hi(name) %}Hi {{ name }}{% endmacro %}{{ _self.hi('Bob') }}");
        assert_eq!(code, "{include hi, Bob}{define hi, $name}Hi {$name}{/define}");
    }

    #[test]
    fn test_include_function_promoted() {
        assert_eq!(
            latte("{{ include('row.twig', {item: item}) }}"),
            "{include 'row.latte', [item => $item]}"
        );
    }

    #[test]
    fn test_block_function_output() {
        assert_eq!(latte("{{ block('title') }}"), "{include title}");
    }

    #[test]
    fn test_default_filter_becomes_null_coalesce() {
        assert_eq!(latte("{{ name|default('Guest') }}"), "{$name ?? Guest}");
        assert_eq!(latte("{{ user.name|default }}"), "{$user->name ?? ''}");
    }

    #[test]
    fn test_collection_filters_become_functions() {
        assert_eq!(
            latte("{{ items|map(i => i.name)|join(', ') }}"),
            "{=array_map(fn($i) => $i->name, $items)|join:', '}"
        );
        assert_eq!(latte("{{ a|merge(b) }}"), "{=array_merge($a, $b)}");
    }

    #[test]
    fn test_raw_filter_removed() {
        assert_eq!(latte("{{ html|raw }}"), "{$html}");
    }

    #[test]
    fn test_loop_variable() {
        assert_eq!(
            latte("{% for i in items %}{{ loop.index }}{% endfor %}"),
            "{foreach $items as $i}{$iterator->index}{/foreach}"
        );
    }

    #[test]
    fn test_interpolated_string() {
        assert_eq!(latte(r#"{{ "Hello #{name}!" }}"#), "{=('Hello ' . $name) . '!'}");
    }

    // =========================================================================
    // Pipeline properties
    // =========================================================================

    #[test]
    fn test_conversion_is_deterministic() {
        let code = concat!(
            "{% extends 'base.twig' %}",
            "{% block body %}{% for k, v in data %}{{ k }}={{ v|upper }}{% endfor %}{% endblock %}",
        );
        let converter = Converter::default();
        let first = converter.convert_str(code, "a.twig").unwrap();
        let second = converter.convert_str(code, "a.twig").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_debug_info_present() {
        let conversion = Converter::default()
            .convert_str("line one\n{{ a }}\n{% if b %}x{% endif %}", "t.twig")
            .unwrap();
        assert_eq!(conversion.debug_info, vec![(2, 2), (3, 3)]);
    }

    #[test]
    fn test_bitwise_or_error_is_syntax_error() {
        let err = error("{{ a b-or b }}");
        assert_eq!(err.kind, SyntaxErrorKind::Unsupported);
    }

    #[test]
    fn test_convert_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.twig");
        std::fs::write(&path, "{{ title }}").unwrap();

        let conversion = Converter::default().convert_file(&path).unwrap();
        assert_eq!(conversion.code, "{$title}");
    }

    #[test]
    fn test_convert_missing_file() {
        let err = Converter::default()
            .convert_file(Path::new("/nonexistent/page.twig"))
            .unwrap_err();
        assert!(matches!(err, CodegenError::Io { .. }));
    }
}
