//! Template source descriptor shared by tokens, AST and diagnostics.

use std::fmt;

/// The unit every diagnostic refers to: raw template text, a logical name
/// and an optional filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    code: String,
    name: String,
    path: Option<String>,
}

impl Source {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            path: None,
        }
    }

    /// Attach the path the template was read from.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Path when known, logical name otherwise.
    pub fn display_name(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
