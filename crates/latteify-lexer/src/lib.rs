//! Latteify Lexer
//!
//! Tokenizes Twig template source into a stream of tokens: literal text,
//! print and statement delimiters, comments, verbatim regions and the
//! expression tokens found inside tags. Also hosts the [`SyntaxError`]
//! diagnostics type shared by the parser and the code generator.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use latteify_lexer::{Scanner, Source};
//!
//! let tokens = Scanner::tokenize(Arc::new(Source::new("", "empty")), &[]).unwrap();
//! assert_eq!(tokens.len(), 1); // Just EOF
//! ```

pub mod error;
pub mod scanner;
pub mod source;
pub mod stream;
pub mod token;

pub use error::{suggest, SyntaxError, SyntaxErrorKind};
pub use scanner::Scanner;
pub use source::Source;
pub use stream::TokenStream;
pub use token::{Number, Span, Token, TokenKind};
