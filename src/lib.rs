pub mod ast;
mod engine;
mod error;
mod interface;
mod parser;
mod template;

// Public exports.
pub use engine::PromptEngine;
pub use error::{ParameterTypeError, ParseError, ParseErrorKind, PromptsubError, PromptsubResult};
pub use interface::{EvaluateOptions, Parameters, PromptInterface, Value, Variables};
pub use parser::MAX_NESTING;
pub use template::Prompt;

/// Compiles template text into a [`Prompt`].
///
/// # Errors
///
/// Returns a [`ParseError`] if the template syntax is invalid.
pub fn compile<T: Into<String>>(content: T) -> Result<Prompt, ParseError> {
    Prompt::new(content)
}
