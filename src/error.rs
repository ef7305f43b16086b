use thiserror::Error;

pub type PromptsubResult<T> = std::result::Result<T, PromptsubError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ParseErrorKind {
    #[error("template not closed")]
    TemplateNotClosed,
    #[error("variable not closed")]
    VariableNotClosed,
    #[error("unmatched {found:?}")]
    UnmatchedClosing { found: char },
    #[error("character {found:?} is not allowed inside a variable")]
    UnexpectedCharacter { found: char },
    #[error("character {found:?} is not allowed in a variable name")]
    InvalidName { found: char },
    #[error("variable name can not be empty")]
    EmptyName,
    #[error("mute marker must be first")]
    MuteNotFirst,
    #[error("compare value can not be empty")]
    EmptyCompareValue,
    #[error("template can not be empty")]
    EmptyTemplate,
    #[error("templates can not be nested more than {limit} levels deep")]
    NestingTooDeep { limit: usize },
}

/// A syntax error found while compiling template text.
///
/// `offset` is the byte offset of the offending character in the source,
/// `line` and `column` are 1-indexed, with `column` counted in characters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("Parse error at line {line}, column {column}: {kind}")]
pub struct ParseError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    #[source]
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Renders the source line holding the error with a caret under the
    /// offending character.
    ///
    /// ```
    /// let source = "Say hello [to {name}";
    /// let err = promptsub::compile(source).unwrap_err();
    /// assert_eq!(err.snippet(source), "Say hello [to {name}\n          ^");
    /// ```
    pub fn snippet(&self, source: &str) -> String {
        let line = source
            .split('\n')
            .nth(self.line.saturating_sub(1))
            .unwrap_or_default()
            .trim_end_matches('\r');
        let padding = " ".repeat(self.column.saturating_sub(1));
        format!("{line}\n{padding}^")
    }
}

/// Raised when dynamic parameter input can not be turned into [`Parameters`].
///
/// [`Parameters`]: crate::Parameters
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ParameterTypeError {
    #[error("parameters must be a mapping, found {found}")]
    NotAMapping { found: String },
    #[error("key {key} has a value of unsupported type {found}")]
    InvalidValue { key: String, found: String },
    #[error("key {key} holds an integer outside the supported range")]
    IntegerOutOfRange { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptsubError {
    #[error("Template already exists: {template_name}")]
    TemplateExists { template_name: String },
    #[error("Template not found: {template_name}")]
    MissingTemplate { template_name: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    ParameterType(#[from] ParameterTypeError),
}
