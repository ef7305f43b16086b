use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::ast::{Alternative, Segment, Template, VariableRef};
use crate::error::{ParseError, PromptsubResult};
use crate::interface::{EvaluateOptions, Parameters, Variables};
use crate::parser::tokenize;

/// A `Prompt` is a compiled template that can be substituted with parameters.
///
/// The template text is checked completely when the prompt is created; a
/// `Prompt` never holds a partially valid template. Once built it is never
/// mutated, so it can be shared between threads and rendered concurrently.
///
/// # Example
///
/// ```rust
/// use promptsub::{Parameters, Prompt};
///
/// let prompt = Prompt::new("Say hello [to {name}]").unwrap();
///
/// assert_eq!(prompt.substitute(&Parameters::new()), "Say hello");
///
/// let mut parameters = Parameters::new();
/// parameters.insert("name", "John");
/// assert_eq!(prompt.substitute(&parameters), "Say hello to John");
/// ```
#[derive(Clone)]
pub struct Prompt {
    content: String,
    ast: Template,
    variables: OnceLock<Vec<Variables>>,
}

#[cfg(feature = "serde")]
impl serde::Serialize for Prompt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Prompt", 1)?;
        state.serialize_field("content", &self.content)?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Prompt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Only the source is stored, the AST is rebuilt from it.
        #[derive(serde::Deserialize)]
        struct PromptHelper {
            content: String,
        }

        let helper = PromptHelper::deserialize(deserializer)?;
        Self::new(helper.content)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse template: {e}")))
    }
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl Prompt {
    /// Compiles `content` into a prompt.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] pointing at the offending character if the
    /// template syntax is invalid.
    pub fn new<T: Into<String>>(content: T) -> Result<Self, ParseError> {
        let content = content.into();
        let ast = tokenize(&content)?;
        Ok(Self {
            content,
            ast,
            variables: OnceLock::new(),
        })
    }

    /// The source text this prompt was compiled from.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The compiled template tree.
    pub const fn template(&self) -> &Template {
        &self.ast
    }

    /// Substitutes `parameters` with whitespace normalization enabled.
    ///
    /// An empty string is a valid result: it means no alternative could be
    /// rendered with the given parameters.
    pub fn substitute(&self, parameters: &Parameters) -> String {
        self.substitute_with(parameters, EvaluateOptions::default())
    }

    /// Substitutes `parameters` into the template.
    ///
    /// Each alternative is tried in order and the first one rendering to a
    /// non-empty string wins. An alternative is abandoned as soon as one of
    /// its direct variables is missing, empty or fails its comparison.
    /// Bracketed blocks are rendered the same way but a failure inside them
    /// only empties the block itself.
    pub fn substitute_with(&self, parameters: &Parameters, options: EvaluateOptions) -> String {
        let mut output = String::new();
        render_template(&self.ast, parameters, &mut output);

        if options.normalize_whitespace {
            normalize_whitespace(&output)
        } else {
            output
        }
    }

    /// Validates dynamic `parameters` and substitutes them.
    ///
    /// # Errors
    ///
    /// Returns `PromptsubError::ParameterType` before any substitution if the
    /// input is not an object of strings and numbers.
    ///
    /// ```
    /// use promptsub::{EvaluateOptions, Prompt};
    ///
    /// let prompt = Prompt::new("Say hello to {name} | Ask the speaker's name").unwrap();
    /// let output = prompt
    ///     .substitute_json(&serde_json::json!({"age": 26}), EvaluateOptions::default())
    ///     .unwrap();
    /// assert_eq!(output, "Ask the speaker's name");
    /// let rejected = prompt.substitute_json(&serde_json::json!([]), EvaluateOptions::default());
    /// assert!(rejected.is_err());
    /// ```
    pub fn substitute_json(
        &self,
        parameters: &serde_json::Value,
        options: EvaluateOptions,
    ) -> PromptsubResult<String> {
        let parameters = Parameters::try_from(parameters)?;
        Ok(self.substitute_with(&parameters, options))
    }

    /// Required and optional variable names for each top-level alternative,
    /// in source order.
    ///
    /// Computed on first use and cached for the lifetime of the prompt.
    ///
    /// # Example
    ///
    /// ```
    /// use promptsub::Prompt;
    ///
    /// let prompt =
    ///     Prompt::new("{var_1} is needed, [but {var_2} [and {var_3}] not so much]").unwrap();
    /// let variables = prompt.variables();
    /// assert_eq!(variables.len(), 1);
    /// assert!(variables[0].required.contains("var_1"));
    /// assert!(variables[0].optional.contains("var_2"));
    /// assert!(variables[0].optional.contains("var_3"));
    /// ```
    pub fn variables(&self) -> &[Variables] {
        self.variables.get_or_init(|| classify(&self.ast))
    }
}

/// Resolves a single variable against the parameters.
///
/// `None` means the lookup failed: the parameter is absent, empty, or does
/// not match the compare value.
fn resolve<'p>(variable: &VariableRef, parameters: &'p Parameters) -> Option<Cow<'p, str>> {
    let value = parameters.get(&variable.name).filter(|value| !value.is_empty())?;
    let text = value.to_text();

    if variable
        .compare
        .as_deref()
        .is_some_and(|expected| expected != text)
    {
        return None;
    }

    if variable.muted {
        Some(Cow::Borrowed(""))
    } else {
        Some(text)
    }
}

/// Appends the first alternative of `template` that renders to non-empty text.
/// Appends nothing if none does.
fn render_template(template: &Template, parameters: &Parameters, output: &mut String) {
    let start = output.len();
    for alternative in &template.alternatives {
        if render_alternative(alternative, parameters, output) && output.len() > start {
            return;
        }
        output.truncate(start);
    }
}

/// Appends `alternative` to `output`. Returns `false` as soon as one of its
/// direct variables fails, leaving partial output for the caller to discard.
fn render_alternative(
    alternative: &Alternative,
    parameters: &Parameters,
    output: &mut String,
) -> bool {
    for segment in &alternative.segments {
        match segment {
            Segment::Literal(text) => output.push_str(text),
            Segment::Variable(variable) => match resolve(variable, parameters) {
                Some(text) => output.push_str(&text),
                None => return false,
            },
            Segment::Nested(template) => render_template(template, parameters, output),
        }
    }
    true
}

/// Whitespace that is collapsed by normalization. Narrower than
/// `char::is_whitespace`, and unlike `char::is_ascii_whitespace` it includes
/// the vertical tab.
const fn is_collapsible_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C')
}

/// Replaces every whitespace run with a single space and trims both ends.
fn normalize_whitespace(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for word in text
        .split(is_collapsible_whitespace)
        .filter(|word| !word.is_empty())
    {
        if !output.is_empty() {
            output.push(' ');
        }
        output.push_str(word);
    }
    output
}

/// Classifies variables per top-level alternative. Direct references are
/// required, anything inside brackets (at any depth) is optional.
fn classify(template: &Template) -> Vec<Variables> {
    template
        .alternatives
        .iter()
        .map(|alternative| {
            let mut variables = Variables::default();
            for segment in &alternative.segments {
                match segment {
                    Segment::Literal(_) => {}
                    Segment::Variable(variable) => {
                        variables.required.insert(variable.name.clone());
                    }
                    Segment::Nested(nested) => collect_names(nested, &mut variables.optional),
                }
            }
            variables
        })
        .collect()
}

fn collect_names(template: &Template, names: &mut BTreeSet<String>) {
    for segment in template.alternatives.iter().flat_map(|a| &a.segments) {
        match segment {
            Segment::Literal(_) => {}
            Segment::Variable(variable) => {
                names.insert(variable.name.clone());
            }
            Segment::Nested(nested) => collect_names(nested, names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(template: &str, parameters: &Parameters) -> String {
        Prompt::new(template).unwrap().substitute(parameters)
    }

    fn raw(template: &str, parameters: &Parameters) -> String {
        Prompt::new(template)
            .unwrap()
            .substitute_with(parameters, EvaluateOptions::new().with_normalize_whitespace(false))
    }

    fn params<const N: usize>(pairs: [(&str, &str); N]) -> Parameters {
        pairs.into_iter().collect()
    }

    fn names<const N: usize>(names: [&str; N]) -> BTreeSet<String> {
        names.into_iter().map(str::to_owned).collect()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_resolve() {
        let parameters = params([("weather", "hot"), ("empty", "")]);
        let variable = |name: &str, muted, compare: Option<&str>| VariableRef {
            name: name.to_owned(),
            muted,
            compare: compare.map(str::to_owned),
        };

        assert_eq!(
            resolve(&variable("weather", false, None), &parameters).as_deref(),
            Some("hot")
        );
        assert_eq!(
            resolve(&variable("weather", true, None), &parameters).as_deref(),
            Some("")
        );
        assert_eq!(
            resolve(&variable("weather", false, Some("hot")), &parameters).as_deref(),
            Some("hot")
        );
        assert_eq!(
            resolve(&variable("weather", true, Some("hot")), &parameters).as_deref(),
            Some("")
        );
        assert_eq!(resolve(&variable("weather", false, Some("cold")), &parameters), None);
        assert_eq!(resolve(&variable("weather", true, Some("Hot")), &parameters), None);
        assert_eq!(resolve(&variable("empty", true, None), &parameters), None);
        assert_eq!(resolve(&variable("missing", false, None), &parameters), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_direct_variable_abandons_alternative() {
        assert_eq!(render("Only if {var_1} and {var_2} are known", &params([("var_1", "a")])), "");
        assert_eq!(
            render(
                "Only if {var_1} and {var_2} are known",
                &params([("var_1", "a"), ("var_2", "b")])
            ),
            "Only if a and b are known"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nested_failure_stays_inside_brackets() {
        assert_eq!(render("Now [it depends on {var_1}]", &Parameters::new()), "Now");
        assert_eq!(
            render("Now [it depends on {var_1}]", &params([("var_1", "x")])),
            "Now it depends on x"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_alternative_rendering_empty_falls_through() {
        // The first alternative has no variables but renders to nothing.
        assert_eq!(raw("[{a}]|b", &Parameters::new()), "b");
        assert_eq!(raw("[{a}]|b", &params([("a", "x")])), "x");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_whitespace_only_alternative_wins_without_normalization() {
        assert_eq!(raw(" [{a}]|b", &Parameters::new()), " ");
        assert_eq!(render(" [{a}]|b", &Parameters::new()), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nested_alternatives() {
        let template = "Vote for [me {~var_1} | you {~var_2}]";
        assert_eq!(render(template, &params([("var_1", "x"), ("var_2", "y")])), "Vote for me");
        assert_eq!(render(template, &params([("var_2", "y")])), "Vote for you");
        assert_eq!(render(template, &Parameters::new()), "Vote for");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_failed_alternative_leaves_no_partial_output() {
        assert_eq!(
            raw("a[b{x}c|d]e", &Parameters::new()),
            "ade",
            "partial text of the failed nested alternative must be discarded"
        );
        assert_eq!(raw("[a{x}]b{y}|z", &params([("x", "1")])), "z");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \t b\n\r\x0B\x0Cc  "), "a b c");
        assert_eq!(normalize_whitespace(" \n "), "");
        assert_eq!(normalize_whitespace("a\u{00A0}b"), "a\u{00A0}b");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_classify_simple() {
        let prompt = Prompt::new("{required} [{optional}]").unwrap();
        assert_eq!(
            prompt.variables(),
            [Variables {
                required: names(["required"]),
                optional: names(["optional"]),
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_classify_per_alternative() {
        let prompt = Prompt::new("Nothing in here | {required} | [{optional}]").unwrap();
        assert_eq!(
            prompt.variables(),
            [
                Variables::default(),
                Variables {
                    required: names(["required"]),
                    optional: names([]),
                },
                Variables {
                    required: names([]),
                    optional: names(["optional"]),
                },
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_classify_nested_alternatives_are_optional() {
        let prompt =
            Prompt::new("{var_1} is needed, [{var_2} [and {var_3}] aren't | {var_5}] | {var_4}")
                .unwrap();
        assert_eq!(
            prompt.variables(),
            [
                Variables {
                    required: names(["var_1"]),
                    optional: names(["var_2", "var_3", "var_5"]),
                },
                Variables {
                    required: names(["var_4"]),
                    optional: names([]),
                },
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_classify_keeps_both_memberships() {
        let prompt =
            Prompt::new("{var_1} [{var_1} [{var_1}]] {var_1} | and again {var_1}").unwrap();
        assert_eq!(
            prompt.variables(),
            [
                Variables {
                    required: names(["var_1"]),
                    optional: names(["var_1"]),
                },
                Variables {
                    required: names(["var_1"]),
                    optional: names([]),
                },
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_classify_is_cached() {
        let prompt = Prompt::new("{~var_1} and {var_2=value_2} and {~var_3=value_3}|.|.").unwrap();
        let first = prompt.variables();
        let second = prompt.variables();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].required, names(["var_1", "var_2", "var_3"]));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_clone_keeps_cached_variables() {
        let prompt = Prompt::new("{a} [{b}]").unwrap();
        let _ = prompt.variables();
        let cloned = prompt.clone();
        assert_eq!(cloned.variables(), prompt.variables());
        assert_eq!(cloned.content(), "{a} [{b}]");
    }
}
