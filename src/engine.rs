use std::collections::HashMap;

use crate::error::{PromptsubError, PromptsubResult};
use crate::interface::{EvaluateOptions, Parameters, PromptInterface, Variables};
use crate::template::Prompt;

/// `PromptEngine` is the primary implementation of the `PromptInterface`
/// trait: a collection of named prompts that can be added, rendered and
/// inspected for the variables they use.
///
/// # Examples
///
/// ```
/// use promptsub::{EvaluateOptions, Parameters, PromptEngine, PromptInterface};
///
/// // Create a new engine
/// let mut engine = PromptEngine::new();
///
/// // Add a template
/// engine.add_template("greeting", "Say hello [to {name}]").unwrap();
///
/// // Setup parameters
/// let mut parameters = Parameters::new();
/// parameters.insert("name", "John");
///
/// // Render template
/// let output = engine
///     .render("greeting", &parameters, EvaluateOptions::default())
///     .unwrap();
/// assert_eq!(output, "Say hello to John");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct PromptEngine {
    templates: HashMap<String, Prompt>,
}

impl PromptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains<N: AsRef<str>>(&self, template_name: N) -> bool {
        self.templates.contains_key(template_name.as_ref())
    }

    /// Returns the compiled prompt registered under `template_name`.
    pub fn get<N: AsRef<str>>(&self, template_name: N) -> Option<&Prompt> {
        self.templates.get(template_name.as_ref())
    }

    fn lookup(&self, template_name: &str) -> PromptsubResult<&Prompt> {
        self.templates.get(template_name).ok_or_else(|| {
            tracing::debug!(template = template_name, "template not found");
            PromptsubError::MissingTemplate {
                template_name: template_name.to_owned(),
            }
        })
    }
}

impl PromptInterface for PromptEngine {
    fn add_template<N: Into<String>, C: AsRef<str>>(
        &mut self,
        name: N,
        content: C,
    ) -> PromptsubResult<()> {
        let name = name.into();
        if self.templates.contains_key(&name) {
            return Err(PromptsubError::TemplateExists {
                template_name: name,
            });
        }

        let prompt = Prompt::new(content.as_ref())?;
        tracing::debug!(
            template = name.as_str(),
            alternatives = prompt.template().alternatives().len(),
            "registered template"
        );
        self.templates.insert(name, prompt);
        Ok(())
    }

    fn render<N: AsRef<str>>(
        &self,
        template_name: N,
        parameters: &Parameters,
        options: EvaluateOptions,
    ) -> PromptsubResult<String> {
        let prompt = self.lookup(template_name.as_ref())?;
        Ok(prompt.substitute_with(parameters, options))
    }

    fn variables<N: AsRef<str>>(&self, template_name: N) -> PromptsubResult<&[Variables]> {
        Ok(self.lookup(template_name.as_ref())?.variables())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    #[test]
    #[ntest::timeout(100)]
    fn test_duplicate_template() {
        let mut engine = PromptEngine::new();
        engine.add_template("a", "first").unwrap();
        let err = engine.add_template("a", "second").unwrap_err();
        assert_eq!(
            err,
            PromptsubError::TemplateExists {
                template_name: "a".to_owned()
            }
        );
        // The first registration is kept.
        assert_eq!(
            engine
                .render("a", &Parameters::new(), EvaluateOptions::default())
                .unwrap(),
            "first"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_syntax_error_is_not_registered() {
        let mut engine = PromptEngine::new();
        let err = engine.add_template("broken", "Say hello [to {name}").unwrap_err();
        let PromptsubError::Parse(parse_error) = &err else {
            panic!("expected a parse error, got {err:?}");
        };
        assert_eq!(parse_error.kind, ParseErrorKind::TemplateNotClosed);
        assert!(!engine.contains("broken"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_template() {
        let engine = PromptEngine::new();
        let expected = PromptsubError::MissingTemplate {
            template_name: "nope".to_owned(),
        };
        assert_eq!(
            engine
                .render("nope", &Parameters::new(), EvaluateOptions::default())
                .unwrap_err(),
            expected
        );
        assert_eq!(engine.variables("nope").unwrap_err(), expected);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_variables_by_name() {
        let mut engine = PromptEngine::new();
        engine
            .add_template(
                "weather",
                "{~is_rainy=true} Bring an umbrella | Enjoy [the {sky}]",
            )
            .unwrap();
        let variables = engine.variables("weather").unwrap();
        assert_eq!(variables.len(), 2);
        assert!(variables[0].required.contains("is_rainy"));
        assert!(variables[1].optional.contains("sky"));
        assert!(engine.get("weather").is_some());
    }
}
