/// A set of alternative renderings of the same slot, tried left to right.
///
/// Both the whole compiled prompt and every bracketed block share this shape.
/// A `Template` produced by the parser always holds at least one
/// [`Alternative`].
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) alternatives: Vec<Alternative>,
}

impl Template {
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }
}

/// One candidate rendering: segments concatenated in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub(crate) segments: Vec<Segment>,
}

impl Alternative {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Source text, emitted verbatim.
    Literal(String),
    /// A `{...}` reference, resolved against parameters when rendering.
    Variable(VariableRef),
    /// A bracketed sub-template. Failures inside it collapse to empty text.
    Nested(Template),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef {
    pub(crate) name: String,
    pub(crate) muted: bool,
    pub(crate) compare: Option<String>,
}

impl VariableRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Muted variables must resolve but contribute no text.
    pub const fn muted(&self) -> bool {
        self.muted
    }

    /// The exact text the parameter must stringify to, if any.
    pub fn compare(&self) -> Option<&str> {
        self.compare.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ntest::timeout(100)]
    fn test_accessors() {
        let prompt = crate::compile("Hi {~name=Ann} [there] | bye").unwrap();
        let alternatives = prompt.template().alternatives();
        assert_eq!(alternatives.len(), 2);

        let [
            Segment::Literal(greeting),
            Segment::Variable(variable),
            _,
            Segment::Nested(nested),
            _,
        ] = alternatives[0].segments()
        else {
            panic!("unexpected shape: {:?}", alternatives[0]);
        };
        assert_eq!(greeting, "Hi ");
        assert_eq!(variable.name(), "name");
        assert!(variable.muted());
        assert_eq!(variable.compare(), Some("Ann"));
        assert_eq!(nested.alternatives().len(), 1);
    }
}
