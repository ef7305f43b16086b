use crate::{
    ast::{Alternative, Segment, Template, VariableRef},
    error::{ParseError, ParseErrorKind},
};

type ParseResult<T> = Result<T, ParseError>;

const TEMPLATE_OPEN: char = '[';
const TEMPLATE_CLOSE: char = ']';
const SEPARATOR: char = '|';
const VARIABLE_OPEN: char = '{';
const VARIABLE_CLOSE: char = '}';
const MUTE: char = '~';
const COMPARE: char = '=';

/// How many `[` blocks may be open at once. Compiling, rendering and
/// classifying all recurse once per level.
pub const MAX_NESTING: usize = 256;

#[inline]
const fn is_structural(c: char) -> bool {
    matches!(
        c,
        TEMPLATE_OPEN | TEMPLATE_CLOSE | SEPARATOR | VARIABLE_OPEN | VARIABLE_CLOSE
    )
}

#[inline]
const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A saved parser location, used to report errors at an opener after the
/// parser has moved past it.
#[derive(Debug, Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    line_start_pos: usize,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
    /// Number of currently open `[` blocks
    depth: usize,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a str) -> Self {
        Parser {
            input,
            pos: 0,
            line: 1,
            line_start_pos: 0,
            depth: 0,
        }
    }

    #[inline]
    const fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            line_start_pos: self.line_start_pos,
        }
    }

    fn error_at(&self, mark: Mark, kind: ParseErrorKind) -> ParseError {
        let column = self
            .input
            .get(mark.line_start_pos..mark.pos)
            .map_or(0, |s| s.chars().count())
            .saturating_add(1);
        tracing::debug!(line = mark.line, column, %kind, "rejected template");
        ParseError {
            offset: mark.pos,
            line: mark.line,
            column,
            kind,
        }
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(self.mark(), kind)
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.input.get(self.pos..)?.chars().next()
    }

    /// Moves past `current`, which must be the character under the cursor.
    /// Updates line tracking if it is a newline.
    #[inline]
    fn advance(&mut self, current: char) {
        let next = self.pos.saturating_add(current.len_utf8());
        if current == '\n' {
            self.line = self.line.saturating_add(1);
            self.line_start_pos = next;
        }
        self.pos = next;
    }

    /// Parses alternatives until the end of input or, when `opener` is set,
    /// until the `]` matching it.
    fn parse_template(&mut self, opener: Option<Mark>) -> ParseResult<Template> {
        let mut alternatives = Vec::new();
        let mut segments = Vec::new();

        loop {
            let Some(current) = self.peek() else {
                if let Some(opener) = opener {
                    return Err(self.error_at(opener, ParseErrorKind::TemplateNotClosed));
                }
                self.push_alternative(&mut alternatives, segments)?;
                break;
            };

            match current {
                TEMPLATE_OPEN => {
                    if self.depth >= MAX_NESTING {
                        return Err(self.make_error(ParseErrorKind::NestingTooDeep {
                            limit: MAX_NESTING,
                        }));
                    }
                    let nested_opener = self.mark();
                    self.advance(current);
                    self.depth = self.depth.saturating_add(1);
                    let nested = self.parse_template(Some(nested_opener))?;
                    self.depth = self.depth.saturating_sub(1);
                    segments.push(Segment::Nested(nested));
                }
                TEMPLATE_CLOSE => {
                    if opener.is_none() {
                        return Err(self.make_error(ParseErrorKind::UnmatchedClosing {
                            found: current,
                        }));
                    }
                    self.push_alternative(&mut alternatives, segments)?;
                    self.advance(current);
                    break;
                }
                SEPARATOR => {
                    self.push_alternative(&mut alternatives, std::mem::take(&mut segments))?;
                    self.advance(current);
                }
                VARIABLE_OPEN => segments.push(Segment::Variable(self.parse_variable()?)),
                VARIABLE_CLOSE => {
                    return Err(self.make_error(ParseErrorKind::UnmatchedClosing {
                        found: current,
                    }));
                }
                _ => segments.push(self.parse_literal()),
            }
        }

        Ok(Template { alternatives })
    }

    /// Closes the alternative ending at the cursor. An alternative spanning no
    /// characters at all is a syntax error.
    fn push_alternative(
        &self,
        alternatives: &mut Vec<Alternative>,
        segments: Vec<Segment>,
    ) -> ParseResult<()> {
        if segments.is_empty() {
            return Err(self.make_error(ParseErrorKind::EmptyTemplate));
        }
        alternatives.push(Alternative { segments });
        Ok(())
    }

    /// Consumes the maximal run of non-structural characters.
    fn parse_literal(&mut self) -> Segment {
        let start = self.pos;
        while let Some(current) = self.peek() {
            if is_structural(current) {
                break;
            }
            self.advance(current);
        }
        Segment::Literal(self.input.get(start..self.pos).unwrap_or_default().to_owned())
    }

    /// Parses `{[~]name[=value]}` with the cursor on the opening brace.
    fn parse_variable(&mut self) -> ParseResult<VariableRef> {
        let opener = self.mark();
        self.advance(VARIABLE_OPEN);

        let mut muted = false;
        let mut name = String::new();
        let mut compare: Option<String> = None;

        loop {
            let Some(current) = self.peek() else {
                return Err(self.error_at(opener, ParseErrorKind::VariableNotClosed));
            };

            match (current, compare.is_some()) {
                (VARIABLE_CLOSE, _) => break,
                (TEMPLATE_OPEN | TEMPLATE_CLOSE | SEPARATOR | VARIABLE_OPEN, _) => {
                    return Err(self.make_error(ParseErrorKind::UnexpectedCharacter {
                        found: current,
                    }));
                }
                // Everything after `=` belongs to the compare value.
                (_, true) => compare.get_or_insert_default().push(current),
                (MUTE, false) => {
                    if muted || !name.is_empty() {
                        return Err(self.make_error(ParseErrorKind::MuteNotFirst));
                    }
                    muted = true;
                }
                (COMPARE, false) => {
                    if name.is_empty() {
                        return Err(self.make_error(ParseErrorKind::EmptyName));
                    }
                    compare = Some(String::new());
                }
                (_, false) if is_name_char(current) => name.push(current),
                (_, false) => {
                    return Err(self.make_error(ParseErrorKind::InvalidName { found: current }));
                }
            }
            self.advance(current);
        }

        if name.is_empty() {
            return Err(self.make_error(ParseErrorKind::EmptyName));
        }
        if compare.as_ref().is_some_and(String::is_empty) {
            return Err(self.make_error(ParseErrorKind::EmptyCompareValue));
        }
        self.advance(VARIABLE_CLOSE);

        Ok(VariableRef {
            name,
            muted,
            compare,
        })
    }
}

pub(crate) fn tokenize(input: &str) -> ParseResult<Template> {
    let template = Parser::new(input).parse_template(None)?;
    tracing::trace!(
        alternatives = template.alternatives.len(),
        "compiled template"
    );
    Ok(template)
}
