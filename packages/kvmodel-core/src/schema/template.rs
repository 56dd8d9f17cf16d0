//! Composite key templates such as `"{org}:{user}"`.

use std::collections::BTreeMap;

use super::error::DeclarationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Parsed key template.
///
/// Placeholders are `{name}`; `{{` and `}}` produce literal braces.
/// Format specs (`{name:>4}`) and conversions (`{name!r}`) are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    source: String,
    segments: Vec<Segment>,
    placeholders: Vec<String>,
}

impl KeyTemplate {
    /// Parses a template string.
    ///
    /// # Arguments
    /// * `source` - Template text
    ///
    /// # Returns
    /// The parsed template, or `DeclarationError::MalformedTemplate`.
    pub fn parse(source: &str) -> Result<Self, DeclarationError> {
        let malformed = |reason: &str| DeclarationError::MalformedTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut placeholders: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(malformed("nested '{' inside placeholder")),
                            ':' | '!' => {
                                return Err(malformed("format specs are not supported"))
                            }
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(malformed("unclosed placeholder"));
                    }
                    let name = name.trim().to_string();
                    if name.is_empty() {
                        return Err(malformed("empty placeholder"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    if !placeholders.contains(&name) {
                        placeholders.push(name.clone());
                    }
                    segments.push(Segment::Field(name));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(malformed("single '}' outside placeholder")),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if placeholders.is_empty() {
            return Err(malformed("template has no placeholders"));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            placeholders,
        })
    }

    /// Template text as declared.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in first-appearance order.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Substitutes rendered component values into the template.
    ///
    /// Returns `None` if a placeholder has no entry in `components`.
    pub fn render(&self, components: &BTreeMap<String, String>) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(components.get(name)?),
            }
        }
        Some(out)
    }
}
