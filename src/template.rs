use std::fmt;

use crate::fields::{Field, FieldRegistry, TOKEN_PREFIX};
use crate::record::NormalizedRecord;

/// Default output: quoted CSV of address, coordinates and AS.
pub const DEFAULT_TEMPLATE: &str = r#""%ip","%lat","%lon","%asnum","%asname""#;

/// A pre-compiled template for fast rendering.
///
/// Templates reference fields with the `%` tokens of a [`FieldRegistry`]
/// (`%ip`, `%lat`, ...). Where two tokens share a prefix the longer one wins,
/// so `%cc3` is never read as `%cc` followed by `3`. Anything that is not a
/// registered token is copied through unchanged.
///
/// The template is parsed once into a sequence of literal and field segments.
/// Rendering is a single left-to-right pass that concatenates segments, so a
/// value that happens to contain a token is never expanded again.
#[derive(Clone, Debug)]
pub struct Template {
    parts: Vec<TemplatePart>,
    /// Pre-computed estimate of output size for allocation.
    estimated_size: usize,
}

#[derive(Clone, Debug)]
enum TemplatePart {
    Literal(String),
    Field { field: Field, token: String },
}

impl Template {
    /// Compile a template string against the tokens of `registry`.
    ///
    /// Every string is a valid template; one without tokens renders to itself.
    pub fn compile(template: &str, registry: &FieldRegistry) -> Template {
        let mut parts = Vec::new();
        let mut estimated_size = 0;
        let mut literal_start = 0;
        let mut i = 0;

        while let Some(offset) = template[i..].find(TOKEN_PREFIX) {
            i += offset;
            match registry.longest_match(&template[i..]) {
                Some(descriptor) => {
                    // Flush accumulated literal
                    if literal_start < i {
                        let literal = &template[literal_start..i];
                        estimated_size += literal.len();
                        parts.push(TemplatePart::Literal(literal.to_string()));
                    }
                    // Estimate ~16 bytes per field value
                    estimated_size += 16;
                    parts.push(TemplatePart::Field {
                        field: descriptor.field,
                        token: descriptor.token.clone(),
                    });
                    i += descriptor.token.len();
                    literal_start = i;
                }
                // not a token, the '%' stays literal
                None => i += TOKEN_PREFIX.len_utf8(),
            }
        }

        // Flush remaining literal
        if literal_start < template.len() {
            let literal = &template[literal_start..];
            estimated_size += literal.len();
            parts.push(TemplatePart::Literal(literal.to_string()));
        }

        Template {
            parts,
            estimated_size,
        }
    }

    /// Render the template with the values of `record`.
    ///
    /// A field the record does not carry renders as `None`, like a missing
    /// value.
    #[inline]
    pub fn render(&self, record: &NormalizedRecord) -> String {
        let mut output = String::with_capacity(self.estimated_size);
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => output.push_str(s),
                TemplatePart::Field { field, .. } => match record.get(*field) {
                    Some(value) => value.render_into(&mut output),
                    None => output.push_str(crate::record::NO_VALUE),
                },
            }
        }
        output
    }

    /// Fields referenced in this template, in order of appearance.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                TemplatePart::Field { field, .. } => Some(*field),
                TemplatePart::Literal(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => f.write_str(s)?,
                TemplatePart::Field { token, .. } => f.write_str(token)?,
            }
        }
        Ok(())
    }
}
