use anyhow::Result;

use crate::fields::FieldRegistry;
use crate::record::NormalizedRecord;
use crate::template::{Template, DEFAULT_TEMPLATE};

/// Turns a normalized record into one line of output.
#[derive(Clone, Debug)]
pub enum Formatter {
    /// Substitute the record into a compiled `%` template.
    Template(Template),
    /// Emit the record as a flat JSON object keyed by canonical field name.
    Json,
}

impl Formatter {
    /// Pick the output mode. `json` wins over any template.
    pub fn new(template: Option<&str>, json: bool, registry: &FieldRegistry) -> Self {
        if json {
            if template.is_some() {
                log::warn!("--json given, ignoring --format template");
            }
            return Formatter::Json;
        }
        let template = Template::compile(template.unwrap_or(DEFAULT_TEMPLATE), registry);
        if log::log_enabled!(log::Level::Debug) {
            let fields: Vec<_> = template
                .fields()
                .iter()
                .map(|f| f.canonical_name())
                .collect();
            log::debug!("output template {} substitutes {:?}", template, fields);
        }
        Formatter::Template(template)
    }

    /// Render `record`, without a line terminator.
    pub fn format(&self, record: &NormalizedRecord) -> Result<String> {
        match self {
            Formatter::Template(template) => Ok(template.render(record)),
            Formatter::Json => Ok(serde_json::to_string(record)?),
        }
    }
}
