//! Pulls a JSON value out of free-form model text.
//!
//! Models routinely wrap their JSON in prose or markdown fences. The
//! extractor slices from the first opening delimiter to the last matching
//! closing delimiter and parses the slice. Pure function, no I/O.

use serde_json::Value;

/// Shape the caller expects the reply to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    /// A JSON object (`{...}`), e.g. a decomposition reply.
    Object,
    /// A JSON array (`[...]`), e.g. a subtask reply.
    Array,
}

impl ExpectedShape {
    fn delimiters(&self) -> (char, char) {
        match self {
            ExpectedShape::Object => ('{', '}'),
            ExpectedShape::Array => ('[', ']'),
        }
    }
}

/// No parseable structure could be found in the response text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractionError {
    #[error("no {0} found in response text")]
    NoJson(&'static str),
    #[error("candidate slice is not valid JSON: {0}")]
    Parse(String),
}

/// Extract the first/last-delimiter JSON slice from `text` and parse it.
///
/// Known limitation: the scan is not bracket-balanced. When the text
/// contains several JSON-like fragments, or prose braces outside the real
/// payload, the slice spans from the first opening delimiter to the last
/// closing one and the parse fails (or picks up the wrong value). This
/// mirrors the upstream behavior on purpose; a stricter scanner can be
/// substituted here without touching the retry policy.
pub fn extract_json(text: &str, shape: ExpectedShape) -> Result<Value, ExtractionError> {
    let (open, close) = shape.delimiters();
    let label = match shape {
        ExpectedShape::Object => "JSON object",
        ExpectedShape::Array => "JSON array",
    };

    let start = text.find(open).ok_or(ExtractionError::NoJson(label))?;
    let end = text.rfind(close).ok_or(ExtractionError::NoJson(label))?;
    if end < start {
        return Err(ExtractionError::NoJson(label));
    }

    let candidate = &text[start..=end];
    serde_json::from_str(candidate).map_err(|e| ExtractionError::Parse(e.to_string()))
}
