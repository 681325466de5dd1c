use std::fmt;

use serde_json::Value;

/// One capture of the page: the rendered accessibility tree and a PNG
/// screenshot taken right after it. Never reused across extractions.
#[derive(Clone, PartialEq)]
pub struct Observation {
    pub tree_text: String,
    pub screenshot: Vec<u8>,
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("tree_text", &self.tree_text)
            .field("screenshot_bytes", &self.screenshot.len())
            .finish()
    }
}

/// Payload handed to a [`crate::extractor::ModelClient`].
#[derive(Clone, Copy)]
pub struct ExtractionCall<'a> {
    pub instructions: &'a str,
    /// JSON Schema the model output must satisfy.
    pub schema: &'a Value,
    pub screenshot: &'a [u8],
    pub page_text: &'a str,
}

impl fmt::Debug for ExtractionCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionCall")
            .field("instructions", &self.instructions)
            .field("schema", &self.schema)
            .field("screenshot_bytes", &self.screenshot.len())
            .field("page_text_chars", &self.page_text.chars().count())
            .finish()
    }
}
