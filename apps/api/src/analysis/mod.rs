// Error-screenshot analysis: payload decoding, the model bridge, report
// parsing and the HTTP handlers that tie them to the store.
// All model calls go through llm_client. No direct Gemini calls here.

pub mod analyzer;
pub mod handlers;
pub mod image;
pub mod prompts;
pub mod report;
