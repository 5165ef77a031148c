//! Analyzer: trait-based bridge between the route layer and the model.
//!
//! Default: `GeminiAnalyzer` (multimodal call through `LlmClient`).
//! `AppState` holds an `Arc<dyn Analyzer>` so handlers never see the provider.

use async_trait::async_trait;
use tracing::info;

use crate::analysis::image::DecodedImage;
use crate::analysis::prompts::{ANALYSIS_PROMPT_TEMPLATE, NO_CONTEXT_PLACEHOLDER};
use crate::analysis::report::{parse_analysis_text, AnalysisOutcome};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{InlineImage, LlmClient, LlmError};

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        image: &DecodedImage,
        context: &str,
    ) -> Result<AnalysisOutcome, LlmError>;
}

pub struct GeminiAnalyzer(pub LlmClient);

pub fn build_analysis_prompt(context: &str) -> String {
    let context = context.trim();
    let context = if context.is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    };
    ANALYSIS_PROMPT_TEMPLATE
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{context}", context)
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    async fn analyze(
        &self,
        image: &DecodedImage,
        context: &str,
    ) -> Result<AnalysisOutcome, LlmError> {
        let prompt = build_analysis_prompt(context);
        let response = self
            .0
            .generate(
                &prompt,
                Some(InlineImage {
                    mime_type: image.mime_type,
                    data: &image.bytes,
                }),
            )
            .await?;

        let text = response.text().ok_or(LlmError::EmptyContent)?;
        info!("Model answered with {} characters", text.len());

        Ok(parse_analysis_text(&text))
    }
}
