use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument};

use crate::config::ExtractConfig;
use crate::corpus::JsonlWriter;
use crate::extractor::ollama::{GenerateError, Generator};
use crate::extractor::repair::{normalize, PAYLOAD_MARKER};

/// Counters for one extractor run
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractStats {
    /// Units handed to the worker pool
    pub submitted: usize,
    /// Inputs dropped for being empty or whitespace-only
    pub skipped: usize,
    /// Lines appended to the structured corpus
    pub written: usize,
}

/// Runs review texts through the worker pool and streams repaired results.
pub struct Extractor<G> {
    generator: Arc<G>,
    config: ExtractConfig,
}

impl<G: Generator + 'static> Extractor<G> {
    pub fn new(generator: G, config: ExtractConfig) -> Self {
        Self {
            generator: Arc::new(generator),
            config,
        }
    }

    /// Extract a structured record from every non-empty text.
    ///
    /// Each text becomes one worker invocation, at most `concurrency` in
    /// flight at a time. Every submitted unit yields exactly one output
    /// line: repaired worker output on success, or a typed error record on
    /// timeout, dispatch failure, or panic. Lines are appended as units
    /// finish, so output order reflects completion, not submission.
    #[instrument(skip(self, texts, sink), fields(count = texts.len()))]
    pub async fn summarize_all(
        &self,
        texts: Vec<String>,
        sink: &mut JsonlWriter,
    ) -> Result<ExtractStats> {
        let mut stats = ExtractStats::default();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for text in texts {
            if text.trim().is_empty() {
                stats.skipped += 1;
                continue;
            }
            stats.submitted += 1;

            let semaphore = semaphore.clone();
            let generator = self.generator.clone();
            let prompt = build_prompt(&text);

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => return json!({"error": format!("exception:{err}")}).to_string(),
                };

                match generator.generate(&prompt).await {
                    Ok(output) => output,
                    Err(GenerateError::Timeout) => json!({"error": "timeout"}).to_string(),
                    Err(err) => json!({"error": format!("exception:{err}")}).to_string(),
                }
            });
        }

        // Sole writer: draining here serializes appends in completion order
        while let Some(joined) = tasks.join_next().await {
            let raw = match joined {
                Ok(raw) => raw,
                Err(err) => json!({"error": format!("exception:{err}")}).to_string(),
            };
            sink.append_line(&normalize(&raw))?;
            stats.written += 1;
        }

        info!(
            submitted = stats.submitted,
            skipped = stats.skipped,
            written = stats.written,
            "Extraction run complete"
        );

        Ok(stats)
    }
}

/// Build the instruction-plus-review prompt for one unit.
/// The worker is told to emit the payload marker right before its JSON.
pub fn build_prompt(review: &str) -> String {
    format!(
        r#"You are analyzing player reviews. Follow the rules strictly.

HERE IS THE REVIEW:
{review}
END REVIEW.

Extract structured insights and return valid JSON with these keys:
- original_review: the review text
- summary: one-sentence summary of the opinion
- likes: what the player liked most
- dislikes: what the player disliked most
- task: specific technical or design task if explicitly mentioned, else "None"
- confidence: a number from 0.0 to 1.0 showing how confident you are that the "task" field is correct,
  based only on explicit evidence in the review (1.0 = fully clear, 0.0 = pure guess)

When identifying the "task" field:
- If the review directly mentions a technical or gameplay issue (e.g., desync, lag, crashes, unbalanced weapons),
  infer the most relevant and specific developer action that would resolve that issue
  (e.g., "optimize server synchronization" or "rebalance weapon damage curves").
- If the review expresses only vague dissatisfaction with no identifiable issue, set task="None".
- Do NOT invent tasks unrelated to concrete problems.

Rules:
- Never infer a task that is not clearly described.
- If no task is mentioned, set task="None" and confidence=0.0.
- Do NOT include markdown, code fences, or extra commentary.

Now return the JSON object (nothing else). Begin immediately after the marker {PAYLOAD_MARKER}:
{PAYLOAD_MARKER}
"#
    )
}
