use crate::canon::canonicalize;
use crate::derived::fill_missing_derived;
use crate::error::Result;
use crate::llm::client::LlmClient;
use crate::llm::prompts::{build_prompt, chunk_pages, CHUNK_MAX_CHARS, RETRY_SUFFIX};
use crate::schema::CanonicalReport;
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::Sender;

/// How many corrective re-prompts a chunk gets before being skipped.
pub const MAX_JSON_RETRIES: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExtractionEvent {
    Starting { chunks: usize },
    Extracting { chunk: usize, total: usize },
    Retry { chunk: usize, attempt: usize },
    ChunkSkipped { chunk: usize, reason: String },
    Success,
}

/// Runs the per-chunk extraction loop against a model and accumulates the
/// responses into one canonical report.
pub struct DocumentExtractor {
    client: LlmClient,
}

impl DocumentExtractor {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Extract a canonical report from a document's page texts.
    ///
    /// Each chunk is prompted independently; later chunks only fill fields
    /// earlier chunks left null. A chunk whose responses never parse is
    /// skipped with a warning; one unreadable stretch of a document must
    /// not poison the rest of the report.
    pub async fn extract(
        &self,
        pages: &[String],
        ticker: Option<&str>,
        source: &str,
        progress: Option<Sender<ExtractionEvent>>,
    ) -> Result<CanonicalReport> {
        let chunks = chunk_pages(pages, CHUNK_MAX_CHARS);
        self.send_event(
            &progress,
            ExtractionEvent::Starting {
                chunks: chunks.len(),
            },
        )
        .await;

        let mut merged = CanonicalReport::default();
        merged.metadata.ticker = ticker.map(str::to_string);
        merged.metadata.as_of = Some(Utc::now().date_naive().to_string());
        merged.metadata.source = Some(source.to_string());

        for (index, chunk) in chunks.iter().enumerate() {
            let number = index + 1;
            self.send_event(
                &progress,
                ExtractionEvent::Extracting {
                    chunk: number,
                    total: chunks.len(),
                },
            )
            .await;

            if let Some(part) = self
                .extract_chunk(chunk, ticker, source, number, &progress)
                .await
            {
                merged.fill_missing_from(&part);
            }
        }

        fill_missing_derived(&mut merged, None);
        self.send_event(&progress, ExtractionEvent::Success).await;
        Ok(merged)
    }

    async fn extract_chunk(
        &self,
        chunk: &str,
        ticker: Option<&str>,
        source: &str,
        number: usize,
        progress: &Option<Sender<ExtractionEvent>>,
    ) -> Option<CanonicalReport> {
        let mut prompt = build_prompt(chunk, ticker, source);

        for attempt in 0..=MAX_JSON_RETRIES {
            let raw = match self.client.complete_json(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("chunk {}: model call failed: {}", number, e);
                    self.send_event(
                        progress,
                        ExtractionEvent::ChunkSkipped {
                            chunk: number,
                            reason: e.to_string(),
                        },
                    )
                    .await;
                    return None;
                }
            };

            match serde_json::from_str::<Value>(extract_json_block(&raw)) {
                Ok(value) if value.is_object() => return Some(canonicalize(&value)),
                _ if attempt < MAX_JSON_RETRIES => {
                    self.send_event(
                        progress,
                        ExtractionEvent::Retry {
                            chunk: number,
                            attempt: attempt + 1,
                        },
                    )
                    .await;
                    prompt.push_str(RETRY_SUFFIX);
                }
                _ => {
                    warn!(
                        "chunk {}: invalid JSON after {} retries, skipping",
                        number, MAX_JSON_RETRIES
                    );
                    self.send_event(
                        progress,
                        ExtractionEvent::ChunkSkipped {
                            chunk: number,
                            reason: "invalid JSON after retries".to_string(),
                        },
                    )
                    .await;
                    return None;
                }
            }
        }
        None
    }

    async fn send_event(&self, sender: &Option<Sender<ExtractionEvent>>, event: ExtractionEvent) {
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }
}

/// Models sometimes wrap their JSON in prose. Slice out the outermost
/// object; if no braces are found, hand back the input and let the parser
/// report it.
pub fn extract_json_block(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_block_strips_prose() {
        let wrapped = "Sure! Here is the JSON you asked for:\n{\"revenue\": 100}\nHope that helps.";
        assert_eq!(extract_json_block(wrapped), "{\"revenue\": 100}");
    }

    #[test]
    fn test_extract_json_block_keeps_nested_braces() {
        let s = "{\"a\": {\"b\": 1}}";
        assert_eq!(extract_json_block(s), s);
    }

    #[test]
    fn test_extract_json_block_passes_through_without_braces() {
        assert_eq!(extract_json_block("no json here"), "no json here");
        assert_eq!(extract_json_block("} backwards {"), "} backwards {");
    }
}
