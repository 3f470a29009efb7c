use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::heuristic::{ExtractionTarget, KeywordHeuristic};
use crate::llm_narrator::{prompts, NarrativeGenerator};

/// Derives sections from a narrative: asks the narrator first, falls back
/// to the keyword heuristic on error, timeout or a blank answer.
pub struct SectionExtractor {
    narrator: Arc<dyn NarrativeGenerator>,
    heuristic: KeywordHeuristic,
    timeout: Duration,
}

impl SectionExtractor {
    pub fn new(narrator: Arc<dyn NarrativeGenerator>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            narrator,
            heuristic: KeywordHeuristic::new()?,
            timeout,
        })
    }

    pub async fn extract(&self, target: ExtractionTarget, narrative: &str) -> String {
        let prompt = prompts::extract_section(target.instruction(), narrative, target.list_hint());

        match timeout(self.timeout, self.narrator.complete(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                debug!("Narrator extracted {:?}", target);
                text.trim().to_string()
            }
            Ok(Ok(_)) => {
                warn!("Narrator returned nothing for {:?}, using keyword fallback", target);
                self.heuristic.extract(target, narrative)
            }
            Ok(Err(e)) => {
                warn!("Failed to extract {:?}, using keyword fallback: {:#}", target, e);
                self.heuristic.extract(target, narrative)
            }
            Err(_) => {
                warn!("Extraction of {:?} timed out, using keyword fallback", target);
                self.heuristic.extract(target, narrative)
            }
        }
    }

    pub async fn extract_all(
        &self,
        targets: &[ExtractionTarget],
        narrative: &str,
    ) -> BTreeMap<ExtractionTarget, String> {
        let mut sections = BTreeMap::new();
        for target in targets {
            let text = self.extract(*target, narrative).await;
            sections.insert(*target, text);
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::NO_ITEMS_FOUND;
    use async_trait::async_trait;

    struct Scripted(&'static str);

    #[async_trait]
    impl NarrativeGenerator for Scripted {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl NarrativeGenerator for Down {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_narrator_answer_used_when_available() {
        let extractor = SectionExtractor::new(Arc::new(Scripted("- ship it\n")), Duration::from_secs(1)).unwrap();
        let text = extractor.extract(ExtractionTarget::Decisions, "whatever").await;
        assert_eq!(text, "- ship it");
    }

    #[tokio::test]
    async fn test_blank_answer_falls_back() {
        let extractor = SectionExtractor::new(Arc::new(Scripted("   ")), Duration::from_secs(1)).unwrap();
        let text = extractor
            .extract(ExtractionTarget::Decisions, "We decided to wait")
            .await;
        assert_eq!(text, "We decided to wait");
    }

    #[tokio::test]
    async fn test_failure_falls_back_for_every_target() {
        let extractor = SectionExtractor::new(Arc::new(Down), Duration::from_secs(1)).unwrap();
        let sections = extractor
            .extract_all(&ExtractionTarget::MEETING, "Action: Carol files the ticket")
            .await;

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[&ExtractionTarget::ActionItems], "Action: Carol files the ticket");
        assert_eq!(sections[&ExtractionTarget::KeyPoints], NO_ITEMS_FOUND);
        assert_eq!(sections[&ExtractionTarget::Decisions], NO_ITEMS_FOUND);
    }
}
