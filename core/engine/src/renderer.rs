use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use worklog_schemas::WorkDataDocument;

use crate::error::{EngineError, EngineResult};
use crate::extractor::SectionExtractor;
use crate::heuristic::ExtractionTarget;
use crate::llm_narrator::{prompts, NarrativeGenerator};

/// Stored input a narrative is rendered from
#[derive(Debug, Clone, Copy)]
pub enum RawInput<'a> {
    WorkData(&'a WorkDataDocument),
    Transcript {
        text: &'a str,
        participants: &'a [String],
    },
}

impl RawInput<'_> {
    fn prompt(&self) -> String {
        match self {
            RawInput::WorkData(document) => prompts::work_summary(&document.render()),
            RawInput::Transcript { text, participants } => prompts::meeting_minutes(text, participants),
        }
    }

    fn text(&self) -> String {
        match self {
            RawInput::WorkData(document) => document.render(),
            RawInput::Transcript { text, .. } => text.to_string(),
        }
    }
}

/// Narrative plus whatever sections were extracted from it
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub narrative: String,
    pub sections: BTreeMap<ExtractionTarget, String>,
}

impl DerivedFields {
    pub fn take(&mut self, target: ExtractionTarget) -> Option<String> {
        self.sections.remove(&target)
    }
}

/// The one narrate-then-extract pipeline, used when a record is created
/// and again when it is regenerated.
pub struct Renderer {
    narrator: Arc<dyn NarrativeGenerator>,
    extractor: SectionExtractor,
    timeout: Duration,
}

impl Renderer {
    pub fn new(narrator: Arc<dyn NarrativeGenerator>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            extractor: SectionExtractor::new(narrator.clone(), timeout)?,
            narrator,
            timeout,
        })
    }

    /// Initial generation. A narrator failure aborts with `GenerationFailed`.
    pub async fn render(
        &self,
        raw: RawInput<'_>,
        targets: &[ExtractionTarget],
    ) -> EngineResult<DerivedFields> {
        let narrative = self
            .narrate(raw)
            .await
            .map_err(|reason| EngineError::GenerationFailed { reason })?;
        let sections = self.extractor.extract_all(targets, &narrative).await;

        Ok(DerivedFields {
            narrative,
            sections,
        })
    }

    /// Regeneration. A narrator failure keeps `previous`, or the raw input
    /// text when there is none, and extraction runs on that instead.
    pub async fn rerender(
        &self,
        raw: RawInput<'_>,
        targets: &[ExtractionTarget],
        previous: Option<&str>,
    ) -> DerivedFields {
        let narrative = match self.narrate(raw).await {
            Ok(narrative) => narrative,
            Err(reason) => {
                warn!("Narrator unavailable during regeneration, keeping previous narrative: {}", reason);
                match previous.filter(|p| !p.trim().is_empty()) {
                    Some(previous) => previous.to_string(),
                    None => raw.text(),
                }
            }
        };
        let sections = self.extractor.extract_all(targets, &narrative).await;

        DerivedFields {
            narrative,
            sections,
        }
    }

    async fn narrate(&self, raw: RawInput<'_>) -> std::result::Result<String, String> {
        let prompt = raw.prompt();
        match timeout(self.timeout, self.narrator.complete(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                debug!("Narrative generated ({} characters)", text.len());
                Ok(text.trim().to_string())
            }
            Ok(Ok(_)) => Err("narrator returned an empty narrative".to_string()),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(_) => Err(format!("narrator timed out after {:?}", self.timeout)),
        }
    }
}
