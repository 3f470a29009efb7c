use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stored when no line of the narrative matches a section's keywords
pub const NO_ITEMS_FOUND: &str = "No specific items found.";

/// Section derived from a generated narrative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTarget {
    KeyPoints,
    ActionItems,
    Decisions,
    KeyAchievements,
}

impl ExtractionTarget {
    pub const MEETING: [ExtractionTarget; 3] = [
        ExtractionTarget::KeyPoints,
        ExtractionTarget::ActionItems,
        ExtractionTarget::Decisions,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            ExtractionTarget::KeyPoints => &["key", "discussion", "points"],
            ExtractionTarget::ActionItems => &["action", "items", "todo"],
            ExtractionTarget::Decisions => &["decision", "decided", "agreed"],
            ExtractionTarget::KeyAchievements => {
                &["achievement", "accomplished", "completed", "delivered"]
            }
        }
    }

    /// Lead-in for the extraction prompt
    pub fn instruction(&self) -> &'static str {
        match self {
            ExtractionTarget::KeyPoints => "Extract only the key discussion points from the following text",
            ExtractionTarget::ActionItems => "Extract only the action items from the following text",
            ExtractionTarget::Decisions => "Extract only the decisions made from the following text",
            ExtractionTarget::KeyAchievements => "Extract only the key achievements from the following work summary",
        }
    }

    pub fn list_hint(&self) -> &'static str {
        match self {
            ExtractionTarget::KeyPoints => "key points discussed",
            ExtractionTarget::ActionItems => "action items with responsible parties if mentioned",
            ExtractionTarget::Decisions => "decisions made",
            ExtractionTarget::KeyAchievements => "concrete achievements",
        }
    }
}

/// Line-level keyword classifier used when the narrator cannot extract.
/// Lossy on purpose; never fails once built.
pub struct KeywordHeuristic {
    patterns: Vec<(ExtractionTarget, Regex)>,
}

impl KeywordHeuristic {
    pub fn new() -> Result<Self> {
        let targets = [
            ExtractionTarget::KeyPoints,
            ExtractionTarget::ActionItems,
            ExtractionTarget::Decisions,
            ExtractionTarget::KeyAchievements,
        ];

        let mut patterns = Vec::with_capacity(targets.len());
        for target in targets {
            let alternation = target
                .keywords()
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = Regex::new(&format!("(?i)(?:{})", alternation))
                .with_context(|| format!("Invalid keyword pattern for {:?}", target))?;
            patterns.push((target, pattern));
        }

        Ok(Self { patterns })
    }

    /// Keep every line mentioning one of the target's keywords
    pub fn extract(&self, target: ExtractionTarget, text: &str) -> String {
        let Some((_, pattern)) = self.patterns.iter().find(|(t, _)| *t == target) else {
            return NO_ITEMS_FOUND.to_string();
        };

        let kept: Vec<&str> = text
            .lines()
            .filter(|line| pattern.is_match(line))
            .map(str::trim)
            .collect();

        debug!("Keyword fallback kept {} lines for {:?}", kept.len(), target);

        if kept.is_empty() {
            NO_ITEMS_FOUND.to_string()
        } else {
            kept.join("\n")
        }
    }
}
