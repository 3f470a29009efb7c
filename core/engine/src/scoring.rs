use serde::{Deserialize, Serialize};
use worklog_schemas::{ActivityKind, WorkDataDocument};

pub const MAX_SCORE: u8 = 100;

const PRODUCTIVITY_WEIGHTS: [(ActivityKind, u32); 5] = [
    (ActivityKind::Commit, 30),
    (ActivityKind::PullRequest, 25),
    (ActivityKind::Ticket, 20),
    (ActivityKind::Document, 15),
    (ActivityKind::CustomerIssue, 10),
];

const COLLABORATION_WEIGHTS: [(ActivityKind, u32); 4] = [
    (ActivityKind::Review, 30),
    (ActivityKind::ChatMessage, 25),
    (ActivityKind::Meeting, 25),
    (ActivityKind::CustomerIssue, 20),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub productivity: u8,
    pub collaboration: u8,
}

/// Presence-weighted scores, each capped at 100.
pub fn score(document: &WorkDataDocument) -> Scores {
    Scores {
        productivity: weighted(document, &PRODUCTIVITY_WEIGHTS),
        collaboration: weighted(document, &COLLABORATION_WEIGHTS),
    }
}

fn weighted(document: &WorkDataDocument, weights: &[(ActivityKind, u32)]) -> u8 {
    let total: u32 = weights
        .iter()
        .filter(|(kind, _)| document.has_activity(*kind))
        .map(|(_, points)| points)
        .sum();
    total.min(u32::from(MAX_SCORE)) as u8
}

/// Integer mean truncated toward zero; `None` when nothing contributed
pub fn truncated_mean(values: impl IntoIterator<Item = u8>) -> Option<u8> {
    let (sum, count) = values
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), v| (sum + u32::from(v), count + 1));
    if count == 0 {
        None
    } else {
        Some((sum / count) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with(kinds: &[ActivityKind]) -> WorkDataDocument {
        let mut doc = WorkDataDocument::new();
        for kind in ActivityKind::ALL {
            if kinds.contains(&kind) {
                doc.set_section(kind, "- something (somewhere)");
            } else {
                doc.set_section(kind, kind.placeholder());
            }
        }
        doc
    }

    #[test]
    fn test_empty_document_scores_zero() {
        let scores = score(&document_with(&[]));
        assert_eq!(scores, Scores { productivity: 0, collaboration: 0 });
        assert_eq!(score(&WorkDataDocument::new()).productivity, 0);
    }

    #[test]
    fn test_full_document_scores_hundred() {
        let scores = score(&document_with(&ActivityKind::ALL));
        assert_eq!(scores, Scores { productivity: 100, collaboration: 100 });
    }

    #[test]
    fn test_commits_only() {
        let scores = score(&document_with(&[ActivityKind::Commit]));
        assert_eq!(scores.productivity, 30);
        assert_eq!(scores.collaboration, 0);
    }

    #[test]
    fn test_customer_issues_count_for_both() {
        let scores = score(&document_with(&[ActivityKind::CustomerIssue]));
        assert_eq!(scores.productivity, 10);
        assert_eq!(scores.collaboration, 20);
    }

    #[test]
    fn test_scores_bounded_for_every_subset() {
        for mask in 0u32..(1 << ActivityKind::ALL.len()) {
            let kinds: Vec<ActivityKind> = ActivityKind::ALL
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| k)
                .collect();
            let scores = score(&document_with(&kinds));
            assert!(scores.productivity <= MAX_SCORE);
            assert!(scores.collaboration <= MAX_SCORE);
        }
    }

    #[test]
    fn test_truncated_mean() {
        assert_eq!(truncated_mean([80, 81]), Some(80));
        assert_eq!(truncated_mean([100, 100, 99]), Some(99));
        assert_eq!(truncated_mean(std::iter::empty()), None);
    }
}
