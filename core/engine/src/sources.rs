use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use worklog_schemas::{ActivityRecord, SourceKind};

/// Read-only client for one upstream source.
///
/// Implementations should swallow their own transport errors, but the
/// aggregator tolerates an `Err` (or a hang) just the same.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn source(&self) -> SourceKind;

    /// Records authored by `handle` within `[start, end]` inclusive
    async fn fetch_activity(
        &self,
        handle: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>>;
}

/// Serves records from an exported JSON array of `ActivityRecord`s.
pub struct JsonFileSource {
    source: SourceKind,
    records: Arc<Vec<ActivityRecord>>,
}

impl JsonFileSource {
    pub fn new(source: SourceKind, records: Arc<Vec<ActivityRecord>>) -> Self {
        Self { source, records }
    }

    pub fn load(path: &Path) -> Result<Arc<Vec<ActivityRecord>>> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read activity file {}", path.display()))?;
        let records: Vec<ActivityRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse activity file {}", path.display()))?;
        Ok(Arc::new(records))
    }

    /// One client per source kind, all sharing a single parsed file
    pub fn all_sources(path: &Path) -> Result<Vec<Box<dyn SourceClient>>> {
        let records = Self::load(path)?;
        Ok(SourceKind::ALL
            .into_iter()
            .map(|source| Box::new(Self::new(source, records.clone())) as Box<dyn SourceClient>)
            .collect())
    }
}

#[async_trait]
impl SourceClient for JsonFileSource {
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn fetch_activity(
        &self,
        handle: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        let matched: Vec<ActivityRecord> = self
            .records
            .iter()
            .filter(|r| r.source == self.source && r.author == handle)
            .filter(|r| r.occurred_at >= start && r.occurred_at <= end)
            .cloned()
            .collect();

        debug!(
            "{} file records for {} from {}",
            matched.len(),
            handle,
            self.source.as_str()
        );
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use worklog_schemas::ActivityKind;

    fn record(source: SourceKind, author: &str, hour: u32) -> ActivityRecord {
        ActivityRecord {
            source,
            kind: ActivityKind::Commit,
            author: author.to_string(),
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            description: "tidy".to_string(),
            provenance: Some("repo".to_string()),
        }
    }

    #[tokio::test]
    async fn test_file_source_filters_by_source_author_and_range() {
        let records = Arc::new(vec![
            record(SourceKind::CodeHost, "alice", 9),
            record(SourceKind::CodeHost, "bob", 9),
            record(SourceKind::Chat, "alice", 9),
            record(SourceKind::CodeHost, "alice", 23),
        ]);
        let client = JsonFileSource::new(SourceKind::CodeHost, records);

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let found = client.fetch_activity("alice", start, end).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].author, "alice");
    }

    #[test]
    fn test_all_sources_reads_file_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("activity.json");
        let body = serde_json::to_string(&vec![record(SourceKind::Wiki, "alice", 10)]).unwrap();
        std::fs::write(&path, body).unwrap();

        let clients = JsonFileSource::all_sources(&path).unwrap();
        assert_eq!(clients.len(), SourceKind::ALL.len());
        assert_eq!(clients[0].source(), SourceKind::CodeHost);
    }
}
