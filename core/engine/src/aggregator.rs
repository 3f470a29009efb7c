use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use worklog_schemas::{ActivityKind, ActivityRecord, Identity, WorkDataDocument};

use crate::sources::SourceClient;

/// Collects activity from every configured source into one document.
///
/// A failing, hanging or unconfigured source contributes nothing; the
/// section then renders its placeholder.
pub struct ActivityAggregator {
    clients: Vec<Box<dyn SourceClient>>,
    fetch_timeout: Duration,
}

impl ActivityAggregator {
    pub fn new(clients: Vec<Box<dyn SourceClient>>, fetch_timeout: Duration) -> Self {
        Self {
            clients,
            fetch_timeout,
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub async fn aggregate(
        &self,
        identity: &Identity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WorkDataDocument {
        let mut collected = Vec::new();

        for client in &self.clients {
            let source = client.source();
            let handle = identity.handle_for(source);

            match timeout(self.fetch_timeout, client.fetch_activity(handle, start, end)).await {
                Ok(Ok(records)) => {
                    debug!("{} returned {} records for {}", source.as_str(), records.len(), handle);
                    collected.extend(
                        records
                            .into_iter()
                            .filter(|r| r.occurred_at >= start && r.occurred_at <= end),
                    );
                }
                Ok(Err(e)) => {
                    warn!("Source {} failed for {}: {:#}", source.as_str(), handle, e);
                }
                Err(_) => {
                    warn!(
                        "Source {} timed out after {:?} for {}",
                        source.as_str(),
                        self.fetch_timeout,
                        handle
                    );
                }
            }
        }

        info!(
            "Aggregated {} records for {} from {} sources",
            collected.len(),
            identity.username,
            self.clients.len()
        );
        build_document(collected)
    }
}

/// Bucket records by kind, oldest first, and render every section.
pub fn build_document(records: Vec<ActivityRecord>) -> WorkDataDocument {
    let mut buckets: BTreeMap<ActivityKind, Vec<ActivityRecord>> = BTreeMap::new();
    for record in records {
        buckets.entry(record.kind).or_default().push(record);
    }

    let mut document = WorkDataDocument::new();
    for kind in ActivityKind::ALL {
        let mut records = buckets.remove(&kind).unwrap_or_default();
        records.sort_by_key(|r| r.occurred_at);
        document.set_section(kind, format_section(kind, &records));
    }
    document
}

pub fn format_section(kind: ActivityKind, records: &[ActivityRecord]) -> String {
    if records.is_empty() {
        return kind.placeholder().to_string();
    }

    records
        .iter()
        .map(format_record)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One bullet line: description plus provenance tag
pub fn format_record(record: &ActivityRecord) -> String {
    let description = record.description.lines().next().unwrap_or("").trim();
    let line = match record.kind {
        ActivityKind::Review => format!("- Reviewed: {}", description),
        _ => format!("- {}", description),
    };

    match record.provenance.as_deref() {
        Some(tag) if record.kind == ActivityKind::PullRequest => format!("{} (#{})", line, tag),
        Some(tag) => format!("{} ({})", line, tag),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use worklog_schemas::{Role, SourceKind};

    fn record(kind: ActivityKind, description: &str, provenance: Option<&str>, hour: u32) -> ActivityRecord {
        ActivityRecord {
            source: SourceKind::CodeHost,
            kind,
            author: "alice".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            description: description.to_string(),
            provenance: provenance.map(str::to_string),
        }
    }

    struct Fixed(Vec<ActivityRecord>);

    #[async_trait]
    impl SourceClient for Fixed {
        fn source(&self) -> SourceKind {
            SourceKind::CodeHost
        }

        async fn fetch_activity(
            &self,
            _handle: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<ActivityRecord>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl SourceClient for Broken {
        fn source(&self) -> SourceKind {
            SourceKind::Chat
        }

        async fn fetch_activity(
            &self,
            _handle: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<ActivityRecord>> {
            anyhow::bail!("chat API returned 503")
        }
    }

    struct Stalled;

    #[async_trait]
    impl SourceClient for Stalled {
        fn source(&self) -> SourceKind {
            SourceKind::Wiki
        }

        async fn fetch_activity(
            &self,
            _handle: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<ActivityRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_format_record_variants() {
        let commit = record(ActivityKind::Commit, "Fix parser\n\nlong body", Some("core"), 9);
        assert_eq!(format_record(&commit), "- Fix parser (core)");

        let pr = record(ActivityKind::PullRequest, "Add scoring", Some("42"), 9);
        assert_eq!(format_record(&pr), "- Add scoring (#42)");

        let review = record(ActivityKind::Review, "Tidy imports", None, 9);
        assert_eq!(format_record(&review), "- Reviewed: Tidy imports");
    }

    #[test]
    fn test_empty_sections_render_placeholders() {
        let document = build_document(vec![record(ActivityKind::Commit, "Fix", Some("core"), 9)]);

        assert_eq!(document.section(ActivityKind::Commit), Some("- Fix (core)"));
        for kind in ActivityKind::ALL.into_iter().skip(1) {
            assert_eq!(document.section(kind), Some(kind.placeholder()));
        }
    }

    #[test]
    fn test_records_sorted_oldest_first() {
        let document = build_document(vec![
            record(ActivityKind::Ticket, "later", Some("ENG-2"), 15),
            record(ActivityKind::Ticket, "earlier", Some("ENG-1"), 8),
        ]);
        assert_eq!(
            document.section(ActivityKind::Ticket),
            Some("- earlier (ENG-1)\n- later (ENG-2)")
        );
    }

    #[tokio::test]
    async fn test_failing_and_stalled_sources_are_absorbed() {
        let aggregator = ActivityAggregator::new(
            vec![
                Box::new(Broken),
                Box::new(Stalled),
                Box::new(Fixed(vec![record(ActivityKind::Commit, "Fix", Some("core"), 9)])),
            ],
            Duration::from_millis(50),
        );
        let alice = Identity::new("alice", Role::Engineer);
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();

        let document = aggregator.aggregate(&alice, start, end).await;
        assert_eq!(document.section(ActivityKind::Commit), Some("- Fix (core)"));
        assert_eq!(
            document.section(ActivityKind::ChatMessage),
            Some(ActivityKind::ChatMessage.placeholder())
        );
    }

    #[tokio::test]
    async fn test_out_of_range_records_dropped() {
        let mut stray = record(ActivityKind::Commit, "yesterday", Some("core"), 9);
        stray.occurred_at = Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0).unwrap();
        let aggregator = ActivityAggregator::new(vec![Box::new(Fixed(vec![stray]))], Duration::from_secs(1));

        let alice = Identity::new("alice", Role::Engineer);
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let document = aggregator.aggregate(&alice, start, end).await;

        assert!(!document.has_activity(ActivityKind::Commit));
    }
}
