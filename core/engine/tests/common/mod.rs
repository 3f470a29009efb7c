#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use worklog_engine::{
    Database, Engine, EngineConfig, IdentityStore, LLMConfig, NarrativeGenerator, SourceClient,
};
use worklog_schemas::{
    generate_summary_id, ActivityKind, ActivityRecord, Identity, Role, SourceKind, Summary,
    SummaryType, WorkDataDocument,
};

/// Returns the same records on every call
pub struct StaticSource {
    pub source: SourceKind,
    pub records: Vec<ActivityRecord>,
}

#[async_trait]
impl SourceClient for StaticSource {
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn fetch_activity(
        &self,
        handle: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.author == handle)
            .cloned()
            .collect())
    }
}

pub struct FailingSource(pub SourceKind);

#[async_trait]
impl SourceClient for FailingSource {
    fn source(&self) -> SourceKind {
        self.0
    }

    async fn fetch_activity(
        &self,
        _handle: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        anyhow::bail!("401 Unauthorized")
    }
}

pub struct HangingSource(pub SourceKind);

#[async_trait]
impl SourceClient for HangingSource {
    fn source(&self) -> SourceKind {
        self.0
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

/// Answers every prompt with fixed prose and counts calls
#[derive(Default)]
pub struct ScriptedNarrator {
    pub calls: AtomicUsize,
}

pub const NARRATIVE: &str = "Alice completed the parser rewrite.\n\
    Key discussion: rollout order\n\
    Action items: Bob to tag the release\n\
    We agreed to ship on Friday";

#[async_trait]
impl NarrativeGenerator for ScriptedNarrator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(NARRATIVE.to_string())
    }
}

impl ScriptedNarrator {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Like `ScriptedNarrator`, but yields for a while before answering so that
/// concurrent callers overlap inside the generation path
#[derive(Default)]
pub struct SlowNarrator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl NarrativeGenerator for SlowNarrator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(NARRATIVE.to_string())
    }
}

impl SlowNarrator {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct FailingNarrator;

#[async_trait]
impl NarrativeGenerator for FailingNarrator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("connection refused")
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        db_path: PathBuf::from(":memory:"),
        source_timeout_secs: 1,
        llm: LLMConfig {
            timeout_secs: 1,
            ..LLMConfig::default()
        },
    }
}

pub fn engine_with(
    db: Arc<Database>,
    sources: Vec<Box<dyn SourceClient>>,
    narrator: Arc<dyn NarrativeGenerator>,
) -> Engine {
    Engine::with_database(db, sources, narrator, &test_config()).unwrap()
}

/// root (admin), lena (leader) > bob (manager) > alice, carl; mo > zed
pub fn seed_hierarchy(db: &Database) {
    let people = [
        Identity::new("root", Role::Admin),
        Identity::new("lena", Role::Leader),
        Identity::new("bob", Role::Manager).with_manager("lena"),
        Identity::new("alice", Role::Engineer).with_manager("bob"),
        Identity::new("carl", Role::Engineer).with_manager("bob"),
        Identity::new("mo", Role::Manager),
        Identity::new("zed", Role::Engineer).with_manager("mo"),
    ];
    for person in &people {
        db.upsert_identity(person).unwrap();
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn commit(author: &str, at: DateTime<Utc>, description: &str, repo: &str) -> ActivityRecord {
    ActivityRecord {
        source: SourceKind::CodeHost,
        kind: ActivityKind::Commit,
        author: author.to_string(),
        occurred_at: at,
        description: description.to_string(),
        provenance: Some(repo.to_string()),
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Empty clients for every source except code hosting
pub fn sources_with_commits(records: Vec<ActivityRecord>) -> Vec<Box<dyn SourceClient>> {
    SourceKind::ALL
        .into_iter()
        .map(|source| {
            let records = if source == SourceKind::CodeHost {
                records.clone()
            } else {
                Vec::new()
            };
            Box::new(StaticSource { source, records }) as Box<dyn SourceClient>
        })
        .collect()
}

/// A stored daily summary with the given scores
pub fn stored_daily(
    owner: &str,
    day: NaiveDate,
    commits: &str,
    productivity: Option<u8>,
    collaboration: Option<u8>,
) -> Summary {
    let mut document = WorkDataDocument::new();
    for kind in ActivityKind::ALL {
        document.set_section(kind, kind.placeholder());
    }
    document.set_section(ActivityKind::Commit, commits);

    let now = Utc::now();
    Summary {
        id: generate_summary_id(),
        owner: owner.to_string(),
        summary_date: day,
        summary_type: SummaryType::Daily,
        document,
        narrative: format!("{} worked on {}", owner, day),
        key_achievements: None,
        productivity_score: productivity,
        collaboration_score: collaboration,
        created_at: now,
        updated_at: now,
    }
}
