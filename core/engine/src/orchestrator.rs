use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use worklog_schemas::{
    generate_summary_id, ActivityKind, Identity, Summary, SummaryId, SummaryKey, SummaryType,
    WorkDataDocument,
};

use crate::aggregator::ActivityAggregator;
use crate::error::{EngineError, EngineResult};
use crate::heuristic::ExtractionTarget;
use crate::locks::KeyLocks;
use crate::period::Period;
use crate::renderer::{RawInput, Renderer};
use crate::scoring::{score, truncated_mean};
use crate::store::{IdentityStore, SummaryStore};

/// Idempotent generate/retrieve lifecycle for summaries.
///
/// A key is either absent or holds exactly one complete summary. Failed
/// attempts persist nothing, so the next call starts over.
pub struct SummaryOrchestrator {
    summaries: Arc<dyn SummaryStore>,
    identities: Arc<dyn IdentityStore>,
    aggregator: ActivityAggregator,
    renderer: Arc<Renderer>,
    locks: KeyLocks,
}

impl SummaryOrchestrator {
    pub fn new(
        summaries: Arc<dyn SummaryStore>,
        identities: Arc<dyn IdentityStore>,
        aggregator: ActivityAggregator,
        renderer: Arc<Renderer>,
    ) -> Self {
        Self {
            summaries,
            identities,
            aggregator,
            renderer,
            locks: KeyLocks::new(),
        }
    }

    pub async fn generate_daily(&self, owner: &str, date: NaiveDate) -> EngineResult<Summary> {
        self.generate(owner, Period::day(date)).await
    }

    pub async fn generate_weekly(&self, owner: &str, week_start: NaiveDate) -> EngineResult<Summary> {
        self.generate(owner, Period::week(week_start)?).await
    }

    pub async fn generate_monthly(&self, owner: &str, year: i32, month: u32) -> EngineResult<Summary> {
        self.generate(owner, Period::month(year, month)?).await
    }

    pub async fn generate_yearly(&self, owner: &str, year: i32) -> EngineResult<Summary> {
        self.generate(owner, Period::year(year)?).await
    }

    /// Existing summary for the period's key, or a freshly generated one
    pub async fn generate(&self, owner: &str, period: Period) -> EngineResult<Summary> {
        let identity = self.identity(owner)?;
        let key = SummaryKey {
            owner: identity.username.clone(),
            date: period.start,
            summary_type: period.summary_type,
        };

        let _guard = self.locks.acquire(&key).await;

        if let Some(existing) = self
            .summaries
            .find_by_key(&key.owner, key.date, key.summary_type)?
        {
            debug!("Summary {} already exists for {}", existing.id, key);
            return Ok(existing);
        }

        info!("Generating {} summary for {}", period.summary_type.as_str(), key);

        let summary = match period.child_type() {
            None => self.build_daily(&identity, period).await?,
            Some(child_type) => self.build_roll_up(&identity, period, child_type).await?,
        };

        let stored = self.summaries.insert_if_absent(&summary)?;
        if stored.id != summary.id {
            debug!("Lost insert race for {}, returning {}", key, stored.id);
        } else {
            info!("Stored summary {} for {}", stored.id, key);
        }
        Ok(stored)
    }

    async fn build_daily(&self, identity: &Identity, period: Period) -> EngineResult<Summary> {
        let (start, end) = period.bounds();
        let document = self.aggregator.aggregate(identity, start, end).await;
        let scores = score(&document);

        let derived = self.renderer.render(RawInput::WorkData(&document), &[]).await?;

        Ok(new_summary(
            identity,
            period,
            document,
            derived.narrative,
            None,
            Some(scores.productivity),
            Some(scores.collaboration),
        ))
    }

    async fn build_roll_up(
        &self,
        identity: &Identity,
        period: Period,
        child_type: SummaryType,
    ) -> EngineResult<Summary> {
        let children = self.summaries.find_in_range(
            &identity.username,
            Some(child_type),
            period.start,
            period.end,
        )?;
        debug!(
            "Rolling up {} {} summaries for {}",
            children.len(),
            child_type.as_str(),
            identity.username
        );

        let document = concat_documents(&children);
        let productivity = truncated_mean(children.iter().filter_map(|c| c.productivity_score));
        let collaboration = truncated_mean(children.iter().filter_map(|c| c.collaboration_score));

        let mut derived = self
            .renderer
            .render(RawInput::WorkData(&document), &[ExtractionTarget::KeyAchievements])
            .await?;
        let key_achievements = derived.take(ExtractionTarget::KeyAchievements);

        Ok(new_summary(
            identity,
            period,
            document,
            derived.narrative,
            key_achievements,
            productivity,
            collaboration,
        ))
    }

    /// Re-render the narrative from the stored document, in place
    pub async fn regenerate(&self, id: &SummaryId) -> EngineResult<Summary> {
        let summary = self.get_by_id(id)?;
        let _guard = self.locks.acquire(&summary.key()).await;

        // Re-read under the lock so a concurrent regenerate is not overwritten with stale fields
        let mut summary = self.get_by_id(id)?;
        if summary.document.is_empty() {
            return Err(EngineError::NoRawInput { id: id.to_string() });
        }

        info!("Regenerating summary {}", id);

        let targets: &[ExtractionTarget] = match summary.summary_type {
            SummaryType::Daily => &[],
            _ => &[ExtractionTarget::KeyAchievements],
        };
        let mut derived = self
            .renderer
            .rerender(
                RawInput::WorkData(&summary.document),
                targets,
                Some(summary.narrative.as_str()),
            )
            .await;

        summary.narrative = derived.narrative.clone();
        if summary.summary_type != SummaryType::Daily {
            summary.key_achievements = derived.take(ExtractionTarget::KeyAchievements);
        }
        summary.updated_at = Utc::now();

        self.summaries.update_derived(&summary)?;
        Ok(summary)
    }

    pub fn get_by_id(&self, id: &SummaryId) -> EngineResult<Summary> {
        self.summaries
            .find_by_id(id)?
            .ok_or_else(|| EngineError::not_found("summary", id.to_string()))
    }

    /// All of an owner's summaries dated within `[start, end]`, any type
    pub fn get_by_owner_and_range(
        &self,
        owner: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Summary>> {
        Ok(self.summaries.find_in_range(owner, None, start, end)?)
    }

    /// Summaries of the manager's direct reports within `[start, end]`
    pub fn team_summaries(
        &self,
        manager: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<Summary>> {
        self.identity(manager)?;

        let mut team = Vec::new();
        for report in self.identities.find_direct_reports(manager)? {
            team.extend(self.summaries.find_in_range(&report.username, None, start, end)?);
        }
        Ok(team)
    }

    fn identity(&self, username: &str) -> EngineResult<Identity> {
        self.identities
            .find_identity(username)?
            .ok_or_else(|| EngineError::not_found("identity", username))
    }
}

fn new_summary(
    identity: &Identity,
    period: Period,
    document: WorkDataDocument,
    narrative: String,
    key_achievements: Option<String>,
    productivity_score: Option<u8>,
    collaboration_score: Option<u8>,
) -> Summary {
    let now = Utc::now();
    Summary {
        id: generate_summary_id(),
        owner: identity.username.clone(),
        summary_date: period.start,
        summary_type: period.summary_type,
        document,
        narrative,
        key_achievements,
        productivity_score,
        collaboration_score,
        created_at: now,
        updated_at: now,
    }
}

/// Newline-join each section across children, in child order.
pub fn concat_documents(children: &[Summary]) -> WorkDataDocument {
    let mut document = WorkDataDocument::new();
    for kind in ActivityKind::ALL {
        let parts: Vec<&str> = children
            .iter()
            .filter_map(|child| child.document.section(kind))
            .collect();
        document.set_section(kind, parts.join("\n"));
    }
    document
}
