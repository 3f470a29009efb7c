use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use worklog_schemas::{Identity, MeetingId, MeetingMinutes, Role, Summary, SummaryId};

use crate::access::{AccessControl, AccessTarget};
use crate::aggregator::ActivityAggregator;
use crate::config::EngineConfig;
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::llm_narrator::NarrativeGenerator;
use crate::meetings::MeetingMinutesService;
use crate::orchestrator::SummaryOrchestrator;
use crate::period::Period;
use crate::renderer::Renderer;
use crate::sources::SourceClient;
use crate::store::IdentityStore;

/// Outcome of an authorized read. Denial is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "access", content = "value", rename_all = "snake_case")]
pub enum Access<T> {
    Granted(T),
    Denied,
}

impl<T> Access<T> {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }

    pub fn granted(self) -> Option<T> {
        match self {
            Access::Granted(value) => Some(value),
            Access::Denied => None,
        }
    }
}

/// Everything wired together, with requester-aware entry points
pub struct Engine {
    summaries: SummaryOrchestrator,
    meetings: MeetingMinutesService,
    access: AccessControl,
    identities: Arc<dyn IdentityStore>,
}

impl Engine {
    pub fn new(
        summaries: SummaryOrchestrator,
        meetings: MeetingMinutesService,
        access: AccessControl,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            summaries,
            meetings,
            access,
            identities,
        }
    }

    /// Wire every component against one SQLite database
    pub fn with_database(
        db: Arc<Database>,
        sources: Vec<Box<dyn SourceClient>>,
        narrator: Arc<dyn NarrativeGenerator>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let renderer = Arc::new(Renderer::new(narrator, config.llm.timeout())?);
        let aggregator = ActivityAggregator::new(sources, config.source_timeout());
        info!("Engine ready with {} activity sources", aggregator.client_count());

        Ok(Self::new(
            SummaryOrchestrator::new(db.clone(), db.clone(), aggregator, renderer.clone()),
            MeetingMinutesService::new(db.clone(), renderer),
            AccessControl::new(db.clone()),
            db,
        ))
    }

    pub fn summaries(&self) -> &SummaryOrchestrator {
        &self.summaries
    }

    pub fn meetings(&self) -> &MeetingMinutesService {
        &self.meetings
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn identity(&self, username: &str) -> EngineResult<Identity> {
        self.identities
            .find_identity(username)?
            .ok_or_else(|| EngineError::not_found("identity", username))
    }

    pub fn can_access(&self, requester: &str, target: &str) -> EngineResult<bool> {
        let requester = self.identity(requester)?;
        Ok(self.access.can_access(&requester, AccessTarget::Identity(target)))
    }

    /// Generate (or fetch) the owner's summary for `period` if the requester
    /// may see the owner. Nothing is fetched or narrated on denial.
    pub async fn generate_for(
        &self,
        requester: &str,
        owner: &str,
        period: Period,
    ) -> EngineResult<Access<Summary>> {
        if !self.may_see(requester, owner)? {
            return Ok(Access::Denied);
        }
        Ok(Access::Granted(self.summaries.generate(owner, period).await?))
    }

    pub async fn generate_daily_for(
        &self,
        requester: &str,
        owner: &str,
        date: NaiveDate,
    ) -> EngineResult<Access<Summary>> {
        self.generate_for(requester, owner, Period::day(date)).await
    }

    pub async fn generate_weekly_for(
        &self,
        requester: &str,
        owner: &str,
        week_start: NaiveDate,
    ) -> EngineResult<Access<Summary>> {
        self.generate_for(requester, owner, Period::week(week_start)?).await
    }

    pub async fn generate_monthly_for(
        &self,
        requester: &str,
        owner: &str,
        year: i32,
        month: u32,
    ) -> EngineResult<Access<Summary>> {
        self.generate_for(requester, owner, Period::month(year, month)?).await
    }

    pub async fn generate_yearly_for(
        &self,
        requester: &str,
        owner: &str,
        year: i32,
    ) -> EngineResult<Access<Summary>> {
        self.generate_for(requester, owner, Period::year(year)?).await
    }

    pub fn summary_for(&self, requester: &str, id: &SummaryId) -> EngineResult<Access<Summary>> {
        let requester = self.identity(requester)?;
        let summary = self.summaries.get_by_id(id)?;
        Ok(gate(self.access.can_access(&requester, AccessTarget::Summary(&summary)), summary))
    }

    pub fn summaries_for(
        &self,
        requester: &str,
        owner: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Access<Vec<Summary>>> {
        let requester = self.identity(requester)?;
        if !self.access.can_access(&requester, AccessTarget::Identity(owner)) {
            return Ok(Access::Denied);
        }
        Ok(Access::Granted(self.summaries.get_by_owner_and_range(owner, start, end)?))
    }

    /// Direct reports' summaries. Only managers, leaders and admins may ask,
    /// and only for a manager they can see.
    pub fn team_summaries_for(
        &self,
        requester: &str,
        manager: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Access<Vec<Summary>>> {
        if !self.may_see_team(requester, manager)? {
            return Ok(Access::Denied);
        }
        Ok(Access::Granted(self.summaries.team_summaries(manager, start, end)?))
    }

    pub fn meetings_for(
        &self,
        requester: &str,
        username: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Access<Vec<MeetingMinutes>>> {
        if !self.may_see(requester, username)? {
            return Ok(Access::Denied);
        }
        Ok(Access::Granted(
            self.meetings.meetings_for_participant(username, start, end)?,
        ))
    }

    /// Meetings attended by the manager's direct reports, gated like
    /// `team_summaries_for`
    pub fn team_meetings_for(
        &self,
        requester: &str,
        manager: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Access<Vec<MeetingMinutes>>> {
        if !self.may_see_team(requester, manager)? {
            return Ok(Access::Denied);
        }
        self.identity(manager)?;
        Ok(Access::Granted(self.meetings.team_meetings(manager, start, end)?))
    }

    pub fn search_meetings_for(
        &self,
        requester: &str,
        username: &str,
        query: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Access<Vec<MeetingMinutes>>> {
        if !self.may_see(requester, username)? {
            return Ok(Access::Denied);
        }
        Ok(Access::Granted(self.meetings.search(username, query, start, end)?))
    }

    pub fn meeting_for(&self, requester: &str, id: &MeetingId) -> EngineResult<Access<MeetingMinutes>> {
        let requester = self.identity(requester)?;
        let meeting = self.meetings.get(id)?;
        Ok(gate(self.access.can_access(&requester, AccessTarget::Meeting(&meeting)), meeting))
    }

    pub async fn regenerate_summary_for(
        &self,
        requester: &str,
        id: &SummaryId,
    ) -> EngineResult<Access<Summary>> {
        if !self.summary_for(requester, id)?.is_granted() {
            return Ok(Access::Denied);
        }
        Ok(Access::Granted(self.summaries.regenerate(id).await?))
    }

    pub async fn regenerate_meeting_for(
        &self,
        requester: &str,
        id: &MeetingId,
    ) -> EngineResult<Access<MeetingMinutes>> {
        if !self.meeting_for(requester, id)?.is_granted() {
            return Ok(Access::Denied);
        }
        Ok(Access::Granted(self.meetings.regenerate(id).await?))
    }

    fn may_see(&self, requester: &str, target: &str) -> EngineResult<bool> {
        let requester = self.identity(requester)?;
        let granted = self.access.can_access(&requester, AccessTarget::Identity(target));
        if !granted {
            debug!("{} denied access to {}", requester.username, target);
        }
        Ok(granted)
    }

    fn may_see_team(&self, requester: &str, manager: &str) -> EngineResult<bool> {
        let identity = self.identity(requester)?;
        if !matches!(identity.role, Role::Manager | Role::Leader | Role::Admin) {
            debug!("{} has no team view", identity.username);
            return Ok(false);
        }
        Ok(self.access.can_access(&identity, AccessTarget::Identity(manager)))
    }
}

fn gate<T>(granted: bool, value: T) -> Access<T> {
    if granted {
        Access::Granted(value)
    } else {
        Access::Denied
    }
}
