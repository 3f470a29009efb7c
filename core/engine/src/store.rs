use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use worklog_schemas::{Identity, MeetingId, MeetingMinutes, Summary, SummaryId, SummaryType};

/// Persistence for generated summaries.
///
/// `(owner, summary_date, summary_type)` is unique. `insert_if_absent`
/// must reject a second writer for the same key and hand back the row
/// that won.
pub trait SummaryStore: Send + Sync {
    fn find_by_key(
        &self,
        owner: &str,
        date: NaiveDate,
        summary_type: SummaryType,
    ) -> Result<Option<Summary>>;

    fn find_by_id(&self, id: &SummaryId) -> Result<Option<Summary>>;

    /// Summaries dated within `[start, end]` inclusive, oldest first
    fn find_in_range(
        &self,
        owner: &str,
        summary_type: Option<SummaryType>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Summary>>;

    fn insert_if_absent(&self, summary: &Summary) -> Result<Summary>;

    /// Overwrite the derived fields of an existing row
    fn update_derived(&self, summary: &Summary) -> Result<()>;
}

/// Read access to the management hierarchy, keyed by username.
pub trait IdentityStore: Send + Sync {
    fn find_identity(&self, username: &str) -> Result<Option<Identity>>;

    fn find_manager(&self, username: &str) -> Result<Option<Identity>> {
        match self.find_identity(username)? {
            Some(identity) => match identity.manager {
                Some(manager) => self.find_identity(&manager),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn find_direct_reports(&self, username: &str) -> Result<Vec<Identity>>;

    fn upsert_identity(&self, identity: &Identity) -> Result<()>;
}

pub trait MeetingStore: Send + Sync {
    fn insert_meeting(&self, meeting: &MeetingMinutes) -> Result<()>;

    fn find_meeting(&self, id: &MeetingId) -> Result<Option<MeetingMinutes>>;

    fn update_meeting(&self, meeting: &MeetingMinutes) -> Result<()>;

    fn find_meetings_for_participant(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeetingMinutes>>;

    /// Meetings attended by at least one direct report of `manager`
    fn find_team_meetings(
        &self,
        manager: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeetingMinutes>>;

    /// The participant's meetings whose title, transcript, summary or key
    /// points contain `query`, case-insensitively
    fn search_meetings_for_participant(
        &self,
        username: &str,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeetingMinutes>>;
}
