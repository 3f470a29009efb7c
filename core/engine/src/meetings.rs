use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use worklog_schemas::{generate_meeting_id, MeetingId, MeetingMinutes, MeetingPlatform};

use crate::error::{EngineError, EngineResult};
use crate::heuristic::ExtractionTarget;
use crate::period::day_bounds;
use crate::renderer::{DerivedFields, RawInput, Renderer};
use crate::store::MeetingStore;

/// A recorded meeting waiting to be turned into minutes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeeting {
    pub meeting_ref: Option<String>,
    pub title: String,
    pub platform: MeetingPlatform,
    pub meeting_date: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub transcript: String,
    pub participants: Vec<String>,
}

/// Transcript in, narrated minutes with key points, action items and
/// decisions out. The transcript is kept for regeneration.
pub struct MeetingMinutesService {
    meetings: Arc<dyn MeetingStore>,
    renderer: Arc<Renderer>,
}

impl MeetingMinutesService {
    pub fn new(meetings: Arc<dyn MeetingStore>, renderer: Arc<Renderer>) -> Self {
        Self { meetings, renderer }
    }

    pub async fn generate(&self, meeting: NewMeeting) -> EngineResult<MeetingMinutes> {
        if meeting.transcript.trim().is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "meeting '{}' has an empty transcript",
                meeting.title
            )));
        }

        info!("Generating minutes for meeting '{}'", meeting.title);

        let raw = RawInput::Transcript {
            text: &meeting.transcript,
            participants: &meeting.participants,
        };
        let derived = self.renderer.render(raw, &ExtractionTarget::MEETING).await?;

        let now = Utc::now();
        let mut minutes = MeetingMinutes {
            id: generate_meeting_id(),
            meeting_ref: meeting.meeting_ref,
            title: meeting.title,
            platform: meeting.platform,
            meeting_date: meeting.meeting_date,
            duration_minutes: meeting.duration_minutes,
            transcript: Some(meeting.transcript),
            ai_summary: None,
            key_points: None,
            action_items: None,
            decisions: None,
            participants: meeting.participants,
            created_at: now,
            updated_at: now,
            processed_at: None,
        };
        apply(&mut minutes, derived);

        self.meetings.insert_meeting(&minutes)?;
        info!("Stored meeting minutes {}", minutes.id);
        Ok(minutes)
    }

    /// Re-render from the stored transcript. Never fails on the narrator.
    pub async fn regenerate(&self, id: &MeetingId) -> EngineResult<MeetingMinutes> {
        let mut minutes = self.get(id)?;
        let transcript = match minutes.transcript.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => return Err(EngineError::NoRawInput { id: id.to_string() }),
        };

        info!("Regenerating meeting minutes {}", id);

        let raw = RawInput::Transcript {
            text: &transcript,
            participants: &minutes.participants,
        };
        let derived = self
            .renderer
            .rerender(raw, &ExtractionTarget::MEETING, minutes.ai_summary.as_deref())
            .await;

        apply(&mut minutes, derived);
        self.meetings.update_meeting(&minutes)?;
        Ok(minutes)
    }

    pub fn get(&self, id: &MeetingId) -> EngineResult<MeetingMinutes> {
        self.meetings
            .find_meeting(id)?
            .ok_or_else(|| EngineError::not_found("meeting", id.to_string()))
    }

    /// Meetings the user attended between `start` and `end`, inclusive
    pub fn meetings_for_participant(
        &self,
        username: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<MeetingMinutes>> {
        let (from, to) = day_bounds(start, end);
        Ok(self.meetings.find_meetings_for_participant(username, from, to)?)
    }

    /// Meetings attended by any direct report of `manager`
    pub fn team_meetings(
        &self,
        manager: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<MeetingMinutes>> {
        let (from, to) = day_bounds(start, end);
        Ok(self.meetings.find_team_meetings(manager, from, to)?)
    }

    /// The user's meetings mentioning `query` in title, transcript or minutes
    pub fn search(
        &self,
        username: &str,
        query: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<MeetingMinutes>> {
        if query.trim().is_empty() {
            return Err(EngineError::InvalidInput("search query is empty".to_string()));
        }
        let (from, to) = day_bounds(start, end);
        Ok(self
            .meetings
            .search_meetings_for_participant(username, query, from, to)?)
    }
}

fn apply(minutes: &mut MeetingMinutes, mut derived: DerivedFields) {
    let now = Utc::now();
    minutes.key_points = derived.take(ExtractionTarget::KeyPoints);
    minutes.action_items = derived.take(ExtractionTarget::ActionItems);
    minutes.decisions = derived.take(ExtractionTarget::Decisions);
    minutes.ai_summary = Some(derived.narrative);
    minutes.updated_at = now;
    minutes.processed_at = Some(now);
}
