use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ULID and ID Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeetingId(pub String);

impl fmt::Display for SummaryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Identity Schema
// ============================================================================

/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Engineer,
    Manager,
    Leader,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Engineer => "engineer",
            Role::Manager => "manager",
            Role::Leader => "leader",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "engineer" => Some(Role::Engineer),
            "manager" => Some(Role::Manager),
            "leader" => Some(Role::Leader),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Roles whose access extends down the management chain.
    pub fn manages_people(&self) -> bool {
        matches!(self, Role::Manager | Role::Leader)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// A person. The manager is referenced by username, never embedded, so the
/// hierarchy is an arena keyed by username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub manager: Option<String>,
    /// Per-source account names, e.g. a code-hosting login
    #[serde(default)]
    pub handles: BTreeMap<SourceKind, String>,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            display_name: None,
            role,
            manager: None,
            handles: BTreeMap::new(),
        }
    }

    pub fn with_manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = Some(manager.into());
        self
    }

    pub fn with_handle(mut self, source: SourceKind, handle: impl Into<String>) -> Self {
        self.handles.insert(source, handle.into());
        self
    }

    /// Account name to query a source with, falling back to the username
    pub fn handle_for(&self, source: SourceKind) -> &str {
        self.handles
            .get(&source)
            .map(String::as_str)
            .unwrap_or(&self.username)
    }
}

// ============================================================================
// Activity Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    CodeHost,
    IssueTracker,
    Wiki,
    Chat,
    Meetings,
    Calendar,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::CodeHost,
        SourceKind::IssueTracker,
        SourceKind::Wiki,
        SourceKind::Chat,
        SourceKind::Meetings,
        SourceKind::Calendar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CodeHost => "code_host",
            SourceKind::IssueTracker => "issue_tracker",
            SourceKind::Wiki => "wiki",
            SourceKind::Chat => "chat",
            SourceKind::Meetings => "meetings",
            SourceKind::Calendar => "calendar",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown source: {}", s))
    }
}

/// Kind of work unit. Declaration order is the section order of a
/// work-data document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Commit,
    PullRequest,
    Review,
    Ticket,
    Document,
    ChatMessage,
    Meeting,
    CustomerIssue,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 8] = [
        ActivityKind::Commit,
        ActivityKind::PullRequest,
        ActivityKind::Review,
        ActivityKind::Ticket,
        ActivityKind::Document,
        ActivityKind::ChatMessage,
        ActivityKind::Meeting,
        ActivityKind::CustomerIssue,
    ];

    pub fn section_title(&self) -> &'static str {
        match self {
            ActivityKind::Commit => "Code Commits",
            ActivityKind::PullRequest => "Pull Requests",
            ActivityKind::Review => "Code Reviews",
            ActivityKind::Ticket => "Tickets",
            ActivityKind::Document => "Documents",
            ActivityKind::ChatMessage => "Chat Activity",
            ActivityKind::Meeting => "Meetings",
            ActivityKind::CustomerIssue => "Customer Issues Resolved",
        }
    }

    /// Text rendered for a section with no records. Compared by equality.
    pub fn placeholder(&self) -> &'static str {
        match self {
            ActivityKind::Commit => "No commits",
            ActivityKind::PullRequest => "No pull requests",
            ActivityKind::Review => "No reviews",
            ActivityKind::Ticket => "No tickets",
            ActivityKind::Document => "No documents",
            ActivityKind::ChatMessage => "No chat activity",
            ActivityKind::Meeting => "No meetings",
            ActivityKind::CustomerIssue => "No customer issues resolved",
        }
    }
}

/// One unit of externally observed work. Fetched on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub source: SourceKind,
    pub kind: ActivityKind,
    pub author: String,
    pub occurred_at: DateTime<Utc>,
    pub description: String,
    /// Repository, ticket key, channel, ...
    pub provenance: Option<String>,
}

/// Formatted text per activity section, kept in section order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDataDocument {
    sections: BTreeMap<ActivityKind, String>,
}

impl WorkDataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_section(&mut self, kind: ActivityKind, text: impl Into<String>) {
        self.sections.insert(kind, text.into());
    }

    pub fn section(&self, kind: ActivityKind) -> Option<&str> {
        self.sections.get(&kind).map(String::as_str)
    }

    /// True when the section holds real activity, i.e. it is neither
    /// missing, blank, nor the placeholder for its kind.
    pub fn has_activity(&self, kind: ActivityKind) -> bool {
        match self.section(kind) {
            Some(text) => !text.trim().is_empty() && text != kind.placeholder(),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> impl Iterator<Item = (ActivityKind, &str)> {
        self.sections.iter().map(|(kind, text)| (*kind, text.as_str()))
    }

    /// Headed text block handed to the narrator
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (kind, text) in self.sections() {
            out.push_str(kind.section_title());
            out.push_str(":\n");
            out.push_str(text);
            out.push_str("\n\n");
        }
        out
    }
}

// ============================================================================
// Summary Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl SummaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::Daily => "daily",
            SummaryType::Weekly => "weekly",
            SummaryType::Monthly => "monthly",
            SummaryType::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Some(SummaryType::Daily),
            "weekly" => Some(SummaryType::Weekly),
            "monthly" => Some(SummaryType::Monthly),
            "yearly" => Some(SummaryType::Yearly),
            _ => None,
        }
    }
}

impl FromStr for SummaryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SummaryType::parse(s).ok_or_else(|| format!("unknown summary type: {}", s))
    }
}

/// Idempotency key of a summary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub owner: String,
    pub date: NaiveDate,
    pub summary_type: SummaryType,
}

impl fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.date, self.summary_type.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: SummaryId,
    pub owner: String,
    /// Period start for weekly, monthly and yearly summaries
    pub summary_date: NaiveDate,
    pub summary_type: SummaryType,
    pub document: WorkDataDocument,
    pub narrative: String,
    pub key_achievements: Option<String>,
    pub productivity_score: Option<u8>,
    pub collaboration_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    pub fn key(&self) -> SummaryKey {
        SummaryKey {
            owner: self.owner.clone(),
            date: self.summary_date,
            summary_type: self.summary_type,
        }
    }
}

// ============================================================================
// Meeting Minutes Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingPlatform {
    Zoom,
    MicrosoftTeams,
    GoogleMeet,
    SlackHuddle,
    Other,
}

impl MeetingPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingPlatform::Zoom => "zoom",
            MeetingPlatform::MicrosoftTeams => "microsoft_teams",
            MeetingPlatform::GoogleMeet => "google_meet",
            MeetingPlatform::SlackHuddle => "slack_huddle",
            MeetingPlatform::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "zoom" => MeetingPlatform::Zoom,
            "microsoft_teams" | "teams" => MeetingPlatform::MicrosoftTeams,
            "google_meet" | "meet" => MeetingPlatform::GoogleMeet,
            "slack_huddle" | "huddle" => MeetingPlatform::SlackHuddle,
            _ => MeetingPlatform::Other,
        }
    }
}

impl FromStr for MeetingPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MeetingPlatform::parse(s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingMinutes {
    pub id: MeetingId,
    /// Identifier on the meeting platform
    pub meeting_ref: Option<String>,
    pub title: String,
    pub platform: MeetingPlatform,
    pub meeting_date: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub transcript: Option<String>,
    pub ai_summary: Option<String>,
    pub key_points: Option<String>,
    pub action_items: Option<String>,
    pub decisions: Option<String>,
    /// Participant usernames
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn generate_summary_id() -> SummaryId {
    SummaryId(format!("sum_{}", ulid::Ulid::new()))
}

pub fn generate_meeting_id() -> MeetingId {
    MeetingId(format!("mtg_{}", ulid::Ulid::new()))
}
