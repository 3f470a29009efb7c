use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use worklog_schemas::{
    Identity, MeetingId, MeetingMinutes, MeetingPlatform, Role, SourceKind, Summary, SummaryId,
    SummaryType, WorkDataDocument,
};

use crate::store::{IdentityStore, MeetingStore, SummaryStore};

const SUMMARY_COLUMNS: &str = "id, owner, summary_date, summary_type, document, narrative,
     key_achievements, productivity_score, collaboration_score, created_at, updated_at";

const MEETING_COLUMNS: &str = "id, meeting_ref, title, platform, meeting_date, duration_minutes,
     transcript, ai_summary, key_points, action_items, decisions, created_at, updated_at,
     processed_at";

/// SQLite-backed store for identities, summaries and meeting minutes
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file and ensure the schema exists
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self::from_connection(conn)?;

        info!("Database initialized");
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    pub fn count_summaries(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM work_summaries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_identities(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Create all tables and indexes
fn init_schema(conn: &Connection) -> Result<()> {
    // Identities form the management hierarchy; manager is a plain key,
    // no foreign key, so partially loaded or cyclic data still opens.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS identities (
            username TEXT PRIMARY KEY,
            display_name TEXT,
            role TEXT NOT NULL,
            manager TEXT,
            handles TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_identities_manager ON identities(manager)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS work_summaries (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            summary_date TEXT NOT NULL,
            summary_type TEXT NOT NULL,
            document TEXT NOT NULL DEFAULT '{}',
            narrative TEXT NOT NULL,
            key_achievements TEXT,
            productivity_score INTEGER,
            collaboration_score INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (owner, summary_date, summary_type)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_work_summaries_owner_date
         ON work_summaries(owner, summary_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meeting_minutes (
            id TEXT PRIMARY KEY,
            meeting_ref TEXT,
            title TEXT NOT NULL,
            platform TEXT NOT NULL,
            meeting_date TEXT NOT NULL,
            duration_minutes INTEGER,
            transcript TEXT,
            ai_summary TEXT,
            key_points TEXT,
            action_items TEXT,
            decisions TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            processed_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meeting_participants (
            meeting_id TEXT NOT NULL,
            username TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (meeting_id, username),
            FOREIGN KEY (meeting_id) REFERENCES meeting_minutes(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meeting_participants_user
         ON meeting_participants(username)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// Summaries
// ============================================================================

fn find_summary_by_key(
    conn: &Connection,
    owner: &str,
    date: NaiveDate,
    summary_type: SummaryType,
) -> Result<Option<Summary>> {
    let sql = format!(
        "SELECT {} FROM work_summaries
         WHERE owner = ?1 AND summary_date = ?2 AND summary_type = ?3",
        SUMMARY_COLUMNS
    );
    let summary = conn
        .query_row(
            &sql,
            params![owner, date_text(date), summary_type.as_str()],
            row_to_summary,
        )
        .optional()?;
    Ok(summary)
}

impl SummaryStore for Database {
    fn find_by_key(
        &self,
        owner: &str,
        date: NaiveDate,
        summary_type: SummaryType,
    ) -> Result<Option<Summary>> {
        let conn = self.conn()?;
        find_summary_by_key(&conn, owner, date, summary_type)
    }

    fn find_by_id(&self, id: &SummaryId) -> Result<Option<Summary>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM work_summaries WHERE id = ?1", SUMMARY_COLUMNS);
        let summary = conn
            .query_row(&sql, params![id.0], row_to_summary)
            .optional()?;
        Ok(summary)
    }

    fn find_in_range(
        &self,
        owner: &str,
        summary_type: Option<SummaryType>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Summary>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM work_summaries
             WHERE owner = ?1 AND summary_date BETWEEN ?2 AND ?3
               AND (?4 IS NULL OR summary_type = ?4)
             ORDER BY summary_date ASC, summary_type ASC",
            SUMMARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(
                params![
                    owner,
                    date_text(start),
                    date_text(end),
                    summary_type.map(|t| t.as_str())
                ],
                row_to_summary,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    fn insert_if_absent(&self, summary: &Summary) -> Result<Summary> {
        let conn = self.conn()?;
        let document_json = serde_json::to_string(&summary.document)?;

        let inserted = conn.execute(
            "INSERT INTO work_summaries (id, owner, summary_date, summary_type, document,
                                         narrative, key_achievements, productivity_score,
                                         collaboration_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT (owner, summary_date, summary_type) DO NOTHING",
            params![
                summary.id.0,
                summary.owner,
                date_text(summary.summary_date),
                summary.summary_type.as_str(),
                document_json,
                summary.narrative,
                summary.key_achievements,
                summary.productivity_score,
                summary.collaboration_score,
                timestamp_text(&summary.created_at),
                timestamp_text(&summary.updated_at),
            ],
        )?;

        if inserted == 1 {
            debug!("Inserted summary {} ({})", summary.id, summary.key());
            return Ok(summary.clone());
        }

        debug!("Summary {} already stored, returning existing row", summary.key());
        find_summary_by_key(&conn, &summary.owner, summary.summary_date, summary.summary_type)?
            .ok_or_else(|| anyhow!("summary {} conflicted but could not be re-read", summary.key()))
    }

    fn update_derived(&self, summary: &Summary) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE work_summaries
             SET narrative = ?2, key_achievements = ?3, updated_at = ?4
             WHERE id = ?1",
            params![
                summary.id.0,
                summary.narrative,
                summary.key_achievements,
                timestamp_text(&summary.updated_at),
            ],
        )?;

        if updated == 0 {
            anyhow::bail!("summary {} does not exist", summary.id);
        }
        debug!("Updated derived fields of summary {}", summary.id);
        Ok(())
    }
}

fn row_to_summary(row: &Row) -> rusqlite::Result<Summary> {
    let document_json: String = row.get(4)?;
    let document: WorkDataDocument = serde_json::from_str(&document_json).map_err(json_error)?;
    let type_raw: String = row.get(3)?;

    Ok(Summary {
        id: SummaryId(row.get(0)?),
        owner: row.get(1)?,
        summary_date: parse_date(row, 2)?,
        summary_type: SummaryType::parse(&type_raw)
            .ok_or_else(|| conversion_error(3, format!("unknown summary type '{}'", type_raw)))?,
        document,
        narrative: row.get(5)?,
        key_achievements: row.get(6)?,
        productivity_score: row.get(7)?,
        collaboration_score: row.get(8)?,
        created_at: parse_timestamp(row, 9)?,
        updated_at: parse_timestamp(row, 10)?,
    })
}

// ============================================================================
// Identities
// ============================================================================

impl IdentityStore for Database {
    fn find_identity(&self, username: &str) -> Result<Option<Identity>> {
        let conn = self.conn()?;
        let identity = conn
            .query_row(
                "SELECT username, display_name, role, manager, handles
                 FROM identities WHERE username = ?1",
                params![username],
                row_to_identity,
            )
            .optional()?;
        Ok(identity)
    }

    fn find_direct_reports(&self, username: &str) -> Result<Vec<Identity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT username, display_name, role, manager, handles
             FROM identities WHERE manager = ?1
             ORDER BY username ASC",
        )?;
        let reports = stmt
            .query_map(params![username], row_to_identity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    fn upsert_identity(&self, identity: &Identity) -> Result<()> {
        let conn = self.conn()?;
        let handles_json = serde_json::to_string(&identity.handles)?;
        let now = timestamp_text(&Utc::now());

        conn.execute(
            "INSERT INTO identities (username, display_name, role, manager, handles,
                                     created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT (username) DO UPDATE SET
                display_name = excluded.display_name,
                role = excluded.role,
                manager = excluded.manager,
                handles = excluded.handles,
                updated_at = excluded.updated_at",
            params![
                identity.username,
                identity.display_name,
                identity.role.as_str(),
                identity.manager,
                handles_json,
                now,
            ],
        )
        .with_context(|| format!("Failed to store identity {}", identity.username))?;

        debug!("Stored identity {} ({})", identity.username, identity.role.as_str());
        Ok(())
    }
}

fn row_to_identity(row: &Row) -> rusqlite::Result<Identity> {
    let role_raw: String = row.get(2)?;
    let handles_json: String = row.get(4)?;
    let handles: BTreeMap<SourceKind, String> =
        serde_json::from_str(&handles_json).map_err(json_error)?;

    Ok(Identity {
        username: row.get(0)?,
        display_name: row.get(1)?,
        role: Role::parse(&role_raw)
            .ok_or_else(|| conversion_error(2, format!("unknown role '{}'", role_raw)))?,
        manager: row.get(3)?,
        handles,
    })
}

// ============================================================================
// Meeting minutes
// ============================================================================

fn load_participants(conn: &Connection, meeting_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT username FROM meeting_participants
         WHERE meeting_id = ?1 ORDER BY position ASC",
    )?;
    let participants = stmt
        .query_map(params![meeting_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(participants)
}

impl MeetingStore for Database {
    fn insert_meeting(&self, meeting: &MeetingMinutes) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO meeting_minutes (id, meeting_ref, title, platform, meeting_date,
                                          duration_minutes, transcript, ai_summary, key_points,
                                          action_items, decisions, created_at, updated_at,
                                          processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                meeting.id.0,
                meeting.meeting_ref,
                meeting.title,
                meeting.platform.as_str(),
                timestamp_text(&meeting.meeting_date),
                meeting.duration_minutes,
                meeting.transcript,
                meeting.ai_summary,
                meeting.key_points,
                meeting.action_items,
                meeting.decisions,
                timestamp_text(&meeting.created_at),
                timestamp_text(&meeting.updated_at),
                meeting.processed_at.as_ref().map(timestamp_text),
            ],
        )?;

        for (position, username) in meeting.participants.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO meeting_participants (meeting_id, username, position)
                 VALUES (?1, ?2, ?3)",
                params![meeting.id.0, username, position as i64],
            )?;
        }

        tx.commit()?;
        debug!("Inserted meeting {} with {} participants", meeting.id, meeting.participants.len());
        Ok(())
    }

    fn find_meeting(&self, id: &MeetingId) -> Result<Option<MeetingMinutes>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM meeting_minutes WHERE id = ?1", MEETING_COLUMNS);
        let meeting = conn.query_row(&sql, params![id.0], row_to_meeting).optional()?;

        match meeting {
            Some(mut meeting) => {
                meeting.participants = load_participants(&conn, &meeting.id.0)?;
                Ok(Some(meeting))
            }
            None => Ok(None),
        }
    }

    fn update_meeting(&self, meeting: &MeetingMinutes) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE meeting_minutes
             SET ai_summary = ?2, key_points = ?3, action_items = ?4, decisions = ?5,
                 updated_at = ?6, processed_at = ?7
             WHERE id = ?1",
            params![
                meeting.id.0,
                meeting.ai_summary,
                meeting.key_points,
                meeting.action_items,
                meeting.decisions,
                timestamp_text(&meeting.updated_at),
                meeting.processed_at.as_ref().map(timestamp_text),
            ],
        )?;

        if updated == 0 {
            anyhow::bail!("meeting {} does not exist", meeting.id);
        }
        Ok(())
    }

    fn find_meetings_for_participant(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeetingMinutes>> {
        let conn = self.conn()?;
        query_meetings(
            &conn,
            "id IN (SELECT meeting_id FROM meeting_participants WHERE username = ?1)",
            &[&username, &timestamp_text(&start), &timestamp_text(&end)],
        )
    }

    fn find_team_meetings(
        &self,
        manager: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeetingMinutes>> {
        let conn = self.conn()?;
        query_meetings(
            &conn,
            "id IN (SELECT p.meeting_id FROM meeting_participants p
                    JOIN identities i ON i.username = p.username
                    WHERE i.manager = ?1)",
            &[&manager, &timestamp_text(&start), &timestamp_text(&end)],
        )
    }

    fn search_meetings_for_participant(
        &self,
        username: &str,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MeetingMinutes>> {
        let conn = self.conn()?;
        query_meetings(
            &conn,
            "id IN (SELECT meeting_id FROM meeting_participants WHERE username = ?1)
               AND (title LIKE ?4 ESCAPE '\\' OR transcript LIKE ?4 ESCAPE '\\'
                    OR ai_summary LIKE ?4 ESCAPE '\\' OR key_points LIKE ?4 ESCAPE '\\')",
            &[
                &username,
                &timestamp_text(&start),
                &timestamp_text(&end),
                &like_pattern(query),
            ],
        )
    }
}

/// Meetings matching `filter` within `?2..=?3`, oldest first, with participants.
/// `?1` and any further parameters belong to the filter.
fn query_meetings(
    conn: &Connection,
    filter: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<MeetingMinutes>> {
    let sql = format!(
        "SELECT {} FROM meeting_minutes
         WHERE {}
           AND meeting_date BETWEEN ?2 AND ?3
         ORDER BY meeting_date ASC",
        MEETING_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut meetings = stmt
        .query_map(params, row_to_meeting)?
        .collect::<Result<Vec<_>, _>>()?;

    for meeting in &mut meetings {
        meeting.participants = load_participants(conn, &meeting.id.0)?;
    }
    Ok(meetings)
}

/// `%query%` with LIKE wildcards in the query taken literally
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn row_to_meeting(row: &Row) -> rusqlite::Result<MeetingMinutes> {
    let platform_raw: String = row.get(3)?;
    let processed_raw: Option<String> = row.get(13)?;
    let processed_at = match processed_raw {
        Some(raw) => Some(parse_timestamp_text(&raw, 13)?),
        None => None,
    };

    Ok(MeetingMinutes {
        id: MeetingId(row.get(0)?),
        meeting_ref: row.get(1)?,
        title: row.get(2)?,
        platform: MeetingPlatform::parse(&platform_raw),
        meeting_date: parse_timestamp(row, 4)?,
        duration_minutes: row.get(5)?,
        transcript: row.get(6)?,
        ai_summary: row.get(7)?,
        key_points: row.get(8)?,
        action_items: row.get(9)?,
        decisions: row.get(10)?,
        participants: Vec::new(),
        created_at: parse_timestamp(row, 11)?,
        updated_at: parse_timestamp(row, 12)?,
        processed_at,
    })
}

// ============================================================================
// Column encoding
// ============================================================================

fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Fixed-width UTC timestamps so text comparison matches time order
fn timestamp_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp_text(&raw, idx)
}

fn parse_timestamp_text(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_error(err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}
