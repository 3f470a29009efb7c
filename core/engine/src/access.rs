use anyhow::Result;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};
use worklog_schemas::{Identity, MeetingMinutes, Role, Summary};

use crate::store::IdentityStore;

/// What a requester wants to see
#[derive(Debug, Clone, Copy)]
pub enum AccessTarget<'a> {
    /// An identity, by username
    Identity(&'a str),
    /// A summary, judged by its owner
    Summary(&'a Summary),
    /// A meeting, judged by its participants
    Meeting(&'a MeetingMinutes),
}

/// The single authorization predicate over the management hierarchy.
///
/// Hierarchy walks keep a visited set, so a cyclic manager graph coming
/// out of the store terminates.
pub struct AccessControl {
    identities: Arc<dyn IdentityStore>,
}

impl AccessControl {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }

    /// Fail-closed: a store error denies.
    pub fn can_access(&self, requester: &Identity, target: AccessTarget<'_>) -> bool {
        match self.evaluate(requester, target) {
            Ok(granted) => {
                debug!("Access for {} to {:?}: {}", requester.username, describe(target), granted);
                granted
            }
            Err(e) => {
                warn!(
                    "Denying {} access to {:?}, hierarchy lookup failed: {:#}",
                    requester.username,
                    describe(target),
                    e
                );
                false
            }
        }
    }

    fn evaluate(&self, requester: &Identity, target: AccessTarget<'_>) -> Result<bool> {
        if requester.role == Role::Admin {
            return Ok(true);
        }

        // Reports are walked at most once per check
        let mut reachable = None;

        match target {
            AccessTarget::Identity(username) => self.owner_rule(requester, username, &mut reachable),
            AccessTarget::Summary(summary) => self.owner_rule(requester, &summary.owner, &mut reachable),
            AccessTarget::Meeting(meeting) => {
                if meeting.participants.iter().any(|p| *p == requester.username) {
                    return Ok(true);
                }
                for participant in &meeting.participants {
                    if self.manages(requester, participant, &mut reachable)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn owner_rule(
        &self,
        requester: &Identity,
        owner: &str,
        reachable: &mut Option<HashSet<String>>,
    ) -> Result<bool> {
        if owner == requester.username {
            return Ok(true);
        }
        self.manages(requester, owner, reachable)
    }

    fn manages(
        &self,
        requester: &Identity,
        target: &str,
        reachable: &mut Option<HashSet<String>>,
    ) -> Result<bool> {
        if !requester.role.manages_people() {
            return Ok(false);
        }

        if let Some(identity) = self.identities.find_identity(target)? {
            if identity.manager.as_deref() == Some(requester.username.as_str()) {
                return Ok(true);
            }
        }

        if reachable.is_none() {
            *reachable = Some(self.reachable_reports(&requester.username)?);
        }
        Ok(reachable.as_ref().is_some_and(|set| set.contains(target)))
    }

    /// Everyone below `manager`, breadth first. Excludes `manager` itself
    /// even when a cycle leads back to it.
    pub fn reachable_reports(&self, manager: &str) -> Result<HashSet<String>> {
        let mut visited = HashSet::from([manager.to_string()]);
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::from([manager.to_string()]);

        while let Some(current) = queue.pop_front() {
            for report in self.identities.find_direct_reports(&current)? {
                if visited.insert(report.username.clone()) {
                    reachable.insert(report.username.clone());
                    queue.push_back(report.username);
                }
            }
        }

        Ok(reachable)
    }
}

fn describe(target: AccessTarget<'_>) -> String {
    match target {
        AccessTarget::Identity(username) => format!("identity {}", username),
        AccessTarget::Summary(summary) => format!("summary {}", summary.id),
        AccessTarget::Meeting(meeting) => format!("meeting {}", meeting.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::{NaiveDate, Utc};
    use worklog_schemas::{generate_meeting_id, MeetingPlatform};

    fn hierarchy() -> Arc<Database> {
        let db = Arc::new(Database::in_memory().unwrap());
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
        db
    }

    fn identity(db: &Database, username: &str) -> Identity {
        db.find_identity(username).unwrap().unwrap()
    }

    fn meeting(participants: &[&str]) -> MeetingMinutes {
        let now = Utc::now();
        MeetingMinutes {
            id: generate_meeting_id(),
            meeting_ref: None,
            title: "Sync".to_string(),
            platform: MeetingPlatform::Zoom,
            meeting_date: now,
            duration_minutes: Some(30),
            transcript: Some("hello".to_string()),
            ai_summary: None,
            key_points: None,
            action_items: None,
            decisions: None,
            participants: participants.iter().map(|p| p.to_string()).collect(),
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    #[test]
    fn test_admin_sees_everything() {
        let db = hierarchy();
        let access = AccessControl::new(db.clone());
        let root = identity(&db, "root");
        assert!(access.can_access(&root, AccessTarget::Identity("zed")));
        assert!(access.can_access(&root, AccessTarget::Identity("nobody")));
    }

    #[test]
    fn test_engineer_sees_only_self() {
        let db = hierarchy();
        let access = AccessControl::new(db.clone());
        let alice = identity(&db, "alice");
        assert!(access.can_access(&alice, AccessTarget::Identity("alice")));
        assert!(!access.can_access(&alice, AccessTarget::Identity("carl")));
        assert!(!access.can_access(&alice, AccessTarget::Identity("bob")));
    }

    #[test]
    fn test_leader_reaches_two_hops_but_not_other_teams() {
        let db = hierarchy();
        let access = AccessControl::new(db.clone());
        let lena = identity(&db, "lena");
        assert!(access.can_access(&lena, AccessTarget::Identity("bob")));
        assert!(access.can_access(&lena, AccessTarget::Identity("alice")));
        assert!(!access.can_access(&lena, AccessTarget::Identity("zed")));
    }

    #[test]
    fn test_manager_cannot_see_upward() {
        let db = hierarchy();
        let access = AccessControl::new(db.clone());
        let bob = identity(&db, "bob");
        assert!(access.can_access(&bob, AccessTarget::Identity("carl")));
        assert!(!access.can_access(&bob, AccessTarget::Identity("lena")));
    }

    #[test]
    fn test_cycle_terminates() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.upsert_identity(&Identity::new("a", Role::Manager).with_manager("b")).unwrap();
        db.upsert_identity(&Identity::new("b", Role::Manager).with_manager("a")).unwrap();
        db.upsert_identity(&Identity::new("c", Role::Engineer)).unwrap();
        let access = AccessControl::new(db.clone());

        let a = identity(&db, "a");
        assert!(access.can_access(&a, AccessTarget::Identity("b")));
        assert!(!access.can_access(&a, AccessTarget::Identity("c")));
        assert_eq!(access.reachable_reports("a").unwrap(), HashSet::from(["b".to_string()]));
    }

    #[test]
    fn test_meeting_participants_and_their_managers() {
        let db = hierarchy();
        let access = AccessControl::new(db.clone());
        let standup = meeting(&["alice", "zed"]);

        assert!(access.can_access(&identity(&db, "zed"), AccessTarget::Meeting(&standup)));
        assert!(access.can_access(&identity(&db, "lena"), AccessTarget::Meeting(&standup)));
        assert!(access.can_access(&identity(&db, "mo"), AccessTarget::Meeting(&standup)));
        assert!(!access.can_access(&identity(&db, "carl"), AccessTarget::Meeting(&standup)));
    }

    #[test]
    fn test_summary_judged_by_owner() {
        let db = hierarchy();
        let access = AccessControl::new(db.clone());
        let now = Utc::now();
        let summary = Summary {
            id: worklog_schemas::generate_summary_id(),
            owner: "carl".to_string(),
            summary_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            summary_type: worklog_schemas::SummaryType::Daily,
            document: Default::default(),
            narrative: String::new(),
            key_achievements: None,
            productivity_score: None,
            collaboration_score: None,
            created_at: now,
            updated_at: now,
        };

        assert!(access.can_access(&identity(&db, "bob"), AccessTarget::Summary(&summary)));
        assert!(!access.can_access(&identity(&db, "mo"), AccessTarget::Summary(&summary)));
    }
}
