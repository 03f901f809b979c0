use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Call,
    Email,
    Meeting,
    Note,
    StageChange,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Call => "call",
            ActivityType::Email => "email",
            ActivityType::Meeting => "meeting",
            ActivityType::Note => "note",
            ActivityType::StageChange => "stage_change",
        }
    }
}

/// An immutable interaction or system event owned by one lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: String,
    pub lead_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub notes: String,
    /// Minutes, for calls and meetings.
    pub duration: Option<u32>,
    pub created_at: DateTime<Utc>,
    /// Repository-wide insertion sequence, used to order activities sharing a timestamp.
    pub seq: u64,
}

/// Request payload for logging an activity. The author is always the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
    pub lead_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub notes: String,
    pub duration: Option<u32>,
}

/// What a repository needs to append an activity; it assigns `seq` itself.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub activity_id: String,
    pub lead_id: String,
    pub user_id: String,
    pub activity_type: ActivityType,
    pub notes: String,
    pub duration: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn into_activity(self, seq: u64) -> Activity {
        Activity {
            activity_id: self.activity_id,
            lead_id: self.lead_id,
            user_id: self.user_id,
            activity_type: self.activity_type,
            notes: self.notes,
            duration: self.duration,
            created_at: self.created_at,
            seq,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ActivityFilter {
    pub lead_id: Option<String>,
}
