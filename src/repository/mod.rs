//! Persistence contract for leads, their activities and the user directory.
//!
//! Backends only store and fetch; stage rules, visibility and locking live in
//! the service layer so every backend behaves the same.

mod memory;
mod mongo;

pub use memory::MemoryRepository;
pub use mongo::MongoRepository;

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::models::{Activity, ActivityRecord, Lead, User, UserTeam};

/// Newest lead first, compared as timestamps rather than stored strings.
pub(crate) fn newest_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn insert_lead(&self, lead: &Lead) -> PipelineResult<()>;

    async fn get_lead(&self, lead_id: &str) -> PipelineResult<Option<Lead>>;

    /// Replaces the stored lead. Fails with `NotFound` if it was deleted meanwhile.
    async fn save_lead(&self, lead: &Lead) -> PipelineResult<()>;

    /// Removes the lead and every activity it owns. Returns false if it did not exist.
    async fn delete_lead(&self, lead_id: &str) -> PipelineResult<bool>;

    async fn list_leads(&self, team_id: &str) -> PipelineResult<Vec<Lead>>;

    /// Appends an activity, assigning the next repository-wide sequence number.
    async fn append_activity(&self, record: ActivityRecord) -> PipelineResult<Activity>;

    /// Activities owned by any of `lead_ids`, in no particular order.
    async fn list_activities(&self, lead_ids: &[String]) -> PipelineResult<Vec<Activity>>;

    async fn upsert_user(&self, user: &User) -> PipelineResult<()>;

    async fn get_user(&self, user_id: &str) -> PipelineResult<Option<User>>;

    /// Returns false when the user already belongs to the team.
    async fn add_membership(&self, membership: &UserTeam) -> PipelineResult<bool>;

    async fn memberships_for_user(&self, user_id: &str) -> PipelineResult<Vec<UserTeam>>;

    async fn team_members(&self, team_id: &str) -> PipelineResult<Vec<UserTeam>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::stage::Pipeline;

    fn lead_at(id: &str, created_at: &str) -> Lead {
        let at: DateTime<Utc> = created_at.parse().unwrap();
        Lead {
            lead_id: id.into(),
            team_id: "t1".into(),
            pipeline: Pipeline::Sales,
            name: id.into(),
            company: None,
            phone: "9876543210".into(),
            email: None,
            address: None,
            source: None,
            stage: "new".into(),
            value: 0,
            assigned_to: None,
            rating: 0,
            tags: Vec::new(),
            notes: Vec::new(),
            objections: Vec::new(),
            created_by: "manager".into(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn whole_seconds_sort_before_later_fractions() {
        let mut leads = vec![
            lead_at("whole", "2024-05-01T10:00:00Z"),
            lead_at("half", "2024-05-01T10:00:00.500Z"),
            lead_at("next", "2024-05-01T10:00:01Z"),
        ];
        // As strings "...00Z" > "...00.500Z", the wrong way round.
        assert!(serde_json::to_string(&leads[0].created_at).unwrap()
            > serde_json::to_string(&leads[1].created_at).unwrap());

        newest_first(&mut leads);
        let ids: Vec<_> = leads.iter().map(|l| l.lead_id.as_str()).collect();
        assert_eq!(ids, vec!["next", "half", "whole"]);
    }
}
