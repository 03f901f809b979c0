use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{newest_first, LeadRepository};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Activity, ActivityRecord, Lead, User, UserTeam};

#[derive(Default)]
struct State {
    leads: HashMap<String, Lead>,
    /// Insertion order is creation order.
    activities: Vec<Activity>,
    next_seq: u64,
    users: HashMap<String, User>,
    memberships: Vec<UserTeam>,
}

/// In-process backend used for tests and when no database is configured.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadRepository for MemoryRepository {
    async fn insert_lead(&self, lead: &Lead) -> PipelineResult<()> {
        let mut state = self.state.write().await;
        if state.leads.contains_key(&lead.lead_id) {
            return Err(PipelineError::Validation(format!("lead {} already exists", lead.lead_id)));
        }
        state.leads.insert(lead.lead_id.clone(), lead.clone());
        Ok(())
    }

    async fn get_lead(&self, lead_id: &str) -> PipelineResult<Option<Lead>> {
        Ok(self.state.read().await.leads.get(lead_id).cloned())
    }

    async fn save_lead(&self, lead: &Lead) -> PipelineResult<()> {
        let mut state = self.state.write().await;
        match state.leads.get_mut(&lead.lead_id) {
            Some(stored) => {
                *stored = lead.clone();
                Ok(())
            }
            None => Err(PipelineError::not_found("Lead", lead.lead_id.clone())),
        }
    }

    async fn delete_lead(&self, lead_id: &str) -> PipelineResult<bool> {
        let mut state = self.state.write().await;
        if state.leads.remove(lead_id).is_none() {
            return Ok(false);
        }
        state.activities.retain(|a| a.lead_id != lead_id);
        Ok(true)
    }

    async fn list_leads(&self, team_id: &str) -> PipelineResult<Vec<Lead>> {
        let state = self.state.read().await;
        let mut leads: Vec<Lead> = state
            .leads
            .values()
            .filter(|lead| lead.team_id == team_id)
            .cloned()
            .collect();
        newest_first(&mut leads);
        Ok(leads)
    }

    async fn append_activity(&self, record: ActivityRecord) -> PipelineResult<Activity> {
        let mut state = self.state.write().await;
        if !state.leads.contains_key(&record.lead_id) {
            return Err(PipelineError::not_found("Lead", record.lead_id));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        let activity = record.into_activity(seq);
        state.activities.push(activity.clone());
        Ok(activity)
    }

    async fn list_activities(&self, lead_ids: &[String]) -> PipelineResult<Vec<Activity>> {
        let state = self.state.read().await;
        Ok(state
            .activities
            .iter()
            .filter(|a| lead_ids.contains(&a.lead_id))
            .cloned()
            .collect())
    }

    async fn upsert_user(&self, user: &User) -> PipelineResult<()> {
        self.state
            .write()
            .await
            .users
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> PipelineResult<Option<User>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn add_membership(&self, membership: &UserTeam) -> PipelineResult<bool> {
        let mut state = self.state.write().await;
        let exists = state
            .memberships
            .iter()
            .any(|m| m.user_id == membership.user_id && m.team_id == membership.team_id);
        if exists {
            return Ok(false);
        }
        state.memberships.push(membership.clone());
        Ok(true)
    }

    async fn memberships_for_user(&self, user_id: &str) -> PipelineResult<Vec<UserTeam>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn team_members(&self, team_id: &str) -> PipelineResult<Vec<UserTeam>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::ActivityType;
    use crate::stage::Pipeline;
    use crate::timeline::timeline_for;

    fn lead(id: &str) -> Lead {
        let now = Utc::now();
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
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn sequence_orders_same_instant_activities_across_leads() {
        let repo = MemoryRepository::new();
        repo.insert_lead(&lead("a")).await.unwrap();
        repo.insert_lead(&lead("b")).await.unwrap();

        let at = Utc::now();
        for (n, lead_id) in ["a", "b", "a", "b"].iter().enumerate() {
            repo.append_activity(ActivityRecord {
                activity_id: format!("act-{}", n),
                lead_id: lead_id.to_string(),
                user_id: "manager".into(),
                activity_type: ActivityType::Call,
                notes: String::new(),
                duration: None,
                created_at: at,
            })
            .await
            .unwrap();
        }

        let both = ["a".to_string(), "b".to_string()];
        let timeline = timeline_for(repo.list_activities(&both).await.unwrap());
        let order: Vec<_> = timeline.iter().map(|a| a.activity_id.as_str()).collect();
        assert_eq!(order, vec!["act-0", "act-1", "act-2", "act-3"]);

        // Deleting a lead must not let later activities reuse a sequence number.
        repo.delete_lead("b").await.unwrap();
        repo.insert_lead(&lead("c")).await.unwrap();
        let late = repo
            .append_activity(ActivityRecord {
                activity_id: "act-4".into(),
                lead_id: "c".into(),
                user_id: "manager".into(),
                activity_type: ActivityType::Email,
                notes: String::new(),
                duration: None,
                created_at: at,
            })
            .await
            .unwrap();
        assert_eq!(late.seq, 4);

        let ids = ["a".to_string(), "c".to_string()];
        let timeline = timeline_for(repo.list_activities(&ids).await.unwrap());
        let order: Vec<_> = timeline.iter().map(|a| a.activity_id.as_str()).collect();
        assert_eq!(order, vec!["act-0", "act-2", "act-4"]);
    }
}
