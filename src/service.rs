// src/service.rs

//! Command layer over a `LeadRepository`.
//!
//! Every write to a lead runs under that lead's async mutex, so a stage
//! change and the activity it logs are never interleaved with another write
//! to the same lead. Reads take no lock.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::annotations;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    Activity, ActivityFilter, ActivityRecord, ActivityType, AddMemberRequest, Directory, Lead,
    LeadFilter, LeadUpdate, NewActivity, NewLead, NewObjection, RegisterUserRequest, Role,
    TeamRole, User, UserTeam,
};
use crate::models::lead::non_blank;
use crate::pipeline::{self, Transition};
use crate::repository::LeadRepository;
use crate::stage::{Pipeline, StageRegistry};
use crate::timeline::{self, TimelineSummary};
use crate::visibility::{self, Session, VisibleLeads};

/// Holds a lead's write lock; the map entry is evicted once nobody else
/// holds or waits on it.
struct LeadLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    lead_id: String,
}

impl Drop for LeadLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.lead_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

pub struct LeadService {
    repo: Arc<dyn LeadRepository>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LeadService {
    pub fn new(repo: Arc<dyn LeadRepository>) -> Self {
        Self { repo, locks: DashMap::new() }
    }

    async fn lock(&self, lead_id: &str) -> LeadLock<'_> {
        let mutex = self
            .locks
            .entry(lead_id.to_string())
            .or_default()
            .value()
            .clone();
        LeadLock {
            guard: Some(mutex.lock_owned().await),
            locks: &self.locks,
            lead_id: lead_id.to_string(),
        }
    }

    // ─── SESSION & DIRECTORY ──────────────────────────────────────────────────

    /// Builds the caller context. Unknown users are rejected as unauthenticated.
    pub async fn session(
        &self,
        user_id: &str,
        team_id: &str,
        view_as: Option<Role>,
    ) -> PipelineResult<Session> {
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or(PipelineError::Unauthorized)?;
        Session::new(&user, team_id, view_as)
    }

    pub async fn load_directory(&self, directory: Directory) -> PipelineResult<()> {
        for user in &directory.users {
            self.repo.upsert_user(user).await?;
        }
        for m in directory.memberships {
            let membership = UserTeam {
                user_id: m.user_id,
                team_id: m.team_id,
                role: m.role,
                joined_at: Utc::now(),
            };
            self.repo.add_membership(&membership).await?;
        }
        info!("Directory loaded: {} users", directory.users.len());
        Ok(())
    }

    /// Registers or updates a user. Only admins may do this.
    pub async fn register_user(&self, caller_id: &str, req: RegisterUserRequest) -> PipelineResult<User> {
        let caller = self
            .repo
            .get_user(caller_id)
            .await?
            .ok_or(PipelineError::Unauthorized)?;
        if caller.role != Role::Admin {
            return Err(PipelineError::Forbidden("only admins may register users".into()));
        }
        let name = non_blank(&req.name)
            .ok_or_else(|| PipelineError::Validation("name is required".into()))?;
        let user = User {
            user_id: req.user_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name,
            email: req.email.trim().to_string(),
            role: req.role,
        };
        self.repo.upsert_user(&user).await?;
        info!("User {} registered by {}", user.user_id, caller_id);
        Ok(user)
    }

    pub async fn team_members(&self, session: &Session) -> PipelineResult<Vec<UserTeam>> {
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        if !visibility::is_team_member(session, &memberships) {
            return Err(PipelineError::Forbidden("not a member of this team".into()));
        }
        self.repo.team_members(&session.team_id).await
    }

    /// Team admins (or global admins) add existing users to their team.
    pub async fn add_team_member(&self, session: &Session, req: AddMemberRequest) -> PipelineResult<UserTeam> {
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        let is_team_admin = memberships
            .iter()
            .any(|m| m.team_id == session.team_id && m.role == TeamRole::Admin);
        if !is_team_admin && session.actual_role != Role::Admin {
            return Err(PipelineError::Forbidden("only team admins can add members".into()));
        }
        if self.repo.get_user(&req.user_id).await?.is_none() {
            return Err(PipelineError::not_found("User", req.user_id));
        }
        let membership = UserTeam {
            user_id: req.user_id,
            team_id: session.team_id.clone(),
            role: req.role.unwrap_or(TeamRole::Member),
            joined_at: Utc::now(),
        };
        if !self.repo.add_membership(&membership).await? {
            return Err(PipelineError::Validation("user is already a member of the team".into()));
        }
        info!("User {} added to team {}", membership.user_id, membership.team_id);
        Ok(membership)
    }

    // ─── LEADS ───────────────────────────────────────────────────────────────

    pub async fn create_lead(&self, session: &Session, req: NewLead) -> PipelineResult<Lead> {
        debug!("create_lead called by {} with payload: {:?}", session.user_id, req);
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        if !visibility::is_team_member(session, &memberships) {
            return Err(PipelineError::Forbidden("not a member of this team".into()));
        }
        req.validate()?;

        let pipeline = req.pipeline.unwrap_or(Pipeline::Sales);
        let registry = StageRegistry::for_pipeline(pipeline);
        let stage = match &req.stage {
            Some(stage) => registry.validate(stage)?,
            None => registry.initial(),
        };

        // Members only see their own rows, so their new leads default to themselves.
        let assigned_to = match req.assigned_to.as_deref().and_then(non_blank) {
            Some(assignee) => {
                if assignee != session.user_id && !session.can_assign() {
                    return Err(PipelineError::Forbidden("only admins may assign leads".into()));
                }
                self.ensure_assignable(&session.team_id, &assignee).await?;
                Some(assignee)
            }
            None if session.scope() == visibility::LeadScope::MyLeads => Some(session.user_id.clone()),
            None => None,
        };

        let now = Utc::now();
        let mut lead = Lead {
            lead_id: Uuid::new_v4().to_string(),
            team_id: session.team_id.clone(),
            pipeline,
            name: req.name.trim().to_string(),
            company: req.company.as_deref().and_then(non_blank),
            phone: req.phone.trim().to_string(),
            email: req.email.as_deref().and_then(non_blank),
            address: req.address.as_deref().and_then(non_blank),
            source: req.source.as_deref().and_then(non_blank),
            stage: stage.id.to_string(),
            value: req.value.unwrap_or(0),
            assigned_to,
            rating: req.rating.unwrap_or(0),
            tags: Vec::new(),
            notes: Vec::new(),
            objections: Vec::new(),
            created_by: session.user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        for tag in req.tags.unwrap_or_default() {
            annotations::add_tag(&mut lead, &tag);
        }

        self.repo.insert_lead(&lead).await?;
        info!("Lead created: {} ({}) in team {}", lead.lead_id, pipeline.as_str(), lead.team_id);
        Ok(lead)
    }

    pub async fn get_lead(&self, session: &Session, lead_id: &str) -> PipelineResult<Lead> {
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        self.load_visible(session, &memberships, lead_id).await
    }

    /// Like `get_lead`, but a lead from another pipeline counts as missing.
    pub async fn get_lead_in(&self, session: &Session, lead_id: &str, pipeline: Pipeline) -> PipelineResult<Lead> {
        let lead = self.get_lead(session, lead_id).await?;
        if lead.pipeline != pipeline {
            debug!("Lead {} is {}, not {}", lead_id, lead.pipeline.as_str(), pipeline.as_str());
            return Err(PipelineError::not_found("Lead", lead_id));
        }
        Ok(lead)
    }

    pub async fn list_leads(&self, session: &Session, filter: LeadFilter) -> PipelineResult<VisibleLeads<Lead>> {
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        let mut leads = self.repo.list_leads(&session.team_id).await?;
        if let Some(pipeline) = filter.pipeline {
            leads.retain(|lead| lead.pipeline == pipeline);
        }
        Ok(visibility::filter_leads(session, &memberships, leads))
    }

    /// Partial update. A `stage` field goes through the state machine and logs
    /// a `stage_change` activity; if that append fails the lead is restored.
    pub async fn update_lead(&self, session: &Session, lead_id: &str, update: LeadUpdate) -> PipelineResult<Lead> {
        if update.is_empty() {
            return Err(PipelineError::Validation("no fields to update".into()));
        }
        update.validate()?;

        let _guard = self.lock(lead_id).await;
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        let original = self.load_visible(session, &memberships, lead_id).await?;
        let mut lead = original.clone();

        if let Some(assignee) = &update.assigned_to {
            if !session.can_assign() {
                warn!("User {} tried to reassign lead {}", session.user_id, lead_id);
                return Err(PipelineError::Forbidden("only admins may reassign leads".into()));
            }
            let assignee = assignee.as_deref().and_then(non_blank);
            if let Some(assignee) = &assignee {
                self.ensure_assignable(&session.team_id, assignee).await?;
            }
            lead.assigned_to = assignee;
        }

        let transition = match &update.stage {
            Some(target) => match pipeline::plan_transition(&original, target) {
                Ok(transition) => transition,
                Err(e) => {
                    warn!("Rejected stage change for lead {} to {}: {}", lead_id, target, e);
                    return Err(e);
                }
            },
            None => Transition::Unchanged,
        };

        update.apply_fields(&mut lead);
        let now = Utc::now();

        let record = match transition {
            Transition::Move { from, to } => Some(pipeline::apply_move(&mut lead, from, to, &session.user_id, now)),
            Transition::Unchanged => None,
        };

        if lead == original {
            debug!("update_lead on {} changed nothing", lead_id);
            return Ok(original);
        }
        lead.updated_at = now;
        self.repo.save_lead(&lead).await?;

        if let Some(record) = record {
            if let Err(e) = self.repo.append_activity(record).await {
                error!("Activity append failed for lead {}, restoring stage {}: {}", lead_id, original.stage, e);
                if let Err(restore) = self.repo.save_lead(&original).await {
                    error!("Could not restore lead {}: {}", lead_id, restore);
                }
                return Err(e);
            }
            info!("Lead {} moved from {} to {}", lead_id, original.stage, lead.stage);
        }
        Ok(lead)
    }

    pub async fn change_stage(&self, session: &Session, lead_id: &str, stage: &str) -> PipelineResult<Lead> {
        let update = LeadUpdate { stage: Some(stage.to_string()), ..Default::default() };
        self.update_lead(session, lead_id, update).await
    }

    pub async fn delete_lead(&self, session: &Session, lead_id: &str) -> PipelineResult<()> {
        if !session.can_delete() {
            return Err(PipelineError::Forbidden("only admins and managers may delete leads".into()));
        }
        let _guard = self.lock(lead_id).await;
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        self.load_visible(session, &memberships, lead_id).await?;
        if !self.repo.delete_lead(lead_id).await? {
            return Err(PipelineError::not_found("Lead", lead_id));
        }
        info!("Lead {} deleted by {}", lead_id, session.user_id);
        Ok(())
    }

    // ─── ANNOTATIONS ─────────────────────────────────────────────────────────

    pub async fn add_tag(&self, session: &Session, lead_id: &str, tag: &str) -> PipelineResult<Lead> {
        self.annotate(session, lead_id, |lead| Ok(annotations::add_tag(lead, tag)))
            .await
    }

    pub async fn remove_tag(&self, session: &Session, lead_id: &str, tag: &str) -> PipelineResult<Lead> {
        self.annotate(session, lead_id, |lead| Ok(annotations::remove_tag(lead, tag)))
            .await
    }

    pub async fn add_note(&self, session: &Session, lead_id: &str, text: &str) -> PipelineResult<Lead> {
        self.annotate(session, lead_id, |lead| {
            annotations::add_note(lead, text);
            Ok(true)
        })
        .await
    }

    pub async fn update_note(&self, session: &Session, lead_id: &str, index: usize, text: &str) -> PipelineResult<Lead> {
        self.annotate(session, lead_id, |lead| annotations::update_note(lead, index, text))
            .await
    }

    pub async fn remove_note(&self, session: &Session, lead_id: &str, index: usize) -> PipelineResult<Lead> {
        self.annotate(session, lead_id, |lead| annotations::remove_note(lead, index).map(|_| true))
            .await
    }

    pub async fn add_objection(&self, session: &Session, lead_id: &str, objection: NewObjection) -> PipelineResult<Lead> {
        self.annotate(session, lead_id, |lead| annotations::add_objection(lead, objection).map(|_| true))
            .await
    }

    async fn annotate<F>(&self, session: &Session, lead_id: &str, edit: F) -> PipelineResult<Lead>
    where
        F: FnOnce(&mut Lead) -> PipelineResult<bool> + Send,
    {
        let _guard = self.lock(lead_id).await;
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        let mut lead = self.load_visible(session, &memberships, lead_id).await?;
        if edit(&mut lead)? {
            lead.updated_at = Utc::now();
            self.repo.save_lead(&lead).await?;
        }
        Ok(lead)
    }

    // ─── ACTIVITIES ──────────────────────────────────────────────────────────

    pub async fn create_activity(&self, session: &Session, req: NewActivity) -> PipelineResult<Activity> {
        if req.activity_type == ActivityType::StageChange {
            return Err(PipelineError::Validation(
                "stage_change activities are recorded by stage updates".into(),
            ));
        }
        let _guard = self.lock(&req.lead_id).await;
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        self.load_visible(session, &memberships, &req.lead_id).await?;

        let record = ActivityRecord {
            activity_id: Uuid::new_v4().to_string(),
            lead_id: req.lead_id,
            user_id: session.user_id.clone(),
            activity_type: req.activity_type,
            notes: req.notes.trim().to_string(),
            duration: req.duration,
            created_at: Utc::now(),
        };
        let activity = self.repo.append_activity(record).await?;
        info!(
            "Activity {} ({}) logged on lead {}",
            activity.activity_id,
            activity.activity_type.as_str(),
            activity.lead_id
        );
        Ok(activity)
    }

    /// Newest first, recomputed from the repository on every call.
    pub async fn list_activities(&self, session: &Session, filter: ActivityFilter) -> PipelineResult<Vec<Activity>> {
        let memberships = self.repo.memberships_for_user(&session.user_id).await?;
        let lead_ids = match filter.lead_id {
            Some(lead_id) => {
                self.load_visible(session, &memberships, &lead_id).await?;
                vec![lead_id]
            }
            None => {
                let leads = self.repo.list_leads(&session.team_id).await?;
                visibility::filter_leads(session, &memberships, leads)
                    .leads
                    .into_iter()
                    .map(|lead| lead.lead_id)
                    .collect()
            }
        };
        if lead_ids.is_empty() {
            return Ok(Vec::new());
        }
        let activities = self.repo.list_activities(&lead_ids).await?;
        Ok(timeline::timeline_for(activities))
    }

    pub async fn activity_summary(&self, session: &Session, lead_id: &str) -> PipelineResult<TimelineSummary> {
        let filter = ActivityFilter { lead_id: Some(lead_id.to_string()) };
        let activities = self.list_activities(session, filter).await?;
        Ok(timeline::summarize(&activities))
    }

    // ─── HELPERS ─────────────────────────────────────────────────────────────

    async fn load_visible(&self, session: &Session, memberships: &[UserTeam], lead_id: &str) -> PipelineResult<Lead> {
        let lead = self
            .repo
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("Lead", lead_id))?;
        visibility::ensure_visible(session, memberships, &lead)?;
        Ok(lead)
    }

    async fn ensure_assignable(&self, team_id: &str, assignee: &str) -> PipelineResult<()> {
        let member = self
            .repo
            .team_members(team_id)
            .await?
            .iter()
            .any(|m| m.user_id == assignee);
        if !member {
            return Err(PipelineError::Validation(
                "assignee must be a member of the same team".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DirectoryMembership, NewActivity};
    use crate::repository::MemoryRepository;

    async fn service_with_manager() -> (LeadService, Session) {
        let service = LeadService::new(Arc::new(MemoryRepository::new()));
        let manager = User {
            user_id: "manager".into(),
            name: "Manager".into(),
            email: "manager@example.com".into(),
            role: Role::Manager,
        };
        service
            .load_directory(Directory {
                users: vec![manager.clone()],
                memberships: vec![DirectoryMembership {
                    user_id: "manager".into(),
                    team_id: "t1".into(),
                    role: TeamRole::Member,
                }],
            })
            .await
            .unwrap();
        let session = Session::new(&manager, "t1", None).unwrap();
        (service, session)
    }

    #[tokio::test]
    async fn unknown_leads_leave_no_lock_entries() {
        let (service, session) = service_with_manager().await;
        for i in 0..200 {
            let id = format!("missing-{}", i);
            let err = service.add_tag(&session, &id, "vip").await.unwrap_err();
            assert!(matches!(err, PipelineError::NotFound { .. }));
            let err = service.change_stage(&session, &id, "won").await.unwrap_err();
            assert!(matches!(err, PipelineError::NotFound { .. }));
            let activity = NewActivity {
                lead_id: id.clone(),
                activity_type: ActivityType::Call,
                notes: String::new(),
                duration: None,
            };
            assert!(service.create_activity(&session, activity).await.is_err());
        }
        assert_eq!(service.locks.len(), 0);
    }

    #[tokio::test]
    async fn idle_leads_release_their_lock_entry() {
        let (service, session) = service_with_manager().await;
        let lead = service
            .create_lead(
                &session,
                NewLead { name: "Asha".into(), phone: "9876543210".into(), ..Default::default() },
            )
            .await
            .unwrap();

        service.add_tag(&session, &lead.lead_id, "vip").await.unwrap();
        service.change_stage(&session, &lead.lead_id, "qualified").await.unwrap();
        assert!(service.locks.is_empty());

        let held = service.lock(&lead.lead_id).await;
        assert_eq!(service.locks.len(), 1);
        drop(held);
        assert!(service.locks.is_empty());
    }
}
