// src/visibility.rs

//! Who may see which leads, and who may administer them.
//!
//! Role simulation (`view_as`) changes which rows are returned but never who
//! may reassign leads: assignment always follows the authenticated role.

use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Lead, Role, User, UserTeam};

/// Explicit caller context passed into every pipeline command.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub actual_role: Role,
    pub view_as: Option<Role>,
    pub team_id: String,
}

impl Session {
    /// Only admins may preview the console as another role.
    pub fn new(user: &User, team_id: &str, view_as: Option<Role>) -> PipelineResult<Self> {
        if let Some(simulated) = view_as {
            if user.role != Role::Admin && simulated != user.role {
                return Err(PipelineError::Forbidden(format!(
                    "only admins may view the console as {:?}",
                    simulated
                )));
            }
        }
        Ok(Session {
            user_id: user.user_id.clone(),
            actual_role: user.role,
            view_as,
            team_id: team_id.to_string(),
        })
    }

    pub fn effective_role(&self) -> Role {
        self.view_as.unwrap_or(self.actual_role)
    }

    pub fn can_assign(&self) -> bool {
        self.actual_role == Role::Admin
    }

    /// Delete requires an authenticated admin or manager.
    pub fn can_delete(&self) -> bool {
        matches!(self.actual_role, Role::Admin | Role::Manager)
    }

    pub fn scope(&self) -> LeadScope {
        match self.effective_role() {
            Role::Admin | Role::Manager => LeadScope::AllLeads,
            Role::Member => LeadScope::MyLeads,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadScope {
    AllLeads,
    MyLeads,
}

/// The result of filtering a team's leads for one caller.
#[derive(Debug, Serialize)]
pub struct VisibleLeads<T> {
    pub view: LeadScope,
    pub can_assign: bool,
    pub leads: Vec<T>,
}

pub fn is_team_member(session: &Session, memberships: &[UserTeam]) -> bool {
    memberships
        .iter()
        .any(|m| m.user_id == session.user_id && m.team_id == session.team_id)
}

/// Single-lead check used before reads and mutations.
pub fn can_see(session: &Session, memberships: &[UserTeam], lead: &Lead) -> bool {
    if lead.team_id != session.team_id || !is_team_member(session, memberships) {
        return false;
    }
    match session.scope() {
        LeadScope::AllLeads => true,
        LeadScope::MyLeads => lead.assigned_to.as_deref() == Some(session.user_id.as_str()),
    }
}

/// Fails closed: a caller outside the team gets an empty list, not an error.
pub fn filter_leads(session: &Session, memberships: &[UserTeam], leads: Vec<Lead>) -> VisibleLeads<Lead> {
    let visible = leads
        .into_iter()
        .filter(|lead| can_see(session, memberships, lead))
        .collect();
    VisibleLeads {
        view: session.scope(),
        can_assign: session.can_assign(),
        leads: visible,
    }
}

pub fn ensure_visible(session: &Session, memberships: &[UserTeam], lead: &Lead) -> PipelineResult<()> {
    if can_see(session, memberships, lead) {
        Ok(())
    } else {
        Err(PipelineError::Forbidden(format!(
            "lead {} is not visible to user {}",
            lead.lead_id, session.user_id
        )))
    }
}
