// src/pipeline.rs

//! Stage transition rules.
//!
//! Any open stage may jump to any other stage of the same pipeline. Terminal
//! stages absorb: asking for the same terminal stage again is a no-op, asking
//! for anything else is refused.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ActivityRecord, ActivityType, Lead};
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to do, and nothing to log.
    Unchanged,
    Move { from: &'static Stage, to: &'static Stage },
}

pub fn plan_transition(lead: &Lead, target: &str) -> PipelineResult<Transition> {
    let registry = lead.registry();
    let to = registry.validate(target)?;
    let from = registry.validate(&lead.stage)?;

    if from.id == to.id {
        return Ok(Transition::Unchanged);
    }
    if from.terminal {
        return Err(PipelineError::StageLocked {
            lead_id: lead.lead_id.clone(),
            stage: from.id.to_string(),
        });
    }
    Ok(Transition::Move { from, to })
}

pub fn describe(from: &Stage, to: &Stage) -> String {
    format!(
        "Stage changed from {} ({}) to {} ({})",
        from.label, from.id, to.label, to.id
    )
}

/// Applies an accepted move to the lead and returns the activity it must log.
pub fn apply_move(
    lead: &mut Lead,
    from: &Stage,
    to: &Stage,
    user_id: &str,
    at: DateTime<Utc>,
) -> ActivityRecord {
    lead.stage = to.id.to_string();
    lead.updated_at = at;
    ActivityRecord {
        activity_id: Uuid::new_v4().to_string(),
        lead_id: lead.lead_id.clone(),
        user_id: user_id.to_string(),
        activity_type: ActivityType::StageChange,
        notes: describe(from, to),
        duration: None,
        created_at: at,
    }
}
