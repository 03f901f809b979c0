// src/stage.rs

//! Ordered stage vocabularies for the sales and recruitment pipelines.
//!
//! The position of a stage in its table is its ordinal; progress indicators
//! compare ordinals, so the tables must stay in display order.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Which pipeline a record moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Sales,
    Recruitment,
}

impl Pipeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::Sales => "sales",
            Pipeline::Recruitment => "recruitment",
        }
    }

    pub fn parse(raw: &str) -> PipelineResult<Self> {
        match raw {
            "sales" | "leads" => Ok(Pipeline::Sales),
            "recruitment" | "candidates" => Ok(Pipeline::Recruitment),
            other => Err(PipelineError::not_found("Pipeline", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub id: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub terminal: bool,
}

const SALES_STAGES: &[Stage] = &[
    Stage { id: "new", label: "New", color: "#3b82f6", terminal: false },
    Stage { id: "contacted", label: "Contacted", color: "#8b5cf6", terminal: false },
    Stage { id: "qualified", label: "Qualified", color: "#06b6d4", terminal: false },
    Stage { id: "proposal", label: "Proposal", color: "#f59e0b", terminal: false },
    Stage { id: "negotiation", label: "Negotiation", color: "#f97316", terminal: false },
    Stage { id: "won", label: "Won", color: "#22c55e", terminal: true },
    Stage { id: "lost", label: "Lost", color: "#ef4444", terminal: true },
];

const RECRUITMENT_STAGES: &[Stage] = &[
    Stage { id: "applied", label: "Applied", color: "#3b82f6", terminal: false },
    Stage { id: "screening", label: "Screening", color: "#8b5cf6", terminal: false },
    Stage { id: "interview", label: "Interview", color: "#f59e0b", terminal: false },
    Stage { id: "offer", label: "Offer", color: "#06b6d4", terminal: false },
    Stage { id: "hired", label: "Hired", color: "#22c55e", terminal: true },
    Stage { id: "rejected", label: "Rejected", color: "#ef4444", terminal: true },
];

static SALES: StageRegistry = StageRegistry { stages: SALES_STAGES };
static RECRUITMENT: StageRegistry = StageRegistry { stages: RECRUITMENT_STAGES };

#[derive(Debug)]
pub struct StageRegistry {
    stages: &'static [Stage],
}

impl StageRegistry {
    pub fn for_pipeline(pipeline: Pipeline) -> &'static StageRegistry {
        match pipeline {
            Pipeline::Sales => &SALES,
            Pipeline::Recruitment => &RECRUITMENT,
        }
    }

    pub fn stages(&self) -> &'static [Stage] {
        self.stages
    }

    /// The stage new records start in.
    pub fn initial(&self) -> &'static Stage {
        &self.stages[0]
    }

    pub fn get_stage(&self, id: &str) -> PipelineResult<&'static Stage> {
        self.stages
            .iter()
            .find(|stage| stage.id == id)
            .ok_or_else(|| PipelineError::not_found("Stage", id))
    }

    /// Like `get_stage`, but reports an unknown id as `InvalidStage`.
    pub fn validate(&self, id: &str) -> PipelineResult<&'static Stage> {
        self.get_stage(id)
            .map_err(|_| PipelineError::InvalidStage(id.to_string()))
    }

    pub fn ordinal_of(&self, id: &str) -> PipelineResult<usize> {
        self.stages
            .iter()
            .position(|stage| stage.id == id)
            .ok_or_else(|| PipelineError::InvalidStage(id.to_string()))
    }

    pub fn is_terminal(&self, id: &str) -> bool {
        self.get_stage(id).map(|stage| stage.terminal).unwrap_or(false)
    }

    /// True when `a` sits strictly before `b` in display order.
    pub fn is_before(&self, a: &str, b: &str) -> PipelineResult<bool> {
        Ok(self.ordinal_of(a)? < self.ordinal_of(b)?)
    }

    /// Non-terminal stages a record in `current` has already passed.
    pub fn passed_stages(&self, current: &str) -> Vec<&'static str> {
        self.stages
            .iter()
            .filter(|stage| !stage.terminal)
            .filter(|stage| self.is_before(stage.id, current).unwrap_or(false))
            .map(|stage| stage.id)
            .collect()
    }
}
