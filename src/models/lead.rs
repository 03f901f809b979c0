use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::stage::{Pipeline, StageRegistry};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("phone pattern compiles"));

pub const MAX_RATING: u8 = 5;

/// A prospect (sales) or candidate (recruitment) moving through a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id: String,
    pub team_id: String,
    pub pipeline: Pipeline,

    pub name: String,
    pub company: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    /// e.g. "Website", "Referral", "LinkedIn"
    pub source: Option<String>,

    /// Only the pipeline state machine writes this.
    pub stage: String,
    /// Deal size in minor units, currency-agnostic.
    pub value: u64,
    pub assigned_to: Option<String>,
    pub rating: u8,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub objections: Vec<Objection>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn temperature(&self) -> Temperature {
        Temperature::from_rating(self.rating)
    }

    pub fn registry(&self) -> &'static StageRegistry {
        StageRegistry::for_pipeline(self.pipeline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
    Unrated,
}

impl Temperature {
    pub fn from_rating(rating: u8) -> Self {
        match rating {
            0 => Temperature::Unrated,
            1 | 2 => Temperature::Cold,
            3 => Temperature::Warm,
            _ => Temperature::Hot,
        }
    }
}

/// A sales objection raised by the prospect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objection {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// e.g. "price", "timing", "competition"
    #[serde(default)]
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewObjection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// Request payload for creating a lead or candidate.
#[derive(Debug, Default, Deserialize)]
pub struct NewLead {
    pub pipeline: Option<Pipeline>,
    #[serde(default)]
    pub name: String,
    pub company: Option<String>,
    #[serde(default)]
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub source: Option<String>,
    pub stage: Option<String>,
    pub value: Option<u64>,
    pub assigned_to: Option<String>,
    pub rating: Option<u8>,
    pub tags: Option<Vec<String>>,
}

impl NewLead {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::Validation("name is required".into()));
        }
        validate_phone(&self.phone)?;
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }
}

/// Request payload for a partial update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct LeadUpdate {
    pub name: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub source: Option<String>,
    pub stage: Option<String>,
    pub value: Option<u64>,
    /// `null` unassigns, a missing field leaves the assignee alone.
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
    pub rating: Option<u8>,
}

impl LeadUpdate {
    pub fn validate(&self) -> PipelineResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(PipelineError::Validation("name cannot be blank".into()));
            }
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &self.email {
            if !email.trim().is_empty() {
                validate_email(email)?;
            }
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }

    /// True when the update touches anything besides stage and assignee.
    pub fn has_field_edits(&self) -> bool {
        self.name.is_some()
            || self.company.is_some()
            || self.phone.is_some()
            || self.email.is_some()
            || self.address.is_some()
            || self.source.is_some()
            || self.value.is_some()
            || self.rating.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_field_edits() && self.stage.is_none() && self.assigned_to.is_none()
    }

    /// Writes the descriptive fields onto `lead`. Blank optional strings clear the field.
    pub fn apply_fields(&self, lead: &mut Lead) {
        if let Some(name) = &self.name {
            lead.name = name.trim().to_string();
        }
        if let Some(phone) = &self.phone {
            lead.phone = phone.trim().to_string();
        }
        if let Some(company) = &self.company {
            lead.company = non_blank(company);
        }
        if let Some(email) = &self.email {
            lead.email = non_blank(email);
        }
        if let Some(address) = &self.address {
            lead.address = non_blank(address);
        }
        if let Some(source) = &self.source {
            lead.source = non_blank(source);
        }
        if let Some(value) = self.value {
            lead.value = value;
        }
        if let Some(rating) = self.rating {
            lead.rating = rating;
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LeadFilter {
    pub pipeline: Option<Pipeline>,
}

/// A lead decorated with the derived fields the console renders.
#[derive(Debug, Serialize)]
pub struct LeadView {
    #[serde(flatten)]
    pub lead: Lead,
    pub temperature: Temperature,
    pub stage_label: &'static str,
    pub stage_color: &'static str,
    pub stage_ordinal: usize,
    /// Drives the progress indicator.
    pub passed_stages: Vec<&'static str>,
}

impl From<Lead> for LeadView {
    fn from(lead: Lead) -> Self {
        let registry = lead.registry();
        let (stage_label, stage_color) = registry
            .get_stage(&lead.stage)
            .map(|s| (s.label, s.color))
            .unwrap_or(("Unknown", "#9ca3af"));
        let stage_ordinal = registry.ordinal_of(&lead.stage).unwrap_or(usize::MAX);
        let passed_stages = registry.passed_stages(&lead.stage);
        LeadView {
            temperature: lead.temperature(),
            stage_label,
            stage_color,
            stage_ordinal,
            passed_stages,
            lead,
        }
    }
}

pub(crate) fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn validate_phone(phone: &str) -> PipelineResult<()> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(PipelineError::Validation("phone is required".into()));
    }
    if !PHONE_RE.is_match(phone) {
        return Err(PipelineError::Validation(format!("malformed phone number: {}", phone)));
    }
    Ok(())
}

fn validate_email(email: &str) -> PipelineResult<()> {
    if !EMAIL_RE.is_match(email.trim()) {
        return Err(PipelineError::Validation(format!("malformed email: {}", email)));
    }
    Ok(())
}

fn validate_rating(rating: u8) -> PipelineResult<()> {
    if rating > MAX_RATING {
        return Err(PipelineError::Validation(format!(
            "rating must be between 0 and {}",
            MAX_RATING
        )));
    }
    Ok(())
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_from_rating() {
        assert_eq!(Temperature::from_rating(0), Temperature::Unrated);
        assert_eq!(Temperature::from_rating(1), Temperature::Cold);
        assert_eq!(Temperature::from_rating(2), Temperature::Cold);
        assert_eq!(Temperature::from_rating(3), Temperature::Warm);
        assert_eq!(Temperature::from_rating(4), Temperature::Hot);
        assert_eq!(Temperature::from_rating(5), Temperature::Hot);
    }

    #[test]
    fn new_lead_requires_name_and_phone() {
        let missing_name = NewLead { phone: "+91 98765 43210".into(), ..Default::default() };
        assert!(matches!(missing_name.validate(), Err(PipelineError::Validation(_))));

        let missing_phone = NewLead { name: "Asha".into(), ..Default::default() };
        assert!(matches!(missing_phone.validate(), Err(PipelineError::Validation(_))));

        let ok = NewLead {
            name: "Asha".into(),
            phone: "+91 98765 43210".into(),
            email: Some("asha@example.com".into()),
            rating: Some(4),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn rejects_bad_email_and_rating() {
        let lead = NewLead {
            name: "Asha".into(),
            phone: "9876543210".into(),
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(matches!(lead.validate(), Err(PipelineError::Validation(_))));

        let update = LeadUpdate { rating: Some(6), ..Default::default() };
        assert!(matches!(update.validate(), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn assigned_to_distinguishes_null_from_missing() {
        let missing: LeadUpdate = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(missing.assigned_to, None);

        let null: LeadUpdate = serde_json::from_str(r#"{"assigned_to":null}"#).unwrap();
        assert_eq!(null.assigned_to, Some(None));

        let set: LeadUpdate = serde_json::from_str(r#"{"assigned_to":"u1"}"#).unwrap();
        assert_eq!(set.assigned_to, Some(Some("u1".to_string())));
    }
}
