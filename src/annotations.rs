// src/annotations.rs

//! Tags, bullet notes and objections attached to a lead.
//!
//! Each function mutates the lead in place and reports whether anything
//! changed, so callers can skip the write when a command was a no-op.

use chrono::Utc;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Lead, NewObjection, Objection};

/// Empty or already-present tags are ignored.
pub fn add_tag(lead: &mut Lead, tag: &str) -> bool {
    let tag = tag.trim();
    if tag.is_empty() || lead.tags.iter().any(|t| t == tag) {
        return false;
    }
    lead.tags.push(tag.to_string());
    true
}

pub fn remove_tag(lead: &mut Lead, tag: &str) -> bool {
    let tag = tag.trim();
    let before = lead.tags.len();
    lead.tags.retain(|t| t != tag);
    lead.tags.len() != before
}

pub fn add_note(lead: &mut Lead, text: &str) -> usize {
    lead.notes.push(text.to_string());
    lead.notes.len() - 1
}

pub fn update_note(lead: &mut Lead, index: usize, text: &str) -> PipelineResult<bool> {
    if index >= lead.notes.len() {
        return Err(note_not_found(&lead.lead_id, index));
    }
    let note = &mut lead.notes[index];
    if *note == text {
        return Ok(false);
    }
    *note = text.to_string();
    Ok(true)
}

pub fn remove_note(lead: &mut Lead, index: usize) -> PipelineResult<String> {
    if index >= lead.notes.len() {
        return Err(note_not_found(&lead.lead_id, index));
    }
    Ok(lead.notes.remove(index))
}

pub fn add_objection(lead: &mut Lead, objection: NewObjection) -> PipelineResult<&Objection> {
    let title = objection.title.trim();
    if title.is_empty() {
        return Err(PipelineError::Validation("objection title is required".into()));
    }
    lead.objections.push(Objection {
        title: title.to_string(),
        description: objection.description.trim().to_string(),
        category: objection.category.trim().to_string(),
        created_at: Utc::now(),
    });
    Ok(&lead.objections[lead.objections.len() - 1])
}

fn note_not_found(lead_id: &str, index: usize) -> PipelineError {
    PipelineError::not_found("Note", format!("{}#{}", lead_id, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Pipeline;

    fn blank_lead() -> Lead {
        let now = Utc::now();
        Lead {
            lead_id: "l1".into(),
            team_id: "t".into(),
            pipeline: Pipeline::Sales,
            name: "Asha".into(),
            company: None,
            phone: "9876543210".into(),
            email: None,
            address: None,
            source: None,
            stage: "new".into(),
            value: 0,
            assigned_to: None,
            rating: 0,
            tags: vec![],
            notes: vec![],
            objections: vec![],
            created_by: "u".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tags_behave_like_an_ordered_set() {
        let mut lead = blank_lead();
        assert!(add_tag(&mut lead, "enterprise"));
        assert!(add_tag(&mut lead, "  urgent "));
        assert!(!add_tag(&mut lead, "enterprise"));
        assert!(!add_tag(&mut lead, "   "));
        assert_eq!(lead.tags, vec!["enterprise", "urgent"]);

        assert!(!remove_tag(&mut lead, "missing"));
        assert!(remove_tag(&mut lead, "enterprise"));
        assert_eq!(lead.tags, vec!["urgent"]);
    }

    #[test]
    fn notes_are_index_addressed() {
        let mut lead = blank_lead();
        assert_eq!(add_note(&mut lead, "budget approved"), 0);
        assert_eq!(add_note(&mut lead, "call back friday"), 1);
        assert!(update_note(&mut lead, 1, "call back monday").unwrap());
        assert!(!update_note(&mut lead, 1, "call back monday").unwrap());
        assert!(matches!(update_note(&mut lead, 5, "x"), Err(PipelineError::NotFound { .. })));

        assert_eq!(remove_note(&mut lead, 0).unwrap(), "budget approved");
        assert_eq!(lead.notes, vec!["call back monday"]);
        assert!(remove_note(&mut lead, 1).is_err());
    }

    #[test]
    fn objections_append() {
        let mut lead = blank_lead();
        let added = add_objection(
            &mut lead,
            NewObjection {
                title: "Too expensive".into(),
                description: "Competitor quoted 20% less".into(),
                category: "price".into(),
            },
        )
        .unwrap();
        assert_eq!(added.category, "price");

        let blank = NewObjection { title: " ".into(), description: String::new(), category: String::new() };
        assert!(matches!(add_objection(&mut lead, blank), Err(PipelineError::Validation(_))));
        assert_eq!(lead.objections.len(), 1);
    }
}
