// src/timeline.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Activity, ActivityType};

/// Newest first. Activities sharing a timestamp keep creation order.
pub fn timeline_for(mut activities: Vec<Activity>) -> Vec<Activity> {
    activities.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.seq.cmp(&b.seq))
    });
    activities
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct TimelineSummary {
    pub total: usize,
    pub by_type: BTreeMap<&'static str, usize>,
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Most recent call, email or meeting; stage changes and notes don't count.
    pub last_contacted_at: Option<DateTime<Utc>>,
}

pub fn summarize(activities: &[Activity]) -> TimelineSummary {
    let mut summary = TimelineSummary { total: activities.len(), ..Default::default() };
    for activity in activities {
        *summary.by_type.entry(activity.activity_type.as_str()).or_insert(0) += 1;
        summary.last_activity_at = summary.last_activity_at.max(Some(activity.created_at));
        if matches!(
            activity.activity_type,
            ActivityType::Call | ActivityType::Email | ActivityType::Meeting
        ) {
            summary.last_contacted_at = summary.last_contacted_at.max(Some(activity.created_at));
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn activity(id: &str, kind: ActivityType, at: DateTime<Utc>, seq: u64) -> Activity {
        Activity {
            activity_id: id.into(),
            lead_id: "l1".into(),
            user_id: "u".into(),
            activity_type: kind,
            notes: String::new(),
            duration: None,
            created_at: at,
            seq,
        }
    }

    #[test]
    fn newest_first() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::minutes(1);
        let t3 = t1 + Duration::minutes(2);
        let ordered = timeline_for(vec![
            activity("a", ActivityType::Call, t1, 0),
            activity("c", ActivityType::Note, t3, 2),
            activity("b", ActivityType::Email, t2, 1),
        ]);
        let ids: Vec<_> = ordered.iter().map(|a| a.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let t = Utc::now();
        let ordered = timeline_for(vec![
            activity("second", ActivityType::Note, t, 1),
            activity("first", ActivityType::Note, t, 0),
        ]);
        assert_eq!(ordered[0].activity_id, "first");
        assert_eq!(ordered[1].activity_id, "second");
    }

    #[test]
    fn empty_timeline() {
        assert!(timeline_for(vec![]).is_empty());
        assert_eq!(summarize(&[]), TimelineSummary::default());
    }

    #[test]
    fn summary_counts_types() {
        let t = Utc::now();
        let later = t + Duration::hours(1);
        let summary = summarize(&[
            activity("a", ActivityType::Call, t, 0),
            activity("b", ActivityType::Call, t, 1),
            activity("c", ActivityType::StageChange, later, 2),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_type["call"], 2);
        assert_eq!(summary.by_type["stage_change"], 1);
        assert_eq!(summary.last_activity_at, Some(later));
        assert_eq!(summary.last_contacted_at, Some(t));
    }
}
