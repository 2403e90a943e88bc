//! Developer allocation conflicts.
//!
//! A developer must never run two stories with overlapping `[start, end]`
//! intervals. The check here is a pure predicate over the story set; the
//! allocator and the repair loop both build on it.

use chrono::NaiveDate;
use waveplan_core::{DeveloperId, Story, StoryId};

/// One overlapping story found during a conflict check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationConflict {
    pub story_id: StoryId,
    pub developer_id: DeveloperId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Two inclusive periods overlap iff each starts no later than the other ends.
pub fn periods_overlap(
    start1: NaiveDate,
    end1: NaiveDate,
    start2: NaiveDate,
    end2: NaiveDate,
) -> bool {
    start1 <= end2 && start2 <= end1
}

/// List the stories that make `developer_id` busy during `[start, end]`.
///
/// `story_id` itself is excluded; only stories assigned to the developer
/// with both dates set are considered. An empty result means the developer
/// is free.
pub fn find_conflicts(
    developer_id: &str,
    story_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    all_stories: &[Story],
) -> Vec<AllocationConflict> {
    all_stories
        .iter()
        .filter(|s| s.id != story_id)
        .filter(|s| s.developer_id.as_deref() == Some(developer_id))
        .filter_map(|s| {
            let (s_start, s_end) = (s.start_date?, s.end_date?);
            periods_overlap(start, end, s_start, s_end).then(|| AllocationConflict {
                story_id: s.id.clone(),
                developer_id: developer_id.to_string(),
                start_date: s_start,
                end_date: s_end,
            })
        })
        .collect()
}

/// True when the developer has no story overlapping `[start, end]`.
pub fn is_free(
    developer_id: &str,
    story_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    all_stories: &[Story],
) -> bool {
    find_conflicts(developer_id, story_id, start, end, all_stories).is_empty()
}
