//! Idleness detection.
//!
//! Groups allocated stories by developer, sorts each group by start date
//! and measures the business-day gap between consecutive stories. Gaps
//! inside one wave above `max_idle_days` are violations; gaps across a
//! wave boundary are expected (waves are barriers) and reported as
//! informational records only.

use chrono::Days;
use std::collections::BTreeMap;
use waveplan_core::calendar::count_workdays_between;
use waveplan_core::{AllocationWarning, IdlenessWarning, Story};

/// Intra-wave gaps exceeding `max_idle_days`.
pub fn detect_idleness(all_stories: &[Story], max_idle_days: u32) -> Vec<AllocationWarning> {
    consecutive_gaps(all_stories)
        .into_iter()
        .filter(|(same_wave, warning)| *same_wave && warning.gap_days > max_idle_days)
        .map(|(_, warning)| AllocationWarning::Idleness(warning))
        .collect()
}

/// Inter-wave gaps, informational.
pub fn detect_between_waves_idleness(all_stories: &[Story]) -> Vec<AllocationWarning> {
    consecutive_gaps(all_stories)
        .into_iter()
        .filter(|(same_wave, warning)| !*same_wave && warning.gap_days > 0)
        .map(|(_, warning)| AllocationWarning::WaveTransition(warning))
        .collect()
}

/// All gaps between consecutive stories per developer, tagged with whether
/// the pair shares a wave. Developers are walked in id order so the output
/// is stable.
fn consecutive_gaps(all_stories: &[Story]) -> Vec<(bool, IdlenessWarning)> {
    let mut by_developer: BTreeMap<&str, Vec<&Story>> = BTreeMap::new();
    for story in all_stories {
        if let (Some(dev_id), Some(_), Some(_)) =
            (story.developer_id.as_deref(), story.start_date, story.end_date)
        {
            by_developer.entry(dev_id).or_default().push(story);
        }
    }

    let mut gaps = Vec::new();
    for (dev_id, mut stories) in by_developer {
        stories.sort_by_key(|s| (s.start_date, s.id.clone()));

        for pair in stories.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            let end = before.end_date.expect("filtered above");
            let start = after.start_date.expect("filtered above");
            let gap = count_workdays_between(end, start);
            if gap == 0 {
                continue;
            }
            gaps.push((
                before.wave == after.wave,
                IdlenessWarning {
                    developer_id: dev_id.to_string(),
                    gap_days: gap,
                    story_before: before.id.clone(),
                    story_after: after.id.clone(),
                    idle_start: end + Days::new(1),
                    idle_end: start - Days::new(1),
                },
            ));
        }
    }
    gaps
}
