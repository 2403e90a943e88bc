//! Schedule calculation.
//!
//! Walks the backlog in topological order assigning `start_date`,
//! `end_date` and `duration` on the business-day calendar. Three
//! constraints push a story's start forward:
//!
//! 1. The wave barrier: a story of wave N > 0 starts after every story of
//!    waves 1..N placed so far has ended. Wave 0 neither gates nor is
//!    gated.
//! 2. Per-developer serialization: a pre-assigned developer runs stories
//!    back to back, never in parallel.
//! 3. Dependencies: a story starts on the next workday after its latest
//!    dependency ends.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;
use waveplan_core::calendar::{add_workdays, ensure_workday, next_workday};
use waveplan_core::{Configuration, DeveloperId, Story};

/// Duration in business days for a story point total at the configured
/// velocity. Never less than one day.
pub fn duration_for(story_points: u32, config: &Configuration) -> u32 {
    let days = (f64::from(story_points) / config.velocity_per_day()).ceil() as u32;
    days.max(1)
}

/// Compute dates for `stories[order]` in place.
///
/// `order` must be a topological order over `stories` (see `sort`);
/// `start_date` is the effective roadmap start. Stories without a story
/// point keep their fields untouched but still hold their serialization
/// slot if they carry dates and a developer.
pub fn calculate(
    stories: &mut [Story],
    order: &[usize],
    config: &Configuration,
    start_date: NaiveDate,
) {
    let start = ensure_workday(start_date);

    let mut dev_last_end: HashMap<DeveloperId, NaiveDate> = HashMap::new();
    let mut wave_last_end: HashMap<u32, NaiveDate> = HashMap::new();
    let mut end_by_id: HashMap<String, NaiveDate> = HashMap::new();

    for &idx in order {
        let Some(sp) = stories[idx].story_point else {
            continue;
        };
        let duration = duration_for(sp.value(), config);

        let mut earliest = start;

        // Wave barrier: the latest end among all prior waves already placed
        let wave = stories[idx].wave;
        if wave > 0 {
            let barrier = wave_last_end
                .iter()
                .filter(|&(&w, _)| w > 0 && w < wave)
                .map(|(_, &end)| end)
                .max();
            if let Some(prev_end) = barrier {
                earliest = earliest.max(next_workday(prev_end));
            }
        }

        // Developer serialization
        if let Some(dev_id) = stories[idx].developer_id.as_deref() {
            if let Some(&dev_end) = dev_last_end.get(dev_id) {
                earliest = earliest.max(next_workday(dev_end));
            }
        }

        // Dependencies: next workday after the latest one to finish
        for dep_id in &stories[idx].dependencies {
            if let Some(&dep_end) = end_by_id.get(dep_id.as_str()) {
                earliest = earliest.max(next_workday(dep_end));
            }
        }

        let story_start = ensure_workday(earliest);
        let story_end = add_workdays(story_start, duration - 1);

        debug!(
            story = %stories[idx].id,
            wave,
            %story_start,
            %story_end,
            duration,
            "story placed"
        );

        let story = &mut stories[idx];
        story.duration = Some(duration);
        story.start_date = Some(story_start);
        story.end_date = Some(story_end);

        end_by_id.insert(story.id.clone(), story_end);
        if let Some(dev_id) = story.developer_id.clone() {
            dev_last_end
                .entry(dev_id)
                .and_modify(|e| *e = (*e).max(story_end))
                .or_insert(story_end);
        }
        wave_last_end
            .entry(wave)
            .and_modify(|e| *e = (*e).max(story_end))
            .or_insert(story_end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort;
    use pretty_assertions::assert_eq;
    use waveplan_core::StoryPoint;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sp(value: u32) -> StoryPoint {
        StoryPoint::new(value).unwrap()
    }

    fn run(stories: &mut [Story], start: NaiveDate) {
        let order = sort::topological_order(stories).unwrap();
        calculate(stories, &order, &Configuration::default(), start);
    }

    #[test]
    fn duration_rounds_up_and_floors_at_one() {
        let config = Configuration::default(); // velocity 1.4
        assert_eq!(duration_for(5, &config), 4); // 5 / 1.4 = 3.57 -> 4
        assert_eq!(duration_for(3, &config), 3); // 3 / 1.4 = 2.14 -> 3
        assert_eq!(duration_for(13, &config), 10);

        let fast = Configuration {
            story_points_per_sprint: 100,
            workdays_per_sprint: 5,
            ..Configuration::default()
        };
        assert_eq!(duration_for(3, &fast), 1);
    }

    #[test]
    fn single_story_starts_at_roadmap_start() {
        let mut stories = vec![Story::new("A", "core", "Story A").story_point(sp(5))];
        run(&mut stories, date(2025, 1, 6));

        assert_eq!(stories[0].start_date, Some(date(2025, 1, 6)));
        assert_eq!(stories[0].end_date, Some(date(2025, 1, 9)));
        assert_eq!(stories[0].duration, Some(4));
    }

    #[test]
    fn start_date_is_pushed_to_a_workday() {
        // Saturday start shifts to Monday
        let mut stories = vec![Story::new("A", "core", "Story A").story_point(sp(3))];
        run(&mut stories, date(2025, 1, 4));
        assert_eq!(stories[0].start_date, Some(date(2025, 1, 6)));
    }

    #[test]
    fn dependency_chain_is_serialized() {
        let mut stories = vec![
            Story::new("A", "core", "Story A").story_point(sp(5)).priority(0),
            Story::new("B", "core", "Story B")
                .story_point(sp(5))
                .priority(1)
                .depends_on("A"),
            Story::new("C", "core", "Story C")
                .story_point(sp(5))
                .priority(2)
                .depends_on("B"),
        ];
        run(&mut stories, date(2025, 1, 6));

        // 4-day stories: A Mon 06 - Thu 09, B Fri 10 - Wed 15, C Thu 16 - Tue 21
        assert_eq!(stories[0].start_date, Some(date(2025, 1, 6)));
        assert_eq!(stories[0].end_date, Some(date(2025, 1, 9)));
        assert_eq!(stories[1].start_date, Some(date(2025, 1, 10)));
        assert_eq!(stories[1].end_date, Some(date(2025, 1, 15)));
        assert_eq!(stories[2].start_date, Some(date(2025, 1, 16)));
        assert_eq!(stories[2].end_date, Some(date(2025, 1, 21)));
    }

    #[test]
    fn same_developer_never_overlaps() {
        let mut stories = vec![
            Story::new("A", "core", "Story A")
                .story_point(sp(5))
                .priority(0)
                .developer("dev1"),
            Story::new("B", "core", "Story B")
                .story_point(sp(5))
                .priority(1)
                .developer("dev1"),
        ];
        run(&mut stories, date(2025, 1, 6));

        assert_eq!(stories[1].start_date, Some(date(2025, 1, 10)));
    }

    #[test]
    fn unassigned_stories_may_share_dates() {
        let mut stories = vec![
            Story::new("X", "core", "Story X").story_point(sp(5)).priority(0),
            Story::new("Y", "core", "Story Y").story_point(sp(5)).priority(1),
        ];
        run(&mut stories, date(2025, 1, 6));
        assert_eq!(stories[0].start_date, stories[1].start_date);
    }

    #[test]
    fn wave_barrier_gates_later_waves() {
        let mut stories = vec![
            {
                let mut s = Story::new("A", "core", "Wave one").story_point(sp(5)).priority(0);
                s.wave = 1;
                s
            },
            {
                // No dependency on A, still gated by the barrier
                let mut s = Story::new("B", "core", "Wave two").story_point(sp(3)).priority(1);
                s.wave = 2;
                s
            },
        ];
        run(&mut stories, date(2025, 1, 6));

        let a_end = stories[0].end_date.unwrap();
        assert_eq!(stories[1].start_date, Some(next_workday(a_end)));
    }

    #[test]
    fn wave_zero_is_never_a_barrier() {
        let mut stories = vec![
            Story::new("Z", "core", "No feature").story_point(sp(13)).priority(0), // wave 0
            {
                let mut s = Story::new("A", "core", "Wave one").story_point(sp(3)).priority(1);
                s.wave = 1;
                s
            },
        ];
        run(&mut stories, date(2025, 1, 6));

        // Wave 1 starts at roadmap start despite the long wave-0 story
        assert_eq!(stories[1].start_date, Some(date(2025, 1, 6)));
    }

    #[test]
    fn non_contiguous_waves_use_latest_prior_wave() {
        let mut stories = vec![
            {
                let mut s = Story::new("A", "core", "Wave one").story_point(sp(5)).priority(0);
                s.wave = 1;
                s
            },
            {
                let mut s = Story::new("C", "core", "Wave five").story_point(sp(3)).priority(1);
                s.wave = 5;
                s
            },
        ];
        run(&mut stories, date(2025, 1, 6));

        let a_end = stories[0].end_date.unwrap();
        assert_eq!(stories[1].start_date, Some(next_workday(a_end)));
    }

    #[test]
    fn stories_without_points_are_skipped() {
        let mut stories = vec![Story::new("A", "core", "No estimate")];
        run(&mut stories, date(2025, 1, 6));
        assert_eq!(stories[0].start_date, None);
        assert_eq!(stories[0].duration, None);
    }

    #[test]
    fn end_date_spans_exactly_duration_workdays() {
        use waveplan_core::calendar::count_workdays;

        let mut stories = vec![
            Story::new("A", "core", "Story A").story_point(sp(13)).priority(0),
            Story::new("B", "core", "Story B")
                .story_point(sp(8))
                .priority(1)
                .depends_on("A"),
        ];
        run(&mut stories, date(2025, 1, 6));

        for story in &stories {
            let counted = count_workdays(story.start_date.unwrap(), story.end_date.unwrap());
            assert_eq!(counted, story.duration.unwrap());
        }
    }
}
