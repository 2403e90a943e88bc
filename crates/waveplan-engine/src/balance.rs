//! Developer selection.
//!
//! Two strategies share the same primitives: count how many stories each
//! developer carries, rank developers by load with a random tie-break, and
//! optionally prefer the developer who owns the story's dependencies. The
//! random source is always passed in by the caller so runs are reproducible
//! under a seed.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use waveplan_core::calendar::count_workdays_between;
use waveplan_core::{AllocationCriteria, Developer, DeveloperId, Story};

/// Number of stories currently assigned to each developer.
pub fn count_stories_per_developer(
    developers: &[Developer],
    all_stories: &[Story],
) -> HashMap<DeveloperId, usize> {
    let mut load: HashMap<DeveloperId, usize> =
        developers.iter().map(|d| (d.id.clone(), 0)).collect();
    for story in all_stories {
        if let Some(dev_id) = story.developer_id.as_deref() {
            if let Some(count) = load.get_mut(dev_id) {
                *count += 1;
            }
        }
    }
    load
}

/// Rank developers by ascending load, breaking ties alphabetically by name.
pub fn sort_by_load_and_name(developers: &[Developer], all_stories: &[Story]) -> Vec<Developer> {
    let load = count_stories_per_developer(developers, all_stories);
    let mut sorted = developers.to_vec();
    sorted.sort_by(|a, b| {
        let (la, lb) = (load.get(&a.id).copied().unwrap_or(0), load.get(&b.id).copied().unwrap_or(0));
        la.cmp(&lb)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    sorted
}

/// Rank developers by ascending load, shuffling within each load bucket.
///
/// Buckets are emitted smallest load first; the shuffle inside a bucket is
/// driven entirely by `rng`, so a seeded rng makes the result reproducible.
pub fn sort_by_load_random_tiebreak(
    developers: &[Developer],
    all_stories: &[Story],
    rng: &mut impl Rng,
) -> Vec<Developer> {
    let load = count_stories_per_developer(developers, all_stories);

    let mut buckets: BTreeMap<usize, Vec<Developer>> = BTreeMap::new();
    for dev in developers {
        buckets
            .entry(load.get(&dev.id).copied().unwrap_or(0))
            .or_default()
            .push(dev.clone());
    }

    let mut sorted = Vec::with_capacity(developers.len());
    for (_, mut group) in buckets {
        group.shuffle(rng);
        sorted.extend(group);
    }
    sorted
}

/// Find the first candidate (in candidate order) that owns any of the
/// story's dependencies.
pub fn get_dependency_owner<'a>(
    story: &Story,
    all_stories: &[Story],
    candidates: &'a [Developer],
) -> Option<&'a Developer> {
    let owner_by_story: HashMap<&str, &str> = all_stories
        .iter()
        .filter_map(|s| Some((s.id.as_str(), s.developer_id.as_deref()?)))
        .collect();

    candidates.iter().find(|candidate| {
        story
            .dependencies
            .iter()
            .any(|dep| owner_by_story.get(dep.as_str()) == Some(&candidate.id.as_str()))
    })
}

/// Idle business days the developer would sit between their latest story of
/// `wave` ending before `new_start` and `new_start` itself.
///
/// `None` when the developer has no earlier story in that wave.
pub fn idle_gap_within_wave(
    developer_id: &str,
    exclude_story: &str,
    new_start: chrono::NaiveDate,
    wave: u32,
    all_stories: &[Story],
) -> Option<u32> {
    let previous_end = all_stories
        .iter()
        .filter(|s| s.developer_id.as_deref() == Some(developer_id))
        .filter(|s| s.id != exclude_story && s.wave == wave)
        .filter_map(|s| s.end_date)
        .filter(|&end| end < new_start)
        .max()?;
    Some(count_workdays_between(previous_end, new_start))
}

/// Pick a developer for `story` among `candidates`.
///
/// Under `DependencyOwner` the owner of a dependency wins when allocating
/// to them would not breach `max_idle_days` within `current_wave`;
/// otherwise selection falls through to load balancing. Under load
/// balancing the least-loaded candidate passing the idleness screen wins;
/// when nobody passes, the least-loaded candidate is returned
/// unconditionally so allocation can proceed and the repair loop can deal
/// with the violation.
pub fn get_developer_for_story(
    story: &Story,
    all_stories: &[Story],
    candidates: &[Developer],
    criteria: AllocationCriteria,
    new_start: chrono::NaiveDate,
    max_idle_days: u32,
    current_wave: u32,
    rng: &mut impl Rng,
) -> Option<Developer> {
    if candidates.is_empty() {
        return None;
    }

    let within_limit = |dev: &Developer| {
        idle_gap_within_wave(&dev.id, &story.id, new_start, current_wave, all_stories)
            .map_or(true, |gap| gap <= max_idle_days)
    };

    if criteria == AllocationCriteria::DependencyOwner {
        if let Some(owner) = get_dependency_owner(story, all_stories, candidates) {
            if within_limit(owner) {
                return Some(owner.clone());
            }
        }
    }

    let ranked = sort_by_load_random_tiebreak(candidates, all_stories, rng);
    ranked
        .iter()
        .find(|dev| within_limit(dev))
        .or_else(|| ranked.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dev(id: &str, name: &str) -> Developer {
        Developer::new(id, name)
    }

    fn assigned(id: &str, dev_id: &str) -> Story {
        Story::new(id, "core", format!("Story {id}")).developer(dev_id)
    }

    #[test]
    fn load_counting_ignores_unknown_developers() {
        let developers = vec![dev("d1", "Ana"), dev("d2", "Bruno")];
        let stories = vec![assigned("A", "d1"), assigned("B", "d1"), assigned("C", "ghost")];
        let load = count_stories_per_developer(&developers, &stories);
        assert_eq!(load["d1"], 2);
        assert_eq!(load["d2"], 0);
    }

    #[test]
    fn sort_by_load_and_name_orders_alphabetically_within_load() {
        let developers = vec![dev("d1", "Carlos"), dev("d2", "Ana"), dev("d3", "Bruno")];
        let stories = vec![assigned("A", "d3")];
        let sorted = sort_by_load_and_name(&developers, &stories);
        let names: Vec<&str> = sorted.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Carlos", "Bruno"]);
    }

    #[test]
    fn random_tiebreak_is_reproducible_under_a_seed() {
        let developers = vec![dev("d1", "Ana"), dev("d2", "Bruno"), dev("d3", "Carlos")];
        let stories: Vec<Story> = Vec::new();

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = sort_by_load_random_tiebreak(&developers, &stories, &mut rng_a);
        let b = sort_by_load_random_tiebreak(&developers, &stories, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn random_tiebreak_never_reorders_across_load_buckets() {
        let developers = vec![dev("d1", "Ana"), dev("d2", "Bruno"), dev("d3", "Carlos")];
        let stories = vec![assigned("A", "d1"), assigned("B", "d1"), assigned("C", "d2")];

        let mut rng = StdRng::seed_from_u64(7);
        let sorted = sort_by_load_random_tiebreak(&developers, &stories, &mut rng);
        // d3 (0 stories) < d2 (1) < d1 (2), whatever the seed
        assert_eq!(sorted[0].id, "d3");
        assert_eq!(sorted[1].id, "d2");
        assert_eq!(sorted[2].id, "d1");
    }

    #[test]
    fn dependency_owner_is_first_candidate_owning_any_dependency() {
        let all_stories = vec![assigned("X", "d2"), assigned("Y", "d3")];
        let story = Story::new("S", "core", "Story S")
            .depends_on("X")
            .depends_on("Y");

        // Candidate order decides between the two owners
        let candidates = vec![dev("d3", "Carlos"), dev("d2", "Bruno")];
        let owner = get_dependency_owner(&story, &all_stories, &candidates).unwrap();
        assert_eq!(owner.id, "d3");
    }

    #[test]
    fn no_dependency_owner_when_unowned() {
        let all_stories = vec![Story::new("X", "core", "Unassigned")];
        let story = Story::new("S", "core", "Story S").depends_on("X");
        let candidates = vec![dev("d1", "Ana")];
        assert!(get_dependency_owner(&story, &all_stories, &candidates).is_none());
    }

    #[test]
    fn idle_gap_measures_same_wave_only() {
        let mut previous = assigned("A", "d1").scheduled(date(2025, 1, 6), date(2025, 1, 8), 3);
        previous.wave = 1;
        let mut other_wave = assigned("B", "d1").scheduled(date(2025, 1, 13), date(2025, 1, 14), 2);
        other_wave.wave = 2;
        let stories = vec![previous, other_wave];

        // Gap from A (ends Wed 08) to Mon 20: 09,10,13,14,15,16,17 workdays = 7
        let gap = idle_gap_within_wave("d1", "S", date(2025, 1, 20), 1, &stories);
        assert_eq!(gap, Some(7));

        // No wave-3 history at all
        assert_eq!(idle_gap_within_wave("d1", "S", date(2025, 1, 20), 3, &stories), None);
    }

    #[test]
    fn dependency_owner_criterion_prefers_owner() {
        let mut dep = assigned("X", "d2").scheduled(date(2025, 1, 6), date(2025, 1, 8), 3);
        dep.wave = 1;
        let all_stories = vec![dep];
        let mut story = Story::new("S", "core", "Story S").depends_on("X");
        story.wave = 1;

        let candidates = vec![dev("d1", "Ana"), dev("d2", "Bruno")];
        let mut rng = StdRng::seed_from_u64(1);
        let selected = get_developer_for_story(
            &story,
            &all_stories,
            &candidates,
            AllocationCriteria::DependencyOwner,
            date(2025, 1, 9),
            3,
            1,
            &mut rng,
        )
        .unwrap();
        assert_eq!(selected.id, "d2");
    }

    #[test]
    fn dependency_owner_falls_back_when_idle_limit_would_break() {
        // d2 owns the dependency but has been idle since Jan 8; starting the
        // new story on Feb 3 would leave far more than 3 idle days.
        let mut dep = assigned("X", "d2").scheduled(date(2025, 1, 6), date(2025, 1, 8), 3);
        dep.wave = 1;
        let all_stories = vec![dep];
        let mut story = Story::new("S", "core", "Story S").depends_on("X");
        story.wave = 1;

        let candidates = vec![dev("d2", "Bruno"), dev("d1", "Ana")];
        let mut rng = StdRng::seed_from_u64(1);
        let selected = get_developer_for_story(
            &story,
            &all_stories,
            &candidates,
            AllocationCriteria::DependencyOwner,
            date(2025, 2, 3),
            3,
            1,
            &mut rng,
        )
        .unwrap();
        // Fallback: d1 carries no history in the wave, so no idleness at all
        assert_eq!(selected.id, "d1");
    }

    #[test]
    fn load_balancing_returns_least_loaded_when_nobody_passes_screen() {
        // Single candidate with a huge idle gap still gets returned
        let mut prior = assigned("X", "d1").scheduled(date(2025, 1, 6), date(2025, 1, 7), 2);
        prior.wave = 1;
        let all_stories = vec![prior];
        let mut story = Story::new("S", "core", "Story S");
        story.wave = 1;

        let candidates = vec![dev("d1", "Ana")];
        let mut rng = StdRng::seed_from_u64(1);
        let selected = get_developer_for_story(
            &story,
            &all_stories,
            &candidates,
            AllocationCriteria::LoadBalancing,
            date(2025, 3, 3),
            3,
            1,
            &mut rng,
        );
        assert_eq!(selected.unwrap().id, "d1");
    }

    #[test]
    fn empty_candidate_set_yields_none() {
        let story = Story::new("S", "core", "Story S");
        let mut rng = StdRng::seed_from_u64(1);
        assert!(get_developer_for_story(
            &story,
            &[],
            &[],
            AllocationCriteria::LoadBalancing,
            date(2025, 1, 6),
            3,
            1,
            &mut rng,
        )
        .is_none());
    }
}
