//! Wave dependency rules.
//!
//! A story may only depend on stories in the same or an earlier wave:
//! earlier waves ship first, so depending on a later wave would mean
//! depending on something that does not exist yet.

use waveplan_core::{PlanError, Story};

/// Validate a single dependency edge `story -> dependency`.
pub fn validate(story: &Story, dependency: &Story) -> Result<(), PlanError> {
    if dependency.wave > story.wave {
        return Err(PlanError::InvalidWaveDependency {
            story_id: story.id.clone(),
            story_wave: story.wave,
            dependency_id: dependency.id.clone(),
            dependency_wave: dependency.wave,
        });
    }
    Ok(())
}

/// Validate moving `story` to `new_wave` against both edge directions.
///
/// Every dependency must sit in a wave `<= new_wave`; every dependent must
/// sit in a wave `>= new_wave`. The first offender is reported.
pub fn validate_wave_change(
    story: &Story,
    new_wave: u32,
    dependencies: &[&Story],
    dependents: &[&Story],
) -> Result<(), PlanError> {
    for dependency in dependencies {
        if dependency.wave > new_wave {
            return Err(PlanError::InvalidWaveDependency {
                story_id: story.id.clone(),
                story_wave: new_wave,
                dependency_id: dependency.id.clone(),
                dependency_wave: dependency.wave,
            });
        }
    }

    for dependent in dependents {
        if new_wave > dependent.wave {
            return Err(PlanError::InvalidWaveDependency {
                story_id: dependent.id.clone(),
                story_wave: dependent.wave,
                dependency_id: story.id.clone(),
                dependency_wave: new_wave,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story_in_wave(id: &str, wave: u32) -> Story {
        let mut s = Story::new(id, "core", format!("Story {id}"));
        s.wave = wave;
        s
    }

    #[test]
    fn earlier_or_equal_wave_dependency_is_fine() {
        let story = story_in_wave("S", 2);
        assert!(validate(&story, &story_in_wave("D1", 1)).is_ok());
        assert!(validate(&story, &story_in_wave("D2", 2)).is_ok());
        assert!(validate(&story, &story_in_wave("D0", 0)).is_ok());
    }

    #[test]
    fn later_wave_dependency_is_rejected() {
        let story = story_in_wave("S", 1);
        let err = validate(&story, &story_in_wave("D", 3)).unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidWaveDependency {
                story_id: "S".into(),
                story_wave: 1,
                dependency_id: "D".into(),
                dependency_wave: 3,
            }
        );
    }

    #[test]
    fn wave_change_checks_dependencies() {
        let story = story_in_wave("S", 3);
        let dep = story_in_wave("D", 2);
        // Moving below the dependency's wave breaks the edge
        assert!(validate_wave_change(&story, 1, &[&dep], &[]).is_err());
        assert!(validate_wave_change(&story, 2, &[&dep], &[]).is_ok());
    }

    #[test]
    fn wave_change_checks_dependents() {
        let story = story_in_wave("S", 2);
        let dependent = story_in_wave("T", 3);
        // Moving past the dependent's wave breaks the reverse edge
        let err = validate_wave_change(&story, 4, &[], &[&dependent]).unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidWaveDependency {
                story_id: "T".into(),
                story_wave: 3,
                dependency_id: "S".into(),
                dependency_wave: 4,
            }
        );
        assert!(validate_wave_change(&story, 3, &[], &[&dependent]).is_ok());
    }

    #[test]
    fn first_offending_dependency_wins() {
        let story = story_in_wave("S", 5);
        let ok_dep = story_in_wave("D1", 1);
        let bad_dep = story_in_wave("D2", 4);
        let worse_dep = story_in_wave("D3", 6);
        let err =
            validate_wave_change(&story, 2, &[&ok_dep, &bad_dep, &worse_dep], &[]).unwrap_err();
        let PlanError::InvalidWaveDependency { dependency_id, .. } = err else {
            panic!("expected InvalidWaveDependency");
        };
        assert_eq!(dependency_id, "D2");
    }
}
