use super::*;

fn controller(step: StepSize) -> StaircaseController {
    StaircaseController::new(StaircaseConfig::default(), step)
}

/// Run one frequency with a fixed answer, returning the levels presented
fn run_frequency(ctl: &mut StaircaseController, frequency: Frequency, heard: bool) -> Vec<u8> {
    let mut levels = vec![ctl.begin(frequency).db()];
    loop {
        ctl.mark_presented().unwrap();
        match ctl.respond(heard).unwrap() {
            StaircaseDecision::Present { level, .. } => levels.push(level.db()),
            StaircaseDecision::FrequencyComplete { .. } => return levels,
        }
    }
}

#[test]
fn test_all_heard_step_two_descends() {
    let mut ctl = controller(StepSize::Two);
    let levels = run_frequency(&mut ctl, Frequency::Hz500, true);
    assert_eq!(levels, vec![50, 48, 46, 44, 42, 40, 38]);
    assert_eq!(ctl.phase(), StaircasePhase::FrequencyComplete);
    assert!(ctl.state().is_none());
}

#[test]
fn test_none_heard_step_five_ascends() {
    let mut ctl = controller(StepSize::Five);
    let levels = run_frequency(&mut ctl, Frequency::Hz500, false);
    assert_eq!(levels, vec![50, 55, 60, 65, 70, 75, 80]);
}

#[test]
fn test_levels_clamp_at_bounds() {
    let config = StaircaseConfig {
        trials_per_frequency: 40,
        ..StaircaseConfig::default()
    };

    let mut ctl = StaircaseController::new(config, StepSize::Five);
    let up = run_frequency(&mut ctl, Frequency::Hz1000, false);
    assert_eq!(up.iter().copied().max(), Some(120));
    assert_eq!(*up.last().unwrap(), 120);

    let down = run_frequency(&mut ctl, Frequency::Hz2000, true);
    assert_eq!(down.iter().copied().min(), Some(0));
    assert_eq!(*down.last().unwrap(), 0);
}

#[test]
fn test_each_frequency_resets_to_start_level() {
    let mut ctl = controller(StepSize::Five);
    run_frequency(&mut ctl, Frequency::Hz500, true);
    assert_eq!(ctl.begin(Frequency::Hz1000), Level::new(50));
    assert_eq!(ctl.state().map(|s| s.trial_count), Some(0));
}

#[test]
fn test_trial_cap_is_configurable() {
    let config = StaircaseConfig {
        trials_per_frequency: 3,
        ..StaircaseConfig::default()
    };
    let mut ctl = StaircaseController::new(config, StepSize::Five);
    let levels = run_frequency(&mut ctl, Frequency::Hz4000, true);
    assert_eq!(levels, vec![50, 45, 40]);
}

#[test]
fn test_step_change_applies_to_next_transition() {
    let mut ctl = controller(StepSize::Five);
    ctl.begin(Frequency::Hz500);
    ctl.mark_presented().unwrap();
    assert_eq!(
        ctl.respond(true).unwrap(),
        StaircaseDecision::Present {
            frequency: Frequency::Hz500,
            level: Level::new(45)
        }
    );

    ctl.set_step_size(StepSize::One);
    ctl.mark_presented().unwrap();
    assert_eq!(
        ctl.respond(true).unwrap(),
        StaircaseDecision::Present {
            frequency: Frequency::Hz500,
            level: Level::new(44)
        }
    );
}

#[test]
fn test_respond_without_presentation_is_rejected() {
    let mut ctl = controller(StepSize::Five);
    let err = ctl.respond(true).unwrap_err();
    assert!(matches!(err, SessionError::InvalidStateTransition { .. }));

    ctl.begin(Frequency::Hz500);
    assert!(ctl.respond(true).is_err());
    assert_eq!(ctl.phase(), StaircasePhase::Presenting);
    assert_eq!(ctl.state().map(|s| s.trial_count), Some(0));

    ctl.mark_presented().unwrap();
    assert!(ctl.mark_presented().is_err());
}

#[test]
fn test_no_response_accepted_after_completion() {
    let mut ctl = controller(StepSize::Two);
    run_frequency(&mut ctl, Frequency::Hz8000, true);
    assert!(ctl.respond(false).is_err());
    assert!(ctl.mark_presented().is_err());
}
