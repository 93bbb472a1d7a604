//! End-to-end soundness verdicts on small hand-built nets.

mod common;

use common::*;
use dpn_engine::explorer::{AbortReason, CoveringPolicy};
use dpn_engine::pipeline::{verify_net, verify_source, PipelineOptions};
use dpn_engine::soundness::{SoundnessKind, StateCategory};

#[test]
fn single_step_is_sound_under_every_policy() {
    for policy in [
        CoveringPolicy::Exact,
        CoveringPolicy::OmegaAbstraction,
        CoveringPolicy::Tree,
    ] {
        let outcome = verify_net(&single_step(), &options(policy, SoundnessKind::Classical))
            .unwrap();
        assert!(outcome.report.sound, "{policy}: {:?}", outcome.report.violations);
        assert_eq!(outcome.state_space.states, 2, "{policy}");
        assert_eq!(outcome.state_space.arcs, 1, "{policy}");
        assert!(outcome.state_space.is_full_graph);
        assert_eq!(outcome.report.count(StateCategory::Initial), 1);
        assert_eq!(outcome.report.count(StateCategory::CleanFinal), 1);
    }
}

#[test]
fn leftover_tokens_make_an_unclean_final_state() {
    let outcome = verify_net(&leftover_token(), &PipelineOptions::default()).unwrap();
    assert!(!outcome.report.sound);
    assert!(outcome.report.count(StateCategory::UncleanFinal) >= 1);
    let unclean = outcome
        .states
        .iter()
        .find(|s| s.category == StateCategory::UncleanFinal)
        .unwrap();
    assert_eq!(unclean.residual, vec!["p"]);
    assert!(outcome.to_string().contains("leaves tokens in p"));
}

#[test]
fn contradictory_guards_deadlock() {
    let net = guarded_chain("x_w > 5", "x_r < 0");
    for kind in [SoundnessKind::Classical, SoundnessKind::Lazy] {
        let outcome = verify_net(&net, &options(CoveringPolicy::Exact, kind)).unwrap();
        assert!(!outcome.report.sound);
        assert_eq!(outcome.report.count(StateCategory::Deadlock), 1);
        assert_eq!(outcome.state_space.states, 2);
    }
}

#[test]
fn relaxed_lazy_names_the_unfeasible_transition() {
    let net = guarded_chain("x_w > 5", "x_r < 0");
    let outcome =
        verify_net(&net, &options(CoveringPolicy::Exact, SoundnessKind::RelaxedLazy)).unwrap();
    assert!(!outcome.report.sound);
    // t1 only leads to the deadlock after it.
    assert_eq!(outcome.report.unfeasible_transitions, vec!["t1", "t2"]);
    assert_eq!(outcome.report.dead_transitions, vec!["t2"]);
}

#[test]
fn pump_is_unbounded() {
    let net = pump();

    let exact = verify_net(&net, &PipelineOptions::default()).unwrap();
    assert!(!exact.state_space.is_full_graph);
    assert!(matches!(
        exact.state_space.abort_reason,
        Some(AbortReason::Unbounded { .. })
    ));
    assert!(!exact.report.sound);

    let omega = verify_net(
        &net,
        &options(CoveringPolicy::OmegaAbstraction, SoundnessKind::Classical),
    )
    .unwrap();
    assert!(omega.state_space.is_full_graph);
    assert_eq!(omega.state_space.omega_places, vec!["q"]);
    assert!(!omega.report.bounded);
    assert!(!omega.report.sound);
}

#[test]
fn loan_process_is_sound() {
    for policy in [
        CoveringPolicy::Exact,
        CoveringPolicy::OmegaAbstraction,
        CoveringPolicy::Tree,
    ] {
        let outcome = verify_net(&loan(), &options(policy, SoundnessKind::Classical)).unwrap();
        assert!(outcome.report.sound, "{policy}: {:?}", outcome.report.violations);
        assert!(outcome.state_space.silent_arcs > 0, "{policy}");
    }
}

#[test]
fn a_gap_between_guards_deadlocks() {
    let mut net = loan();
    net.transitions[1].guard = guard(&net, "amount_r < 100 && ok_w == true");
    let outcome = verify_net(&net, &PipelineOptions::default()).unwrap();
    assert!(!outcome.report.sound);
    assert!(outcome.report.count(StateCategory::Deadlock) >= 1);
    let deadlock = outcome
        .states
        .iter()
        .find(|s| s.category == StateCategory::Deadlock)
        .unwrap();
    assert!(deadlock.formula.contains("amount_r"), "{}", deadlock.formula);
}

#[test]
fn heuristic_composer_reaches_the_same_verdicts() {
    use dpn_engine::composer::ComposerChoice;

    for (net, sound) in [
        (single_step(), true),
        (leftover_token(), false),
        (guarded_chain("x_w > 5", "x_r < 0"), false),
        (loan(), true),
    ] {
        let options = PipelineOptions {
            composer: ComposerChoice::Heuristic,
            ..PipelineOptions::default()
        };
        let outcome = verify_net(&net, &options).unwrap();
        assert_eq!(outcome.report.sound, sound, "{}", net.name);
    }
}

#[test]
fn json_reports_carry_categories() {
    let json = r#"{
        "name": "chain",
        "variables": [{ "name": "x", "domain": "int", "initial": 0 }],
        "places": [{ "id": "i", "tokens": 1 }, { "id": "p" }, { "id": "o", "final": true }],
        "transitions": [
            { "id": "t1", "guard": "x_w > 5" },
            { "id": "t2", "guard": "x_r < 0" }
        ],
        "arcs": [
            { "from": "i", "to": "t1" }, { "from": "t1", "to": "p" },
            { "from": "p", "to": "t2" }, { "from": "t2", "to": "o" }
        ]
    }"#;
    let outcome = verify_source(json, &PipelineOptions::default()).unwrap();
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["report"]["sound"], false);
    assert_eq!(value["report"]["kind"], "classical");
    assert_eq!(value["states"][1]["category"], "deadlock");
    assert_eq!(value["state_space"]["policy"], "exact");
}
