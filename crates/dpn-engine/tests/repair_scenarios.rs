//! Guard strengthening on nets with unreachable final markings.

mod common;

use common::*;
use dpn_engine::pipeline::{repair_net, verify_net, PipelineOptions};
use dpn_engine::repair::{RepairFailure, RepairVerdict};
use dpn_ir::loader::{load_net, save_net};
use dpn_smt::constraints::ConstraintSolver;

#[test]
fn chain_is_repaired_by_bounding_the_write() {
    let net = guarded_chain("x_w >= 0", "x_r < 3");
    assert!(!verify_net(&net, &PipelineOptions::default()).unwrap().report.sound);

    let report = repair_net(&net, &PipelineOptions::default(), 16).unwrap();
    assert_eq!(report.verdict, RepairVerdict::Repaired);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].before, "x_w >= 0");

    let mut solver = ConstraintSolver::z3(0);
    let expected = guard(&net, "x_w >= 0 && x_w < 3");
    assert!(solver
        .equivalent(&report.net.transitions[0].guard, &expected)
        .unwrap());
    assert!(verify_net(&report.net, &PipelineOptions::default()).unwrap().report.sound);
}

#[test]
fn repair_is_idempotent_on_sound_nets() {
    let net = guarded_chain("x_w >= 0", "x_r < 3");
    let first = repair_net(&net, &PipelineOptions::default(), 16).unwrap();
    assert!(first.verdict.is_success());

    let second = repair_net(&first.net, &PipelineOptions::default(), 16).unwrap();
    assert_eq!(second.verdict, RepairVerdict::AlreadySound);
    assert_eq!(second.net, first.net);
    assert!(second.changes.is_empty());
}

#[test]
fn repaired_nets_survive_a_json_round_trip() {
    let net = guarded_chain("x_w >= 0", "x_r < 3");
    let report = repair_net(&net, &PipelineOptions::default(), 16).unwrap();
    let reloaded = load_net(&save_net(&report.net).unwrap()).unwrap();
    assert!(verify_net(&reloaded, &PipelineOptions::default()).unwrap().report.sound);
}

#[test]
fn gap_between_guards_is_closed_at_the_request() {
    let mut net = loan();
    net.transitions[1].guard = guard(&net, "amount_r < 100 && ok_w == true");

    let report = repair_net(&net, &PipelineOptions::default(), 16).unwrap();
    assert_eq!(report.verdict, RepairVerdict::Repaired, "{report}");
    assert!(report.changes.iter().all(|c| c.transition == "request"));
    assert!(verify_net(&report.net, &PipelineOptions::default()).unwrap().report.sound);
}

#[test]
fn nets_without_any_way_out_are_not_repairable() {
    let report = repair_net(
        &guarded_chain("x_w > 5", "x_r < 0"),
        &PipelineOptions::default(),
        16,
    )
    .unwrap();
    assert_eq!(
        report.verdict,
        RepairVerdict::Failure {
            reason: RepairFailure::AllRed
        }
    );
    assert!(report.to_string().starts_with("RESULT: REPAIR FAILED"));
}

#[test]
fn reports_serialize_without_the_net() {
    let report = repair_net(&single_step(), &PipelineOptions::default(), 16).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["verdict"]["verdict"], "already_sound");
    assert!(value.get("net").is_none());
}
