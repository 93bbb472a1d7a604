//! Formula-level queries against the Z3 backend.

use std::collections::BTreeMap;

use dpn_ir::formula::{Domain, Formula, VarRef};
use dpn_ir::formula_text::{parse, serialize};
use dpn_ir::proptest_generators::arb_int_formula;
use dpn_smt::constraints::{ConstraintSolver, Objective, Optimum};
use num::rational::Rational64;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, RngAlgorithm};

fn domains() -> BTreeMap<String, Domain> {
    [
        ("x", Domain::Int),
        ("y", Domain::Int),
        ("z", Domain::Int),
        ("amount", Domain::Real),
        ("ok", Domain::Bool),
        ("status", Domain::Str),
    ]
    .into_iter()
    .map(|(n, d)| (n.to_string(), d))
    .collect()
}

fn f(text: &str) -> Formula {
    parse(text, &domains()).unwrap()
}

fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 24,
        rng_algorithm: RngAlgorithm::ChaCha,
        failure_persistence: Some(Box::new(FileFailurePersistence::WithSource(
            "proptest-regressions",
        ))),
        ..ProptestConfig::default()
    }
}

#[test]
fn string_constants_keep_their_identity_across_queries() {
    let mut solver = ConstraintSolver::z3(0);
    assert!(solver.satisfiable(&f("status_r == \"open\"")).unwrap());
    assert!(!solver
        .satisfiable(&f("status_r == \"open\" && status_r == \"closed\""))
        .unwrap());
    assert!(solver
        .equivalent(
            &f("status_r == \"closed\""),
            &f("status_r != \"open\" && status_r == \"closed\"")
        )
        .unwrap());
}

#[test]
fn read_and_write_instances_are_independent() {
    let mut solver = ConstraintSolver::z3(0);
    assert!(solver.satisfiable(&f("x_r > 5 && x_w < 0")).unwrap());
    assert!(!solver.satisfiable(&f("x_w > 5 && x_w < 0")).unwrap());
}

#[test]
fn mixed_integer_and_real_comparisons() {
    let mut solver = ConstraintSolver::z3(0);
    assert!(solver.satisfiable(&f("amount_r > 0.5 && amount_r < 1")).unwrap());
    assert!(!solver.satisfiable(&f("x_r > 0 && x_r < 1")).unwrap());
    assert!(solver.implies(&f("amount_r >= 2"), &f("amount_r > 1.5")).unwrap());
}

#[test]
fn boolean_variables() {
    let mut solver = ConstraintSolver::z3(0);
    assert!(!solver.satisfiable(&f("ok_r == true && ok_r == false")).unwrap());
    assert!(solver.valid(&f("ok_r == true || ok_r != true")).unwrap());
}

#[test]
fn projection_of_write_constraints() {
    let mut solver = ConstraintSolver::z3(0);
    let xw = VarRef::write("x", Domain::Int);
    let projected = solver
        .eliminate_exists(&[xw], &f("x_w > y_r && x_w < 4 && y_r >= 0"))
        .unwrap();
    let expected = f("y_r >= 0 && y_r <= 2");
    assert!(solver.equivalent(&projected, &expected).unwrap());
}

#[test]
fn optimize_relative_to_other_variables() {
    let mut solver = ConstraintSolver::z3(0);
    let y = VarRef::read("y", Domain::Int);
    assert_eq!(
        solver
            .optimize(Objective::Maximize, &y, &f("x_r > y_r && x_r <= 7"))
            .unwrap(),
        Optimum::Bounded {
            value: Rational64::from_integer(6),
            attained: true
        }
    );
    let simplified = solver.simplify(&f("x_r > 7 || x_r > 3 && x_r < 9")).unwrap();
    assert_eq!(serialize(&simplified), "x_r > 7 || x_r > 3 && x_r < 9");
    let redundant = solver.simplify(&f("x_r > 3 && x_r > 1 || x_r > 7")).unwrap();
    assert_eq!(serialize(&redundant), "x_r > 3");
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn simplify_preserves_meaning(formula in arb_int_formula()) {
        let mut solver = ConstraintSolver::z3(0);
        let simplified = solver.simplify(&formula).unwrap();
        prop_assert!(
            solver.equivalent(&formula, &simplified).unwrap(),
            "{} simplified to {}",
            formula,
            simplified
        );
    }

    #[test]
    fn prune_keeps_only_satisfiable_disjuncts(formula in arb_int_formula()) {
        let mut solver = ConstraintSolver::z3(0);
        let pruned = solver.prune(&formula).unwrap();
        prop_assert!(solver.equivalent(&formula, &pruned).unwrap());
        if !pruned.is_false() {
            for conj in pruned.disjuncts() {
                prop_assert!(solver.satisfiable(&Formula::conjunction(conj)).unwrap());
            }
        }
    }
}
