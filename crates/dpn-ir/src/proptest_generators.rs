//! Proptest strategies for markings, guard formulas and small nets.

use proptest::prelude::*;

use crate::formula::{Atom, CmpOp, Domain, Formula, Value, VarRef};
use crate::marking::{Marking, TokenCount};
use crate::net::{DataPetriNet, Node};

pub fn arb_token_count() -> impl Strategy<Value = TokenCount> {
    prop_oneof![
        4 => (0u32..4).prop_map(TokenCount::Finite),
        1 => Just(TokenCount::Omega),
    ]
}

/// Markings over a fixed number of places.
pub fn arb_marking(places: usize) -> impl Strategy<Value = Marking> {
    proptest::collection::vec(arb_token_count(), places..=places).prop_map(Marking::new)
}

pub fn arb_cmp_op() -> impl Strategy<Value = CmpOp> {
    prop_oneof![
        Just(CmpOp::Eq),
        Just(CmpOp::Ne),
        Just(CmpOp::Lt),
        Just(CmpOp::Le),
        Just(CmpOp::Gt),
        Just(CmpOp::Ge),
    ]
}

/// Order comparisons only; no equalities or disequalities.
pub fn arb_order_op() -> impl Strategy<Value = CmpOp> {
    prop_oneof![
        Just(CmpOp::Lt),
        Just(CmpOp::Le),
        Just(CmpOp::Gt),
        Just(CmpOp::Ge),
    ]
}

fn int_var(name: &'static str) -> VarRef {
    VarRef::read(name, Domain::Int)
}

/// Atoms over the read-tagged integer variables `x`, `y`, `z`.
pub fn arb_int_atom() -> impl Strategy<Value = Atom> {
    let var = prop_oneof![Just("x"), Just("y"), Just("z")];
    prop_oneof![
        (var.clone(), arb_cmp_op(), -5i64..=5)
            .prop_map(|(v, op, c)| Atom::with_const(int_var(v), op, Value::Int(c))),
        (var.clone(), arb_cmp_op(), var, -2i64..=2).prop_map(|(a, op, b, k)| {
            Atom::with_offset(int_var(a), op, int_var(b), k.into())
        }),
    ]
}

/// Small and/or trees over [`arb_int_atom`].
pub fn arb_int_formula() -> impl Strategy<Value = Formula> {
    let leaf = prop_oneof![
        8 => arb_int_atom().prop_map(Formula::Atom),
        1 => Just(Formula::True),
        1 => Just(Formula::False),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 1..=3).prop_map(Formula::and),
            proptest::collection::vec(inner, 1..=3).prop_map(Formula::or),
        ]
    })
}

/// A path formula and a guard that overwrites exactly one variable and
/// relates the overwritten variable's old value to one other variable
/// through at most one atom.
#[derive(Debug, Clone)]
pub struct ComposeCase {
    pub source: Formula,
    pub guard: Formula,
}

/// Comparisons valid on `domain`: all of them on numbers, `==`/`!=` on
/// booleans and strings.
pub fn arb_domain_op(domain: Domain) -> BoxedStrategy<CmpOp> {
    if domain.is_numeric() {
        arb_cmp_op().boxed()
    } else {
        prop_oneof![Just(CmpOp::Eq), Just(CmpOp::Ne)].boxed()
    }
}

pub fn arb_compose_case(domain: Domain) -> impl Strategy<Value = ComposeCase> {
    let bound = move |name: &'static str, tag: fn(&'static str, Domain) -> VarRef| {
        (arb_domain_op(domain), -6i64..=6)
            .prop_map(move |(op, c)| Atom::with_const(tag(name, domain), op, constant(domain, c)))
    };
    let source = proptest::collection::vec(
        proptest::collection::vec(
            prop_oneof![bound("x", VarRef::read), bound("y", VarRef::read)],
            1..=3,
        ),
        1..=2,
    );
    let write = bound("x", VarRef::write);
    let relation = proptest::option::of((arb_domain_op(domain), any::<bool>())).prop_map(
        move |r| {
            r.map(|(op, flipped)| {
                let x = VarRef::read("x", domain);
                let y = VarRef::read("y", domain);
                if flipped {
                    Atom::with_var(y, op, x)
                } else {
                    Atom::with_var(x, op, y)
                }
            })
        },
    );
    let old_bound = proptest::option::of(bound("x", VarRef::read));
    (source, write, relation, old_bound).prop_map(|(source, write, relation, old_bound)| {
        let mut guard = vec![write];
        guard.extend(relation);
        guard.extend(old_bound);
        ComposeCase {
            source: Formula::from_disjuncts(source),
            guard: Formula::conjunction(guard),
        }
    })
}

fn constant(domain: Domain, c: i64) -> Value {
    match domain {
        Domain::Real => Value::Real(num::rational::Rational64::new(c, 2)),
        Domain::Bool => Value::Bool(c % 2 == 0),
        Domain::Str => Value::Str(format!("s{}", c.rem_euclid(3))),
        Domain::Int => Value::Int(c),
    }
}

/// A small net with one integer variable `x`: places `p0..pn` where `p0`
/// holds the initial token and the last place is final; every transition
/// moves one token between two places and may carry a guard on `x`.
pub fn arb_small_net() -> impl Strategy<Value = DataPetriNet> {
    (2..=4usize, 1..=4usize)
        .prop_flat_map(|(places, transitions)| {
            let guard = proptest::option::of((any::<bool>(), arb_order_op(), -2i64..=2));
            (
                Just(places),
                proptest::collection::vec((0..places, 0..places, guard), transitions..=transitions),
            )
        })
        .prop_map(|(places, transitions)| {
            let mut net = DataPetriNet::new("arb");
            let _ = net.add_variable("x", Domain::Int, Value::Int(0));
            for p in 0..places {
                net.add_place(format!("p{p}"), u32::from(p == 0), p + 1 == places);
            }
            for (i, (from, to, guard)) in transitions.into_iter().enumerate() {
                let guard = match guard {
                    None => Formula::True,
                    Some((write, op, c)) => {
                        let var = if write {
                            VarRef::write("x", Domain::Int)
                        } else {
                            VarRef::read("x", Domain::Int)
                        };
                        Formula::atom(Atom::with_const(var, op, Value::Int(c)))
                    }
                };
                let t = net.add_transition(format!("t{i}"), guard);
                let _ = net.add_arc(Node::Place(from), Node::Transition(t), 1);
                let _ = net.add_arc(Node::Transition(t), Node::Place(to), 1);
            }
            net
        })
}
