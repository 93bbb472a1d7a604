#![allow(dead_code)]

use std::collections::BTreeMap;

use dpn_ir::formula::{Domain, Formula, Value};
use dpn_ir::formula_text::parse;
use dpn_ir::net::{DataPetriNet, Node, PlaceId, TransitionId};
use dpn_engine::explorer::CoveringPolicy;
use dpn_engine::pipeline::PipelineOptions;
use dpn_engine::soundness::SoundnessKind;

pub fn options(policy: CoveringPolicy, soundness: SoundnessKind) -> PipelineOptions {
    PipelineOptions {
        policy,
        soundness,
        max_states: 500,
        ..PipelineOptions::default()
    }
}

pub fn guard(net: &DataPetriNet, text: &str) -> Formula {
    let domains: BTreeMap<String, Domain> = net.variable_domains();
    parse(text, &domains).unwrap_or_else(|e| panic!("bad guard {text:?}: {e}"))
}

/// Connects `t` to its input and output places with weight-1 arcs.
pub fn wire(net: &mut DataPetriNet, t: TransitionId, inputs: &[PlaceId], outputs: &[PlaceId]) {
    for &p in inputs {
        net.add_arc(Node::Place(p), Node::Transition(t), 1).unwrap();
    }
    for &p in outputs {
        net.add_arc(Node::Transition(t), Node::Place(p), 1).unwrap();
    }
}

/// `i -> t(true) -> o`
pub fn single_step() -> DataPetriNet {
    let mut net = DataPetriNet::new("single-step");
    let i = net.add_place("i", 1, false);
    let o = net.add_place("o", 0, true);
    let t = net.add_transition("t", Formula::True);
    wire(&mut net, t, &[i], &[o]);
    net
}

/// `i -> t -> o + p`: the final place gets marked while `p` keeps a token.
pub fn leftover_token() -> DataPetriNet {
    let mut net = DataPetriNet::new("leftover");
    let i = net.add_place("i", 1, false);
    let p = net.add_place("p", 0, false);
    let o = net.add_place("o", 0, true);
    let t = net.add_transition("t", Formula::True);
    wire(&mut net, t, &[i], &[o, p]);
    net
}

/// `i -[first]-> p -[second]-> o` over one integer variable `x`, initially 0.
pub fn guarded_chain(first: &str, second: &str) -> DataPetriNet {
    let mut net = DataPetriNet::new("guarded-chain");
    net.add_variable("x", Domain::Int, Value::Int(0)).unwrap();
    let i = net.add_place("i", 1, false);
    let p = net.add_place("p", 0, false);
    let o = net.add_place("o", 0, true);
    let t1 = net.add_transition("t1", guard(&net, first));
    let t2 = net.add_transition("t2", guard(&net, second));
    wire(&mut net, t1, &[i], &[p]);
    wire(&mut net, t2, &[p], &[o]);
    net
}

/// `p -> t -> p + q`, unguarded: `q` grows without bound.
pub fn pump() -> DataPetriNet {
    let mut net = DataPetriNet::new("pump");
    let p = net.add_place("p", 1, false);
    let q = net.add_place("q", 0, false);
    let o = net.add_place("o", 0, true);
    let t = net.add_transition("t", Formula::True);
    wire(&mut net, t, &[p], &[p, q]);
    let done = net.add_transition("done", Formula::True);
    wire(&mut net, done, &[p], &[o]);
    net
}

/// A loan request: `amount` is chosen, then either approved when small or
/// reviewed when large; review may reject anything.
pub fn loan() -> DataPetriNet {
    let mut net = DataPetriNet::new("loan");
    net.add_variable("amount", Domain::Int, Value::Int(0)).unwrap();
    net.add_variable("ok", Domain::Bool, Value::Bool(false)).unwrap();
    let start = net.add_place("start", 1, false);
    let chosen = net.add_place("chosen", 0, false);
    let done = net.add_place("done", 0, true);
    let request = net.add_transition("request", guard(&net, "amount_w > 0"));
    let approve = net.add_transition("approve", guard(&net, "amount_r <= 100 && ok_w == true"));
    let review = net.add_transition("review", guard(&net, "amount_r > 100 && ok_w != ok_r"));
    wire(&mut net, request, &[start], &[chosen]);
    wire(&mut net, approve, &[chosen], &[done]);
    wire(&mut net, review, &[chosen], &[done]);
    net
}
