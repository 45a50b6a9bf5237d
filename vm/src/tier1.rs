use std::mem;

use object::EdgeState;

use crate::activation::Activation;
use crate::error::Unwind;
use crate::ops::Flow;
use crate::threaded::Node;
use crate::tiers::{Continuation, Exit, TierMode, Transfer};
use crate::Universe;

/// Run `act` from `start` on threaded code.
///
/// In hybrid mode every back-edge is counted at its site; once a site is
/// hot the activation leaves with `ContinueInTier2` at the loop head,
/// carrying the live operand stack.
pub fn run(u: &Universe, act: &mut Activation, start: usize) -> Result<Exit, Unwind> {
    let program = u.threaded_program(&act.method)?;
    let hybrid = u.config().mode == TierMode::Hybrid;
    let mut at = start;
    loop {
        let node = match program.as_deref().and_then(|program| program.node(at)) {
            Some(node) => node,
            None => Node::decode(&act.method, at)?,
        };
        match (node.handler)(u, act, &node)? {
            Flow::Next => at = node.next,
            Flow::Jump(target) => at = target,
            Flow::BackEdge(target) => {
                if hybrid && is_hot(u, act, at) {
                    log::debug!(
                        "{}@{at}: back-edge hot, leaving tier 1",
                        act.method.signature()
                    );
                    let stack = mem::take(&mut act.stack);
                    return Ok(Exit::Transfer(Transfer::ContinueInTier2(Continuation {
                        offset: target,
                        stack,
                    })));
                }
                at = target;
            }
            Flow::Retry => {
                if let Some(program) = &program {
                    program.refresh(&act.method, at)?;
                }
            }
            Flow::Return(value) => return Ok(Exit::Return(value)),
        }
    }
}

fn is_hot(u: &Universe, act: &Activation, at: usize) -> bool {
    let edge = act.method.site(at).back_edge();
    edge.on_back_edge(u.config().hybrid_threshold()) == EdgeState::Hot
}
