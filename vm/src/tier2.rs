use std::mem;

use bytecode::Instruction;

use crate::activation::Activation;
use crate::dispatch;
use crate::error::{RuntimeError, Unwind};
use crate::ops::{self, Flow};
use crate::tiers::{Continuation, Exit, TierMode, Transfer};
use crate::Universe;

/// Sequential decode-and-execute loop, entered at `start` with whatever
/// is already on `act.stack`.
///
/// In hybrid mode a send about to meet a receiver with a stale shape
/// hands the activation back to tier 1 at that send and resets the
/// method's back-edge counters.
pub fn run(u: &Universe, act: &mut Activation, start: usize) -> Result<Exit, Unwind> {
    let hybrid = u.config().mode == TierMode::Hybrid;
    let mut at = start;
    loop {
        let (instruction, len) = act
            .method
            .instruction_at(at)
            .map_err(|err| RuntimeError::bad_bytecode(&act.method, err))?;
        if hybrid {
            if let Instruction::Send { lit, arity } = instruction {
                if dispatch::send_receiver_is_stale(act, lit, arity) {
                    log::debug!(
                        "{}@{at}: stale receiver shape, back to tier 1",
                        act.method.signature()
                    );
                    act.method.reset_back_edges();
                    let stack = mem::take(&mut act.stack);
                    return Ok(Exit::Transfer(Transfer::ContinueInTier1(Continuation {
                        offset: at,
                        stack,
                    })));
                }
            }
        }
        match ops::execute(u, act, at, instruction)? {
            Flow::Next => at += len,
            Flow::Jump(target) | Flow::BackEdge(target) => at = target,
            Flow::Retry => {}
            Flow::Return(value) => return Ok(Exit::Return(value)),
        }
    }
}
