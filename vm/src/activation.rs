use std::rc::Rc;

use object::{Method, Value};

use crate::error::Unwind;
use crate::frame::Frame;
use crate::stack::Stack;
use crate::tiers::{Exit, TierMode, Transfer};
use crate::{Universe, tier1, tier2};

/// A running method or block: its code, locals and operand stack.
#[derive(Debug)]
pub struct Activation {
    pub method: Rc<Method>,
    pub frame: Frame,
    pub stack: Stack,
}

impl Activation {
    pub fn new(method: Rc<Method>, frame: Frame) -> Self {
        let stack = Stack::new(method.max_stack_depth());
        Self {
            method,
            frame,
            stack,
        }
    }
}

/// Run `method` in `frame` to completion.
///
/// Catches non-local returns aimed at this activation's context when the
/// method is compiled to do so, and marks the context off-stack however
/// the activation ends.
pub fn run(u: &Universe, method: &Rc<Method>, frame: Frame) -> Result<Value, Unwind> {
    let _depth = u.enter()?;
    method.record_invocation();
    let context = frame.context().cloned();
    let mut act = Activation::new(method.clone(), frame);
    let outcome = drive(u, &mut act);
    act.frame.finish();
    match outcome {
        Err(Unwind::NonLocalReturn { value, target })
            if method.catches_non_local_return()
                && context.as_ref().is_some_and(|own| Rc::ptr_eq(own, &target)) =>
        {
            Ok(value)
        }
        other => other,
    }
}

/// Move an activation between tiers until one of them returns a value.
fn drive(u: &Universe, act: &mut Activation) -> Result<Value, Unwind> {
    let mut in_tier2 = u.config().mode == TierMode::Tracing;
    let mut offset = 0;
    loop {
        let exit = if in_tier2 {
            tier2::run(u, act, offset)?
        } else {
            tier1::run(u, act, offset)?
        };
        match exit {
            Exit::Return(value) => return Ok(value),
            Exit::Transfer(Transfer::ContinueInTier2(continuation)) => {
                log::debug!(
                    "{}: continuing in tier 2 at {}",
                    act.method.signature(),
                    continuation.offset
                );
                u.count_transfer(true);
                offset = continuation.offset;
                act.stack = continuation.stack;
                in_tier2 = true;
            }
            Exit::Transfer(Transfer::ContinueInTier1(continuation)) => {
                log::debug!(
                    "{}: deoptimized to tier 1 at {}",
                    act.method.signature(),
                    continuation.offset
                );
                u.count_transfer(false);
                offset = continuation.offset;
                act.stack = continuation.stack;
                in_tier2 = false;
            }
        }
    }
}
