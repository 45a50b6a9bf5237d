//! Semantics of every instruction, shared by both execution tiers.

use std::rc::Rc;

use bytecode::{Arity, DecodeError, Instruction};
use object::{Block, Instance, Value, VarKind};

use crate::activation::Activation;
use crate::dispatch;
use crate::error::{RuntimeError, Unwind};
use crate::primitives::integer::{compare, increment};
use crate::Universe;

/// What the loop does after an instruction.
#[derive(Debug)]
pub enum Flow {
    /// Fall through to the next instruction.
    Next,
    /// Continue at a forward target.
    Jump(usize),
    /// Continue at the target of a `jump_backward`; tiers count these.
    BackEdge(usize),
    /// The instruction was patched; run the same offset again.
    Retry,
    Return(Value),
}

pub fn execute(
    u: &Universe,
    act: &mut Activation,
    at: usize,
    instruction: Instruction,
) -> Result<Flow, Unwind> {
    use Instruction::*;
    match instruction {
        Halt | ReturnLocal => return Ok(Flow::Return(act.stack.pop())),
        Dup => {
            let top = act.stack.top().clone();
            act.stack.push(top);
        }
        DupSecond => {
            let second = act.stack.peek(1).clone();
            act.stack.push(second);
        }

        PushFrame { idx } => {
            let value = act.frame.get(idx as usize);
            act.stack.push(value);
        }
        PushInner { idx, ctx } => {
            let value = act.frame.context_at(ctx)?.get(idx as usize);
            act.stack.push(value);
        }
        PushField { idx, ctx } => {
            let value = self_instance(act, ctx)?.get_field(idx as usize);
            act.stack.push(value);
        }
        PushBlock { lit, with_context } => {
            let block = make_block(act, lit, with_context)?;
            act.stack.push(block);
        }
        PushConstant { lit } => {
            let value = literal(act, at, lit)?.clone();
            act.stack.push(value);
        }
        PushZero => act.stack.push(Value::Integer(0)),
        PushOne => act.stack.push(Value::Integer(1)),
        PushNil => act.stack.push(Value::Nil),
        PushGlobal { lit } => {
            let value = push_global(u, act, at, lit)?;
            act.stack.push(value);
        }

        Pop => {
            act.stack.pop();
        }
        PopFrame { idx } => {
            let value = act.stack.pop();
            act.frame.set(idx as usize, value);
        }
        PopInner { idx, ctx } => {
            let value = act.stack.pop();
            act.frame.context_at(ctx)?.set(idx as usize, value);
        }
        PopField { idx, ctx } => {
            let value = act.stack.pop();
            self_instance(act, ctx)?.set_field(idx as usize, value);
        }
        NilFrame { idx } => act.frame.set(idx as usize, Value::Nil),
        NilInner { idx } => act.frame.context_at(0)?.set(idx as usize, Value::Nil),

        Send { lit, arity } => return dispatch::send(u, act, at, lit, arity),
        SuperSend { lit, .. } => return quicken_super_send(act, at, lit),
        QuickSuperSend { lit, arity } => {
            return dispatch::quick_super_send(u, act, at, lit, arity);
        }

        ReturnNonLocal { ctx } => return return_non_local(u, act, ctx),
        ReturnSelf => return Ok(Flow::Return(act.frame.receiver().clone())),
        ReturnField { idx } => {
            return Ok(Flow::Return(self_instance(act, 0)?.get_field(idx as usize)));
        }

        Inc | Dec => {
            let (delta, name) = if instruction == Inc { (1, "inc") } else { (-1, "dec") };
            let next = increment(act.stack.top(), delta, name)?;
            *act.stack.top_mut() = next;
        }
        IncField { idx, ctx } => {
            increment_field(act, idx, ctx)?;
        }
        IncFieldPush { idx, ctx } => {
            let value = increment_field(act, idx, ctx)?;
            act.stack.push(value);
        }

        Jump { .. } => return Ok(Flow::Jump(target(act, at, instruction)?)),
        JumpBackward { .. } => return Ok(Flow::BackEdge(target(act, at, instruction)?)),
        JumpOnTrueTopNil { .. } | JumpOnFalseTopNil { .. } => {
            let wanted = matches!(instruction, JumpOnTrueTopNil { .. });
            if is_truth(&act.stack.pop(), wanted) {
                act.stack.push(Value::Nil);
                return Ok(Flow::Jump(target(act, at, instruction)?));
            }
        }
        JumpOnTruePop { .. } | JumpOnFalsePop { .. } => {
            let wanted = matches!(instruction, JumpOnTruePop { .. });
            if is_truth(&act.stack.pop(), wanted) {
                return Ok(Flow::Jump(target(act, at, instruction)?));
            }
        }
        JumpIfGreater { .. } => {
            let greater = compare(act.stack.top(), act.stack.peek(1))?.is_gt();
            if greater {
                act.stack.drop_n(2);
                return Ok(Flow::Jump(target(act, at, instruction)?));
            }
        }

        PushLocal { .. } | PushArgument { .. } | PopLocal { .. } | PopArgument { .. }
        | NilLocal { .. } => return resolve_access(act, at, instruction),
    }
    Ok(Flow::Next)
}

fn is_truth(value: &Value, wanted: bool) -> bool {
    match value {
        Value::True => wanted,
        Value::False => !wanted,
        _ => false,
    }
}

fn target(act: &Activation, at: usize, instruction: Instruction) -> Result<usize, RuntimeError> {
    instruction
        .jump_target(at)
        .ok_or_else(|| RuntimeError::bad_bytecode(&act.method, DecodeError::OutOfBounds { offset: at }))
}

fn literal<'a>(act: &'a Activation, at: usize, lit: u8) -> Result<&'a Value, RuntimeError> {
    act.method
        .literal(lit)
        .ok_or_else(|| RuntimeError::bad_bytecode(&act.method, DecodeError::OutOfBounds { offset: at }))
}

fn self_instance(act: &Activation, ctx: u8) -> Result<Rc<Instance>, RuntimeError> {
    match act.frame.self_at(ctx)? {
        Value::Instance(instance) => Ok(instance),
        other => Err(RuntimeError::type_error("instance", &other)),
    }
}

fn increment_field(act: &Activation, idx: u8, ctx: u8) -> Result<Value, RuntimeError> {
    let instance = self_instance(act, ctx)?;
    let next = increment(&instance.get_field(idx as usize), 1, "inc_field")?;
    instance.set_field(idx as usize, next.clone());
    Ok(next)
}

fn make_block(act: &Activation, lit: u8, with_context: bool) -> Result<Value, RuntimeError> {
    let method = match act.method.literal(lit) {
        Some(Value::Method(method)) => method.clone(),
        Some(other) => return Err(RuntimeError::type_error("block method", other)),
        None => return Err(RuntimeError::type_error("block method", &Value::Nil)),
    };
    let context = if with_context {
        act.frame.context().cloned()
    } else {
        None
    };
    Ok(Value::Block(Block::new(method, context)))
}

fn push_global(u: &Universe, act: &Activation, at: usize, lit: u8) -> Result<Value, Unwind> {
    let name = match literal(act, at, lit)? {
        Value::Symbol(name) => name.clone(),
        other => return Err(RuntimeError::type_error("symbol", other).into()),
    };
    match u.global(&name) {
        Some(value) => Ok(value),
        None => {
            log::debug!("{}: unknown global {name}", act.method.signature());
            let receiver = act.frame.dynamic_self();
            dispatch::send_message(
                u,
                receiver,
                &u.selectors.unknown_global,
                vec![Value::Symbol(name)],
            )
        }
    }
}

/// `^value` from a block `ctx` levels below its home method.
fn return_non_local(u: &Universe, act: &mut Activation, ctx: u8) -> Result<Flow, Unwind> {
    let value = act.stack.pop();
    if ctx == 0 {
        return Ok(Flow::Return(value));
    }
    let block = act.frame.block_at(ctx)?;
    let Some(target) = block.context().cloned() else {
        return Err(RuntimeError::type_error("block with a context", &Value::Nil).into());
    };
    if block.is_outer_on_stack() {
        return Err(Unwind::NonLocalReturn { value, target });
    }
    log::warn!(
        "{}: non-local return from a block whose home has returned",
        act.method.signature()
    );
    let escaped = act.frame.receiver().clone();
    let receiver = act.frame.dynamic_self();
    let result = dispatch::send_message(u, receiver, &u.selectors.escaped_block, vec![escaped])?;
    Ok(Flow::Return(result))
}

/// Replace `super_send` with the arity-specific quick form.
fn quicken_super_send(act: &Activation, at: usize, lit: u8) -> Result<Flow, Unwind> {
    let arity = match literal(act, at, lit)? {
        Value::Symbol(selector) => match selector.arity() {
            1 => Arity::One,
            2 => Arity::Two,
            3 => Arity::Three,
            _ => Arity::N,
        },
        other => return Err(RuntimeError::type_error("symbol", other).into()),
    };
    act.method.patch(at, Instruction::QuickSuperSend { lit, arity });
    Ok(Flow::Retry)
}

/// Bind an unresolved variable access to its frame, context or outer
/// context slot and patch the site.
fn resolve_access(act: &Activation, at: usize, instruction: Instruction) -> Result<Flow, Unwind> {
    use Instruction::*;
    let unresolved = || RuntimeError::UnresolvedVariable {
        method: act.method.signature().to_string(),
        offset: at,
    };
    let (kind, idx, ctx) = match instruction {
        PushLocal { idx, ctx } | PopLocal { idx, ctx } => (VarKind::Local, idx, ctx),
        PushArgument { idx, ctx } | PopArgument { idx, ctx } => (VarKind::Argument, idx, ctx),
        NilLocal { idx } => (VarKind::Local, idx, 0),
        _ => return Err(unresolved().into()),
    };
    let access = act
        .method
        .scope()
        .resolve(kind, idx, ctx)
        .ok_or_else(unresolved)?;
    let resolved = match instruction {
        PushLocal { .. } | PushArgument { .. } => access.push(),
        PopLocal { .. } | PopArgument { .. } => access.pop(),
        _ => access.nil().ok_or_else(unresolved)?,
    };
    log::trace!("{}@{at}: {instruction} => {resolved}", act.method.signature());
    act.method.patch(at, resolved);
    Ok(Flow::Retry)
}
