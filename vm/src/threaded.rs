use std::cell::Cell;

use bytecode::Instruction;
use object::{Method, Value};

use crate::activation::Activation;
use crate::dispatch;
use crate::error::{RuntimeError, Unwind};
use crate::ops::{self, Flow};
use crate::tstack::TStack;
use crate::Universe;

pub type Handler = fn(&Universe, &mut Activation, &Node) -> Result<Flow, Unwind>;

/// One instruction of a threaded program: the handler to call, the
/// decoded instruction it works on and where execution falls through to.
#[derive(Clone, Copy)]
pub struct Node {
    pub handler: Handler,
    pub instruction: Instruction,
    pub at: usize,
    pub next: usize,
}

impl Node {
    /// Decode the (possibly patched) instruction at `at` and pick its
    /// handler.
    pub fn decode(method: &Method, at: usize) -> Result<Node, RuntimeError> {
        let (instruction, len) = method
            .instruction_at(at)
            .map_err(|err| RuntimeError::bad_bytecode(method, err))?;
        Ok(Node {
            handler: handler_for(instruction),
            instruction,
            at,
            next: at + len,
        })
    }
}

fn handler_for(instruction: Instruction) -> Handler {
    use Instruction::*;
    match instruction {
        PushFrame { .. } => push_frame,
        PopFrame { .. } => pop_frame,
        PushConstant { .. } => push_constant,
        PushZero | PushOne | PushNil => push_small,
        Dup => dup,
        Pop => pop,
        Send { .. } => send,
        Jump { .. } => jump,
        _ => generic,
    }
}

fn generic(u: &Universe, act: &mut Activation, node: &Node) -> Result<Flow, Unwind> {
    ops::execute(u, act, node.at, node.instruction)
}

fn push_frame(u: &Universe, act: &mut Activation, node: &Node) -> Result<Flow, Unwind> {
    let Instruction::PushFrame { idx } = node.instruction else {
        return generic(u, act, node);
    };
    let value = act.frame.get(idx as usize);
    act.stack.push(value);
    Ok(Flow::Next)
}

fn pop_frame(u: &Universe, act: &mut Activation, node: &Node) -> Result<Flow, Unwind> {
    let Instruction::PopFrame { idx } = node.instruction else {
        return generic(u, act, node);
    };
    let value = act.stack.pop();
    act.frame.set(idx as usize, value);
    Ok(Flow::Next)
}

fn push_constant(u: &Universe, act: &mut Activation, node: &Node) -> Result<Flow, Unwind> {
    if let Instruction::PushConstant { lit } = node.instruction {
        if let Some(value) = act.method.literal(lit) {
            act.stack.push(value.clone());
            return Ok(Flow::Next);
        }
    }
    // reports the missing literal
    generic(u, act, node)
}

fn push_small(_u: &Universe, act: &mut Activation, node: &Node) -> Result<Flow, Unwind> {
    let value = match node.instruction {
        Instruction::PushZero => Value::Integer(0),
        Instruction::PushOne => Value::Integer(1),
        _ => Value::Nil,
    };
    act.stack.push(value);
    Ok(Flow::Next)
}

fn dup(_u: &Universe, act: &mut Activation, _node: &Node) -> Result<Flow, Unwind> {
    let top = act.stack.top().clone();
    act.stack.push(top);
    Ok(Flow::Next)
}

fn pop(_u: &Universe, act: &mut Activation, _node: &Node) -> Result<Flow, Unwind> {
    act.stack.pop();
    Ok(Flow::Next)
}

fn send(u: &Universe, act: &mut Activation, node: &Node) -> Result<Flow, Unwind> {
    match node.instruction {
        Instruction::Send { lit, arity } => dispatch::send_inlined(u, act, node.at, lit, arity),
        other => ops::execute(u, act, node.at, other),
    }
}

fn jump(u: &Universe, act: &mut Activation, node: &Node) -> Result<Flow, Unwind> {
    match node.instruction.jump_target(node.at) {
        Some(target) => Ok(Flow::Jump(target)),
        None => generic(u, act, node),
    }
}

/// Handler nodes of one method, indexed by bytecode offset. Offsets that
/// are not instruction starts, or that the traversal never reached, hold
/// `None`.
pub struct ThreadedProgram {
    nodes: Box<[Cell<Option<Node>>]>,
}

impl ThreadedProgram {
    #[inline(always)]
    pub fn node(&self, at: usize) -> Option<Node> {
        self.nodes.get(at).and_then(Cell::get)
    }

    /// Re-read the instruction at `at` after the site was patched.
    pub fn refresh(&self, method: &Method, at: usize) -> Result<(), RuntimeError> {
        if let Some(slot) = self.nodes.get(at) {
            slot.set(Some(Node::decode(method, at)?));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the threaded program of `method`.
///
/// Straight-line code is visited fall-through first. The taken target of
/// a conditional jump is pushed onto a continuation list and resumed once
/// the current path ends in a return or a back-edge. Unconditional jumps
/// are followed directly.
pub fn compile(u: &Universe, method: &Method) -> Result<ThreadedProgram, RuntimeError> {
    let len = method.bytecode().len();
    let nodes: Box<[Cell<Option<Node>>]> = (0..len).map(|_| Cell::new(None)).collect();
    let mut pool = u.tstacks();
    let mut pending = TStack::EMPTY;
    let mut cursor = if len == 0 { None } else { Some(0) };

    while let Some(at) = cursor {
        if at >= len || nodes[at].get().is_some() {
            cursor = pool.pop(pending).map(|(offset, rest)| {
                pending = rest;
                offset
            });
            continue;
        }
        let node = Node::decode(method, at)?;
        nodes[at].set(Some(node));
        let instruction = node.instruction;
        let target = instruction.jump_target(at);
        cursor = match instruction {
            Instruction::Jump { .. } | Instruction::JumpBackward { .. } => target,
            _ if instruction.ends_block() => None,
            _ => {
                if let Some(target) = target {
                    pending = pool.push(target, pending);
                }
                Some(node.next)
            }
        };
        if cursor.is_none() {
            cursor = pool.pop(pending).map(|(offset, rest)| {
                pending = rest;
                offset
            });
        }
    }

    let program = ThreadedProgram { nodes };
    log::debug!(
        "threaded {}: {} nodes, {} continuation lists interned",
        method.signature(),
        program.len(),
        pool.len()
    );
    Ok(program)
}
