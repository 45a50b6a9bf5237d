use core::fmt;

use crate::decoder::{DecodeError, decode_at};
use crate::instruction::Instruction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackCheckError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for StackCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack-check error at {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for StackCheckError {}

impl From<DecodeError> for StackCheckError {
    fn from(err: DecodeError) -> Self {
        let offset = match err {
            DecodeError::UnknownOpcode { offset, .. }
            | DecodeError::OutOfBounds { offset }
            | DecodeError::Truncated { offset, .. } => offset,
        };
        Self {
            offset,
            message: err.to_string(),
        }
    }
}

/// Stack depths derived from the control-flow graph of one method.
#[derive(Debug, Clone)]
pub struct StackDepths {
    max_depth: usize,
    /// Depth before the instruction at each offset, `None` for offsets
    /// that are not instruction starts or are unreachable.
    before: Vec<Option<usize>>,
}

impl StackDepths {
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn depth_before(&self, offset: usize) -> Option<usize> {
        self.before.get(offset).copied().flatten()
    }
}

/// Where control goes after an instruction, with the depth on each edge.
enum Successors {
    None,
    One(usize, usize),
    Two((usize, usize), (usize, usize)),
}

/// (values required, values popped, values pushed)
fn effect(
    instruction: Instruction,
    arity_of: &impl Fn(u8) -> usize,
) -> (usize, usize, usize) {
    use Instruction::*;
    match instruction {
        Halt => (1, 0, 0),
        Dup => (1, 0, 1),
        DupSecond => (2, 0, 1),
        PushFrame { .. }
        | PushInner { .. }
        | PushField { .. }
        | PushBlock { .. }
        | PushConstant { .. }
        | PushZero
        | PushOne
        | PushNil
        | PushGlobal { .. }
        | PushLocal { .. }
        | PushArgument { .. }
        | IncFieldPush { .. } => (0, 0, 1),
        Pop
        | PopFrame { .. }
        | PopInner { .. }
        | PopField { .. }
        | PopLocal { .. }
        | PopArgument { .. } => (1, 1, 0),
        NilFrame { .. } | NilInner { .. } | NilLocal { .. } | IncField { .. } => {
            (0, 0, 0)
        }
        Send { lit, arity }
        | SuperSend { lit, arity }
        | QuickSuperSend { lit, arity } => {
            let n = arity.fixed().unwrap_or_else(|| arity_of(lit));
            (n, n, 1)
        }
        ReturnLocal | ReturnNonLocal { .. } => (1, 0, 0),
        ReturnSelf | ReturnField { .. } => (0, 0, 0),
        Inc | Dec => (1, 1, 1),
        Jump { .. } | JumpBackward { .. } => (0, 0, 0),
        JumpOnTrueTopNil { .. }
        | JumpOnFalseTopNil { .. }
        | JumpOnTruePop { .. }
        | JumpOnFalsePop { .. } => (1, 1, 0),
        JumpIfGreater { .. } => (2, 0, 0),
    }
}

fn successors(
    instruction: Instruction,
    at: usize,
    next: usize,
    depth: usize,
) -> Option<Successors> {
    use Instruction::*;
    let target = instruction.jump_target(at);
    Some(match instruction {
        Halt | ReturnLocal | ReturnNonLocal { .. } | ReturnSelf
        | ReturnField { .. } => Successors::None,
        Jump { .. } | JumpBackward { .. } => Successors::One(target?, depth),
        // The taken edge leaves nil in place of the condition.
        JumpOnTrueTopNil { .. } | JumpOnFalseTopNil { .. } => {
            Successors::Two((next, depth), (target?, depth + 1))
        }
        JumpOnTruePop { .. } | JumpOnFalsePop { .. } => {
            Successors::Two((next, depth), (target?, depth))
        }
        // Taken: both compared values are popped.
        JumpIfGreater { .. } => {
            Successors::Two((next, depth), (target?, depth - 2))
        }
        _ => Successors::One(next, depth),
    })
}

/// Compute the stack depth before every reachable instruction.
///
/// `arity_of` maps a selector literal index to its receiver-inclusive
/// argument count, for sends whose arity is not encoded in the opcode.
/// Fails on underflow, on join points reached with different depths, and
/// on undecodable bytes.
pub fn analyze(
    bytes: &[u8],
    arity_of: impl Fn(u8) -> usize,
) -> Result<StackDepths, StackCheckError> {
    let mut before: Vec<Option<usize>> = vec![None; bytes.len()];
    let mut max_depth = 0;
    let mut worklist = Vec::new();
    if !bytes.is_empty() {
        before[0] = Some(0);
        worklist.push(0usize);
    }

    while let Some(at) = worklist.pop() {
        let Some(depth) = before[at] else { continue };
        let (instruction, len) = decode_at(bytes, at)?;
        let (required, popped, pushed) = effect(instruction, &arity_of);
        if depth < required {
            return Err(StackCheckError {
                offset: at,
                message: format!(
                    "stack underflow at {instruction}, needed {required} items, had {depth}"
                ),
            });
        }
        let after = depth - popped + pushed;
        max_depth = max_depth.max(after).max(depth);

        let next = at + len;
        let edges = successors(instruction, at, next, after).ok_or_else(|| {
            StackCheckError {
                offset: at,
                message: format!("jump before the start of the method: {instruction}"),
            }
        })?;
        let mut visit = |target: usize, depth: usize| {
            if target >= bytes.len() {
                return Err(StackCheckError {
                    offset: at,
                    message: format!("control leaves the method at {target}"),
                });
            }
            match before[target] {
                None => {
                    before[target] = Some(depth);
                    worklist.push(target);
                    Ok(())
                }
                Some(seen) if seen == depth => Ok(()),
                Some(seen) => Err(StackCheckError {
                    offset: target,
                    message: format!("inconsistent depth at join: {seen} vs {depth}"),
                }),
            }
        };
        match edges {
            Successors::None => {}
            Successors::One(target, depth) => visit(target, depth)?,
            Successors::Two((a, da), (b, db)) => {
                visit(a, da)?;
                visit(b, db)?;
            }
        }
    }

    Ok(StackDepths { max_depth, before })
}
