use core::fmt;

use crate::instruction::{Arity, Instruction};
use crate::op::Op;

/// Why a byte sequence could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOpcode { byte: u8, offset: usize },
    OutOfBounds { offset: usize },
    Truncated { op: Op, offset: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { byte, offset } => {
                write!(f, "unknown bytecode 0x{byte:02x} at offset {offset}")
            }
            Self::OutOfBounds { offset } => {
                write!(f, "offset {offset} is past the end of the bytecode")
            }
            Self::Truncated { op, offset } => {
                write!(f, "truncated {} at offset {offset}", op.name())
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode the instruction starting at `offset`.
///
/// Returns the instruction together with its encoded length.
pub fn decode_at(
    bytes: &[u8],
    offset: usize,
) -> Result<(Instruction, usize), DecodeError> {
    let byte = *bytes
        .get(offset)
        .ok_or(DecodeError::OutOfBounds { offset })?;
    let op = Op::try_from(byte)
        .map_err(|byte| DecodeError::UnknownOpcode { byte, offset })?;
    let len = op.length();
    if offset + len > bytes.len() {
        return Err(DecodeError::Truncated { op, offset });
    }
    let a = if len > 1 { bytes[offset + 1] } else { 0 };
    let b = if len > 2 { bytes[offset + 2] } else { 0 };
    let near = a as u16;
    let far = u16::from_le_bytes([a, b]);

    let instruction = match op {
        Op::Halt => Instruction::Halt,
        Op::Dup => Instruction::Dup,
        Op::DupSecond => Instruction::DupSecond,

        Op::PushFrame => Instruction::PushFrame { idx: a },
        Op::PushFrame0 => Instruction::PushFrame { idx: 0 },
        Op::PushFrame1 => Instruction::PushFrame { idx: 1 },
        Op::PushFrame2 => Instruction::PushFrame { idx: 2 },

        Op::PushInner => Instruction::PushInner { idx: a, ctx: b },
        Op::PushInner0 => Instruction::PushInner { idx: 0, ctx: 0 },
        Op::PushInner1 => Instruction::PushInner { idx: 1, ctx: 0 },
        Op::PushInner2 => Instruction::PushInner { idx: 2, ctx: 0 },

        Op::PushField => Instruction::PushField { idx: a, ctx: b },
        Op::PushField0 => Instruction::PushField { idx: 0, ctx: 0 },
        Op::PushField1 => Instruction::PushField { idx: 1, ctx: 0 },

        Op::PushBlock => Instruction::PushBlock { lit: a, with_context: true },
        Op::PushBlockNoCtx => {
            Instruction::PushBlock { lit: a, with_context: false }
        }

        Op::PushConstant => Instruction::PushConstant { lit: a },
        Op::PushConstant0 => Instruction::PushConstant { lit: 0 },
        Op::PushConstant1 => Instruction::PushConstant { lit: 1 },
        Op::PushConstant2 => Instruction::PushConstant { lit: 2 },
        Op::Push0 => Instruction::PushZero,
        Op::Push1 => Instruction::PushOne,
        Op::PushNil => Instruction::PushNil,
        Op::PushGlobal => Instruction::PushGlobal { lit: a },

        Op::Pop => Instruction::Pop,
        Op::PopFrame => Instruction::PopFrame { idx: a },
        Op::PopFrame0 => Instruction::PopFrame { idx: 0 },
        Op::PopFrame1 => Instruction::PopFrame { idx: 1 },
        Op::PopFrame2 => Instruction::PopFrame { idx: 2 },
        Op::PopInner => Instruction::PopInner { idx: a, ctx: b },
        Op::PopInner0 => Instruction::PopInner { idx: 0, ctx: 0 },
        Op::PopInner1 => Instruction::PopInner { idx: 1, ctx: 0 },
        Op::PopInner2 => Instruction::PopInner { idx: 2, ctx: 0 },
        Op::PopField => Instruction::PopField { idx: a, ctx: b },
        Op::PopField0 => Instruction::PopField { idx: 0, ctx: 0 },
        Op::PopField1 => Instruction::PopField { idx: 1, ctx: 0 },
        Op::NilFrame => Instruction::NilFrame { idx: a },
        Op::NilInner => Instruction::NilInner { idx: a },

        Op::Send1 => Instruction::Send { lit: a, arity: Arity::One },
        Op::Send2 => Instruction::Send { lit: a, arity: Arity::Two },
        Op::Send3 => Instruction::Send { lit: a, arity: Arity::Three },
        Op::SendN => Instruction::Send { lit: a, arity: Arity::N },
        Op::SuperSend => Instruction::SuperSend { lit: a, arity: Arity::N },
        Op::QSuperSend1 => {
            Instruction::QuickSuperSend { lit: a, arity: Arity::One }
        }
        Op::QSuperSend2 => {
            Instruction::QuickSuperSend { lit: a, arity: Arity::Two }
        }
        Op::QSuperSend3 => {
            Instruction::QuickSuperSend { lit: a, arity: Arity::Three }
        }
        Op::QSuperSendN => Instruction::QuickSuperSend { lit: a, arity: Arity::N },

        Op::ReturnLocal => Instruction::ReturnLocal,
        Op::ReturnNonLocal => Instruction::ReturnNonLocal { ctx: a },
        Op::ReturnSelf => Instruction::ReturnSelf,
        Op::ReturnField0 => Instruction::ReturnField { idx: 0 },
        Op::ReturnField1 => Instruction::ReturnField { idx: 1 },
        Op::ReturnField2 => Instruction::ReturnField { idx: 2 },

        Op::Inc => Instruction::Inc,
        Op::Dec => Instruction::Dec,
        Op::IncField => Instruction::IncField { idx: a, ctx: b },
        Op::IncFieldPush => Instruction::IncFieldPush { idx: a, ctx: b },

        Op::Jump => Instruction::Jump { offset: near },
        Op::JumpOnTrueTopNil => Instruction::JumpOnTrueTopNil { offset: near },
        Op::JumpOnFalseTopNil => Instruction::JumpOnFalseTopNil { offset: near },
        Op::JumpOnTruePop => Instruction::JumpOnTruePop { offset: near },
        Op::JumpOnFalsePop => Instruction::JumpOnFalsePop { offset: near },
        Op::JumpBackward => Instruction::JumpBackward { offset: near },
        Op::JumpIfGreater => Instruction::JumpIfGreater { offset: near },
        Op::Jump2 => Instruction::Jump { offset: far },
        Op::Jump2OnTrueTopNil => Instruction::JumpOnTrueTopNil { offset: far },
        Op::Jump2OnFalseTopNil => Instruction::JumpOnFalseTopNil { offset: far },
        Op::Jump2OnTruePop => Instruction::JumpOnTruePop { offset: far },
        Op::Jump2OnFalsePop => Instruction::JumpOnFalsePop { offset: far },
        Op::Jump2Backward => Instruction::JumpBackward { offset: far },
        Op::Jump2IfGreater => Instruction::JumpIfGreater { offset: far },

        Op::PushLocal => Instruction::PushLocal { idx: a, ctx: b },
        Op::PushArgument => Instruction::PushArgument { idx: a, ctx: b },
        Op::PopLocal => Instruction::PopLocal { idx: a, ctx: b },
        Op::PopArgument => Instruction::PopArgument { idx: a, ctx: b },
        Op::NilLocal => Instruction::NilLocal { idx: a },
    };

    Ok((instruction, len))
}

/// Walks a bytecode byte slice instruction by instruction.
///
/// Iteration stops after the first [`DecodeError`].
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, returning it with its offset.
    pub fn decode_next(
        &mut self,
    ) -> Option<Result<(usize, Instruction), DecodeError>> {
        if self.is_at_end() {
            return None;
        }
        let at = self.pos;
        match decode_at(self.bytes, at) {
            Ok((instruction, len)) => {
                self.pos += len;
                Some(Ok((at, instruction)))
            }
            Err(err) => {
                self.pos = self.bytes.len();
                Some(Err(err))
            }
        }
    }
}

impl<'a> Iterator for BytecodeDecoder<'a> {
    type Item = Result<(usize, Instruction), DecodeError>;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next()
    }
}
