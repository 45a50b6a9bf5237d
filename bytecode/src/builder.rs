use crate::op::Op;

/// A forward jump whose offset has not yet been resolved.
///
/// Created by the conditional and unconditional jump emitters. Resolve it
/// with [`BytecodeBuilder::bind`].
#[derive(Debug)]
#[must_use = "a jump label has to be bound"]
pub struct Label {
    /// Offset of the jump opcode.
    at: usize,
    /// Near form of the jump.
    op: Op,
}

/// Builds a bytecode byte sequence.
///
/// The indexed emitters pick the one-byte short forms (`push_frame_0`,
/// `push_constant_1`, ...) when the operands allow it, and jumps pick the
/// near or far encoding once their distance is known.
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    fn emit1(&mut self, op: Op, a: u8) {
        self.emit_op(op);
        self.buf.push(a);
    }

    fn emit2(&mut self, op: Op, a: u8, b: u8) {
        self.emit_op(op);
        self.buf.push(a);
        self.buf.push(b);
    }

    // ── stack ──────────────────────────────────────────────────────

    pub fn halt(&mut self) {
        self.emit_op(Op::Halt);
    }

    pub fn dup(&mut self) {
        self.emit_op(Op::Dup);
    }

    pub fn dup_second(&mut self) {
        self.emit_op(Op::DupSecond);
    }

    pub fn pop(&mut self) {
        self.emit_op(Op::Pop);
    }

    // ── variables ──────────────────────────────────────────────────

    pub fn push_frame(&mut self, idx: u8) {
        match idx {
            0 => self.emit_op(Op::PushFrame0),
            1 => self.emit_op(Op::PushFrame1),
            2 => self.emit_op(Op::PushFrame2),
            _ => self.emit1(Op::PushFrame, idx),
        }
    }

    pub fn push_inner(&mut self, idx: u8, ctx: u8) {
        match (idx, ctx) {
            (0, 0) => self.emit_op(Op::PushInner0),
            (1, 0) => self.emit_op(Op::PushInner1),
            (2, 0) => self.emit_op(Op::PushInner2),
            _ => self.emit2(Op::PushInner, idx, ctx),
        }
    }

    pub fn pop_frame(&mut self, idx: u8) {
        match idx {
            0 => self.emit_op(Op::PopFrame0),
            1 => self.emit_op(Op::PopFrame1),
            2 => self.emit_op(Op::PopFrame2),
            _ => self.emit1(Op::PopFrame, idx),
        }
    }

    pub fn pop_inner(&mut self, idx: u8, ctx: u8) {
        match (idx, ctx) {
            (0, 0) => self.emit_op(Op::PopInner0),
            (1, 0) => self.emit_op(Op::PopInner1),
            (2, 0) => self.emit_op(Op::PopInner2),
            _ => self.emit2(Op::PopInner, idx, ctx),
        }
    }

    pub fn nil_frame(&mut self, idx: u8) {
        self.emit1(Op::NilFrame, idx);
    }

    pub fn nil_inner(&mut self, idx: u8) {
        self.emit1(Op::NilInner, idx);
    }

    /// `push_local <idx> <ctx>`, resolved on first execution.
    pub fn push_local(&mut self, idx: u8, ctx: u8) {
        self.emit2(Op::PushLocal, idx, ctx);
    }

    /// `push_argument <idx> <ctx>`, resolved on first execution.
    /// Argument `0` is the receiver.
    pub fn push_argument(&mut self, idx: u8, ctx: u8) {
        self.emit2(Op::PushArgument, idx, ctx);
    }

    pub fn pop_local(&mut self, idx: u8, ctx: u8) {
        self.emit2(Op::PopLocal, idx, ctx);
    }

    pub fn pop_argument(&mut self, idx: u8, ctx: u8) {
        self.emit2(Op::PopArgument, idx, ctx);
    }

    pub fn nil_local(&mut self, idx: u8) {
        self.emit1(Op::NilLocal, idx);
    }

    // ── fields ─────────────────────────────────────────────────────

    pub fn push_field(&mut self, idx: u8, ctx: u8) {
        match (idx, ctx) {
            (0, 0) => self.emit_op(Op::PushField0),
            (1, 0) => self.emit_op(Op::PushField1),
            _ => self.emit2(Op::PushField, idx, ctx),
        }
    }

    pub fn pop_field(&mut self, idx: u8, ctx: u8) {
        match (idx, ctx) {
            (0, 0) => self.emit_op(Op::PopField0),
            (1, 0) => self.emit_op(Op::PopField1),
            _ => self.emit2(Op::PopField, idx, ctx),
        }
    }

    pub fn inc_field(&mut self, idx: u8, ctx: u8) {
        self.emit2(Op::IncField, idx, ctx);
    }

    pub fn inc_field_push(&mut self, idx: u8, ctx: u8) {
        self.emit2(Op::IncFieldPush, idx, ctx);
    }

    // ── literals ───────────────────────────────────────────────────

    pub fn push_constant(&mut self, lit: u8) {
        match lit {
            0 => self.emit_op(Op::PushConstant0),
            1 => self.emit_op(Op::PushConstant1),
            2 => self.emit_op(Op::PushConstant2),
            _ => self.emit1(Op::PushConstant, lit),
        }
    }

    pub fn push_0(&mut self) {
        self.emit_op(Op::Push0);
    }

    pub fn push_1(&mut self) {
        self.emit_op(Op::Push1);
    }

    pub fn push_nil(&mut self) {
        self.emit_op(Op::PushNil);
    }

    pub fn push_global(&mut self, lit: u8) {
        self.emit1(Op::PushGlobal, lit);
    }

    pub fn push_block(&mut self, lit: u8) {
        self.emit1(Op::PushBlock, lit);
    }

    pub fn push_block_no_ctx(&mut self, lit: u8) {
        self.emit1(Op::PushBlockNoCtx, lit);
    }

    // ── sends ──────────────────────────────────────────────────────

    /// Emit a send of the selector at `lit`. `arity` counts the receiver.
    pub fn send(&mut self, lit: u8, arity: usize) {
        let op = match arity {
            1 => Op::Send1,
            2 => Op::Send2,
            3 => Op::Send3,
            _ => Op::SendN,
        };
        self.emit1(op, lit);
    }

    pub fn super_send(&mut self, lit: u8) {
        self.emit1(Op::SuperSend, lit);
    }

    pub fn q_super_send(&mut self, lit: u8, arity: usize) {
        let op = match arity {
            1 => Op::QSuperSend1,
            2 => Op::QSuperSend2,
            3 => Op::QSuperSend3,
            _ => Op::QSuperSendN,
        };
        self.emit1(op, lit);
    }

    // ── returns and arithmetic ─────────────────────────────────────

    pub fn return_local(&mut self) {
        self.emit_op(Op::ReturnLocal);
    }

    pub fn return_non_local(&mut self, ctx: u8) {
        self.emit1(Op::ReturnNonLocal, ctx);
    }

    pub fn return_self(&mut self) {
        self.emit_op(Op::ReturnSelf);
    }

    /// `return_field_<idx>`, or a field push and local return for fields
    /// without a short form.
    pub fn return_field(&mut self, idx: u8) {
        match idx {
            0 => self.emit_op(Op::ReturnField0),
            1 => self.emit_op(Op::ReturnField1),
            2 => self.emit_op(Op::ReturnField2),
            _ => {
                self.push_field(idx, 0);
                self.return_local();
            }
        }
    }

    pub fn inc(&mut self) {
        self.emit_op(Op::Inc);
    }

    pub fn dec(&mut self) {
        self.emit_op(Op::Dec);
    }

    // ── jumps ──────────────────────────────────────────────────────

    pub fn jump(&mut self) -> Label {
        self.emit_jump_placeholder(Op::Jump)
    }

    pub fn jump_on_true_top_nil(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpOnTrueTopNil)
    }

    pub fn jump_on_false_top_nil(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpOnFalseTopNil)
    }

    pub fn jump_on_true_pop(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpOnTruePop)
    }

    pub fn jump_on_false_pop(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpOnFalsePop)
    }

    pub fn jump_if_greater(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpIfGreater)
    }

    /// Bind a forward jump label to the current position.
    pub fn bind(&mut self, label: Label) {
        let distance = self.buf.len() - label.at;
        self.write_jump(label.at, label.op, distance);
    }

    /// Emit a backward jump to `target` (a byte offset obtained from
    /// [`current_offset`](Self::current_offset)).
    pub fn jump_backward(&mut self, target: usize) {
        let at = self.buf.len();
        assert!(target <= at, "jump_backward target {target} is ahead of {at}");
        self.emit2(Op::JumpBackward, 0, 0);
        self.write_jump(at, Op::JumpBackward, at - target);
    }

    fn emit_jump_placeholder(&mut self, op: Op) -> Label {
        let at = self.buf.len();
        self.emit2(op, 0, 0);
        Label { at, op }
    }

    fn write_jump(&mut self, at: usize, near: Op, distance: usize) {
        if let Ok(offset) = u8::try_from(distance) {
            self.buf[at] = near as u8;
            self.buf[at + 1] = offset;
            self.buf[at + 2] = 0;
        } else {
            let offset = u16::try_from(distance)
                .unwrap_or_else(|_| panic!("jump distance {distance} exceeds u16"));
            self.buf[at] = near.widened() as u8;
            self.buf[at + 1..at + 3].copy_from_slice(&offset.to_le_bytes());
        }
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
