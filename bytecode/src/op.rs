/// Bytecode opcodes.
///
/// Operands are single bytes unless stated otherwise. `lit` operands index
/// the method's literal table, `idx` operands index a frame, context or
/// field slot, and `ctx` operands count lexical levels outwards (`0` is the
/// current activation).
///
/// Jumps always occupy three bytes. Near jumps use the first operand byte
/// as the offset and leave the second zero; the `Jump2*` forms read a
/// little-endian `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Stop the loop and return the top of stack.
    Halt = 0x00,

    /// Duplicate the top of stack.
    Dup,

    /// Push a copy of the element below the top of stack.
    DupSecond,

    /// Push a frame-local slot.
    /// Operands: `idx`
    PushFrame,
    PushFrame0,
    PushFrame1,
    PushFrame2,

    /// Push a slot of an inner context.
    /// Operands: `idx`, `ctx`
    PushInner,
    PushInner0,
    PushInner1,
    PushInner2,

    /// Push a field of `self` at the given lexical level.
    /// Operands: `idx`, `ctx`
    PushField,
    PushField0,
    PushField1,

    /// Create a block capturing the current inner context.
    /// Operands: `lit`
    PushBlock,

    /// Create a block that captures nothing.
    /// Operands: `lit`
    PushBlockNoCtx,

    /// Push a literal.
    /// Operands: `lit`
    PushConstant,
    PushConstant0,
    PushConstant1,
    PushConstant2,

    Push0,
    Push1,
    PushNil,

    /// Push the value of a global, or the result of `unknownGlobal:`.
    /// Operands: `lit` (a symbol)
    PushGlobal,

    Pop,

    /// Pop into a frame-local slot.
    /// Operands: `idx`
    PopFrame,
    PopFrame0,
    PopFrame1,
    PopFrame2,

    /// Pop into an inner-context slot.
    /// Operands: `idx`, `ctx`
    PopInner,
    PopInner0,
    PopInner1,
    PopInner2,

    /// Pop into a field of `self`.
    /// Operands: `idx`, `ctx`
    PopField,
    PopField0,
    PopField1,

    /// Operands: `idx`
    NilFrame,

    /// Operands: `idx`
    NilInner,

    /// Send a unary message.
    /// Operands: `lit` (selector)
    Send1,
    /// Send a binary message or a one-argument keyword message.
    /// Operands: `lit`
    Send2,
    /// Operands: `lit`
    Send3,
    /// Send with the arity taken from the selector.
    /// Operands: `lit`
    SendN,

    /// Send starting the lookup at the holder's superclass.
    /// Operands: `lit`
    SuperSend,

    /// Return the top of stack from this activation.
    ReturnLocal,

    /// Return the top of stack from the home method of the block at `ctx`.
    /// Operands: `ctx`
    ReturnNonLocal,

    ReturnSelf,
    ReturnField0,
    ReturnField1,
    ReturnField2,

    /// Increment the top of stack.
    Inc,

    /// Decrement the top of stack.
    Dec,

    /// Increment a field of `self` in place.
    /// Operands: `idx`, `ctx`
    IncField,

    /// Increment a field of `self` in place and push the new value.
    /// Operands: `idx`, `ctx`
    IncFieldPush,

    /// Operands: `offset:u8`, `0`
    Jump,
    JumpOnTrueTopNil,
    JumpOnFalseTopNil,
    JumpOnTruePop,
    JumpOnFalsePop,
    JumpBackward,
    /// Compare the top of stack with the element below it and jump when
    /// the top is greater, popping both.
    JumpIfGreater,

    /// Operands: `offset:u16`
    Jump2,
    Jump2OnTrueTopNil,
    Jump2OnFalseTopNil,
    Jump2OnTruePop,
    Jump2OnFalsePop,
    Jump2Backward,
    Jump2IfGreater,

    /// Super send whose target has been cached at the call site.
    /// Operands: `lit`
    QSuperSend1,
    QSuperSend2,
    QSuperSend3,
    QSuperSendN,

    /// Unresolved local read, rewritten on first execution.
    /// Operands: `idx`, `ctx`
    PushLocal,
    /// Unresolved argument read. Argument `0` is `self`.
    /// Operands: `idx`, `ctx`
    PushArgument,
    /// Operands: `idx`, `ctx`
    PopLocal,
    /// Operands: `idx`, `ctx`
    PopArgument,
    /// Operands: `idx`
    NilLocal,
}

impl Op {
    pub const COUNT: usize = Op::NilLocal as usize + 1;

    /// Encoded length in bytes, including the opcode itself.
    pub const fn length(self) -> usize {
        use Op::*;
        match self {
            Halt | Dup | DupSecond | PushFrame0 | PushFrame1 | PushFrame2
            | PushInner0 | PushInner1 | PushInner2 | PushField0 | PushField1
            | PushConstant0 | PushConstant1 | PushConstant2 | Push0 | Push1
            | PushNil | Pop | PopFrame0 | PopFrame1 | PopFrame2 | PopInner0
            | PopInner1 | PopInner2 | PopField0 | PopField1 | ReturnLocal
            | ReturnSelf | ReturnField0 | ReturnField1 | ReturnField2 | Inc
            | Dec => 1,

            PushFrame | PopFrame | NilFrame | NilInner | PushBlock
            | PushBlockNoCtx | PushConstant | PushGlobal | Send1 | Send2
            | Send3 | SendN | SuperSend | QSuperSend1 | QSuperSend2
            | QSuperSend3 | QSuperSendN | ReturnNonLocal | NilLocal => 2,

            PushInner | PopInner | PushField | PopField | IncField
            | IncFieldPush | PushLocal | PushArgument | PopLocal
            | PopArgument => 3,

            Jump | JumpOnTrueTopNil | JumpOnFalseTopNil | JumpOnTruePop
            | JumpOnFalsePop | JumpBackward | JumpIfGreater | Jump2
            | Jump2OnTrueTopNil | Jump2OnFalseTopNil | Jump2OnTruePop
            | Jump2OnFalsePop | Jump2Backward | Jump2IfGreater => 3,
        }
    }

    /// Whether this is one of the `Jump2*` forms with a 16-bit offset.
    pub const fn is_far_jump(self) -> bool {
        matches!(
            self,
            Op::Jump2
                | Op::Jump2OnTrueTopNil
                | Op::Jump2OnFalseTopNil
                | Op::Jump2OnTruePop
                | Op::Jump2OnFalsePop
                | Op::Jump2Backward
                | Op::Jump2IfGreater
        )
    }

    /// The far counterpart of a near jump. Other opcodes map to themselves.
    pub const fn widened(self) -> Self {
        match self {
            Op::Jump => Op::Jump2,
            Op::JumpOnTrueTopNil => Op::Jump2OnTrueTopNil,
            Op::JumpOnFalseTopNil => Op::Jump2OnFalseTopNil,
            Op::JumpOnTruePop => Op::Jump2OnTruePop,
            Op::JumpOnFalsePop => Op::Jump2OnFalsePop,
            Op::JumpBackward => Op::Jump2Backward,
            Op::JumpIfGreater => Op::Jump2IfGreater,
            other => other,
        }
    }

    pub const fn name(self) -> &'static str {
        use Op::*;
        match self {
            Halt => "halt",
            Dup => "dup",
            DupSecond => "dup_second",
            PushFrame => "push_frame",
            PushFrame0 => "push_frame_0",
            PushFrame1 => "push_frame_1",
            PushFrame2 => "push_frame_2",
            PushInner => "push_inner",
            PushInner0 => "push_inner_0",
            PushInner1 => "push_inner_1",
            PushInner2 => "push_inner_2",
            PushField => "push_field",
            PushField0 => "push_field_0",
            PushField1 => "push_field_1",
            PushBlock => "push_block",
            PushBlockNoCtx => "push_block_no_ctx",
            PushConstant => "push_constant",
            PushConstant0 => "push_constant_0",
            PushConstant1 => "push_constant_1",
            PushConstant2 => "push_constant_2",
            Push0 => "push_0",
            Push1 => "push_1",
            PushNil => "push_nil",
            PushGlobal => "push_global",
            Pop => "pop",
            PopFrame => "pop_frame",
            PopFrame0 => "pop_frame_0",
            PopFrame1 => "pop_frame_1",
            PopFrame2 => "pop_frame_2",
            PopInner => "pop_inner",
            PopInner0 => "pop_inner_0",
            PopInner1 => "pop_inner_1",
            PopInner2 => "pop_inner_2",
            PopField => "pop_field",
            PopField0 => "pop_field_0",
            PopField1 => "pop_field_1",
            NilFrame => "nil_frame",
            NilInner => "nil_inner",
            Send1 => "send_1",
            Send2 => "send_2",
            Send3 => "send_3",
            SendN => "send_n",
            SuperSend => "super_send",
            ReturnLocal => "return_local",
            ReturnNonLocal => "return_non_local",
            ReturnSelf => "return_self",
            ReturnField0 => "return_field_0",
            ReturnField1 => "return_field_1",
            ReturnField2 => "return_field_2",
            Inc => "inc",
            Dec => "dec",
            IncField => "inc_field",
            IncFieldPush => "inc_field_push",
            Jump => "jump",
            JumpOnTrueTopNil => "jump_on_true_top_nil",
            JumpOnFalseTopNil => "jump_on_false_top_nil",
            JumpOnTruePop => "jump_on_true_pop",
            JumpOnFalsePop => "jump_on_false_pop",
            JumpBackward => "jump_backward",
            JumpIfGreater => "jump_if_greater",
            Jump2 => "jump2",
            Jump2OnTrueTopNil => "jump2_on_true_top_nil",
            Jump2OnFalseTopNil => "jump2_on_false_top_nil",
            Jump2OnTruePop => "jump2_on_true_pop",
            Jump2OnFalsePop => "jump2_on_false_pop",
            Jump2Backward => "jump2_backward",
            Jump2IfGreater => "jump2_if_greater",
            QSuperSend1 => "q_super_send_1",
            QSuperSend2 => "q_super_send_2",
            QSuperSend3 => "q_super_send_3",
            QSuperSendN => "q_super_send_n",
            PushLocal => "push_local",
            PushArgument => "push_argument",
            PopLocal => "pop_local",
            PopArgument => "pop_argument",
            NilLocal => "nil_local",
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        if (byte as usize) < Self::COUNT {
            // SAFETY: Op is repr(u8) with contiguous variants starting at 0.
            Ok(unsafe { core::mem::transmute::<u8, Op>(byte) })
        } else {
            Err(byte)
        }
    }
}
