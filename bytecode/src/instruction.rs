use core::fmt;

/// Number of stack values a send consumes, receiver included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    One,
    Two,
    Three,
    /// Taken from the selector literal.
    N,
}

impl Arity {
    pub const fn fixed(self) -> Option<usize> {
        match self {
            Arity::One => Some(1),
            Arity::Two => Some(2),
            Arity::Three => Some(3),
            Arity::N => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Arity::One => "1",
            Arity::Two => "2",
            Arity::Three => "3",
            Arity::N => "n",
        }
    }
}

/// A decoded instruction.
///
/// The short forms (`push_frame_0`, `push_constant_2`, near and far jumps,
/// ...) decode to the same variant as their general form, so the
/// interpreter only handles one shape per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Halt,
    Dup,
    DupSecond,
    PushFrame { idx: u8 },
    PushInner { idx: u8, ctx: u8 },
    PushField { idx: u8, ctx: u8 },
    PushBlock { lit: u8, with_context: bool },
    PushConstant { lit: u8 },
    PushZero,
    PushOne,
    PushNil,
    PushGlobal { lit: u8 },
    Pop,
    PopFrame { idx: u8 },
    PopInner { idx: u8, ctx: u8 },
    PopField { idx: u8, ctx: u8 },
    NilFrame { idx: u8 },
    NilInner { idx: u8 },
    Send { lit: u8, arity: Arity },
    SuperSend { lit: u8, arity: Arity },
    QuickSuperSend { lit: u8, arity: Arity },
    ReturnLocal,
    ReturnNonLocal { ctx: u8 },
    ReturnSelf,
    ReturnField { idx: u8 },
    Inc,
    Dec,
    IncField { idx: u8, ctx: u8 },
    IncFieldPush { idx: u8, ctx: u8 },
    Jump { offset: u16 },
    JumpOnTrueTopNil { offset: u16 },
    JumpOnFalseTopNil { offset: u16 },
    JumpOnTruePop { offset: u16 },
    JumpOnFalsePop { offset: u16 },
    JumpBackward { offset: u16 },
    JumpIfGreater { offset: u16 },
    PushLocal { idx: u8, ctx: u8 },
    PushArgument { idx: u8, ctx: u8 },
    PopLocal { idx: u8, ctx: u8 },
    PopArgument { idx: u8, ctx: u8 },
    NilLocal { idx: u8 },
}

impl Instruction {
    /// Absolute target of a jump located at `at`, or `None` for other
    /// instructions.
    pub fn jump_target(self, at: usize) -> Option<usize> {
        match self {
            Self::Jump { offset }
            | Self::JumpOnTrueTopNil { offset }
            | Self::JumpOnFalseTopNil { offset }
            | Self::JumpOnTruePop { offset }
            | Self::JumpOnFalsePop { offset }
            | Self::JumpIfGreater { offset } => Some(at + offset as usize),
            Self::JumpBackward { offset } => at.checked_sub(offset as usize),
            _ => None,
        }
    }

    /// Whether control never falls through to the next instruction.
    pub fn ends_block(self) -> bool {
        matches!(
            self,
            Self::Halt
                | Self::ReturnLocal
                | Self::ReturnNonLocal { .. }
                | Self::ReturnSelf
                | Self::ReturnField { .. }
                | Self::Jump { .. }
                | Self::JumpBackward { .. }
        )
    }

    /// Whether this is one of the variable accesses that still has to be
    /// resolved against the lexical scope.
    pub fn is_unresolved_access(self) -> bool {
        matches!(
            self,
            Self::PushLocal { .. }
                | Self::PushArgument { .. }
                | Self::PopLocal { .. }
                | Self::PopArgument { .. }
                | Self::NilLocal { .. }
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Halt => write!(f, "halt"),
            Self::Dup => write!(f, "dup"),
            Self::DupSecond => write!(f, "dup_second"),
            Self::PushFrame { idx } => write!(f, "push_frame {idx}"),
            Self::PushInner { idx, ctx } => write!(f, "push_inner {idx} ^{ctx}"),
            Self::PushField { idx, ctx } => write!(f, "push_field {idx} ^{ctx}"),
            Self::PushBlock { lit, with_context: true } => {
                write!(f, "push_block #{lit}")
            }
            Self::PushBlock { lit, with_context: false } => {
                write!(f, "push_block_no_ctx #{lit}")
            }
            Self::PushConstant { lit } => write!(f, "push_constant #{lit}"),
            Self::PushZero => write!(f, "push_0"),
            Self::PushOne => write!(f, "push_1"),
            Self::PushNil => write!(f, "push_nil"),
            Self::PushGlobal { lit } => write!(f, "push_global #{lit}"),
            Self::Pop => write!(f, "pop"),
            Self::PopFrame { idx } => write!(f, "pop_frame {idx}"),
            Self::PopInner { idx, ctx } => write!(f, "pop_inner {idx} ^{ctx}"),
            Self::PopField { idx, ctx } => write!(f, "pop_field {idx} ^{ctx}"),
            Self::NilFrame { idx } => write!(f, "nil_frame {idx}"),
            Self::NilInner { idx } => write!(f, "nil_inner {idx}"),
            Self::Send { lit, arity } => {
                write!(f, "send_{} #{lit}", arity.suffix())
            }
            Self::SuperSend { lit, .. } => write!(f, "super_send #{lit}"),
            Self::QuickSuperSend { lit, arity } => {
                write!(f, "q_super_send_{} #{lit}", arity.suffix())
            }
            Self::ReturnLocal => write!(f, "return_local"),
            Self::ReturnNonLocal { ctx } => write!(f, "return_non_local ^{ctx}"),
            Self::ReturnSelf => write!(f, "return_self"),
            Self::ReturnField { idx } => write!(f, "return_field_{idx}"),
            Self::Inc => write!(f, "inc"),
            Self::Dec => write!(f, "dec"),
            Self::IncField { idx, ctx } => write!(f, "inc_field {idx} ^{ctx}"),
            Self::IncFieldPush { idx, ctx } => {
                write!(f, "inc_field_push {idx} ^{ctx}")
            }
            Self::Jump { offset } => write!(f, "jump +{offset}"),
            Self::JumpOnTrueTopNil { offset } => {
                write!(f, "jump_on_true_top_nil +{offset}")
            }
            Self::JumpOnFalseTopNil { offset } => {
                write!(f, "jump_on_false_top_nil +{offset}")
            }
            Self::JumpOnTruePop { offset } => write!(f, "jump_on_true_pop +{offset}"),
            Self::JumpOnFalsePop { offset } => {
                write!(f, "jump_on_false_pop +{offset}")
            }
            Self::JumpBackward { offset } => write!(f, "jump_backward -{offset}"),
            Self::JumpIfGreater { offset } => write!(f, "jump_if_greater +{offset}"),
            Self::PushLocal { idx, ctx } => write!(f, "push_local {idx} ^{ctx}"),
            Self::PushArgument { idx, ctx } => {
                write!(f, "push_argument {idx} ^{ctx}")
            }
            Self::PopLocal { idx, ctx } => write!(f, "pop_local {idx} ^{ctx}"),
            Self::PopArgument { idx, ctx } => write!(f, "pop_argument {idx} ^{ctx}"),
            Self::NilLocal { idx } => write!(f, "nil_local {idx}"),
        }
    }
}
