use std::rc::Rc;

use bytecode::Instruction;

/// Where a variable lives inside its own activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarLocation {
    Frame(usize),
    Inner(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Argument,
    Local,
}

/// Resolution state of an unresolved variable-access site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarAccess {
    ResolvedLocal(u8),
    ResolvedInner(u8),
    ResolvedOuter { idx: u8, level: u8 },
}

impl VarAccess {
    pub fn push(self) -> Instruction {
        match self {
            VarAccess::ResolvedLocal(idx) => Instruction::PushFrame { idx },
            VarAccess::ResolvedInner(idx) => Instruction::PushInner { idx, ctx: 0 },
            VarAccess::ResolvedOuter { idx, level } => {
                Instruction::PushInner { idx, ctx: level }
            }
        }
    }

    pub fn pop(self) -> Instruction {
        match self {
            VarAccess::ResolvedLocal(idx) => Instruction::PopFrame { idx },
            VarAccess::ResolvedInner(idx) => Instruction::PopInner { idx, ctx: 0 },
            VarAccess::ResolvedOuter { idx, level } => {
                Instruction::PopInner { idx, ctx: level }
            }
        }
    }

    /// `nil_local` only addresses the current activation.
    pub fn nil(self) -> Option<Instruction> {
        match self {
            VarAccess::ResolvedLocal(idx) => Some(Instruction::NilFrame { idx }),
            VarAccess::ResolvedInner(idx) => Some(Instruction::NilInner { idx }),
            VarAccess::ResolvedOuter { .. } => None,
        }
    }
}

/// Variable placement of one method or block, linked to the scope it is
/// lexically nested in.
///
/// Frame slot 0 and context slot 0 both hold the receiver. Arguments and
/// locals that no nested block captures get the following frame slots in
/// declaration order; captured ones get the following context slots.
#[derive(Debug)]
pub struct LexicalScope {
    outer: Option<Rc<LexicalScope>>,
    arguments: Box<[VarLocation]>,
    locals: Box<[VarLocation]>,
    frame_size: usize,
    inner_size: usize,
}

impl LexicalScope {
    /// `arguments` and `locals` flag which variables are captured by a
    /// nested block. `self` is not part of `arguments`. A context is
    /// allocated when anything is captured or `needs_context` is set
    /// (the method catches a non-local return or `self` is captured).
    pub fn new(
        outer: Option<Rc<LexicalScope>>,
        arguments: &[bool],
        locals: &[bool],
        needs_context: bool,
    ) -> Rc<Self> {
        let mut frame_size = 1;
        let mut inner_size = 1;
        let mut place = |captured: &bool| {
            if *captured {
                inner_size += 1;
                VarLocation::Inner(inner_size - 1)
            } else {
                frame_size += 1;
                VarLocation::Frame(frame_size - 1)
            }
        };
        let arguments: Box<[VarLocation]> = arguments.iter().map(&mut place).collect();
        let locals: Box<[VarLocation]> = locals.iter().map(&mut place).collect();
        let has_context = needs_context || inner_size > 1;
        Rc::new(Self {
            outer,
            arguments,
            locals,
            frame_size,
            inner_size: if has_context { inner_size } else { 0 },
        })
    }

    pub fn outer(&self) -> Option<&Rc<LexicalScope>> {
        self.outer.as_ref()
    }

    /// Frame slots, receiver included.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Context slots, receiver included, or `0` without a context.
    pub fn inner_size(&self) -> usize {
        self.inner_size
    }

    pub fn has_context(&self) -> bool {
        self.inner_size > 0
    }

    /// Location of each argument, `self` excluded.
    pub fn arguments(&self) -> &[VarLocation] {
        &self.arguments
    }

    pub fn locals(&self) -> &[VarLocation] {
        &self.locals
    }

    /// Resolve variable `idx` of `kind` declared `ctx` scopes outwards.
    /// Argument `0` is `self`.
    pub fn resolve(&self, kind: VarKind, idx: u8, ctx: u8) -> Option<VarAccess> {
        let mut scope = self;
        for _ in 0..ctx {
            scope = scope.outer.as_deref()?;
        }
        let location = match (kind, idx) {
            (VarKind::Argument, 0) if ctx == 0 => VarLocation::Frame(0),
            (VarKind::Argument, 0) if scope.has_context() => VarLocation::Inner(0),
            (VarKind::Argument, 0) => return None,
            (VarKind::Argument, idx) => *scope.arguments.get(idx as usize - 1)?,
            (VarKind::Local, idx) => *scope.locals.get(idx as usize)?,
        };
        match (location, ctx) {
            (VarLocation::Frame(slot), 0) => Some(VarAccess::ResolvedLocal(slot as u8)),
            (VarLocation::Inner(slot), 0) => Some(VarAccess::ResolvedInner(slot as u8)),
            (VarLocation::Inner(slot), level) => {
                Some(VarAccess::ResolvedOuter { idx: slot as u8, level })
            }
            (VarLocation::Frame(_), _) => None,
        }
    }
}
