use std::cell::{Cell, RefCell};
use std::fmt::{self, Write as _};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU32, Ordering};

use bytecode::{BytecodeDecoder, DecodeError, Instruction, decode_at};

use crate::class::Class;
use crate::lookup::InlineCache;
use crate::scope::{LexicalScope, VarLocation};
use crate::symbol::Symbol;
use crate::value::Value;

static NEXT_METHOD_ID: AtomicU32 = AtomicU32::new(0);

/// Process-unique method identity, used to key per-method VM caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    fn next() -> Self {
        MethodId(NEXT_METHOD_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Outcome of counting one back-edge execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    Cold,
    Hot,
}

/// Execution counter of one `jump_backward` site.
///
/// The threshold in force at the first decision is latched; changing the
/// configured threshold later does not affect this site.
#[derive(Debug, Default)]
pub struct BackEdge {
    count: Cell<u32>,
    threshold: Cell<Option<u32>>,
}

impl BackEdge {
    pub fn on_back_edge(&self, threshold: u32) -> EdgeState {
        let latched = match self.threshold.get() {
            Some(latched) => latched,
            None => {
                self.threshold.set(Some(threshold));
                threshold
            }
        };
        let count = self.count.get();
        if count > latched {
            EdgeState::Hot
        } else {
            self.count.set(count + 1);
            EdgeState::Cold
        }
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }

    pub fn latched_threshold(&self) -> Option<u32> {
        self.threshold.get()
    }

    /// Start counting again. The latched threshold stays.
    pub fn reset(&self) {
        self.count.set(0);
    }
}

/// Mutable execution state attached to one bytecode offset.
#[derive(Default)]
pub struct Site {
    patch: Cell<Option<Instruction>>,
    cache: InlineCache,
    back_edge: BackEdge,
    receiver_class: RefCell<Weak<Class>>,
}

impl Site {
    /// Instruction replacing the encoded one, once resolved or quickened.
    #[inline(always)]
    pub fn patched(&self) -> Option<Instruction> {
        self.patch.get()
    }

    pub fn cache(&self) -> &InlineCache {
        &self.cache
    }

    pub fn back_edge(&self) -> &BackEdge {
        &self.back_edge
    }

    /// Class of the receiver last seen at this send site.
    pub fn receiver_class(&self) -> Option<Rc<Class>> {
        self.receiver_class.borrow().upgrade()
    }

    pub fn record_receiver_class(&self, class: &Rc<Class>) {
        *self.receiver_class.borrow_mut() = Rc::downgrade(class);
    }
}

/// Everything needed to build a [`Method`].
pub struct MethodDesc {
    pub signature: Symbol,
    pub bytecode: Vec<u8>,
    pub literals: Vec<Value>,
    pub scope: Rc<LexicalScope>,
    pub max_stack_depth: usize,
    pub catches_non_local_return: bool,
    pub is_block: bool,
}

/// A compiled method or block body.
pub struct Method {
    id: MethodId,
    signature: Symbol,
    bytecode: Box<[u8]>,
    literals: Box<[Value]>,
    holder: RefCell<Weak<Class>>,
    scope: Rc<LexicalScope>,
    max_stack_depth: usize,
    catches_non_local_return: bool,
    is_block: bool,
    sites: Box<[Site]>,
    invocations: Cell<u32>,
}

impl Method {
    pub fn new(desc: MethodDesc) -> Rc<Self> {
        let sites = (0..desc.bytecode.len()).map(|_| Site::default()).collect();
        Rc::new(Self {
            id: MethodId::next(),
            signature: desc.signature,
            bytecode: desc.bytecode.into_boxed_slice(),
            literals: desc.literals.into_boxed_slice(),
            holder: RefCell::new(Weak::new()),
            scope: desc.scope,
            max_stack_depth: desc.max_stack_depth,
            catches_non_local_return: desc.catches_non_local_return,
            is_block: desc.is_block,
            sites,
            invocations: Cell::new(0),
        })
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    pub fn literal(&self, idx: u8) -> Option<&Value> {
        self.literals.get(idx as usize)
    }

    pub fn scope(&self) -> &Rc<LexicalScope> {
        &self.scope
    }

    /// Receiver-inclusive argument count.
    pub fn num_args(&self) -> usize {
        self.scope.arguments().len() + 1
    }

    pub fn frame_size(&self) -> usize {
        self.scope.frame_size()
    }

    pub fn inner_size(&self) -> usize {
        self.scope.inner_size()
    }

    /// Where each argument (receiver excluded) is stored on activation.
    pub fn argument_locations(&self) -> &[VarLocation] {
        self.scope.arguments()
    }

    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    pub fn catches_non_local_return(&self) -> bool {
        self.catches_non_local_return
    }

    pub fn is_block(&self) -> bool {
        self.is_block
    }

    pub fn holder(&self) -> Option<Rc<Class>> {
        self.holder.borrow().upgrade()
    }

    /// Attach this method and every block method nested in its literals to
    /// `class`.
    pub fn set_holder(&self, class: &Rc<Class>) {
        *self.holder.borrow_mut() = Rc::downgrade(class);
        for literal in self.literals.iter() {
            if let Value::Method(block) = literal {
                if block.is_block() {
                    block.set_holder(class);
                }
            }
        }
    }

    /// Decode the instruction at `offset`, honoring any patch recorded for
    /// that site. The length is always that of the encoded instruction.
    #[inline]
    pub fn instruction_at(
        &self,
        offset: usize,
    ) -> Result<(Instruction, usize), DecodeError> {
        let (decoded, len) = decode_at(&self.bytecode, offset)?;
        match self.sites[offset].patched() {
            Some(patched) => Ok((patched, len)),
            None => Ok((decoded, len)),
        }
    }

    /// Replace the instruction at `offset` for every later execution.
    /// Writing the same resolution twice is harmless.
    pub fn patch(&self, offset: usize, instruction: Instruction) {
        self.sites[offset].patch.set(Some(instruction));
    }

    #[inline(always)]
    pub fn site(&self, offset: usize) -> &Site {
        &self.sites[offset]
    }

    /// Count one activation and return the new total.
    pub fn record_invocation(&self) -> u32 {
        let count = self.invocations.get().saturating_add(1);
        self.invocations.set(count);
        count
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.get()
    }

    pub fn reset_back_edges(&self) {
        for site in self.sites.iter() {
            site.back_edge.reset();
        }
    }

    /// Human-readable listing: one line per instruction, patches shown
    /// after the encoded form.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} ({} args, frame {}, inner {}, stack {})",
            self.signature,
            self.num_args(),
            self.frame_size(),
            self.inner_size(),
            self.max_stack_depth
        );
        for item in BytecodeDecoder::new(&self.bytecode) {
            match item {
                Ok((offset, instruction)) => {
                    let _ = write!(out, "  {offset:4}: {instruction}");
                    if let Some(patched) = self.sites[offset].patched() {
                        let _ = write!(out, "  => {patched}");
                    }
                    if let Some(target) = instruction.jump_target(offset) {
                        let _ = write!(out, "  (to {target})");
                    }
                    out.push('\n');
                }
                Err(err) => {
                    let _ = writeln!(out, "  <{err}>");
                }
            }
        }
        for (idx, literal) in self.literals.iter().enumerate() {
            let _ = writeln!(out, "  #{idx}: {literal:?}");
        }
        out
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("len", &self.bytecode.len())
            .field("is_block", &self.is_block)
            .finish_non_exhaustive()
    }
}
