use std::collections::HashMap;

/// Handle to an interned continuation list. `TStack::EMPTY` is the empty
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TStack(u32);

impl TStack {
    pub const EMPTY: TStack = TStack(0);

    pub fn is_empty(self) -> bool {
        self == TStack::EMPTY
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    offset: usize,
    parent: TStack,
}

/// Arena of immutable continuation lists of bytecode offsets.
///
/// Nodes are interned on `(offset, parent)`: pushing the same offset onto
/// the same list twice yields the same handle, so structurally equal
/// lists compare equal by handle.
pub struct TStackPool {
    nodes: Vec<Node>,
    interned: HashMap<(usize, TStack), TStack, ahash::RandomState>,
}

impl TStackPool {
    pub fn new() -> Self {
        Self {
            // slot 0 stands for the empty list
            nodes: vec![Node {
                offset: usize::MAX,
                parent: TStack::EMPTY,
            }],
            interned: HashMap::default(),
        }
    }

    pub fn push(&mut self, offset: usize, parent: TStack) -> TStack {
        if let Some(&existing) = self.interned.get(&(offset, parent)) {
            return existing;
        }
        let handle = TStack(self.nodes.len() as u32);
        self.nodes.push(Node { offset, parent });
        self.interned.insert((offset, parent), handle);
        handle
    }

    /// Head offset and the remaining list, or `None` for the empty list.
    pub fn pop(&self, stack: TStack) -> Option<(usize, TStack)> {
        if stack.is_empty() {
            return None;
        }
        let node = self.nodes[stack.0 as usize];
        Some((node.offset, node.parent))
    }

    /// Offsets from head to tail.
    pub fn offsets(&self, mut stack: TStack) -> Vec<usize> {
        let mut out = Vec::new();
        while let Some((offset, parent)) = self.pop(stack) {
            out.push(offset);
            stack = parent;
        }
        out
    }

    /// Number of interned lists, the empty one excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TStackPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_lists_share_a_handle() {
        let mut pool = TStackPool::new();
        let a = pool.push(4, TStack::EMPTY);
        let a = pool.push(9, a);
        let b = pool.push(4, TStack::EMPTY);
        let b = pool.push(9, b);
        assert_eq!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn pop_walks_head_first() {
        let mut pool = TStackPool::new();
        let mut stack = TStack::EMPTY;
        for offset in [1, 2, 3] {
            stack = pool.push(offset, stack);
        }
        assert_eq!(pool.offsets(stack), vec![3, 2, 1]);
        let (head, rest) = pool.pop(stack).unwrap();
        assert_eq!(head, 3);
        assert_eq!(pool.offsets(rest), vec![2, 1]);
        assert_eq!(pool.pop(TStack::EMPTY), None);
    }

    #[test]
    fn different_tails_are_distinct() {
        let mut pool = TStackPool::new();
        let one = pool.push(1, TStack::EMPTY);
        let two = pool.push(2, TStack::EMPTY);
        assert_ne!(pool.push(7, one), pool.push(7, two));
    }
}
