use std::mem;

use object::Value;

/// Operand stack of one activation.
///
/// The capacity comes from the method's static depth analysis and never
/// changes. Popped slots are reset to `nil` so they hold no references.
#[derive(Debug, Default)]
pub struct Stack {
    values: Box<[Value]>,
    sp: usize,
}

impl Stack {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![Value::Nil; capacity].into_boxed_slice(),
            sp: 0,
        }
    }

    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.sp
    }

    #[inline(always)]
    pub fn push(&mut self, value: Value) {
        self.values[self.sp] = value;
        self.sp += 1;
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Value {
        self.sp -= 1;
        mem::replace(&mut self.values[self.sp], Value::Nil)
    }

    #[inline(always)]
    pub fn top(&self) -> &Value {
        &self.values[self.sp - 1]
    }

    #[inline(always)]
    pub fn top_mut(&mut self) -> &mut Value {
        &mut self.values[self.sp - 1]
    }

    /// Value `n` slots below the top; `peek(0)` is the top.
    #[inline(always)]
    pub fn peek(&self, n: usize) -> &Value {
        &self.values[self.sp - 1 - n]
    }

    /// Pop the top `n` values, returned bottom-first.
    pub fn take(&mut self, n: usize) -> Vec<Value> {
        let start = self.sp - n;
        let taken = self.values[start..self.sp]
            .iter_mut()
            .map(|slot| mem::replace(slot, Value::Nil))
            .collect();
        self.sp = start;
        taken
    }

    pub fn drop_n(&mut self, n: usize) {
        for slot in &mut self.values[self.sp - n..self.sp] {
            *slot = Value::Nil;
        }
        self.sp -= n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(stack: &mut Stack) -> Vec<i64> {
        let depth = stack.depth();
        stack.take(depth).iter().filter_map(Value::as_integer).collect()
    }

    #[test]
    fn push_pop_and_peek() {
        let mut stack = Stack::new(3);
        stack.push(Value::Integer(1));
        stack.push(Value::Integer(2));
        assert_eq!(stack.peek(1).as_integer(), Some(1));
        assert_eq!(stack.pop().as_integer(), Some(2));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn take_keeps_original_order() {
        let mut stack = Stack::new(4);
        for i in 0..4 {
            stack.push(Value::Integer(i));
        }
        let taken: Vec<i64> = stack.take(2).iter().filter_map(Value::as_integer).collect();
        assert_eq!(taken, vec![2, 3]);
        assert_eq!(ints(&mut stack), vec![0, 1]);
    }
}
