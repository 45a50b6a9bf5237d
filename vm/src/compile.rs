use std::fmt;
use std::rc::Rc;

use bytecode::{BytecodeBuilder, StackCheckError, analyze};
use object::{LexicalScope, Method, MethodDesc, Symbol, Value};

use crate::Universe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    StackCheck(StackCheckError),
    /// The method catches non-local returns but its scope has no context
    /// for them to target.
    MissingContext { signature: String },
    TooManyLiterals { signature: String },
}

impl From<StackCheckError> for CompileError {
    fn from(err: StackCheckError) -> Self {
        CompileError::StackCheck(err)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::StackCheck(err) => write!(f, "{err}"),
            CompileError::MissingContext { signature } => {
                write!(f, "{signature} catches non-local returns but has no context")
            }
            CompileError::TooManyLiterals { signature } => {
                write!(f, "{signature} has more than 256 literals")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Assembles one method or block: bytecode, literal table and scope.
///
/// `finish` runs the stack-depth analysis, so every method handed to the
/// engine has a well-formed operand stack.
pub struct MethodBuilder<'u> {
    universe: &'u Universe,
    signature: Symbol,
    scope: Rc<LexicalScope>,
    code: BytecodeBuilder,
    literals: Vec<Value>,
    catches_non_local_return: bool,
    is_block: bool,
}

impl<'u> MethodBuilder<'u> {
    pub fn method(universe: &'u Universe, selector: &str, scope: Rc<LexicalScope>) -> Self {
        Self {
            universe,
            signature: universe.intern(selector),
            scope,
            code: BytecodeBuilder::new(),
            literals: Vec::new(),
            catches_non_local_return: false,
            is_block: false,
        }
    }

    pub fn block(universe: &'u Universe, scope: Rc<LexicalScope>) -> Self {
        let arity = scope.arguments().len();
        let signature = match arity {
            0 => "value".to_string(),
            n => "value:".repeat(n),
        };
        Self {
            is_block: true,
            ..Self::method(universe, &signature, scope)
        }
    }

    /// Mark the method as the home of non-local returns from its blocks.
    pub fn catches_non_local_return(mut self) -> Self {
        self.catches_non_local_return = true;
        self
    }

    pub fn code(&mut self) -> &mut BytecodeBuilder {
        &mut self.code
    }

    /// Index of `value` in the literal table, adding it if needed.
    pub fn literal(&mut self, value: Value) -> Result<u8, CompileError> {
        if let Some(idx) = self.literals.iter().position(|lit| lit.identical(&value)) {
            return Ok(idx as u8);
        }
        let idx = u8::try_from(self.literals.len()).map_err(|_| CompileError::TooManyLiterals {
            signature: self.signature.to_string(),
        })?;
        self.literals.push(value);
        Ok(idx)
    }

    pub fn symbol(&mut self, name: &str) -> Result<u8, CompileError> {
        let symbol = self.universe.intern(name);
        self.literal(Value::Symbol(symbol))
    }

    pub fn push_constant(&mut self, value: Value) -> Result<(), CompileError> {
        let lit = self.literal(value)?;
        self.code.push_constant(lit);
        Ok(())
    }

    pub fn push_global(&mut self, name: &str) -> Result<(), CompileError> {
        let lit = self.symbol(name)?;
        self.code.push_global(lit);
        Ok(())
    }

    pub fn push_block(&mut self, block: Rc<Method>) -> Result<(), CompileError> {
        let lit = self.literal(Value::Method(block))?;
        self.code.push_block(lit);
        Ok(())
    }

    pub fn send(&mut self, selector: &str) -> Result<(), CompileError> {
        let lit = self.symbol(selector)?;
        let arity = self.universe.intern(selector).arity();
        self.code.send(lit, arity);
        Ok(())
    }

    pub fn super_send(&mut self, selector: &str) -> Result<(), CompileError> {
        let lit = self.symbol(selector)?;
        self.code.super_send(lit);
        Ok(())
    }

    pub fn finish(self) -> Result<Rc<Method>, CompileError> {
        if self.catches_non_local_return && !self.scope.has_context() {
            return Err(CompileError::MissingContext {
                signature: self.signature.to_string(),
            });
        }
        let literals = &self.literals;
        let depths = analyze(self.code.as_bytes(), |lit| match literals.get(lit as usize) {
            Some(Value::Symbol(selector)) => selector.arity(),
            _ => 1,
        })?;
        Ok(Method::new(MethodDesc {
            signature: self.signature,
            bytecode: self.code.into_bytes(),
            literals: self.literals,
            scope: self.scope,
            max_stack_depth: depths.max_depth(),
            catches_non_local_return: self.catches_non_local_return,
            is_block: self.is_block,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(arguments: &[bool], locals: &[bool]) -> Rc<LexicalScope> {
        LexicalScope::new(None, arguments, locals, false)
    }

    #[test]
    fn literals_are_shared() {
        let u = Universe::default();
        let mut b = MethodBuilder::method(&u, "foo", scope(&[], &[]));
        let first = b.symbol("bar").unwrap();
        assert_eq!(b.symbol("bar").unwrap(), first);
        assert_ne!(b.literal(Value::Integer(3)).unwrap(), first);
    }

    #[test]
    fn finish_sizes_the_stack() {
        let u = Universe::default();
        let mut b = MethodBuilder::method(&u, "at:put:", scope(&[false, false], &[]));
        b.code().push_argument(0, 0);
        b.code().push_argument(1, 0);
        b.code().push_argument(2, 0);
        b.send("at:put:").unwrap();
        b.code().return_local();
        let method = b.finish().unwrap();
        assert_eq!(method.max_stack_depth(), 3);
        assert_eq!(method.num_args(), 3);
    }

    #[test]
    fn unbalanced_code_is_rejected() {
        let u = Universe::default();
        let mut b = MethodBuilder::method(&u, "broken", scope(&[], &[]));
        b.code().push_nil();
        b.send("+").unwrap();
        b.code().return_local();
        assert!(matches!(b.finish(), Err(CompileError::StackCheck(_))));
    }

    #[test]
    fn non_local_return_home_needs_a_context() {
        let u = Universe::default();
        let mut b = MethodBuilder::method(&u, "home", scope(&[], &[])).catches_non_local_return();
        b.code().return_self();
        assert!(matches!(b.finish(), Err(CompileError::MissingContext { .. })));
    }
}
