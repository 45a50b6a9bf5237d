//! Built-in programs, assembled directly to bytecode.

use std::fmt;
use std::rc::Rc;

use object::{Class, Instance, LexicalScope, Value};

use crate::compile::{CompileError, MethodBuilder};
use crate::error::Unwind;
use crate::Universe;

pub const DISPATCH_ITERATIONS: i64 = 20_000;
pub const LOOP_ITERATIONS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Program {
    /// Recursive sum through a block, answers `true`.
    Sum,
    /// `1 to: 20000 do: [:i | cnt := cnt + (self method: i)]`.
    Dispatch,
    /// Inlined loops over locals and a field.
    Loop,
}

impl Program {
    /// Whether `value` is what the program answers when it works.
    pub fn is_expected(self, value: &Value) -> bool {
        match self {
            Program::Sum => matches!(value, Value::True),
            Program::Dispatch => value.as_integer() == Some(triangle(DISPATCH_ITERATIONS)),
            Program::Loop => value.as_integer() == Some(loop_result(LOOP_ITERATIONS)),
        }
    }

    pub fn define(self, u: &Universe) -> Result<Rc<Class>, CompileError> {
        match self {
            Program::Sum => sum_class(u),
            Program::Dispatch => dispatch_class(u, DISPATCH_ITERATIONS),
            Program::Loop => loop_class(u, LOOP_ITERATIONS),
        }
    }

    /// Instantiate the program class and send it `benchmark`.
    pub fn run(self, u: &Universe) -> Result<Value, ProgramError> {
        let class = self.define(u)?;
        let receiver = Value::Instance(Instance::new(&class));
        Ok(u.send(receiver, "benchmark", vec![])?)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Program::Sum => write!(f, "sum"),
            Program::Dispatch => write!(f, "dispatch"),
            Program::Loop => write!(f, "loop"),
        }
    }
}

#[derive(Debug)]
pub enum ProgramError {
    Compile(CompileError),
    Run(Unwind),
}

impl From<CompileError> for ProgramError {
    fn from(err: CompileError) -> Self {
        ProgramError::Compile(err)
    }
}

impl From<Unwind> for ProgramError {
    fn from(err: Unwind) -> Self {
        ProgramError::Run(err)
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Compile(err) => write!(f, "compile error: {err}"),
            ProgramError::Run(err) => write!(f, "runtime error: {err}"),
        }
    }
}

impl std::error::Error for ProgramError {}

pub fn triangle(n: i64) -> i64 {
    n * (n + 1) / 2
}

/// Answer of the loop program for `n` iterations.
pub fn loop_result(n: i64) -> i64 {
    triangle(n) + n + 1
}

fn plain_scope(arguments: &[bool], locals: &[bool]) -> Rc<LexicalScope> {
    LexicalScope::new(None, arguments, locals, false)
}

/// ```text
/// Sum = (
///   benchmark = ( ^ (self sum: 10) = 55 )
///   sum: n = ( ^ (n <= 1) ifTrue: 1 ifFalse: [ n + (self sum: n - 1) ] )
/// )
/// ```
pub fn sum_class(u: &Universe) -> Result<Rc<Class>, CompileError> {
    let class = u.define_class("Sum", &u.classes.object, &[]);

    // n and self are captured by the block
    let sum_scope = LexicalScope::new(None, &[true], &[], true);
    let mut block = MethodBuilder::block(u, LexicalScope::new(Some(sum_scope.clone()), &[], &[], false));
    block.code().push_argument(1, 1);
    block.code().push_argument(0, 1);
    block.code().push_argument(1, 1);
    block.code().push_1();
    block.send("-")?;
    block.send("sum:")?;
    block.send("+")?;
    block.code().return_local();
    let block = block.finish()?;

    let mut sum = MethodBuilder::method(u, "sum:", sum_scope);
    sum.code().push_argument(1, 0);
    sum.code().push_1();
    sum.send("<=")?;
    sum.code().push_1();
    sum.push_block(block)?;
    sum.send("ifTrue:ifFalse:")?;
    sum.code().return_local();
    class.add_method(sum.finish()?.into());

    let mut benchmark = MethodBuilder::method(u, "benchmark", plain_scope(&[], &[]));
    benchmark.code().push_argument(0, 0);
    benchmark.push_constant(Value::Integer(10))?;
    benchmark.send("sum:")?;
    benchmark.push_constant(Value::Integer(55))?;
    benchmark.send("=")?;
    benchmark.code().return_local();
    class.add_method(benchmark.finish()?.into());

    Ok(class)
}

/// ```text
/// Dispatch = (
///   benchmark = ( | cnt | cnt := 0.
///     1 to: n do: [ :i | cnt := cnt + (self method: i) ].
///     ^ cnt )
///   method: argument = ( ^ argument )
/// )
/// ```
///
/// The `to:do:` is inlined; `i` becomes a local of `benchmark`.
pub fn dispatch_class(u: &Universe, n: i64) -> Result<Rc<Class>, CompileError> {
    let class = u.define_class("Dispatch", &u.classes.object, &[]);

    let mut method = MethodBuilder::method(u, "method:", plain_scope(&[false], &[]));
    method.code().push_argument(1, 0);
    method.code().return_local();
    class.add_method(method.finish()?.into());

    let mut b = MethodBuilder::method(u, "benchmark", plain_scope(&[], &[false, false]));
    b.code().push_0();
    b.code().pop_local(0, 0);
    b.code().push_1();
    b.push_constant(Value::Integer(n))?;
    b.code().dup_second();
    let loop_top = b.code().current_offset();
    let exit = b.code().jump_if_greater();
    b.code().dup();
    b.code().pop_local(1, 0);
    b.code().push_local(0, 0);
    b.code().push_argument(0, 0);
    b.code().push_local(1, 0);
    b.send("method:")?;
    b.send("+")?;
    b.code().dup();
    b.code().pop_local(0, 0);
    b.code().pop();
    b.code().inc();
    b.code().jump_backward(loop_top);
    b.code().bind(exit);
    b.code().pop();
    b.code().push_local(0, 0);
    b.code().return_local();
    class.add_method(b.finish()?.into());

    Ok(class)
}

/// ```text
/// Loop = (
///   | counter |
///   benchmark = ( | sum | counter := 0. sum := 0.
///     1 to: n do: [ :i | sum := sum + i. counter := counter + 1 ].
///     ^ sum + (counter := counter + 1) + (self countdown: 10) )
///   countdown: k = ( [ k > 0 ] whileTrue: [ k := k - 1 ]. ^ k )
///   counter = ( ^ counter )
/// )
/// ```
pub fn loop_class(u: &Universe, n: i64) -> Result<Rc<Class>, CompileError> {
    let class = u.define_class("Loop", &u.classes.object, &["counter"]);

    let mut b = MethodBuilder::method(u, "benchmark", plain_scope(&[], &[false, false]));
    b.code().push_0();
    b.code().pop_field(0, 0);
    b.code().push_0();
    b.code().pop_local(0, 0);
    b.code().push_1();
    b.push_constant(Value::Integer(n))?;
    b.code().dup_second();
    let loop_top = b.code().current_offset();
    let exit = b.code().jump_if_greater();
    b.code().dup();
    b.code().pop_local(1, 0);
    b.code().push_local(0, 0);
    b.code().push_local(1, 0);
    b.send("+")?;
    b.code().pop_local(0, 0);
    b.code().inc_field(0, 0);
    b.code().inc();
    b.code().jump_backward(loop_top);
    b.code().bind(exit);
    b.code().pop();
    b.code().push_local(0, 0);
    b.code().inc_field_push(0, 0);
    b.send("+")?;
    b.code().push_argument(0, 0);
    b.push_constant(Value::Integer(10))?;
    b.send("countdown:")?;
    b.send("+")?;
    b.code().return_local();
    class.add_method(b.finish()?.into());

    let mut countdown = MethodBuilder::method(u, "countdown:", plain_scope(&[false], &[]));
    let loop_top = countdown.code().current_offset();
    countdown.code().push_argument(1, 0);
    countdown.code().push_0();
    countdown.send(">")?;
    let exit = countdown.code().jump_on_false_pop();
    countdown.code().push_argument(1, 0);
    countdown.code().dec();
    countdown.code().pop_argument(1, 0);
    countdown.code().jump_backward(loop_top);
    countdown.code().bind(exit);
    countdown.code().push_argument(1, 0);
    countdown.code().return_local();
    class.add_method(countdown.finish()?.into());

    let mut counter = MethodBuilder::method(u, "counter", plain_scope(&[], &[]));
    counter.code().return_field(0);
    class.add_method(counter.finish()?.into());

    Ok(class)
}
