use std::fmt;
use std::rc::Rc;

use bytecode::DecodeError;
use object::{Context, Method, Value};

/// Fatal engine errors. None of these are recoverable from inside the
/// running program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    UnknownBytecode {
        byte: u8,
        offset: usize,
        method: String,
        dump: String,
    },
    UnresolvedVariable {
        method: String,
        offset: usize,
    },
    NotYetImplemented {
        operation: &'static str,
        kind: &'static str,
    },
    MessageNotUnderstood {
        selector: String,
        receiver: String,
    },
    MissingHandler {
        selector: String,
        handler: &'static str,
    },
    UndefinedGlobal {
        name: String,
    },
    TypeError {
        expected: &'static str,
        got: &'static str,
    },
    ArityMismatch {
        expected: usize,
        got: usize,
    },
    DivisionByZero,
    StackOverflow {
        depth: usize,
    },
    IndexOutOfBounds {
        index: i64,
        len: usize,
    },
    UnhandledNonLocalReturn,
}

impl RuntimeError {
    /// Diagnostic for an instruction stream that cannot be decoded.
    pub fn bad_bytecode(method: &Method, err: DecodeError) -> Self {
        let (byte, offset) = match err {
            DecodeError::UnknownOpcode { byte, offset } => (byte, offset),
            DecodeError::OutOfBounds { offset } => (0, offset),
            DecodeError::Truncated { offset, .. } => {
                (method.bytecode().get(offset).copied().unwrap_or(0), offset)
            }
        };
        RuntimeError::UnknownBytecode {
            byte,
            offset,
            method: method.signature().to_string(),
            dump: method.disassemble(),
        }
    }

    pub fn type_error(expected: &'static str, got: &Value) -> Self {
        RuntimeError::TypeError {
            expected,
            got: got.kind_name(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnknownBytecode {
                byte,
                offset,
                method,
                dump,
            } => write!(
                f,
                "unknown bytecode {byte:#04x} at {offset} in {method}\n{dump}"
            ),
            RuntimeError::UnresolvedVariable { method, offset } => {
                write!(f, "variable access at {offset} in {method} does not resolve")
            }
            RuntimeError::NotYetImplemented { operation, kind } => {
                write!(f, "{operation} is not implemented for {kind}")
            }
            RuntimeError::MessageNotUnderstood { selector, receiver } => {
                write!(f, "{receiver} does not understand #{selector}")
            }
            RuntimeError::MissingHandler { selector, handler } => {
                write!(f, "no {handler} handler while sending #{selector}")
            }
            RuntimeError::UndefinedGlobal { name } => {
                write!(f, "undefined global {name}")
            }
            RuntimeError::TypeError { expected, got } => {
                write!(f, "type error: expected {expected}, got {got}")
            }
            RuntimeError::ArityMismatch { expected, got } => {
                write!(f, "block expects {expected} values, got {got}")
            }
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::StackOverflow { depth } => {
                write!(f, "stack overflow at depth {depth}")
            }
            RuntimeError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            RuntimeError::UnhandledNonLocalReturn => {
                write!(f, "non-local return from a block whose home has returned")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Anything that leaves an activation other than a plain return value.
#[derive(Debug, Clone)]
pub enum Unwind {
    /// `^value` from a block; caught by the activation owning `target`.
    NonLocalReturn { value: Value, target: Rc<Context> },
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

impl fmt::Display for Unwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unwind::NonLocalReturn { value, .. } => {
                write!(f, "non-local return of {value:?} escaped its home")
            }
            Unwind::Error(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Unwind {}
