use std::rc::Rc;

use bytecode::Arity;
use object::{Class, Invokable, Method, Symbol, Value, lookup};

use crate::activation::Activation;
use crate::error::{RuntimeError, Unwind};
use crate::invoke::Invoke;
use crate::ops::Flow;
use crate::Universe;

fn selector_at(method: &Method, lit: u8) -> Result<Symbol, RuntimeError> {
    match method.literal(lit) {
        Some(Value::Symbol(selector)) => Ok(selector.clone()),
        Some(other) => Err(RuntimeError::type_error("selector", other)),
        None => Err(RuntimeError::type_error("selector", &Value::Nil)),
    }
}

/// Receiver-inclusive value count of a send.
fn value_count(method: &Method, lit: u8, arity: Arity) -> Result<usize, RuntimeError> {
    match arity.fixed() {
        Some(n) => Ok(n),
        None => Ok(selector_at(method, lit)?.arity()),
    }
}

/// `send_1/2/3/n`: look the selector up through the site's inline cache
/// and call the target with the receiver and arguments from the stack.
///
/// A receiver still laid out with a superseded shape is migrated first
/// and the send is retried, so caches only ever see current shapes.
pub fn send(
    u: &Universe,
    act: &mut Activation,
    at: usize,
    lit: u8,
    arity: Arity,
) -> Result<Flow, Unwind> {
    let method = act.method.clone();
    let selector = selector_at(&method, lit)?;
    let n = value_count(&method, lit, arity)?;
    let receiver = act.stack.peek(n - 1).clone();
    let site = method.site(at);
    if let Value::Instance(instance) = &receiver {
        if instance.is_layout_stale() {
            log::trace!("{}@{at}: migrating stale receiver", method.signature());
            instance.migrate_to_class_layout();
            site.cache().invalidate_stale();
            return Ok(Flow::Retry);
        }
    }
    let class = u.class_of(&receiver);
    site.record_receiver_class(&class);
    let shape = u.shape_of(&receiver, &class);
    let result = match lookup(&class, &shape, &selector, site.cache()) {
        Some(target) => invoke_from_stack(u, act, &target, n)?,
        None => not_understood(u, act, &class, selector, n)?,
    };
    act.stack.push(result);
    Ok(Flow::Next)
}

/// Threaded-code send: when the receiver has the class recorded for this
/// site and the shape of the primary cache entry, call that entry's
/// target without a lookup. Anything else goes through [`send`].
pub fn send_inlined(
    u: &Universe,
    act: &mut Activation,
    at: usize,
    lit: u8,
    arity: Arity,
) -> Result<Flow, Unwind> {
    let Some(n) = arity.fixed() else {
        return send(u, act, at, lit, arity);
    };
    let method = act.method.clone();
    let site = method.site(at);
    let (Some(expected), Some(entry)) = (site.receiver_class(), site.cache().primary()) else {
        return send(u, act, at, lit, arity);
    };
    let hit = {
        let receiver = act.stack.peek(n - 1);
        let class = u.class_of(receiver);
        let shape = u.shape_of(receiver, &class);
        Rc::ptr_eq(&expected, &class) && Rc::ptr_eq(&entry.shape, &shape) && shape.is_latest()
    };
    if !hit {
        return send(u, act, at, lit, arity);
    }
    let result = invoke_from_stack(u, act, &entry.target, n)?;
    act.stack.push(result);
    Ok(Flow::Next)
}

/// `q_super_send_*`: lookup starts at the superclass of the method's
/// holder, cached against the superclass layout.
pub fn quick_super_send(
    u: &Universe,
    act: &mut Activation,
    at: usize,
    lit: u8,
    arity: Arity,
) -> Result<Flow, Unwind> {
    let method = act.method.clone();
    let selector = selector_at(&method, lit)?;
    let n = value_count(&method, lit, arity)?;
    let holder = method.holder().ok_or(RuntimeError::TypeError {
        expected: "method with a holder",
        got: "detached method",
    })?;
    let result = match holder.superclass() {
        Some(superclass) => {
            let shape = superclass.instance_layout();
            match lookup(superclass, &shape, &selector, method.site(at).cache()) {
                Some(target) => invoke_from_stack(u, act, &target, n)?,
                None => not_understood(u, act, superclass, selector, n)?,
            }
        }
        None => not_understood(u, act, &holder, selector, n)?,
    };
    act.stack.push(result);
    Ok(Flow::Next)
}

/// Pop receiver and arguments and call `target` through the matching
/// arity-specialized entry point.
fn invoke_from_stack(
    u: &Universe,
    act: &mut Activation,
    target: &Invokable,
    n: usize,
) -> Result<Value, Unwind> {
    let stack = &mut act.stack;
    match n {
        1 => {
            let receiver = stack.pop();
            target.invoke_1(u, receiver)
        }
        2 => {
            let arg = stack.pop();
            let receiver = stack.pop();
            target.invoke_2(u, receiver, arg)
        }
        3 => {
            let arg2 = stack.pop();
            let arg1 = stack.pop();
            let receiver = stack.pop();
            target.invoke_3(u, receiver, arg1, arg2)
        }
        _ => {
            let args = stack.take(n - 1);
            let receiver = stack.pop();
            target.invoke_n(u, receiver, args)
        }
    }
}

fn not_understood(
    u: &Universe,
    act: &mut Activation,
    class: &Class,
    selector: Symbol,
    n: usize,
) -> Result<Value, Unwind> {
    let args = act.stack.take(n - 1);
    let receiver = act.stack.pop();
    does_not_understand(u, receiver, class, selector, args)
}

/// Substitute a failed send with
/// `receiver doesNotUnderstand: #selector arguments: args`.
pub fn does_not_understand(
    u: &Universe,
    receiver: Value,
    class: &Class,
    selector: Symbol,
    args: Vec<Value>,
) -> Result<Value, Unwind> {
    log::debug!("{receiver:?} does not understand #{selector}");
    let handler = class
        .lookup_invokable(&u.selectors.does_not_understand)
        .ok_or_else(|| RuntimeError::MissingHandler {
            selector: selector.to_string(),
            handler: "doesNotUnderstand:arguments:",
        })?;
    handler.invoke_3(u, receiver, Value::Symbol(selector), Value::new_array(args))
}

/// Uncached send used by primitives and engine-originated messages.
pub fn send_message(
    u: &Universe,
    receiver: Value,
    selector: &Symbol,
    args: Vec<Value>,
) -> Result<Value, Unwind> {
    if let Value::Instance(instance) = &receiver {
        if instance.is_layout_stale() {
            instance.migrate_to_class_layout();
        }
    }
    let class = u.class_of(&receiver);
    match class.lookup_invokable(selector) {
        Some(target) => target.invoke_n(u, receiver, args),
        None => does_not_understand(u, receiver, &class, selector.clone(), args),
    }
}

/// Whether the send at the current position would meet a receiver whose
/// shape has been superseded.
pub fn send_receiver_is_stale(act: &Activation, lit: u8, arity: Arity) -> bool {
    let Ok(n) = value_count(&act.method, lit, arity) else {
        return false;
    };
    if n == 0 || act.stack.depth() < n {
        return false;
    }
    matches!(act.stack.peek(n - 1), Value::Instance(instance) if instance.is_layout_stale())
}
