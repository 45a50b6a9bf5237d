use std::rc::Rc;

use bytecode::{BytecodeDecoder, Instruction, analyze};
use object::{Class, Instance, Invokable, LexicalScope, Method, Value};
use vm::error::{RuntimeError, Unwind};
use vm::programs::{self, Program, ProgramError};
use vm::tiers::{TierConfig, TierMode};
use vm::{MethodBuilder, Universe};

const TIERS: [TierMode; 3] = [TierMode::Threaded, TierMode::Tracing, TierMode::Hybrid];

fn universe(mode: TierMode) -> Universe {
    Universe::new(TierConfig::new(mode).with_hybrid_threshold(10))
}

fn scope(arguments: &[bool], locals: &[bool]) -> Rc<LexicalScope> {
    LexicalScope::new(None, arguments, locals, false)
}

fn instance(class: &Rc<Class>) -> Value {
    Value::Instance(Instance::new(class))
}

fn method_of(u: &Universe, class: &Class, selector: &str) -> Rc<Method> {
    match class.local_method(&u.intern(selector)) {
        Some(Invokable::Method(method)) => method,
        other => panic!("no method {selector}: {other:?}"),
    }
}

fn offsets_of(method: &Method, wanted: impl Fn(Instruction) -> bool) -> Vec<usize> {
    BytecodeDecoder::new(method.bytecode())
        .map(|item| item.expect("decodable"))
        .filter(|&(_, instruction)| wanted(instruction))
        .map(|(offset, _)| offset)
        .collect()
}

// ── end-to-end programs ───────────────────────────────────────────

#[test]
fn sum_is_true_in_every_tier() {
    for mode in TIERS {
        let u = universe(mode);
        let value = Program::Sum.run(&u).unwrap();
        assert!(matches!(value, Value::True), "{mode}: {value:?}");
        assert_eq!(u.depth(), 0);
    }
}

#[test]
fn dispatch_answers_the_same_with_and_without_tier_shift() {
    let threaded = universe(TierMode::Threaded);
    let plain = Program::Dispatch.run(&threaded).unwrap();
    assert_eq!(plain.as_integer(), Some(200_010_000));
    assert_eq!(threaded.transfers().to_tier2, 0);

    let hybrid = universe(TierMode::Hybrid);
    let shifted = Program::Dispatch.run(&hybrid).unwrap();
    assert_eq!(shifted.as_integer(), plain.as_integer());
    assert_eq!(hybrid.transfers().to_tier2, 1);

    let tracing = universe(TierMode::Tracing);
    let traced = Program::Dispatch.run(&tracing).unwrap();
    assert_eq!(traced.as_integer(), plain.as_integer());
}

#[test]
fn hybrid_below_the_threshold_stays_in_tier_one() {
    let u = Universe::new(TierConfig::new(TierMode::Hybrid).with_hybrid_threshold(1_000));
    let class = programs::dispatch_class(&u, 100).unwrap();
    let value = u.send(instance(&class), "benchmark", vec![]).unwrap();
    assert_eq!(value.as_integer(), Some(programs::triangle(100)));
    assert_eq!(u.transfers().to_tier2, 0);
}

#[test]
fn loop_program_in_every_tier() {
    for mode in TIERS {
        let u = universe(mode);
        let value = Program::Loop.run(&u).unwrap();
        assert!(Program::Loop.is_expected(&value), "{mode}: {value:?}");
    }
}

#[test]
fn warm_methods_get_the_same_answer_from_threaded_code() {
    let u = Universe::new(TierConfig::new(TierMode::Threaded).with_warm_threshold(0));
    for _ in 0..3 {
        let value = Program::Sum.run(&u).unwrap();
        assert!(matches!(value, Value::True));
    }
}

// ── stack discipline ──────────────────────────────────────────────

#[test]
fn every_program_method_returns_with_a_balanced_stack() {
    let u = Universe::default();
    for program in [Program::Sum, Program::Dispatch, Program::Loop] {
        let class = program.define(&u).unwrap();
        let mut methods: Vec<Rc<Method>> = class
            .local_methods()
            .into_iter()
            .filter_map(|invokable| match invokable {
                Invokable::Method(method) => Some(method),
                Invokable::Primitive(_) => None,
            })
            .collect();
        let nested: Vec<Rc<Method>> = methods
            .iter()
            .flat_map(|method| method.literals().to_vec())
            .filter_map(|literal| match literal {
                Value::Method(block) => Some(block),
                _ => None,
            })
            .collect();
        methods.extend(nested);

        for method in methods {
            let depths = analyze(method.bytecode(), |lit| match method.literal(lit) {
                Some(Value::Symbol(selector)) => selector.arity(),
                _ => 1,
            })
            .unwrap();
            assert_eq!(depths.max_depth(), method.max_stack_depth());
            for item in BytecodeDecoder::new(method.bytecode()) {
                let (offset, instruction) = item.unwrap();
                let expected = match instruction {
                    Instruction::ReturnLocal | Instruction::ReturnNonLocal { .. } => 1,
                    Instruction::ReturnSelf | Instruction::ReturnField { .. } => 0,
                    _ => continue,
                };
                assert_eq!(
                    depths.depth_before(offset),
                    Some(expected),
                    "{} at {offset}",
                    method.signature()
                );
            }
        }
    }
}

#[test]
fn deep_recursion_overflows_cleanly() {
    let u = Universe::new(TierConfig::default().with_max_depth(5));
    let result = Program::Sum.run(&u);
    assert!(matches!(
        result,
        Err(ProgramError::Run(Unwind::Error(RuntimeError::StackOverflow { .. })))
    ));
    assert_eq!(u.depth(), 0);
}

// ── non-local return ──────────────────────────────────────────────

/// `run = ( [ [ [ ^ 42 ] value ] value ] value. ^ 0 )`
fn nested_return_class(u: &Universe) -> Rc<Class> {
    let class = u.define_class("Nested", &u.classes.object, &[]);
    let run_scope = LexicalScope::new(None, &[], &[], true);
    let scope1 = LexicalScope::new(Some(run_scope.clone()), &[], &[], true);
    let scope2 = LexicalScope::new(Some(scope1.clone()), &[], &[], true);
    let scope3 = LexicalScope::new(Some(scope2.clone()), &[], &[], false);

    let mut b3 = MethodBuilder::block(u, scope3);
    b3.push_constant(Value::Integer(42)).unwrap();
    b3.code().return_non_local(3);
    let b3 = b3.finish().unwrap();

    let mut b2 = MethodBuilder::block(u, scope2);
    b2.push_block(b3).unwrap();
    b2.send("value").unwrap();
    b2.code().return_local();
    let b2 = b2.finish().unwrap();

    let mut b1 = MethodBuilder::block(u, scope1);
    b1.push_block(b2).unwrap();
    b1.send("value").unwrap();
    b1.code().return_local();
    let b1 = b1.finish().unwrap();

    let mut run = MethodBuilder::method(u, "run", run_scope).catches_non_local_return();
    run.push_block(b1).unwrap();
    run.send("value").unwrap();
    run.code().pop();
    run.push_constant(Value::Integer(0)).unwrap();
    run.code().return_local();
    class.add_method(run.finish().unwrap().into());
    class
}

#[test]
fn non_local_return_unwinds_three_blocks() {
    for mode in TIERS {
        let u = universe(mode);
        let class = nested_return_class(&u);
        let value = u.send(instance(&class), "run", vec![]).unwrap();
        assert_eq!(value.as_integer(), Some(42), "{mode}");
        assert_eq!(u.depth(), 0);
    }
}

/// `makeBlock = ( ^ [ ^ 7 ] )`, optionally with
/// `escapedBlock: block = ( ^ block )`.
fn escaper_class(u: &Universe, handles_escape: bool) -> Rc<Class> {
    let class = u.define_class("Escaper", &u.classes.object, &[]);
    let home = LexicalScope::new(None, &[], &[], true);

    let mut block = MethodBuilder::block(u, LexicalScope::new(Some(home.clone()), &[], &[], false));
    block.push_constant(Value::Integer(7)).unwrap();
    block.code().return_non_local(1);
    let block = block.finish().unwrap();

    let mut make = MethodBuilder::method(u, "makeBlock", home).catches_non_local_return();
    make.push_block(block).unwrap();
    make.code().return_local();
    class.add_method(make.finish().unwrap().into());

    if handles_escape {
        let mut handler = MethodBuilder::method(u, "escapedBlock:", scope(&[false], &[]));
        handler.code().push_argument(1, 0);
        handler.code().return_local();
        class.add_method(handler.finish().unwrap().into());
    }
    class
}

#[test]
fn escaped_block_is_reported_to_its_home_receiver() {
    let u = universe(TierMode::Threaded);
    let class = escaper_class(&u, true);
    let block = u.send(instance(&class), "makeBlock", vec![]).unwrap();
    assert!(matches!(block, Value::Block(_)));
    let value = u.send(block.clone(), "value", vec![]).unwrap();
    assert!(value.identical(&block));
}

#[test]
fn unhandled_escaped_block_is_fatal() {
    let u = universe(TierMode::Tracing);
    let class = escaper_class(&u, false);
    let block = u.send(instance(&class), "makeBlock", vec![]).unwrap();
    let result = u.send(block, "value", vec![]);
    assert!(matches!(
        result,
        Err(Unwind::Error(RuntimeError::UnhandledNonLocalReturn))
    ));
}

#[test]
fn live_home_takes_the_non_local_return() {
    // blockHome = ( [ ^ 7 ] value. ^ 0 )
    let u = universe(TierMode::Threaded);
    let class = u.define_class("Home", &u.classes.object, &[]);
    let home = LexicalScope::new(None, &[], &[], true);
    let mut block = MethodBuilder::block(&u, LexicalScope::new(Some(home.clone()), &[], &[], false));
    block.push_constant(Value::Integer(7)).unwrap();
    block.code().return_non_local(1);
    let block = block.finish().unwrap();
    let mut method = MethodBuilder::method(&u, "blockHome", home).catches_non_local_return();
    method.push_block(block).unwrap();
    method.send("value").unwrap();
    method.code().pop();
    method.code().push_0();
    method.code().return_local();
    class.add_method(method.finish().unwrap().into());

    let value = u.send(instance(&class), "blockHome", vec![]).unwrap();
    assert_eq!(value.as_integer(), Some(7));
}

// ── message substitution ──────────────────────────────────────────

/// `caller = ( ^ self foo: 1 bar: 2 baz: 3 )` plus a
/// `doesNotUnderstand:arguments:` that records the selector and answers
/// the arguments.
fn recorder_class(u: &Universe) -> Rc<Class> {
    let class = u.define_class("Recorder", &u.classes.object, &["selector"]);

    let mut dnu = MethodBuilder::method(u, "doesNotUnderstand:arguments:", scope(&[false, false], &[]));
    dnu.code().push_argument(1, 0);
    dnu.code().pop_field(0, 0);
    dnu.code().push_argument(2, 0);
    dnu.code().return_local();
    class.add_method(dnu.finish().unwrap().into());

    let mut caller = MethodBuilder::method(u, "caller", scope(&[], &[]));
    caller.code().push_argument(0, 0);
    caller.code().push_1();
    caller.push_constant(Value::Integer(2)).unwrap();
    caller.push_constant(Value::Integer(3)).unwrap();
    caller.send("foo:bar:baz:").unwrap();
    caller.code().return_local();
    class.add_method(caller.finish().unwrap().into());

    let mut selector = MethodBuilder::method(u, "lastSelector", scope(&[], &[]));
    selector.code().return_field(0);
    class.add_method(selector.finish().unwrap().into());
    class
}

fn integers(value: &Value) -> Vec<i64> {
    match value {
        Value::Array(values) => values
            .borrow()
            .iter()
            .map(|value| value.as_integer().expect("integer element"))
            .collect(),
        other => panic!("not an array: {other:?}"),
    }
}

#[test]
fn does_not_understand_gets_the_arguments_in_order() {
    for mode in TIERS {
        let u = universe(mode);
        let recorder = instance(&recorder_class(&u));
        let args = u.send(recorder.clone(), "caller", vec![]).unwrap();
        assert_eq!(integers(&args), vec![1, 2, 3], "{mode}");
        let selector = u.send(recorder, "lastSelector", vec![]).unwrap();
        assert_eq!(selector.to_string(), "foo:bar:baz:");
    }
}

#[test]
fn uncached_sends_substitute_too() {
    let u = universe(TierMode::Threaded);
    let recorder = instance(&recorder_class(&u));
    let args = u
        .send(recorder, "at:put:", vec![Value::Integer(5), Value::Integer(6)])
        .unwrap();
    assert_eq!(integers(&args), vec![5, 6]);
}

#[test]
fn default_handler_reports_the_selector() {
    let u = universe(TierMode::Threaded);
    let result = u.send(Value::Integer(3), "frobnicate", vec![]);
    match result {
        Err(Unwind::Error(RuntimeError::MessageNotUnderstood { selector, receiver })) => {
            assert_eq!(selector, "frobnicate");
            assert_eq!(receiver, "3");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_handler_is_fatal() {
    let u = universe(TierMode::Threaded);
    let root = Class::new(u.intern("Root"), None, vec![]);
    let result = u.send(instance(&root), "anything", vec![]);
    assert!(matches!(
        result,
        Err(Unwind::Error(RuntimeError::MissingHandler { .. }))
    ));
}

#[test]
fn unknown_globals_are_sent_to_self() {
    let u = universe(TierMode::Threaded);
    let class = u.define_class("Globals", &u.classes.object, &[]);
    let mut lookup = MethodBuilder::method(&u, "lookup", scope(&[], &[]));
    lookup.push_global("Zork").unwrap();
    lookup.code().return_local();
    class.add_method(lookup.finish().unwrap().into());
    let mut known = MethodBuilder::method(&u, "known", scope(&[], &[]));
    known.push_global("Integer").unwrap();
    known.code().return_local();
    class.add_method(known.finish().unwrap().into());

    let receiver = instance(&class);
    let integer = u.send(receiver.clone(), "known", vec![]).unwrap();
    assert!(matches!(integer, Value::Class(class) if class.name().as_str() == "Integer"));
    assert!(matches!(
        u.send(receiver.clone(), "lookup", vec![]),
        Err(Unwind::Error(RuntimeError::UndefinedGlobal { name })) if name == "Zork"
    ));

    let mut handler = MethodBuilder::method(&u, "unknownGlobal:", scope(&[false], &[]));
    handler.code().push_argument(1, 0);
    handler.code().return_local();
    class.add_method(handler.finish().unwrap().into());
    let name = u.send(receiver, "lookup", vec![]).unwrap();
    assert_eq!(name.to_string(), "Zork");
}

// ── dispatch ──────────────────────────────────────────────────────

fn constant_method(u: &Universe, class: &Rc<Class>, selector: &str, value: i64) {
    let mut b = MethodBuilder::method(u, selector, scope(&[], &[]));
    b.push_constant(Value::Integer(value)).unwrap();
    b.code().return_local();
    class.add_method(b.finish().unwrap().into());
}

#[test]
fn send_site_keeps_its_first_shape() {
    let u = universe(TierMode::Threaded);
    let a = u.define_class("A", &u.classes.object, &[]);
    let b = u.define_class("B", &u.classes.object, &[]);
    constant_method(&u, &a, "tag", 1);
    constant_method(&u, &b, "tag", 2);

    let driver = u.define_class("Driver", &u.classes.object, &[]);
    let mut poly = MethodBuilder::method(&u, "poly:", scope(&[false], &[]));
    poly.code().push_argument(1, 0);
    poly.send("tag").unwrap();
    poly.code().return_local();
    class_add(&driver, poly.finish().unwrap());

    let receiver = instance(&driver);
    let (a1, b1) = (instance(&a), instance(&b));
    let mut seen = Vec::new();
    for arg in [&a1, &a1, &b1, &a1] {
        let value = u.send(receiver.clone(), "poly:", vec![arg.clone()]).unwrap();
        seen.push(value.as_integer().unwrap());
    }
    assert_eq!(seen, vec![1, 1, 2, 1]);

    let method = method_of(&u, &driver, "poly:");
    let send_at = offsets_of(&method, |i| matches!(i, Instruction::Send { .. }))[0];
    let cache = method.site(send_at).cache();
    let primary = cache.primary().unwrap();
    let secondary = cache.secondary().unwrap();
    assert!(Rc::ptr_eq(&primary.shape, &a.instance_layout()));
    assert!(Rc::ptr_eq(&secondary.shape, &b.instance_layout()));
}

/// `poke: o = ( ^ o setX: 1 )` where each `setX:` writes field 0, so the
/// class shape moves on during the first send to each class.
#[test]
fn send_site_drops_shapes_its_callees_superseded() {
    for mode in TIERS {
        let u = universe(mode);
        let make = |name: &str| {
            let class = u.define_class(name, &u.classes.object, &["x"]);
            let mut setter = MethodBuilder::method(&u, "setX:", scope(&[false], &[]));
            setter.code().push_argument(1, 0);
            setter.code().pop_field(0, 0);
            setter.code().return_self();
            class_add(&class, setter.finish().unwrap());
            class
        };
        let (p, q) = (make("P"), make("Q"));

        let driver = u.define_class("Poker", &u.classes.object, &[]);
        let mut poke = MethodBuilder::method(&u, "poke:", scope(&[false], &[]));
        poke.code().push_argument(1, 0);
        poke.code().push_1();
        poke.send("setX:").unwrap();
        poke.code().return_local();
        class_add(&driver, poke.finish().unwrap());

        let receiver = instance(&driver);
        let (p1, q1) = (instance(&p), instance(&q));
        for arg in [&p1, &q1, &p1, &q1, &p1, &q1] {
            let value = u.send(receiver.clone(), "poke:", vec![arg.clone()]).unwrap();
            assert!(value.identical(arg));
        }

        let method = method_of(&u, &driver, "poke:");
        let send_at = offsets_of(&method, |i| matches!(i, Instruction::Send { .. }))[0];
        let cache = method.site(send_at).cache();
        let primary = cache.primary().unwrap();
        let secondary = cache.secondary().unwrap();
        assert!(primary.shape.is_latest(), "{mode}");
        assert!(Rc::ptr_eq(&primary.shape, &p.instance_layout()), "{mode}");
        assert!(Rc::ptr_eq(&secondary.shape, &q.instance_layout()), "{mode}");
    }
}

fn class_add(class: &Rc<Class>, method: Rc<Method>) {
    class.add_method(method.into());
}

#[test]
fn super_sends_are_quickened() {
    for mode in TIERS {
        let u = universe(mode);
        let base = u.define_class("Base", &u.classes.object, &[]);
        let derived = u.define_class("Derived", &base, &[]);
        constant_method(&u, &base, "describe", 1);
        let mut describe = MethodBuilder::method(&u, "describe", scope(&[], &[]));
        describe.code().push_argument(0, 0);
        describe.super_send("describe").unwrap();
        describe.push_constant(Value::Integer(10)).unwrap();
        describe.send("+").unwrap();
        describe.code().return_local();
        class_add(&derived, describe.finish().unwrap());

        let value = u.send(instance(&derived), "describe", vec![]).unwrap();
        assert_eq!(value.as_integer(), Some(11), "{mode}");

        let method = method_of(&u, &derived, "describe");
        let at = offsets_of(&method, |i| matches!(i, Instruction::SuperSend { .. }))[0];
        let (patched, _) = method.instruction_at(at).unwrap();
        assert!(matches!(patched, Instruction::QuickSuperSend { .. }), "{patched}");
        assert!(method.disassemble().contains("q_super_send_1"));
    }
}

#[test]
fn variable_accesses_are_patched_once_resolved() {
    let u = universe(TierMode::Threaded);
    let class = programs::dispatch_class(&u, 3).unwrap();
    u.send(instance(&class), "benchmark", vec![]).unwrap();
    let method = method_of(&u, &class, "benchmark");
    for at in offsets_of(&method, Instruction::is_unresolved_access) {
        let (instruction, _) = method.instruction_at(at).unwrap();
        assert!(!instruction.is_unresolved_access(), "{at}: {instruction}");
    }
}

// ── blocks and primitives ─────────────────────────────────────────

/// `total = ( | sum | sum := 0. 1 to: 4 do: [ :i | sum := sum + i ]. ^ sum )`
/// with the `to:do:` left to the primitive.
#[test]
fn primitive_loops_call_back_into_blocks() {
    for mode in TIERS {
        let u = universe(mode);
        let class = u.define_class("Totals", &u.classes.object, &[]);
        let total_scope = LexicalScope::new(None, &[], &[true], false);
        let mut block = MethodBuilder::block(&u, LexicalScope::new(Some(total_scope.clone()), &[false], &[], false));
        block.code().push_local(0, 1);
        block.code().push_argument(1, 0);
        block.send("+").unwrap();
        block.code().dup();
        block.code().pop_local(0, 1);
        block.code().return_local();
        let block = block.finish().unwrap();

        let mut total = MethodBuilder::method(&u, "total", total_scope);
        total.code().push_0();
        total.code().pop_local(0, 0);
        total.code().push_1();
        total.push_constant(Value::Integer(4)).unwrap();
        total.push_block(block).unwrap();
        total.send("to:do:").unwrap();
        total.code().pop();
        total.code().push_local(0, 0);
        total.code().return_local();
        class_add(&class, total.finish().unwrap());

        let value = u.send(instance(&class), "total", vec![]).unwrap();
        assert_eq!(value.as_integer(), Some(10), "{mode}");
    }
}

#[test]
fn blocks_check_their_arity() {
    let u = universe(TierMode::Threaded);
    let class = u.define_class("Arity", &u.classes.object, &[]);
    let outer = scope(&[], &[]);
    let mut block = MethodBuilder::block(&u, LexicalScope::new(Some(outer.clone()), &[false], &[], false));
    block.code().push_argument(1, 0);
    block.code().return_local();
    let block = block.finish().unwrap();
    let mut method = MethodBuilder::method(&u, "make", outer);
    let lit = method.literal(Value::Method(block)).unwrap();
    method.code().push_block_no_ctx(lit);
    method.code().return_local();
    class_add(&class, method.finish().unwrap());

    let block = u.send(instance(&class), "make", vec![]).unwrap();
    assert_eq!(
        u.send(block.clone(), "value:", vec![Value::Integer(5)]).unwrap().as_integer(),
        Some(5)
    );
    assert!(matches!(
        u.send(block, "value", vec![]),
        Err(Unwind::Error(RuntimeError::ArityMismatch { expected: 2, got: 1 }))
    ));
}

#[test]
fn integer_overflow_promotes_through_sends() {
    let u = universe(TierMode::Threaded);
    let big = u
        .send(Value::Integer(i64::MAX), "+", vec![Value::Integer(1)])
        .unwrap();
    assert!(matches!(big, Value::BigInteger(_)));
    let back = u.send(big, "-", vec![Value::Integer(1)]).unwrap();
    assert_eq!(back.as_integer(), Some(i64::MAX));
}

// ── tier shifting ─────────────────────────────────────────────────

/// A `Cell` with one field, and a driver that reads one cell in a loop
/// while changing the field kind of another cell halfway through:
///
/// ```text
/// churn: a with: b = ( | sum i | sum := 0.
///   1 to: 100 do: [ :i |
///     (i = 50) ifTrue: [ b value: 'x' ].
///     sum := sum + a value ].
///   ^ sum )
/// ```
fn churn(u: &Universe) -> Value {
    let cell = u.define_class("Cell", &u.classes.object, &["value"]);
    let mut getter = MethodBuilder::method(u, "value", scope(&[], &[]));
    getter.code().return_field(0);
    class_add(&cell, getter.finish().unwrap());
    let mut setter = MethodBuilder::method(u, "value:", scope(&[false], &[]));
    setter.code().push_argument(1, 0);
    setter.code().pop_field(0, 0);
    setter.code().return_self();
    class_add(&cell, setter.finish().unwrap());

    let driver = u.define_class("Churn", &u.classes.object, &[]);
    let mut b = MethodBuilder::method(u, "churn:with:", scope(&[false, false], &[false, false]));
    b.code().push_0();
    b.code().pop_local(0, 0);
    b.code().push_1();
    b.push_constant(Value::Integer(100)).unwrap();
    b.code().dup_second();
    let loop_top = b.code().current_offset();
    let exit = b.code().jump_if_greater();
    b.code().dup();
    b.code().pop_local(1, 0);
    b.code().push_local(1, 0);
    b.push_constant(Value::Integer(50)).unwrap();
    b.send("=").unwrap();
    let skip = b.code().jump_on_false_pop();
    b.code().push_argument(2, 0);
    b.push_constant(Value::string("x")).unwrap();
    b.send("value:").unwrap();
    b.code().pop();
    b.code().bind(skip);
    b.code().push_local(0, 0);
    b.code().push_argument(1, 0);
    b.send("value").unwrap();
    b.send("+").unwrap();
    b.code().pop_local(0, 0);
    b.code().inc();
    b.code().jump_backward(loop_top);
    b.code().bind(exit);
    b.code().pop();
    b.code().push_local(0, 0);
    b.code().return_local();
    class_add(&driver, b.finish().unwrap());

    let a = instance(&cell);
    let other = instance(&cell);
    u.send(a.clone(), "value:", vec![Value::Integer(2)]).unwrap();
    u.send(other.clone(), "value:", vec![Value::Integer(3)]).unwrap();
    u.send(instance(&driver), "churn:with:", vec![a, other]).unwrap()
}

#[test]
fn stale_receiver_sends_hybrid_back_to_tier_one() {
    let threaded = universe(TierMode::Threaded);
    assert_eq!(churn(&threaded).as_integer(), Some(200));

    let hybrid = universe(TierMode::Hybrid);
    assert_eq!(churn(&hybrid).as_integer(), Some(200));
    let transfers = hybrid.transfers();
    assert_eq!(transfers.to_tier1, 1);
    assert_eq!(transfers.to_tier2, 2);

    let tracing = universe(TierMode::Tracing);
    assert_eq!(churn(&tracing).as_integer(), Some(200));
}
