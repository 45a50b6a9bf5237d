mod builder;
mod decoder;
mod instruction;
mod op;
mod stack_check;

pub use builder::{BytecodeBuilder, Label};
pub use decoder::{BytecodeDecoder, DecodeError, decode_at};
pub use instruction::{Arity, Instruction};
pub use op::Op;
pub use stack_check::{StackCheckError, StackDepths, analyze};

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes)
            .map(|r| r.expect("decode error").1)
            .collect()
    }

    fn no_sends(_: u8) -> usize {
        unreachable!("no variable-arity sends in this test")
    }

    // ── encoding ───────────────────────────────────────────────────

    #[test]
    fn short_forms_decode_to_indexed_instructions() {
        let mut b = BytecodeBuilder::new();
        b.push_frame(0);
        b.push_frame(7);
        b.push_inner(2, 0);
        b.push_inner(2, 1);
        b.push_field(1, 0);
        b.push_constant(2);
        b.push_constant(9);
        b.pop_inner(0, 3);
        b.return_field(1);

        let bytes = b.into_bytes();
        assert_eq!(bytes[0], Op::PushFrame0 as u8);
        assert_eq!(decode_all(&bytes), vec![
            Instruction::PushFrame { idx: 0 },
            Instruction::PushFrame { idx: 7 },
            Instruction::PushInner { idx: 2, ctx: 0 },
            Instruction::PushInner { idx: 2, ctx: 1 },
            Instruction::PushField { idx: 1, ctx: 0 },
            Instruction::PushConstant { lit: 2 },
            Instruction::PushConstant { lit: 9 },
            Instruction::PopInner { idx: 0, ctx: 3 },
            Instruction::ReturnField { idx: 1 },
        ]);
    }

    #[test]
    fn sends_pick_arity_specific_opcodes() {
        let mut b = BytecodeBuilder::new();
        b.send(0, 1);
        b.send(1, 2);
        b.send(2, 3);
        b.send(3, 5);
        b.super_send(4);
        b.q_super_send(4, 2);

        assert_eq!(decode_all(&b.into_bytes()), vec![
            Instruction::Send { lit: 0, arity: Arity::One },
            Instruction::Send { lit: 1, arity: Arity::Two },
            Instruction::Send { lit: 2, arity: Arity::Three },
            Instruction::Send { lit: 3, arity: Arity::N },
            Instruction::SuperSend { lit: 4, arity: Arity::N },
            Instruction::QuickSuperSend { lit: 4, arity: Arity::Two },
        ]);
    }

    #[test]
    fn unknown_opcode_is_reported_with_offset() {
        let bytes = [Op::Dup as u8, 0xff];
        let mut decoder = BytecodeDecoder::new(&bytes);
        assert!(matches!(decoder.next(), Some(Ok((0, Instruction::Dup)))));
        assert_eq!(
            decoder.next(),
            Some(Err(DecodeError::UnknownOpcode { byte: 0xff, offset: 1 }))
        );
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn truncated_instruction() {
        let bytes = [Op::PushInner as u8, 1];
        assert_eq!(
            decode_at(&bytes, 0),
            Err(DecodeError::Truncated { op: Op::PushInner, offset: 0 })
        );
    }

    // ── jumps ──────────────────────────────────────────────────────

    #[test]
    fn forward_jump_is_relative_to_the_jump() {
        let mut b = BytecodeBuilder::new();
        b.push_nil();
        let label = b.jump_on_false_pop();
        b.push_1();
        b.bind(label);
        b.return_local();

        let bytes = b.into_bytes();
        let decoded = decode_all(&bytes);
        assert_eq!(decoded[1], Instruction::JumpOnFalsePop { offset: 4 });
        assert_eq!(decoded[1].jump_target(1), Some(5));
        assert_eq!(bytes[5], Op::ReturnLocal as u8);
    }

    #[test]
    fn backward_jump() {
        let mut b = BytecodeBuilder::new();
        b.push_nil();
        let loop_top = b.current_offset();
        b.dup();
        b.pop();
        b.jump_backward(loop_top);

        let decoded = decode_all(&b.into_bytes());
        assert_eq!(decoded[3], Instruction::JumpBackward { offset: 2 });
        assert_eq!(decoded[3].jump_target(3), Some(1));
    }

    #[test]
    fn far_jumps_use_two_byte_offsets() {
        let mut b = BytecodeBuilder::new();
        let loop_top = b.current_offset();
        b.push_nil();
        let exit = b.jump_on_true_pop();
        for _ in 0..300 {
            b.push_nil();
            b.pop();
        }
        b.jump_backward(loop_top);
        b.bind(exit);
        b.push_nil();
        b.return_local();

        let bytes = b.into_bytes();
        assert_eq!(bytes[1], Op::Jump2OnTruePop as u8);
        let (exit_jump, _) = decode_at(&bytes, 1).unwrap();
        assert_eq!(exit_jump, Instruction::JumpOnTruePop { offset: 606 });

        let back_at = 4 + 600;
        assert_eq!(bytes[back_at], Op::Jump2Backward as u8);
        let (back, _) = decode_at(&bytes, back_at).unwrap();
        assert_eq!(back.jump_target(back_at), Some(0));
    }

    #[test]
    fn display_instructions() {
        assert_eq!(
            Instruction::Send { lit: 5, arity: Arity::Two }.to_string(),
            "send_2 #5"
        );
        assert_eq!(
            Instruction::JumpBackward { offset: 7 }.to_string(),
            "jump_backward -7"
        );
        assert_eq!(
            Instruction::PushInner { idx: 1, ctx: 2 }.to_string(),
            "push_inner 1 ^2"
        );
        assert_eq!(
            Instruction::PushBlock { lit: 0, with_context: false }.to_string(),
            "push_block_no_ctx #0"
        );
    }

    // ── stack depth ────────────────────────────────────────────────

    #[test]
    fn straight_line_depth() {
        let mut b = BytecodeBuilder::new();
        b.push_argument(0, 0);
        b.push_constant(0);
        b.push_constant(1);
        b.send(2, 3);
        b.return_local();

        let depths = analyze(b.as_bytes(), no_sends).unwrap();
        assert_eq!(depths.max_depth(), 3);
        assert_eq!(depths.depth_before(b.as_bytes().len() - 1), Some(1));
    }

    #[test]
    fn inlined_to_do_loop_is_balanced() {
        // 1 to: 10 do: [:i | i], inlined
        let mut b = BytecodeBuilder::new();
        b.push_1();
        b.push_constant(0);
        b.dup_second();
        let loop_top = b.current_offset();
        let exit = b.jump_if_greater();
        b.dup();
        b.pop_local(0, 0);
        b.push_local(0, 0);
        b.pop();
        b.inc();
        b.jump_backward(loop_top);
        b.bind(exit);
        b.return_local();

        let bytes = b.into_bytes();
        let depths = analyze(&bytes, no_sends).unwrap();
        assert_eq!(depths.max_depth(), 4);
        assert_eq!(depths.depth_before(loop_top), Some(3));
        assert_eq!(depths.depth_before(bytes.len() - 1), Some(1));
    }

    #[test]
    fn top_nil_jump_joins_with_value_branch() {
        // a and: [b], inlined
        let mut b = BytecodeBuilder::new();
        b.push_constant(0);
        let skip = b.jump_on_false_top_nil();
        b.push_constant(1);
        b.bind(skip);
        b.return_local();

        let depths = analyze(b.as_bytes(), no_sends).unwrap();
        assert_eq!(depths.max_depth(), 1);
    }

    #[test]
    fn underflow_is_rejected() {
        let mut b = BytecodeBuilder::new();
        b.pop();
        b.return_self();

        let err = analyze(b.as_bytes(), no_sends).unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.message.contains("underflow"));
    }

    #[test]
    fn variable_arity_sends_ask_for_the_selector_arity() {
        let mut b = BytecodeBuilder::new();
        for _ in 0..4 {
            b.push_nil();
        }
        b.send(0, 4);
        b.return_local();

        let depths = analyze(b.as_bytes(), |lit| {
            assert_eq!(lit, 0);
            4
        })
        .unwrap();
        assert_eq!(depths.max_depth(), 4);
    }
}
