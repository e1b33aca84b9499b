// Unit tests for register value resolution
mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use mipsdec_core::decompiler::analysis::data_flow::RegisterValueResolver;
    use mipsdec_core::decompiler::instruction::Instruction;
    use mipsdec_core::decompiler::register::{Gpr, Register};

    fn decode_all(words: &[u32]) -> Vec<Instruction> {
        words
            .iter()
            .enumerate()
            .map(|(slot, &word)| Instruction::decode(word, BASE + 4 * slot as u32).unwrap())
            .collect()
    }

    fn lui(rt: u32, upper: u16) -> u32 {
        encode_i(OP_LUI, ZERO, rt, upper as i16)
    }

    fn call_t9() -> u32 {
        encode_r(T9, 0, RA, 0, FN_JALR)
    }

    #[test]
    fn test_lui_addiu_pair() {
        let seq = decode_all(&[lui(T9, 0x8012), addiu(T9, T9, 0x3450), call_t9()]);
        let resolver = RegisterValueResolver::default();
        assert_eq!(resolver.resolve_register(&seq, 2, Register::T9), Some(0x8012_3450));
    }

    #[test]
    fn test_negative_low_half_and_ori() {
        // lui/addiu with a sign-extended low half
        let seq = decode_all(&[lui(T9, 0x8013), addiu(T9, T9, -0x10), call_t9()]);
        let resolver = RegisterValueResolver::default();
        assert_eq!(resolver.resolve_register(&seq, 2, Register::T9), Some(0x8012_FFF0));

        let seq = decode_all(&[lui(T9, 0x8012), encode_i(OP_ORI, T9, T9, 0x8000u16 as i16), call_t9()]);
        assert_eq!(resolver.resolve_register(&seq, 2, Register::T9), Some(0x8012_8000));
    }

    #[test]
    fn test_unrelated_instructions_are_skipped() {
        let seq = decode_all(&[
            lui(T9, 0x8012),
            addiu(A0, ZERO, 5),
            encode_i(OP_SW, SP, A0, 16),
            addiu(T9, T9, 0x3450),
            NOP,
            call_t9(),
        ]);
        let resolver = RegisterValueResolver::default();
        assert_eq!(resolver.resolve_register(&seq, 5, Register::T9), Some(0x8012_3450));
        assert_eq!(resolver.resolve_register(&seq, 5, Register::A0), Some(5));
    }

    #[test]
    fn test_addu_combines_operands() {
        let seq = decode_all(&[
            lui(A1, 0x8000),
            addiu(A2, ZERO, 0x10),
            encode_r(A1, A2, T9, 0, FN_ADDU),
            call_t9(),
        ]);
        let resolver = RegisterValueResolver::default();
        assert_eq!(resolver.resolve_register(&seq, 3, Register::T9), Some(0x8000_0010));
    }

    #[test]
    fn test_depth_bound() {
        let seq = decode_all(&[addiu(A2, ZERO, 16), encode_r(A2, ZERO, T9, 0, FN_ADDU), call_t9()]);
        assert_eq!(RegisterValueResolver::default().resolve_register(&seq, 2, Register::T9), Some(16));
        assert_eq!(RegisterValueResolver::new(0).resolve_register(&seq, 2, Register::T9), None);
    }

    #[test]
    fn test_memory_load_is_unknown() {
        let seq = decode_all(&[encode_i(OP_LW, A0, T9, 8), call_t9()]);
        let resolver = RegisterValueResolver::default();
        assert_eq!(resolver.resolve_register(&seq, 1, Register::T9), None);

        // A self-update after an unknown value stays unknown
        let seq = decode_all(&[encode_i(OP_LW, A0, T9, 8), addiu(T9, T9, 4), call_t9()]);
        assert_eq!(resolver.resolve_register(&seq, 2, Register::T9), None);
    }

    #[test]
    fn test_start_of_sequence_is_unknown() {
        let seq = decode_all(&[addiu(T9, T9, 4), call_t9()]);
        assert_eq!(RegisterValueResolver::default().resolve_register(&seq, 1, Register::T9), None);
    }

    #[test]
    fn test_label_stops_the_walk() {
        let mut seq = decode_all(&[lui(T9, 0x8012), addiu(T9, T9, 0x3450), NOP, call_t9()]);
        seq[2].is_jump_target = true;
        let resolver = RegisterValueResolver::default();
        assert_eq!(resolver.resolve_register(&seq, 3, Register::T9), None);

        // So does a label on the querying instruction itself
        seq[2].is_jump_target = false;
        seq[3].is_jump_target = true;
        assert_eq!(resolver.resolve_register(&seq, 3, Register::T9), None);
    }

    #[test]
    fn test_calls_clobber_caller_saved_registers() {
        let seq = decode_all(&[
            lui(T9, 0x8012),
            lui(S0, 0x8034),
            encode_r(T0, 0, RA, 0, FN_JALR),
            NOP,
            call_t9(),
        ]);
        let resolver = RegisterValueResolver::default();
        assert_eq!(resolver.resolve_register(&seq, 4, Register::T9), None);
        assert_eq!(
            resolver.resolve_register(&seq, 4, Register::Gpr(Gpr::S0)),
            Some(0x8034_0000)
        );
    }

    #[test]
    fn test_definition_inside_branch_is_unknown() {
        let mut seq = decode_all(&[
            lui(T9, 0x8012),
            encode_i(OP_BEQ, A0, ZERO, 2),
            call_t9(),
        ]);
        let nested = Instruction::decode(addiu(T9, ZERO, 8), BASE + 8).unwrap();
        seq[1].if_branch.push(nested);
        assert_eq!(RegisterValueResolver::default().resolve_register(&seq, 2, Register::T9), None);
    }

    #[test]
    fn test_zero_register() {
        let seq = decode_all(&[call_t9()]);
        assert_eq!(RegisterValueResolver::default().resolve_register(&seq, 0, Register::ZERO), Some(0));
    }
}
