//! Unit tests for code generation

mod common;

use common::*;
use mipsdec_core::decompiler::codegen::{helper_header, CodeGenerator};
use mipsdec_core::decompiler::optimizer::{OptimizationLevel, Optimizer};
use mipsdec_core::decompiler::{DecompilerConfig, Function};

const FOO: u32 = 0x8012_3450;

fn lui(rt: u32, upper: u16) -> u32 {
    encode_i(OP_LUI, ZERO, rt, upper as i16)
}

/// Decode, resolve, optimize and render `name` from `fixture`.
fn render(fixture: &Fixture, name: &str, level: OptimizationLevel) -> String {
    let mut function: Function = fixture.function(name);
    function.resolve_delay_slots().unwrap();
    Optimizer::new(level).run(&mut function);
    CodeGenerator::new(&fixture.symbols).generate(&function)
}

#[test]
fn test_indirect_call_resolves_to_symbol() {
    let words = [
        lui(T9, 0x8012),
        addiu(T9, T9, 0x3450),
        encode_r(T9, 0, RA, 0, FN_JALR),
        NOP,
        jr_ra(),
        NOP,
    ];
    let fixture = Fixture::single("caller", &words, &[(FOO, "foo")]);
    let code = render(&fixture, "caller", OptimizationLevel::Aggressive);

    assert!(code.contains("\tREG_t9 = 0x80120000;\n"), "{}", code);
    assert!(code.contains("\tfoo();\n"), "{}", code);
    assert!(code.contains("\treturn REG_v0;\n"), "{}", code);
    assert!(!code.contains("FIXME"), "{}", code);
}

#[test]
fn test_unresolved_calls_are_flagged() {
    let words = [
        encode_i(OP_LW, A0, T9, 0),
        encode_r(T9, 0, RA, 0, FN_JALR),
        NOP,
        lui(T9, 0x8077),
        encode_r(T9, 0, RA, 0, FN_JALR),
        NOP,
        jr_ra(),
        NOP,
    ];
    let fixture = Fixture::single("caller", &words, &[(FOO, "foo")]);
    let code = render(&fixture, "caller", OptimizationLevel::Aggressive);

    assert!(code.contains("/* FIXME: call UNKNOWN FUNCTION in REG_t9; */"), "{}", code);
    assert!(code.contains("/* FIXME: call UNKNOWN FUNCTION in REG_t9 (0x80770000); */"), "{}", code);
}

#[test]
fn test_tail_call_through_jump() {
    let words = [encode_j(FOO), NOP];
    let fixture = Fixture::single("stub", &words, &[(FOO, "foo")]);
    let code = render(&fixture, "stub", OptimizationLevel::Aggressive);
    assert!(code.contains("\tfoo();\n\treturn REG_v0;\n"), "{}", code);
    assert!(!code.contains("goto"), "{}", code);
}

#[test]
fn test_if_else_layout() {
    let words = [
        encode_i(OP_BEQ, A0, ZERO, branch_offset(BASE, BASE + 0x10)),
        NOP,
        encode_j(BASE + 0x18),
        addiu(V0, ZERO, 1),
        addiu(V0, ZERO, 2),
        NOP,
        jr_ra(),
        NOP,
    ];
    let fixture = Fixture::single("select", &words, &[]);
    let code = render(&fixture, "select", OptimizationLevel::Aggressive);

    let body = "void select(void)\n\
                {\n\
                \tif (REG_a0 != 0)\n\
                \t{\n\
                \t\tREG_v0 = 1;\n\
                \t}\n\
                \telse\n\
                \t{\n\
                \t\tREG_v0 = 2;\n\
                \t}\n\
                \n\
                \treturn REG_v0;\n\
                }\n";
    assert!(code.ends_with(body), "{}", code);
}

#[test]
fn test_remaining_labels_become_gotos() {
    let words = [
        encode_i(OP_BEQ, A0, ZERO, branch_offset(BASE, BASE + 0x14)),
        NOP,
        addiu(V1, ZERO, 2),
        jr_ra(),
        NOP,
        encode_i(OP_BNE, A1, ZERO, branch_offset(BASE + 0x14, BASE + 0x08)),
        NOP,
        addiu(V0, ZERO, 9),
        jr_ra(),
        NOP,
    ];
    let fixture = Fixture::single("shared", &words, &[]);

    let basic = render(&fixture, "shared", OptimizationLevel::Basic);
    assert!(basic.contains("\t\t\tgoto LABEL_80000008;\n"), "{}", basic);
    assert!(basic.contains("\nLABEL_80000008:\n\tREG_v1 = 2;\n"), "{}", basic);

    let aggressive = render(&fixture, "shared", OptimizationLevel::Aggressive);
    assert!(!aggressive.contains("LABEL_"), "{}", aggressive);
    assert_eq!(aggressive.matches("REG_v1 = 2;").count(), 2);
}

#[test]
fn test_header_comment() {
    let words = [
        addiu(SP, SP, -32),
        encode_i(OP_SW, SP, RA, 28),
        addiu(V0, ZERO, 1),
        encode_i(OP_LW, SP, RA, 28),
        jr_ra(),
        addiu(SP, SP, 32),
    ];
    let fixture = Fixture::single("framed", &words, &[]);

    let code = render(&fixture, "framed", OptimizationLevel::Aggressive);
    assert!(code.starts_with("/*\n * framed (0x80000000)\n"), "{}", code);
    assert!(code.contains(" * Optimization passes run: 4\n"), "{}", code);
    assert!(code.contains(" * Stack frame size: 32 bytes\n"), "{}", code);
    assert!(!code.contains("REG_sp"), "{}", code);

    let kept = render(&fixture, "framed", OptimizationLevel::Basic);
    assert!(kept.contains("\tREG_sp -= 32;\n"), "{}", kept);
    assert!(kept.contains("\t*((unsigned int *)(REG_sp + 28)) = REG_ra;\n"), "{}", kept);
    assert!(kept.contains("\tREG_sp += 32;\n"), "{}", kept);
}

#[test]
fn test_iteration_cap_note() {
    let words = [NOP, NOP, NOP, jr_ra(), NOP];
    let fixture = Fixture::single("padded", &words, &[]);
    let mut function = fixture.function("padded");
    function.resolve_delay_slots().unwrap();
    Optimizer::new(OptimizationLevel::Aggressive)
        .with_max_iterations(1)
        .run(&mut function);

    let code = CodeGenerator::new(&fixture.symbols).generate(&function);
    assert!(code.contains(" * Restructuring stopped after 1 iterations"), "{}", code);
    assert!(code.contains(" * Stack frame size: none\n"), "{}", code);
}

#[test]
fn test_include_line_follows_config() {
    let fixture = Fixture::single("leaf", &[jr_ra(), NOP], &[]);
    let mut function = fixture.function("leaf");
    function.resolve_delay_slots().unwrap();

    let with_include = CodeGenerator::from_config(&fixture.symbols, &DecompilerConfig::default()).generate(&function);
    assert!(with_include.contains("#include \"mipsdec_helper.h\"\n"));

    let config = DecompilerConfig {
        helper_include: None,
        ..DecompilerConfig::default()
    };
    let bare = CodeGenerator::from_config(&fixture.symbols, &config).generate(&function);
    assert!(!bare.contains("#include"));
    assert!(bare.contains("void leaf(void)\n{\n"));
}

#[test]
fn test_helper_header_covers_generated_names() {
    let header = helper_header();
    assert!(header.contains("static unsigned int REG_t9;"));
    assert!(header.contains("static unsigned int REG_t9_dsb;"));
    assert!(!header.contains("REG_zero"));
    assert!(header.contains("read_c0_status"));
    assert!(header.trim_end().ends_with("#endif"));
}
