//! Integration tests for the decompilation pipeline

mod common;

use common::*;
use mipsdec_core::decompiler::optimizer::OptimizationLevel;
use mipsdec_core::decompiler::{BinaryImage, DecompilationPipeline, DecompilerConfig, DecompilerError, SymbolTable};

const FOO: u32 = 0x8012_3450;

fn call_through_t9() -> Vec<u32> {
    vec![
        encode_i(OP_LUI, ZERO, T9, 0x8012u16 as i16),
        addiu(T9, T9, 0x3450),
        encode_r(T9, 0, RA, 0, FN_JALR),
        NOP,
        jr_ra(),
        NOP,
    ]
}

#[test]
fn test_decompile_end_to_end() {
    let fixture = Fixture::single("caller", &call_through_t9(), &[(FOO, "foo")]);
    let code = mipsdec_core::decompile("caller", &fixture.symbols, &fixture.image).unwrap();

    assert!(code.contains("void caller(void)"), "{}", code);
    assert!(code.contains("\tfoo();\n"), "{}", code);
    assert!(code.contains("#include \"mipsdec_helper.h\""), "{}", code);
    assert!(code.contains(" * Optimization passes run: 2\n"), "{}", code);
}

#[test]
fn test_decompile_uses_image_load_base() {
    let words: Vec<u32> = vec![addiu(V0, ZERO, 3), jr_ra(), NOP];
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    let image = BinaryImage::from_bytes(bytes, 0xBFC0_0000);
    let symbols = SymbolTable::parse("bfc00000 T reset\nbfc0000c T end\n").unwrap();

    let code = mipsdec_core::decompile("reset", &symbols, &image).unwrap();
    assert!(code.contains(" * reset (0xBFC00000)\n"), "{}", code);
    assert!(code.contains("\tREG_v0 = 3;\n"), "{}", code);
}

#[test]
fn test_lookup_failures() {
    let fixture = Fixture::single("f", &[jr_ra(), NOP], &[]);

    let missing = mipsdec_core::decompile("g", &fixture.symbols, &fixture.image).unwrap_err();
    assert!(matches!(missing, DecompilerError::SymbolNotFound { .. }));
    assert!(missing.is_lookup_failure());

    // The end marker is the last symbol, so nothing bounds it
    let last = mipsdec_core::decompile("end", &fixture.symbols, &fixture.image).unwrap_err();
    assert!(matches!(last, DecompilerError::UnboundedFunction { .. }));
}

#[test]
fn test_decode_failure_aborts_function() {
    let fixture = Fixture::single("f", &[NOP, 0xFC00_0000, jr_ra(), NOP], &[]);
    match mipsdec_core::decompile("f", &fixture.symbols, &fixture.image) {
        Err(DecompilerError::InstructionDecode { address, word, .. }) => {
            assert_eq!(address, BASE + 4);
            assert_eq!(word, 0xFC00_0000);
        }
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[test]
fn test_range_outside_image() {
    let image = image_of(&[jr_ra(), NOP]);
    let symbols = SymbolTable::parse("80000000 T f\n80000010 T end\n").unwrap();
    assert!(matches!(
        mipsdec_core::decompile("f", &symbols, &image),
        Err(DecompilerError::AddressOutOfImage { address: 0x8000_0008, .. })
    ));
}

#[test]
fn test_function_stats() {
    let fixture = Fixture::single("caller", &call_through_t9(), &[(FOO, "foo")]);
    let decompiled = DecompilationPipeline::default()
        .decompile_function("caller", &fixture.symbols, &fixture.image)
        .unwrap();

    let stats = &decompiled.stats;
    assert_eq!(decompiled.name, "caller");
    assert_eq!(stats.instructions_decoded, 6);
    assert_eq!(stats.instructions_after_delay_slots, 6);
    assert_eq!(stats.instructions_emitted, 4);
    assert_eq!(stats.optimization_passes_run, 2);
    assert_eq!(stats.stack_frame_size, None);
    assert!(stats.converged);
    assert_eq!(stats.labels_remaining, 0);
    assert_eq!(stats.delay_slots.swapped, 2);

    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["converged"], serde_json::Value::Bool(true));
    assert_eq!(json["delay_slots"]["swapped"], 2);
}

#[test]
fn test_optimization_level_from_config() {
    let fixture = Fixture::single("caller", &call_through_t9(), &[(FOO, "foo")]);
    let config = DecompilerConfig {
        optimization_level: OptimizationLevel::None,
        ..DecompilerConfig::default()
    };
    let decompiled = DecompilationPipeline::new(config)
        .decompile_function("caller", &fixture.symbols, &fixture.image)
        .unwrap();
    assert_eq!(decompiled.stats.optimization_passes_run, 0);
    assert_eq!(decompiled.stats.instructions_emitted, 6);
    // The call is still named
    assert!(decompiled.source.contains("\tfoo();\n"));
}

#[test]
fn test_decompile_all_collects_failures() {
    let image = image_of(&[jr_ra(), NOP, 0xFC00_0000, NOP]);
    let symbols = SymbolTable::parse(
        "80000000 T good\n\
         80000000 T good_alias\n\
         80000008 T bad\n\
         80000010 T end\n",
    )
    .unwrap();

    let mut visited: Vec<String> = Vec::new();
    let batch = DecompilationPipeline::default().decompile_all_with_progress(&symbols, &image, |name| {
        visited.push(name.to_string());
    });

    assert_eq!(visited, vec!["good", "bad", "end"]);
    assert_eq!(batch.stats.total_functions, 3);
    assert_eq!(batch.stats.successful_functions, 1);
    assert_eq!(batch.stats.failed_functions, 2);
    assert_eq!(batch.stats.non_converged_functions, 0);
    assert_eq!(batch.stats.total_instructions, 2);

    assert_eq!(batch.functions.len(), 1);
    assert_eq!(batch.functions[0].name, "good");
    assert!(batch.functions[0].source.contains("return REG_v0;"));

    let failed: Vec<&str> = batch.failures.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failed, vec!["bad", "end"]);
    assert!(matches!(batch.failures[0].1, DecompilerError::InstructionDecode { .. }));
    assert!(matches!(batch.failures[1].1, DecompilerError::UnboundedFunction { .. }));
}

#[test]
fn test_non_convergence_is_counted_not_failed() {
    let image = image_of(&[NOP, NOP, NOP, jr_ra(), NOP]);
    let symbols = SymbolTable::parse("80000000 T padded\n80000014 T end\n").unwrap();
    let config = DecompilerConfig {
        max_optimization_iterations: 1,
        ..DecompilerConfig::default()
    };
    let batch = DecompilationPipeline::new(config).decompile_all(&symbols, &image);
    assert_eq!(batch.stats.successful_functions, 1);
    assert_eq!(batch.stats.non_converged_functions, 1);
    assert!(!batch.functions[0].stats.converged);
}

#[test]
fn test_disassembly_listing() {
    let fixture = Fixture::single("f", &[jr_ra(), addiu(V0, ZERO, 1)], &[]);
    let pipeline = DecompilationPipeline::default();

    let raw = pipeline.disassemble("f", &fixture.symbols, &fixture.image, false).unwrap();
    assert!(raw.starts_with("f:\n"));
    assert!(raw.contains("80000000: 03e00008"), "{}", raw);

    let resolved = pipeline.disassemble("f", &fixture.symbols, &fixture.image, true).unwrap();
    let lines: Vec<&str> = resolved.lines().collect();
    assert!(lines[1].starts_with("80000000: 24020001"), "{}", resolved);
    assert!(lines[2].starts_with("80000004: 03e00008"), "{}", resolved);
}

#[test]
fn test_disassembly_marks_shadow_move_word() {
    let words = [encode_r(T9, 0, RA, 0, FN_JALR), encode_r(A0, ZERO, T9, 0, FN_ADDU), jr_ra(), NOP];
    let fixture = Fixture::single("f", &words, &[]);
    let resolved = DecompilationPipeline::default()
        .disassemble("f", &fixture.symbols, &fixture.image, true)
        .unwrap();
    let lines: Vec<&str> = resolved.lines().collect();

    // The move has an address but no word of its own
    assert_eq!(lines[1], "80000000: --------  addu t9_dsb,t9,zero", "{}", resolved);
    assert!(lines[2].starts_with("--------: --------  addu t9,a0,zero"), "{}", resolved);
    assert!(lines[3].starts_with("80000004: 0320f809"), "{}", resolved);
    assert!(!resolved.contains("00000000  addu"), "{}", resolved);
}
