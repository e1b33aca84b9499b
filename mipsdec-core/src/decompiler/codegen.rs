//! Pseudo-C Code Generator
//!
//! Renders a restructured [`Function`] as C-like source over one global variable
//! per register (`REG_a0`, `REG_t9_dsb`, ...), declared by [`helper_header`].
//!
//! # Rendering Rules
//! - one fixed template per instruction kind
//! - a `zero` source operand is dropped from the expression
//! - `rd = rd op x` becomes the compound assignment `rd op= x`
//! - branches become `if (test) { .. } else { .. }` followed by a blank line
//! - `J` becomes `goto LABEL_XXXXXXXX`, or a tail call when it leaves the function
//! - `jr ra` becomes `return REG_v0`
//! - `JALR` names its callee when the register value resolver can prove the target
//!
//! The output is meant for reading, not for compiling as-is: unresolved calls and
//! indirect jumps are left as `FIXME` comments.

use std::fmt::Write;

use crate::decompiler::analysis::data_flow::RegisterValueResolver;
use crate::decompiler::config::DecompilerConfig;
use crate::decompiler::decoder::{InstructionClass, InstructionKind, ResultField};
use crate::decompiler::function::Function;
use crate::decompiler::instruction::Instruction;
use crate::decompiler::optimizer::Convergence;
use crate::decompiler::register::{cp0_name, Gpr, Register, CP0_REG_NAMES};
use crate::decompiler::symbols::SymbolTable;

pub struct CodeGenerator<'a> {
    symbols: &'a SymbolTable,
    resolver: RegisterValueResolver,
    /// Header named in the `#include` line, if any
    include: Option<String>,
    indent_level: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self::from_config(symbols, &DecompilerConfig::default())
    }

    pub fn from_config(symbols: &'a SymbolTable, config: &DecompilerConfig) -> Self {
        Self {
            symbols,
            resolver: RegisterValueResolver::new(config.max_resolve_depth),
            include: config.helper_include.clone(),
            indent_level: 0,
        }
    }

    pub fn with_include(mut self, include: Option<String>) -> Self {
        self.include = include;
        self
    }

    /// Render the whole function: leading comment, include line, signature and body.
    pub fn generate(&mut self, function: &Function) -> String {
        let mut code: String = String::with_capacity(function.instruction_count() * 48 + 256);

        code.push_str(&Self::header_comment(function));
        if let Some(include) = &self.include {
            let _ = writeln!(code, "#include \"{}\"\n", include);
        }
        let _ = writeln!(code, "void {}(void)", function.name);
        code.push_str("{\n");

        self.indent_level = 1;
        self.generate_sequence(&mut code, function, &function.instructions);
        self.indent_level = 0;

        code.push_str("}\n");
        code
    }

    fn header_comment(function: &Function) -> String {
        let mut comment: String = String::new();
        comment.push_str("/*\n");
        let _ = writeln!(comment, " * {} (0x{:08X})", function.name, function.start_address);
        let _ = writeln!(comment, " * Optimization passes run: {}", function.optimization_passes_run);
        match function.stack_frame_size {
            Some(size) => {
                let _ = writeln!(comment, " * Stack frame size: {} bytes", size);
            }
            None => comment.push_str(" * Stack frame size: none\n"),
        }
        if let Convergence::IterationCapReached { iterations } = function.convergence {
            let _ = writeln!(
                comment,
                " * Restructuring stopped after {} iterations; control flow is only partially structured",
                iterations
            );
        }
        comment.push_str(" */\n");
        comment
    }

    fn generate_sequence(&mut self, code: &mut String, function: &Function, sequence: &[Instruction]) {
        for insn in sequence {
            if insn.is_jump_target {
                let _ = writeln!(code, "LABEL_{:08X}:", insn.address);
            }

            if insn.is_branch() {
                self.generate_branch(code, function, insn);
                continue;
            }

            let lines: Vec<String> = self.generate_instruction(function, insn);
            if lines.is_empty() && insn.is_jump_target {
                // A label needs a statement to attach to
                let _ = writeln!(code, "{};", self.indent());
            }
            for line in lines {
                let _ = writeln!(code, "{}{}", self.indent(), line);
            }
        }
    }

    fn generate_branch(&mut self, code: &mut String, function: &Function, insn: &Instruction) {
        let indent: String = self.indent();
        let _ = writeln!(code, "{}if ({})", indent, branch_test(insn));
        let _ = writeln!(code, "{}{{", indent);
        self.indent_level += 1;
        self.generate_sequence(code, function, &insn.if_branch);
        self.indent_level -= 1;
        let _ = writeln!(code, "{}}}", indent);

        if !insn.else_branch.is_empty() {
            let _ = writeln!(code, "{}else", indent);
            let _ = writeln!(code, "{}{{", indent);
            self.indent_level += 1;
            self.generate_sequence(code, function, &insn.else_branch);
            self.indent_level -= 1;
            let _ = writeln!(code, "{}}}", indent);
        }
        code.push('\n');
    }

    /// Statements for one non-branch instruction, without indentation.
    fn generate_instruction(&self, function: &Function, insn: &Instruction) -> Vec<String> {
        let discarded: bool = insn.class() == InstructionClass::Other
            && insn.info().result != ResultField::None
            && insn.result_register().is_none();
        if discarded {
            return vec![format!("/* {} */", insn)];
        }

        match insn.kind {
            InstructionKind::Nop | InstructionKind::Ssnop => Vec::new(),
            InstructionKind::J => self.generate_jump(function, insn),
            InstructionKind::Jr | InstructionKind::JrHb => vec![generate_return(insn)],
            InstructionKind::Jalr | InstructionKind::JalrHb => vec![self.generate_call(function, insn)],
            _ => vec![generate_statement(insn)],
        }
    }

    fn generate_jump(&self, function: &Function, insn: &Instruction) -> Vec<String> {
        let Some(target) = insn.jump_target else {
            return vec![format!("/* FIXME: {} */", insn)];
        };
        let leaves_function: bool = target < function.start_address || target >= function.end_address;
        if leaves_function {
            if let Some(name) = self.symbols.lookup_address(target) {
                return vec![format!("{}();", name), format!("return {};", Register::V0.c_name())];
            }
        }
        vec![format!("goto LABEL_{:08X};", target)]
    }

    fn generate_call(&self, function: &Function, insn: &Instruction) -> String {
        let value: Option<u32> = function
            .call_site(insn.address)
            .and_then(|at| self.resolver.resolve_register(&function.resolved_snapshot, at, insn.rs));

        match value.and_then(|address| self.symbols.lookup_address(address).map(|name| (address, name))) {
            Some((address, name)) => {
                log::trace!("Call at 0x{:08X} resolved to {} (0x{:08X})", insn.address, name, address);
                format!("{}();", name)
            }
            None => match value {
                Some(address) => format!(
                    "/* FIXME: call UNKNOWN FUNCTION in {} (0x{:08X}); */",
                    insn.rs.c_name(),
                    address
                ),
                None => format!("/* FIXME: call UNKNOWN FUNCTION in {}; */", insn.rs.c_name()),
            },
        }
    }

    fn indent(&self) -> String {
        "\t".repeat(self.indent_level)
    }
}

fn generate_return(insn: &Instruction) -> String {
    if insn.rs == Register::RA {
        format!("return {};", Register::V0.c_name())
    } else {
        format!("/* FIXME: indirect jump through {}; */", insn.rs.c_name())
    }
}

fn branch_test(insn: &Instruction) -> String {
    let rs: String = insn.rs.c_name();
    let rt: String = insn.rt.c_name();
    match insn.kind {
        InstructionKind::Beq | InstructionKind::Beql => format!("{} == {}", rs, rt),
        InstructionKind::Bne | InstructionKind::Bnel => format!("{} != {}", rs, rt),
        InstructionKind::Bgez => format!("(signed int){} >= 0", rs),
        InstructionKind::Bgtz => format!("(signed int){} > 0", rs),
        InstructionKind::Blez => format!("(signed int){} <= 0", rs),
        InstructionKind::Bltz => format!("(signed int){} < 0", rs),
        _ => format!("/* {} */ 1", insn),
    }
}

/// `base + offset` as a C address expression.
fn address_expr(base: Register, offset: i16) -> String {
    if base.is_zero() {
        return format!("0x{:08X}", offset as i32 as u32);
    }
    match offset {
        0 => base.c_name(),
        o if o < 0 => format!("{} - {}", base.c_name(), i32::from(o).unsigned_abs()),
        o => format!("{} + {}", base.c_name(), o),
    }
}

fn memory(c_type: &str, insn: &Instruction) -> String {
    format!("*(({} *)({}))", c_type, address_expr(insn.rs, insn.immediate))
}

fn memory_type(kind: InstructionKind) -> &'static str {
    match kind {
        InstructionKind::Lb => "signed char",
        InstructionKind::Lbu | InstructionKind::Sb => "unsigned char",
        InstructionKind::Lh => "signed short",
        InstructionKind::Lhu | InstructionKind::Sh => "unsigned short",
        _ => "unsigned int",
    }
}

/// `rd = a op b` for a commutative operator, dropping `zero` operands.
///
/// `identity` is what the expression reduces to when both operands are zero.
fn commutative(rd: Register, a: Register, b: Register, op: &str, identity: &str) -> String {
    let dest: String = rd.c_name();
    match (a.is_zero(), b.is_zero()) {
        (true, true) => format!("{} = {};", dest, identity),
        (false, true) => format!("{} = {};", dest, a.c_name()),
        (true, false) => format!("{} = {};", dest, b.c_name()),
        (false, false) if rd == a => format!("{} {}= {};", dest, op, b.c_name()),
        (false, false) if rd == b => format!("{} {}= {};", dest, op, a.c_name()),
        (false, false) => format!("{} = {} {} {};", dest, a.c_name(), op, b.c_name()),
    }
}

/// `rt = rs op imm`, compound when `rt == rs`.
fn with_immediate(rt: Register, rs: Register, op: &str, immediate: String) -> String {
    if rt == rs {
        format!("{} {}= {};", rt.c_name(), op, immediate)
    } else {
        format!("{} = {} {} {};", rt.c_name(), rs.c_name(), op, immediate)
    }
}

fn generate_statement(insn: &Instruction) -> String {
    let (rs, rt, rd) = (insn.rs, insn.rt, insn.rd);
    let imm: i16 = insn.immediate;
    let uimm: String = format!("0x{:X}", insn.unsigned_immediate);

    match insn.kind {
        InstructionKind::Addu => commutative(rd, rs, rt, "+", "0"),
        InstructionKind::Or => commutative(rd, rs, rt, "|", "0"),
        InstructionKind::And if rs.is_zero() || rt.is_zero() => format!("{} = 0;", rd.c_name()),
        InstructionKind::And => commutative(rd, rs, rt, "&", "0"),
        InstructionKind::Subu => match (rs.is_zero(), rt.is_zero()) {
            (_, true) => format!("{} = {};", rd.c_name(), rs.c_name()),
            (true, false) => format!("{} = -{};", rd.c_name(), rt.c_name()),
            _ => with_immediate(rd, rs, "-", rt.c_name()),
        },
        InstructionKind::Sltu => format!("{} = ({} < {}) ? 1 : 0;", rd.c_name(), rs.c_name(), rt.c_name()),

        InstructionKind::Addiu if rs.is_zero() => format!("{} = {};", rt.c_name(), imm),
        InstructionKind::Addiu if imm == 0 => format!("{} = {};", rt.c_name(), rs.c_name()),
        InstructionKind::Addiu if imm < 0 => {
            with_immediate(rt, rs, "-", i32::from(imm).unsigned_abs().to_string())
        }
        InstructionKind::Addiu => with_immediate(rt, rs, "+", imm.to_string()),
        InstructionKind::Andi if rs.is_zero() => format!("{} = 0;", rt.c_name()),
        InstructionKind::Andi => with_immediate(rt, rs, "&", uimm),
        InstructionKind::Ori | InstructionKind::Xori if rs.is_zero() => format!("{} = {};", rt.c_name(), uimm),
        InstructionKind::Ori => with_immediate(rt, rs, "|", uimm),
        InstructionKind::Xori => with_immediate(rt, rs, "^", uimm),
        InstructionKind::Slti => format!("{} = ((signed int){} < {}) ? 1 : 0;", rt.c_name(), rs.c_name(), imm),
        InstructionKind::Sltiu => format!(
            "{} = ({} < 0x{:X}) ? 1 : 0;",
            rt.c_name(),
            rs.c_name(),
            imm as i32 as u32
        ),
        InstructionKind::Lui => format!("{} = 0x{:X}0000;", rt.c_name(), insn.unsigned_immediate),

        InstructionKind::Sll if rd == rt => format!("{} <<= {};", rd.c_name(), insn.shift_amount),
        InstructionKind::Sll => format!("{} = {} << {};", rd.c_name(), rt.c_name(), insn.shift_amount),
        InstructionKind::Srl if rd == rt => format!("{} >>= {};", rd.c_name(), insn.shift_amount),
        InstructionKind::Srl => format!("{} = {} >> {};", rd.c_name(), rt.c_name(), insn.shift_amount),
        InstructionKind::Sra => format!(
            "{} = (unsigned int)((signed int){} >> {});",
            rd.c_name(),
            rt.c_name(),
            insn.shift_amount
        ),

        InstructionKind::Lb | InstructionKind::Lbu | InstructionKind::Lh | InstructionKind::Lhu | InstructionKind::Lw => {
            format!("{} = {};", rt.c_name(), memory(memory_type(insn.kind), insn))
        }
        InstructionKind::Sb | InstructionKind::Sh | InstructionKind::Sw => {
            format!("{} = {};", memory(memory_type(insn.kind), insn), rt.c_name())
        }
        InstructionKind::Lwl | InstructionKind::Lwr => format!(
            "{} = {}({}, {});",
            rt.c_name(),
            insn.kind.mnemonic(),
            rt.c_name(),
            address_expr(rs, imm)
        ),
        InstructionKind::Swl | InstructionKind::Swr => format!(
            "{}({}, {});",
            insn.kind.mnemonic(),
            address_expr(rs, imm),
            rt.c_name()
        ),

        InstructionKind::Mfc0 => format!(
            "{} = read_c0_{}();",
            rt.c_name(),
            cp0_name(rd.gpr().index(), insn.select)
        ),
        InstructionKind::Mtc0 => format!(
            "write_c0_{}({});",
            cp0_name(rd.gpr().index(), insn.select),
            rt.c_name()
        ),
        InstructionKind::Mult => format!(
            "HI_LO = (signed long long)(signed int){} * (signed int){};",
            rs.c_name(),
            rt.c_name()
        ),
        InstructionKind::Mfhi => format!("{} = (unsigned int)(HI_LO >> 32);", rd.c_name()),

        _ => format!("/* {} */", insn),
    }
}

/// Companion header declaring everything generated code refers to.
pub fn helper_header() -> String {
    let mut header: String = String::with_capacity(4096);
    header.push_str("#ifndef MIPSDEC_HELPER_H\n#define MIPSDEC_HELPER_H\n\n");

    for gpr in Gpr::all().filter(|gpr| *gpr != Gpr::Zero) {
        let _ = writeln!(header, "static unsigned int {};", Register::Gpr(gpr).c_name());
    }
    header.push('\n');
    for gpr in Gpr::all().filter(|gpr| *gpr != Gpr::Zero) {
        let _ = writeln!(header, "static unsigned int {};", Register::Shadow(gpr).c_name());
    }
    header.push_str("\nstatic signed long long HI_LO;\n\n");

    for name in CP0_REG_NAMES.iter() {
        let _ = writeln!(header, "unsigned int read_c0_{}(void);", name);
        let _ = writeln!(header, "void write_c0_{}(unsigned int value);", name);
    }
    header.push('\n');

    header.push_str("unsigned int lwl(unsigned int reg, unsigned int address);\n");
    header.push_str("unsigned int lwr(unsigned int reg, unsigned int address);\n");
    header.push_str("void swl(unsigned int address, unsigned int value);\n");
    header.push_str("void swr(unsigned int address, unsigned int value);\n");

    header.push_str("\n#endif\n");
    header
}
