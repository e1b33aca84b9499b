//! MIPS32 Instruction Decoder
//!
//! Table-driven decoding of 32-bit MIPS words into [`Instruction`] tree nodes.
//!
//! # Decoding Algorithm
//! 1. Split the word into its fixed fields (opcode, RS, RT, RD, SA, function, immediate)
//! 2. Find the first descriptor in [`OPCODE_TABLE`] whose key matches: primary opcode,
//!    plus the SPECIAL function, REGIMM code (RT field) or COP0 code (RS field) when the
//!    descriptor constrains it
//! 3. Fill only the operand fields the kind's [`OperandFormat`] declares meaningful
//! 4. Apply the fix-ups: branch/jump targets, `.hb` variants, `NOP`/`SSNOP` aliases of `SLL`
//!
//! Per-kind data (mnemonic, format, result field, delay-slot class) is an exhaustive
//! `match` in [`InstructionKind::info`], so adding a kind without describing it fails
//! to compile.
//!
//! # Memory Optimizations
//! - `InstructionKind` and the small descriptor enums use `#[repr(u8)]`
//! - `KindInfo` is `Copy` and built in registers, never allocated

use crate::decompiler::error::{DecompilerError, Result};
use crate::decompiler::instruction::Instruction;
use crate::decompiler::register::Register;

/// Every instruction the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstructionKind {
    Addiu,
    Addu,
    And,
    Andi,
    Beq,
    Beql,
    Bgez,
    Bgtz,
    Blez,
    Bltz,
    Bne,
    Bnel,
    J,
    Jalr,
    JalrHb,
    Jr,
    JrHb,
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lui,
    Lw,
    Lwl,
    Lwr,
    Mfc0,
    Mfhi,
    Mtc0,
    Mult,
    Nop,
    Or,
    Ori,
    Sb,
    Sh,
    Sll,
    Slti,
    Sltiu,
    Sltu,
    Sra,
    Srl,
    Ssnop,
    Subu,
    Sw,
    Swl,
    Swr,
    Xori,
}

/// Which operand fields of an instruction carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperandFormat {
    NoArg,
    RsRtRd,
    RsRt,
    /// RS, RT and a sign-extended immediate (also base/offset memory access).
    RsRtSi,
    RsSi,
    /// RS, RT and a zero-extended immediate.
    RsRtUi,
    RtUi,
    RtRdSa,
    RsRd,
    Rd,
    Rs,
    /// RT, CP0 register number in RD, and the select field.
    RtRdSel,
    /// 26-bit absolute jump field.
    Target,
}

/// Register an instruction defines, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResultField {
    None,
    Rd,
    Rs,
    Rt,
}

/// How the instruction after a control transfer executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DelaySlotClass {
    /// Not a control transfer.
    None,
    /// Branch-likely: the delay slot only executes when the branch is taken.
    Conditional,
    /// The delay slot always executes.
    Unconditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InstructionClass {
    /// Conditional PC-relative transfer; the only class that may own nested branches.
    Branch,
    /// Unconditional transfer: `J`, `JR`, `JALR`.
    Jump,
    Other,
}

/// Static data attached to an [`InstructionKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    pub mnemonic: &'static str,
    pub format: OperandFormat,
    pub result: ResultField,
    pub delay_slot: DelaySlotClass,
    pub class: InstructionClass,
}

const fn other(mnemonic: &'static str, format: OperandFormat, result: ResultField) -> KindInfo {
    KindInfo {
        mnemonic,
        format,
        result,
        delay_slot: DelaySlotClass::None,
        class: InstructionClass::Other,
    }
}

const fn branch(mnemonic: &'static str, format: OperandFormat, delay_slot: DelaySlotClass) -> KindInfo {
    KindInfo {
        mnemonic,
        format,
        result: ResultField::None,
        delay_slot,
        class: InstructionClass::Branch,
    }
}

const fn jump(mnemonic: &'static str, format: OperandFormat, result: ResultField) -> KindInfo {
    KindInfo {
        mnemonic,
        format,
        result,
        delay_slot: DelaySlotClass::Unconditional,
        class: InstructionClass::Jump,
    }
}

impl InstructionKind {
    /// Mnemonic, operand format, result field, delay-slot class and class of this kind.
    pub const fn info(self) -> KindInfo {
        use DelaySlotClass::{Conditional, Unconditional};
        use InstructionKind as K;
        use OperandFormat as F;
        use ResultField as R;

        match self {
            K::Addiu => other("addiu", F::RsRtSi, R::Rt),
            K::Addu => other("addu", F::RsRtRd, R::Rd),
            K::And => other("and", F::RsRtRd, R::Rd),
            K::Andi => other("andi", F::RsRtUi, R::Rt),
            K::Beq => branch("beq", F::RsRtSi, Unconditional),
            K::Beql => branch("beql", F::RsRtSi, Conditional),
            K::Bgez => branch("bgez", F::RsSi, Unconditional),
            K::Bgtz => branch("bgtz", F::RsSi, Unconditional),
            K::Blez => branch("blez", F::RsSi, Unconditional),
            K::Bltz => branch("bltz", F::RsSi, Unconditional),
            K::Bne => branch("bne", F::RsRtSi, Unconditional),
            K::Bnel => branch("bnel", F::RsRtSi, Conditional),
            K::J => jump("j", F::Target, R::None),
            K::Jalr => jump("jalr", F::RsRd, R::Rd),
            K::JalrHb => jump("jalr.hb", F::RsRd, R::Rd),
            K::Jr => jump("jr", F::Rs, R::None),
            K::JrHb => jump("jr.hb", F::Rs, R::None),
            K::Lb => other("lb", F::RsRtSi, R::Rt),
            K::Lbu => other("lbu", F::RsRtSi, R::Rt),
            K::Lh => other("lh", F::RsRtSi, R::Rt),
            K::Lhu => other("lhu", F::RsRtSi, R::Rt),
            K::Lui => other("lui", F::RtUi, R::Rt),
            K::Lw => other("lw", F::RsRtSi, R::Rt),
            K::Lwl => other("lwl", F::RsRtSi, R::Rt),
            K::Lwr => other("lwr", F::RsRtSi, R::Rt),
            K::Mfc0 => other("mfc0", F::RtRdSel, R::Rt),
            K::Mfhi => other("mfhi", F::Rd, R::Rd),
            K::Mtc0 => other("mtc0", F::RtRdSel, R::None),
            K::Mult => other("mult", F::RsRt, R::None),
            K::Nop => other("nop", F::NoArg, R::None),
            K::Or => other("or", F::RsRtRd, R::Rd),
            K::Ori => other("ori", F::RsRtUi, R::Rt),
            K::Sb => other("sb", F::RsRtSi, R::None),
            K::Sh => other("sh", F::RsRtSi, R::None),
            K::Sll => other("sll", F::RtRdSa, R::Rd),
            K::Slti => other("slti", F::RsRtSi, R::Rt),
            K::Sltiu => other("sltiu", F::RsRtSi, R::Rt),
            K::Sltu => other("sltu", F::RsRtRd, R::Rd),
            K::Sra => other("sra", F::RtRdSa, R::Rd),
            K::Srl => other("srl", F::RtRdSa, R::Rd),
            K::Ssnop => other("ssnop", F::NoArg, R::None),
            K::Subu => other("subu", F::RsRtRd, R::Rd),
            K::Sw => other("sw", F::RsRtSi, R::None),
            K::Swl => other("swl", F::RsRtSi, R::None),
            K::Swr => other("swr", F::RsRtSi, R::None),
            K::Xori => other("xori", F::RsRtUi, R::Rt),
        }
    }

    #[inline]
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    pub fn is_load(self) -> bool {
        matches!(
            self,
            Self::Lb | Self::Lbu | Self::Lh | Self::Lhu | Self::Lw | Self::Lwl | Self::Lwr
        )
    }

    pub fn is_store(self) -> bool {
        matches!(self, Self::Sb | Self::Sh | Self::Sw | Self::Swl | Self::Swr)
    }

    /// The kind testing the opposite condition, for kinds that have one.
    pub fn inverted(self) -> Option<Self> {
        match self {
            Self::Beq => Some(Self::Bne),
            Self::Bne => Some(Self::Beq),
            Self::Beql => Some(Self::Bnel),
            Self::Bnel => Some(Self::Beql),
            Self::Bgtz => Some(Self::Blez),
            Self::Blez => Some(Self::Bgtz),
            Self::Bltz => Some(Self::Bgez),
            Self::Bgez => Some(Self::Bltz),
            _ => None,
        }
    }
}

/// One row of the opcode table.
///
/// The primary opcode always has to match. `function`, `regimm` and `cop0` further
/// constrain the SPECIAL function field, the RT field of REGIMM words and the RS
/// field of COP0 words respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    pub opcode: u8,
    pub function: Option<u8>,
    pub regimm: Option<u8>,
    pub cop0: Option<u8>,
    pub kind: InstructionKind,
}

const OP_SPECIAL: u8 = 0x00;
const OP_REGIMM: u8 = 0x01;
const OP_COP0: u8 = 0x10;

const fn primary(opcode: u8, kind: InstructionKind) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode,
        function: None,
        regimm: None,
        cop0: None,
        kind,
    }
}

const fn special(function: u8, kind: InstructionKind) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode: OP_SPECIAL,
        function: Some(function),
        regimm: None,
        cop0: None,
        kind,
    }
}

const fn regimm(code: u8, kind: InstructionKind) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode: OP_REGIMM,
        function: None,
        regimm: Some(code),
        cop0: None,
        kind,
    }
}

const fn cop0(code: u8, kind: InstructionKind) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode: OP_COP0,
        function: None,
        regimm: None,
        cop0: Some(code),
        kind,
    }
}

/// The opcode table. `NOP`, `SSNOP` and the `.hb` variants are produced by
/// fix-ups and have no row of their own.
pub const OPCODE_TABLE: &[OpcodeDescriptor] = &[
    // SPECIAL
    special(0x00, InstructionKind::Sll),
    special(0x02, InstructionKind::Srl),
    special(0x03, InstructionKind::Sra),
    special(0x08, InstructionKind::Jr),
    special(0x09, InstructionKind::Jalr),
    special(0x10, InstructionKind::Mfhi),
    special(0x18, InstructionKind::Mult),
    special(0x21, InstructionKind::Addu),
    special(0x23, InstructionKind::Subu),
    special(0x24, InstructionKind::And),
    special(0x25, InstructionKind::Or),
    special(0x2B, InstructionKind::Sltu),
    // REGIMM
    regimm(0x00, InstructionKind::Bltz),
    regimm(0x01, InstructionKind::Bgez),
    // Primary
    primary(0x02, InstructionKind::J),
    primary(0x04, InstructionKind::Beq),
    primary(0x05, InstructionKind::Bne),
    primary(0x06, InstructionKind::Blez),
    primary(0x07, InstructionKind::Bgtz),
    primary(0x09, InstructionKind::Addiu),
    primary(0x0A, InstructionKind::Slti),
    primary(0x0B, InstructionKind::Sltiu),
    primary(0x0C, InstructionKind::Andi),
    primary(0x0D, InstructionKind::Ori),
    primary(0x0E, InstructionKind::Xori),
    primary(0x0F, InstructionKind::Lui),
    // COP0
    cop0(0x00, InstructionKind::Mfc0),
    cop0(0x04, InstructionKind::Mtc0),
    // Branch-likely
    primary(0x14, InstructionKind::Beql),
    primary(0x15, InstructionKind::Bnel),
    // Loads and stores
    primary(0x20, InstructionKind::Lb),
    primary(0x21, InstructionKind::Lh),
    primary(0x22, InstructionKind::Lwl),
    primary(0x23, InstructionKind::Lw),
    primary(0x24, InstructionKind::Lbu),
    primary(0x25, InstructionKind::Lhu),
    primary(0x26, InstructionKind::Lwr),
    primary(0x28, InstructionKind::Sb),
    primary(0x29, InstructionKind::Sh),
    primary(0x2A, InstructionKind::Swl),
    primary(0x2B, InstructionKind::Sw),
    primary(0x2E, InstructionKind::Swr),
];

/// Bit 10 of `JR`/`JALR`: the hazard-barrier hint.
const HAZARD_BARRIER_BIT: u32 = 1 << 10;

/// Raw fields of an instruction word, extracted without interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordFields {
    pub opcode: u8,
    pub rs: u8,
    pub rt: u8,
    pub rd: u8,
    pub shift_amount: u8,
    pub function: u8,
    pub immediate: u16,
    pub select: u8,
    pub target: u32,
}

impl WordFields {
    #[inline] // Hot path - called for every word
    pub fn extract(word: u32) -> Self {
        Self {
            opcode: ((word >> 26) & 0x3F) as u8,
            rs: ((word >> 21) & 0x1F) as u8,
            rt: ((word >> 16) & 0x1F) as u8,
            rd: ((word >> 11) & 0x1F) as u8,
            shift_amount: ((word >> 6) & 0x1F) as u8,
            function: (word & 0x3F) as u8,
            immediate: (word & 0xFFFF) as u16,
            select: (word & 0x7) as u8,
            target: word & 0x03FF_FFFF,
        }
    }
}

impl OpcodeDescriptor {
    /// Whether this row's key matches the fields of a word.
    #[inline]
    pub fn matches(&self, fields: &WordFields) -> bool {
        self.opcode == fields.opcode
            && self.function.map_or(true, |f| f == fields.function)
            && self.regimm.map_or(true, |code| code == fields.rt)
            && self.cop0.map_or(true, |code| code == fields.rs)
    }
}

/// First descriptor matching the word, if any.
#[inline]
pub fn lookup_descriptor(word: u32) -> Option<&'static OpcodeDescriptor> {
    let fields: WordFields = WordFields::extract(word);
    OPCODE_TABLE.iter().find(|descriptor| descriptor.matches(&fields))
}

/// `address + 4 + (sign_extend(immediate) << 2)`
#[inline]
pub fn branch_target(address: u32, immediate: i16) -> u32 {
    let displacement: u32 = ((immediate as i32) << 2) as u32;
    address.wrapping_add(4).wrapping_add(displacement)
}

/// `((address + 4) & !0x0FFF_FFFF) | (field << 2)`
#[inline]
pub fn absolute_jump_target(address: u32, field: u32) -> u32 {
    (address.wrapping_add(4) & !0x0FFF_FFFF) | ((field & 0x03FF_FFFF) << 2)
}

impl Instruction {
    /// Decode a 32-bit MIPS instruction word into a tree node.
    ///
    /// # Algorithm
    /// 1. Extract the fixed fields of the word
    /// 2. Look up the first matching row of [`OPCODE_TABLE`]
    /// 3. Fill the operand fields the kind's format declares
    /// 4. Compute `jump_target` for branches and `J`, then apply the `.hb` and
    ///    `NOP`/`SSNOP` reclassifications
    ///
    /// # Arguments
    /// * `word` - 32-bit instruction word, already converted from big-endian
    /// * `address` - Address of the word in the mapped image
    ///
    /// # Returns
    /// `Result<Instruction>` - The decoded leaf instruction
    ///
    /// # Errors
    /// Returns [`DecompilerError::InstructionDecode`] if no descriptor matches.
    ///
    /// # Examples
    /// ```rust
    /// use mipsdec_core::decompiler::decoder::InstructionKind;
    /// use mipsdec_core::decompiler::instruction::Instruction;
    /// use mipsdec_core::decompiler::register::Register;
    ///
    /// let insn = Instruction::decode(0x27BD_FFE0, 0x8000_0000).unwrap();
    /// assert_eq!(insn.kind, InstructionKind::Addiu);
    /// assert_eq!(insn.rt, Register::SP);
    /// assert_eq!(insn.immediate, -32);
    /// ```
    #[inline] // Hot path - called for every word of the function
    pub fn decode(word: u32, address: u32) -> Result<Instruction> {
        let descriptor: &OpcodeDescriptor =
            lookup_descriptor(word).ok_or_else(|| DecompilerError::instruction_decode(address, word))?;
        let fields: WordFields = WordFields::extract(word);

        let mut insn: Instruction = Instruction::new(address, word, descriptor.kind);
        let rs: Register = Register::from_index(fields.rs);
        let rt: Register = Register::from_index(fields.rt);
        let rd: Register = Register::from_index(fields.rd);

        match descriptor.kind.info().format {
            OperandFormat::NoArg => {}
            OperandFormat::RsRtRd => {
                insn.rs = rs;
                insn.rt = rt;
                insn.rd = rd;
            }
            OperandFormat::RsRt => {
                insn.rs = rs;
                insn.rt = rt;
            }
            OperandFormat::RsRtSi => {
                insn.rs = rs;
                insn.rt = rt;
                insn.immediate = fields.immediate as i16;
            }
            OperandFormat::RsSi => {
                insn.rs = rs;
                insn.immediate = fields.immediate as i16;
            }
            OperandFormat::RsRtUi => {
                insn.rs = rs;
                insn.rt = rt;
                insn.unsigned_immediate = fields.immediate;
            }
            OperandFormat::RtUi => {
                insn.rt = rt;
                insn.unsigned_immediate = fields.immediate;
            }
            OperandFormat::RtRdSa => {
                insn.rt = rt;
                insn.rd = rd;
                insn.shift_amount = fields.shift_amount;
            }
            OperandFormat::RsRd => {
                insn.rs = rs;
                insn.rd = rd;
            }
            OperandFormat::Rd => {
                insn.rd = rd;
            }
            OperandFormat::Rs => {
                insn.rs = rs;
            }
            OperandFormat::RtRdSel => {
                insn.rt = rt;
                insn.rd = rd;
                insn.select = fields.select;
            }
            OperandFormat::Target => {}
        }

        match descriptor.kind.info().class {
            InstructionClass::Branch => {
                insn.jump_target = Some(branch_target(address, insn.immediate));
            }
            InstructionClass::Jump if descriptor.kind == InstructionKind::J => {
                insn.jump_target = Some(absolute_jump_target(address, fields.target));
            }
            _ => {}
        }

        match descriptor.kind {
            InstructionKind::Jr if word & HAZARD_BARRIER_BIT != 0 => {
                insn.kind = InstructionKind::JrHb;
            }
            InstructionKind::Jalr if word & HAZARD_BARRIER_BIT != 0 => {
                insn.kind = InstructionKind::JalrHb;
            }
            InstructionKind::Sll if insn.rt.is_zero() && insn.rd.is_zero() => {
                match insn.shift_amount {
                    0 => insn.become_no_op(InstructionKind::Nop),
                    1 => insn.become_no_op(InstructionKind::Ssnop),
                    _ => {}
                }
            }
            _ => {}
        }

        Ok(insn)
    }
}
