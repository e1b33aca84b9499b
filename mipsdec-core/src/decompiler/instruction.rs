//! Instruction tree node.
//!
//! An [`Instruction`] is both a decoded machine instruction and a node of the
//! function's control-flow tree: conditional branches own an `if_branch` and an
//! `else_branch` sequence once delay-slot resolution and restructuring have run.

use std::fmt;

use smallvec::SmallVec;

use crate::decompiler::decoder::{
    DelaySlotClass, InstructionClass, InstructionKind, KindInfo, OperandFormat, ResultField,
};
use crate::decompiler::register::Register;

/// Address carried by instructions that were synthesized rather than decoded.
pub const SYNTHETIC_ADDRESS: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Source address, or [`SYNTHETIC_ADDRESS`].
    pub address: u32,
    /// Original word (0 for synthetic instructions).
    pub raw: u32,
    pub kind: InstructionKind,
    pub rs: Register,
    pub rt: Register,
    pub rd: Register,
    pub immediate: i16,
    pub unsigned_immediate: u16,
    pub shift_amount: u8,
    pub select: u8,
    /// Static target of branches and `J`. `JR`/`JALR` have none.
    pub jump_target: Option<u32>,
    /// Derived: some live jump in the tree targets this address.
    pub is_jump_target: bool,
    pub if_branch: Vec<Instruction>,
    pub else_branch: Vec<Instruction>,
    pub delay_slot_resolved: bool,
    /// The jump target is represented by tree structure and is no longer a live edge.
    pub ignore_jump: bool,
}

impl Instruction {
    /// Leaf instruction of the given kind with every operand cleared.
    pub fn new(address: u32, raw: u32, kind: InstructionKind) -> Self {
        Self {
            address,
            raw,
            kind,
            rs: Register::ZERO,
            rt: Register::ZERO,
            rd: Register::ZERO,
            immediate: 0,
            unsigned_immediate: 0,
            shift_amount: 0,
            select: 0,
            jump_target: None,
            is_jump_target: false,
            if_branch: Vec::new(),
            else_branch: Vec::new(),
            delay_slot_resolved: false,
            ignore_jump: false,
        }
    }

    /// Synthetic closing jump appended to a resolved branch's `if_branch`.
    pub fn synthetic_jump(target: u32) -> Self {
        let mut insn: Instruction = Self::new(SYNTHETIC_ADDRESS, 0, InstructionKind::J);
        insn.jump_target = Some(target);
        insn.delay_slot_resolved = true;
        insn
    }

    /// Synthetic `addu to, from, zero` used to preserve a value across a delay slot.
    pub fn register_move(from: Register, to: Register) -> Self {
        let mut insn: Instruction = Self::new(SYNTHETIC_ADDRESS, 0, InstructionKind::Addu);
        insn.rs = from;
        insn.rt = Register::ZERO;
        insn.rd = to;
        insn
    }

    /// `NOP` standing in for an elided instruction, so its label survives.
    pub fn label_placeholder(address: u32, is_jump_target: bool) -> Self {
        let mut insn: Instruction = Self::new(address, 0, InstructionKind::Nop);
        insn.is_jump_target = is_jump_target;
        insn
    }

    pub(crate) fn become_no_op(&mut self, kind: InstructionKind) {
        self.kind = kind;
        self.rt = Register::ZERO;
        self.rd = Register::ZERO;
        self.shift_amount = 0;
    }

    #[inline]
    pub fn info(&self) -> KindInfo {
        self.kind.info()
    }

    #[inline]
    pub fn class(&self) -> InstructionClass {
        self.kind.info().class
    }

    #[inline]
    pub fn delay_slot_class(&self) -> DelaySlotClass {
        self.kind.info().delay_slot
    }

    #[inline]
    pub fn is_branch(&self) -> bool {
        self.class() == InstructionClass::Branch
    }

    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.address == SYNTHETIC_ADDRESS
    }

    #[inline]
    pub fn is_no_op(&self) -> bool {
        matches!(self.kind, InstructionKind::Nop | InstructionKind::Ssnop)
    }

    pub fn has_branches(&self) -> bool {
        !self.if_branch.is_empty() || !self.else_branch.is_empty()
    }

    /// `J`, `JR` or `JR.hb`: control never falls through to the next instruction.
    pub fn is_unconditional_transfer(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::J | InstructionKind::Jr | InstructionKind::JrHb
        )
    }

    /// `J` whose target is still a live edge.
    pub fn is_live_absolute_jump(&self) -> bool {
        self.kind == InstructionKind::J && !self.ignore_jump && self.jump_target.is_some()
    }

    /// `jr ra`
    pub fn is_return(&self) -> bool {
        matches!(self.kind, InstructionKind::Jr | InstructionKind::JrHb) && self.rs == Register::RA
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, InstructionKind::Jalr | InstructionKind::JalrHb)
    }

    /// `addu reg_dsb, reg, zero` inserted ahead of a jump. It has no encoding of its own.
    pub fn is_shadow_move(&self) -> bool {
        self.kind == InstructionKind::Addu && self.rd.is_shadow()
    }

    /// Target this instruction contributes to jump-source counting.
    #[inline]
    pub fn live_jump_target(&self) -> Option<u32> {
        if self.ignore_jump {
            None
        } else {
            self.jump_target
        }
    }

    /// Register written by this instruction. Writes to `zero` define nothing.
    pub fn result_register(&self) -> Option<Register> {
        let register: Register = match self.info().result {
            ResultField::None => return None,
            ResultField::Rd => self.rd,
            ResultField::Rs => self.rs,
            ResultField::Rt => self.rt,
        };
        if register.is_zero() {
            None
        } else {
            Some(register)
        }
    }

    #[inline]
    pub fn defines(&self, register: Register) -> bool {
        self.result_register() == Some(register)
    }

    /// General-purpose registers read by this instruction, `zero` excluded.
    pub fn source_registers(&self) -> SmallVec<[Register; 2]> {
        let mut sources: SmallVec<[Register; 2]> = SmallVec::new();
        let result: ResultField = self.info().result;
        let mut push = |field: ResultField, register: Register| {
            if field != result && !register.is_zero() && !sources.contains(&register) {
                sources.push(register);
            }
        };

        match self.info().format {
            OperandFormat::NoArg | OperandFormat::RtUi | OperandFormat::Rd | OperandFormat::Target => {}
            OperandFormat::RsRtRd | OperandFormat::RsRt | OperandFormat::RsRtSi | OperandFormat::RsRtUi => {
                push(ResultField::Rs, self.rs);
                push(ResultField::Rt, self.rt);
            }
            OperandFormat::RsSi | OperandFormat::RsRd | OperandFormat::Rs => {
                push(ResultField::Rs, self.rs);
            }
            OperandFormat::RtRdSa => {
                push(ResultField::Rt, self.rt);
            }
            OperandFormat::RtRdSel => {
                // RD is a CP0 register number here
                push(ResultField::Rt, self.rt);
            }
        }

        // Unaligned loads merge into their destination
        if matches!(self.kind, InstructionKind::Lwl | InstructionKind::Lwr)
            && !self.rt.is_zero()
            && !sources.contains(&self.rt)
        {
            sources.push(self.rt);
        }

        sources
    }

    #[inline]
    pub fn reads(&self, register: Register) -> bool {
        self.source_registers().contains(&register)
    }

    /// Whether this instruction or anything nested under it defines `register`.
    pub fn defines_anywhere(&self, register: Register) -> bool {
        self.defines(register)
            || self
                .if_branch
                .iter()
                .chain(self.else_branch.iter())
                .any(|insn| insn.defines_anywhere(register))
    }

    /// Swap the branch condition for its opposite. Returns `false` if the kind has none.
    pub fn invert_condition(&mut self) -> bool {
        match self.kind.inverted() {
            Some(kind) => {
                self.kind = kind;
                true
            }
            None => false,
        }
    }

    /// Same operation on the same operands, ignoring address, labels and nesting.
    pub fn same_operation(&self, other: &Instruction) -> bool {
        self.kind == other.kind
            && self.rs == other.rs
            && self.rt == other.rt
            && self.rd == other.rd
            && self.immediate == other.immediate
            && self.unsigned_immediate == other.unsigned_immediate
            && self.shift_amount == other.shift_amount
            && self.select == other.select
            && self.jump_target == other.jump_target
    }

    /// Number of instructions in this subtree, `NOP`/`SSNOP` excluded.
    pub fn weight(&self) -> usize {
        let own: usize = usize::from(!self.is_no_op());
        own + self
            .if_branch
            .iter()
            .chain(self.else_branch.iter())
            .map(Instruction::weight)
            .sum::<usize>()
    }

    /// Number of instructions in this subtree, including no-ops.
    pub fn count(&self) -> usize {
        1 + self
            .if_branch
            .iter()
            .chain(self.else_branch.iter())
            .map(Instruction::count)
            .sum::<usize>()
    }
}

/// Disassembly in conventional MIPS syntax, without address or nested branches.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic: &str = self.kind.mnemonic();
        if self.kind.is_load() || self.kind.is_store() {
            return write!(f, "{} {},{}({})", mnemonic, self.rt, self.immediate, self.rs);
        }

        match self.info().format {
            OperandFormat::NoArg => f.write_str(mnemonic),
            OperandFormat::RsRtRd => write!(f, "{} {},{},{}", mnemonic, self.rd, self.rs, self.rt),
            OperandFormat::RsRt => write!(f, "{} {},{}", mnemonic, self.rs, self.rt),
            OperandFormat::RsRtSi if self.is_branch() => write!(
                f,
                "{} {},{},0x{:08x}",
                mnemonic,
                self.rs,
                self.rt,
                self.jump_target.unwrap_or_default()
            ),
            OperandFormat::RsRtSi => write!(f, "{} {},{},{}", mnemonic, self.rt, self.rs, self.immediate),
            OperandFormat::RsSi => write!(
                f,
                "{} {},0x{:08x}",
                mnemonic,
                self.rs,
                self.jump_target.unwrap_or_default()
            ),
            OperandFormat::RsRtUi => write!(
                f,
                "{} {},{},0x{:x}",
                mnemonic, self.rt, self.rs, self.unsigned_immediate
            ),
            OperandFormat::RtUi => write!(f, "{} {},0x{:x}", mnemonic, self.rt, self.unsigned_immediate),
            OperandFormat::RtRdSa => write!(f, "{} {},{},{}", mnemonic, self.rd, self.rt, self.shift_amount),
            OperandFormat::RsRd => write!(f, "{} {},{}", mnemonic, self.rd, self.rs),
            OperandFormat::Rd => write!(f, "{} {}", mnemonic, self.rd),
            OperandFormat::Rs => write!(f, "{} {}", mnemonic, self.rs),
            OperandFormat::RtRdSel => write!(
                f,
                "{} {},${},{}",
                mnemonic,
                self.rt,
                self.rd.gpr().index(),
                self.select
            ),
            OperandFormat::Target => write!(f, "{} 0x{:08x}", mnemonic, self.jump_target.unwrap_or_default()),
        }
    }
}
