//! MIPS Register File
//!
//! The 32 general-purpose registers in their o32 ABI names, plus one "shadow"
//! register per GPR. Shadow registers never appear in decoded machine code; the
//! delay-slot resolver introduces them to hold a value that a jump must read
//! before its delay-slot instruction overwrites the original register.
//!
//! # Memory Optimizations
//! - `Gpr` uses `#[repr(u8)]` (5 bits of information, 1 byte of storage)
//! - `Register` is `Copy` and two bytes wide, so instructions carry registers by value

use std::fmt;

/// Architectural general-purpose register, numbered as in the instruction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Gpr {
    Zero = 0,
    At = 1,
    V0 = 2,
    V1 = 3,
    A0 = 4,
    A1 = 5,
    A2 = 6,
    A3 = 7,
    T0 = 8,
    T1 = 9,
    T2 = 10,
    T3 = 11,
    T4 = 12,
    T5 = 13,
    T6 = 14,
    T7 = 15,
    S0 = 16,
    S1 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    T8 = 24,
    T9 = 25,
    K0 = 26,
    K1 = 27,
    Gp = 28,
    Sp = 29,
    Fp = 30,
    Ra = 31,
}

/// Encoding order, so a 5-bit field indexes straight into it.
const GPRS: [Gpr; 32] = [
    Gpr::Zero,
    Gpr::At,
    Gpr::V0,
    Gpr::V1,
    Gpr::A0,
    Gpr::A1,
    Gpr::A2,
    Gpr::A3,
    Gpr::T0,
    Gpr::T1,
    Gpr::T2,
    Gpr::T3,
    Gpr::T4,
    Gpr::T5,
    Gpr::T6,
    Gpr::T7,
    Gpr::S0,
    Gpr::S1,
    Gpr::S2,
    Gpr::S3,
    Gpr::S4,
    Gpr::S5,
    Gpr::S6,
    Gpr::S7,
    Gpr::T8,
    Gpr::T9,
    Gpr::K0,
    Gpr::K1,
    Gpr::Gp,
    Gpr::Sp,
    Gpr::Fp,
    Gpr::Ra,
];

const GPR_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

/// CP0 (System Control Coprocessor) register names indexed by register number,
/// in the spelling used by the `read_c0_*` / `write_c0_*` accessors.
pub const CP0_REG_NAMES: [&str; 32] = [
    "index",       // 0
    "random",      // 1
    "entrylo0",    // 2
    "entrylo1",    // 3
    "context",     // 4
    "pagemask",    // 5
    "wired",       // 6
    "info",        // 7
    "badvaddr",    // 8
    "count",       // 9
    "entryhi",     // 10
    "compare",     // 11
    "status",      // 12
    "cause",       // 13
    "epc",         // 14
    "prid",        // 15
    "config",      // 16
    "lladdr",      // 17
    "watchlo",     // 18
    "watchhi",     // 19
    "xcontext",    // 20
    "framemask",   // 21
    "diagnostic",  // 22
    "debug",       // 23
    "depc",        // 24
    "performance", // 25
    "ecc",         // 26
    "cacheerr",    // 27
    "taglo",       // 28
    "taghi",       // 29
    "errorepc",    // 30
    "desave",      // 31
];

impl Gpr {
    /// Look up a register by its 5-bit encoding. Upper bits are ignored.
    #[inline] // Hot path - called three times per decoded word
    pub fn from_index(index: u8) -> Self {
        GPRS[(index & 0x1F) as usize]
    }

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// ABI name without any prefix (`"t9"`, `"ra"`).
    #[inline]
    pub fn name(self) -> &'static str {
        GPR_NAMES[self as usize]
    }

    /// Registers a called function must preserve (o32 ABI).
    pub fn is_callee_saved(self) -> bool {
        matches!(
            self,
            Gpr::S0
                | Gpr::S1
                | Gpr::S2
                | Gpr::S3
                | Gpr::S4
                | Gpr::S5
                | Gpr::S6
                | Gpr::S7
                | Gpr::Gp
                | Gpr::Sp
                | Gpr::Fp
        )
    }

    /// All registers in encoding order.
    pub fn all() -> impl Iterator<Item = Gpr> {
        GPRS.iter().copied()
    }
}

/// A register operand: either an architectural GPR or the shadow copy of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    Gpr(Gpr),
    /// Delay-slot backup of a GPR, introduced by clash repair.
    Shadow(Gpr),
}

impl Register {
    pub const ZERO: Register = Register::Gpr(Gpr::Zero);
    pub const V0: Register = Register::Gpr(Gpr::V0);
    pub const A0: Register = Register::Gpr(Gpr::A0);
    pub const T9: Register = Register::Gpr(Gpr::T9);
    pub const SP: Register = Register::Gpr(Gpr::Sp);
    pub const RA: Register = Register::Gpr(Gpr::Ra);

    #[inline]
    pub fn from_index(index: u8) -> Self {
        Register::Gpr(Gpr::from_index(index))
    }

    /// The architectural register this operand refers to (or backs up).
    #[inline]
    pub fn gpr(self) -> Gpr {
        match self {
            Register::Gpr(gpr) | Register::Shadow(gpr) => gpr,
        }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self == Register::ZERO
    }

    #[inline]
    pub fn is_shadow(self) -> bool {
        matches!(self, Register::Shadow(_))
    }

    /// The shadow register backing this one. Shadows map to themselves.
    #[inline]
    pub fn shadow(self) -> Self {
        Register::Shadow(self.gpr())
    }

    /// Whether a call may leave this register with an unknown value.
    pub fn is_clobbered_by_call(self) -> bool {
        match self {
            Register::Gpr(gpr) => gpr != Gpr::Zero && !gpr.is_callee_saved(),
            Register::Shadow(_) => false,
        }
    }

    /// Name of the pseudo-C variable holding this register.
    ///
    /// The zero register has no variable and renders as the literal `0`.
    pub fn c_name(self) -> String {
        match self {
            Register::Gpr(Gpr::Zero) => "0".to_string(),
            Register::Gpr(gpr) => format!("REG_{}", gpr.name()),
            Register::Shadow(gpr) => format!("REG_{}_dsb", gpr.name()),
        }
    }
}

impl From<Gpr> for Register {
    fn from(gpr: Gpr) -> Self {
        Register::Gpr(gpr)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Gpr(gpr) => f.write_str(gpr.name()),
            Register::Shadow(gpr) => write!(f, "{}_dsb", gpr.name()),
        }
    }
}

/// Accessor suffix for a CP0 register and select, e.g. `status` or `config1`.
pub fn cp0_name(register: u8, select: u8) -> String {
    let base: &str = CP0_REG_NAMES[(register & 0x1F) as usize];
    if select == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, select)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_order_matches_discriminants() {
        for (index, gpr) in Gpr::all().enumerate() {
            assert_eq!(gpr.index() as usize, index);
            assert_eq!(Gpr::from_index(index as u8), gpr);
        }
    }

    #[test]
    fn test_c_names() {
        assert_eq!(Register::ZERO.c_name(), "0");
        assert_eq!(Register::T9.c_name(), "REG_t9");
        assert_eq!(Register::T9.shadow().c_name(), "REG_t9_dsb");
        assert_eq!(Register::RA.to_string(), "ra");
    }

    #[test]
    fn test_call_clobber_set() {
        assert!(Register::T9.is_clobbered_by_call());
        assert!(Register::V0.is_clobbered_by_call());
        assert!(!Register::SP.is_clobbered_by_call());
        assert!(!Register::Gpr(Gpr::S3).is_clobbered_by_call());
        assert!(!Register::ZERO.is_clobbered_by_call());
    }

    #[test]
    fn test_cp0_names() {
        assert_eq!(cp0_name(12, 0), "status");
        assert_eq!(cp0_name(16, 1), "config1");
    }
}
