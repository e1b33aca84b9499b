//! Analysis Module
//!
//! Tree queries shared by the restructuring passes, delay-slot resolution and
//! the register value resolver used to name indirect call targets.

pub mod control_flow;
pub mod data_flow;
pub mod delay_slot;

// Re-export commonly used types
pub use control_flow::{Arm, ControlFlowAnalyzer, JumpSources, JumpTargetSet, Path};
pub use data_flow::RegisterValueResolver;
pub use delay_slot::{DelaySlotResolver, DelaySlotStats};
