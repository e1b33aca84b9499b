//! Decompiler Configuration
//!
//! Tunables for a decompilation run, loadable from JSON. Every field has a
//! default, so a config file only needs to name what it changes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::decompiler::binary::DEFAULT_LOAD_BASE;
use crate::decompiler::optimizer::OptimizationLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompilerConfig {
    /// Mapped base address of the binary image
    pub load_base: u32,
    /// Which restructuring passes run
    pub optimization_level: OptimizationLevel,
    /// Hard cap on restructuring iterations
    pub max_optimization_iterations: u32,
    /// Largest block (instructions, no-ops excluded) that small-block cloning copies
    pub clone_block_limit: usize,
    /// Largest distance below the frame size still treated as a register save slot
    pub frame_slot_window: u32,
    /// Recursion bound of the register value resolver
    pub max_resolve_depth: u32,
    /// Header included at the top of generated output
    pub helper_include: Option<String>,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            load_base: DEFAULT_LOAD_BASE,
            optimization_level: OptimizationLevel::Aggressive,
            max_optimization_iterations: 10_000,
            clone_block_limit: 10,
            frame_slot_window: 24,
            max_resolve_depth: 8,
            helper_include: Some("mipsdec_helper.h".to_string()),
        }
    }
}

impl DecompilerConfig {
    /// Load a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON file
    ///
    /// # Returns
    /// `Result<DecompilerConfig>` - Parsed configuration, defaults filled in
    pub fn from_file(path: &Path) -> Result<Self> {
        let content: String = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: DecompilerConfig = serde_json::from_str(json).context("Invalid decompiler config")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DecompilerConfig::from_json(r#"{ "clone_block_limit": 4, "optimization_level": "Basic" }"#).unwrap();
        assert_eq!(config.clone_block_limit, 4);
        assert_eq!(config.optimization_level, OptimizationLevel::Basic);
        assert_eq!(config.load_base, DEFAULT_LOAD_BASE);
        assert_eq!(config.max_optimization_iterations, 10_000);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        assert!(DecompilerConfig::from_json(r#"{ "optimization_level": "Extreme" }"#).is_err());
    }
}
