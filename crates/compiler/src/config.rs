//! Compiler configuration.
//!
//! A small builder-pattern struct for the knobs that don't belong on
//! every call site: the VM's starting memory size, and which
//! intermediate artifacts (AST, IR) get dumped for debugging. Defaults
//! match the runtime's own defaults, so an empty config behaves exactly
//! like no config at all.

use serde::Deserialize;
use std::fmt;

/// Cells the stack machine's linear memory starts with. The language
/// guarantees at least this many are available before any `GROW`.
pub const DEFAULT_MEMORY_CELLS: usize = 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    #[serde(default = "default_memory_cells")]
    pub memory_cells: usize,
    #[serde(default)]
    pub dump_ast: bool,
    #[serde(default)]
    pub dump_ir: bool,
}

fn default_memory_cells() -> usize {
    DEFAULT_MEMORY_CELLS
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            memory_cells: DEFAULT_MEMORY_CELLS,
            dump_ast: false,
            dump_ir: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_memory_cells(mut self, cells: usize) -> Self {
        self.memory_cells = cells;
        self
    }

    pub fn with_dump_ast(mut self, on: bool) -> Self {
        self.dump_ast = on;
        self
    }

    pub fn with_dump_ir(mut self, on: bool) -> Self {
        self.dump_ir = on;
        self
    }

    /// Parse a configuration from a TOML document, e.g. the contents of
    /// a project's `goxc.toml`.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_runtime_default() {
        let cfg = CompilerConfig::default();
        assert_eq!(cfg.memory_cells, DEFAULT_MEMORY_CELLS);
        assert!(!cfg.dump_ast);
        assert!(!cfg.dump_ir);
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = CompilerConfig::new().with_memory_cells(4096).with_dump_ir(true);
        assert_eq!(cfg.memory_cells, 4096);
        assert!(cfg.dump_ir);
        assert!(!cfg.dump_ast);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = CompilerConfig::from_toml("dump_ir = true\n").unwrap();
        assert!(cfg.dump_ir);
        assert_eq!(cfg.memory_cells, DEFAULT_MEMORY_CELLS);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(CompilerConfig::from_toml("not valid [[[ toml").is_err());
    }
}
