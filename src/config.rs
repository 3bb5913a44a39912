use serde::{Deserialize, Serialize};

use crate::error::{BpError, Result};
use crate::head::HEAD_SIZE;

/// Default branching factor for freshly created trees.
pub const DEFAULT_PAGE_SIZE: u16 = 64;

/// When the backing file is fsynced relative to data-block and head-block
/// writes. The original source left this unstated; this implementation
/// makes it an explicit, documented knob (see design notes on durability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FsyncPolicy {
    /// Never fsync; rely on the OS page cache and normal process exit.
    Never,
    /// fsync after every block write (data or head). Slowest, most durable.
    AfterEveryWrite,
    /// fsync once, after the head block of a mutation has been written.
    /// Default: bounds the durability window to a single mutation without
    /// paying for an fsync per intermediate page write.
    #[default]
    AfterHeadBlock,
}

/// Tunables for opening or creating a tree. `page_size` only has effect the
/// first time a file is created; reopening an existing file always honors
/// the `page_size` persisted in its head block and logs a warning if the
/// requested value differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub page_size: u16,
    pub fsync_policy: FsyncPolicy,
    /// Byte stride of the backward head-block scan on `open`. Reserved for
    /// a future variable-size head block; today the only valid value is
    /// the fixed encoded head size, and `validate` rejects anything else.
    #[serde(default = "default_head_block_stride")]
    pub head_block_stride: u64,
}

fn default_head_block_stride() -> u64 {
    HEAD_SIZE
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            fsync_policy: FsyncPolicy::default(),
            head_block_stride: HEAD_SIZE,
        }
    }
}

impl TreeConfig {
    /// Loads a configuration from a TOML file. Missing fields fall back to
    /// `TreeConfig::default()`'s values.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse as
    /// valid TOML matching this shape.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| BpError::File(format!("invalid config: {e}")))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size < 3 {
            return Err(BpError::File(format!(
                "page_size must be at least 3 to allow a split, got {}",
                self.page_size
            )));
        }
        if self.head_block_stride != HEAD_SIZE {
            return Err(BpError::File(format!(
                "head_block_stride must be {HEAD_SIZE}, got {}",
                self.head_block_stride
            )));
        }
        Ok(())
    }
}
