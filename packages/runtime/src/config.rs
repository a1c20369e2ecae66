//! Bridge configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostlink_http::NetConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `argv[0]` as seen by the guest.
    pub program_name: String,

    /// Passed whole as `argv[1]` when non-empty.
    pub query: String,

    /// Reported by `gethostname`.
    pub hostname: String,

    /// Link imports the bridge does not provide as functions that trap when
    /// called, instead of failing instantiation.
    pub trap_unknown_imports: bool,

    /// Backing file for the guest filesystem. `None` keeps files in memory.
    pub store_path: Option<PathBuf>,

    pub net: NetConfig,
    pub fs: FsConfig,
    pub frames: FrameConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program_name: "guest.wasm".to_string(),
            query: String::new(),
            hostname: "localhost".to_string(),
            trap_unknown_imports: true,
            store_path: None,
            net: NetConfig::default(),
            fs: FsConfig::default(),
            frames: FrameConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The guest's argument vector.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.program_name.clone()];
        if !self.query.is_empty() {
            args.push(self.query.clone());
        }
        args
    }
}

/// How `fd_read` positions reads within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Every read starts at offset 0 and returns up to the buffer size.
    #[default]
    WholeFile,
    /// Reads start at the descriptor's offset and advance it.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// First descriptor handed out by `path_open`.
    pub first_descriptor: u32,
    pub read_mode: ReadMode,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            first_descriptor: 64,
            read_mode: ReadMode::WholeFile,
        }
    }
}

/// Pacing for the per-frame step function a guest may install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub interval_ms: u64,

    /// Stop after this many frames. `None` runs until the guest stops.
    pub max_frames: Option<u64>,
}

impl FrameConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            interval_ms: 16,
            max_frames: None,
        }
    }
}
