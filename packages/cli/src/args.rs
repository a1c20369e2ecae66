use std::path::PathBuf;

use clap::Parser;
use hostlink_runtime::{BridgeConfig, ReadMode, Result};

use crate::logging::LogFormat;

/// hostlink - run a WASI guest against the hostlink bridge
#[derive(Parser, Debug)]
#[command(name = "hostlink")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Guest module, binary or text format
    pub module: PathBuf,

    /// JSON bridge configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// File backing the guest filesystem (in memory when omitted)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Query string handed to the guest as argv[1]
    #[arg(long)]
    pub query: Option<String>,

    /// Stop the frame loop after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Delay between frames
    #[arg(long)]
    pub frame_interval_ms: Option<u64>,

    /// Read files from the descriptor offset instead of the start
    #[arg(long)]
    pub sequential_reads: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// The config file, if any, with command-line overrides applied.
    pub fn bridge_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };

        if let Some(name) = self.module.file_name() {
            config.program_name = name.to_string_lossy().into_owned();
        }
        if let Some(query) = &self.query {
            config.query = query.clone();
        }
        if let Some(store) = &self.store {
            config.store_path = Some(store.clone());
        }
        if let Some(max_frames) = self.max_frames {
            config.frames.max_frames = Some(max_frames);
        }
        if let Some(interval) = self.frame_interval_ms {
            config.frames.interval_ms = interval;
        }
        if self.sequential_reads {
            config.fs.read_mode = ReadMode::Sequential;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_bridge_config() {
        let args = Args::try_parse_from(["hostlink", "build/app.wasm"]).unwrap();
        let config = args.bridge_config().unwrap();

        assert_eq!(config.program_name, "app.wasm");
        assert_eq!(config.query, "");
        assert_eq!(config.store_path, None);
        assert_eq!(config.fs.read_mode, ReadMode::WholeFile);
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(
            &path,
            r#"{"query": "from=file", "hostname": "box", "frames": {"interval_ms": 33}}"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "hostlink",
            "app.wasm",
            "--config",
            path.to_str().unwrap(),
            "--query",
            "from=flag",
            "--store",
            "saves.json",
            "--max-frames",
            "10",
            "--sequential-reads",
            "--log-format",
            "json",
        ])
        .unwrap();
        let config = args.bridge_config().unwrap();

        assert_eq!(config.query, "from=flag");
        assert_eq!(config.hostname, "box");
        assert_eq!(config.store_path, Some(PathBuf::from("saves.json")));
        assert_eq!(config.frames.max_frames, Some(10));
        assert_eq!(config.frames.interval_ms, 33);
        assert_eq!(config.fs.read_mode, ReadMode::Sequential);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn module_is_required() {
        assert!(Args::try_parse_from(["hostlink"]).is_err());
    }
}
