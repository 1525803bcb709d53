//! Driver configuration.
//!
//! Values come from `cinderd.toml` (all fields optional) with command-line
//! flags taking precedence. Defaults match a small development world.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the script library on the host filesystem.
    pub lib_root: PathBuf,
    /// Snapshot read at boot.
    pub load_db: PathBuf,
    /// Snapshot written by saves.
    pub save_db: PathBuf,
    /// Snapshot written on panic.
    pub panic_db: PathBuf,
    /// Transaction log of dirty objects between snapshots.
    pub transact_log: PathBuf,
    /// Log size that forces a snapshot.
    pub transact_log_limit: u64,
    pub syslog: PathBuf,
    pub port: u16,
    pub max_conns: usize,

    /// Boot object path; also the master object for security callbacks.
    pub boot_object: String,
    /// Program implicitly attached to every clone.
    pub auto_object: String,

    pub use_soft_cycles: bool,
    pub use_hard_cycles: bool,
    pub soft_cycle_limit: u64,
    pub hard_cycle_limit: u64,
    pub max_call_depth: usize,

    /// Seconds between reset() passes.
    pub reset_interval: i64,
    /// Seconds between clean_up() passes.
    pub cleanup_interval: i64,
    /// Idle seconds before an object is offered clean_up().
    pub cleanup_idle: i64,

    /// Compact (single line per frame) tracebacks in logs.
    pub compact_traceback: bool,
    pub max_trace_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            lib_root: PathBuf::from("lib"),
            load_db: PathBuf::from("std.db"),
            save_db: PathBuf::from("std.db"),
            panic_db: PathBuf::from("panic.db"),
            transact_log: PathBuf::from("transact.log"),
            transact_log_limit: 640_000,
            syslog: PathBuf::from("syslog.txt"),
            port: 5000,
            max_conns: 512,
            boot_object: "/boot".to_string(),
            auto_object: "/sys/auto".to_string(),
            use_soft_cycles: true,
            use_hard_cycles: true,
            soft_cycle_limit: 100_000,
            hard_cycle_limit: 1_000_000,
            max_call_depth: 64,
            reset_interval: 1800,
            cleanup_interval: 600,
            cleanup_idle: 600,
            compact_traceback: false,
            max_trace_depth: 16,
        }
    }
}

/// On-disk form: every field optional so partial files work.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub lib_root: Option<PathBuf>,
    pub load_db: Option<PathBuf>,
    pub save_db: Option<PathBuf>,
    pub panic_db: Option<PathBuf>,
    pub transact_log: Option<PathBuf>,
    pub transact_log_limit: Option<u64>,
    pub syslog: Option<PathBuf>,
    pub port: Option<u16>,
    pub max_conns: Option<usize>,
    pub boot_object: Option<String>,
    pub auto_object: Option<String>,
    pub use_soft_cycles: Option<bool>,
    pub use_hard_cycles: Option<bool>,
    pub soft_cycle_limit: Option<u64>,
    pub hard_cycle_limit: Option<u64>,
    pub max_call_depth: Option<usize>,
    pub reset_interval: Option<i64>,
    pub cleanup_interval: Option<i64>,
    pub cleanup_idle: Option<i64>,
    pub compact_traceback: Option<bool>,
    pub max_trace_depth: Option<usize>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let file: ConfigFile =
            toml::from_str(&text).map_err(|e| format!("bad config {}: {e}", path.display()))?;
        let mut config = Config::default();
        config.apply(file);
        Ok(config)
    }

    pub fn apply(&mut self, file: ConfigFile) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $( if let Some(v) = file.$field { self.$field = v; } )*
            };
        }
        take!(
            lib_root,
            load_db,
            save_db,
            panic_db,
            transact_log,
            transact_log_limit,
            syslog,
            port,
            max_conns,
            boot_object,
            auto_object,
            use_soft_cycles,
            use_hard_cycles,
            soft_cycle_limit,
            hard_cycle_limit,
            max_call_depth,
            reset_interval,
            cleanup_interval,
            cleanup_idle,
            compact_traceback,
            max_trace_depth,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_overrides_defaults() {
        let file: ConfigFile =
            toml::from_str("port = 4321\nboot_object = \"/sys/master\"\n").unwrap();
        let mut config = Config::default();
        config.apply(file);
        assert_eq!(config.port, 4321);
        assert_eq!(config.boot_object, "/sys/master");
        // untouched fields keep defaults
        assert_eq!(config.max_conns, 512);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let parsed: Result<ConfigFile, _> = toml::from_str("no_such_option = 1\n");
        assert!(parsed.is_err());
    }
}
