//! Engine configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `KESTREL__*` environment variables (`__` separates nesting
//! levels, e.g. `KESTREL__SNAPSHOT__EVERY=100`).
//!
//! ```toml
//! model_type = "mutable"
//! mutable_model_failover = "snapshots"
//! logging = "production"
//!
//! [snapshot]
//! dir = "/var/lib/kestrel/snapshots"
//! every = 1000
//! ```

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use kestrel_core::logging_facility::{self, Profile};
use kestrel_core::{FailoverStrategy, KestrelError, ModelType, MutableModelFailover, Result};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "KESTREL";

const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model_type: ModelType,
    pub mutable_model_failover: MutableModelFailover,
    pub logging: Profile,
    pub snapshot: SnapshotConfig,
}

/// Checkpoint settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Directory holding snapshot generations; no snapshots when unset
    pub dir: Option<PathBuf>,
    /// Committed units between automatic checkpoints, 0 disables them
    pub every: u64,
}

impl EngineConfig {
    /// Defaults overlaid with `path` (when given) and the process environment
    ///
    /// # Errors
    ///
    /// `Config` when the file is missing or unreadable, or a value does not
    /// deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::layered(path, environment())
    }

    /// Like [`load`](Self::load) but reads overrides from `vars` instead of
    /// the process environment
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_with_env(path: Option<&Path>, vars: config::Map<String, String>) -> Result<Self> {
        Self::layered(path, environment().source(Some(vars)))
    }

    fn layered(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let settings = builder.add_source(env).build().map_err(config_error)?;
        let loaded: EngineConfig = settings.try_deserialize().map_err(config_error)?;

        tracing::debug!(
            model_type = ?loaded.model_type,
            failover = loaded.failover().as_str(),
            snapshot_every = loaded.snapshot.every,
            "engine configuration loaded"
        );
        Ok(loaded)
    }

    pub fn failover(&self) -> FailoverStrategy {
        FailoverStrategy::from_config(self.model_type, self.mutable_model_failover)
    }

    /// Install the global subscriber for the configured logging profile
    pub fn init_logging(&self) {
        logging_facility::init(self.logging);
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn config_error(err: config::ConfigError) -> KestrelError {
    KestrelError::Config {
        reason: err.to_string(),
    }
}
