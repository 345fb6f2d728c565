//! Deployment configuration – reads `roadwatch.toml`.
//!
//! ```toml
//! [algorithm]
//! decay_factor = 0.985
//! alarm_dwell_s = 90
//!
//! [gateway]
//! page_pool_capacity = 20
//! ```
//!
//! Every field is optional; missing fields take the tuned defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use roadwatch_runtime::GatewayConfig;
use roadwatch_types::AlgorithmConfig;

/// Default file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "roadwatch.toml";

/// Everything a gateway needs to start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub algorithm: AlgorithmConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

pub fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Resolve the effective configuration.
///
/// An explicitly requested file must exist.  Without one, `roadwatch.toml`
/// is used when present and the defaults otherwise.  Environment overrides
/// apply in every case, and the result is validated.
pub fn resolve(explicit: Option<&Path>) -> Result<Config, String> {
    let cfg = match explicit {
        Some(path) => load_from(path)?.ok_or_else(|| format!("Config file {} not found", path.display()))?,
        None => match load_from(&default_path())? {
            Some(cfg) => cfg,
            None => {
                let mut cfg = Config::default();
                apply_env_overrides(&mut cfg);
                cfg
            }
        },
    };
    cfg.algorithm.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

/// Apply `ROADWATCH_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROADWATCH_DECAY_FACTOR` | `algorithm.decay_factor` |
/// | `ROADWATCH_CONCERN_DWELL_S` | `algorithm.concern_dwell_s` |
/// | `ROADWATCH_ALARM_DWELL_S` | `algorithm.alarm_dwell_s` |
/// | `ROADWATCH_PAGE_PERIOD_MS` | `gateway.page_period_ms` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROADWATCH_DECAY_FACTOR")
        && let Ok(factor) = v.parse::<f32>()
    {
        cfg.algorithm.decay_factor = factor;
    }
    if let Ok(v) = std::env::var("ROADWATCH_CONCERN_DWELL_S")
        && let Ok(s) = v.parse::<u32>()
    {
        cfg.algorithm.concern_dwell_s = s;
    }
    if let Ok(v) = std::env::var("ROADWATCH_ALARM_DWELL_S")
        && let Ok(s) = v.parse::<u32>()
    {
        cfg.algorithm.alarm_dwell_s = s;
    }
    if let Ok(v) = std::env::var("ROADWATCH_PAGE_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.gateway.page_period_ms = ms;
    }
}
