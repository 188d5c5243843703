//! Operator-wide defaults read from the environment.

use once_cell::sync::Lazy;

pub const DEFAULT_GRID_IMAGE: &str = "ghcr.io/skelops/grid:1.0.0";
pub const DEFAULT_UTILS_IMAGE: &str = "ghcr.io/skelops/grid-operator:1.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Image used when a workload does not name one.
    pub grid_image: String,
    /// Image of the utility init container.
    pub utils_image: String,
    /// Version stamped onto workloads by the defaulter.
    pub version: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            grid_image: DEFAULT_GRID_IMAGE.to_string(),
            utils_image: DEFAULT_UTILS_IMAGE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl OperatorConfig {
    /// `GRID_DEFAULT_IMAGE`, `GRID_DEFAULT_UTILS_IMAGE`, `GRID_OPERATOR_VERSION`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            grid_image: env_string("GRID_DEFAULT_IMAGE").unwrap_or(d.grid_image),
            utils_image: env_string("GRID_DEFAULT_UTILS_IMAGE").unwrap_or(d.utils_image),
            version: env_string("GRID_OPERATOR_VERSION").unwrap_or(d.version),
        }
    }
}

static CONFIG: Lazy<OperatorConfig> = Lazy::new(OperatorConfig::from_env);

/// Process-wide configuration, read once.
pub fn operator_config() -> &'static OperatorConfig { &CONFIG }
