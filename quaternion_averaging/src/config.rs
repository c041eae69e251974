use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigErrors {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("{0}")]
    RonSerialize(#[from] ron::Error),
    #[error("eigen_epsilon must be finite and positive, got {0}")]
    InvalidEpsilon(f64),
    #[error("norm_tolerance must be finite and non-negative, got {0}")]
    InvalidNormTolerance(f64),
}

/// Settings of a `QuaternionAverager`. Missing fields take their defaults.
///
/// ```ron
/// (
///     eigen_epsilon: 1e-14,
///     max_iterations: 500,
///     parallel_threshold: 10000,
///     canonical_output: true,
///     norm_tolerance: 1e-3,
/// )
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AveragingConfig {
    /// Convergence threshold of the symmetric eigensolver.
    pub eigen_epsilon: f64,
    /// Eigensolver iteration budget, 0 for unlimited.
    pub max_iterations: usize,
    /// Sets at least this large accumulate the scatter matrix on the rayon pool.
    pub parallel_threshold: usize,
    /// Return the average with `w >= 0`. Otherwise the solver's sign is kept.
    pub canonical_output: bool,
    /// Inputs further than this from unit norm are logged.
    pub norm_tolerance: f64,
}

impl Default for AveragingConfig {
    fn default() -> Self {
        Self {
            eigen_epsilon: f64::EPSILON,
            max_iterations: 1000,
            parallel_threshold: 4096,
            canonical_output: true,
            norm_tolerance: 1e-3,
        }
    }
}

impl AveragingConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigErrors> {
        let config: Self = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigErrors> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigErrors> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn validate(&self) -> Result<(), ConfigErrors> {
        if !self
            .eigen_epsilon
            .is_finite()
            || self.eigen_epsilon <= 0.0
        {
            return Err(ConfigErrors::InvalidEpsilon(self.eigen_epsilon));
        }
        if !self
            .norm_tolerance
            .is_finite()
            || self.norm_tolerance < 0.0
        {
            return Err(ConfigErrors::InvalidNormTolerance(self.norm_tolerance));
        }
        Ok(())
    }
}
