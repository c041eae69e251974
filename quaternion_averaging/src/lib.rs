//! Averaging of unit quaternions by the eigenvalue method of
//! Markley, Cheng, Crassidis and Oshman, "Averaging Quaternions",
//! Journal of Guidance, Control, and Dynamics 30(4), 2007.
//!
//! The average of a set `qᵢ` with weights `wᵢ` is the eigenvector of the
//! largest eigenvalue of `M = Σ wᵢ qᵢ qᵢᵗ / Σ wᵢ`. Quaternions are laid out
//! as (x, y, z, w) with `w` the scalar part.

pub mod averager;
pub mod config;
pub mod eigen;
pub mod scatter;

use rotations::prelude::*;
use thiserror::Error;

pub use averager::QuaternionAverager;
pub use config::{AveragingConfig, ConfigErrors};

pub mod prelude {
    pub use crate::averager::*;
    pub use crate::config::*;
    pub use crate::eigen::*;
    pub use crate::scatter::*;
    pub use crate::{average, average_rows, weighted_average, weighted_average_rows};
    pub use crate::{AveragingErrors, ErrorKind};
}

/// Errors that can occur when averaging quaternions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AveragingErrors {
    #[error("{0}")]
    QuaternionErrors(#[from] QuaternionErrors),
    #[error("cannot average an empty set of quaternions")]
    Empty,
    #[error("row {index} has {len} components, a quaternion has 4")]
    InvalidRow { index: usize, len: usize },
    #[error("quaternion {index} has non-finite components")]
    NonFiniteQuaternion { index: usize },
    #[error("got {quaternions} quaternions but {weights} weights")]
    LengthMismatch { quaternions: usize, weights: usize },
    #[error("weight {index} is negative ({weight})")]
    NegativeWeight { index: usize, weight: f64 },
    #[error("weight {index} is not finite ({weight})")]
    NonFiniteWeight { index: usize, weight: f64 },
    #[error("weights sum to zero")]
    ZeroTotalWeight,
    #[error("scatter matrix has non-finite entries")]
    NonFiniteScatter,
    #[error("eigendecomposition did not converge within {max_iterations} iterations")]
    NotConverged { max_iterations: usize },
}

/// Coarse classification of `AveragingErrors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something that cannot be averaged.
    InvalidInput,
    /// The scatter matrix or the eigensolver broke down in floating point.
    Numerical,
}

impl AveragingErrors {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AveragingErrors::Empty
            | AveragingErrors::InvalidRow { .. }
            | AveragingErrors::NonFiniteQuaternion { .. }
            | AveragingErrors::LengthMismatch { .. }
            | AveragingErrors::NegativeWeight { .. }
            | AveragingErrors::NonFiniteWeight { .. }
            | AveragingErrors::ZeroTotalWeight => ErrorKind::InvalidInput,
            // a zero magnitude eigenvector can only come out of the solver
            AveragingErrors::QuaternionErrors(_)
            | AveragingErrors::NonFiniteScatter
            | AveragingErrors::NotConverged { .. } => ErrorKind::Numerical,
        }
    }
}

/// Averages `quaternions` with equal weights and the default configuration.
pub fn average(quaternions: &[Quaternion]) -> Result<UnitQuaternion, AveragingErrors> {
    QuaternionAverager::default().average(quaternions)
}

/// Averages `quaternions` with relative `weights` and the default configuration.
pub fn weighted_average(
    quaternions: &[Quaternion],
    weights: &[f64],
) -> Result<UnitQuaternion, AveragingErrors> {
    QuaternionAverager::default().weighted_average(quaternions, weights)
}

/// [`average`] over raw [x, y, z, w] rows.
pub fn average_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<UnitQuaternion, AveragingErrors> {
    QuaternionAverager::default().average_rows(rows)
}

/// [`weighted_average`] over raw [x, y, z, w] rows.
pub fn weighted_average_rows<R: AsRef<[f64]>>(
    rows: &[R],
    weights: &[f64],
) -> Result<UnitQuaternion, AveragingErrors> {
    QuaternionAverager::default().weighted_average_rows(rows, weights)
}
