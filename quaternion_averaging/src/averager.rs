use rotations::prelude::*;
use tracing::{debug, warn};

use crate::{
    config::{AveragingConfig, ConfigErrors},
    eigen::EigenResult,
    scatter::{quaternions_from_rows, ScatterMatrix},
    AveragingErrors,
};

/// Scatter-eigen averager for sets of unit quaternions.
///
/// Inputs are never mutated. Each call copies the set into the `w >= 0`
/// hemisphere before accumulating the scatter matrix.
#[derive(Debug, Clone, Default)]
pub struct QuaternionAverager {
    config: AveragingConfig,
}

impl QuaternionAverager {
    pub fn new(config: AveragingConfig) -> Result<Self, ConfigErrors> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AveragingConfig {
        &self.config
    }

    /// Averages a set of quaternions with equal weights.
    ///
    /// # Arguments
    ///
    /// * `quaternions` - N >= 1 unit quaternions, either hemisphere.
    ///
    /// # Returns
    ///
    /// The dominant eigenvector of the mean of `q qᵗ`.
    pub fn average(&self, quaternions: &[Quaternion]) -> Result<UnitQuaternion, AveragingErrors> {
        self.check_norms(quaternions);
        let scatter = ScatterMatrix::mean(quaternions, self.parallel(quaternions.len()))?;
        self.solve(scatter)
    }

    /// Averages a set of quaternions with relative weights.
    ///
    /// # Arguments
    ///
    /// * `quaternions` - N >= 1 unit quaternions, either hemisphere.
    /// * `weights` - N non-negative weights with a positive sum.
    ///
    /// # Returns
    ///
    /// The dominant eigenvector of `Σ wᵢ qᵢ qᵢᵗ / Σ wᵢ`.
    pub fn weighted_average(
        &self,
        quaternions: &[Quaternion],
        weights: &[f64],
    ) -> Result<UnitQuaternion, AveragingErrors> {
        self.check_norms(quaternions);
        let scatter =
            ScatterMatrix::weighted_mean(quaternions, weights, self.parallel(quaternions.len()))?;
        self.solve(scatter)
    }

    pub fn average_rows<R: AsRef<[f64]>>(
        &self,
        rows: &[R],
    ) -> Result<UnitQuaternion, AveragingErrors> {
        let quaternions = quaternions_from_rows(rows)?;
        self.average(&quaternions)
    }

    pub fn weighted_average_rows<R: AsRef<[f64]>>(
        &self,
        rows: &[R],
        weights: &[f64],
    ) -> Result<UnitQuaternion, AveragingErrors> {
        let quaternions = quaternions_from_rows(rows)?;
        self.weighted_average(&quaternions, weights)
    }

    fn parallel(&self, n: usize) -> bool {
        n >= self
            .config
            .parallel_threshold
    }

    fn check_norms(&self, quaternions: &[Quaternion]) {
        for (index, q) in quaternions
            .iter()
            .enumerate()
        {
            if q.is_finite() && !q.is_unit(self.config.norm_tolerance) {
                warn!(index, norm = q.mag(), "averaging a quaternion that is not unit norm");
            }
        }
    }

    fn solve(&self, scatter: ScatterMatrix) -> Result<UnitQuaternion, AveragingErrors> {
        debug_assert!(scatter.is_symmetric(1e-12));
        debug!(scatter = ?scatter.matrix(), trace = scatter.trace(), "scatter matrix");
        let eigen = EigenResult::decompose(
            scatter,
            self.config
                .eigen_epsilon,
            self.config
                .max_iterations,
        )?;
        let (value, vector) = eigen.dominant();
        let q = Quaternion::from(vector);
        let q = if self
            .config
            .canonical_output
        {
            q.canonical()
        } else {
            q
        };
        debug!(eigenvalue = value, average = %q, "dominant eigenvector");
        Ok(UnitQuaternion::try_from(&q)?)
    }
}
