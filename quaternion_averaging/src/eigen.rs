use nalgebra::{Matrix4, SymmetricEigen, Vector4};
use tracing::debug;

use crate::{scatter::ScatterMatrix, AveragingErrors};

/// Eigendecomposition of a scatter matrix.
/// Columns of `eigenvectors` are unit eigenvectors, in the same order as `eigenvalues`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenResult {
    pub eigenvalues: Vector4<f64>,
    pub eigenvectors: Matrix4<f64>,
}

impl EigenResult {
    /// Decomposes the scatter matrix with nalgebra's symmetric QR solver.
    ///
    /// # Arguments
    ///
    /// * `scatter` - The matrix to decompose.
    /// * `eps` - Convergence threshold of the solver.
    /// * `max_iterations` - Iteration budget, 0 for unlimited.
    ///
    /// # Returns
    ///
    /// The decomposition, or `NotConverged` when the budget runs out.
    pub fn decompose(
        scatter: ScatterMatrix,
        eps: f64,
        max_iterations: usize,
    ) -> Result<Self, AveragingErrors> {
        let eigen = SymmetricEigen::try_new(scatter.into_inner(), eps, max_iterations)
            .ok_or(AveragingErrors::NotConverged { max_iterations })?;
        debug!(eigenvalues = ?eigen.eigenvalues.as_slice(), "decomposed scatter matrix");
        Ok(Self { eigenvalues: eigen.eigenvalues, eigenvectors: eigen.eigenvectors })
    }

    /// Index of the largest eigenvalue.
    /// Ties resolve to the first index in the solver's ordering.
    pub fn dominant_index(&self) -> usize {
        let mut index = 0;
        for i in 1..4 {
            if self.eigenvalues[i] > self.eigenvalues[index] {
                index = i;
            }
        }
        index
    }

    /// Largest eigenvalue and its eigenvector.
    pub fn dominant(&self) -> (f64, Vector4<f64>) {
        let index = self.dominant_index();
        (
            self.eigenvalues[index],
            self.eigenvectors
                .column(index)
                .into_owned(),
        )
    }
}
