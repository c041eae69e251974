//! Second-moment (scatter) matrix of a set of quaternions.

use nalgebra::{Matrix4, Vector4};
use rayon::prelude::*;
use rotations::prelude::*;
use tracing::debug;

use crate::AveragingErrors;

/// The (weighted) mean of the outer products `q qᵗ` of a quaternion set.
///
/// Symmetric positive semi-definite by construction. Its dominant eigenvector
/// is the chordal-distance minimizing average rotation (Markley et al., 2007).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterMatrix(Matrix4<f64>);

impl ScatterMatrix {
    /// Equal weight `1/N` for every quaternion.
    ///
    /// # Arguments
    ///
    /// * `quaternions` - The set to average, in any hemisphere.
    /// * `parallel` - Accumulate the outer products on the rayon pool.
    ///
    /// # Returns
    ///
    /// The scatter matrix of the sign-normalized set, or an `InvalidInput` error.
    pub fn mean(quaternions: &[Quaternion], parallel: bool) -> Result<Self, AveragingErrors> {
        let quaternions = prepare(quaternions)?;
        let sum = accumulate(&quaternions, None, parallel);
        Self::finite(sum / quaternions.len() as f64)
    }

    /// `(Σ wᵢ qᵢ qᵢᵗ) / Σ wᵢ`.
    ///
    /// # Arguments
    ///
    /// * `quaternions` - The set to average, in any hemisphere.
    /// * `weights` - Non-negative relative weights, index-aligned with `quaternions`.
    ///   Only their ratios matter, they are divided by the largest weight first.
    /// * `parallel` - Accumulate the outer products on the rayon pool.
    ///
    /// # Returns
    ///
    /// The scatter matrix of the sign-normalized set, or an `InvalidInput` error.
    pub fn weighted_mean(
        quaternions: &[Quaternion],
        weights: &[f64],
        parallel: bool,
    ) -> Result<Self, AveragingErrors> {
        let quaternions = prepare(quaternions)?;
        let (scale, total) = check_weights(quaternions.len(), weights)?;
        let sum = accumulate(&quaternions, Some((weights, scale)), parallel);
        Self::finite(sum / total)
    }

    fn finite(matrix: Matrix4<f64>) -> Result<Self, AveragingErrors> {
        if matrix
            .iter()
            .all(|e| e.is_finite())
        {
            Ok(Self(matrix))
        } else {
            Err(AveragingErrors::NonFiniteScatter)
        }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    pub fn into_inner(self) -> Matrix4<f64> {
        self.0
    }

    /// Weighted mean of the squared norms, 1 for unit quaternions.
    pub fn trace(&self) -> f64 {
        self.0
            .trace()
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        (self.0 - self.0.transpose())
            .iter()
            .all(|e| e.abs() <= tol)
    }
}

/// `q qᵗ` with q as a column in (x, y, z, w) order.
pub fn outer_product(q: &Quaternion) -> Matrix4<f64> {
    let v = Vector4::from(q);
    v * v.transpose()
}

/// Reads rows laid out as [x, y, z, w].
pub fn quaternions_from_rows<R: AsRef<[f64]>>(
    rows: &[R],
) -> Result<Vec<Quaternion>, AveragingErrors> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let row = row.as_ref();
            Quaternion::try_from(row).map_err(|_| AveragingErrors::InvalidRow {
                index,
                len: row.len(),
            })
        })
        .collect()
}

/// Validates the set and moves every quaternion to the `w >= 0` hemisphere.
/// The caller's slice is left untouched.
fn prepare(quaternions: &[Quaternion]) -> Result<Vec<Quaternion>, AveragingErrors> {
    if quaternions.is_empty() {
        return Err(AveragingErrors::Empty);
    }
    if let Some(index) = quaternions
        .iter()
        .position(|q| !q.is_finite())
    {
        return Err(AveragingErrors::NonFiniteQuaternion { index });
    }
    Ok(canonicalized(quaternions))
}

/// Returns the largest weight and the total of the weights divided by it.
fn check_weights(n: usize, weights: &[f64]) -> Result<(f64, f64), AveragingErrors> {
    if weights.len() != n {
        return Err(AveragingErrors::LengthMismatch { quaternions: n, weights: weights.len() });
    }
    for (index, &weight) in weights
        .iter()
        .enumerate()
    {
        if !weight.is_finite() {
            return Err(AveragingErrors::NonFiniteWeight { index, weight });
        }
        if weight < 0.0 {
            return Err(AveragingErrors::NegativeWeight { index, weight });
        }
    }
    // the sum of raw weights near f64::MAX overflows
    let scale = weights
        .iter()
        .fold(0.0, |a: f64, &b| a.max(b));
    if scale <= 0.0 {
        return Err(AveragingErrors::ZeroTotalWeight);
    }
    let total: f64 = weights
        .iter()
        .map(|w| w / scale)
        .sum();
    Ok((scale, total))
}

/// `weights` are divided by their scale as they are read.
fn accumulate(
    quaternions: &[Quaternion],
    weights: Option<(&[f64], f64)>,
    parallel: bool,
) -> Matrix4<f64> {
    let term = |i: usize| {
        let weight = weights.map_or(1.0, |(w, scale)| w[i] / scale);
        outer_product(&quaternions[i]) * weight
    };

    let n = quaternions.len();
    if parallel {
        debug!(n, "accumulating scatter matrix in parallel");
        (0..n)
            .into_par_iter()
            .map(term)
            .reduce(Matrix4::<f64>::zeros, |a, b| a + b)
    } else {
        (0..n)
            .map(term)
            .fold(Matrix4::zeros(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    const TOL: f64 = 1e-12;

    fn orientations() -> Vec<Quaternion> {
        vec![
            Quaternion::new(0.3061862, 0.1767767, 0.3061862, 0.8838835),
            Quaternion::new(0.5915064, 0.1584936, 0.591506, 0.5245191),
        ]
    }

    #[test]
    fn test_outer_product() {
        let q = Quaternion::new(1.0, 2.0, 3.0, 4.0);
        let m = outer_product(&q);
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(0, 3)], 4.0);
        assert_eq!(m[(3, 0)], 4.0);
        assert_eq!(m[(2, 1)], 6.0);
        assert_eq!(m[(3, 3)], 16.0);
    }

    #[test]
    fn test_single_quaternion_scatter() {
        let q = Quaternion::new(0.5, 0.5, 0.5, 0.5);
        let m = ScatterMatrix::mean(&[q], false).unwrap();
        for e in m
            .matrix()
            .iter()
        {
            assert_abs_diff_eq!(*e, 0.25, epsilon = TOL);
        }
    }

    #[test]
    fn test_scatter_is_symmetric_with_unit_trace() {
        let m = ScatterMatrix::mean(&orientations(), false).unwrap();
        assert!(m.is_symmetric(TOL));
        assert_abs_diff_eq!(m.trace(), 1.0, epsilon = 1e-5);

        let m = ScatterMatrix::weighted_mean(&orientations(), &[2.0, 1.0], false).unwrap();
        assert!(m.is_symmetric(TOL));
        assert_abs_diff_eq!(m.trace(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_weighted_scatter_by_hand() {
        let a = orientations();
        let m = ScatterMatrix::weighted_mean(&a, &[2.0, 1.0], false).unwrap();
        let expected = (outer_product(&a[0]) * 2.0 + outer_product(&a[1])) / 3.0;
        assert_abs_diff_eq!(m.into_inner(), expected, epsilon = TOL);
    }

    #[test]
    fn test_huge_weights_keep_their_ratio() {
        let a = orientations();
        let huge = ScatterMatrix::weighted_mean(&a, &[f64::MAX, f64::MAX / 2.0], false).unwrap();
        let small = ScatterMatrix::weighted_mean(&a, &[2.0, 1.0], false).unwrap();
        assert!(huge
            .matrix()
            .iter()
            .all(|e| e.is_finite()));
        assert_abs_diff_eq!(huge.into_inner(), small.into_inner(), epsilon = TOL);
    }

    #[test]
    fn test_zero_weight_contributes_nothing() {
        let mut a = orientations();
        a.push(Quaternion::new(0.0, 0.0, -1.0, -0.2));
        let with_zero = ScatterMatrix::weighted_mean(&a, &[1.0, 1.0, 0.0], false).unwrap();
        let without = ScatterMatrix::mean(&a[..2], false).unwrap();
        assert_abs_diff_eq!(with_zero.into_inner(), without.into_inner(), epsilon = TOL);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a: Vec<Quaternion> = (0..100)
            .map(|i| {
                let t = i as f64 * 0.01;
                Quaternion::new(t.sin(), 0.1, -t.cos() * 0.2, 1.0)
                    .normalize()
                    .unwrap()
            })
            .collect();
        let sequential = ScatterMatrix::mean(&a, false).unwrap();
        let parallel = ScatterMatrix::mean(&a, true).unwrap();
        assert_abs_diff_eq!(sequential.into_inner(), parallel.into_inner(), epsilon = 1e-12);
    }

    #[test]
    fn test_input_not_mutated() {
        let a = vec![Quaternion::new(-0.3061862, -0.1767767, -0.3061862, -0.8838835)];
        let before = a.clone();
        ScatterMatrix::mean(&a, false).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn test_scatter_errors() {
        assert_eq!(ScatterMatrix::mean(&[], false), Err(AveragingErrors::Empty));
        assert_eq!(
            ScatterMatrix::mean(&[Quaternion::new(f64::NAN, 0.0, 0.0, 1.0)], false),
            Err(AveragingErrors::NonFiniteQuaternion { index: 0 })
        );

        let a = orientations();
        assert_eq!(
            ScatterMatrix::weighted_mean(&a, &[1.0], false),
            Err(AveragingErrors::LengthMismatch { quaternions: 2, weights: 1 })
        );
        assert_eq!(
            ScatterMatrix::weighted_mean(&a, &[1.0, -0.5], false),
            Err(AveragingErrors::NegativeWeight { index: 1, weight: -0.5 })
        );
        assert!(matches!(
            ScatterMatrix::weighted_mean(&a, &[f64::NAN, 1.0], false),
            Err(AveragingErrors::NonFiniteWeight { index: 0, .. })
        ));
        assert_eq!(
            ScatterMatrix::weighted_mean(&a, &[0.0, 0.0], false),
            Err(AveragingErrors::ZeroTotalWeight)
        );
    }

    #[test]
    fn test_overflowing_scatter_is_an_error() {
        let a = [Quaternion::new(1e200, 0.0, 0.0, 1.0)];
        let err = ScatterMatrix::mean(&a, false).unwrap_err();
        assert_eq!(err, AveragingErrors::NonFiniteScatter);
        assert_eq!(err.kind(), crate::ErrorKind::Numerical);
    }

    #[test]
    fn test_quaternions_from_rows() {
        let rows = vec![vec![0.0, 0.0, 0.0, 1.0], vec![1.0, 0.0, 0.0, 0.0]];
        let q = quaternions_from_rows(&rows).unwrap();
        assert_eq!(q, vec![Quaternion::IDENTITY, Quaternion::new(1.0, 0.0, 0.0, 0.0)]);

        let rows: Vec<&[f64]> = vec![&[0.0, 0.0, 0.0, 1.0], &[1.0, 0.0, 0.0]];
        assert_eq!(
            quaternions_from_rows(&rows),
            Err(AveragingErrors::InvalidRow { index: 1, len: 3 })
        );
    }
}
