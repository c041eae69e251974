//! Sign convention for sets of quaternions.
//!
//! q and -q describe the same rotation. Summing outer products or components of
//! a set that mixes both hemispheres lets near-duplicates cancel, so every
//! quaternion is moved to the hemisphere with a non-negative scalar part first.

use crate::quaternion::Quaternion;

impl Quaternion {
    /// Returns the representative of this rotation with `w >= 0`.
    ///
    /// A quaternion with `w == 0.0` (either sign of zero) is returned as is.
    pub fn canonical(&self) -> Quaternion {
        if self.w < 0.0 {
            -*self
        } else {
            *self
        }
    }
}

/// Negates, in place, every quaternion whose scalar part is negative.
pub fn canonicalize(quaternions: &mut [Quaternion]) {
    for q in quaternions.iter_mut() {
        *q = q.canonical();
    }
}

/// Copying form of [`canonicalize`]. Same length and order as the input.
pub fn canonicalized(quaternions: &[Quaternion]) -> Vec<Quaternion> {
    quaternions
        .iter()
        .map(Quaternion::canonical)
        .collect()
}
