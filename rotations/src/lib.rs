pub mod antipodal;
pub mod quaternion;

pub mod prelude {
    pub use crate::antipodal::*;
    pub use crate::quaternion::*;
}
