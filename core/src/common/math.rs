mod aabb;
pub use aabb::*;

mod transform;
pub use transform::*;

pub use nalgebra::{Point3, UnitQuaternion, Vector3};
