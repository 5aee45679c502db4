use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Places a ship's shipyard-space blocks into the world.
///
/// A point `p` in ship space maps to world space as
/// `position_in_world + rotation * ((p - position_in_ship) * scaling)`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ShipTransform {
	pub position_in_world: Point3<f64>,
	pub position_in_ship: Point3<f64>,
	pub rotation: UnitQuaternion<f64>,
	pub scaling: f64,
}

impl Default for ShipTransform {
	fn default() -> Self {
		Self {
			position_in_world: Point3::origin(),
			position_in_ship: Point3::origin(),
			rotation: UnitQuaternion::identity(),
			scaling: 1.0,
		}
	}
}

impl ShipTransform {
	pub fn ship_to_world(&self, point: &Point3<f64>) -> Point3<f64> {
		self.position_in_world + self.rotation * ((point - self.position_in_ship) * self.scaling)
	}

	pub fn world_to_ship(&self, point: &Point3<f64>) -> Point3<f64> {
		self.position_in_ship
			+ self.rotation.inverse() * ((point - self.position_in_world) / self.scaling)
	}
}

/// Position, orientation, and velocities of a rigid body, as produced by the physics engine.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PoseVel {
	pub position: Point3<f64>,
	pub rotation: UnitQuaternion<f64>,
	pub linear_velocity: Vector3<f64>,
	pub angular_velocity: Vector3<f64>,
}

impl Default for PoseVel {
	fn default() -> Self {
		Self {
			position: Point3::origin(),
			rotation: UnitQuaternion::identity(),
			linear_velocity: Vector3::zeros(),
			angular_velocity: Vector3::zeros(),
		}
	}
}

#[cfg(test)]
mod ship_transform {
	use super::*;

	#[test]
	fn world_to_ship_inverts_ship_to_world() {
		let transform = ShipTransform {
			position_in_world: Point3::new(10.0, 64.0, -3.0),
			position_in_ship: Point3::new(2048.5, 128.5, 4096.5),
			rotation: UnitQuaternion::from_euler_angles(0.1, 0.7, -0.3),
			scaling: 2.0,
		};
		let ship_point = Point3::new(2050.0, 130.0, 4090.0);
		let round_trip = transform.world_to_ship(&transform.ship_to_world(&ship_point));
		assert!((round_trip - ship_point).magnitude() < 1e-9);
	}

	#[test]
	fn ship_center_maps_to_world_position() {
		let transform = ShipTransform {
			position_in_world: Point3::new(1.0, 2.0, 3.0),
			position_in_ship: Point3::new(100.0, 50.0, 100.0),
			..Default::default()
		};
		assert_eq!(
			transform.ship_to_world(&Point3::new(100.0, 50.0, 100.0)),
			Point3::new(1.0, 2.0, 3.0)
		);
	}
}
