use nalgebra::Point3;

/// An axis aligned bounding box in continuous space.
/// Both extents are inclusive, so a box whose `min == max` still contains that single point.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Aabb {
	pub min: Point3<f64>,
	pub max: Point3<f64>,
}

impl std::fmt::Display for Aabb {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"AABB(<{}, {}, {}> -> <{}, {}, {}>)",
			self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
		)
	}
}

impl Aabb {
	/// Creates a box from two corners in any order.
	pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
		Self {
			min: a.inf(&b),
			max: a.sup(&b),
		}
	}

	pub fn from_point(point: Point3<f64>) -> Self {
		Self {
			min: point,
			max: point,
		}
	}

	/// Smallest box containing every point, or None for an empty iterator.
	pub fn enclosing(points: impl IntoIterator<Item = Point3<f64>>) -> Option<Self> {
		let mut iter = points.into_iter();
		let first = Self::from_point(iter.next()?);
		Some(iter.fold(first, |aabb, point| aabb.union_point(&point)))
	}

	pub fn union_point(&self, point: &Point3<f64>) -> Self {
		Self {
			min: self.min.inf(point),
			max: self.max.sup(point),
		}
	}

	pub fn union(&self, other: &Self) -> Self {
		Self {
			min: self.min.inf(&other.min),
			max: self.max.sup(&other.max),
		}
	}

	pub fn center(&self) -> Point3<f64> {
		nalgebra::center(&self.min, &self.max)
	}

	pub fn corners(&self) -> [Point3<f64>; 8] {
		let (a, b) = (self.min, self.max);
		[
			Point3::new(a.x, a.y, a.z),
			Point3::new(b.x, a.y, a.z),
			Point3::new(a.x, b.y, a.z),
			Point3::new(b.x, b.y, a.z),
			Point3::new(a.x, a.y, b.z),
			Point3::new(b.x, a.y, b.z),
			Point3::new(a.x, b.y, b.z),
			Point3::new(b.x, b.y, b.z),
		]
	}

	/// AABBxAABB intersection test, touching boxes count as intersecting.
	pub fn intersects(&self, other: &Self) -> bool {
		let x = self.min.x <= other.max.x && other.min.x <= self.max.x;
		let y = self.min.y <= other.max.y && other.min.y <= self.max.y;
		let z = self.min.z <= other.max.z && other.min.z <= self.max.z;
		x && y && z
	}

	pub fn contains(&self, point: &Point3<f64>) -> bool {
		self.distance_squared_to(point) == 0.0
	}

	/// Squared distance from the point to the closest point in the box (zero when inside).
	pub fn distance_squared_to(&self, point: &Point3<f64>) -> f64 {
		let closest = point.sup(&self.min).inf(&self.max);
		(point - closest).magnitude_squared()
	}

	pub fn distance_to(&self, point: &Point3<f64>) -> f64 {
		self.distance_squared_to(point).sqrt()
	}

	/// The box containing every transformed corner of this box.
	pub fn map(&self, transform: impl Fn(&Point3<f64>) -> Point3<f64>) -> Self {
		let corners = self.corners();
		let first = Self::from_point(transform(&corners[0]));
		corners[1..]
			.iter()
			.fold(first, |aabb, corner| aabb.union_point(&transform(corner)))
	}
}
