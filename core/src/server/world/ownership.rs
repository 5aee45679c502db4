//! Lookup of ships by id, by owned chunk, and by world-space bounds.

use super::{
	chunk::ChunkPos,
	claim::Claim,
	ship::{DimensionId, Ship, ShipId},
};
use crate::common::math::Aabb;
use std::collections::{BTreeMap, HashMap};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
	#[error("ship {0} is already in the index")]
	DuplicateId(ShipId),
	#[error("ship {0} is not in the index")]
	NotFound(ShipId),
	#[error("claim {claim} of ship {ship} is already owned by ship {owner}")]
	ClaimTaken {
		ship: ShipId,
		owner: ShipId,
		claim: Claim,
	},
	#[error("claim {claim} does not use the index claim diameter {diameter}")]
	DiameterMismatch { claim: Claim, diameter: i32 },
	#[error("claim diameter must be positive, found {0}")]
	InvalidDiameter(i32),
}

/// Every ship in a world, each owning exactly one claim.
///
/// Claims are shared over all dimensions, so a ship moved to another dimension keeps its claim;
/// chunk lookups therefore also compare the ship's dimension.
pub struct OwnershipIndex {
	claim_diameter: i32,
	ships: BTreeMap<ShipId, Ship>,
	claim_owners: HashMap<(i32, i32), ShipId>,
}

impl OwnershipIndex {
	pub fn new(claim_diameter: i32) -> Result<Self, Error> {
		if claim_diameter <= 0 {
			return Err(Error::InvalidDiameter(claim_diameter));
		}
		Ok(Self {
			claim_diameter,
			ships: BTreeMap::new(),
			claim_owners: HashMap::new(),
		})
	}

	fn claim_key(claim: &Claim) -> (i32, i32) {
		(claim.x_index(), claim.z_index())
	}

	pub fn add(&mut self, ship: Ship) -> Result<(), Error> {
		if self.ships.contains_key(&ship.id()) {
			return Err(Error::DuplicateId(ship.id()));
		}
		if ship.claim().diameter() != self.claim_diameter {
			return Err(Error::DiameterMismatch {
				claim: *ship.claim(),
				diameter: self.claim_diameter,
			});
		}
		let key = Self::claim_key(ship.claim());
		if let Some(owner) = self.claim_owners.get(&key) {
			return Err(Error::ClaimTaken {
				ship: ship.id(),
				owner: *owner,
				claim: *ship.claim(),
			});
		}
		self.claim_owners.insert(key, ship.id());
		self.ships.insert(ship.id(), ship);
		Ok(())
	}

	pub fn remove(&mut self, id: ShipId) -> Result<Ship, Error> {
		let ship = self.ships.remove(&id).ok_or(Error::NotFound(id))?;
		self.claim_owners.remove(&Self::claim_key(ship.claim()));
		Ok(ship)
	}

	pub fn contains(&self, id: ShipId) -> bool {
		self.ships.contains_key(&id)
	}

	pub fn by_id(&self, id: ShipId) -> Option<&Ship> {
		self.ships.get(&id)
	}

	pub fn by_id_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
		self.ships.get_mut(&id)
	}

	/// The ship whose claim contains the chunk, if that ship is in `dimension`.
	pub fn by_chunk(&self, chunk_x: i32, chunk_z: i32, dimension: &DimensionId) -> Option<&Ship> {
		let claim = Claim::containing(ChunkPos::new(chunk_x, chunk_z), self.claim_diameter);
		let id = self.claim_owners.get(&Self::claim_key(&claim))?;
		self.ships
			.get(id)
			.filter(|ship| ship.dimension() == dimension)
	}

	pub fn by_chunk_mut(
		&mut self,
		chunk_x: i32,
		chunk_z: i32,
		dimension: &DimensionId,
	) -> Option<&mut Ship> {
		let claim = Claim::containing(ChunkPos::new(chunk_x, chunk_z), self.claim_diameter);
		let id = self.claim_owners.get(&Self::claim_key(&claim))?;
		self.ships
			.get_mut(id)
			.filter(|ship| ship.dimension() == dimension)
	}

	/// Every ship whose world bounds intersect `aabb`.
	// Linear scan; fine for the number of ships a world holds today.
	pub fn intersecting<'a>(&'a self, aabb: &'a Aabb) -> impl Iterator<Item = &'a Ship> + 'a {
		self.ships
			.values()
			.filter(move |ship| ship.world_aabb().intersects(aabb))
	}

	/// Ships in ascending id order.
	pub fn iter(&self) -> impl Iterator<Item = &Ship> {
		self.ships.values()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ship> {
		self.ships.values_mut()
	}

	pub fn ids(&self) -> impl Iterator<Item = ShipId> + '_ {
		self.ships.keys().cloned()
	}

	pub fn len(&self) -> usize {
		self.ships.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ships.is_empty()
	}

	/// Walks the ships in id order while allowing the ship last returned to be removed.
	pub fn cursor(&mut self) -> Cursor<'_> {
		Cursor {
			ids: self.ships.keys().cloned().collect(),
			position: 0,
			current: None,
			index: self,
		}
	}
}

/// A mutation-safe traversal of an [`OwnershipIndex`].
///
/// Removing through [`remove_current`](Cursor::remove_current) keeps the claim lookup consistent.
pub struct Cursor<'a> {
	index: &'a mut OwnershipIndex,
	ids: Vec<ShipId>,
	position: usize,
	current: Option<ShipId>,
}

impl<'a> Cursor<'a> {
	pub fn next(&mut self) -> Option<&mut Ship> {
		while let Some(id) = self.ids.get(self.position).cloned() {
			self.position += 1;
			if self.index.contains(id) {
				self.current = Some(id);
				return self.index.by_id_mut(id);
			}
		}
		self.current = None;
		None
	}

	/// Removes the ship most recently returned by [`next`](Cursor::next).
	/// Returns None if there is no such ship (nothing returned yet, or it was already removed).
	pub fn remove_current(&mut self) -> Option<Ship> {
		let id = self.current.take()?;
		self.index.remove(id).ok()
	}
}

#[cfg(test)]
mod ownership_index {
	use super::*;
	use crate::common::math::{Point3, ShipTransform};

	const DIAMETER: i32 = 256;

	fn make_ship(id: ShipId, x_index: i32, z_index: i32, dimension: &str) -> Ship {
		Ship::new(
			id,
			format!("ship-{}", id),
			Claim::new(x_index, z_index, DIAMETER),
			dimension.to_owned(),
			ShipTransform {
				position_in_world: Point3::new(id as f64 * 100.0, 64.0, 0.0),
				..Default::default()
			},
		)
	}

	#[test]
	fn by_id() {
		let mut index = OwnershipIndex::new(DIAMETER).unwrap();
		index.add(make_ship(3, 0, 0, "overworld")).unwrap();
		assert_eq!(index.by_id(3).map(Ship::id), Some(3));
		assert!(index.by_id(4).is_none());
	}

	#[test]
	fn rejects_non_positive_diameter() {
		assert_eq!(OwnershipIndex::new(0).err(), Some(Error::InvalidDiameter(0)));
	}

	#[test]
	fn by_chunk_inside_and_outside_claim() {
		let mut index = OwnershipIndex::new(DIAMETER).unwrap();
		index.add(make_ship(1, -1, 2, "overworld")).unwrap();
		let dim = "overworld".to_owned();
		assert_eq!(index.by_chunk(-256, 512, &dim).map(Ship::id), Some(1));
		assert_eq!(index.by_chunk(-1, 767, &dim).map(Ship::id), Some(1));
		assert!(index.by_chunk(-257, 512, &dim).is_none());
		assert!(index.by_chunk(-256, 511, &dim).is_none());
		assert!(index.by_chunk(0, 767, &dim).is_none());
		assert!(index.by_chunk(-1, 768, &dim).is_none());
	}

	#[test]
	fn by_chunk_requires_matching_dimension() {
		let mut index = OwnershipIndex::new(DIAMETER).unwrap();
		index.add(make_ship(1, 0, 0, "overworld")).unwrap();
		assert!(index.by_chunk(5, 5, &"nether".to_owned()).is_none());
		index.by_id_mut(1).unwrap().set_dimension("nether".to_owned());
		assert_eq!(index.by_chunk(5, 5, &"nether".to_owned()).map(Ship::id), Some(1));
	}

	#[test]
	fn duplicate_and_missing() {
		let mut index = OwnershipIndex::new(DIAMETER).unwrap();
		index.add(make_ship(1, 0, 0, "overworld")).unwrap();
		assert_eq!(
			index.add(make_ship(1, 1, 0, "overworld")),
			Err(Error::DuplicateId(1))
		);
		assert!(matches!(
			index.add(make_ship(2, 0, 0, "overworld")),
			Err(Error::ClaimTaken { owner: 1, .. })
		));
		assert_eq!(index.remove(9).err(), Some(Error::NotFound(9)));
		assert!(index.remove(1).is_ok());
		assert!(index.by_chunk(0, 0, &"overworld".to_owned()).is_none());
	}

	#[test]
	fn intersecting_filters_by_world_bounds() {
		let mut index = OwnershipIndex::new(DIAMETER).unwrap();
		index.add(make_ship(1, 0, 0, "overworld")).unwrap();
		index.add(make_ship(2, 1, 0, "overworld")).unwrap();
		let query = Aabb::new(Point3::new(150.0, 0.0, -10.0), Point3::new(250.0, 100.0, 10.0));
		let found = index.intersecting(&query).map(Ship::id).collect::<Vec<_>>();
		assert_eq!(found, vec![2]);
	}

	#[test]
	fn cursor_removes_current_and_keeps_claims_consistent() {
		let mut index = OwnershipIndex::new(DIAMETER).unwrap();
		for id in 0..5 {
			index.add(make_ship(id, id as i32, 0, "overworld")).unwrap();
		}
		let mut removed = Vec::new();
		{
			let mut cursor = index.cursor();
			while let Some(ship) = cursor.next() {
				if ship.id() % 2 == 0 {
					removed.push(cursor.remove_current().unwrap().id());
				}
			}
			assert!(cursor.remove_current().is_none());
		}
		assert_eq!(removed, vec![0, 2, 4]);
		assert_eq!(index.ids().collect::<Vec<_>>(), vec![1, 3]);
		assert!(index.by_chunk(0, 0, &"overworld".to_owned()).is_none());
		assert_eq!(
			index.by_chunk(256, 0, &"overworld".to_owned()).map(Ship::id),
			Some(1)
		);
		// Claims freed by removal may not be reused by the allocator, but the index accepts them.
		assert!(index.add(make_ship(10, 0, 0, "overworld")).is_ok());
	}
}
