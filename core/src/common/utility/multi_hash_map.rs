use std::{
	cmp::Eq,
	collections::{hash_map, HashMap, HashSet},
	hash::Hash,
};

/// A one-to-many relationship where each key maps to a set of unique values.
/// Keys whose sets become empty are dropped, so [`keys`](MultiSet::keys) only yields populated entries.
pub struct MultiSet<K: Hash, V: Hash>(HashMap<K, HashSet<V>>);

impl<K, V> Default for MultiSet<K, V>
where
	K: Hash,
	V: Hash,
{
	fn default() -> Self {
		Self(HashMap::new())
	}
}

impl<K, V> Clone for MultiSet<K, V>
where
	K: Hash + Clone,
	V: Hash + Clone,
{
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<K, V> std::fmt::Debug for MultiSet<K, V>
where
	K: Hash + std::fmt::Debug,
	V: Hash + std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_map().entries(self.0.iter()).finish()
	}
}

impl<K, V> PartialEq for MultiSet<K, V>
where
	K: Hash + Eq,
	V: Hash + Eq,
{
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}

impl<K, V> MultiSet<K, V>
where
	K: Hash + Eq,
	V: Hash + Eq,
{
	pub fn insert(&mut self, key: &K, value: V) -> bool
	where
		K: Clone,
	{
		match self.0.get_mut(key) {
			Some(set) => set.insert(value),
			None => {
				let mut set = HashSet::with_capacity(1);
				set.insert(value);
				self.0.insert(key.clone(), set);
				true
			}
		}
	}

	pub fn insert_all(&mut self, key: &K, values: impl IntoIterator<Item = V>) -> usize
	where
		K: Clone,
	{
		let mut count = 0;
		for value in values.into_iter() {
			if self.insert(key, value) {
				count += 1;
			}
		}
		count
	}

	pub fn remove(&mut self, key: &K, value: &V) -> bool {
		let (success, is_empty) = match self.0.get_mut(key) {
			Some(set) => {
				let success = set.remove(value);
				(success, set.is_empty())
			}
			None => (false, false),
		};
		if success && is_empty {
			self.0.remove(key);
		}
		success
	}

	pub fn get(&self, key: &K) -> Option<&HashSet<V>> {
		self.0.get(key)
	}

	pub fn contains(&self, key: &K, value: &V) -> bool {
		self.0.get(key).map(|set| set.contains(value)).unwrap_or(false)
	}

	/// The number of values paired with a key, zero if the key is absent.
	pub fn count(&self, key: &K) -> usize {
		self.0.get(key).map(HashSet::len).unwrap_or(0)
	}

	pub fn keys<'a>(&'a self) -> hash_map::Keys<'a, K, HashSet<V>> {
		self.0.keys()
	}

	pub fn iter<'a>(&'a self) -> hash_map::Iter<'a, K, HashSet<V>> {
		self.0.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn into_inner(self) -> HashMap<K, HashSet<V>> {
		self.0
	}

	/// Returns the pairs which are in `self` but not in `other`.
	pub fn difference(&self, other: &Self) -> Self
	where
		K: Clone,
		V: Clone,
	{
		let mut diff = Self::default();
		for (key, set) in self.0.iter() {
			match other.0.get(key) {
				Some(other_set) => {
					diff.insert_all(key, set.difference(other_set).cloned());
				}
				None => {
					diff.insert_all(key, set.iter().cloned());
				}
			}
		}
		diff
	}

	/// Returns the pairs which are in both `self` and `other`.
	pub fn intersection(&self, other: &Self) -> Self
	where
		K: Clone,
		V: Clone,
	{
		let mut both = Self::default();
		for (key, set) in self.0.iter() {
			if let Some(other_set) = other.0.get(key) {
				both.insert_all(key, set.intersection(other_set).cloned());
			}
		}
		both
	}
}
