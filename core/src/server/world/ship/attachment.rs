use serde::{de::DeserializeOwned, Serialize};
use std::{any::Any, collections::HashMap};

/// Whether an attachment is saved with the ship or only lives while the ship is in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
	Persistent,
	Transient,
}

/// Extra per-ship data provided by other systems.
///
/// Each attachment type is stored under its own [`KEY`](Attachment::KEY),
/// which is also the name it is saved under when [`Persistent`](Lifetime::Persistent).
pub trait Attachment: Any + Send + Sync + Serialize + DeserializeOwned {
	const KEY: &'static str;
	const LIFETIME: Lifetime;
}

struct Entry {
	lifetime: Lifetime,
	value: Box<dyn Any + Send + Sync>,
	save: fn(&(dyn Any + Send + Sync)) -> anyhow::Result<serde_json::Value>,
}

fn save_as<T: Attachment>(value: &(dyn Any + Send + Sync)) -> anyhow::Result<serde_json::Value> {
	let value = value
		.downcast_ref::<T>()
		.ok_or(Error::KeyCollision(T::KEY))?;
	Ok(serde_json::to_value(value)?)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("attachment key {0} is stored with a different type")]
	KeyCollision(&'static str),
}

#[derive(Default)]
pub struct Attachments(HashMap<&'static str, Entry>);

impl Attachments {
	/// Stores the attachment, returning any previous value of the same type.
	pub fn insert<T: Attachment>(&mut self, value: T) -> Option<T> {
		let previous = self.0.insert(
			T::KEY,
			Entry {
				lifetime: T::LIFETIME,
				value: Box::new(value),
				save: save_as::<T>,
			},
		);
		previous.and_then(|entry| entry.value.downcast::<T>().ok().map(|boxed| *boxed))
	}

	pub fn get<T: Attachment>(&self) -> Option<&T> {
		self.0.get(T::KEY)?.value.downcast_ref::<T>()
	}

	pub fn get_mut<T: Attachment>(&mut self) -> Option<&mut T> {
		self.0.get_mut(T::KEY)?.value.downcast_mut::<T>()
	}

	pub fn remove<T: Attachment>(&mut self) -> Option<T> {
		let entry = self.0.remove(T::KEY)?;
		entry.value.downcast::<T>().ok().map(|boxed| *boxed)
	}

	/// Drops every [`Transient`](Lifetime::Transient) attachment, e.g. when the ship unloads.
	pub fn clear_transient(&mut self) {
		self.0.retain(|_, entry| entry.lifetime == Lifetime::Persistent);
	}

	/// Serializes every persistent attachment keyed by its [`KEY`](Attachment::KEY).
	pub fn save(&self) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
		let mut saved = serde_json::Map::new();
		for (key, entry) in self.0.iter() {
			if entry.lifetime == Lifetime::Persistent {
				saved.insert((*key).to_owned(), (entry.save)(entry.value.as_ref())?);
			}
		}
		Ok(saved)
	}

	/// Restores an attachment of type `T` from data produced by [`save`](Attachments::save).
	/// Returns false if nothing was saved for `T`.
	pub fn load<T: Attachment>(
		&mut self,
		saved: &serde_json::Map<String, serde_json::Value>,
	) -> anyhow::Result<bool> {
		match saved.get(T::KEY) {
			Some(value) => {
				self.insert(serde_json::from_value::<T>(value.clone())?);
				Ok(true)
			}
			None => Ok(false),
		}
	}
}
