use rand::{seq::SliceRandom, Rng};

static ADJECTIVES: &[&str] = &[
	"Amber", "Brave", "Copper", "Dusky", "Eager", "Frozen", "Gilded", "Hollow", "Iron", "Jade",
	"Keen", "Lucky", "Misty", "Noble", "Obsidian", "Pale", "Quiet", "Rusty", "Silent", "Tidal",
];

static NOUNS: &[&str] = &[
	"Anchor", "Beacon", "Compass", "Drifter", "Ember", "Falcon", "Gull", "Harbor", "Island",
	"Kestrel", "Lantern", "Mariner", "Nomad", "Otter", "Pelican", "Raven", "Sparrow", "Tern",
	"Voyager", "Wanderer",
];

/// Produces a human readable, not necessarily unique, name for a new ship.
pub fn generate_name<R: Rng + ?Sized>(rng: &mut R) -> String {
	let adjective = ADJECTIVES.choose(rng).unwrap_or(&"Nameless");
	let noun = NOUNS.choose(rng).unwrap_or(&"Ship");
	format!("{} {}", adjective, noun)
}

#[cfg(test)]
mod name {
	use super::generate_name;

	#[test]
	fn two_words() {
		let name = generate_name(&mut rand::thread_rng());
		assert_eq!(name.split(' ').count(), 2);
	}
}
