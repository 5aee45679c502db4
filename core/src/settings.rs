use crate::{common::math::Vector3, server::world::ShipyardBounds};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
	path::{Path, PathBuf},
	time::Duration,
};

static LOG: &'static str = "settings";

/// Tunables for a ship world and its pipeline, stored as `settings.json` in the world's root directory.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
	#[serde(skip)]
	root_path: PathBuf,
	/// The range of claim indices ships may be allocated in.
	#[serde(default)]
	shipyard: ShipyardBounds,
	/// The number of chunks along each side of a ship's claim.
	#[serde(default = "Settings::default_claim_diameter")]
	claim_diameter: i32,
	/// How close (in blocks) an observer must be to a ship's bounds to watch its chunks.
	#[serde(default = "Settings::default_watch_radius")]
	watch_radius: f64,
	#[serde(default)]
	synchronize_physics: bool,
	#[serde(default = "Settings::default_physics_ticks_per_game_tick")]
	physics_ticks_per_game_tick: u32,
	#[serde(default = "Settings::default_physics_target_rate")]
	physics_target_rate: u32,
	#[serde(default = "Settings::default_max_lost_time_ms")]
	max_lost_time_ms: u64,
	#[serde(default = "Settings::default_tick_window_ms")]
	tick_window_ms: u64,
	#[serde(default = "Settings::default_frame_queue_capacity")]
	frame_queue_capacity: usize,
	/// Producers are throttled once a frame queue is within this many frames of its capacity.
	#[serde(default = "Settings::default_frame_queue_warn_margin")]
	frame_queue_warn_margin: usize,
	#[serde(default = "Settings::default_frame_queue_throttle_ms")]
	frame_queue_throttle_ms: u64,
	#[serde(default = "Settings::default_gravity")]
	gravity: [f64; 3],
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			root_path: PathBuf::new(),
			shipyard: ShipyardBounds::default(),
			claim_diameter: Self::default_claim_diameter(),
			watch_radius: Self::default_watch_radius(),
			synchronize_physics: false,
			physics_ticks_per_game_tick: Self::default_physics_ticks_per_game_tick(),
			physics_target_rate: Self::default_physics_target_rate(),
			max_lost_time_ms: Self::default_max_lost_time_ms(),
			tick_window_ms: Self::default_tick_window_ms(),
			frame_queue_capacity: Self::default_frame_queue_capacity(),
			frame_queue_warn_margin: Self::default_frame_queue_warn_margin(),
			frame_queue_throttle_ms: Self::default_frame_queue_throttle_ms(),
			gravity: Self::default_gravity(),
		}
	}
}

impl Settings {
	fn default_claim_diameter() -> i32 {
		256
	}

	fn default_watch_radius() -> f64 {
		128.0
	}

	fn default_physics_ticks_per_game_tick() -> u32 {
		3
	}

	fn default_physics_target_rate() -> u32 {
		60
	}

	fn default_max_lost_time_ms() -> u64 {
		1000
	}

	fn default_tick_window_ms() -> u64 {
		5000
	}

	fn default_frame_queue_capacity() -> usize {
		300
	}

	fn default_frame_queue_warn_margin() -> usize {
		30
	}

	fn default_frame_queue_throttle_ms() -> u64 {
		50
	}

	fn default_gravity() -> [f64; 3] {
		[0.0, -10.0, 0.0]
	}
}

impl Settings {
	pub fn root_path(&self) -> &Path {
		&self.root_path
	}

	pub fn shipyard(&self) -> &ShipyardBounds {
		&self.shipyard
	}

	pub fn with_shipyard(mut self, shipyard: ShipyardBounds) -> Self {
		self.shipyard = shipyard;
		self
	}

	pub fn claim_diameter(&self) -> i32 {
		self.claim_diameter
	}

	pub fn watch_radius(&self) -> f64 {
		self.watch_radius
	}

	pub fn synchronize_physics(&self) -> bool {
		self.synchronize_physics
	}

	pub fn with_synchronized_physics(mut self, ticks_per_game_tick: u32) -> Self {
		self.synchronize_physics = true;
		self.physics_ticks_per_game_tick = ticks_per_game_tick;
		self
	}

	pub fn physics_ticks_per_game_tick(&self) -> u32 {
		self.physics_ticks_per_game_tick
	}

	pub fn physics_target_rate(&self) -> u32 {
		self.physics_target_rate
	}

	pub fn with_physics_target_rate(mut self, rate: u32) -> Self {
		self.physics_target_rate = rate;
		self
	}

	pub fn max_lost_time(&self) -> Duration {
		Duration::from_millis(self.max_lost_time_ms)
	}

	pub fn tick_window(&self) -> Duration {
		Duration::from_millis(self.tick_window_ms)
	}

	pub fn frame_queue_capacity(&self) -> usize {
		self.frame_queue_capacity
	}

	pub fn frame_queue_warn_margin(&self) -> usize {
		self.frame_queue_warn_margin
	}

	pub fn frame_queue_throttle(&self) -> Duration {
		Duration::from_millis(self.frame_queue_throttle_ms)
	}

	pub fn gravity(&self) -> Vector3<f64> {
		Vector3::from(self.gravity)
	}
}

impl Settings {
	pub const FILE_NAME: &'static str = "settings.json";

	pub fn file_path(root_dir: &Path) -> PathBuf {
		root_dir.join(Self::FILE_NAME)
	}

	/// Reads the settings of the world at `root_dir`, replacing values the world cannot run with,
	/// and writes the result back so every field is present on disk.
	pub fn load(root_dir: &Path) -> anyhow::Result<Self> {
		let path = Self::file_path(root_dir);
		let stored = match path.exists() {
			true => {
				let raw = std::fs::read_to_string(&path)
					.with_context(|| format!("reading {}", path.display()))?;
				serde_json::from_str::<Self>(&raw)
					.with_context(|| format!("parsing {}", path.display()))?
			}
			false => {
				log::info!(target: LOG, "No settings at {}, using defaults", path.display());
				Self::default()
			}
		};
		let settings = Self {
			root_path: root_dir.to_owned(),
			..stored.sanitized()
		};
		settings.save()?;
		Ok(settings)
	}

	pub fn save(&self) -> anyhow::Result<()> {
		std::fs::create_dir_all(&self.root_path)?;
		let path = Self::file_path(&self.root_path);
		std::fs::write(&path, serde_json::to_string_pretty(self)?)
			.with_context(|| format!("writing {}", path.display()))?;
		Ok(())
	}

	fn sanitized(mut self) -> Self {
		if self.claim_diameter <= 0 {
			log::warn!(target: LOG, "Claim diameter {} is not positive", self.claim_diameter);
			self.claim_diameter = Self::default_claim_diameter();
		}
		if self.physics_target_rate == 0 {
			log::warn!(target: LOG, "Physics target rate cannot be zero");
			self.physics_target_rate = Self::default_physics_target_rate();
		}
		if self.physics_ticks_per_game_tick == 0 {
			log::warn!(target: LOG, "Synchronized physics needs at least one step per game tick");
			self.physics_ticks_per_game_tick = Self::default_physics_ticks_per_game_tick();
		}
		if self.frame_queue_capacity == 0 {
			log::warn!(target: LOG, "Frame queues need room for at least one frame");
			self.frame_queue_capacity = Self::default_frame_queue_capacity();
		}
		self
	}
}
