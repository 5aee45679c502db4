use super::{FrameReceiver, PhysicsFrame};
use crate::{
	common::math::PoseVel,
	server::world::{
		chunk::{ObserverId, TrackingInfo},
		ShipId,
	},
};
use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

/// What one observer needs to hear about after a game tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverUpdate {
	pub observer: ObserverId,
	pub tick: u64,
	pub start_tracking: BTreeSet<ShipId>,
	pub stop_tracking: BTreeSet<ShipId>,
	/// Poses of the ships the observer watches, one entry per physics frame, oldest first.
	pub frames: Vec<(u64, BTreeMap<ShipId, PoseVel>)>,
}

impl ObserverUpdate {
	pub fn is_empty(&self) -> bool {
		self.start_tracking.is_empty() && self.stop_tracking.is_empty() && self.frames.is_empty()
	}
}

/// Delivers observer updates to whatever transport the host uses.
pub trait NetworkSink: Send {
	fn send(&mut self, update: ObserverUpdate);
}

/// Discards every update; for worlds with no remote observers.
pub struct NoopNetwork;
impl NetworkSink for NoopNetwork {
	fn send(&mut self, _update: ObserverUpdate) {}
}

pub struct NetworkStage {
	physics_frames: FrameReceiver<Arc<PhysicsFrame>>,
	sink: Box<dyn NetworkSink>,
}

impl NetworkStage {
	pub fn new(physics_frames: FrameReceiver<Arc<PhysicsFrame>>, sink: Box<dyn NetworkSink>) -> Self {
		Self {
			physics_frames,
			sink,
		}
	}

	/// Sends each observer the physics frames of the ships it watches
	/// and which ships it started or stopped watching.
	#[profiling::function]
	pub fn post_tick(&mut self, tracking: &TrackingInfo) {
		let frames = self.physics_frames.drain();

		let observers = tracking
			.watching()
			.keys()
			.chain(tracking.ships_started().keys())
			.chain(tracking.ships_stopped().keys())
			.cloned()
			.collect::<BTreeSet<_>>();

		for observer in observers.into_iter() {
			let watched = tracking.watched_ships(&observer);
			let update = ObserverUpdate {
				observer,
				tick: tracking.tick(),
				start_tracking: tracking
					.ships_started()
					.get(&observer)
					.into_iter()
					.flatten()
					.cloned()
					.collect(),
				stop_tracking: tracking
					.ships_stopped()
					.get(&observer)
					.into_iter()
					.flatten()
					.cloned()
					.collect(),
				frames: frames
					.iter()
					.filter_map(|frame| {
						let poses = frame
							.poses
							.iter()
							.filter(|(id, _)| watched.contains(id))
							.map(|(id, pose)| (*id, *pose))
							.collect::<BTreeMap<_, _>>();
						(!poses.is_empty()).then(|| (frame.tick, poses))
					})
					.collect(),
			};
			if !update.is_empty() {
				self.sink.send(update);
			}
		}
	}
}

#[cfg(test)]
mod network_stage {
	use super::*;
	use crate::{
		common::{event::NoopSink, math::Point3},
		pipeline::frame_queue,
		server::world::{chunk::Observer, ShipWorld, ShipyardBounds},
		settings::Settings,
	};
	use std::{
		sync::{Arc, Mutex},
		time::Duration,
	};
	use uuid::Uuid;

	#[derive(Clone, Default)]
	struct Recorder(Arc<Mutex<Vec<ObserverUpdate>>>);
	impl NetworkSink for Recorder {
		fn send(&mut self, update: ObserverUpdate) {
			self.0.lock().unwrap().push(update);
		}
	}

	fn tracking_for(world: &mut ShipWorld, observers: Vec<Observer>) -> TrackingInfo {
		world.pre_tick(observers).unwrap();
		let proposal = world.chunk_watch_tasks().clone();
		world
			.set_executed(&proposal.watch_tasks, &proposal.unwatch_tasks)
			.unwrap();
		world.post_tick().unwrap().tracking
	}

	#[test]
	fn observers_receive_watched_ship_poses() {
		let settings = Settings::default().with_shipyard(ShipyardBounds {
			x_index_start: -10,
			x_index_end: 10,
			z_index_start: -10,
			z_index_end: 10,
		});
		let mut world = ShipWorld::new(&settings, Arc::new(NoopSink)).unwrap();
		let ship = world
			.create_ship_at_block(Point3::new(0, 64, 0), "overworld".to_owned(), 1.0)
			.unwrap();
		let observer = Observer::new(Uuid::new_v4(), Point3::new(10.0, 64.0, 0.0), "overworld".to_owned());

		let (send, recv) = frame_queue("network", 10, 1, Duration::from_millis(1));
		let recorder = Recorder::default();
		let mut stage = NetworkStage::new(recv, Box::new(recorder.clone()));

		for tick in [1, 2] {
			send.send(Arc::new(PhysicsFrame {
				tick,
				poses: BTreeMap::from([(ship, PoseVel::default()), (ship + 100, PoseVel::default())]),
			}));
		}
		let tracking = tracking_for(&mut world, vec![observer.clone()]);
		stage.post_tick(&tracking);
		{
			let updates = recorder.0.lock().unwrap();
			assert_eq!(updates.len(), 1);
			assert_eq!(updates[0].observer, observer.id);
			assert_eq!(updates[0].start_tracking, BTreeSet::from([ship]));
			assert_eq!(
				updates[0].frames.iter().map(|(tick, _)| *tick).collect::<Vec<_>>(),
				vec![1, 2]
			);
			assert!(updates[0]
				.frames
				.iter()
				.all(|(_, poses)| poses.keys().eq([ship].iter())));
		}

		let away = Observer::new(observer.id, Point3::new(100_000.0, 64.0, 0.0), "overworld".to_owned());
		let tracking = tracking_for(&mut world, vec![away]);
		stage.post_tick(&tracking);
		let updates = recorder.0.lock().unwrap();
		assert_eq!(updates.len(), 2);
		assert_eq!(updates[1].stop_tracking, BTreeSet::from([ship]));
		assert!(updates[1].frames.is_empty());
	}
}
