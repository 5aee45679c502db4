//! Ship World simulates movable, block-built ships embedded in a chunked voxel world,
//! and keeps remote observers told which shipyard chunks they need to watch as those ships move.
//!
//! A world is ticked on a single simulation thread ([`server::world::ShipWorld`]), while rigid-body physics
//! runs on its own thread behind a [`pipeline::Pipeline`]. The two trade immutable frames through bounded queues,
//! or can be locked to a fixed number of physics steps per game tick.
//!
//! Library Notes:
//! - [log](https://crates.io/crates/log) for categorized logging; each module logs under its own target
//! - [profiling](https://crates.io/crates/profiling) for instrumenting hot paths (enable the `profile` feature for tracy)
//! - [nalgebra](https://crates.io/crates/nalgebra) for all vector/rotation math
//! - [crossbeam-channel](https://crates.io/crates/crossbeam-channel) for the frame queues and the physics task inbox
//! - [enumset](https://crates.io/crates/enumset) for ship capability flags
//!
//! The physics engine itself is pluggable ([`common::physics::PhysicsEngine`]);
//! [`common::physics::SimplePhysics`] only integrates velocity and gravity, with no collisions.

pub mod common;
pub mod pipeline;
pub mod server;
pub mod settings;
