pub mod event;
pub mod math;
pub mod physics;
pub mod stage;
pub mod utility;
