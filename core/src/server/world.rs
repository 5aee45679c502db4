//! Server-side ship state: where ships live in the shipyard, who is watching them,
//! and how block changes reach their physics bodies.

pub mod chunk;

pub mod claim;
pub use claim::{Claim, ClaimAllocator, ShipyardBounds};

pub mod ownership;
pub use ownership::{Cursor, OwnershipIndex};

pub mod ship;
pub use ship::{Capabilities, Capability, DimensionId, Ship, ShipId};

pub mod loading;
pub use loading::{LoadStage, ShipLoadManager};

pub mod voxel;

pub mod ship_world;
pub use ship_world::{BlockChange, ShipWorld, TickChanges, WorldStage};
