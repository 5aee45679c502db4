//! The physics thread: a rate-paced loop which integrates ship bodies independently of the game tick.

mod driver;
pub use driver::*;

mod engine;
pub use engine::*;

mod rate;
pub use rate::*;
