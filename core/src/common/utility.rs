mod multi_hash_map;
pub use multi_hash_map::*;

mod thread;
pub use thread::*;
