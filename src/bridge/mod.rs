pub mod process;

pub use process::{BridgeEvent, BridgeProcess};
