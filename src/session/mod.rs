pub(crate) mod actor;
pub mod constants;
pub mod handle;
pub mod types;

pub use handle::SpaceMouse;
pub use types::{ButtonState, ConnectionState, DeviceInfo, LedState, MotionSample, SessionEvent};
