/**
 * Magnitude of a fully deflected axis as reported by the helper. Raw values are divided by this
 * to get the application-facing range [-1, 1].
 */
pub const RAW_AXIS_RANGE: f64 = 350.0;

/**
 * How long (milliseconds) to wait after a disconnect before the first reconnect attempt.
 */
pub const RECONNECT_DELAY: u64 = 2000;

/**
 * How long (milliseconds) to wait between reconnect attempts after one has failed.
 */
pub const RETRY_DELAY: u64 = 5000;

/**
 * Capacity of the session inbox shared by client requests and adapter events.
 */
pub const INBOX_CAPACITY: usize = 128;

/**
 * 3Dconnexion USB vendor id, the helper matches every device with this id.
 */
pub const SPACEMOUSE_VENDOR_ID: u16 = 0x256F;

pub const DEVICE_NAME: &str = "3Dconnexion SpaceMouse";
