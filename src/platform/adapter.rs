use async_trait::async_trait;
use futures::channel::mpsc::Sender;
use futures::SinkExt;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, SessionError};
use crate::protocol::types::{Axis, ButtonAction, HelperMessage, HelperStatus, LedSwitch};
use crate::session::actor::SessionMessage;
use crate::session::types::LedState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub platform: String,
    pub method: String,
    pub version: String,
}

/**
 * Events an adapter reports to the session owning it.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    Ready,
    DeviceConnected,
    DeviceDisconnected,
    Motion { axis: Axis, raw: i32 },
    Button { id: u32, action: ButtonAction },
    LedAck { state: LedSwitch, method: i32 },
    ProtocolError(ProtocolError),
    // the helper exited before it ever reported `ready`
    InitFailed { status: Option<i32> },
    ProcessExited { status: Option<i32> },
}

impl From<HelperMessage> for AdapterEvent {
    fn from(message: HelperMessage) -> Self {
        match message {
            HelperMessage::Status(HelperStatus::Ready) => AdapterEvent::Ready,
            HelperMessage::Status(HelperStatus::DeviceConnected) => AdapterEvent::DeviceConnected,
            HelperMessage::Status(HelperStatus::DeviceDisconnected) => AdapterEvent::DeviceDisconnected,
            HelperMessage::Motion { axis, raw } => AdapterEvent::Motion { axis, raw },
            HelperMessage::Button { id, action } => AdapterEvent::Button { id, action },
            HelperMessage::LedAck { state, method } => AdapterEvent::LedAck { state, method },
        }
    }
}

/**
 * Delivers adapter events into the inbox of the session that started monitoring. Every sender
 * is tagged with the monitoring epoch it was created for, so the session can drop events that
 * arrive after monitoring was stopped.
 */
#[derive(Clone)]
pub struct AdapterEventSender {
    epoch: u64,
    sender: Sender<SessionMessage>,
}

impl AdapterEventSender {
    pub(crate) fn new(epoch: u64, sender: Sender<SessionMessage>) -> Self {
        AdapterEventSender { epoch, sender }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns false once the session is gone.
    pub async fn send(&mut self, event: AdapterEvent) -> bool {
        let message = SessionMessage::Adapter { epoch: self.epoch, event };
        self.sender.send(message).await.is_ok()
    }
}

/**
 * Uniform access to a SpaceMouse on one platform.
 *
 * The session calls every method from its own task, one at a time. `observe` is invoked for each
 * event before the session acts on it, which is where an adapter keeps its own view of the device
 * (connection, readiness, LED) up to date.
 */
#[async_trait]
pub trait PlatformAdapter: Send {
    /// Starts delivering events to `events`. Must not start a second monitor while one runs.
    async fn start_monitoring(&mut self, events: AdapterEventSender) -> Result<(), SessionError>;

    /// Stops monitoring. Tolerates a monitor that has already died.
    async fn stop_monitoring(&mut self);

    async fn send_led_command(&mut self, state: LedSwitch) -> Result<(), SessionError>;

    fn observe(&mut self, event: &AdapterEvent);

    fn led_state(&self) -> LedState;

    fn is_connected(&self) -> bool;

    fn is_monitoring(&self) -> bool;

    fn describe(&self) -> PlatformInfo;
}
