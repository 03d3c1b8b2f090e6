use std::sync::Arc;
use futures::channel::mpsc::{unbounded, Sender, UnboundedReceiver, UnboundedSender};
use futures::channel::oneshot;
use futures::SinkExt;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::types::SessionConfig;
use crate::error::SessionError;
use crate::platform::{select_adapter, PlatformAdapter, PlatformInfo};
use crate::protocol::types::LedSwitch;
use crate::session::actor::{DeviceSession, Request, SessionMessage};
use crate::session::types::{ButtonState, ConnectionState, LedState, MotionSample, SessionEvent};

/**
 * Cloneable handle to a running device session. Every call is queued behind the hardware events
 * that arrived before it. The session task ends with `shutdown` or when the last clone is dropped.
 */
#[derive(Clone)]
pub struct SpaceMouse {
    sender: Sender<SessionMessage>,
    _guard: Arc<DropGuard>,
}

impl SpaceMouse {
    /// Starts a session using the adapter for this platform.
    pub fn new(config: &SessionConfig) -> SpaceMouse {
        SpaceMouse::with_adapter(select_adapter(config), config)
    }

    pub fn with_adapter(adapter: Box<dyn PlatformAdapter>, config: &SessionConfig) -> SpaceMouse {
        let cancel = CancellationToken::new();
        let (sender, _handle) = DeviceSession::spawn(adapter, config, cancel.clone());

        SpaceMouse {
            sender,
            _guard: Arc::new(cancel.drop_guard()),
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel::<T>();
        let mut sender = self.sender.clone();

        sender.send(SessionMessage::Request(build(reply))).await
            .map_err(|_| SessionError::SessionClosed)?;

        response.await.map_err(|_| SessionError::SessionClosed)
    }

    pub async fn start_monitoring(&self) -> Result<(), SessionError> {
        self.request(Request::StartMonitoring).await?
    }

    pub async fn stop_monitoring(&self) -> Result<(), SessionError> {
        self.request(Request::StopMonitoring).await
    }

    /// Adding the same subscriber twice has no effect.
    pub async fn subscribe(&self, subscriber: UnboundedSender<SessionEvent>) -> Result<(), SessionError> {
        self.request(|reply| Request::Subscribe(subscriber, reply)).await
    }

    pub async fn subscribe_channel(&self) -> Result<UnboundedReceiver<SessionEvent>, SessionError> {
        let (subscriber, events) = unbounded::<SessionEvent>();
        self.subscribe(subscriber).await?;
        Ok(events)
    }

    /// Returns whether the subscriber was registered.
    pub async fn unsubscribe(&self, subscriber: UnboundedSender<SessionEvent>) -> Result<bool, SessionError> {
        self.request(|reply| Request::Unsubscribe(subscriber, reply)).await
    }

    pub async fn set_led(&self, switch: LedSwitch) -> Result<(), SessionError> {
        self.request(|reply| Request::SetLed(switch, reply)).await?
    }

    pub async fn set_auto_reconnect(&self, enabled: bool) -> Result<(), SessionError> {
        self.request(|reply| Request::SetAutoReconnect(enabled, reply)).await
    }

    pub async fn get_led_state(&self) -> Result<LedState, SessionError> {
        self.request(Request::GetLedState).await
    }

    pub async fn is_connected(&self) -> Result<bool, SessionError> {
        Ok(self.connection_state().await? == ConnectionState::Connected)
    }

    pub async fn connection_state(&self) -> Result<ConnectionState, SessionError> {
        self.request(Request::GetConnectionState).await
    }

    pub async fn platform_info(&self) -> Result<PlatformInfo, SessionError> {
        self.request(Request::GetPlatformInfo).await
    }

    pub async fn get_motion_state(&self) -> Result<MotionSample, SessionError> {
        self.request(Request::GetMotionState).await
    }

    pub async fn get_button_state(&self) -> Result<ButtonState, SessionError> {
        self.request(Request::GetButtonState).await
    }

    /// Number of malformed helper lines absorbed so far.
    pub async fn protocol_error_count(&self) -> Result<u64, SessionError> {
        self.request(Request::GetProtocolErrorCount).await
    }

    /// Stops monitoring and ends the session task; later calls fail with `SessionClosed`.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(Request::Shutdown).await
    }
}
