use std::time::{Duration, SystemTime};
use futures::channel::mpsc::{channel, Receiver, Sender, UnboundedSender};
use futures::channel::oneshot;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::types::SessionConfig;
use crate::error::SessionError;
use crate::platform::{AdapterEvent, AdapterEventSender, PlatformAdapter, PlatformInfo};
use crate::protocol::types::LedSwitch;
use crate::session::constants::INBOX_CAPACITY;
use crate::session::types::{normalize, ButtonState, ConnectionState, DeviceInfo, LedState, MotionSample, SessionEvent};

pub(crate) enum Request {
    StartMonitoring(oneshot::Sender<Result<(), SessionError>>),
    StopMonitoring(oneshot::Sender<()>),
    Subscribe(UnboundedSender<SessionEvent>, oneshot::Sender<()>),
    Unsubscribe(UnboundedSender<SessionEvent>, oneshot::Sender<bool>),
    SetLed(LedSwitch, oneshot::Sender<Result<(), SessionError>>),
    SetAutoReconnect(bool, oneshot::Sender<()>),
    GetLedState(oneshot::Sender<LedState>),
    GetConnectionState(oneshot::Sender<ConnectionState>),
    GetPlatformInfo(oneshot::Sender<PlatformInfo>),
    GetMotionState(oneshot::Sender<MotionSample>),
    GetButtonState(oneshot::Sender<ButtonState>),
    GetProtocolErrorCount(oneshot::Sender<u64>),
    Shutdown(oneshot::Sender<()>),
}

/**
 * Everything the session reacts to goes through one inbox, so client requests and hardware
 * events share a single total order.
 */
pub(crate) enum SessionMessage {
    Request(Request),
    Adapter { epoch: u64, event: AdapterEvent },
    Reconnect { ticket: u64 },
}

/**
 * The single owner of connection state, last known device values and the subscriber list.
 * It runs as its own task; `SpaceMouse` is the handle used to talk to it.
 */
pub(crate) struct DeviceSession {
    id: Uuid,
    adapter: Box<dyn PlatformAdapter>,
    inbox_sender: Sender<SessionMessage>,
    cancel: CancellationToken,

    state: ConnectionState,
    motion: MotionSample,
    buttons: ButtonState,
    led_state: LedState,
    // last switch sent to the device, acknowledgements for anything else are stale
    led_command: Option<LedSwitch>,
    subscribers: Vec<UnboundedSender<SessionEvent>>,
    protocol_errors: u64,

    // bumped on every stop, events tagged with an older epoch are dropped
    epoch: u64,

    auto_reconnect: bool,
    reconnect_delay: Duration,
    retry_delay: Duration,
    clamp_motion: bool,
    reconnect_ticket: u64,
    reconnect_cancel: Option<CancellationToken>,
    // consecutive failed attempts, only reported in the log
    reconnect_failures: u32,
}

impl DeviceSession {
    pub(crate) fn spawn(
        adapter: Box<dyn PlatformAdapter>,
        config: &SessionConfig,
        cancel: CancellationToken,
    ) -> (Sender<SessionMessage>, JoinHandle<()>) {
        let (inbox_sender, inbox) = channel::<SessionMessage>(INBOX_CAPACITY);

        let session = DeviceSession {
            id: Uuid::new_v4(),
            adapter,
            inbox_sender: inbox_sender.clone(),
            cancel,
            state: ConnectionState::Disconnected,
            motion: MotionSample::default(),
            buttons: ButtonState::new(),
            led_state: LedState::Unknown,
            led_command: None,
            subscribers: Vec::new(),
            protocol_errors: 0,
            epoch: 0,
            auto_reconnect: config.auto_reconnect,
            reconnect_delay: config.reconnect_delay(),
            retry_delay: config.retry_delay(),
            clamp_motion: config.clamp_motion,
            reconnect_ticket: 0,
            reconnect_cancel: None,
            reconnect_failures: 0,
        };

        info!("Session {} created ({:?})", session.id, session.adapter.describe());
        let handle = spawn(session.run(inbox));
        (inbox_sender, handle)
    }

    async fn run(mut self, mut inbox: Receiver<SessionMessage>) {
        let mut shutdown_reply = None;

        'mainloop: loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => {
                    break 'mainloop;
                },
                message = inbox.next() => match message {
                    Some(message) => message,
                    None => break 'mainloop,
                },
            };

            match message {
                SessionMessage::Request(request) => {
                    if let Some(reply) = self.handle_request(request).await {
                        shutdown_reply = Some(reply);
                        break 'mainloop;
                    }
                },
                SessionMessage::Adapter { epoch, event } => self.handle_adapter_event(epoch, event).await,
                SessionMessage::Reconnect { ticket } => self.handle_reconnect(ticket).await,
            }
        }

        self.stop_monitoring().await;
        info!("Session {} stopped", self.id);

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    /// Returns the reply of a shutdown request, which is answered once the session has stopped.
    async fn handle_request(&mut self, request: Request) -> Option<oneshot::Sender<()>> {
        // a dropped reply receiver only means the caller lost interest
        match request {
            Request::StartMonitoring(reply) => {
                let _ = reply.send(self.start_monitoring().await);
            },
            Request::StopMonitoring(reply) => {
                self.stop_monitoring().await;
                let _ = reply.send(());
            },
            Request::Subscribe(subscriber, reply) => {
                self.subscribe(subscriber);
                let _ = reply.send(());
            },
            Request::Unsubscribe(subscriber, reply) => {
                let _ = reply.send(self.unsubscribe(&subscriber));
            },
            Request::SetLed(switch, reply) => {
                let _ = reply.send(self.set_led(switch).await);
            },
            Request::SetAutoReconnect(enabled, reply) => {
                self.set_auto_reconnect(enabled);
                let _ = reply.send(());
            },
            Request::GetLedState(reply) => {
                let _ = reply.send(self.led_state);
            },
            Request::GetConnectionState(reply) => {
                let _ = reply.send(self.state);
            },
            Request::GetPlatformInfo(reply) => {
                let _ = reply.send(self.adapter.describe());
            },
            Request::GetMotionState(reply) => {
                let _ = reply.send(self.motion);
            },
            Request::GetButtonState(reply) => {
                let _ = reply.send(self.buttons.clone());
            },
            Request::GetProtocolErrorCount(reply) => {
                let _ = reply.send(self.protocol_errors);
            },
            Request::Shutdown(reply) => return Some(reply),
        }

        None
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            info!("Session {}: {} -> {}", self.id, self.state, state);
            self.state = state;
        }
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo::spacemouse(self.adapter.describe())
    }

    fn broadcast(&mut self, event: SessionEvent) {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());

        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            debug!("Session {}: removed {} closed subscriber(s)", self.id, dropped);
        }
    }

    async fn start_monitoring(&mut self) -> Result<(), SessionError> {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            debug!("Session {}: already {}, ignoring start", self.id, self.state);
            return Ok(());
        }

        let events = AdapterEventSender::new(self.epoch, self.inbox_sender.clone());

        match self.adapter.start_monitoring(events).await {
            Ok(()) => {
                self.set_state(ConnectionState::Connecting);
                Ok(())
            },
            Err(err) => {
                warn!("Session {}: failed to start monitoring: {}", self.id, err);
                self.set_state(ConnectionState::Error);
                Err(err)
            },
        }
    }

    async fn stop_monitoring(&mut self) {
        self.cancel_reconnect();
        self.epoch += 1;
        self.adapter.stop_monitoring().await;

        let was_connected = self.state == ConnectionState::Connected;
        self.reset_led();
        self.set_state(ConnectionState::Disconnected);

        if was_connected {
            self.broadcast(SessionEvent::Disconnected { device_info: self.device_info() });
        }
    }

    fn subscribe(&mut self, subscriber: UnboundedSender<SessionEvent>) {
        if self.subscribers.iter().any(|existing| existing.same_receiver(&subscriber)) {
            return;
        }

        // a late subscriber still learns that the device is there
        if self.state == ConnectionState::Connected {
            let event = SessionEvent::Connected { device_info: self.device_info() };
            if subscriber.unbounded_send(event).is_err() {
                return;
            }
        }

        self.subscribers.push(subscriber);
    }

    fn unsubscribe(&mut self, subscriber: &UnboundedSender<SessionEvent>) -> bool {
        match self.subscribers.iter().position(|existing| existing.same_receiver(subscriber)) {
            Some(index) => {
                self.subscribers.remove(index);
                true
            },
            None => false,
        }
    }

    async fn set_led(&mut self, switch: LedSwitch) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connected || !self.adapter.is_connected() {
            return Err(SessionError::DeviceNotConnected);
        }

        self.adapter.send_led_command(switch).await?;
        self.led_command = Some(switch);
        let led_state = self.adapter.led_state();
        self.apply_led_state(led_state);
        Ok(())
    }

    fn apply_led_state(&mut self, to: LedState) {
        if self.led_state == to {
            return;
        }

        let from = std::mem::replace(&mut self.led_state, to);
        self.broadcast(SessionEvent::LedChanged { from, to, timestamp: SystemTime::now() });
    }

    fn reset_led(&mut self) {
        self.led_state = LedState::Unknown;
        self.led_command = None;
    }

    fn set_auto_reconnect(&mut self, enabled: bool) {
        self.auto_reconnect = enabled;
        if !enabled {
            self.cancel_reconnect();
        }
    }

    fn normalize_axis(&self, raw: i32) -> f64 {
        let value = normalize(raw);
        if self.clamp_motion {
            value.clamp(-1.0, 1.0)
        } else {
            value
        }
    }

    async fn handle_adapter_event(&mut self, epoch: u64, event: AdapterEvent) {
        if epoch != self.epoch {
            debug!("Session {}: dropping {:?} from stopped monitor", self.id, event);
            return;
        }

        self.adapter.observe(&event);

        match event {
            AdapterEvent::Ready => {
                debug!("Session {}: helper ready", self.id);
            },
            AdapterEvent::DeviceConnected => {
                self.reconnect_failures = 0;
                if self.state != ConnectionState::Connected {
                    self.set_state(ConnectionState::Connected);
                    self.broadcast(SessionEvent::Connected { device_info: self.device_info() });
                }
            },
            AdapterEvent::DeviceDisconnected => {
                self.handle_disconnect();
            },
            AdapterEvent::Motion { axis, raw } => {
                let value = self.normalize_axis(raw);
                self.motion.set(axis, value);
                self.broadcast(SessionEvent::Motion(self.motion));
            },
            AdapterEvent::Button { id, action } => {
                self.buttons.insert(id, action);
                self.broadcast(SessionEvent::Button { id, action });
            },
            AdapterEvent::LedAck { state, method } => {
                match self.led_command {
                    Some(command) if command != state => {
                        debug!("Session {}: ignoring stale LED {} acknowledgement", self.id, state);
                    },
                    _ => {
                        debug!("Session {}: helper set LED {} (method {})", self.id, state, method);
                        self.apply_led_state(state.into());
                    },
                }
            },
            AdapterEvent::ProtocolError(err) => {
                self.protocol_errors += 1;
                debug!("Session {}: {}", self.id, err);
            },
            AdapterEvent::ProcessExited { status } => {
                warn!("Session {}: helper exited (status {:?})", self.id, status);
                self.epoch += 1;
                self.adapter.stop_monitoring().await;
                self.handle_disconnect();
            },
            AdapterEvent::InitFailed { status } => {
                error!("Session {}: helper failed to initialize (status {:?})", self.id, status);
                self.epoch += 1;
                self.adapter.stop_monitoring().await;

                let was_connected = self.state == ConnectionState::Connected;
                self.reset_led();
                self.set_state(ConnectionState::Error);
                if was_connected {
                    self.broadcast(SessionEvent::Disconnected { device_info: self.device_info() });
                }
            },
        }
    }

    fn handle_disconnect(&mut self) {
        let was_connected = self.state == ConnectionState::Connected;

        // the LED is not guaranteed to survive a physical reconnect, the pose is kept
        self.reset_led();
        self.set_state(ConnectionState::Disconnected);

        if was_connected {
            self.broadcast(SessionEvent::Disconnected { device_info: self.device_info() });
        }

        if self.auto_reconnect {
            self.schedule_reconnect(self.reconnect_delay);
        }
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect_ticket += 1;
        if let Some(cancel) = self.reconnect_cancel.take() {
            cancel.cancel();
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        self.cancel_reconnect();

        let ticket = self.reconnect_ticket;
        let cancel = self.cancel.child_token();
        let mut sender = self.inbox_sender.clone();

        info!("Session {}: reconnecting in {}", self.id, humantime::format_duration(delay));

        let task_cancel = cancel.clone();
        spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {},
                _ = sleep(delay) => {
                    let _ = sender.send(SessionMessage::Reconnect { ticket }).await;
                },
            }
        });

        self.reconnect_cancel = Some(cancel);
    }

    async fn handle_reconnect(&mut self, ticket: u64) {
        if ticket != self.reconnect_ticket || !self.auto_reconnect {
            return;
        }
        self.reconnect_cancel = None;

        info!("Session {}: attempting to reconnect", self.id);

        match self.start_monitoring().await {
            Ok(()) => self.reconnect_failures = 0,
            Err(err) => {
                self.reconnect_failures += 1;
                warn!("Session {}: reconnect attempt {} failed: {}", self.id, self.reconnect_failures, err);
                self.schedule_reconnect(self.retry_delay);
            },
        }
    }
}
