use std::ffi::OsString;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{BridgeEvent, BridgeProcess};
use crate::error::SessionError;
use crate::platform::adapter::{AdapterEvent, AdapterEventSender, PlatformAdapter, PlatformInfo};
use crate::protocol::codec::encode_command;
use crate::protocol::types::{HostCommand, LedSwitch};
use crate::session::types::LedState;

struct Monitor {
    bridge: BridgeProcess,
    cancel: CancellationToken,
    forward_handle: JoinHandle<()>,
}

/**
 * Talks to the device through a privileged helper executable speaking the line protocol.
 * This is the macOS path, where the kernel claims the HID interface.
 */
pub struct BridgeAdapter {
    helper_path: PathBuf,
    helper_args: Vec<OsString>,
    monitor: Option<Monitor>,
    ready: bool,
    connected: bool,
    led_state: LedState,
    led_command: Option<LedSwitch>,
}

impl BridgeAdapter {
    pub fn new(helper_path: PathBuf) -> Self {
        BridgeAdapter::with_args(helper_path, Vec::new())
    }

    pub fn with_args(helper_path: PathBuf, helper_args: Vec<OsString>) -> Self {
        BridgeAdapter {
            helper_path,
            helper_args,
            monitor: None,
            ready: false,
            connected: false,
            led_state: LedState::Unknown,
            led_command: None,
        }
    }

    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn reset_device_state(&mut self) {
        self.ready = false;
        self.connected = false;
        self.led_state = LedState::Unknown;
        self.led_command = None;
    }
}

fn forward_events_task(
    cancel: CancellationToken,
    mut bridge_events: UnboundedReceiver<BridgeEvent>,
    mut events: AdapterEventSender,
) -> JoinHandle<()> {
    spawn(async move {
        let mut ready = false;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                bridge_event = bridge_events.next() => {
                    let Some(bridge_event) = bridge_event else {
                        break 'mainloop;
                    };

                    let (event, last) = match bridge_event {
                        BridgeEvent::Message(message) => {
                            let event = AdapterEvent::from(message);
                            if event == AdapterEvent::Ready {
                                ready = true;
                            }
                            (event, false)
                        },
                        BridgeEvent::ProtocolError(err) => (AdapterEvent::ProtocolError(err), false),
                        BridgeEvent::Diagnostic(line) => {
                            warn!("helper: {}", line);
                            continue 'mainloop;
                        },
                        BridgeEvent::ProcessExited { status } if !ready => (AdapterEvent::InitFailed { status }, true),
                        BridgeEvent::ProcessExited { status } => (AdapterEvent::ProcessExited { status }, true),
                    };

                    // the session may be blocked on us, so stay responsive to cancellation
                    let delivered = tokio::select! {
                        _ = cancel.cancelled() => break 'mainloop,
                        delivered = events.send(event) => delivered,
                    };

                    if !delivered || last {
                        break 'mainloop;
                    }
                },
            }
        }

        debug!("Stopped forwarding helper events (epoch {})", events.epoch());
    })
}

#[async_trait]
impl PlatformAdapter for BridgeAdapter {
    async fn start_monitoring(&mut self, events: AdapterEventSender) -> Result<(), SessionError> {
        if self.monitor.is_some() {
            debug!("Helper already running, not starting another one");
            return Ok(());
        }

        let (bridge, bridge_events) = BridgeProcess::spawn_with_args(&self.helper_path, &self.helper_args)?;
        let cancel = CancellationToken::new();
        let forward_handle = forward_events_task(cancel.clone(), bridge_events, events);

        self.reset_device_state();
        self.monitor = Some(Monitor { bridge, cancel, forward_handle });
        Ok(())
    }

    async fn stop_monitoring(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.cancel.cancel();
            monitor.bridge.stop().await;

            if let Err(err) = monitor.forward_handle.await {
                warn!("Helper event forwarding task failed: {:?}", err);
            }
        }

        self.reset_device_state();
    }

    async fn send_led_command(&mut self, state: LedSwitch) -> Result<(), SessionError> {
        let monitor = self.monitor.as_mut().ok_or(SessionError::AdapterNotAvailable)?;

        monitor.bridge.send_line(encode_command(HostCommand::Led(state))).await?;
        self.led_state = state.into();
        self.led_command = Some(state);
        Ok(())
    }

    fn observe(&mut self, event: &AdapterEvent) {
        match event {
            AdapterEvent::Ready => {
                info!("Helper {} is ready", self.helper_path.to_string_lossy());
                self.ready = true;
            },
            AdapterEvent::DeviceConnected => self.connected = true,
            AdapterEvent::DeviceDisconnected => {
                self.connected = false;
                self.led_state = LedState::Unknown;
                self.led_command = None;
            },
            AdapterEvent::LedAck { state, .. } => {
                if self.led_command.map_or(true, |command| command == *state) {
                    self.led_state = (*state).into();
                }
            },
            AdapterEvent::InitFailed { .. } | AdapterEvent::ProcessExited { .. } => self.reset_device_state(),
            AdapterEvent::Motion { .. } | AdapterEvent::Button { .. } | AdapterEvent::ProtocolError(_) => {},
        }
    }

    fn led_state(&self) -> LedState {
        self.led_state
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_monitoring(&self) -> bool {
        self.monitor.is_some()
    }

    fn describe(&self) -> PlatformInfo {
        PlatformInfo {
            platform: std::env::consts::OS.to_string(),
            method: "helper_bridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::channel::mpsc::UnboundedReceiver;
    use crate::config::types::SessionConfig;
    use crate::protocol::types::ButtonAction;
    use crate::session::types::{ConnectionState, MotionSample, SessionEvent};
    use crate::session::SpaceMouse;

    const FAKE_HELPER: &str = r#"
echo STATUS:ready
echo STATUS:device_connected
echo garbage
echo MOTION:x=-350
echo BUTTON:id=1,state=pressed
while read cmd; do
    if [ "$cmd" = "LED:on" ]; then echo LED:state=on,method=1; fi
    if [ "$cmd" = "LED:off" ]; then exit 0; fi
done
"#;

    fn fake_helper(script: &str) -> Box<BridgeAdapter> {
        let args = vec![OsString::from("-c"), OsString::from(script)];
        Box::new(BridgeAdapter::with_args(PathBuf::from("/bin/sh"), args))
    }

    async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
        events.next().await.expect("session closed")
    }

    #[tokio::test]
    async fn drives_a_session_through_a_real_helper() {
        let config = SessionConfig { auto_reconnect: false, ..SessionConfig::default() };
        let mouse = SpaceMouse::with_adapter(fake_helper(FAKE_HELPER), &config);
        let mut events = mouse.subscribe_channel().await.unwrap();

        mouse.start_monitoring().await.unwrap();

        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected { .. }));
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Motion(MotionSample { x: -1.0, ..MotionSample::default() }),
        );
        assert_eq!(next_event(&mut events).await, SessionEvent::Button { id: 1, action: ButtonAction::Pressed });
        assert_eq!(mouse.protocol_error_count().await.unwrap(), 1);

        mouse.set_led(LedSwitch::On).await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::LedChanged { from: LedState::Unknown, to: LedState::On, .. },
        ));

        mouse.stop_monitoring().await.unwrap();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Disconnected { .. }));
        assert_eq!(mouse.connection_state().await.unwrap(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn helper_exit_disconnects_the_session() {
        let config = SessionConfig { auto_reconnect: false, ..SessionConfig::default() };
        let mouse = SpaceMouse::with_adapter(fake_helper(FAKE_HELPER), &config);
        let mut events = mouse.subscribe_channel().await.unwrap();

        mouse.start_monitoring().await.unwrap();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected { .. }));

        // the fake helper exits when asked to switch the LED off
        mouse.set_led(LedSwitch::Off).await.unwrap();

        loop {
            if let SessionEvent::Disconnected { .. } = next_event(&mut events).await {
                break;
            }
        }
        assert_eq!(mouse.connection_state().await.unwrap(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn helper_dying_before_ready_is_an_error() {
        let mouse = SpaceMouse::with_adapter(
            fake_helper("echo 'ERROR: Failed to create HID manager' >&2; exit 1"),
            &SessionConfig::default(),
        );

        mouse.start_monitoring().await.unwrap();

        let mut state = mouse.connection_state().await.unwrap();
        while state == ConnectionState::Connecting {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            state = mouse.connection_state().await.unwrap();
        }
        assert_eq!(state, ConnectionState::Error);
    }

    #[tokio::test]
    async fn missing_helper_fails_to_start() {
        let adapter = Box::new(BridgeAdapter::new(PathBuf::from("/nonexistent/spacemouse-hid-reader")));
        let mouse = SpaceMouse::with_adapter(adapter, &SessionConfig::default());

        let result = mouse.start_monitoring().await;
        assert!(matches!(result, Err(SessionError::SpawnFailed { .. })));
        assert_eq!(mouse.connection_state().await.unwrap(), ConnectionState::Error);
    }

    #[test]
    fn stale_acknowledgements_keep_the_commanded_state() {
        let mut adapter = BridgeAdapter::new(PathBuf::from("/bin/sh"));
        adapter.observe(&AdapterEvent::LedAck { state: LedSwitch::On, method: 1 });
        assert_eq!(adapter.led_state(), LedState::On);

        adapter.led_command = Some(LedSwitch::Off);
        adapter.led_state = LedState::Off;
        adapter.observe(&AdapterEvent::LedAck { state: LedSwitch::On, method: 1 });
        assert_eq!(adapter.led_state(), LedState::Off);
    }

    #[tokio::test]
    async fn led_without_monitor_is_not_available() {
        let mut adapter = BridgeAdapter::new(PathBuf::from("/bin/sh"));
        let result = adapter.send_led_command(LedSwitch::On).await;
        assert!(matches!(result, Err(SessionError::AdapterNotAvailable)));
    }
}
