use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, ProtocolError};
use crate::protocol::codec::decode_line;
use crate::protocol::types::HelperMessage;

/**
 * Everything the helper produces, in the order it produced it.
 * `ProcessExited` is always the last event of a bridge.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Message(HelperMessage),
    ProtocolError(ProtocolError),
    /// A line the helper wrote to stderr.
    Diagnostic(String),
    // `None` when the helper was terminated by a signal
    ProcessExited { status: Option<i32> },
}

/**
 * Owns exactly one helper subprocess. Its stdout is read by a background task which decodes
 * each line and forwards it to the receiver returned by `spawn`.
 */
pub struct BridgeProcess {
    path: PathBuf,
    pid: Option<u32>,
    stdin: ChildStdin,
    cancel: CancellationToken,
    reader_handle: Option<JoinHandle<()>>,
}

impl BridgeProcess {
    pub fn spawn(path: &Path) -> Result<(BridgeProcess, UnboundedReceiver<BridgeEvent>), BridgeError> {
        Self::spawn_with_args(path, std::iter::empty::<&OsStr>())
    }

    pub fn spawn_with_args<I, S>(path: &Path, args: I) -> Result<(BridgeProcess, UnboundedReceiver<BridgeEvent>), BridgeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::SpawnFailed { path: path.to_path_buf(), source })?;

        let pid = child.id();
        info!("Started helper {} (pid {:?})", path.to_string_lossy(), pid);

        let stdin = child.stdin.take().ok_or(BridgeError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(BridgeError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(BridgeError::MissingPipe("stderr"))?;

        let cancel = CancellationToken::new();
        let (sender, receiver) = unbounded::<BridgeEvent>();
        let reader_handle = read_output_task(cancel.clone(), child, stdout, stderr, sender);

        let bridge = BridgeProcess {
            path: path.to_path_buf(),
            pid,
            stdin,
            cancel,
            reader_handle: Some(reader_handle),
        };

        Ok((bridge, receiver))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub async fn send_line(&mut self, text: &str) -> Result<(), BridgeError> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await
            .map_err(|source| BridgeError::WriteFailed { source })?;
        self.stdin.flush().await
            .map_err(|source| BridgeError::WriteFailed { source })?;

        debug!("Sent {:?} to helper", text);
        Ok(())
    }

    /**
     * Terminates the helper (if it is still running) and waits for the reader task to finish.
     * Events that were not yet consumed stay in the receiver; no new ones are produced.
     */
    pub async fn stop(mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.reader_handle.take() {
            if let Err(err) = handle.await {
                warn!("Helper reader task failed: {:?}", err);
            }
        }

        info!("Stopped helper {}", self.path.to_string_lossy());
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn kill_child(child: &mut Child) {
    // an already exited child is not an error here
    if let Err(err) = child.kill().await {
        debug!("Killing helper failed: {:?}", err);
    }
}

fn trim_line_ending(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

fn decode_output_line(raw: &[u8]) -> BridgeEvent {
    let raw = trim_line_ending(raw);

    let result = match std::str::from_utf8(raw) {
        Ok(line) => decode_line(line),
        Err(_) => Err(ProtocolError { raw_line: String::from_utf8_lossy(raw).into_owned() }),
    };

    match result {
        Ok(message) => BridgeEvent::Message(message),
        Err(err) => {
            debug!("{}", err);
            BridgeEvent::ProtocolError(err)
        },
    }
}

fn diagnostic_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(trim_line_ending(raw)).into_owned()
}

enum Output {
    Stdout(io::Result<usize>),
    Stderr(io::Result<usize>),
}

fn read_output_task(
    cancel: CancellationToken,
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    sender: UnboundedSender<BridgeEvent>,
) -> JoinHandle<()> {
    spawn(async move {
        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        // partial reads stay in these buffers when another branch wins the select
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut stderr_open = true;

        'mainloop: loop {
            let output = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    kill_child(&mut child).await;
                    return;
                },
                read = stdout.read_until(b'\n', &mut stdout_buf) => Output::Stdout(read),
                read = stderr.read_until(b'\n', &mut stderr_buf), if stderr_open => Output::Stderr(read),
            };

            let event = match output {
                Output::Stdout(Ok(0)) => break 'mainloop,
                Output::Stdout(Ok(_)) => {
                    let event = decode_output_line(&stdout_buf);
                    stdout_buf.clear();
                    event
                },
                Output::Stdout(Err(err)) => {
                    warn!("Failed to read helper stdout, terminating helper: {:?}", err);
                    kill_child(&mut child).await;
                    break 'mainloop;
                },
                Output::Stderr(Ok(n)) if n > 0 => {
                    let line = diagnostic_line(&stderr_buf);
                    stderr_buf.clear();
                    BridgeEvent::Diagnostic(line)
                },
                Output::Stderr(_) => {
                    stderr_open = false;
                    continue 'mainloop;
                },
            };

            if sender.unbounded_send(event).is_err() {
                debug!("Bridge receiver dropped, terminating helper");
                kill_child(&mut child).await;
                return;
            }
        }

        // a helper that fails to start writes its reason to stderr right before exiting
        while stderr_open {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    kill_child(&mut child).await;
                    return;
                },
                read = stderr.read_until(b'\n', &mut stderr_buf) => read,
            };

            match read {
                Ok(n) if n > 0 => {
                    let _ = sender.unbounded_send(BridgeEvent::Diagnostic(diagnostic_line(&stderr_buf)));
                    stderr_buf.clear();
                },
                _ => stderr_open = false,
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                kill_child(&mut child).await;
                return;
            },
            status = child.wait() => status,
        };

        let status = match status {
            Ok(status) => {
                info!("Helper exited with {}", status);
                status.code()
            },
            Err(err) => {
                warn!("Failed to wait for helper: {:?}", err);
                None
            },
        };

        let _ = sender.unbounded_send(BridgeEvent::ProcessExited { status });
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use crate::protocol::types::{Axis, HelperStatus, LedSwitch};

    fn spawn_script(script: &str) -> (BridgeProcess, UnboundedReceiver<BridgeEvent>) {
        BridgeProcess::spawn_with_args(Path::new("/bin/sh"), ["-c", script])
            .expect("Failed to spawn /bin/sh")
    }

    async fn collect(mut events: UnboundedReceiver<BridgeEvent>) -> Vec<BridgeEvent> {
        let mut collected = Vec::new();
        while let Some(event) = events.next().await {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn garbage_does_not_stop_the_bridge() {
        let (_bridge, events) = spawn_script("echo garbage; echo MOTION:x=175; echo STATUS:ready");

        let events = collect(events).await;
        assert_eq!(events, vec![
            BridgeEvent::ProtocolError(ProtocolError { raw_line: "garbage".to_string() }),
            BridgeEvent::Message(HelperMessage::Motion { axis: Axis::X, raw: 175 }),
            BridgeEvent::Message(HelperMessage::Status(HelperStatus::Ready)),
            BridgeEvent::ProcessExited { status: Some(0) },
        ]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_protocol_error() {
        let (_bridge, events) = spawn_script(r"printf 'bad\377line\n'; echo MOTION:x=175; echo STATUS:ready");

        let events = collect(events).await;
        assert_eq!(events, vec![
            BridgeEvent::ProtocolError(ProtocolError { raw_line: "bad\u{FFFD}line".to_string() }),
            BridgeEvent::Message(HelperMessage::Motion { axis: Axis::X, raw: 175 }),
            BridgeEvent::Message(HelperMessage::Status(HelperStatus::Ready)),
            BridgeEvent::ProcessExited { status: Some(0) },
        ]);
    }

    #[tokio::test]
    async fn reports_exit_status_once() {
        let (_bridge, events) = spawn_script("exit 3");

        let events = collect(events).await;
        assert_eq!(events, vec![BridgeEvent::ProcessExited { status: Some(3) }]);
    }

    #[tokio::test]
    async fn stderr_is_forwarded_before_exit() {
        let (_bridge, events) = spawn_script("echo 'ERROR: Failed to open HID manager' >&2; exit 1");

        let events = collect(events).await;
        assert_eq!(events, vec![
            BridgeEvent::Diagnostic("ERROR: Failed to open HID manager".to_string()),
            BridgeEvent::ProcessExited { status: Some(1) },
        ]);
    }

    #[tokio::test]
    async fn writes_newline_terminated_commands() {
        let script = r#"read cmd; if [ "$cmd" = "LED:on" ]; then echo LED:state=on,method=1; fi"#;
        let (mut bridge, mut events) = spawn_script(script);

        bridge.send_line("LED:on").await.unwrap();

        assert_eq!(
            events.next().await,
            Some(BridgeEvent::Message(HelperMessage::LedAck { state: LedSwitch::On, method: 1 })),
        );
        assert_eq!(events.next().await, Some(BridgeEvent::ProcessExited { status: Some(0) }));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn write_after_exit_fails() {
        let (mut bridge, events) = spawn_script("exit 0");
        collect(events).await;

        let result = bridge.send_line("LED:off").await;
        assert!(matches!(result, Err(BridgeError::WriteFailed { .. })));
    }

    #[tokio::test]
    async fn stop_terminates_without_exit_event() {
        let (bridge, mut events) = spawn_script("echo STATUS:ready; exec sleep 30");

        assert_eq!(
            events.next().await,
            Some(BridgeEvent::Message(HelperMessage::Status(HelperStatus::Ready))),
        );

        bridge.stop().await;
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_failure() {
        let result = BridgeProcess::spawn(Path::new("/nonexistent/spacemouse-hid-reader"));
        assert!(matches!(result, Err(BridgeError::SpawnFailed { .. })));
    }
}
