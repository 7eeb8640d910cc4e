//! The background task driving one logical connection: dial, STOMP handshake,
//! subscribe, pump frames, reconnect on transport loss.

use std::sync::Arc;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::stream::SplitSink;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use wsprobe_shared::{Command, Frame, HDR_MESSAGE, HEARTBEAT};

use crate::router::SubscriptionRouter;
use crate::status::{StatusKind, StatusReporter};

use super::{ConnectSettings, ConnectionState};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

enum SessionEnd {
    /// Operator called `disconnect()`; leave the loop for good.
    Shutdown,
    /// Transport died; report and retry after the fixed delay.
    Lost(String),
}

pub(super) struct ConnectionTask {
    pub url: String,
    pub settings: ConnectSettings,
    pub state: watch::Sender<ConnectionState>,
    pub shutdown: watch::Receiver<bool>,
    pub outbound: UnboundedReceiver<Frame>,
    pub router: Arc<SubscriptionRouter>,
    pub reporter: Arc<dyn StatusReporter>,
}

impl ConnectionTask {
    /// Connect/reconnect loop. Runs until shutdown is signalled; retries are
    /// unbounded with a constant delay.
    pub async fn run(self) {
        let ConnectionTask {
            url,
            settings,
            state,
            mut shutdown,
            mut outbound,
            router,
            reporter,
        } = self;

        loop {
            if *shutdown.borrow() {
                break;
            }
            set_state(&state, &reporter, ConnectionState::Connecting);

            let connected = tokio::select! {
                res = connect_async(&url) => res,
                _ = shutdown.wait_for(|s| *s) => break,
            };

            let end = match connected {
                Ok((stream, _response)) => {
                    drive_session(
                        stream,
                        &url,
                        &settings,
                        &state,
                        &mut shutdown,
                        &mut outbound,
                        &router,
                        &reporter,
                    )
                    .await
                }
                Err(e) => SessionEnd::Lost(format!("websocket connect failed: {e}")),
            };

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => {
                    // A disconnect racing the transport loss wins: the watch
                    // sender serializes the check with the manager's own
                    // transition, so a declined update means the state is
                    // already Disconnected and nothing should be reported.
                    if !mark_errored(&state, &reporter) {
                        break;
                    }
                    tracing::error!("{reason}");
                    reporter.on_status(&reason, StatusKind::Error);
                    reporter.on_status(
                        &format!("reconnecting in {} ms", settings.reconnect_delay.as_millis()),
                        StatusKind::Info,
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(settings.reconnect_delay) => {}
                        _ = shutdown.wait_for(|s| *s) => break,
                    }
                }
            }
        }
        // The manager owns the Disconnected transition; every exit path runs
        // through its `disconnect` (or its drop), so nothing to set here.
    }
}

/// One websocket session from handshake to close. Returns why it ended.
#[allow(clippy::too_many_arguments)]
async fn drive_session(
    stream: WsStream,
    url: &str,
    settings: &ConnectSettings,
    state: &watch::Sender<ConnectionState>,
    shutdown: &mut watch::Receiver<bool>,
    outbound: &mut UnboundedReceiver<Frame>,
    router: &SubscriptionRouter,
    reporter: &Arc<dyn StatusReporter>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    let connect = Frame::connect(settings.heartbeat.as_millis() as u32);
    if let Err(e) = write.send(Message::text(connect.encode())).await {
        return SessionEnd::Lost(format!("failed to send CONNECT: {e}"));
    }

    // Handshake: wait for CONNECTED before subscribing.
    loop {
        let msg = tokio::select! {
            msg = read.next() => msg,
            _ = shutdown.wait_for(|s| *s) => return SessionEnd::Shutdown,
        };
        match msg {
            Some(Ok(Message::Text(text))) => match decode(text.as_str()) {
                Some(frame) if frame.command == Command::Connected => break,
                Some(frame) if frame.command == Command::Error => {
                    report_error_frame(reporter, &frame)
                }
                _ => {}
            },
            Some(Ok(Message::Close(_))) | None => {
                return SessionEnd::Lost("connection closed during handshake".into())
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return SessionEnd::Lost(format!("websocket error: {e}")),
        }
    }

    set_state(state, reporter, ConnectionState::Connected);
    reporter.on_status("connected", StatusKind::Ok);
    tracing::info!("websocket connected to {url}");

    // Subscriptions are re-established on every successful (re)connect.
    for frame in router.subscribe_frames() {
        if let Err(e) = write.send(Message::text(frame.encode())).await {
            return SessionEnd::Lost(format!("failed to subscribe: {e}"));
        }
    }

    let mut heartbeat = tokio::time::interval(settings.heartbeat);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    heartbeat.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = shutdown.wait_for(|s| *s).map(|_| ()) => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            frame = outbound.next() => {
                let Some(frame) = frame else {
                    // Handle dropped without an explicit disconnect.
                    return SessionEnd::Shutdown;
                };
                if let Err(e) = send_frame(&mut write, &frame).await {
                    return SessionEnd::Lost(format!("send failed: {e}"));
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = write.send(Message::text(HEARTBEAT)).await {
                    return SessionEnd::Lost(format!("heartbeat failed: {e}"));
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(frame) = decode(text.as_str()) {
                        match frame.command {
                            Command::Message => router.route(&frame),
                            Command::Error => report_error_frame(reporter, &frame),
                            _ => {}
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Lost("connection closed by remote".into());
                }
                // Ping replies are handled by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Lost(format!("websocket error: {e}")),
            },
        }
    }
}

async fn send_frame(
    write: &mut WsSink,
    frame: &Frame,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    tracing::debug!("sending {} frame", frame.command.as_str());
    write.send(Message::text(frame.encode())).await
}

/// Decode an inbound payload; undecodable frames are reported and skipped,
/// heartbeats are dropped silently.
fn decode(raw: &str) -> Option<Frame> {
    match Frame::decode(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("skipping undecodable frame: {e}");
            None
        }
    }
}

/// A well-formed ERROR frame from the broker: surfaced to the operator but no
/// state transition of its own.
fn report_error_frame(reporter: &Arc<dyn StatusReporter>, frame: &Frame) {
    let message = frame.get(HDR_MESSAGE).unwrap_or("unspecified");
    let text = if frame.body.is_empty() {
        format!("broker error: {message}")
    } else {
        format!("broker error: {message} ({})", frame.body.trim_end())
    };
    tracing::error!("{text}");
    reporter.on_status(&text, StatusKind::Error);
}

pub(super) fn set_state(
    state: &watch::Sender<ConnectionState>,
    reporter: &Arc<dyn StatusReporter>,
    new: ConnectionState,
) {
    let old = state.send_replace(new);
    if old.is_connected() != new.is_connected() {
        reporter.on_connected_change(new.is_connected());
    }
}

/// Move to `Errored` unless a disconnect already moved the state to
/// `Disconnected`. Returns whether the transition happened.
pub(super) fn mark_errored(
    state: &watch::Sender<ConnectionState>,
    reporter: &Arc<dyn StatusReporter>,
) -> bool {
    let mut was_connected = false;
    let errored = state.send_if_modified(|s| {
        if *s == ConnectionState::Disconnected {
            return false;
        }
        was_connected = s.is_connected();
        *s = ConnectionState::Errored;
        true
    });
    if errored && was_connected {
        reporter.on_connected_change(false);
    }
    errored
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        connected_changes: Mutex<Vec<bool>>,
    }

    impl StatusReporter for Recording {
        fn on_status(&self, _text: &str, _kind: StatusKind) {}
        fn on_message(&self, _text: &str) {}
        fn on_connected_change(&self, connected: bool) {
            self.connected_changes.lock().unwrap().push(connected);
        }
    }

    #[test]
    fn mark_errored_declines_after_a_disconnect_won() {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let rec = Arc::new(Recording::default());
        let reporter: Arc<dyn StatusReporter> = rec.clone();

        assert!(!mark_errored(&state, &reporter));
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
        assert!(rec.connected_changes.lock().unwrap().is_empty());
    }

    #[test]
    fn mark_errored_from_connected_notifies_and_transitions() {
        let (state, _) = watch::channel(ConnectionState::Connected);
        let rec = Arc::new(Recording::default());
        let reporter: Arc<dyn StatusReporter> = rec.clone();

        assert!(mark_errored(&state, &reporter));
        assert_eq!(*state.borrow(), ConnectionState::Errored);
        assert_eq!(rec.connected_changes.lock().unwrap().as_slice(), [false]);
    }

    #[test]
    fn mark_errored_from_connecting_skips_the_connected_notification() {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let rec = Arc::new(Recording::default());
        let reporter: Arc<dyn StatusReporter> = rec.clone();

        assert!(mark_errored(&state, &reporter));
        assert_eq!(*state.borrow(), ConnectionState::Errored);
        assert!(rec.connected_changes.lock().unwrap().is_empty());
    }
}
