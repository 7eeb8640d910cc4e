//! Connection lifecycle owner.
//!
//! Exactly one connection handle exists at a time; `connect` while a handle is
//! live is a guarded no-op, `disconnect` is the only cancellation primitive.

use std::sync::{Arc, Mutex};

use futures_channel::mpsc::{unbounded, UnboundedSender};
use tokio::sync::watch;

use wsprobe_shared::{Frame, ProbeError};

use crate::config::ConfigRecord;
use crate::router::SubscriptionRouter;
use crate::status::{StatusKind, StatusReporter};

use super::connection::{set_state, ConnectionTask};
use super::{ConnectSettings, ConnectionState};

/// Destination for the privileged start signal.
pub const START_DESTINATION: &str = "/app/start";

/// Build the connection URL: base endpoint plus percent-encoded `Session-ID`
/// and `Username` query parameters.
pub fn build_ws_url(ws_base_url: &str, session_id: &str, username: &str) -> String {
    let sep = if ws_base_url.contains('?') { '&' } else { '?' };
    format!(
        "{ws_base_url}{sep}Session-ID={}&Username={}",
        urlencoding::encode(session_id),
        urlencoding::encode(username),
    )
}

fn validate_connect(record: &ConfigRecord) -> Result<(), ProbeError> {
    if record.ws_base_url.trim().is_empty() {
        return Err(ProbeError::validation("wsBaseUrl"));
    }
    if record.username.trim().is_empty() {
        return Err(ProbeError::validation("username"));
    }
    if record.session_id.trim().is_empty() {
        return Err(ProbeError::validation("sessionId"));
    }
    Ok(())
}

/// The one live (or attempted) connection.
struct ConnectionHandle {
    outbound: UnboundedSender<Frame>,
    shutdown: watch::Sender<bool>,
}

/// Owns the connection state machine and its single [`ConnectionHandle`].
pub struct ConnectionManager {
    reporter: Arc<dyn StatusReporter>,
    router: Arc<SubscriptionRouter>,
    settings: ConnectSettings,
    state: watch::Sender<ConnectionState>,
    handle: Mutex<Option<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new(reporter: Arc<dyn StatusReporter>) -> Self {
        Self::with_settings(reporter, ConnectSettings::default())
    }

    pub fn with_settings(reporter: Arc<dyn StatusReporter>, settings: ConnectSettings) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            router: Arc::new(SubscriptionRouter::new(reporter.clone())),
            reporter,
            settings,
            state,
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch channel for state transitions (tests and UIs block on this).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Open a connection using the record's endpoint and identity. Only legal
    /// from `Disconnected`; anything else is a logged no-op.
    pub fn connect(&self, record: &ConfigRecord) -> Result<(), ProbeError> {
        let mut handle = self.handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // The live handle is the singleton guard; its presence means we are
        // Connecting, Connected, or Errored-and-retrying.
        if handle.is_some() {
            tracing::info!("connect ignored: already {:?}", self.state());
            return Ok(());
        }

        if let Err(e) = validate_connect(record) {
            self.reporter.on_status(&e.to_string(), StatusKind::Error);
            return Err(e);
        }

        let url = build_ws_url(&record.ws_base_url, &record.session_id, &record.username);
        self.reporter
            .on_status(&format!("connecting to {url}"), StatusKind::Info);

        let (outbound_tx, outbound_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        set_state(&self.state, &self.reporter, ConnectionState::Connecting);
        tokio::spawn(
            ConnectionTask {
                url,
                settings: self.settings.clone(),
                state: self.state.clone(),
                shutdown: shutdown_rx,
                outbound: outbound_rx,
                router: self.router.clone(),
                reporter: self.reporter.clone(),
            }
            .run(),
        );

        *handle = Some(ConnectionHandle {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Tear down the connection: cancels any pending reconnect, closes the
    /// transport, discards the handle. No-op when already disconnected.
    pub fn disconnect(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(conn) = handle.take() else {
            return;
        };
        let _ = conn.shutdown.send(true);
        set_state(&self.state, &self.reporter, ConnectionState::Disconnected);
        self.reporter.on_status("disconnected", StatusKind::Info);
    }

    /// Publish the privileged start signal. Fire-and-forget: success means the
    /// frame was handed to a live transport, not that the broker acted on it.
    pub fn send_start(
        &self,
        admin_username: &str,
        admin_password: &str,
    ) -> Result<(), ProbeError> {
        let handle = self.handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let conn = match handle.as_ref() {
            Some(conn) if self.state().is_connected() => conn,
            _ => return Err(ProbeError::NotConnected),
        };

        let body = serde_json::json!({
            "adminUsername": admin_username,
            "adminPassword": admin_password,
        });
        let frame = Frame::send_json(START_DESTINATION, body.to_string());
        conn.outbound
            .unbounded_send(frame)
            .map_err(|e| ProbeError::transport(e.to_string()))?;

        self.reporter
            .on_message(&format!("Sent start signal to {START_DESTINATION}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_keeps_plain_values_readable() {
        let url = build_ws_url("ws://localhost:8080/exchange-socket", "ABC123", "team49");
        assert_eq!(
            url,
            "ws://localhost:8080/exchange-socket?Session-ID=ABC123&Username=team49"
        );
    }

    #[test]
    fn url_percent_encodes_reserved_characters() {
        let url = build_ws_url("ws://h/sock", "a&b=c d", "x&y");
        assert_eq!(url, "ws://h/sock?Session-ID=a%26b%3Dc%20d&Username=x%26y");
    }

    #[test]
    fn url_query_parameters_round_trip() {
        let session = "to&ken= 1";
        let user = "user name&x";
        let url = build_ws_url("ws://h/sock", session, user);
        let query = url.split_once('?').unwrap().1;
        let decoded: Vec<(String, String)> = query
            .split('&')
            .map(|kv| {
                let (k, v) = kv.split_once('=').unwrap();
                (
                    k.to_string(),
                    urlencoding::decode(v).unwrap().into_owned(),
                )
            })
            .collect();
        assert_eq!(
            decoded,
            vec![
                ("Session-ID".to_string(), session.to_string()),
                ("Username".to_string(), user.to_string()),
            ]
        );
    }

    #[test]
    fn url_appends_to_an_existing_query() {
        let url = build_ws_url("ws://h/sock?v=2", "s", "u");
        assert_eq!(url, "ws://h/sock?v=2&Session-ID=s&Username=u");
    }

    #[test]
    fn a_poisoned_handle_lock_is_recovered_not_fatal() {
        struct NullReporter;

        impl StatusReporter for NullReporter {
            fn on_status(&self, _text: &str, _kind: StatusKind) {}
            fn on_message(&self, _text: &str) {}
            fn on_connected_change(&self, _connected: bool) {}
        }

        let manager = Arc::new(ConnectionManager::new(Arc::new(NullReporter)));
        let poisoner = manager.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.handle.lock().unwrap();
            panic!("poison the handle lock");
        })
        .join();

        // Every lock site keeps working after the poisoning panic.
        assert_eq!(
            manager.send_start("a", "b").unwrap_err(),
            ProbeError::NotConnected
        );
        manager.disconnect();
        // Validation still runs (and fails on the empty sessionId).
        assert_eq!(
            manager.connect(&ConfigRecord::default()).unwrap_err(),
            ProbeError::validation("sessionId")
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn validation_names_the_missing_field() {
        let mut record = ConfigRecord::default();
        record.session_id = "S".into();
        record.ws_base_url = String::new();
        assert_eq!(
            validate_connect(&record).unwrap_err(),
            ProbeError::validation("wsBaseUrl")
        );

        let mut record = ConfigRecord::default();
        record.session_id = "S".into();
        record.username = "  ".into();
        assert_eq!(
            validate_connect(&record).unwrap_err(),
            ProbeError::validation("username")
        );

        let record = ConfigRecord::default(); // session_id defaults to empty
        assert_eq!(
            validate_connect(&record).unwrap_err(),
            ProbeError::validation("sessionId")
        );
    }
}
