// src/session.rs
//
// Transport session: one persistent bidirectional WebSocket connection to
// the detection stream. Outbound frames are fire-and-forget (dropped, not
// queued, while the session is anything but Open); inbound messages are
// parsed one at a time in receipt order and appended to the shared buffer.
//
// State machine:
//
//   Idle -> Connecting -> Open -> Closing -> Closed
//
// with Connecting -> Closed and Open -> Closed reachable on error.
// Re-entering Open requires a fresh open() on a new session — there is no
// automatic reconnect.

use crate::alerts::{self, AlertPolicy, AlertTally};
use crate::buffer::DetectionBuffer;
use crate::types::{DetectionMessage, DetectionResult};
use anyhow::{Context, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

pub struct TransportSession {
    state: Arc<Mutex<SessionState>>,
    sink: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
    buffer: Arc<Mutex<DetectionBuffer>>,
    policy: AlertPolicy,
    tally: AlertTally,
}

impl TransportSession {
    pub fn new(
        buffer: Arc<Mutex<DetectionBuffer>>,
        policy: AlertPolicy,
        tally: AlertTally,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
            sink: None,
            reader: None,
            buffer,
            policy,
            tally,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Establish the connection and start the inbound reader. A connect
    /// failure is reported to the caller and leaves the session Closed;
    /// retry policy belongs to the caller, not here.
    pub async fn open(&mut self, url: &str) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                SessionState::Idle | SessionState::Closed => *state = SessionState::Connecting,
                _ => anyhow::bail!("session already active"),
            }
        }

        info!("Connecting to detection stream at {}", url);

        let ws = match connect_async(url).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                *self.state.lock().unwrap() = SessionState::Closed;
                return Err(e).context("WebSocket connect failed");
            }
        };

        let (sink, mut stream) = ws.split();
        self.sink = Some(sink);
        *self.state.lock().unwrap() = SessionState::Open;
        info!("✓ Detection stream connected");

        let state = Arc::clone(&self.state);
        let buffer = Arc::clone(&self.buffer);
        let policy = self.policy.clone();
        let tally = self.tally.clone();

        self.reader = Some(tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        // A message that fails to parse is dropped here and
                        // touches neither buffer nor session state.
                        match serde_json::from_str::<DetectionMessage>(&text) {
                            Ok(message) => {
                                let result = DetectionResult::from_message(message);
                                alerts::process_result(&result, &policy, &tally);
                                buffer.lock().unwrap().append(result);
                            }
                            Err(e) => warn!("Dropping unparseable detection message: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Server closed the detection stream");
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary — handled by the protocol layer
                    Err(e) => {
                        warn!("Detection stream error: {}", e);
                        break;
                    }
                }
            }

            let mut state = state.lock().unwrap();
            if *state != SessionState::Closing {
                *state = SessionState::Closed;
            }
        }));

        Ok(())
    }

    /// Best-effort submission. A no-op unless the session is Open — a
    /// frame that cannot go out now is stale by the time it could, so it
    /// is dropped rather than queued. A send error closes the session.
    pub async fn send(&mut self, payload: String) {
        if self.state() != SessionState::Open {
            debug!("Session not open, dropping frame");
            return;
        }

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.send(Message::Text(payload)).await {
                warn!("Frame send failed, closing session: {}", e);
                *self.state.lock().unwrap() = SessionState::Closed;
            }
        }
    }

    /// Idempotent. Closing a closed or never-opened session has no effect;
    /// after close() returns no further handler invocations occur.
    pub async fn close(&mut self) {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                SessionState::Idle | SessionState::Closed => {}
                _ => *state = SessionState::Closing,
            }
        }

        if let Some(mut sink) = self.sink.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Closing {
            *state = SessionState::Closed;
            info!("Detection stream closed");
        }
    }
}
