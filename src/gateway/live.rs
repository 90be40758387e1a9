//! Real-time live session over the generation backend
//!
//! The live session is modeled as a bidirectional channel pair with an
//! explicit Connecting/Open/Closed lifecycle: frames the user sends are
//! posted upstream, frames from the backend arrive on a receive channel
//! parsed from a server-sent-event stream.

use crate::error::{PolymodeError, Result};
use crate::gateway::chat::extract_event_data;
use crate::gateway::{upstream_failure, GatewayContext};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Lifecycle state of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    /// Handshake in progress
    Connecting,
    /// Both directions are flowing
    Open,
    /// The session has ended (locally or remotely)
    Closed,
}

/// One frame of a live conversation, in either direction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveFrame {
    /// Base64-encoded audio content
    Audio {
        /// The payload
        data: String,
    },
    /// Text content (e.g. interim transcripts)
    Text {
        /// The payload
        text: String,
    },
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    session_id: String,
}

/// Handle for an open live session
///
/// Send frames with [`send`](Self::send), receive with
/// [`recv`](Self::recv). Dropping the handle ends the uplink; the state
/// moves to `Closed` when either side ends the session.
#[derive(Debug)]
pub struct LiveSession {
    outbound: Option<mpsc::Sender<LiveFrame>>,
    inbound: mpsc::Receiver<LiveFrame>,
    state: Arc<RwLock<LiveState>>,
}

impl LiveSession {
    /// Send a frame to the backend
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Upstream` if the session has been closed
    /// locally or the uplink has ended.
    pub async fn send(&self, frame: LiveFrame) -> Result<()> {
        let Some(outbound) = &self.outbound else {
            return Err(PolymodeError::Upstream("live session is closed".to_string()).into());
        };
        outbound
            .send(frame)
            .await
            .map_err(|_| PolymodeError::Upstream("live session uplink closed".to_string()).into())
    }

    /// Receive the next frame from the backend
    ///
    /// Returns `None` once the session is closed and drained.
    pub async fn recv(&mut self) -> Option<LiveFrame> {
        self.inbound.recv().await
    }

    /// Current lifecycle state
    pub fn state(&self) -> LiveState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(LiveState::Closed)
    }

    /// Close the session locally
    ///
    /// Ends the uplink, drains no further inbound frames, and moves the
    /// state to `Closed`.
    pub fn close(&mut self) {
        set_state(&self.state, LiveState::Closed);
        self.outbound = None;
        self.inbound.close();
    }
}

fn set_state(state: &Arc<RwLock<LiveState>>, value: LiveState) {
    if let Ok(mut guard) = state.write() {
        *guard = value;
    }
}

/// Open a live session
///
/// Performs the handshake, then spawns an uplink task (posting outbound
/// frames) and a downlink task (parsing the SSE event stream into inbound
/// frames). The returned handle starts in the `Open` state.
pub async fn connect_live(ctx: &GatewayContext) -> Result<LiveSession> {
    let credential = ctx.credential()?;
    let state = Arc::new(RwLock::new(LiveState::Connecting));

    let response = ctx
        .client()
        .post(ctx.endpoint("/v1/live/connect"))
        .bearer_auth(&credential)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Live handshake failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(upstream_failure(response).await.into());
    }

    let connect: ConnectResponse = response
        .json()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Invalid handshake response: {}", e)))?;
    let session_id = connect.session_id;

    let events = ctx
        .client()
        .get(ctx.endpoint(&format!("/v1/live/{}/events", session_id)))
        .bearer_auth(&credential)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Live event stream failed: {}", e)))?;

    if !events.status().is_success() {
        return Err(upstream_failure(events).await.into());
    }

    set_state(&state, LiveState::Open);
    tracing::info!("Live session {} open", session_id);

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<LiveFrame>(32);
    let (inbound_tx, inbound_rx) = mpsc::channel::<LiveFrame>(32);

    // Uplink: drain user frames and post them to the session endpoint.
    let uplink_client = ctx.client().clone();
    let uplink_url = ctx.endpoint(&format!("/v1/live/{}/frames", session_id));
    let uplink_credential = credential.clone();
    let uplink_state = Arc::clone(&state);
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let result = uplink_client
                .post(&uplink_url)
                .bearer_auth(&uplink_credential)
                .json(&frame)
                .send()
                .await;
            if let Err(e) = result {
                tracing::warn!("Live uplink failed: {}", e);
                set_state(&uplink_state, LiveState::Closed);
                return;
            }
        }
    });

    // Downlink: parse the SSE stream into frames until it ends.
    let downlink_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut buffer = String::new();
        let mut byte_stream = events.bytes_stream();
        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("Live downlink interrupted: {}", e);
                    break;
                }
            };
            match std::str::from_utf8(&bytes) {
                Ok(text) => buffer.push_str(text),
                Err(_) => continue,
            }
            while let Some(pos) = buffer.find("\n\n") {
                let event_block = buffer[..pos].to_string();
                buffer = buffer[pos + 2..].to_string();
                let Some(data) = extract_event_data(&event_block) else {
                    continue;
                };
                if data == "[DONE]" {
                    set_state(&downlink_state, LiveState::Closed);
                    return;
                }
                match serde_json::from_str::<LiveFrame>(&data) {
                    Ok(frame) => {
                        if inbound_tx.send(frame).await.is_err() {
                            set_state(&downlink_state, LiveState::Closed);
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Skipping malformed live frame: {}", e),
                }
            }
        }
        set_state(&downlink_state, LiveState::Closed);
    });

    Ok(LiveSession {
        outbound: Some(outbound_tx),
        inbound: inbound_rx,
        state,
    })
}
