// SPDX-License-Identifier: GPL-3.0-only

//! The visualizer's websocket transport: a dedicated I/O thread
//! running a single-threaded Tokio runtime. Sessions live in a list
//! on the server; a write that fails drops that session.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc as tokio_mpsc;
use tokio::sync::Mutex as TokioMutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::errors::{PipelineError, PipelineResult};
use crate::sink::wire::ControlMessage;

/// The current camera/image pair being streamed, settable by an
/// inbound [`ControlMessage`] or defaulted by the stage on first
/// frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSelection {
    pub camera: String,
    pub image: String,
}

type Session = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    Message,
>;

/// Owns the listening socket and every connected client session.
/// Outbound frames are pushed in from the pipeline's worker thread
/// over an unbounded channel and written out by the I/O thread;
/// inbound control messages update `selection` directly.
pub struct WebSocketServer {
    outbound_tx: tokio_mpsc::UnboundedSender<Vec<u8>>,
    selection: Arc<Mutex<Option<StreamSelection>>>,
    _io_thread: JoinHandle<()>,
}

impl WebSocketServer {
    /// Bind a TCP listener on `port` and start the dedicated I/O
    /// thread. Blocks until the listener is bound (or has failed to
    /// bind), so a bad port is reported synchronously as
    /// [`PipelineError::Sink`].
    pub fn bind(port: u16) -> PipelineResult<Self> {
        let (outbound_tx, outbound_rx) = tokio_mpsc::unbounded_channel::<Vec<u8>>();
        let selection = Arc::new(Mutex::new(None));
        let selection_for_io = Arc::clone(&selection);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

        let io_thread = std::thread::Builder::new()
            .name("visualizer-io".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                runtime.block_on(run_io(port, outbound_rx, selection_for_io, ready_tx));
            })
            .map_err(|e| PipelineError::Sink(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { outbound_tx, selection, _io_thread: io_thread }),
            Ok(Err(msg)) => Err(PipelineError::Sink(msg)),
            Err(_) => Err(PipelineError::Sink("visualizer I/O thread exited before binding".into())),
        }
    }

    /// Queue a frame to be written to every connected session.
    pub fn broadcast(&self, bytes: Vec<u8>) {
        let _ = self.outbound_tx.send(bytes);
    }

    /// The current selection, if a client has set one.
    pub fn selection(&self) -> Option<StreamSelection> {
        self.selection.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Set the default selection if none has been chosen yet.
    pub fn set_default_selection(&self, selection: StreamSelection) {
        let mut guard = self.selection.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            *guard = Some(selection);
        }
    }
}

async fn run_io(
    port: u16,
    mut outbound_rx: tokio_mpsc::UnboundedReceiver<Vec<u8>>,
    selection: Arc<Mutex<Option<StreamSelection>>>,
    ready_tx: std::sync::mpsc::Sender<Result<(), String>>,
) {
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    let sessions: Arc<TokioMutex<Vec<Session>>> = Arc::new(TokioMutex::new(Vec::new()));

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, addr)) = accepted else { continue };
                let sessions = Arc::clone(&sessions);
                let selection = Arc::clone(&selection);
                tokio::spawn(async move {
                    match tokio_tungstenite::accept_async(stream).await {
                        Ok(ws) => {
                            debug!(%addr, "visualizer client connected");
                            let (write, mut read) = ws.split();
                            sessions.lock().await.push(write);
                            while let Some(Ok(msg)) = read.next().await {
                                // Accept both binary and text frames as JSON-encoded
                                // control messages since clients may send either.
                                let payload = match &msg {
                                    Message::Binary(bytes) => Some(bytes.as_ref()),
                                    Message::Text(text) => Some(text.as_bytes()),
                                    _ => None,
                                };
                                let Some(payload) = payload else { continue };
                                match serde_json::from_slice::<ControlMessage>(payload) {
                                    Ok(control) => {
                                        *selection.lock().unwrap_or_else(|p| p.into_inner()) =
                                            Some(StreamSelection { camera: control.camera, image: control.image });
                                    }
                                    Err(e) => warn!(%addr, error = %e, "malformed visualizer control message"),
                                }
                            }
                            debug!(%addr, "visualizer client disconnected");
                        }
                        Err(e) => warn!(%addr, error = %e, "visualizer handshake failed"),
                    }
                });
            }
            Some(bytes) = outbound_rx.recv() => {
                let mut sessions = sessions.lock().await;
                let mut live = Vec::with_capacity(sessions.len());
                for mut session in sessions.drain(..) {
                    if session.send(Message::Binary(bytes.clone().into())).await.is_ok() {
                        live.push(session);
                    }
                }
                *sessions = live;
            }
            else => break,
        }
    }
}
