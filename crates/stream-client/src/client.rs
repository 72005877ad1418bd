//! WebSocket connection management with automatic reconnect

use crate::frame::MeasurementFrame;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fixed delay between reconnection attempts. No backoff growth, no retry
/// ceiling; reconnection repeats until teardown.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Connection lifecycle state, published for display collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Stream client configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Detector WebSocket endpoint (e.g. "ws://localhost:8000/ws")
    pub endpoint: String,
    /// Delay before each reconnection attempt
    pub reconnect_delay: Duration,
}

impl StreamConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Handle to the detector stream.
///
/// Frames arrive on the receiver returned by [`StreamClient::connect`], a
/// lazy, non-restartable sequence: once the channel closes it never
/// restarts. Dropping the handle without calling [`teardown`] also stops
/// the connection task.
///
/// [`teardown`]: StreamClient::teardown
pub struct StreamClient {
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Open the connection and start the receive/reconnect loop.
    ///
    /// Returns the handle and the frame sequence for the single consumer.
    pub fn connect(config: StreamConfig) -> (Self, mpsc::UnboundedReceiver<MeasurementFrame>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_connection(config, frame_tx, state_tx, shutdown_rx));

        (
            Self {
                state_rx,
                shutdown_tx,
                task: Some(task),
            },
            frame_rx,
        )
    }

    /// Subscribe to connection-state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Cancel any pending reconnect, close the active connection, and stop
    /// the connection task. Idempotent.
    pub async fn teardown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
            info!("Stream client torn down");
        }
    }
}

/// Connect/read/reconnect loop. Runs until shutdown is signalled (or the
/// handle is dropped, which closes the shutdown channel).
async fn run_connection(
    config: StreamConfig,
    frame_tx: mpsc::UnboundedSender<MeasurementFrame>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let _ = state_tx.send(ConnectionState::Connecting);

        let connected = tokio::select! {
            res = connect_async(config.endpoint.as_str()) => res,
            _ = shutdown_rx.changed() => return,
        };

        match connected {
            Ok((ws, _response)) => {
                info!("Connected to detector at {}", config.endpoint);
                let _ = state_tx.send(ConnectionState::Open);

                if read_frames(ws, &frame_tx, &mut shutdown_rx).await {
                    let _ = state_tx.send(ConnectionState::Closed);
                    return;
                }
            }
            Err(e) => {
                warn!("Detector connection failed: {}", e);
            }
        }

        let _ = state_tx.send(ConnectionState::Closed);

        // Fixed-interval retry; the sleep is cancelled by teardown
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.changed() => return,
        }
    }
}

/// Read frames until the socket closes or shutdown is requested.
/// Returns true when shutdown ended the read.
async fn read_frames(
    mut ws: WsStream,
    frame_tx: &mpsc::UnboundedSender<MeasurementFrame>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        let message = tokio::select! {
            msg = ws.next() => msg,
            _ = shutdown_rx.changed() => {
                let _ = ws.close(None).await;
                return true;
            }
        };

        match message {
            Some(Ok(Message::Text(payload))) => match MeasurementFrame::decode(&payload) {
                Ok(frame) => {
                    if frame_tx.send(frame).is_err() {
                        debug!("Frame consumer dropped, closing stream");
                        let _ = ws.close(None).await;
                        return true;
                    }
                }
                // Malformed messages are dropped; the connection stays up
                Err(e) => warn!("Dropping malformed detector message: {}", e),
            },
            Some(Ok(Message::Close(_))) | None => {
                warn!("Detector connection closed");
                return false;
            }
            // Binary/ping/pong carry no frames
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Detector stream error: {}", e);
                return false;
            }
        }
    }
}
