//! WebSocket client transport towards the CSMS.
//!
//! Connects with the `ocpp1.6` sub-protocol, splits the socket into a
//! writer task fed by an unbounded channel and a reader task that routes
//! frames: CALLRESULT/CALLERROR to the pending-call registry, CALLs to the
//! station's command loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::support::errors::{RequestError, SimulatorError};
use crate::support::ocpp_frame::OcppFrame;

use super::pending::PendingCalls;
use super::OcppTransport;

/// OCPP 1.6 WebSocket subprotocol.
const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

/// An inbound CALL awaiting a response.
#[derive(Debug)]
pub struct InboundCall {
    pub unique_id: String,
    pub action: String,
    pub payload: Value,
}

pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
    pending: Arc<PendingCalls>,
    request_timeout: Duration,
}

impl WsTransport {
    /// Connect to `<supervision_url>/<station_id>` and spawn the socket
    /// tasks. Returns the transport plus the stream of inbound CALLs; the
    /// stream ends when the connection closes.
    pub async fn connect(
        supervision_url: &str,
        station_id: &str,
        request_timeout: Duration,
    ) -> Result<(Self, mpsc::Receiver<InboundCall>), SimulatorError> {
        let url = format!("{}/{}", supervision_url.trim_end_matches('/'), station_id);
        let mut request = url
            .clone()
            .into_client_request()
            .map_err(|e| SimulatorError::Transport(format!("invalid URL {url}: {e}")))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            OCPP_SUBPROTOCOL.parse().expect("static header value"),
        );

        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| SimulatorError::Transport(format!("connect to {url} failed: {e}")))?;

        let negotiated = response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if negotiated != OCPP_SUBPROTOCOL {
            warn!(station_id, negotiated, "Server did not confirm the ocpp1.6 subprotocol");
        }
        info!(station_id, url = url.as_str(), "Connected to central system");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundCall>(64);
        let pending = Arc::new(PendingCalls::new());

        // Writer task.
        let writer_station = station_id.to_string();
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                debug!(station_id = writer_station.as_str(), "-> {text}");
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    error!(station_id = writer_station.as_str(), error = %e, "Send failed");
                    break;
                }
            }
        });

        // Reader task.
        let reader_station = station_id.to_string();
        let reader_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(message) = ws_receiver.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        debug!(station_id = reader_station.as_str(), "<- {text}");
                        match OcppFrame::parse(&text) {
                            Ok(OcppFrame::Call { unique_id, action, payload }) => {
                                let call = InboundCall { unique_id, action, payload };
                                if inbound_tx.send(call).await.is_err() {
                                    break;
                                }
                            }
                            Ok(OcppFrame::CallResult { unique_id, payload }) => {
                                reader_pending.complete(&unique_id, Ok(payload));
                            }
                            Ok(OcppFrame::CallError {
                                unique_id,
                                error_code,
                                error_description,
                                ..
                            }) => {
                                reader_pending.complete(
                                    &unique_id,
                                    Err(RequestError::CallError {
                                        code: error_code,
                                        description: error_description,
                                    }),
                                );
                            }
                            Err(e) => {
                                warn!(
                                    station_id = reader_station.as_str(),
                                    error = %e,
                                    "Dropping malformed frame"
                                );
                            }
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!(station_id = reader_station.as_str(), ?frame, "Connection closed");
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(other) => {
                        warn!(station_id = reader_station.as_str(), "Ignoring non-text message: {other:?}");
                    }
                    Err(e) => {
                        error!(station_id = reader_station.as_str(), error = %e, "WebSocket error");
                        break;
                    }
                }
            }
            // Station shutdown / connection loss cancels every in-flight call.
            reader_pending.fail_all();
        });

        Ok((
            Self {
                outbound: outbound_tx,
                pending,
                request_timeout,
            },
            inbound_rx,
        ))
    }
}

#[async_trait::async_trait]
impl OcppTransport for WsTransport {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, RequestError> {
        let frame = OcppFrame::call(action, payload);
        let unique_id = frame.unique_id().to_string();
        let rx = self.pending.register(&unique_id);

        if self.outbound.send(frame.serialize()).is_err() {
            self.pending.forget(&unique_id);
            return Err(RequestError::NotConnected);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RequestError::ConnectionClosed),
            Err(_) => {
                self.pending.forget(&unique_id);
                Err(RequestError::Timeout)
            }
        }
    }

    async fn respond(&self, frame: OcppFrame) -> Result<(), RequestError> {
        self.outbound
            .send(frame.serialize())
            .map_err(|e| RequestError::SendFailed(e.to_string()))
    }
}
