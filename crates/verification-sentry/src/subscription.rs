//! WebSocket subscription for verification requests.

use std::{collections::VecDeque, time::Duration};

use attestor_types::{JsonRpcRequest, SubscriptionMessage};
use futures::{SinkExt, Stream, StreamExt, stream};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

const SUBSCRIBE_REQUEST_ID: u64 = 1;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An acknowledged subscription on an open socket.
pub struct VerificationSubscription {
    ws: WsStream,
    subscription_id: Value,
    /// Pushes that arrived before the subscribe reply.
    early: VecDeque<Value>,
}

impl std::fmt::Debug for VerificationSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationSubscription")
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

/// Outcome of reading one frame.
enum Frame {
    Message(SubscriptionMessage),
    Skip,
}

impl VerificationSubscription {
    /// Id the server assigned to this subscription.
    pub fn subscription_id(&self) -> &Value {
        &self.subscription_id
    }

    /// Reads frames until the next push payload.
    ///
    /// Replies and notifications without a result are skipped. Any transport
    /// failure, a close frame or the end of the stream is an
    /// [`Error::Transport`].
    pub async fn next_push(&mut self) -> Result<Value> {
        if let Some(push) = self.early.pop_front() {
            return Ok(push);
        }
        loop {
            if let Frame::Message(msg) = read_frame(&mut self.ws).await? {
                if let Some(push) = msg.into_push() {
                    return Ok(push);
                }
            }
        }
    }

    /// Turns the subscription into a stream of pushes. The stream yields the
    /// first transport error and then ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut subscription = state?;
            match subscription.next_push().await {
                Ok(push) => Some((Ok(push), Some(subscription))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

async fn read_frame(ws: &mut WsStream) -> Result<Frame> {
    let message = ws
        .next()
        .await
        .ok_or_else(|| Error::Transport("stream ended".into()))?
        .map_err(|e| Error::Transport(format!("read failed: {e}")))?;

    match message {
        Message::Text(_) | Message::Binary(_) => {
            let Ok(text) = message.to_text() else {
                debug!("Ignoring non UTF-8 frame");
                return Ok(Frame::Skip);
            };
            match serde_json::from_str(text) {
                Ok(msg) => Ok(Frame::Message(msg)),
                Err(e) => {
                    debug!(error = %e, raw = text, "Ignoring non JSON-RPC frame");
                    Ok(Frame::Skip)
                }
            }
        }
        Message::Ping(_) => {
            // tungstenite queues the pong itself; flush it out now.
            ws.flush()
                .await
                .map_err(|e| Error::Transport(format!("pong failed: {e}")))?;
            trace!("Answered ping");
            Ok(Frame::Skip)
        }
        Message::Close(frame) => Err(Error::Transport(format!("closed by server: {frame:?}"))),
        Message::Pong(_) | Message::Frame(_) => Ok(Frame::Skip),
    }
}

/// An open socket to the consensus extension, not yet subscribed.
pub struct VerificationSocket {
    ws: WsStream,
}

impl std::fmt::Debug for VerificationSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationSocket").finish_non_exhaustive()
    }
}

/// Opens a WebSocket to `url`. A handshake that does not finish within
/// `timeout` is an [`Error::Transport`].
pub async fn connect_verification_socket(
    url: &Url,
    timeout: Duration,
) -> Result<VerificationSocket> {
    let (ws, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| Error::Transport(format!("WebSocket handshake timed out after {timeout:?}")))?
        .map_err(|e| Error::Transport(format!("WebSocket connection failed: {e}")))?;
    Ok(VerificationSocket { ws })
}

impl VerificationSocket {
    /// Sends `method(pubkey_hex)` and waits up to `timeout` for the reply.
    ///
    /// An error reply is reported as [`Error::Rpc`], a missing one as
    /// [`Error::Transport`].
    pub async fn subscribe(
        mut self,
        method: &str,
        pubkey_hex: &str,
        timeout: Duration,
    ) -> Result<VerificationSubscription> {
        let request = JsonRpcRequest::new(SUBSCRIBE_REQUEST_ID, method, [pubkey_hex]);
        self.ws
            .send(Message::text(serde_json::to_string(&request)?))
            .await
            .map_err(|e| Error::Transport(format!("subscribe send failed: {e}")))?;
        debug!(method, "Sent subscribe request");

        let mut early = VecDeque::new();
        let reply = tokio::time::timeout(timeout, await_reply(&mut self.ws, &mut early))
            .await
            .map_err(|_| Error::Transport(format!("no subscribe reply within {timeout:?}")))??;

        if let Some(error) = reply.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(VerificationSubscription {
            ws: self.ws,
            subscription_id: reply.result.unwrap_or(Value::Null),
            early,
        })
    }
}

/// Reads until the subscribe reply, buffering pushes seen on the way.
async fn await_reply(
    ws: &mut WsStream,
    early: &mut VecDeque<Value>,
) -> Result<SubscriptionMessage> {
    loop {
        let Frame::Message(msg) = read_frame(ws).await? else {
            continue;
        };
        if msg.is_reply_to(SUBSCRIBE_REQUEST_ID) {
            return Ok(msg);
        }
        if let Some(push) = msg.into_push() {
            early.push_back(push);
        }
    }
}

/// Connects to `url` and subscribes with `method(pubkey_hex)`, applying
/// `timeout` to the handshake and to the reply.
pub async fn subscribe_verification_requests(
    url: &Url,
    method: &str,
    pubkey_hex: &str,
    timeout: Duration,
) -> Result<VerificationSubscription> {
    connect_verification_socket(url, timeout)
        .await?
        .subscribe(method, pubkey_hex, timeout)
        .await
}
