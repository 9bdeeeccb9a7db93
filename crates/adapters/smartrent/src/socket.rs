//! Websocket channel — device subscriptions, pushes and attribute writes.
//!
//! One task owns the connection. Handles talk to it over an unbounded
//! channel and wait for the server's reply on a oneshot. The task connects
//! on the first request, rejoins every subscribed device after a reconnect
//! and exits once every handle is dropped.
//!
//! While the socket is down, writes fail fast but joins are held: their
//! devices are joined with the others once the connection is back, and only
//! then does the caller get its answer. With no device left to join the task
//! stops reconnecting until the next request.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rentbridge_app::ports::PushHandler;
use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::device::DeviceUpdate;
use rentbridge_domain::id::RemoteDeviceId;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::client::AuthenticatedClient;
use crate::config::SmartRentConfig;
use crate::error::SmartRentError;
use crate::phoenix::{Frame, device_topic, event};
use crate::wire::AttributeRecord;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Sink = SplitSink<Socket, Message>;
type Reply = oneshot::Sender<Result<(), SmartRentError>>;

enum Request {
    Join {
        device: RemoteDeviceId,
        handler: PushHandler,
        reply: Reply,
    },
    Write {
        device: RemoteDeviceId,
        command: RemoteCommand,
        reply: Reply,
    },
}

impl Request {
    fn fail(self, err: SmartRentError) {
        let (Self::Join { reply, .. } | Self::Write { reply, .. }) = self;
        let _ = reply.send(Err(err));
    }
}

/// Handle to the websocket task.
#[derive(Clone)]
pub struct SocketHandle {
    requests: mpsc::UnboundedSender<Request>,
}

impl SocketHandle {
    /// Spawn the websocket task on the current runtime.
    pub fn spawn(client: Arc<AuthenticatedClient>, config: SmartRentConfig) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let task = SocketTask {
            client,
            config,
            channel: Channel::default(),
        };
        tokio::spawn(task.run(rx));
        Self { requests }
    }

    /// Join the channel of `device`; pushes for it go to `handler`.
    ///
    /// # Errors
    ///
    /// Returns the server's refusal, or [`SmartRentError::Disconnected`].
    pub async fn join(&self, device: RemoteDeviceId, handler: PushHandler) -> Result<(), SmartRentError> {
        self.request(|reply| Request::Join {
            device,
            handler,
            reply,
        })
        .await
    }

    /// Send `command` to `device` and wait for the server to accept it.
    ///
    /// # Errors
    ///
    /// Returns the server's refusal, or [`SmartRentError::Disconnected`].
    pub async fn write(&self, device: RemoteDeviceId, command: RemoteCommand) -> Result<(), SmartRentError> {
        self.request(|reply| Request::Write {
            device,
            command,
            reply,
        })
        .await
    }

    async fn request(&self, build: impl FnOnce(Reply) -> Request) -> Result<(), SmartRentError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(build(reply))
            .map_err(|_| SmartRentError::Disconnected)?;
        rx.await.map_err(|_| SmartRentError::Disconnected)?
    }
}

/// Channel bookkeeping, independent of the socket itself.
#[derive(Default)]
struct Channel {
    handlers: HashMap<RemoteDeviceId, PushHandler>,
    pending: HashMap<String, Pending>,
    /// Join replies waiting for the next connection.
    parked: HashMap<RemoteDeviceId, Reply>,
    next_ref: u64,
}

struct Pending {
    reply: Option<Reply>,
    joining: Option<RemoteDeviceId>,
}

impl Channel {
    fn next_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    /// The frame for `request`, with its reply registered.
    fn outgoing(&mut self, request: Request) -> Frame {
        let msg_ref = self.next_ref();
        let (frame, pending) = match request {
            Request::Join {
                device,
                handler,
                reply,
            } => {
                self.handlers.insert(device, handler);
                let pending = Pending {
                    reply: Some(reply),
                    joining: Some(device),
                };
                (Frame::join(&msg_ref, device), pending)
            }
            Request::Write {
                device,
                command,
                reply,
            } => {
                let (name, state) = command.attribute();
                let payload = json!({
                    "device_id": device.get(),
                    "attributes": [{ "name": name, "state": state }],
                });
                let frame = Frame::new(&msg_ref, device_topic(device), event::UPDATE_ATTRIBUTES, payload);
                let pending = Pending {
                    reply: Some(reply),
                    joining: None,
                };
                (frame, pending)
            }
        };
        self.pending.insert(msg_ref, pending);
        frame
    }

    /// Hold `request` until the socket is back: joins wait, writes fail.
    fn park(&mut self, request: Request) {
        match request {
            Request::Join {
                device,
                handler,
                reply,
            } => {
                tracing::debug!(remote_id = %device, "join held until the websocket is back");
                self.handlers.insert(device, handler);
                self.parked.insert(device, reply);
            }
            write @ Request::Write { .. } => write.fail(SmartRentError::Disconnected),
        }
    }

    /// Whether any device is waiting for pushes.
    fn wants_connection(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Join frames for every subscribed device, after a reconnect.
    fn rejoins(&mut self) -> Vec<Frame> {
        let devices: Vec<RemoteDeviceId> = self.handlers.keys().copied().collect();
        devices
            .into_iter()
            .map(|device| {
                let msg_ref = self.next_ref();
                let reply = self.parked.remove(&device);
                self.pending.insert(
                    msg_ref.clone(),
                    Pending {
                        reply,
                        joining: Some(device),
                    },
                );
                Frame::join(&msg_ref, device)
            })
            .collect()
    }

    fn receive(&mut self, text: &str) {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "ignoring undecodable frame");
                return;
            }
        };
        match frame.event.as_str() {
            event::REPLY => self.reply(&frame),
            event::ATTRIBUTE_STATE => self.attribute_state(&frame),
            event::ERROR | event::CLOSE => {
                tracing::warn!(topic = %frame.topic, event = %frame.event, "channel closed by server");
            }
            other => tracing::trace!(topic = %frame.topic, event = other, "ignoring event"),
        }
    }

    fn reply(&mut self, frame: &Frame) {
        let Some(pending) = frame.msg_ref.as_ref().and_then(|r| self.pending.remove(r)) else {
            return;
        };
        let result = frame.reply_status().map_err(|reason| {
            if let Some(device) = pending.joining {
                tracing::warn!(remote_id = %device, %reason, "channel join refused");
                self.handlers.remove(&device);
            }
            SmartRentError::Rejected { reason }
        });
        if let Some(reply) = pending.reply {
            let _ = reply.send(result);
        }
    }

    fn attribute_state(&self, frame: &Frame) {
        let Some(device) = frame.device() else {
            return;
        };
        let attribute: AttributeRecord = match serde_json::from_value(frame.payload.clone()) {
            Ok(attribute) => attribute,
            Err(err) => {
                tracing::debug!(remote_id = %device, error = %err, "ignoring malformed attribute push");
                return;
            }
        };
        tracing::trace!(remote_id = %device, name = %attribute.name, "attribute pushed");
        if let Some(handler) = self.handlers.get(&device) {
            handler(DeviceUpdate::single(device, attribute.name, attribute.state));
        }
    }

    /// Settle every reply still waiting on a connection that is gone.
    ///
    /// Writes fail; joins are parked for the next connection.
    fn disconnect(&mut self) {
        for (_, pending) in self.pending.drain() {
            match (pending.joining, pending.reply) {
                (Some(device), Some(reply)) => {
                    self.parked.insert(device, reply);
                }
                (_, Some(reply)) => {
                    let _ = reply.send(Err(SmartRentError::Disconnected));
                }
                (_, None) => {}
            }
        }
    }
}

struct SocketTask {
    client: Arc<AuthenticatedClient>,
    config: SmartRentConfig,
    channel: Channel,
}

impl SocketTask {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        let Some(request) = requests.recv().await else {
            return;
        };
        let mut first = Some(request);
        loop {
            let outcome = match self.connect().await {
                Ok(socket) => {
                    tracing::info!("websocket connected");
                    self.serve(socket, &mut requests, first.take()).await
                }
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => return,
                Err(err) => tracing::warn!(error = %err, "websocket unavailable"),
            }
            if let Some(request) = first.take() {
                self.channel.park(request);
            }
            self.channel.disconnect();

            let delay = tokio::time::sleep(self.config.reconnect_delay());
            tokio::pin!(delay);
            loop {
                tokio::select! {
                    () = &mut delay => break,
                    request = requests.recv() => match request {
                        Some(request) => self.channel.park(request),
                        None => return,
                    },
                }
            }

            if !self.channel.wants_connection() {
                tracing::debug!("no subscribed device, reconnecting on the next request");
                match requests.recv().await {
                    Some(request) => first = Some(request),
                    None => return,
                }
            }
        }
    }

    async fn connect(&self) -> Result<Socket, SmartRentError> {
        let token = self.client.access_token().await?;
        match self.open(&token).await {
            Err(SmartRentError::WebSocket(err)) if refused(&err) => {
                tracing::info!("websocket refused token, logging in again");
                let token = self.client.refresh().await?;
                self.open(&token).await
            }
            other => other,
        }
    }

    async fn open(&self, token: &str) -> Result<Socket, SmartRentError> {
        let url = self.config.socket_url(token)?;
        let connect = connect_async(url.as_str());
        match tokio::time::timeout(self.config.request_timeout(), connect).await {
            Ok(Ok((socket, _response))) => Ok(socket),
            Ok(Err(err)) => Err(err.into()),
            Err(_elapsed) => Err(SmartRentError::Disconnected),
        }
    }

    /// Drive one connection. `Ok` means every handle is gone.
    async fn serve(
        &mut self,
        socket: Socket,
        requests: &mut mpsc::UnboundedReceiver<Request>,
        first: Option<Request>,
    ) -> Result<(), SmartRentError> {
        let (mut sink, mut stream) = socket.split();
        let mut frames = self.channel.rejoins();
        if let Some(request) = first {
            frames.push(self.channel.outgoing(request));
        }
        for frame in &frames {
            send(&mut sink, frame).await?;
        }

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        heartbeat.tick().await;
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => {
                        let frame = self.channel.outgoing(request);
                        send(&mut sink, &frame).await?;
                    }
                    None => {
                        let _ = sink.close().await;
                        return Ok(());
                    }
                },
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => self.channel.receive(&text),
                    Some(Ok(Message::Close(_))) | None => return Err(SmartRentError::Disconnected),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                },
                _ = heartbeat.tick() => {
                    let frame = Frame::heartbeat(&self.channel.next_ref());
                    send(&mut sink, &frame).await?;
                }
            }
        }
    }
}

async fn send(sink: &mut Sink, frame: &Frame) -> Result<(), SmartRentError> {
    sink.send(Message::Text(frame.encode()?)).await?;
    Ok(())
}

fn refused(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Http(response) if matches!(response.status().as_u16(), 401 | 403))
}
