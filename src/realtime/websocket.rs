use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::realtime::channel::{
    RealtimeChannel, RealtimeError, Subscription, SubscriptionCommand, SubscriptionRequest,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Per-subscription buffer; a subscriber that stops polling loses frames
/// rather than stalling the socket.
const EVENT_BUFFER: usize = 64;

/// Row-change subscriptions over a single websocket. A background driver owns
/// the socket, fans frames out to subscribers and reconnects (resubscribing
/// everything) when the connection drops.
pub struct WebSocketRealtimeChannel {
    commands: mpsc::UnboundedSender<SubscriptionCommand>,
}

impl WebSocketRealtimeChannel {
    pub fn connect(endpoint: &str) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_driver(endpoint.to_string(), command_rx));
        WebSocketRealtimeChannel { commands }
    }

    pub fn from_env() -> Self {
        let endpoint = std::env::var("REALTIME_ENDPOINT")
            .expect("REALTIME_ENDPOINT environment variable must be set");
        Self::connect(&endpoint)
    }
}

#[async_trait]
impl RealtimeChannel for WebSocketRealtimeChannel {
    async fn subscribe(
        &self,
        request: SubscriptionRequest,
    ) -> Result<Subscription, RealtimeError> {
        let id = Uuid::new_v4().to_string();
        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        let (ack, ack_rx) = oneshot::channel();

        self.commands
            .send(SubscriptionCommand::Subscribe {
                id: id.clone(),
                request,
                sender,
                ack,
            })
            .map_err(|_| RealtimeError::Closed)?;
        ack_rx.await.map_err(|_| RealtimeError::Closed)??;

        Ok(Subscription::new(id, events, self.commands.clone()))
    }
}

struct Registered {
    request: SubscriptionRequest,
    sender: mpsc::Sender<Value>,
}

async fn run_driver(
    endpoint: String,
    mut commands: mpsc::UnboundedReceiver<SubscriptionCommand>,
) {
    let mut subscriptions: HashMap<String, Registered> = HashMap::new();

    loop {
        let mut stream = match connect_async(&endpoint).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Realtime connection to {} failed: {}", endpoint, e);
                if !wait_to_reconnect(&mut commands, &mut subscriptions).await {
                    return;
                }
                continue;
            }
        };
        info!(
            "Realtime socket connected, resubscribing {} streams",
            subscriptions.len()
        );

        let mut healthy = true;
        for (id, registered) in &subscriptions {
            let frame = subscribe_frame(id, &registered.request);
            if let Err(e) = stream.send(Message::Text(frame.to_string().into())).await {
                warn!("Resubscribe failed: {}", e);
                healthy = false;
                break;
            }
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // the first tick fires immediately

        while healthy {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SubscriptionCommand::Subscribe { id, request, sender, ack }) => {
                        let frame = subscribe_frame(&id, &request);
                        match stream.send(Message::Text(frame.to_string().into())).await {
                            Ok(()) => {
                                subscriptions.insert(id, Registered { request, sender });
                                let _ = ack.send(Ok(()));
                            }
                            Err(e) => {
                                let _ = ack.send(Err(RealtimeError::Connect(e.to_string())));
                                healthy = false;
                            }
                        }
                    }
                    Some(SubscriptionCommand::Unsubscribe { id }) => {
                        if subscriptions.remove(&id).is_some() {
                            let frame = unsubscribe_frame(&id);
                            if stream.send(Message::Text(frame.to_string().into())).await.is_err() {
                                healthy = false;
                            }
                        }
                    }
                    None => {
                        let _ = stream.close(None).await;
                        return;
                    }
                },
                _ = heartbeat.tick() => {
                    if stream.send(Message::Ping(Vec::new().into())).await.is_err() {
                        warn!("Heartbeat failed, reconnecting");
                        healthy = false;
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(text.as_str(), &mut subscriptions);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if stream.send(Message::Pong(payload)).await.is_err() {
                            healthy = false;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Realtime socket closed by the server");
                        healthy = false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Realtime socket error: {}", e);
                        healthy = false;
                    }
                },
            }
        }

        if !wait_to_reconnect(&mut commands, &mut subscriptions).await {
            return;
        }
    }
}

/// Sit out the reconnect delay without going deaf: subscribe and unsubscribe
/// commands arriving while offline are recorded and replayed on reconnect.
/// Returns false when the channel handle is gone and the driver should stop.
async fn wait_to_reconnect(
    commands: &mut mpsc::UnboundedReceiver<SubscriptionCommand>,
    subscriptions: &mut HashMap<String, Registered>,
) -> bool {
    let delay = tokio::time::sleep(RECONNECT_DELAY);
    tokio::pin!(delay);
    loop {
        tokio::select! {
            _ = &mut delay => return true,
            command = commands.recv() => match command {
                Some(SubscriptionCommand::Subscribe { id, request, sender, ack }) => {
                    subscriptions.insert(id, Registered { request, sender });
                    let _ = ack.send(Ok(()));
                }
                Some(SubscriptionCommand::Unsubscribe { id }) => {
                    subscriptions.remove(&id);
                }
                None => return false,
            },
        }
    }
}

fn subscribe_frame(id: &str, request: &SubscriptionRequest) -> Value {
    json!({
        "action": "subscribe",
        "subscription_id": id,
        "table": request.table,
        "filter": {
            "column": request.filter.column,
            "value": request.filter.value,
        },
    })
}

fn unsubscribe_frame(id: &str) -> Value {
    json!({
        "action": "unsubscribe",
        "subscription_id": id,
    })
}

/// Route one server frame to its subscriber. Subscribers that fell behind
/// lose the frame; subscribers that went away are dropped from the table.
fn dispatch_frame(text: &str, subscriptions: &mut HashMap<String, Registered>) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Unparseable realtime frame: {}", e);
            return;
        }
    };
    let id = match frame.get("subscription_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            debug!("Ignoring frame without a subscription id");
            return;
        }
    };
    let Some(registered) = subscriptions.get(&id) else {
        return;
    };

    let event = json!({
        "kind": frame.get("event").cloned().unwrap_or(Value::Null),
        "old": frame.get("old").cloned().unwrap_or(Value::Null),
        "new": frame.get("new").cloned().unwrap_or(Value::Null),
    });

    match registered.sender.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Subscriber {} is lagging, dropping a frame", id);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            subscriptions.remove(&id);
        }
    }
}
