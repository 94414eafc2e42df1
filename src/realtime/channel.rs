use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowEventKind {
    Insert,
    Update,
}

/// One row change pushed by the backend: the row before the write (absent for
/// inserts) and the row after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowEvent<T> {
    pub kind: RowEventKind,
    // A bare `default` would put a `T: Default` bound on the derived impl.
    #[serde(default = "Option::default")]
    pub old: Option<T>,
    pub new: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Games,
    Moves,
    GameInvitations,
}

/// Server-side equality filter; only rows where `column = value` are pushed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeFilter {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub table: TableName,
    pub filter: ChangeFilter,
}

impl SubscriptionRequest {
    /// Game rows where the player holds the white seat: covers both their
    /// own waiting rows getting claimed and challenges they sent being
    /// accepted, independently of the best-effort notification function.
    pub fn player_games(player_id: &str) -> Self {
        SubscriptionRequest {
            table: TableName::Games,
            filter: ChangeFilter {
                column: "white_player_id".to_string(),
                value: player_id.to_string(),
            },
        }
    }

    /// Changes to a single game row.
    pub fn game(game_id: &str) -> Self {
        SubscriptionRequest {
            table: TableName::Games,
            filter: ChangeFilter {
                column: "id".to_string(),
                value: game_id.to_string(),
            },
        }
    }

    /// Move rows appended to one game.
    pub fn game_moves(game_id: &str) -> Self {
        SubscriptionRequest {
            table: TableName::Moves,
            filter: ChangeFilter {
                column: "game_id".to_string(),
                value: game_id.to_string(),
            },
        }
    }

    /// Challenges addressed to one player.
    pub fn invitations(player_id: &str) -> Self {
        SubscriptionRequest {
            table: TableName::GameInvitations,
            filter: ChangeFilter {
                column: "to_user_id".to_string(),
                value: player_id.to_string(),
            },
        }
    }
}

#[derive(Debug)]
pub enum RealtimeError {
    Connect(String),
    Closed,
    Serialization(String),
}

impl std::fmt::Display for RealtimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RealtimeError::Connect(msg) => write!(f, "Realtime connection failed: {}", msg),
            RealtimeError::Closed => write!(f, "Realtime channel is closed"),
            RealtimeError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for RealtimeError {}

#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Register a row-change subscription. Events arrive on the returned
    /// [`Subscription`] until it is dropped.
    async fn subscribe(
        &self,
        request: SubscriptionRequest,
    ) -> Result<Subscription, RealtimeError>;
}

pub(crate) enum SubscriptionCommand {
    Subscribe {
        id: String,
        request: SubscriptionRequest,
        sender: mpsc::Sender<serde_json::Value>,
        ack: oneshot::Sender<Result<(), RealtimeError>>,
    },
    Unsubscribe {
        id: String,
    },
}

/// A live stream of raw row events for one subscription. Dropping it tells the
/// channel to stop delivering.
pub struct Subscription {
    pub(crate) id: String,
    pub(crate) events: mpsc::Receiver<serde_json::Value>,
    pub(crate) commands: mpsc::UnboundedSender<SubscriptionCommand>,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        events: mpsc::Receiver<serde_json::Value>,
        commands: mpsc::UnboundedSender<SubscriptionCommand>,
    ) -> Self {
        Subscription {
            id,
            events,
            commands,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next event, decoded into the row type. Frames that do not decode are
    /// logged and skipped rather than tearing the stream down. Returns `None`
    /// once the channel shuts down for good.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Option<RowEvent<T>> {
        while let Some(raw) = self.events.recv().await {
            match serde_json::from_value::<RowEvent<T>>(raw) {
                Ok(event) => return Some(event),
                Err(e) => {
                    warn!("Dropping undecodable realtime frame: {}", e);
                }
            }
        }
        None
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The driver may already be gone during shutdown.
        let _ = self.commands.send(SubscriptionCommand::Unsubscribe {
            id: self.id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::{Game, GameStatus};

    #[test]
    fn request_constructors_pick_the_filter_column() {
        let by_game = SubscriptionRequest::game("g-1");
        assert_eq!(by_game.table, TableName::Games);
        assert_eq!(by_game.filter.column, "id");

        let by_recipient = SubscriptionRequest::invitations("bob");
        assert_eq!(by_recipient.table, TableName::GameInvitations);
        assert_eq!(by_recipient.filter.column, "to_user_id");
        assert_eq!(by_recipient.filter.value, "bob");

        let by_seat = SubscriptionRequest::player_games("alice");
        assert_eq!(by_seat.table, TableName::Games);
        assert_eq!(by_seat.filter.column, "white_player_id");
        assert_eq!(by_seat.filter.value, "alice");
    }

    #[test]
    fn table_names_serialize_snake_case() {
        let json = serde_json::to_string(&TableName::GameInvitations).unwrap();
        assert_eq!(json, "\"game_invitations\"");
    }

    #[tokio::test]
    async fn undecodable_frames_are_skipped() {
        let (tx, rx) = mpsc::channel(4);
        let (cmd_tx, _cmd_rx) = mpsc::unbounded_channel();
        let mut subscription = Subscription::new("sub-1".to_string(), rx, cmd_tx);

        let game = Game::new_waiting(
            "alice",
            &"5+0".parse::<crate::models::time_control::TimeControl>().unwrap(),
        );
        tx.send(serde_json::json!({"kind": "update", "new": 42}))
            .await
            .unwrap();
        tx.send(serde_json::json!({
            "kind": "insert",
            "new": serde_json::to_value(&game).unwrap(),
        }))
        .await
        .unwrap();
        drop(tx);

        let event = subscription.next::<Game>().await.unwrap();
        assert_eq!(event.kind, RowEventKind::Insert);
        assert!(event.old.is_none());
        assert_eq!(event.new.status, GameStatus::Waiting);

        assert!(subscription.next::<Game>().await.is_none());
    }

    #[tokio::test]
    async fn dropping_a_subscription_sends_unsubscribe() {
        let (_tx, rx) = mpsc::channel(1);
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new("sub-2".to_string(), rx, cmd_tx);
        drop(subscription);

        match cmd_rx.recv().await {
            Some(SubscriptionCommand::Unsubscribe { id }) => assert_eq!(id, "sub-2"),
            _ => panic!("expected an unsubscribe command"),
        }
    }
}
