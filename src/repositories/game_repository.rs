use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{Put, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};
use tracing::debug;

use crate::models::game::{Game, GameResult, GameStatus, PositionUpdate};
use crate::models::game_move::MoveRecord;
use crate::repositories::errors::game_repository_errors::GameRepositoryError;

#[cfg(test)]
use mockall::automock;

/// Gateway to the `games` table. Every write that races another client is a
/// conditional update: claiming a waiting row, applying a move, finishing a
/// game. A lost condition either surfaces as `Ok(false)` (expected races) or
/// as `Err(Conflict)` (stale move writes).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn create_game(&self, game: &Game) -> Result<(), GameRepositoryError>;

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, GameRepositoryError>;

    /// Oldest waiting row for this time control with an open slot, skipping
    /// rows created by the caller.
    async fn find_waiting_game(
        &self,
        time_control: &str,
        excluded_creator_id: &str,
    ) -> Result<Option<Game>, GameRepositoryError>;

    /// Conditional claim of the open slot; `Ok(false)` when another client
    /// claimed the row first.
    async fn claim_waiting_game(
        &self,
        game_id: &str,
        joiner_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, GameRepositoryError>;

    /// CAS move write keyed on the expected prior position and turn, plus the
    /// move row, in one transaction: either the game row advances and the ply
    /// is recorded, or neither happens. Fails with `Conflict` when the row
    /// has moved on.
    async fn apply_position_update(
        &self,
        update: &PositionUpdate,
        record: &MoveRecord,
    ) -> Result<(), GameRepositoryError>;

    async fn set_draw_offer(
        &self,
        game_id: &str,
        offered_by: Option<String>,
    ) -> Result<(), GameRepositoryError>;

    /// One-shot terminal write, guarded on status=in_progress. `Ok(false)`
    /// means some client already finished the game.
    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        result: GameResult,
        winner_id: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, GameRepositoryError>;

    /// Removes the caller's still-unclaimed waiting rows; idempotent no-op
    /// when none exist.
    async fn delete_waiting_games(&self, creator_id: &str) -> Result<(), GameRepositoryError>;
}

pub struct DynamoDbGameRepository {
    pub client: Client,
    pub table_name: String,
    /// Move rows are written in the same transaction as the game-row CAS.
    pub moves_table_name: String,
}

const STATUS_INDEX: &str = "GSI_GamesByStatus";
const CREATOR_INDEX: &str = "GSI_GamesByCreator";

impl DynamoDbGameRepository {
    pub fn new(client: Client) -> Self {
        let table_name =
            std::env::var("GAMES_TABLE").expect("GAMES_TABLE environment variable must be set");
        let moves_table_name =
            std::env::var("MOVES_TABLE").expect("MOVES_TABLE environment variable must be set");
        Self {
            client,
            table_name,
            moves_table_name,
        }
    }

    fn key(&self, game_id: &str) -> Result<aws_sdk_dynamodb::types::AttributeValue, GameRepositoryError> {
        to_attribute_value(game_id).map_err(|e| GameRepositoryError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl GameRepository for DynamoDbGameRepository {
    async fn create_game(&self, game: &Game) -> Result<(), GameRepositoryError> {
        let item = to_item(game).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| GameRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, GameRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", self.key(game_id)?)
            .send()
            .await
            .map_err(|e| GameRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let game: Game =
                from_item(item).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(game))
        } else {
            Ok(None)
        }
    }

    async fn find_waiting_game(
        &self,
        time_control: &str,
        excluded_creator_id: &str,
    ) -> Result<Option<Game>, GameRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(STATUS_INDEX)
            .key_condition_expression("#status = :waiting")
            .filter_expression(
                "time_control = :tc AND creator_id <> :caller AND attribute_not_exists(black_player_id)",
            )
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":waiting",
                to_attribute_value(GameStatus::Waiting)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":tc",
                to_attribute_value(time_control)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":caller",
                to_attribute_value(excluded_creator_id)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            // The index sorts by created_at; oldest waiting row first.
            .scan_index_forward(true)
            .send()
            .await
            .map_err(|e| GameRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.items.unwrap_or_default().into_iter().next() {
            let game: Game =
                from_item(item).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(game))
        } else {
            Ok(None)
        }
    }

    async fn claim_waiting_game(
        &self,
        game_id: &str,
        joiner_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, GameRepositoryError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", self.key(game_id)?)
            .update_expression(
                "SET black_player_id = :joiner, #status = :in_progress, updated_at = :now",
            )
            .condition_expression(
                "#status = :waiting AND attribute_not_exists(black_player_id) AND creator_id <> :joiner",
            )
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":joiner",
                to_attribute_value(joiner_id)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":in_progress",
                to_attribute_value(GameStatus::InProgress)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":waiting",
                to_attribute_value(GameStatus::Waiting)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":now",
                to_attribute_value(claimed_at)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_conditional_check_failed_exception() => {
                debug!("Waiting game {} was claimed by another client", game_id);
                Ok(false)
            }
            Err(e) => Err(GameRepositoryError::DynamoDb(e.to_string())),
        }
    }

    async fn apply_position_update(
        &self,
        update: &PositionUpdate,
        record: &MoveRecord,
    ) -> Result<(), GameRepositoryError> {
        let clock_attr = match update.mover {
            crate::models::game::Color::White => "white_time_remaining",
            crate::models::game::Color::Black => "black_time_remaining",
        };
        let update_expression = format!(
            "SET board_state = :position, current_turn = :turn, updated_at = :now, {} = :clock REMOVE draw_offer_by",
            clock_attr
        );

        let game_update = Update::builder()
            .table_name(&self.table_name)
            .key("id", self.key(&update.game_id)?)
            .update_expression(update_expression)
            .condition_expression(
                "#status = :in_progress AND current_turn = :expected_turn AND board_state = :expected_position",
            )
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":in_progress",
                to_attribute_value(GameStatus::InProgress)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":expected_turn",
                to_attribute_value(update.expected_turn)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":expected_position",
                to_attribute_value(&update.expected_position)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":position",
                to_attribute_value(&update.new_position)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":turn",
                to_attribute_value(update.next_turn)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":clock",
                to_attribute_value(update.mover_time_remaining)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":now",
                to_attribute_value(update.updated_at)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .build()
            .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

        let move_item =
            to_item(record).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;
        let move_put = Put::builder()
            .table_name(&self.moves_table_name)
            .set_item(Some(move_item))
            // Composite key (game_id, move_number): rejects a second write of
            // the same ply.
            .condition_expression("attribute_not_exists(game_id)")
            .build()
            .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().update(game_update).build())
            .transact_items(TransactWriteItem::builder().put(move_put).build())
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if matches!(
                    e.as_service_error(),
                    Some(TransactWriteItemsError::TransactionCanceledException(_))
                ) =>
            {
                Err(GameRepositoryError::Conflict)
            }
            Err(e) => Err(GameRepositoryError::DynamoDb(e.to_string())),
        }
    }

    async fn set_draw_offer(
        &self,
        game_id: &str,
        offered_by: Option<String>,
    ) -> Result<(), GameRepositoryError> {
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", self.key(game_id)?)
            .condition_expression("#status = :in_progress")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":in_progress",
                to_attribute_value(GameStatus::InProgress)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            );

        request = match offered_by {
            Some(player_id) => request
                .update_expression("SET draw_offer_by = :player")
                .expression_attribute_values(
                    ":player",
                    to_attribute_value(player_id)
                        .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
                ),
            None => request.update_expression("REMOVE draw_offer_by"),
        };

        match request.send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_conditional_check_failed_exception() => {
                Err(GameRepositoryError::Conflict)
            }
            Err(e) => Err(GameRepositoryError::DynamoDb(e.to_string())),
        }
    }

    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        result: GameResult,
        winner_id: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, GameRepositoryError> {
        let mut update_expression = String::from(
            "SET #status = :status, #result = :result, finished_at = :finished, updated_at = :finished",
        );
        if winner_id.is_some() {
            update_expression.push_str(", winner_id = :winner");
        }
        update_expression.push_str(" REMOVE draw_offer_by");

        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", self.key(game_id)?)
            .update_expression(update_expression)
            .condition_expression("#status = :in_progress")
            .expression_attribute_names("#status", "status")
            .expression_attribute_names("#result", "result")
            .expression_attribute_values(
                ":status",
                to_attribute_value(status)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":result",
                to_attribute_value(result)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":in_progress",
                to_attribute_value(GameStatus::InProgress)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":finished",
                to_attribute_value(finished_at)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            );

        if let Some(winner) = winner_id {
            request = request.expression_attribute_values(
                ":winner",
                to_attribute_value(winner)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            );
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_conditional_check_failed_exception() => {
                debug!("Game {} already finished by another client", game_id);
                Ok(false)
            }
            Err(e) => Err(GameRepositoryError::DynamoDb(e.to_string())),
        }
    }

    async fn delete_waiting_games(&self, creator_id: &str) -> Result<(), GameRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(CREATOR_INDEX)
            .key_condition_expression("creator_id = :creator")
            .filter_expression("#status = :waiting AND attribute_not_exists(black_player_id)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":creator",
                to_attribute_value(creator_id)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":waiting",
                to_attribute_value(GameStatus::Waiting)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| GameRepositoryError::DynamoDb(e.to_string()))?;

        for item in output.items.unwrap_or_default() {
            let game: Game =
                from_item(item).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

            let result = self
                .client
                .delete_item()
                .table_name(&self.table_name)
                .key("id", self.key(&game.id)?)
                .condition_expression(
                    "#status = :waiting AND attribute_not_exists(black_player_id)",
                )
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(
                    ":waiting",
                    to_attribute_value(GameStatus::Waiting)
                        .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?,
                )
                .send()
                .await;

            match result {
                Ok(_) => {}
                // Claimed between the query and the delete; the game is live now.
                Err(SdkError::ServiceError(ctx))
                    if ctx.err().is_conditional_check_failed_exception() => {}
                Err(e) => return Err(GameRepositoryError::DynamoDb(e.to_string())),
            }
        }

        Ok(())
    }
}
