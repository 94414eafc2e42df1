use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value};

use crate::models::game_move::MoveRecord;
use crate::repositories::errors::move_repository_errors::MoveRepositoryError;

#[cfg(test)]
use mockall::automock;

/// Read side of the `moves` table, keyed by game id and move number. Writes
/// go through `GameRepository::apply_position_update`, which puts the move
/// row in the same transaction as the game-row update.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MoveRepository: Send + Sync {
    /// All moves of a game, ordered by move number.
    async fn list_moves(&self, game_id: &str) -> Result<Vec<MoveRecord>, MoveRepositoryError>;
}

pub struct DynamoDbMoveRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMoveRepository {
    pub fn new(client: Client) -> Self {
        let table_name =
            std::env::var("MOVES_TABLE").expect("MOVES_TABLE environment variable must be set");
        Self { client, table_name }
    }
}

#[async_trait]
impl MoveRepository for DynamoDbMoveRepository {
    async fn list_moves(&self, game_id: &str) -> Result<Vec<MoveRecord>, MoveRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("game_id = :game_id")
            .expression_attribute_values(
                ":game_id",
                to_attribute_value(game_id)
                    .map_err(|e| MoveRepositoryError::Serialization(e.to_string()))?,
            )
            .scan_index_forward(true)
            .send()
            .await
            .map_err(|e| MoveRepositoryError::DynamoDb(e.to_string()))?;

        let mut moves = Vec::new();
        for item in output.items.unwrap_or_default() {
            let record: MoveRecord =
                from_item(item).map_err(|e| MoveRepositoryError::Serialization(e.to_string()))?;
            moves.push(record);
        }
        moves.sort_by_key(|m| m.move_number);

        Ok(moves)
    }
}
