use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};

use crate::models::invitation::{GameInvitation, InvitationStatus};
use crate::repositories::errors::invitation_repository_errors::InvitationRepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn create_invitation(
        &self,
        invitation: &GameInvitation,
    ) -> Result<(), InvitationRepositoryError>;

    async fn get_invitation(
        &self,
        invitation_id: &str,
    ) -> Result<Option<GameInvitation>, InvitationRepositoryError>;

    /// Conditional transition pending -> `new_status`; `Ok(false)` when the
    /// invitation was already resolved.
    async fn respond(
        &self,
        invitation_id: &str,
        new_status: InvitationStatus,
    ) -> Result<bool, InvitationRepositoryError>;

    async fn list_pending_for(
        &self,
        to_user_id: &str,
    ) -> Result<Vec<GameInvitation>, InvitationRepositoryError>;
}

pub struct DynamoDbInvitationRepository {
    pub client: Client,
    pub table_name: String,
}

const RECIPIENT_INDEX: &str = "GSI_InvitationsByRecipient";

impl DynamoDbInvitationRepository {
    pub fn new(client: Client) -> Self {
        let table_name = std::env::var("GAME_INVITATIONS_TABLE")
            .expect("GAME_INVITATIONS_TABLE environment variable must be set");
        Self { client, table_name }
    }
}

#[async_trait]
impl InvitationRepository for DynamoDbInvitationRepository {
    async fn create_invitation(
        &self,
        invitation: &GameInvitation,
    ) -> Result<(), InvitationRepositoryError> {
        let item = to_item(invitation)
            .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| InvitationRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_invitation(
        &self,
        invitation_id: &str,
    ) -> Result<Option<GameInvitation>, InvitationRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(invitation_id)
                    .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| InvitationRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let invitation: GameInvitation = from_item(item)
                .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(invitation))
        } else {
            Ok(None)
        }
    }

    async fn respond(
        &self,
        invitation_id: &str,
        new_status: InvitationStatus,
    ) -> Result<bool, InvitationRepositoryError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(invitation_id)
                    .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?,
            )
            .update_expression("SET #status = :new")
            .condition_expression("#status = :pending")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":new",
                to_attribute_value(new_status)
                    .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":pending",
                to_attribute_value(InvitationStatus::Pending)
                    .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_conditional_check_failed_exception() => {
                Ok(false)
            }
            Err(e) => Err(InvitationRepositoryError::DynamoDb(e.to_string())),
        }
    }

    async fn list_pending_for(
        &self,
        to_user_id: &str,
    ) -> Result<Vec<GameInvitation>, InvitationRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(RECIPIENT_INDEX)
            .key_condition_expression("to_user_id = :recipient")
            .filter_expression("#status = :pending")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":recipient",
                to_attribute_value(to_user_id)
                    .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":pending",
                to_attribute_value(InvitationStatus::Pending)
                    .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| InvitationRepositoryError::DynamoDb(e.to_string()))?;

        let mut invitations = Vec::new();
        for item in output.items.unwrap_or_default() {
            let invitation: GameInvitation = from_item(item)
                .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?;
            invitations.push(invitation);
        }

        Ok(invitations)
    }
}
