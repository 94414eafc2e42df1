use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};

use crate::models::profile::Profile;
use crate::repositories::errors::profile_repository_errors::ProfileRepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ProfileRepositoryError>;
    async fn update_profile(&self, profile: &Profile) -> Result<(), ProfileRepositoryError>;
    async fn touch_last_seen(
        &self,
        user_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), ProfileRepositoryError>;
}

pub struct DynamoDbProfileRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbProfileRepository {
    pub fn new(client: Client) -> Self {
        let table_name = std::env::var("PROFILES_TABLE")
            .expect("PROFILES_TABLE environment variable must be set");
        Self { client, table_name }
    }
}

#[async_trait]
impl ProfileRepository for DynamoDbProfileRepository {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ProfileRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(user_id)
                    .map_err(|e| ProfileRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| ProfileRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let profile: Profile = from_item(item)
                .map_err(|e| ProfileRepositoryError::Serialization(e.to_string()))?;
            Ok(profile)
        } else {
            Err(ProfileRepositoryError::NotFound)
        }
    }

    async fn update_profile(&self, profile: &Profile) -> Result<(), ProfileRepositoryError> {
        let item =
            to_item(profile).map_err(|e| ProfileRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| ProfileRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn touch_last_seen(
        &self,
        user_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), ProfileRepositoryError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(user_id)
                    .map_err(|e| ProfileRepositoryError::Serialization(e.to_string()))?,
            )
            .update_expression("SET last_seen_at = :seen")
            .expression_attribute_values(
                ":seen",
                to_attribute_value(seen_at)
                    .map_err(|e| ProfileRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| ProfileRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }
}
