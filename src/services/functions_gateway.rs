use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::Client;
use tracing::debug;

use crate::models::rating::{NotificationRequest, RatingUpdateRequest, RatingUpdateResponse};
use crate::services::errors::functions_gateway_errors::FunctionsError;

#[cfg(test)]
use mockall::automock;

/// The two hosted functions the client depends on. Both are consumed as
/// black boxes; callers treat every invocation as best-effort.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FunctionsGateway: Send + Sync {
    async fn update_ratings(
        &self,
        request: &RatingUpdateRequest,
    ) -> Result<RatingUpdateResponse, FunctionsError>;

    async fn notify(&self, request: &NotificationRequest) -> Result<(), FunctionsError>;
}

pub struct LambdaFunctionsGateway {
    pub client: Client,
    pub rating_function: String,
    pub notification_function: String,
}

impl LambdaFunctionsGateway {
    pub fn new(client: Client) -> Self {
        let rating_function = std::env::var("RATING_FUNCTION_NAME")
            .expect("RATING_FUNCTION_NAME environment variable must be set");
        let notification_function = std::env::var("NOTIFICATION_FUNCTION_NAME")
            .expect("NOTIFICATION_FUNCTION_NAME environment variable must be set");
        Self {
            client,
            rating_function,
            notification_function,
        }
    }

    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<Blob, FunctionsError> {
        let output = self
            .client
            .invoke()
            .function_name(function_name)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| FunctionsError::Invoke(e.to_string()))?;

        if let Some(function_error) = output.function_error() {
            return Err(FunctionsError::FunctionFailed(function_error.to_string()));
        }

        output
            .payload
            .ok_or_else(|| FunctionsError::Invoke("Empty function response".to_string()))
    }
}

#[async_trait]
impl FunctionsGateway for LambdaFunctionsGateway {
    async fn update_ratings(
        &self,
        request: &RatingUpdateRequest,
    ) -> Result<RatingUpdateResponse, FunctionsError> {
        debug!("Requesting rating update for game {}", request.game_id);
        let payload = serde_json::to_vec(request)
            .map_err(|e| FunctionsError::Serialization(e.to_string()))?;

        let response = self.invoke(&self.rating_function, payload).await?;
        serde_json::from_slice(response.as_ref())
            .map_err(|e| FunctionsError::Serialization(e.to_string()))
    }

    async fn notify(&self, request: &NotificationRequest) -> Result<(), FunctionsError> {
        debug!("Dispatching {:?} notification", request.kind);
        let payload = serde_json::to_vec(request)
            .map_err(|e| FunctionsError::Serialization(e.to_string()))?;

        self.invoke(&self.notification_function, payload).await?;
        Ok(())
    }
}
