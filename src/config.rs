//! AWS client construction shared by the repository and gateway constructors.

use aws_config::SdkConfig;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_lambda::Client as LambdaClient;

pub async fn aws_config() -> SdkConfig {
    aws_config::load_from_env().await
}

pub async fn dynamodb_client() -> DynamoDbClient {
    DynamoDbClient::new(&aws_config().await)
}

pub async fn lambda_client() -> LambdaClient {
    LambdaClient::new(&aws_config().await)
}
