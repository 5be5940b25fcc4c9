use async_trait::async_trait;
use aws_sdk_lexruntime::Client;
use aws_sdk_lexruntime::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_lexruntime::operation::post_text::PostTextError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::error::{RuntimeError, codes};
use super::response::RuntimeReply;
use crate::models::SessionAttributes;

/// One text turn sent to the bot runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTextRequest {
    pub bot_name: String,
    pub bot_alias: String,
    pub user_id: String,
    pub input_text: String,
    pub session_attributes: SessionAttributes,
}

/// Conversational runtime the client talks to.
#[async_trait]
pub trait BotRuntime: Send + Sync {
    async fn post_text(&self, request: PostTextRequest) -> Result<RuntimeReply, RuntimeError>;
}

/// [`BotRuntime`] backed by the Amazon Lex (V1) runtime `PostText` API.
pub struct AwsLexRuntime {
    client: Client,
}

impl AwsLexRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolve credentials from the default provider chain for `region`.
    pub async fn from_env(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        info!(region = %region, "Lex runtime client configured");
        Self::new(Client::new(&config))
    }
}

fn to_sorted(map: Option<&HashMap<String, String>>) -> Option<SessionAttributes> {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn classify_sdk_error(err: SdkError<PostTextError>) -> RuntimeError {
    match err {
        SdkError::TimeoutError(_) => RuntimeError::new(codes::TIMEOUT_ERROR, "request timed out"),
        SdkError::DispatchFailure(failure) => {
            RuntimeError::new(codes::NETWORK_ERROR, format!("{failure:?}"))
        }
        other => {
            let service = other.into_service_error();
            let code = service.code().unwrap_or("Unknown").to_string();
            RuntimeError::new(code, service.to_string())
        }
    }
}

#[async_trait]
impl BotRuntime for AwsLexRuntime {
    async fn post_text(&self, request: PostTextRequest) -> Result<RuntimeReply, RuntimeError> {
        let attributes: HashMap<String, String> = request.session_attributes.into_iter().collect();

        let output = self
            .client
            .post_text()
            .bot_name(request.bot_name)
            .bot_alias(request.bot_alias)
            .user_id(request.user_id)
            .input_text(request.input_text)
            .set_session_attributes(Some(attributes))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(RuntimeReply {
            message: output.message().map(str::to_string),
            dialog_state: output.dialog_state().map(|s| s.as_str().to_string()),
            intent_name: output.intent_name().map(str::to_string),
            slots: to_sorted(output.slots()).unwrap_or_default(),
            session_attributes: to_sorted(output.session_attributes()),
            slot_to_elicit: output.slot_to_elicit().map(str::to_string),
        })
    }
}
