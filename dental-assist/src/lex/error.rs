use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes the runtime seam reports. Anything else is passed through
/// verbatim from the service.
pub mod codes {
    pub const NETWORK_ERROR: &str = "NetworkError";
    pub const TIMEOUT_ERROR: &str = "TimeoutError";
    pub const BAD_REQUEST: &str = "BadRequestException";
    pub const LIMIT_EXCEEDED: &str = "LimitExceededException";
    pub const CLIENT_CLOSED: &str = "ClientClosed";
}

/// Failure reported by a [`super::BotRuntime`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RuntimeError {
    pub code: String,
    pub message: String,
}

impl RuntimeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// What the patient is told when a turn fails, and whether re-sending the
/// same message is worth suggesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: String,
    pub user_message: String,
    pub should_retry: bool,
}

const GENERIC_APOLOGY: &str =
    "Desculpe, estou com problemas técnicos. Tente novamente em alguns instantes.";

pub fn classify_error(error: &RuntimeError) -> ErrorInfo {
    let (user_message, should_retry) = match error.code.as_str() {
        codes::NETWORK_ERROR => (
            "Problema de conexão. Verifique sua internet e tente novamente.",
            true,
        ),
        codes::TIMEOUT_ERROR => ("Tempo limite excedido. Tente novamente.", true),
        codes::BAD_REQUEST => ("Erro na solicitação. Tente reformular sua mensagem.", false),
        codes::LIMIT_EXCEEDED => (
            "Limite de requisições excedido. Tente novamente em alguns minutos.",
            true,
        ),
        _ => (GENERIC_APOLOGY, false),
    };

    ErrorInfo {
        code: error.code.clone(),
        user_message: user_message.to_string(),
        should_retry,
    }
}

impl From<&RuntimeError> for ErrorInfo {
    fn from(error: &RuntimeError) -> Self {
        classify_error(error)
    }
}
