use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info};

use super::error::{ErrorInfo, RuntimeError, classify_error, codes};
use super::response::BotReply;
use super::runtime::{BotRuntime, PostTextRequest};
use crate::format::mask_sensitive_text;
use crate::models::SessionAttributes;
use crate::storage::{LocalStorage, keys};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub bot_name: String,
    pub bot_alias: String,
    pub region: String,
    /// Fixed user id; when absent the stored one is reused or a new one is
    /// generated.
    pub user_id: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_name: "IAmigosBot".to_string(),
            bot_alias: "Prod".to_string(),
            region: "us-east-1".to_string(),
            user_id: None,
        }
    }
}

/// Snapshot of the client for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub session_attributes: SessionAttributes,
    pub is_initialized: bool,
    pub pending_messages: usize,
}

struct PendingMessage {
    text: String,
    reply: oneshot::Sender<Result<BotReply, ErrorInfo>>,
}

struct ClientState {
    runtime: Option<Arc<dyn BotRuntime>>,
    user_id: String,
    session_attributes: SessionAttributes,
    pending: VecDeque<PendingMessage>,
}

/// Client for the conversational bot.
///
/// Messages sent before [`LexChatbot::initialize`] are queued and replayed in
/// submission order once a runtime is attached. Turns are dispatched one at a
/// time, so a message sent after initialization never overtakes a queued one.
pub struct LexChatbot {
    config: BotConfig,
    storage: LocalStorage,
    state: Mutex<ClientState>,
    turn: Mutex<()>,
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn generate_user_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("user_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
}

impl LexChatbot {
    /// Create an uninitialized client. Nothing is sent until a runtime is
    /// attached with [`LexChatbot::initialize`].
    pub async fn new(config: BotConfig, storage: LocalStorage) -> Self {
        let user_id = match &config.user_id {
            Some(id) => id.clone(),
            None => {
                let stored: Option<String> = storage.get(keys::USER_ID, None).await;
                match stored {
                    Some(id) => id,
                    None => {
                        let id = generate_user_id();
                        storage.set(keys::USER_ID, &id).await;
                        id
                    }
                }
            }
        };

        Self {
            config,
            storage,
            state: Mutex::new(ClientState {
                runtime: None,
                user_id,
                session_attributes: SessionAttributes::new(),
                pending: VecDeque::new(),
            }),
            turn: Mutex::new(()),
        }
    }

    /// Create a client, restore the saved session and attach `runtime`.
    pub async fn connect(
        config: BotConfig,
        storage: LocalStorage,
        runtime: Arc<dyn BotRuntime>,
    ) -> Self {
        let client = Self::new(config, storage).await;
        client.load_session().await;
        client.initialize(runtime).await;
        client
    }

    /// Attach the runtime and drain the pending queue in FIFO order.
    pub async fn initialize(&self, runtime: Arc<dyn BotRuntime>) {
        let _turn = self.turn.lock().await;
        let queued = {
            let mut state = self.state.lock().await;
            state.runtime = Some(runtime);
            std::mem::take(&mut state.pending)
        };

        info!(
            bot = %self.config.bot_name,
            queued = queued.len(),
            "Bot runtime initialized"
        );

        for message in queued {
            let result = self.dispatch(&message.text).await;
            if message.reply.send(result).is_err() {
                debug!("Caller stopped waiting for a queued message");
            }
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<BotReply, ErrorInfo> {
        let waiting = {
            let mut state = self.state.lock().await;
            if state.runtime.is_some() {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.pending.push_back(PendingMessage {
                    text: text.to_string(),
                    reply: tx,
                });
                debug!(pending = state.pending.len(), "Client not initialized, message queued");
                Some(rx)
            }
        };

        if let Some(rx) = waiting {
            return rx.await.unwrap_or_else(|_| {
                Err(classify_error(&RuntimeError::new(
                    codes::CLIENT_CLOSED,
                    "client dropped before the message was sent",
                )))
            });
        }

        let _turn = self.turn.lock().await;
        self.dispatch(text).await
    }

    /// Send one turn. Callers hold `turn`.
    async fn dispatch(&self, text: &str) -> Result<BotReply, ErrorInfo> {
        let (runtime, request) = {
            let state = self.state.lock().await;
            let Some(runtime) = state.runtime.clone() else {
                return Err(classify_error(&RuntimeError::new(
                    codes::CLIENT_CLOSED,
                    "no runtime attached",
                )));
            };
            let request = PostTextRequest {
                bot_name: self.config.bot_name.clone(),
                bot_alias: self.config.bot_alias.clone(),
                user_id: state.user_id.clone(),
                input_text: text.to_string(),
                session_attributes: state.session_attributes.clone(),
            };
            (runtime, request)
        };

        debug!(
            message = %mask_sensitive_text(text, 4),
            attributes = request.session_attributes.len(),
            "Sending message to bot"
        );

        match runtime.post_text(request).await {
            Ok(raw) => {
                let merged = {
                    let mut state = self.state.lock().await;
                    if let Some(attributes) = &raw.session_attributes {
                        state.session_attributes.extend(attributes.clone());
                        self.storage
                            .set(keys::SESSION_ATTRIBUTES, &state.session_attributes)
                            .await;
                    }
                    state.session_attributes.clone()
                };
                let reply = BotReply::normalize(raw, merged);
                info!(
                    message = %mask_sensitive_text(&reply.message, 4),
                    dialog_state = ?reply.dialog_state,
                    intent = ?reply.intent_name,
                    "Bot replied"
                );
                Ok(reply)
            }
            Err(e) => {
                let info = classify_error(&e);
                error!(
                    code = %e.code,
                    error = %e.message,
                    should_retry = info.should_retry,
                    "Bot request failed"
                );
                Err(info)
            }
        }
    }

    /// Replace the in-memory attributes with the saved ones.
    pub async fn load_session(&self) -> SessionAttributes {
        let saved: SessionAttributes = self.storage.get_or_default(keys::SESSION_ATTRIBUTES).await;
        let mut state = self.state.lock().await;
        state.session_attributes = saved;
        state.session_attributes.clone()
    }

    /// Forget the conversation: empty attributes and a fresh user id.
    pub async fn reset_session(&self) {
        let _turn = self.turn.lock().await;
        let user_id = generate_user_id();
        self.storage.remove(keys::SESSION_ATTRIBUTES).await;
        self.storage.set(keys::USER_ID, &user_id).await;

        let mut state = self.state.lock().await;
        state.session_attributes.clear();
        state.user_id = user_id;
        info!("Bot session reset");
    }

    pub async fn update_session_attributes(&self, attributes: SessionAttributes) {
        let mut state = self.state.lock().await;
        state.session_attributes.extend(attributes);
        self.storage
            .set(keys::SESSION_ATTRIBUTES, &state.session_attributes)
            .await;
    }

    pub async fn session_attributes(&self) -> SessionAttributes {
        self.state.lock().await.session_attributes.clone()
    }

    pub async fn is_dialog_complete(&self) -> bool {
        let state = self.state.lock().await;
        ["analysisComplete", "reimbursementComplete"]
            .iter()
            .any(|key| state.session_attributes.get(*key).map(String::as_str) == Some("true"))
    }

    pub async fn current_intent(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .session_attributes
            .get("currentIntent")
            .cloned()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.runtime.is_some()
    }

    pub async fn user_id(&self) -> String {
        self.state.lock().await.user_id.clone()
    }

    pub async fn session_info(&self) -> SessionInfo {
        let state = self.state.lock().await;
        SessionInfo {
            user_id: state.user_id.clone(),
            session_attributes: state.session_attributes.clone(),
            is_initialized: state.runtime.is_some(),
            pending_messages: state.pending.len(),
        }
    }

    pub async fn start_pre_approval_flow(
        &self,
        symptoms: &str,
        plan_tier: Option<&str>,
    ) -> Result<BotReply, ErrorInfo> {
        let plan = plan_tier.unwrap_or("basic");
        self.send_message(&format!(
            "Sintomas: {symptoms}. Plano: {plan}. Quero pré-aprovação."
        ))
        .await
    }

    pub async fn start_reimbursement_flow(
        &self,
        document_info: &str,
        plan_tier: Option<&str>,
    ) -> Result<BotReply, ErrorInfo> {
        let plan = plan_tier.unwrap_or("basic");
        self.send_message(&format!("Reembolso. Documento: {document_info}. Plano: {plan}."))
            .await
    }

    pub async fn search_dentists_flow(
        &self,
        location: &str,
        specialty: Option<&str>,
    ) -> Result<BotReply, ErrorInfo> {
        let specialty = specialty.unwrap_or("geral");
        self.send_message(&format!(
            "Buscar dentistas. Localização: {location}. Especialidade: {specialty}."
        ))
        .await
    }
}
