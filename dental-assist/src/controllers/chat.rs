use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::error::{AssistError, Result};
use crate::history::{HistoryLog, chat_history};
use crate::lex::{BotReply, LexChatbot};
use crate::models::{ChatExchange, SessionAttributes};
use crate::storage::LocalStorage;

pub const MAX_MESSAGE_CHARS: usize = 500;

/// Pre-approval analysis shown once the bot marks the analysis complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub possible_conditions: String,
    pub urgency_level: String,
    pub approval_status: String,
    pub approval_label: String,
    pub clinics_found: String,
}

impl AnalysisResults {
    /// `None` until `analysisComplete` or `preApprovalComplete` is `"true"`.
    pub fn from_attributes(attributes: &SessionAttributes) -> Option<Self> {
        let flag = |key: &str| attributes.get(key).map(String::as_str) == Some("true");
        if !flag("analysisComplete") && !flag("preApprovalComplete") {
            return None;
        }

        let approval_status = attributes
            .get("approvalStatus")
            .cloned()
            .unwrap_or_else(|| "pending".to_string());
        let approval_label = if approval_status == "approved" {
            "Aprovada"
        } else {
            "Avaliação Necessária"
        };

        Some(Self {
            possible_conditions: attributes
                .get("possibleConditions")
                .cloned()
                .unwrap_or_else(|| "Avaliação necessária".to_string()),
            urgency_level: attributes
                .get("urgencyLevel")
                .map(|u| u.to_lowercase())
                .unwrap_or_else(|| "media".to_string()),
            approval_label: approval_label.to_string(),
            approval_status,
            clinics_found: match attributes.get("clinicsFound") {
                Some(count) => format!("{count} consultórios próximos"),
                None => "3 consultórios próximos".to_string(),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub reply: BotReply,
    pub analysis: Option<AnalysisResults>,
}

/// Clears the in-flight flag when a send finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Symptom-intake chat. One message may be in flight at a time.
pub struct ChatController {
    bot: Arc<LexChatbot>,
    history: HistoryLog<ChatExchange>,
    busy: AtomicBool,
}

impl ChatController {
    pub fn new(bot: Arc<LexChatbot>, storage: LocalStorage) -> Self {
        Self {
            bot,
            history: chat_history(storage),
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn send(&self, message: &str) -> Result<ChatOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistError::MessageRejected(
                "Por favor, digite uma mensagem".to_string(),
            ));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AssistError::MessageRejected(format!(
                "Mensagem muito longa. Máximo: {MAX_MESSAGE_CHARS} caracteres"
            )));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Message rejected while a previous one is in flight");
            return Err(AssistError::MessageRejected(
                "Aguarde a resposta anterior".to_string(),
            ));
        }
        let _in_flight = InFlight(&self.busy);

        let reply = self.bot.send_message(message).await.map_err(AssistError::Bot)?;
        let analysis = AnalysisResults::from_attributes(&reply.session_attributes);
        if analysis.is_some() {
            info!(intent = ?reply.intent_name, "Pre-approval analysis complete");
        }

        self.history
            .record(ChatExchange {
                timestamp: Utc::now(),
                user: message.to_string(),
                bot: reply.message.clone(),
                session_attributes: reply.session_attributes.clone(),
            })
            .await;

        Ok(ChatOutcome { reply, analysis })
    }

    pub async fn history(&self) -> Vec<ChatExchange> {
        self.history.load().await
    }

    pub async fn clear_history(&self) -> bool {
        self.history.clear().await
    }

    /// Start a new conversation: fresh bot session and empty history.
    pub async fn reset(&self) {
        self.bot.reset_session().await;
        self.clear_history().await;
        info!("Chat reset");
    }
}
