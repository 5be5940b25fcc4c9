//! In-process [`BotRuntime`] that replays canned replies. Used by the tests
//! and by the service's offline mode.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::error::RuntimeError;
use super::response::RuntimeReply;
use super::runtime::{BotRuntime, PostTextRequest};

pub struct ScriptedRuntime {
    script: Mutex<VecDeque<Result<RuntimeReply, RuntimeError>>>,
    requests: Mutex<Vec<PostTextRequest>>,
    fallback: RuntimeReply,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fallback: RuntimeReply {
                message: Some(
                    "Olá! Posso ajudar com pré-aprovação, reembolso ou busca de dentistas."
                        .to_string(),
                ),
                dialog_state: Some("ElicitIntent".to_string()),
                ..Default::default()
            },
        }
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, reply: RuntimeReply) -> &Self {
        self.lock_script().push_back(Ok(reply));
        self
    }

    /// Queue a failure.
    pub fn push_error(&self, error: RuntimeError) -> &Self {
        self.lock_script().push_back(Err(error));
        self
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<PostTextRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn utterances(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.input_text).collect()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<RuntimeReply, RuntimeError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BotRuntime for ScriptedRuntime {
    async fn post_text(&self, request: PostTextRequest) -> Result<RuntimeReply, RuntimeError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        self.lock_script()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
