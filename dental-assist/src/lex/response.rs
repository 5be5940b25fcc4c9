use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SessionAttributes;

/// Reply exactly as the bot runtime returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeReply {
    pub message: Option<String>,
    pub dialog_state: Option<String>,
    pub intent_name: Option<String>,
    #[serde(default)]
    pub slots: SessionAttributes,
    pub session_attributes: Option<SessionAttributes>,
    pub slot_to_elicit: Option<String>,
}

/// Classification of a bot turn, derived from the runtime's dialog state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    ElicitIntent,
    ElicitSlot,
    ConfirmIntent,
    Fulfilled,
    Failed,
    Unknown,
}

impl ResponseKind {
    pub fn from_dialog_state(state: Option<&str>) -> Self {
        match state {
            Some("ElicitIntent") => ResponseKind::ElicitIntent,
            Some("ElicitSlot") => ResponseKind::ElicitSlot,
            Some("ConfirmIntent") => ResponseKind::ConfirmIntent,
            Some("Fulfilled") => ResponseKind::Fulfilled,
            Some("Failed") => ResponseKind::Failed,
            _ => ResponseKind::Unknown,
        }
    }

    pub fn requires_user_input(&self) -> bool {
        !self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ResponseKind::Fulfilled | ResponseKind::Failed)
    }
}

/// Normalized bot reply handed to the controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotReply {
    pub message: String,
    pub dialog_state: Option<String>,
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub requires_user_input: bool,
    pub is_complete: bool,
    pub intent_name: Option<String>,
    pub slots: SessionAttributes,
    pub session_attributes: SessionAttributes,
    pub slot_to_elicit: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BotReply {
    /// Build the normalized reply. `session_attributes` is the client's map
    /// after merging this turn's attributes into it.
    pub fn normalize(raw: RuntimeReply, session_attributes: SessionAttributes) -> Self {
        let kind = ResponseKind::from_dialog_state(raw.dialog_state.as_deref());
        let slot_to_elicit = match kind {
            ResponseKind::ElicitSlot => raw.slot_to_elicit,
            _ => None,
        };

        Self {
            message: raw.message.unwrap_or_default(),
            dialog_state: raw.dialog_state,
            kind,
            requires_user_input: kind.requires_user_input(),
            is_complete: kind.is_complete(),
            intent_name: raw.intent_name,
            slots: raw.slots,
            session_attributes,
            slot_to_elicit,
            timestamp: Utc::now(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.session_attributes.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(state: Option<&str>) -> RuntimeReply {
        RuntimeReply {
            message: Some("Qual o seu plano?".into()),
            dialog_state: state.map(String::from),
            slot_to_elicit: Some("PlanTier".into()),
            ..Default::default()
        }
    }

    #[test]
    fn classification_table() {
        let cases = [
            (Some("ElicitIntent"), ResponseKind::ElicitIntent, true, false),
            (Some("ElicitSlot"), ResponseKind::ElicitSlot, true, false),
            (Some("ConfirmIntent"), ResponseKind::ConfirmIntent, true, false),
            (Some("Fulfilled"), ResponseKind::Fulfilled, false, true),
            (Some("Failed"), ResponseKind::Failed, false, true),
            (Some("ReadyForFulfillment"), ResponseKind::Unknown, true, false),
            (None, ResponseKind::Unknown, true, false),
        ];

        for (state, kind, needs_input, complete) in cases {
            let reply = BotReply::normalize(raw(state), SessionAttributes::new());
            assert_eq!(reply.kind, kind, "{state:?}");
            assert_eq!(reply.requires_user_input, needs_input, "{state:?}");
            assert_eq!(reply.is_complete, complete, "{state:?}");
        }
    }

    #[test]
    fn slot_to_elicit_only_for_elicit_slot() {
        let reply = BotReply::normalize(raw(Some("ElicitSlot")), SessionAttributes::new());
        assert_eq!(reply.slot_to_elicit.as_deref(), Some("PlanTier"));

        let reply = BotReply::normalize(raw(Some("ConfirmIntent")), SessionAttributes::new());
        assert_eq!(reply.slot_to_elicit, None);
    }

    #[test]
    fn serializes_with_wire_names() {
        let reply = BotReply::normalize(raw(Some("Fulfilled")), SessionAttributes::new());
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "fulfilled");
        assert_eq!(json["requiresUserInput"], false);
        assert_eq!(json["dialogState"], "Fulfilled");
    }
}
