use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lex::BotReply;

/// Flat string-keyed context carried across conversational turns.
pub type SessionAttributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    PreApproval,
    Reimbursement,
}

impl RequestType {
    pub fn label(&self) -> &'static str {
        match self {
            RequestType::PreApproval => "Pré-Aprovação",
            RequestType::Reimbursement => "Reembolso",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Processing,
    Approved,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Processing => "Em processamento",
            RequestStatus::Approved => "Aprovado",
            RequestStatus::Rejected => "Rejeitado",
            RequestStatus::Completed => "Concluído",
        }
    }
}

/// A pre-approval or reimbursement as listed on the status page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RequestType,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub status: RequestStatus,
    pub value: f64,
    pub details: serde_json::Value,
}

/// One user message and the bot's answer, as kept in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub bot: String,
    #[serde(default)]
    pub session_attributes: SessionAttributes,
}

impl ChatExchange {
    /// Status of the pre-approval this exchange belongs to, read from the
    /// session attributes the bot returned with it.
    pub fn pre_approval_status(&self) -> RequestStatus {
        let attrs = &self.session_attributes;
        if attrs.get("analysisComplete").map(String::as_str) == Some("true") {
            if attrs.get("approvalStatus").map(String::as_str) == Some("approved") {
                RequestStatus::Approved
            } else {
                RequestStatus::Rejected
            }
        } else {
            RequestStatus::Processing
        }
    }
}

/// Reimbursement form as typed by the patient. Drafts may be partial, so
/// every field defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReimbursementForm {
    #[serde(rename = "patientName")]
    pub patient_name: String,
    #[serde(rename = "patientCPF")]
    pub patient_cpf: String,
    #[serde(rename = "patientEmail")]
    pub patient_email: String,
    #[serde(rename = "patientPhone")]
    pub patient_phone: String,
    #[serde(rename = "planTier")]
    pub plan_tier: String,
    #[serde(rename = "procedureDate")]
    pub procedure_date: String,
    #[serde(rename = "procedureValue")]
    pub procedure_value: String,
    #[serde(rename = "procedureDescription")]
    pub procedure_description: String,
    #[serde(rename = "clinicName")]
    pub clinic_name: String,
    #[serde(rename = "clinicCNPJ")]
    pub clinic_cnpj: String,
}

impl ReimbursementForm {
    /// Look a field up by its form key (`patientName`, `patientCPF`, ...).
    pub fn field(&self, key: &str) -> Option<&str> {
        let value = match key {
            "patientName" => &self.patient_name,
            "patientCPF" => &self.patient_cpf,
            "patientEmail" => &self.patient_email,
            "patientPhone" => &self.patient_phone,
            "planTier" => &self.plan_tier,
            "procedureDate" => &self.procedure_date,
            "procedureValue" => &self.procedure_value,
            "procedureDescription" => &self.procedure_description,
            "clinicName" => &self.clinic_name,
            "clinicCNPJ" => &self.clinic_cnpj,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Procedure value as a number; accepts `,` as the decimal separator.
    pub fn parsed_value(&self) -> Option<f64> {
        let normalized = self.procedure_value.trim().replace(',', ".");
        normalized
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub form_data: ReimbursementForm,
    pub file_name: Option<String>,
    pub bot_reply: Option<BotReply>,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: u32,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub rating: f32,
    pub specialties: Vec<String>,
    pub plans: Vec<String>,
    pub distance: String,
    pub opening_hours: String,
    pub about: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(attrs: &[(&str, &str)]) -> ChatExchange {
        ChatExchange {
            timestamp: Utc::now(),
            user: "dor de dente".into(),
            bot: "ok".into(),
            session_attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn pre_approval_status_follows_attributes() {
        assert_eq!(exchange(&[]).pre_approval_status(), RequestStatus::Processing);
        assert_eq!(
            exchange(&[("analysisComplete", "true"), ("approvalStatus", "approved")])
                .pre_approval_status(),
            RequestStatus::Approved
        );
        assert_eq!(
            exchange(&[("analysisComplete", "true"), ("approvalStatus", "pending")])
                .pre_approval_status(),
            RequestStatus::Rejected
        );
        assert_eq!(
            exchange(&[("analysisComplete", "false"), ("approvalStatus", "approved")])
                .pre_approval_status(),
            RequestStatus::Processing
        );
    }

    #[test]
    fn form_uses_camel_case_field_keys() {
        let form: ReimbursementForm =
            serde_json::from_str(r#"{"patientCPF":"52998224725","procedureValue":"150,50"}"#)
                .unwrap();
        assert_eq!(form.field("patientCPF"), Some("52998224725"));
        assert_eq!(form.parsed_value(), Some(150.5));
        assert_eq!(form.field("unknown"), None);
    }
}
