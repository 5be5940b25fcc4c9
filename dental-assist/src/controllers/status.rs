use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::blank_as_none;
use crate::format::format_currency;
use crate::history::{HistoryLog, chat_history, reimbursement_history};
use crate::models::{
    ChatExchange, ReimbursementEntry, RequestRecord, RequestStatus, RequestType,
};
use crate::storage::LocalStorage;

const DESCRIPTION_PREVIEW_CHARS: usize = 50;

/// Filters for the request list. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFilter {
    pub search: Option<String>,
    #[serde(deserialize_with = "blank_as_none")]
    pub status: Option<RequestStatus>,
    #[serde(rename = "type", deserialize_with = "blank_as_none")]
    pub kind: Option<RequestType>,
}

impl RequestFilter {
    pub fn matches(&self, record: &RequestRecord) -> bool {
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            if !record.id.to_lowercase().contains(&term)
                && !record.description.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        self.status.is_none_or(|s| s == record.status) && self.kind.is_none_or(|k| k == record.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub total: usize,
    pub processing: usize,
    pub approved: usize,
    pub total_amount: f64,
    pub total_amount_label: String,
}

impl RequestSummary {
    pub fn from_records(records: &[RequestRecord]) -> Self {
        let count = |status: RequestStatus| records.iter().filter(|r| r.status == status).count();
        let total_amount: f64 = records.iter().map(|r| r.value).sum();
        Self {
            total: records.len(),
            processing: count(RequestStatus::Processing),
            approved: count(RequestStatus::Approved),
            total_amount,
            total_amount_label: format_currency(total_amount),
        }
    }
}

/// Ids come from the exchange alone so they survive history trimming.
fn pre_approval_record(exchange: &ChatExchange) -> RequestRecord {
    let preview: String = exchange.user.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    RequestRecord {
        id: format!("PRE{}", exchange.timestamp.timestamp_millis()),
        kind: RequestType::PreApproval,
        timestamp: exchange.timestamp,
        description: format!("Pré-aprovação: {preview}..."),
        status: exchange.pre_approval_status(),
        value: 0.0,
        details: serde_json::to_value(exchange).unwrap_or(Value::Null),
    }
}

fn reimbursement_record(entry: &ReimbursementEntry) -> RequestRecord {
    RequestRecord {
        id: entry.id.clone(),
        kind: RequestType::Reimbursement,
        timestamp: entry.timestamp,
        description: format!("Reembolso: {}", entry.form_data.procedure_description),
        status: entry.status,
        value: entry.form_data.parsed_value().unwrap_or(0.0),
        details: serde_json::to_value(entry).unwrap_or(Value::Null),
    }
}

/// Read-only view over both histories as a single request list.
pub struct StatusController {
    chat: HistoryLog<ChatExchange>,
    reimbursements: HistoryLog<ReimbursementEntry>,
}

impl StatusController {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            chat: chat_history(storage.clone()),
            reimbursements: reimbursement_history(storage),
        }
    }

    /// All requests, newest first.
    pub async fn requests(&self) -> Vec<RequestRecord> {
        let chat = self.chat.load().await;
        let reimbursements = self.reimbursements.load().await;

        let mut records: Vec<RequestRecord> = chat
            .iter()
            .map(pre_approval_record)
            .chain(reimbursements.iter().map(reimbursement_record))
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    pub async fn list(&self, filter: &RequestFilter) -> Vec<RequestRecord> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect()
    }

    /// Summary over every request, ignoring filters.
    pub async fn summary(&self) -> RequestSummary {
        RequestSummary::from_records(&self.requests().await)
    }
}
