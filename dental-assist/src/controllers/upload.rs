use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AssistError, FieldError, Result};
use crate::format::{format_currency, format_date};
use crate::history::{HistoryLog, reimbursement_history};
use crate::lex::{BotReply, LexChatbot};
use crate::models::{ReimbursementEntry, ReimbursementForm, RequestStatus};
use crate::storage::{LocalStorage, keys};
use crate::validation::{
    FileDescriptor, FileRules, FileValidation, validate_file, validate_reimbursement_form,
};

/// What the patient sees after a reimbursement is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementConfirmation {
    pub id: String,
    pub date: String,
    pub value: String,
    pub reply: BotReply,
}

/// `IAM` followed by the last eight digits of the epoch-millis clock.
pub fn new_request_id(now: &DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(8)..];
    format!("IAM{tail}")
}

/// Utterance the bot expects for a reimbursement request.
pub fn build_reimbursement_message(form: &ReimbursementForm, file_name: &str) -> String {
    format!(
        "REEMBOLSO: {} | CPF: {} | Plano: {} | Valor: R$ {} | Procedimento: {} | Consultório: {} | Arquivo: {}",
        form.patient_name,
        form.patient_cpf,
        form.plan_tier,
        form.procedure_value,
        form.procedure_description,
        form.clinic_name,
        file_name,
    )
}

pub struct UploadController {
    bot: Arc<LexChatbot>,
    storage: LocalStorage,
    history: HistoryLog<ReimbursementEntry>,
    rules: FileRules,
}

impl UploadController {
    pub fn new(bot: Arc<LexChatbot>, storage: LocalStorage) -> Self {
        Self {
            bot,
            history: reimbursement_history(storage.clone()),
            storage,
            rules: FileRules::default(),
        }
    }

    /// Validate the form and keep it as the draft when it passes.
    pub async fn validate_form(&self, form: &ReimbursementForm) -> Result<()> {
        let errors = validate_reimbursement_form(form);
        if !errors.is_empty() {
            return Err(AssistError::Validation(errors));
        }
        self.save_draft(form).await;
        Ok(())
    }

    pub async fn save_draft(&self, form: &ReimbursementForm) -> bool {
        self.storage.set(keys::REIMBURSEMENT_FORM_DATA, form).await
    }

    pub async fn load_draft(&self) -> ReimbursementForm {
        self.storage
            .get_or_default(keys::REIMBURSEMENT_FORM_DATA)
            .await
    }

    pub async fn clear_draft(&self) -> bool {
        self.storage.remove(keys::REIMBURSEMENT_FORM_DATA).await
    }

    pub fn validate_file(&self, file: &FileDescriptor) -> FileValidation {
        validate_file(file, &self.rules)
    }

    pub async fn history(&self) -> Vec<ReimbursementEntry> {
        self.history.load().await
    }

    /// Send the reimbursement to the bot and record it as `processing`.
    ///
    /// Form and file problems are reported together as field errors and
    /// nothing is sent. The draft is cleared only after the bot accepted the
    /// request.
    pub async fn submit(
        &self,
        form: &ReimbursementForm,
        file: &FileDescriptor,
    ) -> Result<ReimbursementConfirmation> {
        let mut errors = validate_reimbursement_form(form);
        errors.extend(
            self.validate_file(file)
                .errors
                .iter()
                .map(|rejection| FieldError::new("file", rejection.to_string())),
        );
        if !errors.is_empty() {
            warn!(errors = errors.len(), "Reimbursement rejected by validation");
            return Err(AssistError::Validation(errors));
        }

        let message = build_reimbursement_message(form, &file.name);
        let reply = self.bot.send_message(&message).await.map_err(AssistError::Bot)?;

        let now = Utc::now();
        let id = new_request_id(&now);
        self.history
            .record(ReimbursementEntry {
                id: id.clone(),
                timestamp: now,
                form_data: form.clone(),
                file_name: Some(file.name.clone()),
                bot_reply: Some(reply.clone()),
                status: RequestStatus::Processing,
            })
            .await;
        self.clear_draft().await;

        info!(request_id = %id, "Reimbursement submitted");

        Ok(ReimbursementConfirmation {
            id,
            date: format_date(&now),
            value: format_currency(form.parsed_value().unwrap_or(0.0)),
            reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::REIMBURSEMENT_HISTORY_LIMIT;
    use crate::lex::{BotConfig, ScriptedRuntime};
    use chrono::TimeZone;

    fn form() -> ReimbursementForm {
        ReimbursementForm {
            patient_name: "Maria Silva".into(),
            patient_cpf: "529.982.247-25".into(),
            patient_email: "maria@example.com".into(),
            patient_phone: "(11) 98888-7777".into(),
            plan_tier: "premium".into(),
            procedure_date: "2024-03-10".into(),
            procedure_value: "1234,5".into(),
            procedure_description: "Limpeza".into(),
            clinic_name: "Dental Care Center".into(),
            clinic_cnpj: String::new(),
        }
    }

    fn receipt() -> FileDescriptor {
        FileDescriptor {
            name: "recibo.pdf".into(),
            mime_type: "application/pdf".into(),
            size: 200 * 1024,
        }
    }

    async fn controller(runtime: Arc<ScriptedRuntime>) -> UploadController {
        let storage = LocalStorage::in_memory();
        let bot = LexChatbot::connect(BotConfig::default(), storage.clone(), runtime).await;
        UploadController::new(Arc::new(bot), storage)
    }

    #[test]
    fn request_id_uses_last_eight_millis_digits() {
        let now = Utc.timestamp_millis_opt(1_710_000_123_456).unwrap();
        assert_eq!(new_request_id(&now), "IAM00123456");
    }

    #[test]
    fn message_lists_every_field() {
        assert_eq!(
            build_reimbursement_message(&form(), "recibo.pdf"),
            "REEMBOLSO: Maria Silva | CPF: 529.982.247-25 | Plano: premium | Valor: R$ 1234,5 | \
             Procedimento: Limpeza | Consultório: Dental Care Center | Arquivo: recibo.pdf"
        );
    }

    #[tokio::test]
    async fn valid_form_is_saved_as_draft() {
        let upload = controller(Arc::new(ScriptedRuntime::new())).await;
        upload.validate_form(&form()).await.unwrap();
        assert_eq!(upload.load_draft().await, form());

        assert!(upload.clear_draft().await);
        assert_eq!(upload.load_draft().await, ReimbursementForm::default());
    }

    #[tokio::test]
    async fn invalid_form_is_not_saved() {
        let upload = controller(Arc::new(ScriptedRuntime::new())).await;
        let mut bad = form();
        bad.patient_cpf = "111.111.111-11".into();

        let err = upload.validate_form(&bad).await.unwrap_err();
        let AssistError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors, vec![FieldError::new("patientCPF", "CPF inválido")]);
        assert_eq!(upload.load_draft().await, ReimbursementForm::default());
    }

    #[tokio::test]
    async fn submit_records_entry_and_clears_draft() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let upload = controller(runtime.clone()).await;
        upload.save_draft(&form()).await;

        let confirmation = upload.submit(&form(), &receipt()).await.unwrap();
        assert!(confirmation.id.starts_with("IAM"));
        assert_eq!(confirmation.id.len(), 11);
        assert_eq!(confirmation.value, "R$ 1.234,50");
        assert!(runtime.utterances()[0].starts_with("REEMBOLSO: Maria Silva"));

        let history = upload.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, confirmation.id);
        assert_eq!(history[0].status, RequestStatus::Processing);
        assert_eq!(upload.load_draft().await, ReimbursementForm::default());
    }

    #[tokio::test]
    async fn submit_reports_file_and_form_errors_together() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let upload = controller(runtime.clone()).await;
        let mut bad = form();
        bad.patient_email = "maria".into();
        let file = FileDescriptor {
            name: "recibo.exe".into(),
            mime_type: "application/octet-stream".into(),
            size: 10,
        };

        let AssistError::Validation(errors) = upload.submit(&bad, &file).await.unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.iter().filter(|e| e.field == "file").count(), 2);
        assert!(runtime.utterances().is_empty());
    }

    #[tokio::test]
    async fn reimbursement_history_is_newest_first_and_capped() {
        let upload = controller(Arc::new(ScriptedRuntime::new())).await;
        for i in 0..REIMBURSEMENT_HISTORY_LIMIT + 2 {
            let mut f = form();
            f.procedure_description = format!("Procedimento {i}");
            upload.submit(&f, &receipt()).await.unwrap();
        }

        let history = upload.history().await;
        assert_eq!(history.len(), REIMBURSEMENT_HISTORY_LIMIT);
        assert_eq!(history[0].form_data.procedure_description, "Procedimento 11");
        assert_eq!(
            history[REIMBURSEMENT_HISTORY_LIMIT - 1].form_data.procedure_description,
            "Procedimento 2"
        );
    }
}
