use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::cpf::{digits_only, is_valid_cpf};
use crate::error::FieldError;
use crate::models::ReimbursementForm;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// A CEP is valid when it reduces to exactly eight digits.
pub fn is_valid_cep(cep: &str) -> bool {
    digits_only(cep).len() == 8
}

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Metadata of an uploaded document. Only these three properties are ever
/// inspected; the content is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileRules {
    pub max_size: u64,
    pub allowed_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
}

impl Default for FileRules {
    fn default() -> Self {
        Self {
            max_size: MAX_UPLOAD_BYTES,
            allowed_types: ["image/jpeg", "image/png", "application/pdf"]
                .map(String::from)
                .to_vec(),
            allowed_extensions: [".jpg", ".jpeg", ".png", ".pdf"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FileRejection {
    TooLarge { max_bytes: u64 },
    TypeNotAllowed { mime_type: String },
    ExtensionNotAllowed { extension: String },
}

impl std::fmt::Display for FileRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRejection::TooLarge { max_bytes } => {
                write!(f, "Arquivo muito grande. Máximo: {}MB", max_bytes / 1024 / 1024)
            }
            FileRejection::TypeNotAllowed { .. } => write!(f, "Tipo de arquivo não permitido"),
            FileRejection::ExtensionNotAllowed { .. } => {
                write!(f, "Extensão de arquivo não permitida")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidation {
    pub valid: bool,
    pub errors: Vec<FileRejection>,
}

/// Lower-cased extension including the leading dot. A name without a dot is
/// treated as if the whole name were the extension, so it never matches.
fn file_extension(name: &str) -> String {
    let last = name.rsplit('.').next().unwrap_or(name);
    format!(".{}", last.to_lowercase())
}

/// Check size, MIME type and extension independently; every failing check is
/// reported.
pub fn validate_file(file: &FileDescriptor, rules: &FileRules) -> FileValidation {
    let mut errors = Vec::new();

    if file.size > rules.max_size {
        errors.push(FileRejection::TooLarge {
            max_bytes: rules.max_size,
        });
    }

    if !rules.allowed_types.iter().any(|t| *t == file.mime_type) {
        errors.push(FileRejection::TypeNotAllowed {
            mime_type: file.mime_type.clone(),
        });
    }

    let extension = file_extension(&file.name);
    if !rules.allowed_extensions.contains(&extension) {
        errors.push(FileRejection::ExtensionNotAllowed { extension });
    }

    FileValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Field keys required before a reimbursement can be submitted.
pub const REQUIRED_REIMBURSEMENT_FIELDS: [&str; 9] = [
    "patientName",
    "patientCPF",
    "patientEmail",
    "patientPhone",
    "planTier",
    "procedureDate",
    "procedureValue",
    "procedureDescription",
    "clinicName",
];

const REQUIRED_MESSAGE: &str = "Este campo é obrigatório";

/// Field-level validation of the reimbursement form. An empty result means
/// the form may be submitted.
pub fn validate_reimbursement_form(form: &ReimbursementForm) -> Vec<FieldError> {
    let mut errors: Vec<FieldError> = REQUIRED_REIMBURSEMENT_FIELDS
        .iter()
        .filter(|key| form.field(key).is_none_or(|v| v.trim().is_empty()))
        .map(|key| FieldError::new(*key, REQUIRED_MESSAGE))
        .collect();

    if !form.patient_cpf.trim().is_empty() && !is_valid_cpf(&form.patient_cpf) {
        errors.push(FieldError::new("patientCPF", "CPF inválido"));
    }

    if !form.patient_email.trim().is_empty() && !is_valid_email(&form.patient_email) {
        errors.push(FieldError::new("patientEmail", "E-mail inválido"));
    }

    if !form.procedure_value.trim().is_empty() && form.parsed_value().is_none() {
        errors.push(FieldError::new("procedureValue", "Valor inválido"));
    }

    errors
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMask {
    Cpf,
    Cep,
    Phone,
}

static FIRST_THREE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3})(\d)").expect("valid mask regex"));
static CPF_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3})(\d{1,2})$").expect("valid mask regex"));
static CEP_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{5})(\d)").expect("valid mask regex"));
static PHONE_AREA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})(\d)").expect("valid mask regex"));

/// Progressive input mask applied while the user types. Over-long input is
/// returned as bare digits.
pub fn apply_input_mask(value: &str, mask: InputMask) -> String {
    let digits = digits_only(value);
    match mask {
        InputMask::Cpf if digits.len() <= 11 => {
            let step = FIRST_THREE.replacen(&digits, 1, "$1.$2");
            let step = FIRST_THREE.replacen(&step, 1, "$1.$2");
            CPF_TAIL.replacen(&step, 1, "$1-$2").into_owned()
        }
        InputMask::Cep if digits.len() <= 8 => CEP_HEAD.replacen(&digits, 1, "$1-$2").into_owned(),
        InputMask::Phone if digits.len() <= 11 => {
            let step = PHONE_AREA.replacen(&digits, 1, "($1) $2");
            CEP_HEAD.replacen(&step, 1, "$1-$2").into_owned()
        }
        _ => digits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, size: u64) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            mime_type: mime.to_string(),
            size,
        }
    }

    #[test]
    fn accepts_small_pdf() {
        let result = validate_file(&file("receipt.PDF", "application/pdf", 1024), &FileRules::default());
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn rejects_six_megabyte_file_for_size() {
        let result = validate_file(
            &file("scan.jpg", "image/jpeg", 6 * 1024 * 1024),
            &FileRules::default(),
        );
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![FileRejection::TooLarge {
                max_bytes: MAX_UPLOAD_BYTES
            }]
        );
        assert_eq!(result.errors[0].to_string(), "Arquivo muito grande. Máximo: 5MB");
    }

    #[test]
    fn spoofed_mime_still_fails_extension_check() {
        let result = validate_file(&file("notes.docx", "application/pdf", 10), &FileRules::default());
        assert_eq!(
            result.errors,
            vec![FileRejection::ExtensionNotAllowed {
                extension: ".docx".to_string()
            }]
        );
    }

    #[test]
    fn reports_type_and_extension_independently() {
        let result = validate_file(
            &file(
                "notes.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                10,
            ),
            &FileRules::default(),
        );
        assert_eq!(result.errors.len(), 2);
        assert!(matches!(result.errors[0], FileRejection::TypeNotAllowed { .. }));
        assert!(matches!(result.errors[1], FileRejection::ExtensionNotAllowed { .. }));
    }

    #[test]
    fn name_without_extension_is_rejected() {
        let result = validate_file(&file("README", "application/pdf", 10), &FileRules::default());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn email_and_cep() {
        assert!(is_valid_email("maria@example.com"));
        assert!(!is_valid_email("maria@example"));
        assert!(!is_valid_email("ma ria@example.com"));
        assert!(is_valid_cep("01415-001"));
        assert!(!is_valid_cep("01415-01"));
    }

    #[test]
    fn masks_progressively() {
        assert_eq!(apply_input_mask("529", InputMask::Cpf), "529");
        assert_eq!(apply_input_mask("5299", InputMask::Cpf), "529.9");
        assert_eq!(apply_input_mask("52998224725", InputMask::Cpf), "529.982.247-25");
        assert_eq!(apply_input_mask("01415001", InputMask::Cep), "01415-001");
        assert_eq!(apply_input_mask("11999998888", InputMask::Phone), "(11) 99999-8888");
        assert_eq!(apply_input_mask("123456789012", InputMask::Cpf), "123456789012");
    }

    #[test]
    fn form_reports_each_problem_on_its_field() {
        let form = ReimbursementForm {
            patient_name: "Maria".into(),
            patient_cpf: "123.456.789-00".into(),
            patient_email: "not-an-email".into(),
            ..Default::default()
        };
        let errors = validate_reimbursement_form(&form);

        assert!(errors.contains(&FieldError::new("patientCPF", "CPF inválido")));
        assert!(errors.contains(&FieldError::new("patientEmail", "E-mail inválido")));
        assert!(errors.contains(&FieldError::new("clinicName", REQUIRED_MESSAGE)));
        assert!(!errors.iter().any(|e| e.field == "patientName"));
    }
}
