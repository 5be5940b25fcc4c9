pub mod controllers;
pub mod cpf;
pub mod debounce;
pub mod error;
pub mod format;
pub mod history;
pub mod lex;
pub mod models;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use controllers::{ChatController, ClinicsController, StatusController, UploadController};
pub use cpf::{format_cpf, is_valid_cpf};
pub use error::{AssistError, FieldError, Result, StorageError};
pub use lex::{
    AwsLexRuntime, BotConfig, BotReply, BotRuntime, ErrorInfo, LexChatbot, ResponseKind,
    ScriptedRuntime,
};
pub use models::{
    ChatExchange, Clinic, ReimbursementEntry, ReimbursementForm, RequestRecord, RequestStatus,
    RequestType, SessionAttributes,
};
pub use storage::{InMemoryKeyValueStore, JsonFileStore, KeyValueStore, LocalStorage};
