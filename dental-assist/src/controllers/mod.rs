//! Page controllers. Each one receives the bot client and the local store at
//! construction time and holds no other global state.

pub mod chat;
pub mod clinics;
mod query;
pub mod status;
pub mod upload;

pub use chat::{AnalysisResults, ChatController, ChatOutcome, MAX_MESSAGE_CHARS};
pub use clinics::{ClinicFilter, ClinicsController, partner_clinics, specialty_name};
pub use status::{RequestFilter, RequestSummary, StatusController};
pub use upload::{
    ReimbursementConfirmation, UploadController, build_reimbursement_message, new_request_id,
};
