//! Business logic services.

pub mod attachments;
pub mod jobs;
pub mod storage;

pub use attachments::{AttachmentError, AttachmentService, AttachmentStore};
pub use jobs::JobService;
pub use storage::Storage;
