//! Repository contracts and in-memory implementations

mod bot_repo;
mod job_repo;
mod outbox_repo;
mod subject_repo;

mod memory_bot_repo;
mod memory_job_repo;
mod memory_outbox_repo;
mod memory_subject_repo;

pub use bot_repo::*;
pub use job_repo::*;
pub use outbox_repo::*;
pub use subject_repo::*;

pub use memory_bot_repo::*;
pub use memory_job_repo::*;
pub use memory_outbox_repo::*;
pub use memory_subject_repo::*;
