//! Storage entities

mod bot;
mod job;
mod outbox;
mod subject;

pub use bot::*;
pub use job::*;
pub use outbox::*;
pub use subject::*;
