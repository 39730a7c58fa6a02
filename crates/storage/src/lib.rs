//! Durable storage adaptor: one method per
//! entity family the core writes, a reference `sqlx` implementation and an
//! in-memory one for tests, and a bounded writer queue that keeps storage
//! off the collector's critical path.

mod adaptor;
mod error;
mod memory;
mod sqlx_adaptor;
mod types;
mod writer;

pub use adaptor::StorageAdaptor;
pub use error::StorageError;
pub use memory::MemoryAdaptor;
pub use sqlx_adaptor::SqlxAdaptor;
pub use types::{AgentAction, AgentActionStatus, AgentResponse, Server, ServerStatus};
pub use writer::{spawn_writer, spawn_writer_with_capacity, StorageWriter, WriteJob};
