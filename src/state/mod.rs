//! State module for queue tasks and API credentials
//!
//! # Components
//!
//! - `Task` / `NewTask`: rows of the shared work queue
//! - `TaskKind`: the operations a task can request
//! - `CredentialPool`: round-robin rotation over API accounts

mod credentials;
mod task;

// Re-export main types
pub use credentials::{Credential, CredentialPool};
pub use task::{NewTask, Task, TaskKind};
