//! talkgen-launcher library
//!
//! Starts the execution engine as a child process, waits for its health
//! endpoint and stops it again on shutdown.

pub mod output;
pub mod supervisor;

pub use supervisor::{cleanup, EngineHandle, EngineState, ProcessSupervisor, SupervisorError};
