//! High-level store facade.

mod event_store;

pub use event_store::{
    AppendOptions, CreateSessionOptions, CreateSessionResult, EventStore, ForkOptions, ForkResult,
};
