//! One-way mirroring of the project into the sandbox runtime and the
//! persistence backend.
//!
//! ```text
//! Workspace (tree + buffers)
//!     ↓ SyncAdapter
//! ┌──────────────────────────────┬──────────────────────────┐
//! │ SessionRegistry              │ PersistenceGateway       │
//! │  → SandboxRuntime            │  load(id) / save(id, t)  │
//! │    write_file / mkdir        │                          │
//! └──────────────────────────────┴──────────────────────────┘
//! ```

mod adapter;
mod gateway;
mod local;
mod sandbox;
mod session;

#[cfg(test)]
pub mod testing;

pub use adapter::{persistence_error, sandbox_error, SyncAdapter, SyncReport};
pub use gateway::{
    GatewayError, GatewayResult, JsonFileGateway, MemoryGateway, PersistenceGateway,
    StoredPlayground,
};
pub use local::{LocalDirBooter, LocalDirSandbox};
pub use sandbox::{
    ReadyNotifier, SandboxBooter, SandboxError, SandboxResult, SandboxRuntime,
};
pub use session::SessionRegistry;
