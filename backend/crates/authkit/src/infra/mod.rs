//! Infrastructure Layer
//!
//! Built-in storage backend, backend registry and the stub mail transport.

pub mod memory;
pub mod registry;
pub mod stub_mail;

pub use memory::{MEMORY_BACKEND, MemoryStore};
pub use registry::{BackendConstructor, BackendRegistry};
pub use stub_mail::StubTransport;
