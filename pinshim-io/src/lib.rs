//! pinshim I/O: the platform layer underneath the `pthread_create` shim.
//!
//! This crate wraps the raw OS surfaces the shim needs: CPU affinity syscalls,
//! online CPU discovery and the dynamic loader (`dlopen`/`dlsym`).
//! It holds no policy; placement decisions live in `pinshim-core`.

pub mod platform;
pub mod dl;

// Re-exports for easier access by pinshim-core
pub use platform::affinity;
pub use platform::affinity::AffinityError;
pub use platform::topology::SystemTopology;
pub use dl::{DlError, DynamicLibrary};
