//! pinshim core: the placement logic behind the `pthread_create` shim.
//!
//! Every interposed call flows through [`Interposer::create`]: the process-wide
//! configuration snapshot is built once, the real routine is resolved and called,
//! and the placement cursor decides which core the new thread lands on.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod interposer;
pub mod placement;
pub mod resolver;

pub use config::{ConfigSnapshot, PinningPlan, Settings, SkipMask};
pub use error::ResolveError;
pub use host::LinuxHost;
pub use interposer::{Host, Interposer};
pub use placement::{Placement, PlacementCursor};
pub use resolver::{PthreadCreateFn, StartRoutine};
pub use pinshim_io::AffinityError;
