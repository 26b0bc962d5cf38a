//! `LD_PRELOAD` entry point.
//!
//! Exports a `pthread_create` that the dynamic loader binds ahead of the one in
//! the system thread library. Configuration comes from `PIN_LIST`, `SKIP_MASK`
//! and `SILENT`; see `pinshim_core::config`.
//!
//! ```text
//! PIN_LIST=2,5,7 LD_PRELOAD=./libpinshim_preload.so ./my-threaded-program
//! ```

use libc::{c_int, c_void, pthread_attr_t, pthread_t};
use pinshim_core::{Interposer, LinuxHost, StartRoutine};

static INTERPOSER: Interposer<LinuxHost> = Interposer::new(LinuxHost::new());

/// Intercepts `pthread_create`: delegates to the real routine, then pins the
/// new thread according to the process-wide placement plan.
///
/// # Safety
///
/// All pointer parameters must be valid according to `pthread_create`'s contract.
#[no_mangle]
pub unsafe extern "C" fn pthread_create(
    thread: *mut pthread_t,
    attr: *const pthread_attr_t,
    start_routine: StartRoutine,
    arg: *mut c_void,
) -> c_int {
    INTERPOSER.create(thread, attr, start_routine, arg)
}
