use std::ffi::{c_void, CStr};
use std::ptr::NonNull;
use std::sync::OnceLock;
use libc::pthread_t;
use log::debug;

use crate::diagnostics;
use crate::error::ResolveError;
use crate::interposer::Host;
use crate::resolver::{self, Loader, PthreadCreateFn, ResolvedSymbol, PTHREAD_CREATE};
use pinshim_io::{affinity, dl, AffinityError, DynamicLibrary, SystemTopology};

/// [`Loader`] backed by the system dynamic loader.
pub struct SystemLoader;

impl Loader for SystemLoader {
    type Library = DynamicLibrary;

    fn open(&self, path: &CStr) -> Result<DynamicLibrary, String> {
        DynamicLibrary::open(path).map_err(|e| e.to_string())
    }

    fn lookup(&self, library: &DynamicLibrary, symbol: &CStr) -> Result<NonNull<c_void>, String> {
        library.symbol(symbol).map_err(|e| e.to_string())
    }
}

/// The real process: environment variables, glibc's loader and Linux affinity calls.
///
/// The resolved `pthread_create` is cached for the process lifetime and its
/// library is never closed. Failed resolutions are not cached.
pub struct LinuxHost {
    resolved: OnceLock<ResolvedSymbol<DynamicLibrary>>,
    topology: OnceLock<SystemTopology>,
}

impl LinuxHost {
    pub const fn new() -> Self {
        Self {
            resolved: OnceLock::new(),
            topology: OnceLock::new(),
        }
    }

    fn topology(&self) -> &SystemTopology {
        self.topology.get_or_init(|| {
            let topology = SystemTopology::new();
            debug!("Allowed CPUs: {:?}", topology.allowed_cores());
            topology
        })
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for LinuxHost {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
    }

    fn has_global_symbol(&self, name: &CStr) -> bool {
        dl::global_symbol(name).is_some()
    }

    fn real_create(&self) -> Result<PthreadCreateFn, ResolveError> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved.function());
        }

        let candidates = resolver::default_candidates();
        // SAFETY: every candidate is a thread library exporting the POSIX pthread_create.
        let resolved = unsafe { resolver::resolve_first(&SystemLoader, candidates.as_slice(), PTHREAD_CREATE) }?;
        Ok(self.resolved.get_or_init(|| resolved).function())
    }

    fn pin_current_thread(&self, core: usize) -> Result<(), AffinityError> {
        affinity::pin_current_thread(core)
    }

    unsafe fn pin_thread(&self, thread: pthread_t, core: usize) -> Result<(), AffinityError> {
        // SAFETY: forwarded from the caller, `thread` is live.
        unsafe { affinity::pin_thread(thread, core) }
    }

    fn core_available(&self, core: usize) -> bool {
        self.topology().is_allowed(core)
    }

    fn init_diagnostics(&self, silent: bool) {
        diagnostics::init(silent);
    }
}
