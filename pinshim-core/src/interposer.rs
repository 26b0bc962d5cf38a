use std::ffi::{c_void, CStr};
use std::sync::OnceLock;
use crossbeam_utils::CachePadded;
use libc::{c_int, pthread_attr_t, pthread_t};
use log::{error, info, warn};
use parking_lot::Mutex;

use crate::config::{ConfigSnapshot, Settings, OPENMP_RUNTIME_SYMBOL, PIN_LIST_VAR};
use crate::error::ResolveError;
use crate::placement::{Placement, PlacementCursor};
use crate::resolver::{PthreadCreateFn, StartRoutine};
use pinshim_io::AffinityError;

/// The process the shim runs inside: environment, loader and affinity syscalls.
pub trait Host: Send + Sync {
    /// Value of environment variable `key`, `None` when unset.
    fn var(&self, key: &str) -> Option<String>;

    /// Whether `name` is visible in the global symbol scope of the process.
    fn has_global_symbol(&self, name: &CStr) -> bool;

    /// The real `pthread_create`.
    fn real_create(&self) -> Result<PthreadCreateFn, ResolveError>;

    fn pin_current_thread(&self, core: usize) -> Result<(), AffinityError>;

    /// Pins the thread behind `thread` to `core`.
    ///
    /// # Safety
    /// `thread` must be the handle of a live thread, such as one just written
    /// by a successful call to the real `pthread_create`.
    unsafe fn pin_thread(&self, thread: pthread_t, core: usize) -> Result<(), AffinityError>;

    /// Whether `core` is one the process may be scheduled on.
    fn core_available(&self, core: usize) -> bool;

    /// Installs the diagnostic sink. Called once, before any diagnostic is emitted.
    fn init_diagnostics(&self, silent: bool);
}

struct State {
    config: ConfigSnapshot,
    cursor: CachePadded<Mutex<PlacementCursor>>,
}

/// Drop-in replacement logic for `pthread_create`.
///
/// One instance lives in a `static` for the whole process. The configuration
/// snapshot is built on the first [`create`](Self::create) call; every later
/// call only touches the placement cursor.
pub struct Interposer<H> {
    host: H,
    state: OnceLock<State>,
}

impl<H> Interposer<H> {
    pub const fn new(host: H) -> Self {
        Self {
            host,
            state: OnceLock::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H: Host> Interposer<H> {
    /// The configuration snapshot, building it (and pinning the calling thread)
    /// if no call has done so yet.
    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.state().config
    }

    /// A copy of the current cursor, for inspection.
    pub fn cursor(&self) -> PlacementCursor {
        self.state().cursor.lock().clone()
    }

    /// Creates a thread through the real `pthread_create`, then pins it.
    ///
    /// Returns the real routine's status unchanged, or [`ResolveError::code`]
    /// when the real routine cannot be found. Pinning happens only after a
    /// successful creation and its failure never changes the status.
    ///
    /// # Safety
    /// All pointer parameters must be valid according to `pthread_create`'s contract.
    pub unsafe fn create(
        &self,
        thread: *mut pthread_t,
        attr: *const pthread_attr_t,
        start_routine: StartRoutine,
        arg: *mut c_void,
    ) -> c_int {
        let state = self.state();
        let call_index = state.cursor.lock().begin_call();

        let real_create = match self.host.real_create() {
            Ok(real_create) => real_create,
            Err(e) => {
                error!("{}", e);
                return e.code();
            }
        };

        let ret = real_create(thread, attr, start_routine, arg);
        if ret != 0 || !state.config.pinning_enabled() || thread.is_null() {
            return ret;
        }

        let tid = *thread;
        let placement = state
            .cursor
            .lock()
            .place(call_index, &state.config.plan, state.config.skip_mask);
        // SAFETY: `ret == 0`, so the real routine created `tid`.
        self.apply(tid, placement);

        ret
    }

    /// # Safety
    /// `tid` must come from a creation that just succeeded.
    unsafe fn apply(&self, tid: pthread_t, placement: Placement) {
        match placement {
            Placement::Passthrough => {}
            Placement::Skip => info!("threadid {} -> SKIP", tid),
            Placement::Pin { core, wrapped } => {
                if wrapped {
                    info!("Roundrobin placement triggered");
                }
                // SAFETY: `tid` was written by the real routine, which returned 0.
                match unsafe { self.host.pin_thread(tid, core) } {
                    Ok(()) => info!("threadid {} -> core {} - OK", tid, core),
                    Err(e) => warn!("threadid {} -> core {} - FAILED: {}", tid, core, e),
                }
            }
        }
    }

    fn state(&self) -> &State {
        self.state.get_or_init(|| self.bootstrap())
    }

    fn bootstrap(&self) -> State {
        let settings = Settings::from_lookup(|key| self.host.var(key));
        self.host.init_diagnostics(settings.silent);

        let pin_list_set = settings.plan.is_some();
        let config = ConfigSnapshot::build(settings, || self.host.has_global_symbol(OPENMP_RUNTIME_SYMBOL));

        match config.plan.first() {
            None if pin_list_set => {
                warn!("Environment variable {} holds no valid core id, threads will not be pinned", PIN_LIST_VAR)
            }
            None => warn!("Environment variable {} not set, threads will not be pinned", PIN_LIST_VAR),
            Some(main_core) => {
                // Checked before the main thread is pinned, which narrows its allowed set.
                for core in config.plan.cores().iter().filter(|&&core| !self.host.core_available(core)) {
                    warn!("Core {} is not available to this process, threads placed there will run unpinned", core);
                }

                match self.host.pin_current_thread(main_core) {
                    Ok(()) => info!("MAIN -> {}", main_core),
                    Err(e) => warn!("MAIN -> {} - FAILED: {}", main_core, e),
                }

                let pairs: Vec<String> = config
                    .plan
                    .cores()
                    .iter()
                    .enumerate()
                    .map(|(slot, core)| format!("{}->{}", slot, core))
                    .collect();
                info!("PIN_MASK: {}", pairs.join("  "));
                info!("SKIP MASK: 0x{:X}", config.skip_mask.bits());
            }
        }

        State {
            cursor: CachePadded::new(Mutex::new(PlacementCursor::new(config.overflow_threshold()))),
            config,
        }
    }
}
