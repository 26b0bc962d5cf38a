use std::ffi::{c_void, CStr, CString};
use std::mem;
use std::ptr::NonNull;
use libc::{c_int, pthread_attr_t, pthread_t};
use log::debug;

use crate::error::ResolveError;

/// Start routine accepted by `pthread_create`.
pub type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;

/// Signature of the real `pthread_create`.
pub type PthreadCreateFn = unsafe extern "C" fn(
    *mut pthread_t,
    *const pthread_attr_t,
    StartRoutine,
    *mut c_void,
) -> c_int;

pub const PTHREAD_CREATE: &CStr = c"pthread_create";

/// Library locations searched after the build-time override, in order.
pub const FALLBACK_LIBRARIES: &[&str] = &[
    "/lib64/tls/libpthread.so.0",
    "libpthread.so.0",
    // glibc >= 2.34 ships pthread_create in libc proper.
    "libc.so.6",
];

/// Candidate libraries for the real `pthread_create`: the path given in
/// `PINSHIM_LIBPTHREAD` at build time (if any), then [`FALLBACK_LIBRARIES`].
pub fn default_candidates() -> Vec<CString> {
    option_env!("PINSHIM_LIBPTHREAD")
        .into_iter()
        .chain(FALLBACK_LIBRARIES.iter().copied())
        .filter_map(|path| CString::new(path).ok())
        .collect()
}

/// Something that can open shared objects and look symbols up in them.
pub trait Loader {
    type Library;

    fn open(&self, path: &CStr) -> Result<Self::Library, String>;

    fn lookup(&self, library: &Self::Library, symbol: &CStr) -> Result<NonNull<c_void>, String>;
}

/// The real `pthread_create` together with the library it was taken from.
///
/// Holding the library keeps the handle open for as long as the function
/// pointer is reachable.
#[derive(Debug)]
pub struct ResolvedSymbol<L> {
    _library: L,
    function: PthreadCreateFn,
}

impl<L> ResolvedSymbol<L> {
    pub fn function(&self) -> PthreadCreateFn {
        self.function
    }
}

/// Opens the first loadable library in `candidates` and resolves `symbol` from it.
///
/// The symbol is looked up only in the first library that opens; a missing
/// symbol there is final and later candidates are not tried.
///
/// # Safety
/// `symbol` must name a function with the [`PthreadCreateFn`] signature in
/// whatever library `loader` opens.
pub unsafe fn resolve_first<L, P>(
    loader: &L,
    candidates: &[P],
    symbol: &CStr,
) -> Result<ResolvedSymbol<L::Library>, ResolveError>
where
    L: Loader,
    P: AsRef<CStr>,
{
    let mut failures = Vec::with_capacity(candidates.len());
    let (path, library) = candidates
        .iter()
        .map(|candidate| -> &CStr { candidate.as_ref() })
        .find_map(|path| match loader.open(path) {
            Ok(library) => Some((path, library)),
            Err(reason) => {
                failures.push(format!("{} ({})", path.to_string_lossy(), reason));
                None
            }
        })
        .ok_or_else(|| ResolveError::LibraryNotFound {
            tried: if failures.is_empty() {
                "no candidates".to_string()
            } else {
                failures.join(", ")
            },
        })?;

    let address = loader
        .lookup(&library, symbol)
        .map_err(|reason| ResolveError::SymbolNotFound {
            symbol: symbol.to_string_lossy().into_owned(),
            library: path.to_string_lossy().into_owned(),
            reason,
        })?;

    debug!(
        "Resolved {} from {}",
        symbol.to_string_lossy(),
        path.to_string_lossy()
    );

    // SAFETY: the caller guarantees the symbol has the PthreadCreateFn ABI;
    // data and function pointers share a representation on every dlsym target.
    let function = mem::transmute::<*mut c_void, PthreadCreateFn>(address.as_ptr());

    Ok(ResolvedSymbol {
        _library: library,
        function,
    })
}
