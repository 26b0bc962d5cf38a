use std::ffi::{c_void, CStr};
use std::ptr::NonNull;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DlError {
    #[error("dlopen failed: {0}")]
    Open(String),
    #[error("dlsym failed: {0}")]
    Symbol(String),
}

/// A shared object opened with `dlopen(RTLD_LAZY)`.
///
/// Never closed: symbols taken from it stay valid for the rest of the process.
#[derive(Debug)]
pub struct DynamicLibrary {
    handle: NonNull<c_void>,
}

// SAFETY: a dlopen handle is a process-global token; glibc's loader serializes
// every operation on it internally.
unsafe impl Send for DynamicLibrary {}
unsafe impl Sync for DynamicLibrary {}

impl DynamicLibrary {
    /// Opens `path`, searching the loader's usual paths when it contains no slash.
    pub fn open(path: &CStr) -> Result<Self, DlError> {
        clear_error();
        // SAFETY: `path` is a valid NUL-terminated string.
        let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_LAZY) };
        NonNull::new(handle)
            .map(|handle| Self { handle })
            .ok_or_else(|| DlError::Open(take_error().unwrap_or_else(|| "unknown error".into())))
    }

    /// Looks up `name` in this library and its dependencies.
    ///
    /// A symbol whose address is NULL is reported as missing.
    pub fn symbol(&self, name: &CStr) -> Result<NonNull<c_void>, DlError> {
        clear_error();
        // SAFETY: `handle` came from a successful dlopen and is never closed.
        let addr = unsafe { libc::dlsym(self.handle.as_ptr(), name.as_ptr()) };
        match (NonNull::new(addr), take_error()) {
            (_, Some(err)) => Err(DlError::Symbol(err)),
            (Some(addr), None) => Ok(addr),
            (None, None) => Err(DlError::Symbol(format!("{} resolves to NULL", name.to_string_lossy()))),
        }
    }
}

/// Looks `name` up in the global scope of the process (`RTLD_DEFAULT`).
pub fn global_symbol(name: &CStr) -> Option<NonNull<c_void>> {
    clear_error();
    // SAFETY: RTLD_DEFAULT is a valid pseudo-handle; `name` is NUL-terminated.
    let addr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) };
    match take_error() {
        Some(_) => None,
        None => NonNull::new(addr),
    }
}

fn clear_error() {
    // SAFETY: dlerror state is thread-local.
    unsafe {
        libc::dlerror();
    }
}

fn take_error() -> Option<String> {
    // SAFETY: the returned string is owned by the loader and valid until the
    // next dl* call on this thread; it is copied out immediately.
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned())
}
