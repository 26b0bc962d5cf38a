use thiserror::Error;

/// Status returned by the shim when no library in the candidate chain loads.
pub const LIBRARY_NOT_FOUND: libc::c_int = -1;

/// Status returned by the shim when the library loads but lacks the entry point.
pub const SYMBOL_NOT_FOUND: libc::c_int = -2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no thread library could be loaded (tried {tried})")]
    LibraryNotFound { tried: String },
    #[error("{symbol} not found in {library}: {reason}")]
    SymbolNotFound {
        symbol: String,
        library: String,
        reason: String,
    },
}

impl ResolveError {
    /// The negative status handed back to the caller of `pthread_create`.
    ///
    /// Kept outside the errno range a real `pthread_create` can return.
    pub fn code(&self) -> libc::c_int {
        match self {
            ResolveError::LibraryNotFound { .. } => LIBRARY_NOT_FOUND,
            ResolveError::SymbolNotFound { .. } => SYMBOL_NOT_FOUND,
        }
    }
}
