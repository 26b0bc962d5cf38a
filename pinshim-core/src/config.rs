//! Environment-driven configuration, read once per process.

/// Comma-separated list of logical core IDs, in placement order.
pub const PIN_LIST_VAR: &str = "PIN_LIST";

/// Hexadecimal mask; bit `i` exempts the `i`-th `pthread_create` call from pinning.
pub const SKIP_MASK_VAR: &str = "SKIP_MASK";

/// Presence alone silences every diagnostic line.
pub const SILENT_VAR: &str = "SILENT";

/// Entry point exported by the Intel/LLVM OpenMP runtime. When it is visible in
/// the process and no mask is given, the runtime's first helper thread is skipped.
pub const OPENMP_RUNTIME_SYMBOL: &std::ffi::CStr = c"__kmpc_begin";

/// Skip mask applied when [`OPENMP_RUNTIME_SYMBOL`] is present.
pub const OPENMP_DEFAULT_MASK: u64 = 0x1;

/// Number of call indices a [`SkipMask`] can address.
pub const SKIP_MASK_BITS: u64 = u64::BITS as u64;

/// Ordered core IDs the created threads are distributed over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinningPlan(Vec<usize>);

impl PinningPlan {
    pub fn new(cores: Vec<usize>) -> Self {
        Self(cores)
    }

    /// Parses a comma-separated core list.
    ///
    /// Tokens are trimmed and empty tokens skipped. Parsing stops at the first
    /// token that is not a non-negative integer; the cores before it are kept.
    pub fn parse(list: &str) -> Self {
        let cores = list
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map_while(|token| token.parse::<usize>().ok())
            .collect();
        Self(cores)
    }

    pub fn cores(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The core the creating (main) thread is pinned to.
    pub fn first(&self) -> Option<usize> {
        self.0.first().copied()
    }
}

/// Set of call indices (0..64) that must not be pinned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipMask(u64);

impl SkipMask {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Parses a hexadecimal mask the way `strtoul(.., 16)` does: an optional
    /// `0x`/`0X` prefix, then the leading run of hex digits. No digits yields 0;
    /// values wider than 64 bits saturate.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_start();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        let end = digits
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(digits.len());
        let digits = &digits[..end];

        if digits.is_empty() {
            return Self(0);
        }
        Self(u64::from_str_radix(digits, 16).unwrap_or(u64::MAX))
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether the call with index `call_index` is exempt. Indices past 63 never are.
    pub fn skips(self, call_index: u64) -> bool {
        call_index < SKIP_MASK_BITS && self.0 & (1u64 << call_index) != 0
    }
}

/// Raw values read from the environment, before any defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// `None` when `PIN_LIST` is unset.
    pub plan: Option<PinningPlan>,
    /// `None` when `SKIP_MASK` is unset.
    pub skip_mask: Option<SkipMask>,
    pub silent: bool,
}

impl Settings {
    /// Reads the settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            plan: lookup(PIN_LIST_VAR).map(|list| PinningPlan::parse(&list)),
            skip_mask: lookup(SKIP_MASK_VAR).map(|mask| SkipMask::parse(&mask)),
            silent: lookup(SILENT_VAR).is_some(),
        }
    }
}

/// Immutable, process-wide configuration used by every placement decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub plan: PinningPlan,
    pub skip_mask: SkipMask,
    pub silent: bool,
}

impl ConfigSnapshot {
    /// Applies defaults to `settings`. `openmp_present` is only consulted when no
    /// skip mask was given.
    pub fn build<F>(settings: Settings, openmp_present: F) -> Self
    where
        F: FnOnce() -> bool,
    {
        let skip_mask = settings.skip_mask.unwrap_or_else(|| {
            if openmp_present() {
                SkipMask::new(OPENMP_DEFAULT_MASK)
            } else {
                SkipMask::default()
            }
        });

        Self {
            plan: settings.plan.unwrap_or_default(),
            skip_mask,
            silent: settings.silent,
        }
    }

    pub fn pinning_enabled(&self) -> bool {
        !self.plan.is_empty()
    }

    /// Plan index at which the first round-robin wraparound happens.
    pub fn overflow_threshold(&self) -> usize {
        self.plan.len().saturating_sub(1)
    }
}
