use log::warn;
use nix::sched::{sched_getaffinity, CpuSet};
use nix::unistd::Pid;

/// CPU Topology Snapshot.
/// Identifies which logical CPUs exist and which of them this process may run on,
/// so a pinning plan can be sanity-checked before threads start landing on it.
pub struct SystemTopology {
    allowed: Vec<usize>,
}

impl SystemTopology {
    /// Detects the calling thread's allowed CPU set. Falls back to every
    /// online CPU when the mask cannot be read.
    pub fn new() -> Self {
        let allowed = match sched_getaffinity(Pid::from_raw(0)) {
            Ok(set) => (0..CpuSet::count())
                .filter(|&cpu| set.is_set(cpu).unwrap_or(false))
                .collect(),
            Err(errno) => {
                warn!("Failed to read the current affinity mask: {}. Assuming all online CPUs.", errno);
                (0..online_cores()).collect()
            }
        };

        Self { allowed }
    }

    /// IDs of the CPUs the calling thread is allowed to run on, ascending.
    pub fn allowed_cores(&self) -> &[usize] {
        &self.allowed
    }

    /// Whether `core_id` can be the target of an affinity call from this process.
    pub fn is_allowed(&self, core_id: usize) -> bool {
        self.allowed.binary_search(&core_id).is_ok()
    }
}

fn online_cores() -> usize {
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };

    if count <= 0 {
        warn!("Failed to detect core count via libc. Fallback to 1.");
        1
    } else {
        count as usize
    }
}

impl Default for SystemTopology {
    fn default() -> Self {
        Self::new()
    }
}
