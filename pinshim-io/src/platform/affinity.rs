use std::io;
use std::mem;
use log::debug;
use nix::sched::CpuSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AffinityError {
    #[error("core {core} does not fit in the affinity mask ({capacity} CPUs max)")]
    CoreOutOfRange { core: usize, capacity: usize },
    #[error("affinity call rejected core {core}: {source}")]
    Os {
        core: usize,
        #[source]
        source: io::Error,
    },
}

/// Number of CPUs a `cpu_set_t` can describe on this platform.
#[inline]
pub fn mask_capacity() -> usize {
    CpuSet::count()
}

fn check_core(core_id: usize) -> Result<(), AffinityError> {
    let capacity = mask_capacity();
    if core_id >= capacity {
        return Err(AffinityError::CoreOutOfRange { core: core_id, capacity });
    }
    Ok(())
}

/// Builds a `cpu_set_t` with only `core_id` set.
fn single_core_mask(core_id: usize) -> Result<libc::cpu_set_t, AffinityError> {
    check_core(core_id)?;

    let mut cpu_set: libc::cpu_set_t = unsafe { mem::zeroed() };
    // SAFETY: `core_id` was checked against the mask capacity, so CPU_SET stays in bounds.
    unsafe {
        libc::CPU_ZERO(&mut cpu_set);
        libc::CPU_SET(core_id, &mut cpu_set);
    }
    Ok(cpu_set)
}

/// Pins the calling thread to a single logical CPU.
///
/// # Logic
/// Hands a one-bit mask to `sched_setaffinity` with pid 0, which on Linux
/// addresses the calling thread only (not the whole process).
///
/// # Errors
/// `CoreOutOfRange` if the id cannot be represented in a `cpu_set_t`,
/// `Os` if the kernel rejects the mask (e.g. the core is offline or outside
/// the cgroup's cpuset).
pub fn pin_current_thread(core_id: usize) -> Result<(), AffinityError> {
    let cpu_set = single_core_mask(core_id)?;

    // SAFETY:
    // - pid 0 refers to the calling thread.
    // - `cpu_set` is stack-allocated and valid; `size_of::<cpu_set_t>()` matches it.
    let ret = unsafe {
        libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &cpu_set)
    };

    if ret != 0 {
        return Err(AffinityError::Os {
            core: core_id,
            source: io::Error::last_os_error(),
        });
    }

    debug!("Calling thread pinned to core {}", core_id);
    Ok(())
}

/// Pins an arbitrary thread, addressed by its pthread handle, to a single logical CPU.
///
/// # Safety
/// `thread` must refer to a live thread: created and not yet joined, nor
/// detached and exited. glibc dereferences the handle, so a stale or made-up
/// value is undefined behaviour. The shim only calls this right after a
/// successful `pthread_create`.
///
/// # Errors
/// Same taxonomy as [`pin_current_thread`]. `pthread_setaffinity_np` returns
/// the error number directly instead of setting `errno`.
pub unsafe fn pin_thread(thread: libc::pthread_t, core_id: usize) -> Result<(), AffinityError> {
    let cpu_set = single_core_mask(core_id)?;

    // SAFETY: the caller guarantees `thread` is live; the mask is valid for the call.
    let ret = libc::pthread_setaffinity_np(thread, mem::size_of::<libc::cpu_set_t>(), &cpu_set);

    if ret != 0 {
        return Err(AffinityError::Os {
            core: core_id,
            source: io::Error::from_raw_os_error(ret),
        });
    }

    debug!("Thread {} pinned to core {}", thread, core_id);
    Ok(())
}
