// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Realtime helpers for the dispatch loops.
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::config::RealtimeConfig;
use crate::exception::{MotionException, MotionResult};

/// Determines whether the current OS kernel is a realtime kernel.
///
/// On Linux, this checks for the existence of `/sys/kernel/realtime`.
pub fn has_realtime_kernel() -> bool {
    Path::new("/sys/kernel/realtime").exists()
}

/// Locked once per process, the lock covers all later allocations.
static MEMORY_LOCKED: AtomicBool = AtomicBool::new(false);

fn realtime_error(action: &str, error: io::Error) -> MotionException {
    MotionException::RealTimeException {
        message: format!("arm-motion-rs: unable to {}: {}", action, error),
    }
}

/// Switches the calling thread to FIFO scheduling one step below the highest priority.
///
/// # Errors
/// * RealTimeException if the priority cannot be set, usually because the user lacks the
/// `rtprio` limit. /etc/security/limits.conf needs a line like this:
/// ```text
///robot            -       rtprio          99
/// ```
pub fn raise_thread_priority() -> MotionResult<()> {
    // SAFETY: plain libc calls on the current thread with a valid sched_param
    let max_priority = unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) };
    if max_priority == -1 {
        return Err(realtime_error(
            "query the maximum thread priority",
            io::Error::last_os_error(),
        ));
    }
    let param = libc::sched_param {
        sched_priority: max_priority - 1,
    };
    let code =
        unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if code != 0 {
        return Err(realtime_error(
            "set realtime scheduling",
            io::Error::from_raw_os_error(code),
        ));
    }
    Ok(())
}

/// Locks current and future pages of the process in memory. Only the first successful call
/// does any work.
///
/// # Errors
/// * RealTimeException if the memory cannot be locked.
pub fn lock_process_memory() -> MotionResult<()> {
    if MEMORY_LOCKED.load(Ordering::Acquire) {
        return Ok(());
    }
    // SAFETY: mlockall has no memory safety preconditions
    if unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } != 0 {
        return Err(realtime_error("lock memory", io::Error::last_os_error()));
    }
    MEMORY_LOCKED.store(true, Ordering::Release);
    debug!("process memory locked");
    Ok(())
}

/// Prepares the calling thread for a dispatch loop if `config` is
/// [`Enforce`](`RealtimeConfig::Enforce`): raises its priority and locks the process memory.
/// # Errors
/// * RealTimeException if realtime mode is enforced but the kernel has no realtime capabilities,
/// the priority cannot be raised or the memory cannot be locked.
pub fn apply_realtime_config(config: RealtimeConfig) -> MotionResult<()> {
    match config {
        RealtimeConfig::Ignore => Ok(()),
        RealtimeConfig::Enforce => {
            if !has_realtime_kernel() {
                return Err(MotionException::RealTimeException {
                    message: "arm-motion-rs: Running kernel does not have realtime capabilities."
                        .to_string(),
                });
            }
            raise_thread_priority()?;
            lock_process_memory()
        }
    }
}
