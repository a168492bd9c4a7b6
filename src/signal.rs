//! Forwarding of terminal interrupt and suspend signals to the foreground job.
//!
//! The shell only ever tracks the child it is currently blocked waiting on.
//! The handlers installed by [`install`] read that pid with a single atomic
//! load and forward the signal with `kill`; they touch no other state.

use log::debug;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, kill, sigaction};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicI32, Ordering};

/// Signals relayed to the foreground job instead of acting on the shell.
pub const RELAYED_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTSTP];

/// Pid of the foreground job, or 0 while idle.
static FOREGROUND: AtomicI32 = AtomicI32::new(0);

extern "C" fn relay(signum: libc::c_int) {
    let pid = FOREGROUND.load(Ordering::SeqCst);
    if pid <= 0 {
        return;
    }
    if let Ok(signal) = Signal::try_from(signum) {
        let _ = kill(Pid::from_raw(pid), signal);
    }
}

/// Install the relay handlers for SIGINT and SIGTSTP.
///
/// From then on the shell survives both signals; while a job is in the
/// foreground it receives them instead.
pub fn install() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(relay),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in RELAYED_SIGNALS {
        // SAFETY: `relay` only performs an atomic load and `kill`, both async-signal-safe.
        unsafe { sigaction(signal, &action) }?;
    }
    debug!("signal relay installed for {:?}", RELAYED_SIGNALS);
    Ok(())
}

/// The job signals are currently forwarded to, if any.
pub fn foreground() -> Option<Pid> {
    match FOREGROUND.load(Ordering::SeqCst) {
        pid if pid > 0 => Some(Pid::from_raw(pid)),
        _ => None,
    }
}

/// Marks a child as the foreground job for as long as the guard lives.
///
/// Dropping the guard returns the relay to idle, whatever the outcome of the
/// wait it was protecting.
#[derive(Debug)]
pub struct ForegroundJob {
    pid: Pid,
}

impl ForegroundJob {
    pub fn activate(pid: Pid) -> Self {
        FOREGROUND.store(pid.as_raw(), Ordering::SeqCst);
        Self { pid }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl Drop for ForegroundJob {
    fn drop(&mut self) {
        FOREGROUND.store(0, Ordering::SeqCst);
    }
}

/// Serializes tests that fork children or use the foreground slot.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
