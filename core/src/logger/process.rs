use std::time::{Duration, SystemTime};

/// Reports whether a process with the given pid appears to be running.
/// Deliberately conservative: inspection failures (e.g. permission errors)
/// count as running so a live process's log is never reclaimed.
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    let ret = unsafe { libc::kill(pid as i32, 0) };
    if ret == 0 {
        return true;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(code) if code == libc::ESRCH => false,
        // EPERM and anything unexpected: assume it's running.
        _ => true,
    }
}

#[cfg(not(unix))]
pub fn is_process_running(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, System};
    if pid == 0 {
        return false;
    }
    let mut sys = System::new();
    let pid = Pid::from_u32(pid);
    sys.refresh_process_specifics(pid, ProcessRefreshKind::new());
    sys.process(pid).is_some()
}

/// Returns the start time of a process, or `None` when it cannot be
/// determined.
pub fn process_start_time(pid: u32) -> Option<SystemTime> {
    use sysinfo::{Pid, ProcessRefreshKind, System};
    if pid == 0 {
        return None;
    }
    let mut sys = System::new();
    let pid = Pid::from_u32(pid);
    sys.refresh_process_specifics(pid, ProcessRefreshKind::new());
    let secs = sys.process(pid)?.start_time();
    if secs == 0 {
        return None;
    }
    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}
