//! PID file management for the agent daemons.
//!
//! Each `apiary run` process writes its PID under the runtime pids dir
//! and holds an `fs2` exclusive lock on the file, so a second daemon
//! for the same agent fails fast. The supervisor commands read these
//! files to find, probe, and signal running daemons.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

/// Write the current process PID to `path` and acquire an exclusive
/// lock.
///
/// Returns the open [`File`] handle — the caller must keep it alive for
/// the lifetime of the daemon so the advisory lock is held.
///
/// # Errors
///
/// * Another daemon for this agent already holds the lock.
/// * Filesystem I/O failure.
pub fn write_pid_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .read(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("opening PID file {}: {e}", path.display()))?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "another daemon for this agent is running (PID file {} is locked)",
            path.display()
        )
    })?;

    let pid = std::process::id();
    {
        let mut f = &file;
        writeln!(f, "{pid}")?;
        f.flush()?;
    }

    tracing::info!(path = %path.display(), pid, "PID file written");
    Ok(file)
}

/// Remove the PID file at `path`. The exclusive lock is released when
/// the `_handle` is dropped; removing the file keeps later stale-PID
/// checks from finding it.
pub fn remove_pid_file(path: &Path, _handle: File) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Read the PID recorded at `path`, if any.
pub fn read_pid(path: &Path) -> Option<u32> {
    let raw = fs::read_to_string(path).ok()?;
    raw.trim().parse().ok()
}

/// Whether a process with this PID exists (signal 0 probe).
pub fn alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

/// SIGTERM the daemon's process group so its model-CLI children go
/// down with it.
pub fn terminate_group(pid: u32) {
    signal_group(pid, libc::SIGTERM);
}

/// SIGKILL escalation for a daemon that ignored SIGTERM.
pub fn kill_group(pid: u32) {
    signal_group(pid, libc::SIGKILL);
}

fn signal_group(pid: u32, signal: i32) {
    unsafe {
        // Daemons are started in their own process group; fall back to
        // the single process when the group signal fails.
        if libc::kill(-(pid as i32), signal) != 0 {
            libc::kill(pid as i32, signal);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_remove_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("builder.pid");

        let handle = write_pid_file(&pid_path).unwrap();

        let stored = read_pid(&pid_path).unwrap();
        assert_eq!(stored, std::process::id());

        // A second lock attempt should fail.
        let second = write_pid_file(&pid_path);
        assert!(second.is_err(), "expected lock conflict");

        remove_pid_file(&pid_path, handle);
        assert!(!pid_path.exists());
    }

    #[test]
    fn creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("nested").join("pids").join("lead.pid");

        let handle = write_pid_file(&pid_path).unwrap();
        assert!(pid_path.exists());

        remove_pid_file(&pid_path, handle);
    }

    #[test]
    fn read_pid_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("bad.pid");
        std::fs::write(&pid_path, "not a pid\n").unwrap();
        assert_eq!(read_pid(&pid_path), None);
        assert_eq!(read_pid(&dir.path().join("missing.pid")), None);
    }

    #[test]
    fn own_process_is_alive() {
        assert!(alive(std::process::id()));
    }
}
