use abbrv_core::{AbbrvError, Result};
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Verify if a process with the given PID is running
#[cfg(unix)]
pub fn verify_process_running(pid: u32) -> bool {
    // kill -0 only checks that the process exists
    let pid = pid.to_string();
    Command::new("kill")
        .args(["-0", pid.as_str()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(windows)]
pub fn verify_process_running(pid: u32) -> bool {
    let filter = format!("PID eq {}", pid);
    let output = Command::new("tasklist")
        .args(["/FI", filter.as_str(), "/NH"])
        .output();

    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
        Err(_) => false,
    }
}

/// Launch `exe <args>` in the background with stdout and stderr appended to
/// `log_file`.
pub fn spawn_detached(exe: &Path, args: &[&str], log_file: &Path) -> Result<u32> {
    let log = File::options().create(true).append(true).open(log_file)?;
    let log_err = log.try_clone()?;

    let mut command = Command::new(exe);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let child = command.spawn()?;
    debug!("Spawned {} as PID {}", exe.display(), child.id());
    Ok(child.id())
}

/// Ask the process to exit, then force it after a short grace period.
pub fn terminate_process(pid: u32) -> Result<()> {
    if !verify_process_running(pid) {
        return Ok(());
    }

    if !send_terminate(pid, false) {
        warn!("Polite termination of PID {} failed", pid);
    }

    for _ in 0..5 {
        thread::sleep(Duration::from_millis(100));
        if !verify_process_running(pid) {
            return Ok(());
        }
    }

    warn!("PID {} did not exit, forcing it", pid);
    send_terminate(pid, true);
    thread::sleep(Duration::from_millis(100));

    if verify_process_running(pid) {
        Err(AbbrvError::Other(format!("Failed to stop process {}", pid)))
    } else {
        Ok(())
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32, force: bool) -> bool {
    let pid = pid.to_string();
    let mut command = Command::new("kill");
    if force {
        command.arg("-9");
    }
    command
        .arg(&pid)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn send_terminate(pid: u32, force: bool) -> bool {
    let pid = pid.to_string();
    let mut command = Command::new("taskkill");
    if force {
        command.args(["/F", "/T"]);
    }
    command
        .args(["/PID", pid.as_str()])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
