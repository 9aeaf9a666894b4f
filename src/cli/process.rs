use std::{
    env,
    ffi::OsStr,
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use crate::daemon::args::DaemonOptions;

use super::daemon_path::to_daemon_path;

/// Stops every process started from the daemon executable at `name`. Returns how many were
/// stopped.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't find own process id: {e}"))?;
    let mut stopped = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // This will forcefully terminate the process on Windows. Anything better will require a
            // lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            stopped += 1;
        }
    }
    Ok(stopped)
}

pub fn daemon_executable() -> Result<std::path::PathBuf> {
    Ok(to_daemon_path(env::current_exe()?))
}

/// Command that runs `program` outside of the current terminal session, with no standard
/// streams attached.
pub fn detached_command(program: impl AsRef<OsStr>) -> Command {
    let mut command = Command::new(program);
    #[cfg(feature = "win")]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::DETACHED_PROCESS;
        command.creation_flags(DETACHED_PROCESS.0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());
    command
}

/// Shuts down previous daemons and starts a new one detached from the terminal. The new daemon
/// gets the same options the cli was called with.
pub fn restart_server(port: u16, options: &DaemonOptions) -> Result<()> {
    let daemon = daemon_executable()?;
    if !daemon.exists() {
        return Err(anyhow!("Daemon executable {daemon:?} is missing"));
    }
    kill_previous_servers(&daemon)?;

    let mut command = detached_command(daemon);
    command.arg("--force");
    command.arg(format!("--port={port}"));
    command.args(options.to_args());

    #[allow(clippy::zombie_processes)]
    let child = command.spawn()?;
    info!("Spawned daemon {}", child.id());
    println!("Daemon started");
    Ok(())
}
