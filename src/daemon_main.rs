// This runs daemon on windows without creating a console. Disable during development to see
// stdout.
#![windows_subsystem = "windows"]

use anyhow::Result;
use clap::Parser;
use tracing::error;
use worklog::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, LoggingOptions, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() -> Result<()> {
    let command_args = std::env::args().collect::<Vec<_>>();
    let args = DaemonArgs::parse_from(&command_args);

    if !args.force && !detach(command_args)? {
        return Ok(());
    }
    serve(args)
}

/// Moves the daemon out of the terminal session. Returns `true` in the process that should keep
/// running as the daemon.
#[cfg(unix)]
fn detach(_command_args: Vec<String>) -> Result<bool> {
    use daemonize::{Daemonize, Outcome, Stdio};

    match Daemonize::new()
        .stdout(Stdio::devnull())
        .stderr(Stdio::devnull())
        .execute()
    {
        Outcome::Parent(parent) => {
            parent.inspect_err(|e| eprintln!("Failed to create daemon {e:?}"))?;
            println!("Created daemon");
            Ok(false)
        }
        Outcome::Child(child) => {
            child.inspect_err(|e| eprintln!("Failed to detach daemon {e:?}"))?;
            Ok(true)
        }
    }
}

/// Windows can't fork, so the same executable is started again with `--force`.
#[cfg(all(not(unix), feature = "win"))]
fn detach(command_args: Vec<String>) -> Result<bool> {
    use worklog::cli::process::detached_command;

    let mut command = detached_command(std::env::current_exe()?);
    command.args(command_args.into_iter().skip(1));
    command.arg("--force");
    #[allow(clippy::zombie_processes)]
    command.spawn()?;
    println!("Created daemon");
    Ok(false)
}

#[cfg(all(not(unix), not(feature = "win")))]
fn detach(_command_args: Vec<String>) -> Result<bool> {
    Ok(true)
}

fn serve(args: DaemonArgs) -> Result<()> {
    let app_dir = args
        .options
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;
    enable_logging(
        &app_dir,
        LoggingOptions {
            prefix: DAEMON_PREFIX,
            level: args.log,
            console: args.log_console,
        },
    )?;
    single_thread_runtime()?
        .block_on(start_daemon(app_dir, args.port, &args.options))
        .inspect_err(|e| error!("Daemon stopped with an error {e:?}"))
}
