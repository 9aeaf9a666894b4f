pub mod client;
pub mod daemon_path;
pub mod display;
pub mod history;
pub mod process;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client::ControlClient;
use display::paint_view;
use process::{daemon_executable, kill_previous_servers, restart_server};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        args::DaemonOptions,
        control::{messages::ControlRequest, DEFAULT_CONTROL_PORT},
        start_daemon,
    },
    tracker::state::StateDelta,
    utils::{
        dir::{audit_log_path, create_application_default_path},
        logging::{enable_logging, LoggingOptions, CLI_PREFIX, DAEMON_PREFIX},
        time::HoursMinutes,
    },
};

#[derive(Parser, Debug)]
#[command(name = "worklog", version, long_about = None)]
#[command(about = "Tracks daily work time against a quota", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(long, global = true, default_value_t = DEFAULT_CONTROL_PORT, help = "Control port of the daemon")]
    port: u16,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application, replacing a running one")]
    Init {
        #[command(flatten)]
        options: DaemonOptions,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for debugging and for environments without detaching"
    )]
    Serve {
        #[command(flatten)]
        options: DaemonOptions,
    },
    #[command(about = "Stop currently running daemon")]
    Stop {},
    #[command(about = "Show the current work time")]
    Status {},
    #[command(about = "Print the work time every time it changes")]
    Watch {},
    #[command(about = "Switch to office mode")]
    Office {},
    #[command(about = "Switch to home mode")]
    Home {},
    #[command(about = "Start a break")]
    Break {},
    #[command(about = "End a break")]
    EndBreak {},
    #[command(about = "Start work away from keyboard")]
    Afk {},
    #[command(about = "End work away from keyboard")]
    EndAfk {},
    #[command(about = "Report that the screen got locked. Meant for screen lock hooks")]
    Lock {},
    #[command(about = "Report that the screen got unlocked. Meant for screen lock hooks")]
    Unlock {},
    #[command(about = "Adjust quotas, overtime or done time")]
    Set {
        #[command(flatten)]
        adjustment: Adjustment,
    },
    #[command(about = "Show the latest entries of the audit log")]
    History {
        #[arg(short = 'n', default_value_t = 20, help = "Number of entries")]
        count: usize,
        #[arg(
            long,
            help = "Application directory. By default tries to read from $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct Adjustment {
    #[arg(long = "home-todo", help = "Time to do at home, H:MM")]
    home_todo: Option<HoursMinutes>,
    #[arg(long = "office-todo", help = "Time to do at office, H:MM")]
    office_todo: Option<HoursMinutes>,
    #[arg(long, allow_hyphen_values = true, help = "Replaces overtime, [-]H:MM")]
    overtime: Option<HoursMinutes>,
    #[arg(
        long = "add-done",
        allow_hyphen_values = true,
        help = "Adds to the work done today, [-]H:MM"
    )]
    add_done: Option<HoursMinutes>,
}

impl Adjustment {
    fn delta(self) -> Result<StateDelta> {
        let delta = StateDelta {
            home_todo: self.home_todo.map(|v| v.0),
            office_todo: self.office_todo.map(|v| v.0),
            overtime: self.overtime.map(|v| v.0),
            done: self.add_done.map(|v| v.0),
            ..Default::default()
        };
        if delta == StateDelta::default() {
            return Err(anyhow!("Nothing to set, see `worklog set --help`"));
        }
        Ok(delta)
    }
}

impl Commands {
    /// Request sent to the daemon for commands that are answered with a single view.
    fn request(self) -> Result<Option<ControlRequest>> {
        Ok(Some(match self {
            Commands::Status {} => ControlRequest::Status,
            Commands::Office {} => ControlRequest::Office,
            Commands::Home {} => ControlRequest::Home,
            Commands::Break {} => ControlRequest::Break,
            Commands::EndBreak {} => ControlRequest::EndBreak,
            Commands::Afk {} => ControlRequest::Afk,
            Commands::EndAfk {} => ControlRequest::EndAfk,
            Commands::Lock {} => ControlRequest::Lock,
            Commands::Unlock {} => ControlRequest::Unlock,
            Commands::Set { adjustment } => ControlRequest::Update {
                state: adjustment.delta()?,
            },
            _ => return Ok(None),
        }))
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let (log_dir, prefix) = match &args.commands {
        Commands::Serve { options } => (options.dir.clone(), DAEMON_PREFIX),
        Commands::Init { options } => (options.dir.clone(), CLI_PREFIX),
        Commands::History { dir, .. } => (dir.clone(), CLI_PREFIX),
        _ => (None, CLI_PREFIX),
    };
    let app_dir = log_dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(
        &app_dir,
        LoggingOptions {
            prefix,
            level: args.log.then_some(LevelFilter::TRACE),
            console: args.log,
        },
    )?;

    match args.commands {
        Commands::Init { options } => restart_server(args.port, &options),
        Commands::Stop {} => {
            let stopped = kill_previous_servers(&daemon_executable()?)?;
            println!("Stopped {stopped} daemon(s)");
            Ok(())
        }
        Commands::Serve { options } => start_daemon(app_dir, args.port, &options).await,
        Commands::Watch {} => {
            let mut client = ControlClient::connect(args.port).await?;
            client.send(&ControlRequest::Watch).await?;
            while let Some(view) = client.next_view().await? {
                println!("{}", paint_view(&view));
            }
            Ok(())
        }
        Commands::History { count, .. } => {
            for line in history::last_lines(&audit_log_path(&app_dir), count).await? {
                println!("{line}");
            }
            Ok(())
        }
        command => {
            let Some(request) = command.request()? else {
                return Ok(());
            };
            let mut client = ControlClient::connect(args.port).await?;
            let view = client.request(&request).await?;
            println!("{}", paint_view(&view));
            Ok(())
        }
    }
}
