use anyhow::{anyhow, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};
use tracing::debug;

use crate::{
    daemon::control::{
        control_address,
        messages::{write_json_line, ControlRequest},
    },
    tracker::state::ViewState,
};

/// Connection to a running daemon.
pub struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl ControlClient {
    pub async fn connect(port: u16) -> Result<Self> {
        let stream = TcpStream::connect(control_address(port))
            .await
            .with_context(|| {
                format!("No daemon is listening on port {port}. Start it with `worklog init`")
            })?;
        let (read, write) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read).lines(),
            write,
        })
    }

    pub async fn send(&mut self, request: &ControlRequest) -> Result<()> {
        debug!("Sending {request:?}");
        write_json_line(&mut self.write, request).await
    }

    /// Sends a request and waits for the view produced by it.
    pub async fn request(&mut self, request: &ControlRequest) -> Result<ViewState> {
        self.send(request).await?;
        self.next_view()
            .await?
            .ok_or_else(|| anyhow!("Daemon closed the connection"))
    }

    /// Next view pushed by the daemon, `None` once the connection is closed.
    pub async fn next_view(&mut self) -> Result<Option<ViewState>> {
        match self.lines.next_line().await? {
            Some(line) => Ok(Some(
                serde_json::from_str(&line).with_context(|| format!("Unexpected reply {line:?}"))?,
            )),
            None => Ok(None),
        }
    }
}
