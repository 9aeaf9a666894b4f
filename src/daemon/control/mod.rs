//! Boundary to the presentation layer. Clients connect over loopback TCP, send
//! [messages::ControlRequest] lines and receive [ViewState] lines back.

pub mod messages;

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{anyhow, Result};
use messages::{write_json_line, ControlRequest};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{tcp::OwnedWriteHalf, TcpListener, TcpStream},
    sync::{mpsc, watch},
};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::tracker::state::ViewState;

use super::processing::event::TrackerEvent;

pub const DEFAULT_CONTROL_PORT: u16 = 47613;

pub fn control_address(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

pub struct ControlServer {
    listener: TcpListener,
    events: mpsc::Sender<TrackerEvent>,
    views: watch::Receiver<ViewState>,
    shutdown: CancellationToken,
}

impl ControlServer {
    pub fn new(
        listener: TcpListener,
        events: mpsc::Sender<TrackerEvent>,
        views: watch::Receiver<ViewState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            listener,
            events,
            views,
            shutdown,
        }
    }

    /// Accepts connections until shutdown. Each connection is served on its own task, but all of
    /// them funnel into the same tracker channel.
    pub async fn run(self) -> Result<()> {
        info!("Listening on {:?}", self.listener.local_addr());
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let connection = Connection {
                            events: self.events.clone(),
                            views: self.views.clone(),
                            shutdown: self.shutdown.clone(),
                        };
                        tokio::spawn(
                            async move {
                                if let Err(e) = connection.serve(stream).await {
                                    warn!("Control connection failed {e:?}");
                                }
                            }
                            .instrument(info_span!("Control connection", %peer)),
                        );
                    }
                    Err(e) => error!("Failed to accept control connection {e:?}"),
                }
            }
        }
    }
}

struct Connection {
    events: mpsc::Sender<TrackerEvent>,
    views: watch::Receiver<ViewState>,
    shutdown: CancellationToken,
}

impl Connection {
    async fn serve(self, stream: TcpStream) -> Result<()> {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!("Client disconnected");
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }

            let request = serde_json::from_str::<ControlRequest>(&line).unwrap_or_else(|e| {
                warn!("Ignoring malformed command {line:?}: {e}");
                ControlRequest::Unknown
            });
            debug!("Received {request:?}");

            if request == ControlRequest::Watch {
                return self.stream_views(write).await;
            }
            let view = self.handle(request).await?;
            write_json_line(&mut write, &view).await?;
        }
    }

    async fn handle(&self, request: ControlRequest) -> Result<ViewState> {
        match request.delta() {
            Some(delta) => {
                let (event, reply) = TrackerEvent::update(delta);
                self.events
                    .send(event)
                    .await
                    .map_err(|_| anyhow!("Tracker is not running"))?;
                Ok(reply.await?)
            }
            None => Ok(*self.views.borrow()),
        }
    }

    async fn stream_views(self, mut write: OwnedWriteHalf) -> Result<()> {
        let mut views = WatchStream::new(self.views);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                view = views.next() => match view {
                    Some(view) => write_json_line(&mut write, &view).await?,
                    None => return Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{FixedOffset, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::{
        io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
        net::{TcpListener, TcpStream},
        sync::mpsc,
    };
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::processing::TrackerModule,
        storage::state_store::RedundantStateStore,
        tracker::{
            audit::MemoryAuditLog,
            calendar::WorkCalendar,
            state::{Mode, ViewState},
            Tracker, TrackerConfig,
        },
        utils::clock::{Clock, TestClock},
    };

    use super::{control_address, messages::ControlRequest, ControlServer};

    async fn send_line(stream: &mut (impl AsyncWrite + Unpin), line: &str) -> Result<()> {
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_commands_over_socket() -> Result<()> {
        let dir = tempdir()?;
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2018, 7, 4, 10, 0, 0).unwrap());
        let config = TrackerConfig {
            calendar: WorkCalendar::with_offset(4, FixedOffset::east_opt(0).unwrap()),
            ..Default::default()
        };
        let tracker = Tracker::open(
            RedundantStateStore::in_dir(dir.path())?,
            MemoryAuditLog::default(),
            config,
            clock.time(),
        )
        .await;

        let (sender, receiver) = mpsc::channel(10);
        let (module, views) = TrackerModule::start(receiver, tracker, Box::new(clock)).await;

        let shutdown = CancellationToken::new();
        let listener = TcpListener::bind(control_address(0)).await?;
        let address = listener.local_addr()?;
        let server = ControlServer::new(listener, sender, views, shutdown.clone());

        let (processing_result, server_result, client_result) =
            tokio::join!(module.run(), server.run(), async {
                let result = async {
                    let watcher = TcpStream::connect(address).await?;
                    let (watch_read, mut watch_write) = watcher.into_split();
                    send_line(&mut watch_write, r#"{"cmd":"watch"}"#).await?;
                    let mut watched = BufReader::new(watch_read).lines();
                    let initial: ViewState =
                        serde_json::from_str(&watched.next_line().await?.unwrap())?;
                    assert_eq!(initial.mode, Mode::Office);

                    let stream = TcpStream::connect(address).await?;
                    let (read, mut write) = stream.into_split();
                    let mut replies = BufReader::new(read).lines();

                    send_line(&mut write, r#"{"cmd":"home"}"#).await?;
                    let home: ViewState =
                        serde_json::from_str(&replies.next_line().await?.unwrap())?;
                    assert_eq!(home.mode, Mode::Home);

                    let pushed: ViewState =
                        serde_json::from_str(&watched.next_line().await?.unwrap())?;
                    assert_eq!(pushed, home);

                    send_line(&mut write, r#"{"cmd":"make-coffee"}"#).await?;
                    let unknown: ViewState =
                        serde_json::from_str(&replies.next_line().await?.unwrap())?;
                    assert_eq!(unknown, home);

                    send_line(&mut write, "not json").await?;
                    let malformed: ViewState =
                        serde_json::from_str(&replies.next_line().await?.unwrap())?;
                    assert_eq!(malformed, home);

                    let request = serde_json::to_string(&ControlRequest::Break)?;
                    send_line(&mut write, &request).await?;
                    let on_break: ViewState =
                        serde_json::from_str(&replies.next_line().await?.unwrap())?;
                    assert!(on_break.is_break);
                    anyhow::Ok(())
                }
                .await;
                shutdown.cancel();
                result
            });

        client_result?;
        server_result?;
        processing_result?;
        Ok(())
    }
}
