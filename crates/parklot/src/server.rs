//! TCP server: one task per connection, one response per request line.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::codec::JsonLineCodec;
use crate::dispatch::Dispatcher;
use crate::protocol::{Request, Response};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Idle time allowed between request lines before the connection is
    /// torn down. The pool is never involved in the teardown.
    pub read_deadline: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_deadline: Duration::from_secs(10),
        }
    }
}

/// Start the server with the provided dispatcher, until SIGINT/SIGTERM.
pub async fn serve(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Starting parklot server on {}", listener.local_addr()?);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    serve_on(listener, dispatcher, config.read_deadline, shutdown_rx).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Accept loop over a pre-bound listener. Returns once the shutdown channel
/// flips to true or a signal arrives; in-flight connections finish on their
/// own tasks.
pub async fn serve_on(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    read_deadline: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let shutdown = shutdown_signal(shutdown_rx);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("No longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move {
                            handle_connection(stream, peer, dispatcher, read_deadline).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Wait for shutdown (SIGINT, SIGTERM, or the internal channel).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed, which only happens when
/// the tokio runtime is not properly initialized. That is an unrecoverable
/// configuration error and should fail fast at startup.
pub async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler - is tokio runtime configured correctly?");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler - is tokio runtime configured correctly?")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let explicit_shutdown = async {
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = explicit_shutdown => {
            info!("Shutdown requested, shutting down...");
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    read_deadline: Duration,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = tokio_util::codec::FramedRead::new(read_half, JsonLineCodec::<Request>::new());
    let mut writer =
        tokio_util::codec::FramedWrite::new(write_half, JsonLineCodec::<Response>::new());

    loop {
        let request = match tokio::time::timeout(read_deadline, reader.next()).await {
            Err(_) => {
                tracing::debug!(%peer, "Read deadline elapsed, closing connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Ok(request))) => request,
            Ok(Some(Err(e))) => {
                // Bad framing or JSON: answer once, then drop the connection
                // since the stream state is unknown.
                tracing::debug!(%peer, error = %e, "Malformed request line");
                let _ = writer
                    .send(Response::error(format!("malformed request: {e}")))
                    .await;
                break;
            }
        };

        let request_id = request.x_request_id.unwrap_or_else(Uuid::new_v4);
        info!(%request_id, command = request.command.name(), %peer, "Handling request");

        let response = dispatcher.handle(request.command);
        if let Err(e) = writer.send(response).await {
            tracing::warn!(%peer, error = %e, "Failed to send response");
            break;
        }
    }
}
