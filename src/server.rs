use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::rc::Rc;

use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tokio::task::{self, LocalSet};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use crate::codec::FrameCodec;
use crate::config::Config;
use crate::connection::Connection;
use crate::store::Store;
use crate::Error;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Binds the listener and serves until Ctrl-C.
///
/// Must be awaited on a current-thread runtime: every connection runs on the calling thread.
pub async fn run(config: Config) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = bind(&config)?;

    serve(listener, config, shutdown_signal()).await
}

/// Creates the listening socket: address reuse, bind, listen with the configured backlog.
pub fn bind(config: &Config) -> io::Result<TcpListener> {
    let addr = config.addr();
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    // The process is restarted often, don't trip over sockets left in TIME_WAIT.
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(config.backlog)
}

/// Accepts connections until `shutdown` resolves. Connection tasks share the store through the
/// local task set, so they all run on the calling thread and a command is never interleaved with
/// another one.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    let store = Rc::new(RefCell::new(Store::with_capacity(config.capacity)));

    info!(
        parse_mode = %config.parse_mode,
        capacity = config.capacity,
        "Redis server listening on {}",
        listener.local_addr()?
    );

    LocalSet::new()
        .run_until(accept_loop(listener, config, store, shutdown))
        .await
}

async fn accept_loop(
    listener: TcpListener,
    config: Config,
    store: Rc<RefCell<Store>>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    tokio::pin!(shutdown);

    let mut backoff = ACCEPT_BACKOFF_MIN;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, client_address) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) if is_connection_error(&e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                    Err(e) => {
                        // Usually out of descriptors. The pending connection stays queued, so
                        // retrying right away would spin.
                        error!(error = %e, retry_in = ?backoff, "Failed to accept connection");
                        tokio::select! {
                            _ = time::sleep(backoff) => {}
                            _ = &mut shutdown => {
                                info!("Shutting down");
                                return Ok(());
                            }
                        }
                        backoff = next_backoff(backoff);
                        continue;
                    }
                };

                backoff = ACCEPT_BACKOFF_MIN;
                info!("Accepted connection from {:?}", client_address);

                let codec = FrameCodec::new(config.parse_mode, config.max_frame_size);
                let conn = Connection::new(socket, client_address, codec);
                task::spawn_local(handle_connection(conn, store.clone()));
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

#[instrument(
    name = "connection",
    skip_all,
    fields(connection_id = %conn.id, client_address = %conn.client_address)
)]
async fn handle_connection(mut conn: Connection, store: Rc<RefCell<Store>>) {
    if let Err(e) = conn.run(&store).await {
        error!(error = %e, state = %conn.state(), "Connection failed");
    }

    conn.close();
}

/// Errors that concern a single pending connection rather than the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

fn next_backoff(backoff: Duration) -> Duration {
    (backoff * 2).min(ACCEPT_BACKOFF_MAX)
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    }
}
