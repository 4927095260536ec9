//! TCP echo server driven by the lifecycle engine.
//!
//! ```text
//! RUST_LOG=runlevel=debug,echo_server=info cargo run --example echo_server
//! ```
//!
//! Ctrl-C once to shut down, three times to force exit while draining.

use runlevel::prelude::*;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Binds on `ready`, stops accepting on `shutting-down`
struct EchoListener {
    addr: SocketAddr,
    closing: watch::Sender<bool>,
    accept_loop: Mutex<Option<JoinHandle<()>>>,
}

impl EchoListener {
    fn new(addr: SocketAddr) -> Arc<Self> {
        let (closing, _) = watch::channel(false);
        Arc::new(Self {
            addr,
            closing,
            accept_loop: Mutex::new(None),
        })
    }
}

/// Accept until told to close. A listener error ends the server with code 1.
async fn accept_loop(
    listener: TcpListener,
    mut closing: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = closing.changed() => return Ok(()),
            accepted = listener.accept() => {
                let (mut socket, peer) = accepted?;
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 || socket.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                    tracing::debug!(%peer, "Connection closed");
                });
            }
        }
    }
}

struct Open {
    listener: Arc<EchoListener>,
    reporter: FatalReporter,
}

struct Close(Arc<EchoListener>);

#[async_trait]
impl Hook for Open {
    async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listener.addr).await?;
        tracing::info!(address = %listener.local_addr()?, "Echo server listening");
        let closing = self.listener.closing.subscribe();

        let handle = self.reporter.spawn_supervised(accept_loop(listener, closing));
        *self.listener.accept_loop.lock().await = Some(handle);
        Ok(())
    }

    fn name(&self) -> &str {
        "echo-listener-open"
    }
}

#[async_trait]
impl Hook for Close {
    async fn run(&self) -> anyhow::Result<()> {
        self.0.closing.send_replace(true);
        if let Some(handle) = self.0.accept_loop.lock().await.take() {
            handle.await?;
        }
        tracing::info!("Echo server stopped accepting");
        Ok(())
    }

    fn name(&self) -> &str {
        "echo-listener-close"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    runlevel::logging::init_tracing()?;

    let settings = ConfigService::from_env();
    let addr: SocketAddr = settings
        .get("ECHO_ADDR")
        .unwrap_or_else(|| "127.0.0.1:7070".to_string())
        .parse()?;
    let listener = EchoListener::new(addr);

    let app = Application::builder()
        .config(LifecycleConfig::from_service(&settings)?)
        .on(Phase::Booting, hook_fn("config", move || async move {
            tracing::info!(%addr, "Configuration loaded");
            Ok(())
        }))
        .on(Phase::ShuttingDown, Close(Arc::clone(&listener)))
        .build();

    let reporter = ShutdownSupervisor::new(app.clone()).install()?;
    app.once(Phase::Ready, Open { listener, reporter: reporter.clone() });

    app.start().await?;
    // Teardown is done; the supervisor chooses the exit code.
    reporter.wait().await;
    Ok(())
}
