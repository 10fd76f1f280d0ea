//! TCP accept loop shared by mock servers and systems under test.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use testbed_core::error::{Result, TestbedError};
use testbed_core::future::TestbedFuture;
use testbed_core::mock::{Closeable, HttpConfig, HttpListener, Protocol};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

/// A listener started by [`serve`].
pub struct RunningListener {
    name: String,
    url: String,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RunningListener {
    /// Name given to [`serve`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound socket address. Differs from the requested port when it was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Closeable for RunningListener {
    fn close(mut self: Box<Self>) -> TestbedFuture<'static, ()> {
        Box::pin(async move {
            if let Some(tx) = self.shutdown_tx.take() {
                let _ = tx.send(());
            }
            let name = self.name.clone();
            self.task.await.map_err(|e| TestbedError::Close {
                name: name.clone(),
                cause: e.to_string(),
            })?;
            tracing::debug!(listener = %name, "Listener stopped");
            Ok(())
        })
    }
}

impl HttpListener for RunningListener {
    fn on_url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for RunningListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningListener")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Bind `http` and answer every request with `handler` until closed.
///
/// Only plain HTTP is supported.
pub async fn serve<H, Fut>(http: &HttpConfig, name: &str, handler: H) -> Result<RunningListener>
where
    H: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    if http.protocol != Protocol::Http {
        return Err(TestbedError::UnsupportedProtocol {
            protocol: http.protocol.to_string(),
            transport: "hyper http1 listener".to_string(),
        });
    }

    let authority = http.authority();
    let listener = TcpListener::bind(&authority)
        .await
        .map_err(|e| TestbedError::Bind {
            name: name.to_string(),
            addr: authority.clone(),
            cause: e.to_string(),
        })?;
    let local_addr = listener.local_addr().map_err(|e| TestbedError::Network {
        cause: e.to_string(),
    })?;
    let url = format!("{}://{}:{}", http.protocol, http.host, local_addr.port());

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let handler = Arc::new(handler);
    let listener_name = name.to_string();

    tracing::info!(listener = %name, addr = %local_addr, "Listener started");

    let task = tokio::spawn(async move {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::debug!(
                        listener = %listener_name,
                        connections = connections.len(),
                        "Listener shutting down"
                    );
                    break;
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(listener = %listener_name, error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let handler = Arc::clone(&handler);
                    let listener_name = listener_name.clone();

                    connections.spawn(async move {
                        let service = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { Ok::<_, Infallible>(handler(req).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            if !e.is_incomplete_message() {
                                tracing::warn!(
                                    listener = %listener_name,
                                    remote = %remote_addr,
                                    error = %e,
                                    "HTTP connection error"
                                );
                            }
                        }
                    });
                }
            }
        }
        // Kept-alive connections must not outlive the listener.
        connections.shutdown().await;
    });

    Ok(RunningListener {
        name: name.to_string(),
        url,
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
