//! Listener factory that starts nothing, for unit tests.

use super::listener::{Closeable, HttpConfig, HttpListener, MockListenerFactory};
use super::server::MockConfig;
use crate::future::TestbedFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct NoopListener {
    url: String,
    closed: Arc<AtomicUsize>,
}

impl Closeable for NoopListener {
    fn close(self: Box<Self>) -> TestbedFuture<'static, ()> {
        Box::pin(async move {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

impl HttpListener for NoopListener {
    fn on_url(&self) -> &str {
        &self.url
    }
}

#[derive(Default)]
pub(crate) struct NoopFactory {
    pub(crate) started: AtomicUsize,
    pub(crate) closed: Arc<AtomicUsize>,
}

impl NoopFactory {
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl MockListenerFactory for NoopFactory {
    fn listen(&self, _mock: MockConfig, http: HttpConfig) -> TestbedFuture<'_, Box<dyn HttpListener>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::clone(&self.closed);
        Box::pin(async move {
            Ok(Box::new(NoopListener {
                url: http.url(),
                closed,
            }) as Box<dyn HttpListener>)
        })
    }
}
