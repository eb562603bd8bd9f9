//! Shared fixtures for integration tests.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use document_notification_service::config::Settings;
use document_notification_service::document::{Client, MemoryDocumentStore};
use document_notification_service::mail::MemoryTransport;
use document_notification_service::pipeline::{Backends, Pipeline};
use document_notification_service::queue::MemoryTaskQueue;

pub const PORTAL: &str = "https://portal.vetorial.example";

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Lines containing every one of `needles`.
    pub fn lines_with(&self, needles: &[&str]) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| needles.iter().all(|n| line.contains(n)))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture logs of the current thread until the guard is dropped.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

pub struct TestPipeline {
    pub pipeline: Pipeline,
    pub store: Arc<MemoryDocumentStore>,
    pub queue: Arc<MemoryTaskQueue>,
    pub transport: Arc<MemoryTransport>,
}

/// Pipeline over memory backends, jitter disabled so delays are exact.
pub fn pipeline_with(transport: MemoryTransport) -> TestPipeline {
    let mut settings = Settings::with_portal(PORTAL);
    settings.mail.sender_address = "noreply@vetorial.example".to_string();
    settings.task.retry_jitter = false;

    let store = Arc::new(MemoryDocumentStore::new());
    store.upsert_client(Client::new(42, "ana", "ana@example.com").with_full_name("Ana Costa"));
    store.upsert_client(Client::new(99, "sem_email", ""));

    let queue = Arc::new(MemoryTaskQueue::new());
    let transport = Arc::new(transport);

    let pipeline = Pipeline::new(
        &settings,
        Backends {
            store: store.clone(),
            queue: queue.clone(),
            transport: transport.clone(),
        },
    );

    TestPipeline {
        pipeline,
        store,
        queue,
        transport,
    }
}

pub fn pipeline() -> TestPipeline {
    pipeline_with(MemoryTransport::new())
}
