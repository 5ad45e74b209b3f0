#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use linecall::prelude::*;
use linecall::{DemoConfig, DemoLineService, Pacing};
use linecall_client::LineClient;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A served router; the server stops when this is dropped.
pub struct TestServer {
    pub url: String,
    task: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    pub fn client(&self) -> LineClient {
        LineClient::builder(&self.url).build().unwrap()
    }
}

pub async fn serve<S: LineService>(service: S) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let _ = linecall::serve(listener, linecall::router(service)).await;
    });
    TestServer {
        url: format!("http://{addr}"),
        task,
    }
}

pub async fn serve_demo() -> TestServer {
    serve(DemoLineService::new(DemoConfig::unpaced())).await
}

/// Poll `check` until it holds or `limit` passes.
pub async fn eventually(limit: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Sets a flag when dropped.
pub struct ReleaseGuard(pub Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Serves an endless paced `FetchLines` and counts every line it produces.
#[derive(Clone, Default)]
pub struct CountingService {
    pub produced: Arc<AtomicUsize>,
    pub released: Arc<AtomicBool>,
    pub pacing: Pacing,
}

impl LineService for CountingService {
    async fn greet(&self, request: HelloRequest) -> Result<HelloReply, ServiceError> {
        DemoLineService::default().greet(request).await
    }

    async fn fetch_lines(&self, _request: FetchLinesRequest) -> Result<LineStream, ServiceError> {
        let produced = self.produced.clone();
        let guard = ReleaseGuard(self.released.clone());
        let pacing = self.pacing;

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            let mut index = 0usize;
            loop {
                produced.fetch_add(1, Ordering::SeqCst);
                yield Ok(TextLine::new(format!("line {index}")));
                index += 1;
                pacing.pace().await;
            }
        }))
    }

    async fn submit_lines(
        &self,
        lines: MessageStream<TextLine>,
    ) -> Result<StreamSummary, ServiceError> {
        DemoLineService::default().submit_lines(lines).await
    }

    async fn reverse_lines(
        &self,
        lines: MessageStream<TextLine>,
    ) -> Result<LineStream, ServiceError> {
        DemoLineService::new(DemoConfig::unpaced())
            .reverse_lines(lines)
            .await
    }
}

/// Records every line `SubmitLines` reads, in order.
#[derive(Clone, Default)]
pub struct RecordingService {
    pub seen: Arc<std::sync::Mutex<Vec<String>>>,
}

impl LineService for RecordingService {
    async fn greet(&self, request: HelloRequest) -> Result<HelloReply, ServiceError> {
        DemoLineService::default().greet(request).await
    }

    async fn fetch_lines(&self, request: FetchLinesRequest) -> Result<LineStream, ServiceError> {
        DemoLineService::new(DemoConfig::unpaced())
            .fetch_lines(request)
            .await
    }

    async fn submit_lines(
        &self,
        mut lines: MessageStream<TextLine>,
    ) -> Result<StreamSummary, ServiceError> {
        use futures::StreamExt;

        let started = tokio::time::Instant::now();
        while let Some(line) = lines.next().await {
            let line = line?;
            self.seen.lock().unwrap().push(line.line);
        }
        Ok(StreamSummary {
            elapsed_seconds: started.elapsed().as_secs() as i64,
        })
    }

    async fn reverse_lines(
        &self,
        lines: MessageStream<TextLine>,
    ) -> Result<LineStream, ServiceError> {
        DemoLineService::new(DemoConfig::unpaced())
            .reverse_lines(lines)
            .await
    }
}

/// Fails every call its own way.
#[derive(Clone, Default)]
pub struct FaultyService;

impl LineService for FaultyService {
    async fn greet(&self, _request: HelloRequest) -> Result<HelloReply, ServiceError> {
        Err(ServiceError::new(Code::NotFound, "no such name"))
    }

    async fn fetch_lines(&self, _request: FetchLinesRequest) -> Result<LineStream, ServiceError> {
        Ok(Box::pin(futures::stream::iter(vec![
            Ok(TextLine::new("first")),
            Err(ServiceError::new(Code::Aborted, "catalog went away")),
        ])))
    }

    async fn submit_lines(
        &self,
        _lines: MessageStream<TextLine>,
    ) -> Result<StreamSummary, ServiceError> {
        Err(ServiceError::new(Code::ResourceExhausted, "too many lines"))
    }

    async fn reverse_lines(
        &self,
        _lines: MessageStream<TextLine>,
    ) -> Result<LineStream, ServiceError> {
        Err(ServiceError::new_internal("mirror broke"))
    }
}

/// Answers `Greet` only after a delay.
#[derive(Clone)]
pub struct SlowService(pub Duration);

impl LineService for SlowService {
    async fn greet(&self, request: HelloRequest) -> Result<HelloReply, ServiceError> {
        tokio::time::sleep(self.0).await;
        DemoLineService::default().greet(request).await
    }

    async fn fetch_lines(&self, request: FetchLinesRequest) -> Result<LineStream, ServiceError> {
        DemoLineService::new(DemoConfig::unpaced())
            .fetch_lines(request)
            .await
    }

    async fn submit_lines(
        &self,
        lines: MessageStream<TextLine>,
    ) -> Result<StreamSummary, ServiceError> {
        DemoLineService::default().submit_lines(lines).await
    }

    async fn reverse_lines(
        &self,
        lines: MessageStream<TextLine>,
    ) -> Result<LineStream, ServiceError> {
        DemoLineService::new(DemoConfig::unpaced())
            .reverse_lines(lines)
            .await
    }
}
