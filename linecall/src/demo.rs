//! Reference implementation of [`LineService`].

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use linecall_core::{FetchLinesRequest, HelloReply, HelloRequest, StreamSummary, TextLine};

use crate::error::ServiceError;
use crate::pacing::Pacing;
use crate::request::MessageStream;
use crate::service::{LineService, LineStream};

/// Lines served by `FetchLines` unless configured otherwise.
pub const SAMPLE_LINES: [&str; 6] = [
    "Sphinx of black quartz, judge my vow",
    "The early bird catches the worm",
    "The second mouse gets the cheese",
    "The first mouse gets the cheese",
    "The third mouse gets the cheese",
    "The fourth mouse gets the cheese",
];

pub const DEFAULT_FETCH_PACING: Duration = Duration::from_millis(500);
pub const DEFAULT_REVERSE_PACING: Duration = Duration::from_millis(1200);

#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub lines: Arc<[String]>,
    pub fetch_pacing: Pacing,
    pub reverse_pacing: Pacing,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            lines: SAMPLE_LINES.iter().map(|s| s.to_string()).collect(),
            fetch_pacing: Pacing::fixed(DEFAULT_FETCH_PACING),
            reverse_pacing: Pacing::fixed(DEFAULT_REVERSE_PACING),
        }
    }
}

impl DemoConfig {
    /// Default lines, no pacing.
    pub fn unpaced() -> Self {
        Self {
            fetch_pacing: Pacing::none(),
            reverse_pacing: Pacing::none(),
            ..Self::default()
        }
    }

    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn fetch_pacing(mut self, pacing: Pacing) -> Self {
        self.fetch_pacing = pacing;
        self
    }

    pub fn reverse_pacing(mut self, pacing: Pacing) -> Self {
        self.reverse_pacing = pacing;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct DemoLineService {
    config: DemoConfig,
}

impl DemoLineService {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }
}

/// Reverse a line character by character.
pub fn reverse_line(line: &str) -> String {
    line.chars().rev().collect()
}

impl LineService for DemoLineService {
    async fn greet(&self, request: HelloRequest) -> Result<HelloReply, ServiceError> {
        Ok(HelloReply {
            message: format!("Hello {}", request.name),
        })
    }

    async fn fetch_lines(&self, _request: FetchLinesRequest) -> Result<LineStream, ServiceError> {
        let lines = self.config.lines.clone();
        let pacing = self.config.fetch_pacing;

        Ok(Box::pin(async_stream::stream! {
            for (index, line) in lines.iter().enumerate() {
                if index > 0 {
                    pacing.pace().await;
                }
                tracing::debug!(index, "fetch_lines: emitting");
                yield Ok(TextLine::new(line.as_str()));
            }
        }))
    }

    async fn submit_lines(
        &self,
        mut lines: MessageStream<TextLine>,
    ) -> Result<StreamSummary, ServiceError> {
        let started = tokio::time::Instant::now();
        let mut received = Vec::new();

        while let Some(line) = lines.next().await {
            received.push(line?.line);
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            lines = received.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "submit_lines: end of input"
        );
        Ok(StreamSummary {
            elapsed_seconds: elapsed.as_secs() as i64,
        })
    }

    async fn reverse_lines(
        &self,
        mut lines: MessageStream<TextLine>,
    ) -> Result<LineStream, ServiceError> {
        let pacing = self.config.reverse_pacing;

        Ok(Box::pin(async_stream::stream! {
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        yield Ok(TextLine::new(reverse_line(&line.line)));
                        pacing.pace().await;
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    fn lines(items: &[&str]) -> MessageStream<TextLine> {
        let items: Vec<Result<TextLine, ServiceError>> =
            items.iter().map(|s| Ok(TextLine::new(*s))).collect();
        MessageStream::from_stream(futures::stream::iter(items))
    }

    #[test]
    fn test_reverse_line() {
        assert_eq!(reverse_line("abc"), "cba");
        assert_eq!(reverse_line(""), "");
        assert_eq!(reverse_line("héllo"), "olléh");
    }

    #[tokio::test]
    async fn test_greet() {
        let service = DemoLineService::default();
        let reply = service
            .greet(HelloRequest {
                name: "Ada".into(),
            })
            .await
            .unwrap();
        assert_eq!(reply.message, "Hello Ada");

        let reply = service.greet(HelloRequest::default()).await.unwrap();
        assert_eq!(reply.message, "Hello ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_lines_in_order() {
        let service = DemoLineService::default();
        let started = tokio::time::Instant::now();
        let lines: Vec<String> = service
            .fetch_lines(FetchLinesRequest {})
            .await
            .unwrap()
            .map(|r| r.unwrap().line)
            .collect()
            .await;
        assert_eq!(lines, SAMPLE_LINES);
        // five gaps between six lines
        assert!(started.elapsed() >= DEFAULT_FETCH_PACING * 5);
    }

    #[tokio::test]
    async fn test_submit_lines_zero_lines() {
        let service = DemoLineService::new(DemoConfig::unpaced());
        let summary = service.submit_lines(lines(&[])).await.unwrap();
        assert_eq!(summary.elapsed_seconds, 0);
    }

    #[tokio::test]
    async fn test_submit_lines_propagates_read_error() {
        let service = DemoLineService::new(DemoConfig::unpaced());
        let input = MessageStream::from_stream(futures::stream::iter(vec![
            Ok(TextLine::new("a")),
            Err(ServiceError::abandoned("gone")),
        ]));
        let err = service.submit_lines(input).await.unwrap_err();
        assert_eq!(err.code(), Code::Canceled);
        assert!(err.is_abandoned());
    }

    #[tokio::test]
    async fn test_reverse_lines() {
        let service = DemoLineService::new(DemoConfig::unpaced());
        let output: Vec<String> = service
            .reverse_lines(lines(&["abc", "", "xy"]))
            .await
            .unwrap()
            .map(|r| r.unwrap().line)
            .collect()
            .await;
        assert_eq!(output, vec!["cba", "", "yx"]);
    }
}
