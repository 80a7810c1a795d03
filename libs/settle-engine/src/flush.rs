use std::sync::Arc;

use settle_api::{Analyzer, FlushReport};

use crate::record::BatchRecord;

/// Hands every message of a detached batch to the analyzer.
///
/// Messages are analyzed one after another in arrival order. A failed call is
/// logged and counted; it never stops the rest of the batch and is not retried.
pub struct FlushProcessor {
    analyzer: Arc<dyn Analyzer>,
}

impl FlushProcessor {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self { analyzer }
    }

    pub async fn process(&self, batch: BatchRecord) -> FlushReport {
        let channel_id = batch.channel_id().to_string();
        let messages = batch.into_messages();
        let mut report = FlushReport {
            channel_id,
            attempted: messages.len(),
            succeeded: 0,
            failed: 0,
        };
        if messages.is_empty() {
            return report;
        }

        tracing::info!(channel = %report.channel_id, messages = report.attempted, "flushing batch");

        for (index, message) in messages.iter().enumerate() {
            match self
                .analyzer
                .analyze(&message.sender, &message.link, &message.content)
                .await
            {
                Ok(()) => {
                    report.succeeded += 1;
                    tracing::debug!(
                        channel = %report.channel_id,
                        index,
                        sender = %message.sender,
                        "message analyzed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        channel = %report.channel_id,
                        index,
                        sender = %message.sender,
                        link = %message.link,
                        error = %e,
                        "message analysis failed"
                    );
                }
            }
        }

        tracing::info!(
            channel = %report.channel_id,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "batch flushed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;

    use settle_api::{AnalyzeError, Message};

    use super::*;

    /// Records every call; fails for content equal to "boom".
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl Analyzer for Recorder {
        fn analyze<'a>(
            &'a self,
            sender: &'a str,
            link: &'a str,
            content: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(), AnalyzeError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((sender.to_string(), link.to_string(), content.to_string()));
                if content == "boom" {
                    Err(AnalyzeError::rejected("boom"))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn batch(contents: &[&str]) -> BatchRecord {
        let mut iter = contents.iter().enumerate().map(|(i, c)| {
            Message::new(format!("U{i}"), *c, format!("https://example.com/{i}"))
        });
        let mut record = BatchRecord::new("C1", iter.next().unwrap(), Duration::from_secs(30));
        for m in iter {
            record.push(m);
        }
        record
    }

    #[tokio::test]
    async fn analyzes_in_arrival_order_with_context() {
        let recorder = Arc::new(Recorder::default());
        let processor = FlushProcessor::new(recorder.clone());

        let report = processor.process(batch(&["a", "b", "c"])).await;
        assert_eq!(
            report,
            FlushReport {
                channel_id: "C1".into(),
                attempted: 3,
                succeeded: 3,
                failed: 0
            }
        );

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("U0".into(), "https://example.com/0".into(), "a".into()),
                ("U1".into(), "https://example.com/1".into(), "b".into()),
                ("U2".into(), "https://example.com/2".into(), "c".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_batch() {
        let recorder = Arc::new(Recorder::default());
        let processor = FlushProcessor::new(recorder.clone());

        let report = processor.process(batch(&["a", "boom", "c", "d"])).await;
        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 1);

        let contents: Vec<_> = recorder
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, c)| c.clone())
            .collect();
        assert_eq!(contents, ["a", "boom", "c", "d"]);
    }
}
