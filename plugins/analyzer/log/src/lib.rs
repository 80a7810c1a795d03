use std::future::Future;
use std::pin::Pin;

use settle_api::{AnalyzeError, Analyzer};

/// Analyzer used when no analysis service is configured: logs and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnalyzer;

impl LogAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for LogAnalyzer {
    fn analyze<'a>(
        &'a self,
        sender: &'a str,
        link: &'a str,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalyzeError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(sender = %sender, link = %link, chars = content.chars().count(), "analysis (log only)");
            Ok(())
        })
    }
}
