use std::future::Future;
use std::pin::Pin;

use crate::error::AnalyzeError;

/// The downstream analysis step invoked once per flushed message.
///
/// Implementations are opaque to the batching core: it only sees the outcome.
/// Calls for one channel are made sequentially, in arrival order.
pub trait Analyzer: Send + Sync {
    fn analyze<'a>(
        &'a self,
        sender: &'a str,
        link: &'a str,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalyzeError>> + Send + 'a>>;
}
