pub mod openai;

use error_stack::Report;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::NarrativeError;

/// Turns a strategy prompt into free-form narrative text.
///
/// Implementations bound each call by their own timeout and return
/// `NarrativeError::Cancelled` as soon as `cancel` is triggered.
pub trait NarrativeService: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<String, Report<NarrativeError>>>;
}
