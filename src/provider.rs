pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::ProviderError;
use crate::model::PricePoint;

/// Source of daily closing prices.
///
/// Uses `BoxFuture` instead of `async fn` in trait to keep the trait
/// object-safe (`dyn PriceProvider`).
pub trait PriceProvider: Send + Sync {
    /// Fetch the configured history window of daily closes for `symbol`,
    /// oldest first. The caller validates the result into a `PriceSeries`.
    fn fetch_daily_closes(
        &self,
        symbol: &str,
    ) -> BoxFuture<'_, Result<Vec<PricePoint>, Report<ProviderError>>>;
}
