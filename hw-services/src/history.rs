//! Historical data collaborator.
//!
//! The supervisor backfills its buckets from this source after every
//! successful connection and on refresh. It is a plain request/response
//! interface; retries are the caller's business.

use async_trait::async_trait;

use hw_api::ApiClient;
use hw_core::error::HwResult;
use hw_models::{BackendEvent, NewsArticle};

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Historical non-insight events.
    async fn fetch_events(&self) -> HwResult<Vec<BackendEvent>>;

    /// Historical insights.
    async fn fetch_insights(&self) -> HwResult<Vec<BackendEvent>>;

    async fn fetch_news(&self) -> HwResult<Vec<NewsArticle>>;
}

#[async_trait]
impl HistorySource for ApiClient {
    async fn fetch_events(&self) -> HwResult<Vec<BackendEvent>> {
        self.events().await
    }

    async fn fetch_insights(&self) -> HwResult<Vec<BackendEvent>> {
        self.insights().await
    }

    async fn fetch_news(&self) -> HwResult<Vec<NewsArticle>> {
        self.news().await
    }
}
