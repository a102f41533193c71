use async_trait::async_trait;
use reqwest::{Request, Response};

/// Minimal HTTP execution seam so agency credentials can be layered on as
/// wrappers and tests can substitute canned transports.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
