use super::client::HttpClient;
use async_trait::async_trait;

/// Plain [`HttpClient`] over a shared `reqwest::Client`, used directly for
/// unauthenticated endpoints and as the innermost layer of the auth wrappers.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
