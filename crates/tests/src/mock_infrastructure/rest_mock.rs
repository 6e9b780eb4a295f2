//! mockito wrapper for REST endpoints serving JSON.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::Value;

/// One mock REST endpoint with the mocks registered on it.
pub struct RestMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl RestMockBuilder {
    /// Creates a builder around a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    /// Base URL to register as an endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Answers `GET path` with a 200 JSON body.
    pub async fn mock_json(&mut self, path: &str, body: &Value) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Answers `GET path` with a 200 JSON body exactly `hits` times over the test.
    pub async fn mock_json_expect(&mut self, path: &str, body: &Value, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(hits)
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Answers `GET path` with `status` and a short text body.
    pub async fn mock_status(&mut self, path: &str, status: usize) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(format!("upstream returned {status}"))
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Answers the liveness probe at `path` with an empty 200, at least `hits` times.
    pub async fn mock_liveness(&mut self, path: &str, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .with_status(200)
            .with_body("{}")
            .expect_at_least(hits)
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Removes every registered mock; later requests get mockito's 501.
    pub async fn reset(&mut self) -> &mut Self {
        for mock in self.mocks.drain(..) {
            mock.remove_async().await;
        }
        self
    }

    /// Asserts the hit expectations of every registered mock.
    pub async fn assert_all(&self) {
        for mock in &self.mocks {
            mock.assert_async().await;
        }
    }
}
