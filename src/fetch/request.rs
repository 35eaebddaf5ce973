use std::time::Duration;

use reqwest::{Method, Request, Url};

use crate::error::FetchError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to issue one GET, independent of any client.
///
/// A fresh [`Request`] is built from the descriptor for every attempt, since
/// a sent request cannot be replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(&self) -> Result<Request, FetchError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| FetchError::InvalidRequest(format!("bad url '{}': {e}", self.url)))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }

        let mut req = Request::new(Method::GET, url);
        *req.timeout_mut() = Some(self.timeout);
        Ok(req)
    }
}
