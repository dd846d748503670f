use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{error::CollaboratorError, inference::bounded, rate_limiter::RateLimiter};

/// Collaborator name used in errors and logs.
pub const SEARCH_SERVICE: &str = "search";

/// Encyclopedic, educational, governmental, and major-news domains that
/// cross-verification is restricted to.
pub const AUTHORITATIVE_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "britannica.com",
    "nationalgeographic.com",
    "smithsonianmag.com",
    "history.com",
    "nasa.gov",
    "noaa.gov",
    "nih.gov",
    "cdc.gov",
    "who.int",
    "un.org",
    "unesco.org",
    "loc.gov",
    "archives.gov",
    "harvard.edu",
    "stanford.edu",
    "mit.edu",
    "ox.ac.uk",
    "cam.ac.uk",
    "bbc.com",
    "bbc.co.uk",
    "reuters.com",
    "apnews.com",
    "nytimes.com",
    "theguardian.com",
];

/// Query sent to the search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query.
    pub text: String,
    /// Domains results must come from.
    pub include_domains: Vec<String>,
    /// Maximum number of hits.
    pub max_results: usize,
    /// Excerpt length requested per hit.
    pub excerpt_chars: usize,
}

/// Ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Retrieved page text excerpt.
    pub excerpt: String,
}

/// Web-search-and-content-retrieval collaborator.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    /// Executes the search returning ranked hits.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CollaboratorError>;
}

/// Search-and-contents HTTP API client (`includeDomains` + text contents).
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpSearchClient {
    /// Builds a client for the search `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .user_agent("factguard/0.1")
            .build()
            .map_err(|err| CollaboratorError::transport(SEARCH_SERVICE, err))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        })
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResponseHit>,
}

#[derive(Deserialize)]
struct SearchResponseHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl WebSearchClient for HttpSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CollaboratorError> {
        let mut call = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&json!({
                "query": query.text,
                "numResults": query.max_results,
                "includeDomains": query.include_domains,
                "contents": { "text": { "maxCharacters": query.excerpt_chars } },
            }));
        if let Some(key) = &self.api_key {
            call = call.header("x-api-key", key);
        }
        let response = call
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SEARCH_SERVICE, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                service: SEARCH_SERVICE,
                status: status.as_u16(),
            });
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::schema(SEARCH_SERVICE, err))?;
        Ok(body
            .results
            .into_iter()
            .map(|hit| SearchHit {
                title: hit.title.unwrap_or_default(),
                url: hit.url,
                excerpt: hit.text.unwrap_or_default(),
            })
            .collect())
    }
}

/// Canned hits for tests and offline runs.
#[derive(Debug, Default)]
pub struct LoopbackSearchClient {
    hits: Vec<SearchHit>,
    failure: Option<String>,
    queries: Mutex<Vec<SearchQuery>>,
    served_at: Mutex<Vec<DateTime<Utc>>>,
}

impl LoopbackSearchClient {
    /// Always returns `hits`.
    #[must_use]
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    /// Always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().clone()
    }

    /// Instants at which queries were served.
    #[must_use]
    pub fn served_at(&self) -> Vec<DateTime<Utc>> {
        self.served_at.lock().clone()
    }
}

#[async_trait]
impl WebSearchClient for LoopbackSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CollaboratorError> {
        self.queries.lock().push(query.clone());
        self.served_at.lock().push(Utc::now());
        if let Some(message) = &self.failure {
            return Err(CollaboratorError::transport(SEARCH_SERVICE, message));
        }
        Ok(self.hits.iter().take(query.max_results).cloned().collect())
    }
}

/// Rate-limited, domain-restricted front for a search collaborator.
#[derive(Clone)]
pub struct WebSearcher {
    client: Arc<dyn WebSearchClient>,
    limiter: Arc<RateLimiter>,
    domains: Vec<String>,
    max_results: usize,
    excerpt_chars: usize,
    timeout: Duration,
}

impl fmt::Debug for WebSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSearcher")
            .field("domains", &self.domains.len())
            .field("max_results", &self.max_results)
            .field("min_interval", &self.limiter.min_interval())
            .finish()
    }
}

impl WebSearcher {
    /// Creates a searcher sharing `limiter` with every other searcher in the process.
    #[must_use]
    pub fn new(client: Arc<dyn WebSearchClient>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            limiter,
            domains: AUTHORITATIVE_DOMAINS.iter().map(|d| (*d).to_string()).collect(),
            max_results: 5,
            excerpt_chars: 1_000,
            timeout: Duration::from_secs(10),
        }
    }

    /// Replaces the domain allow-list.
    #[must_use]
    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        if !domains.is_empty() {
            self.domains = domains;
        }
        self
    }

    /// Sets the hit ceiling per query.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Waits for a rate-limit slot, then searches the allow-listed domains.
    pub async fn search(&self, text: &str) -> Result<Vec<SearchHit>, CollaboratorError> {
        let query = SearchQuery {
            text: text.to_string(),
            include_domains: self.domains.clone(),
            max_results: self.max_results,
            excerpt_chars: self.excerpt_chars,
        };
        self.limiter.acquire().await;
        bounded(SEARCH_SERVICE, self.timeout, self.client.search(&query)).await
    }
}
