use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{CacheLayer, MemoizeError};
use crate::error::{AppError, ProxyError};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Image => "image",
            ContentKind::Video => "video",
        }
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ContentKind::Image),
            "video" => Ok(ContentKind::Video),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub kind: ContentKind,
    pub query: String,
    pub page: u32,
    pub page_size: u32,
}

impl SearchRequest {
    pub fn new(kind: ContentKind, query: impl Into<String>, page: u32) -> Self {
        Self {
            kind,
            query: query.into(),
            page,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Fingerprint used as the cache key: `{kind}_{query}_{page}`.
    pub fn cache_key(&self) -> String {
        format!("{}_{}_{}", self.kind, self.query, self.page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub thumbnail: String,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    #[serde(rename = "type")]
    pub kind: ContentKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub contents: Vec<Content>,
    pub total: u64,
}

/// An upstream content search API. Implementations report an upstream 429 as
/// [`ProxyError::RateLimited`].
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, ProxyError>;
}

/// A [`SearchProvider`] behind the cache layer.
pub struct CachedSearch {
    provider: Arc<dyn SearchProvider>,
    cache: CacheLayer,
    ttl: Duration,
}

impl CachedSearch {
    pub fn new(provider: Arc<dyn SearchProvider>, cache: CacheLayer, ttl: Duration) -> Self {
        Self { provider, cache, ttl }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResults, AppError> {
        if request.query.trim().is_empty() {
            return Err(AppError::ValidationError("query is required".into()));
        }
        if request.page == 0 {
            return Err(AppError::ValidationError("page starts at 1".into()));
        }

        let key = request.cache_key();
        self.cache
            .memoize(&key, self.ttl, || self.provider.search(request))
            .await
            .map_err(|e| {
                warn!("Search for {} failed: {}", key, e);
                match e {
                    MemoizeError::Producer(err) => AppError::ProxyError(err),
                    MemoizeError::Timeout(limit) => {
                        AppError::ProxyError(ProxyError::Timeout(limit.as_millis() as u64))
                    }
                }
            })
    }
}
