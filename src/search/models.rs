//! Search request and related data models

use crate::error::{OpenSerpError, Result};
use crate::network::ApiRequest;
use serde::{Deserialize, Serialize};

/// Smallest accepted result limit
pub const MIN_LIMIT: u32 = 1;

/// Largest accepted result limit
pub const MAX_LIMIT: u32 = 100;

/// Result limit used when none is given
pub const DEFAULT_LIMIT: u32 = 10;

/// Result ordering requested from the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Relevance,
    Date,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Date => "date",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search to run against the OpenSerp server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// The search query string
    pub text: String,
    /// Engines to query, in the order sent to the server. Empty means all.
    pub engines: Vec<String>,
    /// Number of results to return (1-100)
    pub limit: u32,
    /// Result offset for pagination
    pub offset: u32,
    /// Start date, `YYYYMMDD`
    pub date_from: Option<String>,
    /// End date, `YYYYMMDD`
    pub date_to: Option<String>,
    /// Language code (e.g. `EN`, `ES`, `FR`)
    pub language: Option<String>,
    pub sort: SortOrder,
}

impl SearchRequest {
    /// Create a request with default paging and no filters
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            engines: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            date_from: None,
            date_to: None,
            language: None,
            sort: SortOrder::default(),
        }
    }

    /// Restrict the search to the given engines
    pub fn with_engines<I, S>(mut self, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engines = engines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_date_from(mut self, date: impl Into<String>) -> Self {
        self.date_from = Some(date.into());
        self
    }

    pub fn with_date_to(mut self, date: impl Into<String>) -> Self {
        self.date_to = Some(date.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Check the request before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.text.is_empty() {
            return Err(OpenSerpError::validation(
                "Search text must be a non-empty string",
            ));
        }
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&self.limit) {
            return Err(OpenSerpError::validation(format!(
                "Limit must be between {} and {}",
                MIN_LIMIT, MAX_LIMIT
            )));
        }
        Ok(())
    }

    /// Cache key for this request
    ///
    /// Engines are sorted so that the same set in any order maps to the
    /// same key. Dates, language and sort order are not part of the key.
    pub fn cache_key(&self) -> String {
        let engines = if self.engines.is_empty() {
            "all".to_string()
        } else {
            let mut sorted: Vec<&str> = self.engines.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            sorted.join(",")
        };

        format!(
            "search:{}:{}:{}:{}",
            self.text, engines, self.limit, self.offset
        )
    }

    /// Build the HTTP request for `url`
    pub fn to_api_request(&self, url: impl Into<String>) -> ApiRequest {
        let mut request = ApiRequest::get(url)
            .param("text", self.text.as_str())
            .param("limit", self.limit.to_string())
            .param("offset", self.offset.to_string())
            .param("sort", self.sort.as_str());

        if !self.engines.is_empty() {
            request = request.param("engines", self.engines.join(","));
        }

        match (non_empty(&self.date_from), non_empty(&self.date_to)) {
            (Some(from), Some(to)) => request = request.param("date", format!("{}..{}", from, to)),
            (Some(from), None) => request = request.param("date_from", from),
            (None, Some(to)) => request = request.param("date_to", to),
            (None, None) => {}
        }

        if let Some(lang) = non_empty(&self.language) {
            request = request.param("lang", lang);
        }

        request
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&str> for SearchRequest {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SearchRequest {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Body of `GET /engines`
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct EnginesResponse {
    #[serde(default)]
    pub engines: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const URL: &str = "http://localhost:7000/mega/search";

    #[test]
    fn test_defaults() {
        let request = SearchRequest::new("rust");
        assert_eq!(request.limit, 10);
        assert_eq!(request.offset, 0);
        assert_eq!(request.sort, SortOrder::Relevance);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let empty = SearchRequest::new("");
        assert_eq!(empty.validate().unwrap_err().kind(), ErrorKind::Validation);

        for limit in [0, 101, u32::MAX] {
            let err = SearchRequest::new("rust").with_limit(limit).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(err.message(), "Limit must be between 1 and 100");
        }

        for limit in [1, 50, 100] {
            assert!(SearchRequest::new("rust").with_limit(limit).validate().is_ok());
        }
    }

    #[test]
    fn test_cache_key_ignores_engine_order() {
        let a = SearchRequest::new("rust").with_engines(["google", "bing", "yandex"]);
        let b = SearchRequest::new("rust").with_engines(["yandex", "google", "bing"]);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "search:rust:bing,google,yandex:10:0");
    }

    #[test]
    fn test_cache_key_without_engines() {
        let request = SearchRequest::new("rust").with_limit(5).with_offset(20);
        assert_eq!(request.cache_key(), "search:rust:all:5:20");
    }

    #[test]
    fn test_cache_key_distinguishes_paging() {
        let first = SearchRequest::new("rust").with_offset(0);
        let second = SearchRequest::new("rust").with_offset(10);
        assert_ne!(first.cache_key(), second.cache_key());
    }

    #[test]
    fn test_required_params() {
        let request = SearchRequest::new("rust programming")
            .with_limit(5)
            .to_api_request(URL);

        assert_eq!(request.url, URL);
        let keys: Vec<_> = request.params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["text", "limit", "offset", "sort"]);
        assert_eq!(request.param_value("text"), Some("rust programming"));
        assert_eq!(request.param_value("limit"), Some("5"));
        assert_eq!(request.param_value("sort"), Some("relevance"));
    }

    #[test]
    fn test_engines_keep_caller_order() {
        let request = SearchRequest::new("rust")
            .with_engines(["google", "bing"])
            .to_api_request(URL);
        assert_eq!(request.param_value("engines"), Some("google,bing"));
    }

    #[test]
    fn test_date_range_combined() {
        let request = SearchRequest::new("rust")
            .with_date_from("20240101")
            .with_date_to("20240201")
            .to_api_request(URL);

        assert_eq!(request.param_value("date"), Some("20240101..20240201"));
        assert_eq!(request.param_value("date_from"), None);
        assert_eq!(request.param_value("date_to"), None);
    }

    #[test]
    fn test_single_sided_dates() {
        let from = SearchRequest::new("rust")
            .with_date_from("20240101")
            .to_api_request(URL);
        assert_eq!(from.param_value("date_from"), Some("20240101"));
        assert_eq!(from.param_value("date"), None);
        assert_eq!(from.param_value("date_to"), None);

        let to = SearchRequest::new("rust")
            .with_date_to("20240201")
            .to_api_request(URL);
        assert_eq!(to.param_value("date_to"), Some("20240201"));
        assert_eq!(to.param_value("date"), None);
    }

    #[test]
    fn test_empty_optionals_are_omitted() {
        let request = SearchRequest::new("rust")
            .with_engines(Vec::<String>::new())
            .with_date_from("")
            .with_language("")
            .to_api_request(URL);

        assert_eq!(request.params.len(), 4);
        assert_eq!(request.param_value("engines"), None);
        assert_eq!(request.param_value("lang"), None);
    }

    #[test]
    fn test_language_and_sort() {
        let request = SearchRequest::new("rust")
            .with_language("EN")
            .with_sort(SortOrder::Date)
            .to_api_request(URL);
        assert_eq!(request.param_value("lang"), Some("EN"));
        assert_eq!(request.param_value("sort"), Some("date"));
    }

    #[test]
    fn test_engines_response_defaults() {
        let parsed: EnginesResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.engines.is_empty());

        let parsed: EnginesResponse =
            serde_json::from_str(r#"{"engines": ["google", "bing"]}"#).unwrap();
        assert_eq!(parsed.engines, ["google", "bing"]);
    }
}
