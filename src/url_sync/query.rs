//! Ordered query-string parameters with `URLSearchParams` semantics.

use reqwest::Url;

/// Ordered key/value pairs of a query string.
///
/// `set` replaces the first occurrence in place and drops later duplicates,
/// or appends when the key is new, so unrelated keys keep their position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the query of `url`.
    pub fn from_url(url: &Url) -> Self {
        Self {
            pairs: url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// Writes these parameters as the query of `url`; no parameters clears it.
    pub fn apply_to(&self, url: &mut Url) {
        if self.pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(self.pairs.iter());
        }
    }

    /// First value for `key`. Empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut index = 0;
                self.pairs.retain(|(k, _)| {
                    let keep = index <= first || k != key;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn delete(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// Sets `key` when `value` is non-empty, deletes it otherwise.
    pub fn set_or_delete(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.delete(key);
        } else {
            self.set(key, value);
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Unencoded `k=v&k=v` rendering, stable for use as a cache key.
    pub fn to_key_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}
