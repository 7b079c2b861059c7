//! Shareable location carrying the current record id as a query parameter.

use anyhow::{Context, Result};
use std::fmt;
use url::Url;

/// Query parameter holding the record id.
pub const ID_PARAM: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Location {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).with_context(|| format!("invalid location: {raw}"))?;
        Ok(Self { url })
    }

    /// Record id named by the location, if any. Blank values count as absent.
    pub fn current_id(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == ID_PARAM)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// The location that shows record `id`; every other query parameter is kept in order.
    pub fn navigate_to(&self, id: &str) -> Location {
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != ID_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair(ID_PARAM, id);
            for (k, v) in &kept {
                query.append_pair(k, v);
            }
        }
        Location { url }
    }

    /// Query-only link (`?id=...`) suitable for relative hrefs on a page.
    pub fn relative_href(&self) -> String {
        format!("?{}", self.url.query().unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_id_parameter() {
        let loc = Location::parse("http://localhost/?id=2017877547").unwrap();
        assert_eq!(loc.current_id().as_deref(), Some("2017877547"));
        let blank = Location::parse("http://localhost/?id=%20").unwrap();
        assert_eq!(blank.current_id(), None);
        let none = Location::parse("http://localhost/").unwrap();
        assert_eq!(none.current_id(), None);
    }

    #[test]
    fn navigate_rewrites_id_and_keeps_other_params() {
        let loc = Location::parse("http://localhost/viz/?lang=en&id=1").unwrap();
        let next = loc.navigate_to("2");
        assert_eq!(next.current_id().as_deref(), Some("2"));
        assert_eq!(next.as_str(), "http://localhost/viz/?id=2&lang=en");
        assert_eq!(next.relative_href(), "?id=2&lang=en");
        // The source location is untouched.
        assert_eq!(loc.current_id().as_deref(), Some("1"));
    }
}
