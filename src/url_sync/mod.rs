//! Query-string synchronization of dashboard state.
//!
//! Each state slice owns a disjoint set of query keys and knows how to
//! encode itself into, and decode itself from, the document's query
//! string. Writes replace the current history entry; they never push.

pub mod history;
pub mod query;

pub use history::History;
pub use query::QueryParams;

/// Query key for the selected area council.
pub const KEY_AREA_COUNCIL: &str = "ac";
pub const KEY_PROVINCE: &str = "province";
pub const KEY_YEAR: &str = "year";
pub const KEY_LAYERS: &str = "layers";
pub const KEY_LONGITUDE: &str = "lng";
pub const KEY_LATITUDE: &str = "lat";
pub const KEY_ZOOM: &str = "zoom";

/// A state slice persisted in the query string.
pub trait UrlSlice {
    /// Keys this slice reads and writes. No two slices share a key.
    fn keys(&self) -> &'static [&'static str];

    /// Sets or deletes this slice's keys. Other keys are left untouched.
    fn encode(&self, params: &mut QueryParams);

    /// Applies the keys present in `params`; absent keys keep current values.
    /// Returns whether anything changed.
    fn decode(&mut self, params: &QueryParams) -> bool;
}

/// Writes one slice into the current location, replacing the history entry.
pub fn write_slice<S: UrlSlice + ?Sized>(history: &mut History, slice: &S) {
    let mut url = history.location().clone();
    let mut params = QueryParams::from_url(&url);
    slice.encode(&mut params);
    params.apply_to(&mut url);

    if url != *history.location() {
        history.replace_state(url);
    }
}

/// Reads one slice from the current location.
pub fn read_slice<S: UrlSlice + ?Sized>(history: &History, slice: &mut S) -> bool {
    let params = QueryParams::from_url(history.location());
    slice.decode(&params)
}

/// Fixed 4-decimal rendering for longitude/latitude.
pub fn format_coordinate(value: f64) -> String {
    format!("{:.4}", value)
}

/// Fixed 1-decimal rendering for zoom.
pub fn format_zoom(value: f64) -> String {
    format!("{:.1}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    struct Year(String);

    impl UrlSlice for Year {
        fn keys(&self) -> &'static [&'static str] {
            &[KEY_YEAR]
        }

        fn encode(&self, params: &mut QueryParams) {
            params.set_or_delete(KEY_YEAR, &self.0);
        }

        fn decode(&mut self, params: &QueryParams) -> bool {
            match params.get(KEY_YEAR) {
                Some(year) if year != self.0 => {
                    self.0 = year.to_string();
                    true
                }
                _ => false,
            }
        }
    }

    #[test]
    fn test_write_slice_keeps_foreign_keys() {
        let mut history =
            History::new(Url::parse("https://map.example/?layers=t1&year=2020").unwrap());
        write_slice(&mut history, &Year("2023".to_string()));

        assert_eq!(history.location().query(), Some("layers=t1&year=2023"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_read_slice_ignores_absent_keys() {
        let history = History::new(Url::parse("https://map.example/?layers=t1").unwrap());
        let mut year = Year("2024".to_string());

        assert!(!read_slice(&history, &mut year));
        assert_eq!(year.0, "2024");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_coordinate(168.014), "168.0140");
        assert_eq!(format_coordinate(-16.74123), "-16.7412");
        assert_eq!(format_zoom(7.0), "7.0");
        assert_eq!(format_zoom(7.26), "7.3");
    }
}
