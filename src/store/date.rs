//! Selected year.

use crate::url_sync::{QueryParams, UrlSlice, KEY_YEAR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSelection {
    pub year: String,
}

impl DateSelection {
    pub fn new(default_year: &str) -> Self {
        Self {
            year: default_year.to_string(),
        }
    }
}

impl UrlSlice for DateSelection {
    fn keys(&self) -> &'static [&'static str] {
        &[KEY_YEAR]
    }

    fn encode(&self, params: &mut QueryParams) {
        params.set_or_delete(KEY_YEAR, &self.year);
    }

    fn decode(&mut self, params: &QueryParams) -> bool {
        match params.get(KEY_YEAR) {
            Some(year) if year != self.year => {
                self.year = year.to_string();
                true
            }
            _ => false,
        }
    }
}
