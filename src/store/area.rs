//! Selected province / area council.
//!
//! Selecting a province always clears the area council; selecting an area
//! council keeps the province it was drilled into.

use crate::url_sync::{QueryParams, UrlSlice, KEY_AREA_COUNCIL, KEY_PROVINCE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaSelection {
    pub province: String,
    pub area_council: String,
}

impl AreaSelection {
    pub fn select_province(&mut self, province: &str) {
        self.province = province.trim().to_string();
        self.area_council.clear();
    }

    pub fn select_area_council(&mut self, area_council: &str) {
        self.area_council = area_council.trim().to_string();
    }

    pub fn clear(&mut self) {
        self.province.clear();
        self.area_council.clear();
    }

    /// API filters for data requests: `area_council` first, then `province`.
    pub fn filters(&self) -> QueryParams {
        let mut filters = QueryParams::new();
        if !self.area_council.is_empty() {
            filters.set("area_council", self.area_council.as_str());
        }
        if !self.province.is_empty() {
            filters.set("province", self.province.as_str());
        }
        filters
    }
}

impl UrlSlice for AreaSelection {
    fn keys(&self) -> &'static [&'static str] {
        &[KEY_AREA_COUNCIL, KEY_PROVINCE]
    }

    fn encode(&self, params: &mut QueryParams) {
        params.set_or_delete(KEY_AREA_COUNCIL, &self.area_council);
        params.set_or_delete(KEY_PROVINCE, &self.province);
    }

    fn decode(&mut self, params: &QueryParams) -> bool {
        let mut changed = false;
        let ac = params.get(KEY_AREA_COUNCIL);

        if let Some(province) = params.get(KEY_PROVINCE) {
            if self.province != province {
                // an area council never outlives a switch of province
                if ac.is_none() && !self.area_council.is_empty() {
                    self.area_council.clear();
                }
                self.province = province.to_string();
                changed = true;
            }
        }
        if let Some(ac) = ac {
            changed |= self.area_council != ac;
            self.area_council = ac.to_string();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selecting_province_clears_area_council() {
        let mut area = AreaSelection::default();
        area.select_province("MALAMPA");
        area.select_area_council("Central Malekula");
        assert_eq!(area.filters().to_key_string(), "area_council=Central Malekula&province=MALAMPA");

        area.select_province("SHEFA");
        assert_eq!(area.area_council, "");
        assert_eq!(area.filters().to_key_string(), "province=SHEFA");
    }

    #[test]
    fn test_encode_deletes_cleared_keys() {
        let mut params = QueryParams::new();
        params.set("ac", "Central Malekula");
        params.set("layers", "t1");

        let area = AreaSelection {
            province: "SHEFA".to_string(),
            area_council: String::new(),
        };
        area.encode(&mut params);

        assert_eq!(params.to_key_string(), "layers=t1&province=SHEFA");
    }

    #[test]
    fn test_decode_applies_only_present_keys() {
        let mut area = AreaSelection {
            province: "TAFEA".to_string(),
            area_council: String::new(),
        };
        let mut params = QueryParams::new();
        params.set("ac", "Whitesands");

        assert!(area.decode(&params));
        assert_eq!(area.province, "TAFEA");
        assert_eq!(area.area_council, "Whitesands");
        assert!(!area.decode(&params));
    }

    #[test]
    fn test_decode_new_province_without_ac_clears_area_council() {
        let mut area = AreaSelection {
            province: "MALAMPA".to_string(),
            area_council: "Central Malekula".to_string(),
        };
        let mut params = QueryParams::new();
        params.set("province", "SHEFA");

        assert!(area.decode(&params));
        assert_eq!(area.filters().to_key_string(), "province=SHEFA");

        // same province, no ac: the selection is left alone
        area.select_area_council("Port Vila");
        assert!(!area.decode(&params));
        assert_eq!(area.area_council, "Port Vila");
    }
}
