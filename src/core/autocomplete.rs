use crate::domain::model::Voucher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_ENTRIES_PER_FIELD: usize = 50;
pub const MAX_SUGGESTIONS: usize = 5;
pub const MIN_QUERY_CHARS: usize = 2;

/// Previously typed values per form field, oldest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutocompleteDictionary {
    fields: BTreeMap<String, Vec<String>>,
}

impl AutocompleteDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` unless it is already known; drops the oldest entries
    /// past the per-field capacity. Returns whether anything changed.
    pub fn insert(&mut self, field: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }

        let values = self.fields.entry(field.to_string()).or_default();
        if values.iter().any(|v| v == value) {
            return false;
        }

        values.push(value.to_string());
        if values.len() > MAX_ENTRIES_PER_FIELD {
            let excess = values.len() - MAX_ENTRIES_PER_FIELD;
            values.drain(..excess);
        }
        true
    }

    pub fn values(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn suggestions(&self, field: &str, query: &str) -> Vec<&str> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }

        let needle = query.to_lowercase();
        self.values(field)
            .iter()
            .filter(|v| v.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .map(String::as_str)
            .collect()
    }

    /// Learns the free-text values of a saved voucher.
    pub fn record_voucher(&mut self, voucher: &Voucher) {
        for destination in &voucher.destinations {
            self.insert("destination", &destination.destination);
        }
        self.insert("boarding-location", &voucher.boarding_location);
        for passenger in &voucher.passengers {
            self.insert("passenger", passenger);
        }
        self.insert("observations", &voucher.observations);
        self.insert("contractor-name", &voucher.contractor_name);
        self.insert("contractor-phone1", &voucher.contractor_phone1);
        self.insert("contractor-phone2", &voucher.contractor_phone2);
        self.insert("contractor-email", &voucher.contractor_email);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut dict = AutocompleteDictionary::new();
        assert!(dict.insert("destination", "Fortaleza"));
        assert!(!dict.insert("destination", "Fortaleza"));
        assert_eq!(dict.values("destination"), ["Fortaleza".to_string()]);
    }

    #[test]
    fn test_capacity_keeps_most_recent() {
        let mut dict = AutocompleteDictionary::new();
        for i in 0..60 {
            dict.insert("passenger", &format!("Passenger {i}"));
        }

        let values = dict.values("passenger");
        assert_eq!(values.len(), MAX_ENTRIES_PER_FIELD);
        assert_eq!(values.first().unwrap(), "Passenger 10");
        assert_eq!(values.last().unwrap(), "Passenger 59");
    }

    #[test]
    fn test_suggestions_filter_case_insensitively() {
        let mut dict = AutocompleteDictionary::new();
        for place in [
            "Beach Park",
            "Cumbuco",
            "Parque do Cocó",
            "Lagoinha",
            "Park Aquaville",
            "Parkland",
            "Park Central",
            "Parkside",
        ] {
            dict.insert("destination", place);
        }

        assert!(dict.suggestions("destination", "p").is_empty());
        let hits = dict.suggestions("destination", "PAR");
        assert_eq!(hits.len(), MAX_SUGGESTIONS);
        assert_eq!(hits[0], "Beach Park");
        assert!(dict.suggestions("passenger", "par").is_empty());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut dict = AutocompleteDictionary::new();
        dict.insert("destination", "Cumbuco");
        let json = serde_json::to_value(&dict).unwrap();
        assert_eq!(json, serde_json::json!({"destination": ["Cumbuco"]}));
    }
}
