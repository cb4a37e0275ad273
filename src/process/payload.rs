use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RawRecord, RATE_KEY, YEAR_KEY};

/// Key wrapping the payload inside a work item.
pub const TRAFFIC_DATA_KEY: &str = "traffic_data";

/// The three fields sent downstream for one country.
///
/// `year` and `rate` carry the source values untouched (`"2015-2019"` stays a
/// string); only a missing value is replaced, by `""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficPayload {
    #[serde(default)]
    pub country: String,
    #[serde(default = "blank")]
    pub year: Value,
    #[serde(default = "blank")]
    pub rate: Value,
}

fn blank() -> Value {
    Value::String(String::new())
}

impl Default for TrafficPayload {
    fn default() -> Self {
        Self {
            country: String::new(),
            year: blank(),
            rate: blank(),
        }
    }
}

impl TrafficPayload {
    pub fn new(country: impl Into<String>, year: impl Into<Value>, rate: impl Into<Value>) -> Self {
        Self {
            country: country.into(),
            year: year.into(),
            rate: rate.into(),
        }
    }

    pub fn from_record(rec: &RawRecord) -> Self {
        Self {
            country: rec.spatial_dim.clone().unwrap_or_default(),
            year: rec.fields.get(YEAR_KEY).cloned().unwrap_or_else(blank),
            rate: rec.fields.get(RATE_KEY).cloned().unwrap_or_else(blank),
        }
    }

    /// `{"traffic_data": {...}}`, the body of one work item.
    pub fn to_work_item_payload(&self) -> serde_json::Result<Value> {
        let mut map = serde_json::Map::new();
        map.insert(TRAFFIC_DATA_KEY.to_string(), serde_json::to_value(self)?);
        Ok(Value::Object(map))
    }

    /// Extract the payload from a work item body. Fails only when
    /// `traffic_data` is missing or not an object, or `country` is not a string.
    pub fn from_work_item_payload(payload: &Value) -> Result<Self, String> {
        let data = payload
            .get(TRAFFIC_DATA_KEY)
            .ok_or_else(|| format!("missing `{}`", TRAFFIC_DATA_KEY))?;
        Self::deserialize(data).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projection_of_full_record() {
        let rec = RawRecord::from_value(json!({
            "SpatialDim": "USA", "TimeDim": 2015, "Dim1": "BTSX", "NumericValue": 2.1, "Id": 9
        }));
        let p = TrafficPayload::from_record(&rec);
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({"country": "USA", "year": 2015, "rate": 2.1})
        );
    }

    #[test]
    fn test_projection_keeps_raw_year() {
        let rec = RawRecord::from_value(json!({
            "SpatialDim": "USA", "TimeDim": "2015-2019", "Dim1": "BTSX", "NumericValue": 2.1
        }));
        let p = TrafficPayload::from_record(&rec);
        assert_eq!(p.year, json!("2015-2019"));

        let body = p.to_work_item_payload().unwrap();
        assert_eq!(
            body,
            json!({"traffic_data": {"country": "USA", "year": "2015-2019", "rate": 2.1}})
        );
        assert_eq!(TrafficPayload::from_work_item_payload(&body).unwrap(), p);
    }

    #[test]
    fn test_missing_fields_become_empty_strings() {
        let p = TrafficPayload::from_record(&RawRecord::default());
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({"country": "", "year": "", "rate": ""})
        );
        assert_eq!(p, TrafficPayload::default());
    }

    #[test]
    fn test_work_item_wrapping() {
        let p = TrafficPayload::new("FRA", 2020, 3.0);
        let body = p.to_work_item_payload().unwrap();
        assert_eq!(
            body,
            json!({"traffic_data": {"country": "FRA", "year": 2020, "rate": 3.0}})
        );
        assert_eq!(TrafficPayload::from_work_item_payload(&body).unwrap(), p);
    }

    #[test]
    fn test_decode_passes_year_and_rate_through() {
        let p = TrafficPayload::from_work_item_payload(&json!({
            "traffic_data": {"country": "US", "year": 2015.5, "rate": true}
        }))
        .unwrap();
        assert_eq!(p.country, "US");
        assert_eq!(p.year, json!(2015.5));
        assert_eq!(p.rate, json!(true));

        let p = TrafficPayload::from_work_item_payload(&json!({"traffic_data": {}})).unwrap();
        assert_eq!(p, TrafficPayload::default());
    }

    #[test]
    fn test_decode_errors() {
        assert!(TrafficPayload::from_work_item_payload(&json!({"other": 1})).is_err());
        assert!(TrafficPayload::from_work_item_payload(&json!({"traffic_data": 7})).is_err());
        assert!(
            TrafficPayload::from_work_item_payload(&json!({"traffic_data": {"country": 12}}))
                .is_err()
        );
    }
}
