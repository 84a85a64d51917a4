//! Display records reshaped from vendor API payloads.
//!
//! The vendor schema is partly guessed, so every constructor here reads
//! from `serde_json::Value` with candidate key fallbacks instead of a
//! strict derive against one assumed shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::format::format_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: String,
    pub name: String,
    pub pet_name: String,
    pub model: String,
    pub firmware: String,
    pub battery_level: i64,
    pub charging: bool,
    pub last_seen: Option<String>,
}

impl Tracker {
    pub fn from_api(raw: &Value) -> Self {
        Self {
            id: str_field(raw, &["_id", "id"]),
            name: str_field(raw, &["name"]),
            pet_name: str_field(raw, &["pet_name"]),
            model: str_field(raw, &["model_number", "model"]),
            firmware: str_field(raw, &["fw_version", "firmware"]),
            battery_level: raw.get("battery_level").and_then(Value::as_i64).unwrap_or(0),
            charging: raw.get("charging").and_then(Value::as_bool).unwrap_or(false),
            last_seen: format_timestamp(
                raw.get("time")
                    .or_else(|| raw.get("time_of_last_position_update")),
            ),
        }
    }
}

/// Reduced row for `trackers --battery-only`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub id: String,
    pub battery_level: i64,
}

impl From<&Tracker> for BatteryReading {
    fn from(tracker: &Tracker) -> Self {
        Self {
            id: tracker.id.clone(),
            battery_level: tracker.battery_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub time: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
}

impl Position {
    pub fn from_api(raw: &Value) -> Self {
        // Some endpoints report a flat lat/lng pair, others a latlong array.
        let latlong = raw.get("latlong").and_then(Value::as_array);
        let coord = |index: usize| {
            latlong
                .and_then(|pair| pair.get(index))
                .and_then(Value::as_f64)
        };
        Self {
            time: format_timestamp(raw.get("time")),
            lat: raw.get("lat").and_then(Value::as_f64).or_else(|| coord(0)),
            lng: raw.get("lng").and_then(Value::as_f64).or_else(|| coord(1)),
            speed: raw.get("speed").and_then(Value::as_f64),
            accuracy: raw
                .get("accuracy")
                .or_else(|| raw.get("pos_uncertainty"))
                .and_then(Value::as_f64),
            altitude: raw.get("altitude").and_then(Value::as_f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub name: String,
    #[serde(rename = "type")]
    pub fence_type: String,
    pub enabled: bool,
    pub coordinates: Value,
    pub radius: Option<f64>,
}

impl Geofence {
    pub fn from_api(raw: &Value) -> Self {
        Self {
            name: str_field(raw, &["name"]),
            fence_type: str_field(raw, &["type"]),
            enabled: raw.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            coordinates: raw
                .get("coordinates")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            radius: raw.get("radius").and_then(Value::as_f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub tracker_id: String,
    pub battery_level: i64,
    pub firmware_version: String,
    pub model: String,
    pub capabilities: Value,
    pub hardware_id: String,
    pub charging: bool,
}

impl HardwareInfo {
    pub fn from_api(tracker_id: &str, raw: &Value) -> Self {
        Self {
            tracker_id: tracker_id.to_string(),
            battery_level: raw.get("battery_level").and_then(Value::as_i64).unwrap_or(0),
            firmware_version: str_field(raw, &["fw_version", "firmware"]),
            model: str_field(raw, &["model_number", "model"]),
            capabilities: raw
                .get("capabilities")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            hardware_id: str_field(raw, &["hw_id", "hardware_id"]),
            charging: raw.get("charging").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveTrackingState {
    pub tracker_id: String,
    pub live_tracking: bool,
    pub status: String,
}

impl LiveTrackingState {
    pub fn new(tracker_id: &str, enabled: bool) -> Self {
        Self {
            tracker_id: tracker_id.to_string(),
            live_tracking: enabled,
            status: if enabled { "enabled" } else { "disabled" }.to_string(),
        }
    }

    /// The vendor endpoint for reading live-mode state is unknown, so the
    /// dashboard reports an explicit unknown default instead of guessing.
    pub fn unknown(tracker_id: &str) -> Self {
        Self {
            tracker_id: tracker_id.to_string(),
            live_tracking: false,
            status: "unknown".to_string(),
        }
    }
}

fn str_field(raw: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tracker_reshapes_vendor_fields() {
        let raw = json!({
            "_id": "ABCDEF12",
            "name": "Collar",
            "pet_name": "Rex",
            "model_number": "CAT-4",
            "fw_version": "2.1.0",
            "battery_level": 83,
            "charging": true,
            "time": 1758800000
        });
        let tracker = Tracker::from_api(&raw);
        assert_eq!(tracker.id, "ABCDEF12");
        assert_eq!(tracker.pet_name, "Rex");
        assert_eq!(tracker.model, "CAT-4");
        assert_eq!(tracker.firmware, "2.1.0");
        assert_eq!(tracker.battery_level, 83);
        assert!(tracker.charging);
        assert_eq!(tracker.last_seen.as_deref(), Some("2025-09-25T11:33:20Z"));
    }

    #[test]
    fn tracker_defaults_on_missing_fields() {
        let tracker = Tracker::from_api(&json!({"_id": "X"}));
        assert_eq!(tracker.id, "X");
        assert_eq!(tracker.name, "");
        assert_eq!(tracker.battery_level, 0);
        assert!(!tracker.charging);
        assert_eq!(tracker.last_seen, None);
    }

    #[test]
    fn position_prefers_flat_lat_lng() {
        let raw = json!({
            "time": "2025-09-25T12:00:00Z",
            "lat": 48.2,
            "lng": 16.4,
            "speed": 1.5,
            "accuracy": 12.0,
            "altitude": 180.0
        });
        let position = Position::from_api(&raw);
        assert_eq!(position.lat, Some(48.2));
        assert_eq!(position.lng, Some(16.4));
        assert_eq!(position.accuracy, Some(12.0));
    }

    #[test]
    fn position_falls_back_to_latlong_array() {
        let raw = json!({
            "time": 1758800000,
            "latlong": [48.2, 16.4],
            "pos_uncertainty": 9.0
        });
        let position = Position::from_api(&raw);
        assert_eq!(position.lat, Some(48.2));
        assert_eq!(position.lng, Some(16.4));
        assert_eq!(position.accuracy, Some(9.0));
        assert_eq!(position.time.as_deref(), Some("2025-09-25T11:33:20Z"));
    }

    #[test]
    fn geofence_keeps_raw_coordinates() {
        let raw = json!({
            "name": "Garden",
            "type": "circle",
            "enabled": true,
            "coordinates": [[48.2, 16.4]],
            "radius": 25.0
        });
        let fence = Geofence::from_api(&raw);
        assert_eq!(fence.name, "Garden");
        assert_eq!(fence.fence_type, "circle");
        assert!(fence.enabled);
        assert_eq!(fence.coordinates, json!([[48.2, 16.4]]));
        assert_eq!(fence.radius, Some(25.0));
    }

    #[test]
    fn hardware_info_reads_detail_payload() {
        let raw = json!({
            "battery_level": 60,
            "fw_version": "2.1.0",
            "model_number": "CAT-4",
            "capabilities": ["live_tracking", "led"],
            "hw_id": "HW-77",
            "charging": false
        });
        let hw = HardwareInfo::from_api("ABCDEF12", &raw);
        assert_eq!(hw.tracker_id, "ABCDEF12");
        assert_eq!(hw.battery_level, 60);
        assert_eq!(hw.hardware_id, "HW-77");
        assert_eq!(hw.capabilities, json!(["live_tracking", "led"]));
    }
}
