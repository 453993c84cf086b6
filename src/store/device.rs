use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A device exactly as the discovery call returned it.
///
/// The cloud decides which fields are present; only `id` is relied on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Device(Map<String, Value>);

impl Device {
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Copy of this device with a `locked` field added.
    pub fn with_lock(&self, locked: bool) -> Device {
        let mut fields = self.0.clone();
        fields.insert("locked".into(), Value::Bool(locked));
        Device(fields)
    }
}

/// Requested on/off state for a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Off,
    On,
}

impl DeviceState {
    /// Wire value: 0 for off, 1 for on.
    pub fn value(self) -> u8 {
        match self {
            DeviceState::Off => 0,
            DeviceState::On => 1,
        }
    }

    /// Accepts 0/1, `true`/`false`, or the strings "0"/"1".
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(on) => Some(if *on { DeviceState::On } else { DeviceState::Off }),
            Value::Number(n) => n.as_i64().and_then(|n| DeviceState::try_from(n).ok()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|n| DeviceState::try_from(n).ok()),
            _ => None,
        }
    }
}

impl TryFrom<i64> for DeviceState {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeviceState::Off),
            1 => Ok(DeviceState::On),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_keeps_unknown_fields() {
        let device: Device = serde_json::from_value(json!({
            "id": "dev1",
            "name": "Lamp",
            "data": { "online": true, "state": false },
        }))
        .unwrap();

        assert_eq!(device.id(), Some("dev1"));
        assert_eq!(device.get("data").unwrap()["online"], json!(true));
        assert_eq!(serde_json::to_value(&device).unwrap()["name"], json!("Lamp"));
    }

    #[test]
    fn test_with_lock_adds_field_without_touching_original() {
        let device: Device = serde_json::from_value(json!({ "id": "dev1" })).unwrap();
        let view = device.with_lock(true);

        assert_eq!(view.get("locked"), Some(&json!(true)));
        assert!(device.get("locked").is_none());
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!(DeviceState::from_json(&json!(1)), Some(DeviceState::On));
        assert_eq!(DeviceState::from_json(&json!(0)), Some(DeviceState::Off));
        assert_eq!(DeviceState::from_json(&json!("1")), Some(DeviceState::On));
        assert_eq!(DeviceState::from_json(&json!(false)), Some(DeviceState::Off));
        assert_eq!(DeviceState::from_json(&json!(2)), None);
        assert_eq!(DeviceState::from_json(&json!(null)), None);
        assert_eq!(DeviceState::On.value(), 1);
    }
}
