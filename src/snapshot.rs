//! Typed TeslaFi telemetry snapshot.
//!
//! TeslaFi mirrors the Tesla owner API but serialises most values as strings
//! (`"72"`, `"True"`, `"1"`) and uses `""` or `null` for values it does not
//! know, typically while the car sleeps. Every field is therefore optional and
//! decoded leniently: anything that cannot be read as the expected type is
//! treated as absent. Keys not listed here are ignored.
//!
//! A few drive and charge fields are reported as `null` or `""` when the car
//! is parked or unplugged. For those a present-but-empty value means "none"
//! (speed 0, state `"None"`) rather than "unknown".

use serde::Deserialize;

/// Last reported state of a single vehicle.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Snapshot {
    // Identity
    #[serde(default, deserialize_with = "lenient::text")]
    pub vin: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub vehicle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub option_codes: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub exterior_color: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub roof_color: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub measure: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub eu_vehicle: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub rhd: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub motorized_charge_port: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub spoiler_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub third_row_seats: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub car_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub rear_seat_heaters: Option<String>,

    // Software and status
    #[serde(default, deserialize_with = "lenient::text")]
    pub vehicle_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub car_version: Option<String>,
    #[serde(default, rename = "newVersion", deserialize_with = "lenient::text")]
    pub new_version: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub wheel_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub api_version: Option<String>,

    // TeslaFi bookkeeping
    #[serde(default, deserialize_with = "lenient::number")]
    pub data_id: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub polling: Option<bool>,
    #[serde(default, rename = "idleTime", deserialize_with = "lenient::number")]
    pub idle_time: Option<f64>,
    #[serde(default, rename = "idleNumber", deserialize_with = "lenient::number")]
    pub idle_number: Option<f64>,
    #[serde(default, rename = "sleepNumber", deserialize_with = "lenient::number")]
    pub sleep_number: Option<f64>,
    #[serde(default, rename = "driveNumber", deserialize_with = "lenient::number")]
    pub drive_number: Option<f64>,
    #[serde(default, rename = "chargeNumber", deserialize_with = "lenient::number")]
    pub charge_number: Option<f64>,
    #[serde(default, rename = "carState", deserialize_with = "lenient::text")]
    pub car_state: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub state: Option<String>,

    // Climate
    #[serde(default, deserialize_with = "lenient::number")]
    pub outside_temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub inside_temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub driver_temp_setting: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub passenger_temp_setting: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub fan_status: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub battery_heater_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_front_defroster_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_rear_defroster_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub defrost_mode: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_preconditioning: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_auto_conditioning_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_climate_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub left_temp_direction: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub right_temp_direction: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub seat_heater_left: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub seat_heater_right: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub seat_heater_rear_left: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub seat_heater_rear_right: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub seat_heater_rear_center: Option<f64>,

    // Battery and range (distances in miles)
    #[serde(default, deserialize_with = "lenient::number")]
    pub battery_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub usable_battery_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub battery_range: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub ideal_battery_range: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub est_battery_range: Option<f64>,
    #[serde(default, rename = "maxRange", deserialize_with = "lenient::number")]
    pub max_range: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charge_limit_soc: Option<f64>,

    // Charging
    #[serde(default, deserialize_with = "lenient::text")]
    pub charging_state: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub time_to_full_charge: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charge_current_request: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charge_current_request_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub charge_enable_request: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charger_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charger_pilot_current: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charger_actual_current: Option<f64>,
    #[serde(default, deserialize_with = "lenient::state_or_none")]
    pub charger_phases: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charger_voltage: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charge_energy_added: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charge_miles_added_ideal: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charge_miles_added_rated: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub charge_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub fast_charger_present: Option<bool>,
    #[serde(default, deserialize_with = "lenient::state_or_none")]
    pub fast_charger_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub trip_charging: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub charge_port_cold_weather_mode: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub charge_port_door_open: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub charge_port_latch: Option<String>,
    #[serde(default, deserialize_with = "lenient::state_or_none")]
    pub charge_port_led_color: Option<String>,

    // Drive state
    #[serde(default, deserialize_with = "lenient::number")]
    pub odometer: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::state_or_none")]
    pub shift_state: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub gps_as_of: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub longitude: Option<f64>,

    // Vehicle state
    #[serde(default, deserialize_with = "lenient::flag")]
    pub sentry_mode: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub locked: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_user_present: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub in_service: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub center_display_state: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub df: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub dr: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pf: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pr: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rt: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub fd_window: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rd_window: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub fp_window: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rp_window: Option<f64>,
}

impl Snapshot {
    /// Whether the snapshot carries climate readings. TeslaFi drops them while
    /// the car sleeps.
    pub fn has_temperatures(&self) -> bool {
        self.outside_temp.is_some()
    }
}

/// Field decoders tolerant of TeslaFi's stringly typed payload.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Numbers, numeric strings and booleans (as 1/0).
    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(as_number(Option::<Value>::deserialize(deserializer)?))
    }

    /// Like [`number`], but an explicit `null` or `""` reads as 0.
    pub fn number_or_zero<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(if is_blank(&value) {
            Some(0.0)
        } else {
            as_number(value)
        })
    }

    /// Booleans, `"True"`/`"False"`, `"1"`/`"0"` and numbers (non-zero is true).
    pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0),
            Some(Value::String(s)) => {
                let s = s.trim();
                parse_bool(s).or_else(|| s.parse::<f64>().ok().map(|v| v != 0.0))
            }
            _ => None,
        })
    }

    /// Non-empty strings; numbers and booleans are kept in their JSON spelling.
    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(as_text(Option::<Value>::deserialize(deserializer)?))
    }

    /// Like [`text`], but an explicit `null` or `""` reads as the `"None"` state.
    pub fn state_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(if is_blank(&value) {
            Some("None".to_string())
        } else {
            as_text(value)
        })
    }

    fn as_number(value: Option<Value>) -> Option<f64> {
        match value? {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .or_else(|| parse_bool(s).map(|b| if b { 1.0 } else { 0.0 }))
            }
            _ => None,
        }
    }

    fn as_text(value: Option<Value>) -> Option<String> {
        match value? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn is_blank(value: &Option<Value>) -> bool {
        match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            _ => false,
        }
    }

    fn parse_bool(s: &str) -> Option<bool> {
        if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("on") {
            Some(true)
        } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("off") {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Snapshot {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_numbers_accept_strings_and_numbers() {
        let snapshot = parse(r#"{"battery_level": 72, "usable_battery_level": "70", "odometer": "12345.6"}"#);
        assert_eq!(snapshot.battery_level, Some(72.0));
        assert_eq!(snapshot.usable_battery_level, Some(70.0));
        assert_eq!(snapshot.odometer, Some(12345.6));
    }

    #[test]
    fn test_empty_null_and_garbage_are_absent() {
        let snapshot = parse(
            r#"{"battery_level": "", "outside_temp": null, "speed": "<invalid>", "vin": "  "}"#,
        );
        assert_eq!(snapshot.battery_level, None);
        assert_eq!(snapshot.outside_temp, None);
        assert_eq!(snapshot.speed, None);
        assert_eq!(snapshot.vin, None);
        assert!(!snapshot.has_temperatures());
    }

    #[test]
    fn test_flags_accept_teslafi_spellings() {
        let snapshot = parse(
            r#"{"polling": "True", "locked": "1", "sentry_mode": 0, "is_climate_on": false, "in_service": "False"}"#,
        );
        assert_eq!(snapshot.polling, Some(true));
        assert_eq!(snapshot.locked, Some(true));
        assert_eq!(snapshot.sentry_mode, Some(false));
        assert_eq!(snapshot.is_climate_on, Some(false));
        assert_eq!(snapshot.in_service, Some(false));
    }

    #[test]
    fn test_renamed_fields() {
        let snapshot = parse(
            r#"{"carState": "Idling", "maxRange": "310", "idleNumber": "4", "newVersion": "2024.2.7", "idleTime": -3}"#,
        );
        assert_eq!(snapshot.car_state.as_deref(), Some("Idling"));
        assert_eq!(snapshot.max_range, Some(310.0));
        assert_eq!(snapshot.idle_number, Some(4.0));
        assert_eq!(snapshot.new_version.as_deref(), Some("2024.2.7"));
        assert_eq!(snapshot.idle_time, Some(-3.0));
    }

    #[test]
    fn test_parked_car_fields_read_as_none() {
        let snapshot = parse(
            r#"{"speed": null, "shift_state": null, "charger_phases": "", "fast_charger_type": null, "charge_port_led_color": ""}"#,
        );
        assert_eq!(snapshot.speed, Some(0.0));
        assert_eq!(snapshot.shift_state.as_deref(), Some("None"));
        assert_eq!(snapshot.charger_phases.as_deref(), Some("None"));
        assert_eq!(snapshot.fast_charger_type.as_deref(), Some("None"));
        assert_eq!(snapshot.charge_port_led_color.as_deref(), Some("None"));

        let snapshot = parse(r#"{"battery_level": 50}"#);
        assert_eq!(snapshot.speed, None);
        assert_eq!(snapshot.shift_state, None);
    }

    #[test]
    fn test_text_keeps_numeric_identity_values() {
        let snapshot = parse(r#"{"vehicle_id": 1234567890, "charger_phases": 3}"#);
        assert_eq!(snapshot.vehicle_id.as_deref(), Some("1234567890"));
        assert_eq!(snapshot.charger_phases.as_deref(), Some("3"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let snapshot = parse(r#"{"Notes": "TeslaFi Sleep Mode", "battery_level": "50", "nested": {"a": 1}}"#);
        assert_eq!(snapshot.battery_level, Some(50.0));
    }

    #[test]
    fn test_wrong_json_type_is_absent_not_error() {
        let snapshot = parse(r#"{"battery_level": {"value": 1}, "vin": [1, 2]}"#);
        assert_eq!(snapshot, Snapshot::default());
    }
}
