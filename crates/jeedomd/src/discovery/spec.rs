//! Typed entity descriptors and action bindings.
//!
//! The generators emit two documents per pass: an [`EntityDoc`] describing
//! every discovered entity grouped by platform, and an [`ActionDoc`] mapping
//! device keys (`jeedom_<eq_id>`) to the command ids needed to drive them.
//! Both are closed structs so a typo in a field name is a compile error, not
//! a silently ignored key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Sensor,
    BinarySensor,
    AlarmControlPanel,
    Climate,
    Light,
    Switch,
    WaterHeater,
    Cover,
    Number,
    Select,
}

/// Device registry block shared by every entity of one eqLogic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceBlock {
    pub identifiers: Vec<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub name: String,
    pub unique_id: String,
    pub cmd_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinarySensorSpec {
    pub name: String,
    pub unique_id: String,
    pub cmd_id: i64,
    pub payload_on: String,
    pub payload_off: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchSpec {
    pub name: String,
    pub unique_id: String,
    pub payload_on: String,
    pub payload_off: String,
    pub state_on: String,
    pub state_off: String,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightSpec {
    pub name: String,
    pub unique_id: String,
    pub payload_on: String,
    pub payload_off: String,
    /// Set only when there is no binary state command to read back from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimistic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_scale: Option<u32>,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverSpec {
    pub name: String,
    pub unique_id: String,
    pub payload_open: String,
    pub payload_close: String,
    pub payload_stop: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_max: Option<f64>,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateSpec {
    pub name: String,
    pub unique_id: String,
    pub modes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_modes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Distinguishes a pilot-wire climate from a thermostat.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pilot: bool,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectSpec {
    pub name: String,
    pub unique_id: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberSpec {
    pub name: String,
    pub unique_id: String,
    pub value_template: String,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterHeaterSpec {
    pub name: String,
    pub unique_id: String,
    pub modes: Vec<String>,
    pub mode_state_template: String,
    pub device: DeviceBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmPanelSpec {
    pub name: String,
    pub unique_id: String,
    pub state_map: BTreeMap<String, String>,
    pub device: DeviceBlock,
}

/// Every discovered entity, grouped by platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDoc {
    pub sensor: Vec<SensorSpec>,
    pub binary_sensor: Vec<BinarySensorSpec>,
    pub alarm_control_panel: Vec<AlarmPanelSpec>,
    pub climate: Vec<ClimateSpec>,
    pub light: Vec<LightSpec>,
    pub switch: Vec<SwitchSpec>,
    pub water_heater: Vec<WaterHeaterSpec>,
    pub cover: Vec<CoverSpec>,
    pub number: Vec<NumberSpec>,
    pub select: Vec<SelectSpec>,
}

/// An action command together with its fixed payload, when one exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CmdBinding {
    pub cmd_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
    White,
}

impl ColorChannel {
    pub const ALL: [ColorChannel; 4] = [
        ColorChannel::Red,
        ColorChannel::Green,
        ColorChannel::Blue,
        ColorChannel::White,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_cmd_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightActions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub off_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_on_brightness: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_state_cmd_id: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<ColorChannel, ChannelBinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchActions {
    pub state_cmd_id: i64,
    pub on_cmd_id: i64,
    pub off_cmd_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterHeaterActions {
    pub state_cmd_id: i64,
    pub on_cmd_id: i64,
    pub off_cmd_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmActions {
    pub state_cmd_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm_home_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm_away_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm_night_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disarm_cmd_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverActions {
    pub position_state_cmd_id: i64,
    pub open_cmd_id: i64,
    pub close_cmd_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_cmd_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_cmd_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_cmd_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_position_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_position_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_position_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_position_property: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberActions {
    pub state_cmd_id: i64,
    pub set_cmd_id: i64,
}

/// Which setpoint a thermostat write targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SetpointKind {
    Hot,
    Cold,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateActions {
    pub set_temperature_cmd_id: i64,
    pub setpoint_kind: SetpointKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_temperature_by_kind: BTreeMap<SetpointKind, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_temperature_cmd_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_state_cmd_id: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub temperature_state_by_kind: BTreeMap<SetpointKind, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOptionBinding {
    pub label: String,
    pub cmd_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectActions {
    pub state_cmd_id: i64,
    pub options: Vec<SelectOptionBinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PilotModeBindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat: Option<CmdBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub off: Option<CmdBinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PilotPresetBindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comfort: Option<CmdBinding>,
    #[serde(rename = "comfort-1", skip_serializing_if = "Option::is_none")]
    pub comfort_1: Option<CmdBinding>,
    #[serde(rename = "comfort-2", skip_serializing_if = "Option::is_none")]
    pub comfort_2: Option<CmdBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eco: Option<CmdBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away: Option<CmdBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub none: Option<CmdBinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PilotClimateActions {
    pub state_cmd_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_temperature_cmd_id: Option<i64>,
    pub mode: PilotModeBindings,
    pub preset: PilotPresetBindings,
}

/// Per-device action bindings, keyed by the device key `jeedom_<eq_id>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDoc {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alarm_control_panel: BTreeMap<String, AlarmActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub light: BTreeMap<String, LightActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub switch: BTreeMap<String, SwitchActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub water_heater: BTreeMap<String, WaterHeaterActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cover: BTreeMap<String, CoverActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub number: BTreeMap<String, NumberActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub select: BTreeMap<String, SelectActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub climate: BTreeMap<String, ClimateActions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pilot_climate: BTreeMap<String, PilotClimateActions>,
}

pub fn device_key(eq_id: i64) -> String {
    format!("jeedom_{eq_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_names_round_trip() {
        assert_eq!(Platform::BinarySensor.to_string(), "binary_sensor");
        assert_eq!(
            "water_heater".parse::<Platform>().ok(),
            Some(Platform::WaterHeater)
        );
        assert!("plain_text".parse::<Platform>().is_err());
    }

    #[test]
    fn sensor_spec_omits_absent_fields() {
        let spec = SensorSpec {
            name: "Salon Température".to_string(),
            unique_id: "jeedom_3_31".to_string(),
            cmd_id: 31,
            unit_of_measurement: Some("°C".to_string()),
            device: DeviceBlock {
                identifiers: vec!["jeedom_salon".to_string()],
                name: "Salon".to_string(),
                ..DeviceBlock::default()
            },
            ..SensorSpec::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["unit_of_measurement"], json!("°C"));
        assert!(value.get("device_class").is_none());
        assert!(value["device"].get("manufacturer").is_none());
    }

    #[test]
    fn action_doc_drops_empty_platforms() {
        let mut doc = ActionDoc::default();
        doc.switch.insert(
            device_key(12),
            SwitchActions {
                state_cmd_id: 120,
                on_cmd_id: 121,
                off_cmd_id: 122,
            },
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("light").is_none());
        assert_eq!(value["switch"]["jeedom_12"]["on_cmd_id"], json!(121));
    }

    #[test]
    fn pilot_preset_keys_use_dashes() {
        let preset = PilotPresetBindings {
            comfort_1: Some(CmdBinding {
                cmd_id: 9,
                value: Some("50".to_string()),
            }),
            ..PilotPresetBindings::default()
        };
        let value = serde_json::to_value(&preset).unwrap();
        assert_eq!(value["comfort-1"]["value"], json!("50"));
    }

    #[test]
    fn climate_pilot_flag_is_hidden_when_false() {
        let spec = ClimateSpec {
            name: "Chauffage".to_string(),
            unique_id: "jeedom_5_climate".to_string(),
            modes: vec!["off".to_string(), "heat".to_string()],
            ..ClimateSpec::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert!(value.get("pilot").is_none());
    }
}
