//! Shared classification heuristics: command blacklists, binary device-class
//! inference, and generic-type default tables.
//!
//! The hints are bilingual (French/English) because Jeedom installs mix both
//! freely in command names and logical ids.

use strum::Display;

use super::model::{Cmd, CmdSubtype, EqLogic};
use super::slug::slugify;

// Z-Wave node management/status commands, never useful as entities.
const NODE_MGMT_LOGICAL_ID: &[&str] = &[
    "pingnode",
    "healnode",
    "isfailednode",
    "nodestatus",
    "refreshinfo",
    "refreshvalues",
    "refresh",
];
const NODE_MGMT_PROPERTY: &[&str] = &["pingnode", "healnode", "isfailednode", "nodestatus"];
const NODE_MGMT_NAME_VERBS: &[&str] = &[
    "ping", "pinguer", "heal", "soigner", "tester", "test", "statut", "status", "health", "sant",
];
const NODE_MGMT_NAME_EXACT: &[&str] = &[
    "pinguer noeud",
    "soigner noeud",
    "tester noeud",
    "statut noeud",
];

// Z-Wave Central Scene sceneId state, noise for this integration.
const SCENE_ID_SUBSTR: &str = "sceneid";

const VIBRATION_HINTS: &[&str] = &["shock", "vibration", "vibrate", "impact", "choc"];
const TAMPER_HINTS: &[&str] = &["sabotage", "tamper"];
const MOTION_HINTS: &[&str] = &["presence", "motion", "mouvement", "occupancy"];

pub const KEYPAD_EQ_NAME_HINTS: &[&str] = &["keypad", "clavier", "rfid"];
pub const KEYPAD_ALARM_HINTS: &[&str] = &["alarm", "alarme", "armed", "arm"];
pub const KEYPAD_HOME_HINTS: &[&str] = &["home", "maison", "domicile"];
pub const KEYPAD_AWAY_HINTS: &[&str] = &["away", "absent", "exterieur", "exterior", "outside"];
pub const KEYPAD_DISARM_HINTS: &[&str] = &["disarm", "desarm", "unarm", "off", "unlock"];

/// Lowercase and collapse `_`/`-` and whitespace runs to single spaces.
pub fn normalize_label(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.chars() {
        let ch = if ch == '_' || ch == '-' || ch.is_whitespace() {
            ' '
        } else {
            ch.to_ascii_lowercase()
        };
        if ch == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

fn lowered_fields(cmd: &Cmd) -> (String, String, String) {
    let lid = cmd.logical_id.as_deref().unwrap_or("").to_lowercase();
    let name = cmd.name.to_lowercase();
    let prop = cmd
        .configuration
        .property
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    (lid, name, prop)
}

fn normalized_fields(cmd: &Cmd) -> (String, String, String) {
    let (lid, name, prop) = lowered_fields(cmd);
    (
        normalize_label(&lid),
        normalize_label(&name),
        normalize_label(&prop),
    )
}

pub fn is_node_mgmt_cmd(cmd: &Cmd) -> bool {
    let (lid, name, prop) = lowered_fields(cmd);
    if NODE_MGMT_LOGICAL_ID.iter().any(|s| lid.contains(s)) {
        return true;
    }
    if NODE_MGMT_PROPERTY.iter().any(|s| prop.contains(s)) {
        return true;
    }
    let has_node_word = name.contains("node") || name.contains("noeud");
    if has_node_word && NODE_MGMT_NAME_VERBS.iter().any(|s| name.contains(s)) {
        return true;
    }
    NODE_MGMT_NAME_EXACT.contains(&name.trim())
}

pub fn is_scene_id_cmd(cmd: &Cmd) -> bool {
    let (lid, name, prop) = lowered_fields(cmd);
    lid.contains(SCENE_ID_SUBSTR)
        || name.trim() == SCENE_ID_SUBSTR
        || prop.contains(SCENE_ID_SUBSTR)
}

pub fn is_blacklisted_cmd(cmd: &Cmd) -> bool {
    is_node_mgmt_cmd(cmd) || is_scene_id_cmd(cmd)
}

/// Device classes assigned to binary sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryDeviceClass {
    Motion,
    Opening,
    Presence,
    Tamper,
    Vibration,
}

/// Z-Wave Notification (command class 113) commands with a recognizable
/// purpose. "Sensor status" reports vibration, sabotage/tamper reports
/// tamper; everything else stays unclassified.
pub fn notification_113_class(cmd: &Cmd) -> Option<BinaryDeviceClass> {
    let class = cmd.configuration.class.as_deref().unwrap_or("").trim();
    if class != "113" {
        return None;
    }
    let (lid, name, prop) = normalized_fields(cmd);
    if [&lid, &name, &prop]
        .iter()
        .any(|f| f.contains("sensor status"))
    {
        return Some(BinaryDeviceClass::Vibration);
    }
    if [&lid, &name, &prop]
        .iter()
        .any(|f| TAMPER_HINTS.iter().any(|h| f.contains(h)))
    {
        return Some(BinaryDeviceClass::Tamper);
    }
    None
}

pub fn vibration_class(cmd: &Cmd) -> Option<BinaryDeviceClass> {
    let (lid, name, prop) = normalized_fields(cmd);
    if [&lid, &name, &prop]
        .iter()
        .any(|f| VIBRATION_HINTS.iter().any(|h| f.contains(h)))
    {
        Some(BinaryDeviceClass::Vibration)
    } else {
        None
    }
}

pub fn tamper_class(cmd: &Cmd) -> Option<BinaryDeviceClass> {
    let (lid, name, prop) = normalized_fields(cmd);
    if [&lid, &name, &prop]
        .iter()
        .any(|f| TAMPER_HINTS.iter().any(|h| f.contains(h)))
    {
        Some(BinaryDeviceClass::Tamper)
    } else {
        None
    }
}

/// Motion keyword in the command name, checked on the slug so separators
/// and diacritics do not matter.
pub fn is_motion_hint(cmd: &Cmd) -> bool {
    let raw = if cmd.name.trim().is_empty() {
        cmd.logical_id.as_deref().unwrap_or("")
    } else {
        cmd.name.as_str()
    };
    let s = slugify(raw);
    MOTION_HINTS.iter().any(|h| s.contains(h))
}

/// Default device class for a binary generic type.
pub fn generic_binary_class(generic: &str) -> Option<BinaryDeviceClass> {
    match generic {
        "PRESENCE" => Some(BinaryDeviceClass::Presence),
        "OPENING" => Some(BinaryDeviceClass::Opening),
        _ => None,
    }
}

pub fn is_generic_binary(generic: &str) -> bool {
    generic_binary_class(generic).is_some()
}

/// Sensor defaults keyed on the generic type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorDefaults {
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub unit_of_measurement: Option<&'static str>,
}

pub fn generic_sensor_defaults(generic: &str) -> Option<SensorDefaults> {
    let d = |device_class, state_class, unit_of_measurement| SensorDefaults {
        device_class,
        state_class,
        unit_of_measurement,
    };
    Some(match generic {
        "POWER" => d(Some("power"), Some("measurement"), None),
        "CONSUMPTION" => d(Some("energy"), Some("total_increasing"), None),
        "TEMPERATURE" => d(Some("temperature"), Some("measurement"), None),
        "HUMIDITY" => d(Some("humidity"), Some("measurement"), None),
        "ILLUMINANCE" | "BRIGHTNESS" => d(Some("illuminance"), Some("measurement"), Some("lx")),
        "BATTERY" | "BATTERIE" => d(Some("battery"), Some("measurement"), Some("%")),
        "THERMOSTAT_TEMPERATURE" | "THERMOSTAT_SETPOINT" | "THERMOSTAT_SET_SETPOINT" => {
            d(Some("temperature"), Some("measurement"), None)
        }
        "FLAP_STATE" => d(None, Some("measurement"), None),
        _ => return None,
    })
}

/// Keypad-like devices are alarm panel candidates.
pub fn is_keypad_eqlogic(eq: &EqLogic) -> bool {
    let name = slugify(&eq.name);
    let logical = slugify(eq.logical_id.as_deref().unwrap_or(""));
    let eq_type = slugify(eq.eq_type_name.as_deref().unwrap_or(""));
    KEYPAD_EQ_NAME_HINTS
        .iter()
        .any(|h| name.contains(h) || logical.contains(h) || eq_type.contains(h))
}

/// On a keypad device, the command carrying the armed state.
pub fn is_keypad_alarm_cmd(eq: &EqLogic, cmd: &Cmd) -> bool {
    if !is_keypad_eqlogic(eq) {
        return false;
    }
    let name = slugify(&cmd.name);
    let lid = slugify(cmd.logical_id.as_deref().unwrap_or(""));
    KEYPAD_ALARM_HINTS
        .iter()
        .any(|h| name.contains(h) || lid.contains(h))
}

/// Info subtypes an alarm state command may have.
pub fn is_alarm_state_subtype(subtype: CmdSubtype) -> bool {
    matches!(
        subtype,
        CmdSubtype::Binary | CmdSubtype::Numeric | CmdSubtype::String
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmd(value: serde_json::Value) -> Cmd {
        serde_json::from_value(value).unwrap()
    }

    fn eq(value: serde_json::Value) -> EqLogic {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn node_mgmt_matches_logical_id_and_french_names() {
        assert!(is_node_mgmt_cmd(&cmd(json!({ "logicalId": "pingNode" }))));
        assert!(is_node_mgmt_cmd(&cmd(
            json!({ "name": "Pinguer le noeud" })
        )));
        assert!(is_node_mgmt_cmd(&cmd(
            json!({ "configuration": { "property": "isFailedNode" } })
        )));
        assert!(!is_node_mgmt_cmd(&cmd(json!({ "name": "Ping pong score" }))));
    }

    #[test]
    fn scene_id_matches_exact_name_only() {
        assert!(is_scene_id_cmd(&cmd(json!({ "name": "sceneId" }))));
        assert!(is_scene_id_cmd(&cmd(json!({ "logicalId": "99-0-sceneId" }))));
        assert!(!is_scene_id_cmd(&cmd(json!({ "name": "sceneId helper" }))));
    }

    #[test]
    fn notification_113_requires_class() {
        let vibration = cmd(json!({
            "name": "Sensor_Status",
            "configuration": { "class": "113" }
        }));
        assert_eq!(
            notification_113_class(&vibration),
            Some(BinaryDeviceClass::Vibration)
        );
        let no_class = cmd(json!({ "name": "Sensor Status" }));
        assert_eq!(notification_113_class(&no_class), None);
        let tamper = cmd(json!({
            "logicalId": "alarm-sabotage",
            "configuration": { "class": "113" }
        }));
        assert_eq!(
            notification_113_class(&tamper),
            Some(BinaryDeviceClass::Tamper)
        );
    }

    #[test]
    fn vibration_and_tamper_keywords() {
        assert_eq!(
            vibration_class(&cmd(json!({ "name": "Choc détecté" }))),
            Some(BinaryDeviceClass::Vibration)
        );
        assert_eq!(
            tamper_class(&cmd(json!({ "configuration": { "property": "tamperState" } }))),
            Some(BinaryDeviceClass::Tamper)
        );
        assert_eq!(vibration_class(&cmd(json!({ "name": "Température" }))), None);
    }

    #[test]
    fn sensor_defaults_table() {
        let lux = generic_sensor_defaults("ILLUMINANCE").unwrap();
        assert_eq!(lux.unit_of_measurement, Some("lx"));
        let flap = generic_sensor_defaults("FLAP_STATE").unwrap();
        assert_eq!(flap.device_class, None);
        assert_eq!(flap.state_class, Some("measurement"));
        assert!(generic_sensor_defaults("UNKNOWN").is_none());
    }

    #[test]
    fn device_class_renders_snake_case() {
        assert_eq!(BinaryDeviceClass::Vibration.to_string(), "vibration");
        assert_eq!(BinaryDeviceClass::Motion.to_string(), "motion");
    }

    #[test]
    fn keypad_detection() {
        let keypad = eq(json!({ "id": 1, "name": "Clavier entrée" }));
        assert!(is_keypad_eqlogic(&keypad));
        let armed = cmd(json!({ "id": 10, "name": "Alarme", "type": "info", "subType": "binary" }));
        assert!(is_keypad_alarm_cmd(&keypad, &armed));
        let plain = eq(json!({ "id": 2, "name": "Lampe" }));
        assert!(!is_keypad_alarm_cmd(&plain, &armed));
    }
}
