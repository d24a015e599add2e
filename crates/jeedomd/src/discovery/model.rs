//! Typed records for the Jeedom discovery payloads.
//!
//! The hub publishes one JSON document per eqLogic (a logical device) with
//! its command table nested under `cmds`. Field types are unreliable, so
//! everything numeric goes through the lenient coercion helpers in
//! [`crate::discovery::value`]. The records also serialize back out for the
//! on-disk snapshot, which is why they derive `Serialize` too.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::{as_f64, de_flag, de_opt_f64, de_opt_i64, de_opt_string, de_string};

/// A logical device as published by the hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EqLogic {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(rename = "logicalId", default, deserialize_with = "de_opt_string")]
    pub logical_id: Option<String>,
    #[serde(rename = "eqType_name", default, deserialize_with = "de_opt_string")]
    pub eq_type_name: Option<String>,
    #[serde(default)]
    pub category: Category,
    /// Keyed by the command id as published (a decimal string).
    #[serde(default)]
    pub cmds: BTreeMap<String, Cmd>,
}

/// Hub-side category flags. Jeedom serializes these as "0"/"1" strings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "de_flag")]
    pub light: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub heating: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub opening: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub automatism: bool,
}

/// A single command (info or action) belonging to an eqLogic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cmd {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(rename = "logicalId", default, deserialize_with = "de_opt_string")]
    pub logical_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: CmdKind,
    #[serde(rename = "subType", default)]
    pub subtype: CmdSubtype,
    #[serde(rename = "generic_type", default, deserialize_with = "de_opt_string")]
    pub generic_type: Option<String>,
    #[serde(rename = "unite", default, deserialize_with = "de_opt_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub order: Option<i64>,
    #[serde(default)]
    pub configuration: CmdConfiguration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmdKind {
    Info,
    Action,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmdSubtype {
    Binary,
    Numeric,
    String,
    Slider,
    Other,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CmdConfiguration {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub property: Option<String>,
    /// The action payload template, e.g. `"1"`, `"99"`, or `"#slider#"`.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(rename = "minValue", default, deserialize_with = "de_opt_f64")]
    pub min_value: Option<f64>,
    #[serde(rename = "maxValue", default, deserialize_with = "de_opt_f64")]
    pub max_value: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub class: Option<String>,
}

impl EqLogic {
    /// Commands in ascending id order, for deterministic output across
    /// regenerations. Commands without a parseable id sort last.
    pub fn cmds_sorted(&self) -> Vec<&Cmd> {
        let mut cmds: Vec<&Cmd> = self.cmds.values().collect();
        cmds.sort_by_key(|c| c.id.unwrap_or(i64::MAX));
        cmds
    }

    pub fn cmd_by_id(&self, id: i64) -> Option<&Cmd> {
        self.cmds.values().find(|c| c.id == Some(id))
    }

    /// Name to display, falling back to a synthetic one when the hub sends
    /// an empty string.
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            match self.id {
                Some(id) => format!("Jeedom {id}"),
                None => "Jeedom device".to_string(),
            }
        } else {
            name.to_string()
        }
    }
}

impl Cmd {
    pub fn is_info(&self) -> bool {
        self.kind == CmdKind::Info
    }

    pub fn is_action(&self) -> bool {
        self.kind == CmdKind::Action
    }

    /// Uppercased generic type, the form the classification tables use.
    pub fn generic(&self) -> String {
        self.generic_type
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_ascii_uppercase()
    }

    /// Command name with a fallback for unnamed commands.
    pub fn label(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            match self.id {
                Some(id) => format!("cmd {id}"),
                None => "cmd".to_string(),
            }
        } else {
            name.to_string()
        }
    }

    /// The literal payload an action sends, if it is a fixed scalar.
    /// Placeholder templates like `#slider#` do not count.
    pub fn value_literal(&self) -> Option<String> {
        let value = self.configuration.value.as_ref()?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if text.is_empty() || text.contains('#') {
            None
        } else {
            Some(text)
        }
    }

    /// The literal payload as a number, when it parses as one.
    pub fn value_number(&self) -> Option<f64> {
        let text = self.value_literal()?;
        as_f64(&Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> EqLogic {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn lenient_field_types() {
        let eq = parse(json!({
            "id": "12",
            "name": "Lampe Salon",
            "category": { "light": "1", "heating": 0 },
            "cmds": {
                "101": {
                    "id": 101,
                    "name": "On",
                    "type": "action",
                    "subType": "other",
                    "configuration": { "value": 1, "minValue": "", "maxValue": "99" }
                }
            }
        }));
        assert_eq!(eq.id, Some(12));
        assert!(eq.category.light);
        assert!(!eq.category.heating);
        let cmd = &eq.cmds["101"];
        assert!(cmd.is_action());
        assert_eq!(cmd.subtype, CmdSubtype::Other);
        assert_eq!(cmd.value_literal().as_deref(), Some("1"));
        assert_eq!(cmd.configuration.min_value, None);
        assert_eq!(cmd.configuration.max_value, Some(99.0));
    }

    #[test]
    fn unknown_kind_and_subtype_do_not_fail() {
        let eq = parse(json!({
            "id": 1,
            "name": "X",
            "cmds": { "5": { "id": 5, "type": "virtual", "subType": "color" } }
        }));
        let cmd = &eq.cmds["5"];
        assert_eq!(cmd.kind, CmdKind::Other);
        assert_eq!(cmd.subtype, CmdSubtype::Unknown);
    }

    #[test]
    fn slider_placeholder_is_not_a_literal() {
        let eq = parse(json!({
            "id": 1,
            "name": "X",
            "cmds": { "7": { "id": 7, "type": "action", "subType": "slider",
                             "configuration": { "value": "#slider#" } } }
        }));
        assert_eq!(eq.cmds["7"].value_literal(), None);
    }

    #[test]
    fn cmds_sorted_by_id_ignoring_display_order() {
        let eq = parse(json!({
            "id": 1,
            "name": "X",
            "cmds": {
                "3": { "id": 3, "order": 2 },
                "9": { "id": 9, "order": "1" },
                "4": { "id": 4 }
            }
        }));
        let ids: Vec<_> = eq.cmds_sorted().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![Some(3), Some(4), Some(9)]);
    }

    #[test]
    fn display_name_fallback() {
        let eq = parse(json!({ "id": 42, "name": "  " }));
        assert_eq!(eq.display_name(), "Jeedom 42");
    }

    #[test]
    fn snapshot_round_trip_keeps_classifier_fields() {
        let eq = parse(json!({
            "id": 8,
            "name": "Volet",
            "eqType_name": "zwavejs",
            "category": { "opening": "1" },
            "cmds": { "80": { "id": 80, "name": "Monter", "type": "action",
                              "generic_type": "FLAP_UP" } }
        }));
        let round: EqLogic =
            serde_json::from_value(serde_json::to_value(&eq).unwrap()).unwrap();
        assert_eq!(round.id, Some(8));
        assert_eq!(round.eq_type_name.as_deref(), Some("zwavejs"));
        assert!(round.category.opening);
        assert_eq!(round.cmds["80"].generic(), "FLAP_UP");
    }
}
