//! Pilot-wire heaters (Qubino flush pilot and friends): a numeric state
//! plus a set of fixed-value mode actions. Surfaces as a select entity and,
//! when the off and comfort modes are both present, as a preset-driven
//! climate entity.

use std::collections::BTreeMap;

use crate::discovery::classify::is_blacklisted_cmd;
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::{
    ClimateSpec, CmdBinding, PilotClimateActions, PilotModeBindings, PilotPresetBindings,
    SelectActions, SelectOptionBinding, SelectSpec,
};

use super::{base_name, device_block};

// Canonical pilot-wire order values.
const PILOT_WIRE_VALUES: &[i64] = &[0, 20, 30, 40, 50, 99, 255];

pub struct PilotOption<'a> {
    pub value: i64,
    pub label: String,
    pub cmd: &'a Cmd,
}

pub struct Detection<'a> {
    pub state_cmd: &'a Cmd,
    pub options: Vec<PilotOption<'a>>,
}

/// Mode commands mapped to their pilot-wire roles.
#[derive(Default)]
pub struct PilotRoles<'a> {
    pub off: Option<&'a PilotOption<'a>>,
    pub away: Option<&'a PilotOption<'a>>,
    pub eco: Option<&'a PilotOption<'a>>,
    pub comfort_2: Option<&'a PilotOption<'a>>,
    pub comfort_1: Option<&'a PilotOption<'a>>,
    pub comfort: Option<&'a PilotOption<'a>>,
}

pub fn detect(eq: &EqLogic) -> Option<Detection<'_>> {
    let mut state_cmd = None;
    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) {
            continue;
        }
        if !cmd.is_info() || cmd.subtype != CmdSubtype::Numeric {
            continue;
        }
        let generic = cmd.generic();
        let prop = cmd
            .configuration
            .property
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let lid = cmd.logical_id.as_deref().unwrap_or("").to_lowercase();
        if generic == "FAN_STATE" || (prop == "currentvalue" && lid.contains("currentvalue")) {
            state_cmd = Some(cmd);
            break;
        }
    }
    let state_cmd = state_cmd?;

    let mut options: Vec<(i64, PilotOption)> = Vec::new();
    let mut has_mode_generic = false;
    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) {
            continue;
        }
        if !cmd.is_action() || cmd.subtype != CmdSubtype::Other {
            continue;
        }
        let prop = cmd
            .configuration
            .property
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        if prop != "targetvalue" {
            continue;
        }
        let Some(value) = cmd.value_number().map(|v| v as i64) else {
            continue;
        };
        let generic = cmd.generic();
        if generic.starts_with("FAN_") || generic.starts_with("HEATING_") {
            has_mode_generic = true;
        }
        let label = option_label(cmd, value);
        options.push((
            cmd.order.unwrap_or(0),
            PilotOption {
                value,
                label,
                cmd,
            },
        ));
    }

    if options.len() < 3 {
        return None;
    }

    let known = options
        .iter()
        .filter(|(_, o)| PILOT_WIRE_VALUES.contains(&o.value))
        .count();
    if known < 3 && !has_mode_generic && !eq.category.heating {
        return None;
    }

    options.sort_by_key(|(order, _)| *order);
    let mut seen_labels = std::collections::BTreeSet::new();
    let mut seen_values = std::collections::BTreeSet::new();
    let mut filtered = Vec::new();
    for (_, option) in options {
        if seen_labels.contains(&option.label) || seen_values.contains(&option.value) {
            continue;
        }
        seen_labels.insert(option.label.clone());
        seen_values.insert(option.value);
        filtered.push(option);
    }

    Some(Detection {
        state_cmd,
        options: filtered,
    })
}

fn option_label(cmd: &Cmd, value: i64) -> String {
    let name = cmd.name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    if let Some(lid) = cmd.logical_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return lid.to_string();
    }
    format!("mode_{value}")
}

/// Assign options to roles by their canonical values, with min falling back
/// to off and max to comfort.
pub fn roles<'a>(options: &'a [PilotOption<'a>]) -> PilotRoles<'a> {
    let mut by_value: BTreeMap<i64, &PilotOption> = BTreeMap::new();
    for option in options {
        by_value.insert(option.value, option);
    }

    let pick = |values: &[i64]| -> Option<&PilotOption> {
        values.iter().find_map(|v| by_value.get(v).copied())
    };

    PilotRoles {
        off: pick(&[0, 10]).or_else(|| by_value.values().next().copied()),
        away: pick(&[20]),
        eco: pick(&[30]),
        comfort_2: pick(&[40]),
        comfort_1: pick(&[50]),
        comfort: pick(&[255, 99, 100]).or_else(|| by_value.values().next_back().copied()),
    }
}

fn allowed_options<'a, 'b>(
    detected: &'b Detection<'a>,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Vec<&'b PilotOption<'a>> {
    detected
        .options
        .iter()
        .filter(|o| rule.is_none() || rules.allows_cmd(rule, o.cmd))
        .collect()
}

fn binding(option: &PilotOption<'_>) -> Option<CmdBinding> {
    Some(CmdBinding {
        cmd_id: option.cmd.id?,
        value: option.cmd.value_literal(),
    })
}

/// The select entity for the raw mode list.
pub fn build_select(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(SelectSpec, SelectActions)> {
    let detected = detect(eq)?;
    if rule.is_some() && !rules.allows_cmd(rule, detected.state_cmd) {
        return None;
    }

    let options = allowed_options(&detected, rule, rules);
    if options.len() < 2 {
        return None;
    }

    let eq_id = eq.id?;
    let state_cmd_id = detected.state_cmd.id?;
    let ov = rule.map(|r| r.override_for(state_cmd_id)).unwrap_or_default();
    let base = base_name(eq, rule);

    let spec = SelectSpec {
        name: ov.name.clone().unwrap_or_else(|| format!("{base} Mode")),
        unique_id: ov
            .unique_id
            .clone()
            .unwrap_or_else(|| format!("jeedom_{eq_id}_select")),
        options: options.iter().map(|o| o.label.clone()).collect(),
        icon: ov.icon.clone(),
        device: device_block(eq, rule, &ov),
    };
    let actions = SelectActions {
        state_cmd_id,
        options: options
            .iter()
            .filter_map(|o| {
                Some(SelectOptionBinding {
                    label: o.label.clone(),
                    cmd_id: o.cmd.id?,
                    value: o.cmd.value_literal(),
                })
            })
            .collect(),
    };
    Some((spec, actions))
}

/// The preset-driven climate entity, when off and comfort are resolvable.
pub fn build_climate(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(ClimateSpec, PilotClimateActions)> {
    let detected = detect(eq)?;
    if rule.is_some() && !rules.allows_cmd(rule, detected.state_cmd) {
        return None;
    }

    let options = allowed_options(&detected, rule, rules);
    if options.is_empty() {
        return None;
    }
    let owned: Vec<PilotOption> = options
        .into_iter()
        .map(|o| PilotOption {
            value: o.value,
            label: o.label.clone(),
            cmd: o.cmd,
        })
        .collect();
    let roles = roles(&owned);
    let (off, comfort) = (roles.off?, roles.comfort?);

    let eq_id = eq.id?;
    let state_cmd_id = detected.state_cmd.id?;
    let ov = rule.map(|r| r.override_for(state_cmd_id)).unwrap_or_default();
    let base = base_name(eq, rule);

    let both_comforts = roles.comfort_1.is_some() && roles.comfort_2.is_some();
    let mut preset_modes = vec!["comfort".to_string()];
    if both_comforts {
        preset_modes.push("comfort-1".to_string());
        preset_modes.push("comfort-2".to_string());
    }
    preset_modes.push("eco".to_string());
    preset_modes.push("away".to_string());

    let spec = ClimateSpec {
        name: ov.name.clone().unwrap_or(base),
        unique_id: ov
            .unique_id
            .clone()
            .unwrap_or_else(|| format!("jeedom_{eq_id}_pilot_climate")),
        modes: vec!["heat".to_string(), "off".to_string()],
        preset_modes: Some(preset_modes),
        icon: ov.icon.clone(),
        pilot: true,
        device: device_block(eq, rule, &ov),
        ..ClimateSpec::default()
    };

    // An ambient temperature sensor on the same device feeds the climate
    // card's current temperature.
    let current_temperature_cmd_id = eq
        .cmds_sorted()
        .into_iter()
        .find(|c| {
            c.is_info()
                && c.subtype == CmdSubtype::Numeric
                && c.generic() == "TEMPERATURE"
                && (rule.is_none() || rules.allows_cmd(rule, c))
        })
        .and_then(|c| c.id);

    let actions = PilotClimateActions {
        state_cmd_id,
        current_temperature_cmd_id,
        mode: PilotModeBindings {
            heat: binding(comfort),
            off: binding(off),
        },
        preset: PilotPresetBindings {
            comfort: binding(comfort),
            comfort_1: roles.comfort_1.and_then(binding),
            comfort_2: roles.comfort_2.and_then(binding),
            eco: roles.eco.and_then(binding),
            away: roles.away.and_then(binding),
            none: binding(off),
        },
    };

    Some((spec, actions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eq(value: serde_json::Value) -> EqLogic {
        serde_json::from_value(value).unwrap()
    }

    fn pilot_heater() -> EqLogic {
        eq(json!({
            "id": 30,
            "name": "Radiateur Bureau",
            "category": { "heating": "1" },
            "cmds": {
                "300": { "id": 300, "name": "Etat", "type": "info", "subType": "numeric",
                         "logicalId": "11-0-currentValue",
                         "configuration": { "property": "currentValue" } },
                "301": { "id": 301, "name": "Off", "type": "action", "subType": "other", "order": 1,
                         "configuration": { "property": "targetValue", "value": "0" } },
                "302": { "id": 302, "name": "Hors gel", "type": "action", "subType": "other", "order": 2,
                         "configuration": { "property": "targetValue", "value": "20" } },
                "303": { "id": 303, "name": "Eco", "type": "action", "subType": "other", "order": 3,
                         "configuration": { "property": "targetValue", "value": "30" } },
                "304": { "id": 304, "name": "Confort", "type": "action", "subType": "other", "order": 4,
                         "configuration": { "property": "targetValue", "value": "99" } },
                "305": { "id": 305, "name": "Température", "type": "info", "subType": "numeric",
                         "generic_type": "TEMPERATURE" }
            }
        }))
    }

    #[test]
    fn pilot_wire_detection_finds_state_and_modes() {
        let device = pilot_heater();
        let detected = detect(&device).unwrap();
        assert_eq!(detected.state_cmd.id, Some(300));
        assert_eq!(detected.options.len(), 4);
        assert_eq!(detected.options[0].label, "Off");
        assert_eq!(detected.options[3].value, 99);
    }

    #[test]
    fn fewer_than_three_modes_is_not_pilot_wire() {
        let mut device = pilot_heater();
        device.cmds.remove("303");
        device.cmds.remove("304");
        assert!(detect(&device).is_none());
    }

    #[test]
    fn unknown_values_need_heating_category_or_generic() {
        let mut device = pilot_heater();
        device.category.heating = false;
        for (id, value) in [("301", "7"), ("302", "13"), ("303", "27")] {
            device.cmds.get_mut(id).unwrap().configuration.value =
                Some(json!(value));
        }
        assert!(detect(&device).is_none());
        device.category.heating = true;
        assert!(detect(&device).is_some());
    }

    #[test]
    fn select_lists_modes_in_order() {
        let device = pilot_heater();
        let rules = DiscoveryRules::default();
        let (spec, actions) = build_select(&device, None, &rules).unwrap();
        assert_eq!(spec.unique_id, "jeedom_30_select");
        assert_eq!(spec.name, "Radiateur Bureau Mode");
        assert_eq!(spec.options, vec!["Off", "Hors gel", "Eco", "Confort"]);
        assert_eq!(actions.state_cmd_id, 300);
        assert_eq!(actions.options[3].cmd_id, 304);
        assert_eq!(actions.options[3].value.as_deref(), Some("99"));
    }

    #[test]
    fn pilot_climate_maps_roles() {
        let device = pilot_heater();
        let rules = DiscoveryRules::default();
        let (spec, actions) = build_climate(&device, None, &rules).unwrap();
        assert_eq!(spec.unique_id, "jeedom_30_pilot_climate");
        assert!(spec.pilot);
        assert_eq!(spec.modes, vec!["heat", "off"]);
        assert_eq!(
            spec.preset_modes.as_deref(),
            Some(["comfort", "eco", "away"].map(String::from).as_slice())
        );
        assert_eq!(actions.mode.heat.as_ref().unwrap().cmd_id, 304);
        assert_eq!(actions.mode.off.as_ref().unwrap().cmd_id, 301);
        assert_eq!(actions.preset.away.as_ref().unwrap().cmd_id, 302);
        assert_eq!(actions.preset.none.as_ref().unwrap().cmd_id, 301);
        assert_eq!(actions.current_temperature_cmd_id, Some(305));
    }

    #[test]
    fn both_comfort_levels_extend_presets() {
        let mut device = pilot_heater();
        let mut c1: Cmd = serde_json::from_value(json!({
            "id": 306, "name": "Confort -1", "type": "action", "subType": "other", "order": 5,
            "configuration": { "property": "targetValue", "value": "50" }
        }))
        .unwrap();
        device.cmds.insert("306".to_string(), c1.clone());
        c1.id = Some(307);
        c1.name = "Confort -2".to_string();
        c1.configuration.value = Some(json!("40"));
        c1.order = Some(6);
        device.cmds.insert("307".to_string(), c1);
        let rules = DiscoveryRules::default();
        let (spec, actions) = build_climate(&device, None, &rules).unwrap();
        assert_eq!(
            spec.preset_modes.as_deref(),
            Some(
                ["comfort", "comfort-1", "comfort-2", "eco", "away"]
                    .map(String::from)
                    .as_slice()
            )
        );
        assert_eq!(actions.preset.comfort_1.as_ref().unwrap().cmd_id, 306);
        assert_eq!(actions.preset.comfort_2.as_ref().unwrap().cmd_id, 307);
    }

    #[test]
    fn off_falls_back_to_lowest_value() {
        let device = eq(json!({
            "id": 31,
            "name": "Radiateur",
            "category": { "heating": "1" },
            "cmds": {
                "310": { "id": 310, "name": "Etat", "type": "info", "subType": "numeric",
                         "logicalId": "12-0-currentValue",
                         "configuration": { "property": "currentValue" } },
                "311": { "id": 311, "name": "Bas", "type": "action", "subType": "other",
                         "configuration": { "property": "targetValue", "value": "30" } },
                "312": { "id": 312, "name": "Moyen", "type": "action", "subType": "other",
                         "configuration": { "property": "targetValue", "value": "50" } },
                "313": { "id": 313, "name": "Haut", "type": "action", "subType": "other",
                         "configuration": { "property": "targetValue", "value": "99" } }
            }
        }));
        let detected = detect(&device).unwrap();
        let roles = roles(&detected.options);
        assert_eq!(roles.off.unwrap().cmd.id, Some(311));
        assert_eq!(roles.comfort.unwrap().cmd.id, Some(313));
    }
}
