//! Thermostat detection: setpoint sliders grouped by kind (hot, cold,
//! auto) plus an optional current temperature.

use std::collections::BTreeMap;

use crate::discovery::classify::is_blacklisted_cmd;
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::{ClimateActions, ClimateSpec, SetpointKind};

use super::{base_name, device_block};

const DEFAULT_MIN_TEMP: f64 = 5.0;
const DEFAULT_MAX_TEMP: f64 = 30.0;
const DEFAULT_TEMP_STEP: f64 = 0.5;

pub struct Detection<'a> {
    pub current_temp_cmd: Option<&'a Cmd>,
    pub target_temp_state_cmd: Option<&'a Cmd>,
    pub set_temp_cmd: &'a Cmd,
    pub set_temp_cmds: BTreeMap<SetpointKind, &'a Cmd>,
    pub target_temp_state_cmds: BTreeMap<SetpointKind, &'a Cmd>,
    pub setpoint_kind: SetpointKind,
}

/// Z-Wave thermostat setpoint numbering first (1 heating, 2 cooling,
/// 10 auto), then keywords in the command name.
fn setpoint_kind(cmd: &Cmd) -> Option<SetpointKind> {
    let lid = cmd.logical_id.as_deref().unwrap_or("").to_lowercase();
    let prop = cmd
        .configuration
        .property
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    let name = cmd.name.to_lowercase();

    if lid.contains("setpoint-1") || prop.contains("setpoint-1") {
        return Some(SetpointKind::Hot);
    }
    if lid.contains("setpoint-2") || prop.contains("setpoint-2") {
        return Some(SetpointKind::Cold);
    }
    if lid.contains("setpoint-10") || prop.contains("setpoint-10") {
        return Some(SetpointKind::Auto);
    }

    if ["chaud", "hot", "heat"].iter().any(|k| name.contains(k)) {
        return Some(SetpointKind::Hot);
    }
    if ["froid", "cold", "cool"].iter().any(|k| name.contains(k)) {
        return Some(SetpointKind::Cold);
    }
    if name.contains("auto") {
        return Some(SetpointKind::Auto);
    }
    None
}

pub fn detect(eq: &EqLogic) -> Option<Detection<'_>> {
    // RGBW controllers expose slider commands that look like setpoints.
    let eq_lid = eq.logical_id.as_deref().unwrap_or("").to_lowercase();
    let eq_name = eq.name.to_lowercase();
    if eq_lid.contains("fgrgbw") || eq_name.contains("fgrgbw") {
        return None;
    }
    if eq.category.light {
        return None;
    }

    let mut current_temp = None;
    let mut target_temp_states: BTreeMap<SetpointKind, &Cmd> = BTreeMap::new();
    let mut set_temp_cmds: BTreeMap<SetpointKind, &Cmd> = BTreeMap::new();

    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) {
            continue;
        }
        let generic = cmd.generic();
        let lid = cmd.logical_id.as_deref().unwrap_or("").to_lowercase();
        let name = cmd.name.to_lowercase();
        let kind = setpoint_kind(cmd);

        if cmd.is_info() && cmd.subtype == CmdSubtype::Numeric {
            if generic == "THERMOSTAT_TEMPERATURE" {
                current_temp = Some(cmd);
            } else if let Some(kind) = kind {
                target_temp_states.insert(kind, cmd);
            } else if generic == "THERMOSTAT_SETPOINT" {
                target_temp_states.entry(SetpointKind::Auto).or_insert(cmd);
            }
        }

        if cmd.is_action() && (cmd.subtype == CmdSubtype::Slider || lid.contains("#slider#")) {
            if let Some(kind) = kind {
                set_temp_cmds.insert(kind, cmd);
            } else if matches!(
                generic.as_str(),
                "THERMOSTAT_SET_SETPOINT" | "THERMOSTAT_SETPOINT"
            ) || name.contains("consigne")
                || name.contains("setpoint")
            {
                set_temp_cmds.entry(SetpointKind::Auto).or_insert(cmd);
            }
        }
    }

    let setpoint_kind = [SetpointKind::Hot, SetpointKind::Auto, SetpointKind::Cold]
        .into_iter()
        .find(|k| set_temp_cmds.contains_key(k))?;
    let set_temp_cmd = set_temp_cmds[&setpoint_kind];
    let target_temp_state_cmd = target_temp_states
        .get(&setpoint_kind)
        .or_else(|| target_temp_states.get(&SetpointKind::Auto))
        .copied();

    Some(Detection {
        current_temp_cmd: current_temp,
        target_temp_state_cmd,
        set_temp_cmd,
        set_temp_cmds,
        target_temp_state_cmds: target_temp_states,
        setpoint_kind,
    })
}

pub fn build(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(ClimateSpec, ClimateActions)> {
    let detected = detect(eq)?;

    if rule.is_some() {
        let checked = [
            detected.current_temp_cmd,
            detected.target_temp_state_cmd,
            Some(detected.set_temp_cmd),
        ];
        for cmd in checked.into_iter().flatten() {
            if !rules.allows_cmd(rule, cmd) {
                return None;
            }
        }
    }

    let eq_id = eq.id?;
    let base = base_name(eq, rule);

    let mut spec = ClimateSpec {
        name: base.clone(),
        unique_id: format!("jeedom_{eq_id}_climate"),
        modes: vec!["off".to_string(), "heat".to_string()],
        min_temp: Some(DEFAULT_MIN_TEMP),
        max_temp: Some(DEFAULT_MAX_TEMP),
        temp_step: Some(DEFAULT_TEMP_STEP),
        device: device_block(eq, rule, &Default::default()),
        ..ClimateSpec::default()
    };

    if let Some(ct_cmd_id) = detected.current_temp_cmd.and_then(|c| c.id) {
        let ov = rule.map(|r| r.override_for(ct_cmd_id)).unwrap_or_default();
        if let Some(name) = &ov.name {
            spec.name = name.clone();
        }
        spec.device = device_block(eq, rule, &ov);
    }

    let actions = ClimateActions {
        set_temperature_cmd_id: detected.set_temp_cmd.id?,
        setpoint_kind: detected.setpoint_kind,
        set_temperature_by_kind: detected
            .set_temp_cmds
            .iter()
            .filter_map(|(k, c)| c.id.map(|id| (*k, id)))
            .collect(),
        current_temperature_cmd_id: detected.current_temp_cmd.and_then(|c| c.id),
        temperature_state_cmd_id: detected.target_temp_state_cmd.and_then(|c| c.id),
        temperature_state_by_kind: detected
            .target_temp_state_cmds
            .iter()
            .filter_map(|(k, c)| c.id.map(|id| (*k, id)))
            .collect(),
    };

    Some((spec, actions))
}
