//! Water heater: rule-only platform. The operator opts a device in, and
//! the detector fills in state/on/off commands from explicit ids, the
//! switch heuristics, or a scored scan of the command table.

use crate::discovery::classify::is_blacklisted_cmd;
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules, WaterHeaterConfig};
use crate::discovery::spec::{Platform, WaterHeaterActions, WaterHeaterSpec};
use tracing::debug;

use super::{base_name, device_block, switch};

pub struct Detection<'a> {
    pub state_cmd: &'a Cmd,
    pub on_cmd: &'a Cmd,
    pub off_cmd: &'a Cmd,
    pub modes: Vec<String>,
}

pub fn detect<'a>(
    eq: &'a EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<Detection<'a>> {
    let rule = rule?;
    let forced = rule.forced_platform() == Some(Platform::WaterHeater);
    if !forced && !rule.water_heater_enabled() {
        return None;
    }
    let cfg: WaterHeaterConfig = rule
        .water_heater
        .as_ref()
        .map(|w| w.config())
        .unwrap_or_default();

    let mut state_cmd = cfg.state_cmd_id.and_then(|id| eq.cmd_by_id(id));
    let mut on_cmd = cfg.on_cmd_id.and_then(|id| eq.cmd_by_id(id));
    let mut off_cmd = cfg.off_cmd_id.and_then(|id| eq.cmd_by_id(id));

    if state_cmd.is_none() || on_cmd.is_none() || off_cmd.is_none() {
        if let Some(sw) = switch::detect(eq) {
            state_cmd = state_cmd.or(Some(sw.state_cmd));
            on_cmd = on_cmd.or(Some(sw.on_cmd));
            off_cmd = off_cmd.or(Some(sw.off_cmd));
        }
    }

    if state_cmd.is_none() || on_cmd.is_none() || off_cmd.is_none() {
        let mut actions: Vec<&Cmd> = Vec::new();
        let mut infos: Vec<&Cmd> = Vec::new();
        for cmd in eq.cmds_sorted() {
            if is_blacklisted_cmd(cmd) {
                continue;
            }
            if cmd.is_action() {
                actions.push(cmd);
            } else if cmd.is_info() {
                infos.push(cmd);
            }
        }

        for action in &actions {
            let lid = action.logical_id.as_deref().unwrap_or("").to_lowercase();
            let name = action.name.trim().to_lowercase();
            let generic = action.generic();
            if on_cmd.is_none()
                && (lid.contains("setvalue-true")
                    || name == "on"
                    || matches!(generic.as_str(), "SWITCH_ON" | "WATER_HEATER_ON"))
            {
                on_cmd = Some(*action);
            }
            if off_cmd.is_none()
                && (lid.contains("setvalue-false")
                    || name == "off"
                    || matches!(generic.as_str(), "SWITCH_OFF" | "WATER_HEATER_OFF"))
            {
                off_cmd = Some(*action);
            }
        }

        // Score candidate state commands: a binary subtype counts most,
        // then an etat/state/status name, then a currentValue logical id.
        if state_cmd.is_none() {
            let mut best: Option<(&Cmd, i32)> = None;
            for info in &infos {
                let name = info.name.trim().to_lowercase();
                let lid = info.logical_id.as_deref().unwrap_or("").to_lowercase();
                let mut score = 0;
                if info.subtype == CmdSubtype::Binary {
                    score += 3;
                }
                if ["etat", "state", "status"].iter().any(|k| name.contains(k)) {
                    score += 2;
                }
                if lid.contains("currentvalue") {
                    score += 1;
                }
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((info, score));
                }
            }
            state_cmd = best.map(|(c, _)| c);
        }
    }

    let (Some(state_cmd), Some(on_cmd), Some(off_cmd)) = (state_cmd, on_cmd, off_cmd) else {
        debug!(
            eqlogic = %eq.display_name(),
            "water heater detection missing state/on/off command"
        );
        return None;
    };

    if !(rules.allows_cmd(Some(rule), state_cmd)
        && rules.allows_cmd(Some(rule), on_cmd)
        && rules.allows_cmd(Some(rule), off_cmd))
    {
        debug!(
            eqlogic = %eq.display_name(),
            "water heater detection filtered by rule"
        );
        return None;
    }

    let modes = cfg
        .modes
        .clone()
        .unwrap_or_else(|| vec!["off".to_string(), "heat".to_string()]);

    Some(Detection {
        state_cmd,
        on_cmd,
        off_cmd,
        modes,
    })
}

fn on_mode(modes: &[String]) -> String {
    if modes.iter().any(|m| m == "heat") {
        return "heat".to_string();
    }
    modes
        .iter()
        .find(|m| *m != "off")
        .cloned()
        .unwrap_or_else(|| "on".to_string())
}

pub fn build(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(WaterHeaterSpec, WaterHeaterActions)> {
    let detected = detect(eq, rule, rules)?;

    let mut modes: Vec<String> = detected
        .modes
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if modes.is_empty() {
        modes = vec!["off".to_string(), "heat".to_string()];
    }
    if !modes.iter().any(|m| m == "off") {
        modes.insert(0, "off".to_string());
    }

    let eq_id = eq.id?;
    let state_cmd_id = detected.state_cmd.id?;
    let ov = rule.map(|r| r.override_for(state_cmd_id)).unwrap_or_default();
    let base = base_name(eq, rule);

    let on = on_mode(&modes);
    let default_template = format!(
        "{{% set v = value | string | lower %}}{{% if v in ['on','heat','eco','boost','1','true'] or (value | int(0)) > 0 %}}{on}{{% else %}}off{{% endif %}}"
    );
    let mode_state_template = ov
        .mode_state_template
        .clone()
        .or_else(|| ov.value_template.clone())
        .unwrap_or(default_template);

    let spec = WaterHeaterSpec {
        name: ov.name.clone().unwrap_or(base),
        unique_id: ov
            .unique_id
            .clone()
            .unwrap_or_else(|| format!("jeedom_{eq_id}_water_heater")),
        modes,
        mode_state_template,
        device: device_block(eq, rule, &ov),
    };
    let actions = WaterHeaterActions {
        state_cmd_id,
        on_cmd_id: detected.on_cmd.id?,
        off_cmd_id: detected.off_cmd.id?,
    };
    Some((spec, actions))
}
