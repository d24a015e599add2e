//! Alarm control panel: keypad-like devices with an armed-state info
//! command and arm/disarm actions matched by name hints.

use std::collections::BTreeMap;

use crate::discovery::classify::{
    is_alarm_state_subtype, is_blacklisted_cmd, is_keypad_alarm_cmd, is_keypad_eqlogic,
    KEYPAD_AWAY_HINTS, KEYPAD_DISARM_HINTS, KEYPAD_HOME_HINTS,
};
use crate::discovery::model::{Cmd, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::slug::slugify;
use crate::discovery::spec::{AlarmActions, AlarmPanelSpec};

use super::{base_name, device_block};

pub struct Detection<'a> {
    pub state_cmd: &'a Cmd,
    pub arm_home_cmd: Option<&'a Cmd>,
    pub arm_away_cmd: Option<&'a Cmd>,
    pub arm_night_cmd: Option<&'a Cmd>,
    pub disarm_cmd: Option<&'a Cmd>,
}

pub fn detect(eq: &EqLogic) -> Option<Detection<'_>> {
    if !is_keypad_eqlogic(eq) {
        return None;
    }

    let state_cmd = eq.cmds_sorted().into_iter().find(|cmd| {
        !is_blacklisted_cmd(cmd)
            && cmd.is_info()
            && is_alarm_state_subtype(cmd.subtype)
            && is_keypad_alarm_cmd(eq, cmd)
    })?;

    let mut arm_home_cmd = None;
    let mut arm_away_cmd = None;
    let mut arm_night_cmd = None;
    let mut disarm_cmd = None;

    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) || !cmd.is_action() {
            continue;
        }
        let raw = if cmd.name.trim().is_empty() {
            cmd.logical_id.as_deref().unwrap_or("")
        } else {
            cmd.name.as_str()
        };
        let label = slugify(raw);
        // First match wins for each role, and a command takes one role only.
        if arm_home_cmd.is_none() && KEYPAD_HOME_HINTS.iter().any(|h| label.contains(h)) {
            arm_home_cmd = Some(cmd);
            continue;
        }
        if arm_away_cmd.is_none() && KEYPAD_AWAY_HINTS.iter().any(|h| label.contains(h)) {
            arm_away_cmd = Some(cmd);
            continue;
        }
        if disarm_cmd.is_none() && KEYPAD_DISARM_HINTS.iter().any(|h| label.contains(h)) {
            disarm_cmd = Some(cmd);
            continue;
        }
        if arm_night_cmd.is_none() && label.contains("night") {
            arm_night_cmd = Some(cmd);
        }
    }

    Some(Detection {
        state_cmd,
        arm_home_cmd,
        arm_away_cmd,
        arm_night_cmd,
        disarm_cmd,
    })
}

fn default_state_map() -> BTreeMap<String, String> {
    [
        ("0", "disarmed"),
        ("1", "armed_away"),
        ("home", "disarmed"),
        ("away", "armed_away"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn build(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(AlarmPanelSpec, AlarmActions)> {
    let detected = detect(eq)?;
    if rule.is_some() && !rules.allows_cmd(rule, detected.state_cmd) {
        return None;
    }

    let eq_id = eq.id?;
    let state_cmd_id = detected.state_cmd.id?;
    let ov = rule.map(|r| r.override_for(state_cmd_id)).unwrap_or_default();
    let base = base_name(eq, rule);

    let state_map = ov
        .state_map
        .clone()
        .or_else(|| rule.and_then(|r| r.alarm_state_map().cloned()))
        .unwrap_or_else(default_state_map);

    let spec = AlarmPanelSpec {
        name: ov.name.clone().unwrap_or(base),
        unique_id: ov
            .unique_id
            .clone()
            .unwrap_or_else(|| format!("jeedom_{eq_id}_alarm_control_panel")),
        state_map,
        device: device_block(eq, rule, &ov),
    };

    let allowed = |cmd: Option<&Cmd>| -> Option<i64> {
        let cmd = cmd?;
        if rule.is_some() && !rules.allows_cmd(rule, cmd) {
            return None;
        }
        cmd.id
    };
    let actions = AlarmActions {
        state_cmd_id,
        arm_home_cmd_id: allowed(detected.arm_home_cmd),
        arm_away_cmd_id: allowed(detected.arm_away_cmd),
        arm_night_cmd_id: allowed(detected.arm_night_cmd),
        disarm_cmd_id: allowed(detected.disarm_cmd),
    };
    Some((spec, actions))
}
