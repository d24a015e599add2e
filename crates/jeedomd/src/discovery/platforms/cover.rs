//! Cover: up/down actions plus a stop or set-position action and a
//! readable position state.

use crate::discovery::classify::is_blacklisted_cmd;
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::{CoverActions, CoverSpec};

use super::{base_name, device_block};

pub struct Detection<'a> {
    pub up_cmd: &'a Cmd,
    pub down_cmd: &'a Cmd,
    pub stop_cmd: Option<&'a Cmd>,
    pub set_position_cmd: Option<&'a Cmd>,
    pub position_state_cmd: &'a Cmd,
}

pub fn detect(eq: &EqLogic) -> Option<Detection<'_>> {
    let mut up = None;
    let mut down = None;
    let mut stop = None;
    let mut set_pos = None;
    let mut pos = None;

    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) {
            continue;
        }
        let generic = cmd.generic();
        let lid = cmd.logical_id.as_deref().unwrap_or("").to_lowercase();
        let name = cmd.name.to_lowercase();

        if cmd.is_action() {
            if generic == "FLAP_UP"
                || lid.contains("-open-true")
                || matches!(name.as_str(), "haut" | "up" | "open")
            {
                up = Some(cmd);
            } else if generic == "FLAP_DOWN"
                || lid.contains("-close-true")
                || matches!(name.as_str(), "bas" | "down" | "close")
            {
                down = Some(cmd);
            } else if generic == "FLAP_STOP"
                || (lid.contains("-open-false") && name.contains("stop"))
                || name == "stop"
            {
                stop = Some(cmd);
            } else if generic == "FLAP_SLIDER"
                || lid.contains("#slider#")
                || cmd.subtype == CmdSubtype::Slider
            {
                set_pos = Some(cmd);
            }
        } else if (generic == "FLAP_STATE"
            || lid.contains("currentvalue")
            || matches!(name.as_str(), "etat" | "position" | "state"))
            && matches!(cmd.subtype, CmdSubtype::Numeric | CmdSubtype::String)
        {
            pos = Some(cmd);
        }
    }

    let (up, down, pos) = (up?, down?, pos?);
    if stop.is_none() && set_pos.is_none() {
        return None;
    }
    Some(Detection {
        up_cmd: up,
        down_cmd: down,
        stop_cmd: stop,
        set_position_cmd: set_pos,
        position_state_cmd: pos,
    })
}

pub fn build(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(CoverSpec, CoverActions)> {
    let detected = detect(eq)?;

    // Only the position state is rule-gated; the up/down/stop actions ride
    // along once the device is a cover.
    if !rules.allows_cmd(rule, detected.position_state_cmd) {
        return None;
    }

    let eq_id = eq.id?;
    let pos = detected.position_state_cmd;
    let pos_cmd_id = pos.id?;
    let ov = rule.map(|r| r.override_for(pos_cmd_id)).unwrap_or_default();

    let spec = CoverSpec {
        name: ov.name.clone().unwrap_or_else(|| base_name(eq, rule)),
        unique_id: format!("jeedom_{eq_id}_cover"),
        payload_open: "OPEN".to_string(),
        payload_close: "CLOSE".to_string(),
        payload_stop: "STOP".to_string(),
        position_min: pos.configuration.min_value,
        position_max: pos.configuration.max_value,
        device: device_block(eq, rule, &ov),
    };

    let mut actions = CoverActions {
        position_state_cmd_id: pos_cmd_id,
        open_cmd_id: detected.up_cmd.id?,
        close_cmd_id: detected.down_cmd.id?,
        open_cmd_value: detected.up_cmd.value_literal(),
        close_cmd_value: detected.down_cmd.value_literal(),
        ..CoverActions::default()
    };
    if let Some(stop) = detected.stop_cmd {
        actions.stop_cmd_id = stop.id;
        actions.stop_cmd_value = stop.value_literal();
    }
    if let Some(setp) = detected.set_position_cmd {
        actions.set_position_cmd_id = setp.id;
        actions.set_position_min = setp.configuration.min_value.map(|v| v as i64);
        actions.set_position_max = setp.configuration.max_value.map(|v| v as i64);
        actions.set_position_property = setp
            .configuration
            .property
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
    }

    Some((spec, actions))
}
