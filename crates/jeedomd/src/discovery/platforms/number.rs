//! Number: a slider action paired with the first numeric info command.

use crate::discovery::classify::is_blacklisted_cmd;
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::{NumberActions, NumberSpec};

use super::device_block;

pub struct Detection<'a> {
    pub set_cmd: &'a Cmd,
    pub state_cmd: &'a Cmd,
}

pub fn detect(eq: &EqLogic) -> Option<Detection<'_>> {
    let mut set_cmd = None;
    let mut state_cmd = None;
    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) {
            continue;
        }
        let lid = cmd.logical_id.as_deref().unwrap_or("");
        if cmd.is_action() && (cmd.subtype == CmdSubtype::Slider || lid.contains("#slider#")) {
            set_cmd = Some(cmd);
        }
        if cmd.is_info() && cmd.subtype == CmdSubtype::Numeric && state_cmd.is_none() {
            state_cmd = Some(cmd);
        }
    }
    Some(Detection {
        set_cmd: set_cmd?,
        state_cmd: state_cmd?,
    })
}

pub fn build(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(NumberSpec, NumberActions)> {
    let detected = detect(eq)?;

    if rule.is_some()
        && !(rules.allows_cmd(rule, detected.state_cmd) && rules.allows_cmd(rule, detected.set_cmd))
    {
        return None;
    }

    let eq_id = eq.id?;
    let state_cmd_id = detected.state_cmd.id?;
    let ov = rule.map(|r| r.override_for(state_cmd_id)).unwrap_or_default();

    let spec = NumberSpec {
        name: ov
            .name
            .clone()
            .unwrap_or_else(|| format!("{} Valeur", eq.display_name())),
        unique_id: format!("jeedom_{eq_id}_number"),
        value_template: "{{ value | float(0) }}".to_string(),
        device: device_block(eq, rule, &ov),
    };
    let actions = NumberActions {
        state_cmd_id,
        set_cmd_id: detected.set_cmd.id?,
    };
    Some((spec, actions))
}
