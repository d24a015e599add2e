//! Switch: a binary state plus explicit on and off actions.

use crate::discovery::classify::is_blacklisted_cmd;
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::{SwitchActions, SwitchSpec};

use super::{base_name, device_block};

pub struct Detection<'a> {
    pub state_cmd: &'a Cmd,
    pub on_cmd: &'a Cmd,
    pub off_cmd: &'a Cmd,
}

pub fn detect(eq: &EqLogic) -> Option<Detection<'_>> {
    let mut infos: Vec<&Cmd> = Vec::new();
    let mut actions: Vec<&Cmd> = Vec::new();
    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) {
            continue;
        }
        if cmd.is_info() && cmd.subtype == CmdSubtype::Binary {
            infos.push(cmd);
        } else if cmd.is_action() {
            actions.push(cmd);
        }
    }

    let state_cmd = *infos.first()?;

    let mut on_cmd = None;
    let mut off_cmd = None;
    for action in &actions {
        let lid = action.logical_id.as_deref().unwrap_or("").to_lowercase();
        let name = action.name.trim().to_lowercase();
        if lid.contains("setvalue-true") || name == "on" {
            on_cmd = Some(*action);
        } else if lid.contains("setvalue-false") || name == "off" {
            off_cmd = Some(*action);
        }
    }

    Some(Detection {
        state_cmd,
        on_cmd: on_cmd?,
        off_cmd: off_cmd?,
    })
}

pub fn build(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(SwitchSpec, SwitchActions)> {
    let detected = detect(eq)?;

    if rule.is_some()
        && !(rules.allows_cmd(rule, detected.state_cmd)
            && rules.allows_cmd(rule, detected.on_cmd)
            && rules.allows_cmd(rule, detected.off_cmd))
    {
        return None;
    }

    let eq_id = eq.id?;
    let state_cmd_id = detected.state_cmd.id?;
    let ov = rule.map(|r| r.override_for(state_cmd_id)).unwrap_or_default();

    let spec = SwitchSpec {
        name: ov.name.clone().unwrap_or_else(|| base_name(eq, rule)),
        unique_id: format!("jeedom_{eq_id}_switch"),
        payload_on: "ON".to_string(),
        payload_off: "OFF".to_string(),
        state_on: "1".to_string(),
        state_off: "0".to_string(),
        device: device_block(eq, rule, &ov),
    };
    let actions = SwitchActions {
        state_cmd_id,
        on_cmd_id: detected.on_cmd.id?,
        off_cmd_id: detected.off_cmd.id?,
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

    fn plug() -> EqLogic {
        eq(json!({
            "id": 12,
            "name": "Prise TV",
            "cmds": {
                "120": { "id": 120, "name": "Etat", "type": "info", "subType": "binary" },
                "121": { "id": 121, "name": "On", "type": "action", "subType": "other",
                         "logicalId": "37-0-setvalue-true" },
                "122": { "id": 122, "name": "Off", "type": "action", "subType": "other",
                         "logicalId": "37-0-setvalue-false" }
            }
        }))
    }

    #[test]
    fn full_switch_is_detected() {
        let device = plug();
        let rules = DiscoveryRules::default();
        let (spec, actions) = build(&device, None, &rules).unwrap();
        assert_eq!(spec.unique_id, "jeedom_12_switch");
        assert_eq!(spec.name, "Prise TV");
        assert_eq!(spec.payload_on, "ON");
        assert_eq!(spec.state_on, "1");
        assert_eq!(actions.state_cmd_id, 120);
        assert_eq!(actions.on_cmd_id, 121);
        assert_eq!(actions.off_cmd_id, 122);
    }

    #[test]
    fn missing_off_action_is_not_a_switch() {
        let mut device = plug();
        device.cmds.remove("122");
        assert!(detect(&device).is_none());
    }

    #[test]
    fn missing_binary_state_is_not_a_switch() {
        let mut device = plug();
        device.cmds.remove("120");
        assert!(detect(&device).is_none());
    }

    #[test]
    fn on_off_match_by_name_alone() {
        let device = eq(json!({
            "id": 13,
            "name": "Prise",
            "cmds": {
                "130": { "id": 130, "name": "Etat", "type": "info", "subType": "binary" },
                "131": { "id": 131, "name": "On", "type": "action" },
                "132": { "id": 132, "name": "Off", "type": "action" }
            }
        }));
        let detected = detect(&device).unwrap();
        assert_eq!(detected.on_cmd.id, Some(131));
        assert_eq!(detected.off_cmd.id, Some(132));
    }

    #[test]
    fn rule_filter_can_veto_the_switch() {
        let device = plug();
        let rules = DiscoveryRules::parse(
            "devices:\n  - match:\n      eqlogic_id: 12\n    include:\n      cmd_ids: [120, 121]\n",
        )
        .unwrap();
        let rule = rules.find_rule(&device);
        assert!(build(&device, rule, &rules).is_none());
    }
}
