//! Binary sensors: info commands with a binary generic type, a motion
//! keyword, or a recognizable Z-Wave notification purpose.

use crate::discovery::classify::{
    generic_binary_class, is_generic_binary, is_keypad_alarm_cmd, is_motion_hint,
    notification_113_class, tamper_class, vibration_class, BinaryDeviceClass,
};
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::BinarySensorSpec;

use super::device_block;

pub fn build(
    eq: &EqLogic,
    cmd: &Cmd,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<BinarySensorSpec> {
    if !cmd.is_info() {
        return None;
    }
    if !matches!(cmd.subtype, CmdSubtype::Binary | CmdSubtype::Numeric) {
        return None;
    }
    if !rules.allows_cmd(rule, cmd) {
        return None;
    }
    if is_keypad_alarm_cmd(eq, cmd) {
        return None;
    }

    let generic = cmd.generic();
    let motion = is_motion_hint(cmd);
    let notif_113 = notification_113_class(cmd);
    let vibration = vibration_class(cmd);
    let tamper = tamper_class(cmd);

    if !(is_generic_binary(&generic)
        || motion
        || notif_113.is_some()
        || vibration.is_some()
        || tamper.is_some())
    {
        return None;
    }

    let eq_id = eq.id?;
    let cmd_id = cmd.id?;
    let cmd_name = cmd.label();
    let ov = rule.map(|r| r.override_for(cmd_id)).unwrap_or_default();

    // Notification class wins, then vibration/tamper keywords, then the
    // motion/presence hints, then the generic default.
    let device_class: Option<BinaryDeviceClass> = notif_113
        .or(vibration)
        .or(tamper)
        .or_else(|| (generic == "PRESENCE" || motion).then_some(BinaryDeviceClass::Motion))
        .or_else(|| generic_binary_class(&generic));

    let mut spec = BinarySensorSpec {
        name: ov
            .name
            .clone()
            .unwrap_or_else(|| format!("{} {cmd_name}", eq.display_name())),
        unique_id: ov
            .unique_id
            .clone()
            .unwrap_or_else(|| format!("jeedom_{eq_id}_{cmd_id}")),
        cmd_id,
        payload_on: ov.payload_on.clone().unwrap_or_else(|| "1".to_string()),
        payload_off: ov.payload_off.clone().unwrap_or_else(|| "0".to_string()),
        value_template: ov.value_template.clone().or_else(|| {
            (cmd.subtype == CmdSubtype::Numeric)
                .then(|| "{{ '1' if (value | int(0)) > 0 else '0' }}".to_string())
        }),
        device_class: device_class.map(|c| c.to_string()),
        device: device_block(eq, rule, &ov),
        ..BinarySensorSpec::default()
    };

    if let Some(device_class) = ov.device_class {
        spec.device_class = Some(device_class);
    }
    spec.icon = ov.icon;

    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eq(value: serde_json::Value) -> EqLogic {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn presence_generic_becomes_motion() {
        let device = eq(json!({
            "id": 7,
            "name": "Hall",
            "cmds": { "70": { "id": 70, "name": "Présence", "type": "info",
                              "subType": "binary", "generic_type": "PRESENCE" } }
        }));
        let rules = DiscoveryRules::default();
        let spec = build(&device, &device.cmds["70"], None, &rules).unwrap();
        assert_eq!(spec.device_class.as_deref(), Some("motion"));
        assert_eq!(spec.payload_on, "1");
        assert_eq!(spec.value_template, None);
    }

    #[test]
    fn opening_generic_keeps_opening_class() {
        let device = eq(json!({
            "id": 7,
            "name": "Porte",
            "cmds": { "71": { "id": 71, "name": "Ouverture", "type": "info",
                              "subType": "binary", "generic_type": "OPENING" } }
        }));
        let rules = DiscoveryRules::default();
        let spec = build(&device, &device.cmds["71"], None, &rules).unwrap();
        assert_eq!(spec.device_class.as_deref(), Some("opening"));
    }

    #[test]
    fn numeric_motion_hint_gets_threshold_template() {
        let device = eq(json!({
            "id": 7,
            "name": "Hall",
            "cmds": { "72": { "id": 72, "name": "Mouvement", "type": "info",
                              "subType": "numeric" } }
        }));
        let rules = DiscoveryRules::default();
        let spec = build(&device, &device.cmds["72"], None, &rules).unwrap();
        assert_eq!(spec.device_class.as_deref(), Some("motion"));
        assert_eq!(
            spec.value_template.as_deref(),
            Some("{{ '1' if (value | int(0)) > 0 else '0' }}")
        );
    }

    #[test]
    fn notification_113_beats_generic() {
        let device = eq(json!({
            "id": 7,
            "name": "Capteur",
            "cmds": { "73": { "id": 73, "name": "Sensor Status", "type": "info",
                              "subType": "binary", "generic_type": "PRESENCE",
                              "configuration": { "class": "113" } } }
        }));
        let rules = DiscoveryRules::default();
        let spec = build(&device, &device.cmds["73"], None, &rules).unwrap();
        assert_eq!(spec.device_class.as_deref(), Some("vibration"));
    }

    #[test]
    fn plain_binary_state_is_not_a_binary_sensor() {
        let device = eq(json!({
            "id": 7,
            "name": "Prise",
            "cmds": { "74": { "id": 74, "name": "Etat", "type": "info", "subType": "binary" } }
        }));
        let rules = DiscoveryRules::default();
        assert!(build(&device, &device.cmds["74"], None, &rules).is_none());
    }
}
