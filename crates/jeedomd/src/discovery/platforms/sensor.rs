//! Numeric and string info commands become sensors by default.

use crate::discovery::classify::{
    generic_sensor_defaults, is_generic_binary, is_keypad_alarm_cmd, notification_113_class,
};
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::SensorSpec;

use super::device_block;

/// Build a sensor for one info command, or `None` when the command belongs
/// to another platform (binary generics, notification classes, keypad alarm
/// state) or is filtered by the rules.
pub fn build(
    eq: &EqLogic,
    cmd: &Cmd,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<SensorSpec> {
    if !cmd.is_info() {
        return None;
    }
    if is_keypad_alarm_cmd(eq, cmd) {
        return None;
    }
    let generic = cmd.generic();
    if is_generic_binary(&generic) {
        return None;
    }
    if cmd.subtype == CmdSubtype::Binary && notification_113_class(cmd).is_some() {
        return None;
    }
    if !rules.allows_cmd(rule, cmd) {
        return None;
    }

    let eq_id = eq.id?;
    let cmd_id = cmd.id?;
    let cmd_name = cmd.label();
    let ov = rule.map(|r| r.override_for(cmd_id)).unwrap_or_default();

    let mut spec = SensorSpec {
        name: ov
            .name
            .clone()
            .unwrap_or_else(|| format!("{} {cmd_name}", eq.display_name())),
        unique_id: ov
            .unique_id
            .clone()
            .unwrap_or_else(|| format!("jeedom_{eq_id}_{cmd_id}")),
        cmd_id,
        value_template: ov.value_template.clone().or_else(|| {
            (cmd.subtype == CmdSubtype::Numeric).then(|| "{{ value | float(0) }}".to_string())
        }),
        device: device_block(eq, rule, &ov),
        ..SensorSpec::default()
    };

    if let Some(unit) = cmd.unit.as_deref().filter(|u| !u.trim().is_empty()) {
        spec.unit_of_measurement = Some(unit.to_string());
    }

    if let Some(defaults) = generic_sensor_defaults(&generic) {
        if let Some(device_class) = defaults.device_class {
            spec.device_class = Some(device_class.to_string());
        }
        if let Some(state_class) = defaults.state_class {
            spec.state_class = Some(state_class.to_string());
        }
        if let Some(unit) = defaults.unit_of_measurement {
            spec.unit_of_measurement = Some(unit.to_string());
        }
    }

    if let Some(device_class) = ov.device_class {
        spec.device_class = Some(device_class);
    }
    if let Some(state_class) = ov.state_class {
        spec.state_class = Some(state_class);
    }
    spec.icon = ov.icon;
    // Override unit wins over both hub unit and defaults; an explicit empty
    // string suppresses the unit entirely.
    match ov.unit_of_measurement.as_deref() {
        Some("") => spec.unit_of_measurement = None,
        Some(unit) => spec.unit_of_measurement = Some(unit.to_string()),
        None => {}
    }

    // Normalize the legacy lux spelling.
    if spec.device_class.as_deref() == Some("illuminance")
        && spec
            .unit_of_measurement
            .as_deref()
            .is_some_and(|u| u.eq_ignore_ascii_case("lux"))
    {
        spec.unit_of_measurement = Some("lx".to_string());
    }

    Some(spec)
}
