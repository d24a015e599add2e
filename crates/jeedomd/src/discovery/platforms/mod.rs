//! Per-platform detection and document builders.
//!
//! Each module owns one platform: a `detect_*` function that inspects an
//! eqLogic's command table and a `build` function that turns a detection
//! into the entity spec and action bindings. Sensors and binary sensors are
//! per-command and produce no actions.

pub mod alarm;
pub mod binary_sensor;
pub mod climate;
pub mod cover;
pub mod light;
pub mod number;
pub mod pilot;
pub mod sensor;
pub mod switch;
pub mod water_heater;

use super::model::EqLogic;
use super::rules::{DeviceRule, EntityOverride};
use super::slug::slugify;
use super::spec::DeviceBlock;

/// Device identifier slug: rule slug wins over the device name.
pub(crate) fn device_slug(eq: &EqLogic, rule: Option<&DeviceRule>) -> String {
    if let Some(slug) = rule.and_then(|r| r.slug.as_deref()) {
        if !slug.trim().is_empty() {
            return slugify(slug);
        }
    }
    slugify(&eq.display_name())
}

/// Display name for single-entity platforms: rule name wins over the
/// device name.
pub(crate) fn base_name(eq: &EqLogic, rule: Option<&DeviceRule>) -> String {
    rule.and_then(|r| r.device_name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| eq.display_name())
}

/// Device registry block with override fields applied.
pub(crate) fn device_block(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    ov: &EntityOverride,
) -> DeviceBlock {
    let dslug = device_slug(eq, rule);
    DeviceBlock {
        identifiers: vec![ov
            .device_identifier
            .clone()
            .unwrap_or_else(|| format!("jeedom_{dslug}"))],
        name: ov
            .device_name
            .clone()
            .unwrap_or_else(|| base_name(eq, rule)),
        manufacturer: ov.manufacturer.clone(),
        model: ov.model.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eq(value: serde_json::Value) -> EqLogic {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rule_slug_and_name_take_precedence() {
        let device = eq(json!({ "id": 4, "name": "Prise Salon" }));
        assert_eq!(device_slug(&device, None), "prise_salon");
        let rule: DeviceRule = serde_yaml::from_str("slug: Prise-TV\ndevice_name: Prise TV\n").unwrap();
        assert_eq!(device_slug(&device, Some(&rule)), "prise_tv");
        assert_eq!(base_name(&device, Some(&rule)), "Prise TV");
    }

    #[test]
    fn device_block_applies_overrides() {
        let device = eq(json!({ "id": 4, "name": "Prise Salon" }));
        let ov = EntityOverride {
            device_identifier: Some("my_plug".to_string()),
            manufacturer: Some("Fibaro".to_string()),
            ..EntityOverride::default()
        };
        let block = device_block(&device, None, &ov);
        assert_eq!(block.identifiers, vec!["my_plug".to_string()]);
        assert_eq!(block.name, "Prise Salon");
        assert_eq!(block.manufacturer.as_deref(), Some("Fibaro"));
    }
}
