//! The discovery engine: an eqLogic store plus a deterministic
//! classification pass producing the entity and action documents.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::model::EqLogic;
use super::platforms::{
    alarm, binary_sensor, climate, cover, light, number, pilot, sensor, switch, water_heater,
};
use super::rules::DiscoveryRules;
use super::spec::{device_key, ActionDoc, EntityDoc, Platform};

pub struct DiscoveryEngine {
    rules: DiscoveryRules,
    store: BTreeMap<i64, EqLogic>,
}

impl DiscoveryEngine {
    pub fn new(rules: DiscoveryRules) -> Self {
        Self {
            rules,
            store: BTreeMap::new(),
        }
    }

    pub fn set_rules(&mut self, rules: DiscoveryRules) {
        self.rules = rules;
    }

    /// Ingest one eqLogic payload. Returns the device id, or `None` for a
    /// payload without a usable id (which is dropped).
    pub fn update(&mut self, payload: &serde_json::Value) -> Option<i64> {
        let eq: EqLogic = match serde_json::from_value(payload.clone()) {
            Ok(eq) => eq,
            Err(err) => {
                debug!(%err, "discarding unparseable eqLogic payload");
                return None;
            }
        };
        let id = eq.id?;
        trace!(eqlogic = id, cmds = eq.cmds.len(), "eqLogic updated");
        self.store.insert(id, eq);
        Some(id)
    }

    pub fn store(&self) -> &BTreeMap<i64, EqLogic> {
        &self.store
    }

    pub fn restore(&mut self, store: BTreeMap<i64, EqLogic>) {
        self.store = store;
    }

    /// One deterministic pass over the store. Entity specs and action
    /// bindings for a device always come from the same classification, so
    /// the two documents cannot disagree about what a device is.
    pub fn generate(&self) -> (EntityDoc, ActionDoc) {
        let mut entities = EntityDoc::default();
        let mut actions = ActionDoc::default();

        for (eq_id, eq) in &self.store {
            let key = device_key(*eq_id);
            let rule = self.rules.find_rule(eq);

            // Sensors and binary sensors are per-command and platform
            // independent. Binary classification wins for a command.
            for cmd in eq.cmds_sorted() {
                if let Some(spec) = binary_sensor::build(eq, cmd, rule, &self.rules) {
                    entities.binary_sensor.push(spec);
                    continue;
                }
                if let Some(spec) = sensor::build(eq, cmd, rule, &self.rules) {
                    entities.sensor.push(spec);
                }
            }

            let forced = rule.and_then(|r| r.forced_platform());
            if let Some(platform) = forced {
                match platform {
                    Platform::AlarmControlPanel => {
                        if let Some((spec, act)) = alarm::build(eq, rule, &self.rules) {
                            entities.alarm_control_panel.push(spec);
                            actions.alarm_control_panel.insert(key.clone(), act);
                        }
                    }
                    Platform::Climate => {
                        if let Some((spec, act)) = pilot::build_climate(eq, rule, &self.rules) {
                            entities.climate.push(spec);
                            actions.pilot_climate.insert(key.clone(), act);
                        } else if let Some((spec, act)) = climate::build(eq, rule, &self.rules) {
                            entities.climate.push(spec);
                            actions.climate.insert(key.clone(), act);
                        }
                    }
                    Platform::WaterHeater => {
                        if let Some((spec, act)) = water_heater::build(eq, rule, &self.rules) {
                            entities.water_heater.push(spec);
                            actions.water_heater.insert(key.clone(), act);
                        }
                    }
                    Platform::Cover => {
                        if let Some((spec, act)) = cover::build(eq, rule, &self.rules) {
                            entities.cover.push(spec);
                            actions.cover.insert(key.clone(), act);
                        }
                    }
                    Platform::Light => {
                        if let Some((spec, act)) = light::build(eq, rule, &self.rules) {
                            entities.light.push(spec);
                            actions.light.insert(key.clone(), act);
                        }
                    }
                    Platform::Switch => {
                        if let Some((spec, act)) = switch::build(eq, rule, &self.rules) {
                            entities.switch.push(spec);
                            actions.switch.insert(key.clone(), act);
                        }
                    }
                    Platform::Number => {
                        if let Some((spec, act)) = number::build(eq, rule, &self.rules) {
                            entities.number.push(spec);
                            actions.number.insert(key.clone(), act);
                        }
                    }
                    Platform::Select => {
                        if let Some((spec, act)) = pilot::build_select(eq, rule, &self.rules) {
                            entities.select.push(spec);
                            actions.select.insert(key.clone(), act);
                        }
                    }
                    Platform::Sensor | Platform::BinarySensor => {}
                }
                continue;
            }

            // Heuristic pipeline. Climate, water heater, and cover each
            // suppress light, and all four suppress switch. Number and
            // select accumulate alongside whatever else matched.
            if let Some((spec, act)) = alarm::build(eq, rule, &self.rules) {
                entities.alarm_control_panel.push(spec);
                actions.alarm_control_panel.insert(key.clone(), act);
            }

            let mut has_climate = false;
            if let Some((spec, act)) = pilot::build_climate(eq, rule, &self.rules) {
                entities.climate.push(spec);
                actions.pilot_climate.insert(key.clone(), act);
                has_climate = true;
            } else if let Some((spec, act)) = climate::build(eq, rule, &self.rules) {
                entities.climate.push(spec);
                actions.climate.insert(key.clone(), act);
                has_climate = true;
            }

            let mut has_water_heater = false;
            if let Some((spec, act)) = water_heater::build(eq, rule, &self.rules) {
                entities.water_heater.push(spec);
                actions.water_heater.insert(key.clone(), act);
                has_water_heater = true;
            }

            let mut has_cover = false;
            if let Some((spec, act)) = cover::build(eq, rule, &self.rules) {
                entities.cover.push(spec);
                actions.cover.insert(key.clone(), act);
                has_cover = true;
            }

            let mut has_light = false;
            if !has_climate && !has_water_heater && !has_cover {
                if let Some((spec, act)) = light::build(eq, rule, &self.rules) {
                    entities.light.push(spec);
                    actions.light.insert(key.clone(), act);
                    has_light = true;
                }
            }

            if !has_climate && !has_water_heater && !has_cover && !has_light {
                if let Some((spec, act)) = switch::build(eq, rule, &self.rules) {
                    entities.switch.push(spec);
                    actions.switch.insert(key.clone(), act);
                }
            }

            if let Some((spec, act)) = number::build(eq, rule, &self.rules) {
                entities.number.push(spec);
                actions.number.insert(key.clone(), act);
            }
            if let Some((spec, act)) = pilot::build_select(eq, rule, &self.rules) {
                entities.select.push(spec);
                actions.select.insert(key, act);
            }
        }

        (entities, actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plug_payload() -> serde_json::Value {
        json!({
            "id": 12,
            "name": "Prise TV",
            "cmds": {
                "120": { "id": 120, "name": "Etat", "type": "info", "subType": "binary" },
                "121": { "id": 121, "name": "On", "type": "action",
                         "logicalId": "37-0-setvalue-true" },
                "122": { "id": 122, "name": "Off", "type": "action",
                         "logicalId": "37-0-setvalue-false" },
                "123": { "id": 123, "name": "Puissance", "type": "info", "subType": "numeric",
                         "generic_type": "POWER", "unite": "W" }
            }
        })
    }

    fn pilot_payload() -> serde_json::Value {
        json!({
            "id": 30,
            "name": "Radiateur Bureau",
            "category": { "heating": "1" },
            "cmds": {
                "300": { "id": 300, "name": "Etat", "type": "info", "subType": "numeric",
                         "logicalId": "11-0-currentValue",
                         "configuration": { "property": "currentValue" } },
                "301": { "id": 301, "name": "Off", "type": "action", "subType": "other", "order": 1,
                         "configuration": { "property": "targetValue", "value": "0" } },
                "302": { "id": 302, "name": "Eco", "type": "action", "subType": "other", "order": 2,
                         "configuration": { "property": "targetValue", "value": "30" } },
                "303": { "id": 303, "name": "Confort", "type": "action", "subType": "other", "order": 3,
                         "configuration": { "property": "targetValue", "value": "99" } }
            }
        })
    }

    #[test]
    fn switch_device_yields_switch_and_power_sensor() {
        let mut engine = DiscoveryEngine::new(DiscoveryRules::default());
        assert_eq!(engine.update(&plug_payload()), Some(12));
        let (entities, actions) = engine.generate();
        assert_eq!(entities.switch.len(), 1);
        assert_eq!(entities.switch[0].unique_id, "jeedom_12_switch");
        assert_eq!(entities.sensor.len(), 1);
        assert_eq!(entities.sensor[0].unique_id, "jeedom_12_123");
        assert!(entities.light.is_empty());
        assert_eq!(actions.switch["jeedom_12"].on_cmd_id, 121);
    }

    #[test]
    fn pilot_heater_yields_climate_and_select_but_no_switch() {
        let mut engine = DiscoveryEngine::new(DiscoveryRules::default());
        engine.update(&pilot_payload());
        let (entities, actions) = engine.generate();
        assert_eq!(entities.climate.len(), 1);
        assert!(entities.climate[0].pilot);
        assert_eq!(entities.select.len(), 1);
        assert!(entities.switch.is_empty());
        assert!(actions.pilot_climate.contains_key("jeedom_30"));
        assert!(actions.select.contains_key("jeedom_30"));
        assert!(!actions.switch.contains_key("jeedom_30"));
    }

    #[test]
    fn generate_is_idempotent() {
        let mut engine = DiscoveryEngine::new(DiscoveryRules::default());
        engine.update(&plug_payload());
        engine.update(&pilot_payload());
        let first = engine.generate();
        let second = engine.generate();
        assert_eq!(first, second);
    }

    #[test]
    fn ingest_order_does_not_matter() {
        let mut a = DiscoveryEngine::new(DiscoveryRules::default());
        a.update(&plug_payload());
        a.update(&pilot_payload());
        let mut b = DiscoveryEngine::new(DiscoveryRules::default());
        b.update(&pilot_payload());
        b.update(&plug_payload());
        assert_eq!(a.generate(), b.generate());
    }

    #[test]
    fn sensors_emit_in_cmd_id_order_not_display_order() {
        let mut engine = DiscoveryEngine::new(DiscoveryRules::default());
        engine.update(&json!({
            "id": 1,
            "name": "Multi",
            "cmds": {
                "5": { "id": 5, "name": "Température", "type": "info", "subType": "numeric",
                       "order": 2 },
                "6": { "id": 6, "name": "Humidité", "type": "info", "subType": "numeric",
                       "order": 1 }
            }
        }));
        let (entities, _) = engine.generate();
        let ids: Vec<_> = entities.sensor.iter().map(|s| s.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["jeedom_1_5", "jeedom_1_6"]);
    }

    #[test]
    fn payload_without_id_is_dropped() {
        let mut engine = DiscoveryEngine::new(DiscoveryRules::default());
        assert_eq!(engine.update(&json!({ "name": "ghost" })), None);
        assert!(engine.store().is_empty());
        assert_eq!(engine.update(&json!("not an object")), None);
    }

    #[test]
    fn update_replaces_previous_record() {
        let mut engine = DiscoveryEngine::new(DiscoveryRules::default());
        engine.update(&plug_payload());
        let mut renamed = plug_payload();
        renamed["name"] = json!("Prise Hifi");
        engine.update(&renamed);
        let (entities, _) = engine.generate();
        assert_eq!(entities.switch.len(), 1);
        assert_eq!(entities.switch[0].name, "Prise Hifi");
    }

    #[test]
    fn blacklisted_cmds_do_not_affect_output() {
        let mut plain = DiscoveryEngine::new(DiscoveryRules::default());
        plain.update(&plug_payload());
        let mut noisy_payload = plug_payload();
        noisy_payload["cmds"]["999"] = json!({
            "id": 999, "name": "Pinguer noeud", "type": "action",
            "logicalId": "37-0-pingNode"
        });
        let mut noisy = DiscoveryEngine::new(DiscoveryRules::default());
        noisy.update(&noisy_payload);
        assert_eq!(plain.generate(), noisy.generate());
    }

    #[test]
    fn forced_platform_runs_only_that_platform() {
        let rules = DiscoveryRules::parse(
            "devices:\n  - match:\n      eqlogic_id: 30\n    platform: select\n",
        )
        .unwrap();
        let mut engine = DiscoveryEngine::new(rules);
        engine.update(&pilot_payload());
        let (entities, actions) = engine.generate();
        assert_eq!(entities.select.len(), 1);
        assert!(entities.climate.is_empty());
        assert!(actions.pilot_climate.is_empty());
    }

    #[test]
    fn restore_round_trips_through_the_store() {
        let mut engine = DiscoveryEngine::new(DiscoveryRules::default());
        engine.update(&plug_payload());
        let saved = engine.store().clone();
        let mut fresh = DiscoveryEngine::new(DiscoveryRules::default());
        fresh.restore(saved);
        assert_eq!(engine.generate(), fresh.generate());
    }
}
