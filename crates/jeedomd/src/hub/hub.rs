//! Entity index over the discovery documents, with state routing from
//! command events to entity roles.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::discovery::model::EqLogic;
use crate::discovery::spec::{
    ActionDoc, AlarmActions, AlarmPanelSpec, BinarySensorSpec, ClimateActions, ClimateSpec,
    ColorChannel, CoverActions, CoverSpec, EntityDoc, LightActions, LightSpec, NumberActions,
    NumberSpec, PilotClimateActions, Platform, SelectActions, SelectSpec, SensorSpec,
    SetpointKind, SwitchActions, SwitchSpec, WaterHeaterActions, WaterHeaterSpec,
};
use crate::discovery::value::{as_f64, coerce_on_off, Range};
use crate::discovery::{DiscoveryEngine, DiscoveryRules};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Entity presentation config, one variant per platform.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityConfig {
    Sensor(SensorSpec),
    BinarySensor(BinarySensorSpec),
    AlarmControlPanel(AlarmPanelSpec),
    Climate(ClimateSpec),
    Light(LightSpec),
    Switch(SwitchSpec),
    WaterHeater(WaterHeaterSpec),
    Cover(CoverSpec),
    Number(NumberSpec),
    Select(SelectSpec),
}

/// Action bindings for an entity, when it is actionable.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityActions {
    AlarmControlPanel(AlarmActions),
    Climate(ClimateActions),
    PilotClimate(PilotClimateActions),
    Light(LightActions),
    Switch(SwitchActions),
    WaterHeater(WaterHeaterActions),
    Cover(CoverActions),
    Number(NumberActions),
    Select(SelectActions),
}

/// What a command value means to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StateRole {
    State,
    Brightness,
    Channel(ColorChannel),
    Position,
    CurrentTemperature,
    TargetTemperature,
    TargetTemperatureKind(SetpointKind),
}

/// A command value after entity-specific coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    OnOff(bool),
    Number(f64),
    Percent(u8),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub platform: Platform,
    pub unique_id: String,
    pub name: String,
    pub device_key: Option<String>,
    pub config: EntityConfig,
    pub actions: Option<EntityActions>,
    /// Which cmd id feeds which role of this entity.
    pub state_roles: BTreeMap<i64, StateRole>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    EntityAdded {
        platform: Platform,
        unique_id: String,
    },
    StateChanged {
        unique_id: String,
        role: StateRole,
        value: StateValue,
    },
}

pub struct Hub {
    engine: DiscoveryEngine,
    entities: HashMap<String, EntityRecord>,
    /// cmd id to the unique ids listening on it.
    subscriptions: HashMap<i64, Vec<String>>,
    events: broadcast::Sender<HubEvent>,
    allowed_domains: Option<BTreeSet<String>>,
}

impl Hub {
    pub fn new(rules: DiscoveryRules, allowed_domains: Option<BTreeSet<String>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine: DiscoveryEngine::new(rules),
            entities: HashMap::new(),
            subscriptions: HashMap::new(),
            events,
            allowed_domains,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    pub fn entity(&self, unique_id: &str) -> Option<&EntityRecord> {
        self.entities.get(unique_id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    pub fn eqlogic_store(&self) -> &BTreeMap<i64, EqLogic> {
        self.engine.store()
    }

    /// Ingest a discovery payload and refresh the entity index. Returns
    /// true when the payload was usable.
    pub fn handle_eqlogic(&mut self, payload: &serde_json::Value) -> bool {
        if self.engine.update(payload).is_none() {
            return false;
        }
        self.regenerate();
        true
    }

    /// Restore persisted eqLogic records and rebuild the index.
    pub fn restore(&mut self, store: BTreeMap<i64, EqLogic>) {
        if store.is_empty() {
            return;
        }
        let restored = store.len();
        self.engine.restore(store);
        self.regenerate();
        info!(devices = restored, "restored discovery cache");
    }

    fn domain_allowed(&self, platform: Platform) -> bool {
        match &self.allowed_domains {
            Some(domains) => domains.contains(&platform.to_string()),
            None => true,
        }
    }

    fn regenerate(&mut self) {
        let (entities, actions) = self.engine.generate();
        debug!(
            sensors = entities.sensor.len(),
            binary_sensors = entities.binary_sensor.len(),
            switches = entities.switch.len(),
            lights = entities.light.len(),
            covers = entities.cover.len(),
            climates = entities.climate.len(),
            "generated entity documents"
        );
        self.apply(entities, actions);
    }

    fn apply(&mut self, entities: EntityDoc, actions: ActionDoc) {
        let records = index_records(&entities, &actions, |p| self.domain_allowed(p));

        let mut seen = BTreeSet::new();
        for record in records {
            seen.insert(record.unique_id.clone());
            match self.entities.get_mut(&record.unique_id) {
                Some(existing) => {
                    *existing = record;
                }
                None => {
                    let event = HubEvent::EntityAdded {
                        platform: record.platform,
                        unique_id: record.unique_id.clone(),
                    };
                    self.entities.insert(record.unique_id.clone(), record);
                    // Nobody listening is fine.
                    let _ = self.events.send(event);
                }
            }
        }

        // Entities are never removed; a disappearance usually means a
        // partial upstream payload.
        for unique_id in self.entities.keys() {
            if !seen.contains(unique_id) {
                debug!(%unique_id, "known entity missing from regeneration, keeping");
            }
        }

        self.subscriptions.clear();
        for record in self.entities.values() {
            for cmd_id in record.state_roles.keys() {
                self.subscriptions
                    .entry(*cmd_id)
                    .or_default()
                    .push(record.unique_id.clone());
            }
        }
        for listeners in self.subscriptions.values_mut() {
            listeners.sort();
        }
    }

    /// Route one command value event to every entity listening on it.
    pub fn handle_cmd_value(&self, cmd_id: i64, value: &serde_json::Value) {
        let Some(listeners) = self.subscriptions.get(&cmd_id) else {
            trace!(cmd_id, "no entity listening on cmd event");
            return;
        };
        for unique_id in listeners {
            let Some(record) = self.entities.get(unique_id) else {
                continue;
            };
            let Some(role) = record.state_roles.get(&cmd_id).copied() else {
                continue;
            };
            let Some(coerced) = coerce_state(record, role, value) else {
                debug!(%unique_id, cmd_id, "dropping uncoercible cmd value");
                continue;
            };
            let _ = self.events.send(HubEvent::StateChanged {
                unique_id: unique_id.clone(),
                role,
                value: coerced,
            });
        }
    }
}

fn index_records(
    entities: &EntityDoc,
    actions: &ActionDoc,
    domain_allowed: impl Fn(Platform) -> bool,
) -> Vec<EntityRecord> {
    let mut records = Vec::new();

    if domain_allowed(Platform::Sensor) {
        for spec in &entities.sensor {
            records.push(EntityRecord {
                platform: Platform::Sensor,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: device_key_of(&spec.unique_id),
                config: EntityConfig::Sensor(spec.clone()),
                actions: None,
                state_roles: BTreeMap::from([(spec.cmd_id, StateRole::State)]),
            });
        }
    }
    if domain_allowed(Platform::BinarySensor) {
        for spec in &entities.binary_sensor {
            records.push(EntityRecord {
                platform: Platform::BinarySensor,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: device_key_of(&spec.unique_id),
                config: EntityConfig::BinarySensor(spec.clone()),
                actions: None,
                state_roles: BTreeMap::from([(spec.cmd_id, StateRole::State)]),
            });
        }
    }
    if domain_allowed(Platform::AlarmControlPanel) {
        for spec in &entities.alarm_control_panel {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            let Some(act) = actions.alarm_control_panel.get(&key) else {
                continue;
            };
            records.push(EntityRecord {
                platform: Platform::AlarmControlPanel,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: Some(key),
                config: EntityConfig::AlarmControlPanel(spec.clone()),
                actions: Some(EntityActions::AlarmControlPanel(act.clone())),
                state_roles: BTreeMap::from([(act.state_cmd_id, StateRole::State)]),
            });
        }
    }
    if domain_allowed(Platform::Climate) {
        for spec in &entities.climate {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            if spec.pilot {
                let Some(act) = actions.pilot_climate.get(&key) else {
                    continue;
                };
                let mut roles = BTreeMap::from([(act.state_cmd_id, StateRole::State)]);
                if let Some(ct) = act.current_temperature_cmd_id {
                    roles.insert(ct, StateRole::CurrentTemperature);
                }
                records.push(EntityRecord {
                    platform: Platform::Climate,
                    unique_id: spec.unique_id.clone(),
                    name: spec.name.clone(),
                    device_key: Some(key),
                    config: EntityConfig::Climate(spec.clone()),
                    actions: Some(EntityActions::PilotClimate(act.clone())),
                    state_roles: roles,
                });
            } else {
                let Some(act) = actions.climate.get(&key) else {
                    continue;
                };
                let mut roles = BTreeMap::new();
                if let Some(ct) = act.current_temperature_cmd_id {
                    roles.insert(ct, StateRole::CurrentTemperature);
                }
                if let Some(ts) = act.temperature_state_cmd_id {
                    roles.insert(ts, StateRole::TargetTemperature);
                }
                for (kind, cmd_id) in &act.temperature_state_by_kind {
                    roles
                        .entry(*cmd_id)
                        .or_insert(StateRole::TargetTemperatureKind(*kind));
                }
                records.push(EntityRecord {
                    platform: Platform::Climate,
                    unique_id: spec.unique_id.clone(),
                    name: spec.name.clone(),
                    device_key: Some(key),
                    config: EntityConfig::Climate(spec.clone()),
                    actions: Some(EntityActions::Climate(act.clone())),
                    state_roles: roles,
                });
            }
        }
    }
    if domain_allowed(Platform::Light) {
        for spec in &entities.light {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            let Some(act) = actions.light.get(&key) else {
                continue;
            };
            let mut roles = BTreeMap::new();
            if let Some(state) = act.state_cmd_id {
                roles.insert(state, StateRole::State);
            }
            if let Some(brightness) = act.brightness_state_cmd_id {
                roles.insert(brightness, StateRole::Brightness);
            }
            for (channel, binding) in &act.channels {
                if let Some(state) = binding.state_cmd_id {
                    roles.insert(state, StateRole::Channel(*channel));
                }
            }
            records.push(EntityRecord {
                platform: Platform::Light,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: Some(key),
                config: EntityConfig::Light(spec.clone()),
                actions: Some(EntityActions::Light(act.clone())),
                state_roles: roles,
            });
        }
    }
    if domain_allowed(Platform::Switch) {
        for spec in &entities.switch {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            let Some(act) = actions.switch.get(&key) else {
                continue;
            };
            records.push(EntityRecord {
                platform: Platform::Switch,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: Some(key),
                config: EntityConfig::Switch(spec.clone()),
                actions: Some(EntityActions::Switch(act.clone())),
                state_roles: BTreeMap::from([(act.state_cmd_id, StateRole::State)]),
            });
        }
    }
    if domain_allowed(Platform::WaterHeater) {
        for spec in &entities.water_heater {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            let Some(act) = actions.water_heater.get(&key) else {
                continue;
            };
            records.push(EntityRecord {
                platform: Platform::WaterHeater,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: Some(key),
                config: EntityConfig::WaterHeater(spec.clone()),
                actions: Some(EntityActions::WaterHeater(act.clone())),
                state_roles: BTreeMap::from([(act.state_cmd_id, StateRole::State)]),
            });
        }
    }
    if domain_allowed(Platform::Cover) {
        for spec in &entities.cover {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            let Some(act) = actions.cover.get(&key) else {
                continue;
            };
            records.push(EntityRecord {
                platform: Platform::Cover,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: Some(key),
                config: EntityConfig::Cover(spec.clone()),
                actions: Some(EntityActions::Cover(act.clone())),
                state_roles: BTreeMap::from([(act.position_state_cmd_id, StateRole::Position)]),
            });
        }
    }
    if domain_allowed(Platform::Number) {
        for spec in &entities.number {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            let Some(act) = actions.number.get(&key) else {
                continue;
            };
            records.push(EntityRecord {
                platform: Platform::Number,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: Some(key),
                config: EntityConfig::Number(spec.clone()),
                actions: Some(EntityActions::Number(act.clone())),
                state_roles: BTreeMap::from([(act.state_cmd_id, StateRole::State)]),
            });
        }
    }
    if domain_allowed(Platform::Select) {
        for spec in &entities.select {
            let Some(key) = device_key_of(&spec.unique_id) else {
                continue;
            };
            let Some(act) = actions.select.get(&key) else {
                continue;
            };
            records.push(EntityRecord {
                platform: Platform::Select,
                unique_id: spec.unique_id.clone(),
                name: spec.name.clone(),
                device_key: Some(key),
                config: EntityConfig::Select(spec.clone()),
                actions: Some(EntityActions::Select(act.clone())),
                state_roles: BTreeMap::from([(act.state_cmd_id, StateRole::State)]),
            });
        }
    }

    records
}

/// `jeedom_<eq_id>` prefix of a unique id.
fn device_key_of(unique_id: &str) -> Option<String> {
    let rest = unique_id.strip_prefix("jeedom_")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("jeedom_{digits}"))
}

/// Entity-specific coercion of a raw command value.
fn coerce_state(
    record: &EntityRecord,
    role: StateRole,
    value: &serde_json::Value,
) -> Option<StateValue> {
    match (&record.config, role) {
        (EntityConfig::BinarySensor(spec), StateRole::State) => {
            coerce_on_off(value, &spec.payload_on, &spec.payload_off).map(StateValue::OnOff)
        }
        (EntityConfig::Switch(spec), StateRole::State) => {
            coerce_on_off(value, &spec.state_on, &spec.state_off).map(StateValue::OnOff)
        }
        (EntityConfig::Light(_), StateRole::State) => {
            coerce_on_off(value, "1", "0").map(StateValue::OnOff)
        }
        (EntityConfig::Light(_), StateRole::Brightness | StateRole::Channel(_)) => {
            as_f64(value).map(StateValue::Number)
        }
        (EntityConfig::Cover(spec), StateRole::Position) => {
            let range = Range::new(spec.position_min, spec.position_max);
            as_f64(value).map(|v| StateValue::Percent(range.to_percent(v)))
        }
        (EntityConfig::Select(_), StateRole::State) => {
            let Some(EntityActions::Select(actions)) = &record.actions else {
                return None;
            };
            let text = text_of(value);
            let matched = actions
                .options
                .iter()
                .find(|o| o.value.as_deref() == Some(text.as_str()))
                .map(|o| o.label.clone());
            Some(StateValue::Text(matched.unwrap_or(text)))
        }
        (EntityConfig::AlarmControlPanel(spec), StateRole::State) => {
            let text = text_of(value);
            let mapped = spec.state_map.get(&text).cloned();
            Some(StateValue::Text(mapped.unwrap_or(text)))
        }
        (EntityConfig::WaterHeater(spec), StateRole::State) => {
            let on = coerce_on_off(value, "1", "0").or_else(|| {
                let text = text_of(value).to_lowercase();
                if ["on", "heat", "eco", "boost", "true"].contains(&text.as_str()) {
                    Some(true)
                } else if ["off", "false"].contains(&text.as_str()) {
                    Some(false)
                } else {
                    None
                }
            })?;
            let mode = if on {
                spec.modes
                    .iter()
                    .find(|m| *m != "off")
                    .cloned()
                    .unwrap_or_else(|| "on".to_string())
            } else {
                "off".to_string()
            };
            Some(StateValue::Text(mode))
        }
        (
            EntityConfig::Climate(_),
            StateRole::CurrentTemperature
            | StateRole::TargetTemperature
            | StateRole::TargetTemperatureKind(_),
        ) => as_f64(value).map(StateValue::Number),
        (EntityConfig::Climate(_), StateRole::State) => as_f64(value).map(StateValue::Number),
        (EntityConfig::Sensor(_) | EntityConfig::Number(_), StateRole::State) => {
            Some(match as_f64(value) {
                Some(n) => StateValue::Number(n),
                None => StateValue::Text(text_of(value)),
            })
        }
        _ => None,
    }
}

fn text_of(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
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

    fn shutter_payload() -> serde_json::Value {
        json!({
            "id": 8,
            "name": "Volet Salon",
            "cmds": {
                "80": { "id": 80, "name": "Monter", "type": "action", "generic_type": "FLAP_UP" },
                "81": { "id": 81, "name": "Descendre", "type": "action", "generic_type": "FLAP_DOWN" },
                "82": { "id": 82, "name": "Stop", "type": "action", "generic_type": "FLAP_STOP" },
                "84": { "id": 84, "name": "Etat", "type": "info", "subType": "numeric",
                        "generic_type": "FLAP_STATE",
                        "configuration": { "minValue": 0, "maxValue": 99 } }
            }
        })
    }

    #[test]
    fn discovery_creates_entity_records() {
        let mut hub = Hub::new(DiscoveryRules::default(), None);
        assert!(hub.handle_eqlogic(&plug_payload()));
        let switch = hub.entity("jeedom_12_switch").unwrap();
        assert_eq!(switch.platform, Platform::Switch);
        assert_eq!(switch.device_key.as_deref(), Some("jeedom_12"));
        assert_eq!(switch.state_roles[&120], StateRole::State);
        let sensor = hub.entity("jeedom_12_123").unwrap();
        assert_eq!(sensor.platform, Platform::Sensor);
    }

    #[test]
    fn entity_added_fires_once_per_unique_id() {
        let mut hub = Hub::new(DiscoveryRules::default(), None);
        let mut events = hub.subscribe();
        hub.handle_eqlogic(&plug_payload());
        hub.handle_eqlogic(&plug_payload());
        let mut added = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, HubEvent::EntityAdded { .. }) {
                added += 1;
            }
        }
        // One switch and one power sensor.
        assert_eq!(added, 2);
    }

    #[test]
    fn cmd_event_routes_to_switch_state() {
        let mut hub = Hub::new(DiscoveryRules::default(), None);
        hub.handle_eqlogic(&plug_payload());
        let mut events = hub.subscribe();
        hub.handle_cmd_value(120, &json!("1"));
        let event = events.try_recv().unwrap();
        assert_eq!(
            event,
            HubEvent::StateChanged {
                unique_id: "jeedom_12_switch".to_string(),
                role: StateRole::State,
                value: StateValue::OnOff(true),
            }
        );
    }

    #[test]
    fn cover_position_rescales_to_percent() {
        let mut hub = Hub::new(DiscoveryRules::default(), None);
        hub.handle_eqlogic(&shutter_payload());
        let mut events = hub.subscribe();
        // Cmd 84 feeds both the cover position and the raw position sensor.
        hub.handle_cmd_value(84, &json!(99));
        let mut cover_value = None;
        while let Ok(event) = events.try_recv() {
            if let HubEvent::StateChanged { unique_id, value, .. } = event {
                if unique_id == "jeedom_8_cover" {
                    cover_value = Some(value);
                }
            }
        }
        assert_eq!(cover_value, Some(StateValue::Percent(100)));
    }

    #[test]
    fn unknown_cmd_event_is_ignored() {
        let mut hub = Hub::new(DiscoveryRules::default(), None);
        hub.handle_eqlogic(&plug_payload());
        let mut events = hub.subscribe();
        hub.handle_cmd_value(9999, &json!(1));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn uncoercible_value_emits_nothing() {
        let mut hub = Hub::new(DiscoveryRules::default(), None);
        hub.handle_eqlogic(&plug_payload());
        let mut events = hub.subscribe();
        hub.handle_cmd_value(120, &json!({"nested": true}));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn allowed_domains_filter_platforms() {
        let domains = Some(BTreeSet::from(["sensor".to_string()]));
        let mut hub = Hub::new(DiscoveryRules::default(), domains);
        hub.handle_eqlogic(&plug_payload());
        assert!(hub.entity("jeedom_12_switch").is_none());
        assert!(hub.entity("jeedom_12_123").is_some());
    }

    #[test]
    fn restore_rebuilds_the_index() {
        let mut hub = Hub::new(DiscoveryRules::default(), None);
        hub.handle_eqlogic(&plug_payload());
        let saved = hub.eqlogic_store().clone();
        let mut fresh = Hub::new(DiscoveryRules::default(), None);
        fresh.restore(saved);
        assert!(fresh.entity("jeedom_12_switch").is_some());
    }

    #[test]
    fn device_key_parsing() {
        assert_eq!(device_key_of("jeedom_12_switch").as_deref(), Some("jeedom_12"));
        assert_eq!(device_key_of("jeedom_7_101").as_deref(), Some("jeedom_7"));
        assert_eq!(device_key_of("custom_uid"), None);
    }
}
