//! Operator-supplied discovery rules, loaded from a YAML file.
//!
//! Rules can force a device onto a platform, filter which commands become
//! entities, and override per-entity presentation fields. An absent file
//! means default rules: everything is discovered heuristically.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use tracing::info;

use super::classify::is_blacklisted_cmd;
use super::model::{Cmd, EqLogic};
use super::spec::Platform;
use super::value::as_i64;

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse rules file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    pub include_all_if_no_filter: bool,
    pub global_generic_whitelist: BTreeSet<String>,
    pub devices: Vec<DeviceRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceRule {
    #[serde(rename = "match", default)]
    pub matcher: RuleMatch,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub include: RuleInclude,
    #[serde(default, deserialize_with = "de_overrides")]
    pub entity_overrides: BTreeMap<i64, EntityOverride>,
    #[serde(default)]
    pub water_heater: Option<WaterHeaterRule>,
    #[serde(default)]
    pub alarm_control_panel: Option<AlarmPanelRule>,
    #[serde(default)]
    pub alarm_state_map: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleMatch {
    #[serde(default)]
    pub eqlogic_id: Option<i64>,
    #[serde(default)]
    pub eqlogic_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleInclude {
    #[serde(default)]
    pub cmd_ids: Vec<i64>,
    #[serde(default)]
    pub generic_types: Vec<String>,
    #[serde(default)]
    pub cmd_names: Vec<String>,
}

impl RuleInclude {
    pub fn is_empty(&self) -> bool {
        self.cmd_ids.is_empty() && self.generic_types.is_empty() && self.cmd_names.is_empty()
    }
}

/// Per-entity field overrides, keyed by command id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityOverride {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub device_identifier: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// `Some("")` suppresses the unit entirely.
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default)]
    pub state_class: Option<String>,
    #[serde(default)]
    pub value_template: Option<String>,
    #[serde(default)]
    pub payload_on: Option<String>,
    #[serde(default)]
    pub payload_off: Option<String>,
    #[serde(default)]
    pub state_map: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub cmd_slug: Option<String>,
    #[serde(default)]
    pub mode_state_template: Option<String>,
}

/// `water_heater: true` enables detection with defaults; a map tunes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WaterHeaterRule {
    Enabled(bool),
    Config(WaterHeaterConfig),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaterHeaterConfig {
    #[serde(default)]
    pub state_cmd_id: Option<i64>,
    #[serde(default)]
    pub on_cmd_id: Option<i64>,
    #[serde(default)]
    pub off_cmd_id: Option<i64>,
    #[serde(default)]
    pub modes: Option<Vec<String>>,
    #[serde(default)]
    pub mode_state_template: Option<String>,
}

impl WaterHeaterRule {
    pub fn enabled(&self) -> bool {
        !matches!(self, WaterHeaterRule::Enabled(false))
    }

    pub fn config(&self) -> WaterHeaterConfig {
        match self {
            WaterHeaterRule::Enabled(_) => WaterHeaterConfig::default(),
            WaterHeaterRule::Config(cfg) => cfg.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlarmPanelRule {
    #[serde(default)]
    pub state_map: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RulesFile {
    #[serde(default)]
    defaults: RulesDefaults,
    #[serde(default)]
    devices: Vec<DeviceRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct RulesDefaults {
    #[serde(default = "default_true")]
    include_all_if_no_filter: bool,
    #[serde(default)]
    global_generic_whitelist: BTreeSet<String>,
}

fn default_true() -> bool {
    true
}

impl Default for RulesDefaults {
    fn default() -> Self {
        Self {
            include_all_if_no_filter: true,
            global_generic_whitelist: BTreeSet::new(),
        }
    }
}

impl Default for DiscoveryRules {
    fn default() -> Self {
        Self {
            include_all_if_no_filter: true,
            global_generic_whitelist: BTreeSet::new(),
            devices: Vec::new(),
        }
    }
}

impl DiscoveryRules {
    /// Load rules from disk. A missing path (or `None`) yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, RulesError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            info!(path = %path.display(), "no discovery rules file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text).map_err(|source| RulesError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let file: RulesFile = serde_yaml::from_str(text)?;
        Ok(Self {
            include_all_if_no_filter: file.defaults.include_all_if_no_filter,
            global_generic_whitelist: file.defaults.global_generic_whitelist,
            devices: file.devices,
        })
    }

    /// First rule whose matcher applies, id match taking precedence over
    /// name match within each rule.
    pub fn find_rule(&self, eq: &EqLogic) -> Option<&DeviceRule> {
        self.devices.iter().find(|rule| {
            if let (Some(want), Some(have)) = (rule.matcher.eqlogic_id, eq.id) {
                if want == have {
                    return true;
                }
            }
            if let Some(want) = &rule.matcher.eqlogic_name {
                if *want == eq.name {
                    return true;
                }
            }
            false
        })
    }

    /// Whether a command may become an entity: blacklist first, then the
    /// global generic whitelist, then the rule's include filters. A rule
    /// with no filters falls back to `include_all_if_no_filter`.
    pub fn allows_cmd(&self, rule: Option<&DeviceRule>, cmd: &Cmd) -> bool {
        if is_blacklisted_cmd(cmd) {
            return false;
        }
        let generic = cmd.generic();
        if !self.global_generic_whitelist.is_empty()
            && !generic.is_empty()
            && !self.global_generic_whitelist.contains(&generic)
        {
            return false;
        }
        let Some(rule) = rule else {
            return true;
        };
        if rule.include.is_empty() {
            return self.include_all_if_no_filter;
        }
        if let Some(id) = cmd.id {
            if rule.include.cmd_ids.contains(&id) {
                return true;
            }
        }
        if rule.include.generic_types.iter().any(|g| *g == generic) {
            return true;
        }
        let name = cmd.name.trim();
        rule.include.cmd_names.iter().any(|n| n == name)
    }
}

impl DeviceRule {
    /// A forced platform, when the rule names a valid non-sensor one.
    pub fn forced_platform(&self) -> Option<Platform> {
        let raw = self
            .platform
            .as_deref()
            .or(self.device_type.as_deref())?
            .trim()
            .to_ascii_lowercase();
        let platform: Platform = raw.parse().ok()?;
        match platform {
            Platform::Sensor | Platform::BinarySensor => None,
            _ => Some(platform),
        }
    }

    pub fn override_for(&self, cmd_id: i64) -> EntityOverride {
        self.entity_overrides.get(&cmd_id).cloned().unwrap_or_default()
    }

    pub fn water_heater_enabled(&self) -> bool {
        self.water_heater.as_ref().is_some_and(|w| w.enabled())
    }

    /// The alarm state map, from either accepted spelling.
    pub fn alarm_state_map(&self) -> Option<&BTreeMap<String, String>> {
        self.alarm_control_panel
            .as_ref()
            .and_then(|a| a.state_map.as_ref())
            .or(self.alarm_state_map.as_ref())
    }
}

// entity_overrides keys arrive as YAML ints or strings; normalize to i64.
fn de_overrides<'de, D>(deserializer: D) -> Result<BTreeMap<i64, EntityOverride>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OverridesVisitor;

    impl<'de> Visitor<'de> for OverridesVisitor {
        type Value = BTreeMap<i64, EntityOverride>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of command ids to entity overrides")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = BTreeMap::new();
            while let Some((key, value)) =
                map.next_entry::<serde_yaml::Value, EntityOverride>()?
            {
                let id = match &key {
                    serde_yaml::Value::Number(n) => n.as_i64(),
                    serde_yaml::Value::String(s) => {
                        as_i64(&serde_json::Value::String(s.clone()))
                    }
                    _ => None,
                };
                let id = id.ok_or_else(|| {
                    de::Error::custom(format!("invalid entity_overrides key: {key:?}"))
                })?;
                out.insert(id, value);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(OverridesVisitor)
}
