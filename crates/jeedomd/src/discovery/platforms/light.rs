//! Light: on/off, dimmer, and RGBW channel detection.
//!
//! Runs after climate and cover so heating and shutter devices with
//! slider-shaped commands do not get misread as dimmers.

use std::collections::BTreeMap;

use crate::discovery::classify::is_blacklisted_cmd;
use crate::discovery::model::{Cmd, CmdSubtype, EqLogic};
use crate::discovery::rules::{DeviceRule, DiscoveryRules};
use crate::discovery::spec::{ChannelBinding, ColorChannel, LightActions, LightSpec};

use super::{base_name, device_block, climate, cover};

const LIGHT_GENERICS: &[&str] = &["LIGHT_ON", "LIGHT_OFF", "LIGHT_SLIDER", "DIMMER"];
const BRIGHTNESS_NAME_HINTS: &[&str] = &[
    "brightness",
    "dimmer",
    "level",
    "niveau",
    "intensite",
    "luminosite",
];
const BRIGHTNESS_STATE_NAMES: &[&str] = &[
    "niveau",
    "brightness",
    "dimmer",
    "level",
    "valeur",
    "intensite",
    "luminosite",
];

pub struct Detection<'a> {
    pub on_cmd: Option<&'a Cmd>,
    pub off_cmd: Option<&'a Cmd>,
    pub brightness_set_cmd: Option<&'a Cmd>,
    pub state_cmd: Option<&'a Cmd>,
    pub brightness_state_cmd: Option<&'a Cmd>,
    pub color_set_cmds: BTreeMap<ColorChannel, &'a Cmd>,
    pub color_state_cmds: BTreeMap<ColorChannel, &'a Cmd>,
}

// Lowercased, diacritics stripped, separator runs collapsed to spaces.
fn norm_text(value: &str) -> String {
    slug::slugify(value).replace('-', " ")
}

/// RGBW channel a command addresses, from the generic type first and then
/// French/English keywords in its text fields.
fn color_channel(cmd: &Cmd) -> Option<ColorChannel> {
    let generic = cmd.generic();
    if generic.contains("RED") {
        return Some(ColorChannel::Red);
    }
    if generic.contains("GREEN") {
        return Some(ColorChannel::Green);
    }
    if generic.contains("BLUE") {
        return Some(ColorChannel::Blue);
    }
    if generic.contains("WHITE") || generic.ends_with("_W") {
        return Some(ColorChannel::White);
    }

    let lid = norm_text(cmd.logical_id.as_deref().unwrap_or(""));
    let name = norm_text(&cmd.name);
    let prop = norm_text(cmd.configuration.property.as_deref().unwrap_or(""));
    let text = [lid, name, prop]
        .iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let has = |word: &str| tokens.iter().any(|t| *t == word);
    if has("red") || has("rouge") {
        return Some(ColorChannel::Red);
    }
    if has("green") || has("vert") {
        return Some(ColorChannel::Green);
    }
    if has("blue") || has("bleu") {
        return Some(ColorChannel::Blue);
    }
    if has("white") || has("blanc") {
        return Some(ColorChannel::White);
    }

    // Compact forms: an rgb/rgbw/color token next to a bare channel letter.
    if ["rgb", "rgbw", "color", "couleur"].iter().any(|t| has(t)) {
        for (token, channel) in [
            ("r", ColorChannel::Red),
            ("g", ColorChannel::Green),
            ("b", ColorChannel::Blue),
            ("w", ColorChannel::White),
        ] {
            if has(token) {
                return Some(channel);
            }
        }
    }
    for pair in tokens.windows(2) {
        if pair[0] == "color" {
            match pair[1] {
                "r" => return Some(ColorChannel::Red),
                "g" => return Some(ColorChannel::Green),
                "b" => return Some(ColorChannel::Blue),
                "w" => return Some(ColorChannel::White),
                _ => {}
            }
        }
    }
    None
}

pub fn detect(eq: &EqLogic) -> Option<Detection<'_>> {
    // Climate and cover classifications win outright.
    if climate::detect(eq).is_some() || cover::detect(eq).is_some() {
        return None;
    }
    if (eq.category.opening || eq.category.automatism) && !eq.category.light {
        return None;
    }

    let mut actions: Vec<&Cmd> = Vec::new();
    let mut infos: Vec<&Cmd> = Vec::new();
    for cmd in eq.cmds_sorted() {
        if is_blacklisted_cmd(cmd) {
            continue;
        }
        if cmd.is_action() {
            actions.push(cmd);
        } else if cmd.is_info() {
            infos.push(cmd);
        }
    }

    let mut on_cmd = None;
    let mut off_cmd = None;
    let mut color_set_cmds: BTreeMap<ColorChannel, &Cmd> = BTreeMap::new();
    let mut color_state_cmds: BTreeMap<ColorChannel, &Cmd> = BTreeMap::new();

    for action in &actions {
        let lid = action.logical_id.as_deref().unwrap_or("").to_lowercase();
        let name = action.name.trim().to_lowercase();
        let generic = action.generic();

        if lid.contains("setvalue-true")
            || name == "on"
            || matches!(generic.as_str(), "LIGHT_ON" | "SWITCH_ON")
        {
            on_cmd = Some(*action);
        } else if lid.contains("setvalue-false")
            || name == "off"
            || matches!(generic.as_str(), "LIGHT_OFF" | "SWITCH_OFF")
        {
            off_cmd = Some(*action);
        }

        if action.subtype == CmdSubtype::Slider || lid.contains("#slider#") {
            if let Some(channel) = color_channel(action) {
                color_set_cmds.entry(channel).or_insert(action);
            }
        }
    }

    let mut state_cmd = None;
    for info in &infos {
        let lid = info.logical_id.as_deref().unwrap_or("").to_lowercase();
        let name = info.name.trim().to_lowercase();

        if state_cmd.is_none()
            && info.subtype == CmdSubtype::Binary
            && (matches!(name.as_str(), "etat" | "state" | "on" | "off")
                || lid.contains("currentvalue"))
        {
            state_cmd = Some(*info);
        }
        if info.subtype == CmdSubtype::Numeric {
            if let Some(channel) = color_channel(info) {
                color_state_cmds.entry(channel).or_insert(info);
            }
        }
    }

    let is_color_set = |cmd: &Cmd| color_set_cmds.values().any(|c| c.id == cmd.id);
    let is_color_state = |cmd: &Cmd| color_state_cmds.values().any(|c| c.id == cmd.id);

    let mut brightness_set_cmd = None;
    for action in &actions {
        if is_color_set(action) {
            continue;
        }
        let lid = action.logical_id.as_deref().unwrap_or("").to_lowercase();
        let name = action.name.trim().to_lowercase();
        let generic = action.generic();
        if action.subtype == CmdSubtype::Slider
            || lid.contains("#slider#")
            || matches!(generic.as_str(), "LIGHT_SLIDER" | "DIMMER")
            || BRIGHTNESS_NAME_HINTS.iter().any(|h| name.contains(h))
        {
            brightness_set_cmd = Some(*action);
            break;
        }
    }

    let mut brightness_state_cmd = None;
    for info in &infos {
        if info.subtype != CmdSubtype::Numeric || is_color_state(info) {
            continue;
        }
        let lid = info.logical_id.as_deref().unwrap_or("").to_lowercase();
        let name = info.name.trim().to_lowercase();
        if lid.contains("currentvalue") || BRIGHTNESS_STATE_NAMES.contains(&name.as_str()) {
            brightness_state_cmd = Some(*info);
            break;
        }
    }

    let has_light_generic = eq
        .cmds
        .values()
        .any(|c| LIGHT_GENERICS.contains(&c.generic().as_str()));
    let has_rgb = [ColorChannel::Red, ColorChannel::Green, ColorChannel::Blue]
        .iter()
        .all(|ch| color_set_cmds.contains_key(ch));

    let looks_like_light =
        has_rgb || brightness_set_cmd.is_some() || eq.category.light || has_light_generic;
    let controllable =
        has_rgb || (on_cmd.is_some() && off_cmd.is_some()) || brightness_set_cmd.is_some();
    if !(looks_like_light && controllable) {
        return None;
    }

    Some(Detection {
        on_cmd,
        off_cmd,
        brightness_set_cmd,
        state_cmd,
        brightness_state_cmd,
        color_set_cmds,
        color_state_cmds,
    })
}

pub fn build(
    eq: &EqLogic,
    rule: Option<&DeviceRule>,
    rules: &DiscoveryRules,
) -> Option<(LightSpec, LightActions)> {
    let detected = detect(eq)?;

    if rule.is_some() {
        let named = [
            detected.on_cmd,
            detected.off_cmd,
            detected.brightness_set_cmd,
            detected.state_cmd,
            detected.brightness_state_cmd,
        ];
        for cmd in named.into_iter().flatten() {
            if !rules.allows_cmd(rule, cmd) {
                return None;
            }
        }
        for cmd in detected
            .color_set_cmds
            .values()
            .chain(detected.color_state_cmds.values())
        {
            if !rules.allows_cmd(rule, cmd) {
                return None;
            }
        }
    }

    let eq_id = eq.id?;
    let base = base_name(eq, rule);

    let mut spec = LightSpec {
        name: base.clone(),
        unique_id: format!("jeedom_{eq_id}_light"),
        payload_on: "ON".to_string(),
        payload_off: "OFF".to_string(),
        optimistic: Some(true),
        brightness_scale: None,
        device: device_block(eq, rule, &Default::default()),
    };

    // With a readable state the light is not optimistic, and the state
    // command's override drives the presentation fields.
    if let Some(state_cmd) = detected.state_cmd {
        if let Some(state_cmd_id) = state_cmd.id {
            let ov = rule.map(|r| r.override_for(state_cmd_id)).unwrap_or_default();
            if let Some(name) = &ov.name {
                spec.name = name.clone();
            }
            spec.device = device_block(eq, rule, &ov);
            spec.optimistic = None;
        }
    }
    if detected.brightness_set_cmd.is_some() {
        spec.brightness_scale = Some(255);
    }

    let mut actions = LightActions {
        on_cmd_id: detected.on_cmd.and_then(|c| c.id),
        off_cmd_id: detected.off_cmd.and_then(|c| c.id),
        state_cmd_id: detected.state_cmd.and_then(|c| c.id),
        brightness_state_cmd_id: detected.brightness_state_cmd.and_then(|c| c.id),
        ..LightActions::default()
    };
    if let Some(brightness) = detected.brightness_set_cmd {
        actions.brightness_cmd_id = brightness.id;
        actions.brightness_min = brightness.configuration.min_value.map(|v| v as i64);
        let max = brightness.configuration.max_value.map(|v| v as i64).unwrap_or(99);
        actions.brightness_max = Some(max);
        actions.default_on_brightness = Some(max);
    }
    for channel in ColorChannel::ALL {
        let set = detected.color_set_cmds.get(&channel);
        let state = detected.color_state_cmds.get(&channel);
        if set.is_none() && state.is_none() {
            continue;
        }
        let mut binding = ChannelBinding::default();
        if let Some(set) = set {
            binding.cmd_id = set.id;
            binding.min = set.configuration.min_value.map(|v| v as i64);
            binding.max = set.configuration.max_value.map(|v| v as i64);
        }
        binding.state_cmd_id = state.and_then(|c| c.id);
        actions.channels.insert(channel, binding);
    }

    Some((spec, actions))
}
