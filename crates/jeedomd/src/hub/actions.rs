//! Drives device commands from typed action bindings.
//!
//! The runner never talks to Jeedom directly. It goes through
//! [`CommandSink`] so tests can record dispatches and the binary can plug
//! in the HTTP API client.

use async_trait::async_trait;
use thiserror::Error;

use crate::discovery::spec::{
    AlarmActions, ClimateActions, CmdBinding, ColorChannel, CoverActions, LightActions,
    NumberActions, PilotClimateActions, SelectActions, SetpointKind, SwitchActions,
    WaterHeaterActions,
};
use crate::discovery::value::Range;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("device has no command bound for {operation}")]
    Unbound { operation: &'static str },
    #[error("unknown select option {option}")]
    UnknownOption { option: String },
    #[error("command dispatch failed: {0}")]
    Dispatch(#[from] anyhow::Error),
}

/// Anything that can execute a Jeedom command by id.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn exec_cmd(&self, cmd_id: i64, value: Option<&str>) -> anyhow::Result<()>;
}

pub struct ActionRunner<S> {
    sink: S,
}

impl<S: CommandSink> ActionRunner<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    async fn exec(&self, cmd_id: i64, value: Option<&str>) -> Result<(), ActionError> {
        self.sink.exec_cmd(cmd_id, value).await?;
        Ok(())
    }

    async fn exec_binding(
        &self,
        binding: Option<&CmdBinding>,
        operation: &'static str,
    ) -> Result<(), ActionError> {
        let binding = binding.ok_or(ActionError::Unbound { operation })?;
        self.exec(binding.cmd_id, binding.value.as_deref()).await
    }

    pub async fn switch_on(&self, actions: &SwitchActions) -> Result<(), ActionError> {
        self.exec(actions.on_cmd_id, None).await
    }

    pub async fn switch_off(&self, actions: &SwitchActions) -> Result<(), ActionError> {
        self.exec(actions.off_cmd_id, None).await
    }

    /// Turn a light on, falling back to full brightness when the device
    /// only exposes a dimmer.
    pub async fn light_on(&self, actions: &LightActions) -> Result<(), ActionError> {
        if let Some(on) = actions.on_cmd_id {
            return self.exec(on, None).await;
        }
        if let Some(dimmer) = actions.brightness_cmd_id {
            let level = actions
                .default_on_brightness
                .or(actions.brightness_max)
                .unwrap_or(99);
            return self.exec(dimmer, Some(&level.to_string())).await;
        }
        Err(ActionError::Unbound { operation: "light on" })
    }

    pub async fn light_off(&self, actions: &LightActions) -> Result<(), ActionError> {
        if let Some(off) = actions.off_cmd_id {
            return self.exec(off, None).await;
        }
        if let Some(dimmer) = actions.brightness_cmd_id {
            return self.exec(dimmer, Some("0")).await;
        }
        Err(ActionError::Unbound { operation: "light off" })
    }

    pub async fn light_brightness(
        &self,
        actions: &LightActions,
        percent: u8,
    ) -> Result<(), ActionError> {
        let dimmer = actions.brightness_cmd_id.ok_or(ActionError::Unbound {
            operation: "light brightness",
        })?;
        let range = Range::new(
            actions.brightness_min.map(|v| v as f64),
            actions.brightness_max.map(|v| v as f64),
        );
        self.exec(dimmer, Some(&fmt_number(range.from_percent(percent))))
            .await
    }

    pub async fn light_channel(
        &self,
        actions: &LightActions,
        channel: ColorChannel,
        percent: u8,
    ) -> Result<(), ActionError> {
        let binding = actions
            .channels
            .get(&channel)
            .and_then(|b| b.cmd_id.map(|id| (id, b)))
            .ok_or(ActionError::Unbound {
                operation: "light color channel",
            })?;
        let (cmd_id, b) = binding;
        let range = Range::new(b.min.map(|v| v as f64), b.max.map(|v| v as f64));
        self.exec(cmd_id, Some(&fmt_number(range.from_percent(percent))))
            .await
    }

    pub async fn cover_open(&self, actions: &CoverActions) -> Result<(), ActionError> {
        self.exec(actions.open_cmd_id, actions.open_cmd_value.as_deref())
            .await
    }

    pub async fn cover_close(&self, actions: &CoverActions) -> Result<(), ActionError> {
        self.exec(actions.close_cmd_id, actions.close_cmd_value.as_deref())
            .await
    }

    pub async fn cover_stop(&self, actions: &CoverActions) -> Result<(), ActionError> {
        let stop = actions.stop_cmd_id.ok_or(ActionError::Unbound {
            operation: "cover stop",
        })?;
        self.exec(stop, actions.stop_cmd_value.as_deref()).await
    }

    pub async fn cover_set_position(
        &self,
        actions: &CoverActions,
        percent: u8,
    ) -> Result<(), ActionError> {
        let set = actions.set_position_cmd_id.ok_or(ActionError::Unbound {
            operation: "cover set position",
        })?;
        let range = Range::new(
            actions.set_position_min.map(|v| v as f64),
            actions.set_position_max.map(|v| v as f64),
        );
        self.exec(set, Some(&fmt_number(range.from_percent(percent))))
            .await
    }

    pub async fn number_set(&self, actions: &NumberActions, value: f64) -> Result<(), ActionError> {
        self.exec(actions.set_cmd_id, Some(&fmt_number(value))).await
    }

    pub async fn select_option(
        &self,
        actions: &SelectActions,
        label: &str,
    ) -> Result<(), ActionError> {
        let option = actions
            .options
            .iter()
            .find(|o| o.label == label)
            .ok_or_else(|| ActionError::UnknownOption {
                option: label.to_string(),
            })?;
        self.exec(option.cmd_id, option.value.as_deref()).await
    }

    pub async fn pilot_set_mode(
        &self,
        actions: &PilotClimateActions,
        mode: &str,
    ) -> Result<(), ActionError> {
        let binding = match mode {
            "heat" => actions.mode.heat.as_ref(),
            _ => actions.mode.off.as_ref(),
        };
        self.exec_binding(binding, "pilot wire mode").await
    }

    pub async fn pilot_set_preset(
        &self,
        actions: &PilotClimateActions,
        preset: &str,
    ) -> Result<(), ActionError> {
        let binding = match preset {
            "comfort" => actions.preset.comfort.as_ref(),
            "comfort-1" => actions.preset.comfort_1.as_ref(),
            "comfort-2" => actions.preset.comfort_2.as_ref(),
            "eco" => actions.preset.eco.as_ref(),
            "away" => actions.preset.away.as_ref(),
            _ => actions.preset.none.as_ref(),
        };
        self.exec_binding(binding, "pilot wire preset").await
    }

    /// Write a thermostat setpoint, preferring the kinded command when the
    /// caller names one.
    pub async fn climate_set_temperature(
        &self,
        actions: &ClimateActions,
        temperature: f64,
        kind: Option<SetpointKind>,
    ) -> Result<(), ActionError> {
        let cmd_id = kind
            .and_then(|k| actions.set_temperature_by_kind.get(&k).copied())
            .unwrap_or(actions.set_temperature_cmd_id);
        self.exec(cmd_id, Some(&fmt_number(temperature))).await
    }

    pub async fn alarm_arm_home(&self, actions: &AlarmActions) -> Result<(), ActionError> {
        self.exec_alarm(actions.arm_home_cmd_id, "alarm arm home").await
    }

    pub async fn alarm_arm_away(&self, actions: &AlarmActions) -> Result<(), ActionError> {
        self.exec_alarm(actions.arm_away_cmd_id, "alarm arm away").await
    }

    pub async fn alarm_arm_night(&self, actions: &AlarmActions) -> Result<(), ActionError> {
        self.exec_alarm(actions.arm_night_cmd_id, "alarm arm night")
            .await
    }

    pub async fn alarm_disarm(&self, actions: &AlarmActions) -> Result<(), ActionError> {
        self.exec_alarm(actions.disarm_cmd_id, "alarm disarm").await
    }

    async fn exec_alarm(
        &self,
        cmd_id: Option<i64>,
        operation: &'static str,
    ) -> Result<(), ActionError> {
        let cmd_id = cmd_id.ok_or(ActionError::Unbound { operation })?;
        self.exec(cmd_id, None).await
    }

    pub async fn water_heater_set_mode(
        &self,
        actions: &WaterHeaterActions,
        mode: &str,
    ) -> Result<(), ActionError> {
        if mode == "off" {
            self.exec(actions.off_cmd_id, None).await
        } else {
            self.exec(actions.on_cmd_id, None).await
        }
    }
}

/// Render a device value without a trailing `.0` on whole numbers.
fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
