use serde::{Deserialize, Serialize};
use serenity::all::ChannelId;
use thiserror::Error;

use tallybot_counting::{ChannelCountingState, Rules};

fn yes() -> bool {
    true
}

/// Counting configuration of one guild, stored under the guild's id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildCountingConfig {
    #[serde(default)]
    pub channels: Vec<ChannelCountingState>,
    #[serde(default = "yes")]
    pub math_enabled: bool,
    #[serde(default = "yes")]
    pub reactions_enabled: bool,
}

impl Default for GuildCountingConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            math_enabled: true,
            reactions_enabled: true,
        }
    }
}

impl GuildCountingConfig {
    #[must_use]
    pub fn channel(&self, channel_id: ChannelId) -> Option<&ChannelCountingState> {
        self.channels.iter().find(|c| c.channel_id == channel_id)
    }

    pub fn channel_mut(&mut self, channel_id: ChannelId) -> Option<&mut ChannelCountingState> {
        self.channels.iter_mut().find(|c| c.channel_id == channel_id)
    }
}

/// Rules shared by every guild in the store, kept under the `global` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRules {
    #[serde(default)]
    pub auto_reset: bool,
    #[serde(default = "yes")]
    pub allow_calculations: bool,
    /// 0 disables the cap.
    #[serde(default)]
    pub max_number: u64,
    #[serde(default = "yes")]
    pub reset_on_error: bool,
}

impl Default for GlobalRules {
    fn default() -> Self {
        Self {
            auto_reset: false,
            allow_calculations: true,
            max_number: 0,
            reset_on_error: true,
        }
    }
}

impl GlobalRules {
    #[must_use]
    pub fn rules(&self, start_number: u64) -> Rules {
        Rules {
            start_number,
            max_number: (self.max_number > 0).then_some(self.max_number),
            auto_reset: self.auto_reset,
            reset_on_error: self.reset_on_error,
        }
    }

    pub fn set(&mut self, rule: GlobalRule) {
        match rule {
            GlobalRule::AutoReset(value) => self.auto_reset = value,
            GlobalRule::AllowCalculations(value) => self.allow_calculations = value,
            GlobalRule::MaxNumber(value) => self.max_number = value,
            GlobalRule::ResetOnError(value) => self.reset_on_error = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalRule {
    AutoReset(bool),
    AllowCalculations(bool),
    MaxNumber(u64),
    ResetOnError(bool),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("unknown rule `{0}`")]
    UnknownRule(String),
    #[error("`{value}` is not a valid value for `{rule}`")]
    InvalidValue { rule: &'static str, value: String },
}

impl GlobalRule {
    pub const NAMES: [&'static str; 4] =
        ["autoReset", "allowCalculations", "maxNumber", "resetOnError"];

    pub fn parse(name: &str, value: &str) -> Result<Self, RuleError> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let rule = match key.as_str() {
            "autoreset" => GlobalRule::AutoReset(parse_bool("autoReset", value)?),
            "allowcalculations" | "math" => {
                GlobalRule::AllowCalculations(parse_bool("allowCalculations", value)?)
            }
            "maxnumber" | "max" => GlobalRule::MaxNumber(value.trim().parse().map_err(|_| {
                RuleError::InvalidValue {
                    rule: "maxNumber",
                    value: value.to_owned(),
                }
            })?),
            "resetonerror" => GlobalRule::ResetOnError(parse_bool("resetOnError", value)?),
            _ => return Err(RuleError::UnknownRule(name.to_owned())),
        };

        Ok(rule)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            GlobalRule::AutoReset(_) => "autoReset",
            GlobalRule::AllowCalculations(_) => "allowCalculations",
            GlobalRule::MaxNumber(_) => "maxNumber",
            GlobalRule::ResetOnError(_) => "resetOnError",
        }
    }
}

fn parse_bool(rule: &'static str, value: &str) -> Result<bool, RuleError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "off" | "no" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(RuleError::InvalidValue {
            rule,
            value: value.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names_are_forgiving() {
        assert_eq!(
            GlobalRule::parse("auto_reset", "on"),
            Ok(GlobalRule::AutoReset(true))
        );
        assert_eq!(
            GlobalRule::parse("maxNumber", " 500 "),
            Ok(GlobalRule::MaxNumber(500))
        );
        assert_eq!(
            GlobalRule::parse("Reset-On-Error", "false"),
            Ok(GlobalRule::ResetOnError(false))
        );
    }

    #[test]
    fn bad_rules() {
        assert_eq!(
            GlobalRule::parse("speed", "1"),
            Err(RuleError::UnknownRule(String::from("speed")))
        );
        assert!(matches!(
            GlobalRule::parse("maxNumber", "-3"),
            Err(RuleError::InvalidValue { rule: "maxNumber", .. })
        ));
        assert!(GlobalRule::parse("autoReset", "maybe").is_err());
    }

    #[test]
    fn zero_max_number_means_no_cap() {
        let mut global = GlobalRules::default();
        assert_eq!(global.rules(1).max_number, None);

        global.set(GlobalRule::MaxNumber(100));
        assert_eq!(global.rules(1).max_number, Some(100));
    }

    #[test]
    fn empty_document_is_default() {
        let config: GuildCountingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GuildCountingConfig::default());

        let global: GlobalRules = serde_json::from_str("{}").unwrap();
        assert_eq!(global, GlobalRules::default());
    }
}
