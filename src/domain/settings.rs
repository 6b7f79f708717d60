//! Inheritable encode settings and the directives that mutate them
//!
//! Every scope (global, output, input) holds its own [`Settings`] value.
//! A child scope starts from [`Settings::derive_child`] and then overrides
//! scalar fields or appends to command lists without touching its parent.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::model::BuildMode;
use crate::error::{ReplayError, ReplayResult};
use crate::utils::time::parse_datetime;

pub const DEFAULT_AUDIO_BITRATE: u32 = 160;

/// Which file's timestamps the finished output inherits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSource {
    /// Leave the output's file times alone
    None,
    /// Copy times from the n-th input of the output
    Input(usize),
    /// Explicit local timestamp
    Fixed(NaiveDateTime),
}

impl Default for TimeSource {
    fn default() -> Self {
        TimeSource::Input(0)
    }
}

impl TimeSource {
    /// `v<n>`, `none`/empty, or `YYYY-MM-DD HH-MM-SS`
    pub fn parse(value: &str) -> ReplayResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(TimeSource::None);
        }
        if let Some(index) = trimmed.strip_prefix('v') {
            return index
                .parse::<usize>()
                .map(TimeSource::Input)
                .map_err(|_| ReplayError::Format {
                    key: "$time".to_string(),
                    value: value.to_string(),
                });
        }
        parse_datetime(trimmed)
            .map(TimeSource::Fixed)
            .ok_or_else(|| ReplayError::Format {
                key: "$time".to_string(),
                value: value.to_string(),
            })
    }
}

/// Output file naming for both build modes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputNaming {
    pub prefix: String,
    pub prefix_raw: String,
    pub ext: String,
    pub ext_raw: String,
}

impl OutputNaming {
    pub fn prefix(&self, mode: BuildMode) -> &str {
        match mode {
            BuildMode::Encoded => &self.prefix,
            BuildMode::Raw => &self.prefix_raw,
        }
    }

    pub fn ext(&self, mode: BuildMode) -> &str {
        match mode {
            BuildMode::Encoded => &self.ext,
            BuildMode::Raw => &self.ext_raw,
        }
    }
}

/// The four ordered command fragment lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandList {
    Plain,
    Raw,
    FirstPass,
    SecondPass,
}

/// Closed set of settings directives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsDirective {
    Append(CommandList),
    Pop(CommandList),
    TargetSize,
    AudioBitrate,
    Prefix(BuildMode),
    Extension(BuildMode),
    TimeSource,
}

impl SettingsDirective {
    pub fn from_key(key: &str) -> Option<Self> {
        let directive = match key {
            "$cmd" => Self::Append(CommandList::Plain),
            "$cmdPop" => Self::Pop(CommandList::Plain),
            "$cmdRaw" => Self::Append(CommandList::Raw),
            "$cmdPopRaw" => Self::Pop(CommandList::Raw),
            "$cmdPass1" => Self::Append(CommandList::FirstPass),
            "$cmdPopPass1" => Self::Pop(CommandList::FirstPass),
            "$cmdPass2" => Self::Append(CommandList::SecondPass),
            "$cmdPopPass2" => Self::Pop(CommandList::SecondPass),
            "$targetSize" => Self::TargetSize,
            "$audioBitrate" => Self::AudioBitrate,
            "$outPrefix" => Self::Prefix(BuildMode::Encoded),
            "$outPrefixRaw" => Self::Prefix(BuildMode::Raw),
            "$outExt" => Self::Extension(BuildMode::Encoded),
            "$outExtRaw" => Self::Extension(BuildMode::Raw),
            "$time" => Self::TimeSource,
            _ => return None,
        };
        Some(directive)
    }
}

/// Encode settings carried by every scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub commands: Vec<String>,
    pub raw_commands: Vec<String>,
    pub first_pass_commands: Vec<String>,
    pub second_pass_commands: Vec<String>,
    /// Target output size in bytes, zero when unset
    pub target_size: u64,
    /// Audio bitrate in kbps
    pub audio_bitrate: u32,
    pub naming: OutputNaming,
    pub time_source: TimeSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            raw_commands: Vec::new(),
            first_pass_commands: Vec::new(),
            second_pass_commands: Vec::new(),
            target_size: 0,
            audio_bitrate: DEFAULT_AUDIO_BITRATE,
            naming: OutputNaming::default(),
            time_source: TimeSource::default(),
        }
    }
}

impl Settings {
    /// Independent copy for a nested scope
    pub fn derive_child(&self) -> Settings {
        self.clone()
    }

    pub fn list(&self, list: CommandList) -> &Vec<String> {
        match list {
            CommandList::Plain => &self.commands,
            CommandList::Raw => &self.raw_commands,
            CommandList::FirstPass => &self.first_pass_commands,
            CommandList::SecondPass => &self.second_pass_commands,
        }
    }

    fn list_mut(&mut self, list: CommandList) -> &mut Vec<String> {
        match list {
            CommandList::Plain => &mut self.commands,
            CommandList::Raw => &mut self.raw_commands,
            CommandList::FirstPass => &mut self.first_pass_commands,
            CommandList::SecondPass => &mut self.second_pass_commands,
        }
    }

    /// Last fragment of the mode's command list
    pub fn active_command(&self, mode: BuildMode) -> Option<&str> {
        let list = match mode {
            BuildMode::Encoded => &self.commands,
            BuildMode::Raw => &self.raw_commands,
        };
        list.last().map(String::as_str)
    }

    /// Apply one directive. Returns `Ok(false)` when `key` is not a settings
    /// directive so the caller can dispatch it elsewhere.
    pub fn apply_directive(&mut self, key: &str, value: &str) -> ReplayResult<bool> {
        let Some(directive) = SettingsDirective::from_key(key) else {
            return Ok(false);
        };

        match directive {
            SettingsDirective::Append(list) => self.list_mut(list).push(value.to_string()),
            SettingsDirective::Pop(list) => {
                if self.list_mut(list).pop().is_none() {
                    return Err(ReplayError::Underflow {
                        directive: key.to_string(),
                    });
                }
            }
            SettingsDirective::TargetSize => self.target_size = parse_number(key, value)?,
            SettingsDirective::AudioBitrate => self.audio_bitrate = parse_number(key, value)?,
            SettingsDirective::Prefix(BuildMode::Encoded) => self.naming.prefix = value.to_string(),
            SettingsDirective::Prefix(BuildMode::Raw) => self.naming.prefix_raw = value.to_string(),
            SettingsDirective::Extension(BuildMode::Encoded) => self.naming.ext = value.to_string(),
            SettingsDirective::Extension(BuildMode::Raw) => self.naming.ext_raw = value.to_string(),
            SettingsDirective::TimeSource => self.time_source = TimeSource::parse(value)?,
        }

        Ok(true)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ReplayResult<T> {
    value.trim().parse().map_err(|_| ReplayError::Format {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_mutation_does_not_reach_parent() {
        let mut parent = Settings::default();
        parent.apply_directive("$cmd", "-c:v libx264").unwrap();

        let mut child = parent.derive_child();
        child.apply_directive("$cmd", "-preset slow").unwrap();
        child.apply_directive("$cmdPop", "").unwrap();
        child.apply_directive("$cmdPop", "").unwrap();
        child.apply_directive("$targetSize", "1000").unwrap();

        assert_eq!(parent.commands, vec!["-c:v libx264".to_string()]);
        assert_eq!(parent.target_size, 0);
        assert!(child.commands.is_empty());
    }

    #[test]
    fn test_pop_on_empty_list_underflows() {
        let mut settings = Settings::default();
        let err = settings.apply_directive("$cmdPopRaw", "").unwrap_err();
        assert!(matches!(err, ReplayError::Underflow { ref directive } if directive == "$cmdPopRaw"));
    }

    #[test]
    fn test_numeric_directives_reject_text() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.apply_directive("$audioBitrate", "loud"),
            Err(ReplayError::Format { .. })
        ));
        settings.apply_directive("$audioBitrate", " 96 ").unwrap();
        assert_eq!(settings.audio_bitrate, 96);
    }

    #[test]
    fn test_unknown_key_is_not_handled() {
        let mut settings = Settings::default();
        assert!(!settings.apply_directive("$moveFolder", "done").unwrap());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_active_command_is_last_fragment() {
        let mut settings = Settings::default();
        settings.apply_directive("$cmd", "-crf 30").unwrap();
        settings.apply_directive("$cmd", "-crf 20").unwrap();
        settings.apply_directive("$cmdRaw", "-c copy").unwrap();
        assert_eq!(settings.active_command(BuildMode::Encoded), Some("-crf 20"));
        assert_eq!(settings.active_command(BuildMode::Raw), Some("-c copy"));
    }

    #[test]
    fn test_naming_and_time_source() {
        let mut settings = Settings::default();
        settings.apply_directive("$outPrefix", "small_").unwrap();
        settings.apply_directive("$outExtRaw", ".mkv").unwrap();
        settings.apply_directive("$time", "v1").unwrap();
        assert_eq!(settings.naming.prefix(BuildMode::Encoded), "small_");
        assert_eq!(settings.naming.ext(BuildMode::Raw), ".mkv");
        assert_eq!(settings.time_source, TimeSource::Input(1));

        settings.apply_directive("$time", "2022-01-02 03-04-05").unwrap();
        assert!(matches!(settings.time_source, TimeSource::Fixed(_)));
        assert!(settings.apply_directive("$time", "yesterday").is_err());
    }
}
