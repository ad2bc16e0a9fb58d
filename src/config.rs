//! # Configuration
//!
//! Engine settings read from YAML. Every key is optional; missing keys keep
//! their defaults.
//!
//! ```yaml
//! tempo: 100
//! retrigger: restart       # restart | ignore | split
//! order: onset             # onset | release
//! hold-timeout: 30         # seconds, 0 disables
//! chord-window: 0.04       # seconds, 0 disables
//! tick-interval-ms: 100
//! layout:
//!   min-stave-width: 250
//!   note-padding: 60
//!   system-height: 150
//!   start-x: 10
//!   start-y: 20
//!   line-width: 800
//!   batch-size: 4
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::duration::Tempo;
use crate::error::ScribeError;
use crate::layout::LayoutOptions;
use crate::packer::{NoteOrder, SequenceOptions};
use crate::scheduler::DEFAULT_TICK_INTERVAL;
use crate::tracker::RetriggerPolicy;

/// Default hold timeout in seconds
pub const DEFAULT_HOLD_TIMEOUT: f64 = 30.0;

/// Validated engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriberConfig {
    pub tempo: Tempo,
    pub retrigger: RetriggerPolicy,
    pub sequence: SequenceOptions,
    /// Held pitches older than this are committed; `None` keeps them forever
    pub hold_timeout: Option<f64>,
    pub tick_interval: Duration,
    pub layout: LayoutOptions,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            retrigger: RetriggerPolicy::default(),
            sequence: SequenceOptions::default(),
            hold_timeout: Some(DEFAULT_HOLD_TIMEOUT),
            tick_interval: DEFAULT_TICK_INTERVAL,
            layout: LayoutOptions::default(),
        }
    }
}

/// Raw configuration for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawConfig {
    pub tempo: Option<f64>,
    pub retrigger: Option<RetriggerPolicy>,
    pub order: Option<NoteOrder>,
    pub hold_timeout: Option<f64>,
    pub chord_window: Option<f64>,
    pub tick_interval_ms: Option<u64>,
    pub layout: Option<RawLayout>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawLayout {
    pub min_stave_width: Option<f64>,
    pub note_padding: Option<f64>,
    pub system_height: Option<f64>,
    pub start_x: Option<f64>,
    pub start_y: Option<f64>,
    pub line_width: Option<f64>,
    pub batch_size: Option<usize>,
}

impl TranscriberConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self, ScribeError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ScribeError::ConfigError(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ScribeError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScribeError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, ScribeError> {
        let mut config = Self::default();

        if let Some(bpm) = raw.tempo {
            config.tempo = Tempo::new(bpm)
                .map_err(|_| ScribeError::ConfigError(format!("tempo must be positive, got {}", bpm)))?;
        }
        if let Some(retrigger) = raw.retrigger {
            config.retrigger = retrigger;
        }
        if let Some(order) = raw.order {
            config.sequence.order = order;
        }
        if let Some(window) = raw.chord_window {
            config.sequence.chord_window = non_negative("chord-window", window)?;
        }
        if let Some(timeout) = raw.hold_timeout {
            let timeout = non_negative("hold-timeout", timeout)?;
            config.hold_timeout = if timeout == 0.0 { None } else { Some(timeout) };
        }
        if let Some(ms) = raw.tick_interval_ms {
            if ms == 0 {
                return Err(ScribeError::ConfigError(
                    "tick-interval-ms must be at least 1".to_string(),
                ));
            }
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(layout) = raw.layout {
            apply_layout(&mut config.layout, layout)?;
        }

        Ok(config)
    }
}

fn apply_layout(options: &mut LayoutOptions, raw: RawLayout) -> Result<(), ScribeError> {
    if let Some(v) = raw.min_stave_width {
        options.min_stave_width = positive("min-stave-width", v)?;
    }
    if let Some(v) = raw.note_padding {
        options.note_padding = non_negative("note-padding", v)?;
    }
    if let Some(v) = raw.system_height {
        options.system_height = positive("system-height", v)?;
    }
    if let Some(v) = raw.start_x {
        options.start_x = non_negative("start-x", v)?;
    }
    if let Some(v) = raw.start_y {
        options.start_y = non_negative("start-y", v)?;
    }
    if let Some(v) = raw.line_width {
        options.line_width = positive("line-width", v)?;
    }
    if let Some(v) = raw.batch_size {
        if v == 0 {
            return Err(ScribeError::ConfigError(
                "batch-size must be at least 1".to_string(),
            ));
        }
        options.batch_size = v;
    }
    Ok(())
}

fn positive(key: &str, value: f64) -> Result<f64, ScribeError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ScribeError::ConfigError(format!(
            "{} must be positive, got {}",
            key, value
        )))
    }
}

fn non_negative(key: &str, value: f64) -> Result<f64, ScribeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ScribeError::ConfigError(format!(
            "{} must not be negative, got {}",
            key, value
        )))
    }
}
