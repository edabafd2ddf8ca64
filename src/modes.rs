//! Operating mode table.
//!
//! ```text
//!  index:  0    1     2    3    4    5   │   6      7
//!         PLA  PETG  TPU  ABS  ASA  PC   │ Custom Cooldown
//!         ───────── material presets ────┘
//! ```
//!
//! The index is what the mode store persists and what the command
//! interface addresses.  "No active mode" (idle) is not in the table.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Lowest and highest target accepted for the custom mode (°C).
pub const TARGET_RANGE_C: core::ops::RangeInclusive<f32> = 0.0..=120.0;

/// Custom target used when the stored value is missing or out of range.
pub const DEFAULT_CUSTOM_TARGET_C: f32 = 35.0;

/// A material preset: label and chamber target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub label: &'static str,
    pub target_c: f32,
}

pub const PRESETS: [Preset; 6] = [
    Preset { label: "PLA", target_c: 30.0 },
    Preset { label: "PETG", target_c: 35.0 },
    Preset { label: "TPU", target_c: 30.0 },
    Preset { label: "ABS", target_c: 45.0 },
    Preset { label: "ASA", target_c: 48.0 },
    Preset { label: "PC", target_c: 55.0 },
];

pub const CUSTOM_INDEX: u8 = PRESETS.len() as u8;
pub const COOLDOWN_INDEX: u8 = CUSTOM_INDEX + 1;
/// Total number of addressable modes.
pub const MODE_COUNT: u8 = COOLDOWN_INDEX + 1;

/// A selectable operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveMode {
    /// Index into [`PRESETS`].
    Preset(u8),
    Custom,
    Cooldown,
}

impl ActiveMode {
    pub fn from_index(index: u8) -> Result<Self, CommandError> {
        match index {
            i if i < CUSTOM_INDEX => Ok(Self::Preset(i)),
            CUSTOM_INDEX => Ok(Self::Custom),
            COOLDOWN_INDEX => Ok(Self::Cooldown),
            other => Err(CommandError::ModeOutOfRange(other)),
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Preset(i) => i,
            Self::Custom => CUSTOM_INDEX,
            Self::Cooldown => COOLDOWN_INDEX,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Preset(i) => PRESETS
                .get(i as usize)
                .map_or("?", |p| p.label),
            Self::Custom => "Custom",
            Self::Cooldown => "Cooldown",
        }
    }

    /// Regulation target for threshold modes.  Cooldown derives its own
    /// target from ambient, so it has none here.
    pub fn target(self, custom_target_c: f32) -> Option<f32> {
        match self {
            Self::Preset(i) => PRESETS.get(i as usize).map(|p| p.target_c),
            Self::Custom => Some(custom_target_c),
            Self::Cooldown => None,
        }
    }
}

/// Validate a custom target (range 0–120 °C, finite).
pub fn validate_target(target_c: f32) -> Result<f32, CommandError> {
    if target_c.is_finite() && TARGET_RANGE_C.contains(&target_c) {
        Ok(target_c)
    } else {
        Err(CommandError::TargetOutOfRange)
    }
}
