// Data-driven navigation configuration.
//
// Every tunable of the pipeline lives in `NavConfig`, loaded from JSON or
// built from a named preset (`NavConfig::doom()`, `NavConfig::zdoom()`).
// The builders never use magic numbers for player dimensions, movement
// tolerances, area sizes or hazard costs; they read them from here.
//
// A config file may hold a single config object or several named datasets
// (`{"doom": {...}, "hexen": {...}}`), selected with `from_dataset_json`.
// Every load path runs `validate()`, so a `NavConfig` obtained through this
// module is always usable. The four player-movement values are required;
// everything else has a default.
//
// Thing dimensions (radius/height/hanging) are keyed by thing type number.
// A "bridge" custom type carries its own radius and height in `args[0]`
// and `args[1]` instead.
//
// See also: `probe.rs` which reads the player and thing dimensions,
// `grid.rs` for the lattice derived from `element_size()`, `area.rs` for the
// area size ceilings, `pathfinding.rs` for `hazard_multipliers`.
//
// **Critical constraint: determinism.** Thing dimensions are a `BTreeMap`,
// so a config serializes the same way every time.

use crate::error::{NavError, NavResult};
use crate::types::ElementFlags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Smallest allowed value for either area size ceiling, in map units.
pub const MIN_AREA_SIZE: u32 = 32;

/// Footprint and height of a thing type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThingDef {
    pub radius: f64,
    pub height: f64,
    /// Hanging things hang from the ceiling: their band is
    /// `[ceiling - height, ceiling]` instead of `[floor, floor + height]`.
    #[serde(default)]
    pub hanging: bool,
}

impl ThingDef {
    pub const fn new(radius: f64, height: f64) -> Self {
        Self {
            radius,
            height,
            hanging: false,
        }
    }

    pub const fn hanging(radius: f64, height: f64) -> Self {
        Self {
            radius,
            height,
            hanging: true,
        }
    }
}

/// Navigation build configuration. Loaded once, never mutated by the
/// pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavConfig {
    /// Player capsule radius in map units.
    pub player_radius: f64,

    /// Player capsule height in map units.
    pub player_height: f64,

    /// Largest floor rise the player can walk up.
    pub step_height: f64,

    /// Largest floor rise the player can jump up. 0 disables jumping.
    pub jump_height: f64,

    /// Minimum z component of a floor plane normal that is still climbable.
    /// Steeper slopes can be descended but not ascended.
    #[serde(default = "default_slope_steep")]
    pub slope_steep: f64,

    /// Lattice cells per player radius (1, 2 or 4).
    #[serde(default = "default_resolution")]
    pub resolution: u32,

    /// Side length ceiling of a packed square area, in map units.
    #[serde(default = "default_max_area_size")]
    pub max_area_size: u32,

    /// Width/height ceiling of a merged area, in map units.
    #[serde(default = "default_max_area_size_merged")]
    pub max_area_size_merged: u32,

    /// Thing types whose positions seed the flood fill.
    #[serde(default)]
    pub start_thing_types: Vec<u16>,

    /// Collision dimensions per thing type. Things of unlisted types do not
    /// obstruct.
    #[serde(default)]
    pub thing_dimensions: BTreeMap<u16, ThingDef>,

    /// Thing type whose radius and height come from its `args[0]` and
    /// `args[1]`.
    #[serde(default)]
    pub bridge_custom_type: Option<u16>,

    /// Sector damage up to this value is a low hazard.
    #[serde(default = "default_damage_low_max")]
    pub damage_low_max: i32,

    /// Sector damage up to this value is a medium hazard; above is high.
    #[serde(default = "default_damage_medium_max")]
    pub damage_medium_max: i32,

    /// Path cost multipliers for low, medium and high hazard areas.
    #[serde(default = "default_hazard_multipliers")]
    pub hazard_multipliers: [f64; 3],
}

fn default_slope_steep() -> f64 {
    0.7
}

fn default_resolution() -> u32 {
    1
}

fn default_max_area_size() -> u32 {
    256
}

fn default_max_area_size_merged() -> u32 {
    512
}

fn default_damage_low_max() -> i32 {
    5
}

fn default_damage_medium_max() -> i32 {
    10
}

fn default_hazard_multipliers() -> [f64; 3] {
    [2.0, 4.0, 8.0]
}

impl NavConfig {
    /// Vanilla Doom movement: no jumping, no slopes.
    pub fn doom() -> Self {
        let mut thing_dimensions = BTreeMap::new();
        // Barrel, columns, lamps, trees and the like.
        for (kind, def) in [
            (2035, ThingDef::new(10.0, 42.0)),
            (2028, ThingDef::new(16.0, 16.0)),
            (30, ThingDef::new(16.0, 16.0)),
            (31, ThingDef::new(16.0, 16.0)),
            (32, ThingDef::new(16.0, 16.0)),
            (33, ThingDef::new(16.0, 16.0)),
            (35, ThingDef::new(16.0, 16.0)),
            (43, ThingDef::new(16.0, 16.0)),
            (44, ThingDef::new(16.0, 16.0)),
            (48, ThingDef::new(16.0, 16.0)),
            (54, ThingDef::new(32.0, 16.0)),
            (85, ThingDef::new(16.0, 16.0)),
            (86, ThingDef::new(16.0, 16.0)),
            (49, ThingDef::hanging(16.0, 68.0)),
            (50, ThingDef::hanging(16.0, 84.0)),
            (63, ThingDef::hanging(16.0, 68.0)),
        ] {
            thing_dimensions.insert(kind, def);
        }

        Self {
            player_radius: 16.0,
            player_height: 56.0,
            step_height: 24.0,
            jump_height: 0.0,
            slope_steep: default_slope_steep(),
            resolution: default_resolution(),
            max_area_size: default_max_area_size(),
            max_area_size_merged: default_max_area_size_merged(),
            start_thing_types: vec![1, 2, 3, 4, 11],
            thing_dimensions,
            bridge_custom_type: None,
            damage_low_max: default_damage_low_max(),
            damage_medium_max: default_damage_medium_max(),
            hazard_multipliers: default_hazard_multipliers(),
        }
    }

    /// ZDoom-family ports: jumping, sloped floors and custom bridges.
    pub fn zdoom() -> Self {
        Self {
            jump_height: 32.0,
            slope_steep: 0.7,
            bridge_custom_type: Some(9991),
            ..Self::doom()
        }
    }

    /// Look up a preset by dataset name.
    pub fn preset(name: &str) -> NavResult<Self> {
        match name {
            "doom" => Ok(Self::doom()),
            "zdoom" => Ok(Self::zdoom()),
            other => Err(NavError::UnknownDataset(other.to_string())),
        }
    }

    /// Parse and validate a single config object.
    pub fn from_json(json: &str) -> NavResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a file of named datasets and return the validated `dataset`.
    pub fn from_dataset_json(json: &str, dataset: &str) -> NavResult<Self> {
        let mut datasets: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let value = datasets
            .remove(dataset)
            .ok_or_else(|| NavError::UnknownDataset(dataset.to_string()))?;
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values the builders cannot work with.
    pub fn validate(&self) -> NavResult<()> {
        let invalid = |msg: String| Err(NavError::InvalidConfig(msg));

        if !(self.player_radius > 0.0) {
            return invalid(format!("player_radius must be > 0, got {}", self.player_radius));
        }
        if !(self.player_height > 0.0) {
            return invalid(format!("player_height must be > 0, got {}", self.player_height));
        }
        if !(self.step_height >= 0.0) {
            return invalid(format!("step_height must be >= 0, got {}", self.step_height));
        }
        if !(self.jump_height >= 0.0) {
            return invalid(format!("jump_height must be >= 0, got {}", self.jump_height));
        }
        if !matches!(self.resolution, 1 | 2 | 4) {
            return invalid(format!("resolution must be 1, 2 or 4, got {}", self.resolution));
        }
        if self.max_area_size < MIN_AREA_SIZE {
            return invalid(format!(
                "max_area_size must be >= {MIN_AREA_SIZE}, got {}",
                self.max_area_size
            ));
        }
        if self.max_area_size_merged < self.max_area_size {
            return invalid(format!(
                "max_area_size_merged ({}) must be >= max_area_size ({})",
                self.max_area_size_merged, self.max_area_size
            ));
        }
        if self.damage_medium_max < self.damage_low_max {
            return invalid(format!(
                "damage_medium_max ({}) must be >= damage_low_max ({})",
                self.damage_medium_max, self.damage_low_max
            ));
        }
        if self.hazard_multipliers.iter().any(|m| !(*m >= 1.0)) {
            return invalid(format!(
                "hazard_multipliers must all be >= 1, got {:?}",
                self.hazard_multipliers
            ));
        }
        for (kind, def) in &self.thing_dimensions {
            if !(def.radius >= 0.0 && def.height >= 0.0) {
                return invalid(format!("thing type {kind} has negative dimensions"));
            }
        }
        Ok(())
    }

    /// Lattice cell size in map units.
    pub fn element_size(&self) -> f64 {
        self.player_radius / f64::from(self.resolution)
    }

    /// Hazard flags for a sector damage amount.
    pub fn damage_flags(&self, damage: i32) -> ElementFlags {
        if damage <= 0 {
            ElementFlags::empty()
        } else if damage <= self.damage_low_max {
            ElementFlags::DAMAGE_LOW
        } else if damage <= self.damage_medium_max {
            ElementFlags::DAMAGE_MEDIUM
        } else {
            ElementFlags::DAMAGE_HIGH
        }
    }

    /// Path cost multiplier for an area's flags. The worst hazard wins.
    pub fn hazard_multiplier(&self, flags: ElementFlags) -> f64 {
        let [low, medium, high] = self.hazard_multipliers;
        if flags.contains(ElementFlags::DAMAGE_HIGH) {
            high
        } else if flags.contains(ElementFlags::DAMAGE_MEDIUM) {
            medium
        } else if flags.contains(ElementFlags::DAMAGE_LOW) {
            low
        } else {
            1.0
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self::doom()
    }
}
