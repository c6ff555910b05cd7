// Fatal errors and recoverable diagnostics.
//
// Building a navigation mesh is a batch transform with two failure tiers:
// - `NavError`: configuration or provider inconsistencies that make the
//   whole run meaningless. Returned as `Err` and propagated with `?`.
// - `Diagnostic`: data-quality problems local to one spawn point or one
//   teleporter. The offending input is skipped, the run continues, and the
//   diagnostic is logged at `warn` and handed back with the build result.
//
// Per-direction flood-fill rejections are neither; they are ordinary control
// flow counted in `GridStats` (see `grid.rs`). A failed path search is
// `None` (see `pathfinding.rs`).

use crate::types::EdgeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A condition that aborts the build.
#[derive(Debug, Error)]
pub enum NavError {
    /// Point location, an edge side or a stack section named a sector the
    /// level does not have.
    #[error("sector {sector} is out of range (level has {sector_count} sectors)")]
    SectorOutOfRange { sector: u32, sector_count: usize },

    /// A tuning value is missing its meaning (negative radius, bad
    /// resolution, inconsistent area sizes...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Level data that cannot describe a level (degenerate outline, edge
    /// with no sides).
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    /// A dataset name was not present in a multi-dataset config file.
    #[error("unknown configuration dataset '{0}'")]
    UnknownDataset(String),

    /// Malformed or incomplete JSON (config, level or mesh).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for navigation operations.
pub type NavResult<T> = std::result::Result<T, NavError>;

/// A recoverable data-quality problem found while building.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A start spot has no room for the player; it does not seed the grid.
    SpawnBlocked { x: f64, y: f64, z: f64 },
    /// A teleport destination has no room for the player.
    TeleportDestinationBlocked { edge: EdgeId, x: f64, y: f64, z: f64 },
    /// A teleporter's destination thing or line does not exist.
    DanglingTeleport { edge: EdgeId },
    /// A teleport destination does not land inside any navigation area.
    TeleportWithoutArea { edge: EdgeId, x: f64, y: f64 },
    /// The flood fill reached outside the level bounds (a map leak).
    GridLeak { x: i32, y: i32 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SpawnBlocked { x, y, z } => {
                write!(f, "start spot at ({x}, {y}, {z}) has no room to spawn, ignoring")
            }
            Diagnostic::TeleportDestinationBlocked { edge, x, y, z } => write!(
                f,
                "teleporter {edge} destination at ({x}, {y}, {z}) has no room to spawn, ignoring"
            ),
            Diagnostic::DanglingTeleport { edge } => {
                write!(f, "teleporter {edge} has no valid destination")
            }
            Diagnostic::TeleportWithoutArea { edge, x, y } => write!(
                f,
                "teleporter {edge} points to ({x}, {y}), which has no navigation area"
            ),
            Diagnostic::GridLeak { x, y } => {
                write!(f, "grid leak at lattice cell ({x}, {y})")
            }
        }
    }
}

/// Ordered sink for diagnostics. Every push is also logged.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = NavError::SectorOutOfRange {
            sector: 12,
            sector_count: 4,
        };
        assert_eq!(
            format!("{err}"),
            "sector 12 is out of range (level has 4 sectors)"
        );

        let err = NavError::InvalidConfig("player_radius must be > 0".into());
        assert!(format!("{err}").contains("player_radius"));
    }

    #[test]
    fn json_errors_convert() {
        let parse: Result<u32, serde_json::Error> = serde_json::from_str("nope");
        let err: NavError = parse.unwrap_err().into();
        assert!(matches!(err, NavError::Json(_)));
    }

    #[test]
    fn diagnostics_keep_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::GridLeak { x: 1, y: 2 });
        diagnostics.push(Diagnostic::DanglingTeleport { edge: EdgeId(7) });
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.entries()[0], Diagnostic::GridLeak { x: 1, y: 2 });
        assert!(format!("{}", diagnostics.entries()[1]).contains("teleporter 7"));
    }
}
