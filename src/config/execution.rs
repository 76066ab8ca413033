use super::traits::{check_range, ConfigManifest, ConfigSection, FieldManifest};
use crate::error::StratError;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock budget for one `advance` call
    pub frame_budget_ms: u64,
    pub max_commands_per_frame: usize,
    /// Frames an accepted build order may stay invisible before it no longer counts as pending
    pub construction_grace_frames: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: 5,
            max_commands_per_frame: 8,
            construction_grace_frames: 480,
        }
    }
}

impl ConfigSection for ExecutionConfig {
    fn section_name() -> &'static str {
        "execution"
    }

    fn validate(&self) -> Result<(), StratError> {
        let section = Self::section_name();
        check_range(section, "frame_budget_ms", self.frame_budget_ms, 1, 1000)?;
        check_range(section, "max_commands_per_frame", self.max_commands_per_frame, 1, 1024)?;
        check_range(
            section,
            "construction_grace_frames",
            self.construction_grace_frames,
            1,
            100_000,
        )?;
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let defaults = Self::default();
        ConfigManifest {
            section: "Execution".to_string(),
            fields: vec![
                FieldManifest::new(
                    "frame_budget_ms",
                    "integer",
                    json!(defaults.frame_budget_ms),
                    Some(1.0),
                    Some(1000.0),
                    "Per-frame time budget; unfinished directive evaluation moves to the next frame",
                ),
                FieldManifest::new(
                    "max_commands_per_frame",
                    "integer",
                    json!(defaults.max_commands_per_frame),
                    Some(1.0),
                    Some(1024.0),
                    "Commands emitted per frame at most",
                ),
                FieldManifest::new(
                    "construction_grace_frames",
                    "integer",
                    json!(defaults.construction_grace_frames),
                    Some(1.0),
                    Some(100_000.0),
                    "How long an accepted build order counts as pending before it shows up",
                ),
            ],
        }
    }
}
