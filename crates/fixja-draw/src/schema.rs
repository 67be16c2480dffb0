// Declarative division structures: teams, reusable draw formats, and the
// stages and pools that use them. Usually read from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DrawError;
use crate::format::DrawFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFixture {
    pub title: String,
    /// Key into `DivisionStructure::draw_formats`.
    pub draw_format_ref: Option<String>,
    /// 0-based indices into `DivisionStructure::teams`. Absent for pools
    /// filled from an earlier stage.
    pub teams: Option<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFixture {
    pub title: String,
    /// Used only by stages without pools, e.g. a straight knockout.
    pub draw_format_ref: Option<String>,
    pub pools: Option<Vec<PoolFixture>>,
}

impl StageFixture {
    pub fn pools(&self) -> &[PoolFixture] {
        self.pools.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionStructure {
    pub title: String,
    pub teams: Vec<String>,
    pub draw_formats: BTreeMap<String, String>,
    /// In playing order.
    pub stages: Vec<StageFixture>,
}

impl DivisionStructure {
    pub fn from_json(text: &str) -> Result<Self, DrawError> {
        let structure: DivisionStructure =
            serde_json::from_str(text).map_err(|e| DrawError::InvalidStructure(e.to_string()))?;
        structure.validate()?;
        Ok(structure)
    }

    pub fn validate(&self) -> Result<(), DrawError> {
        if self.teams.len() < 2 {
            return Err(DrawError::InvalidStructure(format!(
                "division {:?} needs at least 2 teams, found {}",
                self.title,
                self.teams.len()
            )));
        }
        if self.stages.is_empty() {
            return Err(DrawError::InvalidStructure(format!(
                "division {:?} has no stages",
                self.title
            )));
        }
        for text in self.draw_formats.values() {
            DrawFormat::validate(text)?;
        }
        Ok(())
    }

    pub fn draw_format(&self, reference: Option<&str>) -> Option<&str> {
        reference
            .and_then(|r| self.draw_formats.get(r))
            .map(String::as_str)
    }
}
