//! Strategy catalog: which preprocessing recipes, scales and layout modes
//! are tried, and in which order.
//!
//! A *pass* is one `(recipe, scale, mode)` triple. Passes are enumerated
//! recipe-major, then scale, then mode, so the cheap "original" recipe at
//! native resolution is always tried first. The preprocessing for a
//! `(recipe, scale)` group is shared by all modes of that group.

use super::preprocess::{MorphOp, Transform};
use crate::adapter::LayoutMode;
use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named, ordered list of transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Transform>,
}

impl Recipe {
    pub fn new(name: impl Into<String>, steps: Vec<Transform>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// One `(recipe, scale)` group; every mode of the catalog runs on its output.
#[derive(Debug, Clone, Copy)]
pub struct PassGroup<'a> {
    /// Position in priority order, starting at 0.
    pub index: usize,
    pub recipe: &'a Recipe,
    pub scale: f32,
}

impl PassGroup<'_> {
    /// `recipe@scale` label used in logs, errors and `preprocessing_used`.
    pub fn label(&self) -> String {
        format!("{}@{}x", self.recipe.name, self.scale)
    }
}

/// Recipes × scales × modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCatalog {
    pub recipes: Vec<Recipe>,
    #[serde(default = "default_scales")]
    pub scales: Vec<f32>,
    #[serde(default = "default_modes")]
    pub modes: Vec<LayoutMode>,
}

fn default_scales() -> Vec<f32> {
    vec![1.0, 1.5, 2.0, 2.5, 3.0]
}

fn default_modes() -> Vec<LayoutMode> {
    LayoutMode::DEFAULT_ORDER.to_vec()
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        use Transform::*;
        let recipes = vec![
            Recipe::new("original", vec![]),
            Recipe::new(
                "grayscale_contrast",
                vec![Grayscale, Contrast { factor: 1.5 }, Brightness { factor: 1.1 }],
            ),
            Recipe::new(
                "adaptive_threshold",
                vec![PolarityFix, Grayscale, AdaptiveThreshold],
            ),
            Recipe::new(
                "denoise_threshold",
                vec![
                    Grayscale,
                    Bilateral {
                        radius: 2,
                        sigma_spatial: 2.0,
                        sigma_range: 30.0,
                    },
                    AdaptiveThreshold,
                    Morphology {
                        morph: MorphOp::Close,
                    },
                ],
            ),
            Recipe::new(
                "clahe_sharpen",
                vec![
                    Grayscale,
                    Clahe {
                        tile_size: 32,
                        clip_limit: 2.0,
                    },
                    Sharpen {
                        sigma: 1.0,
                        threshold: 2,
                    },
                ],
            ),
            Recipe::new(
                "morphological_cleanup",
                vec![
                    Grayscale,
                    AdaptiveThreshold,
                    Morphology {
                        morph: MorphOp::Open,
                    },
                    Morphology {
                        morph: MorphOp::Close,
                    },
                ],
            ),
            Recipe::new(
                "deskew_ccw",
                vec![Grayscale, Deskew { degrees: -2.0 }, AdaptiveThreshold],
            ),
            Recipe::new(
                "deskew_cw",
                vec![Grayscale, Deskew { degrees: 2.0 }, AdaptiveThreshold],
            ),
        ];
        Self {
            recipes,
            scales: default_scales(),
            modes: default_modes(),
        }
    }
}

impl StrategyCatalog {
    /// Parse a catalog from JSON. Missing `scales` / `modes` take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, OcrError> {
        let catalog: Self = serde_json::from_str(json)
            .map_err(|e| OcrError::InvalidConfig(format!("strategy catalog: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self, OcrError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            OcrError::InvalidConfig(format!("strategy catalog '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Reject catalogs that would enumerate nothing or carry unusable scales.
    pub fn validate(&self) -> Result<(), OcrError> {
        if self.recipes.is_empty() {
            return Err(OcrError::InvalidConfig("catalog has no recipes".into()));
        }
        if self.scales.is_empty() {
            return Err(OcrError::InvalidConfig("catalog has no scales".into()));
        }
        if self.modes.is_empty() {
            return Err(OcrError::InvalidConfig("catalog has no layout modes".into()));
        }
        if let Some(bad) = self.scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(OcrError::InvalidConfig(format!(
                "catalog scale must be positive, got {bad}"
            )));
        }
        if let Some(r) = self.recipes.iter().find(|r| r.name.trim().is_empty()) {
            return Err(OcrError::InvalidConfig(format!(
                "catalog recipe with {} steps has no name",
                r.steps.len()
            )));
        }
        Ok(())
    }

    /// `(recipe, scale)` groups in priority order.
    pub fn groups(&self) -> impl Iterator<Item = PassGroup<'_>> {
        self.recipes
            .iter()
            .flat_map(move |recipe| self.scales.iter().map(move |&scale| (recipe, scale)))
            .enumerate()
            .map(|(index, (recipe, scale))| PassGroup {
                index,
                recipe,
                scale,
            })
    }

    pub fn group_count(&self) -> usize {
        self.recipes.len() * self.scales.len()
    }

    /// Total number of recognition calls if nothing exits early.
    pub fn pass_count(&self) -> usize {
        self.group_count() * self.modes.len()
    }
}
