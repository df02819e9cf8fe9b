use crate::error::{GmsError, GmsResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the grid-based consistency filter
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GmsConfig {
    /// Left/query grid resolution; the right grid is derived from it per
    /// scale hypothesis
    pub grid_width: usize,
    pub grid_height: usize,
    /// Support factor for the neighborhood acceptance threshold
    pub alpha: f64,
    /// Search all 8 rotation hypotheses instead of the identity only
    pub rotation_search: bool,
    /// Search all 5 right-grid scale ratios instead of 1:1 only
    pub scale_search: bool,
}

impl Default for GmsConfig {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 20,
            alpha: 6.0,
            rotation_search: true,
            scale_search: true,
        }
    }
}

impl GmsConfig {
    /// New configuration with the given left-grid resolution and the default
    /// support factor and search settings
    pub fn new(grid_width: usize, grid_height: usize) -> Self {
        Self {
            grid_width,
            grid_height,
            ..Self::default()
        }
    }

    /// Preset for image pairs related by pure translation: a single
    /// evaluation at identity rotation and 1:1 scale
    pub fn translation_only() -> Self {
        Self {
            rotation_search: false,
            scale_search: false,
            ..Self::default()
        }
    }

    /// Set the support factor
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Enable or disable the rotation hypothesis search
    pub fn with_rotation_search(mut self, enable: bool) -> Self {
        self.rotation_search = enable;
        self
    }

    /// Enable or disable the scale hypothesis search
    pub fn with_scale_search(mut self, enable: bool) -> Self {
        self.scale_search = enable;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> GmsResult<()> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(GmsError::InvalidGridSize {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(GmsError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "GmsConfig: grid {}x{}, alpha={}, search=[rotation:{}, scale:{}]",
            self.grid_width, self.grid_height, self.alpha, self.rotation_search, self.scale_search
        )
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
