use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::blurring::infrastructure::shader_assets::{
    BundledShaders, ShaderAssets, ShaderDirectory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerPreference {
    Low,
    High,
}

impl PowerPreference {
    pub fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerPreference::Low => wgpu::PowerPreference::LowPower,
            PowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Engine creation settings. Every field has a default so partial
/// config files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Enable backend validation and debug labels.
    pub debug: bool,
    pub power_preference: PowerPreference,
    /// Only accept a software adapter.
    pub force_fallback_adapter: bool,
    /// Load the blur shader from this directory instead of the bundled copy.
    pub shader_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            power_preference: PowerPreference::High,
            force_fallback_adapter: false,
            shader_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn shader_assets(&self) -> Box<dyn ShaderAssets> {
        match &self.shader_dir {
            Some(dir) => Box::new(ShaderDirectory::new(dir.clone())),
            None => Box::new(BundledShaders),
        }
    }
}
