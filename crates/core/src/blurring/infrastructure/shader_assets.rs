use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;

use crate::shared::constants::BLUR_SHADER_ASSET;
use crate::shared::error::AssetError;

/// Source of WGSL shader text, looked up by asset name.
pub trait ShaderAssets: Send + Sync {
    fn load(&self, name: &str) -> Result<Cow<'static, str>, AssetError>;
}

/// Shaders compiled into the binary.
pub struct BundledShaders;

impl ShaderAssets for BundledShaders {
    fn load(&self, name: &str) -> Result<Cow<'static, str>, AssetError> {
        match name {
            BLUR_SHADER_ASSET => Ok(Cow::Borrowed(include_str!("shaders/gaussian_blur.wgsl"))),
            _ => Err(AssetError::NotFound(name.to_string())),
        }
    }
}

/// Shaders read from an asset directory at engine creation.
pub struct ShaderDirectory {
    root: PathBuf,
}

impl ShaderDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ShaderAssets for ShaderDirectory {
    fn load(&self, name: &str) -> Result<Cow<'static, str>, AssetError> {
        let path = self.root.join(name);
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        fs::read_to_string(&path)
            .map(Cow::Owned)
            .map_err(|source| AssetError::Io { path, source })
    }
}
