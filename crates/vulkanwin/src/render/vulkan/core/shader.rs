//! Shader binary loading
//!
//! SPIR-V files are read as opaque byte buffers; no module is created here.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::ShaderConfig;
use crate::render::vulkan::core::context::{VulkanError, VulkanResult};

/// Raw bytes of one shader file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinary {
    /// File the bytes were read from
    pub path: PathBuf,
    /// File contents
    pub bytes: Vec<u8>,
}

/// Read a shader file
pub fn read_shader_bytes<P: AsRef<Path>>(path: P) -> VulkanResult<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|source| VulkanError::ShaderRead {
        path: path.display().to_string(),
        source,
    })
}

/// Read every configured shader, in configuration order
///
/// Stops at the first file that cannot be read.
pub fn load_shaders(config: &ShaderConfig) -> VulkanResult<Vec<ShaderBinary>> {
    config
        .paths
        .iter()
        .map(|path| {
            let bytes = read_shader_bytes(path)?;
            log::debug!("Read shader {} ({} bytes)", path.display(), bytes.len());
            Ok(ShaderBinary {
                path: path.clone(),
                bytes,
            })
        })
        .collect()
}
