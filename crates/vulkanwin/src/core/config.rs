//! # Application Configuration
//!
//! Configuration types for the window collaborator and the Vulkan bootstrap:
//! which instance layers to request, which device extensions a GPU must
//! expose, how to pick between several suitable GPUs, and which shader
//! binaries to read at startup.
//!
//! All types are serde-serializable and can be loaded from TOML or RON
//! through the [`Config`] trait.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::config::{Config, ConfigError};

/// Name of the swapchain device extension
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Name of the Khronos validation layer
pub const KHRONOS_VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// # Window Configuration
///
/// Parameters handed to the GLFW window collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial client width in pixels
    pub width: u32,
    /// Initial client height in pixels
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Test".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Validation layer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Force validation on or off. `None` enables it in debug builds only.
    pub enabled: Option<bool>,
    /// Instance layers requested when validation is enabled
    pub layers: Vec<String>,
}

impl ValidationConfig {
    /// Whether validation layers should be requested
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(cfg!(debug_assertions))
    }

    /// Layers to enable on the instance, empty when validation is off
    pub fn active_layers(&self) -> &[String] {
        if self.is_enabled() {
            &self.layers
        } else {
            &[]
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            layers: vec![KHRONOS_VALIDATION_LAYER.to_string()],
        }
    }
}

/// How to choose among several suitable physical devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePolicy {
    /// First suitable device in host enumeration order
    #[default]
    FirstFit,
    /// Highest scoring suitable device (discrete GPUs and geometry shaders preferred)
    Scored,
}

/// Shader binaries read at startup as opaque byte buffers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// SPIR-V files to read, in order
    pub paths: Vec<PathBuf>,
}

impl ShaderConfig {
    /// Create a shader configuration from a list of file paths
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

/// # Vulkan Renderer Configuration
///
/// Everything the bootstrap needs that is not discovered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulkanRendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Validation layer settings
    pub validation: ValidationConfig,
    /// Device extensions every candidate GPU must support
    pub required_device_extensions: Vec<String>,
    /// Tie-break policy among suitable GPUs
    pub device_policy: DevicePolicy,
    /// Shader binaries to load
    pub shaders: ShaderConfig,
}

impl VulkanRendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            validation: ValidationConfig::default(),
            required_device_extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            device_policy: DevicePolicy::default(),
            shaders: ShaderConfig::default(),
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation.enabled = Some(enabled);
        self
    }

    /// Set the device selection policy
    pub fn with_device_policy(mut self, policy: DevicePolicy) -> Self {
        self.device_policy = policy;
        self
    }

    /// Set the shader binaries to load
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.required_device_extensions.is_empty() {
            return Err("At least one required device extension must be listed".to_string());
        }

        if let Some(name) = self.required_device_extensions.iter().find(|name| name.trim().is_empty()) {
            return Err(format!("Invalid device extension name: {name:?}"));
        }

        if self.validation.is_enabled() {
            if self.validation.layers.is_empty() {
                return Err("Validation is enabled but no layers are listed".to_string());
            }
            if let Some(name) = self.validation.layers.iter().find(|name| name.trim().is_empty()) {
                return Err(format!("Invalid validation layer name: {name:?}"));
            }
        }

        Ok(())
    }
}

impl Default for VulkanRendererConfig {
    fn default() -> Self {
        Self::new("Hello Triangle")
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration loaded by the application binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Window settings
    pub window: WindowConfig,
    /// Vulkan bootstrap settings
    pub renderer: VulkanRendererConfig,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            renderer: VulkanRendererConfig::new(app_name),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(format!(
                "Window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            ));
        }
        self.renderer.validate()
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self::new("Hello Triangle")
    }
}

impl Config for ApplicationConfig {}
