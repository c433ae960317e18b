//! # Core Module
//!
//! Shared configuration types used by the bootstrap and the application.

pub mod config;

pub use config::{
    ApplicationConfig,
    Config,
    ConfigError,
    DevicePolicy,
    ShaderConfig,
    ValidationConfig,
    VulkanRendererConfig,
    WindowConfig,
};
