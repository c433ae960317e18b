//! Vulkan bootstrap orchestration
//!
//! Runs the startup stages in order and owns what they produce.

pub mod lifecycle;

pub use lifecycle::{Lifecycle, StartupStages, VulkanContext, VulkanStages};
