//! # Rendering
//!
//! Everything needed to get from a window to a presentable image chain.

/// Vulkan backend
pub mod vulkan;
