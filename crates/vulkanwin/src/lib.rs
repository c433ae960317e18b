//! # VulkanWin
//!
//! Vulkan bootstrap for a GLFW window: picks a GPU that can draw and present
//! to the window, creates a logical device with graphics and present queues,
//! and negotiates a swapchain with one color view per image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vulkanwin::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let window = Window::new(&config.window)?;
//!     let context = VulkanContext::new(window, &config.renderer)?;
//!
//!     let extent = context.extent();
//!     println!("{}x{} with {} images", extent.width, extent.height, context.image_views().len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        core::config::{ApplicationConfig, DevicePolicy, ShaderConfig, VulkanRendererConfig, WindowConfig},
        render::vulkan::{ErrorKind, VulkanContext, VulkanError, VulkanResult, Window},
    };
}
