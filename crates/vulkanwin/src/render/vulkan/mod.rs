//! Vulkan backend
//!
//! Device acquisition and presentation setup. Resources are owned by RAII
//! wrappers and released in reverse order of creation.

/// Core Vulkan wrappers and primitives
pub mod core;
/// Startup and teardown orchestration
pub mod system;

pub use self::core::{
    context::{ErrorKind, LogicalDevice, VulkanError, VulkanInstance, VulkanResult},
    selector::{DeviceSelector, PhysicalDeviceInfo},
    surface::VulkanSurface,
    swapchain::{ImageViews, SurfaceConfiguration, Swapchain},
    window::{Window, WindowError},
};

pub use system::{Lifecycle, StartupStages, VulkanContext};
