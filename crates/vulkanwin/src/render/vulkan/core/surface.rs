//! Vulkan surface management
//!
//! Handles window surface creation and the per-device surface queries used
//! for presentation. The surface owns its window, so the window is released
//! only after the surface has been destroyed.

use ash::{extensions::khr, vk};

use crate::render::vulkan::core::context::{VulkanError, VulkanInstance, VulkanResult};
use crate::render::vulkan::core::window::Window;

/// Vulkan surface wrapper for presentation
pub struct VulkanSurface {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
    // Dropped after `Drop::drop` has destroyed the surface
    window: Window,
}

impl VulkanSurface {
    /// Create a new surface bound to `window`, taking ownership of it
    pub fn new(instance: &VulkanInstance, mut window: Window) -> VulkanResult<Self> {
        let surface_loader = khr::Surface::new(instance.entry(), instance.instance());
        let surface = window.create_vulkan_surface(instance.instance().handle())?;

        log::debug!("Created window surface");
        Ok(Self {
            surface_loader,
            surface,
            window,
        })
    }

    /// The window presented to
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Process pending window events, `true` if the framebuffer was resized
    pub fn poll_window_events(&mut self) -> bool {
        self.window.poll_events()
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface formats for a physical device
    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface present modes for a physical device
    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Check if a queue family supports presentation to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> VulkanResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
        log::debug!("Destroyed window surface");
    }
}
