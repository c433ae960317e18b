//! Capability probing
//!
//! Queries what the host Vulkan stack supports: instance extensions and
//! layers, and for each physical device its extensions, queue families and
//! surface support. An empty list is a valid answer meaning "unsupported";
//! only failed host calls are errors.
//!
//! Device-level queries go through [`DeviceProbe`] so device selection can be
//! exercised without a GPU.

use ash::{vk, Entry, Instance};
use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::c_char;

use crate::render::vulkan::core::context::{VulkanError, VulkanResult};
use crate::render::vulkan::core::surface::VulkanSurface;

/// Surface support reported for one physical device
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupportDetails {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported (format, color space) pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupportDetails {
    /// A swapchain can only be built when both lists are non-empty
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Properties of a physical device relevant to selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    /// Driver-reported device name
    pub name: String,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// Whether geometry shaders are supported
    pub geometry_shader: bool,
    /// Largest supported 2D image dimension
    pub max_image_dimension_2d: u32,
}

/// Device-level capability queries
pub trait DeviceProbe {
    /// Physical devices in host enumeration order
    fn physical_devices(&self) -> VulkanResult<Vec<vk::PhysicalDevice>>;

    /// Name, type and selection-relevant features
    fn describe(&self, device: vk::PhysicalDevice) -> DeviceDescription;

    /// Names of the device extensions the device supports
    fn device_extensions(&self, device: vk::PhysicalDevice) -> VulkanResult<Vec<String>>;

    /// Queue family table, indexed by family index
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    /// Whether `family_index` can present to the target surface
    fn supports_present(&self, device: vk::PhysicalDevice, family_index: u32) -> VulkanResult<bool>;

    /// Capabilities, formats and present modes for the target surface
    fn surface_support(&self, device: vk::PhysicalDevice) -> VulkanResult<SurfaceSupportDetails>;
}

/// [`DeviceProbe`] backed by a live instance and surface
pub struct HostProbe<'a> {
    instance: &'a Instance,
    surface: &'a VulkanSurface,
}

impl<'a> HostProbe<'a> {
    /// Probe devices of `instance` against `surface`
    pub fn new(instance: &'a Instance, surface: &'a VulkanSurface) -> Self {
        Self { instance, surface }
    }
}

impl DeviceProbe for HostProbe<'_> {
    fn physical_devices(&self) -> VulkanResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }.map_err(VulkanError::Api)
    }

    fn describe(&self, device: vk::PhysicalDevice) -> DeviceDescription {
        let properties = unsafe { self.instance.get_physical_device_properties(device) };
        let features = unsafe { self.instance.get_physical_device_features(device) };

        DeviceDescription {
            name: fixed_name(&properties.device_name),
            device_type: properties.device_type,
            geometry_shader: features.geometry_shader == vk::TRUE,
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        }
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VulkanResult<Vec<String>> {
        let extensions = unsafe { self.instance.enumerate_device_extension_properties(device) }
            .map_err(VulkanError::Api)?;
        Ok(extensions.iter().map(|ext| fixed_name(&ext.extension_name)).collect())
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe { self.instance.get_physical_device_queue_family_properties(device) }
    }

    fn supports_present(&self, device: vk::PhysicalDevice, family_index: u32) -> VulkanResult<bool> {
        self.surface.supports_present(device, family_index)
    }

    fn surface_support(&self, device: vk::PhysicalDevice) -> VulkanResult<SurfaceSupportDetails> {
        Ok(SurfaceSupportDetails {
            capabilities: self.surface.capabilities(device)?,
            formats: self.surface.formats(device)?,
            present_modes: self.surface.present_modes(device)?,
        })
    }
}

/// Instance extensions supported by the loader and implicit layers
pub fn instance_extensions(entry: &Entry) -> VulkanResult<Vec<String>> {
    let extensions = entry
        .enumerate_instance_extension_properties(None)
        .map_err(VulkanError::Api)?;
    Ok(extensions.iter().map(|ext| fixed_name(&ext.extension_name)).collect())
}

/// Instance extensions provided by one layer
pub fn layer_extensions(entry: &Entry, layer: &CStr) -> VulkanResult<Vec<String>> {
    let extensions = entry
        .enumerate_instance_extension_properties(Some(layer))
        .map_err(VulkanError::Api)?;
    Ok(extensions.iter().map(|ext| fixed_name(&ext.extension_name)).collect())
}

/// Extensions from the loader plus those provided by enabled layers
///
/// Duplicates are dropped, first occurrence wins.
pub fn merge_extension_lists<I>(loader: Vec<String>, from_layers: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut seen: HashSet<String> = loader.iter().cloned().collect();
    let mut merged = loader;
    for name in from_layers.into_iter().flatten() {
        if seen.insert(name.clone()) {
            merged.push(name);
        }
    }
    merged
}

/// Instance layers installed on the host
pub fn instance_layers(entry: &Entry) -> VulkanResult<Vec<String>> {
    let layers = entry.enumerate_instance_layer_properties().map_err(VulkanError::Api)?;
    Ok(layers.iter().map(|layer| fixed_name(&layer.layer_name)).collect())
}

/// Log what the instance supports
pub fn log_instance_support(extensions: &[String], layers: &[String]) {
    log::debug!("{} instance extensions supported", extensions.len());
    for name in extensions {
        log::debug!("  extension: {name}");
    }
    log::debug!("{} instance layers supported", layers.len());
    for name in layers {
        log::debug!("  layer: {name}");
    }
}

/// Requested names absent from `available`, in request order
pub fn missing_names(available: &[String], requested: &[String]) -> Vec<String> {
    let available: HashSet<&str> = available.iter().map(String::as_str).collect();
    requested
        .iter()
        .filter(|name| !available.contains(name.as_str()))
        .cloned()
        .collect()
}

fn fixed_name(raw: &[c_char]) -> String {
    // Fixed-size driver strings may lack a terminator
    if raw.contains(&0) {
        unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
    } else {
        raw.iter().map(|&c| c as u8 as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_missing_names_empty_when_all_present() {
        let available = names(&["VK_KHR_swapchain", "VK_KHR_maintenance1"]);
        assert!(missing_names(&available, &names(&["VK_KHR_swapchain"])).is_empty());
    }

    #[test]
    fn test_missing_names_keeps_request_order() {
        let available = names(&["VK_KHR_swapchain"]);
        let requested = names(&["VK_EXT_b", "VK_KHR_swapchain", "VK_EXT_a"]);
        assert_eq!(missing_names(&available, &requested), names(&["VK_EXT_b", "VK_EXT_a"]));
    }

    #[test]
    fn test_missing_names_against_empty_list() {
        let requested = names(&["VK_LAYER_KHRONOS_validation"]);
        assert_eq!(missing_names(&[], &requested), requested);
    }

    #[test]
    fn test_layer_provided_extension_counts_as_available() {
        let loader = names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);
        let layer = names(&["VK_EXT_debug_utils", "VK_KHR_surface"]);
        let available = merge_extension_lists(loader, [layer]);

        assert_eq!(available, names(&["VK_KHR_surface", "VK_KHR_xcb_surface", "VK_EXT_debug_utils"]));
        let requested = names(&["VK_KHR_surface", "VK_EXT_debug_utils"]);
        assert!(missing_names(&available, &requested).is_empty());
    }

    #[test]
    fn test_merge_without_layers_keeps_loader_list() {
        let loader = names(&["VK_KHR_surface"]);
        assert_eq!(merge_extension_lists(loader.clone(), Vec::new()), loader);
    }

    #[test]
    fn test_empty_surface_lists_are_inadequate() {
        let mut details = SurfaceSupportDetails::default();
        assert!(!details.is_adequate());

        details.formats.push(vk::SurfaceFormatKHR::default());
        assert!(!details.is_adequate());

        details.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(details.is_adequate());
    }

    #[test]
    fn test_fixed_name_reads_up_to_nul() {
        let mut raw = [0 as c_char; 16];
        for (dst, src) in raw.iter_mut().zip(b"VK_KHR_surface") {
            *dst = *src as c_char;
        }
        assert_eq!(fixed_name(&raw), "VK_KHR_surface");
    }
}
