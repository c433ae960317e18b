//! Vulkan swapchain management
//!
//! Negotiates a [`SurfaceConfiguration`] from what the surface supports and
//! builds the presentation chain: the [`Swapchain`] and one [`ImageViews`]
//! entry per swapchain image.
//!
//! Negotiation rules:
//! - format: a lone `UNDEFINED` entry means any format is accepted and the
//!   preferred format is used; otherwise the preferred format if listed,
//!   else the first listed format
//! - present mode: MAILBOX if listed, else IMMEDIATE if listed, else FIFO
//! - extent: the window hint clamped to the surface limits when the surface
//!   leaves the size to the swapchain, the surface's current extent otherwise
//! - image count: one more than the minimum, capped by a non-zero maximum

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};

use crate::render::vulkan::core::context::{LogicalDevice, VulkanError, VulkanResult};
use crate::render::vulkan::core::probe::SurfaceSupportDetails;
use crate::render::vulkan::core::selector::ResolvedQueueFamilies;
use crate::render::vulkan::core::surface::VulkanSurface;

/// Format used when the surface accepts anything or lists it explicitly
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

fn is_preferred(format: &vk::SurfaceFormatKHR) -> bool {
    format.format == PREFERRED_SURFACE_FORMAT.format && format.color_space == PREFERRED_SURFACE_FORMAT.color_space
}

/// Choose the surface format, `None` if the list is empty
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    match formats {
        [] => None,
        [only] if only.format == vk::Format::UNDEFINED => Some(PREFERRED_SURFACE_FORMAT),
        [first, ..] => Some(formats.iter().copied().find(is_preferred).unwrap_or(*first)),
    }
}

/// Choose the present mode
///
/// FIFO is always available and is the fallback.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mut chosen = vk::PresentModeKHR::FIFO;
    for &mode in present_modes {
        if mode == vk::PresentModeKHR::MAILBOX {
            return mode;
        } else if mode == vk::PresentModeKHR::IMMEDIATE {
            chosen = mode;
        }
    }
    chosen
}

/// Choose the swapchain extent
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width.max(capabilities.min_image_extent.width),
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height.max(capabilities.min_image_extent.height),
        ),
    }
}

/// Number of images to request
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// How swapchain images are shared between queue families
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingPlan {
    /// Exclusive or concurrent
    pub mode: vk::SharingMode,
    /// Families sharing the images, empty for exclusive mode
    pub queue_family_indices: Vec<u32>,
}

impl SharingPlan {
    /// Concurrent across both families when they differ, exclusive otherwise
    pub fn for_families(families: ResolvedQueueFamilies) -> Self {
        if families.is_shared() {
            Self {
                mode: vk::SharingMode::EXCLUSIVE,
                queue_family_indices: Vec::new(),
            }
        } else {
            Self {
                mode: vk::SharingMode::CONCURRENT,
                queue_family_indices: vec![families.graphics, families.present],
            }
        }
    }
}

/// Negotiated swapchain parameters
#[derive(Debug, Clone)]
pub struct SurfaceConfiguration {
    /// Image format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image size in pixels
    pub extent: vk::Extent2D,
    /// Requested minimum image count
    pub image_count: u32,
    /// Queue family sharing
    pub sharing: SharingPlan,
    /// Transform applied by the presentation engine
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SurfaceConfiguration {
    /// Negotiate a configuration from surface support
    ///
    /// `window_extent` is only used when the surface lets the swapchain
    /// decide its size.
    pub fn negotiate(
        support: &SurfaceSupportDetails,
        families: ResolvedQueueFamilies,
        window_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let format = choose_surface_format(&support.formats)
            .ok_or_else(|| VulkanError::UnsupportedHost("Surface reports no formats".to_string()))?;

        if support.present_modes.is_empty() {
            return Err(VulkanError::UnsupportedHost("Surface reports no present modes".to_string()));
        }
        let present_mode = choose_present_mode(&support.present_modes);

        Ok(Self {
            format,
            present_mode,
            extent: choose_extent(&support.capabilities, window_extent),
            image_count: choose_image_count(&support.capabilities),
            sharing: SharingPlan::for_families(families),
            pre_transform: support.capabilities.current_transform,
        })
    }

    /// Whether the extent covers at least one pixel
    pub fn has_area(&self) -> bool {
        self.extent.width > 0 && self.extent.height > 0
    }

    /// Fail if no swapchain can be created for this extent
    ///
    /// A minimized window reports a zero-sized surface.
    pub fn ensure_presentable(&self) -> VulkanResult<()> {
        if self.has_area() {
            Ok(())
        } else {
            Err(VulkanError::UnsupportedHost(format!(
                "Surface has zero area ({}x{}), is the window minimized?",
                self.extent.width, self.extent.height
            )))
        }
    }
}

/// Swapchain wrapper with RAII cleanup
pub struct Swapchain {
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    config: SurfaceConfiguration,
}

impl Swapchain {
    /// Create a swapchain
    ///
    /// Pass the handle of the chain being replaced as `old_swapchain` when
    /// recreating, or `vk::SwapchainKHR::null()`.
    pub fn new(
        instance: &Instance,
        device: &LogicalDevice,
        surface: &VulkanSurface,
        config: SurfaceConfiguration,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        config.ensure_presentable()?;
        let swapchain_loader = device.swapchain_loader(instance);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(config.image_count)
            .image_format(config.format.format)
            .image_color_space(config.format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(config.sharing.mode)
            .queue_family_indices(&config.sharing.queue_family_indices)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|result| VulkanError::CreationFailed { stage: "swapchain", result })?;

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        log::info!(
            "Created swapchain: {} images, {:?}/{:?}, {}x{}, {:?}, {:?} sharing",
            images.len(),
            config.format.format,
            config.format.color_space,
            config.extent.width,
            config.extent.height,
            config.present_mode,
            config.sharing.mode,
        );

        Ok(Self {
            swapchain_loader,
            swapchain,
            images,
            config,
        })
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain images, in presentation index order
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Negotiated configuration
    pub fn config(&self) -> &SurfaceConfiguration {
        &self.config
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.config.format
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        log::debug!("Destroyed swapchain");
    }
}

/// Create info for a color view of a swapchain image
pub fn color_view_create_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}

/// One color view per swapchain image, index-aligned with the images
pub struct ImageViews {
    device: Device,
    views: Vec<vk::ImageView>,
}

impl ImageViews {
    /// Create views for every image of `swapchain`
    ///
    /// If a view fails, the views already created are destroyed in reverse
    /// order before the error is returned.
    pub fn new(device: &Device, swapchain: &Swapchain) -> VulkanResult<Self> {
        let images = swapchain.images();
        let format = swapchain.format().format;

        let mut image_views = Self {
            device: device.clone(),
            views: Vec::with_capacity(images.len()),
        };

        for &image in images {
            let create_info = color_view_create_info(image, format);
            let view = unsafe { device.create_image_view(&create_info, None) }
                .map_err(|result| VulkanError::CreationFailed { stage: "image view", result })?;
            image_views.views.push(view);
        }

        log::debug!("Created {} image views", image_views.views.len());
        Ok(image_views)
    }

    /// Views, index-aligned with [`Swapchain::images`]
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }
}

impl Drop for ImageViews {
    fn drop(&mut self) {
        unsafe {
            for &view in self.views.iter().rev() {
                self.device.destroy_image_view(view, None);
            }
        }
        log::debug!("Destroyed {} image views", self.views.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn pair(format: vk::SurfaceFormatKHR) -> (vk::Format, vk::ColorSpaceKHR) {
        (format.format, format.color_space)
    }

    fn bounded_capabilities() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn size(extent: vk::Extent2D) -> (u32, u32) {
        (extent.width, extent.height)
    }

    #[test]
    fn test_undefined_format_means_preferred() {
        let formats = [surface_format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(pair(chosen), pair(PREFERRED_SURFACE_FORMAT));
    }

    #[test]
    fn test_preferred_format_found_anywhere() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            PREFERRED_SURFACE_FORMAT,
        ];
        assert_eq!(pair(choose_surface_format(&formats).unwrap()), pair(PREFERRED_SURFACE_FORMAT));
    }

    #[test]
    fn test_preferred_format_needs_matching_color_space() {
        let formats = [
            surface_format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(pair(choose_surface_format(&formats).unwrap()), pair(formats[0]));
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(pair(choose_surface_format(&formats).unwrap()), pair(formats[0]));
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn test_present_mode_preference() {
        use vk::PresentModeKHR as Mode;

        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::IMMEDIATE, Mode::MAILBOX]), Mode::MAILBOX);
        assert_eq!(choose_present_mode(&[Mode::MAILBOX, Mode::IMMEDIATE]), Mode::MAILBOX);
        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::IMMEDIATE, Mode::FIFO_RELAXED]), Mode::IMMEDIATE);
        assert_eq!(choose_present_mode(&[Mode::FIFO_RELAXED, Mode::FIFO]), Mode::FIFO);
        assert_eq!(choose_present_mode(&[]), Mode::FIFO);
    }

    #[test]
    fn test_extent_clamped_when_surface_size_undecided() {
        let caps = bounded_capabilities();
        assert_eq!(size(choose_extent(&caps, extent(10, 10))), (64, 64));
        assert_eq!(size(choose_extent(&caps, extent(5000, 5000))), (4096, 4096));
        assert_eq!(size(choose_extent(&caps, extent(800, 600))), (800, 600));
        assert_eq!(size(choose_extent(&caps, extent(10, 5000))), (64, 4096));
    }

    #[test]
    fn test_extent_follows_current_surface_size() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1280, 720),
            ..bounded_capabilities()
        };
        assert_eq!(size(choose_extent(&caps, extent(800, 600))), (1280, 720));
    }

    #[test]
    fn test_image_count() {
        let mut caps = bounded_capabilities();
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps), 3);

        caps.min_image_count = 3;
        caps.max_image_count = 3;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_sharing_plan() {
        let shared = SharingPlan::for_families(ResolvedQueueFamilies { graphics: 0, present: 0 });
        assert_eq!(shared.mode, vk::SharingMode::EXCLUSIVE);
        assert!(shared.queue_family_indices.is_empty());

        let split = SharingPlan::for_families(ResolvedQueueFamilies { graphics: 0, present: 2 });
        assert_eq!(split.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(split.queue_family_indices, vec![0, 2]);
    }

    #[test]
    fn test_negotiate_combines_policies() {
        let support = SurfaceSupportDetails {
            capabilities: bounded_capabilities(),
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };
        let families = ResolvedQueueFamilies { graphics: 1, present: 0 };

        let config = SurfaceConfiguration::negotiate(&support, families, extent(800, 600)).unwrap();
        assert_eq!(pair(config.format), pair(PREFERRED_SURFACE_FORMAT));
        assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(size(config.extent), (800, 600));
        assert_eq!(config.image_count, 3);
        assert_eq!(config.sharing.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(config.sharing.queue_family_indices, vec![1, 0]);
    }

    #[test]
    fn test_negotiate_rejects_empty_support() {
        let families = ResolvedQueueFamilies { graphics: 0, present: 0 };

        let no_formats = SurfaceSupportDetails {
            present_modes: vec![vk::PresentModeKHR::FIFO],
            ..Default::default()
        };
        let err = SurfaceConfiguration::negotiate(&no_formats, families, extent(800, 600)).unwrap_err();
        assert!(matches!(err, VulkanError::UnsupportedHost(_)));

        let no_modes = SurfaceSupportDetails {
            formats: vec![PREFERRED_SURFACE_FORMAT],
            ..Default::default()
        };
        let err = SurfaceConfiguration::negotiate(&no_modes, families, extent(800, 600)).unwrap_err();
        assert!(matches!(err, VulkanError::UnsupportedHost(_)));
    }

    #[test]
    fn test_zero_area_surface_is_not_presentable() {
        let support = SurfaceSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR {
                current_extent: extent(0, 0),
                ..bounded_capabilities()
            },
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let families = ResolvedQueueFamilies { graphics: 0, present: 0 };

        let config = SurfaceConfiguration::negotiate(&support, families, extent(800, 600)).unwrap();
        assert!(!config.has_area());
        let err = config.ensure_presentable().unwrap_err();
        assert!(matches!(err, VulkanError::UnsupportedHost(_)));
    }

    #[test]
    fn test_zero_width_hint_without_minimum_is_not_presentable() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_extent: extent(0, 0),
            ..bounded_capabilities()
        };
        let support = SurfaceSupportDetails {
            capabilities: caps,
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let families = ResolvedQueueFamilies { graphics: 0, present: 0 };

        let config = SurfaceConfiguration::negotiate(&support, families, extent(0, 600)).unwrap();
        assert!(config.ensure_presentable().is_err());

        let config = SurfaceConfiguration::negotiate(&support, families, extent(800, 600)).unwrap();
        assert!(config.has_area());
        assert!(config.ensure_presentable().is_ok());
    }

    #[test]
    fn test_color_view_create_info() {
        let image = vk::Image::from_raw(7);
        let info = color_view_create_info(image, vk::Format::B8G8R8A8_UNORM);

        assert_eq!(info.image, image);
        assert_eq!(info.view_type, vk::ImageViewType::TYPE_2D);
        assert_eq!(info.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(info.components.r, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(info.components.a, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(info.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(info.subresource_range.level_count, 1);
        assert_eq!(info.subresource_range.layer_count, 1);
    }
}
