//! Startup and teardown of the Vulkan context
//!
//! Startup runs six stages in order: instance, surface, device selection,
//! logical device, swapchain, image views. Each stage may use what the
//! earlier ones produced. If a stage fails, everything created so far is
//! released in reverse order before the error is returned. A running
//! [`Lifecycle`] releases its resources in the same reverse order when
//! dropped.

use ash::vk;

use crate::core::VulkanRendererConfig;
use crate::render::vulkan::core::context::{LogicalDevice, VulkanError, VulkanInstance, VulkanResult};
use crate::render::vulkan::core::probe::{DeviceProbe, HostProbe};
use crate::render::vulkan::core::selector::{DeviceSelector, PhysicalDeviceInfo};
use crate::render::vulkan::core::surface::VulkanSurface;
use crate::render::vulkan::core::swapchain::{ImageViews, SurfaceConfiguration, Swapchain};
use crate::render::vulkan::core::window::Window;

/// The creation steps of a context, in startup order
pub trait StartupStages {
    /// Instance and loader
    type Instance;
    /// Presentation surface
    type Surface;
    /// Selected physical device
    type Device;
    /// Logical device and queues
    type Context;
    /// Presentation chain
    type Chain;
    /// One view per chain image
    type Views;

    /// Create the instance
    fn create_instance(&mut self) -> VulkanResult<Self::Instance>;

    /// Create the surface the chain will present to
    fn create_surface(&mut self, instance: &Self::Instance) -> VulkanResult<Self::Surface>;

    /// Pick the physical device
    fn select_device(&mut self, instance: &Self::Instance, surface: &Self::Surface) -> VulkanResult<Self::Device>;

    /// Create the logical device on the selected physical device
    fn create_context(&mut self, instance: &Self::Instance, device: &Self::Device) -> VulkanResult<Self::Context>;

    /// Negotiate and create the presentation chain
    fn create_chain(
        &mut self,
        instance: &Self::Instance,
        surface: &Self::Surface,
        device: &Self::Device,
        context: &Self::Context,
    ) -> VulkanResult<Self::Chain>;

    /// Create views for the chain images
    fn create_views(&mut self, context: &Self::Context, chain: &Self::Chain) -> VulkanResult<Self::Views>;
}

/// Everything produced by a successful startup
///
/// Fields are declared in release order.
pub struct Lifecycle<I, S, D, C, P, V> {
    views: V,
    chain: P,
    context: C,
    device: D,
    surface: S,
    instance: I,
}

impl<I, S, D, C, P, V> Lifecycle<I, S, D, C, P, V> {
    /// Run every stage in order
    ///
    /// On failure the resources already created are dropped in reverse order
    /// and the stage's error is returned.
    pub fn startup<B>(stages: &mut B) -> VulkanResult<Self>
    where
        B: StartupStages<Instance = I, Surface = S, Device = D, Context = C, Chain = P, Views = V>,
    {
        log::debug!("Startup: instance");
        let instance = stages.create_instance()?;

        log::debug!("Startup: surface");
        let surface = stages.create_surface(&instance)?;

        log::debug!("Startup: device selection");
        let device = stages.select_device(&instance, &surface)?;

        log::debug!("Startup: logical device");
        let context = stages.create_context(&instance, &device)?;

        log::debug!("Startup: swapchain");
        let chain = stages.create_chain(&instance, &surface, &device, &context)?;

        log::debug!("Startup: image views");
        let views = stages.create_views(&context, &chain)?;

        log::info!("Vulkan context ready");

        Ok(Self {
            views,
            chain,
            context,
            device,
            surface,
            instance,
        })
    }

    /// Instance
    pub fn instance(&self) -> &I {
        &self.instance
    }

    /// Surface
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Selected physical device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Logical device
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Presentation chain
    pub fn chain(&self) -> &P {
        &self.chain
    }

    /// Chain image views
    pub fn views(&self) -> &V {
        &self.views
    }
}

impl<I, S, D, C, P, V> Drop for Lifecycle<I, S, D, C, P, V> {
    fn drop(&mut self) {
        log::debug!("Releasing Vulkan context");
    }
}

/// Stages backed by the host Vulkan stack and a GLFW window
///
/// The window moves into the surface when the surface stage runs.
pub struct VulkanStages<'a> {
    window: Option<Window>,
    config: &'a VulkanRendererConfig,
}

impl<'a> VulkanStages<'a> {
    /// Stages creating resources for `window` as described by `config`
    pub fn new(window: Window, config: &'a VulkanRendererConfig) -> Self {
        Self {
            window: Some(window),
            config,
        }
    }

    fn unbound_window(&self) -> VulkanResult<&Window> {
        self.window
            .as_ref()
            .ok_or_else(|| VulkanError::ConfigurationInvalid("Window already bound to a surface".to_string()))
    }
}

impl StartupStages for VulkanStages<'_> {
    type Instance = VulkanInstance;
    type Surface = VulkanSurface;
    type Device = PhysicalDeviceInfo;
    type Context = LogicalDevice;
    type Chain = Swapchain;
    type Views = ImageViews;

    fn create_instance(&mut self) -> VulkanResult<VulkanInstance> {
        let window_extensions = self.unbound_window()?.required_instance_extensions()?;
        VulkanInstance::new(&window_extensions, self.config)
    }

    fn create_surface(&mut self, instance: &VulkanInstance) -> VulkanResult<VulkanSurface> {
        let window = self.window.take().ok_or_else(|| {
            VulkanError::ConfigurationInvalid("Window already bound to a surface".to_string())
        })?;
        VulkanSurface::new(instance, window)
    }

    fn select_device(&mut self, instance: &VulkanInstance, surface: &VulkanSurface) -> VulkanResult<PhysicalDeviceInfo> {
        let probe = HostProbe::new(instance.instance(), surface);
        DeviceSelector::from_config(self.config).select(&probe)
    }

    fn create_context(&mut self, instance: &VulkanInstance, device: &PhysicalDeviceInfo) -> VulkanResult<LogicalDevice> {
        LogicalDevice::new(instance.instance(), device, &self.config.required_device_extensions)
    }

    fn create_chain(
        &mut self,
        instance: &VulkanInstance,
        surface: &VulkanSurface,
        device: &PhysicalDeviceInfo,
        context: &LogicalDevice,
    ) -> VulkanResult<Swapchain> {
        let window_extent = surface.window().framebuffer_size();
        let config = SurfaceConfiguration::negotiate(&device.surface, device.queue_families, window_extent)?;
        config.ensure_presentable()?;
        Swapchain::new(instance.instance(), context, surface, config, vk::SwapchainKHR::null())
    }

    fn create_views(&mut self, context: &LogicalDevice, chain: &Swapchain) -> VulkanResult<ImageViews> {
        ImageViews::new(context.device(), chain)
    }
}

/// A fully initialized Vulkan context bound to one window
pub type VulkanContext = Lifecycle<VulkanInstance, VulkanSurface, PhysicalDeviceInfo, LogicalDevice, Swapchain, ImageViews>;

impl VulkanContext {
    /// Validate `config` and run startup against `window`
    ///
    /// The context takes the window and releases it after the surface, so
    /// the window cannot be dropped while the context still presents to it:
    ///
    /// ```rust,compile_fail
    /// # use vulkanwin::prelude::*;
    /// # fn run(config: &ApplicationConfig) -> VulkanResult<()> {
    /// let window = Window::new(&config.window)?;
    /// let context = VulkanContext::new(window, &config.renderer)?;
    /// drop(window);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(window: Window, config: &VulkanRendererConfig) -> VulkanResult<Self> {
        config.validate().map_err(VulkanError::ConfigurationInvalid)?;
        Self::startup(&mut VulkanStages::new(window, config))
    }

    /// The window the context presents to
    pub fn window(&self) -> &Window {
        self.surface.window()
    }

    /// Process pending window events
    ///
    /// Returns `true` if the framebuffer was resized since the last poll.
    pub fn poll_events(&mut self) -> bool {
        self.surface.poll_window_events()
    }

    /// Queue used for graphics work
    pub fn graphics_queue(&self) -> vk::Queue {
        self.context.queues().graphics
    }

    /// Queue used for presentation
    pub fn present_queue(&self) -> vk::Queue {
        self.context.queues().present
    }

    /// Negotiated image format
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.chain.format()
    }

    /// Negotiated image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.chain.extent()
    }

    /// Color views, one per swapchain image
    pub fn image_views(&self) -> &[vk::ImageView] {
        self.views.views()
    }

    /// Rebuild the swapchain and its views after the surface changed
    ///
    /// Surface support is queried again and the configuration renegotiated
    /// with `window_extent` as the size hint. The old swapchain is handed to
    /// the host for reuse. A zero-sized surface (minimized window) leaves the
    /// current chain in place.
    pub fn recreate_swapchain(&mut self, window_extent: vk::Extent2D) -> VulkanResult<()> {
        self.context.wait_idle()?;

        let support = HostProbe::new(self.instance.instance(), &self.surface).surface_support(self.device.device)?;
        let config = SurfaceConfiguration::negotiate(&support, self.device.queue_families, window_extent)?;
        if !config.has_area() {
            log::debug!("Surface has zero area, keeping current swapchain");
            return Ok(());
        }

        let chain = Swapchain::new(
            self.instance.instance(),
            &self.context,
            &self.surface,
            config,
            self.chain.handle(),
        )?;
        let views = ImageViews::new(self.context.device(), &chain)?;

        // Old views go before the old chain
        self.views = views;
        self.chain = chain;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const STAGES: [&str; 6] = ["instance", "surface", "device", "context", "chain", "views"];

    type Events = Rc<RefCell<Vec<String>>>;

    struct Tracked {
        name: &'static str,
        events: Events,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.events.borrow_mut().push(format!("release {}", self.name));
        }
    }

    struct FakeStages {
        events: Events,
        fail_at: Option<&'static str>,
    }

    impl FakeStages {
        fn new(fail_at: Option<&'static str>) -> Self {
            Self {
                events: Rc::new(RefCell::new(Vec::new())),
                fail_at,
            }
        }

        fn create(&self, name: &'static str) -> VulkanResult<Tracked> {
            if self.fail_at == Some(name) {
                self.events.borrow_mut().push(format!("fail {name}"));
                return Err(VulkanError::CreationFailed {
                    stage: name,
                    result: vk::Result::ERROR_INITIALIZATION_FAILED,
                });
            }
            self.events.borrow_mut().push(format!("create {name}"));
            Ok(Tracked {
                name,
                events: Rc::clone(&self.events),
            })
        }
    }

    impl StartupStages for FakeStages {
        type Instance = Tracked;
        type Surface = Tracked;
        type Device = Tracked;
        type Context = Tracked;
        type Chain = Tracked;
        type Views = Tracked;

        fn create_instance(&mut self) -> VulkanResult<Tracked> {
            self.create("instance")
        }

        fn create_surface(&mut self, instance: &Tracked) -> VulkanResult<Tracked> {
            assert_eq!(instance.name, "instance");
            self.create("surface")
        }

        fn select_device(&mut self, _instance: &Tracked, surface: &Tracked) -> VulkanResult<Tracked> {
            assert_eq!(surface.name, "surface");
            self.create("device")
        }

        fn create_context(&mut self, _instance: &Tracked, device: &Tracked) -> VulkanResult<Tracked> {
            assert_eq!(device.name, "device");
            self.create("context")
        }

        fn create_chain(
            &mut self,
            _instance: &Tracked,
            _surface: &Tracked,
            _device: &Tracked,
            context: &Tracked,
        ) -> VulkanResult<Tracked> {
            assert_eq!(context.name, "context");
            self.create("chain")
        }

        fn create_views(&mut self, _context: &Tracked, chain: &Tracked) -> VulkanResult<Tracked> {
            assert_eq!(chain.name, "chain");
            self.create("views")
        }
    }

    type FakeLifecycle = Lifecycle<Tracked, Tracked, Tracked, Tracked, Tracked, Tracked>;

    fn events(stages: &FakeStages) -> Vec<String> {
        stages.events.borrow().clone()
    }

    #[test]
    fn test_startup_creates_in_order_and_releases_in_reverse() {
        let mut stages = FakeStages::new(None);
        let lifecycle: FakeLifecycle = Lifecycle::startup(&mut stages).unwrap_or_else(|e| panic!("startup failed: {e}"));

        let created: Vec<String> = STAGES.iter().map(|s| format!("create {s}")).collect();
        assert_eq!(events(&stages), created);
        assert_eq!(lifecycle.chain().name, "chain");
        assert_eq!(lifecycle.views().name, "views");

        drop(lifecycle);

        let mut expected = created;
        expected.extend(STAGES.iter().rev().map(|s| format!("release {s}")));
        assert_eq!(events(&stages), expected);
    }

    #[test]
    fn test_failure_releases_exactly_earlier_stages_in_reverse() {
        for (index, &failing) in STAGES.iter().enumerate() {
            let mut stages = FakeStages::new(Some(failing));
            let result: VulkanResult<FakeLifecycle> = Lifecycle::startup(&mut stages);

            let err = result.err().unwrap_or_else(|| panic!("startup should fail at {failing}"));
            assert!(matches!(err, VulkanError::CreationFailed { stage, .. } if stage == failing));

            let earlier = &STAGES[..index];
            let mut expected: Vec<String> = earlier.iter().map(|s| format!("create {s}")).collect();
            expected.push(format!("fail {failing}"));
            expected.extend(earlier.iter().rev().map(|s| format!("release {s}")));
            assert_eq!(events(&stages), expected, "failing at {failing}");
        }
    }

    #[test]
    fn test_first_stage_failure_releases_nothing() {
        let mut stages = FakeStages::new(Some("instance"));
        let result: VulkanResult<FakeLifecycle> = Lifecycle::startup(&mut stages);

        assert!(result.is_err());
        assert_eq!(events(&stages), vec!["fail instance".to_string()]);
    }
}
