pub mod context;
/// Host capability queries
pub mod probe;
pub mod selector;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod window;

// Re-export commonly used types
pub use context::{DeviceQueues, ErrorKind, LogicalDevice, VulkanError, VulkanInstance, VulkanResult};
pub use probe::{DeviceDescription, DeviceProbe, HostProbe, SurfaceSupportDetails};
pub use selector::{
    CandidateReport, DeviceSelector, FirstFit, PhysicalDeviceInfo, QueueFamilyIndices, ResolvedQueueFamilies,
    ScoredPolicy, SelectionPolicy,
};
pub use shader::{load_shaders, read_shader_bytes, ShaderBinary};
pub use surface::VulkanSurface;
pub use swapchain::{ImageViews, SharingPlan, SurfaceConfiguration, Swapchain};
pub use window::{Window, WindowError};
