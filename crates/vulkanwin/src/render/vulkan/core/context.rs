//! Vulkan context management
//!
//! Instance creation (with optional validation), logical device creation on
//! the selected GPU, and the error type shared by the whole Vulkan layer.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use ash::{Device, Entry, Instance};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use thiserror::Error;

use crate::core::VulkanRendererConfig;
use crate::render::vulkan::core::probe;
use crate::render::vulkan::core::selector::{PhysicalDeviceInfo, ResolvedQueueFamilies};
use crate::render::vulkan::core::window::WindowError;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A host query returned a non-success status
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader library could not be loaded
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// The host cannot satisfy the requirements (no suitable GPU, missing extension, ...)
    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),

    /// A host creation call failed
    #[error("Failed to create {stage}: {result:?}")]
    CreationFailed {
        /// What was being created
        stage: &'static str,
        /// Status returned by the host
        result: vk::Result,
    },

    /// Caller-supplied configuration is empty or cannot be resolved
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Window collaborator failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// A shader binary could not be read
    #[error("Failed to read shader {path}: {source}")]
    ShaderRead {
        /// File that was being read
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of [`VulkanError`]
///
/// Every kind is fatal to startup; none is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Zero suitable devices, missing extensions or empty surface support
    UnsupportedHost,
    /// A host creation call returned a non-success status
    CreationFailure,
    /// Requirement lists are empty or reference unresolvable capabilities
    ConfigurationInvalid,
}

impl VulkanError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Loading(_) | Self::UnsupportedHost(_) => ErrorKind::UnsupportedHost,
            Self::Api(_) | Self::CreationFailed { .. } | Self::Window(_) => ErrorKind::CreationFailure,
            Self::ConfigurationInvalid(_) | Self::ShaderRead { .. } => ErrorKind::ConfigurationInvalid,
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

fn to_cstring(name: &str) -> VulkanResult<CString> {
    CString::new(name).map_err(|_| VulkanError::ConfigurationInvalid(format!("Name contains a NUL byte: {name:?}")))
}

/// Convert configured names into NUL-terminated strings for the host
pub(crate) fn to_cstrings(names: &[String]) -> VulkanResult<Vec<CString>> {
    names.iter().map(|name| to_cstring(name)).collect()
}

const ENGINE_NAME: &str = "VulkanWin";

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance
    ///
    /// `window_extensions` are the instance extensions the window system needs
    /// for presentation. Validation layers and the debug messenger are added
    /// when enabled in `config`.
    pub fn new(window_extensions: &[String], config: &VulkanRendererConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| VulkanError::Loading(e.to_string()))?;

        let loader_extensions = probe::instance_extensions(&entry)?;
        let available_layers = probe::instance_layers(&entry)?;
        probe::log_instance_support(&loader_extensions, &available_layers);

        let validation = config.validation.is_enabled();

        let layer_names = config.validation.active_layers();
        let missing = probe::missing_names(&available_layers, layer_names);
        if !missing.is_empty() {
            return Err(VulkanError::ConfigurationInvalid(format!(
                "Requested validation layers are not available: {}",
                missing.join(", ")
            )));
        }
        let layer_cstrings = to_cstrings(layer_names)?;

        // Layers may expose instance extensions the loader does not list
        let from_layers = layer_cstrings
            .iter()
            .map(|layer| probe::layer_extensions(&entry, layer))
            .collect::<VulkanResult<Vec<_>>>()?;
        let available_extensions = probe::merge_extension_lists(loader_extensions, from_layers);

        let mut extension_names = window_extensions.to_vec();
        if validation {
            extension_names.push(DebugUtils::name().to_string_lossy().into_owned());
        }

        let missing = probe::missing_names(&available_extensions, &extension_names);
        if !missing.is_empty() {
            return Err(VulkanError::UnsupportedHost(format!(
                "Missing instance extensions: {}",
                missing.join(", ")
            )));
        }

        let app_name = to_cstring(&config.application_name)?;
        let engine_name = to_cstring(ENGINE_NAME)?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_cstrings = to_cstrings(&extension_names)?;
        let extension_ptrs: Vec<*const c_char> = extension_cstrings.iter().map(|name| name.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layer_cstrings.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|result| VulkanError::CreationFailed { stage: "instance", result })?;

        log::debug!(
            "Created Vulkan instance ({} extensions, {} layers)",
            extension_names.len(),
            layer_names.len()
        );

        let mut this = Self {
            entry,
            instance,
            debug: None,
        };

        // Dropping `this` on failure destroys the instance
        if validation {
            let debug_utils = DebugUtils::new(&this.entry, &this.instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            this.debug = Some((debug_utils, messenger));
        }

        Ok(this)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(|result| VulkanError::CreationFailed { stage: "debug messenger", result })
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Destroyed Vulkan instance");
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Priority given to every requested queue
pub const QUEUE_PRIORITY: f32 = 1.0;

/// Queue families to request, one entry per distinct family
///
/// Graphics and present frequently share a family; requesting the same family
/// twice is invalid, so the list is deduplicated.
pub fn queue_create_families(families: ResolvedQueueFamilies) -> Vec<u32> {
    families.unique().into_iter().collect()
}

/// Queue handles, one per logical role
///
/// When both roles share a family the handles alias the same queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceQueues {
    /// Queue used for graphics work
    pub graphics: vk::Queue,
    /// Queue used for presentation
    pub present: vk::Queue,
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    device: Device,
    queues: DeviceQueues,
    families: ResolvedQueueFamilies,
}

impl LogicalDevice {
    /// Create the logical device and fetch its queues
    pub fn new(
        instance: &Instance,
        physical_device: &PhysicalDeviceInfo,
        required_extensions: &[String],
    ) -> VulkanResult<Self> {
        let families = physical_device.queue_families;
        let priorities = [QUEUE_PRIORITY];

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_create_families(families)
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extension_cstrings = to_cstrings(required_extensions)?;
        let extension_ptrs: Vec<*const c_char> = extension_cstrings.iter().map(|name| name.as_ptr()).collect();

        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device.device, &create_info, None) }
            .map_err(|result| VulkanError::CreationFailed { stage: "logical device", result })?;

        let queues = unsafe {
            DeviceQueues {
                graphics: device.get_device_queue(families.graphics, 0),
                present: device.get_device_queue(families.present, 0),
            }
        };

        log::info!(
            "Created logical device on {} ({} queue famil{})",
            physical_device.description.name,
            queue_infos.len(),
            if queue_infos.len() == 1 { "y" } else { "ies" }
        );

        Ok(Self {
            device,
            queues,
            families,
        })
    }

    /// Raw device handle
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Queue handles
    pub fn queues(&self) -> DeviceQueues {
        self.queues
    }

    /// Queue families the queues were taken from
    pub fn families(&self) -> ResolvedQueueFamilies {
        self.families
    }

    /// Create a swapchain extension loader for this device
    pub fn swapchain_loader(&self, instance: &Instance) -> SwapchainLoader {
        SwapchainLoader::new(instance, &self.device)
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::Api)
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::debug!("Destroyed logical device");
    }
}
