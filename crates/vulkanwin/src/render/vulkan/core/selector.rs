//! Physical device selection
//!
//! Every enumerated GPU is evaluated into a [`CandidateReport`]: which queue
//! families serve graphics and presentation, which required extensions are
//! missing, and what the target surface supports. A candidate is suitable
//! when its queue families are complete, no extension is missing and the
//! surface reports at least one format and one present mode.
//!
//! Among suitable candidates a [`SelectionPolicy`] picks exactly one. The
//! default [`FirstFit`] takes the first in host enumeration order; the
//! selector itself never reorders candidates.

use ash::vk;
use std::collections::BTreeSet;

use crate::core::{DevicePolicy, VulkanRendererConfig};
use crate::render::vulkan::core::context::{VulkanError, VulkanResult};
use crate::render::vulkan::core::probe::{missing_names, DeviceDescription, DeviceProbe, SurfaceSupportDetails};

/// Queue family requirement resolved against one device's family table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family with graphics support
    pub graphics: Option<u32>,
    /// First family able to present to the surface
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan `families` in index order
    ///
    /// Graphics and present are resolved independently, each to the first
    /// family that qualifies. `supports_present` is only asked while no
    /// present family has been found, and the scan stops as soon as both
    /// roles are resolved.
    pub fn resolve<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> VulkanResult<Self>
    where
        F: FnMut(u32) -> VulkanResult<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in (0u32..).zip(families) {
            if indices.graphics.is_none()
                && family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics = Some(index);
            }

            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    /// Both roles have a family
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// The resolved indices, if complete
    pub fn resolved(&self) -> Option<ResolvedQueueFamilies> {
        match (self.graphics, self.present) {
            (Some(graphics), Some(present)) => Some(ResolvedQueueFamilies { graphics, present }),
            _ => None,
        }
    }
}

/// Queue family indices of the selected device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedQueueFamilies {
    /// Family used for graphics
    pub graphics: u32,
    /// Family used for presentation
    pub present: u32,
}

impl ResolvedQueueFamilies {
    /// Distinct family indices, ascending
    pub fn unique(&self) -> BTreeSet<u32> {
        [self.graphics, self.present].into_iter().collect()
    }

    /// Graphics and present use the same family
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Everything learned about one candidate during selection
#[derive(Debug, Clone)]
pub struct CandidateReport {
    /// Candidate handle
    pub device: vk::PhysicalDevice,
    /// Name, type and features
    pub description: DeviceDescription,
    /// Queue family resolution
    pub queue_families: QueueFamilyIndices,
    /// Required extensions the device lacks
    pub missing_extensions: Vec<String>,
    /// Surface support for the target surface
    pub surface: SurfaceSupportDetails,
}

impl CandidateReport {
    /// Whether the device can be used
    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_complete() && self.missing_extensions.is_empty() && self.surface.is_adequate()
    }

    /// Human-readable reasons the candidate was rejected
    pub fn rejection_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.queue_families.graphics.is_none() {
            reasons.push("no graphics queue family".to_string());
        }
        if self.queue_families.present.is_none() {
            reasons.push("no queue family can present to the surface".to_string());
        }
        if !self.missing_extensions.is_empty() {
            reasons.push(format!("missing extensions: {}", self.missing_extensions.join(", ")));
        }
        if self.surface.formats.is_empty() {
            reasons.push("no surface formats".to_string());
        }
        if self.surface.present_modes.is_empty() {
            reasons.push("no present modes".to_string());
        }
        reasons
    }

    fn into_selected(self) -> Option<PhysicalDeviceInfo> {
        let queue_families = self.queue_families.resolved()?;
        Some(PhysicalDeviceInfo {
            device: self.device,
            description: self.description,
            queue_families,
            surface: self.surface,
        })
    }
}

/// Evaluate one candidate against the requirements
pub fn evaluate_candidate<P>(
    probe: &P,
    device: vk::PhysicalDevice,
    required_extensions: &[String],
) -> VulkanResult<CandidateReport>
where
    P: DeviceProbe + ?Sized,
{
    let description = probe.describe(device);

    let families = probe.queue_families(device);
    let queue_families = QueueFamilyIndices::resolve(&families, |index| probe.supports_present(device, index))?;

    let available = probe.device_extensions(device)?;
    let missing_extensions = missing_names(&available, required_extensions);

    let surface = probe.surface_support(device)?;

    Ok(CandidateReport {
        device,
        description,
        queue_families,
        missing_extensions,
        surface,
    })
}

/// The selected physical device
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Name, type and features
    pub description: DeviceDescription,
    /// Graphics and present family indices
    pub queue_families: ResolvedQueueFamilies,
    /// Surface support at selection time
    pub surface: SurfaceSupportDetails,
}

/// Picks one candidate out of the suitable ones
pub trait SelectionPolicy {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Index into `suitable` of the chosen candidate
    ///
    /// `suitable` is in host enumeration order.
    fn choose(&self, suitable: &[CandidateReport]) -> Option<usize>;
}

/// First suitable candidate wins
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl SelectionPolicy for FirstFit {
    fn name(&self) -> &'static str {
        "first-fit"
    }

    fn choose(&self, suitable: &[CandidateReport]) -> Option<usize> {
        if suitable.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Highest [`device_score`] wins, earliest candidate on ties
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoredPolicy;

/// Score used by [`ScoredPolicy`], compared lexicographically
///
/// Device type decides first, then geometry shader support, then the largest
/// 2D image dimension.
pub type DeviceScore = (u32, bool, u32);

fn device_type_priority(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

/// Score a candidate for [`ScoredPolicy`]
pub fn device_score(description: &DeviceDescription) -> DeviceScore {
    (
        device_type_priority(description.device_type),
        description.geometry_shader,
        description.max_image_dimension_2d,
    )
}

impl SelectionPolicy for ScoredPolicy {
    fn name(&self) -> &'static str {
        "scored"
    }

    fn choose(&self, suitable: &[CandidateReport]) -> Option<usize> {
        let mut best: Option<(usize, DeviceScore)> = None;
        for (index, candidate) in suitable.iter().enumerate() {
            let score = device_score(&candidate.description);
            log::debug!("{} scored {:?}", candidate.description.name, score);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }
}

impl DevicePolicy {
    /// Policy implementation for this setting
    pub fn selection_policy(self) -> Box<dyn SelectionPolicy> {
        match self {
            Self::FirstFit => Box::new(FirstFit),
            Self::Scored => Box::new(ScoredPolicy),
        }
    }
}

/// Chooses the physical device to render with
pub struct DeviceSelector {
    required_extensions: Vec<String>,
    policy: Box<dyn SelectionPolicy>,
}

impl DeviceSelector {
    /// Create a selector with an explicit policy
    pub fn new(required_extensions: Vec<String>, policy: Box<dyn SelectionPolicy>) -> Self {
        Self {
            required_extensions,
            policy,
        }
    }

    /// Create a selector from renderer configuration
    pub fn from_config(config: &VulkanRendererConfig) -> Self {
        Self::new(
            config.required_device_extensions.clone(),
            config.device_policy.selection_policy(),
        )
    }

    /// Select a device
    ///
    /// Candidates whose queries fail are logged and treated as unsuitable.
    pub fn select<P>(&self, probe: &P) -> VulkanResult<PhysicalDeviceInfo>
    where
        P: DeviceProbe + ?Sized,
    {
        if self.required_extensions.is_empty() {
            return Err(VulkanError::ConfigurationInvalid(
                "No required device extensions given".to_string(),
            ));
        }

        let devices = probe.physical_devices()?;
        if devices.is_empty() {
            return Err(VulkanError::UnsupportedHost("No Vulkan-capable GPU found".to_string()));
        }
        log::debug!("Evaluating {} physical device(s)", devices.len());

        let mut suitable = Vec::new();
        for device in &devices {
            match evaluate_candidate(probe, *device, &self.required_extensions) {
                Ok(report) if report.is_suitable() => {
                    log::debug!("{} is suitable", report.description.name);
                    suitable.push(report);
                }
                Ok(report) => {
                    log::warn!(
                        "Rejected {}: {}",
                        report.description.name,
                        report.rejection_reasons().join("; ")
                    );
                }
                Err(e) => {
                    log::warn!("Rejected physical device {:?}: {}", device, e);
                }
            }
        }

        let chosen = self
            .policy
            .choose(&suitable)
            .filter(|&index| index < suitable.len())
            .ok_or_else(|| {
                VulkanError::UnsupportedHost(format!(
                    "No suitable GPU found among {} device(s)",
                    devices.len()
                ))
            })?;

        let selected = suitable
            .swap_remove(chosen)
            .into_selected()
            .ok_or_else(|| VulkanError::UnsupportedHost("Selected GPU has unresolved queue families".to_string()))?;

        log::info!(
            "Selected GPU: {} ({:?}, policy {}, graphics family {}, present family {})",
            selected.description.name,
            selected.description.device_type,
            self.policy.name(),
            selected.queue_families.graphics,
            selected.queue_families.present,
        );

        Ok(selected)
    }
}
