//! Scoring rules used to pick a physical device and its queue families.
//!
//! Everything in here works on plain data gathered from the driver, so the rules can be
//! exercised without a GPU.

use ash::vk;

use super::PhysicalDeviceError;

/// Queue family as reported by a physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyCandidate {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    /// Whether the family can present to the surface the device is picked for
    pub present_support: bool,
}

/// Everything the selection rules look at for one physical device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCandidate {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub geometry_shader: bool,
    pub extensions: Vec<String>,
    pub queue_families: Vec<QueueFamilyCandidate>,
    pub has_surface_formats: bool,
    pub has_present_modes: bool,
}

/// What a queue family is being picked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePurpose {
    Graphics,
    Presentation,
}

/// Indices of the queue families a logical device is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Returns each distinct family index once, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Whether graphics and presentation run on different queue families
    pub fn is_split(&self) -> bool {
        self.graphics != self.present
    }
}

/// Scores a physical device, a score of 0 disqualifies it.
///
/// Devices without geometry shader support always score 0. Otherwise discrete GPUs outrank
/// integrated GPUs which outrank CPU implementations, with the maximum 2D image dimension
/// breaking ties within a type.
pub fn score_device(candidate: &DeviceCandidate) -> u32 {
    if !candidate.geometry_shader {
        return 0;
    }

    let type_score: u32 = match candidate.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    };

    type_score.saturating_add(candidate.max_image_dimension_2d)
}

/// Scores a queue family for `purpose`, a score of 0 means it can't be used for it
pub fn score_queue_family(purpose: QueuePurpose, family: &QueueFamilyCandidate) -> u32 {
    let has = |flag: vk::QueueFlags| family.flags.contains(flag);

    let mut score = match purpose {
        QueuePurpose::Graphics => {
            if !has(vk::QueueFlags::GRAPHICS) {
                return 0;
            }
            let mut score = 0;
            if family.present_support {
                score += 100;
            }
            for flag in [
                vk::QueueFlags::COMPUTE,
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::SPARSE_BINDING,
            ] {
                if has(flag) {
                    score += 10;
                }
            }
            score
        }
        QueuePurpose::Presentation => {
            if !family.present_support {
                return 0;
            }
            let mut score = 0;
            for flag in [
                vk::QueueFlags::GRAPHICS,
                vk::QueueFlags::COMPUTE,
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::SPARSE_BINDING,
            ] {
                if has(flag) {
                    score += 10;
                }
            }
            score
        }
    };
    score += family.queue_count;

    score
}

/// Index of the best family for `purpose`, the first one wins a tie
fn best_queue_family(purpose: QueuePurpose, families: &[QueueFamilyCandidate]) -> Option<u32> {
    let mut best: Option<(u32, u32)> = None;
    for (index, family) in families.iter().enumerate() {
        let score = score_queue_family(purpose, family);
        if score > best.map_or(0, |(_, best_score)| best_score) {
            best = Some((index as u32, score));
        }
    }

    best.map(|(index, _)| index)
}

/// Picks a graphics and a presentation family, `None` if either is missing
pub fn select_queue_families(families: &[QueueFamilyCandidate]) -> Option<QueueFamilyIndices> {
    Some(QueueFamilyIndices {
        graphics: best_queue_family(QueuePurpose::Graphics, families)?,
        present: best_queue_family(QueuePurpose::Presentation, families)?,
    })
}

/// Whether the device can be used at all to present to the surface
pub fn is_device_suitable(candidate: &DeviceCandidate, required_extensions: &[&str]) -> bool {
    let has_extensions = required_extensions
        .iter()
        .all(|&required| candidate.extensions.iter().any(|name| name == required));

    select_queue_families(&candidate.queue_families).is_some()
        && has_extensions
        && candidate.has_surface_formats
        && candidate.has_present_modes
}

/// Returns the index of the highest scoring suitable candidate
pub fn pick_device(
    candidates: &[DeviceCandidate],
    required_extensions: &[&str],
) -> Result<usize, PhysicalDeviceError> {
    if candidates.is_empty() {
        return Err(PhysicalDeviceError::NoPhysicalDevices);
    }

    let mut best: Option<(usize, u32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if !is_device_suitable(candidate, required_extensions) {
            log::debug!("{} is not suitable", candidate.name);
            continue;
        }

        let score = score_device(candidate);
        log::debug!("{} scored {}", candidate.name, score);
        if score > best.map_or(0, |(_, best_score)| best_score) {
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index)
        .ok_or(PhysicalDeviceError::NoSuitableDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPCHAIN: &str = "VK_KHR_swapchain";

    fn family(flags: vk::QueueFlags, queue_count: u32, present_support: bool) -> QueueFamilyCandidate {
        QueueFamilyCandidate {
            flags,
            queue_count,
            present_support,
        }
    }

    fn candidate(name: &str, device_type: vk::PhysicalDeviceType, max_dim: u32) -> DeviceCandidate {
        DeviceCandidate {
            name: name.to_string(),
            device_type,
            max_image_dimension_2d: max_dim,
            geometry_shader: true,
            extensions: vec![SWAPCHAIN.to_string()],
            queue_families: vec![family(
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                16,
                true,
            )],
            has_surface_formats: true,
            has_present_modes: true,
        }
    }

    #[test]
    fn device_type_weighting_beats_image_dimension() {
        let discrete = candidate("discrete", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        let integrated = candidate("integrated", vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);
        let cpu = candidate("cpu", vk::PhysicalDeviceType::CPU, 4096);

        assert_eq!(score_device(&discrete), 10_000 + 8192);
        assert_eq!(score_device(&integrated), 100 + 16384);
        assert_eq!(score_device(&cpu), 1 + 4096);
        assert_eq!(score_device(&candidate("virtual", vk::PhysicalDeviceType::VIRTUAL_GPU, 10)), 10);
    }

    #[test]
    fn missing_geometry_shader_disqualifies() {
        let mut device = candidate("discrete", vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        device.geometry_shader = false;

        assert_eq!(score_device(&device), 0);
    }

    #[test]
    fn startup_fails_when_no_device_has_geometry_shaders() {
        let devices: Vec<DeviceCandidate> = [
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
        ]
        .iter()
        .map(|&ty| {
            let mut device = candidate("no geometry", ty, 16384);
            device.geometry_shader = false;
            device
        })
        .collect();

        assert!(matches!(
            pick_device(&devices, &[SWAPCHAIN]),
            Err(PhysicalDeviceError::NoSuitableDevice)
        ));
    }

    #[test]
    fn no_devices_is_reported_separately() {
        assert!(matches!(
            pick_device(&[], &[SWAPCHAIN]),
            Err(PhysicalDeviceError::NoPhysicalDevices)
        ));
    }

    #[test]
    fn picks_highest_scoring_suitable_device() {
        let mut discrete_without_swapchain =
            candidate("discrete", vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        discrete_without_swapchain.extensions.clear();
        let devices = vec![
            candidate("cpu", vk::PhysicalDeviceType::CPU, 4096),
            discrete_without_swapchain,
            candidate("integrated", vk::PhysicalDeviceType::INTEGRATED_GPU, 8192),
        ];

        assert_eq!(pick_device(&devices, &[SWAPCHAIN]).ok(), Some(2));
    }

    #[test]
    fn first_device_wins_a_tie() {
        let devices = vec![
            candidate("first", vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
            candidate("second", vk::PhysicalDeviceType::DISCRETE_GPU, 8192),
        ];

        assert_eq!(pick_device(&devices, &[SWAPCHAIN]).ok(), Some(0));
    }

    #[test]
    fn devices_without_surface_support_are_unsuitable() {
        let mut no_formats = candidate("no formats", vk::PhysicalDeviceType::DISCRETE_GPU, 1);
        no_formats.has_surface_formats = false;
        let mut no_modes = candidate("no modes", vk::PhysicalDeviceType::DISCRETE_GPU, 1);
        no_modes.has_present_modes = false;
        let mut no_present = candidate("no present", vk::PhysicalDeviceType::DISCRETE_GPU, 1);
        no_present.queue_families[0].present_support = false;

        assert!(!is_device_suitable(&no_formats, &[SWAPCHAIN]));
        assert!(!is_device_suitable(&no_modes, &[SWAPCHAIN]));
        assert!(!is_device_suitable(&no_present, &[SWAPCHAIN]));
    }

    #[test]
    fn graphics_family_requires_graphics_bit() {
        let transfer_only = family(vk::QueueFlags::TRANSFER, 2, true);
        let graphics = family(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            16,
            true,
        );

        assert_eq!(score_queue_family(QueuePurpose::Graphics, &transfer_only), 0);
        assert_eq!(
            score_queue_family(QueuePurpose::Graphics, &graphics),
            100 + 10 + 10 + 16
        );
    }

    #[test]
    fn presentation_family_requires_present_support() {
        let graphics_only = family(vk::QueueFlags::GRAPHICS, 1, false);
        let presenting = family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::SPARSE_BINDING, 4, true);

        assert_eq!(score_queue_family(QueuePurpose::Presentation, &graphics_only), 0);
        assert_eq!(
            score_queue_family(QueuePurpose::Presentation, &presenting),
            10 + 10 + 4
        );
    }

    #[test]
    fn graphics_and_present_may_land_on_different_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 16, false),
            family(vk::QueueFlags::TRANSFER, 1, true),
        ];

        let indices = select_queue_families(&families);

        assert_eq!(
            indices,
            Some(QueueFamilyIndices {
                graphics: 0,
                present: 1
            })
        );
        assert_eq!(indices.map(|indices| indices.unique()), Some(vec![0, 1]));
        assert_eq!(indices.map(|indices| indices.is_split()), Some(true));
    }

    #[test]
    fn presenting_graphics_family_is_preferred() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 16, false),
            family(vk::QueueFlags::GRAPHICS, 1, true),
        ];

        let indices = select_queue_families(&families);

        assert_eq!(
            indices,
            Some(QueueFamilyIndices {
                graphics: 1,
                present: 1
            })
        );
        assert_eq!(indices.map(|indices| indices.unique()), Some(vec![1]));
    }

    #[test]
    fn missing_present_family_means_no_indices() {
        let families = [family(vk::QueueFlags::GRAPHICS, 16, false)];

        assert_eq!(select_queue_families(&families), None);
    }
}
