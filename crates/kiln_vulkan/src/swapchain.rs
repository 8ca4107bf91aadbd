use ash::vk;
use std::rc::Rc;

use crate::{
    device::LogicalDevice,
    frame::{AcquireOutcome, FenceTimeout, FrameError, PresentOutcome, Presenter},
    surface::{Surface, SurfaceError},
    sync::Semaphore,
    VulkanError,
};

#[derive(thiserror::Error, Debug)]
pub enum SwapchainError {
    #[error("Failed to create Vulkan swapchain: {0}")]
    CantCreate(VulkanError),
    #[error("The surface doesn't report any supported formats")]
    NoSurfaceFormats,
    #[error("Failed to get the images created with the Vulkan swapchain: {0}")]
    ImageFetchFail(VulkanError),
    #[error("Failed to create a Vulkan image view: {0}")]
    CantCreateImageView(VulkanError),
    #[error("Failed to create a Vulkan render pass: {0}")]
    CantCreateRenderPass(VulkanError),
    #[error("Failed to create a Vulkan framebuffer: {0}")]
    CantCreateFramebuffer(VulkanError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Picks 8-bit BGRA sRGB when the surface supports it, the first supported format otherwise
pub fn choose_surface_format(
    available_formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, SwapchainError> {
    let preferred = available_formats.iter().find(|format| {
        format.format == vk::Format::B8G8R8A8_SRGB
            && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => Ok(format),
        None => {
            let fallback = available_formats
                .first()
                .copied()
                .ok_or(SwapchainError::NoSurfaceFormats)?;
            log::info!(
                "Preferred color format not supported by device, resorting to {:?}",
                fallback.format
            );
            Ok(fallback)
        }
    }
}

/// Picks mailbox when available, FIFO otherwise since every device supports it
pub fn choose_present_mode(available_present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available_present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        log::info!("Preferred present mode not supported by device, resorting to FIFO");
        vk::PresentModeKHR::FIFO
    }
}

/// One image more than the minimum, clamped to the maximum unless that is 0 (unbounded)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

/// Uses the surface's current extent, or the framebuffer size when the surface leaves it to
/// the swapchain
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer_size.0.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: framebuffer_size.1.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Presentable images negotiated against a [`Surface`]
pub struct Swapchain {
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,

    swapchain: ash::extensions::khr::Swapchain,
    handle: vk::SwapchainKHR,
    surface: Rc<Surface>,
    device: Rc<LogicalDevice>,
}

impl Swapchain {
    pub fn new(
        device: Rc<LogicalDevice>,
        surface: Rc<Surface>,
        framebuffer_size: (u32, u32),
    ) -> Result<Swapchain, SwapchainError> {
        let swapchain =
            ash::extensions::khr::Swapchain::new(surface.instance().vk_handle(), device.vk_handle());

        let mut swapchain = Swapchain {
            images: Vec::new(),
            image_views: Vec::new(),

            format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),

            swapchain,
            handle: vk::SwapchainKHR::null(),
            surface,
            device,
        };
        swapchain.create(framebuffer_size)?;

        Ok(swapchain)
    }

    /// Rebuilds the swapchain for the current surface state.
    ///
    /// The device must be idle, none of the old images may still be in use.
    pub fn recreate(&mut self, framebuffer_size: (u32, u32)) -> Result<(), SwapchainError> {
        self.create(framebuffer_size)
    }

    fn create(&mut self, framebuffer_size: (u32, u32)) -> Result<(), SwapchainError> {
        let physical_device = self.device.physical_device().vk_handle();
        let capabilities = self.surface.capabilities(physical_device)?;
        let format = choose_surface_format(&self.surface.formats(physical_device)?)?;
        let present_mode = choose_present_mode(&self.surface.present_modes(physical_device)?);
        let extent = choose_extent(&capabilities, framebuffer_size);
        let image_count = choose_image_count(&capabilities);

        // The indices are ignored for exclusive sharing
        let queue_families = self.device.queue_families();
        let queue_family_indices = queue_families.unique();
        let sharing_mode = if queue_families.is_split() {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let old_handle = self.handle;
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface.vk_handle())
            .min_image_count(image_count)
            .image_color_space(format.color_space)
            .image_format(format.format)
            .image_extent(extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .image_array_layers(1)
            .old_swapchain(old_handle);

        let handle = unsafe {
            self.swapchain
                .create_swapchain(&create_info, None)
                .map_err(|err| SwapchainError::CantCreate(err.into()))?
        };

        self.destroy_image_views();
        if old_handle != vk::SwapchainKHR::null() {
            unsafe { self.swapchain.destroy_swapchain(old_handle, None) };
        }
        self.handle = handle;
        self.format = format;
        self.present_mode = present_mode;
        self.extent = extent;

        self.images = unsafe {
            self.swapchain
                .get_swapchain_images(handle)
                .map_err(|err| SwapchainError::ImageFetchFail(err.into()))?
        };
        for &image in self.images.iter() {
            let image_view = Swapchain::create_image_view(&self.device, format.format, image)?;
            self.image_views.push(image_view);
        }

        log::info!(
            "Swapchain ready: {} images, {}x{}, {:?}, {:?}",
            self.images.len(),
            extent.width,
            extent.height,
            format.format,
            present_mode
        );

        Ok(())
    }

    fn create_image_view(
        device: &LogicalDevice,
        format: vk::Format,
        image: vk::Image,
    ) -> Result<vk::ImageView, SwapchainError> {
        let create_info = vk::ImageViewCreateInfo::builder()
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
            .image(image);

        unsafe {
            device
                .vk_handle()
                .create_image_view(&create_info, None)
                .map_err(|err| SwapchainError::CantCreateImageView(err.into()))
        }
    }

    fn destroy_image_views(&mut self) {
        for image_view in self.image_views.drain(..) {
            unsafe {
                self.device.vk_handle().destroy_image_view(image_view, None);
            };
        }
    }
}

impl Swapchain {
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Presenter<Semaphore> for Swapchain {
    fn acquire_next_image(
        &mut self,
        timeout: FenceTimeout,
        signal: &Semaphore,
    ) -> Result<AcquireOutcome, FrameError> {
        let result = unsafe {
            self.swapchain.acquire_next_image(
                self.handle,
                timeout.as_nanos(),
                signal.vk_handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(err) => Err(FrameError::Acquire(err.into())),
        }
    }

    fn present(&mut self, image_index: u32, wait: &Semaphore) -> Result<PresentOutcome, FrameError> {
        let wait_semaphores = [wait.vk_handle()];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain
                .queue_present(self.device.present_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(err) => Err(FrameError::Present(err.into())),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();
        unsafe {
            self.swapchain.destroy_swapchain(self.handle, None);
        };
    }
}
