use ash::vk;
use std::rc::Rc;

use crate::{device::LogicalDevice, render_pass::RenderPass, swapchain::SwapchainError};

/// Framebuffer wrapping a single swapchain image view
pub struct Framebuffer {
    extent: vk::Extent2D,
    device: Rc<LogicalDevice>,
    handle: vk::Framebuffer,
}

impl Framebuffer {
    pub fn new(
        device: Rc<LogicalDevice>,
        render_pass: &RenderPass,
        image_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Framebuffer, SwapchainError> {
        let attachments = [image_view];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass.vk_handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let handle = unsafe {
            device
                .vk_handle()
                .create_framebuffer(&create_info, None)
                .map_err(|err| SwapchainError::CantCreateFramebuffer(err.into()))?
        };

        Ok(Framebuffer {
            extent,
            device,
            handle,
        })
    }
}

impl Framebuffer {
    pub(crate) fn vk_handle(&self) -> vk::Framebuffer {
        self.handle
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .vk_handle()
                .destroy_framebuffer(self.handle, None);
        };
    }
}
