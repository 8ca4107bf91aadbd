use std::{rc::Rc, time::Instant};

use kiln_vulkan::{constants::ENABLE_VALIDATION_LAYERS, prelude::*};
use kiln_window::prelude::Window;

use crate::{
    app::{AppConfig, AppError},
    constants,
};

/// Every Vulkan object the app draws with.
///
/// Fields drop in declaration order, so the scheduler waits for the device before
/// anything it might still be using is destroyed.
pub(crate) struct Renderer {
    scheduler: FrameScheduler<VulkanFrameBackend>,
    recorder: MeshRecorder<ColoredVertex>,
    swapchain: Swapchain,
    device: Rc<LogicalDevice>,
    _surface: Rc<Surface>,
    _debugger: Option<Debugger>,
    _instance: Rc<Instance>,
    started: Instant,
}

impl Renderer {
    pub fn new(window: &Window, config: &AppConfig) -> Result<Renderer, AppError> {
        let instance = Rc::new(Instance::new(window.winit_window())?);
        let debugger = if ENABLE_VALIDATION_LAYERS {
            Some(Debugger::new(instance.clone())?)
        } else {
            None
        };
        let surface = Rc::new(Surface::new(instance.clone(), window.winit_window())?);

        let physical_device = PhysicalDevice::select(&instance, &surface)?;
        let device = Rc::new(LogicalDevice::new(instance.clone(), physical_device)?);

        let swapchain = Swapchain::new(device.clone(), surface.clone(), window.framebuffer_size())?;

        // The transfer pool is only needed until the mesh is on the device
        let mesh = {
            let mut transfer_pool = CommandPool::transfer(device.clone())?;
            Mesh::upload(
                device.clone(),
                &mut transfer_pool,
                &QUAD_VERTICES,
                &QUAD_INDICES,
            )?
        };

        // Shader modules are only needed until the pipeline exists
        let recorder = {
            let vertex_shader = ShaderModule::from_file(device.clone(), &config.vertex_shader)?;
            let fragment_shader = ShaderModule::from_file(device.clone(), &config.fragment_shader)?;

            MeshRecorder::new(
                device.clone(),
                &swapchain,
                (&vertex_shader, &fragment_shader),
                mesh,
                config.frames_in_flight,
                config.clear_color,
            )?
        };

        let scheduler = FrameSchedulerBuilder::new()
            .frames_in_flight(config.frames_in_flight)
            .throttle_timeout(config.throttle_timeout)
            .build(VulkanFrameBackend::new(device.clone())?)?;
        log::info!(
            "Rendering to {} swapchain images ({:?}) with {} frames in flight",
            swapchain.image_count(),
            swapchain.present_mode(),
            scheduler.frames_in_flight()
        );

        Ok(Renderer {
            scheduler,
            recorder,
            swapchain,
            device,
            _surface: surface,
            _debugger: debugger,
            _instance: instance,
            started: Instant::now(),
        })
    }

    /// Draws one frame, rebuilding the swapchain first if the window was resized or
    /// afterwards if the frame found it stale.
    pub fn draw(&mut self, window: &Window) -> Result<(), AppError> {
        if window.take_resized() {
            self.rebuild_swapchain(window)?;
        }

        let seconds = self.started.elapsed().as_secs_f32();
        self.recorder.set_transform(spin_transform(seconds));

        match self.scheduler.draw_frame(&mut self.swapchain, &mut self.recorder) {
            Ok(FrameStatus::Presented { .. }) => Ok(()),
            Ok(FrameStatus::NeedsRebuild) => self.rebuild_swapchain(window),
            // Nothing was touched, the same slot is retried on the next redraw
            Err(FrameError::ThrottleTimeout { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn rebuild_swapchain(&mut self, window: &Window) -> Result<(), AppError> {
        if window.is_minimized() {
            return Ok(());
        }

        self.device.wait_idle()?;
        self.swapchain.recreate(window.framebuffer_size())?;
        self.recorder.rebuild_framebuffers(&self.swapchain)?;

        let extent = self.swapchain.extent();
        log::debug!("Swapchain rebuilt at {}x{}", extent.width, extent.height);

        Ok(())
    }

    /// Waits for the GPU to finish and releases the frame slots
    pub fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler.shutdown()?;
        Ok(())
    }
}

/// Model turned around the view axis by the time since startup, seen without a camera
fn spin_transform(seconds: f32) -> TransformUniform {
    let model = glam::Mat4::from_rotation_z(seconds * constants::ROTATION_SPEED);

    TransformUniform {
        model: model.to_cols_array_2d(),
        projection_view: glam::Mat4::IDENTITY.to_cols_array_2d(),
    }
}
