use std::cell::Cell;

use winit::{
    dpi::{LogicalSize, PhysicalSize},
    error::OsError,
    event::{Event, StartCause, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::run_return::EventLoopExtRunReturn,
    window::{Window as WinitWindow, WindowBuilder as WinitWindowBuilder, WindowId},
};

#[derive(thiserror::Error, Debug)]
pub enum WindowError {
    #[error("Failed to create the window: {0}")]
    CantCreate(#[from] OsError),
}

/// Owned handle to the windowing backend.
///
/// Windows are created from it and its event loop drives them. Dropping the handle shuts the
/// backend down, so it has to outlive every [`Window`].
pub struct WindowSystem {
    event_loop: EventLoop<()>,
}

impl WindowSystem {
    pub fn init() -> WindowSystem {
        let event_loop = EventLoop::new();
        log::debug!("Window system initialised");

        WindowSystem { event_loop }
    }

    /// Pumps window events and calls `frame` whenever the window can be drawn to.
    ///
    /// Returns once the window is closed or `frame` fails. Minimised windows are skipped
    /// and the loop sleeps until the next event instead.
    pub fn run<F, E>(&mut self, window: &Window, mut frame: F) -> Result<(), E>
    where
        F: FnMut(&Window) -> Result<(), E>,
    {
        let mut result = Ok(());

        self.event_loop
            .run_return(|event, _, control_flow| match event {
                Event::NewEvents(StartCause::Init) => *control_flow = ControlFlow::Poll,
                Event::WindowEvent { event, window_id } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested => {
                            log::debug!("Window close requested");
                            *control_flow = ControlFlow::Exit;
                        }
                        WindowEvent::Resized(size) => {
                            log::trace!("Window resized to {}x{}", size.width, size.height);
                            window.resized.set(true);
                        }
                        _ => {}
                    }
                }
                Event::MainEventsCleared => {
                    if *control_flow == ControlFlow::Exit {
                        return;
                    }
                    if window.is_minimized() {
                        *control_flow = ControlFlow::Wait;
                        return;
                    }

                    *control_flow = ControlFlow::Poll;
                    if let Err(err) = frame(window) {
                        result = Err(err);
                        *control_flow = ControlFlow::Exit;
                    }
                }
                _ => {}
            });

        result
    }
}

impl Drop for WindowSystem {
    fn drop(&mut self) {
        log::debug!("Window system terminated");
    }
}

/// Allows you to configure a [Window] prior to creating it
pub struct WindowBuilder {
    width: u32,
    height: u32,
    title: String,
    resizable: bool,
}

impl WindowBuilder {
    /// Creates a new [WindowBuilder] with default configuration.
    ///
    /// The default is a resizable 1280x720 window.
    pub fn new() -> WindowBuilder {
        WindowBuilder {
            width: 1280,
            height: 720,
            title: String::from("Kiln"),
            resizable: true,
        }
    }

    pub fn width(mut self, width: u32) -> WindowBuilder {
        self.width = width;
        self
    }

    pub fn height(mut self, height: u32) -> WindowBuilder {
        self.height = height;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> WindowBuilder {
        self.title = title.into();
        self
    }

    pub fn resizable(mut self, resizable: bool) -> WindowBuilder {
        self.resizable = resizable;
        self
    }

    pub fn build(self, system: &WindowSystem) -> Result<Window, WindowError> {
        let handle = WinitWindowBuilder::new()
            .with_title(&self.title)
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
            .build(&system.event_loop)?;
        log::debug!("Created window '{}' ({}x{})", self.title, self.width, self.height);

        Ok(Window {
            handle,
            resized: Cell::new(false),
        })
    }
}

impl Default for WindowBuilder {
    fn default() -> WindowBuilder {
        WindowBuilder::new()
    }
}

pub struct Window {
    handle: WinitWindow,
    /// Set by resize events until read with [`Window::take_resized`]
    resized: Cell<bool>,
}

impl Window {
    /// Creates a new [WindowBuilder] with default values
    pub fn builder() -> WindowBuilder {
        WindowBuilder::new()
    }

    pub fn winit_window(&self) -> &WinitWindow {
        &self.handle
    }

    pub fn id(&self) -> WindowId {
        self.handle.id()
    }

    /// Size of the drawable area in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.handle.inner_size();
        (size.width, size.height)
    }

    pub fn is_minimized(&self) -> bool {
        is_zero_area(self.handle.inner_size())
    }

    /// Whether the window was resized since the last call
    pub fn take_resized(&self) -> bool {
        self.resized.replace(false)
    }
}

fn is_zero_area(size: PhysicalSize<u32>) -> bool {
    size.width == 0 || size.height == 0
}
