//! The preview window showing the annotated camera feed.
//!
//! Everything runs on the thread that opened the window: the frame loop calls
//! [`Preview::show`] with each new frame and then [`Preview::pump_events`] to let the window
//! system catch up.

mod renderer;

use image::RgbaImage;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::EventLoop,
    platform::run_return::EventLoopExtRunReturn,
    window::WindowBuilder,
};

use crate::resolution::Resolution;

use self::renderer::Renderer;

pub struct Preview {
    renderer: Renderer,
    event_loop: EventLoop<()>,
}

impl Preview {
    /// Opens a window of the given size.
    pub fn open(title: &str, resolution: Resolution) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_resizable(false)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_title(title)
            .build(&event_loop)?;
        log::debug!("opened window '{}' at {}", title, resolution);

        Ok(Self {
            renderer: Renderer::new(window)?,
            event_loop,
        })
    }

    /// Displays `image`, replacing the previous one.
    pub fn show(&mut self, image: &RgbaImage) -> anyhow::Result<()> {
        let res = Resolution::new(image.width(), image.height());
        self.renderer.update_texture(res, image.as_raw());
        self.renderer.redraw()
    }

    /// Handles all pending window events without blocking.
    ///
    /// Returns `true` once the user asked to quit, either by pressing Escape or by closing the
    /// window.
    pub fn pump_events(&mut self) -> bool {
        let Self {
            renderer,
            event_loop,
        } = self;
        let window_id = renderer.window().id();

        let mut quit = false;
        event_loop.run_return(|event, _target, flow| {
            flow.set_poll();
            match event {
                Event::WindowEvent { window_id: id, event } if id == window_id => match event {
                    WindowEvent::CloseRequested => quit = true,
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    } => quit = true,
                    _ => {}
                },
                Event::RedrawRequested(id) if id == window_id => {
                    if let Err(e) = renderer.redraw() {
                        log::error!("{:#}", e);
                    }
                }
                Event::RedrawEventsCleared => flow.set_exit(),
                _ => {}
            }
        });

        quit
    }
}
