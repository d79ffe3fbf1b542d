mod batch;
mod buffer;
mod camera;
mod error;
mod game;
mod input;
mod pipelines;
mod renderer;
mod sprite;
mod texture;
mod vertex;

use crate::batch::DEFAULT_MAX_SPRITES;
use crate::game::Game;
use crate::input::Input;
use crate::renderer::BatchRenderer;
use crate::sprite::{Sprite, SpriteId};
use crate::texture::Texture;

use anyhow::Result;
use dialog::DialogBox;
use log::{error, trace, warn};
use std::panic::catch_unwind;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

fn main() {
    match catch_unwind(|| engine_main()) {
        Ok(Ok(())) => (),
        Ok(Err(e)) => show_fatal_error(format!("{:#}", e)),
        Err(e) => {
            let err = {
                match e.downcast_ref::<&'static str>() {
                    Some(x) => (*x).to_string(),
                    None => match e.downcast_ref::<String>() {
                        Some(x) => x.to_owned(),
                        None => "[Error could not be downcast to a string]".to_string(),
                    },
                }
            };
            show_fatal_error(err);
        }
    }
}

fn show_fatal_error(err: String) {
    let dialog_box = dialog::Message::new(format!(
        "The engine encountered a fatal error and had to exit: {}",
        err
    ));
    let _ = dialog_box.show();
}

fn engine_main() -> Result<()> {
    pretty_env_logger::init();

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("sprite batch demo")
        .with_inner_size(LogicalSize::new(1280.0, 720.0))
        .build(&event_loop)?;

    let mut renderer = BatchRenderer::new(&window, DEFAULT_MAX_SPRITES)?;
    let mut input = Input::new();
    let mut game = Demo::default();
    game.on_start(&mut renderer)?;

    let mut last_frame = Instant::now();

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(VirtualKeyCode::Escape),
                        ..
                    },
                ..
            } => {
                game.on_shutdown();
                *control_flow = ControlFlow::Exit;
            }
            WindowEvent::Resized(new_size) => renderer.resize(new_size),
            WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                renderer.resize(*new_inner_size)
            }
            event => input.handle_window_event(&event),
        },
        Event::MainEventsCleared => window.request_redraw(),
        Event::RedrawRequested(_) => {
            let dt = last_frame.elapsed();
            last_frame = Instant::now();

            game.on_update(&mut renderer, &input, dt);

            match renderer.render() {
                Ok(_) => trace!("frametime: {:?}", renderer.frametime()),
                Err(wgpu::SurfaceError::Lost) => {
                    warn!("surface lost, reconfiguring");
                    renderer.reconfigure_surface();
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    error!("surface out of memory");
                    *control_flow = ControlFlow::Exit;
                }
                Err(e) => warn!("skipped frame: {}", e),
            }
        }
        _ => (),
    });
}

/// Spins a few crates around the window center and keeps one untextured
/// tinted quad that follows the cursor. Pressing R clears the scene.
#[derive(Default)]
struct Demo {
    spinning: Vec<SpriteId>,
    marker: Option<SpriteId>,
    elapsed: f32,
}

impl Game for Demo {
    fn on_start(&mut self, renderer: &mut BatchRenderer) -> Result<()> {
        let texture = match Texture::from_file("res/crate.png") {
            Ok(mut tex) => {
                if let Err(e) = tex.upload(renderer.device(), renderer.queue()) {
                    warn!("texture degraded to a solid-color quad: {}", e);
                }
                Some(Arc::new(tex))
            }
            Err(e) => {
                warn!("running untextured: {:#}", e);
                None
            }
        };

        let size = renderer.size();
        let center = [size.width as f32 / 2.0, size.height as f32 / 2.0];
        let batch = renderer.batch_mut();

        for i in 0..3 {
            let offset = (i as f32 - 1.0) * 160.0;
            let mut sprite = Sprite::new([center[0] + offset, center[1]], [100.0, 100.0]);
            if let Some(tex) = &texture {
                sprite = sprite.with_texture(Arc::clone(tex));
            }
            self.spinning.push(batch.add_sprite(sprite)?);
        }

        self.marker = Some(batch.add_sprite(
            Sprite::new([center[0], center[1] - 220.0], [60.0, 60.0])
                .with_color([0.9, 0.3, 0.2, 1.0]),
        )?);

        Ok(())
    }

    fn on_update(&mut self, renderer: &mut BatchRenderer, input: &Input, dt: Duration) {
        self.elapsed += dt.as_secs_f32();

        if input.is_pressed(&VirtualKeyCode::R) && !renderer.batch().is_empty() {
            renderer.clear();
            self.spinning.clear();
            self.marker = None;
            return;
        }

        let speed = if input.is_pressed(&VirtualKeyCode::Space) {
            4.0
        } else {
            1.0
        };

        for id in &self.spinning {
            if let Err(e) = renderer.batch_mut().set_rotation(*id, self.elapsed * speed) {
                warn!("lost track of sprite {}: {}", id, e);
            }
        }

        if let Some(id) = self.marker {
            let cursor = input.cursor();
            if let Err(e) = renderer.batch_mut().set_position(id, cursor) {
                warn!("lost track of sprite {}: {}", id, e);
            }
        }
    }
}
