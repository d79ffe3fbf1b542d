use crate::input::Input;
use crate::renderer::BatchRenderer;
use std::time::Duration;

/// Application hooks driven by the frame loop. Exactly one concrete
/// implementation exists per application.
pub trait Game {
    /// Called once after the renderer is ready, before the first frame.
    fn on_start(&mut self, renderer: &mut BatchRenderer) -> anyhow::Result<()>;

    /// Called once per frame, before the frame is rendered. All sprite
    /// mutation belongs here.
    fn on_update(&mut self, renderer: &mut BatchRenderer, input: &Input, dt: Duration);

    /// Called once when the window is closing.
    fn on_shutdown(&mut self) {}
}
