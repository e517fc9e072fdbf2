pub mod five_fret;
pub mod input;
pub mod judgment;
pub mod results;
pub mod sustain;

use crate::engine::input::GuitarButton;
use crate::engine::results::Results;

/// Shared contract every gamemode engine implements. The host advances the
/// engine once per tick with the current chart time and feeds it explicit
/// timestamped input edges; an external gamemode registry selects the
/// implementation at chart-load time.
pub trait Engine {
    /// Drain queued input in FIFO order, then resolve everything due up to
    /// `chart_time`. Called exactly once per host update tick with a
    /// monotonically non-decreasing time.
    fn update(&mut self, chart_time: f32);

    fn on_button_press(&mut self, button: GuitarButton, time: f32);

    fn on_button_release(&mut self, button: GuitarButton, time: f32);

    fn generate_results(&self) -> Results;
}
