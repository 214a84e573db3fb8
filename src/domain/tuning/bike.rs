/// Control tuning for the sandbox bike.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct BikeTuning {
    /// Lateral distance covered by a single turn command, in world units.
    pub turn_distance: f32,

    /// Lane offset the bike returns to when the sandbox resets it.
    pub start_offset: f32,
}

impl Default for BikeTuning {
    fn default() -> Self {
        Self {
            turn_distance: 1.0,
            start_offset: 0.0,
        }
    }
}
