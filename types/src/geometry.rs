/// Axis-aligned placement of a card with a rotation about its center.
///
/// Units are whatever the renderer uses (pixels in practice); the engine only
/// interpolates between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Degrees, clockwise.
    pub rotation: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    #[must_use]
    pub const fn rotated(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Linear interpolation toward `to`; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, to: Rect, t: f32) -> Rect {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Rect {
            x: mix(self.x, to.x),
            y: mix(self.y, to.y),
            width: mix(self.width, to.width),
            height: mix(self.height, to.height),
            rotation: mix(self.rotation, to.rotation),
        }
    }
}
