//! Fan arc geometry.
//!
//! Cards sit on a circle of radius `r` below the fan's pivot. A card at
//! base angle `a` under fan rotation `rot` is placed at `θ = a + rot`:
//! `x = r·sin θ`, `y = r·(1 − cos θ)`, rotated `θ + 90°`.

use arcana_types::Rect;

/// Viewports narrower than this use the compact layout.
pub const COMPACT_BREAKPOINT: f32 = 640.0;
pub const MIN_RADIUS: f64 = 150.0;

const RADIUS_FACTOR: f64 = 0.7;
const CARD_WIDTH: f32 = 120.0;
const CARD_HEIGHT: f32 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanLayout {
    pub init_angle: f64,
    pub spacing: f64,
    pub card_width: f32,
    pub card_height: f32,
    radius: f64,
}

impl FanLayout {
    #[must_use]
    pub fn for_viewport(width: f32, height: f32) -> Self {
        if width < COMPACT_BREAKPOINT {
            Self::compact(height)
        } else {
            Self::desktop(width, height)
        }
    }

    #[must_use]
    pub fn desktop(width: f32, height: f32) -> Self {
        Self {
            init_angle: -60.0,
            spacing: 5.0,
            card_width: CARD_WIDTH,
            card_height: CARD_HEIGHT,
            radius: fan_radius(f64::from(width.max(height))),
        }
    }

    #[must_use]
    pub fn compact(height: f32) -> Self {
        Self {
            init_angle: -70.0,
            spacing: 10.0,
            card_width: CARD_WIDTH,
            card_height: CARD_HEIGHT,
            radius: fan_radius(f64::from(height)),
        }
    }

    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Angle of the card at `index` before fan rotation.
    #[must_use]
    pub fn base_angle(&self, index: usize) -> f64 {
        self.init_angle + index as f64 * self.spacing
    }

    /// On-fan placement of the card at `index` under the current rotation,
    /// relative to the fan's pivot.
    #[must_use]
    pub fn card_geometry(&self, index: usize, rotation: f64) -> Rect {
        let theta = self.base_angle(index) + rotation;
        let radians = theta.to_radians();
        let x = self.radius * radians.sin();
        let y = self.radius * (1.0 - radians.cos());
        Rect::new(x as f32, y as f32, self.card_width, self.card_height)
            .rotated((theta + 90.0) as f32)
    }

    /// Angular distance of the card at `index` from straight up.
    #[must_use]
    pub fn angle_from_top(&self, index: usize, rotation: f64) -> f64 {
        (self.base_angle(index) + rotation).abs()
    }
}

fn fan_radius(extent: f64) -> f64 {
    (extent * RADIUS_FACTOR).max(MIN_RADIUS)
}
