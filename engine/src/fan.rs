//! Fan physics: drag tracking, velocity sampling, and the damped fling integrator.
//!
//! Angles are degrees, velocity is degrees per millisecond. The rotation angle
//! is clamped to [`LEFT_BOUND`, `RIGHT_BOUND`] after every drag update and every
//! fling tick.

use std::time::{Duration, Instant};

pub const LEFT_BOUND: f64 = -100.0;
pub const RIGHT_BOUND: f64 = 100.0;

/// Release speed (degrees per second) above which a drag turns into a fling.
pub const FLING_THRESHOLD: f64 = 300.0;
/// Per-tick multiplicative velocity decay.
pub const DAMPING: f64 = 0.93;
/// Fling stops once |velocity| (degrees per second) is at or below this.
pub const DEFAULT_FLING_MIN_VELOCITY: f64 = 50.0;

/// Degrees of rotation per fan radius of horizontal pointer travel.
const DRAG_SENSITIVITY: f64 = 60.0;
const SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Result of one fling integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlingTick {
    pub angle: f64,
    pub should_continue: bool,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    origin_x: f64,
    origin_angle: f64,
    last_sample_at: Instant,
    last_sample_angle: f64,
}

#[derive(Debug, Clone, Copy, Default)]
enum Motion {
    #[default]
    Idle,
    Dragging(DragState),
    Flinging,
}

/// Owns the fan's rotation angle and angular velocity.
#[derive(Debug, Clone)]
pub struct FanController {
    angle: f64,
    velocity: f64,
    motion: Motion,
    radius: f64,
    min_velocity: f64,
}

impl FanController {
    #[must_use]
    pub fn new(radius: f64, min_velocity: f64) -> Self {
        Self {
            angle: 0.0,
            velocity: 0.0,
            motion: Motion::Idle,
            radius,
            min_velocity,
        }
    }

    #[must_use]
    pub const fn angle(&self) -> f64 {
        self.angle
    }

    /// Degrees per millisecond.
    #[must_use]
    pub const fn velocity(&self) -> f64 {
        self.velocity
    }

    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f64) {
        if radius.is_finite() && radius > 0.0 {
            self.radius = radius;
        }
    }

    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.motion, Motion::Dragging(_))
    }

    #[must_use]
    pub const fn is_flinging(&self) -> bool {
        matches!(self.motion, Motion::Flinging)
    }

    /// Start tracking a drag from `pointer_x`. Cancels any fling in progress.
    pub fn begin_drag(&mut self, pointer_x: f64, now: Instant) {
        self.velocity = 0.0;
        self.motion = Motion::Dragging(DragState {
            origin_x: pointer_x,
            origin_angle: self.angle,
            last_sample_at: now,
            last_sample_angle: self.angle,
        });
    }

    /// Follow the pointer. No-op unless a drag is active.
    pub fn continue_drag(&mut self, pointer_x: f64, now: Instant) {
        let Motion::Dragging(ref mut drag) = self.motion else {
            return;
        };

        let delta = (pointer_x - drag.origin_x) / self.radius * DRAG_SENSITIVITY;
        let angle = clamp_angle(drag.origin_angle + delta);
        self.angle = angle;

        let elapsed = now.saturating_duration_since(drag.last_sample_at);
        if elapsed >= SAMPLE_INTERVAL {
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            self.velocity = (angle - drag.last_sample_angle) / elapsed_ms;
            drag.last_sample_at = now;
            drag.last_sample_angle = angle;
        }
    }

    /// Release the drag. Returns `true` if a fling started.
    pub fn end_drag(&mut self) -> bool {
        if !self.is_dragging() {
            return false;
        }

        if (self.velocity * 1000.0).abs() > FLING_THRESHOLD {
            self.motion = Motion::Flinging;
            tracing::debug!(velocity = self.velocity, angle = self.angle, "Fling started");
            true
        } else {
            self.velocity = 0.0;
            self.motion = Motion::Idle;
            false
        }
    }

    /// One damped integration tick. Call once per frame while `should_continue`.
    pub fn fling_step(&mut self) -> FlingTick {
        if !self.is_flinging() {
            return FlingTick {
                angle: self.angle,
                should_continue: false,
            };
        }

        self.velocity *= DAMPING;
        let next = self.angle + self.velocity;

        if !(LEFT_BOUND..=RIGHT_BOUND).contains(&next) {
            self.angle = clamp_angle(next);
            self.velocity = 0.0;
            self.motion = Motion::Idle;
            tracing::debug!(angle = self.angle, "Fling stopped at bound");
            return FlingTick {
                angle: self.angle,
                should_continue: false,
            };
        }

        if (self.velocity * 1000.0).abs() > self.min_velocity {
            self.angle = next;
            return FlingTick {
                angle: self.angle,
                should_continue: true,
            };
        }

        self.velocity = 0.0;
        self.motion = Motion::Idle;
        tracing::debug!(angle = self.angle, "Fling decayed");
        FlingTick {
            angle: self.angle,
            should_continue: false,
        }
    }

    /// End any drag or fling in place. A cancelled drag never flings.
    pub fn cancel_drag(&mut self) {
        self.velocity = 0.0;
        self.motion = Motion::Idle;
    }

    /// Return to rest at zero rotation.
    pub fn reset_rotation(&mut self) {
        self.angle = 0.0;
        self.velocity = 0.0;
        self.motion = Motion::Idle;
    }
}

fn clamp_angle(angle: f64) -> f64 {
    angle.clamp(LEFT_BOUND, RIGHT_BOUND)
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_FLING_MIN_VELOCITY, Duration, FanController, Instant, LEFT_BOUND, RIGHT_BOUND,
    };
    use proptest::prelude::*;

    const RADIUS: f64 = 600.0;

    fn controller() -> FanController {
        FanController::new(RADIUS, DEFAULT_FLING_MIN_VELOCITY)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn drag_maps_pointer_travel_to_angle() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(100.0, t0);
        fan.continue_drag(400.0, t0 + ms(20));
        // 300px over a 600px radius is half a radius: 30 degrees.
        assert!((fan.angle() - 30.0).abs() < 1e-9);
        assert!(fan.is_dragging());
    }

    #[test]
    fn drag_clamps_to_bounds() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        fan.continue_drag(1_000_000.0, t0 + ms(16));
        assert_eq!(fan.angle(), RIGHT_BOUND);
        fan.continue_drag(-1_000_000.0, t0 + ms(32));
        assert_eq!(fan.angle(), LEFT_BOUND);
    }

    #[test]
    fn continue_drag_without_begin_is_noop() {
        let mut fan = controller();
        fan.continue_drag(500.0, Instant::now());
        assert_eq!(fan.angle(), 0.0);
        assert_eq!(fan.velocity(), 0.0);
    }

    #[test]
    fn sub_interval_samples_are_coalesced() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        fan.continue_drag(60.0, t0 + ms(5));
        assert_eq!(fan.velocity(), 0.0, "5ms is below the sampling interval");
        fan.continue_drag(120.0, t0 + ms(12));
        // 120px -> 12 degrees over 12ms.
        assert!((fan.velocity() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn slow_release_does_not_fling() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        // 10px over 100ms: 1 degree / 100ms = 10 deg/s
        fan.continue_drag(10.0, t0 + ms(100));
        assert!(!fan.end_drag());
        assert_eq!(fan.velocity(), 0.0);
        assert!(!fan.is_flinging());
    }

    #[test]
    fn fast_release_flings_and_decays() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        // 50px over 10ms: 5 degrees / 10ms = 500 deg/s
        fan.continue_drag(50.0, t0 + ms(10));
        assert!(fan.end_drag());

        let start_angle = fan.angle();
        let first = fan.fling_step();
        assert!(first.should_continue);
        assert!((fan.velocity() - 0.5 * 0.93).abs() < 1e-12);
        assert!((first.angle - (start_angle + 0.5 * 0.93)).abs() < 1e-12);

        let mut ticks = 1;
        while fan.fling_step().should_continue {
            ticks += 1;
            assert!(ticks < 1_000);
        }
        assert!(!fan.is_flinging());
        assert_eq!(fan.velocity(), 0.0);
    }

    #[test]
    fn fling_stops_at_bound() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        fan.continue_drag(950.0, t0 + ms(10));
        fan.continue_drag(1000.0, t0 + ms(20));
        assert!(fan.end_drag());

        let mut last = fan.fling_step();
        while last.should_continue {
            last = fan.fling_step();
        }
        assert_eq!(last.angle, RIGHT_BOUND);
        assert_eq!(fan.velocity(), 0.0);
    }

    #[test]
    fn begin_drag_cancels_fling() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        fan.continue_drag(50.0, t0 + ms(10));
        assert!(fan.end_drag());
        fan.begin_drag(0.0, t0 + ms(30));
        assert!(!fan.is_flinging());
        assert!(!fan.fling_step().should_continue);
    }

    #[test]
    fn cancel_during_fling_keeps_angle() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        fan.continue_drag(50.0, t0 + ms(10));
        fan.end_drag();
        fan.fling_step();
        let angle = fan.angle();
        fan.cancel_drag();
        assert_eq!(fan.angle(), angle);
        assert_eq!(fan.velocity(), 0.0);
    }

    #[test]
    fn cancelled_drag_does_not_fling() {
        let mut fan = controller();
        let t0 = Instant::now();
        fan.begin_drag(0.0, t0);
        fan.continue_drag(50.0, t0 + ms(10));
        let angle = fan.angle();
        fan.cancel_drag();
        assert!(!fan.is_dragging());
        assert!(!fan.end_drag());
        fan.continue_drag(400.0, t0 + ms(20));
        assert_eq!(fan.angle(), angle);
        assert!(!fan.fling_step().should_continue);
    }

    #[test]
    fn invalid_radius_is_ignored() {
        let mut fan = controller();
        fan.set_radius(0.0);
        fan.set_radius(f64::NAN);
        assert_eq!(fan.radius(), RADIUS);
    }

    prop_compose! {
        fn pointer_moves()(moves in prop::collection::vec((-3000.0f64..3000.0, 1u64..40), 1..30))
            -> Vec<(f64, u64)> {
            moves
        }
    }

    proptest! {
        #[test]
        fn angle_stays_in_bounds(start in -500.0f64..500.0, moves in pointer_moves()) {
            let mut fan = controller();
            let mut now = Instant::now();
            fan.begin_drag(start, now);
            for (x, dt) in moves {
                now += ms(dt);
                fan.continue_drag(x, now);
                prop_assert!((LEFT_BOUND..=RIGHT_BOUND).contains(&fan.angle()));
            }
            fan.end_drag();
            loop {
                let tick = fan.fling_step();
                prop_assert!((LEFT_BOUND..=RIGHT_BOUND).contains(&tick.angle));
                if !tick.should_continue {
                    break;
                }
            }
        }

        #[test]
        fn fling_speed_never_increases(dx in 20.0f64..400.0, sign in prop::bool::ANY) {
            let mut fan = controller();
            let now = Instant::now();
            fan.begin_drag(0.0, now);
            let x = if sign { dx } else { -dx };
            fan.continue_drag(x, now + ms(10));
            if fan.end_drag() {
                let mut speed = fan.velocity().abs();
                while fan.fling_step().should_continue {
                    let next = fan.velocity().abs();
                    prop_assert!(next <= speed);
                    speed = next;
                }
            }
        }
    }
}
