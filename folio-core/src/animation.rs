use crate::geometry::PointF;

/// Time constant of the fling velocity decay, in seconds.
const FLING_TIME_CONSTANT: f32 = 0.325;
/// Flings stop once their speed drops below this many pixels per second.
const FLING_STOP_SPEED: f32 = 20.0;

/// Ease-out curve: fast start, slowing towards the end.
pub fn decelerate(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Rectangle the viewport offset may travel in during a fling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlingBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl FlingBounds {
    fn clamp(&self, point: PointF) -> PointF {
        PointF::new(
            point.x.clamp(self.min_x.min(self.max_x), self.max_x),
            point.y.clamp(self.min_y.min(self.max_y), self.max_y),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Animation {
    Scroll {
        from: PointF,
        to: PointF,
        started_at: u64,
        duration: u64,
    },
    Zoom {
        pivot: PointF,
        from: f32,
        to: f32,
        started_at: u64,
        duration: u64,
    },
    Fling {
        origin: PointF,
        /// Pixels per second.
        velocity: PointF,
        bounds: FlingBounds,
        started_at: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationStep {
    Offset(PointF),
    Zoom { zoom: f32, pivot: PointF },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    pub step: AnimationStep,
    pub finished: bool,
}

impl Animation {
    pub fn is_fling(&self) -> bool {
        matches!(self, Animation::Fling { .. })
    }

    pub fn sample(&self, now: u64) -> AnimationFrame {
        match *self {
            Animation::Scroll {
                from,
                to,
                started_at,
                duration,
            } => {
                let t = progress(now, started_at, duration);
                let k = decelerate(t);
                AnimationFrame {
                    step: AnimationStep::Offset(PointF::new(
                        from.x + (to.x - from.x) * k,
                        from.y + (to.y - from.y) * k,
                    )),
                    finished: t >= 1.0,
                }
            }
            Animation::Zoom {
                pivot,
                from,
                to,
                started_at,
                duration,
            } => {
                let t = progress(now, started_at, duration);
                AnimationFrame {
                    step: AnimationStep::Zoom {
                        zoom: from + (to - from) * decelerate(t),
                        pivot,
                    },
                    finished: t >= 1.0,
                }
            }
            Animation::Fling {
                origin,
                velocity,
                bounds,
                started_at,
            } => {
                let elapsed = now.saturating_sub(started_at) as f32 / 1000.0;
                let decay = (-elapsed / FLING_TIME_CONSTANT).exp();
                let travel = FLING_TIME_CONSTANT * (1.0 - decay);
                let raw = PointF::new(
                    origin.x + velocity.x * travel,
                    origin.y + velocity.y * travel,
                );
                let position = bounds.clamp(raw);
                let speed = PointF::new(velocity.x * decay, velocity.y * decay)
                    .distance(PointF::default());
                let pinned_x = velocity.x == 0.0 || position.x != raw.x;
                let pinned_y = velocity.y == 0.0 || position.y != raw.y;
                AnimationFrame {
                    step: AnimationStep::Offset(position),
                    finished: speed < FLING_STOP_SPEED || (pinned_x && pinned_y),
                }
            }
        }
    }
}

fn progress(now: u64, started_at: u64, duration: u64) -> f32 {
    if duration == 0 {
        return 1.0;
    }
    (now.saturating_sub(started_at) as f32 / duration as f32).min(1.0)
}
