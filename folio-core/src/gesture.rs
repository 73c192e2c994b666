//! Turns raw pointer streams into navigation intents.

use std::collections::{BTreeMap, VecDeque};

use crate::config::GestureConfig;
use crate::geometry::PointF;

/// Samples older than this are ignored when estimating fling velocity.
const VELOCITY_WINDOW_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub id: u32,
    pub kind: PointerKind,
    pub position: PointF,
    pub time_ms: u64,
}

impl PointerEvent {
    pub fn new(id: u32, kind: PointerKind, x: f32, y: f32, time_ms: u64) -> Self {
        Self {
            id,
            kind,
            position: PointF::new(x, y),
            time_ms,
        }
    }
}

/// Hit tester that gets the first look at every pointer event. Returning
/// `true` claims the current pointer stream until all pointers are lifted.
pub trait TouchSink {
    fn on_touch(&mut self, event: &PointerEvent) -> bool;
}

/// Sink that never claims anything.
pub struct IgnoreTouches;

impl TouchSink for IgnoreTouches {
    fn on_touch(&mut self, _event: &PointerEvent) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// First pointer went down; running flings stop here.
    Down { position: PointF },
    Tap { position: PointF },
    DoubleTap { position: PointF },
    LongPress { position: PointF },
    /// Incremental pointer movement since the previous pan event.
    Pan { dx: f32, dy: f32 },
    /// `velocity` in pixels per second, `drag` is the total pointer travel.
    Fling { velocity: PointF, drag: PointF },
    ScrollEnd { flung: bool },
    /// Relative scale change since the previous pinch event.
    Pinch { factor: f32, focus: PointF },
    PinchEnd,
}

#[derive(Debug, Clone)]
struct Tracker {
    id: u32,
    down: PointF,
    down_time: u64,
    last: PointF,
    samples: VecDeque<(u64, PointF)>,
}

impl Tracker {
    fn new(event: &PointerEvent) -> Self {
        let mut samples = VecDeque::new();
        samples.push_back((event.time_ms, event.position));
        Self {
            id: event.id,
            down: event.position,
            down_time: event.time_ms,
            last: event.position,
            samples,
        }
    }

    fn record(&mut self, time: u64, position: PointF) {
        self.samples.push_back((time, position));
        while self
            .samples
            .front()
            .is_some_and(|(t, _)| time.saturating_sub(*t) > VELOCITY_WINDOW_MS)
        {
            self.samples.pop_front();
        }
    }

    fn velocity(&self) -> PointF {
        let (Some((t0, p0)), Some((t1, p1))) = (self.samples.front(), self.samples.back()) else {
            return PointF::default();
        };
        let elapsed = t1.saturating_sub(*t0);
        if elapsed == 0 {
            return PointF::default();
        }
        let seconds = elapsed as f32 / 1000.0;
        PointF::new((p1.x - p0.x) / seconds, (p1.y - p0.y) / seconds)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    position: PointF,
    time: u64,
}

#[derive(Debug)]
pub struct GestureInterpreter {
    config: GestureConfig,
    pointers: BTreeMap<u32, PointF>,
    primary: Option<Tracker>,
    panning: bool,
    pinch_span: Option<f32>,
    long_press_fired: bool,
    double_tap_candidate: bool,
    pending_tap: Option<PendingTap>,
    claimed: bool,
    /// Set after a pinch until every pointer is lifted.
    spent: bool,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            pointers: BTreeMap::new(),
            primary: None,
            panning: false,
            pinch_span: None,
            long_press_fired: false,
            double_tap_candidate: false,
            pending_tap: None,
            claimed: false,
            spent: false,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch_span.is_some()
    }

    /// Whether the current stream was claimed by the touch sink.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Feeds one pointer event. The sink sees it first; a claimed stream
    /// produces no gestures.
    pub fn on_pointer(&mut self, event: &PointerEvent, sink: &mut dyn TouchSink) -> Vec<Gesture> {
        let mut out = Vec::new();
        if event.kind == PointerKind::Down && self.pointers.is_empty() {
            self.claimed = false;
            self.spent = false;
            self.flush_stale_tap(event.time_ms, &mut out);
        }

        match event.kind {
            PointerKind::Down | PointerKind::Move => {
                self.pointers.insert(event.id, event.position);
            }
            PointerKind::Up | PointerKind::Cancel => {
                self.pointers.remove(&event.id);
            }
        }

        if sink.on_touch(event) && !self.claimed {
            self.claimed = true;
            self.abandon(&mut out);
        }
        if self.claimed {
            if self.pointers.is_empty() {
                self.reset_stream();
            }
            return out;
        }

        match event.kind {
            PointerKind::Down => self.on_down(event, &mut out),
            PointerKind::Move => self.on_move(event, &mut out),
            PointerKind::Up => self.on_up(event, &mut out),
            PointerKind::Cancel => {
                self.abandon(&mut out);
                if self.pointers.is_empty() {
                    self.reset_stream();
                }
            }
        }
        out
    }

    /// Emits gestures that only time can confirm: a single tap once the
    /// double-tap window has passed, and long presses.
    pub fn poll(&mut self, now: u64) -> Vec<Gesture> {
        let mut out = Vec::new();
        self.flush_stale_tap(now, &mut out);
        if !self.config.long_press_enabled
            || self.claimed
            || self.panning
            || self.long_press_fired
            || self.pinch_span.is_some()
            || self.pointers.len() != 1
        {
            return out;
        }
        if let Some(tracker) = &self.primary {
            if now.saturating_sub(tracker.down_time) >= self.config.long_press_timeout_ms {
                self.long_press_fired = true;
                self.double_tap_candidate = false;
                out.push(Gesture::LongPress {
                    position: tracker.down,
                });
            }
        }
        out
    }

    fn flush_stale_tap(&mut self, now: u64, out: &mut Vec<Gesture>) {
        if let Some(pending) = self.pending_tap {
            if now.saturating_sub(pending.time) > self.config.double_tap_timeout_ms {
                self.pending_tap = None;
                out.push(Gesture::Tap {
                    position: pending.position,
                });
            }
        }
    }

    fn on_down(&mut self, event: &PointerEvent, out: &mut Vec<Gesture>) {
        if self.spent {
            return;
        }
        match self.pointers.len() {
            1 => {
                out.push(Gesture::Down {
                    position: event.position,
                });
                self.double_tap_candidate = match self.pending_tap.take() {
                    Some(pending) => {
                        pending.position.distance(event.position) <= self.config.touch_slop * 4.0
                    }
                    None => false,
                };
                self.primary = Some(Tracker::new(event));
                self.panning = false;
                self.long_press_fired = false;
            }
            2 => {
                if self.panning {
                    out.push(Gesture::ScrollEnd { flung: false });
                }
                self.panning = false;
                self.double_tap_candidate = false;
                self.long_press_fired = true;
                self.pinch_span = self.span();
            }
            _ => {}
        }
    }

    fn on_move(&mut self, event: &PointerEvent, out: &mut Vec<Gesture>) {
        if self.spent {
            return;
        }
        if let Some(previous) = self.pinch_span {
            let (Some(span), Some(focus)) = (self.span(), self.focus()) else {
                return;
            };
            if previous > 0.0 && span > 0.0 {
                out.push(Gesture::Pinch {
                    factor: span / previous,
                    focus,
                });
                self.pinch_span = Some(span);
            }
            return;
        }

        let slop = self.config.touch_slop;
        let Some(tracker) = self.primary.as_mut().filter(|t| t.id == event.id) else {
            return;
        };
        tracker.record(event.time_ms, event.position);
        if !self.panning {
            if self.long_press_fired || tracker.down.distance(event.position) <= slop {
                return;
            }
            self.panning = true;
            self.double_tap_candidate = false;
        }
        out.push(Gesture::Pan {
            dx: event.position.x - tracker.last.x,
            dy: event.position.y - tracker.last.y,
        });
        tracker.last = event.position;
    }

    fn on_up(&mut self, event: &PointerEvent, out: &mut Vec<Gesture>) {
        if self.pinch_span.is_some() {
            if self.pointers.len() < 2 {
                self.pinch_span = None;
                self.spent = true;
                self.primary = None;
                out.push(Gesture::PinchEnd);
            }
            if self.pointers.is_empty() {
                self.reset_stream();
            }
            return;
        }
        if self.spent {
            if self.pointers.is_empty() {
                self.reset_stream();
            }
            return;
        }

        let Some(mut tracker) = self.primary.take().filter(|t| t.id == event.id) else {
            return;
        };
        tracker.record(event.time_ms, event.position);
        if self.panning {
            let velocity = tracker.velocity();
            let speed = velocity.distance(PointF::default());
            let flung = speed >= self.config.min_fling_velocity;
            if flung {
                out.push(Gesture::Fling {
                    velocity,
                    drag: PointF::new(
                        event.position.x - tracker.down.x,
                        event.position.y - tracker.down.y,
                    ),
                });
            }
            out.push(Gesture::ScrollEnd { flung });
        } else if self.long_press_fired {
            // the long press already consumed this stream
        } else if self.double_tap_candidate && self.config.double_tap_enabled {
            out.push(Gesture::DoubleTap {
                position: event.position,
            });
        } else if self.config.double_tap_enabled {
            self.pending_tap = Some(PendingTap {
                position: event.position,
                time: event.time_ms,
            });
        } else {
            out.push(Gesture::Tap {
                position: event.position,
            });
        }
        self.reset_stream();
    }

    /// Drops the in-progress gesture, closing any open pan or pinch.
    fn abandon(&mut self, out: &mut Vec<Gesture>) {
        if self.panning {
            out.push(Gesture::ScrollEnd { flung: false });
        }
        if self.pinch_span.is_some() {
            out.push(Gesture::PinchEnd);
        }
        self.primary = None;
        self.panning = false;
        self.pinch_span = None;
        self.double_tap_candidate = false;
    }

    fn reset_stream(&mut self) {
        self.primary = None;
        self.panning = false;
        self.pinch_span = None;
        self.long_press_fired = false;
        self.double_tap_candidate = false;
        if self.pointers.is_empty() {
            self.spent = false;
        }
    }

    fn span(&self) -> Option<f32> {
        let mut points = self.pointers.values();
        let a = points.next()?;
        let b = points.next()?;
        Some(a.distance(*b))
    }

    fn focus(&self) -> Option<PointF> {
        let mut points = self.pointers.values();
        let a = points.next()?;
        let b = points.next()?;
        Some(PointF::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5))
    }
}
