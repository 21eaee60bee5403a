//! Perspective road simulation and rendering.
//!
//! Six lane markings recede toward a fixed vanishing point. A marking that
//! has fully receded past the near edge is removed, and a fresh one is
//! inserted near the horizon once a gap opens up, so the visible count stays
//! steady. All drawing goes through the [`Surface`] trait - the simulation
//! never touches the canvas directly.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use crate::consts::*;
use crate::lerp;

/// RGBA color, alpha in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// CSS color string for canvas fill styles
    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Base lane-marking color
pub const LINE_COLOR: Color = Color::rgba(150, 150, 0, 0.4);
/// Stimulus color flashed during the reaction game
pub const STIMULUS_COLOR: Color = Color::rgba(220, 60, 40, 0.9);

/// Drawing surface capability. Canvas 2D in the browser, a recording fake in
/// tests.
pub trait Surface {
    /// Surface dimensions in pixels
    fn size(&self) -> Vec2;
    fn clear(&mut self);
    fn fill_quad(&mut self, quad: &[Vec2; 4], color: Color);
}

/// A pending color revert. A new flicker replaces this slot entirely -
/// the last scheduled revert wins.
#[derive(Debug, Clone, Copy)]
struct Flicker {
    restore: Color,
    revert_at: f64,
}

/// One lane-marking segment.
#[derive(Debug, Clone)]
pub struct RoadLine {
    position: f32,
    length: f32,
    color: Color,
    flicker: Option<Flicker>,
}

/// Invariant: a line's length is always derived from its position.
fn length_at(position: f32) -> f32 {
    2.0 + position / 100.0 * 16.0
}

impl RoadLine {
    pub fn new(position: f32) -> Self {
        Self {
            position,
            length: length_at(position),
            color: LINE_COLOR,
            flicker: None,
        }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Fixed-tick advance: exponential growth toward the near edge, bounded
    /// by modulo wraparound.
    pub fn advance_tick(&mut self) {
        self.position = (0.1 + self.position * 1.005) % 100.0;
        self.length = length_at(self.position);
    }

    /// Frame-delta advance: interpolate toward the tick target, scaled by
    /// the elapsed-time factor `alpha`. No wraparound here - recycling
    /// handles the near edge.
    pub fn advance(&mut self, alpha: f32) {
        self.position += alpha * (0.1 + self.position * 1.005 - self.position);
        self.length = length_at(self.position);
    }

    /// Override the color until `now + duration_ms`, then revert to whatever
    /// was active when this flicker was issued. A second flicker before the
    /// revert replaces the pending revert entirely.
    pub fn flicker(&mut self, color: Color, duration_ms: f64, now: f64) {
        self.flicker = Some(Flicker {
            restore: self.color,
            revert_at: now + duration_ms,
        });
        self.color = color;
    }

    /// Apply a due revert.
    pub fn expire_flicker(&mut self, now: f64) {
        if let Some(f) = self.flicker {
            if now >= f.revert_at {
                self.color = f.restore;
                self.flicker = None;
            }
        }
    }

    /// Project the logical segment into a screen-space trapezoid.
    ///
    /// The projection is a fixed affine perspective approximation: the left
    /// lane edge and the vertical placement are interpolated between the
    /// calibration bounds, and the width mirrors around the lane midpoint.
    pub fn quad(&self, size: Vec2) -> [Vec2; 4] {
        let far = edge_points(self.position, size);
        let near = edge_points(self.position + self.length, size);
        [far.0, far.1, near.1, near.0]
    }

    pub fn render(&self, surface: &mut dyn Surface) {
        let quad = self.quad(surface.size());
        surface.fill_quad(&quad, self.color);
    }
}

/// Left/right endpoints of the lane cross-section at `progress` percent.
fn edge_points(progress: f32, size: Vec2) -> (Vec2, Vec2) {
    let t = progress / 100.0;
    let x_pct = lerp(ROAD_LEFT_X0, ROAD_LEFT_X1, t);
    let y_pct = lerp(ROAD_Y0, ROAD_Y1, t);
    let w_pct = (ROAD_MID_X - x_pct) * 2.0;

    let x = x_pct / 100.0 * size.x;
    let y = y_pct / 100.0 * size.y;
    let w = w_pct / 100.0 * size.x;
    (Vec2::new(x, y), Vec2::new(x + w, y))
}

/// The road: an ordered run of lane markings plus the ambient speed.
///
/// Order matters - recycling pops fully-receded lines off the back and
/// inserts fresh ones at the front.
#[derive(Debug)]
pub struct Road {
    lines: VecDeque<RoadLine>,
    speed: f32,
    active: bool,
}

impl Road {
    pub fn new() -> Self {
        Self {
            lines: LINE_SEEDS.iter().map(|&p| RoadLine::new(p)).collect(),
            speed: 0.0,
            active: false,
        }
    }

    /// Ambient speed in miles per hour.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, mph: f32) {
        self.speed = mph;
    }

    pub fn lines(&self) -> impl Iterator<Item = &RoadLine> {
        self.lines.iter()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Claim the render loop. Returns false if a loop already runs - at most
    /// one may be active.
    pub fn activate(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        true
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Advance one animation frame: expire due flickers, move every line by
    /// the speed-derived factor, then recycle across the near/far bounds.
    pub fn advance(&mut self, now: f64) {
        let alpha = self.speed / SPEED_DIVISOR;
        for line in &mut self.lines {
            line.expire_flicker(now);
            line.advance(alpha);
        }
        self.recycle();
    }

    /// Fixed-tick advance for the timer-driven variant. Positions wrap in
    /// place, so the line count never changes here.
    pub fn tick(&mut self, now: f64) {
        for line in &mut self.lines {
            line.expire_flicker(now);
            line.advance_tick();
        }
    }

    /// Keep the visible count steady without uniform spacing decay: drop the
    /// last line once it has fully receded, and seed a new one near the
    /// horizon once the first has opened a gap.
    fn recycle(&mut self) {
        if self.lines.back().is_some_and(|l| l.position > 100.0) {
            self.lines.pop_back();
        }
        if self.lines.front().is_some_and(|l| l.position > GAP_THRESHOLD) {
            self.lines.push_front(RoadLine::new(RESPAWN_POSITION));
        }
    }

    pub fn render(&self, surface: &mut dyn Surface) {
        surface.clear();
        for line in &self.lines {
            line.render(surface);
        }
    }

    /// Flicker one line chosen uniformly at random - the reaction game's
    /// stimulus.
    pub fn flicker_random(&mut self, color: Color, duration_ms: f64, now: f64, rng: &mut Pcg32) {
        let idx = rng.random_range(0..self.lines.len());
        if let Some(line) = self.lines.get_mut(idx) {
            line.flicker(color, duration_ms, now);
        }
    }
}

impl Default for Road {
    fn default() -> Self {
        Self::new()
    }
}

/// Deadline generator for the fixed-tick road variant. The period is
/// inversely proportional to speed squared; changing speed cancels the
/// pending tick and restarts from `now`, so there is never more than one
/// deadline outstanding.
#[derive(Debug, Clone, Copy)]
pub struct SpeedTimer {
    period_ms: f64,
    next_at: f64,
}

fn period_for(mph: f32) -> f64 {
    if mph <= 0.0 {
        f64::INFINITY
    } else {
        SPEED_TICK_BASE_MS / (mph as f64 * mph as f64)
    }
}

impl SpeedTimer {
    pub fn new(mph: f32, now: f64) -> Self {
        let period_ms = period_for(mph);
        Self {
            period_ms,
            next_at: now + period_ms,
        }
    }

    pub fn period_ms(&self) -> f64 {
        self.period_ms
    }

    /// Cancel-then-restart: the pending deadline is recreated from `now`.
    pub fn set_speed(&mut self, mph: f32, now: f64) {
        self.period_ms = period_for(mph);
        self.next_at = now + self.period_ms;
    }

    /// Number of ticks due by `now`.
    pub fn poll(&mut self, now: f64) -> u32 {
        let mut fired = 0;
        while self.period_ms.is_finite() && self.next_at <= now {
            self.next_at += self.period_ms;
            fired += 1;
        }
        fired
    }
}
