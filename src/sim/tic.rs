use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::dynamic::Dynamics;
use super::events::{Event, EventKind, EventQueue, Timers};
use crate::defs::{MAX_FRAME_NS, TICK_MS, TICK_NS, TICK_S};

/// Source of monotonic time in nanoseconds.
pub trait Clock: Send {
    fn now_ns(&self) -> u64;
}

/// Wall clock, measured from construction.
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

/// Clock advanced by hand. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn advance(&self, ns: u64) {
        self.0.fetch_add(ns, Ordering::Relaxed);
    }

    pub fn set(&self, ns: u64) {
        self.0.store(ns, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Callbacks driven by [`Simulation::advance`].
pub trait TickHandler {
    /// Once per outer frame, before any tick runs.
    fn new_frame(&mut self, _sim: &mut Simulation) {}
    /// One fixed tick of game logic.
    fn integrate(&mut self, sim: &mut Simulation);
    /// A due event, delivered after the tick that produced it.
    fn event(&mut self, _sim: &mut Simulation, _ev: Event) {}
    /// After render state has been interpolated.
    fn render(&mut self, _sim: &mut Simulation) {}
}

/// Fixed-timestep kernel. Owns every dynamic value plus the event queue.
pub struct Simulation {
    pub dynamics: Dynamics,
    pub events: EventQueue,
    pub timers: Timers,
    /// Simulated time in ns; always a multiple of [`TICK_NS`].
    pub sim_time: u64,
    /// Unsimulated remainder carried between frames.
    pub render_time: u64,
    pub frame: u64,
    pub fps: f64,
    /// `render_time / TICK_NS`, in `[0, 1)`.
    pub render_blend: f64,
    clock: Box<dyn Clock>,
    last_ns: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock::default()))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        let last_ns = clock.now_ns();
        Self {
            dynamics: Dynamics::default(),
            events: EventQueue::default(),
            timers: Timers::default(),
            sim_time: 0,
            render_time: 0,
            frame: 0,
            fps: 0.0,
            render_blend: 0.0,
            clock,
            last_ns,
        }
    }

    /// Queue an event for the current simulation time.
    pub fn push_event(&mut self, kind: EventKind) {
        self.events.push(Event {
            timestamp: self.sim_time,
            kind,
        });
    }

    /// Fire `kind` once `delay_ns` of simulation time has passed.
    pub fn schedule(&mut self, delay_ns: u64, kind: EventKind) {
        self.timers.schedule(self.sim_time + delay_ns, kind);
    }

    /// Read the clock and advance by however much time has passed.
    pub fn step(&mut self, handler: &mut impl TickHandler) {
        let now = self.clock.now_ns();
        let frame_ns = now.saturating_sub(self.last_ns);
        self.last_ns = now;
        self.advance(frame_ns, handler);
    }

    /// Run as many whole ticks as `frame_ns` (plus the carried remainder) allows.
    pub fn advance(&mut self, frame_ns: u64, handler: &mut impl TickHandler) {
        let frame_ns = frame_ns.min(MAX_FRAME_NS);
        if frame_ns > 0 {
            let inst = 1e9 / frame_ns as f64;
            self.fps = if self.fps == 0.0 {
                inst
            } else {
                self.fps * 0.9 + inst * 0.1
            };
        }
        self.render_time += frame_ns;

        handler.new_frame(self);

        while self.render_time >= TICK_NS {
            self.dynamics.snapshot();
            self.dynamics.animate(TICK_MS);
            self.dynamics.update_procedural(TICK_S);
            handler.integrate(self);
            self.render_time -= TICK_NS;
            self.sim_time += TICK_NS;

            self.timers.fire(self.sim_time, &mut self.events);
            while let Some(ev) = self.events.pop_due(self.sim_time) {
                log::debug!("event {:?} at {}", ev.kind, ev.timestamp);
                handler.event(self, ev);
            }
        }

        self.render_blend = self.render_time as f64 / TICK_NS as f64;
        self.dynamics.blend(self.render_blend);
        handler.render(self);
        self.frame += 1;
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
