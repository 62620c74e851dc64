//! Time-evolving values with interpolated render state.
//!
//! Every simulated quantity (mob position, sector heights, …) lives in a flat
//! [`DynamicStore`] owned by the simulation and is addressed by a typed
//! [`Dyn`] handle. The store keeps five stages per value:
//!
//! * `spawn`  – value at load time, target of [`DynamicValue::reset`]
//! * `prev`   – value at the start of the current tick
//! * `now`    – value after the latest tick
//! * `render` – `lerp(prev, now, α)` for display
//! * `input`  – target when second-order dynamics are enabled

use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use glam::{DAffine2, DVec2, DVec3, DVec4};
use serde::{Serialize, de::DeserializeOwned};

use super::animation::Animation;
use crate::defs::{
    DEFAULT_PROCEDURAL_DAMPING, DEFAULT_PROCEDURAL_FREQ, DEFAULT_PROCEDURAL_RESPONSE,
};
use crate::math::{self, angle_delta, normalize_angle};

/*──────────────────────────── value types ────────────────────────────*/

/// Anything the simulation can interpolate.
///
/// Values are handled component-wise through a fixed `[f64; 5]` view; matrices
/// are decomposed into `(angle, translation, scale)` first.
pub trait Simulated:
    Copy + PartialEq + Default + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Number of meaningful components.
    const LEN: usize;
    /// Component that always holds an angle in degrees.
    const ANGLE_SLOT: Option<usize> = None;

    fn components(&self) -> [f64; 5];
    fn from_components(c: &[f64; 5]) -> Self;
}

impl Simulated for f64 {
    const LEN: usize = 1;
    fn components(&self) -> [f64; 5] {
        [*self, 0.0, 0.0, 0.0, 0.0]
    }
    fn from_components(c: &[f64; 5]) -> Self {
        c[0]
    }
}

impl Simulated for DVec2 {
    const LEN: usize = 2;
    fn components(&self) -> [f64; 5] {
        [self.x, self.y, 0.0, 0.0, 0.0]
    }
    fn from_components(c: &[f64; 5]) -> Self {
        DVec2::new(c[0], c[1])
    }
}

impl Simulated for DVec3 {
    const LEN: usize = 3;
    fn components(&self) -> [f64; 5] {
        [self.x, self.y, self.z, 0.0, 0.0]
    }
    fn from_components(c: &[f64; 5]) -> Self {
        DVec3::new(c[0], c[1], c[2])
    }
}

impl Simulated for DVec4 {
    const LEN: usize = 4;
    fn components(&self) -> [f64; 5] {
        [self.x, self.y, self.z, self.w, 0.0]
    }
    fn from_components(c: &[f64; 5]) -> Self {
        DVec4::new(c[0], c[1], c[2], c[3])
    }
}

impl Simulated for DAffine2 {
    const LEN: usize = 5;
    const ANGLE_SLOT: Option<usize> = Some(0);
    fn components(&self) -> [f64; 5] {
        math::decompose(*self)
    }
    fn from_components(c: &[f64; 5]) -> Self {
        math::compose(c)
    }
}

/*──────────────────────────── handles ────────────────────────────────*/

/// Stable index of a value inside its [`DynamicStore`].
pub struct Dyn<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Dyn<T> {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

impl<T> Clone for Dyn<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Dyn<T> {}
impl<T> PartialEq for Dyn<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<T> Eq for Dyn<T> {}
impl<T> Debug for Dyn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dyn({})", self.index)
    }
}

/*──────────────────────────── procedural ─────────────────────────────*/

/// Second-order dynamics state: `now` chases `input` like a damped spring.
#[derive(Clone, Debug, PartialEq)]
pub struct Procedural {
    pub freq: f64,
    pub damping: f64,
    pub response: f64,
    k1: f64,
    k2: f64,
    k3: f64,
    prev_input: [f64; 5],
    velocity: [f64; 5],
}

impl Default for Procedural {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROCEDURAL_FREQ,
            DEFAULT_PROCEDURAL_DAMPING,
            DEFAULT_PROCEDURAL_RESPONSE,
        )
    }
}

impl Procedural {
    pub fn new(freq: f64, damping: f64, response: f64) -> Self {
        use std::f64::consts::PI;
        let tau = 2.0 * PI * freq;
        Self {
            freq,
            damping,
            response,
            k1: damping / (PI * freq),
            k2: 1.0 / (tau * tau),
            k3: response * damping / tau,
            prev_input: [0.0; 5],
            velocity: [0.0; 5],
        }
    }

    #[inline]
    pub fn constants(&self) -> (f64, f64, f64) {
        (self.k1, self.k2, self.k3)
    }
}

/*──────────────────────────── value ──────────────────────────────────*/

#[derive(Clone, Debug)]
pub struct DynamicValue<T: Simulated> {
    pub spawn: T,
    pub prev: T,
    pub now: T,
    pub render: T,
    pub input: T,
    /// Scalar holds a heading in degrees.
    pub angle: bool,
    /// Skip interpolation, `render` always equals `now`.
    pub no_render_blend: bool,
    pub procedural: Option<Procedural>,
    pub animation: Option<Animation<T>>,
    /// Runs after `render` has been updated.
    pub on_render: Option<fn(&mut DynamicValue<T>, f64)>,
}

impl<T: Simulated> DynamicValue<T> {
    pub fn new(spawn: T) -> Self {
        Self {
            spawn,
            prev: spawn,
            now: spawn,
            render: spawn,
            input: spawn,
            angle: false,
            no_render_blend: false,
            procedural: None,
            animation: None,
            on_render: None,
        }
    }

    pub fn new_angle(spawn: T) -> Self {
        Self {
            angle: true,
            ..Self::new(spawn)
        }
    }

    /// Set every stage to `v`.
    pub fn set_all(&mut self, v: T) {
        self.spawn = v;
        self.reset();
    }

    /// Teleport: every stage but `spawn` becomes `v`.
    pub fn set_now(&mut self, v: T) {
        self.prev = v;
        self.now = v;
        self.render = v;
        self.input = v;
    }

    pub fn reset(&mut self) {
        self.prev = self.spawn;
        self.now = self.spawn;
        self.render = self.spawn;
        self.input = self.spawn;
        if let Some(p) = self.procedural.as_mut() {
            p.prev_input = self.spawn.components();
            p.velocity = [0.0; 5];
        }
    }

    pub fn with_procedural(mut self, p: Procedural) -> Self {
        self.procedural = Some(p);
        self.reset();
        self
    }

    pub fn with_animation(mut self, a: Animation<T>) -> Self {
        self.animation = Some(a);
        self
    }

    #[inline]
    fn is_angle(&self, slot: usize) -> bool {
        (self.angle && slot == 0) || T::ANGLE_SLOT == Some(slot)
    }

    /// Start of tick: remember where we were.
    #[inline]
    pub fn snapshot(&mut self) {
        self.prev = self.now;
    }

    /// Component-wise lerp, angles along the shorter arc.
    pub fn lerp(&self, a: T, b: T, t: f64) -> T {
        if a == b {
            return b;
        }
        let ca = a.components();
        let cb = b.components();
        let mut out = cb;
        for i in 0..T::LEN {
            out[i] = if self.is_angle(i) {
                ca[i] + angle_delta(ca[i], cb[i]) * t.clamp(0.0, 1.0)
            } else {
                math::lerp(ca[i], cb[i], t)
            };
        }
        T::from_components(&out)
    }

    /// Recompute `render` for blend factor `alpha`.
    pub fn blend(&mut self, alpha: f64) {
        self.render = if self.no_render_blend || self.prev == self.now {
            self.now
        } else {
            self.lerp(self.prev, self.now, alpha)
        };
        if let Some(cb) = self.on_render {
            cb(self, alpha);
        }
    }

    /// Advance the tween by one tick.
    pub fn animate(&mut self, dt_ms: f64) {
        let Some(anim) = self.animation.as_mut() else {
            return;
        };
        if let Some(v) = anim.step(dt_ms, self.spawn, self.angle) {
            self.now = v;
        }
    }

    /// Advance second-order dynamics by `dt` seconds.
    pub fn update_procedural(&mut self, dt: f64) {
        let Some(p) = self.procedural.as_mut() else {
            return;
        };
        let mut now = self.now.components();
        let mut input = self.input.components();
        let k2_stable = p
            .k2
            .max(dt * dt / 2.0 + dt * p.k1 / 2.0)
            .max(dt * p.k1);

        for i in 0..T::LEN {
            let angle = (self.angle && i == 0) || T::ANGLE_SLOT == Some(i);
            if angle {
                // keep all three within half a turn of each other
                input[i] = normalize_angle(input[i]);
                p.prev_input[i] = input[i] + angle_delta(input[i], p.prev_input[i]);
                now[i] = input[i] + angle_delta(input[i], now[i]);
            }
            let x = input[i];
            let xd = x - p.prev_input[i];
            now[i] += p.velocity[i] * dt;
            p.velocity[i] += dt * (x + p.k3 * xd - now[i] - p.k1 * p.velocity[i]) / k2_stable;
            p.prev_input[i] = x;
            if angle {
                now[i] = normalize_angle(now[i]);
            }
        }
        self.now = T::from_components(&now);
    }
}

/*──────────────────────────── store ──────────────────────────────────*/

/// Flat slot storage with stable handles and a free list.
#[derive(Clone, Debug)]
pub struct DynamicStore<T: Simulated> {
    slots: Vec<Option<DynamicValue<T>>>,
    free: Vec<u32>,
}

impl<T: Simulated> Default for DynamicStore<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T: Simulated> DynamicStore<T> {
    pub fn insert(&mut self, v: DynamicValue<T>) -> Dyn<T> {
        let index = match self.free.pop() {
            Some(i) => {
                self.slots[i as usize] = Some(v);
                i
            }
            None => {
                self.slots.push(Some(v));
                (self.slots.len() - 1) as u32
            }
        };
        Dyn {
            index,
            _marker: PhantomData,
        }
    }

    /// Register a plain value.
    pub fn spawn(&mut self, v: T) -> Dyn<T> {
        self.insert(DynamicValue::new(v))
    }

    pub fn remove(&mut self, h: Dyn<T>) -> Option<DynamicValue<T>> {
        let slot = self.slots.get_mut(h.index as usize)?;
        let old = slot.take();
        if old.is_some() {
            self.free.push(h.index);
        }
        old
    }

    #[inline]
    pub fn get(&self, h: Dyn<T>) -> Option<&DynamicValue<T>> {
        self.slots.get(h.index as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, h: Dyn<T>) -> Option<&mut DynamicValue<T>> {
        self.slots.get_mut(h.index as usize).and_then(Option::as_mut)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &DynamicValue<T>> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DynamicValue<T>> {
        self.slots.iter_mut().flatten()
    }
}

impl<T: Simulated> Index<Dyn<T>> for DynamicStore<T> {
    type Output = DynamicValue<T>;
    fn index(&self, h: Dyn<T>) -> &DynamicValue<T> {
        match self.get(h) {
            Some(v) => v,
            None => panic!("stale dynamic handle {h:?}"),
        }
    }
}

impl<T: Simulated> IndexMut<Dyn<T>> for DynamicStore<T> {
    fn index_mut(&mut self, h: Dyn<T>) -> &mut DynamicValue<T> {
        match self.get_mut(h) {
            Some(v) => v,
            None => panic!("stale dynamic handle {h:?}"),
        }
    }
}

/// One store per simulated type.
#[derive(Clone, Debug, Default)]
pub struct Dynamics {
    pub scalars: DynamicStore<f64>,
    pub vec2s: DynamicStore<DVec2>,
    pub vec3s: DynamicStore<DVec3>,
    pub vec4s: DynamicStore<DVec4>,
    pub affines: DynamicStore<DAffine2>,
}

macro_rules! each_store {
    ($self:ident, |$s:ident| $body:expr) => {{
        {
            let $s = &mut $self.scalars;
            $body;
        }
        {
            let $s = &mut $self.vec2s;
            $body;
        }
        {
            let $s = &mut $self.vec3s;
            $body;
        }
        {
            let $s = &mut $self.vec4s;
            $body;
        }
        {
            let $s = &mut $self.affines;
            $body;
        }
    }};
}

impl Dynamics {
    pub fn snapshot(&mut self) {
        each_store!(self, |s| s.iter_mut().for_each(DynamicValue::snapshot));
    }

    pub fn animate(&mut self, dt_ms: f64) {
        each_store!(self, |s| s.iter_mut().for_each(|v| v.animate(dt_ms)));
    }

    pub fn update_procedural(&mut self, dt: f64) {
        each_store!(self, |s| s
            .iter_mut()
            .for_each(|v| v.update_procedural(dt)));
    }

    pub fn blend(&mut self, alpha: f64) {
        each_store!(self, |s| s.iter_mut().for_each(|v| v.blend(alpha)));
    }

    pub fn len(&self) -> usize {
        self.scalars.len()
            + self.vec2s.len()
            + self.vec3s.len()
            + self.vec4s.len()
            + self.affines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
