//! Start→end tweens attached to a dynamic value.

use serde::{Deserialize, Serialize};

use super::dynamic::Simulated;
use crate::defs::DEFAULT_ANIMATION_DURATION_MS;
use crate::math::{Tween, tween_angles};

/// What happens when an animation reaches its end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifetime {
    Once,
    Loop,
    BounceOnce,
    #[default]
    Bounce,
}

/// Whether tweened values are offsets from the spawn value or absolute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coordinates {
    #[default]
    Relative,
    Absolute,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    default,
    rename_all = "PascalCase",
    bound(deserialize = "T: Simulated")
)]
pub struct Animation<T> {
    pub start: T,
    pub end: T,
    /// Milliseconds for one pass.
    pub duration: f64,
    pub active: bool,
    pub reverse: bool,
    pub lifetime: Lifetime,
    pub coordinates: Coordinates,
    #[serde(rename = "TweeningFunc")]
    pub tween: Tween,
    pub percent: f64,
}

impl<T: Simulated> Default for Animation<T> {
    fn default() -> Self {
        Self {
            start: T::default(),
            end: T::default(),
            duration: DEFAULT_ANIMATION_DURATION_MS,
            active: true,
            reverse: false,
            lifetime: Lifetime::default(),
            coordinates: Coordinates::default(),
            tween: Tween::default(),
            percent: 0.0,
        }
    }
}

impl<T: Simulated> Animation<T> {
    pub fn new(start: T, end: T, duration: f64) -> Self {
        Self {
            start,
            end,
            duration,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.percent = if self.reverse { 1.0 } else { 0.0 };
    }

    /// Advance by `dt_ms` and return the new value, or `None` when inactive.
    pub(crate) fn step(&mut self, dt_ms: f64, spawn: T, angle: bool) -> Option<T> {
        if !self.active || self.duration <= 0.0 {
            return None;
        }
        let delta = dt_ms / self.duration;
        self.percent = if self.reverse {
            self.percent - delta
        } else {
            self.percent + delta
        }
        .clamp(0.0, 1.0);

        let mut t = self.percent;
        if matches!(self.lifetime, Lifetime::Bounce | Lifetime::BounceOnce) {
            t *= 2.0;
            if t > 1.0 {
                t = 2.0 - t;
            }
        }

        let s = self.start.components();
        let e = self.end.components();
        let base = spawn.components();
        let mut out = [0.0; 5];
        for i in 0..T::LEN {
            let is_angle = (angle && i == 0) || T::ANGLE_SLOT == Some(i);
            out[i] = if is_angle {
                tween_angles(s[i], e[i], t, self.tween)
            } else {
                self.tween.apply(s[i], e[i], t)
            };
            if self.coordinates == Coordinates::Relative {
                out[i] += base[i];
            }
        }

        let finished = (self.percent >= 1.0 && !self.reverse) || (self.percent <= 0.0 && self.reverse);
        if finished {
            match self.lifetime {
                Lifetime::Once | Lifetime::BounceOnce => self.active = false,
                Lifetime::Bounce => self.reverse = !self.reverse,
                Lifetime::Loop => self.reset(),
            }
        }
        Some(T::from_components(&out))
    }
}
