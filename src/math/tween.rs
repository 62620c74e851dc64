use serde::{Deserialize, Serialize};

use super::lerp;

/// Easing curves for animations. Serialized by name (`"EaseIn2"`, …).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tween {
    #[default]
    Lerp,
    EaseIn2,
    EaseIn3,
    EaseIn4,
    EaseOut2,
    EaseOut3,
    EaseOut4,
    EaseInOut2,
    EaseInOut3,
    EaseInOut4,
    Spike,
    Spike2,
    Spike3,
    Spike4,
    ElasticIn,
    ElasticOut,
    ElasticInOut,
}

impl Tween {
    pub fn apply(self, start: f64, end: f64, t: f64) -> f64 {
        use Tween::*;
        match self {
            Lerp => lerp(start, end, t),
            EaseIn2 => lerp(start, end, t * t),
            EaseIn3 => lerp(start, end, t * t * t),
            EaseIn4 => lerp(start, end, t * t * t * t),
            EaseOut2 => lerp(start, end, 1.0 - (1.0 - t).powi(2)),
            EaseOut3 => lerp(start, end, 1.0 - (1.0 - t).powi(3)),
            EaseOut4 => lerp(start, end, 1.0 - (1.0 - t).powi(4)),
            EaseInOut2 => lerp(start, end, in_out(t, 2)),
            EaseInOut3 => lerp(start, end, in_out(t, 3)),
            EaseInOut4 => lerp(start, end, in_out(t, 4)),
            Spike => spike(Lerp, start, end, t),
            Spike2 => spike(EaseIn2, start, end, t),
            Spike3 => spike(EaseIn3, start, end, t),
            Spike4 => spike(EaseIn4, start, end, t),
            ElasticIn | ElasticOut | ElasticInOut => {
                if t <= 0.0 {
                    return start;
                }
                if t >= 1.0 {
                    return end;
                }
                let k = elastic(self, t);
                start * (1.0 - k) + end * k
            }
        }
    }
}

fn in_out(t: f64, power: i32) -> f64 {
    if t < 0.5 {
        2f64.powi(power - 1) * t.powi(power)
    } else {
        1.0 - (-2.0 * t + 2.0).powi(power) * 0.5
    }
}

fn spike(f: Tween, start: f64, end: f64, t: f64) -> f64 {
    if t <= 0.5 {
        f.apply(start, end, t * 2.0)
    } else {
        f.apply(start, end, (1.0 - t) * 2.0)
    }
}

// Elastic curves overshoot, so they bypass the clamped lerp.
fn elastic(kind: Tween, t: f64) -> f64 {
    use std::f64::consts::PI;
    let c4 = 2.0 * PI / 3.0;
    let c5 = 2.0 * PI / 4.5;
    match kind {
        Tween::ElasticIn => -(2f64.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * c4).sin(),
        Tween::ElasticOut => 2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0,
        _ if t < 0.5 => -(2f64.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * c5).sin()) / 2.0,
        _ => (2f64.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * c5).sin()) / 2.0 + 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Tween::Lerp)]
    #[case(Tween::EaseIn3)]
    #[case(Tween::EaseOut2)]
    #[case(Tween::EaseInOut4)]
    #[case(Tween::ElasticIn)]
    #[case(Tween::ElasticOut)]
    #[case(Tween::ElasticInOut)]
    fn endpoints_are_exact(#[case] f: Tween) {
        assert!((f.apply(3.0, 9.0, 0.0) - 3.0).abs() < 1e-9);
        assert!((f.apply(3.0, 9.0, 1.0) - 9.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(Tween::Spike)]
    #[case(Tween::Spike2)]
    #[case(Tween::Spike4)]
    fn spikes_return_home(#[case] f: Tween) {
        assert!((f.apply(0.0, 1.0, 0.5) - 1.0).abs() < 1e-9);
        assert!(f.apply(0.0, 1.0, 1.0).abs() < 1e-9);
    }

    #[test]
    fn in_out_is_symmetric() {
        let a = Tween::EaseInOut2.apply(0.0, 1.0, 0.25);
        let b = Tween::EaseInOut2.apply(0.0, 1.0, 0.75);
        assert!((a + b - 1.0).abs() < 1e-9);
        assert!((Tween::EaseInOut3.apply(0.0, 1.0, 0.5) - 0.5).abs() < 1e-9);
    }
}
