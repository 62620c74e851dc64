use super::{DEG2RAD, RAD2DEG, Tween};

/// Wrap an angle into `[0, 360)`.
#[inline]
pub fn normalize_angle(a: f64) -> f64 {
    let r = a.rem_euclid(360.0);
    if r >= 360.0 { 0.0 } else { r }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
#[inline]
pub fn angle_delta(from: f64, to: f64) -> f64 {
    let d = (to - from).rem_euclid(360.0);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Shift `b` by whole turns so that it lies within 180° of `a`.
#[inline]
pub fn min_angle_distance(a: f64, b: f64) -> f64 {
    a + angle_delta(a, b)
}

/// Tween two headings through cartesian space so the blend takes the short way.
pub fn tween_angles(start: f64, end: f64, t: f64, f: Tween) -> f64 {
    let (y1, x1) = (start * DEG2RAD).sin_cos();
    let (y2, x2) = (end * DEG2RAD).sin_cos();
    let x = f.apply(x1, x2, t);
    let y = f.apply(y1, y2, t);
    normalize_angle(y.atan2(x) * RAD2DEG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_into_range() {
        assert!((normalize_angle(-90.0) - 270.0).abs() < 1e-12);
        assert!((normalize_angle(725.0) - 5.0).abs() < 1e-12);
        assert_eq!(normalize_angle(360.0), 0.0);
    }

    #[test]
    fn shortest_delta_wraps() {
        assert!((angle_delta(350.0, 10.0) - 20.0).abs() < 1e-12);
        assert!((angle_delta(10.0, 350.0) + 20.0).abs() < 1e-12);
        assert!((min_angle_distance(350.0, 10.0) - 370.0).abs() < 1e-12);
    }

    #[test]
    fn angle_tween_crosses_zero() {
        let mid = tween_angles(350.0, 10.0, 0.5, Tween::Lerp);
        assert!(mid < 1e-9 || (360.0 - mid) < 1e-9);
    }
}
