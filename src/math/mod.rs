//! Small numeric helpers on top of glam's `f64` types.
//!
//! Vectors are `DVec2/DVec3/DVec4`, 2D transforms are `DAffine2`.

mod angle;
mod tween;

pub use angle::{angle_delta, min_angle_distance, normalize_angle, tween_angles};
pub use tween::Tween;

use glam::{DAffine2, DVec2, DVec3, DVec4};

pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;
pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;

/// Clamped linear interpolation.
#[inline]
pub fn lerp(start: f64, end: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return start;
    }
    if t >= 1.0 {
        return end;
    }
    start * (1.0 - t) + end * t
}

/// 2D cross product (z of the 3D cross).
#[inline(always)]
pub fn cross2(a: DVec2, b: DVec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Split an affine transform into `[angle°, tx, ty, sx, sy]`.
pub fn decompose(m: DAffine2) -> [f64; 5] {
    let (scale, angle, translation) = m.to_scale_angle_translation();
    [angle * RAD2DEG, translation.x, translation.y, scale.x, scale.y]
}

/// Inverse of [`decompose`].
pub fn compose(c: &[f64; 5]) -> DAffine2 {
    DAffine2::from_scale_angle_translation(
        DVec2::new(c[3], c[4]),
        c[0] * DEG2RAD,
        DVec2::new(c[1], c[2]),
    )
}

/// Pack a 0‥1 colour into `0x00RRGGBB`.
#[inline]
pub fn pack_rgb(c: DVec4) -> u32 {
    let r = (c.x.clamp(0.0, 1.0) * 255.0) as u32;
    let g = (c.y.clamp(0.0, 1.0) * 255.0) as u32;
    let b = (c.z.clamp(0.0, 1.0) * 255.0) as u32;
    (r << 16) | (g << 8) | b
}

/// Unpack `0x00RRGGBB` into a 0‥1 colour with full alpha.
#[inline]
pub fn unpack_rgb(px: u32) -> DVec4 {
    DVec4::new(
        ((px >> 16) & 0xFF) as f64 / 255.0,
        ((px >> 8) & 0xFF) as f64 / 255.0,
        (px & 0xFF) as f64 / 255.0,
        1.0,
    )
}

/// Blend `tint` (alpha in `w`) over an opaque pixel.
#[inline]
pub fn blend_tint(px: u32, tint: DVec4) -> u32 {
    let a = tint.w.clamp(0.0, 1.0);
    if a <= 0.0 {
        return px;
    }
    let base = unpack_rgb(px);
    let rgb = base.truncate() * (1.0 - a) + tint.truncate() * a;
    pack_rgb(rgb.extend(1.0))
}

/// Distance from `p` to the infinite line through `a`,`b` (signed, left positive).
#[inline]
pub fn line_distance(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    let d = b - a;
    let len = d.length();
    if len == 0.0 {
        return (p - a).length();
    }
    cross2(d, p - a) / len
}

/// `v` with its horizontal part replaced.
#[inline]
pub fn with_xy(v: DVec3, xy: DVec2) -> DVec3 {
    DVec3::new(xy.x, xy.y, v.z)
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
