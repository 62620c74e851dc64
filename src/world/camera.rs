use glam::{DVec2, DVec3};

use crate::math::normalize_angle;

/// View-point in world space.
///
/// * Only **yaw** is simulated: no pitch, no roll.
/// * `pos.z` is the absolute eye height.
/// * Angles are degrees, 0 = east, counter-clockwise positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pos: DVec3,
    angle: f64,
    fov: f64,
}

impl Camera {
    pub fn new(pos: DVec3, angle: f64, fov: f64) -> Self {
        Self {
            pos,
            angle: normalize_angle(angle),
            fov,
        }
    }

    #[inline]
    pub fn pos(&self) -> DVec3 {
        self.pos
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    #[inline]
    pub fn fov(&self) -> f64 {
        self.fov
    }

    /// World point into camera space: `.x` lateral (+ right), `.y` depth.
    #[inline]
    pub fn to_cam(&self, p: DVec2) -> DVec2 {
        let d = p - self.pos.truncate();
        DVec2::new(d.dot(self.right()), d.dot(self.forward()))
    }

    /*──────────────────────── derived vectors ───────────────────────*/

    #[inline(always)]
    pub fn forward(&self) -> DVec2 {
        let (s, c) = self.angle.to_radians().sin_cos();
        DVec2::new(c, s)
    }

    #[inline(always)]
    pub fn right(&self) -> DVec2 {
        self.forward().perp() * -1.0
    }

    /*──────────────────────── movement helpers ──────────────────────*/

    pub fn step(&mut self, forward: f64, side: f64) {
        let d = self.forward() * forward + self.right() * side;
        self.pos.x += d.x;
        self.pos.y += d.y;
    }

    /// Positive turns left.
    pub fn turn(&mut self, delta: f64) {
        self.angle = normalize_angle(self.angle + delta);
    }

    /*───────────────── projection helpers ─────────────────*/

    /// Pixels per unit of lateral offset at depth 1 for viewport width `w`.
    ///
    /// ```text
    /// focal = w / (2 * tan(fov/2))
    /// ```
    #[inline]
    pub fn screen_scale(&self, w: usize) -> f64 {
        w as f64 * 0.5 / (self.fov.to_radians() * 0.5).tan()
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_right_are_orthonormal() {
        let cam = Camera::new(DVec3::ZERO, 17.0, 90.0);
        let f = cam.forward();
        let r = cam.right();
        assert!((f.length() - 1.0).abs() < 1e-12);
        assert!((r.length() - 1.0).abs() < 1e-12);
        assert!(f.dot(r).abs() < 1e-12);
    }

    #[test]
    fn screen_scale_at_90_deg() {
        let cam = Camera::new(DVec3::ZERO, 0.0, 90.0);
        assert!((cam.screen_scale(640) - 320.0).abs() < 1e-9);
    }

    #[test]
    fn to_cam_axes_align() {
        let cam = Camera::new(DVec3::ZERO, 0.0, 90.0);
        assert!((cam.to_cam(DVec2::new(10.0, 0.0)) - DVec2::new(0.0, 10.0)).length() < 1e-9);
        // east-facing: the right hand points south
        assert!((cam.to_cam(DVec2::new(0.0, -5.0)) - DVec2::new(5.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn turning_wraps() {
        let mut cam = Camera::new(DVec3::ZERO, 350.0, 90.0);
        cam.turn(20.0);
        assert!((cam.angle() - 10.0).abs() < 1e-9);
        cam.step(10.0, 0.0);
        assert!(cam.pos().y > 0.0);
    }
}
