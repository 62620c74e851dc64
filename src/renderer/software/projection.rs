use glam::DVec2;

/// Per-resolution lookup tables shared read-only by every strip.
///
/// Ray angles are quantised to `fov / width` degrees so a column's direction is
/// a table lookup: `trig_count = width * 360 / fov` entries cover the circle.
#[derive(Default)]
pub struct Tables {
    pub width: usize,
    pub height: usize,
    pub fov: f64,
    pub trig_count: usize,
    pub sin: Vec<f64>,
    pub cos: Vec<f64>,
    /// Projection-plane correction: `focal / cos(column offset)`.
    pub view_fix: Vec<f64>,
    /// Distance from the eye to the projection plane, in pixels.
    pub focal: f64,
}

impl Tables {
    pub fn new(width: usize, height: usize, fov: f64) -> Self {
        let w = width.max(1);
        let trig_count = ((w as f64 * 360.0 / fov).round() as usize).max(1);
        let step = 360.0 / trig_count as f64;
        let (sin, cos) = (0..trig_count)
            .map(|i| (i as f64 * step).to_radians().sin_cos())
            .unzip();

        let focal = w as f64 * 0.5 / (fov.to_radians() * 0.5).tan();
        let view_fix = (0..w)
            .map(|x| focal / Self::column_offset(w, fov, x).to_radians().cos())
            .collect();

        Self {
            width: w,
            height,
            fov,
            trig_count,
            sin,
            cos,
            view_fix,
            focal,
        }
    }

    #[inline]
    pub fn matches(&self, width: usize, height: usize, fov: f64) -> bool {
        self.width == width && self.height == height && self.fov == fov
    }

    /// Degrees column `x` is turned from the view direction; left is positive.
    #[inline]
    fn column_offset(width: usize, fov: f64, x: usize) -> f64 {
        (width as f64 * 0.5 - x as f64) * fov / width as f64
    }

    /// Trig-table slot of the ray through column `x` for a view facing `angle`.
    #[inline]
    pub fn ray_index(&self, angle: f64, x: usize) -> usize {
        let tc = self.trig_count as i64;
        let base = (angle * self.trig_count as f64 / 360.0).round() as i64;
        (base + (self.width / 2) as i64 - x as i64).rem_euclid(tc) as usize
    }

    /// Unit direction and angle (degrees) of the ray through column `x`.
    #[inline]
    pub fn ray(&self, angle: f64, x: usize) -> (DVec2, f64) {
        let i = self.ray_index(angle, x);
        let deg = i as f64 * 360.0 / self.trig_count as f64;
        (DVec2::new(self.cos[i], self.sin[i]), deg)
    }

    /// Screen-space height of a world height difference `dz` seen at `dist`.
    #[inline]
    pub fn project(&self, x: usize, dz: f64, dist: f64) -> f64 {
        dz * self.view_fix[x] / dist
    }

    /// Row a world height difference `dz` lands on at `dist`.
    #[inline]
    pub fn screen_y(&self, x: usize, dz: f64, dist: f64) -> i64 {
        (self.height / 2) as i64 - self.project(x, dz, dist).floor() as i64
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
