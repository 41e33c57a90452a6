//! Bresenham-family rasterizers. Points outside the image are skipped.

use hdri_math::Sphere;

use crate::hdr_image::HdrImage;

impl HdrImage {
    #[inline]
    fn plot(&mut self, x: i64, y: i64, rgb: [f32; 3]) {
        if x >= 0 && y >= 0 && (x as usize) < self.width() && (y as usize) < self.height() {
            self.set_pixel(x as usize, y as usize, rgb);
        }
    }

    fn include_color(&mut self, rgb: [f32; 3]) {
        let lo = rgb[0].min(rgb[1]).min(rgb[2]);
        let hi = rgb[0].max(rgb[1]).max(rgb[2]);
        let (min, max) = (self.min_channel().min(lo), self.max_channel().max(hi));
        self.set_channel_bounds(min, max);
    }

    /// Draw a line from (x1, y1) to (x2, y2), both ends included.
    pub fn line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, rgb: [f32; 3]) {
        if self.is_empty() {
            return;
        }
        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x1, y1);

        loop {
            self.plot(x, y, rgb);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
        self.include_color(rgb);
    }

    /// Draw the outline of `sphere`'s disc (midpoint circle).
    pub fn circle(&mut self, sphere: &Sphere, rgb: [f32; 3]) {
        if self.is_empty() {
            return;
        }
        let cx = sphere.center().x as i64;
        let cy = sphere.center().y as i64;
        let mut x = sphere.radius() as i64;
        let mut y = 0i64;
        let mut decision = 1 - x;

        while x >= y {
            for (px, py) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
                self.plot(cx + px, cy + py, rgb);
            }
            y += 1;
            if decision <= 0 {
                decision += 2 * y + 1;
            } else {
                x -= 1;
                decision += 2 * (y - x) + 1;
            }
        }
        self.include_color(rgb);
    }

    /// Fill every pixel with `dx² + dy² <= r²` around `sphere`'s center.
    pub fn circle_filled(&mut self, sphere: &Sphere, rgb: [f32; 3]) {
        if self.is_empty() {
            return;
        }
        let cx = sphere.center().x as i64;
        let cy = sphere.center().y as i64;
        let r = sphere.radius() as i64;
        let y_range = (cy - r).max(0)..=(cy + r).min(self.height() as i64 - 1);
        let x_range = (cx - r).max(0)..=(cx + r).min(self.width() as i64 - 1);

        for y in y_range {
            for x in x_range.clone() {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= r * r {
                    self.plot(x, y, rgb);
                }
            }
        }
        self.include_color(rgb);
    }
}
