use egui::{pos2, Pos2, Rect, Vec2};

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 10.0;

/// Button/keyboard zoom steps; no cursor anchoring for these.
const STEP_IN: f32 = 1.25;
const STEP_OUT: f32 = 0.8;

/// Affine mapping from image space to screen space:
/// `(ix, iy) -> (ix*scale + x, iy*scale + y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    /// Image centered in the canvas at scale 1.
    pub fn centered(canvas: Vec2, image: Vec2) -> Self {
        Self {
            x: (canvas.x - image.x) / 2.0,
            y: (canvas.y - image.y) / 2.0,
            scale: 1.0,
        }
    }

    pub fn reset(&mut self, canvas: Vec2, image: Vec2) {
        *self = Self::centered(canvas, image);
    }

    pub fn image_to_screen(&self, p: Pos2) -> Pos2 {
        pos2(p.x * self.scale + self.x, p.y * self.scale + self.y)
    }

    pub fn screen_to_image(&self, p: Pos2) -> Pos2 {
        pos2((p.x - self.x) / self.scale, (p.y - self.y) / self.scale)
    }

    /// Image-space rect mapped to a screen-space rect.
    pub fn rect_to_screen(&self, min: Pos2, max: Pos2) -> Rect {
        Rect::from_min_max(self.image_to_screen(min), self.image_to_screen(max))
    }

    /// Wheel zoom anchored at the cursor: the image-space point under the
    /// cursor stays under the cursor. `delta_y > 0` zooms out.
    pub fn wheel(&mut self, delta_y: f32, cursor: Pos2) {
        let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let ratio = new_scale / self.scale;
        self.x -= (cursor.x - self.x) * (ratio - 1.0);
        self.y -= (cursor.y - self.y) * (ratio - 1.0);
        self.scale = new_scale;
    }

    /// Anchor captured at drag start; feeding it back to [`Self::drag_to`]
    /// makes the pan a plain translation.
    pub fn begin_drag(&self, pos: Pos2) -> Vec2 {
        egui::vec2(pos.x - self.x, pos.y - self.y)
    }

    pub fn drag_to(&mut self, pos: Pos2, anchor: Vec2) {
        self.x = pos.x - anchor.x;
        self.y = pos.y - anchor.y;
    }

    pub fn zoom_in(&mut self) {
        self.scale = (self.scale * STEP_IN).clamp(MIN_SCALE, MAX_SCALE);
    }

    pub fn zoom_out(&mut self) {
        self.scale = (self.scale * STEP_OUT).clamp(MIN_SCALE, MAX_SCALE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::vec2;

    const EPS: f32 = 1e-3;

    fn assert_pos_eq(a: Pos2, b: Pos2) {
        assert!(
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn screen_image_round_trip_across_scales() {
        for scale in [0.1, 0.37, 1.0, 2.5, 10.0] {
            let t = ViewTransform {
                x: -123.0,
                y: 456.0,
                scale,
            };
            for p in [pos2(0.0, 0.0), pos2(17.5, -42.0), pos2(1600.0, 1200.0)] {
                assert_pos_eq(t.screen_to_image(t.image_to_screen(p)), p);
            }
        }
    }

    #[test]
    fn wheel_keeps_cursor_point_fixed() {
        let cases = [
            (ViewTransform::default(), -100.0, pos2(400.0, 300.0)),
            (
                ViewTransform {
                    x: -50.0,
                    y: 75.0,
                    scale: 2.5,
                },
                120.0,
                pos2(33.0, 911.0),
            ),
            (
                ViewTransform {
                    x: 300.0,
                    y: -10.0,
                    scale: 0.4,
                },
                -1.0,
                pos2(0.0, 0.0),
            ),
        ];
        for (mut t, delta_y, cursor) in cases {
            let before = t.screen_to_image(cursor);
            t.wheel(delta_y, cursor);
            assert_pos_eq(t.image_to_screen(before), cursor);
        }
    }

    #[test]
    fn wheel_zoom_in_from_identity() {
        // deltaY=-100 at (400,300) from identity: scale becomes exactly 1.1.
        let mut t = ViewTransform::default();
        t.wheel(-100.0, pos2(400.0, 300.0));
        assert!((t.scale - 1.1).abs() < EPS);
        assert_pos_eq(t.image_to_screen(pos2(400.0, 300.0)), pos2(400.0, 300.0));
    }

    #[test]
    fn wheel_scale_clamps_at_both_ends() {
        let mut t = ViewTransform {
            x: 0.0,
            y: 0.0,
            scale: 9.95,
        };
        for _ in 0..10 {
            t.wheel(-1.0, pos2(100.0, 100.0));
        }
        assert!(t.scale <= MAX_SCALE + EPS);

        let mut t = ViewTransform {
            x: 0.0,
            y: 0.0,
            scale: 0.11,
        };
        for _ in 0..10 {
            t.wheel(1.0, pos2(100.0, 100.0));
        }
        assert!(t.scale >= MIN_SCALE - EPS);
    }

    #[test]
    fn wheel_at_clamp_boundary_does_not_shift_offset() {
        let mut t = ViewTransform {
            x: 40.0,
            y: -20.0,
            scale: MAX_SCALE,
        };
        t.wheel(-1.0, pos2(500.0, 500.0));
        assert!((t.x - 40.0).abs() < EPS && (t.y + 20.0).abs() < EPS);
        assert!((t.scale - MAX_SCALE).abs() < EPS);
    }

    #[test]
    fn reset_centers_image_in_canvas() {
        let mut t = ViewTransform {
            x: 99.0,
            y: 99.0,
            scale: 3.0,
        };
        t.reset(vec2(800.0, 600.0), vec2(1600.0, 1200.0));
        assert_eq!(
            t,
            ViewTransform {
                x: -400.0,
                y: -300.0,
                scale: 1.0
            }
        );
    }

    #[test]
    fn button_zoom_steps_and_clamps() {
        let mut t = ViewTransform::default();
        t.zoom_in();
        assert!((t.scale - 1.25).abs() < EPS);
        t.zoom_out();
        assert!((t.scale - 1.0).abs() < EPS);

        for _ in 0..50 {
            t.zoom_in();
        }
        assert!((t.scale - MAX_SCALE).abs() < EPS);
        for _ in 0..100 {
            t.zoom_out();
        }
        assert!((t.scale - MIN_SCALE).abs() < EPS);
    }

    #[test]
    fn drag_is_plain_translation() {
        let mut t = ViewTransform {
            x: 10.0,
            y: 20.0,
            scale: 2.0,
        };
        let anchor = t.begin_drag(pos2(100.0, 100.0));
        t.drag_to(pos2(130.0, 90.0), anchor);
        assert!((t.x - 40.0).abs() < EPS);
        assert!((t.y - 10.0).abs() < EPS);
        // scale untouched by panning
        assert!((t.scale - 2.0).abs() < EPS);
    }
}
