use std::collections::HashMap;

use egui::{
    pos2, vec2, Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke, StrokeKind,
    TextureHandle,
};

use crate::model::SceneObject;
use crate::transform::ViewTransform;

/// Seven fixed hues assigned by object index; stable as long as the object
/// array order is stable for a scene.
pub const OBJECT_COLORS: [Color32; 7] = [
    Color32::from_rgb(0xff, 0x3b, 0x30), // red
    Color32::from_rgb(0xff, 0x95, 0x00), // orange
    Color32::from_rgb(0xff, 0xcc, 0x00), // yellow
    Color32::from_rgb(0x34, 0xc7, 0x59), // green
    Color32::from_rgb(0x00, 0xc7, 0xbe), // teal
    Color32::from_rgb(0x00, 0x7a, 0xff), // blue
    Color32::from_rgb(0xaf, 0x52, 0xde), // purple
];

/// Accent for the reviewing highlight.
const REVIEW_ACCENT: Color32 = Color32::from_rgb(0xff, 0xc1, 0x07);

const LABEL_FONT: f32 = 12.0;

fn uv_full() -> Rect {
    Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0))
}

pub fn object_color(index: usize) -> Color32 {
    OBJECT_COLORS[index % OBJECT_COLORS.len()]
}

/// Alpha of the reviewing pulse at `now` seconds; oscillates with a ~1.9s
/// period and is clamped to non-negative before painting.
pub fn pulse_alpha(now: f64) -> f32 {
    0.3 + 0.4 * (now / 0.3).sin() as f32
}

pub fn label_text(obj: &SceneObject) -> String {
    format!("{} ({:.0}%)", obj.label, obj.confidence * 100.0)
}

/// Everything the painter reads for one frame. The caller commits all state
/// mutations before invoking the draw, so a frame never observes a torn mix.
pub struct FrameState<'a> {
    pub objects: &'a [SceneObject],
    pub transform: &'a ViewTransform,
    pub show_objects: bool,
    pub show_masks: bool,
    pub hovered: Option<&'a str>,
    pub selected: Option<&'a str>,
    pub reviewing: Option<&'a str>,
    pub image_failed: bool,
    /// Seconds; drives the reviewing pulse.
    pub now: f64,
}

pub fn draw_scene(
    painter: &Painter,
    canvas: Rect,
    image: Option<&TextureHandle>,
    masks: &HashMap<String, TextureHandle>,
    frame: &FrameState,
) {
    painter.rect_filled(canvas, 0.0, Color32::from_gray(30));

    match image {
        Some(tex) => {
            let size = tex.size_vec2();
            let rect = frame
                .transform
                .rect_to_screen(Pos2::ZERO, pos2(size.x, size.y));
            painter.image(tex.id(), rect, uv_full(), Color32::WHITE);
        }
        None => {
            let message = if frame.image_failed {
                "image failed to load"
            } else {
                "loading image…"
            };
            painter.text(
                canvas.center(),
                Align2::CENTER_CENTER,
                message,
                FontId::proportional(14.0),
                Color32::from_gray(140),
            );
            // boxes and masks are meaningless without the base image
            draw_zoom_readout(painter, canvas, frame.transform);
            return;
        }
    }

    if frame.show_masks {
        draw_masks(painter, masks, frame);
    }
    if frame.show_objects {
        draw_boxes(painter, frame);
    }
    draw_zoom_readout(painter, canvas, frame.transform);
}

fn bbox_rect(obj: &SceneObject, transform: &ViewTransform) -> Option<Rect> {
    obj.bbox.map(|b| {
        transform.rect_to_screen(pos2(b.x, b.y), pos2(b.x + b.width, b.y + b.height))
    })
}

fn draw_masks(painter: &Painter, masks: &HashMap<String, TextureHandle>, frame: &FrameState) {
    for (i, obj) in frame.objects.iter().enumerate() {
        let (Some(rect), Some(tex)) = (bbox_rect(obj, frame.transform), masks.get(&obj.id))
        else {
            continue;
        };
        let alpha = if frame.selected == Some(obj.id.as_str()) {
            0.7
        } else {
            0.4
        };
        // coverage rasters are white with the mask in the alpha channel, so
        // the tint produces a flat color limited to mask pixels
        painter.image(tex.id(), rect, uv_full(), object_color(i).gamma_multiply(alpha));
    }
}

fn draw_boxes(painter: &Painter, frame: &FrameState) {
    for (i, obj) in frame.objects.iter().enumerate() {
        let Some(rect) = bbox_rect(obj, frame.transform) else {
            continue;
        };
        let color = object_color(i);

        if frame.reviewing == Some(obj.id.as_str()) {
            let glow = rect.expand(5.0);
            painter.rect_filled(
                glow,
                2.0,
                REVIEW_ACCENT.gamma_multiply(pulse_alpha(frame.now).max(0.0)),
            );
            let corners = [
                glow.left_top(),
                glow.right_top(),
                glow.right_bottom(),
                glow.left_bottom(),
                glow.left_top(),
            ];
            painter.extend(Shape::dashed_line(
                &corners,
                Stroke::new(4.0, REVIEW_ACCENT),
                12.0,
                8.0,
            ));
        } else {
            let selected = frame.selected == Some(obj.id.as_str());
            let alpha = if selected {
                1.0
            } else if frame.hovered == Some(obj.id.as_str()) {
                0.9
            } else {
                0.7
            };
            let width = if selected { 3.0 } else { 2.0 };
            painter.rect_stroke(
                rect,
                0.0,
                Stroke::new(width, color.gamma_multiply(alpha)),
                StrokeKind::Middle,
            );
        }

        draw_label(painter, rect, obj, color);
    }
}

/// Label with a filled background in the object color; screen-space, so its
/// size stays visually constant under zoom.
fn draw_label(painter: &Painter, rect: Rect, obj: &SceneObject, color: Color32) {
    let galley = painter.layout_no_wrap(
        label_text(obj),
        FontId::proportional(LABEL_FONT),
        Color32::WHITE,
    );
    let bg = Rect::from_min_size(
        rect.left_top() - vec2(0.0, galley.size().y + 6.0),
        galley.size() + vec2(8.0, 4.0),
    );
    painter.rect_filled(bg, 2.0, color);
    painter.galley(bg.min + vec2(4.0, 2.0), galley, Color32::WHITE);
}

/// Fixed-position readout; untransformed, always bottom-right of the canvas.
fn draw_zoom_readout(painter: &Painter, canvas: Rect, transform: &ViewTransform) {
    let galley = painter.layout_no_wrap(
        format!("{:.0}%", transform.scale * 100.0),
        FontId::monospace(12.0),
        Color32::from_gray(220),
    );
    let pos = canvas.right_bottom() - galley.size() - vec2(10.0, 8.0);
    let bg = Rect::from_min_size(pos, galley.size()).expand(4.0);
    painter.rect_filled(bg, 3.0, Color32::from_black_alpha(120));
    painter.galley(pos, galley, Color32::from_gray(220));
}
