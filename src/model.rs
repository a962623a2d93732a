use serde::Deserialize;

// ── Bounding boxes ──────────────────────────────────────────────────────────

/// Axis-aligned box in original image-pixel space, never screen space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn checked(x: f32, y: f32, width: f32, height: f32) -> Option<Self> {
        let finite = [x, y, width, height].iter().all(|v| v.is_finite());
        if finite && width > 0.0 && height > 0.0 {
            Some(Self {
                x,
                y,
                width,
                height,
            })
        } else {
            None
        }
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

/// Box shapes as they arrive from detection payloads. Normalized to
/// [`BoundingBox`] exactly once, at ingestion; nothing downstream ever
/// branches on the source shape.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawBBox {
    Corners([f32; 4]),
    Canonical {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl RawBBox {
    fn normalize(self) -> Option<BoundingBox> {
        match self {
            RawBBox::Corners([x1, y1, x2, y2]) => BoundingBox::checked(
                x1.min(x2),
                y1.min(y2),
                (x2 - x1).abs(),
                (y2 - y1).abs(),
            ),
            RawBBox::Canonical {
                x,
                y,
                width,
                height,
            } => BoundingBox::checked(x, y, width, height),
        }
    }
}

// ── Scene data ──────────────────────────────────────────────────────────────

/// Where an object's segmentation raster comes from. Inline base64 payloads
/// are preferred over keyed fetches when both are present.
#[derive(Clone, Debug, PartialEq)]
pub enum MaskRef {
    Inline(String),
    Key(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(from = "RawSceneObject")]
pub struct SceneObject {
    pub id: String,
    pub label: String,
    /// 0.0..=1.0
    pub confidence: f32,
    /// `None` when the source carried no box or a malformed one; such an
    /// object is excluded from drawing and hit-testing, never an error.
    pub bbox: Option<BoundingBox>,
    pub mask: Option<MaskRef>,
}

#[derive(Deserialize)]
struct RawSceneObject {
    id: String,
    label: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    bbox: Option<RawBBox>,
    #[serde(default)]
    bbox_x: Option<f32>,
    #[serde(default)]
    bbox_y: Option<f32>,
    #[serde(default, alias = "bbox_width")]
    bbox_w: Option<f32>,
    #[serde(default, alias = "bbox_height")]
    bbox_h: Option<f32>,
    #[serde(default)]
    mask: Option<String>,
    #[serde(default)]
    mask_key: Option<String>,
}

impl From<RawSceneObject> for SceneObject {
    fn from(raw: RawSceneObject) -> Self {
        let bbox = match (raw.bbox, raw.bbox_x, raw.bbox_y, raw.bbox_w, raw.bbox_h) {
            (Some(b), ..) => b.normalize(),
            (None, Some(x), Some(y), Some(w), Some(h)) => BoundingBox::checked(x, y, w, h),
            _ => None,
        };
        let mask = match (raw.mask, raw.mask_key) {
            (Some(data), _) => Some(MaskRef::Inline(data)),
            (None, Some(key)) => Some(MaskRef::Key(key)),
            (None, None) => None,
        };
        Self {
            id: raw.id,
            label: raw.label,
            confidence: raw.confidence,
            bbox,
            mask,
        }
    }
}

/// Immutable during a render session.
#[derive(Clone, Debug, Deserialize)]
pub struct Scene {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub image_url: String,
    /// Origin for the mask endpoint; derived from `image_url` when absent.
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

// ── Hit testing ─────────────────────────────────────────────────────────────

/// First object in array order whose bbox contains the image-space point.
/// The tie-break on overlap is first-indexed, not topmost or smallest-area;
/// this matches the observed behavior and is kept as-is.
pub fn hit_test(point: egui::Pos2, objects: &[SceneObject]) -> Option<&SceneObject> {
    objects
        .iter()
        .find(|o| o.bbox.is_some_and(|b| b.contains(point.x, point.y)))
}

// ── Interaction state ───────────────────────────────────────────────────────

/// Whether an object is under an external approve/reject action. Entering
/// `Reviewing` starts the continuous pulse redraw; leaving it stops it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ReviewState {
    #[default]
    Idle,
    Reviewing {
        object_id: String,
    },
}

impl ReviewState {
    pub fn set(&mut self, id: Option<String>) {
        let next = match id {
            Some(object_id) => ReviewState::Reviewing { object_id },
            None => ReviewState::Idle,
        };
        if next != *self {
            match &next {
                ReviewState::Reviewing { object_id } => {
                    log::debug!("review started for object {object_id}")
                }
                ReviewState::Idle => log::debug!("review cleared"),
            }
            *self = next;
        }
    }

    pub fn object_id(&self) -> Option<&str> {
        match self {
            ReviewState::Reviewing { object_id } => Some(object_id),
            ReviewState::Idle => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReviewState::Reviewing { .. })
    }
}

/// Transient per-session state; resets whenever the active scene changes.
#[derive(Debug, Default)]
pub struct InteractionState {
    pub hovered: Option<String>,
    pub selected: Option<String>,
    pub review: ReviewState,
    pub is_dragging: bool,
}
