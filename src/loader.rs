use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::RgbaImage;
use thiserror::Error;

use crate::model::{MaskRef, Scene, SceneObject};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// All asset failures are non-fatal: one object's asset failure never blocks
/// rendering or interaction for any other object.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("bad inline mask payload: {0}")]
    MaskPayload(#[from] base64::DecodeError),
}

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("could not read scene file: {0}")]
    Io(#[from] std::io::Error),
    #[error("scene request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("scene payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Posted from worker threads back to the UI thread.
pub enum LoaderEvent {
    ImageReady(egui::ColorImage),
    ImageFailed,
    MaskReady {
        object_id: String,
        coverage: egui::ColorImage,
    },
    MaskFailed {
        object_id: String,
    },
}

// ── URL helpers ─────────────────────────────────────────────────────────────

pub fn is_remote(url: &str) -> bool {
    url.contains("://")
}

/// Route a URL through the CORS-enabling proxy.
pub fn proxied_url(url: &str) -> String {
    if url.contains('?') {
        format!("{url}&proxy=true")
    } else {
        format!("{url}?proxy=true")
    }
}

pub fn mask_url(api_base: &str, key: &str) -> String {
    format!(
        "{}/api/v1/images/mask/{key}?proxy=true",
        api_base.trim_end_matches('/')
    )
}

/// `scheme://host[:port]` of a URL, for deriving the mask endpoint origin.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let mut origin = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        origin.push_str(&format!(":{port}"));
    }
    Some(origin)
}

// ── Fetching & decoding ─────────────────────────────────────────────────────

fn client() -> Result<reqwest::blocking::Client, AssetError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()?)
}

fn fetch_bytes(client: &reqwest::blocking::Client, url: &str) -> Result<Vec<u8>, AssetError> {
    let response = client.get(url).send()?.error_for_status()?;
    Ok(response.bytes()?.to_vec())
}

fn to_color_image(rgba: &RgbaImage) -> egui::ColorImage {
    let size = [rgba.width() as usize, rgba.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_flat_samples().as_slice())
}

fn fetch_image(client: &reqwest::blocking::Client, url: &str) -> Result<egui::ColorImage, AssetError> {
    let bytes = fetch_bytes(client, url)?;
    Ok(to_color_image(&image::load_from_memory(&bytes)?.to_rgba8()))
}

/// Base image load. Remote URLs go through the proxy first; on failure the
/// raw URL is retried once. A second failure is terminal for the session.
fn load_image(url: &str) -> Result<egui::ColorImage, AssetError> {
    if !is_remote(url) {
        return Ok(to_color_image(&image::open(url)?.to_rgba8()));
    }
    let client = client()?;
    match fetch_image(&client, &proxied_url(url)) {
        Ok(img) => Ok(img),
        Err(err) => {
            log::warn!("proxied image fetch failed ({err}), retrying direct");
            fetch_image(&client, url)
        }
    }
}

/// Inline mask payloads arrive as raw base64 or a full `data:` URI.
pub fn decode_inline_mask(payload: &str) -> Result<RgbaImage, AssetError> {
    let raw = payload
        .rsplit_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(payload);
    let bytes = BASE64.decode(raw.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

/// Collapse a mask raster to a white coverage image the painter can tint
/// with the object color in a single draw. Masks either carry an alpha
/// channel or encode coverage as luminance.
pub fn coverage_image(mask: &RgbaImage) -> egui::ColorImage {
    let has_alpha = mask.pixels().any(|p| p.0[3] < 255);
    let size = [mask.width() as usize, mask.height() as usize];
    let mut out = egui::ColorImage::new(size, egui::Color32::TRANSPARENT);
    for (i, p) in mask.pixels().enumerate() {
        let [r, g, b, a] = p.0;
        let coverage = if has_alpha {
            a
        } else {
            (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8
        };
        out.pixels[i] = egui::Color32::from_rgba_unmultiplied(255, 255, 255, coverage);
    }
    out
}

fn load_mask(api_base: &str, mask: &MaskRef) -> Result<egui::ColorImage, AssetError> {
    let rgba = match mask {
        MaskRef::Inline(payload) => decode_inline_mask(payload)?,
        MaskRef::Key(key) => {
            let bytes = fetch_bytes(&client()?, &mask_url(api_base, key))?;
            image::load_from_memory(&bytes)?.to_rgba8()
        }
    };
    Ok(coverage_image(&rgba))
}

// ── Workers ─────────────────────────────────────────────────────────────────

/// One worker for the base image. Pings the UI so the result shows up
/// without waiting for the next input event.
pub fn spawn_image_load(ctx: egui::Context, tx: Sender<LoaderEvent>, url: String) {
    thread::spawn(move || {
        let event = match load_image(&url) {
            Ok(img) => {
                log::info!("base image loaded: {url}");
                LoaderEvent::ImageReady(img)
            }
            Err(err) => {
                log::error!("base image failed to load ({url}): {err}");
                LoaderEvent::ImageFailed
            }
        };
        if tx.send(event).is_ok() {
            ctx.request_repaint();
        }
    });
}

/// One worker per object carrying mask data; each load is independent and a
/// failure only costs that object its mask.
pub fn spawn_mask_loads(
    ctx: egui::Context,
    tx: Sender<LoaderEvent>,
    api_base: String,
    objects: &[SceneObject],
) {
    for obj in objects {
        let Some(mask) = obj.mask.clone() else {
            continue;
        };
        let object_id = obj.id.clone();
        let api_base = api_base.clone();
        let ctx = ctx.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let event = match load_mask(&api_base, &mask) {
                Ok(coverage) => LoaderEvent::MaskReady {
                    object_id,
                    coverage,
                },
                Err(err) => {
                    log::warn!("mask load failed for object {object_id}: {err}");
                    LoaderEvent::MaskFailed { object_id }
                }
            };
            if tx.send(event).is_ok() {
                ctx.request_repaint();
            }
        });
    }
}

/// Scene bootstrap: a local JSON file or a direct GET.
pub fn load_scene(source: &str) -> Result<Scene, SceneLoadError> {
    let data = if is_remote(source) {
        reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?
            .get(source)
            .send()?
            .error_for_status()?
            .text()?
    } else {
        std::fs::read_to_string(source)?
    };
    Ok(serde_json::from_str(&data)?)
}

// ── CPU-side asset store ────────────────────────────────────────────────────

/// Decoded rasters waiting for texture upload on the UI thread.
#[derive(Default)]
pub struct SceneAssets {
    pub image: Option<egui::ColorImage>,
    pub image_failed: bool,
    pub masks: HashMap<String, egui::ColorImage>,
}

impl SceneAssets {
    pub fn apply(&mut self, event: LoaderEvent) {
        match event {
            LoaderEvent::ImageReady(img) => {
                self.image = Some(img);
                self.image_failed = false;
            }
            LoaderEvent::ImageFailed => self.image_failed = true,
            LoaderEvent::MaskReady {
                object_id,
                coverage,
            } => {
                self.masks.insert(object_id, coverage);
            }
            // absent from the map; the object still renders its box
            LoaderEvent::MaskFailed { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn proxy_param_joins_with_question_mark_or_ampersand() {
        assert_eq!(
            proxied_url("https://cdn.example.com/img.png"),
            "https://cdn.example.com/img.png?proxy=true"
        );
        assert_eq!(
            proxied_url("https://cdn.example.com/img.png?v=2"),
            "https://cdn.example.com/img.png?v=2&proxy=true"
        );
    }

    #[test]
    fn mask_endpoint_path() {
        assert_eq!(
            mask_url("http://localhost:8000", "abc123"),
            "http://localhost:8000/api/v1/images/mask/abc123?proxy=true"
        );
        assert_eq!(
            mask_url("http://localhost:8000/", "abc123"),
            "http://localhost:8000/api/v1/images/mask/abc123?proxy=true"
        );
    }

    #[test]
    fn origin_extraction() {
        assert_eq!(
            origin_of("https://api.example.com/v1/scenes/1/image.png?proxy=true"),
            Some("https://api.example.com".to_string())
        );
        assert_eq!(
            origin_of("http://localhost:8000/x"),
            Some("http://localhost:8000".to_string())
        );
        assert_eq!(origin_of("not a url"), None);
    }

    #[test]
    fn inline_mask_round_trips_raw_and_data_uri() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let encoded = BASE64.encode(png_bytes(&img));

        let decoded = decode_inline_mask(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (2, 1));

        let decoded = decode_inline_mask(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(decoded.dimensions(), (2, 1));
    }

    #[test]
    fn garbage_inline_mask_is_an_error_not_a_panic() {
        assert!(matches!(
            decode_inline_mask("!!not base64!!"),
            Err(AssetError::MaskPayload(_))
        ));
        // valid base64, but not an image
        let encoded = BASE64.encode(b"hello world");
        assert!(matches!(
            decode_inline_mask(&encoded),
            Err(AssetError::Decode(_))
        ));
    }

    #[test]
    fn coverage_uses_alpha_channel_when_present() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([10, 10, 10, 200]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 0]));
        let cov = coverage_image(&img);
        assert_eq!(cov.pixels[0].a(), 200);
        assert_eq!(cov.pixels[1].a(), 0);
    }

    #[test]
    fn coverage_falls_back_to_luminance_for_opaque_masks() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let cov = coverage_image(&img);
        assert!(cov.pixels[0].a() >= 254);
        assert_eq!(cov.pixels[1].a(), 0);
    }

    #[test]
    fn mask_failure_leaves_other_masks_intact() {
        let mut assets = SceneAssets::default();
        let img = egui::ColorImage::new([1, 1], egui::Color32::WHITE);
        assets.apply(LoaderEvent::MaskReady {
            object_id: "a".to_string(),
            coverage: img.clone(),
        });
        assets.apply(LoaderEvent::MaskReady {
            object_id: "b".to_string(),
            coverage: img,
        });
        assets.apply(LoaderEvent::MaskFailed {
            object_id: "c".to_string(),
        });
        assert_eq!(assets.masks.len(), 2);
        assert!(assets.masks.contains_key("a") && assets.masks.contains_key("b"));
        assert!(!assets.image_failed);
    }
}
