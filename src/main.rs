mod loader;
mod model;
mod render;
mod transform;

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use eframe::egui;

use loader::{LoaderEvent, SceneAssets};
use model::{InteractionState, Scene, SceneObject};
use render::FrameState;
use transform::ViewTransform;

// ── App ─────────────────────────────────────────────────────────────────────

struct SceneReviewApp {
    scene: Scene,

    assets: SceneAssets,
    events: Receiver<LoaderEvent>,
    texture: Option<egui::TextureHandle>,
    mask_textures: HashMap<String, egui::TextureHandle>,

    transform: ViewTransform,
    view_centered: bool,
    drag_anchor: Option<egui::Vec2>,
    canvas_size: Option<egui::Vec2>,

    interaction: InteractionState,
    show_objects: bool,
    show_masks: bool,

    // coalesces all state mutations into one repaint per pass
    dirty: bool,
}

impl SceneReviewApp {
    /// A fresh app per scene: the view transform and all interaction state
    /// start from scratch whenever the active scene changes.
    fn new(cc: &eframe::CreationContext<'_>, scene: Scene) -> Self {
        let api_base = scene
            .api_base
            .clone()
            .or_else(|| loader::origin_of(&scene.image_url))
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel();
        loader::spawn_image_load(cc.egui_ctx.clone(), tx.clone(), scene.image_url.clone());
        loader::spawn_mask_loads(cc.egui_ctx.clone(), tx, api_base, &scene.objects);

        Self {
            scene,
            assets: SceneAssets::default(),
            events: rx,
            texture: None,
            mask_textures: HashMap::new(),
            transform: ViewTransform::default(),
            view_centered: false,
            drag_anchor: None,
            canvas_size: None,
            interaction: InteractionState::default(),
            show_objects: true,
            show_masks: true,
            dirty: false,
        }
    }

    /// Drain loader events and upload any newly decoded rasters.
    fn pump_loader(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events.try_recv() {
            self.assets.apply(event);
            self.dirty = true;
        }
        if let Some(img) = self.assets.image.take() {
            self.texture = Some(ctx.load_texture("scene", img, egui::TextureOptions::LINEAR));
        }
        for (id, img) in self.assets.masks.drain().collect::<Vec<_>>() {
            let tex = ctx.load_texture(format!("mask-{id}"), img, egui::TextureOptions::LINEAR);
            self.mask_textures.insert(id, tex);
        }
    }

    fn image_size(&self) -> Option<egui::Vec2> {
        self.texture.as_ref().map(|t| t.size_vec2())
    }

    fn reset_view(&mut self) {
        if let (Some(canvas), Some(image)) = (self.canvas_size, self.image_size()) {
            self.transform.reset(canvas, image);
            self.dirty = true;
        }
    }

    fn toggle_review(&mut self) {
        if self.interaction.review.is_active() {
            self.interaction.review.set(None);
        } else if let Some(selected) = self.interaction.selected.clone() {
            self.interaction.review.set(Some(selected));
        }
        self.dirty = true;
    }

    /// The single event this component emits to the outside world.
    fn on_object_click(&mut self, obj: &SceneObject) {
        log::info!("object clicked: {} ({})", obj.id, obj.label);
        self.interaction.selected = Some(obj.id.clone());
        self.dirty = true;
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        ctx.input(|i| {
            if i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals) {
                self.transform.zoom_in();
                self.dirty = true;
            }
            if i.key_pressed(egui::Key::Minus) {
                self.transform.zoom_out();
                self.dirty = true;
            }
            if i.key_pressed(egui::Key::Num0) {
                self.reset_view();
            }
            if i.key_pressed(egui::Key::B) {
                self.show_objects = !self.show_objects;
                self.dirty = true;
            }
            if i.key_pressed(egui::Key::M) {
                self.show_masks = !self.show_masks;
                self.dirty = true;
            }
            if i.key_pressed(egui::Key::R) {
                self.toggle_review();
            }
            if i.key_pressed(egui::Key::Escape) {
                self.interaction.selected = None;
                self.dirty = true;
            }
        });
    }

    fn canvas(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        self.canvas_size = Some(canvas_rect.size());

        // Center the image once its natural size is known.
        if !self.view_centered {
            if let Some(image) = self.image_size() {
                self.transform.reset(canvas_rect.size(), image);
                self.view_centered = true;
            }
        }

        // Pan: plain translation against the anchor captured at drag start.
        if response.drag_started() {
            if let Some(pos) = response.hover_pos() {
                self.drag_anchor = Some(self.transform.begin_drag(pos));
            }
        }
        if response.dragged() {
            if let (Some(anchor), Some(pos)) = (
                self.drag_anchor,
                response
                    .hover_pos()
                    .or_else(|| ctx.input(|i| i.pointer.latest_pos())),
            ) {
                self.transform.drag_to(pos, anchor);
                self.interaction.is_dragging = true;
                self.dirty = true;
            }
        }
        if response.drag_stopped() {
            self.drag_anchor = None;
            self.interaction.is_dragging = false;
        }

        // Zoom to cursor.
        let scroll = ctx.input(|i| i.smooth_scroll_delta.y);
        if scroll != 0.0 && response.hovered() {
            if let Some(cursor) = response.hover_pos() {
                // wheel-down arrives as negative egui scroll, positive deltaY
                self.transform.wheel(-scroll, cursor);
                self.dirty = true;
            }
        }

        // Hover resolution; suppressed while panning.
        if !self.interaction.is_dragging {
            let hovered = response.hover_pos().and_then(|pos| {
                model::hit_test(self.transform.screen_to_image(pos), &self.scene.objects)
                    .map(|o| o.id.clone())
            });
            if hovered != self.interaction.hovered {
                self.interaction.hovered = hovered;
                self.dirty = true;
            }
        }

        // Click: release with no drag in between.
        if response.clicked() {
            if let Some(pos) = response.hover_pos() {
                let hit = model::hit_test(self.transform.screen_to_image(pos), &self.scene.objects)
                    .cloned();
                match hit {
                    Some(obj) => self.on_object_click(&obj),
                    None => {
                        self.interaction.selected = None;
                        self.dirty = true;
                    }
                }
            }
        }

        let frame = FrameState {
            objects: &self.scene.objects,
            transform: &self.transform,
            show_objects: self.show_objects,
            show_masks: self.show_masks,
            hovered: self.interaction.hovered.as_deref(),
            selected: self.interaction.selected.as_deref(),
            reviewing: self.interaction.review.object_id(),
            image_failed: self.assets.image_failed,
            now: ctx.input(|i| i.time),
        };
        render::draw_scene(
            &painter.with_clip_rect(canvas_rect),
            canvas_rect,
            self.texture.as_ref(),
            &self.mask_textures,
            &frame,
        );
    }
}

impl eframe::App for SceneReviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump_loader(ctx);
        self.handle_keys(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.checkbox(&mut self.show_objects, "Boxes").changed() {
                    self.dirty = true;
                }
                if ui.checkbox(&mut self.show_masks, "Masks").changed() {
                    self.dirty = true;
                }
                ui.separator();
                if ui.button("+").clicked() {
                    self.transform.zoom_in();
                    self.dirty = true;
                }
                if ui.button("−").clicked() {
                    self.transform.zoom_out();
                    self.dirty = true;
                }
                if ui.button("Reset").clicked() {
                    self.reset_view();
                }
                ui.separator();
                ui.label(format!(
                    "{} — {} objects",
                    self.scene.id,
                    self.scene.objects.len()
                ));
                if let Some(id) = self.interaction.review.object_id() {
                    ui.separator();
                    ui.label(format!("reviewing: {id}"));
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.canvas(ctx, ui);
        });

        // While an object is under review the pulse needs continuous frames;
        // the requests stop the instant the state returns to Idle.
        if self.interaction.review.is_active() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
        if self.dirty {
            ctx.request_repaint();
            self.dirty = false;
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: scene-review <scene.json | http(s)://…/scene.json>");
        std::process::exit(1);
    }

    let scene = match loader::load_scene(&args[1]) {
        Ok(scene) => scene,
        Err(err) => {
            eprintln!("Failed to load scene: {err}");
            std::process::exit(1);
        }
    };
    log::info!(
        "scene {} loaded: {} objects, {}x{}",
        scene.id,
        scene.objects.len(),
        scene.width,
        scene.height
    );

    let title = format!("scene-review — {}", scene.id);
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Ok(Box::new(SceneReviewApp::new(cc, scene)))),
    )
    .expect("Failed to run eframe");
}
