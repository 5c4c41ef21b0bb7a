// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! This module contains the main application structure that implements
//! the egui::App trait. It owns the canvas editor, the open project and the
//! background workers (image loading, detection, audio) and routes their
//! results back into the editor once per frame. Narration playback is
//! clocked from the frame time.

use crate::canvas::compare::CompareView;
use crate::canvas::editor::CanvasEditor;
use crate::canvas::events::CanvasEvent;
use crate::canvas::interaction::{InteractionOutcome, ModeToggles};
use crate::canvas::session::ImageSource;
use crate::config::AppConfig;
use crate::io::{media, persist::ProjectStore, serialization};
use crate::models::detail::DetailId;
use crate::narration::Narration;
use crate::services::audio::{AudioPipeline, CommandSynthesizer};
use crate::services::detector::{
    merge_detections, spawn_detection, DetectionEvent, DetectionMessage, FileDetector,
};
use crate::services::playback::{build_playlist, CommandPlayer, Playback, PlaybackStep};
use crate::ui::{canvas, properties, toolbar};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a status notice stays visible.
const NOTICE_TTL: Duration = Duration::from_secs(6);
/// Repaint interval while timers or workers are pending.
const BUSY_REPAINT: Duration = Duration::from_millis(100);

/// Result of background image loading operation.
struct LoadedImageData {
    index: usize,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// A message in the status line.
struct Notice {
    text: String,
    is_error: bool,
    at: Instant,
}

/// An open canvas context menu.
struct ContextMenu {
    pos: egui::Pos2,
    detail: Option<DetailId>,
}

/// Main application state.
pub struct MangavoxApp {
    config: AppConfig,

    /// Canvas editor (viewport, shapes, details, history)
    editor: CanvasEditor,

    /// Canvas events
    events: Receiver<CanvasEvent>,

    /// Open project folder
    store: Option<ProjectStore>,

    /// Page images of the open folder
    images: Vec<PathBuf>,

    /// Index of the page shown on the canvas
    current_image: Option<usize>,

    /// Loaded image texture for display
    image_texture: Option<egui::TextureHandle>,

    /// Receiver for background image loading
    image_loader: Option<Receiver<Result<LoadedImageData, String>>>,

    /// Loading state message
    loading_message: Option<String>,

    /// Running detection
    detection: Option<Receiver<DetectionMessage>>,

    /// Processed page from the OCR service, for compare mode
    processed_texture: Option<egui::TextureHandle>,

    /// Receiver for background processed-image loading
    processed_loader: Option<Receiver<Result<LoadedImageData, String>>>,

    compare: CompareView,

    /// Speech synthesis queue and result routing
    narration: Narration,

    /// Sequential narration
    playback: Playback,

    /// Page the playback asked to show
    playback_page: Option<String>,

    /// Index of the selected detail
    selected_detail: Option<usize>,

    context_menu: Option<ContextMenu>,
    canvas_rect: egui::Rect,
    notice: Option<Notice>,
    last_frame: Instant,
}

impl MangavoxApp {
    /// Create a new application instance.
    pub fn new(config: AppConfig) -> Self {
        let editor = CanvasEditor::new(&config);
        let events = editor.subscribe();
        let synthesizer = Arc::new(CommandSynthesizer::from_config(&config.audio));
        let narration = Narration::new(AudioPipeline::new(synthesizer, &config.audio));
        let playback = Playback::new(Box::new(CommandPlayer::from_config(&config.playback)));

        Self {
            editor,
            events,
            store: None,
            images: Vec::new(),
            current_image: None,
            image_texture: None,
            image_loader: None,
            loading_message: None,
            detection: None,
            processed_texture: None,
            processed_loader: None,
            compare: CompareView::default(),
            narration,
            playback,
            playback_page: None,
            selected_detail: None,
            context_menu: None,
            canvas_rect: egui::Rect::NOTHING,
            notice: None,
            last_frame: Instant::now(),
            config,
        }
    }

    fn notify(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.notice = Some(Notice {
            text,
            is_error: false,
            at: Instant::now(),
        });
    }

    fn notify_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::error!("{}", text);
        self.notice = Some(Notice {
            text,
            is_error: true,
            at: Instant::now(),
        });
    }

    /// Sidecar key of the current page: its file name.
    fn current_key(&self) -> Option<String> {
        let path = self.images.get(self.current_image?)?;
        Some(image_key(path))
    }

    fn current_path(&self) -> Option<&Path> {
        self.images.get(self.current_image?).map(PathBuf::as_path)
    }

    /// Open a project folder, saving the previous one first.
    fn open_folder(&mut self, folder: PathBuf) {
        self.flush_project();

        let result = ProjectStore::open(
            &folder,
            Duration::from_millis(self.config.persistence.debounce_ms),
        )
        .and_then(|store| Ok((store, media::list_images(&folder)?)));

        match result {
            Ok((store, images)) => {
                self.narration.cancel_all();
                self.stop_playback();
                self.editor.clear();
                self.image_texture = None;
                self.processed_texture = None;
                self.compare.disable();
                self.current_image = None;
                self.selected_detail = None;
                self.detection = None;
                self.store = Some(store);
                self.images = images;
                self.notify(format!(
                    "Opened {} ({} pages)",
                    folder.display(),
                    self.images.len()
                ));
                if !self.images.is_empty() {
                    self.load_page(0);
                }
            }
            Err(e) => self.notify_error(format!("Failed to open folder: {:#}", e)),
        }
    }

    /// Load a page image (asynchronously).
    fn load_page(&mut self, index: usize) {
        let Some(path) = self.images.get(index).cloned() else {
            return;
        };
        self.loading_message = Some(format!("Loading {}...", image_key(&path)));
        self.image_loader = Some(spawn_image_load(path, index));
    }

    /// Load the processed image of the shown page, if the service made one.
    fn load_processed(&mut self) {
        self.processed_texture = None;
        self.processed_loader = None;
        let (Some(index), Some(key), Some(store)) =
            (self.current_image, self.current_key(), self.store.as_ref())
        else {
            self.compare.disable();
            return;
        };
        let Some(reference) = store.data().processed_image(&key) else {
            self.compare.disable();
            return;
        };
        match media::resolve_processed_image(store.folder(), reference) {
            Some(path) => self.processed_loader = Some(spawn_image_load(path, index)),
            None => {
                log::warn!("Processed image {} not found", reference);
                self.compare.disable();
            }
        }
    }

    fn poll_processed_loader(&mut self, ctx: &egui::Context) {
        let Some(receiver) = &self.processed_loader else {
            return;
        };
        let Ok(result) = receiver.try_recv() else {
            return;
        };
        self.processed_loader = None;

        match result {
            Ok(loaded) if Some(loaded.index) == self.current_image => {
                let size = [loaded.width as usize, loaded.height as usize];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &loaded.pixels);
                self.processed_texture = Some(ctx.load_texture(
                    "processed_image",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
            Ok(_) => {}
            Err(e) => self.notify_error(format!("Failed to load processed image: {}", e)),
        }
    }

    fn poll_image_loader(&mut self, ctx: &egui::Context) {
        let Some(receiver) = &self.image_loader else {
            return;
        };
        let Ok(result) = receiver.try_recv() else {
            return;
        };
        self.image_loader = None;
        self.loading_message = None;

        match result {
            Ok(loaded) => {
                // Save edits of the page we are leaving.
                self.persist_dirty_details();

                let size = [loaded.width as usize, loaded.height as usize];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &loaded.pixels);
                self.image_texture =
                    Some(ctx.load_texture("page_image", color_image, egui::TextureOptions::LINEAR));
                self.current_image = Some(loaded.index);
                self.load_processed();
                self.selected_detail = None;
                self.detection = None;

                let details = match (&self.store, self.current_key()) {
                    (Some(store), Some(key)) => store.data().details(&key).to_vec(),
                    _ => Vec::new(),
                };
                self.editor.load_image(
                    ImageSource {
                        width: loaded.width,
                        height: loaded.height,
                    },
                    details,
                );
            }
            Err(e) => self.notify_error(format!("Failed to load image: {}", e)),
        }
    }

    /// Replay an OCR response for the current page.
    fn start_detection(&mut self, response: PathBuf) {
        let Some(image) = self.current_path().map(Path::to_path_buf) else {
            return;
        };
        let detector = FileDetector::new(response, self.config.detector.target_lang.clone());
        self.detection = Some(spawn_detection(Box::new(detector), image));
        self.notify("Detecting text...");
    }

    fn poll_detection(&mut self) {
        let Some(receiver) = &self.detection else {
            return;
        };
        let messages: Vec<DetectionMessage> = receiver.try_iter().collect();

        for message in messages {
            match message {
                DetectionMessage::Event(DetectionEvent::Status(status)) => {
                    self.notify(format!("OCR: {}", status));
                }
                DetectionMessage::Event(DetectionEvent::Batch(detection)) => {
                    let Some(source) = self.editor.image() else {
                        continue;
                    };
                    let merged = merge_detections(
                        self.editor.details().items(),
                        &detection.regions,
                        (source.width, source.height),
                    );
                    self.editor.replace_details(merged);
                    if let Some(processed) = detection.processed_image {
                        self.record_processed_image(processed);
                    }
                }
                DetectionMessage::Event(DetectionEvent::ProcessedImage(processed)) => {
                    self.record_processed_image(processed);
                }
                DetectionMessage::Failed(e) => {
                    self.detection = None;
                    self.notify_error(format!("Detection failed: {}", e));
                    return;
                }
                DetectionMessage::Finished => {
                    self.detection = None;
                    let count = self.editor.details().len();
                    self.notify(format!("Detection finished: {} regions", count));
                    return;
                }
            }
        }
    }

    fn record_processed_image(&mut self, processed: String) {
        let (Some(key), Some(store)) = (self.current_key(), self.store.as_mut()) else {
            return;
        };
        if store.data().processed_image(&key) == Some(processed.as_str()) {
            return;
        }
        store.set_processed_image(&key, Some(processed), Instant::now());
        self.load_processed();
    }

    fn generate_audio(&mut self, id: &DetailId) {
        if let Err(e) = self.narration.generate(&self.editor, id) {
            self.notify_error(format!("Cannot generate audio: {}", e));
        }
    }

    fn generate_all_audio(&mut self) {
        let skipped = self.narration.generate_all(&self.editor);
        if skipped > 0 {
            self.notify(format!("Skipped {} details without text", skipped));
        }
    }

    fn poll_audio(&mut self) {
        let failures = self
            .narration
            .poll(&mut self.editor, self.store.as_mut(), Instant::now());
        for (id, error) in failures {
            self.notify_error(format!("Audio for {} failed: {}", id, error));
        }
    }

    /// Narrate the shown page, or every page of the folder.
    fn start_playback(&mut self, all_pages: bool) {
        self.persist_dirty_details();
        let pages: Vec<String> = if all_pages {
            self.images.iter().map(|p| image_key(p)).collect()
        } else {
            self.current_key().into_iter().collect()
        };
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let cues = build_playlist(store.data(), &pages, self.config.playback.gap_seconds);
        let folder = store.folder().to_path_buf();
        match self.playback.start(cues, &folder) {
            Some(step) => self.handle_playback_step(step),
            None => self.notify("Nothing to narrate"),
        }
    }

    fn stop_playback(&mut self) {
        self.playback.stop();
        self.playback_page = None;
    }

    fn handle_playback_step(&mut self, step: PlaybackStep) {
        match step {
            PlaybackStep::Started(_) => self.follow_playback(),
            PlaybackStep::Finished => {
                self.playback_page = None;
                self.notify("Narration finished");
            }
        }
    }

    /// Show the page of the playing cue and select its detail.
    fn follow_playback(&mut self) {
        let Some(cue) = self.playback.current() else {
            return;
        };
        if self.current_key().as_deref() != Some(cue.page.as_str()) {
            if self.playback_page.as_deref() == Some(cue.page.as_str()) {
                return;
            }
            self.playback_page = Some(cue.page.clone());
            if let Some(index) = self.images.iter().position(|p| image_key(p) == cue.page) {
                self.load_page(index);
            }
            return;
        }
        self.selected_detail = cue
            .detail
            .as_ref()
            .and_then(|id| self.editor.details().position(id));
    }

    fn delete_detail(&mut self, index: usize) {
        if let Some(removed) = self.editor.delete_detail(index) {
            self.narration.detail_removed(&removed.id);
            self.selected_detail = None;
            log::info!("Deleted detail, total: {}", self.editor.details().len());
        }
    }

    fn delete_detail_by_id(&mut self, id: &DetailId) {
        if let Some(index) = self.editor.details().position(id) {
            self.delete_detail(index);
        }
    }

    fn undo(&mut self) {
        if self.editor.undo() {
            self.selected_detail = None;
            log::info!("Undo");
        }
    }

    fn redo(&mut self) {
        if self.editor.redo() {
            self.selected_detail = None;
            log::info!("Redo");
        }
    }

    /// Hand changed details to the project store.
    fn persist_dirty_details(&mut self) {
        let Some(details) = self.editor.take_dirty() else {
            return;
        };
        if let (Some(key), Some(store)) = (self.current_key(), self.store.as_mut()) {
            store.record_details(&key, &details, Instant::now());
        }
    }

    fn poll_persistence(&mut self) {
        self.persist_dirty_details();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if let Err(e) = store.poll(Instant::now()) {
            self.notify_error(format!("Failed to save project: {:#}", e));
        }
    }

    /// Write pending project changes now.
    fn flush_project(&mut self) {
        self.persist_dirty_details();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.flush_now() {
            Ok(true) => log::info!("Saved project {}", store.folder().display()),
            Ok(false) => {}
            Err(e) => self.notify_error(format!("Failed to save project: {:#}", e)),
        }
    }

    /// Replace the open project with an exported one.
    fn import_project(&mut self, path: PathBuf) {
        let data = match serialization::import(&path) {
            Ok(data) => data,
            Err(e) => {
                self.notify_error(format!("Failed to import project: {:#}", e));
                return;
            }
        };
        let Some(store) = self.store.as_mut() else {
            return;
        };
        store.replace_data(data, Instant::now());
        self.narration.cancel_all();
        self.stop_playback();

        // Reload the shown page from the imported details.
        let details = match (self.current_key(), &self.store) {
            (Some(key), Some(store)) => store.data().details(&key).to_vec(),
            _ => Vec::new(),
        };
        if let Some(source) = self.editor.image() {
            self.editor.load_image(source, details);
        }
        self.load_processed();
        self.selected_detail = None;
        self.notify(format!("Imported project from {}", path.display()));
    }

    /// Export the project to a file.
    fn export_project(&mut self, path: PathBuf) {
        self.persist_dirty_details();
        let Some(store) = &self.store else {
            return;
        };
        match serialization::export(store.data(), &path) {
            Ok(()) => self.notify(format!("Exported project to {}", path.display())),
            Err(e) => self.notify_error(format!("Failed to export project: {:#}", e)),
        }
    }

    fn handle_canvas_events(&mut self) {
        let events: Vec<CanvasEvent> = self.events.try_iter().collect();
        for event in events {
            match event {
                CanvasEvent::ContextMenuRequested { screen, hit } => {
                    self.context_menu = Some(ContextMenu {
                        pos: self.canvas_rect.min + egui::vec2(screen.x as f32, screen.y as f32),
                        detail: hit.and_then(|h| h.detail_id),
                    });
                }
                CanvasEvent::RegionsReordered { order } => {
                    self.selected_detail = None;
                    self.notify(format!("Reading order updated ({} regions)", order.len()));
                }
                CanvasEvent::ZoomChanged { level } => {
                    log::debug!("Zoom {:.0}%", level * 100.0);
                }
                CanvasEvent::Panned { .. } => {}
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.editor.cancel_gesture();
            self.context_menu = None;
            let mut toggles = self.editor.toggles();
            toggles.waiting_region = false;
            self.editor.set_toggles(toggles);
        }

        // Only process if no text field is focused
        if ctx.wants_keyboard_input() {
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            if let Some(index) = self.selected_detail {
                self.delete_detail(index);
            }
        }

        // Handle undo (Ctrl+Z)
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Z) && !i.modifiers.shift) {
            self.undo();
        }

        // Handle redo (Ctrl+Shift+Z or Ctrl+Y)
        if ctx.input(|i| {
            (i.modifiers.command && i.modifiers.shift && i.key_pressed(egui::Key::Z))
                || (i.modifiers.command && i.key_pressed(egui::Key::Y))
        }) {
            self.redo();
        }
    }

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Folder...").clicked() {
                        if let Some(folder) = rfd::FileDialog::new().pick_folder() {
                            self.open_folder(folder);
                        }
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(self.store.is_some(), egui::Button::new("Save Now"))
                        .clicked()
                    {
                        self.flush_project();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui
                        .add_enabled(self.store.is_some(), egui::Button::new("Import Project..."))
                        .clicked()
                    {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Project", &["yaml", "yml", "json"])
                            .pick_file()
                        {
                            self.import_project(path);
                        }
                        ui.close_menu();
                    }
                    ui.add_enabled_ui(self.store.is_some(), |ui| {
                        ui.menu_button("Export Project", |ui| {
                            if ui.button("Export as YAML...").clicked() {
                                if let Some(path) = rfd::FileDialog::new()
                                    .add_filter("YAML", &["yaml", "yml"])
                                    .set_file_name("project.yaml")
                                    .save_file()
                                {
                                    self.export_project(path);
                                }
                                ui.close_menu();
                            }
                            if ui.button("Export as JSON...").clicked() {
                                if let Some(path) = rfd::FileDialog::new()
                                    .add_filter("JSON", &["json"])
                                    .set_file_name("project.json")
                                    .save_file()
                                {
                                    self.export_project(path);
                                }
                                ui.close_menu();
                            }
                        });
                    });
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Edit", |ui| {
                    if ui
                        .add_enabled(self.editor.can_undo(), egui::Button::new("Undo (Ctrl+Z)"))
                        .clicked()
                    {
                        self.undo();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(
                            self.editor.can_redo(),
                            egui::Button::new("Redo (Ctrl+Shift+Z)"),
                        )
                        .clicked()
                    {
                        self.redo();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui
                        .add_enabled(
                            self.selected_detail.is_some(),
                            egui::Button::new("Delete Selected"),
                        )
                        .clicked()
                    {
                        if let Some(index) = self.selected_detail {
                            self.delete_detail(index);
                        }
                        ui.close_menu();
                    }
                });

                ui.menu_button("Detect", |ui| {
                    let enabled = self.editor.image().is_some() && self.detection.is_none();
                    if ui
                        .add_enabled(enabled, egui::Button::new("Import OCR Response..."))
                        .clicked()
                    {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("OCR response", &["json", "bin", "stream"])
                            .pick_file()
                        {
                            self.start_detection(path);
                        }
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Zoom In").clicked() {
                        self.editor.zoom_in();
                        ui.close_menu();
                    }
                    if ui.button("Zoom Out").clicked() {
                        self.editor.zoom_out();
                        ui.close_menu();
                    }
                    if ui.button("Reset View").clicked() {
                        self.editor.reset_to_fit();
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn show_pages_panel(&mut self, ctx: &egui::Context) {
        if self.images.is_empty() {
            return;
        }
        let mut clicked = None;
        egui::SidePanel::left("pages")
            .default_width(160.0)
            .show(ctx, |ui| {
                ui.heading("Pages");
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for (index, path) in self.images.iter().enumerate() {
                        let selected = self.current_image == Some(index);
                        if ui.selectable_label(selected, image_key(path)).clicked() && !selected {
                            clicked = Some(index);
                        }
                    }
                });
            });
        if let Some(index) = clicked {
            self.load_page(index);
        }
    }

    fn show_context_menu(&mut self, ctx: &egui::Context) {
        let Some(menu) = &self.context_menu else {
            return;
        };
        let detail = menu.detail.clone();
        let mut chosen: Option<&'static str> = None;

        let area = egui::Area::new(egui::Id::new("canvas_context_menu"))
            .fixed_pos(menu.pos)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    if detail.is_some() {
                        if ui.button("Generate Audio").clicked() {
                            chosen = Some("audio");
                        }
                        if ui.button("Delete Region").clicked() {
                            chosen = Some("delete");
                        }
                        ui.separator();
                    }
                    if ui.button("Draw New Region").clicked() {
                        chosen = Some("draw");
                    }
                    if ui.button("Reset View").clicked() {
                        chosen = Some("reset");
                    }
                });
            });

        let clicked_elsewhere = ctx.input(|i| i.pointer.any_pressed())
            && !area.response.rect.contains(ctx.input(|i| i.pointer.interact_pos()).unwrap_or_default());

        match (chosen, detail) {
            (Some("audio"), Some(id)) => self.generate_audio(&id),
            (Some("delete"), Some(id)) => self.delete_detail_by_id(&id),
            (Some("draw"), _) => self.editor.set_toggles(ModeToggles {
                waiting_region: true,
                brush: false,
            }),
            (Some("reset"), _) => self.editor.reset_to_fit(),
            _ => {}
        }
        if chosen.is_some() || clicked_elsewhere {
            self.context_menu = None;
        }
    }

    fn handle_canvas_outcome(&mut self, outcome: InteractionOutcome) {
        match outcome {
            InteractionOutcome::RegionDrawn(region) => {
                // One region per activation of the drawing mode.
                let mut toggles = self.editor.toggles();
                toggles.waiting_region = false;
                self.editor.set_toggles(toggles);
                if region.image.is_none() {
                    self.notify_error("The drawn region is outside the page");
                    self.editor.discard_pending(region.pending_id);
                }
            }
            InteractionOutcome::ContextMenu { .. }
            | InteractionOutcome::Reordered(_)
            | InteractionOutcome::None => {}
        }
    }
}

/// Decode `path` on a loader thread.
fn spawn_image_load(path: PathBuf, index: usize) -> Receiver<Result<LoadedImageData, String>> {
    let (sender, receiver) = channel();
    std::thread::spawn(move || {
        let result = media::load_image(&path)
            .map(|img| {
                log::info!("Loaded image: {} ({}x{})", path.display(), img.width, img.height);
                LoadedImageData {
                    index,
                    width: img.width,
                    height: img.height,
                    pixels: img.pixels,
                }
            })
            .map_err(|e| format!("{:#}", e));
        let _ = sender.send(result);
    });
    receiver
}

/// Sidecar key of a page image.
fn image_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

impl eframe::App for MangavoxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;

        // Check background workers
        self.poll_image_loader(ctx);
        self.poll_processed_loader(ctx);
        self.poll_detection();
        self.poll_audio();
        if let Some(step) = self.playback.tick(dt) {
            self.handle_playback_step(step);
        } else if self.playback.is_playing() {
            self.follow_playback();
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            self.flush_project();
        }

        self.show_menu_bar(ctx);

        // Toolbar
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            let state = toolbar::ToolbarState {
                zoom: self.editor.zoom(),
                zoom_bounds: self.editor.zoom_bounds(),
                can_undo: self.editor.can_undo(),
                can_redo: self.editor.can_redo(),
                has_image: self.editor.image().is_some(),
                has_processed: self.processed_texture.is_some(),
                comparing: self.compare.is_enabled(),
                compare_split: self.compare.split(),
                playback: self.playback.position(),
            };
            let mut toggles = self.editor.toggles();
            let action = toolbar::show(ui, &mut toggles, &state);
            self.editor.set_toggles(toggles);
            match action {
                toolbar::ToolbarAction::Undo => self.undo(),
                toolbar::ToolbarAction::Redo => self.redo(),
                toolbar::ToolbarAction::ZoomIn => {
                    self.editor.zoom_in();
                }
                toolbar::ToolbarAction::ZoomOut => {
                    self.editor.zoom_out();
                }
                toolbar::ToolbarAction::SetZoom(level) => {
                    self.editor.set_zoom(level);
                }
                toolbar::ToolbarAction::ResetView => self.editor.reset_to_fit(),
                toolbar::ToolbarAction::ToggleCompare => {
                    self.compare.toggle();
                }
                toolbar::ToolbarAction::SetCompareSplit(split) => self.compare.set_split(split),
                toolbar::ToolbarAction::PlayPage => self.start_playback(false),
                toolbar::ToolbarAction::PlayAll => self.start_playback(true),
                toolbar::ToolbarAction::SkipCue => {
                    if let Some(step) = self.playback.skip() {
                        self.handle_playback_step(step);
                    }
                }
                toolbar::ToolbarAction::StopPlayback => self.stop_playback(),
                toolbar::ToolbarAction::None => {}
            }
        });

        // Status line
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(notice) = self.notice.as_ref().filter(|n| n.at.elapsed() < NOTICE_TTL) {
                    let color = if notice.is_error {
                        ui.visuals().error_fg_color
                    } else {
                        ui.visuals().text_color()
                    };
                    ui.label(egui::RichText::new(&notice.text).color(color));
                } else if let Some(path) = self.current_path() {
                    ui.label(image_key(path));
                } else {
                    ui.label("No folder open");
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.store.as_ref().is_some_and(|s| s.is_dirty()) {
                        ui.label(egui::RichText::new("unsaved").weak());
                    }
                    if self.detection.is_some() {
                        ui.spinner();
                    }
                    let audio = self.narration.pipeline();
                    if !audio.is_idle() {
                        ui.label(format!(
                            "audio: {} running, {} queued",
                            audio.in_flight(),
                            audio.queued()
                        ));
                    }
                    if let Some(cue) = self.playback.current() {
                        ui.label(format!("▶ {}", cue.text));
                    }
                });
            });
        });

        self.show_pages_panel(ctx);

        // Properties panel (right side)
        let pending: Vec<_> = self
            .editor
            .session()
            .pending_regions()
            .map(|p| (p.id, p.rect))
            .collect();
        let details = self.editor.details().snapshot();
        let properties_action = egui::SidePanel::right("properties")
            .default_width(300.0)
            .show(ctx, |ui| {
                properties::show(
                    ui,
                    &details,
                    self.selected_detail,
                    self.narration.pipeline().active_ids(),
                    &pending,
                )
            })
            .inner;

        // Handle properties panel actions
        match properties_action {
            properties::PropertiesAction::SelectDetail(index) => {
                self.selected_detail = Some(index);
            }
            properties::PropertiesAction::EditTranslation(index, text) => {
                self.selected_detail = Some(index);
                self.narration.edit_translation(&mut self.editor, index, text);
            }
            properties::PropertiesAction::SetVoice(index, voice) => {
                self.editor.update_detail(index, |d| d.voice_role = voice);
            }
            properties::PropertiesAction::GenerateAudio(id) => self.generate_audio(&id),
            properties::PropertiesAction::GenerateAll => self.generate_all_audio(),
            properties::PropertiesAction::DeleteDetail(index) => self.delete_detail(index),
            properties::PropertiesAction::AcceptPending(id) => {
                if let Err(e) = self.editor.accept_pending(id) {
                    self.notify_error(format!("Cannot accept region: {:#}", e));
                }
            }
            properties::PropertiesAction::DiscardPending(id) => {
                self.editor.discard_pending(id);
            }
            properties::PropertiesAction::None => {}
        }

        self.handle_shortcuts(ctx);

        // Main canvas (center)
        let frame = egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                if let Some(ref message) = self.loading_message {
                    if self.image_texture.is_none() {
                        ui.centered_and_justified(|ui| {
                            ui.vertical_centered(|ui| {
                                ui.add_space(20.0);
                                ui.spinner();
                                ui.add_space(10.0);
                                ui.label(
                                    egui::RichText::new(message)
                                        .size(16.0)
                                        .color(egui::Color32::from_gray(200)),
                                );
                            });
                        });
                        return None;
                    }
                }
                let compare = self.processed_texture.as_ref().map(|t| (t, &self.compare));
                Some(canvas::show(
                    ui,
                    &mut self.editor,
                    self.image_texture.as_ref(),
                    compare,
                ))
            })
            .inner;

        if let Some(frame) = frame {
            self.canvas_rect = frame.rect;
            for outcome in frame.outcomes {
                self.handle_canvas_outcome(outcome);
            }
        }

        self.handle_canvas_events();
        self.show_context_menu(ctx);

        // Advance animations, settle history, rebuild regions
        let animated = self.editor.tick(dt, now);
        if animated || self.editor.take_render_request() {
            ctx.request_repaint();
        }

        self.poll_persistence();

        let busy = self.loading_message.is_some()
            || self.detection.is_some()
            || self.processed_loader.is_some()
            || !self.narration.pipeline().is_idle()
            || self.playback.is_playing()
            || !self.editor.is_settled()
            || self.store.as_ref().is_some_and(|s| s.is_dirty());
        if busy {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }
}
