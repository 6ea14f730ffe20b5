//! Floating panels drawn with egui. Panels own nothing but their visibility;
//! every frame they read a [`PanelView`] and answer with [`UiAction`]s.

pub mod color_panel;
pub mod material_panel;

use crate::material::{MaterialProperties, Rgb};
use egui::{Align2, Color32, RichText};

const PANEL_MARGIN: f32 = 20.0;
const PANEL_TOP: f32 = 64.0;

/// Read-only state the panels render from.
#[derive(Debug, Clone, Copy)]
pub struct PanelView<'a> {
    pub properties: MaterialProperties,
    pub color_hex: &'a str,
    pub status: &'a str,
    pub loading: bool,
}

/// Whole-record update requests from the panels.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    SetColor(String),
    SetMaterial(MaterialProperties),
}

pub struct UiState {
    show_material_panel: bool,
    show_color_panel: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    /// Both panels start hidden behind their toggle buttons.
    pub fn new() -> Self {
        Self {
            show_material_panel: false,
            show_color_panel: false,
        }
    }

    pub fn material_panel_open(&self) -> bool {
        self.show_material_panel
    }

    pub fn color_panel_open(&self) -> bool {
        self.show_color_panel
    }

    pub fn toggle_material_panel(&mut self) {
        self.show_material_panel = !self.show_material_panel;
    }

    pub fn toggle_color_panel(&mut self) {
        self.show_color_panel = !self.show_color_panel;
    }

    /// Draws toggles, panels and the loading overlay for one frame.
    pub fn show(&mut self, ctx: &egui::Context, view: PanelView<'_>) -> Vec<UiAction> {
        let mut actions = Vec::new();

        egui::Area::new(egui::Id::new("material_panel_toggle"))
            .anchor(Align2::LEFT_TOP, [PANEL_MARGIN, PANEL_MARGIN])
            .show(ctx, |ui| {
                if ui.button(toggle_label("Material", self.material_panel_open())).clicked() {
                    self.toggle_material_panel();
                }
            });
        egui::Area::new(egui::Id::new("color_panel_toggle"))
            .anchor(Align2::RIGHT_TOP, [-PANEL_MARGIN, PANEL_MARGIN])
            .show(ctx, |ui| {
                if ui.button(toggle_label("Color", self.color_panel_open())).clicked() {
                    self.toggle_color_panel();
                }
            });

        let mut open = self.show_material_panel;
        egui::Window::new("Properties")
            .open(&mut open)
            .anchor(Align2::LEFT_TOP, [PANEL_MARGIN, PANEL_TOP])
            .resizable(false)
            .collapsible(false)
            .default_width(300.0)
            .show(ctx, |ui| {
                if let Some(updated) = material_panel::show(ui, view.properties) {
                    actions.push(UiAction::SetMaterial(updated));
                }
            });
        self.show_material_panel = open;

        let mut open = self.show_color_panel;
        egui::Window::new("Object Color")
            .open(&mut open)
            .anchor(Align2::RIGHT_TOP, [-PANEL_MARGIN, PANEL_TOP])
            .resizable(false)
            .collapsible(false)
            .default_width(260.0)
            .show(ctx, |ui| {
                if let Some(hex) = color_panel::show(ui, view.color_hex) {
                    actions.push(UiAction::SetColor(hex));
                }
            });
        self.show_color_panel = open;

        if view.loading {
            loading_overlay(ctx, view.status);
        }

        actions
    }
}

fn toggle_label(name: &str, open: bool) -> String {
    if open {
        format!("Hide {name}")
    } else {
        format!("Show {name}")
    }
}

fn loading_overlay(ctx: &egui::Context, status: &str) {
    egui::Area::new(egui::Id::new("loading_overlay"))
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style())
                .inner_margin(PANEL_MARGIN)
                .show(ui, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add(egui::Spinner::new().size(32.0));
                        ui.label(RichText::new(status).strong().size(16.0));
                        ui.label(RichText::new("Loading 3D model...").weak());
                    });
                });
        });
}

pub(crate) fn color32(color: Rgb) -> Color32 {
    Color32::from_rgb(color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{DEFAULT_COLOR, PRESETS};

    fn run_frame(ui: &mut UiState, view: PanelView<'_>) -> Vec<UiAction> {
        let ctx = egui::Context::default();
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = ui.show(ctx, view);
        });
        actions
    }

    fn view(loading: bool) -> PanelView<'static> {
        view_of(MaterialProperties::default(), loading)
    }

    fn view_of(properties: MaterialProperties, loading: bool) -> PanelView<'static> {
        PanelView {
            properties,
            color_hex: DEFAULT_COLOR,
            status: "Loading: 40%",
            loading,
        }
    }

    fn opened() -> UiState {
        let mut ui = UiState::new();
        ui.toggle_material_panel();
        ui.toggle_color_panel();
        ui
    }

    #[test]
    fn panels_start_hidden() {
        let mut ui = UiState::new();
        assert!(!ui.material_panel_open());
        assert!(!ui.color_panel_open());
        assert!(run_frame(&mut ui, view(false)).is_empty());
        assert!(!ui.material_panel_open() && !ui.color_panel_open());
    }

    #[test]
    fn idle_frame_emits_no_actions() {
        let mut ui = opened();
        assert!(run_frame(&mut ui, view(true)).is_empty());
        assert!(run_frame(&mut ui, view(false)).is_empty());
        assert!(ui.material_panel_open() && ui.color_panel_open());
    }

    #[test]
    fn applied_preset_is_not_rewritten_by_open_panels() {
        let mut ui = opened();
        for preset in PRESETS {
            for _ in 0..2 {
                let actions = run_frame(&mut ui, view_of(preset.properties, false));
                assert!(actions.is_empty(), "{}: {actions:?}", preset.name);
            }
        }
    }

    #[test]
    fn toggled_panels_stay_as_set_across_frames() {
        let mut ui = opened();
        ui.toggle_material_panel();
        assert!(run_frame(&mut ui, view(false)).is_empty());
        assert!(!ui.material_panel_open());
        assert!(ui.color_panel_open());
        ui.toggle_color_panel();
        run_frame(&mut ui, view(false));
        assert!(!ui.color_panel_open());
    }

    #[test]
    fn toggle_labels_reflect_visibility() {
        assert_eq!(toggle_label("Color", true), "Hide Color");
        assert_eq!(toggle_label("Material", false), "Show Material");
    }
}
