use super::color32;
use crate::material::color::{hex_to_rgb, parse_channel};
use crate::material::{Channel, Rgb, PALETTE};
use egui::{Color32, RichText, Sense, Stroke};

const SWATCH_SIZE: f32 = 26.0;
const SWATCHES_PER_ROW: usize = 5;

/// Palette plus per-channel editing. Returns the new lowercase hex when the
/// user picks or edits a color.
pub fn show(ui: &mut egui::Ui, hex: &str) -> Option<String> {
    let mut picked = None;
    let current = hex_to_rgb(hex);

    ui.label(RichText::new("Palette").strong());
    for row in PALETTE.chunks(SWATCHES_PER_ROW) {
        ui.horizontal(|ui| {
            for &entry in row {
                if palette_swatch(ui, entry, is_selected(entry, hex)) {
                    picked = Some(entry.to_string());
                }
            }
        });
    }

    ui.separator();
    ui.label(RichText::new("Custom").strong());
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(egui::vec2(48.0, 48.0), Sense::hover());
        ui.painter().rect_filled(rect, 6.0, color32(current));
        ui.label(RichText::new(display_hex(hex)).monospace().size(18.0));
    });

    let mut edited: Option<String> = None;
    for (channel, value) in channel_values(hex) {
        if let Some(value) = channel_row(ui, channel, value) {
            edited = Some(with_channel(edited.as_deref().unwrap_or(hex), channel, value));
        }
    }
    if edited.is_some() {
        picked = edited;
    }

    picked
}

fn palette_swatch(ui: &mut egui::Ui, hex: &str, selected: bool) -> bool {
    let (rect, response) =
        ui.allocate_exact_size(egui::vec2(SWATCH_SIZE, SWATCH_SIZE), Sense::click());
    let painter = ui.painter();
    let radius = SWATCH_SIZE * 0.5 - 2.0;
    painter.circle_filled(rect.center(), radius, color32(hex_to_rgb(hex)));
    if selected {
        painter.circle_stroke(rect.center(), radius + 1.5, Stroke::new(2.0, Color32::from_gray(40)));
    } else if response.hovered() {
        painter.circle_stroke(rect.center(), radius, Stroke::new(1.0, Color32::from_gray(160)));
    }
    response.on_hover_text(hex).clicked()
}

fn channel_row(ui: &mut egui::Ui, channel: Channel, value: u8) -> Option<u8> {
    let mut edited = value;
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(RichText::new(channel.label()).color(color32(channel.accent())).strong());
        let slider = egui::Slider::new(&mut edited, 0..=255).show_value(false);
        changed |= ui.add(slider).changed();
        let field = egui::DragValue::new(&mut edited)
            .range(0..=255)
            .custom_parser(|text| Some(parse_channel(text) as f64));
        changed |= ui.add(field).changed();
    });
    changed.then_some(edited)
}

/// Hex label as shown in the panel.
pub fn display_hex(hex: &str) -> String {
    hex.to_uppercase()
}

/// Palette entries compare case-insensitively against the current color.
pub fn is_selected(entry: &str, current: &str) -> bool {
    entry.eq_ignore_ascii_case(current)
}

/// Replaces one channel of `hex` and returns the new lowercase hex.
pub fn with_channel(hex: &str, channel: Channel, value: u8) -> String {
    hex_to_rgb(hex).with_channel(channel, value).to_hex()
}

/// Channel values shown by the rows, derived from `hex` each frame.
pub fn channel_values(hex: &str) -> [(Channel, u8); 3] {
    let rgb: Rgb = hex_to_rgb(hex);
    Channel::ALL.map(|channel| (channel, rgb.channel(channel)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_edit_produces_lowercase_hex() {
        assert_eq!(with_channel("#4A90E2", Channel::Red, 255), "#ff90e2");
        assert_eq!(with_channel("#4a90e2", Channel::Blue, 0), "#4a9000");
        // Unparsable input starts from black.
        assert_eq!(with_channel("oops", Channel::Green, 16), "#001000");
    }

    #[test]
    fn rows_follow_the_hex_value() {
        assert_eq!(
            channel_values("#2ecc71"),
            [(Channel::Red, 0x2e), (Channel::Green, 0xcc), (Channel::Blue, 0x71)]
        );
        assert_eq!(channel_values("nope").map(|(_, value)| value), [0, 0, 0]);
    }

    #[test]
    fn selection_and_label_ignore_case() {
        assert!(is_selected("#ecf0f1", "#ECF0F1"));
        assert!(!is_selected("#ecf0f1", "#ecf0f2"));
        assert_eq!(display_hex("#4a90e2"), "#4A90E2");
    }

    #[test]
    fn untouched_panel_reports_nothing() {
        let ctx = egui::Context::default();
        let mut outcome = Some(Some(String::new()));
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| outcome = Some(show(ui, "#9b59b6")));
        });
        assert_eq!(outcome, Some(None));
    }
}
