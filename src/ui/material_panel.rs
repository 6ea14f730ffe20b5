use super::color32;
use crate::material::{MaterialField, MaterialProperties, PRESETS};
use egui::RichText;

/// Draws the nine property rows and the preset buttons. Any edit yields the
/// full updated record.
pub fn show(ui: &mut egui::Ui, properties: MaterialProperties) -> Option<MaterialProperties> {
    let mut updated = None;

    for field in MaterialField::ALL {
        let current = updated.unwrap_or(properties);
        if let Some(value) = property_row(ui, field, current.get(field)) {
            updated = Some(current.with(field, value));
        }
        ui.add_space(6.0);
    }

    ui.separator();
    ui.label(RichText::new("Presets").strong());
    ui.horizontal_wrapped(|ui| {
        for preset in PRESETS {
            if ui.button(preset.name).clicked() {
                updated = Some(preset.properties);
            }
        }
    });

    updated
}

fn property_row(ui: &mut egui::Ui, field: MaterialField, value: f32) -> Option<f32> {
    let range = field.range();
    let mut edited = value;
    let mut changed = false;

    ui.horizontal(|ui| {
        ui.label(RichText::new(field.label()).color(color32(field.accent())).strong());
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let drag = egui::DragValue::new(&mut edited)
                .range(range.min..=range.max)
                .speed(range.step)
                .fixed_decimals(2)
                .custom_parser(move |text| Some(range.parse(text) as f64));
            changed |= ui.add(drag).changed();
        });
    });
    let slider = egui::Slider::new(&mut edited, range.min..=range.max)
        .step_by(range.step as f64)
        .show_value(false);
    changed |= ui.add(slider).changed();
    ui.label(RichText::new(field.description()).small().weak());

    (changed && range.is_edit(value, edited)).then(|| range.clamp(edited))
}
