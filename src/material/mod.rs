//! Physical material parameters, their UI metadata and presets.

pub mod color;

pub use color::{Channel, ColorError, Rgb, DEFAULT_COLOR, PALETTE};

use serde::{Deserialize, Serialize};

/// Alpha below which fragments of the shared material are discarded.
pub const ALPHA_TEST: f32 = 0.001;

/// The nine tunable parameters of the shared physical material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialProperties {
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub reflectivity: f32,
    pub ior: f32,
    pub transmission: f32,
    pub thickness: f32,
    pub opacity: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        PRESETS[0].properties
    }
}

impl MaterialProperties {
    pub fn get(&self, field: MaterialField) -> f32 {
        match field {
            MaterialField::Opacity => self.opacity,
            MaterialField::Metalness => self.metalness,
            MaterialField::Roughness => self.roughness,
            MaterialField::Reflectivity => self.reflectivity,
            MaterialField::Clearcoat => self.clearcoat,
            MaterialField::ClearcoatRoughness => self.clearcoat_roughness,
            MaterialField::Ior => self.ior,
            MaterialField::Transmission => self.transmission,
            MaterialField::Thickness => self.thickness,
        }
    }

    fn slot_mut(&mut self, field: MaterialField) -> &mut f32 {
        match field {
            MaterialField::Opacity => &mut self.opacity,
            MaterialField::Metalness => &mut self.metalness,
            MaterialField::Roughness => &mut self.roughness,
            MaterialField::Reflectivity => &mut self.reflectivity,
            MaterialField::Clearcoat => &mut self.clearcoat,
            MaterialField::ClearcoatRoughness => &mut self.clearcoat_roughness,
            MaterialField::Ior => &mut self.ior,
            MaterialField::Transmission => &mut self.transmission,
            MaterialField::Thickness => &mut self.thickness,
        }
    }

    /// Copy of the record with one field replaced, clamped into its range.
    pub fn with(mut self, field: MaterialField, value: f32) -> Self {
        *self.slot_mut(field) = field.range().clamp(value);
        self
    }

    /// Every field clamped into its range.
    pub fn clamped(self) -> Self {
        MaterialField::ALL
            .iter()
            .fold(self, |props, &field| props.with(field, props.get(field)))
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0 || self.transmission > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl FieldRange {
    const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    /// NaN maps to `min`; everything else saturates at the bounds.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Interprets numeric-field text: unparsable or non-finite input becomes
    /// `min`.
    pub fn parse(&self, text: &str) -> f32 {
        text.trim()
            .parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .map_or(self.min, |value| self.clamp(value))
    }

    /// True when `edited` is at least half a step away from `current`.
    /// Widgets that snap through `f64` hand back values a few ulps off the
    /// input; those are not edits.
    pub fn is_edit(&self, current: f32, edited: f32) -> bool {
        (edited - current).abs() >= self.step * 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialField {
    Opacity,
    Metalness,
    Roughness,
    Reflectivity,
    Clearcoat,
    ClearcoatRoughness,
    Ior,
    Transmission,
    Thickness,
}

impl MaterialField {
    /// Panel order.
    pub const ALL: [MaterialField; 9] = [
        MaterialField::Opacity,
        MaterialField::Metalness,
        MaterialField::Roughness,
        MaterialField::Reflectivity,
        MaterialField::Clearcoat,
        MaterialField::ClearcoatRoughness,
        MaterialField::Ior,
        MaterialField::Transmission,
        MaterialField::Thickness,
    ];

    pub fn range(self) -> FieldRange {
        match self {
            MaterialField::Ior => FieldRange::new(1.0, 3.0, 0.01),
            MaterialField::Thickness => FieldRange::new(0.0, 5.0, 0.1),
            _ => FieldRange::new(0.0, 1.0, 0.01),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MaterialField::Opacity => "Opacity",
            MaterialField::Metalness => "Metalness",
            MaterialField::Roughness => "Roughness",
            MaterialField::Reflectivity => "Reflectivity",
            MaterialField::Clearcoat => "Clearcoat",
            MaterialField::ClearcoatRoughness => "Clearcoat Roughness",
            MaterialField::Ior => "Index of Refraction",
            MaterialField::Transmission => "Transmission",
            MaterialField::Thickness => "Thickness",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MaterialField::Opacity => "Material opacity",
            MaterialField::Metalness => "How metallic the material is",
            MaterialField::Roughness => "Surface roughness",
            MaterialField::Reflectivity => "Strength of specular reflection",
            MaterialField::Clearcoat => "Varnish layer on top of the surface",
            MaterialField::ClearcoatRoughness => "Roughness of the varnish layer",
            MaterialField::Ior => "Index of refraction",
            MaterialField::Transmission => "Light passing through the material",
            MaterialField::Thickness => "Volume thickness for transmission",
        }
    }

    pub fn accent(self) -> Rgb {
        match self {
            MaterialField::Opacity => Rgb::from_u32(0x3498db),
            MaterialField::Metalness => Rgb::from_u32(0x95a5a6),
            MaterialField::Roughness => Rgb::from_u32(0xe67e22),
            MaterialField::Reflectivity => Rgb::from_u32(0xf39c12),
            MaterialField::Clearcoat => Rgb::from_u32(0x9b59b6),
            MaterialField::ClearcoatRoughness => Rgb::from_u32(0x8e44ad),
            MaterialField::Ior => Rgb::from_u32(0x2ecc71),
            MaterialField::Transmission => Rgb::from_u32(0x1abc9c),
            MaterialField::Thickness => Rgb::from_u32(0xe74c3c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialPreset {
    pub name: &'static str,
    pub properties: MaterialProperties,
}

const fn props(values: [f32; 9]) -> MaterialProperties {
    MaterialProperties {
        metalness: values[0],
        roughness: values[1],
        clearcoat: values[2],
        clearcoat_roughness: values[3],
        reflectivity: values[4],
        ior: values[5],
        transmission: values[6],
        thickness: values[7],
        opacity: values[8],
    }
}

/// The first preset doubles as the startup material.
pub const PRESETS: [MaterialPreset; 4] = [
    MaterialPreset {
        name: "Standard Plastic",
        properties: props([0.0, 0.2, 1.0, 0.1, 0.8, 1.5, 0.0, 0.5, 1.0]),
    },
    MaterialPreset {
        name: "Polished Metal",
        properties: props([1.0, 0.1, 0.0, 0.0, 1.0, 1.5, 0.0, 0.5, 1.0]),
    },
    MaterialPreset {
        name: "Glass",
        properties: props([0.0, 0.0, 1.0, 0.0, 0.9, 1.5, 0.95, 1.0, 0.1]),
    },
    MaterialPreset {
        name: "Rubber",
        properties: props([0.0, 0.9, 0.0, 0.0, 0.1, 1.5, 0.0, 0.5, 1.0]),
    },
];

/// The single material shared by every mesh of the loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalMaterial {
    pub color: Rgb,
    pub properties: MaterialProperties,
    pub transparent: bool,
    pub depth_write: bool,
    pub double_sided: bool,
    pub alpha_test: f32,
    revision: u64,
}

impl PhysicalMaterial {
    pub fn new(color: Rgb, properties: MaterialProperties) -> Self {
        let mut material = Self {
            color,
            properties,
            transparent: false,
            depth_write: true,
            double_sided: true,
            alpha_test: ALPHA_TEST,
            revision: 0,
        };
        material.apply_properties(properties);
        material
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
        self.revision += 1;
    }

    /// Copies all fields and re-derives the blending state. Returns the new
    /// transparency flag.
    pub fn apply_properties(&mut self, properties: MaterialProperties) -> bool {
        self.properties = properties;
        self.transparent = properties.is_transparent();
        self.depth_write = !self.transparent;
        self.revision += 1;
        self.transparent
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_standard_plastic() {
        let defaults = MaterialProperties::default();
        assert_eq!(defaults.metalness, 0.0);
        assert_eq!(defaults.roughness, 0.2);
        assert_eq!(defaults.clearcoat, 1.0);
        assert_eq!(defaults.clearcoat_roughness, 0.1);
        assert_eq!(defaults.reflectivity, 0.8);
        assert_eq!(defaults.ior, 1.5);
        assert_eq!(defaults.transmission, 0.0);
        assert_eq!(defaults.thickness, 0.5);
        assert_eq!(defaults.opacity, 1.0);
    }

    #[test]
    fn edits_stay_in_range_for_any_input() {
        let inputs = [
            -1.0e9,
            -3.5,
            -0.0,
            0.005,
            0.5,
            1.0,
            2.2,
            4.99,
            7.0,
            1.0e9,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::NAN,
        ];
        for field in MaterialField::ALL {
            let range = field.range();
            for value in inputs {
                let edited = MaterialProperties::default().with(field, value).get(field);
                assert!(
                    edited >= range.min && edited <= range.max,
                    "{field:?} <- {value} gave {edited}"
                );
            }
        }
    }

    #[test]
    fn with_changes_only_the_named_field() {
        let base = MaterialProperties::default();
        let edited = base.with(MaterialField::Thickness, 3.3);
        assert_eq!(edited.thickness, 3.3);
        assert_eq!(edited.with(MaterialField::Thickness, base.thickness), base);
    }

    #[test]
    fn numeric_text_parses_with_clamp_and_min_fallback() {
        let ior = MaterialField::Ior.range();
        assert_eq!(ior.parse("2.25"), 2.25);
        assert_eq!(ior.parse("9"), 3.0);
        assert_eq!(ior.parse("0"), 1.0);
        assert_eq!(ior.parse("glass"), 1.0);
        assert_eq!(ior.parse("NaN"), 1.0);
        assert_eq!(ior.parse(""), 1.0);
        assert_eq!(MaterialField::Opacity.range().parse(" 0.4 "), 0.4);
        let thickness = MaterialField::Thickness.range();
        for text in ["inf", "-inf", "infinity", "+Infinity"] {
            assert_eq!(thickness.parse(text), 0.0, "{text}");
        }
    }

    #[test]
    fn snapping_noise_is_not_an_edit() {
        let unit = MaterialField::Roughness.range();
        assert!(!unit.is_edit(0.2, 0.19999999));
        assert!(!unit.is_edit(0.8, 0.79999995));
        assert!(!unit.is_edit(0.1, 0.099999994));
        assert!(unit.is_edit(0.2, 0.21));
        assert!(unit.is_edit(0.0, 1.0));
        let thickness = MaterialField::Thickness.range();
        assert!(!thickness.is_edit(0.5, 0.52));
        assert!(thickness.is_edit(0.5, 0.6));
    }

    #[test]
    fn transparency_follows_opacity_and_transmission() {
        let opaque = MaterialProperties::default();
        assert!(!opaque.is_transparent());
        assert!(opaque.with(MaterialField::Opacity, 0.99).is_transparent());
        assert!(opaque.with(MaterialField::Transmission, 0.01).is_transparent());
        assert!(!opaque.with(MaterialField::Transmission, 0.0).is_transparent());
    }

    #[test]
    fn material_depth_write_is_inverse_of_transparent() {
        let mut material = PhysicalMaterial::new(Rgb::WHITE, MaterialProperties::default());
        assert!(!material.transparent);
        assert!(material.depth_write);
        for preset in PRESETS {
            material.apply_properties(preset.properties);
            assert_eq!(material.transparent, preset.properties.is_transparent());
            assert_eq!(material.depth_write, !material.transparent);
        }
    }

    #[test]
    fn presets_are_exact_literals() {
        let glass = PRESETS
            .iter()
            .find(|preset| preset.name == "Glass")
            .unwrap()
            .properties;
        assert_eq!(
            glass,
            MaterialProperties {
                metalness: 0.0,
                roughness: 0.0,
                clearcoat: 1.0,
                clearcoat_roughness: 0.0,
                reflectivity: 0.9,
                ior: 1.5,
                transmission: 0.95,
                thickness: 1.0,
                opacity: 0.1,
            }
        );
        let names: Vec<_> = PRESETS.iter().map(|preset| preset.name).collect();
        assert_eq!(
            names,
            ["Standard Plastic", "Polished Metal", "Glass", "Rubber"]
        );
        for preset in PRESETS {
            assert_eq!(preset.properties.clamped(), preset.properties);
        }
    }

    #[test]
    fn revision_bumps_on_every_mutation() {
        let mut material = PhysicalMaterial::new(Rgb::BLACK, MaterialProperties::default());
        let start = material.revision();
        material.set_color(Rgb::WHITE);
        material.apply_properties(PRESETS[2].properties);
        assert_eq!(material.revision(), start + 2);
    }

    #[test]
    fn properties_deserialize_from_partial_camel_case_json() {
        let props: MaterialProperties =
            serde_json::from_str(r#"{"clearcoatRoughness": 0.3, "opacity": 0.5}"#).unwrap();
        assert_eq!(props.clearcoat_roughness, 0.3);
        assert_eq!(props.opacity, 0.5);
        assert_eq!(props.ior, 1.5);
    }
}
