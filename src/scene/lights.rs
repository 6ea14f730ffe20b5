use crate::material::Rgb;
use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Rgb,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    /// Half-width of the orthographic shadow frustum.
    pub extent: f32,
    pub near: f32,
    pub far: f32,
    pub bias: f32,
    pub normal_bias: f32,
    /// PCF kernel radius in texels.
    pub radius: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 4096,
            extent: 10.0,
            near: 0.1,
            far: 50.0,
            bias: -0.0001,
            normal_bias: 0.02,
            radius: 4.0,
        }
    }
}

/// Light shining from `position` towards the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Rgb,
    pub intensity: f32,
    pub position: Vec3,
    pub shadow: Option<ShadowSettings>,
}

impl DirectionalLight {
    /// Unit vector from the surface towards the light.
    pub fn direction(&self) -> Vec3 {
        self.position.try_normalize().unwrap_or(Vec3::Y)
    }

    pub fn radiance(&self) -> [f32; 3] {
        scaled(self.color, self.intensity)
    }

    /// View-projection of the shadow camera, if this light casts shadows.
    pub fn shadow_view_projection(&self) -> Option<Mat4> {
        let shadow = self.shadow?;
        let up = if self.direction().abs_diff_eq(Vec3::Y, 1e-3) {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(self.position, Vec3::ZERO, up);
        let projection = Mat4::orthographic_rh(
            -shadow.extent,
            shadow.extent,
            -shadow.extent,
            shadow.extent,
            shadow.near,
            shadow.far,
        );
        Some(projection * view)
    }
}

/// Ambient fill plus a shadow-casting key light and a soft fill light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient: AmbientLight,
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
}

impl LightRig {
    pub fn new(shadow_map_size: u32) -> Self {
        Self {
            ambient: AmbientLight {
                color: Rgb::from_u32(0x404040),
                intensity: 0.6,
            },
            key: DirectionalLight {
                color: Rgb::WHITE,
                intensity: 0.8,
                position: Vec3::new(10.0, 10.0, 5.0),
                shadow: Some(ShadowSettings {
                    map_size: shadow_map_size,
                    ..ShadowSettings::default()
                }),
            },
            fill: DirectionalLight {
                color: Rgb::WHITE,
                intensity: 0.3,
                position: Vec3::new(-5.0, 5.0, -5.0),
                shadow: None,
            },
        }
    }

    pub fn ambient_radiance(&self) -> [f32; 3] {
        scaled(self.ambient.color, self.ambient.intensity)
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self::new(ShadowSettings::default().map_size)
    }
}

fn scaled(color: Rgb, intensity: f32) -> [f32; 3] {
    let [r, g, b] = color.to_linear();
    [r * intensity, g * intensity, b * intensity]
}
