use crate::material::{PhysicalMaterial, Rgb};
use crate::render::camera::PerspectiveCamera;
use crate::scene::{LightRig, MaterialSlot};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Dynamic-offset stride of the object uniform buffer.
pub const OBJECT_STRIDE: u64 = 256;

pub const MODE_PHYSICAL: f32 = 0.0;
pub const MODE_LAMBERT: f32 = 1.0;
pub const MODE_SHADOW_CATCHER: f32 = 2.0;

/// Per-frame camera, lighting and shadow data. Mirrors `Frame` in
/// `common.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub background: [f32; 4],
    pub ambient: [f32; 4],
    pub key_dir: [f32; 4],
    /// `w` is 1 when the key light casts shadows.
    pub key_color: [f32; 4],
    pub fill_dir: [f32; 4],
    pub fill_color: [f32; 4],
    /// bias, normal bias, PCF radius in texels, 1 / map size
    pub shadow_params: [f32; 4],
}

impl FrameUniforms {
    pub fn new(camera: &PerspectiveCamera, lights: &LightRig, background: Rgb) -> Self {
        let key_shadow = lights.key.shadow_view_projection();
        let shadow = lights.key.shadow.unwrap_or_default();
        let [ar, ag, ab] = lights.ambient_radiance();
        let [kr, kg, kb] = lights.key.radiance();
        let [fr, fg, fb] = lights.fill.radiance();
        let [br, bg, bb] = background.to_linear();
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_view_proj: key_shadow.unwrap_or(Mat4::IDENTITY).to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            background: [br, bg, bb, 1.0],
            ambient: [ar, ag, ab, 0.0],
            key_dir: lights.key.direction().extend(0.0).to_array(),
            key_color: [kr, kg, kb, if key_shadow.is_some() { 1.0 } else { 0.0 }],
            fill_dir: lights.fill.direction().extend(0.0).to_array(),
            fill_color: [fr, fg, fb, 0.0],
            shadow_params: [
                shadow.bias,
                shadow.normal_bias,
                shadow.radius,
                1.0 / shadow.map_size.max(1) as f32,
            ],
        }
    }
}

/// Per-draw transform and shading inputs, padded to [`OBJECT_STRIDE`].
/// Mirrors `Object` in `common.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// Linear rgb, opacity.
    pub base_color: [f32; 4],
    /// metalness, roughness, reflectivity, ior
    pub pbr: [f32; 4],
    /// clearcoat, clearcoat roughness, transmission, thickness
    pub coat: [f32; 4],
    /// mode, alpha test, receives shadow, double sided
    pub flags: [f32; 4],
    _pad: [[f32; 4]; 4],
}

impl ObjectUniforms {
    pub fn new(
        world: Mat4,
        slot: MaterialSlot,
        receive_shadow: bool,
        material: Option<&PhysicalMaterial>,
    ) -> Self {
        let receive = if receive_shadow { 1.0 } else { 0.0 };
        let (base_color, pbr, coat, flags) = match (slot, material) {
            (MaterialSlot::Shared, Some(material)) => {
                let props = material.properties;
                let [r, g, b] = material.color.to_linear();
                (
                    [r, g, b, props.opacity],
                    [props.metalness, props.roughness, props.reflectivity, props.ior],
                    [
                        props.clearcoat,
                        props.clearcoat_roughness,
                        props.transmission,
                        props.thickness,
                    ],
                    [
                        MODE_PHYSICAL,
                        material.alpha_test,
                        receive,
                        if material.double_sided { 1.0 } else { 0.0 },
                    ],
                )
            }
            // Shared slots render plain white until the material exists.
            (MaterialSlot::Shared, None) => lambert(Rgb::WHITE, receive),
            (MaterialSlot::Lambert(color), _) => lambert(color, receive),
            (MaterialSlot::ShadowCatcher { opacity }, _) => (
                [0.0, 0.0, 0.0, opacity],
                [0.0; 4],
                [0.0; 4],
                [MODE_SHADOW_CATCHER, 0.0, 1.0, 0.0],
            ),
        };
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: world.inverse().transpose().to_cols_array_2d(),
            base_color,
            pbr,
            coat,
            flags,
            _pad: [[0.0; 4]; 4],
        }
    }
}

type Shading = ([f32; 4], [f32; 4], [f32; 4], [f32; 4]);

fn lambert(color: Rgb, receive: f32) -> Shading {
    let [r, g, b] = color.to_linear();
    (
        [r, g, b, 1.0],
        [0.0, 1.0, 0.0, 1.5],
        [0.0; 4],
        [MODE_LAMBERT, 0.0, receive, 0.0],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::PRESETS;
    use glam::Vec3;

    #[test]
    fn layouts_match_shader_sizes() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 256);
        assert_eq!(std::mem::size_of::<ObjectUniforms>() as u64, OBJECT_STRIDE);
    }

    #[test]
    fn shared_slot_packs_material_fields() {
        let material = PhysicalMaterial::new(Rgb::WHITE, PRESETS[2].properties);
        let object = ObjectUniforms::new(Mat4::IDENTITY, MaterialSlot::Shared, true, Some(&material));
        assert_eq!(object.base_color[3], 0.1);
        assert_eq!(object.pbr, [0.0, 0.0, 0.9, 1.5]);
        assert_eq!(object.coat, [1.0, 0.0, 0.95, 1.0]);
        assert_eq!(object.flags, [MODE_PHYSICAL, 0.001, 1.0, 1.0]);
    }

    #[test]
    fn shadow_catcher_carries_opacity() {
        let object = ObjectUniforms::new(
            Mat4::IDENTITY,
            MaterialSlot::ShadowCatcher { opacity: 0.3 },
            true,
            None,
        );
        assert_eq!(object.base_color[3], 0.3);
        assert_eq!(object.flags[0], MODE_SHADOW_CATCHER);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let object = ObjectUniforms::new(world, MaterialSlot::Lambert(Rgb::BLACK), false, None);
        let normal = Mat4::from_cols_array_2d(&object.normal_matrix);
        let n = normal.transform_vector3(Vec3::X);
        assert!((n.x - 0.5).abs() < 1e-6);
        assert_eq!(object.flags[2], 0.0);
    }

    #[test]
    fn frame_uniforms_encode_lights_and_shadow_flag() {
        let camera = PerspectiveCamera::default();
        let lights = LightRig::default();
        let frame = FrameUniforms::new(&camera, &lights, Rgb::WHITE);
        assert_eq!(frame.key_color[3], 1.0);
        assert_eq!(frame.fill_color[3], 0.0);
        assert_eq!(frame.camera_pos, [0.0, 0.0, 5.0, 1.0]);
        assert!((frame.shadow_params[3] - 1.0 / 4096.0).abs() < 1e-9);
        assert!(frame.background[..3].iter().all(|c| (c - 1.0).abs() < 1e-6));
    }
}
