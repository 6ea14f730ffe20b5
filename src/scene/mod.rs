pub mod lights;
pub mod mesh;

pub use lights::LightRig;
pub use mesh::{Aabb, MeshData, MeshId};

use crate::material::Rgb;
use glam::{EulerRot, Mat4, Quat, Vec3};
use std::sync::Arc;

/// Clear color behind the model.
pub const DEFAULT_BACKGROUND: &str = "#ffe6ce";
pub const FALLBACK_CUBE_COLOR: Rgb = Rgb::from_u32(0x6c5ce7);
pub const FALLBACK_CUBE_SIZE: f32 = 2.0;
pub const GROUND_SIZE: f32 = 20.0;
pub const GROUND_HEIGHT: f32 = -2.0;
pub const GROUND_SHADOW_OPACITY: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Rotation from intrinsic X, then Y, then Z angles in radians.
    pub fn from_euler_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            rotation: Quat::from_euler(EulerRot::XYZ, x, y, z),
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// How a mesh is shaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialSlot {
    /// The viewer's single tunable physical material.
    Shared,
    /// Diffuse-only surface with a fixed color.
    Lambert(Rgb),
    /// Invisible except for received shadows.
    ShadowCatcher { opacity: f32 },
}

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub mesh: Arc<MeshData>,
    pub material: MaterialSlot,
    /// Lower orders draw first.
    pub render_order: i32,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl MeshNode {
    pub fn new(mesh: MeshData, material: MaterialSlot) -> Self {
        Self {
            mesh: Arc::new(mesh),
            material,
            render_order: 0,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshNode) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn as_mesh(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.for_each_mesh(Mat4::IDENTITY, &mut |_, _| count += 1);
        count
    }

    /// World-space bounds of every mesh below this node.
    pub fn bounds(&self, parent: Mat4) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.for_each_mesh(parent, &mut |world, mesh| {
            bounds = bounds.union(&mesh.mesh.bounds().transformed(world));
        });
        bounds
    }
}

/// Depth-first visits of the renderable nodes of an object tree.
pub trait Traverse {
    fn for_each_mesh_mut(&mut self, f: &mut dyn FnMut(&mut MeshNode));

    /// Visits meshes with their accumulated world matrix.
    fn for_each_mesh(&self, parent: Mat4, f: &mut dyn FnMut(Mat4, &MeshNode));
}

impl Traverse for SceneNode {
    fn for_each_mesh_mut(&mut self, f: &mut dyn FnMut(&mut MeshNode)) {
        if let NodeKind::Mesh(mesh) = &mut self.kind {
            f(mesh);
        }
        for child in &mut self.children {
            child.for_each_mesh_mut(f);
        }
    }

    fn for_each_mesh(&self, parent: Mat4, f: &mut dyn FnMut(Mat4, &MeshNode)) {
        let world = parent * self.transform.matrix();
        if let NodeKind::Mesh(mesh) = &self.kind {
            f(world, mesh);
        }
        for child in &self.children {
            child.for_each_mesh(world, f);
        }
    }
}

/// Everything the renderer draws: backdrop, lights, ground and the model.
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Rgb,
    pub lights: LightRig,
    ground: Option<SceneNode>,
    model: Option<SceneNode>,
}

impl Scene {
    pub fn new(background: Rgb, shadow_map_size: u32) -> Self {
        Self {
            background,
            lights: LightRig::new(shadow_map_size),
            ground: Some(ground_plane()),
            model: None,
        }
    }

    pub fn model(&self) -> Option<&SceneNode> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut SceneNode> {
        self.model.as_mut()
    }

    pub fn set_model(&mut self, model: SceneNode) {
        self.model = Some(model);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ground.is_none() && self.model.is_none()
    }

    /// Drops every object; lights stay.
    pub fn clear(&mut self) {
        self.ground = None;
        self.model = None;
    }

    /// Ground first, then the model.
    pub fn roots(&self) -> impl Iterator<Item = &SceneNode> {
        self.ground.iter().chain(self.model.iter())
    }
}

impl Traverse for Scene {
    fn for_each_mesh_mut(&mut self, f: &mut dyn FnMut(&mut MeshNode)) {
        for root in self.ground.iter_mut().chain(self.model.iter_mut()) {
            root.for_each_mesh_mut(f);
        }
    }

    fn for_each_mesh(&self, parent: Mat4, f: &mut dyn FnMut(Mat4, &MeshNode)) {
        for root in self.roots() {
            root.for_each_mesh(parent, f);
        }
    }
}

/// Shadow-catching floor below the model.
pub fn ground_plane() -> SceneNode {
    let mut node = MeshNode::new(
        MeshData::plane(GROUND_SIZE, GROUND_SIZE),
        MaterialSlot::ShadowCatcher {
            opacity: GROUND_SHADOW_OPACITY,
        },
    );
    node.render_order = -1;
    node.receive_shadow = true;
    SceneNode::mesh("ground", node).with_transform(Transform {
        translation: Vec3::new(0.0, GROUND_HEIGHT, 0.0),
        ..Transform::from_euler_xyz(-std::f32::consts::FRAC_PI_2, 0.0, 0.0)
    })
}

/// Stand-in shown when the model cannot be loaded.
pub fn fallback_cube() -> SceneNode {
    let mut node = MeshNode::new(
        MeshData::cuboid(FALLBACK_CUBE_SIZE),
        MaterialSlot::Lambert(FALLBACK_CUBE_COLOR),
    );
    node.cast_shadow = true;
    node.receive_shadow = true;
    SceneNode::mesh("fallback-cube", node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> SceneNode {
        let leaf = |name: &str| SceneNode::mesh(name, MeshNode::new(MeshData::cuboid(1.0), MaterialSlot::Shared));
        SceneNode::group("root")
            .with_child(leaf("a"))
            .with_child(
                SceneNode::group("nested")
                    .with_transform(Transform {
                        translation: Vec3::new(10.0, 0.0, 0.0),
                        ..Transform::IDENTITY
                    })
                    .with_child(leaf("b"))
                    .with_child(leaf("c")),
            )
    }

    #[test]
    fn traversal_reaches_every_mesh() {
        let mut tree = sample_tree();
        assert_eq!(tree.mesh_count(), 3);
        tree.for_each_mesh_mut(&mut |mesh| mesh.render_order = 1);
        let mut orders = Vec::new();
        tree.for_each_mesh(Mat4::IDENTITY, &mut |_, mesh| orders.push(mesh.render_order));
        assert_eq!(orders, vec![1, 1, 1]);
    }

    #[test]
    fn world_matrices_accumulate_parent_transforms() {
        let tree = sample_tree();
        let bounds = tree.bounds(Mat4::IDENTITY);
        assert_eq!(bounds.min, Vec3::splat(-0.5));
        assert_eq!(bounds.max, Vec3::new(10.5, 0.5, 0.5));
    }

    #[test]
    fn ground_plane_lies_flat_below_origin() {
        let ground = ground_plane();
        let bounds = ground.bounds(Mat4::IDENTITY);
        assert!((bounds.center().y - GROUND_HEIGHT).abs() < 1e-5);
        assert!(bounds.size().y.abs() < 1e-4);
        assert!((bounds.size().x - GROUND_SIZE).abs() < 1e-4);
        let mesh = ground.as_mesh().unwrap();
        assert_eq!(mesh.render_order, -1);
        assert!(mesh.receive_shadow && !mesh.cast_shadow);
    }

    #[test]
    fn fallback_cube_uses_its_own_material() {
        let cube = fallback_cube();
        let mesh = cube.as_mesh().unwrap();
        assert_eq!(mesh.material, MaterialSlot::Lambert(FALLBACK_CUBE_COLOR));
        assert_eq!(cube.bounds(Mat4::IDENTITY).size(), Vec3::splat(FALLBACK_CUBE_SIZE));
    }

    #[test]
    fn clearing_drops_every_object() {
        let mut scene = Scene::new(Rgb::WHITE, 2048);
        scene.set_model(fallback_cube());
        assert_eq!(scene.roots().count(), 2);
        scene.clear();
        assert!(scene.is_empty());
        let mut visited = 0;
        scene.for_each_mesh(Mat4::IDENTITY, &mut |_, _| visited += 1);
        assert_eq!(visited, 0);
    }

    #[test]
    fn euler_rotation_composes_x_before_y() {
        let t = Transform::from_euler_xyz(0.3, 0.7, 0.0);
        let expected = Mat4::from_rotation_x(0.3) * Mat4::from_rotation_y(0.7);
        assert!(t.matrix().abs_diff_eq(expected, 1e-5));
    }
}
