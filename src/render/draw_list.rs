use crate::material::PhysicalMaterial;
use crate::scene::{MaterialSlot, MeshData, Scene, Traverse};
use glam::{Mat4, Vec3};
use std::cmp::Ordering;
use std::sync::Arc;

/// Pipeline a draw goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Opaque,
    Transparent,
    ShadowCatcher,
}

impl Pass {
    pub fn is_blended(self) -> bool {
        !matches!(self, Pass::Opaque)
    }
}

#[derive(Debug, Clone)]
pub struct DrawItem {
    pub mesh: Arc<MeshData>,
    pub world: Mat4,
    pub slot: MaterialSlot,
    pub render_order: i32,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub pass: Pass,
    /// Squared distance from the camera to the mesh centre.
    pub distance_sq: f32,
}

/// Flattens the scene into draw order: opaque meshes first (by render order,
/// front to back), then blended ones (by render order, back to front).
pub fn build_draw_list(
    scene: &Scene,
    material: Option<&PhysicalMaterial>,
    eye: Vec3,
) -> Vec<DrawItem> {
    let transparent = material.is_some_and(|material| material.transparent);
    let mut items = Vec::new();
    scene.for_each_mesh(Mat4::IDENTITY, &mut |world, node| {
        let pass = match node.material {
            MaterialSlot::Shared if transparent => Pass::Transparent,
            MaterialSlot::Shared | MaterialSlot::Lambert(_) => Pass::Opaque,
            MaterialSlot::ShadowCatcher { .. } => Pass::ShadowCatcher,
        };
        let center = node.mesh.bounds().transformed(world).center();
        items.push(DrawItem {
            mesh: Arc::clone(&node.mesh),
            world,
            slot: node.material,
            render_order: node.render_order,
            cast_shadow: node.cast_shadow,
            receive_shadow: node.receive_shadow,
            pass,
            distance_sq: center.distance_squared(eye),
        });
    });
    items.sort_by(draw_order);
    items
}

fn draw_order(a: &DrawItem, b: &DrawItem) -> Ordering {
    a.pass
        .is_blended()
        .cmp(&b.pass.is_blended())
        .then(a.render_order.cmp(&b.render_order))
        .then_with(|| {
            if a.pass.is_blended() {
                b.distance_sq.total_cmp(&a.distance_sq)
            } else {
                a.distance_sq.total_cmp(&b.distance_sq)
            }
        })
}
