//! glTF import into detached [`SceneNode`] trees, plus the background loader.

pub mod loader;

pub use loader::{AssetLoader, LoadEvent, LoadHandle, LoadSink, LoadedModel};

use crate::scene::{MaterialSlot, MeshData, MeshNode, SceneNode, Transform};
use glam::{Quat, Vec3};
use gltf::mesh::Mode;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read model at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("{path} contains no triangle geometry")]
    NoGeometry { path: String },
    #[error("failed to start loader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Relative paths that do not exist under the working directory are looked
/// up next to the crate manifest.
pub fn resolve_model_path(path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    let manifest_relative = Path::new(env!("CARGO_MANIFEST_DIR")).join(path);
    if manifest_relative.exists() {
        manifest_relative
    } else {
        path.to_path_buf()
    }
}

/// Parses `.gltf`/`.glb` bytes read from `path` into a group holding one mesh
/// node per triangle primitive. Node transforms are preserved; every mesh
/// gets the shared material slot.
pub fn import_gltf(path: &Path, bytes: &[u8]) -> Result<SceneNode, AssetError> {
    let label = path.display().to_string();
    let gltf_error = |source| AssetError::Gltf {
        path: label.clone(),
        source,
    };
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).map_err(gltf_error)?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob).map_err(gltf_error)?;

    let name = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("gltf")
        .to_string();
    let mut root = SceneNode::group(name);

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                root.children.push(convert_node(&node, &buffers));
            }
        }
        // Scene-less files still get their meshes, untransformed.
        None => {
            for mesh in document.meshes() {
                root.children.extend(convert_mesh(&mesh, &buffers));
            }
        }
    }

    if root.mesh_count() == 0 {
        return Err(AssetError::NoGeometry { path: label });
    }
    Ok(root)
}

fn convert_node(node: &gltf::Node<'_>, buffers: &[gltf::buffer::Data]) -> SceneNode {
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut converted = SceneNode::group(node.name().unwrap_or("node")).with_transform(Transform {
        translation: Vec3::from_array(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from_array(scale),
    });
    if let Some(mesh) = node.mesh() {
        converted.children.extend(convert_mesh(&mesh, buffers));
    }
    for child in node.children() {
        converted.children.push(convert_node(&child, buffers));
    }
    converted
}

fn convert_mesh(mesh: &gltf::Mesh<'_>, buffers: &[gltf::buffer::Data]) -> Vec<SceneNode> {
    let name = mesh.name().unwrap_or("mesh");
    mesh.primitives()
        .filter(|primitive| primitive.mode() == Mode::Triangles)
        .filter_map(|primitive| {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));
            let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
            if positions.is_empty() {
                return None;
            }
            let normals = reader.read_normals().map(|normals| normals.collect());
            let indices = reader
                .read_indices()
                .map(|indices| indices.into_u32().collect());
            let data = MeshData::new(positions, normals, indices);
            if data.triangle_count() == 0 {
                return None;
            }
            Some(SceneNode::mesh(name, MeshNode::new(data, MaterialSlot::Shared)))
        })
        .collect()
}
