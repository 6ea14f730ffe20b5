use crate::scene::{MeshData, MeshId};
use bytemuck::{Pod, Zeroable};
use std::collections::{HashMap, HashSet};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Interleaves positions and normals; missing normals are zero.
pub fn interleave(mesh: &MeshData) -> Vec<Vertex> {
    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, position)| Vertex {
            position: *position,
            normal: mesh.normals.get(i).copied().unwrap_or([0.0; 3]),
        })
        .collect()
}

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// GPU buffers keyed by mesh identity. Meshes not seen in a frame are freed.
#[derive(Default)]
pub struct MeshCache {
    meshes: HashMap<MeshId, GpuMesh>,
}

impl MeshCache {
    pub fn get(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(&id)
    }

    /// Uploads new meshes and drops the ones no longer referenced.
    pub fn sync<'a>(&mut self, device: &wgpu::Device, meshes: impl IntoIterator<Item = &'a MeshData>) {
        let mut live = HashSet::new();
        for mesh in meshes {
            live.insert(mesh.id());
            self.meshes
                .entry(mesh.id())
                .or_insert_with(|| upload(device, mesh));
        }
        let before = self.meshes.len();
        self.meshes.retain(|id, _| live.contains(id));
        let evicted = before - self.meshes.len();
        if evicted > 0 {
            log::debug!("released {evicted} GPU meshes");
        }
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}

fn upload(device: &wgpu::Device, mesh: &MeshData) -> GpuMesh {
    let vertices = interleave(mesh);
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("mesh vertices"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("mesh indices"),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    log::debug!(
        "uploaded mesh {:?}: {} vertices, {} triangles",
        mesh.id(),
        vertices.len(),
        mesh.triangle_count()
    );
    GpuMesh {
        vertex_buffer,
        index_buffer,
        index_count: mesh.indices.len() as u32,
    }
}
