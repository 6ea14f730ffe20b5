use glam::{Mat4, Vec3};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a piece of geometry; the renderer keys its GPU
/// buffers on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone)]
pub struct MeshData {
    id: MeshId,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Builds a mesh; without indices the positions are taken as a plain
    /// triangle list. Missing normals are left zeroed until
    /// [`MeshData::compute_vertex_normals`] runs.
    pub fn new(positions: Vec<[f32; 3]>, normals: Option<Vec<[f32; 3]>>, indices: Option<Vec<u32>>) -> Self {
        let indices = indices.unwrap_or_else(|| {
            let count = positions.len() - positions.len() % 3;
            (0..count as u32).collect()
        });
        let normals = match normals {
            Some(normals) if normals.len() == positions.len() => normals,
            _ => vec![[0.0; 3]; positions.len()],
        };
        Self {
            id: MeshId::next(),
            positions,
            normals,
            indices,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Area-weighted smooth normals from the index buffer. Triangles that
    /// reference missing vertices are skipped.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= accum.len() || b >= accum.len() || c >= accum.len() {
                continue;
            }
            let pa = Vec3::from(self.positions[a]);
            let pb = Vec3::from(self.positions[b]);
            let pc = Vec3::from(self.positions[c]);
            let face = (pc - pb).cross(pa - pb);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }
        self.normals = accum
            .into_iter()
            .map(|n| n.normalize_or_zero().to_array())
            .collect();
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().map(|p| Vec3::from(*p)))
    }

    /// 24-vertex box centred on the origin.
    pub fn cuboid(size: f32) -> Self {
        let h = size * 0.5;
        // (normal, tangent u, tangent v) per face
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        ];
        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                positions.push(((normal + u * su + v * sv) * h).to_array());
                normals.push(normal.to_array());
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(positions, Some(normals), Some(indices))
    }

    /// Square in the XY plane facing +Z.
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        let positions = vec![[-hw, -hh, 0.0], [hw, -hh, 0.0], [hw, hh, 0.0], [-hw, hh, 0.0]];
        let normals = vec![[0.0, 0.0, 1.0]; 4];
        Self::new(positions, Some(normals), Some(vec![0, 1, 2, 0, 2, 3]))
    }
}

/// Axis-aligned bounding box. An empty box has `min > max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut bounds, p| {
            bounds.extend(p);
            bounds
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Box around the eight transformed corners.
    pub fn transformed(&self, matrix: Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let corners = (0..8).map(|i| {
            let pick = |bit: usize, lo: f32, hi: f32| if i & bit == 0 { lo } else { hi };
            matrix.transform_point3(Vec3::new(
                pick(1, self.min.x, self.max.x),
                pick(2, self.min.y, self.max.y),
                pick(4, self.min.z, self.max.z),
            ))
        });
        Aabb::from_points(corners)
    }
}
