use std::sync::Arc;

use crate::device::ResourceId;

/// Immutable geometry produced by the model loader.
///
/// The renderer never looks inside; it groups draw requests by the identity
/// of the `Arc` holding this and hands it back to the passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelData {
    pub name: String,
    pub vertex_buffer: Option<ResourceId>,
    pub index_buffer: Option<ResourceId>,
    pub index_count: u32,
    /// Joints driven by the skinning matrices of each instance's owner.
    pub joint_count: u32,
}

impl ModelData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex_buffer: None,
            index_buffer: None,
            index_count: 0,
            joint_count: 0,
        }
    }

    pub fn with_geometry(mut self, vertices: ResourceId, indices: ResourceId, count: u32) -> Self {
        self.vertex_buffer = Some(vertices);
        self.index_buffer = Some(indices);
        self.index_count = count;
        self
    }

    pub fn with_joints(mut self, joint_count: u32) -> Self {
        self.joint_count = joint_count;
        self
    }
}

pub type MeshRef = Arc<ModelData>;

/// The four-vertex quad every sprite is drawn with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteQuad {
    pub vertex_buffer: ResourceId,
    pub vertex_count: u32,
}

impl SpriteQuad {
    pub fn new(vertex_buffer: ResourceId) -> Self {
        Self {
            vertex_buffer,
            vertex_count: 4,
        }
    }
}
