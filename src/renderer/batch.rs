use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec4};

use super::flags::RenderType;
use super::instance::InstanceData;
use crate::asset::MeshRef;

/// An entity that submitted a model draw. Passes reach back through it for
/// per-instance state the instance data does not carry.
pub trait Drawable {
    /// Joint palette for skinned meshes, `None` for rigid ones.
    fn skinning_matrices(&self) -> Option<&[Mat4]> {
        None
    }
}

pub type DrawableRef = Arc<dyn Drawable>;

/// One entity's request to draw a model this frame.
#[derive(Clone)]
pub struct ModelDrawRequest {
    pub mesh: Option<MeshRef>,
    pub world: Mat4,
    pub render_type: RenderType,
    pub color: Vec4,
    pub tiling: Vec2,
    pub offset: Vec2,
    pub owner: Option<DrawableRef>,
}

impl ModelDrawRequest {
    pub fn new(mesh: MeshRef, world: Mat4, render_type: RenderType) -> Self {
        Self {
            mesh: Some(mesh),
            world,
            render_type,
            color: Vec4::ONE,
            tiling: Vec2::ONE,
            offset: Vec2::ZERO,
            owner: None,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_tiling(mut self, tiling: Vec2, offset: Vec2) -> Self {
        self.tiling = tiling;
        self.offset = offset;
        self
    }

    pub fn with_owner(mut self, owner: DrawableRef) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn instance(&self) -> InstanceData {
        InstanceData::new(self.world, self.tiling, self.offset, self.color)
    }
}

/// Mesh identity: two keys are equal only if they point at the same model.
#[derive(Clone)]
struct MeshKey(MeshRef);

impl PartialEq for MeshKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MeshKey {}

impl Hash for MeshKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

/// Instances of one mesh for one pass, with the entity behind each.
#[derive(Default)]
pub struct BatchEntry {
    pub instances: Vec<InstanceData>,
    pub owners: Vec<Option<DrawableRef>>,
}

impl BatchEntry {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Draw requests grouped by mesh identity, in first-submission order.
#[derive(Default)]
pub struct ModelBatches {
    lookup: HashMap<MeshKey, usize>,
    entries: Vec<(MeshRef, BatchEntry)>,
}

impl ModelBatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mesh: &MeshRef, instance: InstanceData, owner: Option<DrawableRef>) {
        let index = *self
            .lookup
            .entry(MeshKey(Arc::clone(mesh)))
            .or_insert_with(|| {
                self.entries
                    .push((Arc::clone(mesh), BatchEntry::default()));
                self.entries.len() - 1
            });

        let entry = &mut self.entries[index].1;
        entry.instances.push(instance);
        entry.owners.push(owner);
    }

    pub fn get(&self, mesh: &MeshRef) -> Option<&BatchEntry> {
        self.lookup
            .get(&MeshKey(Arc::clone(mesh)))
            .map(|&index| &self.entries[index].1)
    }

    /// Non-empty entries only.
    pub fn iter(&self) -> impl Iterator<Item = (&MeshRef, &BatchEntry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(mesh, entry)| (mesh, entry))
    }

    /// Number of distinct meshes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn instance_count(&self) -> usize {
        self.entries.iter().map(|(_, entry)| entry.len()).sum()
    }

    /// Drops every entry, releasing the mesh and owner references with them.
    pub fn clear(&mut self) {
        self.lookup.clear();
        self.entries.clear();
    }
}
