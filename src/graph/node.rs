//! Virtual-graph node records. Plain data; all behavior lives in the graph, the solver and
//! the pool.

use {
    super::resources::FrameResources,
    crate::driver::{AccessKind, BufferInfo, CommandEncoder, TextureInfo},
    ash::vk,
    std::fmt::{Debug, Formatter},
};

pub(crate) type NodeIndex = usize;

pub(crate) type ExecFn = Box<dyn FnOnce(&mut FrameResources<'_>, &mut dyn CommandEncoder)>;

/// A mip/layer window into a texture, in root-texture coordinates.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubresourceRange {
    /// The number of layers in the window.
    pub array_layer_count: u32,

    /// The first layer in the window.
    pub base_array_layer: u32,

    /// The first mip level in the window.
    pub base_mip_level: u32,

    /// The number of mip levels in the window.
    pub mip_level_count: u32,
}

impl SubresourceRange {
    /// A window spanning a whole texture of the given shape.
    pub const fn full(mip_level_count: u32, array_layer_count: u32) -> Self {
        Self {
            array_layer_count,
            base_array_layer: 0,
            base_mip_level: 0,
            mip_level_count,
        }
    }

    /// Clamps this window to a texture with the given mip and layer counts.
    pub(crate) fn clamp_to(self, mip_level_count: u32, array_layer_count: u32) -> Self {
        let base_mip_level = self.base_mip_level.min(mip_level_count.saturating_sub(1));
        let base_array_layer = self
            .base_array_layer
            .min(array_layer_count.saturating_sub(1));

        Self {
            array_layer_count: self
                .array_layer_count
                .min(array_layer_count - base_array_layer)
                .max(1),
            base_array_layer,
            base_mip_level,
            mip_level_count: self
                .mip_level_count
                .min(mip_level_count - base_mip_level)
                .max(1),
        }
    }
}

/// Handle to a virtual resource within the current frame.
///
/// Two handles are equal only if they name the same node *and* the same subresource window.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NodeHandle {
    pub(crate) idx: NodeIndex,
    pub(crate) subresource: Option<SubresourceRange>,
}

impl NodeHandle {
    /// The sentinel returned for rejected operations; resolves to nothing.
    pub const INVALID: Self = Self {
        idx: NodeIndex::MAX,
        subresource: None,
    };

    pub(crate) const fn new(idx: NodeIndex) -> Self {
        Self {
            idx,
            subresource: None,
        }
    }

    /// Returns `true` unless this is the invalid sentinel.
    pub fn is_valid(self) -> bool {
        self.idx != NodeIndex::MAX
    }
}

/// Handle to a declared pass.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PassHandle(pub(crate) usize);

#[derive(Clone, Copy, Debug)]
pub(crate) enum ResourceInfo {
    Buffer(BufferInfo),
    Texture(TextureInfo),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ResourceBacking {
    Unresolved,
    Texture {
        image: vk::Image,
        pool_idx: Option<usize>,
    },
    Buffer {
        buffer: vk::Buffer,
    },
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Imported {
    pub is_backbuffer: bool,
}

/// One virtual resource for the current frame.
///
/// A node without `parent` is a root and exclusively owns its layout state; a node with
/// `parent` is a one-level subresource view sharing the parent's backing and layouts.
pub(crate) struct ResourceNode {
    pub backing: ResourceBacking,
    pub culled: bool,
    pub imported: Option<Imported>,
    pub info: ResourceInfo,

    /// Union of the access masks of the last touch; source accesses for the next barrier.
    /// For buffers this doubles as the single tracked state in place of an image layout.
    pub last_access: vk::AccessFlags,

    /// Union of the stages which last touched this root.
    pub last_stages: vk::PipelineStageFlags,

    /// Set when the most recent touch included a write; forces the next barrier.
    pub last_written: bool,

    /// Current layout per (mip, layer) unit, layer-major. Empty for views and buffers.
    pub layouts: Vec<vk::ImageLayout>,

    pub name: String,
    pub parent: Option<NodeIndex>,
    pub producer: Option<usize>,

    /// Resolved pixel extent, filled in during allocation (textures only).
    pub resolved_extent: (u32, u32),

    /// The window a view node covers, in root coordinates.
    pub view_range: Option<SubresourceRange>,
}

impl ResourceNode {
    pub fn texture(name: String, info: TextureInfo, producer: Option<usize>) -> Self {
        let unit_count = info.subresource_unit_count();

        Self {
            backing: ResourceBacking::Unresolved,
            culled: false,
            imported: None,
            info: ResourceInfo::Texture(info),
            last_access: vk::AccessFlags::empty(),
            last_stages: vk::PipelineStageFlags::empty(),
            last_written: false,
            layouts: vec![vk::ImageLayout::UNDEFINED; unit_count],
            name,
            parent: None,
            producer,
            resolved_extent: (0, 0),
            view_range: None,
        }
    }

    pub fn buffer(name: String, info: BufferInfo, producer: Option<usize>) -> Self {
        Self {
            backing: ResourceBacking::Unresolved,
            culled: false,
            imported: None,
            info: ResourceInfo::Buffer(info),
            last_access: vk::AccessFlags::empty(),
            last_stages: vk::PipelineStageFlags::empty(),
            last_written: false,
            layouts: vec![],
            name,
            parent: None,
            producer,
            resolved_extent: (0, 0),
            view_range: None,
        }
    }

    pub fn texture_info(&self) -> Option<&TextureInfo> {
        match &self.info {
            ResourceInfo::Texture(info) => Some(info),
            ResourceInfo::Buffer(_) => None,
        }
    }
}

impl Debug for ResourceNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceNode")
            .field("name", &self.name)
            .field("info", &self.info)
            .field("backing", &self.backing)
            .field("parent", &self.parent)
            .field("producer", &self.producer)
            .field("culled", &self.culled)
            .finish_non_exhaustive()
    }
}

/// One declared pass for the current frame.
pub(crate) struct PassNode {
    pub creates: Vec<NodeHandle>,
    pub culled: bool,
    pub exec: Option<ExecFn>,
    pub name: String,
    pub reads: Vec<(NodeHandle, AccessKind)>,
    pub ref_count: u32,
    pub writes: Vec<(NodeHandle, AccessKind)>,
}

impl PassNode {
    pub fn new(name: String) -> Self {
        Self {
            creates: vec![],
            culled: false,
            exec: None,
            name,
            reads: vec![],
            ref_count: 0,
            writes: vec![],
        }
    }
}

impl Debug for PassNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // exec is a FnOnce and cannot be printed
        f.debug_struct("PassNode")
            .field("name", &self.name)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .field("creates", &self.creates)
            .field("ref_count", &self.ref_count)
            .field("culled", &self.culled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_equality_includes_subresource() {
        let full = NodeHandle::new(3);
        let view = NodeHandle {
            idx: 3,
            subresource: Some(SubresourceRange::full(1, 1)),
        };

        assert_eq!(full, NodeHandle::new(3));
        assert_ne!(full, view);
    }

    #[test]
    fn clamp_limits_base_and_count() {
        let range = SubresourceRange {
            array_layer_count: 4,
            base_array_layer: 1,
            base_mip_level: 6,
            mip_level_count: 10,
        };
        let clamped = range.clamp_to(4, 2);

        assert_eq!(clamped.base_mip_level, 3);
        assert_eq!(clamped.mip_level_count, 1);
        assert_eq!(clamped.base_array_layer, 1);
        assert_eq!(clamped.array_layer_count, 1);
    }
}
