//! Build-phase declaration facade handed to pass setup closures.

use {
    super::{
        node::{NodeHandle, ResourceNode, SubresourceRange},
        FrameGraph,
    },
    crate::driver::{AccessKind, BufferInfo, TextureInfo},
    ash::vk,
    log::warn,
};

/// Records resource usage for the pass currently being declared.
///
/// Only valid during the `setup` closure of [`FrameGraph::add_pass`]; all methods are
/// misuse-tolerant: an invalid handle is logged and the operation becomes a no-op rather than
/// failing the frame.
pub struct PassBuilder<'a> {
    pub(super) graph: &'a mut FrameGraph,
    pub(super) pass_idx: usize,
}

impl PassBuilder<'_> {
    /// Declares a new transient texture produced by this pass.
    pub fn create(&mut self, name: impl Into<String>, info: TextureInfo) -> NodeHandle {
        let idx = self.graph.resources.len();

        self.graph
            .resources
            .push(ResourceNode::texture(name.into(), info, Some(self.pass_idx)));

        let handle = NodeHandle::new(idx);
        self.graph.passes[self.pass_idx].creates.push(handle);

        handle
    }

    /// Imports an externally-owned texture, recorded as created by this pass.
    pub fn import_texture(
        &mut self,
        name: impl Into<String>,
        image: vk::Image,
        info: TextureInfo,
    ) -> NodeHandle {
        let handle = self.graph.import_texture(name, image, info);
        self.adopt(handle)
    }

    /// Imports the backbuffer, recorded as created by this pass.
    pub fn import_backbuffer(
        &mut self,
        name: impl Into<String>,
        image: vk::Image,
        info: TextureInfo,
    ) -> NodeHandle {
        let handle = self.graph.import_backbuffer(name, image, info);
        self.adopt(handle)
    }

    /// Imports an externally-owned buffer, recorded as created by this pass.
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: vk::Buffer,
        info: BufferInfo,
    ) -> NodeHandle {
        let handle = self.graph.import_buffer(name, buffer, info);
        self.adopt(handle)
    }

    /// Declares that this pass reads `handle` with the given intent.
    ///
    /// Invalid handles are rejected with a logged error; the handle is returned unchanged
    /// either way so declarations can be chained.
    pub fn read(&mut self, handle: NodeHandle, access: AccessKind) -> NodeHandle {
        if !self.is_valid(handle) {
            warn!(
                "{}: read of invalid resource handle ignored",
                self.graph.passes[self.pass_idx].name,
            );

            return handle;
        }

        self.graph.passes[self.pass_idx].reads.push((handle, access));

        handle
    }

    /// Declares that this pass writes `handle` with the given intent.
    pub fn write(&mut self, handle: NodeHandle, access: AccessKind) -> NodeHandle {
        if !self.is_valid(handle) {
            warn!(
                "{}: write of invalid resource handle ignored",
                self.graph.passes[self.pass_idx].name,
            );

            return handle;
        }

        self.graph.passes[self.pass_idx].writes.push((handle, access));

        handle
    }

    /// Declares a subresource view over a texture.
    ///
    /// The view shares the root's physical backing and layout state; parent chains stay one
    /// level deep, so a view of a view aliases the same root.
    pub fn view(
        &mut self,
        handle: NodeHandle,
        base_mip_level: u32,
        mip_level_count: u32,
        base_array_layer: u32,
        array_layer_count: u32,
    ) -> NodeHandle {
        if !self.is_valid(handle) {
            warn!(
                "{}: view of invalid resource handle ignored",
                self.graph.passes[self.pass_idx].name,
            );

            return NodeHandle::INVALID;
        }

        let root_idx = self.graph.resources[handle.idx]
            .parent
            .unwrap_or(handle.idx);
        let root = &self.graph.resources[root_idx];

        debug_assert!(root.parent.is_none());

        let Some(&info) = root.texture_info() else {
            warn!(
                "{}: cannot view buffer {}",
                self.graph.passes[self.pass_idx].name, root.name,
            );

            return NodeHandle::INVALID;
        };
        let range = SubresourceRange {
            array_layer_count,
            base_array_layer,
            base_mip_level,
            mip_level_count,
        };
        let name = format!(
            "{} (mips {}..{} layers {}..{})",
            root.name,
            base_mip_level,
            base_mip_level + mip_level_count,
            base_array_layer,
            base_array_layer + array_layer_count,
        );

        let idx = self.graph.resources.len();
        let mut node = ResourceNode::texture(name, info, Some(self.pass_idx));
        node.parent = Some(root_idx);
        node.view_range = Some(range);
        node.layouts.clear();
        self.graph.resources.push(node);

        let handle = NodeHandle {
            idx,
            subresource: Some(range),
        };
        self.graph.passes[self.pass_idx].creates.push(handle);

        handle
    }

    fn adopt(&mut self, handle: NodeHandle) -> NodeHandle {
        self.graph.resources[handle.idx].producer = Some(self.pass_idx);
        self.graph.passes[self.pass_idx].creates.push(handle);

        handle
    }

    fn is_valid(&self, handle: NodeHandle) -> bool {
        handle.is_valid() && handle.idx < self.graph.resources.len()
    }
}
