//! Execute-phase resolution facade handed to pass executors.

use {
    super::node::{NodeHandle, ResourceBacking, ResourceNode, SubresourceRange},
    crate::{
        driver::{BindlessRegistry, RenderDevice, TextureInfo, vk},
        pool::{BindlessKind, RootTexture, TexturePool, INVALID_BINDLESS_INDEX},
    },
    log::warn,
};

/// Resolves virtual handles to physical resources during pass execution.
///
/// Missing or invalid backings resolve to null handles and the sentinel bindless index, with
/// a logged warning; executors stay total functions over whatever the frame declared.
pub struct FrameResources<'a> {
    pub(super) bindless: &'a mut dyn BindlessRegistry,
    pub(super) device: &'a mut dyn RenderDevice,
    pub(super) frame: u64,
    pub(super) pool: &'a mut TexturePool,
    pub(super) resources: &'a [ResourceNode],
}

impl FrameResources<'_> {
    /// Returns the physical image behind a handle, or a null image.
    pub fn texture(&self, handle: NodeHandle) -> vk::Image {
        match self.root(handle).map(|root| root.backing) {
            Some(ResourceBacking::Texture { image, .. }) => image,
            _ => {
                warn!("no texture backing for handle {:?}", handle);

                vk::Image::null()
            }
        }
    }

    /// Returns the physical buffer behind a handle, or a null buffer.
    pub fn buffer(&self, handle: NodeHandle) -> vk::Buffer {
        match self.root(handle).map(|root| root.backing) {
            Some(ResourceBacking::Buffer { buffer }) => buffer,
            _ => {
                warn!("no buffer backing for handle {:?}", handle);

                vk::Buffer::null()
            }
        }
    }

    /// Returns the layout the handle's first subresource unit is currently in.
    ///
    /// Barriers for the executing pass have already been applied, so this is the layout the
    /// executor's commands will observe.
    pub fn texture_layout(&self, handle: NodeHandle) -> vk::ImageLayout {
        let Some(root) = self.root(handle) else {
            return vk::ImageLayout::UNDEFINED;
        };
        let Some(info) = root.texture_info() else {
            return vk::ImageLayout::UNDEFINED;
        };
        let range = handle
            .subresource
            .unwrap_or(SubresourceRange::full(
                info.mip_level_count,
                info.array_layer_count,
            ))
            .clamp_to(info.mip_level_count, info.array_layer_count);
        let unit = (range.base_array_layer * info.mip_level_count + range.base_mip_level) as usize;

        root.layouts
            .get(unit)
            .copied()
            .unwrap_or(vk::ImageLayout::UNDEFINED)
    }

    /// Returns the creation description of a texture handle.
    pub fn texture_info(&self, handle: NodeHandle) -> Option<TextureInfo> {
        self.root(handle)?.texture_info().copied()
    }

    /// Returns the resolved pixel extent of a texture handle.
    pub fn texture_extent(&self, handle: NodeHandle) -> (u32, u32) {
        self.root(handle)
            .map(|root| root.resolved_extent)
            .unwrap_or((0, 0))
    }

    /// Returns the bindless sampled-image slot for a handle, creating and caching a
    /// subresource view if the handle does not span its whole root.
    pub fn texture_index(&mut self, handle: NodeHandle) -> u32 {
        self.view_index(handle, BindlessKind::Sampled)
    }

    /// Returns the bindless storage-image slot for a handle.
    pub fn storage_image_index(&mut self, handle: NodeHandle) -> u32 {
        self.view_index(handle, BindlessKind::Storage)
    }

    fn view_index(&mut self, handle: NodeHandle, kind: BindlessKind) -> u32 {
        let Some(root) = self.root(handle) else {
            warn!("no resource for handle {:?}", handle);

            return INVALID_BINDLESS_INDEX;
        };
        let Some(&info) = root.texture_info() else {
            warn!("bindless slots are only available for textures ({})", root.name);

            return INVALID_BINDLESS_INDEX;
        };
        let ResourceBacking::Texture { image, pool_idx } = root.backing else {
            warn!("no texture backing for {}", root.name);

            return INVALID_BINDLESS_INDEX;
        };
        let range = handle.subresource.unwrap_or(SubresourceRange::full(
            info.mip_level_count,
            info.array_layer_count,
        ));

        self.pool.view_index(
            &mut *self.device,
            &mut *self.bindless,
            self.frame,
            RootTexture {
                array_layer_count: info.array_layer_count,
                fmt: info.fmt,
                image,
                mip_level_count: info.mip_level_count,
                pool_idx,
            },
            range,
            kind,
        )
    }

    fn root(&self, handle: NodeHandle) -> Option<&ResourceNode> {
        if !handle.is_valid() {
            return None;
        }

        let node = self.resources.get(handle.idx)?;
        let root_idx = node.parent.unwrap_or(handle.idx);

        self.resources.get(root_idx)
    }
}
