//! Boundary interfaces towards the GPU device and descriptor-table services.
//!
//! The graph core never talks to a graphics API directly: it creates and destroys physical
//! resources through [`RenderDevice`], acquires bindless slots through [`BindlessRegistry`]
//! and records exactly one kind of command, [`CommandEncoder::pipeline_barrier`]. Everything
//! else (draws, dispatches, copies) is recorded by the pass executors themselves.

mod access;
mod buffer;
mod texture;

pub use {
    self::{
        access::AccessKind,
        buffer::{BufferInfo, BufferInfoBuilder},
        texture::{ClearValue, TextureExtent, TextureInfo, TextureInfoBuilder, TextureViewInfo},
    },
    ash::vk,
};

use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Returns the aspects of an image a format carries data for.
pub const fn format_aspect_mask(fmt: vk::Format) -> vk::ImageAspectFlags {
    match fmt {
        vk::Format::D16_UNORM => vk::ImageAspectFlags::DEPTH,
        vk::Format::X8_D24_UNORM_PACK32 => vk::ImageAspectFlags::DEPTH,
        vk::Format::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT => vk::ImageAspectFlags::from_raw(
            vk::ImageAspectFlags::DEPTH.as_raw() | vk::ImageAspectFlags::STENCIL.as_raw(),
        ),
        vk::Format::D24_UNORM_S8_UINT => vk::ImageAspectFlags::from_raw(
            vk::ImageAspectFlags::DEPTH.as_raw() | vk::ImageAspectFlags::STENCIL.as_raw(),
        ),
        vk::Format::D32_SFLOAT_S8_UINT => vk::ImageAspectFlags::from_raw(
            vk::ImageAspectFlags::DEPTH.as_raw() | vk::ImageAspectFlags::STENCIL.as_raw(),
        ),
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Returns `true` for formats which carry a depth aspect.
pub const fn is_depth_format(fmt: vk::Format) -> bool {
    matches!(
        fmt,
        vk::Format::D16_UNORM
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// Extent of one axis at a given mip level.
pub const fn mip_extent(extent: u32, mip_level: u32) -> u32 {
    let extent = extent >> mip_level;

    if extent == 0 { 1 } else { extent }
}

/// A single image layout transition plus memory dependency, in graph-native form.
///
/// These are batched per pass and handed to [`CommandEncoder::pipeline_barrier`] in one call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TextureBarrier {
    /// The number of layers affected.
    pub array_layer_count: u32,

    /// The aspects affected.
    pub aspect_mask: vk::ImageAspectFlags,

    /// The first layer affected.
    pub base_array_layer: u32,

    /// The first mip level affected.
    pub base_mip_level: u32,

    /// Memory accesses that must become visible.
    pub dst_access: vk::AccessFlags,

    /// The physical image.
    pub image: vk::Image,

    /// The number of mip levels affected.
    pub mip_level_count: u32,

    /// Layout the affected range transitions to.
    pub new_layout: vk::ImageLayout,

    /// Layout the affected range is currently in.
    pub old_layout: vk::ImageLayout,

    /// Memory accesses that must be made available.
    pub src_access: vk::AccessFlags,
}

/// A memory dependency on a buffer range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferBarrier {
    /// The physical buffer.
    pub buffer: vk::Buffer,

    /// Memory accesses that must become visible.
    pub dst_access: vk::AccessFlags,

    /// First byte affected.
    pub offset: vk::DeviceSize,

    /// Number of bytes affected, or `vk::WHOLE_SIZE`.
    pub size: vk::DeviceSize,

    /// Memory accesses that must be made available.
    pub src_access: vk::AccessFlags,
}

/// Factory for physical textures, buffers and views.
///
/// Implemented over the real device by the renderer; tests drive the graph with a recording
/// mock instead.
pub trait RenderDevice {
    /// Creates a physical texture; `width`/`height` are resolved pixels, never
    /// viewport-relative.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        info: TextureInfo,
        usage: vk::ImageUsageFlags,
    ) -> Result<vk::Image, DriverError>;

    /// Destroys a texture previously returned by [`RenderDevice::create_texture`].
    fn destroy_texture(&mut self, image: vk::Image);

    /// Creates a subresource view over a physical texture.
    fn create_texture_view(
        &mut self,
        image: vk::Image,
        info: TextureViewInfo,
    ) -> Result<vk::ImageView, DriverError>;

    /// Destroys a view previously returned by [`RenderDevice::create_texture_view`].
    fn destroy_texture_view(&mut self, view: vk::ImageView);
}

/// Global descriptor-table service handing out persistent bindless slots.
pub trait BindlessRegistry {
    /// Registers a view as a sampled image and returns its slot.
    fn register_sampled_image(&mut self, view: vk::ImageView) -> u32;

    /// Registers a view as a storage image and returns its slot.
    fn register_storage_image(&mut self, view: vk::ImageView) -> u32;

    /// Releases a sampled image slot.
    fn release_sampled_image(&mut self, index: u32);

    /// Releases a storage image slot.
    fn release_storage_image(&mut self, index: u32);
}

/// Command recording surface. The graph core only ever records pipeline barriers; pass
/// executors may downcast or wrap this to record their own work.
pub trait CommandEncoder {
    /// Records one batched pipeline barrier.
    fn pipeline_barrier(
        &mut self,
        src_stages: vk::PipelineStageFlags,
        dst_stages: vk::PipelineStageFlags,
        buffer_barriers: &[BufferBarrier],
        texture_barriers: &[TextureBarrier],
    );
}

/// Errors from the device boundary.
// TODO: A more robust error type and some proper vk error mapping
#[derive(Debug)]
pub enum DriverError {
    /// The data provided to a function was invalid.
    InvalidData,

    /// The requested feature or format is unsupported.
    Unsupported,

    /// The device has run out of physical memory.
    OutOfMemory,
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Error for DriverError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_masks() {
        assert_eq!(
            format_aspect_mask(vk::Format::R8G8B8A8_UNORM),
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(
            format_aspect_mask(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            format_aspect_mask(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }

    #[test]
    fn depth_formats() {
        assert!(is_depth_format(vk::Format::D16_UNORM));
        assert!(is_depth_format(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(!is_depth_format(vk::Format::R8_UNORM));
    }

    #[test]
    fn mip_extents_clamp_to_one() {
        assert_eq!(mip_extent(512, 0), 512);
        assert_eq!(mip_extent(512, 3), 64);
        assert_eq!(mip_extent(512, 12), 1);
    }
}
