//! Physical texture pooling and the bindless view cache.
//!
//! The pool owns every transient texture the graph allocates. Backings are recycled across
//! frames by exact shape, never destroyed while the pool lives, and each carries persistent
//! sampled and storage bindless slots so descriptor tables stay stable frame to frame.
//! Subresource views are cached separately and evicted after going unused for
//! [`VIEW_TTL_FRAMES`] frames.

use {
    crate::{
        driver::{
            format_aspect_mask, is_depth_format, BindlessRegistry, DriverError, RenderDevice,
            TextureInfo, TextureViewInfo, vk,
        },
        graph::SubresourceRange,
    },
    log::{debug, trace, warn},
    std::collections::HashMap,
};

/// Frames a cached subresource view may go unused before it is destroyed and its bindless
/// slots released.
pub const VIEW_TTL_FRAMES: u64 = 8;

/// Bindless slot returned when a handle cannot be resolved to a view.
pub const INVALID_BINDLESS_INDEX: u32 = u32::MAX;

/// Which descriptor table a slot lookup targets.
#[derive(Clone, Copy, Debug)]
pub(crate) enum BindlessKind {
    Sampled,
    Storage,
}

/// The physical shape of a root texture, resolved out of the graph for slot lookups.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RootTexture {
    pub array_layer_count: u32,
    pub fmt: vk::Format,
    pub image: vk::Image,
    pub mip_level_count: u32,

    /// Pool slot for pooled textures; `None` for imported images.
    pub pool_idx: Option<usize>,
}

struct PoolTexture {
    array_layer_count: u32,
    fmt: vk::Format,
    free: bool,
    height: u32,
    image: vk::Image,
    mip_level_count: u32,
    sampled_index: u32,
    storage_index: u32,
    view: vk::ImageView,
    width: u32,
}

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
struct ViewKey {
    array_layer_count: u32,
    base_array_layer: u32,
    base_mip_level: u32,
    fmt: vk::Format,
    image: vk::Image,
    mip_level_count: u32,
}

struct CachedView {
    last_used_frame: u64,
    sampled_index: u32,
    storage_index: u32,
    view: vk::ImageView,
}

/// Grow-only pool of recycled texture backings plus the subresource view cache.
pub struct TexturePool {
    textures: Vec<PoolTexture>,
    views: HashMap<ViewKey, CachedView>,
}

impl TexturePool {
    pub(crate) fn new() -> Self {
        Self {
            textures: vec![],
            views: Default::default(),
        }
    }

    /// The number of physical textures ever allocated (free and in use).
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Marks every backing reusable and evicts stale cached views.
    pub(crate) fn begin_frame(
        &mut self,
        frame: u64,
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
    ) {
        for texture in &mut self.textures {
            texture.free = true;
        }

        self.views.retain(|_, view| {
            if frame.saturating_sub(view.last_used_frame) <= VIEW_TTL_FRAMES {
                return true;
            }

            trace!(
                "evicting stale view (unused since frame {})",
                view.last_used_frame
            );

            if view.sampled_index != INVALID_BINDLESS_INDEX {
                bindless.release_sampled_image(view.sampled_index);
            }

            if view.storage_index != INVALID_BINDLESS_INDEX {
                bindless.release_storage_image(view.storage_index);
            }

            device.destroy_texture_view(view.view);

            false
        });
    }

    /// Leases a backing for one transient texture, reusing a free backing of identical shape
    /// when one exists and allocating otherwise.
    ///
    /// Returns the physical image, its pool slot and the resolved pixel extent.
    pub(crate) fn lease(
        &mut self,
        name: &str,
        info: TextureInfo,
        viewport: (u32, u32),
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
    ) -> Result<(vk::Image, usize, (u32, u32)), DriverError> {
        let (width, height) = info.extent.resolve(viewport.0, viewport.1);
        let reused = self.textures.iter().position(|it| {
            it.free
                && it.fmt == info.fmt
                && it.width == width
                && it.height == height
                && it.mip_level_count == info.mip_level_count
                && it.array_layer_count == info.array_layer_count
        });
        let pool_idx = match reused {
            Some(pool_idx) => {
                trace!("reusing {}x{} {:?} for {}", width, height, info.fmt, name);

                pool_idx
            }
            None => {
                let usage = if is_depth_format(info.fmt) {
                    vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
                } else {
                    vk::ImageUsageFlags::COLOR_ATTACHMENT
                        | vk::ImageUsageFlags::SAMPLED
                        | vk::ImageUsageFlags::STORAGE
                        | vk::ImageUsageFlags::TRANSFER_SRC
                        | vk::ImageUsageFlags::TRANSFER_DST
                };
                let image = device.create_texture(width, height, info, usage)?;
                let view = device.create_texture_view(
                    image,
                    TextureViewInfo::full(info.fmt, info.mip_level_count, info.array_layer_count),
                )?;
                let sampled_index = bindless.register_sampled_image(view);
                let storage_index = if is_depth_format(info.fmt) {
                    INVALID_BINDLESS_INDEX
                } else {
                    bindless.register_storage_image(view)
                };

                debug!(
                    "allocated {}x{} {:?} mips={} layers={} for {}",
                    width, height, info.fmt, info.mip_level_count, info.array_layer_count, name,
                );

                self.textures.push(PoolTexture {
                    array_layer_count: info.array_layer_count,
                    fmt: info.fmt,
                    free: false,
                    height,
                    image,
                    mip_level_count: info.mip_level_count,
                    sampled_index,
                    storage_index,
                    view,
                    width,
                });

                self.textures.len() - 1
            }
        };

        self.textures[pool_idx].free = false;

        Ok((self.textures[pool_idx].image, pool_idx, (width, height)))
    }

    /// Resolves the bindless slot for a subresource window of a root texture.
    ///
    /// A window spanning the whole of a pooled root short-circuits to the root's own
    /// persistent slot; anything narrower goes through the view cache.
    pub(crate) fn view_index(
        &mut self,
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
        frame: u64,
        root: RootTexture,
        range: SubresourceRange,
        kind: BindlessKind,
    ) -> u32 {
        let range = range.clamp_to(root.mip_level_count, root.array_layer_count);
        let full = range == SubresourceRange::full(root.mip_level_count, root.array_layer_count);

        if full {
            if let Some(pool_idx) = root.pool_idx {
                let texture = &self.textures[pool_idx];

                return match kind {
                    BindlessKind::Sampled => texture.sampled_index,
                    BindlessKind::Storage => texture.storage_index,
                };
            }
        }

        let key = ViewKey {
            array_layer_count: range.array_layer_count,
            base_array_layer: range.base_array_layer,
            base_mip_level: range.base_mip_level,
            fmt: root.fmt,
            image: root.image,
            mip_level_count: range.mip_level_count,
        };

        if let Some(cached) = self.views.get_mut(&key) {
            cached.last_used_frame = frame;

            return match kind {
                BindlessKind::Sampled => cached.sampled_index,
                BindlessKind::Storage => cached.storage_index,
            };
        }

        let view = match device.create_texture_view(
            root.image,
            TextureViewInfo {
                array_layer_count: range.array_layer_count,
                aspect_mask: format_aspect_mask(root.fmt),
                base_array_layer: range.base_array_layer,
                base_mip_level: range.base_mip_level,
                fmt: root.fmt,
                mip_level_count: range.mip_level_count,
            },
        ) {
            Err(err) => {
                warn!("unable to create subresource view: {err}");

                return INVALID_BINDLESS_INDEX;
            }
            Ok(view) => view,
        };
        let sampled_index = bindless.register_sampled_image(view);
        let storage_index = if is_depth_format(root.fmt) {
            INVALID_BINDLESS_INDEX
        } else {
            bindless.register_storage_image(view)
        };

        self.views.insert(
            key,
            CachedView {
                last_used_frame: frame,
                sampled_index,
                storage_index,
                view,
            },
        );

        match kind {
            BindlessKind::Sampled => sampled_index,
            BindlessKind::Storage => storage_index,
        }
    }

    /// Releases every pooled backing, cached view and bindless slot.
    pub(crate) fn destroy(
        &mut self,
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
    ) {
        for (_, view) in self.views.drain() {
            if view.sampled_index != INVALID_BINDLESS_INDEX {
                bindless.release_sampled_image(view.sampled_index);
            }

            if view.storage_index != INVALID_BINDLESS_INDEX {
                bindless.release_storage_image(view.storage_index);
            }

            device.destroy_texture_view(view.view);
        }

        for texture in self.textures.drain(..) {
            bindless.release_sampled_image(texture.sampled_index);

            if texture.storage_index != INVALID_BINDLESS_INDEX {
                bindless.release_storage_image(texture.storage_index);
            }

            device.destroy_texture_view(texture.view);
            device.destroy_texture(texture.image);
        }
    }
}
