//! Texture descriptors used by the graph and the pool.

use {
    super::format_aspect_mask,
    ash::vk,
    derive_builder::{Builder, UninitializedFieldError},
};

/// Extent of a graph texture, either in pixels or relative to the frame viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureExtent {
    /// An explicit size in pixels.
    Absolute {
        /// Image extent of the X axis.
        width: u32,

        /// Image extent of the Y axis.
        height: u32,
    },

    /// A fraction of the frame viewport, resolved when physical memory is assigned.
    ViewportRelative {
        /// Multiplier applied to both viewport axes (1.0 = full resolution).
        scale: f32,
    },
}

impl TextureExtent {
    /// Resolves this extent against the frame viewport, in pixels.
    pub fn resolve(self, viewport_width: u32, viewport_height: u32) -> (u32, u32) {
        match self {
            Self::Absolute { width, height } => (width, height),
            Self::ViewportRelative { scale } => (
                ((viewport_width as f32 * scale) as u32).max(1),
                ((viewport_height as f32 * scale) as u32).max(1),
            ),
        }
    }
}

/// Specifies a value used to initialize an attachment before a stage runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    /// A color attachment clear value.
    Color([f32; 4]),

    /// A depth/stencil attachment clear value.
    DepthStencil {
        /// Depth clear value.
        depth: f32,

        /// Stencil clear value.
        stencil: u32,
    },
}

impl From<[f32; 4]> for ClearValue {
    fn from(color: [f32; 4]) -> Self {
        Self::Color(color)
    }
}

impl From<[f32; 3]> for ClearValue {
    fn from(color: [f32; 3]) -> Self {
        Self::Color([color[0], color[1], color[2], 1.0])
    }
}

/// Information used to create a graph texture.
#[derive(Builder, Clone, Copy, Debug)]
#[builder(
    build_fn(private, name = "fallible_build", error = "TextureInfoBuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
#[non_exhaustive]
pub struct TextureInfo {
    /// The number of layers in the texture.
    #[builder(default = "1")]
    pub array_layer_count: u32,

    /// Optional clear value stages may apply before first use.
    #[builder(default)]
    pub clear_value: Option<ClearValue>,

    /// Extent of the texture, explicit or viewport-relative.
    pub extent: TextureExtent,

    /// The format of the texels that will be contained in the texture.
    pub fmt: vk::Format,

    /// The number of levels of detail available for minified sampling.
    #[builder(default = "1")]
    pub mip_level_count: u32,
}

impl TextureInfo {
    /// Specifies a two-dimensional texture with an explicit size.
    #[inline(always)]
    pub const fn texture_2d(width: u32, height: u32, fmt: vk::Format) -> Self {
        Self {
            array_layer_count: 1,
            clear_value: None,
            extent: TextureExtent::Absolute { width, height },
            fmt,
            mip_level_count: 1,
        }
    }

    /// Specifies a two-dimensional texture sized as a fraction of the frame viewport.
    #[inline(always)]
    pub const fn viewport_relative(scale: f32, fmt: vk::Format) -> Self {
        Self {
            array_layer_count: 1,
            clear_value: None,
            extent: TextureExtent::ViewportRelative { scale },
            fmt,
            mip_level_count: 1,
        }
    }

    /// Converts a `TextureInfo` into a `TextureInfoBuilder`.
    #[inline(always)]
    pub fn to_builder(self) -> TextureInfoBuilder {
        TextureInfoBuilder {
            array_layer_count: Some(self.array_layer_count),
            clear_value: Some(self.clear_value),
            extent: Some(self.extent),
            fmt: Some(self.fmt),
            mip_level_count: Some(self.mip_level_count),
        }
    }

    /// The number of (mip, layer) subresource units this texture tracks layout state for.
    pub(crate) fn subresource_unit_count(&self) -> usize {
        (self.mip_level_count * self.array_layer_count) as _
    }
}

impl From<TextureInfoBuilder> for TextureInfo {
    fn from(info: TextureInfoBuilder) -> Self {
        info.build()
    }
}

impl TextureInfoBuilder {
    /// Builds a new `TextureInfo`.
    ///
    /// # Panics
    ///
    /// If `extent` or `fmt` have not been set this function will panic.
    #[inline(always)]
    pub fn build(self) -> TextureInfo {
        match self.fallible_build() {
            Err(TextureInfoBuilderError(err)) => panic!("{err}"),
            Ok(info) => info,
        }
    }
}

#[derive(Debug)]
struct TextureInfoBuilderError(UninitializedFieldError);

impl From<UninitializedFieldError> for TextureInfoBuilderError {
    fn from(err: UninitializedFieldError) -> Self {
        Self(err)
    }
}

/// Information used to create a subresource view over a physical texture.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TextureViewInfo {
    /// The number of layers that will be contained in the view.
    pub array_layer_count: u32,

    /// The portion of the texture that will be contained in the view.
    pub aspect_mask: vk::ImageAspectFlags,

    /// The first array layer that will be contained in the view.
    pub base_array_layer: u32,

    /// The first mip level that will be contained in the view.
    pub base_mip_level: u32,

    /// The format of the view; usually the texture format.
    pub fmt: vk::Format,

    /// The number of mip levels that will be contained in the view.
    pub mip_level_count: u32,
}

impl TextureViewInfo {
    /// A view spanning one whole texture.
    pub fn full(fmt: vk::Format, mip_level_count: u32, array_layer_count: u32) -> Self {
        Self {
            array_layer_count,
            aspect_mask: format_aspect_mask(fmt),
            base_array_layer: 0,
            base_mip_level: 0,
            fmt,
            mip_level_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_relative_extents_round_down_but_never_to_zero() {
        let extent = TextureExtent::ViewportRelative { scale: 0.5 };

        assert_eq!(extent.resolve(1920, 1080), (960, 540));
        assert_eq!(extent.resolve(1, 1), (1, 1));
    }

    #[test]
    fn builder_defaults() {
        let info = TextureInfo::texture_2d(64, 64, vk::Format::R8_UNORM)
            .to_builder()
            .mip_level_count(4)
            .build();

        assert_eq!(info.array_layer_count, 1);
        assert_eq!(info.mip_level_count, 4);
        assert_eq!(info.subresource_unit_count(), 4);
        assert!(info.clear_value.is_none());
    }
}
