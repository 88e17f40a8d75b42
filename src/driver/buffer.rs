//! Buffer descriptors used by the graph.

use {
    ash::vk,
    derive_builder::{Builder, UninitializedFieldError},
};

/// Information describing an imported buffer.
#[derive(Builder, Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[builder(
    build_fn(private, name = "fallible_build", error = "BufferInfoBuilderError"),
    derive(Clone, Copy, Debug),
    pattern = "owned"
)]
#[non_exhaustive]
pub struct BufferInfo {
    /// Size in bytes.
    pub size: vk::DeviceSize,

    /// A bitmask describing the intended usage of the buffer.
    #[builder(default)]
    pub usage: vk::BufferUsageFlags,
}

impl BufferInfo {
    /// Specifies a buffer of the given byte size.
    #[inline(always)]
    pub const fn new(size: vk::DeviceSize) -> Self {
        Self {
            size,
            usage: vk::BufferUsageFlags::empty(),
        }
    }

    /// Converts a `BufferInfo` into a `BufferInfoBuilder`.
    #[inline(always)]
    pub fn to_builder(self) -> BufferInfoBuilder {
        BufferInfoBuilder {
            size: Some(self.size),
            usage: Some(self.usage),
        }
    }
}

impl From<BufferInfoBuilder> for BufferInfo {
    fn from(info: BufferInfoBuilder) -> Self {
        info.build()
    }
}

impl BufferInfoBuilder {
    /// Builds a new `BufferInfo`.
    ///
    /// # Panics
    ///
    /// If `size` has not been set this function will panic.
    #[inline(always)]
    pub fn build(self) -> BufferInfo {
        match self.fallible_build() {
            Err(BufferInfoBuilderError(err)) => panic!("{err}"),
            Ok(info) => info,
        }
    }
}

#[derive(Debug)]
struct BufferInfoBuilderError(UninitializedFieldError);

impl From<UninitializedFieldError> for BufferInfoBuilderError {
    fn from(err: UninitializedFieldError) -> Self {
        Self(err)
    }
}
