//! Declared GPU access intents and the metadata the barrier solver derives from them.

use ash::vk;

/// How a pass intends to touch a resource.
///
/// Each kind statically carries the pipeline stages it runs on, the memory access mask it
/// implies, and (for textures) the image layout the resource must be in. The solver picks one
/// "winning" kind per resource per pass using [`AccessKind::priority`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AccessKind {
    /// Sampled in a shader through a combined image sampler or sampled image.
    SampledRead,

    /// Depth/stencil image sampled in a shader (read-only depth layout).
    DepthSampledRead,

    /// Storage image or storage buffer read.
    StorageRead,

    /// Storage image or storage buffer write.
    StorageWrite,

    /// Color attachment read (blending, logic ops).
    ColorAttachmentRead,

    /// Color attachment write.
    ColorAttachmentWrite,

    /// Depth/stencil attachment read (depth test without write).
    DepthAttachmentRead,

    /// Depth/stencil attachment write.
    DepthAttachmentWrite,

    /// Source of a copy or blit.
    TransferRead,

    /// Destination of a copy or blit.
    TransferWrite,

    /// Handed to the presentation engine after the frame.
    Present,

    /// Vertex buffer fetch.
    VertexBufferRead,

    /// Index buffer fetch.
    IndexBufferRead,

    /// Uniform buffer read from any shader stage.
    UniformRead,

    /// Indirect draw/dispatch argument read.
    IndirectRead,

    /// Indirect draw/dispatch argument write from a shader.
    IndirectWrite,
}

impl AccessKind {
    /// Returns `true` if this access may modify the resource.
    pub const fn is_write(self) -> bool {
        use AccessKind::*;
        match self {
            SampledRead | DepthSampledRead | StorageRead | ColorAttachmentRead
            | DepthAttachmentRead | TransferRead | Present | VertexBufferRead | IndexBufferRead
            | UniformRead | IndirectRead => false,
            StorageWrite | ColorAttachmentWrite | DepthAttachmentWrite | TransferWrite
            | IndirectWrite => true,
        }
    }

    /// Relative priority used to pick the single layout-deciding access when a pass declares a
    /// resource more than once. Higher wins; the first declaration wins ties.
    pub const fn priority(self) -> u32 {
        use AccessKind::*;
        match self {
            Present => 110,
            TransferWrite => 100,
            StorageWrite | IndirectWrite => 90,
            DepthAttachmentWrite => 80,
            ColorAttachmentWrite => 70,
            DepthAttachmentRead | ColorAttachmentRead => 60,
            TransferRead => 50,
            StorageRead | IndirectRead => 40,
            UniformRead => 30,
            SampledRead | DepthSampledRead => 20,
            VertexBufferRead | IndexBufferRead => 10,
        }
    }

    /// Pipeline stages this access executes on.
    pub fn stage_mask(self) -> vk::PipelineStageFlags {
        use AccessKind::*;
        match self {
            SampledRead | DepthSampledRead | StorageRead | StorageWrite | IndirectWrite => {
                vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER
            }
            ColorAttachmentRead | ColorAttachmentWrite => {
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            }
            DepthAttachmentRead | DepthAttachmentWrite => {
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
            }
            TransferRead | TransferWrite => vk::PipelineStageFlags::TRANSFER,
            Present => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            VertexBufferRead | IndexBufferRead => vk::PipelineStageFlags::VERTEX_INPUT,
            UniformRead => {
                vk::PipelineStageFlags::VERTEX_SHADER
                    | vk::PipelineStageFlags::FRAGMENT_SHADER
                    | vk::PipelineStageFlags::COMPUTE_SHADER
            }
            IndirectRead => vk::PipelineStageFlags::DRAW_INDIRECT,
        }
    }

    /// Memory access mask for barrier src/dst accesses.
    pub fn access_mask(self) -> vk::AccessFlags {
        use AccessKind::*;
        match self {
            SampledRead | DepthSampledRead | StorageRead => vk::AccessFlags::SHADER_READ,
            StorageWrite | IndirectWrite => vk::AccessFlags::SHADER_WRITE,
            ColorAttachmentRead => vk::AccessFlags::COLOR_ATTACHMENT_READ,
            ColorAttachmentWrite => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            DepthAttachmentRead => vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            DepthAttachmentWrite => vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            TransferRead => vk::AccessFlags::TRANSFER_READ,
            TransferWrite => vk::AccessFlags::TRANSFER_WRITE,
            Present => vk::AccessFlags::empty(),
            VertexBufferRead => vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
            IndexBufferRead => vk::AccessFlags::INDEX_READ,
            UniformRead => vk::AccessFlags::UNIFORM_READ,
            IndirectRead => vk::AccessFlags::INDIRECT_COMMAND_READ,
        }
    }

    /// Image layout a texture must be in for this access.
    ///
    /// Buffer-only kinds return `UNDEFINED`; the solver never consults the layout for buffers.
    pub const fn image_layout(self) -> vk::ImageLayout {
        use AccessKind::*;
        match self {
            SampledRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            DepthSampledRead | DepthAttachmentRead => {
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            }
            StorageRead | StorageWrite => vk::ImageLayout::GENERAL,
            ColorAttachmentRead | ColorAttachmentWrite => {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            }
            DepthAttachmentWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            TransferRead => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            TransferWrite => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Present => vk::ImageLayout::PRESENT_SRC_KHR,
            VertexBufferRead | IndexBufferRead | UniformRead | IndirectRead | IndirectWrite => {
                vk::ImageLayout::UNDEFINED
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_classified() {
        assert!(AccessKind::StorageWrite.is_write());
        assert!(AccessKind::TransferWrite.is_write());
        assert!(AccessKind::IndirectWrite.is_write());
        assert!(!AccessKind::SampledRead.is_write());
        assert!(!AccessKind::Present.is_write());
    }

    #[test]
    fn present_outranks_everything() {
        use AccessKind::*;
        for kind in [
            SampledRead,
            StorageWrite,
            ColorAttachmentWrite,
            DepthAttachmentWrite,
            TransferWrite,
        ] {
            assert!(Present.priority() > kind.priority());
        }
    }

    #[test]
    fn attachment_writes_outrank_reads() {
        assert!(
            AccessKind::ColorAttachmentWrite.priority() > AccessKind::ColorAttachmentRead.priority()
        );
        assert!(
            AccessKind::DepthAttachmentWrite.priority() > AccessKind::DepthAttachmentRead.priority()
        );
        assert!(AccessKind::DepthAttachmentWrite.priority() > AccessKind::ColorAttachmentWrite.priority());
    }
}
