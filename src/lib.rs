//! A per-frame render graph for Vulkan-style renderers.
//!
//! Passes declare the resources they create, read and write; the graph culls passes which
//! cannot affect anything imported from outside the frame, assigns pooled physical memory to
//! what survives, solves the pipeline barriers between passes and runs the executors in
//! declaration order.
//!
//! The crate never talks to a graphics API directly. Renderers plug in through three traits:
//! [`driver::RenderDevice`] creates and destroys images and views, [`driver::BindlessRegistry`]
//! hands out persistent descriptor-table slots, and [`driver::CommandEncoder`] records the
//! single batched pipeline barrier each pass needs. Everything else a pass records is its own
//! business inside its executor closure.
//!
//! # Frame lifecycle
//!
//! ```text
//! graph.begin_frame(..);           // reset the virtual graph, recycle pooled textures
//! graph.add_pass("shadows", ..);   // setup closures declare usage, exec closures render
//! graph.add_pass("lighting", ..);
//! graph.compile(..)?;              // cull, schedule, allocate
//! graph.execute(..);               // barriers + executors, declaration order
//! ```
//!
//! Declaration order is execution order; the graph never reorders passes. A pass survives
//! culling only if, transitively, something it writes reaches an imported resource such as
//! the backbuffer.

pub mod driver;
pub mod graph;
pub mod pool;

pub use self::{
    driver::{AccessKind, BufferInfo, ClearValue, DriverError, TextureExtent, TextureInfo},
    graph::{FrameGraph, FrameResources, NodeHandle, PassBuilder, PassHandle, SubresourceRange},
    pool::TexturePool,
};

/// Things which are used in almost every usage of this crate.
pub mod prelude {
    pub use super::{
        driver::{
            vk, AccessKind, BindlessRegistry, BufferBarrier, BufferInfo, ClearValue,
            CommandEncoder, DriverError, RenderDevice, TextureBarrier, TextureExtent,
            TextureInfo, TextureViewInfo,
        },
        graph::{
            FrameGraph, FrameResources, NodeHandle, PassBuilder, PassHandle, SubresourceRange,
        },
        pool::{TexturePool, INVALID_BINDLESS_INDEX, VIEW_TTL_FRAMES},
    };
}
