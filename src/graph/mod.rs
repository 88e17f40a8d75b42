//! The per-frame render graph.
//!
//! Each frame is declared from scratch: [`FrameGraph::begin_frame`] resets the virtual graph,
//! passes declare resources and usage through [`PassBuilder`], [`FrameGraph::compile`] culls
//! dead passes and assigns physical memory, and [`FrameGraph::execute`] solves barriers and
//! runs the surviving executors in declaration order. Physical state (the texture pool, the
//! bindless view cache, layouts of imported images) persists on the graph across frames.

mod barrier;
mod builder;
mod node;
mod resources;

pub use self::{
    builder::PassBuilder,
    node::{NodeHandle, PassHandle, SubresourceRange},
    resources::FrameResources,
};

use {
    self::node::{Imported, PassNode, ResourceBacking, ResourceInfo, ResourceNode},
    crate::{
        driver::{
            AccessKind, BindlessRegistry, BufferInfo, CommandEncoder, DriverError, RenderDevice,
            TextureInfo, vk,
        },
        pool::TexturePool,
    },
    ash::vk::Handle,
    log::{debug, log_enabled, trace, Level},
    std::collections::HashMap,
};

/// Declares, compiles and executes one graph of render passes per frame.
///
/// The graph is rebuilt every frame; only physical state survives `begin_frame`. Imported
/// images keep their last-known layouts between frames, keyed by raw handle, except the
/// backbuffer which is always treated as freshly acquired in `UNDEFINED` layout.
pub struct FrameGraph {
    frame: u64,
    height: u32,
    imported_buffer_states: HashMap<u64, vk::AccessFlags>,
    imported_layouts: HashMap<u64, Vec<vk::ImageLayout>>,
    passes: Vec<PassNode>,
    pool: TexturePool,
    resources: Vec<ResourceNode>,
    schedule: Vec<usize>,
    width: u32,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self {
            frame: 0,
            height: 0,
            imported_buffer_states: Default::default(),
            imported_layouts: Default::default(),
            passes: vec![],
            pool: TexturePool::new(),
            resources: vec![],
            schedule: vec![],
            width: 0,
        }
    }

    /// Resets the virtual graph for a new frame with the given viewport.
    ///
    /// Pooled backings become reusable and stale cached views are evicted; nothing physical
    /// is freed otherwise.
    pub fn begin_frame(
        &mut self,
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
        width: u32,
        height: u32,
    ) {
        self.passes.clear();
        self.resources.clear();
        self.schedule.clear();
        self.width = width;
        self.height = height;
        self.frame += 1;
        self.pool.begin_frame(self.frame, device, bindless);

        trace!("begin frame {} ({}x{})", self.frame, width, height);
    }

    /// Declares a pass.
    ///
    /// `setup` runs immediately against a [`PassBuilder`] and fills in `data`; `exec` takes
    /// ownership of `data` and runs during [`FrameGraph::execute`] unless the pass is culled.
    pub fn add_pass<T, S, E>(&mut self, name: impl Into<String>, setup: S, exec: E) -> PassHandle
    where
        T: Default + 'static,
        S: FnOnce(&mut PassBuilder<'_>, &mut T),
        E: FnOnce(T, &mut FrameResources<'_>, &mut dyn CommandEncoder) + 'static,
    {
        let pass_idx = self.passes.len();
        let name = name.into();

        trace!("add pass {}", name);

        self.passes.push(PassNode::new(name));

        let mut data = T::default();
        let mut builder = PassBuilder {
            graph: self,
            pass_idx,
        };

        setup(&mut builder, &mut data);

        self.passes[pass_idx].exec = Some(Box::new(move |resources, cmd| {
            exec(data, resources, cmd)
        }));

        PassHandle(pass_idx)
    }

    /// Imports an externally-owned texture for this frame.
    ///
    /// Its layouts start from the last state this graph left the same image in, or
    /// `UNDEFINED` when it has never been seen.
    pub fn import_texture(
        &mut self,
        name: impl Into<String>,
        image: vk::Image,
        info: TextureInfo,
    ) -> NodeHandle {
        self.import_texture_node(name.into(), image, info, false)
    }

    /// Imports the swapchain image for this frame.
    ///
    /// The backbuffer is freshly acquired every frame so its layouts always start
    /// `UNDEFINED`; no cross-frame state is kept for it.
    pub fn import_backbuffer(
        &mut self,
        name: impl Into<String>,
        image: vk::Image,
        info: TextureInfo,
    ) -> NodeHandle {
        self.import_texture_node(name.into(), image, info, true)
    }

    fn import_texture_node(
        &mut self,
        name: String,
        image: vk::Image,
        info: TextureInfo,
        is_backbuffer: bool,
    ) -> NodeHandle {
        let idx = self.resources.len();
        let mut node = ResourceNode::texture(name, info, None);

        node.backing = ResourceBacking::Texture {
            image,
            pool_idx: None,
        };
        node.imported = Some(Imported { is_backbuffer });
        node.resolved_extent = info.extent.resolve(self.width, self.height);

        if !is_backbuffer {
            if let Some(layouts) = self.imported_layouts.get(&image.as_raw()) {
                if layouts.len() == node.layouts.len() {
                    node.layouts.copy_from_slice(layouts);
                }
            }
        }

        self.resources.push(node);

        NodeHandle::new(idx)
    }

    /// Imports an externally-owned buffer for this frame, restoring its last-known access
    /// state when this graph has synchronized it before.
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: vk::Buffer,
        info: BufferInfo,
    ) -> NodeHandle {
        let idx = self.resources.len();
        let mut node = ResourceNode::buffer(name.into(), info, None);

        node.backing = ResourceBacking::Buffer { buffer };
        node.imported = Some(Imported {
            is_backbuffer: false,
        });

        if let Some(&access) = self.imported_buffer_states.get(&buffer.as_raw()) {
            node.last_access = access;
        }

        self.resources.push(node);

        NodeHandle::new(idx)
    }

    /// Culls passes which cannot affect any imported resource, then assigns physical
    /// backings to every texture created by a surviving pass.
    #[profiling::function]
    pub fn compile(
        &mut self,
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
    ) -> Result<(), DriverError> {
        self.cull();

        self.schedule = self
            .passes
            .iter()
            .enumerate()
            .filter(|(_, pass)| !pass.culled)
            .map(|(pass_idx, _)| pass_idx)
            .collect();

        if log_enabled!(Level::Debug) {
            debug!(
                "schedule: {:?}",
                self.schedule
                    .iter()
                    .map(|&pass_idx| self.passes[pass_idx].name.as_str())
                    .collect::<Vec<_>>()
            );
        }

        let viewport = (self.width, self.height);

        for &pass_idx in &self.schedule {
            for &handle in &self.passes[pass_idx].creates {
                let node = &mut self.resources[handle.idx];

                if node.parent.is_some()
                    || node.imported.is_some()
                    || node.backing != ResourceBacking::Unresolved
                {
                    continue;
                }

                let ResourceInfo::Texture(info) = node.info else {
                    // Transient buffers are not pooled; only imported buffers are usable
                    continue;
                };

                let (image, pool_idx, resolved_extent) =
                    self.pool.lease(&node.name, info, viewport, device, bindless)?;

                node.backing = ResourceBacking::Texture {
                    image,
                    pool_idx: Some(pool_idx),
                };
                node.resolved_extent = resolved_extent;
            }
        }

        Ok(())
    }

    /// Marks passes and resources which cannot reach an imported resource as culled.
    ///
    /// A pass writing an import is seeded live, as is a pass presenting one; the fixed point
    /// then marks resources read by live passes as needed and passes producing needed
    /// resources as live, until stable.
    fn cull(&mut self) {
        let Self {
            passes, resources, ..
        } = self;
        let resource_count = resources.len();

        for pass in passes.iter_mut() {
            pass.ref_count = 0;
        }

        // Seed: passes with a side effect visible outside the frame. Presenting counts even
        // though it is declared as a read
        for pass in passes.iter_mut() {
            let externally_visible = pass
                .writes
                .iter()
                .chain(
                    pass.reads
                        .iter()
                        .filter(|(_, access)| matches!(access, AccessKind::Present)),
                )
                .any(|&(handle, _)| {
                    handle
                        .is_valid()
                        .then(|| resources.get(handle.idx))
                        .flatten()
                        .map(|node| node.parent.unwrap_or(handle.idx))
                        .is_some_and(|root_idx| resources[root_idx].imported.is_some())
                });

            if externally_visible {
                pass.ref_count = 1;
            }
        }

        let mut needed = vec![false; resource_count];

        loop {
            let mut changed = false;

            for pass in passes.iter().filter(|pass| pass.ref_count > 0) {
                for &(handle, _) in &pass.reads {
                    if !handle.is_valid() || handle.idx >= resource_count {
                        continue;
                    }

                    if !needed[handle.idx] {
                        needed[handle.idx] = true;
                        changed = true;
                    }

                    let root_idx = resources[handle.idx].parent.unwrap_or(handle.idx);

                    if !needed[root_idx] {
                        needed[root_idx] = true;
                        changed = true;
                    }
                }
            }

            for pass in passes.iter_mut().filter(|pass| pass.ref_count == 0) {
                let live = pass
                    .creates
                    .iter()
                    .copied()
                    .chain(pass.writes.iter().map(|&(handle, _)| handle))
                    .filter(|handle| handle.is_valid() && handle.idx < resource_count)
                    .any(|handle| {
                        needed[handle.idx]
                            || resources[handle.idx]
                                .parent
                                .map(|root_idx| needed[root_idx])
                                .unwrap_or_default()
                    });

                if live {
                    pass.ref_count = 1;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        // Live passes get one reference per needed resource they produce, on top of the seed
        for pass in passes.iter_mut().filter(|pass| pass.ref_count > 0) {
            pass.ref_count += pass
                .creates
                .iter()
                .filter(|handle| handle.is_valid() && needed[handle.idx])
                .count() as u32;
        }

        for pass in passes.iter_mut() {
            pass.culled = pass.ref_count == 0;

            if pass.culled {
                debug!("culling pass {}", pass.name);
            }
        }

        for node in resources.iter_mut() {
            node.culled = node
                .producer
                .map(|pass_idx| passes[pass_idx].culled)
                .unwrap_or_default();
        }
    }

    /// Runs every surviving pass in declaration order, emitting at most one batched pipeline
    /// barrier before each.
    ///
    /// Afterwards the final layouts of imported images and access states of imported buffers
    /// are remembered for the next frame, except for the backbuffer.
    #[profiling::function]
    pub fn execute(
        &mut self,
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
        cmd: &mut dyn CommandEncoder,
    ) {
        let schedule = std::mem::take(&mut self.schedule);

        for &pass_idx in &schedule {
            let Self {
                frame,
                passes,
                pool,
                resources,
                ..
            } = self;
            let batch = barrier::solve_pass(&passes[pass_idx], resources);

            debug!(
                "pass {} ({} texture, {} buffer barriers)",
                passes[pass_idx].name,
                batch.textures.len(),
                batch.buffers.len(),
            );

            if !batch.is_empty() {
                cmd.pipeline_barrier(
                    batch.src_stages,
                    batch.dst_stages,
                    &batch.buffers,
                    &batch.textures,
                );
            }

            if let Some(exec) = passes[pass_idx].exec.take() {
                let mut frame_resources = FrameResources {
                    bindless: &mut *bindless,
                    device: &mut *device,
                    frame: *frame,
                    pool,
                    resources: resources.as_slice(),
                };

                exec(&mut frame_resources, &mut *cmd);
            }
        }

        for node in &self.resources {
            let Some(imported) = node.imported else {
                continue;
            };

            if imported.is_backbuffer {
                continue;
            }

            match node.backing {
                ResourceBacking::Texture { image, .. } => {
                    self.imported_layouts
                        .insert(image.as_raw(), node.layouts.clone());
                }
                ResourceBacking::Buffer { buffer } => {
                    self.imported_buffer_states
                        .insert(buffer.as_raw(), node.last_access);
                }
                ResourceBacking::Unresolved => (),
            }
        }
    }

    /// Releases the texture pool and every cached view; the graph may be reused afterwards.
    pub fn destroy(
        &mut self,
        device: &mut dyn RenderDevice,
        bindless: &mut dyn BindlessRegistry,
    ) {
        self.pool.destroy(device, bindless);
        self.imported_layouts.clear();
        self.imported_buffer_states.clear();
    }

    /// The texture pool backing this graph.
    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    /// The number of passes declared this frame.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// The number of virtual resources declared this frame.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Whether a pass was culled; meaningful after [`FrameGraph::compile`].
    pub fn is_pass_culled(&self, pass: PassHandle) -> bool {
        self.passes
            .get(pass.0)
            .map(|pass| pass.culled)
            .unwrap_or(true)
    }

    /// Whether a resource's producing pass was culled; meaningful after
    /// [`FrameGraph::compile`].
    pub fn is_resource_culled(&self, handle: NodeHandle) -> bool {
        self.resources
            .get(handle.idx)
            .map(|node| node.culled)
            .unwrap_or(true)
    }

    /// Whether a resource received a physical backing; meaningful after
    /// [`FrameGraph::compile`].
    pub fn is_resource_allocated(&self, handle: NodeHandle) -> bool {
        self.resources
            .get(handle.idx)
            .map(|node| {
                let root_idx = node.parent.unwrap_or(handle.idx);

                self.resources[root_idx].backing != ResourceBacking::Unresolved
            })
            .unwrap_or_default()
    }
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}
