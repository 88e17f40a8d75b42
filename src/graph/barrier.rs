//! Per-pass barrier solving.
//!
//! Pure with respect to the graph: one call takes a pass plus the resource table, emits the
//! minimal batched barrier set for that pass and advances the tracked layout/stage/write state
//! the next pass will see. Declaration order is trusted as synchronization order; the solver
//! does not detect passes declared out of true dependency order.

use {
    super::node::{
        NodeHandle, NodeIndex, PassNode, ResourceBacking, ResourceInfo, ResourceNode,
        SubresourceRange,
    },
    crate::driver::{format_aspect_mask, AccessKind, BufferBarrier, TextureBarrier},
    ash::vk,
    log::{trace, warn},
};

/// All barriers one pass requires, submitted as a single `pipeline_barrier` call.
#[derive(Debug, Default)]
pub(crate) struct BarrierBatch {
    pub buffers: Vec<BufferBarrier>,
    pub dst_stages: vk::PipelineStageFlags,
    pub src_stages: vk::PipelineStageFlags,
    pub textures: Vec<TextureBarrier>,
}

impl BarrierBatch {
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.textures.is_empty()
    }
}

struct ResourceUse {
    access: AccessKind,
    handle: NodeHandle,
    stages: vk::PipelineStageFlags,
    wrote: bool,
}

/// Collapses all declared uses of each handle into one layout-deciding access.
///
/// The winner is the highest-priority access; the first declaration wins ties. Stage masks
/// accumulate across every use regardless of the winner, as does the write flag.
fn collect_uses(pass: &PassNode, resource_count: usize) -> Vec<ResourceUse> {
    let mut uses: Vec<ResourceUse> = Vec::with_capacity(pass.reads.len() + pass.writes.len());

    for &(handle, access) in pass.reads.iter().chain(pass.writes.iter()) {
        if !handle.is_valid() || handle.idx >= resource_count {
            warn!("{}: access to invalid resource handle ignored", pass.name);

            continue;
        }

        match uses.iter_mut().find(|it| it.handle == handle) {
            Some(it) => {
                it.stages |= access.stage_mask();
                it.wrote |= access.is_write();

                if access.priority() > it.access.priority() {
                    it.access = access;
                }
            }
            None => uses.push(ResourceUse {
                access,
                handle,
                stages: access.stage_mask(),
                wrote: access.is_write(),
            }),
        }
    }

    uses
}

/// What the previous pass left a root in; every use within one pass is solved against this.
#[derive(Clone, Copy)]
struct PriorState {
    access: vk::AccessFlags,
    stages: vk::PipelineStageFlags,
    written: bool,
}

/// Computes the barrier batch for one pass and updates the tracked resource state.
#[profiling::function]
pub(crate) fn solve_pass(pass: &PassNode, resources: &mut [ResourceNode]) -> BarrierBatch {
    let mut batch = BarrierBatch::default();

    // Roots already touched by this pass, with their pre-pass state: later uses (other
    // subresource windows of the same root) must solve against what the previous pass left,
    // not against this pass's own updates
    let mut touched: Vec<(NodeIndex, PriorState)> = vec![];

    for ResourceUse {
        access,
        handle,
        stages,
        wrote,
    } in collect_uses(pass, resources.len())
    {
        let root_idx = resources[handle.idx].parent.unwrap_or(handle.idx);
        let root = &mut resources[root_idx];
        let prior = touched
            .iter()
            .find(|(idx, _)| *idx == root_idx)
            .map(|&(_, state)| state);
        let first_touch = prior.is_none();
        let prior = prior.unwrap_or(PriorState {
            access: root.last_access,
            stages: root.last_stages,
            written: root.last_written,
        });

        // The previous touch may predate any recorded stage; fall back to the pipe head
        let prev_stages = if prior.stages.is_empty() {
            vk::PipelineStageFlags::TOP_OF_PIPE
        } else {
            prior.stages
        };
        let prev_access = prior.access;
        let write_pending = prior.written;

        let emitted = match (&root.info, root.backing) {
            (&ResourceInfo::Texture(info), ResourceBacking::Texture { image, .. }) => {
                let range = handle
                    .subresource
                    .unwrap_or(SubresourceRange::full(
                        info.mip_level_count,
                        info.array_layer_count,
                    ))
                    .clamp_to(info.mip_level_count, info.array_layer_count);
                let new_layout = access.image_layout();
                let aspect_mask = format_aspect_mask(info.fmt);
                let mip_count = info.mip_level_count;
                let mut emitted = false;
                let mut push = |base_mip: u32, len: u32, layer: u32, old_layout: vk::ImageLayout| {
                    trace!(
                        "    image {:?} mips {}..{} layer {} {:?}->{:?}",
                        image,
                        base_mip,
                        base_mip + len,
                        layer,
                        old_layout,
                        new_layout,
                    );

                    batch.textures.push(TextureBarrier {
                        array_layer_count: 1,
                        aspect_mask,
                        base_array_layer: layer,
                        base_mip_level: base_mip,
                        dst_access: access.access_mask(),
                        image,
                        mip_level_count: len,
                        new_layout,
                        old_layout,
                        src_access: prev_access,
                    });
                };

                for layer in
                    range.base_array_layer..range.base_array_layer + range.array_layer_count
                {
                    // Coalesce contiguous mips whose tracked layout matches into one barrier
                    let mut run: Option<(u32, u32, vk::ImageLayout)> = None;

                    for mip in range.base_mip_level..range.base_mip_level + range.mip_level_count
                    {
                        let old_layout = root.layouts[(layer * mip_count + mip) as usize];
                        let transition = old_layout != new_layout || write_pending;

                        match &mut run {
                            Some((_, len, run_layout))
                                if transition && *run_layout == old_layout =>
                            {
                                *len += 1;
                            }
                            _ => {
                                if let Some((base, len, run_layout)) = run.take() {
                                    push(base, len, layer, run_layout);
                                    emitted = true;
                                }

                                if transition {
                                    run = Some((mip, 1, old_layout));
                                }
                            }
                        }
                    }

                    if let Some((base, len, run_layout)) = run {
                        push(base, len, layer, run_layout);
                        emitted = true;
                    }
                }

                for layer in
                    range.base_array_layer..range.base_array_layer + range.array_layer_count
                {
                    for mip in range.base_mip_level..range.base_mip_level + range.mip_level_count
                    {
                        root.layouts[(layer * mip_count + mip) as usize] = new_layout;
                    }
                }

                emitted
            }
            (&ResourceInfo::Buffer(_), ResourceBacking::Buffer { buffer }) => {
                let dst_access = access.access_mask();
                let transition = prev_access != dst_access || write_pending;

                if transition {
                    trace!("    buffer {:?} {:?}->{:?}", buffer, prev_access, dst_access);

                    batch.buffers.push(BufferBarrier {
                        buffer,
                        dst_access,
                        offset: 0,
                        size: vk::WHOLE_SIZE,
                        src_access: prev_access,
                    });
                }

                transition
            }
            (_, ResourceBacking::Unresolved) => {
                // Culled or never-allocated resource named by a live pass; degrade to a no-op
                warn!("{}: no physical backing for {}", pass.name, root.name);

                false
            }
            _ => {
                warn!("{}: mismatched backing for {}", pass.name, root.name);

                false
            }
        };

        if emitted {
            batch.src_stages |= prev_stages;
        }

        batch.dst_stages |= stages;

        if first_touch {
            root.last_access = access.access_mask();
            root.last_stages = stages;
            root.last_written = wrote;
            touched.push((root_idx, prior));
        } else {
            root.last_access |= access.access_mask();
            root.last_stages |= stages;
            root.last_written |= wrote;
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use {super::*, crate::driver::TextureInfo, ash::vk::Handle};

    #[test]
    fn uses_of_one_handle_merge_and_accumulate() {
        let mut pass = PassNode::new("mixed".to_string());
        let handle = NodeHandle::new(0);

        pass.reads.push((handle, AccessKind::SampledRead));
        pass.writes.push((handle, AccessKind::StorageWrite));

        let uses = collect_uses(&pass, 1);

        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].access, AccessKind::StorageWrite);
        assert!(uses[0].wrote);
        assert!(uses[0]
            .stages
            .contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
    }

    #[test]
    fn contiguous_mips_coalesce_into_one_barrier() {
        let info = TextureInfo::texture_2d(64, 64, vk::Format::R8G8B8A8_UNORM)
            .to_builder()
            .mip_level_count(4)
            .build();
        let mut node = ResourceNode::texture("mips".to_string(), info, Some(0));

        node.backing = ResourceBacking::Texture {
            image: vk::Image::from_raw(1),
            pool_idx: None,
        };

        // Mip 1 is already where the pass wants it; the runs must split around it
        node.layouts[1] = vk::ImageLayout::TRANSFER_DST_OPTIMAL;

        let mut pass = PassNode::new("copy".to_string());

        pass.writes
            .push((NodeHandle::new(0), AccessKind::TransferWrite));

        let mut resources = vec![node];
        let batch = solve_pass(&pass, &mut resources);

        assert_eq!(batch.textures.len(), 2);
        assert_eq!(batch.textures[0].base_mip_level, 0);
        assert_eq!(batch.textures[0].mip_level_count, 1);
        assert_eq!(batch.textures[1].base_mip_level, 2);
        assert_eq!(batch.textures[1].mip_level_count, 2);
        assert!(resources[0].last_written);
        assert!(resources[0]
            .layouts
            .iter()
            .all(|&layout| layout == vk::ImageLayout::TRANSFER_DST_OPTIMAL));
    }

    #[test]
    fn unresolved_backings_emit_nothing() {
        let info = TextureInfo::texture_2d(64, 64, vk::Format::R8G8B8A8_UNORM);
        let node = ResourceNode::texture("ghost".to_string(), info, Some(0));
        let mut pass = PassNode::new("reader".to_string());

        pass.reads
            .push((NodeHandle::new(0), AccessKind::SampledRead));

        let mut resources = vec![node];
        let batch = solve_pass(&pass, &mut resources);

        assert!(batch.is_empty());
        assert_eq!(batch.src_stages, vk::PipelineStageFlags::empty());
    }
}
