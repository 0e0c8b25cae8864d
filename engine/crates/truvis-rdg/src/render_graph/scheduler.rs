//! Stage 调度（bake）
//!
//! 按声明顺序遍历 Pass，把每个 Pass 放到满足其所有访问约束的最早 stage，
//! 并在该 stage 的 barrier 列表中追加它的 barrier。
//! 之后的跨帧衔接是一个独立的阶段，见 [`apply_cross_frame_continuity`]。

use slotmap::SecondaryMap;

use super::access::RdgAccessState;
use super::barrier::{RdgAccessRef, RdgBarrierRef, RdgBufferBarrier, RdgImageBarrier};
use super::config::RdgConfig;
use super::error::RdgError;
use super::hazard::RdgAccessHistory;
use super::pass::RdgPass;
use super::resource::RdgResourceKind;
use super::resource_handle::RdgResourceHandle;
use super::resource_registry::RdgResourceRegistry;

/// 一个 barrier 点 + 一批可以无同步执行的 Pass
#[derive(Clone, Debug, Default)]
pub struct RdgStage {
    pub(crate) passes: Vec<usize>,
    pub(crate) buffer_barriers: Vec<RdgBufferBarrier>,
    pub(crate) image_barriers: Vec<RdgImageBarrier>,
}

impl RdgStage {
    /// Pass 在 graph 中的序号，按声明顺序
    #[inline]
    pub fn passes(&self) -> &[usize] {
        &self.passes
    }

    #[inline]
    pub fn buffer_barriers(&self) -> &[RdgBufferBarrier] {
        &self.buffer_barriers
    }

    #[inline]
    pub fn image_barriers(&self) -> &[RdgImageBarrier] {
        &self.image_barriers
    }

    #[inline]
    pub fn has_barriers(&self) -> bool {
        !self.buffer_barriers.is_empty() || !self.image_barriers.is_empty()
    }

    #[inline]
    pub fn barrier_count(&self) -> usize {
        self.buffer_barriers.len() + self.image_barriers.len()
    }
}

/// bake 的结果
#[derive(Debug, Default)]
pub(crate) struct RdgSchedule {
    pub stages: Vec<RdgStage>,
    pub histories: SecondaryMap<RdgResourceHandle, RdgAccessHistory>,
}

/// 检查所有访问的资源都已经注册
fn validate_accesses(passes: &[RdgPass<'_>], registry: &RdgResourceRegistry<'_>) -> Result<(), RdgError> {
    for (pass_idx, pass) in passes.iter().enumerate() {
        for (access_idx, access) in pass.accesses.iter().enumerate() {
            if !registry.contains(access.resource) {
                return Err(RdgError::UnregisteredResource {
                    pass: pass_idx,
                    pass_name: pass.name.clone(),
                    access: access_idx,
                    resource: access.resource,
                });
            }
        }
    }
    Ok(())
}

/// 把 Pass 分配到 stage，生成每个 stage 的 barrier
///
/// 同时填写每个 Pass 的 `barriers`（与 access 一一对应）。
pub(crate) fn schedule_passes(
    passes: &mut [RdgPass<'_>],
    registry: &RdgResourceRegistry<'_>,
    config: &RdgConfig,
) -> Result<RdgSchedule, RdgError> {
    validate_accesses(passes, registry)?;

    let mut schedule = RdgSchedule::default();
    let empty_history = RdgAccessHistory::new();

    for (pass_idx, pass) in passes.iter_mut().enumerate() {
        // 1. 使用 Pass 之前的历史计算 stage；没有访问的 Pass 放在 stage 0
        let stage_idx = pass
            .accesses
            .iter()
            .map(|access| {
                let kind = registry[access.resource].kind;
                let history = schedule.histories.get(access.resource).unwrap_or(&empty_history);
                history.ordering_stage(access, kind, config.relax_same_layout_reads)
            })
            .max()
            .unwrap_or(0);

        if schedule.stages.len() <= stage_idx {
            schedule.stages.resize_with(stage_idx + 1, RdgStage::default);
        }
        let stage = &mut schedule.stages[stage_idx];
        stage.passes.push(pass_idx);

        // 2. 按声明顺序生成 barrier；同一个 Pass 对同一资源的多次访问会串联起来
        pass.barriers.clear();
        for (access_idx, access) in pass.accesses.iter().enumerate() {
            let kind = registry[access.resource].kind;
            if !schedule.histories.contains_key(access.resource) {
                schedule.histories.insert(access.resource, RdgAccessHistory::new());
            }
            let history = &mut schedule.histories[access.resource];

            let (src, dst) = history.generate_barrier(access, kind);
            let origin = RdgAccessRef { pass: pass_idx, access: access_idx };
            let barrier_ref = match kind {
                RdgResourceKind::Buffer => {
                    stage.buffer_barriers.push(RdgBufferBarrier::new(access.resource, origin, src, dst));
                    RdgBarrierRef {
                        stage: stage_idx,
                        kind,
                        index: stage.buffer_barriers.len() - 1,
                    }
                }
                RdgResourceKind::Image => {
                    stage.image_barriers.push(RdgImageBarrier::new(access.resource, origin, src, dst));
                    RdgBarrierRef {
                        stage: stage_idx,
                        kind,
                        index: stage.image_barriers.len() - 1,
                    }
                }
            };

            history.update_history(access, kind, stage_idx, barrier_ref);
            pass.barriers.push(barrier_ref);
        }
    }

    Ok(schedule)
}

/// 读取 barrier 的 dst 状态
fn barrier_dst(stages: &[RdgStage], barrier: RdgBarrierRef) -> RdgAccessState {
    let stage = &stages[barrier.stage];
    match barrier.kind {
        RdgResourceKind::Buffer => stage.buffer_barriers[barrier.index].dst,
        RdgResourceKind::Image => stage.image_barriers[barrier.index].dst,
    }
}

/// 改写 barrier 的 src 状态
fn set_barrier_src(stages: &mut [RdgStage], barrier: RdgBarrierRef, src: RdgAccessState) {
    let stage = &mut stages[barrier.stage];
    match barrier.kind {
        RdgResourceKind::Buffer => stage.buffer_barriers[barrier.index].src = src,
        RdgResourceKind::Image => stage.image_barriers[barrier.index].src = src,
    }
}

/// 跨帧衔接
///
/// 同一份 stages 会被反复 render：对于非 `PER_FRAME` 的资源，本帧的第一次访问紧接在上一帧的最后几次访问之后。
/// 第一个 barrier 的 src 改写为资源的帧末状态：stage / access 来自最后一次写以及之后的所有读，
/// layout 来自 stage 最大的 barrier 的 dst。
/// `PER_FRAME` 资源每帧可能是不同的物理对象，不做修补。
///
/// 返回被修补的 barrier 数量。
pub(crate) fn apply_cross_frame_continuity(
    stages: &mut [RdgStage],
    histories: &SecondaryMap<RdgResourceHandle, RdgAccessHistory>,
    registry: &RdgResourceRegistry<'_>,
) -> usize {
    let mut patched = 0;
    for (resource, history) in histories.iter() {
        if registry.get(resource).is_none_or(|r| r.is_per_frame()) {
            continue;
        }
        let (Some(first), Some(last), Some(final_state)) =
            (history.first_barrier, history.last_barrier, history.final_state())
        else {
            continue;
        };

        let src = RdgAccessState { layout: barrier_dst(stages, last).layout, ..final_state };
        set_barrier_src(stages, first, src);
        patched += 1;
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::access::RdgAccess;
    use crate::render_graph::resource::{RdgBuffer, RdgImage, RdgPhysicalResource};
    use crate::render_graph::resource_registry::RdgResourceFlags;
    use ash::vk::{self, Handle};
    use std::rc::Rc;

    fn register_image(registry: &mut RdgResourceRegistry<'_>, raw: u64, flags: RdgResourceFlags) -> RdgResourceHandle {
        let image = Rc::new(RdgImage::new(vk::Image::from_raw(raw), vk::Format::R16G16B16A16_SFLOAT));
        registry
            .register(format!("image-{raw}"), Box::new(move || Some(RdgPhysicalResource::Image(image.clone()))), flags)
            .unwrap()
    }

    fn register_buffer(registry: &mut RdgResourceRegistry<'_>, raw: u64) -> RdgResourceHandle {
        let buffer = Rc::new(RdgBuffer::new(vk::Buffer::from_raw(raw), 256));
        registry
            .register(
                format!("buffer-{raw}"),
                Box::new(move || Some(RdgPhysicalResource::Buffer(buffer.clone()))),
                RdgResourceFlags::empty(),
            )
            .unwrap()
    }

    #[test]
    fn test_passes_are_placed_by_hazards() {
        let mut registry = RdgResourceRegistry::new();
        let color = register_image(&mut registry, 1, RdgResourceFlags::empty());
        let params = register_buffer(&mut registry, 2);

        let mut passes = vec![
            RdgPass::new("draw", |_| {}).write_discard(color, RdgAccessState::COLOR_ATTACHMENT_WRITE),
            RdgPass::new("upload", |_| {}).write(params, RdgAccessState::TRANSFER_DST_BUFFER),
            RdgPass::new("blur", |_| {})
                .read(color, RdgAccessState::SHADER_READ_COMPUTE)
                .read(params, RdgAccessState::UNIFORM_COMPUTE),
        ];
        let schedule = schedule_passes(&mut passes, &registry, &RdgConfig::default()).unwrap();

        assert_eq!(schedule.stages.len(), 2);
        assert_eq!(schedule.stages[0].passes(), &[0, 1]);
        assert_eq!(schedule.stages[1].passes(), &[2]);
        assert_eq!(schedule.stages[1].buffer_barriers().len(), 1);
        assert_eq!(schedule.stages[1].image_barriers().len(), 1);

        let blur_barriers = passes[2].barriers();
        assert_eq!(blur_barriers[0], RdgBarrierRef { stage: 1, kind: RdgResourceKind::Image, index: 0 });
        assert_eq!(blur_barriers[1], RdgBarrierRef { stage: 1, kind: RdgResourceKind::Buffer, index: 0 });
        assert_eq!(schedule.stages[1].buffer_barriers()[0].origin, RdgAccessRef { pass: 2, access: 1 });
    }

    #[test]
    fn test_same_pass_accesses_chain_in_one_batch() {
        let mut registry = RdgResourceRegistry::new();
        let image = register_image(&mut registry, 3, RdgResourceFlags::empty());

        let mut passes = vec![
            RdgPass::new("mip-gen", |_| {})
                .write_discard(image, RdgAccessState::TRANSFER_DST)
                .read(image, RdgAccessState::TRANSFER_SRC),
        ];
        let schedule = schedule_passes(&mut passes, &registry, &RdgConfig::default()).unwrap();

        let barriers = schedule.stages[0].image_barriers();
        assert_eq!(barriers.len(), 2);
        assert_eq!(barriers[0].src, RdgAccessState::UNDEFINED);
        assert_eq!(barriers[1].src, RdgAccessState::TRANSFER_DST);
        assert_eq!(barriers[1].dst, RdgAccessState::TRANSFER_SRC);
    }

    #[test]
    fn test_unregistered_resource_is_rejected() {
        let mut registry = RdgResourceRegistry::new();
        let stale = register_image(&mut registry, 4, RdgResourceFlags::empty());
        registry.clear();

        let mut passes = vec![RdgPass::new("stale", |_| {}).read(stale, RdgAccessState::SHADER_READ_FRAGMENT)];
        let result = schedule_passes(&mut passes, &registry, &RdgConfig::default());
        assert!(matches!(result, Err(RdgError::UnregisteredResource { pass: 0, access: 0, .. })));
    }

    #[test]
    fn test_continuity_patches_persistent_resources_only() {
        let mut registry = RdgResourceRegistry::new();
        let history_image = register_image(&mut registry, 5, RdgResourceFlags::empty());
        let swapchain = register_image(&mut registry, 6, RdgResourceFlags::PER_FRAME);

        let mut passes = vec![
            RdgPass::new("accumulate", |_| {})
                .read_write(history_image, RdgAccessState::STORAGE_READ_WRITE_COMPUTE)
                .write_discard(swapchain, RdgAccessState::STORAGE_WRITE_COMPUTE),
            RdgPass::new("resolve", |_| {}).read(history_image, RdgAccessState::SHADER_READ_COMPUTE),
            RdgPass::new("present", |_| {}).read(swapchain, RdgAccessState::PRESENT),
        ];
        let mut schedule = schedule_passes(&mut passes, &registry, &RdgConfig::default()).unwrap();

        let patched = apply_cross_frame_continuity(&mut schedule.stages, &schedule.histories, &registry);
        assert_eq!(patched, 1);

        let first = schedule.stages[0].image_barriers();
        assert_eq!(first[0].resource, history_image);
        assert_eq!(first[0].src, RdgAccessState::SHADER_READ_COMPUTE);
        assert_eq!(first[1].resource, swapchain);
        assert_eq!(first[1].src, RdgAccessState::UNDEFINED);
    }

    #[test]
    fn test_continuity_with_single_access_chains_to_itself() {
        let mut registry = RdgResourceRegistry::new();
        let counter = register_buffer(&mut registry, 7);

        let mut passes = vec![RdgPass::new("count", |_| {}).read_write(counter, RdgAccessState::STORAGE_BUFFER_WRITE_COMPUTE)];
        let mut schedule = schedule_passes(&mut passes, &registry, &RdgConfig::default()).unwrap();
        assert_eq!(schedule.stages[0].buffer_barriers()[0].src, RdgAccessState::UNKNOWN_PRIOR);

        apply_cross_frame_continuity(&mut schedule.stages, &schedule.histories, &registry);
        let barrier = &schedule.stages[0].buffer_barriers()[0];
        assert_eq!(barrier.src, barrier.dst);
    }

    #[test]
    fn test_explicit_access_struct_is_scheduled() {
        let mut registry = RdgResourceRegistry::new();
        let image = register_image(&mut registry, 8, RdgResourceFlags::empty());

        let mut passes = vec![
            RdgPass::new("clear", |_| {}).access(RdgAccess::auto(image, RdgAccessState::TRANSFER_DST)),
            RdgPass::new("sample", |_| {}).access(RdgAccess::auto(image, RdgAccessState::SHADER_READ_FRAGMENT)),
        ];
        let schedule = schedule_passes(&mut passes, &registry, &RdgConfig::default()).unwrap();
        assert_eq!(schedule.stages.len(), 2);
    }

    /// 读 b 的两个 Pass 声明顺序与 stage 顺序相反
    fn out_of_order_reads(
        registry: &mut RdgResourceRegistry<'_>,
    ) -> (Vec<RdgPass<'static>>, RdgResourceHandle) {
        let b = register_buffer(registry, 9);
        let c = register_buffer(registry, 10);
        let passes = vec![
            RdgPass::new("upload-b", |_| {}).write(b, RdgAccessState::TRANSFER_DST_BUFFER),
            RdgPass::new("c0", |_| {}).write(c, RdgAccessState::STORAGE_BUFFER_WRITE_COMPUTE),
            RdgPass::new("c1", |_| {}).write(c, RdgAccessState::STORAGE_BUFFER_WRITE_COMPUTE),
            RdgPass::new("c2", |_| {}).write(c, RdgAccessState::STORAGE_BUFFER_WRITE_COMPUTE),
            RdgPass::new("late-read", |_| {})
                .read(c, RdgAccessState::STORAGE_BUFFER_READ_COMPUTE)
                .read(b, RdgAccessState::STORAGE_BUFFER_READ_COMPUTE),
            RdgPass::new("early-read", |_| {}).read(b, RdgAccessState::VERTEX_BUFFER),
        ];
        (passes, b)
    }

    #[test]
    fn test_early_staged_read_waits_for_the_write() {
        let mut registry = RdgResourceRegistry::new();
        let (mut passes, _) = out_of_order_reads(&mut registry);
        let schedule = schedule_passes(&mut passes, &registry, &RdgConfig::default()).unwrap();

        let late = passes[4].barriers()[1];
        let early = passes[5].barriers()[0];
        assert_eq!(late.stage, 3);
        assert_eq!(early.stage, 1);

        for barrier in [late, early] {
            let src = schedule.stages[barrier.stage].buffer_barriers()[barrier.index].src;
            assert!(src.stage.contains(vk::PipelineStageFlags2::TRANSFER));
            assert!(src.access.contains(vk::AccessFlags2::TRANSFER_WRITE));
        }
    }

    #[test]
    fn test_continuity_covers_every_final_read() {
        let mut registry = RdgResourceRegistry::new();
        let (mut passes, b) = out_of_order_reads(&mut registry);
        let mut schedule = schedule_passes(&mut passes, &registry, &RdgConfig::default()).unwrap();

        let history = &schedule.histories[b];
        assert_eq!(history.last_barrier.map(|barrier| barrier.stage), Some(3));

        apply_cross_frame_continuity(&mut schedule.stages, &schedule.histories, &registry);
        let upload = passes[0].barriers()[0];
        let src = schedule.stages[upload.stage].buffer_barriers()[upload.index].src;
        assert!(src.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER | vk::PipelineStageFlags2::VERTEX_INPUT));
        assert!(src.access.contains(vk::AccessFlags2::TRANSFER_WRITE));
    }
}
