//! Stage 执行（render）
//!
//! 逐个 stage：
//! 1. 解析 barrier 引用的物理资源，填入句柄；image 的 src layout 使用其实际的当前 layout
//!    （关闭 `track_image_layouts` 时只替换第一次访问的占位 layout）
//! 2. 一次性提交 stage 的所有 barrier
//! 3. 按顺序录制 Pass（debug label、pipeline、录制回调）
//! 4. 把 image barrier 的 dst layout 写回 image

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ash::vk;

use super::access::RdgAccessState;
use super::barrier::{RdgAccessRef, RdgImageBarrier};
use super::command::RdgCommandEncoder;
use super::config::RdgConfig;
use super::error::RdgError;
use super::pass::RdgPass;
use super::resource::{RdgBuffer, RdgImage, RdgPhysicalResource, RdgResourceKind};
use super::resource_handle::RdgResourceHandle;
use super::resource_registry::RdgResourceRegistry;
use super::scheduler::RdgStage;

/// 解析 barrier 引用的资源
fn resolve_physical(
    registry: &RdgResourceRegistry<'_>,
    passes: &[RdgPass<'_>],
    resource: RdgResourceHandle,
    origin: RdgAccessRef,
) -> Result<RdgPhysicalResource, RdgError> {
    let Some(entry) = registry.get(resource) else {
        return Err(RdgError::UnregisteredResource {
            pass: origin.pass,
            pass_name: passes.get(origin.pass).map(|p| p.name.clone()).unwrap_or_default(),
            access: origin.access,
            resource,
        });
    };
    entry.resolve(resource)
}

fn kind_changed(registry: &RdgResourceRegistry<'_>, resource: RdgResourceHandle, expected: RdgResourceKind) -> RdgError {
    let actual = match expected {
        RdgResourceKind::Buffer => RdgResourceKind::Image,
        RdgResourceKind::Image => RdgResourceKind::Buffer,
    };
    RdgError::ResourceKindChanged {
        resource,
        name: registry.name_of(resource).to_string(),
        expected,
        actual,
    }
}

fn resolve_buffer(
    registry: &RdgResourceRegistry<'_>,
    passes: &[RdgPass<'_>],
    resource: RdgResourceHandle,
    origin: RdgAccessRef,
) -> Result<Rc<RdgBuffer>, RdgError> {
    match resolve_physical(registry, passes, resource, origin)? {
        RdgPhysicalResource::Buffer(buffer) => Ok(buffer),
        RdgPhysicalResource::Image(_) => Err(kind_changed(registry, resource, RdgResourceKind::Buffer)),
    }
}

fn resolve_image(
    registry: &RdgResourceRegistry<'_>,
    passes: &[RdgPass<'_>],
    resource: RdgResourceHandle,
    origin: RdgAccessRef,
) -> Result<Rc<RdgImage>, RdgError> {
    match resolve_physical(registry, passes, resource, origin)? {
        RdgPhysicalResource::Image(image) => Ok(image),
        RdgPhysicalResource::Buffer(_) => Err(kind_changed(registry, resource, RdgResourceKind::Image)),
    }
}

/// 执行所有 stage
///
/// stage 中的 barrier 只会被填入物理句柄；src layout 的替换作用在提交的副本上，
/// 因此同一份 stages 可以被反复 render。
pub(crate) fn render_stages(
    stages: &mut [RdgStage],
    passes: &mut [RdgPass<'_>],
    registry: &RdgResourceRegistry<'_>,
    config: &RdgConfig,
    encoder: &mut dyn RdgCommandEncoder,
) -> Result<(), RdgError> {
    // 不跟踪 layout 时，已经出现过的 image
    let mut untracked_seen: HashSet<vk::Image> = HashSet::new();

    for (stage_idx, stage) in stages.iter_mut().enumerate() {
        // 1. buffer barrier：只需要填入句柄
        for barrier in stage.buffer_barriers.iter_mut() {
            let buffer = resolve_buffer(registry, passes, barrier.resource, barrier.origin)?;
            barrier.patch_physical(&buffer);
        }

        // 2. image barrier：填入句柄，并使用实际的当前 layout 作为 old layout
        //    同一个 stage 内对同一 image 的多个 barrier 依次串联
        let mut running_layouts: HashMap<vk::Image, vk::ImageLayout> = HashMap::new();
        let mut layout_commits: Vec<(Rc<RdgImage>, vk::ImageLayout)> = Vec::new();
        let mut image_barriers: Vec<RdgImageBarrier> = Vec::with_capacity(stage.image_barriers.len());
        for barrier in stage.image_barriers.iter_mut() {
            let image = resolve_image(registry, passes, barrier.resource, barrier.origin)?;
            barrier.patch_physical(&image);

            let mut emitted = barrier.clone();
            if config.track_image_layouts {
                let current = running_layouts.entry(image.handle()).or_insert_with(|| image.current_layout());
                if emitted.src.layout != vk::ImageLayout::UNDEFINED {
                    emitted.src.layout = *current;
                }
                *current = emitted.dst.layout;
                layout_commits.push((image, emitted.dst.layout));
            } else if untracked_seen.insert(image.handle()) && emitted.src == RdgAccessState::UNKNOWN_PRIOR {
                // 占位 layout 使用调用方记录在 image 上的 layout，不回写
                emitted.src.layout = image.current_layout();
            }
            image_barriers.push(emitted);
        }

        // 3. 一次性提交
        if !stage.buffer_barriers.is_empty() || !image_barriers.is_empty() {
            log::trace!(
                "rdg: stage {} flushes {} buffer barriers, {} image barriers",
                stage_idx,
                stage.buffer_barriers.len(),
                image_barriers.len()
            );
            encoder.pipeline_barrier(&stage.buffer_barriers, &image_barriers);
        }

        // 4. 录制 Pass
        for &pass_idx in &stage.passes {
            let pass = &mut passes[pass_idx];
            if config.debug_labels {
                encoder.begin_label(&pass.name);
            }
            if let Some(pipeline) = &pass.pipeline {
                encoder.bind_pipeline(pipeline);
            }
            (pass.recorder)(&mut *encoder);
            if config.debug_labels {
                encoder.end_label();
            }
        }

        // 5. 记录 image 的新 layout
        for (image, layout) in layout_commits {
            image.set_current_layout(layout);
        }
    }

    Ok(())
}
