//! 访问历史与冲突检测
//!
//! 每次 bake 为每个被访问的资源维护一份 [`RdgAccessHistory`]，用于：
//! - 计算一次访问最早可以放在哪个 stage（RAW / WAR / WAW / layout 转换）
//! - 生成 barrier 的 src / dst
//! - 记录第一个 barrier 与 stage 最大的 barrier 的位置，供跨帧衔接修补

use std::collections::HashMap;

use ash::vk;

use super::access::{RdgAccess, RdgAccessState};
use super::barrier::RdgBarrierRef;
use super::resource::RdgResourceKind;

/// 单个资源在一次 bake 中的访问历史
#[derive(Clone, Debug, Default)]
pub struct RdgAccessHistory {
    pub first_read_stage: Option<usize>,
    /// 所有只读访问中最大的 stage
    pub last_read_stage: Option<usize>,
    pub first_write_stage: Option<usize>,
    pub last_write_stage: Option<usize>,

    /// layout -> 该 layout 下只读访问的最大 stage
    read_stages_by_layout: HashMap<vk::ImageLayout, usize>,

    pub first_barrier: Option<RdgBarrierRef>,
    /// stage 最大的 barrier；同一个 stage 中取最后声明的
    pub last_barrier: Option<RdgBarrierRef>,

    pub first_access: Option<RdgAccessState>,
    /// 声明顺序上的最后一次访问，决定资源当前的 layout
    pub last_access: Option<RdgAccessState>,
    /// 最后一次按写处理的访问
    pub last_write: Option<RdgAccessState>,

    /// 最后一次写之后所有只读访问的 stage / access 之和
    reads_since_write: (vk::PipelineStageFlags2, vk::AccessFlags2),
}

impl RdgAccessHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 这次访问在冲突检测中是否按写处理
    ///
    /// 读写分类为 WRITE / READ_WRITE / NONE 的访问都是写；
    /// 此外，只读访问如果要求的 image layout 与上一次访问不同，需要做 layout 转换，也算写。
    pub fn is_effective_write(&self, access: &RdgAccess, kind: RdgResourceKind) -> bool {
        if !access.is_pure_read() {
            return true;
        }
        match kind {
            RdgResourceKind::Buffer => false,
            RdgResourceKind::Image => self.last_access.is_some_and(|last| last.layout != access.state.layout),
        }
    }

    /// 这次访问最早可以放在哪个 stage
    ///
    /// - 只读：在最后一次写之后
    /// - 写：在最后一次写以及需要排序的读之后。`relax_same_layout_reads` 为 false 时所有读都需要排序，
    ///   否则只有 layout 与这次访问不同的读需要排序
    pub fn ordering_stage(&self, access: &RdgAccess, kind: RdgResourceKind, relax_same_layout_reads: bool) -> usize {
        let after = |stage: Option<usize>| stage.map_or(0, |s| s + 1);

        if !self.is_effective_write(access, kind) {
            return after(self.last_write_stage);
        }

        let ordering_read = if relax_same_layout_reads {
            self.read_stages_by_layout
                .iter()
                .filter(|(layout, _)| **layout != access.state.layout)
                .map(|(_, stage)| *stage)
                .max()
        } else {
            self.last_read_stage
        };

        after(self.last_write_stage.max(ordering_read))
    }

    /// 在 `base` 之上叠加最后一次写之后的所有读，layout 为资源当前的 layout
    fn accumulated(&self, base: RdgAccessState, layout: vk::ImageLayout) -> RdgAccessState {
        let (read_stage, read_access) = self.reads_since_write;
        RdgAccessState::new(base.stage | read_stage, base.access | read_access, layout)
    }

    /// 资源在这次 bake 结束时的状态：最后一次写，以及之后的所有读
    ///
    /// 下一帧的第一次访问需要等待的就是这些访问。
    pub fn final_state(&self) -> Option<RdgAccessState> {
        let last = self.last_access?;
        let base = self
            .last_write
            .unwrap_or(RdgAccessState::new(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE, last.layout));
        Some(self.accumulated(base, last.layout))
    }

    /// 生成这次访问的 barrier，返回 (src, dst)
    ///
    /// - 只读：只依赖最后一次写。之前声明的读可能被放到了更晚的 stage，不能作为 src
    /// - 写：需要等待最后一次写以及之后的所有读
    ///
    /// 本帧还没有写过的资源，以 `UNKNOWN_PRIOR` 的 stage / access 代替最后一次写。
    /// 第一次访问时，声明了 `FROM_UNDEFINED_LAYOUT` 的使用 `UNDEFINED`，否则使用 `UNKNOWN_PRIOR`。
    pub fn generate_barrier(&self, access: &RdgAccess, kind: RdgResourceKind) -> (RdgAccessState, RdgAccessState) {
        let Some(last) = self.last_access else {
            let src = if access.from_undefined_layout() {
                RdgAccessState::UNDEFINED
            } else {
                RdgAccessState::UNKNOWN_PRIOR
            };
            return (src, access.state);
        };

        let write = self.last_write.unwrap_or(RdgAccessState::UNKNOWN_PRIOR);
        let src = if self.is_effective_write(access, kind) {
            self.accumulated(write, last.layout)
        } else {
            last.with_sync_of(write)
        };
        (src, access.state)
    }

    /// 记录一次已经放入 `stage` 的访问
    pub fn update_history(
        &mut self,
        access: &RdgAccess,
        kind: RdgResourceKind,
        stage: usize,
        barrier: RdgBarrierRef,
    ) {
        if self.is_effective_write(access, kind) {
            self.first_write_stage.get_or_insert(stage);
            self.last_write_stage = self.last_write_stage.max(Some(stage));
            self.last_write = Some(access.state);
            self.reads_since_write = (vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE);
        } else {
            self.first_read_stage.get_or_insert(stage);
            self.last_read_stage = self.last_read_stage.max(Some(stage));
            let layout_stage = self.read_stages_by_layout.entry(access.state.layout).or_insert(stage);
            *layout_stage = (*layout_stage).max(stage);
            self.reads_since_write.0 |= access.state.stage;
            self.reads_since_write.1 |= access.state.access;
        }

        self.first_barrier.get_or_insert(barrier);
        if self.last_barrier.is_none_or(|last| stage >= last.stage) {
            self.last_barrier = Some(barrier);
        }

        self.first_access.get_or_insert(access.state);
        self.last_access = Some(access.state);
    }
}
