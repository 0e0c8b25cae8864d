use itertools::Itertools;
use slotmap::SecondaryMap;

use super::barrier::{RdgBarrierRef, RdgBufferBarrier, RdgImageBarrier};
use super::command::RdgCommandEncoder;
use super::config::RdgConfig;
use super::error::{RdgError, fatal};
use super::executor::render_stages;
use super::hazard::RdgAccessHistory;
use super::pass::RdgPass;
use super::plan::plan_lines;
use super::resource::{RdgPhysicalResource, RdgResourceKind};
use super::resource_handle::RdgResourceHandle;
use super::resource_registry::{RdgResource, RdgResourceFlags, RdgResourceRegistry};
use super::scheduler::{RdgStage, apply_cross_frame_continuity, schedule_passes};

/// bake 的统计信息
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RdgBakeStats {
    pub stages: usize,
    pub passes: usize,
    pub buffer_barriers: usize,
    pub image_barriers: usize,
    /// 跨帧衔接修补的 barrier 数量
    pub patched_barriers: usize,
}

/// Render Dependency Graph
///
/// 持有资源注册表、Pass 列表以及 bake 的结果。
/// 生命周期 `'a` 约束 resolver 与录制回调可以借用的外部数据。
#[derive(Default)]
pub struct RenderDependencyGraph<'a> {
    config: RdgConfig,
    registry: RdgResourceRegistry<'a>,
    passes: Vec<RdgPass<'a>>,

    stages: Vec<RdgStage>,
    histories: SecondaryMap<RdgResourceHandle, RdgAccessHistory>,
    stats: RdgBakeStats,
}

// new & init
impl<'a> RenderDependencyGraph<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RdgConfig) -> Self {
        Self { config, ..Default::default() }
    }

    #[inline]
    pub fn config(&self) -> &RdgConfig {
        &self.config
    }

    /// 修改配置，在下一次 bake / render 时生效
    pub fn set_config(&mut self, config: RdgConfig) {
        self.config = config;
    }
}

// 资源
impl<'a> RenderDependencyGraph<'a> {
    /// 注册资源
    ///
    /// 同一个物理资源重复注册时返回已有的句柄。resolver 无法解析是致命错误。
    pub fn make_resource(
        &mut self,
        resolver: impl Fn() -> Option<RdgPhysicalResource> + 'a,
        flags: RdgResourceFlags,
    ) -> RdgResourceHandle {
        let name = format!("resource#{}", self.registry.len());
        self.make_named_resource(name, resolver, flags)
    }

    /// 注册带调试名称的资源
    pub fn make_named_resource(
        &mut self,
        name: impl Into<String>,
        resolver: impl Fn() -> Option<RdgPhysicalResource> + 'a,
        flags: RdgResourceFlags,
    ) -> RdgResourceHandle {
        self.try_make_resource(name, resolver, flags).unwrap_or_else(|err| fatal(err))
    }

    pub fn try_make_resource(
        &mut self,
        name: impl Into<String>,
        resolver: impl Fn() -> Option<RdgPhysicalResource> + 'a,
        flags: RdgResourceFlags,
    ) -> Result<RdgResourceHandle, RdgError> {
        self.registry.register(name, Box::new(resolver), flags)
    }

    #[inline]
    pub fn resource(&self, handle: RdgResourceHandle) -> Option<&RdgResource<'a>> {
        self.registry.get(handle)
    }

    #[inline]
    pub fn resource_count(&self) -> usize {
        self.registry.len()
    }
}

// Pass
impl<'a> RenderDependencyGraph<'a> {
    /// 添加 Pass，返回其序号
    pub fn add_pass(&mut self, pass: RdgPass<'a>) -> usize {
        self.passes.push(pass);
        self.passes.len() - 1
    }

    /// 移除所有 Pass，bake 的结果随之失效；已注册的资源保留
    pub fn clear_passes(&mut self) {
        self.passes.clear();
        self.clear_baked();
    }

    /// 清空 Pass、bake 结果和资源注册表，之前的资源句柄全部失效
    pub fn reset(&mut self) {
        self.clear_passes();
        self.registry.clear();
    }

    #[inline]
    pub fn pass(&self, pass_idx: usize) -> Option<&RdgPass<'a>> {
        self.passes.get(pass_idx)
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    fn clear_baked(&mut self) {
        self.stages.clear();
        self.histories.clear();
        self.stats = RdgBakeStats::default();
    }
}

// bake & render
impl RenderDependencyGraph<'_> {
    /// 把 Pass 分配到 stage 并生成 barrier。配置错误是致命的
    pub fn bake(&mut self) -> RdgBakeStats {
        self.try_bake().unwrap_or_else(|err| fatal(err))
    }

    pub fn try_bake(&mut self) -> Result<RdgBakeStats, RdgError> {
        #[cfg(feature = "profiling")]
        let _span = tracy_client::span!("RenderDependencyGraph::bake");

        self.clear_baked();

        // 阶段 1：stage 分配与 barrier 生成
        let schedule = schedule_passes(&mut self.passes, &self.registry, &self.config)?;
        self.stages = schedule.stages;
        self.histories = schedule.histories;

        // 阶段 2：跨帧衔接
        let patched_barriers = apply_cross_frame_continuity(&mut self.stages, &self.histories, &self.registry);

        self.stats = RdgBakeStats {
            stages: self.stages.len(),
            passes: self.passes.len(),
            buffer_barriers: self.stages.iter().map(|s| s.buffer_barriers.len()).sum(),
            image_barriers: self.stages.iter().map(|s| s.image_barriers.len()).sum(),
            patched_barriers,
        };
        log::debug!(
            "rdg: baked {} passes into {} stages ({} buffer barriers, {} image barriers, {} patched)",
            self.stats.passes,
            self.stats.stages,
            self.stats.buffer_barriers,
            self.stats.image_barriers,
            self.stats.patched_barriers
        );

        if self.config.print_plan_on_bake {
            self.print_plan();
        }

        Ok(self.stats)
    }

    /// 按 stage 顺序录制所有 Pass。物理资源无法解析是致命的
    pub fn render(&mut self, encoder: &mut dyn RdgCommandEncoder) {
        if let Err(err) = self.try_render(encoder) {
            fatal(err);
        }
    }

    pub fn try_render(&mut self, encoder: &mut dyn RdgCommandEncoder) -> Result<(), RdgError> {
        #[cfg(feature = "profiling")]
        let _span = tracy_client::span!("RenderDependencyGraph::render");

        render_stages(&mut self.stages, &mut self.passes, &self.registry, &self.config, encoder)
    }
}

// 查询
impl RenderDependencyGraph<'_> {
    #[inline]
    pub fn stages(&self) -> &[RdgStage] {
        &self.stages
    }

    /// 最近一次 bake 的统计
    #[inline]
    pub fn stats(&self) -> RdgBakeStats {
        self.stats
    }

    /// Pass 所在的 stage
    pub fn pass_stage(&self, pass_idx: usize) -> Option<usize> {
        self.stages.iter().position(|stage| stage.passes.contains(&pass_idx))
    }

    /// 某个 access 生成的 barrier 的位置
    pub fn barrier_of(&self, pass_idx: usize, access_idx: usize) -> Option<RdgBarrierRef> {
        self.passes.get(pass_idx)?.barriers.get(access_idx).copied()
    }

    pub fn buffer_barrier(&self, barrier: RdgBarrierRef) -> Option<&RdgBufferBarrier> {
        match barrier.kind {
            RdgResourceKind::Buffer => self.stages.get(barrier.stage)?.buffer_barriers.get(barrier.index),
            RdgResourceKind::Image => None,
        }
    }

    pub fn image_barrier(&self, barrier: RdgBarrierRef) -> Option<&RdgImageBarrier> {
        match barrier.kind {
            RdgResourceKind::Image => self.stages.get(barrier.stage)?.image_barriers.get(barrier.index),
            RdgResourceKind::Buffer => None,
        }
    }

    /// 资源在最近一次 bake 中的访问历史
    #[inline]
    pub fn history(&self, handle: RdgResourceHandle) -> Option<&RdgAccessHistory> {
        self.histories.get(handle)
    }

    /// 执行计划的文本形式
    pub fn format_plan(&self) -> String {
        plan_lines(&self.stages, &self.passes, &self.registry).into_iter().join("\n")
    }

    /// 用 `log::info!` 逐行输出执行计划
    pub fn print_plan(&self) {
        for line in plan_lines(&self.stages, &self.passes, &self.registry) {
            log::info!("{}", line);
        }
    }
}
