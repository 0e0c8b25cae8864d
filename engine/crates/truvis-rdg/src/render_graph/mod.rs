//! Render Dependency Graph - 基于访问声明的 stage 调度系统
//!
//! 每帧的流程：Pass 声明访问 → `bake()` 生成 `stages[]` → `render()` 逐个 stage 执行。
//!
//! # 核心概念
//!
//! - **RdgResourceHandle**: 逻辑资源句柄；按解析出的物理资源去重，同一个物理资源永远得到同一个句柄
//! - **RdgAccess**: 某个 Pass 对某个资源的一次访问（stage、access mask、layout、读写分类）
//! - **RdgPass**: 一组有序的访问 + 录制回调 + 可选的 pipeline
//! - **RdgStage**: 一个 barrier 点 + 一批互不冲突、可以无同步执行的 Pass
//! - **RdgCommandEncoder**: 外部提供的命令录制能力（barrier、绑定 pipeline、debug label）
//!
//! # 使用示例
//!
//! ```ignore
//! use truvis_rdg::*;
//!
//! let mut graph = RenderDependencyGraph::new();
//!
//! let hdr = graph.make_resource(move || Some(RdgPhysicalResource::Image(hdr_image.clone())), RdgResourceFlags::empty());
//! let swapchain = graph.make_resource(
//!     move || Some(RdgPhysicalResource::Image(swapchain.current_image())),
//!     RdgResourceFlags::PER_FRAME,
//! );
//!
//! graph.add_pass(
//!     RdgPass::new("tonemap", |encoder| { /* dispatch... */ })
//!         .read(hdr, RdgAccessState::SHADER_READ_COMPUTE)
//!         .write_discard(swapchain, RdgAccessState::STORAGE_WRITE_COMPUTE),
//! );
//!
//! graph.bake();
//! graph.render(&mut RdgAshEncoder::new(&device, cmd));
//! ```
//!
//! # 模块结构
//!
//! - `resource_handle` / `resource` / `resource_registry`: 逻辑资源、物理资源与注册表
//! - `access`: 访问描述与常用状态
//! - `barrier`: barrier 描述以及到 Vulkan 结构体的转换
//! - `hazard`: 每个资源的访问历史，计算 stage 与 barrier
//! - `scheduler`: bake，把 Pass 分配到 stage，并做跨帧连续性修补
//! - `executor`: render，解析物理资源、刷 barrier、录制 Pass
//! - `command` / `ash_encoder`: 命令录制能力的抽象与实现
//! - `plan`: 执行计划的调试输出

mod access;
mod ash_encoder;
mod barrier;
mod command;
mod config;
mod error;
mod executor;
mod graph;
mod hazard;
mod pass;
mod plan;
mod resource;
mod resource_handle;
mod resource_registry;
mod scheduler;

// Re-exports
pub use access::{RdgAccess, RdgAccessFlags, RdgAccessState};
pub use ash_encoder::{RdgAshEncoder, RdgLabelColor};
pub use barrier::{RdgAccessRef, RdgBarrierRef, RdgBufferBarrier, RdgImageBarrier};
pub use command::{RdgCommand, RdgCommandEncoder, RdgCommandLog, RdgPipelineBinding};
pub use config::RdgConfig;
pub use error::RdgError;
pub use graph::{RdgBakeStats, RenderDependencyGraph};
pub use hazard::RdgAccessHistory;
pub use pass::{RdgPass, RdgRecorder};
pub use resource::{RdgBuffer, RdgImage, RdgPhysicalId, RdgPhysicalResource, RdgResourceKind};
pub use resource_handle::RdgResourceHandle;
pub use resource_registry::{RdgResource, RdgResourceFlags, RdgResourceRegistry, RdgResolver};
pub use scheduler::RdgStage;
