//! 命令录制能力
//!
//! RDG 本身不持有 device，也不直接调用 Vulkan：所有命令都通过 [`RdgCommandEncoder`] 发出。
//! - [`RdgAshEncoder`](super::ash_encoder::RdgAshEncoder)：录制到真实的 `vk::CommandBuffer`
//! - [`RdgCommandLog`]：只记录命令，用于测试和调试输出

use ash::vk;

use super::barrier::{RdgBufferBarrier, RdgImageBarrier};

/// Pass 录制前需要绑定的 pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RdgPipelineBinding {
    pub bind_point: vk::PipelineBindPoint,
    pub pipeline: vk::Pipeline,
}

impl RdgPipelineBinding {
    #[inline]
    pub fn graphics(pipeline: vk::Pipeline) -> Self {
        Self { bind_point: vk::PipelineBindPoint::GRAPHICS, pipeline }
    }

    #[inline]
    pub fn compute(pipeline: vk::Pipeline) -> Self {
        Self { bind_point: vk::PipelineBindPoint::COMPUTE, pipeline }
    }

    #[inline]
    pub fn ray_tracing(pipeline: vk::Pipeline) -> Self {
        Self { bind_point: vk::PipelineBindPoint::RAY_TRACING_KHR, pipeline }
    }
}

/// 命令录制接口
pub trait RdgCommandEncoder {
    /// 一次性提交一个 stage 的所有 barrier
    fn pipeline_barrier(&mut self, buffer_barriers: &[RdgBufferBarrier], image_barriers: &[RdgImageBarrier]);

    fn bind_pipeline(&mut self, binding: &RdgPipelineBinding);

    fn begin_label(&mut self, _name: &str) {}

    fn end_label(&mut self) {}

    /// 在命令流中插入一个单独的 label
    fn insert_label(&mut self, _name: &str) {}

    /// Pass 自己录制命令时使用的 command buffer
    fn command_buffer(&self) -> vk::CommandBuffer;
}

/// [`RdgCommandLog`] 记录下来的一条命令
#[derive(Clone, Debug)]
pub enum RdgCommand {
    Barrier {
        buffers: Vec<RdgBufferBarrier>,
        images: Vec<RdgImageBarrier>,
    },
    BindPipeline(RdgPipelineBinding),
    BeginLabel(String),
    EndLabel,
    InsertLabel(String),
}

/// 只记录命令的 encoder
#[derive(Debug, Default)]
pub struct RdgCommandLog {
    commands: Vec<RdgCommand>,
}

impl RdgCommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn commands(&self) -> &[RdgCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// 所有 barrier 命令
    pub fn barriers(&self) -> impl Iterator<Item = (&[RdgBufferBarrier], &[RdgImageBarrier])> {
        self.commands.iter().filter_map(|command| match command {
            RdgCommand::Barrier { buffers, images } => Some((buffers.as_slice(), images.as_slice())),
            _ => None,
        })
    }

    /// 所有 `insert_label` 的名称，按录制顺序
    pub fn inserted_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RdgCommand::InsertLabel(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 所有 `begin_label` 的名称，即 Pass 的录制顺序
    pub fn pass_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RdgCommand::BeginLabel(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl RdgCommandEncoder for RdgCommandLog {
    fn pipeline_barrier(&mut self, buffer_barriers: &[RdgBufferBarrier], image_barriers: &[RdgImageBarrier]) {
        self.commands.push(RdgCommand::Barrier {
            buffers: buffer_barriers.to_vec(),
            images: image_barriers.to_vec(),
        });
    }

    fn bind_pipeline(&mut self, binding: &RdgPipelineBinding) {
        self.commands.push(RdgCommand::BindPipeline(*binding));
    }

    fn begin_label(&mut self, name: &str) {
        self.commands.push(RdgCommand::BeginLabel(name.to_string()));
    }

    fn end_label(&mut self) {
        self.commands.push(RdgCommand::EndLabel);
    }

    fn insert_label(&mut self, name: &str) {
        self.commands.push(RdgCommand::InsertLabel(name.to_string()));
    }

    fn command_buffer(&self) -> vk::CommandBuffer {
        vk::CommandBuffer::null()
    }
}
