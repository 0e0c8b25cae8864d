use std::ffi::CString;

use ash::vk;
use itertools::Itertools;

use super::barrier::{RdgBufferBarrier, RdgImageBarrier};
use super::command::{RdgCommandEncoder, RdgPipelineBinding};

/// debug label 的颜色 (r, g, b, a)
pub type RdgLabelColor = glam::Vec4;

/// label 名称中不能有 '\0'
fn label_name(name: &str) -> CString {
    CString::new(name.replace('\0', " ")).unwrap_or_default()
}

/// 录制到 `vk::CommandBuffer` 的 encoder
///
/// device 与 debug utils 都由调用方传入；command buffer 需要处于 recording 状态。
pub struct RdgAshEncoder<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
    debug_utils: Option<&'a ash::ext::debug_utils::Device>,
    label_color: RdgLabelColor,
}

// new & init
impl<'a> RdgAshEncoder<'a> {
    pub fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            debug_utils: None,
            label_color: glam::vec4(0.4, 0.7, 1.0, 1.0),
        }
    }

    /// builder：启用 `VK_EXT_debug_utils` label
    pub fn with_debug_utils(mut self, debug_utils: &'a ash::ext::debug_utils::Device) -> Self {
        self.debug_utils = Some(debug_utils);
        self
    }

    /// builder
    pub fn with_label_color(mut self, color: RdgLabelColor) -> Self {
        self.label_color = color;
        self
    }
}

impl RdgCommandEncoder for RdgAshEncoder<'_> {
    fn pipeline_barrier(&mut self, buffer_barriers: &[RdgBufferBarrier], image_barriers: &[RdgImageBarrier]) {
        let buffer_barriers = buffer_barriers.iter().map(RdgBufferBarrier::to_vk).collect_vec();
        let image_barriers = image_barriers.iter().map(RdgImageBarrier::to_vk).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .buffer_memory_barriers(&buffer_barriers)
            .image_memory_barriers(&image_barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.command_buffer, &dependency_info);
        }
    }

    fn bind_pipeline(&mut self, binding: &RdgPipelineBinding) {
        unsafe {
            self.device.cmd_bind_pipeline(self.command_buffer, binding.bind_point, binding.pipeline);
        }
    }

    fn begin_label(&mut self, name: &str) {
        let Some(debug_utils) = self.debug_utils else {
            return;
        };
        let name = label_name(name);
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.command_buffer,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(self.label_color.into()),
            );
        }
    }

    fn insert_label(&mut self, name: &str) {
        let Some(debug_utils) = self.debug_utils else {
            return;
        };
        let name = label_name(name);
        unsafe {
            debug_utils.cmd_insert_debug_utils_label(
                self.command_buffer,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(self.label_color.into()),
            );
        }
    }

    fn end_label(&mut self) {
        if let Some(debug_utils) = self.debug_utils {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.command_buffer);
            }
        }
    }

    #[inline]
    fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}
