//! Pass 对资源的一次访问 [`RdgAccess`]
//!
//! [`RdgAccessState`] 是 Vulkan 同步所需的 stage / access / layout 三元组，附带常用的组合；
//! [`RdgAccessFlags`] 说明这次访问是读还是写，决定冲突检测如何排序。

use ash::vk;
use bitflags::bitflags;

use super::resource_handle::RdgResourceHandle;

/// 一次访问对资源的要求：在哪个 stage、以什么 access、处于哪个 layout
///
/// buffer 的 `layout` 恒为 `UNDEFINED`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RdgAccessState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}

impl Default for RdgAccessState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

/// const 上下文中合并两个 stage
const fn stages(a: vk::PipelineStageFlags2, b: vk::PipelineStageFlags2) -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::from_raw(a.as_raw() | b.as_raw())
}

/// const 上下文中合并两个 access
const fn accesses(a: vk::AccessFlags2, b: vk::AccessFlags2) -> vk::AccessFlags2 {
    vk::AccessFlags2::from_raw(a.as_raw() | b.as_raw())
}

const MEMORY_READ_WRITE: vk::AccessFlags2 = accesses(vk::AccessFlags2::MEMORY_READ, vk::AccessFlags2::MEMORY_WRITE);
const FRAGMENT_TESTS: vk::PipelineStageFlags2 =
    stages(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS);

impl RdgAccessState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    /// buffer 没有 layout
    #[inline]
    pub const fn buffer(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self::new(stage, access, vk::ImageLayout::UNDEFINED)
    }

    /// 把 stage / access 换成 `other` 的，保留自己的 layout
    #[inline]
    pub const fn with_sync_of(self, other: Self) -> Self {
        Self::new(other.stage, other.access, self.layout)
    }
}

/// 不依赖任何之前的内容
impl RdgAccessState {
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// 等待之前的所有命令，并且可用于任何操作
    pub const GENERAL: Self = Self::new(vk::PipelineStageFlags2::ALL_COMMANDS, MEMORY_READ_WRITE, vk::ImageLayout::GENERAL);

    /// 第一次访问、又没有声明 `FROM_UNDEFINED_LAYOUT` 时的 src
    ///
    /// 与 [`Self::GENERAL`] 相同，但 layout 只是占位：executor 会换成 image 记录的当前 layout。
    pub const UNKNOWN_PRIOR: Self = Self::GENERAL;
}

/// image：附件
impl RdgAccessState {
    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );
    /// blend
    pub const COLOR_ATTACHMENT_READ_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        accesses(vk::AccessFlags2::COLOR_ATTACHMENT_READ, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );
    pub const DEPTH_ATTACHMENT_WRITE: Self = Self::new(
        FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );
    /// 深度测试的同时在 fragment shader 中采样
    pub const DEPTH_READ_ONLY: Self = Self::new(
        stages(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags2::FRAGMENT_SHADER),
        accesses(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags2::SHADER_SAMPLED_READ),
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );
}

/// image：shader 中的采样与 storage 访问
impl RdgAccessState {
    pub const SHADER_READ_FRAGMENT: Self = Self::sampled(vk::PipelineStageFlags2::FRAGMENT_SHADER);
    pub const SHADER_READ_COMPUTE: Self = Self::sampled(vk::PipelineStageFlags2::COMPUTE_SHADER);
    pub const STORAGE_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );
    pub const STORAGE_READ_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        accesses(vk::AccessFlags2::SHADER_STORAGE_READ, vk::AccessFlags2::SHADER_STORAGE_WRITE),
        vk::ImageLayout::GENERAL,
    );

    const fn sampled(stage: vk::PipelineStageFlags2) -> Self {
        Self::new(stage, vk::AccessFlags2::SHADER_SAMPLED_READ, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    }
}

/// image：copy / blit 与呈现
impl RdgAccessState {
    pub const TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );
    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );
    /// swapchain image 交给 present engine
    pub const PRESENT: Self =
        Self::new(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);
}

/// buffer
impl RdgAccessState {
    pub const VERTEX_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::VERTEX_INPUT, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ);
    pub const INDEX_BUFFER: Self = Self::buffer(vk::PipelineStageFlags2::INDEX_INPUT, vk::AccessFlags2::INDEX_READ);
    pub const INDIRECT_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::DRAW_INDIRECT, vk::AccessFlags2::INDIRECT_COMMAND_READ);

    pub const UNIFORM_FRAGMENT: Self =
        Self::buffer(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::UNIFORM_READ);
    pub const UNIFORM_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::UNIFORM_READ);
    pub const STORAGE_BUFFER_READ_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ);
    pub const STORAGE_BUFFER_WRITE_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE);

    pub const TRANSFER_SRC_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ);
    pub const TRANSFER_DST_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);
}

bitflags! {
    /// 访问的读写分类
    ///
    /// 空集合即 [`RdgAccessFlags::NONE`]：分类未知，按最保守的方式处理（等同于读写）。
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RdgAccessFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        /// 不关心资源之前的内容与 layout，例如每帧第一次写入
        const FROM_UNDEFINED_LAYOUT = 1 << 2;
    }
}

impl RdgAccessFlags {
    /// 分类未知
    pub const NONE: Self = Self::empty();

    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_WRITE.as_raw()
            | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::HOST_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw()
            | vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR.as_raw(),
    );

    /// 根据 access mask 推断读写分类
    ///
    /// 不含任何写 bit 的非空 mask 视为只读；空 mask 返回 `NONE`。
    pub fn classify(access: vk::AccessFlags2) -> Self {
        if access == vk::AccessFlags2::NONE {
            return Self::NONE;
        }

        let mut flags = Self::empty();
        if access.intersects(Self::WRITE_ACCESS) {
            flags |= Self::WRITE;
        }
        if !(access & !Self::WRITE_ACCESS).is_empty() {
            flags |= Self::READ;
        }
        flags
    }

    /// 只读访问：可以与其他只读访问并行
    #[inline]
    pub fn is_pure_read(self) -> bool {
        self.contains(Self::READ) && !self.contains(Self::WRITE)
    }
}

/// Pass 对某个资源的一次访问
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RdgAccess {
    pub resource: RdgResourceHandle,
    pub state: RdgAccessState,
    pub flags: RdgAccessFlags,
}

// new & builder
impl RdgAccess {
    #[inline]
    pub fn new(resource: RdgResourceHandle, state: RdgAccessState, flags: RdgAccessFlags) -> Self {
        Self { resource, state, flags }
    }

    /// 只读访问
    #[inline]
    pub fn read(resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        Self::new(resource, state, RdgAccessFlags::READ)
    }

    /// 写访问
    #[inline]
    pub fn write(resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        Self::new(resource, state, RdgAccessFlags::WRITE)
    }

    /// 读写访问（如 RT 累积、blend）
    #[inline]
    pub fn read_write(resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        Self::new(resource, state, RdgAccessFlags::READ_WRITE)
    }

    /// 根据 `state.access` 自动推断读写分类
    #[inline]
    pub fn auto(resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        Self::new(resource, state, RdgAccessFlags::classify(state.access))
    }

    /// builder：声明不关心之前的内容
    #[inline]
    pub fn discard_previous(mut self) -> Self {
        self.flags |= RdgAccessFlags::FROM_UNDEFINED_LAYOUT;
        self
    }
}

// getters
impl RdgAccess {
    #[inline]
    pub fn is_pure_read(&self) -> bool {
        self.flags.is_pure_read()
    }

    #[inline]
    pub fn from_undefined_layout(&self) -> bool {
        self.flags.contains(RdgAccessFlags::FROM_UNDEFINED_LAYOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_access_masks() {
        assert_eq!(RdgAccessFlags::classify(vk::AccessFlags2::SHADER_SAMPLED_READ), RdgAccessFlags::READ);
        assert_eq!(RdgAccessFlags::classify(vk::AccessFlags2::TRANSFER_WRITE), RdgAccessFlags::WRITE);
        assert_eq!(
            RdgAccessFlags::classify(RdgAccessState::STORAGE_READ_WRITE_COMPUTE.access),
            RdgAccessFlags::READ_WRITE
        );
        assert_eq!(RdgAccessFlags::classify(vk::AccessFlags2::NONE), RdgAccessFlags::NONE);
    }

    #[test]
    fn test_none_and_read_write_are_not_pure_reads() {
        assert!(RdgAccessFlags::READ.is_pure_read());
        assert!((RdgAccessFlags::READ | RdgAccessFlags::FROM_UNDEFINED_LAYOUT).is_pure_read());
        assert!(!RdgAccessFlags::READ_WRITE.is_pure_read());
        assert!(!RdgAccessFlags::WRITE.is_pure_read());
        assert!(!RdgAccessFlags::NONE.is_pure_read());
    }

    #[test]
    fn test_discard_previous_keeps_classification() {
        let access = RdgAccess::write(RdgResourceHandle::default(), RdgAccessState::TRANSFER_DST).discard_previous();
        assert!(access.from_undefined_layout());
        assert!(access.flags.contains(RdgAccessFlags::WRITE));
    }
}
