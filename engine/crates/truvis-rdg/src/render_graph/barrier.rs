//! Barrier 描述
//!
//! bake 阶段只知道逻辑资源，物理句柄在 render 时由 executor 填入，
//! 之后通过 `to_vk()` 转换为 `vk::*MemoryBarrier2`。

use ash::vk;

use super::access::RdgAccessState;
use super::resource::{RdgBuffer, RdgImage, RdgResourceKind};
use super::resource_handle::RdgResourceHandle;

/// 产生某个 barrier 的 (pass, access)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RdgAccessRef {
    /// Pass 在 graph 中的序号
    pub pass: usize,
    /// access 在 Pass 中的序号
    pub access: usize,
}

/// barrier 在 stage 中的位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RdgBarrierRef {
    pub stage: usize,
    /// 决定了 `index` 指向 buffer 列表还是 image 列表
    pub kind: RdgResourceKind,
    pub index: usize,
}

/// 图像 Barrier
#[derive(Clone, Debug)]
pub struct RdgImageBarrier {
    pub resource: RdgResourceHandle,
    pub origin: RdgAccessRef,
    /// 源状态
    pub src: RdgAccessState,
    /// 目标状态
    pub dst: RdgAccessState,

    /// 以下字段在 render 时根据物理资源填入
    pub image: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl RdgImageBarrier {
    pub fn new(resource: RdgResourceHandle, origin: RdgAccessRef, src: RdgAccessState, dst: RdgAccessState) -> Self {
        Self {
            resource,
            origin,
            src,
            dst,
            image: vk::Image::null(),
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
            array_layers: 1,
        }
    }

    /// 填入物理 image 的句柄与 subresource 信息
    pub fn patch_physical(&mut self, image: &RdgImage) {
        self.image = image.handle();
        self.aspect = image.aspect_mask();
        self.mip_levels = image.mip_levels();
        self.array_layers = image.array_layers();
    }

    /// 是否包含 layout 转换
    #[inline]
    pub fn is_layout_transition(&self) -> bool {
        self.src.layout != self.dst.layout
    }

    pub fn to_vk(&self) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2 {
            src_stage_mask: self.src.stage,
            src_access_mask: self.src.access,
            dst_stage_mask: self.dst.stage,
            dst_access_mask: self.dst.access,
            old_layout: self.src.layout,
            new_layout: self.dst.layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image: self.image,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: self.mip_levels,
                base_array_layer: 0,
                layer_count: self.array_layers,
            },
            ..Default::default()
        }
    }
}

/// 缓冲区 Barrier
#[derive(Clone, Debug)]
pub struct RdgBufferBarrier {
    pub resource: RdgResourceHandle,
    pub origin: RdgAccessRef,
    pub src: RdgAccessState,
    pub dst: RdgAccessState,

    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    /// WHOLE_SIZE 表示整个缓冲区
    pub size: vk::DeviceSize,
}

impl RdgBufferBarrier {
    pub fn new(resource: RdgResourceHandle, origin: RdgAccessRef, src: RdgAccessState, dst: RdgAccessState) -> Self {
        Self {
            resource,
            origin,
            src,
            dst,
            buffer: vk::Buffer::null(),
            offset: 0,
            size: vk::WHOLE_SIZE,
        }
    }

    pub fn patch_physical(&mut self, buffer: &RdgBuffer) {
        self.buffer = buffer.handle();
        self.size = buffer.size();
    }

    pub fn to_vk(&self) -> vk::BufferMemoryBarrier2<'static> {
        vk::BufferMemoryBarrier2 {
            src_stage_mask: self.src.stage,
            src_access_mask: self.src.access,
            dst_stage_mask: self.dst.stage,
            dst_access_mask: self.dst.access,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            buffer: self.buffer,
            offset: self.offset,
            size: self.size,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    const ORIGIN: RdgAccessRef = RdgAccessRef { pass: 0, access: 0 };

    #[test]
    fn test_image_barrier_to_vk() {
        let mut barrier = RdgImageBarrier::new(
            RdgResourceHandle::default(),
            ORIGIN,
            RdgAccessState::COLOR_ATTACHMENT_WRITE,
            RdgAccessState::SHADER_READ_FRAGMENT,
        );
        let depth = RdgImage::new(vk::Image::from_raw(42), vk::Format::D32_SFLOAT).with_mip_levels(4);
        barrier.patch_physical(&depth);

        let vk_barrier = barrier.to_vk();
        assert_eq!(vk_barrier.image, vk::Image::from_raw(42));
        assert_eq!(vk_barrier.old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(vk_barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(vk_barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(vk_barrier.subresource_range.level_count, 4);
        assert_eq!(vk_barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert!(barrier.is_layout_transition());
    }

    #[test]
    fn test_buffer_barrier_to_vk() {
        let mut barrier = RdgBufferBarrier::new(
            RdgResourceHandle::default(),
            ORIGIN,
            RdgAccessState::TRANSFER_DST_BUFFER,
            RdgAccessState::VERTEX_BUFFER,
        );
        barrier.patch_physical(&RdgBuffer::new(vk::Buffer::from_raw(9), 1024));

        let vk_barrier = barrier.to_vk();
        assert_eq!(vk_barrier.buffer, vk::Buffer::from_raw(9));
        assert_eq!(vk_barrier.size, 1024);
        assert_eq!(vk_barrier.src_access_mask, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(vk_barrier.dst_stage_mask, vk::PipelineStageFlags2::VERTEX_INPUT);
    }
}
