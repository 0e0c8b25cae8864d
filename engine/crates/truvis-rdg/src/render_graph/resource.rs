//! 物理资源
//!
//! RDG 不负责物理资源的创建与销毁，只通过 resolver 拿到当前帧对应的物理对象。
//! image 对象上记录了 "当前 layout"，由 executor 在每个 stage 之后更新，
//! 外部代码如果自己改变了 image 的 layout，也应该同步写回这里。

use std::cell::Cell;
use std::rc::Rc;

use ash::vk;

/// 资源类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RdgResourceKind {
    Buffer,
    Image,
}

/// 物理 buffer
#[derive(Debug)]
pub struct RdgBuffer {
    handle: vk::Buffer,
    size: vk::DeviceSize,
}

impl RdgBuffer {
    /// `size` 为 `vk::WHOLE_SIZE` 时 barrier 覆盖整个 buffer
    #[inline]
    pub fn new(handle: vk::Buffer, size: vk::DeviceSize) -> Self {
        Self { handle, size }
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

/// 物理 image
///
/// `current_layout` 使用 `Cell`：RDG 只在单线程中使用，executor 通过共享引用更新它。
#[derive(Debug)]
pub struct RdgImage {
    handle: vk::Image,
    format: vk::Format,
    mip_levels: u32,
    array_layers: u32,
    current_layout: Cell<vk::ImageLayout>,
}

// new & init
impl RdgImage {
    /// 创建 image 描述，初始 layout 为 `UNDEFINED`
    pub fn new(handle: vk::Image, format: vk::Format) -> Self {
        Self {
            handle,
            format,
            mip_levels: 1,
            array_layers: 1,
            current_layout: Cell::new(vk::ImageLayout::UNDEFINED),
        }
    }

    /// builder
    #[inline]
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// builder
    #[inline]
    pub fn with_array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        self
    }

    /// builder
    ///
    /// 导入已经处于某个 layout 的 image，例如上传完成后处于 `SHADER_READ_ONLY_OPTIMAL` 的纹理
    #[inline]
    pub fn with_layout(self, layout: vk::ImageLayout) -> Self {
        self.current_layout.set(layout);
        self
    }
}

// getters
impl RdgImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn current_layout(&self) -> vk::ImageLayout {
        self.current_layout.get()
    }

    #[inline]
    pub fn set_current_layout(&self, layout: vk::ImageLayout) {
        self.current_layout.set(layout);
    }

    /// 根据 format 推断 aspect
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        match self.format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }
}

/// 物理资源的身份，用于注册时去重
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RdgPhysicalId {
    Buffer(vk::Buffer),
    Image(vk::Image),
}

/// resolver 返回的物理资源
///
/// 物理对象由外部持有，RDG 只保存 `Rc`，以便 executor 读取并回写 image 的 layout。
#[derive(Clone, Debug)]
pub enum RdgPhysicalResource {
    Buffer(Rc<RdgBuffer>),
    Image(Rc<RdgImage>),
}

impl RdgPhysicalResource {
    #[inline]
    pub fn kind(&self) -> RdgResourceKind {
        match self {
            Self::Buffer(_) => RdgResourceKind::Buffer,
            Self::Image(_) => RdgResourceKind::Image,
        }
    }

    #[inline]
    pub fn id(&self) -> RdgPhysicalId {
        match self {
            Self::Buffer(buffer) => RdgPhysicalId::Buffer(buffer.handle()),
            Self::Image(image) => RdgPhysicalId::Image(image.handle()),
        }
    }

    /// 句柄是否为 null（resolver 返回了无效对象）
    pub fn is_null(&self) -> bool {
        match self {
            Self::Buffer(buffer) => buffer.handle() == vk::Buffer::null(),
            Self::Image(image) => image.handle() == vk::Image::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_image_aspect_from_format() {
        let color = RdgImage::new(vk::Image::from_raw(1), vk::Format::R8G8B8A8_UNORM);
        let depth = RdgImage::new(vk::Image::from_raw(2), vk::Format::D32_SFLOAT);
        let depth_stencil = RdgImage::new(vk::Image::from_raw(3), vk::Format::D24_UNORM_S8_UINT);

        assert_eq!(color.aspect_mask(), vk::ImageAspectFlags::COLOR);
        assert_eq!(depth.aspect_mask(), vk::ImageAspectFlags::DEPTH);
        assert_eq!(depth_stencil.aspect_mask(), vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL);
    }

    #[test]
    fn test_physical_identity_ignores_wrapper() {
        let a = RdgPhysicalResource::Image(Rc::new(RdgImage::new(vk::Image::from_raw(7), vk::Format::R8_UNORM)));
        let b = RdgPhysicalResource::Image(Rc::new(RdgImage::new(vk::Image::from_raw(7), vk::Format::R8_UNORM)));
        let c = RdgPhysicalResource::Buffer(Rc::new(RdgBuffer::new(vk::Buffer::from_raw(7), vk::WHOLE_SIZE)));

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(c.kind(), RdgResourceKind::Buffer);
    }

    #[test]
    fn test_null_handle_detection() {
        let null = RdgPhysicalResource::Buffer(Rc::new(RdgBuffer::new(vk::Buffer::null(), 64)));
        assert!(null.is_null());
    }
}
