use std::collections::HashMap;

use bitflags::bitflags;
use slotmap::SlotMap;

use super::error::RdgError;
use super::resource::{RdgPhysicalId, RdgPhysicalResource, RdgResourceKind};
use super::resource_handle::RdgResourceHandle;

bitflags! {
    /// 逻辑资源的标记
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RdgResourceFlags: u32 {
        /// 每次 bake 之间物理资源可能变化（例如 swapchain image）。
        ///
        /// 这类资源不做跨帧的 barrier 衔接，第一次访问应当声明 `FROM_UNDEFINED_LAYOUT`
        /// 或者不关心之前的内容。
        const PER_FRAME = 1 << 0;
    }
}

/// 返回当前物理资源的回调
///
/// 对同一个逻辑资源，返回的资源类型必须保持不变；返回 `None` 表示无法解析，属于致命错误。
pub type RdgResolver<'a> = Box<dyn Fn() -> Option<RdgPhysicalResource> + 'a>;

/// 注册表中的一个逻辑资源
pub struct RdgResource<'a> {
    /// 调试名称
    pub name: String,
    pub kind: RdgResourceKind,
    pub flags: RdgResourceFlags,
    resolver: RdgResolver<'a>,
}

impl RdgResource<'_> {
    /// 解析当前的物理资源
    ///
    /// 类型变化、无法解析、句柄为 null 都视为错误。
    pub fn resolve(&self, handle: RdgResourceHandle) -> Result<RdgPhysicalResource, RdgError> {
        let physical = (self.resolver)()
            .filter(|physical| !physical.is_null())
            .ok_or_else(|| RdgError::UnresolvableResource { resource: handle, name: self.name.clone() })?;

        if physical.kind() != self.kind {
            return Err(RdgError::ResourceKindChanged {
                resource: handle,
                name: self.name.clone(),
                expected: self.kind,
                actual: physical.kind(),
            });
        }
        Ok(physical)
    }

    #[inline]
    pub fn is_per_frame(&self) -> bool {
        self.flags.contains(RdgResourceFlags::PER_FRAME)
    }
}

impl std::fmt::Debug for RdgResource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdgResource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// 资源注册表
///
/// 使用 SlotMap 存储逻辑资源，并按物理资源身份建立索引，保证同一个物理资源只注册一次。
#[derive(Default)]
pub struct RdgResourceRegistry<'a> {
    resources: SlotMap<RdgResourceHandle, RdgResource<'a>>,
    /// 物理资源身份 -> 逻辑句柄
    physical_index: HashMap<RdgPhysicalId, RdgResourceHandle>,
}

// new & init
impl RdgResourceRegistry<'_> {
    pub fn new() -> Self {
        Self::default()
    }
}

// register
impl<'a> RdgResourceRegistry<'a> {
    /// 注册逻辑资源
    ///
    /// 立即调用一次 resolver 得到物理身份；如果这个身份已经注册过，直接返回已有的句柄，
    /// 新的 resolver 与 flags 会被丢弃。
    pub fn register(
        &mut self,
        name: impl Into<String>,
        resolver: RdgResolver<'a>,
        flags: RdgResourceFlags,
    ) -> Result<RdgResourceHandle, RdgError> {
        let name = name.into();
        let physical = resolver()
            .filter(|physical| !physical.is_null())
            .ok_or_else(|| RdgError::UnresolvableAtRegistration { name: name.clone() })?;

        let id = physical.id();
        if let Some(&handle) = self.physical_index.get(&id) {
            return Ok(handle);
        }

        let kind = physical.kind();
        let handle = self.resources.insert(RdgResource {
            name,
            kind,
            flags,
            resolver,
        });
        self.physical_index.insert(id, handle);
        log::debug!("rdg: registered {:?} resource \"{}\" as {:?}", kind, self.resources[handle].name, handle);

        Ok(handle)
    }

    /// 清空所有资源，之前的句柄全部失效
    pub fn clear(&mut self) {
        self.resources.clear();
        self.physical_index.clear();
    }
}

// getter & iter
impl<'a> RdgResourceRegistry<'a> {
    #[inline]
    pub fn get(&self, handle: RdgResourceHandle) -> Option<&RdgResource<'a>> {
        self.resources.get(handle)
    }

    #[inline]
    pub fn contains(&self, handle: RdgResourceHandle) -> bool {
        self.resources.contains_key(handle)
    }

    /// 资源的调试名称，未注册时返回 `<unknown>`
    pub fn name_of(&self, handle: RdgResourceHandle) -> &str {
        self.resources.get(handle).map(|r| r.name.as_str()).unwrap_or("<unknown>")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (RdgResourceHandle, &RdgResource<'a>)> {
        self.resources.iter()
    }
}

impl<'a> std::ops::Index<RdgResourceHandle> for RdgResourceRegistry<'a> {
    type Output = RdgResource<'a>;

    /// 句柄必须已经注册（bake 开始时会统一检查）
    #[inline]
    fn index(&self, handle: RdgResourceHandle) -> &Self::Output {
        &self.resources[handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::resource::{RdgBuffer, RdgImage};
    use ash::vk::{self, Handle};
    use std::cell::Cell;
    use std::rc::Rc;

    fn image(raw: u64) -> Rc<RdgImage> {
        Rc::new(RdgImage::new(vk::Image::from_raw(raw), vk::Format::R8G8B8A8_UNORM))
    }

    #[test]
    fn test_register_dedups_by_physical_identity() {
        let mut registry = RdgResourceRegistry::new();
        let img = image(10);

        let img_a = img.clone();
        let a = registry
            .register("a", Box::new(move || Some(RdgPhysicalResource::Image(img_a.clone()))), RdgResourceFlags::empty())
            .unwrap();
        let img_b = img.clone();
        let b = registry
            .register("b", Box::new(move || Some(RdgPhysicalResource::Image(img_b.clone()))), RdgResourceFlags::empty())
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.name_of(a), "a");
    }

    #[test]
    fn test_buffer_and_image_with_same_raw_handle_are_distinct() {
        let mut registry = RdgResourceRegistry::new();
        let img = image(5);
        let buf = Rc::new(RdgBuffer::new(vk::Buffer::from_raw(5), vk::WHOLE_SIZE));

        let a = registry
            .register("img", Box::new(move || Some(RdgPhysicalResource::Image(img.clone()))), RdgResourceFlags::empty())
            .unwrap();
        let b = registry
            .register("buf", Box::new(move || Some(RdgPhysicalResource::Buffer(buf.clone()))), RdgResourceFlags::empty())
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.get(a).unwrap().kind, RdgResourceKind::Image);
        assert_eq!(registry.get(b).unwrap().kind, RdgResourceKind::Buffer);
    }

    #[test]
    fn test_register_unresolvable_fails() {
        let mut registry = RdgResourceRegistry::new();
        let result = registry.register("missing", Box::new(|| None), RdgResourceFlags::empty());
        assert!(matches!(result, Err(RdgError::UnresolvableAtRegistration { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_detects_kind_change() {
        let mut registry = RdgResourceRegistry::new();
        let as_buffer = Rc::new(Cell::new(false));
        let img = image(3);
        let buf = Rc::new(RdgBuffer::new(vk::Buffer::from_raw(4), 256));

        let flag = as_buffer.clone();
        let handle = registry
            .register(
                "shape-shifter",
                Box::new(move || {
                    if flag.get() {
                        Some(RdgPhysicalResource::Buffer(buf.clone()))
                    } else {
                        Some(RdgPhysicalResource::Image(img.clone()))
                    }
                }),
                RdgResourceFlags::empty(),
            )
            .unwrap();

        let resource = registry.get(handle).unwrap();
        assert!(resource.resolve(handle).is_ok());

        as_buffer.set(true);
        assert!(matches!(
            resource.resolve(handle),
            Err(RdgError::ResourceKindChanged { expected: RdgResourceKind::Image, actual: RdgResourceKind::Buffer, .. })
        ));
    }
}
