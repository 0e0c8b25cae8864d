//! Pass 定义和构建器
//!
//! 一个 Pass 由有序的资源访问、录制回调、可选的 pipeline 组成。
//! 访问的声明顺序决定了这个 Pass 生成的 barrier 顺序。

use super::access::{RdgAccess, RdgAccessState};
use super::barrier::RdgBarrierRef;
use super::command::{RdgCommandEncoder, RdgPipelineBinding};
use super::resource_handle::RdgResourceHandle;

/// Pass 的录制回调
pub type RdgRecorder<'a> = Box<dyn FnMut(&mut dyn RdgCommandEncoder) + 'a>;

pub struct RdgPass<'a> {
    pub(crate) name: String,
    pub(crate) accesses: Vec<RdgAccess>,
    pub(crate) pipeline: Option<RdgPipelineBinding>,
    pub(crate) recorder: RdgRecorder<'a>,

    /// 每个 access 对应的 barrier，bake 之后有效
    pub(crate) barriers: Vec<RdgBarrierRef>,
}

// new & builder
impl<'a> RdgPass<'a> {
    pub fn new(name: impl Into<String>, recorder: impl FnMut(&mut dyn RdgCommandEncoder) + 'a) -> Self {
        Self {
            name: name.into(),
            accesses: Vec::new(),
            pipeline: None,
            recorder: Box::new(recorder),
            barriers: Vec::new(),
        }
    }

    /// 声明只读访问
    #[inline]
    pub fn read(self, resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        self.access(RdgAccess::read(resource, state))
    }

    /// 声明写访问，保留之前的内容
    #[inline]
    pub fn write(self, resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        self.access(RdgAccess::write(resource, state))
    }

    /// 声明读写访问
    #[inline]
    pub fn read_write(self, resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        self.access(RdgAccess::read_write(resource, state))
    }

    /// 声明写访问，不关心之前的内容（例如每帧的第一次 clear）
    #[inline]
    pub fn write_discard(self, resource: RdgResourceHandle, state: RdgAccessState) -> Self {
        self.access(RdgAccess::write(resource, state).discard_previous())
    }

    pub fn access(mut self, access: RdgAccess) -> Self {
        self.accesses.push(access);
        self
    }

    pub fn with_pipeline(mut self, pipeline: RdgPipelineBinding) -> Self {
        self.pipeline = Some(pipeline);
        self
    }
}

// getters
impl RdgPass<'_> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn accesses(&self) -> &[RdgAccess] {
        &self.accesses
    }

    #[inline]
    pub fn pipeline(&self) -> Option<&RdgPipelineBinding> {
        self.pipeline.as_ref()
    }

    /// 每个 access 生成的 barrier 位置，与 `accesses()` 一一对应
    #[inline]
    pub fn barriers(&self) -> &[RdgBarrierRef] {
        &self.barriers
    }
}

impl std::fmt::Debug for RdgPass<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdgPass")
            .field("name", &self.name)
            .field("accesses", &self.accesses)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::access::RdgAccessFlags;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let a = RdgResourceHandle::default();
        let pass = RdgPass::new("blit", |_| {})
            .read(a, RdgAccessState::TRANSFER_SRC)
            .write_discard(a, RdgAccessState::TRANSFER_DST)
            .read_write(a, RdgAccessState::GENERAL);

        let flags = pass.accesses().iter().map(|access| access.flags).collect::<Vec<_>>();
        assert_eq!(
            flags,
            vec![
                RdgAccessFlags::READ,
                RdgAccessFlags::WRITE | RdgAccessFlags::FROM_UNDEFINED_LAYOUT,
                RdgAccessFlags::READ_WRITE
            ]
        );
        assert_eq!(pass.name(), "blit");
        assert!(pass.pipeline().is_none());
        assert!(pass.barriers().is_empty());
    }
}
