//! RDG 逻辑资源句柄
//!
//! 句柄只在创建它的 [`RenderDependencyGraph`](super::RenderDependencyGraph) 内有效，
//! 与物理资源（`vk::Buffer` / `vk::Image`）分离：同一个逻辑资源每帧可以解析到不同的物理资源。

use slotmap::new_key_type;

new_key_type! {
    /// 逻辑资源句柄，buffer 和 image 共用同一个句柄空间
    pub struct RdgResourceHandle;
}
