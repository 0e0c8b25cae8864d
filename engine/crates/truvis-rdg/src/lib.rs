//! Truvis Render Dependency Graph
//!
//! 各个 Pass 只声明自己对资源的访问（stage / access / layout），
//! RDG 负责分析访问冲突、把 Pass 分配到 stage、为每个 stage 生成一批 barrier，并按 stage 顺序执行。
//!
//! 入口类型是 [`RenderDependencyGraph`]，详见 [`render_graph`] 模块文档。

pub mod render_graph;

pub use render_graph::*;
