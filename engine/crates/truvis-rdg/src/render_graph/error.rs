use std::path::PathBuf;

use super::resource::RdgResourceKind;
use super::resource_handle::RdgResourceHandle;

/// RDG 的错误
///
/// 除了配置文件相关的错误，其余都是调用方的编程错误：`bake()` / `render()` 遇到时会记录日志并 panic，
/// `try_bake()` / `try_render()` 则把错误返回给调用方。
#[derive(Debug, thiserror::Error)]
pub enum RdgError {
    /// 注册资源时 resolver 没有返回有效的物理资源
    #[error("resource \"{name}\" could not be resolved while registering it")]
    UnresolvableAtRegistration { name: String },

    /// Pass 访问了不属于这个 graph 的资源
    #[error("pass #{pass} \"{pass_name}\" access #{access} references unregistered resource {resource:?}")]
    UnregisteredResource {
        pass: usize,
        pass_name: String,
        access: usize,
        resource: RdgResourceHandle,
    },

    /// render 时 resolver 没有返回有效的物理资源
    #[error("resource {resource:?} \"{name}\" could not be resolved to a physical object")]
    UnresolvableResource { resource: RdgResourceHandle, name: String },

    /// resolver 返回的资源类型与注册时不同
    #[error("resource {resource:?} \"{name}\" was registered as {expected:?} but resolved to {actual:?}")]
    ResourceKindChanged {
        resource: RdgResourceHandle,
        name: String,
        expected: RdgResourceKind,
        actual: RdgResourceKind,
    },

    #[error("failed to read rdg config {path:?}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rdg config")]
    ConfigParse(#[from] toml::de::Error),
}

/// 配置错误是致命的：先记录日志，再 panic
pub(crate) fn fatal(err: RdgError) -> ! {
    log::error!("rdg: {err}");
    panic!("render dependency graph: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RdgError::UnresolvableAtRegistration { name: "swapchain".to_string() };
        assert_eq!(err.to_string(), "resource \"swapchain\" could not be resolved while registering it");
    }

    #[test]
    #[should_panic(expected = "render dependency graph")]
    fn test_fatal_panics() {
        fatal(RdgError::UnresolvableAtRegistration { name: "x".to_string() });
    }
}
