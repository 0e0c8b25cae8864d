use std::path::Path;

use serde::Deserialize;

use super::error::RdgError;

/// RDG 的行为开关
///
/// 可以从 TOML 加载，缺省的字段使用默认值：
///
/// ```toml
/// relax_same_layout_reads = false
/// print_plan_on_bake = true
/// debug_labels = true
/// track_image_layouts = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RdgConfig {
    /// 写访问只与 layout 不同的读排序；同 layout 的读可以与写位于同一个 stage
    pub relax_same_layout_reads: bool,
    /// 每次 bake 之后用 `log::info!` 输出执行计划
    pub print_plan_on_bake: bool,
    /// 为每个 Pass 插入 debug label
    pub debug_labels: bool,
    /// render 时读取并回写 image 的当前 layout
    ///
    /// 关闭后 RDG 不再回写 layout，barrier 的 src layout 由 bake 决定；
    /// 只有 image 在一帧中第一次访问时的 `UNKNOWN_PRIOR` 占位 layout 会换成 image 上记录的 layout，
    /// 调用方需要通过 `RdgImage::with_layout` / `set_current_layout` 保持它正确。
    pub track_image_layouts: bool,
}

impl Default for RdgConfig {
    fn default() -> Self {
        Self {
            relax_same_layout_reads: false,
            print_plan_on_bake: false,
            debug_labels: true,
            track_image_layouts: true,
        }
    }
}

impl RdgConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, RdgError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RdgError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RdgError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RdgConfig::from_toml_str("relax_same_layout_reads = true").unwrap();
        assert!(config.relax_same_layout_reads);
        assert!(config.debug_labels);
        assert!(config.track_image_layouts);
        assert!(!config.print_plan_on_bake);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = RdgConfig::from_toml_str("debug_labels = \"yes\"");
        assert!(matches!(result, Err(RdgError::ConfigParse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = RdgConfig::from_file("/definitely/not/here/rdg.toml");
        assert!(matches!(result, Err(RdgError::ConfigIo { .. })));
    }
}
