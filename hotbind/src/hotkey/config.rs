//! 热键配置模块
//!
//! 定义配置文件中声明的原生热键绑定

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::{HotkeyError, HotkeyResult};
use super::keys::KeySpec;
use super::HotkeyId;

/// 单个热键绑定
///
/// # Examples
///
/// ```
/// use hotbind_lib::hotkey::HotkeyBinding;
///
/// let binding = HotkeyBinding::new(1, "cmd+shift+r").unwrap().with_label("reload");
/// assert_eq!(binding.keys.to_string(), "cmd+shift+r");
/// assert_eq!(binding.label.as_deref(), Some("reload"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    /// 标识符
    pub id: HotkeyId,

    /// 按键组合，例如 `cmd+shift+r`
    pub keys: KeySpec,

    /// 显示名称（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl HotkeyBinding {
    /// 解析按键组合并创建绑定
    pub fn new(id: HotkeyId, keys: &str) -> HotkeyResult<Self> {
        Ok(Self {
            id,
            keys: keys.parse()?,
            label: None,
        })
    }

    /// 设置显示名称
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// 日志中使用的名称
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{} ({})", label, self.keys),
            None => self.keys.to_string(),
        }
    }
}

/// 热键配置
///
/// # Examples
///
/// ```
/// use hotbind_lib::hotkey::{HotkeyBinding, HotkeyConfig};
///
/// let config = HotkeyConfig::default()
///     .with_binding(HotkeyBinding::new(1, "cmd+a").unwrap())
///     .with_binding(HotkeyBinding::new(2, "cmd+b").unwrap());
/// assert_eq!(config.ids(), vec![1, 2]);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HotkeyConfig {
    /// 启动时注册的绑定
    pub bindings: Vec<HotkeyBinding>,
}

impl HotkeyConfig {
    /// 添加绑定
    pub fn with_binding(mut self, binding: HotkeyBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// 按标识符查找绑定
    pub fn find(&self, id: HotkeyId) -> Option<&HotkeyBinding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    /// 所有标识符（按声明顺序）
    pub fn ids(&self) -> Vec<HotkeyId> {
        self.bindings.iter().map(|b| b.id).collect()
    }

    /// 校验配置
    ///
    /// # Errors
    ///
    /// - 标识符重复：[`HotkeyError::DuplicateIdentifier`]
    /// - 按键组合重复：[`HotkeyError::Registration`]
    pub fn validate(&self) -> HotkeyResult<()> {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();

        for binding in &self.bindings {
            if !ids.insert(binding.id) {
                return Err(HotkeyError::DuplicateIdentifier(binding.id));
            }
            if !keys.insert(binding.keys) {
                return Err(HotkeyError::Registration {
                    key: binding.keys.to_string(),
                    reason: "key combination is bound more than once".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_empty() {
        let config = HotkeyConfig::default();
        assert!(config.bindings.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_binding_rejects_bad_keys() {
        assert!(matches!(
            HotkeyBinding::new(1, "cmd+nokey"),
            Err(HotkeyError::InvalidKey(_))
        ));
        assert!(matches!(
            HotkeyBinding::new(1, "hyper+a"),
            Err(HotkeyError::InvalidModifier(_))
        ));
    }

    #[test]
    fn test_validate_duplicates() {
        let config = HotkeyConfig::default()
            .with_binding(HotkeyBinding::new(1, "cmd+a").unwrap())
            .with_binding(HotkeyBinding::new(1, "cmd+b").unwrap());
        assert_eq!(config.validate(), Err(HotkeyError::DuplicateIdentifier(1)));

        let config = HotkeyConfig::default()
            .with_binding(HotkeyBinding::new(1, "cmd+a").unwrap())
            .with_binding(HotkeyBinding::new(2, "command+a").unwrap());
        assert!(matches!(config.validate(), Err(HotkeyError::Registration { .. })));
    }

    #[test]
    fn test_find_and_display_name() {
        let config = HotkeyConfig::default()
            .with_binding(HotkeyBinding::new(7, "ctrl+opt+space").unwrap().with_label("launcher"));

        let binding = config.find(7).unwrap();
        assert_eq!(binding.display_name(), "launcher (ctrl+opt+space)");
        assert!(config.find(8).is_none());
    }

    #[test]
    fn test_config_serialization() {
        let json = r#"{"bindings":[{"id":1,"keys":"cmd+shift+r","label":"reload"},{"id":2,"keys":"f5"}]}"#;
        let config: HotkeyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bindings.len(), 2);
        assert_eq!(config.bindings[1].label, None);

        let round: HotkeyConfig = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(config, round);

        let empty: HotkeyConfig = serde_json::from_str("{}").unwrap();
        assert!(empty.bindings.is_empty());
    }
}
