//! 子选项模式
//!
//! 每个模块可以声明一组类型化的用户可配置项（子选项）。宿主配置界面
//! 根据模式渲染表单，持久化层写回原始值；内核在激活模块前把原始值
//! 解析为完整的选项对象：每个声明过的子选项都有值，缺失或非法的值
//! 回退到声明的默认值。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::utils::error_code;

/// 解析完成的选项对象
///
/// 传递给模块 `init`/`main` 的选项，保证包含每个声明过的子选项
pub type ResolvedOptions = HashMap<String, Value>;

/// 自由文本子选项的异步校验器
///
/// 典型实现会调用外部服务校验输入（内核不提供具体实现）
#[async_trait]
pub trait SuboptionValidator: Send + Sync {
    /// 校验文本值，返回是否可接受
    async fn validate(&self, value: &str) -> bool;
}

/// 子选项类型
#[derive(Clone)]
pub enum SuboptionKind {
    /// 布尔开关
    Boolean,
    /// 颜色值（`#rgb` 或 `#rrggbb`）
    Color,
    /// 枚举字符串
    Enum {
        /// 合法取值列表
        variants: Vec<String>,
    },
    /// 自由文本，可附带异步校验器
    Text {
        /// 可选的异步校验器
        validator: Option<Arc<dyn SuboptionValidator>>,
    },
}

impl std::fmt::Debug for SuboptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuboptionKind::Boolean => write!(f, "Boolean"),
            SuboptionKind::Color => write!(f, "Color"),
            SuboptionKind::Enum { variants } => {
                f.debug_struct("Enum").field("variants", variants).finish()
            }
            SuboptionKind::Text { validator } => f
                .debug_struct("Text")
                .field("has_validator", &validator.is_some())
                .finish(),
        }
    }
}

/// 子选项声明
#[derive(Debug, Clone)]
pub struct Suboption {
    /// 选项名（在模块内唯一）
    pub name: String,
    /// 配置界面显示的标签
    pub label: String,
    /// 选项类型
    pub kind: SuboptionKind,
    /// 默认值
    pub default: Value,
    /// 是否允许在配置界面重置为默认值
    pub resettable: bool,
}

impl Suboption {
    /// 声明布尔子选项
    pub fn boolean(name: impl Into<String>, label: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: SuboptionKind::Boolean,
            default: Value::Bool(default),
            resettable: false,
        }
    }

    /// 声明颜色子选项
    pub fn color(name: impl Into<String>, label: impl Into<String>, default: &str) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: SuboptionKind::Color,
            default: Value::String(default.to_string()),
            resettable: false,
        }
    }

    /// 声明枚举子选项
    pub fn enumeration<I, S>(
        name: impl Into<String>,
        label: impl Into<String>,
        variants: I,
        default: &str,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            label: label.into(),
            kind: SuboptionKind::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
            default: Value::String(default.to_string()),
            resettable: false,
        }
    }

    /// 声明自由文本子选项
    pub fn text(name: impl Into<String>, label: impl Into<String>, default: &str) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: SuboptionKind::Text { validator: None },
            default: Value::String(default.to_string()),
            resettable: false,
        }
    }

    /// 附加异步校验器（仅对文本选项生效）
    pub fn with_validator(mut self, validator: Arc<dyn SuboptionValidator>) -> Self {
        if let SuboptionKind::Text { validator: slot } = &mut self.kind {
            *slot = Some(validator);
        }
        self
    }

    /// 标记为可重置
    pub fn resettable(mut self) -> Self {
        self.resettable = true;
        self
    }

    /// 校验一个存储值是否符合本选项的类型约束
    ///
    /// 文本选项的异步校验器也在这里执行
    pub async fn validate_value(&self, value: &Value) -> Result<(), String> {
        match &self.kind {
            SuboptionKind::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err("期望布尔值".to_string())
                }
            }
            SuboptionKind::Color => match value.as_str() {
                Some(s) if is_hex_color(s) => Ok(()),
                _ => Err("期望 #rgb 或 #rrggbb 格式的颜色值".to_string()),
            },
            SuboptionKind::Enum { variants } => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Ok(()),
                Some(s) => Err(format!("'{}' 不在合法取值列表中", s)),
                None => Err("期望字符串".to_string()),
            },
            SuboptionKind::Text { validator } => {
                let s = value.as_str().ok_or_else(|| "期望字符串".to_string())?;
                if let Some(validator) = validator {
                    if !validator.validate(s).await {
                        return Err(format!("'{}' 未通过校验", s));
                    }
                }
                Ok(())
            }
        }
    }

    /// 生成可序列化的模式快照（供宿主配置界面使用）
    pub fn schema(&self) -> SuboptionSchema {
        SuboptionSchema {
            name: self.name.clone(),
            label: self.label.clone(),
            kind: match &self.kind {
                SuboptionKind::Boolean => SuboptionSchemaKind::Boolean,
                SuboptionKind::Color => SuboptionSchemaKind::Color,
                SuboptionKind::Enum { variants } => SuboptionSchemaKind::Enum {
                    variants: variants.clone(),
                },
                SuboptionKind::Text { .. } => SuboptionSchemaKind::Text,
            },
            default: self.default.clone(),
            resettable: self.resettable,
        }
    }
}

/// 子选项模式快照（可序列化，不包含校验器）
#[derive(Debug, Clone, Serialize)]
pub struct SuboptionSchema {
    /// 选项名
    pub name: String,
    /// 显示标签
    pub label: String,
    /// 选项类型
    #[serde(flatten)]
    pub kind: SuboptionSchemaKind,
    /// 默认值
    pub default: Value,
    /// 是否可重置
    pub resettable: bool,
}

/// 子选项类型快照
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SuboptionSchemaKind {
    /// 布尔开关
    Boolean,
    /// 颜色值
    Color,
    /// 枚举字符串
    Enum {
        /// 合法取值列表
        variants: Vec<String>,
    },
    /// 自由文本
    Text,
}

/// 把持久化层的原始值解析为完整的选项对象
///
/// 每个声明过的子选项都会出现在结果中：
///
/// - 存储值存在且合法 → 使用存储值
/// - 存储值缺失 → 使用默认值
/// - 存储值类型不符或未通过校验 → 记录警告并回退到默认值
/// - 未声明的存储键 → 记录警告并忽略
pub async fn resolve_options(
    module_id: &str,
    suboptions: &[Suboption],
    values: &HashMap<String, Value>,
) -> ResolvedOptions {
    let mut resolved = ResolvedOptions::with_capacity(suboptions.len());

    for suboption in suboptions {
        let value = match values.get(&suboption.name) {
            Some(value) => match suboption.validate_value(value).await {
                Ok(()) => value.clone(),
                Err(reason) => {
                    warn!(
                        module_id = %module_id,
                        name = %suboption.name,
                        error_code = error_code::OPTION_INVALID_VALUE,
                        error_msg = %reason,
                        "存储的子选项值无效，回退到默认值"
                    );
                    suboption.default.clone()
                }
            },
            None => suboption.default.clone(),
        };
        resolved.insert(suboption.name.clone(), value);
    }

    for name in values.keys() {
        if !suboptions.iter().any(|s| &s.name == name) {
            warn!(
                module_id = %module_id,
                name = %name,
                error_code = error_code::OPTION_UNKNOWN,
                "存储值引用了未声明的子选项，忽略"
            );
        }
    }

    resolved
}

/// 校验 `#rgb` / `#rrggbb` 颜色格式
fn is_hex_color(s: &str) -> bool {
    let Some(hex) = s.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}
