//! 规则与结果数据模型定义
//! 仅存储数据，无任何业务逻辑，支持序列化/反序列化

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 技术检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    pub categories: Vec<u32>,
    #[serde(default)]
    pub category_names: Vec<String>,
    #[serde(
        default,
        serialize_with = "serialize_opt_str",
        deserialize_with = "deserialize_opt_str"
    )]
    pub version: Option<String>,
    pub confidence: u8,
    pub implied: bool,
}

// ======== 为 Detection 实现 Display trait（用于 CLI / Report 输出） ========
impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) if !v.is_empty() => write!(f, "{} {}", self.name, v),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// 单个主机的扫描结果（每个输入主机有且仅有一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub host: String,
    pub detections: Vec<Detection>,
    #[serde(
        default,
        serialize_with = "serialize_opt_str",
        deserialize_with = "deserialize_opt_str"
    )]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ScanResult {
    /// 构建失败结果：带错误信息、无检测项
    pub fn failed(host: impl Into<String>, error: impl fmt::Display, duration_ms: u64) -> Self {
        Self {
            host: host.into(),
            detections: Vec::new(),
            error: Some(error.to_string()),
            duration_ms,
        }
    }

    /// 是否扫描成功
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ======== 辅助函数：None 序列化为空字符串，空字符串反序列化为 None ========
fn serialize_opt_str<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(value.as_deref().unwrap_or(""))
}

fn deserialize_opt_str<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.filter(|s| !s.is_empty()))
}

/// 技术规则定义（从 Wappalyzer 风格 JSON 解析）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TechRule {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(rename = "cats", default, alias = "categories")]
    pub category_ids: Vec<u32>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub cpe: Option<String>,

    // 检测规则
    #[serde(default)]
    pub url: Option<serde_json::Value>,
    #[serde(default)]
    pub html: Option<serde_json::Value>,
    // 兼容：旧版 apps.json 的 script 字段
    #[serde(default, alias = "script")]
    pub scripts: Option<serde_json::Value>,
    // 兼容：wappalyzergo 的 scriptSrc 字段
    #[serde(rename = "scriptSrc", default)]
    pub script_src: Option<serde_json::Value>,
    #[serde(default)]
    pub meta: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub headers: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub cookies: Option<HashMap<String, serde_json::Value>>,

    // 关联规则
    #[serde(default)]
    pub implies: Option<serde_json::Value>,
}

/// 分类规则定义
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub id: u32,
}

/// 完整规则库（技术按名称有序）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleLibrary {
    pub tech_rules: BTreeMap<String, TechRule>,
    pub category_rules: HashMap<u32, CategoryRule>,
}
