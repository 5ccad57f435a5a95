//! 规则加载管理器
//! 负责从本地文件或内存读取签名定义文档，解析为规则库并编译为签名库

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::model::{CategoryRule, RuleLibrary, TechRule};
use crate::compiler::{RuleCompiler, SignatureStore};
use crate::error::{RswResult, RswebanalyzeError};

/// 签名定义来源
#[derive(Debug, Clone)]
pub enum SignatureSource {
    /// 本地文件（`.mp` 后缀按 MessagePack 解析，其余按 JSON 解析）
    File(PathBuf),
    /// 内存中的 JSON 文本
    Json(String),
    /// 内存中的 MessagePack 字节
    MsgPack(Vec<u8>),
}

impl SignatureSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

/// 规则文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFileType {
    /// Wappalyzer / webanalyze 风格 apps.json
    Json,
    /// rmp-serde 序列化的同结构规则文件
    MsgPack,
}

impl RuleFileType {
    /// 根据文件后缀判断类型
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mp") => RuleFileType::MsgPack,
            _ => RuleFileType::Json,
        }
    }
}

/// 规则加载管理器
pub struct RuleLoader;

impl RuleLoader {
    /// 加载并编译签名库（启动阶段一次性完成）
    pub async fn load(source: &SignatureSource) -> RswResult<SignatureStore> {
        let rule_lib = Self::load_library(source).await?;
        let store = RuleCompiler::compile(&rule_lib);
        debug!(
            "签名库加载完成，原始技术规则{}条，有效签名{}条，分类{}个",
            rule_lib.tech_rules.len(),
            store.len(),
            rule_lib.category_rules.len()
        );
        Ok(store)
    }

    /// 读取并解析原始规则库（不编译）
    pub async fn load_library(source: &SignatureSource) -> RswResult<RuleLibrary> {
        match source {
            SignatureSource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    RswebanalyzeError::SourceUnavailable {
                        path: path.display().to_string(),
                        cause: e.to_string(),
                    }
                })?;
                debug!("读取规则文件成功：{}，大小{}字节", path.display(), bytes.len());
                Self::parse_bytes(&bytes, RuleFileType::from_path(path))
            }
            SignatureSource::Json(text) => Self::parse_bytes(text.as_bytes(), RuleFileType::Json),
            SignatureSource::MsgPack(bytes) => Self::parse_bytes(bytes, RuleFileType::MsgPack),
        }
    }

    /// 按类型解析字节流
    pub fn parse_bytes(bytes: &[u8], file_type: RuleFileType) -> RswResult<RuleLibrary> {
        let document: Value = match file_type {
            RuleFileType::Json => serde_json::from_slice(bytes)
                .map_err(|e| RswebanalyzeError::InvalidFormat(format!("JSON解析失败：{}", e)))?,
            RuleFileType::MsgPack => rmp_serde::from_slice(bytes).map_err(|e| {
                RswebanalyzeError::InvalidFormat(format!("MessagePack反序列化失败：{}", e))
            })?,
        };
        Self::parse_document(document)
    }

    /// 解析签名定义文档
    /// 支持 `{"technologies"|"apps": {...}, "categories": {...}}` 以及裸的 名称->规则 映射
    pub fn parse_document(document: Value) -> RswResult<RuleLibrary> {
        let Value::Object(mut root) = document else {
            return Err(RswebanalyzeError::InvalidFormat(
                "顶层结构必须为对象".to_string(),
            ));
        };

        let wrapped_key = ["technologies", "apps"]
            .into_iter()
            .find(|key| root.contains_key(*key));

        let (tech_map, category_value) = match wrapped_key {
            Some(key) => {
                let techs = match root.remove(key) {
                    Some(Value::Object(map)) => map,
                    _ => {
                        return Err(RswebanalyzeError::InvalidFormat(format!(
                            "`{}` 字段必须为对象",
                            key
                        )))
                    }
                };
                (techs, root.remove("categories"))
            }
            None => (root, None),
        };

        let tech_rules = Self::parse_tech_rules(tech_map);
        let category_rules = match category_value {
            Some(Value::Object(map)) => Self::parse_categories(map),
            Some(Value::Null) | None => HashMap::new(),
            Some(_) => {
                return Err(RswebanalyzeError::InvalidFormat(
                    "`categories` 字段必须为对象".to_string(),
                ))
            }
        };

        Ok(RuleLibrary {
            tech_rules,
            category_rules,
        })
    }

    /// 逐条解析技术规则，单条格式错误仅记录并跳过
    fn parse_tech_rules(tech_map: Map<String, Value>) -> BTreeMap<String, TechRule> {
        let mut tech_rules = BTreeMap::new();
        for (name, value) in tech_map {
            let name = name.trim().to_string();
            if name.is_empty() {
                warn!("存在空名称的技术规则，已跳过");
                continue;
            }
            match serde_json::from_value::<TechRule>(value) {
                Ok(rule) => {
                    tech_rules.insert(name, rule);
                }
                Err(e) => warn!("技术规则 [{}] 格式错误：{}，已跳过", name, e),
            }
        }
        tech_rules
    }

    /// 解析分类规则，分类ID取自键名
    fn parse_categories(category_map: Map<String, Value>) -> HashMap<u32, CategoryRule> {
        let mut categories = HashMap::new();
        for (key, value) in category_map {
            let Ok(id) = key.trim().parse::<u32>() else {
                warn!("分类ID无效：{}，已跳过", key);
                continue;
            };
            match serde_json::from_value::<CategoryRule>(value) {
                Ok(mut cat) => {
                    cat.id = id;
                    categories.insert(id, cat);
                }
                Err(e) => warn!("分类规则 [{}] 格式错误：{}，已跳过", key, e),
            }
        }
        categories
    }
}
