//! 编译后模式模型
//! 规则加载时一次性编译，运行期只读共享

use std::collections::HashMap;
use regex::Regex;

use crate::utils::VersionExtractor;

/// 编译后的单条模式
#[derive(Debug, Clone)]
pub enum Matcher {
    Exists,       // 存在性匹配（header/cookie/meta 规则值为空时）
    Regex(Regex), // 正则匹配（忽略大小写）
}

impl Matcher {
    pub fn is_exists(&self) -> bool {
        matches!(self, Matcher::Exists)
    }

    /// 规则描述
    pub fn describe(&self) -> &str {
        match self {
            Matcher::Exists => "exists",
            Matcher::Regex(r) => r.as_str(),
        }
    }
}

/// 编译后的正则模式
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub matcher: Matcher,
    pub confidence: u8,
    pub version_template: Option<String>,
}

/// 单次模式命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHit {
    pub confidence: u8,
    pub version: Option<String>,
}

impl CompiledPattern {
    /// 对值执行匹配，命中时返回置信度与版本
    pub fn evaluate(&self, input: &str) -> Option<PatternHit> {
        match &self.matcher {
            Matcher::Exists => Some(PatternHit {
                confidence: self.confidence,
                version: None,
            }),
            Matcher::Regex(regex) => {
                let captures = regex.captures(input)?;
                Some(PatternHit {
                    confidence: self.confidence,
                    version: VersionExtractor::extract(&self.version_template, &captures),
                })
            }
        }
    }
}

/// 隐含关系（目标技术 + 可选声明置信度）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implication {
    pub name: String,
    pub confidence: Option<u8>,
}

/// 单个技术的编译后签名
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub name: String,
    pub category_ids: Vec<u32>,
    pub url_patterns: Vec<CompiledPattern>,
    pub html_patterns: Vec<CompiledPattern>,
    pub script_patterns: Vec<CompiledPattern>,
    // 键名统一小写
    pub header_patterns: HashMap<String, Vec<CompiledPattern>>,
    pub cookie_patterns: HashMap<String, Vec<CompiledPattern>>,
    pub meta_patterns: HashMap<String, Vec<CompiledPattern>>,
    pub implies: Vec<Implication>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub cpe: Option<String>,
}

/// 签名库：构建后不可变，多个工作协程通过 Arc 只读共享
#[derive(Debug, Clone, Default)]
pub struct SignatureStore {
    signatures: Vec<Signature>,
    name_index: HashMap<String, usize>,
    category_map: HashMap<u32, String>, // 分类ID -> 分类名称
}

impl SignatureStore {
    /// 由有序签名列表构建（同名签名保留首个）
    pub fn new(signatures: Vec<Signature>, category_map: HashMap<u32, String>) -> Self {
        let mut unique = Vec::with_capacity(signatures.len());
        let mut name_index = HashMap::with_capacity(signatures.len());
        for signature in signatures {
            if name_index.contains_key(&signature.name) {
                continue;
            }
            name_index.insert(signature.name.clone(), unique.len());
            unique.push(signature);
        }

        Self {
            signatures: unique,
            name_index,
            category_map,
        }
    }

    /// 全部签名（库顺序）
    pub fn all(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn by_name(&self, name: &str) -> Option<&Signature> {
        self.name_index.get(name).map(|&idx| &self.signatures[idx])
    }

    pub fn category_name(&self, id: u32) -> Option<&str> {
        self.category_map.get(&id).map(String::as_str)
    }

    /// 将分类ID转换为分类名称（未知分类跳过）
    pub fn category_names(&self, ids: &[u32]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.category_name(*id).map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
