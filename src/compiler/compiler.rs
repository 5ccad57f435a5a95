//! 规则编译器核心
//! 仅负责将原始规则编译为可执行的正则模式，加载时一次性完成

use std::collections::HashMap;
use std::time::Instant;
use regex::{Regex, RegexBuilder};
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{debug, warn};

use super::pattern::{CompiledPattern, Implication, Matcher, Signature, SignatureStore};
use crate::rule::{RuleLibrary, TechRule};
use crate::error::{RswResult, RswebanalyzeError};

/// 默认置信度
pub const DEFAULT_CONFIDENCE: u8 = 100;

// 单条正则编译后大小上限，防止病态规则拖垮内存
const REGEX_SIZE_LIMIT: usize = 2 * 1024 * 1024;

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译规则库，编译失败的技术规则被剔除，不影响其他规则
    pub fn compile(rule_lib: &RuleLibrary) -> SignatureStore {
        let start = Instant::now();

        // 1. 构建分类映射（ID -> 名称）
        let category_map: HashMap<u32, String> = rule_lib
            .category_rules
            .values()
            .map(|cat| (cat.id, cat.name.clone()))
            .collect();

        // 2. 按名称顺序编译每个技术规则
        let mut stats = CompileStats::default();
        let mut signatures = Vec::with_capacity(rule_lib.tech_rules.len());
        for (tech_name, tech_rule) in &rule_lib.tech_rules {
            match Self::compile_tech_rule(tech_name, tech_rule, &mut stats) {
                Ok(signature) => signatures.push(signature),
                Err(e) => {
                    stats.dropped += 1;
                    warn!("{}，已跳过该技术", e);
                }
            }
        }

        // 3. 输出编译统计
        debug!("规则编译完成，总耗时{:?}", start.elapsed());
        debug!(
            "编译统计：技术{}个（剔除{}个）、URL模式{}条、HTML模式{}条、Script模式{}条、Header模式{}条、Cookie模式{}条、Meta模式{}条",
            signatures.len(),
            stats.dropped,
            stats.url_count,
            stats.html_count,
            stats.script_count,
            stats.header_count,
            stats.cookie_count,
            stats.meta_count
        );

        SignatureStore::new(signatures, category_map)
    }

    /// 编译单个技术规则
    pub fn compile_tech_rule(
        tech_name: &str,
        tech_rule: &TechRule,
        stats: &mut CompileStats,
    ) -> RswResult<Signature> {
        let url_patterns = Self::compile_pattern_list(tech_name, tech_rule.url.as_ref())?;
        let html_patterns = Self::compile_pattern_list(tech_name, tech_rule.html.as_ref())?;

        // 合并 scripts 和 scriptSrc
        let mut script_patterns = Self::compile_pattern_list(tech_name, tech_rule.scripts.as_ref())?;
        script_patterns.extend(Self::compile_pattern_list(tech_name, tech_rule.script_src.as_ref())?);

        let header_patterns = Self::compile_keyed_patterns(tech_name, tech_rule.headers.as_ref())?;
        let cookie_patterns = Self::compile_keyed_patterns(tech_name, tech_rule.cookies.as_ref())?;
        let meta_patterns = Self::compile_keyed_patterns(tech_name, tech_rule.meta.as_ref())?;

        stats.url_count += url_patterns.len();
        stats.html_count += html_patterns.len();
        stats.script_count += script_patterns.len();
        stats.header_count += header_patterns.values().map(Vec::len).sum::<usize>();
        stats.cookie_count += cookie_patterns.values().map(Vec::len).sum::<usize>();
        stats.meta_count += meta_patterns.values().map(Vec::len).sum::<usize>();

        Ok(Signature {
            name: tech_name.to_string(),
            category_ids: tech_rule.category_ids.clone(),
            url_patterns,
            html_patterns,
            script_patterns,
            header_patterns,
            cookie_patterns,
            meta_patterns,
            implies: Self::parse_implies(tech_rule.implies.as_ref()),
            website: tech_rule.website.clone(),
            description: tech_rule.description.clone(),
            icon: tech_rule.icon.clone(),
            cpe: tech_rule.cpe.clone(),
        })
    }

    /// 编译列表型模式（url/html/script），兼容单字符串与数组两种写法
    fn compile_pattern_list(
        tech_name: &str,
        value: Option<&Value>,
    ) -> RswResult<Vec<CompiledPattern>> {
        let mut patterns = Vec::new();
        for raw in Self::value_to_strings(tech_name, value)? {
            // 列表型规则的空模式会命中一切，直接忽略
            if raw.trim().is_empty() {
                continue;
            }
            patterns.push(Self::compile_single_pattern(tech_name, &raw)?);
        }
        Ok(patterns)
    }

    /// 编译键值对型模式（header/cookie/meta），键名统一小写
    fn compile_keyed_patterns(
        tech_name: &str,
        value: Option<&HashMap<String, Value>>,
    ) -> RswResult<HashMap<String, Vec<CompiledPattern>>> {
        let mut keyed_patterns = HashMap::new();
        let Some(value) = value else {
            return Ok(keyed_patterns);
        };

        for (key, val) in value {
            let mut patterns = Vec::new();
            for raw in Self::value_to_strings(tech_name, Some(val))? {
                patterns.push(Self::compile_single_pattern(tech_name, &raw)?);
            }
            if !patterns.is_empty() {
                keyed_patterns
                    .entry(key.to_lowercase())
                    .or_insert_with(Vec::new)
                    .extend(patterns);
            }
        }

        Ok(keyed_patterns)
    }

    /// 规则值统一转为字符串列表
    fn value_to_strings(tech_name: &str, value: Option<&Value>) -> RswResult<Vec<String>> {
        match value {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(arr)) => arr
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(RswebanalyzeError::SignatureCompileError {
                        name: tech_name.to_string(),
                        cause: format!("规则数组中存在非字符串元素：{}", other),
                    }),
                })
                .collect(),
            Some(other) => Err(RswebanalyzeError::SignatureCompileError {
                name: tech_name.to_string(),
                cause: format!("规则类型不支持：{}", other),
            }),
        }
    }

    /// 编译单个模式：拆分 `\;version:` / `\;confidence:` 标记后编译正则
    pub fn compile_single_pattern(tech_name: &str, raw_pattern: &str) -> RswResult<CompiledPattern> {
        static LOOK_AROUND_REGEX: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r#"\(\?(?:=|!|<=|<!)[^()]*\)"#).expect("静态正则合法")
        });

        // 1. 拆分正则主体与标记
        let mut parts = raw_pattern.split("\\;");
        let body = parts.next().unwrap_or_default();
        let mut confidence = DEFAULT_CONFIDENCE;
        let mut version_template = None;

        for tag in parts {
            if let Some(v) = tag.strip_prefix("version:") {
                version_template = Some(v.to_string());
            } else if let Some(c) = tag.strip_prefix("confidence:") {
                match c.trim().parse::<u16>() {
                    Ok(value) => confidence = value.min(100) as u8,
                    Err(_) => debug!("技术={}，置信度标记无效：{}", tech_name, c),
                }
            }
        }

        // 2. 空主体：存在性匹配
        if body.is_empty() {
            return Ok(CompiledPattern {
                matcher: Matcher::Exists,
                confidence,
                version_template,
            });
        }

        // 3. 清理原始正则：移除PCRE分隔符和环视语法（regex 不支持环视）
        let mut cleaned_pattern = body.to_string();
        if cleaned_pattern.len() > 1 && cleaned_pattern.starts_with('/') && cleaned_pattern.ends_with('/') {
            cleaned_pattern = cleaned_pattern[1..cleaned_pattern.len() - 1].to_string();
        }
        cleaned_pattern = LOOK_AROUND_REGEX.replace_all(&cleaned_pattern, "").to_string();

        // 4. 编译正则（忽略大小写）
        let regex = RegexBuilder::new(&cleaned_pattern)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| RswebanalyzeError::SignatureCompileError {
                name: tech_name.to_string(),
                cause: format!("正则 `{}` 编译失败：{}", body, e),
            })?;

        Ok(CompiledPattern {
            matcher: Matcher::Regex(regex),
            confidence,
            version_template,
        })
    }

    /// 解析implies规则，兼容单字符串与数组，支持 `\;confidence:` 标记
    fn parse_implies(implies: Option<&Value>) -> Vec<Implication> {
        let raw_items: Vec<&str> = match implies {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        let mut implications: Vec<Implication> = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            let mut parts = raw.split("\\;");
            let name = parts.next().unwrap_or_default().trim();
            if name.is_empty() || implications.iter().any(|i| i.name == name) {
                continue;
            }
            let confidence = parts
                .filter_map(|tag| tag.strip_prefix("confidence:"))
                .find_map(|c| c.trim().parse::<u16>().ok())
                .map(|c| c.min(100) as u8);
            implications.push(Implication {
                name: name.to_string(),
                confidence,
            });
        }
        implications
    }
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    url_count: usize,
    html_count: usize,
    script_count: usize,
    header_count: usize,
    cookie_count: usize,
    meta_count: usize,
    dropped: usize,
}
