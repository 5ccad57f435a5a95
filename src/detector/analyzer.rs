//! 检测分析器：按证据类别（URL/Header/Cookie/Meta/Script/HTML）执行模式匹配
use std::collections::HashMap;
use tracing::debug;

use crate::compiler::{CompiledPattern, Signature, SignatureStore};
use crate::fetcher::PageEvidence;
use crate::utils::{DetectionUpdater, RawDetections};

/// 分析器统一接口：对单个页面的某一类证据执行全部签名
pub trait Analyzer {
    /// 证据类别名称（用于日志）
    const KIND: &'static str;

    /// 对单个签名执行匹配，命中结果写入 `detected`
    fn analyze_signature(signature: &Signature, page: &PageEvidence, detected: &mut RawDetections);

    /// 遍历签名库（库顺序）
    fn analyze(store: &SignatureStore, page: &PageEvidence, detected: &mut RawDetections) {
        for signature in store.all() {
            Self::analyze_signature(signature, page, detected);
        }
    }
}

/// 对一组值逐条执行模式，全部命中结果都参与合并
fn apply_patterns<'a>(
    kind: &str,
    signature: &Signature,
    patterns: &[CompiledPattern],
    values: impl Iterator<Item = &'a str> + Clone,
    detected: &mut RawDetections,
) {
    for pattern in patterns {
        for value in values.clone() {
            let Some(hit) = pattern.evaluate(value) else {
                continue;
            };
            debug!(
                "{}匹配成功：技术={}，版本={:?}，规则={}",
                kind,
                signature.name,
                hit.version,
                pattern.matcher.describe()
            );
            DetectionUpdater::update(detected, &signature.name, hit.confidence, hit.version);
            // 存在性模式只需命中一次
            if pattern.matcher.is_exists() {
                break;
            }
        }
    }
}

/// 带键名的模式（Header/Cookie/Meta）：键存在时才匹配
fn apply_keyed_patterns<'a, F, I>(
    kind: &str,
    signature: &Signature,
    keyed: &HashMap<String, Vec<CompiledPattern>>,
    lookup: F,
    detected: &mut RawDetections,
) where
    F: Fn(&str) -> Option<I>,
    I: Iterator<Item = &'a str> + Clone,
{
    // 按键名排序，保证版本提取顺序稳定
    let mut keys: Vec<&String> = keyed.keys().collect();
    keys.sort();
    for key in keys {
        let Some(values) = lookup(key.as_str()) else {
            continue;
        };
        apply_patterns(kind, signature, &keyed[key], values, detected);
    }
}

/// URL分析器（匹配重定向后的最终URL）
pub struct UrlAnalyzer;

impl Analyzer for UrlAnalyzer {
    const KIND: &'static str = "URL";

    fn analyze_signature(signature: &Signature, page: &PageEvidence, detected: &mut RawDetections) {
        if signature.url_patterns.is_empty() {
            return;
        }
        let url = page.final_url().as_str();
        apply_patterns(Self::KIND, signature, &signature.url_patterns, std::iter::once(url), detected);
    }
}

/// Header分析器
pub struct HeaderAnalyzer;

impl Analyzer for HeaderAnalyzer {
    const KIND: &'static str = "Header";

    fn analyze_signature(signature: &Signature, page: &PageEvidence, detected: &mut RawDetections) {
        apply_keyed_patterns(
            Self::KIND,
            signature,
            &signature.header_patterns,
            |name| page.header(name).map(|values| values.iter().map(String::as_str)),
            detected,
        );
    }
}

/// Cookie分析器
pub struct CookieAnalyzer;

impl Analyzer for CookieAnalyzer {
    const KIND: &'static str = "Cookie";

    fn analyze_signature(signature: &Signature, page: &PageEvidence, detected: &mut RawDetections) {
        apply_keyed_patterns(
            Self::KIND,
            signature,
            &signature.cookie_patterns,
            |name| page.cookie(name).map(|values| values.iter().map(String::as_str)),
            detected,
        );
    }
}

/// Meta分析器
pub struct MetaAnalyzer;

impl Analyzer for MetaAnalyzer {
    const KIND: &'static str = "Meta";

    fn analyze_signature(signature: &Signature, page: &PageEvidence, detected: &mut RawDetections) {
        apply_keyed_patterns(
            Self::KIND,
            signature,
            &signature.meta_patterns,
            |name| {
                let contents: Vec<&str> = page
                    .meta_tags()
                    .iter()
                    .filter(|(meta_name, _)| meta_name.eq_ignore_ascii_case(name))
                    .map(|(_, content)| content.as_str())
                    .collect();
                (!contents.is_empty()).then(|| contents.into_iter())
            },
            detected,
        );
    }
}

/// Script分析器（匹配 script src）
pub struct ScriptAnalyzer;

impl Analyzer for ScriptAnalyzer {
    const KIND: &'static str = "Script";

    fn analyze_signature(signature: &Signature, page: &PageEvidence, detected: &mut RawDetections) {
        if signature.script_patterns.is_empty() || page.script_srcs().is_empty() {
            return;
        }
        let srcs = page.script_srcs().iter().map(String::as_str);
        apply_patterns(Self::KIND, signature, &signature.script_patterns, srcs, detected);
    }
}

/// HTML分析器（匹配响应体）
pub struct HtmlAnalyzer;

impl Analyzer for HtmlAnalyzer {
    const KIND: &'static str = "HTML";

    fn analyze_signature(signature: &Signature, page: &PageEvidence, detected: &mut RawDetections) {
        if signature.html_patterns.is_empty() {
            return;
        }
        let body = page.body();
        apply_patterns(Self::KIND, signature, &signature.html_patterns, std::iter::once(body), detected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RuleCompiler;
    use std::collections::HashMap as Map;
    use url::Url;

    fn signature(name: &str) -> Signature {
        Signature {
            name: name.to_string(),
            ..Signature::default()
        }
    }

    fn pattern(raw: &str) -> CompiledPattern {
        RuleCompiler::compile_single_pattern("test", raw).unwrap()
    }

    fn page_with_headers(headers: &[(&str, &str)], body: &str) -> PageEvidence {
        let url = Url::parse("http://site.test/").unwrap();
        let mut map: Map<String, Vec<String>> = Map::new();
        for (k, v) in headers {
            map.entry(k.to_ascii_lowercase()).or_default().push(v.to_string());
        }
        PageEvidence::new(url.clone(), url, 200, map, body.to_string())
    }

    #[test]
    fn test_header_pattern_reads_named_header_only() {
        let mut sig = signature("Nginx");
        sig.header_patterns
            .insert("server".to_string(), vec![pattern(r"nginx(?:/([\d.]+))?\;version:\1")]);
        let page = page_with_headers(&[("Server", "nginx/1.25.3"), ("X-Other", "nginx/9")], "");

        let mut detected = RawDetections::new();
        HeaderAnalyzer::analyze_signature(&sig, &page, &mut detected);
        assert_eq!(detected["Nginx"], (100, Some("1.25.3".to_string())));
    }

    #[test]
    fn test_cookie_exists_pattern() {
        let mut sig = signature("PHP");
        sig.cookie_patterns.insert("phpsessid".to_string(), vec![pattern("")]);
        let page = page_with_headers(&[("Set-Cookie", "PHPSESSID=abc; path=/")], "");

        let mut detected = RawDetections::new();
        CookieAnalyzer::analyze_signature(&sig, &page, &mut detected);
        assert_eq!(detected["PHP"], (100, None));

        let empty = page_with_headers(&[], "");
        let mut detected = RawDetections::new();
        CookieAnalyzer::analyze_signature(&sig, &empty, &mut detected);
        assert!(detected.is_empty());
    }

    #[test]
    fn test_meta_and_script_patterns() {
        let mut sig = signature("WordPress");
        sig.meta_patterns.insert(
            "generator".to_string(),
            vec![pattern(r"^WordPress ?([\d.]+)?\;version:\1")],
        );
        sig.script_patterns.push(pattern(r"/wp-includes/\;confidence:50"));
        let page = page_with_headers(
            &[],
            r#"<meta name="Generator" content="WordPress 6.4.2"><script src="/wp-includes/js/x.js"></script>"#,
        );

        let mut detected = RawDetections::new();
        MetaAnalyzer::analyze_signature(&sig, &page, &mut detected);
        ScriptAnalyzer::analyze_signature(&sig, &page, &mut detected);
        assert_eq!(detected["WordPress"], (100, Some("6.4.2".to_string())));
    }

    #[test]
    fn test_confidence_is_max_of_satisfied_patterns() {
        let mut sig = signature("Lib");
        sig.html_patterns.push(pattern(r"lib-a\;confidence:30"));
        sig.html_patterns.push(pattern(r"lib-b\;confidence:60"));
        sig.html_patterns.push(pattern(r"lib-missing\;confidence:90"));
        let page = page_with_headers(&[], "lib-a lib-b");

        let mut detected = RawDetections::new();
        HtmlAnalyzer::analyze_signature(&sig, &page, &mut detected);
        assert_eq!(detected["Lib"].0, 60);
    }

    #[test]
    fn test_url_pattern_uses_final_url() {
        let mut sig = signature("Shopify");
        sig.url_patterns.push(pattern(r"myshopify\.com"));
        let requested = Url::parse("http://shop.test/").unwrap();
        let final_url = Url::parse("https://shop.myshopify.com/").unwrap();
        let page = PageEvidence::new(requested, final_url, 200, Map::new(), String::new());

        let mut detected = RawDetections::new();
        UrlAnalyzer::analyze_signature(&sig, &page, &mut detected);
        assert!(detected.contains_key("Shopify"));
    }
}
