//! 版本提取工具模块
//! 负责从正则捕获结果中，根据版本模板提取合法的技术版本号
//! 支持 \1/\2 或 $1/$2 两种分组引用格式，以及 \1?a:b 三元格式，自动过滤无效版本

use regex::Captures;

/// 版本提取工具类
/// 提供静态方法 `extract` 用于版本号提取
pub struct VersionExtractor;

impl VersionExtractor {
    /// 从正则捕获结果中提取有效版本号
    ///
    /// # 参数
    /// - `version_template`: 版本模板（可选字符串），支持 \1/\2 或 $1/$2 分组引用
    /// - `captures`: 正则捕获结果，包含整体匹配和自定义分组匹配信息
    ///
    /// # 返回值
    /// - `Some(String)`: 提取到的有效版本号
    /// - `None`: 未提取到有效版本（模板无效/未替换/版本异常）
    pub fn extract(version_template: &Option<String>, captures: &Captures) -> Option<String> {
        let template = version_template
            .as_deref()
            .map(str::trim)
            .filter(|template| !template.is_empty())?;

        // 三元模板：\1?有值时:无值时
        if let Some(resolved) = Self::resolve_ternary(template, captures) {
            return Self::finalize(resolved, true);
        }

        let mut version = template.to_string();
        // 标记是否发生过有效的分组替换（避免无替换却返回模板本身）
        let mut replaced = false;

        // 倒序替换，避免 \1 误替换 \10 的前缀
        for group_index in (1..captures.len()).rev() {
            let placeholder_backslash = format!("\\{}", group_index);
            let placeholder_dollar = format!("${}", group_index);

            let matched_str = captures
                .get(group_index)
                .map(|m| m.as_str().trim())
                .unwrap_or("");
            if !matched_str.is_empty()
                && (version.contains(&placeholder_backslash) || version.contains(&placeholder_dollar))
            {
                replaced = true;
            }
            version = version.replace(&placeholder_backslash, matched_str);
            version = version.replace(&placeholder_dollar, matched_str);
        }

        Self::finalize(version, replaced)
    }

    /// 解析三元模板 `\N?a:b`，非三元模板返回 None
    fn resolve_ternary(template: &str, captures: &Captures) -> Option<String> {
        let rest = template.strip_prefix('\\').or_else(|| template.strip_prefix('$'))?;
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let group_index: usize = digits.parse().ok()?;
        let branches = rest[digits.len()..].strip_prefix('?')?;
        let (when_set, when_unset) = branches.split_once(':')?;

        let has_value = captures
            .get(group_index)
            .map(|m| !m.as_str().trim().is_empty())
            .unwrap_or(false);
        let chosen = if has_value { when_set } else { when_unset };

        // 分支内仍可引用分组
        let mut resolved = chosen.to_string();
        for idx in (1..captures.len()).rev() {
            let value = captures.get(idx).map(|m| m.as_str().trim()).unwrap_or("");
            resolved = resolved.replace(&format!("\\{}", idx), value);
            resolved = resolved.replace(&format!("${}", idx), value);
        }
        Some(resolved)
    }

    /// 最终版本清理与过滤：未替换 / 空 / 残留占位符 均视为无效
    fn finalize(version: String, replaced: bool) -> Option<String> {
        let final_version = version.trim().to_string();
        let is_valid_version = replaced
            && !final_version.is_empty()
            && !final_version.contains('\\')
            && !final_version.contains('$');

        if is_valid_version {
            Some(final_version)
        } else {
            None
        }
    }
}

// 单元测试
#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_extract_valid_version_with_backslash_placeholder() {
        let regex = Regex::new(r#"nginx(?:/([\d.]+))?"#).unwrap();
        let captures = regex.captures("nginx/1.21.6").unwrap();
        let template = Some("\\1".to_string());

        let version = VersionExtractor::extract(&template, &captures);
        assert_eq!(version, Some("1.21.6".to_string()));
    }

    #[test]
    fn test_extract_valid_version_with_dollar_placeholder() {
        let regex = Regex::new(r#"apache(?:/([\d.]+))?"#).unwrap();
        let captures = regex.captures("apache/2.4.57").unwrap();
        let template = Some("$1".to_string());

        let version = VersionExtractor::extract(&template, &captures);
        assert_eq!(version, Some("2.4.57".to_string()));
    }

    #[test]
    fn test_extract_empty_group_version() {
        // 分组未参与匹配，应返回 None
        let regex = Regex::new(r#"nginx(?:/([\d.]+))?"#).unwrap();
        let captures = regex.captures("nginx").unwrap();
        let template = Some("\\1".to_string());

        assert_eq!(VersionExtractor::extract(&template, &captures), None);
    }

    #[test]
    fn test_extract_missing_group_version() {
        // 占位符引用不存在的分组（\2），应返回 None
        let regex = Regex::new(r#"nginx(?:/([\d.]+))?"#).unwrap();
        let captures = regex.captures("nginx/1.21.6").unwrap();
        let template = Some("\\2".to_string());

        assert_eq!(VersionExtractor::extract(&template, &captures), None);
    }

    #[test]
    fn test_extract_complex_template_version() {
        let regex = Regex::new(r#"(\w+)/v([\d.]+)-(\w+)"#).unwrap();
        let captures = regex.captures("rust/v1.75.0-stable").unwrap();
        let template = Some("\\1-$2-\\3".to_string());

        let version = VersionExtractor::extract(&template, &captures);
        assert_eq!(version, Some("rust-1.75.0-stable".to_string()));
    }

    #[test]
    fn test_extract_ternary_template() {
        let regex = Regex::new(r#"wp-(admin)?"#).unwrap();
        let template = Some("\\1?admin:public".to_string());

        let captures = regex.captures("wp-admin").unwrap();
        assert_eq!(VersionExtractor::extract(&template, &captures), Some("admin".to_string()));

        let captures = regex.captures("wp-").unwrap();
        assert_eq!(VersionExtractor::extract(&template, &captures), Some("public".to_string()));
    }

    #[test]
    fn test_extract_without_template() {
        let regex = Regex::new(r#"react"#).unwrap();
        let captures = regex.captures("react").unwrap();
        assert_eq!(VersionExtractor::extract(&None, &captures), None);
        assert_eq!(VersionExtractor::extract(&Some("  ".to_string()), &captures), None);
    }
}
