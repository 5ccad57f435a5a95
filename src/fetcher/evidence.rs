//! 页面证据模型
//! 单次抓取得到的规范化观测数据，构建后不可变

use std::collections::HashMap;
use url::Url;

use crate::extractor::HtmlExtractor;
use crate::utils::HeaderConverter;

/// 页面证据
#[derive(Debug, Clone)]
pub struct PageEvidence {
    url: Url,
    final_url: Url,
    status: u16,
    headers: HashMap<String, Vec<String>>,
    cookies: HashMap<String, Vec<String>>,
    body: String,
    script_srcs: Vec<String>,
    meta_tags: Vec<(String, String)>,
    links: Vec<String>,
}

impl PageEvidence {
    /// 由原始响应构建证据：解析Cookie、提取HTML标签
    /// `headers` 的键需为小写
    pub fn new(
        url: Url,
        final_url: Url,
        status: u16,
        headers: HashMap<String, Vec<String>>,
        body: String,
    ) -> Self {
        let cookies = HeaderConverter::parse_cookies(&headers);
        let extracted = HtmlExtractor::extract(&body);

        Self {
            url,
            final_url,
            status,
            headers,
            cookies,
            body,
            script_srcs: extracted.script_srcs,
            meta_tags: extracted.meta_tags,
            links: extracted.links,
        }
    }

    /// 请求URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 重定向后的最终URL
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// 指定Header的全部值（名称不区分大小写）
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// 指定Cookie的全部值（名称不区分大小写）
    pub fn cookie(&self, name: &str) -> Option<&[String]> {
        self.cookies
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn script_srcs(&self) -> &[String] {
        &self.script_srcs
    }

    pub fn meta_tags(&self) -> &[(String, String)] {
        &self.meta_tags
    }

    /// 页面中的原始超链接（未解析）
    pub fn links(&self) -> &[String] {
        &self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_builds_cookies_and_tags() {
        let url = Url::parse("http://example.com/").unwrap();
        let mut headers = HashMap::new();
        headers.insert("server".to_string(), vec!["nginx/1.25.3".to_string()]);
        headers.insert("set-cookie".to_string(), vec!["PHPSESSID=1; path=/".to_string()]);
        let body = r#"<meta name="generator" content="Hugo 0.111"><script src="/app.js"></script><a href="/x">x</a>"#;

        let evidence = PageEvidence::new(url.clone(), url, 200, headers, body.to_string());

        assert_eq!(evidence.header("Server").unwrap(), &["nginx/1.25.3".to_string()]);
        assert_eq!(evidence.cookie("PHPSESSID").unwrap(), &["1".to_string()]);
        assert_eq!(evidence.meta_tags(), &[("generator".to_string(), "Hugo 0.111".to_string())]);
        assert_eq!(evidence.script_srcs(), &["/app.js".to_string()]);
        assert_eq!(evidence.links(), &["/x".to_string()]);
    }
}
