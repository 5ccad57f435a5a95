//! 主机列表解析与URL规范化
use url::Url;

use crate::error::{RswResult, RswebanalyzeError};

/// 解析主机列表：每行一个，去除首尾空白，忽略空行
pub fn parse_host_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 将主机字符串规范化为可抓取的URL（无协议时补全 http://）
pub fn normalize_host(host: &str) -> RswResult<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(RswebanalyzeError::InvalidInput("主机为空".to_string()));
    }

    let url = if has_scheme(host) {
        Url::parse(host)?
    } else {
        Url::parse(&format!("http://{}", host))?
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RswebanalyzeError::InvalidInput(format!(
            "不支持的协议：{}（主机：{}）",
            url.scheme(),
            host
        )));
    }
    if url.host_str().is_none() {
        return Err(RswebanalyzeError::InvalidInput(format!("缺少主机名：{}", host)));
    }

    Ok(url)
}

/// 仅当 `://` 出现在路径、查询或片段之前时才视为带协议
fn has_scheme(host: &str) -> bool {
    match host.find("://") {
        Some(pos) => !host[..pos].contains(&['/', '?', '#'][..]),
        None => false,
    }
}
