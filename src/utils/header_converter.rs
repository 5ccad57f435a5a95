//! Header格式转换工具
//! 响应头统一为小写键的多值映射，并从 Set-Cookie 中解析 Cookie

use std::collections::HashMap;
use reqwest::header::HeaderMap;
use tracing::warn;

// 单个响应的Header数量上限
const MAX_HEADER_ITEMS: usize = 1000;

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将HeaderMap转换为HashMap<String, Vec<String>>（键统一小写）
    pub fn to_hashmap(header_map: &HeaderMap) -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();

        for (iter_count, (key, value)) in header_map.iter().enumerate() {
            if iter_count >= MAX_HEADER_ITEMS {
                warn!("Header数量超过{}条，忽略其余Header", MAX_HEADER_ITEMS);
                break;
            }

            let key_str = key.as_str().to_ascii_lowercase();
            let value_str = String::from_utf8_lossy(value.as_bytes()).into_owned();

            map.entry(key_str)
                .or_insert_with(Vec::new)
                .push(value_str);
        }

        map
    }

    /// 从 set-cookie 值中解析Cookie（名称小写 -> 值列表）
    pub fn parse_cookies(headers: &HashMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
        let mut cookies = HashMap::new();
        if let Some(raw_values) = headers.get("set-cookie") {
            for raw in raw_values {
                Self::parse_set_cookie(raw, &mut cookies);
            }
        }
        cookies
    }

    // 只取首段 name=value，属性段（Path/Expires等）忽略
    fn parse_set_cookie(raw_cookie: &str, cookies: &mut HashMap<String, Vec<String>>) {
        let Some(core_kv) = raw_cookie
            .split(';')
            .map(str::trim)
            .find(|s| !s.is_empty())
        else {
            return;
        };

        let Some((name, value)) = core_kv.split_once('=') else {
            return;
        };
        let name = name.trim();
        let value = value.trim().trim_matches('"');

        // Cookie名不能为空，值为deleted的视为清除
        if name.is_empty() || value.eq_ignore_ascii_case("deleted") {
            return;
        }

        cookies
            .entry(name.to_ascii_lowercase())
            .or_insert_with(Vec::new)
            .push(value.to_string());
    }
}
