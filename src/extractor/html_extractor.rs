//! HTML标签提取器
//! 负责从HTML中提取script-src、meta标签和超链接

use std::cell::RefCell;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use tendril::StrTendril;

// 单个属性值的长度上限，超出视为异常数据
const MAX_ATTR_LEN: usize = 4096;

/// 提取结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractResult {
    pub script_srcs: Vec<String>,
    // (小写名称, 内容)
    pub meta_tags: Vec<(String, String)>,
    // 文档顺序的 <a href>
    pub links: Vec<String>,
}

#[derive(Debug, Default)]
pub struct HtmlExtractor {
    result: RefCell<ExtractResult>,
}

impl TokenSink for HtmlExtractor {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(Tag {
            kind: TagKind::StartTag,
            name,
            attrs,
            ..
        }) = token
        {
            match name.as_ref() {
                "script" => self.extract_script_src(&attrs),
                "meta" => self.extract_meta_tag(&attrs),
                "a" => self.extract_link(&attrs),
                _ => {}
            }
        }
        TokenSinkResult::Continue
    }
}

impl HtmlExtractor {
    /// 从HTML字符串提取标签
    pub fn extract(html: &str) -> ExtractResult {
        let tokenizer = Tokenizer::new(HtmlExtractor::default(), TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        tokenizer.end();

        tokenizer.sink.result.into_inner()
    }

    /// 提取script-src
    fn extract_script_src(&self, attrs: &[Attribute]) {
        if let Some(src) = find_attr(attrs, "src") {
            let src = src.trim();
            if !src.is_empty() && src.len() <= MAX_ATTR_LEN {
                self.result.borrow_mut().script_srcs.push(src.to_string());
            }
        }
    }

    /// 提取meta标签（name 缺失时退化到 property，如 og:*）
    fn extract_meta_tag(&self, attrs: &[Attribute]) {
        let name = find_attr(attrs, "name").or_else(|| find_attr(attrs, "property"));
        let content = find_attr(attrs, "content");

        if let (Some(n), Some(c)) = (name, content) {
            if c.len() <= MAX_ATTR_LEN {
                self.result
                    .borrow_mut()
                    .meta_tags
                    .push((n.trim().to_ascii_lowercase(), c.to_string()));
            }
        }
    }

    /// 提取超链接
    fn extract_link(&self, attrs: &[Attribute]) {
        if let Some(href) = find_attr(attrs, "href") {
            let href = href.trim();
            if !href.is_empty() && href.len() <= MAX_ATTR_LEN {
                self.result.borrow_mut().links.push(href.to_string());
            }
        }
    }
}

fn find_attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|attr| attr.name.local.as_ref() == name)
        .map(|attr| &*attr.value)
}
