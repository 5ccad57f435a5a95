//! 全局错误类型定义

use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum RswebanalyzeError {
    // 输入源相关错误（启动阶段致命）
    #[error("规则文件格式无效：{0}")]
    InvalidFormat(String),
    #[error("输入源不可读：{path}，原因：{cause}")]
    SourceUnavailable { path: String, cause: String },

    // 规则编译错误（单条规则，可恢复）
    #[error("规则编译失败：技术={name}，原因：{cause}")]
    SignatureCompileError { name: String, cause: String },

    // 抓取相关错误（单个主机，可恢复）
    #[error("页面抓取失败：{url}，原因：{cause}")]
    FetchError { url: String, cause: String },
    #[error("扫描已取消：{0}")]
    Cancelled(String),

    // 基础错误
    #[error("URL解析失败：{0}")]
    UrlError(#[from] UrlParseError),
    #[error("无效输入：{0}")]
    InvalidInput(String),
}

impl RswebanalyzeError {
    /// 由reqwest错误构造抓取错误，保留完整错误链
    pub fn fetch(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let mut cause = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            cause.push_str(": ");
            cause.push_str(&inner.to_string());
            source = inner.source();
        }
        Self::FetchError { url: url.into(), cause }
    }

    /// 是否为取消类错误（取消不应被爬取过程吞掉）
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

// 全局Result类型
pub type RswResult<T> = Result<T, RswebanalyzeError>;
