//! 抓取模块：执行HTTP请求并产出规范化的页面证据
pub mod evidence;
pub mod http;

use async_trait::async_trait;
use url::Url;

use crate::error::RswResult;
use crate::utils::CancelSignal;

pub use self::evidence::PageEvidence;
pub use self::http::HttpFetcher;

/// 页面抓取抽象：爬取器与工作池只依赖此接口
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 抓取单个页面；网络失败、超时、重定向异常均返回 `FetchError`
    /// `cancel` 为本次扫描的取消信号，触发后进行中的请求以 `Cancelled` 结束
    async fn fetch_page(&self, url: &Url, cancel: &CancelSignal) -> RswResult<PageEvidence>;
}
