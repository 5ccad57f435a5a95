//! HTTP抓取器
//! 单次GET请求：有界重定向、单请求超时、响应体截断，并响应取消信号

use std::time::{Duration, Instant};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{PageEvidence, PageFetcher};
use crate::config::ScanConfig;
use crate::error::{RswResult, RswebanalyzeError};
use crate::utils::{CancelSignal, HeaderConverter};

/// HTTP抓取器（内部 Client 可廉价克隆，连接池在工作协程间及多次扫描间共享）
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// 根据扫描配置创建抓取器
    pub fn new(config: &ScanConfig) -> RswResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(Self::redirect_policy(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| RswebanalyzeError::InvalidInput(format!("HTTP客户端构建失败：{}", e)))?;

        Ok(Self {
            client,
            timeout: config.request_timeout(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// 重定向策略：超过上限或出现循环即失败
    fn redirect_policy(max_redirects: usize) -> Policy {
        Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                let msg = format!("重定向次数超过{}次", max_redirects);
                attempt.error(msg)
            } else if attempt.previous().contains(attempt.url()) {
                let msg = format!("检测到重定向循环：{}", attempt.url());
                attempt.error(msg)
            } else {
                attempt.follow()
            }
        })
    }

    /// 抓取单个页面
    pub async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        cancel: &CancelSignal,
    ) -> RswResult<PageEvidence> {
        if cancel.is_cancelled() {
            return Err(RswebanalyzeError::Cancelled(url.to_string()));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RswebanalyzeError::Cancelled(url.to_string())),
            result = self.fetch_inner(url, timeout) => result,
        }
    }

    async fn fetch_inner(&self, url: &Url, timeout: Duration) -> RswResult<PageEvidence> {
        let start = Instant::now();
        let mut response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| RswebanalyzeError::fetch(url.as_str(), &e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = HeaderConverter::to_hashmap(response.headers());

        // 分块读取，超出上限截断
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RswebanalyzeError::fetch(url.as_str(), &e))?
        {
            let remaining = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                debug!("响应体超过{}字节，已截断：{}", self.max_body_bytes, url);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            "抓取完成：{} -> {}，状态码={}，大小={}字节，耗时{:?}",
            url,
            final_url,
            status,
            body.len(),
            start.elapsed()
        );

        Ok(PageEvidence::new(
            url.clone(),
            final_url,
            status,
            headers,
            String::from_utf8_lossy(&body).into_owned(),
        ))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url, cancel: &CancelSignal) -> RswResult<PageEvidence> {
        self.fetch(url, self.timeout, cancel).await
    }
}
