//! 全局配置管理,存储扫描引擎所有可配置项

use std::time::Duration;

/// 扫描配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    // 并发工作协程数量
    pub worker_count: usize,
    // 首页之外额外爬取的同源链接数量（0表示只抓首页）
    pub crawl_link_budget: usize,
    // 单次请求超时（单位：秒）
    pub http_timeout: u64,
    // 最大重定向次数
    pub max_redirects: usize,
    // 响应体最大读取字节数，超出部分截断
    pub max_body_bytes: usize,
    // 请求User-Agent
    pub user_agent: String,
    // 是否接受无效TLS证书（扫描场景默认接受）
    pub accept_invalid_certs: bool,
    // 结果通道缓冲大小
    pub result_buffer: usize,
    // 整体扫描截止时间（从启动开始计算），None表示不限制
    pub run_deadline: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            crawl_link_budget: 0,
            http_timeout: 10,
            max_redirects: 10,
            max_body_bytes: 5 * 1024 * 1024,
            user_agent: format!("Rswebanalyze/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: true,
            result_buffer: 64,
            run_deadline: None,
        }
    }
}

impl ScanConfig {
    /// 单次请求超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> ScanConfig {
        ScanConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: ScanConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers;
        self
    }

    pub fn crawl_link_budget(mut self, budget: usize) -> Self {
        self.config.crawl_link_budget = budget;
        self
    }

    pub fn http_timeout(mut self, timeout: u64) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.config.max_body_bytes = max;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.accept_invalid_certs = accept;
        self
    }

    pub fn result_buffer(mut self, size: usize) -> Self {
        self.config.result_buffer = size;
        self
    }

    pub fn run_deadline(mut self, deadline: Duration) -> Self {
        self.config.run_deadline = Some(deadline);
        self
    }

    pub fn build(self) -> ScanConfig {
        self.config
    }
}
