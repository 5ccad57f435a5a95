//! 扫描引擎入口
//! 读取主机列表与签名定义，构建签名库后启动调度器

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::compiler::SignatureStore;
use crate::config::ScanConfig;
use crate::dispatcher::{parse_host_list, Dispatcher, ResultStream};
use crate::error::{RswResult, RswebanalyzeError};
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::rule::{RuleLoader, SignatureSource};
use crate::utils::{cancel_pair, CancelHandle};

/// 主机来源
#[derive(Debug, Clone)]
pub enum HostSource {
    /// 单个主机
    Single(String),
    /// 内联文本，每行一个主机
    List(String),
    /// 主机列表文件，每行一个主机
    File(PathBuf),
}

impl HostSource {
    /// 读取主机列表（空行忽略，首尾空白去除）
    pub async fn read_hosts(&self) -> RswResult<Vec<String>> {
        match self {
            HostSource::Single(host) => Ok(parse_host_list(host)),
            HostSource::List(text) => Ok(parse_host_list(text)),
            HostSource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    RswebanalyzeError::SourceUnavailable {
                        path: path.display().to_string(),
                        cause: e.to_string(),
                    }
                })?;
                Ok(parse_host_list(&text))
            }
        }
    }
}

/// 扫描引擎：持有已编译的签名库与HTTP抓取器，可重复扫描多批主机
/// 引擎级取消会传递给进行中及之后的全部批次；单批次的截止时间或结果流取消只作用于该批次
#[derive(Clone)]
pub struct Engine {
    store: Arc<SignatureStore>,
    fetcher: Arc<dyn PageFetcher>,
    config: ScanConfig,
    cancel: CancelHandle,
}

impl Engine {
    /// 加载签名定义并创建引擎
    pub async fn new(config: ScanConfig, signatures: &SignatureSource) -> RswResult<Self> {
        let store = RuleLoader::load(signatures).await?;
        Self::with_store(config, Arc::new(store))
    }

    /// 使用已构建的签名库创建引擎
    pub fn with_store(config: ScanConfig, store: Arc<SignatureStore>) -> RswResult<Self> {
        let (cancel, _signal) = cancel_pair();
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self {
            store,
            fetcher: Arc::new(fetcher),
            config,
            cancel,
        })
    }

    /// 使用自定义抓取器创建引擎
    pub fn with_fetcher(
        config: ScanConfig,
        store: Arc<SignatureStore>,
        fetcher: Arc<dyn PageFetcher>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
            cancel,
        }
    }

    pub fn store(&self) -> &Arc<SignatureStore> {
        &self.store
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// 扫描一批主机，立即返回结果流
    pub fn scan(&self, hosts: Vec<String>) -> ResultStream {
        Dispatcher::new(self.store.clone(), self.fetcher.clone(), self.cancel.signal())
            .with_config(&self.config)
            .run(hosts)
    }
}

/// 一次性入口：读取主机 -> 加载签名 -> 启动扫描
/// 主机来源先于签名定义读取，任一不可用即返回错误，不会启动扫描
pub async fn init(
    config: ScanConfig,
    hosts: HostSource,
    signatures: SignatureSource,
) -> RswResult<ResultStream> {
    let hosts = hosts.read_hosts().await?;
    info!("读取主机{}个", hosts.len());

    let engine = Engine::new(config, &signatures).await?;
    Ok(engine.scan(hosts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_read_hosts_from_all_sources() {
        let single = HostSource::Single("  example.com  ".to_string());
        assert_eq!(single.read_hosts().await.unwrap(), vec!["example.com".to_string()]);

        let list = HostSource::List("a.test\n\n b.test \n".to_string());
        assert_eq!(list.read_hosts().await.unwrap().len(), 2);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a.test\n   \nhttps://b.test").unwrap();
        let hosts = HostSource::File(file.path().to_path_buf()).read_hosts().await.unwrap();
        assert_eq!(hosts, vec!["a.test".to_string(), "https://b.test".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_host_file_is_source_unavailable() {
        let err = HostSource::File(PathBuf::from("/nonexistent/hosts.txt"))
            .read_hosts()
            .await
            .unwrap_err();
        assert!(matches!(err, RswebanalyzeError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_init_fails_before_scanning_on_bad_signatures() {
        let err = init(
            ScanConfig::default(),
            HostSource::Single("example.com".to_string()),
            SignatureSource::Json("[1, 2, 3]".to_string()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RswebanalyzeError::InvalidFormat(_)));

        let err = init(
            ScanConfig::default(),
            HostSource::Single("example.com".to_string()),
            SignatureSource::file("/nonexistent/technologies.json"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RswebanalyzeError::SourceUnavailable { .. }));
    }
}
