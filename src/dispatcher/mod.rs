//! 调度模块：固定数量的工作协程从共享队列领取主机，执行 爬取 -> 匹配 -> 隐含解析
pub mod host;
pub mod stream;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::compiler::SignatureStore;
use crate::config::ScanConfig;
use crate::crawler::Crawler;
use crate::detector::TechDetector;
use crate::error::{RswResult, RswebanalyzeError};
use crate::fetcher::PageFetcher;
use crate::rule::{Detection, ScanResult};
use crate::utils::{cancel_pair, CancelHandle, CancelSignal};

pub use self::host::{normalize_host, parse_host_list};
pub use self::stream::ResultStream;

type HostQueue = Arc<Mutex<VecDeque<String>>>;

/// 单个工作协程共享的只读上下文
struct WorkerContext {
    detector: TechDetector,
    fetcher: Arc<dyn PageFetcher>,
    /// 本次扫描的取消信号
    cancel: CancelSignal,
    crawl_link_budget: usize,
}

impl WorkerContext {
    /// 扫描单个主机，任何失败都转换为带错误信息的结果
    async fn scan_host(&self, host: &str) -> ScanResult {
        let start = Instant::now();
        let outcome = self.scan_inner(host).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(detections) => {
                debug!("主机扫描完成：{}，检测到{}项技术，耗时{}ms", host, detections.len(), duration_ms);
                ScanResult {
                    host: host.to_string(),
                    detections,
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                warn!("主机扫描失败：{}，原因：{}", host, e);
                ScanResult::failed(host, e, duration_ms)
            }
        }
    }

    async fn scan_inner(&self, host: &str) -> RswResult<Vec<Detection>> {
        let cancel = &self.cancel;
        if cancel.is_cancelled() {
            return Err(RswebanalyzeError::Cancelled(host.to_string()));
        }

        let seed = normalize_host(host)?;
        let crawl = Crawler::crawl(self.fetcher.as_ref(), &seed, self.crawl_link_budget, cancel);
        let pages = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RswebanalyzeError::Cancelled(host.to_string())),
            pages = crawl => pages,
        };

        Ok(self.detector.detect(&pages?))
    }
}

/// 调度器
/// 每次 `run` 使用独立的取消信号：外部信号触发或本次截止时间到达时取消，互不影响其他批次
pub struct Dispatcher {
    store: Arc<SignatureStore>,
    fetcher: Arc<dyn PageFetcher>,
    parent: CancelSignal,
    worker_count: usize,
    crawl_link_budget: usize,
    result_buffer: usize,
    run_deadline: Option<Duration>,
}

impl Dispatcher {
    /// 创建调度器（其余参数取默认配置）
    /// `parent` 为外部取消信号，触发后当前及之后的扫描均被取消
    pub fn new(store: Arc<SignatureStore>, fetcher: Arc<dyn PageFetcher>, parent: CancelSignal) -> Self {
        let defaults = ScanConfig::default();
        Self {
            store,
            fetcher,
            parent,
            worker_count: defaults.worker_count,
            crawl_link_budget: defaults.crawl_link_budget,
            result_buffer: defaults.result_buffer,
            run_deadline: defaults.run_deadline,
        }
    }

    /// 应用扫描配置中的调度相关项
    pub fn with_config(mut self, config: &ScanConfig) -> Self {
        self.worker_count = config.worker_count;
        self.crawl_link_budget = config.crawl_link_budget;
        self.result_buffer = config.result_buffer;
        self.run_deadline = config.run_deadline;
        self
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    pub fn crawl_link_budget(mut self, budget: usize) -> Self {
        self.crawl_link_budget = budget;
        self
    }

    /// 启动扫描，立即返回结果流（需在 tokio 运行时内调用）
    pub fn run(&self, hosts: Vec<String>) -> ResultStream {
        let worker_count = if self.worker_count == 0 {
            warn!("工作协程数量为0，已调整为1");
            1
        } else {
            self.worker_count
        };
        let worker_count = worker_count.min(hosts.len().max(1));

        info!(
            "开始扫描：主机数={}，工作协程数={}，链接预算={}，签名数={}",
            hosts.len(),
            worker_count,
            self.crawl_link_budget,
            self.store.len()
        );

        let (run_cancel, run_signal) = cancel_pair();
        if self.parent.is_cancelled() {
            run_cancel.cancel();
        }

        let (tx, rx) = mpsc::channel(self.result_buffer.max(1));
        let queue: HostQueue = Arc::new(Mutex::new(hosts.into_iter().collect()));
        let context = Arc::new(WorkerContext {
            detector: TechDetector::new(self.store.clone()),
            fetcher: self.fetcher.clone(),
            cancel: run_signal,
            crawl_link_budget: self.crawl_link_budget,
        });

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(Self::worker(id, queue.clone(), context.clone(), tx.clone()));
        }
        // 仅工作协程持有发送端，全部结束后结果流自动关闭
        drop(tx);

        tokio::spawn(Self::supervise(
            workers,
            run_cancel.clone(),
            self.parent.clone(),
            self.run_deadline,
        ));

        ResultStream::new(rx, run_cancel)
    }

    async fn worker(
        id: usize,
        queue: HostQueue,
        context: Arc<WorkerContext>,
        tx: mpsc::Sender<ScanResult>,
    ) {
        loop {
            let Some(host) = queue.lock().await.pop_front() else {
                break;
            };
            let result = context.scan_host(&host).await;
            if tx.send(result).await.is_err() {
                debug!("工作协程[{}]：结果接收端已关闭，停止领取主机", id);
                break;
            }
        }
        debug!("工作协程[{}]退出", id);
    }

    /// 等待全部工作协程结束；外部取消或到达截止时间时取消本次扫描
    async fn supervise(
        mut workers: JoinSet<()>,
        run_cancel: CancelHandle,
        parent: CancelSignal,
        deadline: Option<Duration>,
    ) {
        let start = Instant::now();
        let drain = async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    warn!("工作协程异常退出：{}", e);
                }
            }
        };
        tokio::pin!(drain);

        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = &mut drain => {
                info!("扫描结束，总耗时{:?}", start.elapsed());
                return;
            }
            _ = parent.cancelled() => {
                info!("收到外部取消，停止本次扫描");
                run_cancel.cancel();
            }
            _ = timer => {
                warn!("已到达扫描截止时间{:?}，取消剩余任务", deadline.unwrap_or_default());
                run_cancel.cancel();
            }
        }

        drain.await;
        info!("扫描结束，总耗时{:?}", start.elapsed());
    }
}
