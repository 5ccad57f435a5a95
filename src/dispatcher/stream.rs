//! 扫描结果流
use tokio::sync::mpsc;

use crate::rule::ScanResult;
use crate::utils::CancelHandle;

/// 扫描结果流：每个输入主机恰好产出一条结果，全部工作协程结束后关闭
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::Receiver<ScanResult>,
    cancel: CancelHandle,
}

impl ResultStream {
    pub(crate) fn new(rx: mpsc::Receiver<ScanResult>, cancel: CancelHandle) -> Self {
        Self { rx, cancel }
    }

    /// 接收下一条结果；流关闭后返回 None
    pub async fn next(&mut self) -> Option<ScanResult> {
        self.rx.recv().await
    }

    /// 收集剩余全部结果
    pub async fn collect_all(mut self) -> Vec<ScanResult> {
        let mut results = Vec::new();
        while let Some(result) = self.rx.recv().await {
            results.push(result);
        }
        results
    }

    /// 取消本次扫描：未完成的主机以取消错误结束，不影响同一引擎的其他扫描
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}
