//! 取消信号
//! 基于 watch 通道的一次性广播：触发后所有持有者立即可见

use std::sync::Arc;
use tokio::sync::watch;

/// 取消句柄（触发端）
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// 取消信号（监听端），可廉价克隆到每个工作协程
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// 创建一对取消句柄与信号
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

impl CancelHandle {
    /// 触发取消（重复调用无副作用）
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// 获取新的监听端
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// 永不触发的信号
    pub fn never() -> Self {
        let (_handle, signal) = cancel_pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消；句柄全部释放且未触发时永久挂起
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if fired {
            return;
        }
        std::future::pending::<()>().await
    }
}
