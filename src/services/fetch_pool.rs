//! 限流并发抓取
//!
//! 分时接口只能逐只请求，自选列表长度不定，
//! 因此用信号量把同时进行的请求数限制在固定上限内

use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 分时抓取的并发上限
pub const TREND_FETCH_CONCURRENCY: usize = 15;

/// 有界并发抓取池
///
/// 同一个池的所有 `run` 调用共享并发额度。单个任务失败不会取消其他任务，
/// `run` 在每一项都得到结果（成功值或错误）后才返回，结果顺序与输入顺序一致
#[derive(Clone)]
pub struct BoundedFetchPool {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl BoundedFetchPool {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<(I, Result<T>)>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let task = Arc::new(task);

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let semaphore = Arc::clone(&self.semaphore);
                let task = Arc::clone(&task);
                let key = item.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| anyhow!("抓取池已关闭: {}", e))?;
                    task(item).await
                });
                (key, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (item, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(anyhow!("抓取任务异常退出: {}", e)),
            };
            results.push((item, outcome));
        }
        results
    }
}
