//! 搜索防抖
//!
//! 每次输入变化都会取消尚未触发的搜索；静默 300ms 后才真正发起请求。
//! 被新输入取代的搜索即使已在请求中也会被中止，结果永远对应最后一次输入

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::market::SearchSource;
use crate::models::SearchSnapshot;

/// 默认防抖间隔
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// 可取消的延时搜索，丢弃即取消
struct PendingSearch {
    handle: JoinHandle<()>,
}

impl Drop for PendingSearch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct SearchDebouncer {
    source: Arc<dyn SearchSource>,
    delay: Duration,
    pending: Option<PendingSearch>,
    /// 最新一次输入的编号
    generation: Arc<AtomicU64>,
    results: Arc<watch::Sender<SearchSnapshot>>,
}

impl SearchDebouncer {
    pub fn new(source: Arc<dyn SearchSource>, delay: Duration) -> Self {
        let (results, _) = watch::channel(SearchSnapshot::default());
        Self {
            source,
            delay,
            pending: None,
            generation: Arc::new(AtomicU64::new(0)),
            results: Arc::new(results),
        }
    }

    /// 处理一次输入变化，必须在 tokio 运行时内调用
    pub fn on_query_change(&mut self, query: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending = None;

        let query = query.trim().to_string();
        if query.is_empty() {
            self.results.send_replace(SearchSnapshot::default());
            return;
        }

        let source = Arc::clone(&self.source);
        let latest = Arc::clone(&self.generation);
        let results = Arc::clone(&self.results);
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            log::debug!("发起搜索: {}", query);
            let found = source.search(&query).await;

            if latest.load(Ordering::SeqCst) != generation {
                log::debug!("搜索 {} 已被新的输入取代，丢弃结果", query);
                return;
            }
            results.send_replace(SearchSnapshot {
                query,
                results: found,
            });
        });
        self.pending = Some(PendingSearch { handle });
    }

    /// 当前展示的搜索结果
    pub fn snapshot(&self) -> SearchSnapshot {
        self.results.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Market, SearchResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSearch {
        calls: Mutex<Vec<String>>,
        latency: Duration,
    }

    impl RecordingSearch {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                latency,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchSource for RecordingSearch {
        async fn search(&self, query: &str) -> Vec<SearchResult> {
            self.calls.lock().unwrap().push(query.to_string());
            tokio::time::sleep(self.latency).await;
            vec![SearchResult {
                code: "600519".to_string(),
                name: format!("result for {}", query),
                market: Market::Shanghai,
            }]
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_issues_single_search() {
        let source = RecordingSearch::new(Duration::from_millis(50));
        let mut debouncer = SearchDebouncer::new(source.clone(), SEARCH_DEBOUNCE);

        debouncer.on_query_change("600");
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.on_query_change("6005");
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.on_query_change("60051");
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(source.calls(), vec!["60051".to_string()]);
        let snapshot = debouncer.snapshot();
        assert_eq!(snapshot.query, "60051");
        assert_eq!(snapshot.results[0].name, "result for 60051");
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_search_is_cancelled() {
        let source = RecordingSearch::new(Duration::from_secs(2));
        let mut debouncer = SearchDebouncer::new(source.clone(), SEARCH_DEBOUNCE);

        debouncer.on_query_change("茅台");
        // 防抖结束，第一次搜索已在请求中
        tokio::time::sleep(Duration::from_millis(400)).await;
        debouncer.on_query_change("五粮液");
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(source.calls(), vec!["茅台".to_string(), "五粮液".to_string()]);
        assert_eq!(debouncer.snapshot().query, "五粮液");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_query_clears_synchronously() {
        let source = RecordingSearch::new(Duration::from_millis(10));
        let mut debouncer = SearchDebouncer::new(source.clone(), SEARCH_DEBOUNCE);

        debouncer.on_query_change("600519");
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(debouncer.snapshot().results.len(), 1);

        debouncer.on_query_change("6");
        debouncer.on_query_change("  ");
        assert_eq!(debouncer.snapshot(), SearchSnapshot::default());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(source.calls().len(), 1);
        assert_eq!(debouncer.snapshot(), SearchSnapshot::default());
    }
}
