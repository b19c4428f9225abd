//! 自选同步引擎
//!
//! 唯一持有自选列表、行情表、分时表、排序模式和刷新设置的任务。
//! 外部只能通过 [`EngineHandle`] 发送命令修改状态。
//!
//! ## 调度
//! - 行情：启动时和每次自选变更时立即刷新；之后每 `interval_secs` 秒触发一次，
//!   仅在开启自动刷新且处于交易时段时真正请求
//! - 分时：启动时全量抓取；自选变更时只抓取新增的证券并增量合并；
//!   每 30 秒在同样条件下全量重抓纠偏
//!
//! 抓取在独立任务中进行，结果以消息形式回到本任务后按唯一键合并，
//! 因此抓取期间的增删不会被覆盖

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use super::fetch_pool::BoundedFetchPool;
use super::market::{QuoteSource, TrendSource};
use super::persistence::SettingsStore;
use super::reconcile::{present, QuoteBook, QuoteMap, TrendBook};
use super::watchlist::{newly_added, WatchlistStore};
use crate::models::{
    Instrument, PersistedSettings, RefreshSettings, SortMode, TrendSeries, WatchlistView,
};

/// 分时全量纠偏间隔
pub const TREND_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

const COMMAND_BUFFER: usize = 64;

/// 交易时段判断，测试中可替换
pub type SessionGate = Arc<dyn Fn() -> bool + Send + Sync>;

/// 引擎参数
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub trend_interval: Duration,
    pub fetch_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trend_interval: TREND_SWEEP_INTERVAL,
            fetch_concurrency: super::fetch_pool::TREND_FETCH_CONCURRENCY,
        }
    }
}

/// 引擎依赖的外部协作者
#[derive(Clone)]
pub struct EngineSources {
    pub quotes: Arc<dyn QuoteSource>,
    pub trends: Arc<dyn TrendSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub session: SessionGate,
}

enum Command {
    Add {
        instrument: Instrument,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        instrument: Instrument,
        reply: oneshot::Sender<bool>,
    },
    Reorder {
        order: Vec<Instrument>,
        reply: oneshot::Sender<Result<()>>,
    },
    CycleSort {
        reply: oneshot::Sender<SortMode>,
    },
    SetSort {
        mode: SortMode,
        reply: oneshot::Sender<()>,
    },
    UpdateRefresh {
        interval_secs: Option<u64>,
        auto_refresh: Option<bool>,
        reply: oneshot::Sender<RefreshSettings>,
    },
    RefreshNow {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<WatchlistView>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendMerge {
    /// 只覆盖抓取到的键
    Incremental,
    /// 以当前自选重建整张表
    Full,
}

enum FetchOutcome {
    Quotes {
        seq: u64,
        quotes: QuoteMap,
    },
    Trends {
        seq: u64,
        merge: TrendMerge,
        results: Vec<(Instrument, Result<TrendSeries>)>,
    },
}

/// 引擎句柄，可克隆，所有句柄丢弃后引擎退出
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
}

impl EngineHandle {
    async fn request<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| anyhow!("同步引擎已停止"))?;
        rx.await.map_err(|_| anyhow!("同步引擎未响应"))
    }

    /// 添加自选，已存在时返回 false
    pub async fn add(&self, instrument: Instrument) -> Result<bool> {
        self.request(|reply| Command::Add { instrument, reply }).await
    }

    /// 删除自选，不存在时返回 false
    pub async fn remove(&self, instrument: Instrument) -> Result<bool> {
        self.request(|reply| Command::Remove { instrument, reply }).await
    }

    /// 按拖拽结果重排，同时把排序模式重置为 NONE
    pub async fn reorder(&self, order: Vec<Instrument>) -> Result<()> {
        self.request(|reply| Command::Reorder { order, reply }).await?
    }

    pub async fn cycle_sort_mode(&self) -> Result<SortMode> {
        self.request(|reply| Command::CycleSort { reply }).await
    }

    pub async fn set_sort_mode(&self, mode: SortMode) -> Result<()> {
        self.request(|reply| Command::SetSort { mode, reply }).await
    }

    pub async fn update_refresh(
        &self,
        interval_secs: Option<u64>,
        auto_refresh: Option<bool>,
    ) -> Result<RefreshSettings> {
        self.request(|reply| Command::UpdateRefresh {
            interval_secs,
            auto_refresh,
            reply,
        })
        .await
    }

    /// 手动刷新行情并全量重抓分时，不受交易时段和自动刷新开关限制
    pub async fn refresh_now(&self) -> Result<()> {
        self.request(|reply| Command::RefreshNow { reply }).await
    }

    pub async fn snapshot(&self) -> Result<WatchlistView> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}

pub struct SyncEngine {
    watchlist: WatchlistStore,
    quotes: QuoteBook,
    trends: TrendBook,
    sort_mode: SortMode,
    refresh: RefreshSettings,
    trend_interval: Duration,
    pool: BoundedFetchPool,
    sources: EngineSources,
    next_seq: u64,
    next_quote_at: Instant,
    next_trend_at: Instant,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
    persist: mpsc::UnboundedSender<PersistedSettings>,
}

impl SyncEngine {
    /// 启动引擎任务，立即刷新一次行情并全量抓取分时
    ///
    /// 必须在 tokio 运行时内调用
    pub fn spawn(
        settings: PersistedSettings,
        config: EngineConfig,
        sources: EngineSources,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let persist = spawn_settings_writer(Arc::clone(&sources.settings));

        let refresh = settings.refresh();
        let now = Instant::now();
        let engine = SyncEngine {
            watchlist: WatchlistStore::new(settings.watchlist),
            quotes: QuoteBook::default(),
            trends: TrendBook::default(),
            sort_mode: SortMode::None,
            refresh,
            trend_interval: config.trend_interval,
            pool: BoundedFetchPool::new(config.fetch_concurrency),
            sources,
            next_seq: 0,
            next_quote_at: now + refresh.interval(),
            next_trend_at: now + config.trend_interval,
            outcomes: outcomes_tx,
            persist,
        };

        let task = tokio::spawn(engine.run(commands_rx, outcomes_rx));
        (EngineHandle { commands: commands_tx }, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<FetchOutcome>,
    ) {
        log::info!(
            "同步引擎启动：自选 {} 只，行情间隔 {}s，自动刷新 {}，分时并发 {}",
            self.watchlist.len(),
            self.refresh.interval().as_secs(),
            self.refresh.auto_refresh,
            self.pool.limit()
        );

        self.refresh_quotes();
        let all = self.watchlist.list();
        self.fetch_trends(all, TrendMerge::Full);

        loop {
            let quote_at = self.next_quote_at;
            let trend_at = self.next_trend_at;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(outcome) = outcomes.recv() => self.apply(outcome),
                _ = time::sleep_until(quote_at) => self.on_quote_tick(),
                _ = time::sleep_until(trend_at) => self.on_trend_tick(),
            }
        }

        log::info!("同步引擎退出");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Add { instrument, reply } => {
                let _ = reply.send(self.add(instrument));
            }
            Command::Remove { instrument, reply } => {
                let _ = reply.send(self.remove(&instrument));
            }
            Command::Reorder { order, reply } => {
                let _ = reply.send(self.reorder(order));
            }
            Command::CycleSort { reply } => {
                self.sort_mode = self.sort_mode.next();
                let _ = reply.send(self.sort_mode);
            }
            Command::SetSort { mode, reply } => {
                self.sort_mode = mode;
                let _ = reply.send(());
            }
            Command::UpdateRefresh {
                interval_secs,
                auto_refresh,
                reply,
            } => {
                let _ = reply.send(self.update_refresh(interval_secs, auto_refresh));
            }
            Command::RefreshNow { reply } => {
                log::info!("手动刷新");
                self.refresh_quotes();
                let all = self.watchlist.list();
                self.fetch_trends(all, TrendMerge::Full);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.view());
            }
        }
    }

    // ==================== 自选变更 ====================

    fn add(&mut self, instrument: Instrument) -> bool {
        let previous = self.watchlist.list();
        if !self.watchlist.add(instrument.clone()) {
            log::debug!("{} 已在自选中", instrument);
            return false;
        }
        log::info!("添加自选 {}", instrument);
        self.after_mutation(&previous);
        true
    }

    fn remove(&mut self, instrument: &Instrument) -> bool {
        let previous = self.watchlist.list();
        if !self.watchlist.remove(instrument) {
            return false;
        }
        self.quotes.prune(instrument);
        self.trends.prune(instrument);
        log::info!("删除自选 {}", instrument);
        self.after_mutation(&previous);
        true
    }

    fn reorder(&mut self, order: Vec<Instrument>) -> Result<()> {
        let previous = self.watchlist.list();
        self.watchlist.reorder(order)?;
        self.sort_mode = SortMode::None;
        log::info!("自选重新排序");
        self.after_mutation(&previous);
        Ok(())
    }

    /// 变更后：保存设置、立即刷新行情、只为新增证券抓取分时
    fn after_mutation(&mut self, previous: &[Instrument]) {
        self.persist_settings();
        self.refresh_quotes();
        let added = newly_added(previous, self.watchlist.as_slice());
        self.fetch_trends(added, TrendMerge::Incremental);
    }

    fn update_refresh(&mut self, interval_secs: Option<u64>, auto_refresh: Option<bool>) -> RefreshSettings {
        self.refresh = RefreshSettings::new(
            interval_secs.unwrap_or(self.refresh.interval_secs),
            auto_refresh.unwrap_or(self.refresh.auto_refresh),
        );
        self.next_quote_at = Instant::now() + self.refresh.interval();
        log::info!(
            "刷新设置更新：间隔 {}s，自动刷新 {}",
            self.refresh.interval_secs,
            self.refresh.auto_refresh
        );
        self.persist_settings();
        self.refresh
    }

    fn persist_settings(&self) {
        let snapshot = PersistedSettings {
            watchlist: self.watchlist.list(),
            refresh_interval_secs: self.refresh.interval_secs,
            auto_refresh: self.refresh.auto_refresh,
        };
        if self.persist.send(snapshot).is_err() {
            log::warn!("设置写入任务已停止，本次变更未保存");
        }
    }

    // ==================== 定时任务 ====================

    fn polling_active(&self) -> bool {
        self.refresh.auto_refresh && (self.sources.session)()
    }

    fn on_quote_tick(&mut self) {
        self.next_quote_at = Instant::now() + self.refresh.interval();
        if self.polling_active() {
            self.refresh_quotes();
        } else {
            log::debug!("非交易时段或自动刷新关闭，跳过行情刷新");
        }
    }

    fn on_trend_tick(&mut self) {
        self.next_trend_at = Instant::now() + self.trend_interval;
        if self.polling_active() {
            let all = self.watchlist.list();
            self.fetch_trends(all, TrendMerge::Full);
        } else {
            log::debug!("非交易时段或自动刷新关闭，跳过分时刷新");
        }
    }

    // ==================== 抓取 ====================

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn refresh_quotes(&mut self) {
        if self.watchlist.is_empty() {
            return;
        }
        let instruments = self.watchlist.list();
        let seq = self.next_seq();
        let source = Arc::clone(&self.sources.quotes);
        let outcomes = self.outcomes.clone();

        tokio::spawn(async move {
            let quotes = source.fetch_quotes(&instruments).await;
            let _ = outcomes.send(FetchOutcome::Quotes { seq, quotes });
        });
    }

    fn fetch_trends(&mut self, instruments: Vec<Instrument>, merge: TrendMerge) {
        if instruments.is_empty() {
            return;
        }
        let seq = self.next_seq();
        let source = Arc::clone(&self.sources.trends);
        let pool = self.pool.clone();
        let outcomes = self.outcomes.clone();
        log::debug!("抓取分时 #{} {:?}：{} 只", seq, merge, instruments.len());

        tokio::spawn(async move {
            let results = pool
                .run(instruments, move |instrument: Instrument| {
                    let source = Arc::clone(&source);
                    async move {
                        let series = source.fetch_trend(&instrument).await;
                        if series.is_empty() {
                            bail!("{} 分时数据为空", instrument);
                        }
                        Ok(series)
                    }
                })
                .await;
            let _ = outcomes.send(FetchOutcome::Trends { seq, merge, results });
        });
    }

    fn apply(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Quotes { seq, quotes } => {
                let received = quotes.len();
                if self.quotes.apply_batch(seq, quotes, self.watchlist.as_slice()) {
                    log::debug!("行情 #{} 已更新 {} 条", seq, received);
                } else if received == 0 {
                    log::warn!("行情 #{} 刷新失败，保留上次数据", seq);
                }
            }
            FetchOutcome::Trends { seq, merge, results } => {
                let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                let updated = match merge {
                    TrendMerge::Incremental => {
                        self.trends.merge_incremental(seq, results, self.watchlist.as_slice())
                    }
                    TrendMerge::Full => {
                        self.trends.replace_full(seq, results, self.watchlist.as_slice())
                    }
                };
                log::debug!("分时 #{} {:?} 更新 {} 只，失败 {} 只", seq, merge, updated, failed);
            }
        }
    }

    fn view(&self) -> WatchlistView {
        WatchlistView {
            instruments: self.watchlist.list(),
            quotes: present(self.watchlist.as_slice(), self.quotes.quotes(), self.sort_mode),
            trends: self
                .trends
                .trends()
                .iter()
                .map(|(instrument, series)| (instrument.secid(), series.clone()))
                .collect(),
            sort_mode: self.sort_mode,
            refresh: self.refresh,
            in_session: (self.sources.session)(),
        }
    }
}

/// 设置写入任务：按顺序落盘，积压时只写最新一份
fn spawn_settings_writer(store: Arc<dyn SettingsStore>) -> mpsc::UnboundedSender<PersistedSettings> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistedSettings>();

    tokio::spawn(async move {
        while let Some(mut latest) = rx.recv().await {
            while let Ok(newer) = rx.try_recv() {
                latest = newer;
            }
            let store = Arc::clone(&store);
            let saved = tokio::task::spawn_blocking(move || store.save(&latest)).await;
            match saved {
                Ok(Ok(())) => log::debug!("设置已保存"),
                Ok(Err(e)) => log::warn!("保存设置失败: {:#}", e),
                Err(e) => log::warn!("保存设置任务异常: {}", e),
            }
        }
    });

    tx
}
