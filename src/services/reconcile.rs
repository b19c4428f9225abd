//! 行情与分时数据的合并、展示排序
//!
//! 所有合并都按证券唯一键进行，且带请求序号：
//! 先发出的请求晚到时不会覆盖后发出请求写入的数据。
//! 任何一次抓取失败都不会清掉已有数据

use anyhow::Result;
use std::collections::HashMap;

use crate::models::{Instrument, Quote, SortMode, TrendSeries};

pub type QuoteMap = HashMap<Instrument, Quote>;
pub type TrendMap = HashMap<Instrument, TrendSeries>;

/// 按排序模式整理出展示用的行情列表
///
/// - NONE：按自选顺序输出，尚无行情的证券跳过
/// - DESC / ASC：按涨跌幅排序，相同涨跌幅保持自选顺序
pub fn present(watchlist: &[Instrument], quotes: &QuoteMap, sort_mode: SortMode) -> Vec<Quote> {
    let mut presented: Vec<Quote> = watchlist
        .iter()
        .filter_map(|instrument| quotes.get(instrument).cloned())
        .collect();

    match sort_mode {
        SortMode::None => {}
        SortMode::Desc => presented.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent)),
        SortMode::Asc => presented.sort_by(|a, b| a.change_percent.total_cmp(&b.change_percent)),
    }
    presented
}

/// 行情表
///
/// 每个刷新周期整批替换；批次按序号排序，过期批次直接丢弃
#[derive(Debug, Default)]
pub struct QuoteBook {
    quotes: QuoteMap,
    applied_seq: u64,
}

impl QuoteBook {
    pub fn quotes(&self) -> &QuoteMap {
        &self.quotes
    }

    /// 应用一批行情，返回是否实际更新
    ///
    /// 空批次视为失败（接口在缺少 Cookie 时会返回空数据），保持原状。
    /// 批次中缺失的自选证券沿用旧行情，已不在自选中的证券被丢弃
    pub fn apply_batch(&mut self, seq: u64, mut fetched: QuoteMap, watchlist: &[Instrument]) -> bool {
        if fetched.is_empty() {
            return false;
        }
        if seq < self.applied_seq {
            log::debug!("丢弃过期行情批次 #{}（已应用 #{}）", seq, self.applied_seq);
            return false;
        }

        let mut previous = std::mem::take(&mut self.quotes);
        let mut next = QuoteMap::with_capacity(watchlist.len());
        for instrument in watchlist {
            if let Some(quote) = fetched
                .remove(instrument)
                .or_else(|| previous.remove(instrument))
            {
                next.insert(instrument.clone(), quote);
            }
        }

        self.quotes = next;
        self.applied_seq = seq;
        true
    }

    pub fn prune(&mut self, instrument: &Instrument) {
        self.quotes.remove(instrument);
    }
}

/// 分时表
///
/// 记录每个键最后一次写入时的请求序号，实现“每个键后写者胜”
#[derive(Debug, Default)]
pub struct TrendBook {
    trends: TrendMap,
    written_seq: HashMap<Instrument, u64>,
}

impl TrendBook {
    pub fn trends(&self) -> &TrendMap {
        &self.trends
    }

    fn accepts(&self, instrument: &Instrument, seq: u64) -> bool {
        self.written_seq
            .get(instrument)
            .map_or(true, |&written| seq >= written)
    }

    /// 增量合并：只覆盖本次抓取成功的键，其余键保持不变
    pub fn merge_incremental(
        &mut self,
        seq: u64,
        fetched: Vec<(Instrument, Result<TrendSeries>)>,
        watchlist: &[Instrument],
    ) -> usize {
        let mut updated = 0;
        for (instrument, outcome) in fetched {
            let Ok(series) = outcome else {
                continue;
            };
            if !watchlist.contains(&instrument) || !self.accepts(&instrument, seq) {
                continue;
            }
            self.written_seq.insert(instrument.clone(), seq);
            self.trends.insert(instrument, series);
            updated += 1;
        }
        updated
    }

    /// 全量替换：以当前自选为准重建整张表
    ///
    /// 抓取成功的键使用新数据，失败或较旧的键沿用旧数据，
    /// 已不在自选中的键被丢弃
    pub fn replace_full(
        &mut self,
        seq: u64,
        fetched: Vec<(Instrument, Result<TrendSeries>)>,
        watchlist: &[Instrument],
    ) -> usize {
        let mut fresh: TrendMap = fetched
            .into_iter()
            .filter_map(|(instrument, outcome)| outcome.ok().map(|series| (instrument, series)))
            .collect();

        let mut previous = std::mem::take(&mut self.trends);
        let mut next = TrendMap::with_capacity(watchlist.len());
        let mut updated = 0;

        for instrument in watchlist {
            let series = match fresh.remove(instrument) {
                Some(series) if self.accepts(instrument, seq) => {
                    self.written_seq.insert(instrument.clone(), seq);
                    updated += 1;
                    Some(series)
                }
                _ => previous.remove(instrument),
            };
            if let Some(series) = series {
                next.insert(instrument.clone(), series);
            }
        }

        self.written_seq.retain(|instrument, _| watchlist.contains(instrument));
        self.trends = next;
        updated
    }

    pub fn prune(&mut self, instrument: &Instrument) {
        self.trends.remove(instrument);
        self.written_seq.remove(instrument);
    }
}
