//! 自选列表存储
//!
//! 有序、按 (market, code) 去重的证券列表。行情与分时数据的清理、
//! 持久化和刷新触发由持有它的同步引擎负责

use anyhow::{bail, Result};
use std::collections::HashSet;

use crate::models::Instrument;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchlistStore {
    items: Vec<Instrument>,
}

impl WatchlistStore {
    /// 从持久化列表恢复，重复项只保留第一次出现的位置
    pub fn new(initial: impl IntoIterator<Item = Instrument>) -> Self {
        let mut store = Self::default();
        for instrument in initial {
            store.add(instrument);
        }
        store
    }

    /// 追加到末尾；已存在时不做任何修改并返回 false
    pub fn add(&mut self, instrument: Instrument) -> bool {
        if self.contains(&instrument) {
            return false;
        }
        self.items.push(instrument);
        true
    }

    /// 按唯一键删除；不存在时返回 false
    pub fn remove(&mut self, instrument: &Instrument) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item != instrument);
        self.items.len() != before
    }

    /// 用拖拽后的新顺序替换列表，新顺序必须是当前列表的一个排列
    pub fn reorder(&mut self, new_order: Vec<Instrument>) -> Result<()> {
        if new_order.len() != self.items.len() {
            bail!(
                "排序列表长度不匹配: 期望 {}，实际 {}",
                self.items.len(),
                new_order.len()
            );
        }
        let mut seen = HashSet::with_capacity(new_order.len());
        for instrument in &new_order {
            if !self.contains(instrument) {
                bail!("排序列表包含未自选的证券: {}", instrument);
            }
            if !seen.insert(instrument) {
                bail!("排序列表包含重复证券: {}", instrument);
            }
        }
        self.items = new_order;
        Ok(())
    }

    pub fn contains(&self, instrument: &Instrument) -> bool {
        self.items.contains(instrument)
    }

    /// 只读快照
    pub fn list(&self) -> Vec<Instrument> {
        self.items.clone()
    }

    pub fn as_slice(&self) -> &[Instrument] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 新增的证券：出现在 current 中但不在 previous 中，保持 current 的顺序
pub fn newly_added(previous: &[Instrument], current: &[Instrument]) -> Vec<Instrument> {
    let before: HashSet<&Instrument> = previous.iter().collect();
    current
        .iter()
        .filter(|instrument| !before.contains(instrument))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(secid: &str) -> Instrument {
        secid.parse().unwrap()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = WatchlistStore::default();
        assert!(store.add(inst("1.600519")));
        let snapshot = store.clone();
        assert!(!store.add(inst("1.600519")));
        assert_eq!(store, snapshot);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_code_different_market_are_distinct() {
        let mut store = WatchlistStore::default();
        assert!(store.add(inst("1.000001")));
        assert!(store.add(inst("0.000001")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_twice() {
        let mut store = WatchlistStore::new(vec![inst("1.600519"), inst("0.000001")]);
        assert!(store.remove(&inst("1.600519")));
        assert!(!store.remove(&inst("1.600519")));
        assert_eq!(store.list(), vec![inst("0.000001")]);
    }

    #[test]
    fn test_new_deduplicates() {
        let store = WatchlistStore::new(vec![
            inst("1.600519"),
            inst("0.000001"),
            inst("1.600519"),
        ]);
        assert_eq!(store.list(), vec![inst("1.600519"), inst("0.000001")]);
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let mut store = WatchlistStore::new(vec![inst("1.600519"), inst("0.000001"), inst("0.000858")]);

        assert!(store.reorder(vec![inst("0.000001"), inst("1.600519")]).is_err());
        assert!(store
            .reorder(vec![inst("0.000001"), inst("0.000001"), inst("1.600519")])
            .is_err());
        assert!(store
            .reorder(vec![inst("0.000001"), inst("1.601318"), inst("1.600519")])
            .is_err());
        assert_eq!(store.as_slice()[0], inst("1.600519"));

        store
            .reorder(vec![inst("0.000858"), inst("1.600519"), inst("0.000001")])
            .unwrap();
        assert_eq!(
            store.list(),
            vec![inst("0.000858"), inst("1.600519"), inst("0.000001")]
        );
    }

    #[test]
    fn test_newly_added() {
        let previous = vec![inst("1.600519"), inst("0.000001")];
        let current = vec![inst("0.000858"), inst("1.600519"), inst("1.601318")];
        assert_eq!(
            newly_added(&previous, &current),
            vec![inst("0.000858"), inst("1.601318")]
        );
        assert!(newly_added(&current, &previous[..1]).is_empty());
    }
}
