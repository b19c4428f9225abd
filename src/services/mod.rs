//! 业务逻辑服务模块
//! 
//! 封装行情抓取、自选状态维护和定时同步逻辑

pub mod calendar;     // 交易时段判断
pub mod debounce;     // 搜索防抖
pub mod fetch_pool;   // 限流抓取池
pub mod market;       // 东方财富 / 腾讯证券接口
pub mod persistence;  // 设置持久化
pub mod reconcile;    // 抓取结果合并
pub mod sync_engine;  // 同步引擎
pub mod watchlist;    // 自选列表
