//! mailrunner-core
//!
//! Worker pool that polls a shared email store, leases one email per cycle,
//! delivers it and releases the lease, until told to stop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, email, record, outcome, events, errors）
//! - **ports**: 抽象化レイヤー（EmailStore, Mailer, Clock, IdGenerator, EventSink）
//! - **app**: worker ループ・pool・lease 回収（Worker, WorkerPool, ReaperLoop, PoolConfig）
//! - **impls**: 実装（InMemoryEmailStore, ChannelEventSink など開発用）
//! - **observability**: ステータス集計

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

#[cfg(test)]
mod testing;
