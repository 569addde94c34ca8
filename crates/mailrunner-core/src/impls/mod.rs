//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryEmailStore**: 開発用の正本（claim の原子性を 1 ロックで保証）
//! - **NoopEventSink / ChannelEventSink**: worker イベントの出口
//!
//! 本番用の永続化（MongoDB / PostgreSQL など）は別クレートに置く想定。

pub mod event_sink;
pub mod inmem_store;

pub use self::event_sink::{ChannelEventSink, NoopEventSink};
pub use self::inmem_store::{InMemoryEmailStore, RetryPolicy};
