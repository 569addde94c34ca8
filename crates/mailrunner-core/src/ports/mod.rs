//! Ports - 抽象化レイヤー
//!
//! worker core が依存する外部 collaborator の境界。
//! - EmailStore: 共有ジョブストア（claim / release の原子性はここが持つ）
//! - Mailer: 配送
//! - Clock / IdGenerator: テスト容易性のための差し替え口
//! - EventSink: 観測用イベントの出口

pub mod clock;
pub mod email_store;
pub mod event_sink;
pub mod id_generator;
pub mod mailer;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::email_store::EmailStore;
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, SystemIdGenerator};
pub use self::mailer::Mailer;
