//! IdGenerator port - ID 生成の抽象化
//!
//! - email ID: ULID（時刻 + 乱数）。Clock を使うのでテストで時刻を固定できる
//! - worker ID: OS の CSPRNG から 128-bit（UUID v4 レイアウト）
//!
//! 弱い PRNG で worker ID を作ると、同時に起動した worker 同士で ID が衝突し
//! lease の帰属が壊れる。

use ulid::Ulid;

use crate::domain::{EmailId, IdentityError, WorkerId};
use crate::ports::Clock;

/// # Thread Safety
/// - `Send + Sync` を要求（複数 task から使える）
pub trait IdGenerator: Send + Sync {
    fn generate_email_id(&self) -> EmailId;

    /// Fails only when the random source is exhausted.
    fn generate_worker_id(&self) -> Result<WorkerId, IdentityError>;
}

pub struct SystemIdGenerator<C> {
    clock: C,
}

impl<C: Clock> SystemIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for SystemIdGenerator<C> {
    fn generate_email_id(&self) -> EmailId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        EmailId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    fn generate_worker_id(&self) -> Result<WorkerId, IdentityError> {
        WorkerId::generate()
    }
}
