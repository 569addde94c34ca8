use serde::{Deserialize, Serialize};

use crate::domain::EmailStatus;

/// Number of records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub pending: usize,
    pub leased: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl StoreCounts {
    pub fn record(&mut self, status: EmailStatus) {
        match status {
            EmailStatus::Pending => self.pending += 1,
            EmailStatus::Leased => self.leased += 1,
            EmailStatus::Delivered => self.delivered += 1,
            EmailStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.leased + self.delivered + self.failed
    }
}
