//! Process-local model statistics. Advisory only.

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ModelStat {
    pub count: u64,
    pub errors: u64,
    pub total_duration_ms: u64,
}

impl ModelStat {
    pub fn mean_duration_ms(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_duration_ms / self.count
        }
    }
}

#[derive(Debug, Default)]
pub struct ModelStats {
    per_model: HashMap<String, ModelStat>,
}

impl ModelStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &str, duration_ms: u64, error: bool) {
        let stat = self.per_model.entry(model.to_string()).or_default();
        stat.count += 1;
        stat.total_duration_ms += duration_ms;
        if error {
            stat.errors += 1;
        }
    }

    pub fn snapshot(&self) -> HashMap<String, ModelStat> {
        self.per_model.clone()
    }
}
