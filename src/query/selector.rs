use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::QueryCase;

/// Uniform choice over the query table.
pub struct QuerySelector {
    rng: StdRng,
}

impl QuerySelector {
    /// Seeded from the wall clock, one selector per request.
    pub fn from_time() -> Self {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        Self::with_seed(nanos as u64)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `None` only when `cases` is empty.
    pub fn select<'a>(&mut self, cases: &'a [QueryCase]) -> Option<&'a QueryCase> {
        cases.choose(&mut self.rng)
    }
}
