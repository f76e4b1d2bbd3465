use std::time::Instant;

use chrono::Utc;
use tracing::info;

use crate::store::{Mutation, Store, StoreError, Value, USER_PARTIAL};

// ─── Row template ────────────────────────────────────────────────

pub const COLUMNS: [&str; 10] = [
    "policyAcceptance",
    "registerAdSource",
    "registerFrom",
    "registerIp",
    "secret",
    "tag",
    "tmpPasswordHashed",
    "username",
    "uuid",
    "registerTime",
];

const AD_SOURCE: &str = "test";
const SECRET: &str = "b3230bb01425a0639e24793b6ab86131";
const TAG: &str = "oasis-p-testing";
const PASSWORD: &str = "password";

/// One insert-or-update per row. Every row gets a fresh UUID as its key and
/// the current time as its registration time; row `i` lands in partition
/// `i % 6`.
pub fn build_mutations(rows: usize) -> Vec<Mutation> {
    (0..rows)
        .map(|i| {
            let id = uuid::Uuid::new_v4().to_string();
            let n = i as i64;
            Mutation::insert_or_update(
                USER_PARTIAL,
                &COLUMNS,
                vec![
                    Value::Int(n % 6),
                    AD_SOURCE.into(),
                    Value::Int(n % 6),
                    Value::Text(register_ip(i)),
                    SECRET.into(),
                    TAG.into(),
                    PASSWORD.into(),
                    Value::Text(format!("user_{id}@example.com")),
                    Value::Text(id),
                    Value::Timestamp(Utc::now()),
                ],
            )
        })
        .collect()
}

/// Deterministic dotted-quad derived from the row index.
fn register_ip(i: usize) -> String {
    format!(
        "{}.{}.{}.{}",
        i % 256,
        (i + i) % 256,
        (i.wrapping_mul(i) + 1) % 256,
        (i + 5) % 256
    )
}

// ─── Public entry point ──────────────────────────────────────────

/// Writes `rows` rows as a single atomic batch and returns how many were
/// written.
pub async fn insert_rows(store: &dyn Store, rows: usize) -> Result<usize, StoreError> {
    let start = Instant::now();
    let mutations = build_mutations(rows);
    let count = mutations.len();

    store.apply(mutations).await?;

    info!(
        rows = count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "batch insert complete"
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_row_has_a_unique_key_and_full_columns() {
        let mutations = build_mutations(100);
        assert_eq!(mutations.len(), 100);

        let keys: HashSet<String> = mutations
            .iter()
            .map(|m| m.key().unwrap().to_string())
            .collect();
        assert_eq!(keys.len(), 100);

        for m in &mutations {
            assert_eq!(m.columns, COLUMNS.to_vec());
            assert_eq!(m.values.len(), COLUMNS.len());
            let key = m.key().unwrap().to_string();
            assert_eq!(
                m.get("username"),
                Some(&Value::Text(format!("user_{key}@example.com")))
            );
        }
    }

    #[test]
    fn partition_and_acceptance_cycle_through_six() {
        let mutations = build_mutations(13);
        let partitions: Vec<&Value> = mutations
            .iter()
            .map(|m| m.get("registerFrom").unwrap())
            .collect();
        assert_eq!(partitions[0], &Value::Int(0));
        assert_eq!(partitions[5], &Value::Int(5));
        assert_eq!(partitions[6], &Value::Int(0));
        assert_eq!(partitions[12], &Value::Int(0));
        assert!(mutations
            .iter()
            .all(|m| m.get("registerFrom") == m.get("policyAcceptance")));
    }

    #[test]
    fn register_ip_is_derived_from_index() {
        assert_eq!(register_ip(0), "0.0.1.5");
        assert_eq!(register_ip(3), "3.6.10.8");
        assert_eq!(register_ip(300), "44.88.145.49");
    }
}
