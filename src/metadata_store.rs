// Position Metadata Store
// Keyed by broker position ticket. Process-wide single writer. Backed by a
// durable file, loaded at process start, atomically rewritten on mutation;
// corruption rebuilds from `positions[]` (spec §4.8).

use decision_core::{PositionMetadata, RawPosition};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct MetadataStore {
    path: PathBuf,
    records: HashMap<u64, PositionMetadata>,
}

impl MetadataStore {
    /// Load from `path`; corruption (unreadable or unparseable file)
    /// starts empty rather than propagating an error, per spec §4.8 — the
    /// caller then rebuilds from the incoming snapshot's `positions[]`.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<HashMap<u64, PositionMetadata>>(&bytes).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "metadata store corrupt, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self { path, records }
    }

    /// Create or refresh a record for every live position, and purge
    /// records whose ticket has been absent for two consecutive snapshots.
    pub fn upsert(&mut self, positions: &[RawPosition], snapshot_time: i64) {
        let live: std::collections::HashSet<u64> = positions.iter().map(|p| p.ticket).collect();

        for position in positions {
            let entry = self.records.entry(position.ticket).or_insert_with(|| {
                PositionMetadata::new(
                    position.ticket,
                    position.volume,
                    position.profit,
                    snapshot_time - position.age_minutes as i64 * 60,
                )
            });
            entry.observe_profit(position.profit);
        }

        let mut to_purge = Vec::new();
        for (ticket, metadata) in self.records.iter_mut() {
            if !live.contains(ticket) {
                metadata.missing_streak = metadata.missing_streak.saturating_add(1);
                if metadata.missing_streak >= decision_core::metadata::PURGE_AFTER_MISSING_STREAK {
                    to_purge.push(*ticket);
                }
            }
        }
        for ticket in to_purge {
            self.records.remove(&ticket);
        }
    }

    /// Confirms each ticket's exit so the next `upsert` purge can proceed
    /// without waiting out the missing-streak window unnecessarily long,
    /// and returns the realized profit of every ticket seen here for the
    /// first time — the orchestrator folds these into `PortfolioState`'s
    /// rolling performance window (spec §4.6 "Side effects"). A ticket
    /// already reconciled (e.g. resent across several snapshots before the
    /// broker drops it) is not returned again.
    pub fn reconcile(&mut self, recent_trades: &[decision_core::RecentTrade]) -> Vec<f64> {
        let mut newly_confirmed = Vec::new();
        for trade in recent_trades {
            if let Some(metadata) = self.records.get_mut(&trade.ticket) {
                metadata.missing_streak = metadata.missing_streak.max(1);
                if !metadata.reconciled {
                    metadata.reconciled = true;
                    newly_confirmed.push(trade.profit);
                }
            }
        }
        newly_confirmed
    }

    pub fn get(&self, ticket: u64) -> Option<&PositionMetadata> {
        self.records.get(&ticket)
    }

    pub fn get_mut(&mut self, ticket: u64) -> Option<&mut PositionMetadata> {
        self.records.get_mut(&ticket)
    }

    /// Atomic write-to-temp-then-rename (spec §5).
    pub async fn persist(&self) -> std::io::Result<()> {
        let serialized = serde_json::to_vec_pretty(&self.records)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &serialized).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_core::PositionSide;

    fn position(ticket: u64, profit: f64) -> RawPosition {
        RawPosition {
            ticket,
            symbol: "eurusd".to_string(),
            side: PositionSide::Buy,
            volume: 1.0,
            price_open: 1.1,
            price_current: 1.1010,
            sl: 1.095,
            tp: 0.0,
            profit,
            time: 1_700_000_000,
            age_minutes: 5.0,
        }
    }

    #[tokio::test]
    async fn upsert_creates_record_on_first_sighting() {
        let mut store = MetadataStore { path: PathBuf::from("/tmp/does-not-exist.json"), records: HashMap::new() };
        store.upsert(&[position(1, 50.0)], 1_700_000_300);
        assert!(store.get(1).is_some());
    }

    #[tokio::test]
    async fn absent_ticket_is_purged_after_two_snapshots() {
        let mut store = MetadataStore { path: PathBuf::from("/tmp/does-not-exist.json"), records: HashMap::new() };
        store.upsert(&[position(1, 50.0)], 1_700_000_300);
        store.upsert(&[], 1_700_000_600);
        assert!(store.get(1).is_some());
        store.upsert(&[], 1_700_000_900);
        assert!(store.get(1).is_none());
    }

    #[tokio::test]
    async fn persisted_store_reloads_with_the_same_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metadata.json");

        let mut store = MetadataStore { path: path.clone(), records: HashMap::new() };
        store.upsert(&[position(7, 120.0)], 1_700_000_300);
        store.persist().await.expect("persist succeeds");

        let reloaded = MetadataStore::load(&path).await;
        assert_eq!(reloaded.get(7).map(|m| m.ticket), Some(7));
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty_instead_of_failing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metadata.json");
        tokio::fs::write(&path, b"not json").await.expect("write corrupt file");

        let store = MetadataStore::load(&path).await;
        assert!(store.get(1).is_none());
    }
}
