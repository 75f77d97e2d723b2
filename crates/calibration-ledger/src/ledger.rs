use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use intel_core::{CalibrationRecord, CalibrationSnapshot, SectorBias};
use serde::{Deserialize, Serialize};

use crate::policy::multiplier_for;

/// A realized trade outcome reported by the settlement collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub ticker: String,
    pub sector: String,
    /// Realized P&L, percent. Positive counts as a win.
    pub pnl_pct: f64,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Trailing window of outcomes considered by the refresh job
    pub window_days: i64,
    /// Sectors with fewer samples keep the neutral multiplier
    pub min_samples: i64,
    /// How long cached sector lookups stay valid
    pub cache_ttl_secs: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            window_days: 180,
            min_samples: 5,
            cache_ttl_secs: 3600,
        }
    }
}

struct CachedBias {
    bias: SectorBias,
    cached_at: DateTime<Utc>,
}

/// Sector-level calibration state backed by an external store.
/// Writes are idempotent upserts keyed by sector; records are superseded,
/// never deleted.
pub struct CalibrationLedger {
    pool: sqlx::AnyPool,
    config: LedgerConfig,
    cache: DashMap<String, CachedBias>,
}

impl CalibrationLedger {
    pub fn new(pool: sqlx::AnyPool) -> Self {
        Self::with_config(pool, LedgerConfig::default())
    }

    pub fn with_config(pool: sqlx::AnyPool, config: LedgerConfig) -> Self {
        Self {
            pool,
            config,
            cache: DashMap::new(),
        }
    }

    /// Create the ledger tables if they do not exist. Safe to re-run.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trade_outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                sector TEXT NOT NULL,
                pnl_pct REAL NOT NULL,
                closed_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS calibration_records (
                sector TEXT PRIMARY KEY,
                win_rate REAL NOT NULL,
                avg_pnl REAL NOT NULL,
                multiplier REAL NOT NULL,
                sample_size INTEGER NOT NULL,
                last_updated TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record one settled outcome. Invoked by the external outcome-tracking
    /// job, not by the evaluation path.
    pub async fn record_outcome(&self, outcome: &TradeOutcome) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO trade_outcomes (ticker, sector, pnl_pct, closed_at)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&outcome.ticker)
        .bind(&outcome.sector)
        .bind(outcome.pnl_pct)
        .bind(outcome.closed_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Recompute every sector's multiplier from the trailing outcome window
    /// and upsert the records. Re-running on unchanged data (with the same
    /// `now`) yields identical records.
    pub async fn refresh(&self, now: DateTime<Utc>) -> Result<Vec<CalibrationRecord>> {
        let cutoff = (now - Duration::days(self.config.window_days)).to_rfc3339();

        let rows: Vec<(String, f64)> = sqlx::query_as(
            "SELECT sector, pnl_pct FROM trade_outcomes WHERE closed_at >= ?",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut by_sector: std::collections::HashMap<String, Vec<f64>> =
            std::collections::HashMap::new();
        for (sector, pnl) in rows {
            by_sector.entry(sector).or_default().push(pnl);
        }

        let mut records = Vec::new();
        for (sector, pnls) in by_sector {
            let total = pnls.len() as i64;
            if total < self.config.min_samples {
                tracing::debug!(
                    "sector {} has {} outcomes (< {}), keeping neutral",
                    sector,
                    total,
                    self.config.min_samples
                );
                continue;
            }

            let wins = pnls.iter().filter(|p| **p > 0.0).count() as f64;
            let win_rate = wins / total as f64 * 100.0;
            let avg_pnl = pnls.iter().sum::<f64>() / total as f64;
            let multiplier = multiplier_for(win_rate, avg_pnl);

            sqlx::query(
                "INSERT INTO calibration_records
                     (sector, win_rate, avg_pnl, multiplier, sample_size, last_updated)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(sector) DO UPDATE SET
                     win_rate = excluded.win_rate,
                     avg_pnl = excluded.avg_pnl,
                     multiplier = excluded.multiplier,
                     sample_size = excluded.sample_size,
                     last_updated = excluded.last_updated",
            )
            .bind(&sector)
            .bind(win_rate)
            .bind(avg_pnl)
            .bind(multiplier)
            .bind(total)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

            tracing::info!(
                "calibrated {}: win_rate {:.1}%, avg_pnl {:+.2}%, multiplier {:.2} ({} samples)",
                sector,
                win_rate,
                avg_pnl,
                multiplier,
                total
            );

            records.push(CalibrationRecord {
                sector,
                win_rate,
                avg_pnl,
                multiplier,
                sample_size: total,
                last_updated: now,
            });
        }

        // Lookups within the hour must see the refreshed state
        self.cache.clear();

        records.sort_by(|a, b| a.sector.cmp(&b.sector));
        Ok(records)
    }

    /// Sector bias lookup through the hourly cache. Unknown or cold sectors
    /// return the neutral default.
    pub async fn get_sector_bias(&self, sector: &str) -> Result<SectorBias> {
        if let Some(entry) = self.cache.get(sector) {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            if age < self.config.cache_ttl_secs {
                return Ok(entry.bias);
            }
        }

        let row: Option<(f64, f64, i64)> = sqlx::query_as(
            "SELECT multiplier, win_rate, sample_size FROM calibration_records WHERE sector = ?",
        )
        .bind(sector)
        .fetch_optional(&self.pool)
        .await?;

        let bias = match row {
            Some((multiplier, win_rate, sample_size)) => SectorBias {
                multiplier,
                win_rate,
                sample_size,
            },
            None => SectorBias::neutral(),
        };

        self.cache.insert(
            sector.to_string(),
            CachedBias {
                bias,
                cached_at: Utc::now(),
            },
        );

        Ok(bias)
    }

    /// Point-in-time view of every sector's bias, for injection into the
    /// fusion call.
    pub async fn snapshot(&self) -> Result<CalibrationSnapshot> {
        let rows: Vec<(String, f64, f64, i64)> = sqlx::query_as(
            "SELECT sector, multiplier, win_rate, sample_size FROM calibration_records",
        )
        .fetch_all(&self.pool)
        .await?;

        let biases = rows
            .into_iter()
            .map(|(sector, multiplier, win_rate, sample_size)| {
                (
                    sector,
                    SectorBias {
                        multiplier,
                        win_rate,
                        sample_size,
                    },
                )
            })
            .collect();

        Ok(CalibrationSnapshot {
            biases,
            taken_at: Some(Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_ledger() -> CalibrationLedger {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite");

        let ledger = CalibrationLedger::new(pool);
        ledger.ensure_schema().await.unwrap();
        ledger
    }

    async fn seed_outcomes(ledger: &CalibrationLedger, sector: &str, pnls: &[f64]) {
        let closed_at = Utc::now() - Duration::days(10);
        for (i, pnl) in pnls.iter().enumerate() {
            ledger
                .record_outcome(&TradeOutcome {
                    ticker: format!("{}{}", sector, i),
                    sector: sector.to_string(),
                    pnl_pct: *pnl,
                    closed_at,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn cold_sector_returns_neutral() {
        let ledger = setup_ledger().await;
        let bias = ledger.get_sector_bias("energy").await.unwrap();
        assert_eq!(bias.multiplier, 1.0);
        assert_eq!(bias.win_rate, 50.0);
        assert_eq!(bias.sample_size, 0);
    }

    #[tokio::test]
    async fn winning_sector_gets_boosted() {
        let ledger = setup_ledger().await;

        // 20 samples, 70% wins, positive average P&L
        let mut pnls = vec![5.0; 14];
        pnls.extend(vec![-2.0; 6]);
        seed_outcomes(&ledger, "tech", &pnls).await;

        let records = ledger.refresh(Utc::now()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].multiplier, 1.15);
        assert!((records[0].win_rate - 70.0).abs() < 1e-9);

        let bias = ledger.get_sector_bias("tech").await.unwrap();
        assert_eq!(bias.multiplier, 1.15);
        assert_eq!(bias.sample_size, 20);
    }

    #[tokio::test]
    async fn losing_sector_gets_discounted() {
        let ledger = setup_ledger().await;

        // 20 samples, 30% wins, negative average P&L
        let mut pnls = vec![2.0; 6];
        pnls.extend(vec![-4.0; 14]);
        seed_outcomes(&ledger, "biotech", &pnls).await;

        let records = ledger.refresh(Utc::now()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].multiplier <= 0.85);
    }

    #[tokio::test]
    async fn small_samples_stay_neutral() {
        let ledger = setup_ledger().await;
        seed_outcomes(&ledger, "utilities", &[3.0, 2.0, -1.0]).await;

        let records = ledger.refresh(Utc::now()).await.unwrap();
        assert!(records.is_empty());

        let bias = ledger.get_sector_bias("utilities").await.unwrap();
        assert_eq!(bias.multiplier, 1.0);
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let ledger = setup_ledger().await;
        let mut pnls = vec![4.0; 12];
        pnls.extend(vec![-3.0; 8]);
        seed_outcomes(&ledger, "financials", &pnls).await;

        let now = Utc::now();
        let first = ledger.refresh(now).await.unwrap();
        let second = ledger.refresh(now).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn outcomes_outside_the_window_are_ignored() {
        let ledger = setup_ledger().await;

        let stale = Utc::now() - Duration::days(400);
        for i in 0..10 {
            ledger
                .record_outcome(&TradeOutcome {
                    ticker: format!("OLD{}", i),
                    sector: "industrial".to_string(),
                    pnl_pct: 5.0,
                    closed_at: stale,
                })
                .await
                .unwrap();
        }

        let records = ledger.refresh(Utc::now()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn snapshot_carries_every_sector() {
        let ledger = setup_ledger().await;
        seed_outcomes(&ledger, "tech", &[5.0, 4.0, 3.0, 2.0, 1.0, -1.0]).await;
        seed_outcomes(&ledger, "energy", &[-5.0, -4.0, -3.0, -2.0, 1.0]).await;
        ledger.refresh(Utc::now()).await.unwrap();

        let snapshot = ledger.snapshot().await.unwrap();
        assert_eq!(snapshot.biases.len(), 2);
        assert!(snapshot.bias_for("tech").multiplier > 1.0);
        assert!(snapshot.bias_for("energy").multiplier < 1.0);
        // Unknown sectors fall back to neutral
        assert_eq!(snapshot.bias_for("unknown").multiplier, 1.0);
    }
}
