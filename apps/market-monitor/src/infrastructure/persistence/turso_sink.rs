//! Turso Sink
//!
//! Stores records in an embedded SQLite-compatible database file.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE calc_data (
//!     id INTEGER PRIMARY KEY,
//!     exchange TEXT NOT NULL,
//!     market TEXT NOT NULL,
//!     spread REAL,
//!     slippage REAL,
//!     volume INTEGER NOT NULL,
//!     timestamp TEXT NOT NULL
//! )
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use turso::{Builder, Connection, Database, Value};

use super::{StoredRecord, resolve_records};
use crate::application::ports::{RecordSink, SinkError, StoreReport};
use crate::domain::sampling::SyncRound;
use crate::domain::symbol::SymbolTranslation;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS calc_data (
    id INTEGER PRIMARY KEY,
    exchange TEXT NOT NULL,
    market TEXT NOT NULL,
    spread REAL,
    slippage REAL,
    volume INTEGER NOT NULL,
    timestamp TEXT NOT NULL
)";

const INSERT_RECORD: &str = "INSERT INTO calc_data (exchange, market, spread, slippage, volume, timestamp)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

fn db_error(e: &turso::Error) -> SinkError {
    SinkError::Database {
        message: e.to_string(),
    }
}

struct Handle {
    _db: Database,
    conn: Connection,
}

/// `RecordSink` backed by a local Turso database.
pub struct TursoSink {
    path: PathBuf,
    translation: SymbolTranslation,
    handle: Mutex<Handle>,
}

impl std::fmt::Debug for TursoSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TursoSink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TursoSink {
    /// Open (or create) the database and its table.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Init`] if the directory, database or table cannot
    /// be created.
    pub async fn open(path: impl AsRef<Path>, translation: SymbolTranslation) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let init = |message: String| SinkError::Init { message };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| init(format!("{}: {e}", parent.display())))?;
        }

        let db = Builder::new_local(&path.to_string_lossy())
            .build()
            .await
            .map_err(|e| init(e.to_string()))?;
        let conn = db.connect().map_err(|e| init(e.to_string()))?;
        conn.execute(CREATE_TABLE, ())
            .await
            .map_err(|e| init(e.to_string()))?;

        tracing::info!(path = %path.display(), "Turso sink ready");

        Ok(Self {
            path,
            translation,
            handle: Mutex::new(Handle { _db: db, conn }),
        })
    }

    /// Database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64, SinkError> {
        let handle = self.handle.lock().await;
        let mut rows = handle
            .conn
            .query("SELECT COUNT(*) FROM calc_data", ())
            .await
            .map_err(|e| db_error(&e))?;

        match rows.next().await.map_err(|e| db_error(&e))? {
            Some(row) => match row.get_value(0).map_err(|e| db_error(&e))? {
                Value::Integer(n) => Ok(n),
                _ => Ok(0),
            },
            None => Ok(0),
        }
    }
}

fn record_params(record: &StoredRecord) -> Vec<Value> {
    let real = |v: Option<f64>| v.map_or(Value::Null, Value::Real);
    vec![
        Value::Text(record.exchange.clone()),
        Value::Text(record.market.clone()),
        real(record.spread),
        real(record.slippage),
        Value::Integer(i64::try_from(record.volume).unwrap_or(i64::MAX)),
        Value::Text(record.timestamp.to_rfc3339()),
    ]
}

#[async_trait]
impl RecordSink for TursoSink {
    async fn store_round(&self, round: &SyncRound) -> Result<StoreReport, SinkError> {
        let (records, rejected) = resolve_records(round, &self.translation);
        let handle = self.handle.lock().await;

        for record in &records {
            handle
                .conn
                .execute(INSERT_RECORD, record_params(record))
                .await
                .map_err(|e| db_error(&e))?;
        }

        Ok(StoreReport {
            stored: records.len(),
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::metrics::CalcResult;
    use crate::domain::sampling::SourceBatch;

    fn round() -> SyncRound {
        let result = CalcResult {
            spread: Some(0.5),
            slippage: Some(0.1),
            trade_count: 3,
            timestamp: Utc::now(),
        };
        let mut binance = SourceBatch::new("binance");
        binance.insert("btcusdt", result);
        let mut kucoin = SourceBatch::new("kucoin");
        kucoin.insert("BTC-USDT", result);
        kucoin.insert("XRP-USDT", result);

        SyncRound {
            round: 1,
            batches: vec![binance, kucoin],
        }
    }

    fn translation() -> SymbolTranslation {
        SymbolTranslation::new()
            .with("binance", "btcusdt", "BTC/USDT")
            .with("kucoin", "BTC-USDT", "BTC/USDT")
    }

    #[tokio::test]
    async fn stores_rows_and_rejects_untranslated() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TursoSink::open(dir.path().join("nested/metrics.db"), translation())
            .await
            .unwrap();

        let report = sink.store_round(&round()).await.unwrap();
        assert_eq!(report, StoreReport { stored: 2, rejected: 1 });
        assert_eq!(sink.count().await.unwrap(), 2);

        sink.store_round(&round()).await.unwrap();
        assert_eq!(sink.count().await.unwrap(), 4);
    }

    #[test]
    fn missing_metrics_bind_as_null() {
        let record = StoredRecord {
            exchange: "binance".to_string(),
            market: "BTC/USDT".to_string(),
            spread: None,
            slippage: Some(0.25),
            volume: 2,
            timestamp: Utc::now(),
        };

        let params = record_params(&record);
        assert!(matches!(params[2], Value::Null));
        assert!(matches!(params[3], Value::Real(v) if (v - 0.25).abs() < f64::EPSILON));
        assert!(matches!(params[4], Value::Integer(2)));
    }
}
