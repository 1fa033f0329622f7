//! [`TileStore`]: the store session shared by every phase of a run.

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tilemirror_core::{ContentDigest, TileExtent, TmsCoord};

use super::{StoreError, initialise_schema};

/// Metadata key holding the tileset id the store is bound to.
///
/// The key name is kept so files produced by earlier tools remain readable.
pub const METADATA_IDENTITY: &str = "_gsi_tileset_id";

/// SQLite journal modes used during and after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead log; used while a run is in progress.
    Wal,
    /// Rollback journal; leaves a single self-contained file.
    Delete,
}

impl JournalMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Open MBTiles database plus its cached prepared statements.
///
/// All mutating statements of a run go through one `TileStore`, which makes
/// it the single writer path. The connection is neither `Send` nor `Sync`;
/// concurrent readers within one task share it by reference.
#[derive(Debug)]
pub struct TileStore {
    connection: Connection,
    location: Option<Utf8PathBuf>,
}

impl TileStore {
    /// Open or create the store at `path`, switching it to WAL journalling.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::initialise(connection, Some(path.to_path_buf()))
    }

    /// Create a throwaway store in memory.
    ///
    /// # Errors
    /// Returns [`StoreError`] when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Sqlite {
            operation: "open in-memory store",
            source,
        })?;
        Self::initialise(connection, None)
    }

    fn initialise(
        mut connection: Connection,
        location: Option<Utf8PathBuf>,
    ) -> Result<Self, StoreError> {
        initialise_schema(&mut connection)?;
        let store = Self {
            connection,
            location,
        };
        store.set_journal_mode(JournalMode::Wal)?;
        Ok(store)
    }

    /// Location on disk, or `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        self.location.as_deref()
    }

    /// Switch the journal mode and return the mode SQLite reports.
    ///
    /// In-memory databases always report `memory`.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when SQLite rejects the pragma.
    pub fn set_journal_mode(&self, mode: JournalMode) -> Result<String, StoreError> {
        self.connection
            .pragma_update_and_check(None, "journal_mode", mode.as_str(), |row| row.get(0))
            .map_err(|source| StoreError::Sqlite {
                operation: "set journal mode",
                source,
            })
    }

    /// Read a metadata value.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the lookup fails.
    pub fn metadata(&self, name: &str) -> Result<Option<String>, StoreError> {
        let mut statement = self
            .connection
            .prepare_cached("SELECT value FROM metadata WHERE name = ?1")
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare metadata lookup",
                source,
            })?;
        statement
            .query_row([name], |row| row.get(0))
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "read metadata",
                source,
            })
    }

    /// Tileset id the store is bound to, if any.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the lookup fails.
    pub fn identity(&self) -> Result<Option<String>, StoreError> {
        self.metadata(METADATA_IDENTITY)
    }

    /// Upsert metadata rows in one transaction.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when any row cannot be written; no row of
    /// the call is kept in that case.
    pub fn write_metadata<'a, I>(&mut self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let transaction = self.transaction("begin metadata transaction")?;
        {
            let mut upsert = transaction
                .prepare_cached(
                    "INSERT INTO metadata (name, value) VALUES (?1, ?2)
                    ON CONFLICT (name) DO UPDATE SET value = excluded.value",
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "prepare metadata upsert",
                    source,
                })?;
            for (name, value) in entries {
                upsert
                    .execute(params![name, value])
                    .map_err(|source| StoreError::Sqlite {
                        operation: "write metadata",
                        source,
                    })?;
            }
        }
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit metadata transaction",
            source,
        })
    }

    /// Number of rows in `tile_ref`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the count cannot be read.
    pub fn reference_count(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) FROM tile_ref", "count tile references")
    }

    /// Number of rows in `images`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the count cannot be read.
    pub fn image_count(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) FROM images", "count images")
    }

    fn count(&self, sql: &str, operation: &'static str) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row(sql, [], |row| row.get(0))
            .map_err(|source| StoreError::Sqlite { operation, source })?;
        u64::try_from(count).map_err(|_| StoreError::OutOfRange {
            what: operation,
            value: i128::from(count),
        })
    }

    /// Whether a blob with `digest` is already stored.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the lookup fails.
    pub fn has_image(&self, digest: &ContentDigest) -> Result<bool, StoreError> {
        let mut statement = self
            .connection
            .prepare_cached("SELECT 1 FROM images WHERE md5 = ?1")
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare image lookup",
                source,
            })?;
        statement
            .exists([digest.as_str()])
            .map_err(|source| StoreError::Sqlite {
                operation: "look up image",
                source,
            })
    }

    /// Store a blob. Each call commits on its own.
    ///
    /// `size` is the size published by the catalogue, which differs from
    /// `data.len()` when a transform rewrote the payload.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the digest is already stored or the
    /// write fails, and [`StoreError::OutOfRange`] when `size` exceeds `i64`.
    pub fn insert_image(
        &self,
        digest: &ContentDigest,
        size: u64,
        data: &[u8],
    ) -> Result<(), StoreError> {
        let size = i64::try_from(size).map_err(|_| StoreError::OutOfRange {
            what: "tile size",
            value: i128::from(size),
        })?;
        let mut statement = self
            .connection
            .prepare_cached("INSERT INTO images (md5, tile_size, tile_data) VALUES (?1, ?2, ?3)")
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare image insert",
                source,
            })?;
        statement
            .execute(params![digest.as_str(), size, data])
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "insert image",
                source,
            })
    }

    /// Start a transaction for reference upserts.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the transaction cannot start.
    pub fn begin_references(&mut self) -> Result<ReferenceBatch<'_>, StoreError> {
        Ok(ReferenceBatch {
            transaction: self.transaction("begin reference transaction")?,
        })
    }

    /// Delete every blob no reference points to; returns how many went.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the delete fails.
    pub fn delete_unreferenced_images(&self) -> Result<u64, StoreError> {
        let deleted = self
            .connection
            .execute(
                "DELETE FROM images WHERE md5 IN (
                    SELECT i.md5
                    FROM images i
                    LEFT JOIN tile_ref tr ON tr.image_md5 = i.md5
                    WHERE tr.image_md5 IS NULL
                )",
                [],
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "delete unreferenced images",
                source,
            })?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }

    /// Rebuild the file to release freed pages.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when SQLite cannot rebuild the file.
    pub fn vacuum(&self) -> Result<(), StoreError> {
        self.connection
            .execute_batch("VACUUM")
            .map_err(|source| StoreError::Sqlite {
                operation: "vacuum store",
                source,
            })
    }

    /// Column and row span of resolvable tiles at `zoom`, if any exist.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the query fails or a stored index does not
    /// fit `u32`.
    pub fn tile_extent(&self, zoom: u8) -> Result<Option<TileExtent>, StoreError> {
        type Extremes = (Option<i64>, Option<i64>, Option<i64>, Option<i64>);
        let (min_column, max_column, min_row, max_row): Extremes = self
            .connection
            .query_row(
                "SELECT MIN(tile_column), MAX(tile_column), MIN(tile_row), MAX(tile_row)
                FROM tiles WHERE zoom_level = ?1",
                [zoom],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "read tile extent",
                source,
            })?;
        let (Some(min_column), Some(max_column), Some(min_row), Some(max_row)) =
            (min_column, max_column, min_row, max_row)
        else {
            return Ok(None);
        };
        Ok(Some(TileExtent {
            zoom,
            min_column: index(min_column, "minimum column")?,
            max_column: index(max_column, "maximum column")?,
            min_row: index(min_row, "minimum row")?,
            max_row: index(max_row, "maximum row")?,
        }))
    }

    /// Close the connection, surfacing any error SQLite reports.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when SQLite cannot release the connection.
    pub fn close(self) -> Result<(), StoreError> {
        self.connection
            .close()
            .map_err(|(_, source)| StoreError::Sqlite {
                operation: "close store",
                source,
            })
    }

    fn transaction(&mut self, operation: &'static str) -> Result<Transaction<'_>, StoreError> {
        self.connection
            .transaction()
            .map_err(|source| StoreError::Sqlite { operation, source })
    }

    #[cfg(test)]
    pub(crate) const fn connection(&self) -> &Connection {
        &self.connection
    }
}

fn index(value: i64, what: &'static str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::OutOfRange {
        what,
        value: i128::from(value),
    })
}

/// Reference upserts grouped in one transaction.
///
/// Dropping the batch without [`ReferenceBatch::commit`] rolls it back.
#[derive(Debug)]
pub struct ReferenceBatch<'s> {
    transaction: Transaction<'s>,
}

impl ReferenceBatch<'_> {
    /// Point `coord` at `digest`, stamped `updated_at`.
    ///
    /// Returns `false` when the stored row already carries `updated_at`, in
    /// which case nothing is written.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the write fails.
    pub fn upsert(
        &self,
        coord: TmsCoord,
        digest: &ContentDigest,
        updated_at: i64,
    ) -> Result<bool, StoreError> {
        let mut statement = self
            .transaction
            .prepare_cached(
                "INSERT INTO tile_ref (zoom_level, tile_column, tile_row, image_md5, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (zoom_level, tile_column, tile_row) DO UPDATE SET
                    image_md5 = excluded.image_md5,
                    updated_at = excluded.updated_at
                WHERE updated_at <> excluded.updated_at",
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare reference upsert",
                source,
            })?;
        let changed = statement
            .execute(params![
                coord.zoom(),
                coord.column(),
                coord.row(),
                digest.as_str(),
                updated_at
            ])
            .map_err(|source| StoreError::Sqlite {
                operation: "upsert tile reference",
                source,
            })?;
        Ok(changed > 0)
    }

    /// Commit every upsert in the batch.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the commit fails; the batch is rolled
    /// back.
    pub fn commit(self) -> Result<(), StoreError> {
        self.transaction
            .commit()
            .map_err(|source| StoreError::Sqlite {
                operation: "commit reference transaction",
                source,
            })
    }
}
