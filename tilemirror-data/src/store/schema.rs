//! Deduplicated MBTiles schema.
//!
//! Tile payloads live once per digest in `images`; `tile_ref` maps each
//! coordinate to a digest. The `tiles` view joins the two so MBTiles readers
//! see the standard table shape.

use rusqlite::{Connection, Transaction};

use super::StoreError;

/// Create the MBTiles tables, indexes and view if they are missing.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use tilemirror_data::store::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create MBTiles schema");
/// initialise_schema(&mut conn).expect("schema creation is idempotent");
///
/// let tables: i64 = conn
///     .query_row(
///         "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('metadata', 'images', 'tile_ref', 'tiles')",
///         [],
///         |row| row.get(0),
///     )
///     .expect("query schema");
/// assert_eq!(tables, 4);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Schema {
            step: "begin schema transaction",
            source,
        })?;

    create_tables(&transaction)?;
    create_indexes(&transaction)?;
    create_views(&transaction)?;

    transaction.commit().map_err(|source| StoreError::Schema {
        step: "commit schema transaction",
        source,
    })
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_step(
        transaction,
        "create metadata",
        "CREATE TABLE IF NOT EXISTS metadata (
            name TEXT,
            value TEXT
        )",
    )?;
    run_step(
        transaction,
        "create images",
        "CREATE TABLE IF NOT EXISTS images (
            md5 TEXT,
            tile_size INTEGER,
            tile_data BLOB
        )",
    )?;
    run_step(
        transaction,
        "create tile_ref",
        "CREATE TABLE IF NOT EXISTS tile_ref (
            zoom_level INTEGER,
            tile_column INTEGER,
            tile_row INTEGER,
            image_md5 TEXT,
            updated_at INTEGER
        )",
    )
}

fn create_indexes(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_step(
        transaction,
        "index images",
        "CREATE UNIQUE INDEX IF NOT EXISTS md5 ON images (md5)",
    )?;
    run_step(
        transaction,
        "index metadata",
        "CREATE UNIQUE INDEX IF NOT EXISTS name ON metadata (name)",
    )?;
    run_step(
        transaction,
        "index tile_ref",
        "CREATE UNIQUE INDEX IF NOT EXISTS xyz ON tile_ref (zoom_level, tile_column, tile_row)",
    )
}

fn create_views(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_step(
        transaction,
        "create tiles view",
        "CREATE VIEW IF NOT EXISTS tiles AS
            SELECT
                tile_ref.zoom_level AS zoom_level,
                tile_ref.tile_column AS tile_column,
                tile_ref.tile_row AS tile_row,
                images.tile_data AS tile_data
            FROM tile_ref
            JOIN images ON images.md5 = tile_ref.image_md5",
    )
}

fn run_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), StoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StoreError::Schema { step, source })
}
