//! Blacklist database
//!
//! Writes a [`PartitionTable`] into a SQLite database with a secondary index
//! over `(first_letter, length)`, and reads it back for verification.
//!
//! The database is built in a temporary file next to the destination and
//! only renamed into place once the transaction has committed and, when
//! requested, the staged file has been verified. A failed build never
//! leaves a file behind.

use crate::partition::{DiscriminatorKey, PartitionTable};
use indicatif::ProgressBar;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Name of the blacklist table
pub const TABLE_NAME: &str = "blacklist";

/// Name of the `(first_letter, length)` index
pub const INDEX_NAME: &str = "idx";

const CREATE_TABLE: &str =
    "CREATE TABLE blacklist (first_letter character(1), length integer, suffix varchar(255))";

const CREATE_INDEX: &str = "CREATE INDEX idx ON blacklist (first_letter, length)";

const INSERT_ROW: &str = "INSERT INTO blacklist VALUES (?1, ?2, ?3)";

/// Rows between progress bar updates
const PROGRESS_STEP: u64 = 64 * 1024;

/// Errors raised while writing or reading a blacklist database
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("output file {0:?} already exists")]
    AlreadyExists(PathBuf),

    #[error("invalid output path {0:?}")]
    InvalidDestination(PathBuf),

    #[error("failed to create temporary database in {dir:?}")]
    Staging {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("failed to move database into place at {path:?}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writer options
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// SQLite page cache size in bytes, `None` keeps the SQLite default
    pub cache_size: Option<usize>,
    /// Check the staged database against the table before it is moved into place
    pub verify: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            cache_size: Some(64 * 1024 * 1024),
            verify: false,
        }
    }
}

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows_written: u64,
}

/// Writes a partition table to a new database file
pub struct IndexWriter {
    destination: PathBuf,
    config: WriterConfig,
    progress: ProgressBar,
    /// Statement run between the inserts and the index, to force a failure
    #[cfg(test)]
    fail_with: Option<&'static str>,
}

impl IndexWriter {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            config: WriterConfig::default(),
            progress: ProgressBar::hidden(),
            #[cfg(test)]
            fail_with: None,
        }
    }

    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Report inserted rows on this progress bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Write every row of the table and build the index
    ///
    /// Either the complete database appears at the destination or nothing
    /// does. An existing file at the destination is never touched. With
    /// [`WriterConfig::verify`] set, the staged file is checked with
    /// [`verify_index`] first.
    pub fn write(&self, table: &PartitionTable) -> Result<WriteSummary, IndexError> {
        self.write_checked(table, |staged| {
            if self.config.verify {
                verify_index(staged, table)
            } else {
                Ok(())
            }
        })
    }

    /// Like [`write`](Self::write), but runs `check` on the closed staging
    /// file before it is moved into place. An error from `check` aborts the
    /// write and removes the staging file.
    pub fn write_checked<F>(
        &self,
        table: &PartitionTable,
        check: F,
    ) -> Result<WriteSummary, IndexError>
    where
        F: FnOnce(&Path) -> Result<(), IndexError>,
    {
        if self.destination.exists() {
            return Err(IndexError::AlreadyExists(self.destination.clone()));
        }

        let file_name = self
            .destination
            .file_name()
            .ok_or_else(|| IndexError::InvalidDestination(self.destination.clone()))?;

        let dir = match self.destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let prefix = format!(".{}.", file_name.to_string_lossy());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".tmp");

        // Same mode as any other new file, instead of the owner-only default
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }

        let staging = builder
            .tempfile_in(&dir)
            .map_err(|source| IndexError::Staging {
                dir: dir.clone(),
                source,
            })?;

        log::debug!("Staging database at {:?}", staging.path());

        let rows_written = self.populate(staging.path(), table)?;
        check(staging.path())?;

        // On error the staging file is dropped and removed
        staging
            .persist_noclobber(&self.destination)
            .map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    IndexError::AlreadyExists(self.destination.clone())
                } else {
                    IndexError::Persist {
                        path: self.destination.clone(),
                        source: e.error,
                    }
                }
            })?;

        log::info!(
            "Wrote {} rows to {:?}",
            rows_written,
            self.destination
        );

        Ok(WriteSummary {
            path: self.destination.clone(),
            rows_written,
        })
    }

    /// Create the schema and insert all rows in a single transaction
    fn populate(&self, path: &Path, table: &PartitionTable) -> Result<u64, IndexError> {
        let mut conn = Connection::open(path)?;

        if let Some(bytes) = self.config.cache_size {
            // Negative values are interpreted by SQLite as KiB
            let kib = (bytes / 1024).max(1) as i64;
            conn.pragma_update(None, "cache_size", -kib)?;
        }

        self.progress.set_length(table.len());

        let tx = conn.transaction()?;
        tx.execute(CREATE_TABLE, [])?;

        let mut rows_written = 0u64;
        {
            let mut stmt = tx.prepare(INSERT_ROW)?;
            let mut first_buf = [0u8; 4];

            for row in table.rows() {
                let first_letter: &str = row.first_letter.encode_utf8(&mut first_buf);
                stmt.execute(params![first_letter, row.length as i64, row.suffix])?;

                rows_written += 1;
                if rows_written % PROGRESS_STEP == 0 {
                    self.progress.set_position(rows_written);
                }
            }
        }

        #[cfg(test)]
        {
            if let Some(sql) = self.fail_with {
                tx.execute_batch(sql)?;
            }
        }

        // Index is built once all rows are in
        tx.execute(CREATE_INDEX, [])?;
        tx.commit()?;

        self.progress.set_position(rows_written);

        conn.close().map_err(|(_, e)| e)?;

        Ok(rows_written)
    }
}

/// Check a written database against the table it was built from
///
/// Compares the row count, requires the `(first_letter, length)` index, and
/// looks up the first word of every bucket.
pub fn verify_index(path: &Path, table: &PartitionTable) -> Result<(), IndexError> {
    let index = BlacklistIndex::open(path)?;

    let rows = index.row_count()?;
    if rows != table.len() {
        return Err(IndexError::Verification(format!(
            "expected {} rows, found {}",
            table.len(),
            rows
        )));
    }

    if !index.has_discriminator_index()? {
        return Err(IndexError::Verification(format!(
            "index {} on (first_letter, length) is missing",
            INDEX_NAME
        )));
    }

    for (key, bucket) in table.buckets() {
        let Some(first) = bucket.first() else {
            continue;
        };
        let word = format!("{}{}", key.first(), first);
        if !index.contains(&word)? {
            return Err(IndexError::Verification(format!(
                "word {:?} from bucket {} not found",
                word, key
            )));
        }
    }

    log::debug!("Verified {} rows in {} buckets", rows, table.bucket_count());
    Ok(())
}

/// Read-only view of a built blacklist database
pub struct BlacklistIndex {
    conn: Connection,
}

impl BlacklistIndex {
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Total number of rows
    pub fn row_count(&self) -> Result<u64, IndexError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blacklist", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Check that the `(first_letter, length)` index exists
    pub fn has_discriminator_index(&self) -> Result<bool, IndexError> {
        let found: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1 AND tbl_name = ?2)",
            params![INDEX_NAME, TABLE_NAME],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Suffixes stored under a key, ascending
    pub fn suffixes(&self, key: &DiscriminatorKey) -> Result<Vec<String>, IndexError> {
        let mut buf = [0u8; 4];
        let first_letter: &str = key.first().encode_utf8(&mut buf);

        let mut stmt = self.conn.prepare_cached(
            "SELECT suffix FROM blacklist WHERE first_letter = ?1 AND length = ?2 ORDER BY suffix",
        )?;
        let suffixes = stmt
            .query_map(params![first_letter, key.length() as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(suffixes)
    }

    /// Check whether a password is on the blacklist
    pub fn contains(&self, password: &str) -> Result<bool, IndexError> {
        let Some(key) = DiscriminatorKey::of(password) else {
            return Ok(false);
        };

        let mut buf = [0u8; 4];
        let first_letter: &str = key.first().encode_utf8(&mut buf);

        let mut stmt = self.conn.prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM blacklist WHERE first_letter = ?1 AND length = ?2 AND suffix = ?3)",
        )?;
        let found: bool = stmt.query_row(
            params![
                first_letter,
                key.length() as i64,
                crate::partition::residual(password)
            ],
            |row| row.get(0),
        )?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use tempfile::TempDir;

    fn table(words: &[&str]) -> PartitionTable {
        partition(words.iter().map(|w| w.to_string()))
    }

    fn all_rows(path: &Path) -> Vec<(String, i64, String)> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare("SELECT first_letter, length, suffix FROM blacklist ORDER BY rowid")
            .unwrap();
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    #[test]
    fn test_write_cat_car_dog() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");

        let summary = IndexWriter::new(&path)
            .write(&table(&["cat", "car", "dog"]))
            .unwrap();
        assert_eq!(summary.rows_written, 3);

        assert_eq!(
            all_rows(&path),
            vec![
                ("c".to_string(), 3, "ar".to_string()),
                ("c".to_string(), 3, "at".to_string()),
                ("d".to_string(), 3, "og".to_string()),
            ]
        );

        let index = BlacklistIndex::open(&path).unwrap();
        assert!(index.has_discriminator_index().unwrap());
        assert_eq!(
            index.suffixes(&DiscriminatorKey::new('c', 3)).unwrap(),
            vec!["ar", "at"]
        );
        assert!(index.contains("cat").unwrap());
        assert!(index.contains("car").unwrap());
        assert!(!index.contains("cap").unwrap());
        assert!(!index.contains("").unwrap());
    }

    #[test]
    fn test_lookup_uses_index() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");
        IndexWriter::new(&path).write(&table(&["cat"])).unwrap();

        let conn = Connection::open(&path).unwrap();
        let plan: String = conn
            .query_row(
                "EXPLAIN QUERY PLAN SELECT suffix FROM blacklist WHERE first_letter = 'c' AND length = 3",
                [],
                |row| row.get(3),
            )
            .unwrap();
        assert!(plan.contains("USING INDEX idx"), "{}", plan);
    }

    #[test]
    fn test_round_trip_every_word() {
        let words = [
            "password", "123456", "qwerty", "a", "ñandú", "admin", "admin", "letmein", "x",
        ];
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");
        IndexWriter::new(&path).write(&table(&words)).unwrap();

        let index = BlacklistIndex::open(&path).unwrap();
        assert_eq!(index.row_count().unwrap(), words.len() as u64);
        for word in words {
            assert!(index.contains(word).unwrap(), "{} missing", word);
        }
        assert!(!index.contains("passwore").unwrap());
        assert_eq!(
            index.suffixes(&DiscriminatorKey::new('a', 5)).unwrap(),
            vec!["dmin", "dmin"]
        );
    }

    #[test]
    fn test_empty_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.db");

        let summary = IndexWriter::new(&path).write(&table(&[])).unwrap();
        assert_eq!(summary.rows_written, 0);

        let index = BlacklistIndex::open(&path).unwrap();
        assert_eq!(index.row_count().unwrap(), 0);
        assert!(index.has_discriminator_index().unwrap());
    }

    #[test]
    fn test_refuses_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");
        std::fs::write(&path, b"precious").unwrap();

        let err = IndexWriter::new(&path).write(&table(&["cat"])).unwrap_err();
        assert!(matches!(err, IndexError::AlreadyExists(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"precious");
    }

    #[test]
    fn test_no_leftovers_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let missing_dir = temp_dir.path().join("missing");
        let path = missing_dir.join("blacklist.db");

        let err = IndexWriter::new(&path).write(&table(&["cat"])).unwrap_err();
        assert!(matches!(err, IndexError::Staging { .. }));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failure_mid_transaction_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");

        let mut writer = IndexWriter::new(&path);
        writer.fail_with = Some("INSERT INTO no_such_table VALUES (1)");

        let err = writer.write(&table(&["cat", "car", "dog"])).unwrap_err();
        assert!(matches!(err, IndexError::Sqlite(_)), "{:?}", err);
        assert!(!path.exists());

        // Neither the staging file nor its rollback journal survive
        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(names.is_empty(), "{:?}", names);
    }

    #[test]
    fn test_failed_check_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");
        let other = table(&["cat", "dog"]);

        let err = IndexWriter::new(&path)
            .write_checked(&table(&["cat"]), |staged| verify_index(staged, &other))
            .unwrap_err();
        assert!(matches!(err, IndexError::Verification(_)), "{:?}", err);
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_verify_flag_checks_before_persist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");

        let summary = IndexWriter::new(&path)
            .with_config(WriterConfig {
                verify: true,
                ..Default::default()
            })
            .write(&table(&["cat", "car", "dog", "a"]))
            .unwrap();
        assert_eq!(summary.rows_written, 4);
        verify_index(&path, &table(&["cat", "car", "dog", "a"])).unwrap();
    }

    #[test]
    fn test_verify_index_detects_missing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");
        IndexWriter::new(&path).write(&table(&["cat", "dog"])).unwrap();

        // Same row count, different words
        let err = verify_index(&path, &table(&["cat", "emu"])).unwrap_err();
        assert!(matches!(err, IndexError::Verification(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_mode_matches_plain_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let plain = temp_dir.path().join("plain.txt");
        std::fs::write(&plain, b"x").unwrap();
        let path = temp_dir.path().join("blacklist.db");
        IndexWriter::new(&path).write(&table(&["cat"])).unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&path), mode(&plain));
    }

    #[test]
    fn test_staging_file_removed_after_success() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");
        IndexWriter::new(&path).write(&table(&["cat"])).unwrap();

        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("blacklist.db")]);
    }

    #[test]
    fn test_without_cache_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blacklist.db");

        let summary = IndexWriter::new(&path)
            .with_config(WriterConfig {
                cache_size: None,
                ..Default::default()
            })
            .write(&table(&["cat", "dog"]))
            .unwrap();
        assert_eq!(summary.rows_written, 2);
    }
}
