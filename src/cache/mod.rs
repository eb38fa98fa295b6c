//! Persistent incremental-build cache.
//!
//! A single SQLite store at `<root>/.lbt/cache.db` holds file-content
//! metadata, per-object compile records, and header-dependency records. A
//! compile unit is valid only while its object file exists and the source
//! hash, command hash, toolchain identity, and recomputed header-dependency
//! hash all match what was recorded.
//!
//! The connection is serialized behind a mutex: one writer, readers queued
//! through the same lock, which is safe under the parallel scheduler since
//! writebacks flow through the collector thread.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CacheError;
use crate::toolchain::deps::is_system_header;
use crate::util::fs::ensure_dir;
use crate::util::hash::{hash_file, hash_str, Fingerprint};

/// Cached content metadata for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub path: PathBuf,
    pub hash: String,
    pub mtime: i64,
    pub size: u64,
}

/// The persistent build cache.
pub struct BuildCache {
    conn: Mutex<Connection>,
}

impl BuildCache {
    /// Open (or create) the cache store under `<root>/.lbt/`.
    ///
    /// A corrupted store is deleted and recreated, forcing a full rebuild.
    pub fn open(project_root: &Path) -> Result<Self, CacheError> {
        let state_dir = crate::util::config::project_state_dir(project_root);
        ensure_dir(&state_dir).map_err(CacheError::Other)?;

        let gitignore = state_dir.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, "*\n")?;
        }

        let db_path = state_dir.join("cache.db");
        let conn = match Self::open_and_init(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    "cache store unusable ({}); recreating {}",
                    e,
                    db_path.display()
                );
                let _ = std::fs::remove_file(&db_path);
                Self::open_and_init(&db_path)?
            }
        };

        Ok(BuildCache {
            conn: Mutex::new(conn),
        })
    }

    fn open_and_init(path: &Path) -> Result<Connection, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS file_meta (
                path TEXT PRIMARY KEY,
                hash TEXT NOT NULL,
                mtime INTEGER NOT NULL,
                size INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS compile_units (
                object_path TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                source_hash TEXT NOT NULL,
                args_hash TEXT NOT NULL,
                deps_hash TEXT NOT NULL,
                toolchain_id TEXT NOT NULL,
                compiled_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS header_deps (
                source_path TEXT NOT NULL,
                header_path TEXT NOT NULL,
                is_system INTEGER NOT NULL,
                PRIMARY KEY (source_path, header_path)
            );

            CREATE INDEX IF NOT EXISTS idx_header_deps_source
                ON header_deps(source_path);
            "#,
        )?;
        Ok(conn)
    }

    /// Return cached content metadata for `path`, rehashing only when the
    /// stored (mtime, size) no longer matches the file on disk.
    pub fn get_or_update_file_meta(&self, path: &Path) -> Result<FileMeta, CacheError> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        file_meta_inner(&conn, path)
    }

    /// Decide whether `source` must be recompiled into `object` under the
    /// given command line and toolchain.
    pub fn needs_rebuild(
        &self,
        source: &Path,
        object: &Path,
        args: &str,
        toolchain_id: &str,
    ) -> Result<bool, CacheError> {
        if !object.exists() {
            return Ok(true);
        }

        let conn = self.conn.lock().expect("cache mutex poisoned");

        let object_key = object.to_string_lossy().into_owned();
        let unit: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT source_hash, args_hash, deps_hash, toolchain_id
                 FROM compile_units WHERE object_path = ?1",
                params![object_key],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((source_hash, args_hash, deps_hash, recorded_toolchain)) = unit else {
            return Ok(true);
        };

        if recorded_toolchain != toolchain_id {
            return Ok(true);
        }

        if args_hash != hash_str(args) {
            return Ok(true);
        }

        if source_hash != file_meta_inner(&conn, source)?.hash {
            return Ok(true);
        }

        // Every recorded non-system header must still exist and hash to the
        // same aggregate.
        let source_key = source.to_string_lossy().into_owned();
        let mut stmt = conn.prepare(
            "SELECT header_path FROM header_deps
             WHERE source_path = ?1 AND is_system = 0",
        )?;
        let headers: Vec<PathBuf> = stmt
            .query_map(params![source_key], |row| {
                row.get::<_, String>(0).map(PathBuf::from)
            })?
            .collect::<Result<_, _>>()?;

        let mut hashed = Vec::with_capacity(headers.len());
        for header in &headers {
            if !header.exists() {
                return Ok(true);
            }
            let meta = file_meta_inner(&conn, header)?;
            hashed.push((header.to_string_lossy().into_owned(), meta.hash));
        }

        Ok(aggregate_deps_hash(hashed) != deps_hash)
    }

    /// Record a successful compilation: replace the source's header set and
    /// upsert the compile unit with fresh hashes.
    pub fn record_compilation(
        &self,
        source: &Path,
        object: &Path,
        args: &str,
        toolchain_id: &str,
        headers: &[PathBuf],
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.lock().expect("cache mutex poisoned");
        let tx = conn.transaction()?;

        let source_key = source.to_string_lossy().into_owned();

        tx.execute(
            "DELETE FROM header_deps WHERE source_path = ?1",
            params![source_key],
        )?;

        let mut hashed = Vec::new();
        for header in headers {
            let system = is_system_header(header);
            tx.execute(
                "INSERT OR REPLACE INTO header_deps (source_path, header_path, is_system)
                 VALUES (?1, ?2, ?3)",
                params![source_key, header.to_string_lossy().into_owned(), system as i64],
            )?;
            if !system && header.exists() {
                let meta = file_meta_inner(&tx, header)?;
                hashed.push((header.to_string_lossy().into_owned(), meta.hash));
            }
        }

        let source_meta = file_meta_inner(&tx, source)?;
        let compiled_at = unix_now();

        tx.execute(
            "INSERT OR REPLACE INTO compile_units
             (object_path, source_path, source_hash, args_hash, deps_hash, toolchain_id, compiled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                object.to_string_lossy().into_owned(),
                source_key,
                source_meta.hash,
                hash_str(args),
                aggregate_deps_hash(hashed),
                toolchain_id,
                compiled_at,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Truncate all cache tables.
    pub fn clear(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute_batch(
            "DELETE FROM file_meta;
             DELETE FROM compile_units;
             DELETE FROM header_deps;",
        )?;
        Ok(())
    }

    /// Recorded header dependencies of a source, non-system first.
    pub fn header_deps_of(&self, source: &Path) -> Result<Vec<(PathBuf, bool)>, CacheError> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let source_key = source.to_string_lossy().into_owned();
        let mut stmt = conn.prepare(
            "SELECT header_path, is_system FROM header_deps
             WHERE source_path = ?1 ORDER BY is_system, header_path",
        )?;
        let rows = stmt
            .query_map(params![source_key], |row| {
                Ok((
                    PathBuf::from(row.get::<_, String>(0)?),
                    row.get::<_, i64>(1)? != 0,
                ))
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

/// Aggregate hash over header content hashes in canonical (path-sorted)
/// order. An empty set hashes to the digest of nothing.
fn aggregate_deps_hash(mut hashed: Vec<(String, String)>) -> String {
    hashed.sort();
    let mut fp = Fingerprint::new();
    for (_, hash) in &hashed {
        fp.update_str(hash);
    }
    fp.finish()
}

fn file_meta_inner(conn: &Connection, path: &Path) -> Result<FileMeta, CacheError> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    let size = metadata.len();

    let key = path.to_string_lossy().into_owned();
    let cached: Option<(String, i64, i64)> = conn
        .query_row(
            "SELECT hash, mtime, size FROM file_meta WHERE path = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    if let Some((hash, cached_mtime, cached_size)) = cached {
        if cached_mtime == mtime && cached_size == size as i64 {
            return Ok(FileMeta {
                path: path.to_path_buf(),
                hash,
                mtime,
                size,
            });
        }
    }

    let hash = hash_file(path).map_err(CacheError::Other)?;
    conn.execute(
        "INSERT OR REPLACE INTO file_meta (path, hash, mtime, size)
         VALUES (?1, ?2, ?3, ?4)",
        params![key, hash, mtime, size as i64],
    )?;

    Ok(FileMeta {
        path: path.to_path_buf(),
        hash,
        mtime,
        size,
    })
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, BuildCache, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let cache = BuildCache::open(tmp.path()).unwrap();

        let source = tmp.path().join("main.cpp");
        std::fs::write(&source, "int main() { return 0; }").unwrap();

        let object = tmp.path().join("main.o");
        std::fs::write(&object, "object bytes").unwrap();

        (tmp, cache, source, object)
    }

    #[test]
    fn test_open_writes_gitignore() {
        let tmp = TempDir::new().unwrap();
        let _cache = BuildCache::open(tmp.path()).unwrap();

        let gitignore = tmp.path().join(".lbt").join(".gitignore");
        assert_eq!(std::fs::read_to_string(gitignore).unwrap().trim(), "*");
        assert!(tmp.path().join(".lbt").join("cache.db").exists());
    }

    #[test]
    fn test_missing_object_needs_rebuild() {
        let (tmp, cache, source, _) = fixture();
        let missing = tmp.path().join("gone.o");
        assert!(cache
            .needs_rebuild(&source, &missing, "cc -c", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_unrecorded_unit_needs_rebuild() {
        let (_tmp, cache, source, object) = fixture();
        assert!(cache
            .needs_rebuild(&source, &object, "cc -c", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_recorded_unit_is_valid() {
        let (_tmp, cache, source, object) = fixture();
        cache
            .record_compilation(&source, &object, "cc -c", "gcc-13.2", &[])
            .unwrap();

        assert!(!cache
            .needs_rebuild(&source, &object, "cc -c", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_source_change_invalidates() {
        let (_tmp, cache, source, object) = fixture();
        cache
            .record_compilation(&source, &object, "cc -c", "gcc-13.2", &[])
            .unwrap();

        std::fs::write(&source, "int main() { return 1; }").unwrap();
        assert!(cache
            .needs_rebuild(&source, &object, "cc -c", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_args_change_invalidates() {
        let (_tmp, cache, source, object) = fixture();
        cache
            .record_compilation(&source, &object, "cc -c", "gcc-13.2", &[])
            .unwrap();

        assert!(cache
            .needs_rebuild(&source, &object, "cc -c -O2", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_toolchain_change_invalidates() {
        let (_tmp, cache, source, object) = fixture();
        cache
            .record_compilation(&source, &object, "cc -c", "gcc-13.2", &[])
            .unwrap();

        assert!(cache
            .needs_rebuild(&source, &object, "cc -c", "clang-17.0")
            .unwrap());
    }

    #[test]
    fn test_header_change_invalidates() {
        let (tmp, cache, source, object) = fixture();
        let header = tmp.path().join("math.hpp");
        std::fs::write(&header, "#pragma once\nint f();").unwrap();

        cache
            .record_compilation(
                &source,
                &object,
                "cc -c",
                "gcc-13.2",
                std::slice::from_ref(&header),
            )
            .unwrap();
        assert!(!cache
            .needs_rebuild(&source, &object, "cc -c", "gcc-13.2")
            .unwrap());

        std::fs::write(&header, "#pragma once\nint f();\nint g();").unwrap();
        assert!(cache
            .needs_rebuild(&source, &object, "cc -c", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_missing_header_invalidates() {
        let (tmp, cache, source, object) = fixture();
        let header = tmp.path().join("gone.hpp");
        std::fs::write(&header, "#pragma once").unwrap();

        cache
            .record_compilation(
                &source,
                &object,
                "cc -c",
                "gcc-13.2",
                std::slice::from_ref(&header),
            )
            .unwrap();

        std::fs::remove_file(&header).unwrap();
        assert!(cache
            .needs_rebuild(&source, &object, "cc -c", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_system_headers_ignored_in_deps_hash() {
        let (_tmp, cache, source, object) = fixture();
        // A system path that does not exist on disk must not invalidate.
        let system = PathBuf::from("/usr/include/stdio.h");

        cache
            .record_compilation(&source, &object, "cc -c", "gcc-13.2", &[system])
            .unwrap();
        assert!(!cache
            .needs_rebuild(&source, &object, "cc -c", "gcc-13.2")
            .unwrap());
    }

    #[test]
    fn test_record_replaces_header_set() {
        let (tmp, cache, source, object) = fixture();
        let h1 = tmp.path().join("a.hpp");
        let h2 = tmp.path().join("b.hpp");
        std::fs::write(&h1, "a").unwrap();
        std::fs::write(&h2, "b").unwrap();

        cache
            .record_compilation(&source, &object, "cc -c", "t", &[h1.clone(), h2.clone()])
            .unwrap();
        assert_eq!(cache.header_deps_of(&source).unwrap().len(), 2);

        cache
            .record_compilation(&source, &object, "cc -c", "t", std::slice::from_ref(&h1))
            .unwrap();
        let deps = cache.header_deps_of(&source).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].0, h1);
    }

    #[test]
    fn test_clear() {
        let (_tmp, cache, source, object) = fixture();
        cache
            .record_compilation(&source, &object, "cc -c", "t", &[])
            .unwrap();
        cache.clear().unwrap();

        assert!(cache.needs_rebuild(&source, &object, "cc -c", "t").unwrap());
    }

    #[test]
    fn test_file_meta_reuses_hash_when_stat_matches() {
        let (_tmp, cache, source, _) = fixture();
        let first = cache.get_or_update_file_meta(&source).unwrap();
        let second = cache.get_or_update_file_meta(&source).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash.len(), 64);
    }

    #[test]
    fn test_corrupt_store_recovers() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join(".lbt").join("cache.db");
        std::fs::create_dir_all(db.parent().unwrap()).unwrap();
        std::fs::write(&db, "this is not a sqlite database, promise").unwrap();

        let cache = BuildCache::open(tmp.path()).unwrap();
        let source = tmp.path().join("a.c");
        std::fs::write(&source, "x").unwrap();
        let object = tmp.path().join("a.o");
        assert!(cache.needs_rebuild(&source, &object, "cc", "t").unwrap());
    }
}
