// src/statistics/cache.rs

//! On-disk statistics cache (`sources_stats.data`)
//!
//! One `key<TAB>value` line per entry, sorted by key. Keys are dotted:
//! `total.disk_usage`, `debian_sid.source_files`,
//! `debian_sid.sloccount.ansic`. Web consumers read these names, so they
//! must stay stable from one release to the next.

use crate::error::{Error, Result};
use crate::storage::write_atomic;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

pub type StatsCache = BTreeMap<String, i64>;

/// Key scope for the whole archive
pub const TOTAL_SCOPE: &str = "total";

/// Key scope for one suite
pub fn suite_scope(suite: &str) -> String {
    format!("debian_{suite}")
}

/// Load a cache file; a missing file is an empty cache
pub fn load(path: &Path) -> Result<StatsCache> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StatsCache::new()),
        Err(e) => return Err(e.into()),
    };

    let mut cache = StatsCache::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            return Err(Error::ParseError(format!(
                "{}:{}: expected 'key value'",
                path.display(),
                lineno + 1
            )));
        };
        let value = value.parse::<i64>().map_err(|e| {
            Error::ParseError(format!("{}:{}: {}", path.display(), lineno + 1, e))
        })?;
        cache.insert(key.to_string(), value);
    }

    Ok(cache)
}

/// Write `cache` to `path` atomically
pub fn save(cache: &StatsCache, path: &Path) -> Result<()> {
    write_atomic(path, |out| {
        for (key, value) in cache {
            writeln!(out, "{}\t{}", key, value)?;
        }
        Ok(())
    })
}

/// Fold `fresh` into `existing`, key by key
///
/// Keys absent from `fresh` keep their old values.
pub fn merge(existing: &mut StatsCache, fresh: StatsCache) {
    existing.extend(fresh);
}

/// Drop every key of `scope`
pub fn prune_scope(cache: &mut StatsCache, scope: &str) -> usize {
    let prefix = format!("{scope}.");
    let before = cache.len();
    cache.retain(|key, _| !key.starts_with(&prefix));
    before - cache.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sources_stats.data");

        let cache = StatsCache::from([
            ("total.disk_usage".to_string(), 1234),
            ("debian_sid.ctags".to_string(), 5),
        ]);
        save(&cache, &path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "debian_sid.ctags\t5\ntotal.disk_usage\t1234\n"
        );
        assert_eq!(load(&path).unwrap(), cache);
    }

    #[test]
    fn test_load_accepts_spaces_and_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("stats");
        assert!(load(&path).unwrap().is_empty());

        fs::write(&path, "total.ctags   12\n\n").unwrap();
        assert_eq!(load(&path).unwrap()["total.ctags"], 12);

        fs::write(&path, "total.ctags many\n").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn test_merge_keeps_unrelated_keys() {
        let mut existing = StatsCache::from([
            ("debian_etch.disk_usage".to_string(), 1),
            ("total.disk_usage".to_string(), 2),
        ]);
        merge(&mut existing, StatsCache::from([("total.disk_usage".to_string(), 3)]));

        assert_eq!(existing["debian_etch.disk_usage"], 1);
        assert_eq!(existing["total.disk_usage"], 3);
    }

    #[test]
    fn test_prune_scope() {
        let mut cache = StatsCache::from([
            ("debian_etch.disk_usage".to_string(), 1),
            ("debian_etch.sloccount.ansic".to_string(), 1),
            ("debian_etch-backports.ctags".to_string(), 1),
        ]);
        assert_eq!(prune_scope(&mut cache, &suite_scope("etch")), 2);
        assert_eq!(cache.len(), 1);
    }
}
