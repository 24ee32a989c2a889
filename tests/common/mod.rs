// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use rusqlite::Connection;
use srcmirror::db;
use srcmirror::storage::FsStorage;
use srcmirror::{Config, Error, Result, SourceMirror, SourcePackage, Updater};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Files every fake extraction contains, with their content
pub const FAKE_FILES: &[(&str, &str)] = &[
    ("README", "hello\n"),
    ("debian/control", "Source: fake\n"),
    ("src/main.c", "int main(void) { return 0; }\n"),
];

/// Filesystem storage that writes a few fixed files instead of running
/// `dpkg-source`, and can be told to fail for given package names.
#[derive(Clone, Default)]
pub struct FakeStorage {
    failing: Rc<RefCell<BTreeSet<String>>>,
    extracted: Rc<RefCell<Vec<String>>>,
}

impl FakeStorage {
    pub fn fail_on(&self, name: &str) {
        self.failing.borrow_mut().insert(name.to_string());
    }

    pub fn heal(&self) {
        self.failing.borrow_mut().clear();
    }

    /// `name/version` of every extraction attempted so far
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.borrow().clone()
    }
}

impl FsStorage for FakeStorage {
    fn extract(&self, pkg: &SourcePackage, _dsc: &Path, dir: &Path) -> Result<()> {
        self.extracted.borrow_mut().push(pkg.to_string());
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        if self.failing.borrow().contains(&pkg.name) {
            return Err(Error::ExtractionError(format!("fake failure for {}", pkg)));
        }

        for (relpath, content) in FAKE_FILES {
            let path = dir.join(relpath);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
        }
        Ok(())
    }

    fn remove(&self, _pkg: &SourcePackage, dir: &Path) -> Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

/// A throwaway mirror/sources/cache layout with a database
pub struct Fixture {
    pub temp: TempDir,
    pub config: Config,
    pub storage: FakeStorage,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        for dir in ["mirror", "sources", "cache", "bin"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }

        let mut config = Config::new(
            &root.join("mirror"),
            &root.join("sources"),
            &root.join("cache"),
        );
        config.db_path = root.join("srcmirror.db");
        config.bin_dir = root.join("bin");

        Self {
            temp,
            config,
            storage: FakeStorage::default(),
        }
    }

    pub fn updater(&self) -> Updater {
        Updater::new(self.config.clone())
            .unwrap()
            .with_storage(self.storage.clone())
    }

    pub fn open_db(&self) -> Connection {
        db::open(self.config.db_path.to_str().unwrap()).unwrap()
    }

    pub fn mirror(&self, entries: &[(&str, SourcePackage)]) -> SourceMirror {
        SourceMirror::from_entries(
            &self.config.mirror_dir,
            entries
                .iter()
                .map(|(suite, pkg)| (suite.to_string(), pkg.clone())),
        )
    }

    pub fn pkgdir(&self, pkg: &SourcePackage) -> PathBuf {
        pkg.extraction_dir(&self.config.sources_dir).unwrap()
    }

    pub fn cache_file(&self, name: &str) -> PathBuf {
        self.config.cache_dir.join(name)
    }
}

/// A `main` package with a descriptor location on the mirror
pub fn pkg(name: &str, version: &str) -> SourcePackage {
    let prefix = srcmirror::mirror::pkg_prefix(name);
    SourcePackage::new(name, version, "main").with_dsc(
        &format!("pool/main/{}/{}", prefix, name),
        &format!("{}_{}.dsc", name, version),
    )
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

pub fn package_count(conn: &Connection) -> i64 {
    count(conn, "SELECT COUNT(*) FROM packages")
}

/// Packages mapped to `suite`, as `name/version`, sorted
pub fn suite_members(conn: &Connection, suite: &str) -> Vec<String> {
    srcmirror::db::models::SuiteMapping::packages_in(conn, suite)
        .unwrap()
        .into_iter()
        .map(|(name, version)| format!("{}/{}", name, version))
        .collect()
}

/// Backdate the modification time of `dir` by `days`
pub fn age_dir(dir: &Path, days: u64) {
    let file = fs::File::open(dir).unwrap();
    let when = std::time::SystemTime::now() - std::time::Duration::from_secs(days * 24 * 60 * 60);
    file.set_modified(when).unwrap();
}
