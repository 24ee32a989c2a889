// tests/pipeline.rs

//! Update pipeline integration tests

mod common;

use common::{Fixture, age_dir, count, package_count, pkg, suite_members};
use srcmirror::db::models::{Package, SourceFile, SuiteInfo};
use srcmirror::statistics::cache;
use srcmirror::storage::exclude::ExcludeSpec;
use srcmirror::storage::fs::sidecar_path;
use srcmirror::{Backend, Stage};
use std::fs;

#[test]
fn test_full_run_populates_both_storages() {
    let fixture = Fixture::new();
    let hello = pkg("hello", "2.10-3");
    let zlib = pkg("libz", "1:1.3-1");
    let mirror = fixture.mirror(&[
        ("sid", hello.clone()),
        ("sid", zlib.clone()),
        ("trixie", hello.clone()),
    ]);
    let mut conn = fixture.open_db();

    let status = fixture.updater().run_with_mirror(&mut conn, &mirror, &Stage::ALL).unwrap();

    assert_eq!(package_count(&conn), 2);
    assert!(fixture.pkgdir(&hello).join("src/main.c").is_file());
    assert_eq!(fixture.pkgdir(&zlib), fixture.config.sources_dir.join("main/libz/libz/1.3-1"));
    assert_eq!(suite_members(&conn, "sid"), vec!["hello/2.10-3", "libz/1:1.3-1"]);
    assert_eq!(suite_members(&conn, "trixie"), vec!["hello/2.10-3"]);
    assert_eq!(status.sources.len(), 2);

    let row = Package::find(&conn, "hello", "2.10-3").unwrap().unwrap();
    let id = row.id.unwrap();
    assert_eq!(SourceFile::find_by_package(&conn, id).unwrap().len(), 3);
    assert_eq!(count(&conn, &format!("SELECT COUNT(*) FROM checksums WHERE package_id = {id}")), 3);
    assert!(sidecar_path(&fixture.pkgdir(&hello), "checksums").is_file());

    let manifest = fs::read_to_string(fixture.cache_file("sources.txt")).unwrap();
    assert_eq!(
        manifest,
        "hello\t2.10-3\tmain\tpool/main/h/hello/hello_2.10-3.dsc\tmain/h/hello/2.10-3\tsid,trixie\n\
         libz\t1:1.3-1\tmain\tpool/main/libz/libz/libz_1:1.3-1.dsc\tmain/libz/libz/1.3-1\tsid\n"
    );
    assert!(!fixture.cache_file("sources.txt.new").exists());

    let prefixes = fs::read_to_string(fixture.cache_file("pkg-prefixes")).unwrap();
    assert_eq!(prefixes, "h\nlibz\n");
    assert!(fixture.cache_file("last-update").is_file());
    assert!(fixture.cache_file("stats/ALL-disk_usage-1-month.svg").is_file());
    assert!(fixture.cache_file("stats/sid-sloc_pie-current.svg").is_file());
}

#[test]
fn test_rerun_is_idempotent() {
    let fixture = Fixture::new();
    let mirror = fixture.mirror(&[("sid", pkg("hello", "1.0")), ("sid", pkg("make", "4.3-4"))]);
    let updater = fixture.updater();
    let mut conn = fixture.open_db();

    updater.run_with_mirror(&mut conn, &mirror, &Stage::ALL).unwrap();
    let manifest = fs::read_to_string(fixture.cache_file("sources.txt")).unwrap();
    let files = count(&conn, "SELECT COUNT(*) FROM files");

    updater.run_with_mirror(&mut conn, &mirror, &Stage::ALL).unwrap();

    assert_eq!(fixture.storage.extracted().len(), 2);
    assert_eq!(package_count(&conn), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM files"), files);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM suites"), 2);
    assert_eq!(fs::read_to_string(fixture.cache_file("sources.txt")).unwrap(), manifest);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM history_size WHERE suite = 'ALL'"), 2);
}

#[test]
fn test_failed_package_is_isolated_and_retried() {
    let fixture = Fixture::new();
    let good = pkg("good", "1.0");
    let bad = pkg("bad", "1.0");
    let mirror = fixture.mirror(&[("sid", bad.clone()), ("sid", good.clone())]);
    let updater = fixture.updater();
    let mut conn = fixture.open_db();

    fixture.storage.fail_on("bad");
    updater
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract, Stage::Suites])
        .unwrap();

    assert!(Package::find(&conn, "good", "1.0").unwrap().is_some());
    assert!(Package::find(&conn, "bad", "1.0").unwrap().is_none());
    assert_eq!(suite_members(&conn, "sid"), vec!["good/1.0"]);

    fixture.storage.heal();
    updater
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract, Stage::Suites])
        .unwrap();

    assert!(Package::find(&conn, "bad", "1.0").unwrap().is_some());
    assert!(fixture.pkgdir(&bad).join("README").is_file());
    assert_eq!(suite_members(&conn, "sid"), vec!["bad/1.0", "good/1.0"]);
}

#[cfg(unix)]
#[test]
fn test_hook_failure_after_extraction_is_retried() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new();
    let hello = pkg("hello", "1.0");
    let mirror = fixture.mirror(&[("sid", hello.clone())]);
    let updater = fixture.updater();
    let mut conn = fixture.open_db();

    let hook_dir = fixture.config.bin_dir.join("add-package.d");
    fs::create_dir_all(&hook_dir).unwrap();
    let hook = hook_dir.join("10-fail");
    fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

    updater.run_with_mirror(&mut conn, &mirror, &[Stage::Extract]).unwrap();

    // Extracted, but the rows were rolled back with the failing notification
    assert!(fixture.pkgdir(&hello).is_dir());
    assert_eq!(package_count(&conn), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM files"), 0);

    fs::remove_file(&hook).unwrap();
    updater.run_with_mirror(&mut conn, &mirror, &[Stage::Extract]).unwrap();

    assert_eq!(fixture.storage.extracted().len(), 2);
    assert_eq!(package_count(&conn), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM files"), 3);
}

#[test]
fn test_partial_extraction_is_redone() {
    let fixture = Fixture::new();
    let hello = pkg("hello", "1.0");
    let mirror = fixture.mirror(&[("sid", hello.clone())]);

    // Left behind by a run that died between extraction and the database insert
    let pkgdir = fixture.pkgdir(&hello);
    fs::create_dir_all(&pkgdir).unwrap();
    fs::write(pkgdir.join("half-written.o"), "junk").unwrap();

    let mut conn = fixture.open_db();
    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract])
        .unwrap();

    assert!(!pkgdir.join("half-written.o").exists());
    let id = Package::find(&conn, "hello", "1.0").unwrap().unwrap().id.unwrap();
    let paths: Vec<String> = SourceFile::find_by_package(&conn, id)
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert!(!paths.contains(&"half-written.o".to_string()));
    assert_eq!(paths.len(), 3);
}

#[test]
fn test_suite_mappings_are_replaced() {
    let fixture = Fixture::new();
    let updater = fixture.updater();
    let mut conn = fixture.open_db();
    let stages = [Stage::Extract, Stage::Suites];

    let before = fixture.mirror(&[("sid", pkg("a", "1")), ("sid", pkg("b", "1"))]);
    updater.run_with_mirror(&mut conn, &before, &stages).unwrap();
    assert_eq!(suite_members(&conn, "sid"), vec!["a/1", "b/1"]);

    let after = fixture.mirror(&[("sid", pkg("b", "1")), ("sid", pkg("c", "1"))]);
    updater.run_with_mirror(&mut conn, &after, &stages).unwrap();
    assert_eq!(suite_members(&conn, "sid"), vec!["b/1", "c/1"]);

    // Still stored until GC decides otherwise
    assert!(Package::find(&conn, "a", "1").unwrap().is_some());
    let info = SuiteInfo::find(&conn, "sid").unwrap().unwrap();
    assert!(!info.sticky);
}

#[test]
fn test_gc_honours_expiry_and_sticky_flag() {
    let mut fixture = Fixture::new();
    fixture.config.expire_days = 14;
    let old = pkg("old", "1");
    let recent = pkg("recent", "1");
    let frozen = pkg("frozen", "1");
    let mut conn = fixture.open_db();

    let everything = fixture.mirror(&[
        ("sid", old.clone()),
        ("sid", recent.clone()),
        ("sid", frozen.clone()),
    ]);
    fixture
        .updater()
        .run_with_mirror(&mut conn, &everything, &[Stage::Extract])
        .unwrap();
    let frozen_id = Package::find(&conn, "frozen", "1").unwrap().unwrap().id.unwrap();
    Package::set_sticky(&conn, frozen_id, true).unwrap();
    age_dir(&fixture.pkgdir(&old), 30);
    age_dir(&fixture.pkgdir(&frozen), 30);

    let empty = fixture.mirror(&[]);
    fixture
        .updater()
        .run_with_mirror(&mut conn, &empty, &[Stage::Gc])
        .unwrap();

    assert!(Package::find(&conn, "old", "1").unwrap().is_none());
    assert!(!fixture.pkgdir(&old).exists());
    assert!(Package::find(&conn, "recent", "1").unwrap().is_some());
    assert!(fixture.pkgdir(&recent).is_dir());
    assert!(Package::find(&conn, "frozen", "1").unwrap().is_some());
    assert!(fixture.pkgdir(&frozen).is_dir());

    fixture.config.expire_days = 0;
    fixture
        .updater()
        .run_with_mirror(&mut conn, &empty, &[Stage::Gc])
        .unwrap();
    assert!(Package::find(&conn, "recent", "1").unwrap().is_none());
    assert!(Package::find(&conn, "frozen", "1").unwrap().is_some());
}

#[test]
fn test_gc_keeps_packages_on_the_mirror() {
    let mut fixture = Fixture::new();
    fixture.config.expire_days = 0;
    let hello = pkg("hello", "1.0");
    let mirror = fixture.mirror(&[("sid", hello.clone())]);
    let mut conn = fixture.open_db();

    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract, Stage::Gc])
        .unwrap();

    assert_eq!(package_count(&conn), 1);
    assert!(fixture.pkgdir(&hello).is_dir());
}

#[test]
fn test_excluded_files_leave_both_storages() {
    let fixture = Fixture::new();
    let hello = pkg("hello", "1.0");
    let other = pkg("other", "1.0");
    let mirror = fixture.mirror(&[("sid", hello.clone()), ("sid", other.clone())]);
    let updater = fixture
        .updater()
        .with_exclude(vec![ExcludeSpec::new("hello", &["README", "debian/*"])]);
    let mut conn = fixture.open_db();

    updater.run_with_mirror(&mut conn, &mirror, &[Stage::Extract]).unwrap();

    let dir = fixture.pkgdir(&hello);
    assert!(!dir.join("README").exists());
    assert!(!dir.join("debian/control").exists());
    assert!(dir.join("src/main.c").is_file());
    assert!(fixture.pkgdir(&other).join("README").is_file());

    let id = Package::find(&conn, "hello", "1.0").unwrap().unwrap().id.unwrap();
    let paths: Vec<String> = SourceFile::find_by_package(&conn, id)
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["src/main.c".to_string()]);
    assert_eq!(count(&conn, &format!("SELECT COUNT(*) FROM checksums WHERE package_id = {id}")), 1);
}

#[test]
fn test_excluded_directory_drops_its_file_rows() {
    let fixture = Fixture::new();
    let hello = pkg("hello", "1.0");
    let mirror = fixture.mirror(&[("sid", hello.clone())]);
    let updater = fixture
        .updater()
        .with_exclude(vec![ExcludeSpec::new("hello", &["debian"])]);
    let mut conn = fixture.open_db();

    updater.run_with_mirror(&mut conn, &mirror, &[Stage::Extract]).unwrap();

    let dir = fixture.pkgdir(&hello);
    assert!(!dir.join("debian").exists());
    assert!(dir.join("README").is_file());

    let id = Package::find(&conn, "hello", "1.0").unwrap().unwrap().id.unwrap();
    let paths: Vec<String> = SourceFile::find_by_package(&conn, id)
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["README".to_string(), "src/main.c".to_string()]);
    assert_eq!(count(&conn, &format!("SELECT COUNT(*) FROM checksums WHERE package_id = {id}")), 2);
}

#[test]
fn test_stats_cache_keys() {
    let fixture = Fixture::new();
    let mirror = fixture.mirror(&[("sid", pkg("hello", "1.0")), ("trixie", pkg("hello", "1.0"))]);
    let mut conn = fixture.open_db();

    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract, Stage::Suites, Stage::Stats])
        .unwrap();

    let stats = cache::load(&fixture.config.stats_cache_path()).unwrap();
    assert_eq!(stats.get("total.source_packages"), Some(&1));
    assert_eq!(stats.get("debian_sid.source_packages"), Some(&1));
    assert_eq!(stats.get("debian_trixie.source_files"), Some(&3));
    let size: i64 = common::FAKE_FILES.iter().map(|(_, c)| c.len() as i64).sum();
    assert_eq!(stats.get("total.disk_usage"), Some(&size));
    assert_eq!(stats.get("total.sloccount.ansic"), Some(&0));
    assert_eq!(stats.get("debian_sid.sloccount"), Some(&0));

    let text = fs::read_to_string(fixture.config.stats_cache_path()).unwrap();
    let expected = format!("debian_sid.disk_usage\t{size}");
    assert!(text.lines().any(|line| line == expected));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM history_size"), 3);
}

#[test]
fn test_stats_keep_keys_of_other_suites() {
    let fixture = Fixture::new();
    let mirror = fixture.mirror(&[("sid", pkg("hello", "1.0"))]);
    let mut conn = fixture.open_db();

    let mut seeded = cache::StatsCache::new();
    seeded.insert("debian_etch.source_packages".to_string(), 10_000);
    seeded.insert("debian_etch.sloccount.ansic".to_string(), 123_456);
    seeded.insert("total.source_packages".to_string(), 99);
    cache::save(&seeded, &fixture.config.stats_cache_path()).unwrap();

    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract, Stage::Suites, Stage::Stats])
        .unwrap();

    let stats = cache::load(&fixture.config.stats_cache_path()).unwrap();
    assert_eq!(stats.get("debian_etch.source_packages"), Some(&10_000));
    assert_eq!(stats.get("debian_etch.sloccount.ansic"), Some(&123_456));
    assert_eq!(stats.get("total.source_packages"), Some(&1));
    assert_eq!(stats.get("debian_sid.source_packages"), Some(&1));
}

#[test]
fn test_dry_run_writes_nothing() {
    let mut fixture = Fixture::new();
    fixture.config.dry_run = true;
    let hello = pkg("hello", "1.0");
    let mirror = fixture.mirror(&[("sid", hello.clone())]);
    let mut conn = fixture.open_db();

    let status = fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &Stage::ALL)
        .unwrap();

    assert_eq!(status.sources.len(), 1);
    assert!(fixture.storage.extracted().is_empty());
    assert!(!fixture.pkgdir(&hello).exists());
    assert_eq!(package_count(&conn), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM history_size"), 0);
    assert!(!fixture.cache_file("sources.txt").exists());
    assert!(!fixture.cache_file("last-update").exists());
    assert!(!fixture.cache_file("stats").exists());
}

#[test]
fn test_db_backend_only() {
    let mut fixture = Fixture::new();
    fixture.config.backends = vec![Backend::Db];
    let hello = pkg("hello", "1.0");
    let mirror = fixture.mirror(&[("sid", hello.clone())]);
    let mut conn = fixture.open_db();

    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract, Stage::Suites])
        .unwrap();

    assert!(!fixture.pkgdir(&hello).exists());
    assert_eq!(package_count(&conn), 1);
    assert_eq!(suite_members(&conn, "sid"), vec!["hello/1.0"]);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM files"), 0);
    assert!(!fixture.cache_file("sources.txt").exists());
}

#[test]
fn test_forced_trigger_replays_observer() {
    let mut fixture = Fixture::new();
    let mirror = fixture.mirror(&[("sid", pkg("hello", "1.0"))]);
    let mut conn = fixture.open_db();

    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract])
        .unwrap();
    conn.execute("DELETE FROM checksums", []).unwrap();
    conn.execute("DELETE FROM metrics", []).unwrap();

    fixture.config.force_triggers = vec!["add-package/checksums".to_string()];
    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &[Stage::Extract])
        .unwrap();

    assert_eq!(fixture.storage.extracted().len(), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM checksums"), 3);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM metrics"), 0);
}

#[test]
fn test_per_package_transactions() {
    let mut fixture = Fixture::new();
    fixture.config.single_transaction = false;
    let mirror = fixture.mirror(&[("sid", pkg("a", "1")), ("sid", pkg("b", "1"))]);
    let mut conn = fixture.open_db();

    fixture.storage.fail_on("a");
    fixture
        .updater()
        .run_with_mirror(&mut conn, &mirror, &Stage::ALL)
        .unwrap();

    assert_eq!(package_count(&conn), 1);
    assert_eq!(suite_members(&conn, "sid"), vec!["b/1"]);
}

#[test]
fn test_second_run_is_locked_out() {
    let fixture = Fixture::new();
    let updater = fixture.updater();

    let _held = updater.lock().unwrap();
    let mut conn = fixture.open_db();
    let err = updater.run(&mut conn, &Stage::ALL).unwrap_err();
    assert!(err.to_string().contains("another update is running"));
}
