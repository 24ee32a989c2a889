// src/statistics/mod.rs

//! Aggregate statistics over the package database
//!
//! Every query takes an optional suite filter; `None` means the whole
//! archive. History queries sample the append-only history tables down to
//! one point (the latest) per hour, day, week or month.

pub mod cache;

use crate::db::models::{SuiteInfo, SuiteMapping, TIMESTAMP_FORMAT};
use crate::error::{Error, Result};
use chrono::{DateTime, Months, NaiveDateTime, Utc};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;
use tracing::debug;

/// Languages tracked in sloccount breakdowns
pub const SLOCCOUNT_LANGUAGES: &[&str] = &[
    "ada", "ansic", "asm", "awk", "cobol", "cpp", "cs", "csh", "erlang", "exp", "f90", "fortran",
    "haskell", "java", "jsp", "lex", "lisp", "makefile", "ml", "modula3", "objc", "pascal",
    "perl", "php", "python", "ruby", "sed", "sh", "sql", "tcl", "vhdl", "xml", "yacc",
];

/// Size metrics recorded in `history_size`, in chart order
pub const SIZE_METRICS: &[&str] = &["source_packages", "disk_usage", "source_files", "ctags"];

/// Sampling resolution of a history series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// strftime pattern naming the bucket a timestamp falls in
    fn bucket_format(&self) -> &'static str {
        match self {
            Granularity::Hourly => "%Y-%m-%d %H",
            Granularity::Daily => "%Y-%m-%d",
            Granularity::Weekly => "%G-W%V",
            Granularity::Monthly => "%Y-%m",
        }
    }
}

/// A chart time window and the resolution it is sampled at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Used in chart file names
    pub label: &'static str,
    pub months: u32,
    pub granularity: Granularity,
}

pub const INTERVALS: [Interval; 4] = [
    Interval {
        label: "1-month",
        months: 1,
        granularity: Granularity::Hourly,
    },
    Interval {
        label: "1-year",
        months: 12,
        granularity: Granularity::Daily,
    },
    Interval {
        label: "5-years",
        months: 60,
        granularity: Granularity::Weekly,
    },
    Interval {
        label: "20-years",
        months: 240,
        granularity: Granularity::Monthly,
    },
];

impl Interval {
    /// Oldest timestamp inside this window, counting back from `now`
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// One point of a time series
pub type Sample = (DateTime<Utc>, i64);

/// Suites with at least one package mapped, sorted
pub fn suites(conn: &Connection) -> Result<Vec<String>> {
    SuiteMapping::distinct_suites(conn)
}

/// Suites flagged sticky (archived releases)
pub fn sticky_suites(conn: &Connection) -> Result<Vec<String>> {
    SuiteInfo::sticky_suites(conn)
}

fn scalar(conn: &Connection, sql: &str, suite: Option<&str>) -> Result<i64> {
    let value: Option<i64> = match suite {
        Some(suite) => conn.query_row(sql, [suite], |row| row.get(0))?,
        None => conn.query_row(sql, [], |row| row.get(0))?,
    };
    Ok(value.unwrap_or(0))
}

/// Disk usage in bytes, from the per-package `size` metric
pub fn disk_usage(conn: &Connection, suite: Option<&str>) -> Result<i64> {
    let sql = match suite {
        Some(_) => {
            "SELECT SUM(m.value) FROM metrics m
             JOIN suites s ON s.package_id = m.package_id
             WHERE m.metric = 'size' AND s.suite = ?1"
        }
        None => "SELECT SUM(value) FROM metrics WHERE metric = 'size'",
    };
    scalar(conn, sql, suite)
}

/// Number of source packages (name, version)
pub fn source_packages(conn: &Connection, suite: Option<&str>) -> Result<i64> {
    let sql = match suite {
        Some(_) => "SELECT COUNT(*) FROM suites WHERE suite = ?1",
        None => "SELECT COUNT(*) FROM packages",
    };
    scalar(conn, sql, suite)
}

/// Number of source files
pub fn source_files(conn: &Connection, suite: Option<&str>) -> Result<i64> {
    let sql = match suite {
        Some(_) => {
            "SELECT COUNT(*) FROM files f
             JOIN suites s ON s.package_id = f.package_id
             WHERE s.suite = ?1"
        }
        None => "SELECT COUNT(*) FROM files",
    };
    scalar(conn, sql, suite)
}

/// Number of ctags
pub fn ctags(conn: &Connection, suite: Option<&str>) -> Result<i64> {
    let sql = match suite {
        Some(_) => {
            "SELECT COUNT(*) FROM ctags c
             JOIN suites s ON s.package_id = c.package_id
             WHERE s.suite = ?1"
        }
        None => "SELECT COUNT(*) FROM ctags",
    };
    scalar(conn, sql, suite)
}

/// Size metric by name (one of [`SIZE_METRICS`])
pub fn size_metric(conn: &Connection, metric: &str, suite: Option<&str>) -> Result<i64> {
    match metric {
        "source_packages" => source_packages(conn, suite),
        "disk_usage" => disk_usage(conn, suite),
        "source_files" => source_files(conn, suite),
        "ctags" => ctags(conn, suite),
        _ => Err(Error::NotFoundError(format!("unknown size metric: {metric}"))),
    }
}

/// Lines of code per language
///
/// Every language of [`SLOCCOUNT_LANGUAGES`] is present, zero when no
/// package has code in it. Other languages are left out.
pub fn sloccount_summary(conn: &Connection, suite: Option<&str>) -> Result<BTreeMap<String, i64>> {
    let mut summary: BTreeMap<String, i64> = SLOCCOUNT_LANGUAGES
        .iter()
        .map(|lang| (lang.to_string(), 0))
        .collect();

    let (sql, args): (&str, Vec<&str>) = match suite {
        Some(suite) => (
            "SELECT l.language, SUM(l.count) FROM sloccounts l
             JOIN suites s ON s.package_id = l.package_id
             WHERE s.suite = ?1 GROUP BY l.language",
            vec![suite],
        ),
        None => (
            "SELECT language, SUM(count) FROM sloccounts GROUP BY language",
            vec![],
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (language, count) = row?;
        match summary.get_mut(&language) {
            Some(total) => *total = count,
            None => debug!("ignoring {} lines of untracked language {}", count, language),
        }
    }

    Ok(summary)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::ParseError(format!("bad history timestamp '{}': {}", text, e)))
}

/// Keep the latest point of each bucket, oldest bucket first
fn sample<T>(points: Vec<(DateTime<Utc>, T)>, granularity: Granularity) -> Vec<(DateTime<Utc>, T)> {
    let mut buckets: BTreeMap<String, (DateTime<Utc>, T)> = BTreeMap::new();
    for (timestamp, value) in points {
        let key = timestamp.format(granularity.bucket_format()).to_string();
        match buckets.get(&key) {
            Some((existing, _)) if *existing >= timestamp => {}
            _ => {
                buckets.insert(key, (timestamp, value));
            }
        }
    }

    let mut series: Vec<_> = buckets.into_values().collect();
    series.sort_by_key(|(timestamp, _)| *timestamp);
    series
}

/// Sampled history of a size metric for `suite` (`"ALL"` for the aggregate)
pub fn history_size(
    conn: &Connection,
    metric: &str,
    interval: &Interval,
    suite: &str,
) -> Result<Vec<Sample>> {
    if !SIZE_METRICS.contains(&metric) {
        return Err(Error::NotFoundError(format!("unknown size metric: {metric}")));
    }
    debug!("Sampling {} history of {} for {}", interval.label, metric, suite);

    let since = interval.start(Utc::now()).format(TIMESTAMP_FORMAT).to_string();
    let mut stmt = conn.prepare(&format!(
        "SELECT timestamp, {metric} FROM history_size
         WHERE suite = ?1 AND timestamp >= ?2 ORDER BY timestamp"
    ))?;

    let mut points = Vec::new();
    let rows = stmt.query_map(params![suite, since], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
    })?;
    for row in rows {
        let (timestamp, value) = row?;
        points.push((parse_timestamp(&timestamp)?, value.unwrap_or(0)));
    }

    Ok(sample(points, interval.granularity))
}

/// Sampled per-language history for `suite` (`"ALL"` for the aggregate)
///
/// Maps each language of [`SLOCCOUNT_LANGUAGES`] to its time series; all
/// series share the same timestamps.
pub fn history_sloc(
    conn: &Connection,
    interval: &Interval,
    suite: &str,
) -> Result<BTreeMap<String, Vec<Sample>>> {
    debug!("Sampling {} sloccount history for {}", interval.label, suite);

    let since = interval.start(Utc::now()).format(TIMESTAMP_FORMAT).to_string();
    let mut stmt = conn.prepare(
        "SELECT timestamp, language, count FROM history_sloccount
         WHERE suite = ?1 AND timestamp >= ?2 ORDER BY timestamp",
    )?;

    let mut snapshots: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    let rows = stmt.query_map(params![suite, since], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (timestamp, language, count) = row?;
        snapshots.entry(timestamp).or_default().insert(language, count);
    }

    let mut points = Vec::with_capacity(snapshots.len());
    for (timestamp, counts) in snapshots {
        points.push((parse_timestamp(&timestamp)?, counts));
    }

    let mut series: BTreeMap<String, Vec<Sample>> = SLOCCOUNT_LANGUAGES
        .iter()
        .map(|lang| (lang.to_string(), Vec::new()))
        .collect();
    for (timestamp, counts) in sample(points, interval.granularity) {
        for (lang, points) in series.iter_mut() {
            points.push((timestamp, counts.get(lang).copied().unwrap_or(0)));
        }
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::{Ctag, HistorySize, Metric, Package, SlocCount, SourceFile};
    use chrono::{Duration, TimeZone};

    fn add(conn: &Connection, name: &str, suite: &str, size: i64, ansic: i64) -> i64 {
        let mut pkg = Package::new(name.to_string(), "1".to_string(), "main".to_string());
        let id = pkg.insert(conn).unwrap();
        SuiteMapping::new(id, suite.to_string()).insert(conn).unwrap();
        Metric::new(id, "size", size).upsert(conn).unwrap();
        SlocCount::new(id, "ansic", ansic).insert(conn).unwrap();
        let file_id = SourceFile::new(id, "main.c".to_string()).insert(conn).unwrap();
        Ctag {
            package_id: id,
            file_id,
            tag: "main".to_string(),
            line: 1,
            kind: Some("f".to_string()),
            language: Some("C".to_string()),
        }
        .insert(conn)
        .unwrap();
        id
    }

    #[test]
    fn test_aggregates_with_suite_filter() {
        let conn = db::open_in_memory().unwrap();
        add(&conn, "a", "sid", 100, 10);
        add(&conn, "b", "sid", 50, 5);
        add(&conn, "c", "bookworm", 7, 1);

        assert_eq!(disk_usage(&conn, None).unwrap(), 157);
        assert_eq!(disk_usage(&conn, Some("sid")).unwrap(), 150);
        assert_eq!(disk_usage(&conn, Some("buster")).unwrap(), 0);
        assert_eq!(source_packages(&conn, None).unwrap(), 3);
        assert_eq!(source_packages(&conn, Some("bookworm")).unwrap(), 1);
        assert_eq!(source_files(&conn, Some("sid")).unwrap(), 2);
        assert_eq!(ctags(&conn, None).unwrap(), 3);
        assert_eq!(suites(&conn).unwrap(), vec!["bookworm", "sid"]);
    }

    #[test]
    fn test_sloccount_summary_zero_fills() {
        let conn = db::open_in_memory().unwrap();
        add(&conn, "a", "sid", 1, 10);
        add(&conn, "b", "sid", 1, 5);

        let summary = sloccount_summary(&conn, Some("sid")).unwrap();
        assert_eq!(summary.len(), SLOCCOUNT_LANGUAGES.len());
        assert_eq!(summary["ansic"], 15);
        assert_eq!(summary["python"], 0);
    }

    #[test]
    fn test_sloccount_summary_ignores_untracked_languages() {
        let conn = db::open_in_memory().unwrap();
        let id = add(&conn, "a", "sid", 1, 10);
        SlocCount::new(id, "rust", 500).insert(&conn).unwrap();

        let summary = sloccount_summary(&conn, None).unwrap();
        assert!(!summary.contains_key("rust"));
        assert_eq!(summary.values().sum::<i64>(), 10);
    }

    #[test]
    fn test_sample_keeps_latest_per_bucket() {
        let t = |h, m| Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap();
        let points = vec![(t(10, 5), 1), (t(10, 50), 2), (t(11, 0), 3), (t(9, 0), 0)];

        assert_eq!(
            sample(points.clone(), Granularity::Hourly),
            vec![(t(9, 0), 0), (t(10, 50), 2), (t(11, 0), 3)]
        );
        assert_eq!(sample(points, Granularity::Daily), vec![(t(11, 0), 3)]);
    }

    #[test]
    fn test_history_size_window() {
        let conn = db::open_in_memory().unwrap();
        let now = Utc::now();

        let mut recent = HistorySize::new("ALL", now - Duration::hours(2));
        recent.disk_usage = 42;
        recent.insert(&conn).unwrap();
        let mut old = HistorySize::new("ALL", now - Duration::days(90));
        old.disk_usage = 7;
        old.insert(&conn).unwrap();

        let month = history_size(&conn, "disk_usage", &INTERVALS[0], "ALL").unwrap();
        assert_eq!(month.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![42]);

        let year = history_size(&conn, "disk_usage", &INTERVALS[1], "ALL").unwrap();
        assert_eq!(year.len(), 2);

        assert!(history_size(&conn, "bogus; DROP TABLE packages", &INTERVALS[0], "ALL").is_err());
    }

    #[test]
    fn test_history_sloc_series_per_language() {
        let conn = db::open_in_memory().unwrap();
        let mut snapshot = crate::db::models::HistorySlocCount::new("sid", Utc::now());
        snapshot.counts.insert("ansic".to_string(), 12);
        snapshot.counts.insert("python".to_string(), 3);
        snapshot.insert(&conn).unwrap();

        let series = history_sloc(&conn, &INTERVALS[0], "sid").unwrap();
        assert_eq!(series.len(), SLOCCOUNT_LANGUAGES.len());
        assert_eq!(series["ansic"][0].1, 12);
        assert_eq!(series["perl"][0].1, 0);
    }
}
