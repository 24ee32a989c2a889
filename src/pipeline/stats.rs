// src/pipeline/stats.rs

//! Stats stage: refresh the statistics cache and append history rows

use super::Updater;
use crate::context::Backend;
use crate::db::{
    self,
    models::{ALL_SUITES, HistorySize, HistorySlocCount},
};
use crate::error::Result;
use crate::statistics::{
    self, SIZE_METRICS,
    cache::{self, StatsCache, TOTAL_SCOPE, suite_scope},
};
use chrono::Utc;
use rusqlite::Connection;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Recompute statistics for `suites` (all non-sticky suites by default)
///
/// Returns the updated cache. Keys of suites not recomputed this time are
/// carried over from the cache on disk.
pub fn run(
    updater: &Updater,
    conn: &mut Connection,
    suites: Option<&[String]>,
) -> Result<StatsCache> {
    info!("update statistics...");
    let ctx = updater.context();
    let suites = target_suites(conn, suites)?;
    let cache_path = updater.config().stats_cache_path();

    let mut stats = cache::load(&cache_path)?;
    cache::merge(&mut stats, compute(conn, &suites)?);

    if ctx.should_write(Backend::Db) {
        let now = Utc::now();
        db::transaction(conn, |tx| {
            let scopes = std::iter::once((ALL_SUITES, TOTAL_SCOPE.to_string()))
                .chain(suites.iter().map(|s| (s.as_str(), suite_scope(s))));
            for (suite, scope) in scopes {
                let mut size = HistorySize::new(suite, now);
                for metric in SIZE_METRICS {
                    size.set(metric, value(&stats, &format!("{scope}.{metric}")));
                }
                size.insert(tx)?;

                let mut sloc = HistorySlocCount::new(suite, now);
                for lang in statistics::SLOCCOUNT_LANGUAGES {
                    let count = value(&stats, &format!("{scope}.sloccount.{lang}"));
                    sloc.counts.insert(lang.to_string(), count);
                }
                sloc.insert(tx)?;
            }
            Ok(())
        })?;
        debug!("stored history for {} suites", suites.len() + 1);
    }

    if ctx.should_write(Backend::Fs) {
        updater.ensure_cache_dir()?;
        cache::save(&stats, &cache_path)?;
    }
    Ok(stats)
}

/// `suites` when given, else every mapped suite that is not sticky
pub(crate) fn target_suites(conn: &Connection, suites: Option<&[String]>) -> Result<Vec<String>> {
    if let Some(suites) = suites {
        return Ok(suites.to_vec());
    }
    let sticky: BTreeSet<String> = statistics::sticky_suites(conn)?.into_iter().collect();
    Ok(statistics::suites(conn)?
        .into_iter()
        .filter(|suite| !sticky.contains(suite))
        .collect())
}

/// Current statistics for the whole archive and for each of `suites`
fn compute(conn: &Connection, suites: &[String]) -> Result<StatsCache> {
    let mut stats = StatsCache::new();
    let scopes = std::iter::once((TOTAL_SCOPE.to_string(), None))
        .chain(suites.iter().map(|s| (suite_scope(s), Some(s.as_str()))));

    for (scope, suite) in scopes {
        for metric in SIZE_METRICS {
            let value = statistics::size_metric(conn, metric, suite)?;
            stats.insert(format!("{scope}.{metric}"), value);
        }

        let slocs = statistics::sloccount_summary(conn, suite)?;
        stats.insert(format!("{scope}.sloccount"), slocs.values().sum());
        for (lang, count) in slocs {
            stats.insert(format!("{scope}.sloccount.{lang}"), count);
        }
    }
    Ok(stats)
}

fn value(stats: &StatsCache, key: &str) -> i64 {
    stats.get(key).copied().unwrap_or(0)
}
