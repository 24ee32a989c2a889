// src/pipeline/charts.rs

//! Charts stage: render history charts into `<cache_dir>/stats`
//!
//! File names are `<suite>-<metric>-<interval>.<ext>` for size metrics,
//! `<suite>-sloc-<interval>.<ext>` for the language history and
//! `<suite>-sloc_pie-current.<ext>` for the current language split.
//! `ALL` stands for the whole archive.

use super::Updater;
use super::stats::target_suites;
use crate::db::models::ALL_SUITES;
use crate::error::Result;
use crate::statistics::{self, INTERVALS, SIZE_METRICS};
use rusqlite::Connection;
use std::fs;
use tracing::{debug, info};

/// Fetch every history series and render it
///
/// In a dry run the series are still read, but nothing is rendered.
pub fn run(updater: &Updater, conn: &Connection, suites: Option<&[String]>) -> Result<()> {
    info!("update charts...");
    let render = !updater.context().is_dry_run();

    let dir = updater.config().charts_dir();
    if render {
        fs::create_dir_all(&dir)?;
    }
    let renderer = updater.renderer();
    let ext = renderer.extension();

    let suites = target_suites(conn, suites)?;
    let mut charts = 0usize;
    for suite in suites.iter().map(String::as_str).chain([ALL_SUITES]) {
        for interval in &INTERVALS {
            for metric in SIZE_METRICS {
                let series = statistics::history_size(conn, metric, interval, suite)?;
                if render {
                    let path = dir.join(format!("{suite}-{metric}-{}.{ext}", interval.label));
                    renderer.size_plot(&series, &path)?;
                }
                charts += 1;
            }

            let series = statistics::history_sloc(conn, interval, suite)?;
            if render {
                let path = dir.join(format!("{suite}-sloc-{}.{ext}", interval.label));
                renderer.sloc_plot(&series, &path)?;
            }
            charts += 1;
        }

        let scope = (suite != ALL_SUITES).then_some(suite);
        let slocs = statistics::sloccount_summary(conn, scope)?;
        if render {
            renderer.sloc_pie(&slocs, &dir.join(format!("{suite}-sloc_pie-current.{ext}")))?;
        }
        charts += 1;
    }

    if render {
        debug!("rendered {} charts in {}", charts, dir.display());
    } else {
        debug!("dry run, fetched {} chart series without rendering", charts);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartRenderer;
    use crate::config::Config;
    use crate::statistics::Sample;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<PathBuf>>>);

    impl ChartRenderer for Recorder {
        fn extension(&self) -> &str {
            "svg"
        }

        fn size_plot(&self, _series: &[Sample], path: &Path) -> Result<()> {
            self.0.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn sloc_plot(&self, _series: &BTreeMap<String, Vec<Sample>>, path: &Path) -> Result<()> {
            self.0.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn sloc_pie(&self, _slocs: &BTreeMap<String, i64>, path: &Path) -> Result<()> {
            self.0.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn updater(root: &Path, dry_run: bool, recorder: &Recorder) -> Updater {
        let mut config = Config::new(&root.join("mirror"), &root.join("sources"), &root.join("cache"));
        config.dry_run = dry_run;
        Updater::new(config).unwrap().with_renderer(recorder.clone())
    }

    #[test]
    fn test_renders_every_chart_for_each_suite() {
        let temp = tempfile::tempdir().unwrap();
        let conn = crate::db::open_in_memory().unwrap();
        let recorder = Recorder::default();

        let only = ["sid".to_string()];
        run(&updater(temp.path(), false, &recorder), &conn, Some(only.as_slice())).unwrap();

        let per_suite = INTERVALS.len() * (SIZE_METRICS.len() + 1) + 1;
        assert_eq!(recorder.0.borrow().len(), 2 * per_suite);
        assert!(recorder.0.borrow().iter().any(|p| p.ends_with("ALL-sloc_pie-current.svg")));
        assert!(temp.path().join("cache/stats").is_dir());
    }

    #[test]
    fn test_dry_run_reads_series_without_rendering() {
        let temp = tempfile::tempdir().unwrap();
        let conn = crate::db::open_in_memory().unwrap();
        let recorder = Recorder::default();
        let updater = updater(temp.path(), true, &recorder);

        run(&updater, &conn, None).unwrap();
        assert!(recorder.0.borrow().is_empty());
        assert!(!temp.path().join("cache/stats").exists());

        // A corrupt history row still surfaces, so the series were fetched
        conn.execute(
            "INSERT INTO history_size (timestamp, suite, source_packages) VALUES ('9999-bad', 'ALL', 1)",
            [],
        )
        .unwrap();
        assert!(run(&updater, &conn, None).is_err());
        assert!(recorder.0.borrow().is_empty());
    }
}
