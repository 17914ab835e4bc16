//! `/proc` value source for the process collector.
//!
//! Files read per scrape:
//! - limits (`/proc/self/limits`): soft "Max open files" and "Max address space"
//! - stat (`/proc/self/stat`): utime, stime, starttime, vsize
//! - boot stat (`/proc/stat`): `btime`, to turn starttime into epoch seconds
//! - fd dir (`/proc/self/fd`): entry count
//!
//! Limits and the fd dir are required. A missing stat or boot stat only
//! leaves the matching gauges unset.

use std::fs;

use tracing::debug;

use scrapeline_core::{MetricsError, ProcessSnapshot, ProcessSource, Result};

use crate::config::ProcessSection;

/// Clock ticks per second assumed for stat times.
pub const TICKS_PER_SECOND: f64 = 100.0;

const DEFAULT_LIMITS_PATH: &str = "/proc/self/limits";
const DEFAULT_STAT_PATH: &str = "/proc/self/stat";
const DEFAULT_FD_DIR: &str = "/proc/self/fd";
const DEFAULT_BOOT_STAT_PATH: &str = "/proc/stat";

/// One row of the limits table.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitRow {
    pub name: String,
    /// -1 when unlimited.
    pub soft: f64,
    pub hard: f64,
    pub units: Option<String>,
}

/// Fields of the stat line the process gauges need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatFields {
    pub utime: u64,
    pub stime: u64,
    pub starttime: u64,
    pub vsize: u64,
}

fn parse_error(what: &str) -> MetricsError {
    MetricsError::Collect(what.to_string())
}

fn parse_limit_value(s: &str) -> Option<f64> {
    if s == "unlimited" {
        Some(-1.0)
    } else {
        s.parse::<u64>().ok().map(|v| v as f64)
    }
}

/// Parse the limits table. The header line and malformed rows are skipped.
pub fn parse_limits(content: &str) -> Vec<LimitRow> {
    let mut rows = Vec::new();
    for line in content.lines().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first_value) = tokens.iter().position(|t| parse_limit_value(t).is_some()) else {
            continue;
        };
        if first_value == 0 || tokens.len() < first_value + 2 {
            continue;
        }
        let (Some(soft), Some(hard)) = (
            parse_limit_value(tokens[first_value]),
            parse_limit_value(tokens[first_value + 1]),
        ) else {
            continue;
        };
        rows.push(LimitRow {
            name: tokens[..first_value].join(" "),
            soft,
            hard,
            units: tokens.get(first_value + 2).map(|u| u.to_string()),
        });
    }
    rows
}

/// Soft limit of the row called `name`.
pub fn soft_limit(rows: &[LimitRow], name: &str) -> Result<f64> {
    rows.iter()
        .find(|r| r.name == name)
        .map(|r| r.soft)
        .ok_or_else(|| parse_error(&format!("limits: no {name:?} row")))
}

/// Parse a `/proc/<pid>/stat` line. The command name may contain spaces or
/// parentheses, so fields are counted from the last `)`.
pub fn parse_proc_stat(content: &str) -> Result<StatFields> {
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| parse_error("stat: missing ')'"))?;
    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();

    let field = |idx: usize, name: &str| -> Result<u64> {
        fields
            .get(idx)
            .ok_or_else(|| parse_error(&format!("stat: missing {name}")))?
            .parse()
            .map_err(|_| parse_error(&format!("stat: invalid {name}")))
    };

    Ok(StatFields {
        utime: field(11, "utime")?,
        stime: field(12, "stime")?,
        starttime: field(19, "starttime")?,
        vsize: field(20, "vsize")?,
    })
}

/// `btime` (boot time, epoch seconds) from `/proc/stat`.
pub fn parse_boot_time(content: &str) -> Result<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .ok_or_else(|| parse_error("stat: no btime line"))?
        .trim()
        .parse()
        .map_err(|_| parse_error("stat: invalid btime"))
}

/// Number of entries in an fd directory.
pub fn count_fds(dir: &str) -> Result<usize> {
    let entries =
        fs::read_dir(dir).map_err(|e| parse_error(&format!("read {dir} failed: {e}")))?;
    Ok(entries.filter(|e| e.is_ok()).count())
}

/// Reads process figures from procfs on every snapshot.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    limits_path: String,
    stat_path: String,
    fd_dir: String,
    boot_stat_path: String,
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::from_config(&ProcessSection::default())
    }
}

impl ProcfsSource {
    pub fn from_config(cfg: &ProcessSection) -> Self {
        let pick = |v: &Option<String>, d: &str| v.clone().unwrap_or_else(|| d.to_string());
        Self {
            limits_path: pick(&cfg.limits_path, DEFAULT_LIMITS_PATH),
            stat_path: pick(&cfg.stat_path, DEFAULT_STAT_PATH),
            fd_dir: pick(&cfg.fd_dir, DEFAULT_FD_DIR),
            boot_stat_path: pick(&cfg.boot_stat_path, DEFAULT_BOOT_STAT_PATH),
        }
    }

    fn read(path: &str) -> Result<String> {
        fs::read_to_string(path).map_err(|e| parse_error(&format!("read {path} failed: {e}")))
    }

    fn stat(&self) -> Option<StatFields> {
        match Self::read(&self.stat_path).and_then(|s| parse_proc_stat(&s)) {
            Ok(stat) => Some(stat),
            Err(e) => {
                debug!(path = %self.stat_path, error = %e, "process stat unavailable");
                None
            }
        }
    }

    fn boot_time(&self) -> Option<u64> {
        match Self::read(&self.boot_stat_path).and_then(|s| parse_boot_time(&s)) {
            Ok(btime) => Some(btime),
            Err(e) => {
                debug!(path = %self.boot_stat_path, error = %e, "boot time unavailable");
                None
            }
        }
    }
}

impl ProcessSource for ProcfsSource {
    fn snapshot(&self) -> Result<ProcessSnapshot> {
        let limits = parse_limits(&Self::read(&self.limits_path)?);
        let mut snap = ProcessSnapshot {
            max_fds: soft_limit(&limits, "Max open files")?,
            virtual_memory_max_bytes: soft_limit(&limits, "Max address space")?,
            open_fds: count_fds(&self.fd_dir)? as f64,
            ..ProcessSnapshot::default()
        };

        if let Some(stat) = self.stat() {
            snap.cpu_seconds_total = Some((stat.utime + stat.stime) as f64 / TICKS_PER_SECOND);
            snap.virtual_memory_bytes = Some(stat.vsize as f64);
            snap.start_time_seconds = self
                .boot_time()
                .map(|btime| btime as f64 + stat.starttime as f64 / TICKS_PER_SECOND);
        }
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: &str = "\
Limit                     Soft Limit           Hard Limit           Units
Max cpu time              unlimited            unlimited            seconds
Max file size             unlimited            unlimited            bytes
Max open files            1024                 524288               files
Max address space         unlimited            unlimited            bytes
Max realtime timeout      unlimited            unlimited            us
";

    const STAT: &str = "1234 (my (odd) proc) S 1 1234 1234 0 -1 4194560 500 0 0 0 \
250 150 0 0 20 0 4 0 5000 104857600 2000 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";

    #[test]
    fn limits_soft_values() {
        let rows = parse_limits(LIMITS);
        assert_eq!(rows.len(), 5);
        assert_eq!(soft_limit(&rows, "Max open files").unwrap(), 1024.0);
        assert_eq!(soft_limit(&rows, "Max address space").unwrap(), -1.0);
        let rt = rows.iter().find(|r| r.name == "Max realtime timeout").unwrap();
        assert_eq!(rt.units.as_deref(), Some("us"));
        assert!(soft_limit(&rows, "Max nice priority").is_err());
    }

    #[test]
    fn stat_fields_after_comm() {
        let s = parse_proc_stat(STAT).unwrap();
        assert_eq!(s.utime, 250);
        assert_eq!(s.stime, 150);
        assert_eq!(s.starttime, 5000);
        assert_eq!(s.vsize, 104_857_600);
        assert!(parse_proc_stat("1234 (x) S 1").is_err());
        assert!(parse_proc_stat("no parens").is_err());
    }

    #[test]
    fn boot_time_line() {
        let s = "cpu  1 2 3 4\nintr 0\nbtime 1700000000\nprocesses 10\n";
        assert_eq!(parse_boot_time(s).unwrap(), 1_700_000_000);
        assert!(parse_boot_time("cpu 1 2\n").is_err());
    }

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("scrapeline-procfs-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("fd")).unwrap();
        dir
    }

    fn source_for(dir: &std::path::Path) -> ProcfsSource {
        let path = |name: &str| Some(dir.join(name).to_string_lossy().into_owned());
        ProcfsSource::from_config(&ProcessSection {
            limits_path: path("limits"),
            stat_path: path("stat"),
            fd_dir: path("fd"),
            boot_stat_path: path("boot_stat"),
        })
    }

    #[test]
    fn snapshot_from_files() {
        let dir = scratch_dir("full");
        fs::write(dir.join("limits"), LIMITS).unwrap();
        fs::write(dir.join("stat"), STAT).unwrap();
        fs::write(dir.join("boot_stat"), "btime 1700000000\n").unwrap();
        for i in 0..3 {
            fs::write(dir.join("fd").join(i.to_string()), "").unwrap();
        }

        let snap = source_for(&dir).snapshot().unwrap();
        assert_eq!(snap.max_fds, 1024.0);
        assert_eq!(snap.virtual_memory_max_bytes, -1.0);
        assert_eq!(snap.open_fds, 3.0);
        assert_eq!(snap.cpu_seconds_total, Some(4.0));
        assert_eq!(snap.virtual_memory_bytes, Some(104_857_600.0));
        assert_eq!(snap.start_time_seconds, Some(1_700_000_050.0));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_stat_is_tolerated_missing_limits_is_not() {
        let dir = scratch_dir("partial");
        fs::write(dir.join("limits"), LIMITS).unwrap();
        let snap = source_for(&dir).snapshot().unwrap();
        assert_eq!(snap.max_fds, 1024.0);
        assert_eq!(snap.cpu_seconds_total, None);
        assert_eq!(snap.start_time_seconds, None);

        fs::remove_file(dir.join("limits")).unwrap();
        assert!(matches!(
            source_for(&dir).snapshot().unwrap_err(),
            MetricsError::Collect(_)
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
