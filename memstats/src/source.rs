//! Snapshot sources
//!
//! Reading process statistics touches several files under `/proc` and
//! issues a `getrusage` syscall, so callers throttle how often it runs.

use std::time::Instant;

use crate::alloc::ALLOC_STATS;
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;

/// Something that can produce a fresh [`Snapshot`]
pub trait StatsSource: Send + 'static {
    fn read(&mut self) -> Result<Snapshot>;
}

impl<F> StatsSource for F
where
    F: FnMut() -> Result<Snapshot> + Send + 'static,
{
    fn read(&mut self) -> Result<Snapshot> {
        self()
    }
}

/// Statistics of the current process
pub struct ProcessStats {
    started: Instant,
    cpu_baseline_ns: u64,
    parallelism: f64,
}

impl ProcessStats {
    pub fn new() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as f64;
        let cpu_baseline_ns = rusage()
            .map(|r| r.user_ns + r.system_ns)
            .unwrap_or(0);
        Self {
            started: Instant::now(),
            cpu_baseline_ns,
            parallelism,
        }
    }
}

impl Default for ProcessStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSource for ProcessStats {
    fn read(&mut self) -> Result<Snapshot> {
        let mut snapshot = Snapshot {
            alloc: ALLOC_STATS.snapshot(),
            ..Snapshot::default()
        };

        let statm = statm()?;
        snapshot.virtual_bytes = statm.size;
        snapshot.resident_bytes = statm.resident;
        snapshot.shared_bytes = statm.shared;
        snapshot.text_bytes = statm.text;
        snapshot.data_bytes = statm.data;

        if let Some(usage) = rusage() {
            snapshot.max_resident_bytes = usage.max_resident_bytes;
            snapshot.minor_faults = usage.minor_faults;
            snapshot.major_faults = usage.major_faults;
            snapshot.voluntary_ctx_switches = usage.voluntary_ctx_switches;
            snapshot.involuntary_ctx_switches = usage.involuntary_ctx_switches;
            snapshot.block_reads = usage.block_reads;
            snapshot.block_writes = usage.block_writes;
            snapshot.cpu_user_ns = usage.user_ns;
            snapshot.cpu_system_ns = usage.system_ns;
            snapshot.cpu_fraction = cpu_fraction(
                (usage.user_ns + usage.system_ns).saturating_sub(self.cpu_baseline_ns),
                self.started.elapsed().as_nanos() as f64,
                self.parallelism,
            );
        }

        snapshot.threads = count_dir_entries("/proc/self/task")?;
        snapshot.open_fds = count_dir_entries("/proc/self/fd")?;

        Ok(snapshot)
    }
}

pub(crate) fn cpu_fraction(cpu_ns: u64, elapsed_ns: f64, parallelism: f64) -> f64 {
    let available = elapsed_ns * parallelism;
    if available <= 0.0 {
        return 0.0;
    }
    (cpu_ns as f64 / available).clamp(0.0, 1.0)
}

/// Values of `/proc/self/statm`, converted to bytes
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Statm {
    pub size: u64,
    pub resident: u64,
    pub shared: u64,
    pub text: u64,
    pub data: u64,
}

const STATM_PATH: &str = "/proc/self/statm";

#[cfg(target_os = "linux")]
fn statm() -> Result<Statm> {
    let contents = std::fs::read_to_string(STATM_PATH).map_err(|source| Error::Read {
        path: STATM_PATH,
        source,
    })?;
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    parse_statm(&contents, page_size.max(1) as u64)
}

#[cfg(not(target_os = "linux"))]
fn statm() -> Result<Statm> {
    Ok(Statm::default())
}

/// Format: size resident shared text lib data dt, all in pages
pub(crate) fn parse_statm(contents: &str, page_size: u64) -> Result<Statm> {
    let pages = contents
        .split_whitespace()
        .map(|field| field.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Parse {
            path: STATM_PATH,
            reason: e.to_string(),
        })?;

    if pages.len() < 6 {
        return Err(Error::Parse {
            path: STATM_PATH,
            reason: format!("expected at least 6 fields, got {}", pages.len()),
        });
    }

    Ok(Statm {
        size: pages[0] * page_size,
        resident: pages[1] * page_size,
        shared: pages[2] * page_size,
        text: pages[3] * page_size,
        data: pages[5] * page_size,
    })
}

#[derive(Debug, Default)]
struct Rusage {
    max_resident_bytes: u64,
    minor_faults: u64,
    major_faults: u64,
    voluntary_ctx_switches: u64,
    involuntary_ctx_switches: u64,
    block_reads: u64,
    block_writes: u64,
    user_ns: u64,
    system_ns: u64,
}

#[cfg(unix)]
fn rusage() -> Option<Rusage> {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
        return None;
    }

    // ru_maxrss is kilobytes on Linux and bytes on macOS
    #[cfg(target_os = "macos")]
    let max_resident_bytes = usage.ru_maxrss as u64;
    #[cfg(not(target_os = "macos"))]
    let max_resident_bytes = usage.ru_maxrss as u64 * 1024;

    Some(Rusage {
        max_resident_bytes,
        minor_faults: usage.ru_minflt as u64,
        major_faults: usage.ru_majflt as u64,
        voluntary_ctx_switches: usage.ru_nvcsw as u64,
        involuntary_ctx_switches: usage.ru_nivcsw as u64,
        block_reads: usage.ru_inblock as u64,
        block_writes: usage.ru_oublock as u64,
        user_ns: timeval_ns(usage.ru_utime),
        system_ns: timeval_ns(usage.ru_stime),
    })
}

#[cfg(not(unix))]
fn rusage() -> Option<Rusage> {
    None
}

#[cfg(unix)]
fn timeval_ns(tv: libc::timeval) -> u64 {
    tv.tv_sec as u64 * 1_000_000_000 + tv.tv_usec as u64 * 1_000
}

#[cfg(target_os = "linux")]
fn count_dir_entries(path: &'static str) -> Result<u64> {
    let entries = std::fs::read_dir(path).map_err(|source| Error::Read { path, source })?;
    Ok(entries.count() as u64)
}

#[cfg(not(target_os = "linux"))]
fn count_dir_entries(_path: &'static str) -> Result<u64> {
    Ok(0)
}
