//! One sample of process runtime statistics

use crate::alloc::AllocSnapshot;

/// Process runtime statistics captured by a single [`StatsSource::read`]
///
/// [`StatsSource::read`]: crate::StatsSource::read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Heap accounting from [`CountingAllocator`](crate::CountingAllocator)
    pub alloc: AllocSnapshot,

    // Memory layout, bytes
    pub virtual_bytes: u64,
    pub resident_bytes: u64,
    pub shared_bytes: u64,
    pub text_bytes: u64,
    pub data_bytes: u64,
    pub max_resident_bytes: u64,

    // Kernel accounting
    pub minor_faults: u64,
    pub major_faults: u64,
    pub voluntary_ctx_switches: u64,
    pub involuntary_ctx_switches: u64,
    pub block_reads: u64,
    pub block_writes: u64,

    // CPU
    pub cpu_user_ns: u64,
    pub cpu_system_ns: u64,
    /// Share of available CPU used since sampling began, in `[0, 1]`
    pub cpu_fraction: f64,

    pub threads: u64,
    pub open_fds: u64,
}
