//! Instrument table
//!
//! Every published instrument maps to exactly one field of a [`Snapshot`].

use crate::reporter::{Kind, Unit, Value, ValueType};
use crate::snapshot::Snapshot;

/// Static half of an instrument: name suffix, metadata and accessor
pub(crate) struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: Unit,
    pub kind: Kind,
    pub value_type: ValueType,
    pub read: fn(&Snapshot) -> Value,
}

macro_rules! int_field {
    ($name:literal, $unit:ident, $kind:ident, $desc:literal, |$s:ident| $e:expr) => {
        Field {
            name: $name,
            description: $desc,
            unit: Unit::$unit,
            kind: Kind::$kind,
            value_type: ValueType::Int,
            read: |$s: &Snapshot| Value::from_u64($e),
        }
    };
}

/// Base set, emitted on every observation cycle from the cached snapshot
pub(crate) const BASE: &[Field] = &[
    int_field!(
        "runtime.mem.heap_alloc",
        Bytes,
        Gauge,
        "Bytes of live heap allocations.",
        |s| s.alloc.live_bytes()
    ),
    int_field!(
        "runtime.mem.total_alloc",
        Bytes,
        Cumulative,
        "Cumulative bytes allocated on the heap.",
        |s| s.alloc.bytes_allocated
    ),
    int_field!(
        "runtime.mem.total_freed",
        Bytes,
        Cumulative,
        "Cumulative bytes returned to the allocator.",
        |s| s.alloc.bytes_freed
    ),
    int_field!(
        "runtime.mem.mallocs",
        Count,
        Cumulative,
        "Cumulative count of heap allocations.",
        |s| s.alloc.allocs
    ),
    int_field!(
        "runtime.mem.frees",
        Count,
        Cumulative,
        "Cumulative count of heap deallocations.",
        |s| s.alloc.frees
    ),
    int_field!(
        "runtime.mem.reallocs",
        Count,
        Cumulative,
        "Cumulative count of heap reallocations.",
        |s| s.alloc.reallocs
    ),
    int_field!(
        "runtime.mem.heap_objects",
        Count,
        Gauge,
        "Number of live heap allocations.",
        |s| s.alloc.live_objects()
    ),
    int_field!(
        "runtime.mem.heap_peak",
        Bytes,
        Gauge,
        "Highest observed number of live heap bytes.",
        |s| s.alloc.peak_live_bytes
    ),
    int_field!(
        "runtime.mem.virtual",
        Bytes,
        Gauge,
        "Virtual memory size of the process.",
        |s| s.virtual_bytes
    ),
    int_field!(
        "runtime.mem.resident",
        Bytes,
        Gauge,
        "Resident set size of the process.",
        |s| s.resident_bytes
    ),
    int_field!(
        "runtime.mem.shared",
        Bytes,
        Gauge,
        "Resident bytes backed by shared mappings.",
        |s| s.shared_bytes
    ),
    int_field!(
        "runtime.mem.text",
        Bytes,
        Gauge,
        "Bytes of the text (code) segment.",
        |s| s.text_bytes
    ),
    int_field!(
        "runtime.mem.data",
        Bytes,
        Gauge,
        "Bytes of the data and stack segments.",
        |s| s.data_bytes
    ),
    int_field!(
        "runtime.mem.max_resident",
        Bytes,
        Gauge,
        "Peak resident set size of the process.",
        |s| s.max_resident_bytes
    ),
    int_field!(
        "runtime.os.minor_faults",
        Count,
        Cumulative,
        "Page faults serviced without I/O.",
        |s| s.minor_faults
    ),
    int_field!(
        "runtime.os.major_faults",
        Count,
        Cumulative,
        "Page faults that required I/O.",
        |s| s.major_faults
    ),
    int_field!(
        "runtime.os.voluntary_ctx_switches",
        Count,
        Cumulative,
        "Context switches where the process yielded the CPU.",
        |s| s.voluntary_ctx_switches
    ),
    int_field!(
        "runtime.os.involuntary_ctx_switches",
        Count,
        Cumulative,
        "Context switches forced by the scheduler.",
        |s| s.involuntary_ctx_switches
    ),
    int_field!(
        "runtime.os.block_reads",
        Count,
        Cumulative,
        "Block input operations.",
        |s| s.block_reads
    ),
    int_field!(
        "runtime.os.block_writes",
        Count,
        Cumulative,
        "Block output operations.",
        |s| s.block_writes
    ),
    int_field!(
        "runtime.cpu.user_ns",
        Nanoseconds,
        Cumulative,
        "CPU time spent in user mode.",
        |s| s.cpu_user_ns
    ),
    int_field!(
        "runtime.cpu.system_ns",
        Nanoseconds,
        Cumulative,
        "CPU time spent in kernel mode.",
        |s| s.cpu_system_ns
    ),
    Field {
        name: "runtime.cpu.fraction",
        description: "Fraction of available CPU time used by the process since sampling began.",
        unit: Unit::Ratio,
        kind: Kind::Gauge,
        value_type: ValueType::Float,
        read: |s: &Snapshot| Value::Float(s.cpu_fraction),
    },
    int_field!(
        "runtime.threads",
        Count,
        Gauge,
        "Number of OS threads in the process.",
        |s| s.threads
    ),
    int_field!(
        "runtime.open_fds",
        Count,
        Gauge,
        "Number of open file descriptors.",
        |s| s.open_fds
    ),
];

/// Live objects, derived from the cached snapshot (extra set)
pub(crate) const LIVE_OBJECTS: Field = int_field!(
    "runtime.mem.live_objects",
    Count,
    Gauge,
    "Number of live objects, cumulative allocations minus frees.",
    |s| s.alloc.live_objects()
);

/// Extra instruments sampled fresh on every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extra {
    Uptime,
    TokioWorkers,
    TokioAliveTasks,
    TokioGlobalQueueDepth,
}

impl Extra {
    pub const ALL: [Extra; 4] = [
        Extra::Uptime,
        Extra::TokioWorkers,
        Extra::TokioAliveTasks,
        Extra::TokioGlobalQueueDepth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Extra::Uptime => "runtime.uptime",
            Extra::TokioWorkers => "runtime.tokio.workers",
            Extra::TokioAliveTasks => "runtime.tokio.alive_tasks",
            Extra::TokioGlobalQueueDepth => "runtime.tokio.global_queue_depth",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Extra::Uptime => "Milliseconds since the publisher was created.",
            Extra::TokioWorkers => "Number of tokio worker threads.",
            Extra::TokioAliveTasks => "Number of tasks alive in the tokio runtime.",
            Extra::TokioGlobalQueueDepth => "Number of tasks in the tokio global queue.",
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            Extra::Uptime => Unit::Milliseconds,
            _ => Unit::Count,
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            Extra::Uptime => Kind::Cumulative,
            _ => Kind::Gauge,
        }
    }
}
