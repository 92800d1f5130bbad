//! Counting global allocator
//!
//! Wraps the system allocator with lock-free counters so the publisher has
//! heap accounting to report. Binaries opt in with:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: memstats::CountingAllocator = memstats::CountingAllocator;
//! ```
//!
//! When the allocator is not installed every counter stays at zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Global allocation counters
pub static ALLOC_STATS: AllocStats = AllocStats::new();

/// Allocator that counts every call before delegating to [`System`]
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            ALLOC_STATS.allocated(layout.size() as u64);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            ALLOC_STATS.allocated(layout.size() as u64);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        ALLOC_STATS.freed(layout.size() as u64);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            ALLOC_STATS.reallocated(layout.size() as u64, new_size as u64);
        }
        new_ptr
    }
}

/// Atomic allocation counters
pub struct AllocStats {
    installed: AtomicBool,
    bytes_allocated: AtomicU64,
    bytes_freed: AtomicU64,
    allocs: AtomicU64,
    frees: AtomicU64,
    reallocs: AtomicU64,
    peak_live_bytes: AtomicU64,
}

impl AllocStats {
    pub const fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
            bytes_allocated: AtomicU64::new(0),
            bytes_freed: AtomicU64::new(0),
            allocs: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            reallocs: AtomicU64::new(0),
            peak_live_bytes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn allocated(&self, size: u64) {
        self.installed.store(true, Ordering::Relaxed);
        self.allocs.fetch_add(1, Ordering::Relaxed);
        let total = self.bytes_allocated.fetch_add(size, Ordering::Relaxed) + size;
        self.update_peak(total);
    }

    #[inline]
    pub fn freed(&self, size: u64) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.bytes_freed.fetch_add(size, Ordering::Relaxed);
    }

    /// A realloc counts as one reallocation plus the size delta
    #[inline]
    pub fn reallocated(&self, old_size: u64, new_size: u64) {
        self.installed.store(true, Ordering::Relaxed);
        self.reallocs.fetch_add(1, Ordering::Relaxed);
        if new_size >= old_size {
            let grow = new_size - old_size;
            let total = self.bytes_allocated.fetch_add(grow, Ordering::Relaxed) + grow;
            self.update_peak(total);
        } else {
            self.bytes_freed
                .fetch_add(old_size - new_size, Ordering::Relaxed);
        }
    }

    fn update_peak(&self, allocated_total: u64) {
        let live = allocated_total.saturating_sub(self.bytes_freed.load(Ordering::Relaxed));
        self.peak_live_bytes.fetch_max(live, Ordering::Relaxed);
    }

    /// Whether any allocation went through [`CountingAllocator`]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Relaxed)
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> AllocSnapshot {
        // Frees first so live bytes never underflow against a racing alloc.
        let bytes_freed = self.bytes_freed.load(Ordering::Relaxed);
        let frees = self.frees.load(Ordering::Relaxed);
        let bytes_allocated = self.bytes_allocated.load(Ordering::Relaxed);
        let allocs = self.allocs.load(Ordering::Relaxed);
        AllocSnapshot {
            bytes_allocated,
            bytes_freed,
            allocs,
            frees,
            reallocs: self.reallocs.load(Ordering::Relaxed),
            peak_live_bytes: self.peak_live_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Default for AllocStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocSnapshot {
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
    pub allocs: u64,
    pub frees: u64,
    pub reallocs: u64,
    pub peak_live_bytes: u64,
}

impl AllocSnapshot {
    pub fn live_bytes(&self) -> u64 {
        self.bytes_allocated.saturating_sub(self.bytes_freed)
    }

    pub fn live_objects(&self) -> u64 {
        self.allocs.saturating_sub(self.frees)
    }
}
