//! RT-safe garbage collection for decoded tracks
//!
//! Tracks are published to decks as `basedrop::Shared<Track>`. When the audio
//! thread swaps a deck's track, the old pointer is dropped there, but the
//! actual deallocation (tens of megabytes for a long track) is deferred to a
//! background collector thread instead of running inside the audio callback.
//!
//! ```ignore
//! use basedrop::Shared;
//! use crate::engine::gc::gc_handle;
//!
//! let track = Shared::new(&gc_handle(), decoded_track);
//! // Dropped on the audio thread: enqueued, freed later on "rizz-gc"
//! drop(track);
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the collector thread reclaims deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("rizz-gc".to_string())
        .spawn(move || {
            // The collector stays on this thread for its whole life
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }

            log::info!("Track GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    let from_thread = match spawned {
        Ok(_) => rx.recv().ok(),
        Err(e) => {
            log::error!("Failed to spawn track GC thread: {}", e);
            None
        }
    };

    from_thread.unwrap_or_else(|| {
        // No collector thread: keep one alive here so handles stay valid.
        // Deferred drops then leak instead of being freed.
        log::error!("Track GC unavailable; replaced tracks will not be reclaimed");
        let collector = Collector::new();
        let handle = collector.handle();
        std::mem::forget(collector);
        handle
    })
}

/// Handle for allocating `Shared<T>` values reclaimed off the audio thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
