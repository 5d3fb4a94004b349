//! Archive download for bundle updates.
//!
//! This module provides the fetch side of the bundle pipeline:
//! - Single-attempt streaming HTTP downloads (`http`)
//! - CRC32 archive fingerprints (`checksum`)
//! - Mapping of stage progress onto the overall 0-100 scale (`progress`)
//!
//! # Progress Scale
//!
//! A whole download reports on one 0-100 scale. Each stage owns a sub-range:
//!
//! ```text
//!  0   5  10 ─────── fetch ─────── 70 71  75 ── extract ── 90 91  100
//!  │   │   │                        │  │   │                │  │    │
//! start    fetch begins     fingerprint    extract begins   flatten done
//! ```

mod checksum;
mod http;
mod progress;

pub use checksum::fingerprint;
pub use http::{HttpFetcher, DEFAULT_TIMEOUT_SECS};
pub use progress::{scale_percent, StageProgress, EXTRACT_RANGE, FETCH_RANGE};
