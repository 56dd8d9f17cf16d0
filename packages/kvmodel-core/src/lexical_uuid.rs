//! Lexically sortable unique ids.
//!
//! The high 64 bits hold a microsecond timestamp from a process-wide clock
//! that never repeats a value; the low 64 bits identify the generating
//! process. Ids therefore sort by creation time first.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use uuid::Uuid;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// 64-bit FNV-1a hash.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn wall_clock_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

/// Clock returning strictly increasing microsecond timestamps.
#[derive(Debug)]
pub struct IncreasingClock {
    last: Mutex<u64>,
}

impl IncreasingClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(0),
        }
    }

    /// Next timestamp: the wall clock, or one past the previous value if the
    /// wall clock has not moved forward.
    pub fn next(&self) -> u64 {
        let mut last = self.last.lock();
        let now = wall_clock_micros();
        *last = if now > *last { now } else { *last + 1 };
        *last
    }
}

impl Default for IncreasingClock {
    fn default() -> Self {
        Self::new()
    }
}

fn process_clock() -> &'static IncreasingClock {
    static CLOCK: OnceLock<IncreasingClock> = OnceLock::new();
    CLOCK.get_or_init(IncreasingClock::new)
}

/// Worker id of this process: FNV-1a of `"{host}-{pid}"`.
pub fn worker_id() -> u64 {
    static WORKER: OnceLock<u64> = OnceLock::new();
    *WORKER.get_or_init(|| {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        fnv1a_64(format!("{}-{}", host, std::process::id()).as_bytes())
    })
}

/// Time-ordered 128-bit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LexicalUuid {
    timestamp: u64,
    worker_id: u64,
}

impl LexicalUuid {
    /// New id from the process clock and worker id.
    pub fn generate() -> Self {
        Self::from_parts(process_clock().next(), worker_id())
    }

    pub fn from_parts(timestamp: u64, worker_id: u64) -> Self {
        Self {
            timestamp,
            worker_id,
        }
    }

    /// Microseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_u64_pair(self.timestamp, self.worker_id)
    }

    /// Hyphenated lowercase GUID form.
    pub fn guid(&self) -> String {
        self.as_uuid().hyphenated().to_string()
    }
}

impl From<Uuid> for LexicalUuid {
    fn from(uuid: Uuid) -> Self {
        let (timestamp, worker_id) = uuid.as_u64_pair();
        Self::from_parts(timestamp, worker_id)
    }
}

impl FromStr for LexicalUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::from)
    }
}

impl fmt::Display for LexicalUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_uuid().hyphenated())
    }
}
