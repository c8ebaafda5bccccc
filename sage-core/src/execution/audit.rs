//! Order lifecycle audit log
//!
//! Append-only, line-oriented, pipe-separated. One record per lifecycle
//! event:
//!
//! ```text
//! <UTC-ISO8601-Z>|EVENT|<order_id>[|<field>...]
//! ```
//!
//! Compliance invariant: the `ORDER` record is written before any wire
//! action, so intent survives a crash that happens mid-send.
//!
//! Durability model - two distinct operations that must not be conflated:
//!
//! - [`AuditLog::flush`]: user-space buffer into the kernel. Cheap,
//!   visible to other processes, **not durable** across power loss.
//! - [`AuditLog::sync`]: kernel to stable storage (`fsync`). Durable.
//!
//! Policies: every 100 appends trigger an implicit flush; `REJECT`
//! records flush immediately; a background thread drives `sync` on a
//! periodic tick; shutdown issues a final `sync` before the handle drops.
//!
//! Each record is formatted into a fixed 256-byte buffer. A record that
//! would overflow is truncated, stamped with a `[TRUNC]` marker at the
//! buffer end, and counted. All timestamps are UTC - local time would
//! corrupt ordering across DST transitions.

use crate::core::{FixedPoint, OrderRequest};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt::Write as FmtWrite;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Fixed per-record buffer size
const ENTRY_SIZE: usize = 256;

/// Appends between implicit flushes
const FLUSH_INTERVAL: usize = 100;

/// Reason / error strings are clipped to this many bytes
const MAX_REASON_LEN: usize = 63;

const HEADER: &str = "# SAGE Audit Log\n\
                      # Format: TIMESTAMP|EVENT|ORDER_ID|SYMBOL|SIDE|PRICE|QTY\n\
                      # Events: ORDER (intent), SENT (transmitted), ACK, REJECT, FILL, ERROR\n";

/// Fixed-size line buffer with overflow tracking
///
/// `fmt::Write` into the buffer; bytes past the end are dropped and the
/// overflow is remembered so the caller can stamp the `[TRUNC]` marker.
struct EntryBuf {
    buf: [u8; ENTRY_SIZE],
    len: usize,
    overflowed: bool,
}

impl EntryBuf {
    fn new() -> Self {
        Self {
            buf: [0; ENTRY_SIZE],
            len: 0,
            overflowed: false,
        }
    }

    /// Terminate the record, applying the truncation marker if needed
    fn finish(&mut self) -> &[u8] {
        if self.overflowed {
            // Overwrite the tail with the marker so the line stays within
            // the fixed buffer and still ends in a newline
            const MARKER: &[u8] = b"[TRUNC]\n";
            self.buf[ENTRY_SIZE - MARKER.len()..].copy_from_slice(MARKER);
            self.len = ENTRY_SIZE;
        } else if self.len < ENTRY_SIZE {
            self.buf[self.len] = b'\n';
            self.len += 1;
        } else {
            self.overflowed = true;
            return self.finish();
        }
        &self.buf[..self.len]
    }

    fn truncated(&self) -> bool {
        self.overflowed
    }
}

impl FmtWrite for EntryBuf {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        let room = ENTRY_SIZE - self.len;
        let take = bytes.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
        if take < bytes.len() {
            self.overflowed = true;
        }
        Ok(())
    }
}

struct LogFile {
    writer: BufWriter<File>,
    pending_writes: usize,
}

/// Append-only audit log
///
/// The mutex window around each append is bytes-long; the housekeeping
/// thread calls `flush`/`sync` under the same lock.
pub struct AuditLog {
    file: Mutex<LogFile>,
    entries_logged: AtomicU64,
    truncation_count: AtomicU64,
    sync_count: AtomicU64,
}

impl AuditLog {
    /// Open (or create) the audit file in append mode
    ///
    /// The header block is written only when the file is empty - the log
    /// is append-only across restarts.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("failed to open audit log {:?}", path.as_ref()))?;

        let is_new = file
            .metadata()
            .map(|m| m.len() == 0)
            .unwrap_or(false);

        let mut writer = BufWriter::new(file);
        if is_new {
            writer.write_all(HEADER.as_bytes())?;
            writer.flush()?;
        }

        Ok(Self {
            file: Mutex::new(LogFile {
                writer,
                pending_writes: 0,
            }),
            entries_logged: AtomicU64::new(0),
            truncation_count: AtomicU64::new(0),
            sync_count: AtomicU64::new(0),
        })
    }

    fn timestamp(buf: &mut EntryBuf) {
        // Formats straight into the fixed buffer, no allocation
        let _ = write!(buf, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));
    }

    /// Log order intent - called BEFORE any wire action
    pub fn log_order(&self, order_id: u64, order: &OrderRequest) {
        let mut buf = EntryBuf::new();
        Self::timestamp(&mut buf);
        let side = if order.side > 0 { "BUY" } else { "SELL" };
        let _ = write!(
            buf,
            "|ORDER|{}|{}|{}|{}|{}",
            order_id, order.symbol_id, side, order.price, order.quantity
        );
        self.append(&mut buf, false);
    }

    /// Log transmission - bytes left the process (not exchange receipt)
    pub fn log_sent(&self, order_id: u64) {
        let mut buf = EntryBuf::new();
        Self::timestamp(&mut buf);
        let _ = write!(buf, "|SENT|{}", order_id);
        self.append(&mut buf, false);
    }

    /// Log exchange acknowledgment (ack id may be empty)
    pub fn log_ack(&self, order_id: u64, exchange_ack_id: &str) {
        let mut buf = EntryBuf::new();
        Self::timestamp(&mut buf);
        let _ = write!(buf, "|ACK|{}|{}", order_id, exchange_ack_id);
        self.append(&mut buf, false);
    }

    /// Log an execution
    pub fn log_fill(&self, order_id: u64, symbol_id: u64, price: FixedPoint, qty: FixedPoint) {
        let mut buf = EntryBuf::new();
        Self::timestamp(&mut buf);
        let _ = write!(buf, "|FILL|{}|{}|{}|{}", order_id, symbol_id, price, qty);
        self.append(&mut buf, false);
    }

    /// Log a rejection; always flushed immediately
    ///
    /// The reason field is clipped to its fixed width; a clipped reason
    /// counts as a truncation.
    pub fn log_reject(&self, order_id: u64, reason: &str) {
        let mut buf = EntryBuf::new();
        Self::timestamp(&mut buf);
        let _ = write!(buf, "|REJECT|{}|{}", order_id, clip(reason));
        if reason.len() > MAX_REASON_LEN {
            self.truncation_count.fetch_add(1, Ordering::Relaxed);
        }
        self.append(&mut buf, true);
    }

    /// Log an error condition (send failure, connectivity loss)
    pub fn log_error(&self, order_id: u64, message: &str) {
        let mut buf = EntryBuf::new();
        Self::timestamp(&mut buf);
        let _ = write!(buf, "|ERROR|{}|{}", order_id, clip(message));
        if message.len() > MAX_REASON_LEN {
            self.truncation_count.fetch_add(1, Ordering::Relaxed);
        }
        self.append(&mut buf, false);
    }

    fn append(&self, buf: &mut EntryBuf, flush_now: bool) {
        let bytes_truncated = {
            let line = buf.finish();
            let mut file = match self.file.lock() {
                Ok(f) => f,
                Err(poisoned) => poisoned.into_inner(),
            };

            // I/O failure does not stop the pipeline; the entry counter
            // diverging from the file is the observable symptom
            let _ = file.writer.write_all(line);
            file.pending_writes += 1;

            if flush_now || file.pending_writes >= FLUSH_INTERVAL {
                let _ = file.writer.flush();
                file.pending_writes = 0;
            }
            buf.truncated()
        };

        self.entries_logged.fetch_add(1, Ordering::Relaxed);
        if bytes_truncated {
            self.truncation_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Push buffered bytes into the kernel - visibility, not durability
    pub fn flush(&self) {
        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = file.writer.flush();
        file.pending_writes = 0;
    }

    /// Persist to stable storage - the only durability guarantee
    pub fn sync(&self) {
        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = file.writer.flush();
        let _ = file.writer.get_ref().sync_data();
        file.pending_writes = 0;
        self.sync_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entries_logged(&self) -> u64 {
        self.entries_logged.load(Ordering::Relaxed)
    }

    pub fn truncation_count(&self) -> u64 {
        self.truncation_count.load(Ordering::Relaxed)
    }

    pub fn sync_count(&self) -> u64 {
        self.sync_count.load(Ordering::Relaxed)
    }
}

impl Drop for AuditLog {
    /// Final sync so clean shutdown leaves every record on stable storage
    fn drop(&mut self) {
        self.sync();
    }
}

/// Clip a reason/error string to the fixed field width
fn clip(s: &str) -> &str {
    if s.len() <= MAX_REASON_LEN {
        s
    } else {
        // Back off to a char boundary so the slice stays valid UTF-8
        let mut end = MAX_REASON_LEN;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::NamedTempFile;

    fn order(symbol_id: u64, side: i8, price: f64, qty: f64) -> OrderRequest {
        OrderRequest {
            order_id: 0,
            symbol_id,
            price: FixedPoint::from_f64(price),
            quantity: FixedPoint::from_f64(qty),
            side,
            order_type: crate::core::ORDER_TYPE_MARKET,
            time_in_force: crate::core::TIF_IOC,
            _reserved: [0; 5],
        }
    }

    fn read_back(file: &NamedTempFile) -> String {
        let mut contents = String::new();
        File::open(file.path())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
    }

    #[test]
    fn test_header_written_once() {
        let file = NamedTempFile::new().unwrap();
        {
            let log = AuditLog::open(file.path()).unwrap();
            log.log_sent(1);
        }
        {
            // Re-open: header must not repeat
            let log = AuditLog::open(file.path()).unwrap();
            log.log_sent(2);
        }

        let contents = read_back(&file);
        assert_eq!(contents.matches("# SAGE Audit Log").count(), 1);
        assert!(contents.starts_with("# SAGE Audit Log\n"));
        assert!(contents.contains("# Format: TIMESTAMP|EVENT|ORDER_ID|SYMBOL|SIDE|PRICE|QTY"));
        assert!(contents
            .contains("# Events: ORDER (intent), SENT (transmitted), ACK, REJECT, FILL, ERROR"));
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let file = NamedTempFile::new().unwrap();
        {
            let log = AuditLog::open(file.path()).unwrap();
            log.log_order(12345, &order(42, 1, 50_000.0, 0.1));
            log.log_sent(12345);
            log.log_ack(12345, "EX123");
            log.log_fill(12345, 42, FixedPoint::from_f64(45_001.5), FixedPoint::from_f64(0.5));
            log.sync();

            assert_eq!(log.entries_logged(), 4);
            assert!(log.sync_count() >= 1);
        }

        let contents = read_back(&file);
        assert!(contents.contains("ORDER|12345|42|BUY|50000.00000000|0.10000000"));
        assert!(contents.contains("SENT|12345"));
        assert!(contents.contains("ACK|12345|EX123"));
        assert!(contents.contains("FILL|12345|42|45001.50000000|0.50000000"));

        // Ordering: ORDER before SENT before ACK before FILL
        let order_at = contents.find("ORDER|12345").unwrap();
        let sent_at = contents.find("SENT|12345").unwrap();
        let ack_at = contents.find("ACK|12345").unwrap();
        let fill_at = contents.find("FILL|12345").unwrap();
        assert!(order_at < sent_at && sent_at < ack_at && ack_at < fill_at);
    }

    #[test]
    fn test_reject_and_error_records() {
        let file = NamedTempFile::new().unwrap();
        {
            let log = AuditLog::open(file.path()).unwrap();
            log.log_order(54321, &order(1, -1, 100.0, 1.0));
            log.log_reject(54321, "INSUFFICIENT_FUNDS");
            log.log_error(54321, "CONNECTION_LOST");
            log.sync();
        }

        let contents = read_back(&file);
        assert!(contents.contains("ORDER|54321|1|SELL|"));
        assert!(contents.contains("REJECT|54321|INSUFFICIENT_FUNDS"));
        assert!(contents.contains("ERROR|54321|CONNECTION_LOST"));
    }

    #[test]
    fn test_reject_flushes_immediately() {
        let file = NamedTempFile::new().unwrap();
        let log = AuditLog::open(file.path()).unwrap();
        log.log_reject(7, "SOME_REASON");

        // No sync, no drop: the record must already be visible
        let contents = read_back(&file);
        assert!(contents.contains("REJECT|7|SOME_REASON"));
    }

    #[test]
    fn test_truncation_marker_and_counter() {
        let file = NamedTempFile::new().unwrap();
        let long_reason = "X".repeat(200);
        {
            let log = AuditLog::open(file.path()).unwrap();
            log.log_order(1, &order(1, 1, 100.0, 1.0));
            // A 200-char reason is clipped to the 63-byte field and
            // counted as one truncation
            log.log_reject(2, &long_reason);
            assert_eq!(log.truncation_count(), 1);

            // Force true buffer overflow through the ack path, which does
            // not clip its field
            let huge = "Y".repeat(300);
            log.log_ack(3, &huge);
            assert_eq!(log.truncation_count(), 2);
            log.sync();
        }

        let contents = read_back(&file);
        // The clipped reject keeps exactly 63 of the 200 chars
        assert!(contents.contains(&format!("REJECT|2|{}", "X".repeat(63))));
        assert!(!contents.contains(&"X".repeat(64)));

        // The oversized ack line is truncated and marked
        let ack_line = contents
            .lines()
            .find(|l| l.contains("ACK|3"))
            .expect("ack line present");
        assert!(ack_line.len() <= ENTRY_SIZE);
        assert!(ack_line.ends_with("[TRUNC]"));
    }

    #[test]
    fn test_boundary_length_records() {
        // A line of exactly ENTRY_SIZE - 1 payload bytes plus newline fits
        // cleanly; one more byte truncates with the marker.
        let file = NamedTempFile::new().unwrap();
        let log = AuditLog::open(file.path()).unwrap();

        // Measure the fixed prefix: "<ts>|ACK|9|"
        let ts_len = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string().len();
        let prefix = ts_len + "|ACK|9|".len();

        let exact_fit = "A".repeat(ENTRY_SIZE - 1 - prefix);
        log.log_ack(9, &exact_fit);
        assert_eq!(log.truncation_count(), 0);

        let one_over = "B".repeat(ENTRY_SIZE - prefix);
        log.log_ack(9, &one_over);
        assert_eq!(log.truncation_count(), 1);
        log.flush();

        let contents = read_back(&file);
        assert!(contents.contains(&exact_fit));
        for line in contents.lines() {
            assert!(line.len() < ENTRY_SIZE);
        }
    }

    #[test]
    fn test_utc_timestamp_format() {
        let file = NamedTempFile::new().unwrap();
        {
            let log = AuditLog::open(file.path()).unwrap();
            log.log_sent(1);
            log.sync();
        }

        let contents = read_back(&file);
        let line = contents.lines().find(|l| l.contains("SENT|1")).unwrap();
        let ts = line.split('|').next().unwrap();

        // YYYY-MM-DDTHH:MM:SSZ
        assert_eq!(ts.len(), 20);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn test_reason_clip_respects_utf8() {
        // A multi-byte char straddling the clip boundary must not split
        let mut s = "a".repeat(62);
        s.push('é'); // 2 bytes, would end at byte 64
        assert!(clip(&s).is_char_boundary(clip(&s).len()));
        assert!(clip(&s).len() <= MAX_REASON_LEN);
    }

    #[test]
    fn test_drop_syncs() {
        let file = NamedTempFile::new().unwrap();
        {
            let log = AuditLog::open(file.path()).unwrap();
            for i in 0..10 {
                log.log_sent(i);
            }
            // 10 < FLUSH_INTERVAL, so nothing flushed yet
        }
        // Drop ran the final sync
        let contents = read_back(&file);
        assert!(contents.contains("SENT|9"));
    }

    #[test]
    fn test_implicit_flush_interval() {
        let file = NamedTempFile::new().unwrap();
        let log = AuditLog::open(file.path()).unwrap();
        for i in 0..FLUSH_INTERVAL as u64 {
            log.log_sent(i);
        }
        // The 100th append crossed the interval and flushed
        let contents = read_back(&file);
        assert!(contents.contains(&format!("SENT|{}", FLUSH_INTERVAL as u64 - 1)));
    }
}
