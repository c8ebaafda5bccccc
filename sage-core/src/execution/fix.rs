//! Zero-allocation FIX 4.2 encoding
//!
//! Minimal NewOrderSingle / OrderCancelRequest encoding into a
//! caller-provided buffer. Fields are `tag=value` separated by SOH
//! (0x01). BodyLength is emitted as a 3-digit zero-padded placeholder and
//! overwritten once the body is known; CheckSum is the sum of all
//! preceding bytes modulo 256, emitted as a 3-digit zero-padded field.

use crate::core::FixedPoint;
use chrono::Utc;
use std::fmt::Write as FmtWrite;

/// FIX field separator
pub const SOH: u8 = 0x01;

/// Stateless FIX encoder over a borrowed buffer
pub struct FixEncoder;

struct FixWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FixWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Append `tag=value` and the SOH terminator
    fn field(&mut self, field: &str) {
        let bytes = field.as_bytes();
        if self.pos + bytes.len() + 1 > self.buf.len() {
            return;
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        self.buf[self.pos] = SOH;
        self.pos += 1;
    }

    fn field_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        let mut tmp = FieldBuf::default();
        let _ = tmp.write_fmt(args);
        self.field(tmp.as_str());
    }
}

/// Small stack scratch for one formatted field
struct FieldBuf {
    buf: [u8; 64],
    len: usize,
}

impl Default for FieldBuf {
    fn default() -> Self {
        Self {
            buf: [0; 64],
            len: 0,
        }
    }
}

impl FieldBuf {
    fn as_str(&self) -> &str {
        // Only ASCII is ever written here
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl FmtWrite for FieldBuf {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        let take = bytes.len().min(self.buf.len() - self.len);
        self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
        Ok(())
    }
}

impl FixEncoder {
    /// Encode a NewOrderSingle (MsgType D)
    ///
    /// Returns the number of bytes written into `buf`.
    pub fn encode_new_order(
        buf: &mut [u8],
        order_id: u64,
        symbol_id: u64,
        side: i8,
        price: FixedPoint,
        quantity: FixedPoint,
    ) -> usize {
        let mut w = FixWriter::new(buf);

        w.field("8=FIX.4.2");

        // BodyLength placeholder, overwritten below
        let body_len_at = w.pos + 2; // the digits of "9=000"
        w.field("9=000");
        let body_start = w.pos;

        w.field("35=D");
        w.field_fmt(format_args!("11={}", order_id));
        w.field_fmt(format_args!("55={}", symbol_id));
        w.field(if side > 0 { "54=1" } else { "54=2" });
        w.field_fmt(format_args!(
            "60={}",
            Utc::now().format("%Y%m%d-%H:%M:%S%.3f")
        ));
        w.field_fmt(format_args!("38={}", quantity));
        w.field("40=2");
        w.field_fmt(format_args!("44={}", price));
        w.field("59=0");

        Self::seal(w, body_len_at, body_start)
    }

    /// Encode an OrderCancelRequest (MsgType F)
    pub fn encode_cancel(
        buf: &mut [u8],
        order_id: u64,
        orig_order_id: u64,
    ) -> usize {
        let mut w = FixWriter::new(buf);

        w.field("8=FIX.4.2");
        let body_len_at = w.pos + 2;
        w.field("9=000");
        let body_start = w.pos;

        w.field("35=F");
        w.field_fmt(format_args!("11={}", order_id));
        w.field_fmt(format_args!("41={}", orig_order_id));
        w.field_fmt(format_args!(
            "60={}",
            Utc::now().format("%Y%m%d-%H:%M:%S%.3f")
        ));

        Self::seal(w, body_len_at, body_start)
    }

    /// Patch BodyLength, append CheckSum, return total length
    fn seal(w: FixWriter<'_>, body_len_at: usize, body_start: usize) -> usize {
        let FixWriter { buf, pos } = w;

        let body_len = pos - body_start;
        buf[body_len_at] = b'0' + ((body_len / 100) % 10) as u8;
        buf[body_len_at + 1] = b'0' + ((body_len / 10) % 10) as u8;
        buf[body_len_at + 2] = b'0' + (body_len % 10) as u8;

        let checksum: u32 = buf[..pos].iter().map(|b| u32::from(*b)).sum::<u32>() % 256;

        let mut w = FixWriter { buf, pos };
        w.field_fmt(format_args!("10={:03}", checksum));
        w.pos
    }
}
