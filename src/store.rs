//! Persistent parameter record: layout, integrity and typed access.
//!
//! On-record layout is `[signature][crc16][field bytes in schema order]`,
//! all little-endian. The CRC covers the data region only, so the header can
//! be rewritten without invalidating itself. Appending fields to the end of
//! a schema keeps old records readable after the automatic reset; any other
//! schema change shows up as an integrity failure and falls back to
//! defaults.

use core::fmt::Write as _;

use log::{info, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::markup;
use crate::ports::NvsPort;
use crate::schema::{DefaultValue, ParamType, Schema, IP_LEN};

/// First two record bytes, little-endian.
pub const SIGNATURE: u16 = 0xA55A;
/// Signature plus CRC.
pub const HEADER_LEN: usize = 4;

// ── CRC16-CCITT ────────────────────────────────────────────────

/// One step of CRC16-CCITT: poly 0x1021, byte folded into the high bits,
/// no reflection.
pub fn crc16_step(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ (u16::from(byte) << 8);
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ 0x1021
        } else {
            crc << 1
        };
    }
    crc
}

/// CRC16-CCITT over `data`, init 0xFFFF.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, &b| crc16_step(crc, b))
}

// ── Typed views ────────────────────────────────────────────────

/// Decoded view of one stored field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    Char(u8),
    /// Bytes up to (not including) the first NUL.
    Str(&'a [u8]),
    Binary(&'a [u8]),
    Ip([u8; IP_LEN]),
}

// ── Store ──────────────────────────────────────────────────────

/// Schema-bound parameter store over an [`NvsPort`].
pub struct Store<P: NvsPort> {
    schema: Schema,
    nvs: P,
    initialized: bool,
}

impl<P: NvsPort> Store<P> {
    pub fn new(schema: Schema, nvs: P) -> Self {
        Self {
            schema,
            nvs,
            initialized: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Backing port, mainly for adapter-specific introspection.
    pub fn port(&self) -> &P {
        &self.nvs
    }

    /// Opens the backing region and verifies the record. A bad signature or
    /// CRC resets every field to its default and commits; `Ok(true)` reports
    /// that reset to the caller.
    pub fn begin(&mut self) -> Result<bool> {
        let total = HEADER_LEN + self.schema.data_len();
        self.nvs.begin(total)?;
        self.initialized = true;
        if self.verify() {
            info!("parameter record verified, {} fields", self.schema.count());
            return Ok(false);
        }
        warn!("parameter record invalid, resetting to defaults");
        for index in 0..self.schema.count() {
            self.clear(index)?;
        }
        self.commit()?;
        Ok(true)
    }

    /// Signature and CRC check against the current working copy.
    pub fn verify(&self) -> bool {
        let data = self.nvs.data();
        if data.len() < HEADER_LEN + self.schema.data_len() {
            return false;
        }
        let sign = u16::from_le_bytes([data[0], data[1]]);
        let stored = u16::from_le_bytes([data[2], data[3]]);
        sign == SIGNATURE && stored == crc16(&data[HEADER_LEN..])
    }

    /// Recomputes the CRC and flushes, but only when the header actually
    /// changes. Repeated commits with unchanged data cost no flash writes.
    pub fn commit(&mut self) -> Result<()> {
        self.check_init()?;
        let data = self.nvs.data();
        let crc = crc16(&data[HEADER_LEN..]);
        let sign = u16::from_le_bytes([data[0], data[1]]);
        let stored = u16::from_le_bytes([data[2], data[3]]);
        if sign == SIGNATURE && stored == crc {
            return Ok(());
        }
        let data = self.nvs.data_mut();
        data[0..2].copy_from_slice(&SIGNATURE.to_le_bytes());
        data[2..4].copy_from_slice(&crc.to_le_bytes());
        self.nvs.commit()
    }

    fn check_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::Io("store not opened"))
        }
    }

    fn field(&self, index: usize) -> Result<&[u8]> {
        self.check_init()?;
        let size = self.schema.size(index)? as usize;
        let at = HEADER_LEN + self.schema.offset(index)?;
        Ok(&self.nvs.data()[at..at + size])
    }

    fn field_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        self.check_init()?;
        let size = self.schema.size(index)? as usize;
        let at = HEADER_LEN + self.schema.offset(index)?;
        Ok(&mut self.nvs.data_mut()[at..at + size])
    }

    // ── Raw access ─────────────────────────────────────────────

    /// Read-only view of the raw field bytes.
    pub fn value(&self, index: usize) -> Result<&[u8]> {
        self.field(index)
    }

    /// Copies the field into `buf`.
    ///
    /// Fixed-width fields need the full width and return it; strings copy at
    /// most `min(buf, size) - 1` bytes and always NUL-terminate; binary
    /// copies at most `min(buf, size)` bytes. Returns the bytes written.
    pub fn get(&self, index: usize, buf: &mut [u8]) -> Result<usize> {
        let ptype = self.schema.ptype(index)?;
        let field = self.field(index)?;
        match ptype {
            ParamType::Str => {
                if buf.is_empty() {
                    return Err(Error::BufferTooSmall);
                }
                let n = buf.len().min(field.len());
                let text = &field[..n - 1];
                let len = text.iter().position(|&b| b == 0).unwrap_or(text.len());
                buf[..len].copy_from_slice(&text[..len]);
                buf[len] = 0;
                Ok(len + 1)
            }
            ParamType::Binary => {
                let n = buf.len().min(field.len());
                buf[..n].copy_from_slice(&field[..n]);
                Ok(n)
            }
            _ => {
                if buf.len() < field.len() {
                    return Err(Error::BufferTooSmall);
                }
                buf[..field.len()].copy_from_slice(field);
                Ok(field.len())
            }
        }
    }

    /// Zero-fills the field, then copies `value` if given. Strings keep
    /// their NUL terminator by copying at most `size - 1` bytes. Does not
    /// persist; batch with [`Store::commit`].
    pub fn set(&mut self, index: usize, value: Option<&[u8]>) -> Result<()> {
        let ptype = self.schema.ptype(index)?;
        let field = self.field_mut(index)?;
        field.fill(0);
        if let Some(value) = value {
            let limit = match ptype {
                ParamType::Str => field.len().saturating_sub(1),
                _ => field.len(),
            };
            let n = value.len().min(limit);
            field[..n].copy_from_slice(&value[..n]);
        }
        Ok(())
    }

    /// Rewrites one field with its schema default. No commit.
    pub fn clear(&mut self, index: usize) -> Result<()> {
        let default = self.schema.param(index)?.default;
        let field = self.field_mut(index)?;
        field.fill(0);
        match default {
            DefaultValue::Bool(v) => field[0] = u8::from(v),
            DefaultValue::Int(v) => {
                let bytes = v.to_le_bytes();
                let n = field.len().min(bytes.len());
                field[..n].copy_from_slice(&bytes[..n]);
            }
            DefaultValue::Uint(v) => {
                let bytes = v.to_le_bytes();
                let n = field.len().min(bytes.len());
                field[..n].copy_from_slice(&bytes[..n]);
            }
            DefaultValue::Float(v) => field.copy_from_slice(&v.to_le_bytes()),
            DefaultValue::Char(v) => field[0] = v,
            DefaultValue::Str(v) => {
                let n = v.len().min(field.len().saturating_sub(1));
                field[..n].copy_from_slice(&v.as_bytes()[..n]);
            }
            DefaultValue::Binary(v) => {
                let n = v.len().min(field.len());
                field[..n].copy_from_slice(&v[..n]);
            }
            DefaultValue::Ip(v) => field.copy_from_slice(&v),
        }
        Ok(())
    }

    /// Resets every field to its default and commits.
    pub fn clear_all(&mut self) -> Result<()> {
        for index in 0..self.schema.count() {
            self.clear(index)?;
        }
        self.commit()
    }

    // ── Typed access ───────────────────────────────────────────

    /// Decoded view of one field.
    pub fn typed(&self, index: usize) -> Result<Value<'_>> {
        let ptype = self.schema.ptype(index)?;
        let f = self.field(index)?;
        Ok(match ptype {
            ParamType::Bool => Value::Bool(f[0] != 0),
            ParamType::I8 => Value::I8(f[0] as i8),
            ParamType::U8 => Value::U8(f[0]),
            ParamType::I16 => Value::I16(i16::from_le_bytes([f[0], f[1]])),
            ParamType::U16 => Value::U16(u16::from_le_bytes([f[0], f[1]])),
            ParamType::I32 => Value::I32(i32::from_le_bytes([f[0], f[1], f[2], f[3]])),
            ParamType::U32 => Value::U32(u32::from_le_bytes([f[0], f[1], f[2], f[3]])),
            ParamType::F32 => Value::F32(f32::from_le_bytes([f[0], f[1], f[2], f[3]])),
            ParamType::Char => Value::Char(f[0]),
            ParamType::Str => {
                let len = f.iter().position(|&b| b == 0).unwrap_or(f.len());
                Value::Str(&f[..len])
            }
            ParamType::Binary => Value::Binary(f),
            ParamType::Ip => Value::Ip([f[0], f[1], f[2], f[3]]),
        })
    }

    /// Appends the canonical text rendition of one field to `out`.
    ///
    /// Booleans print `true`/`false`, integers minimal decimal, floats with
    /// six decimals, binary as base64, addresses dotted-quad. `escape`
    /// applies markup escaping to char and string content.
    pub fn to_text(&self, index: usize, out: &mut String, escape: bool) -> Result<()> {
        match self.typed(index)? {
            Value::Bool(v) => out.push_str(if v { "true" } else { "false" }),
            Value::I8(v) => {
                let _ = write!(out, "{v}");
            }
            Value::U8(v) => {
                let _ = write!(out, "{v}");
            }
            Value::I16(v) => {
                let _ = write!(out, "{v}");
            }
            Value::U16(v) => {
                let _ = write!(out, "{v}");
            }
            Value::I32(v) => {
                let _ = write!(out, "{v}");
            }
            Value::U32(v) => {
                let _ = write!(out, "{v}");
            }
            Value::F32(v) => {
                let _ = write!(out, "{v:.6}");
            }
            Value::Char(v) => {
                let c = v as char;
                match markup::escape_char(c) {
                    Some(ent) if escape => out.push_str(ent),
                    _ => {
                        if v != 0 {
                            out.push(c);
                        }
                    }
                }
            }
            Value::Str(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                if escape {
                    markup::escape_into(out, &text);
                } else {
                    out.push_str(&text);
                }
            }
            Value::Binary(bytes) => {
                let _ = codec::encode_to(out, bytes);
            }
            Value::Ip(octets) => {
                let _ = write!(
                    out,
                    "{}.{}.{}.{}",
                    octets[0], octets[1], octets[2], octets[3]
                );
            }
        }
        Ok(())
    }

    /// Parses `text` into the field, the inverse of [`Store::to_text`].
    ///
    /// On any parse failure the field is reset to its default and
    /// `Malformed` is returned; a field is never left half-written. Does not
    /// persist.
    pub fn from_text(&mut self, index: usize, text: &str) -> Result<()> {
        let ptype = self.schema.ptype(index)?;
        match self.parse_into(index, ptype, text) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.clear(index)?;
                Err(e)
            }
        }
    }

    fn parse_into(&mut self, index: usize, ptype: ParamType, text: &str) -> Result<()> {
        match ptype {
            ParamType::Bool => {
                let v: bool = match text {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    _ => return Err(Error::Malformed),
                };
                self.set(index, Some(&[u8::from(v)]))
            }
            ParamType::I8 => {
                let v: i8 = text.parse().map_err(|_| Error::Malformed)?;
                self.set(index, Some(&v.to_le_bytes()))
            }
            ParamType::U8 => {
                let v: u8 = text.parse().map_err(|_| Error::Malformed)?;
                self.set(index, Some(&v.to_le_bytes()))
            }
            ParamType::I16 => {
                let v: i16 = text.parse().map_err(|_| Error::Malformed)?;
                self.set(index, Some(&v.to_le_bytes()))
            }
            ParamType::U16 => {
                let v: u16 = text.parse().map_err(|_| Error::Malformed)?;
                self.set(index, Some(&v.to_le_bytes()))
            }
            ParamType::I32 => {
                let v: i32 = text.parse().map_err(|_| Error::Malformed)?;
                self.set(index, Some(&v.to_le_bytes()))
            }
            ParamType::U32 => {
                let v: u32 = text.parse().map_err(|_| Error::Malformed)?;
                self.set(index, Some(&v.to_le_bytes()))
            }
            ParamType::F32 => {
                let v: f32 = text.parse().map_err(|_| Error::Malformed)?;
                self.set(index, Some(&v.to_le_bytes()))
            }
            ParamType::Char => {
                let byte = text.as_bytes().first().copied().unwrap_or(0);
                self.set(index, Some(&[byte]))
            }
            ParamType::Str => self.set(index, Some(text.as_bytes())),
            ParamType::Binary => {
                let field = self.field_mut(index)?;
                field.fill(0);
                // Decode straight into the field; a failed decode leaves
                // partial bytes that from_text immediately clears.
                codec::decode_into(text, field)?;
                Ok(())
            }
            ParamType::Ip => {
                let mut octets = [0u8; IP_LEN];
                let mut parts = text.split('.');
                for octet in &mut octets {
                    let part = parts.next().ok_or(Error::Malformed)?;
                    *octet = part.parse().map_err(|_| Error::Malformed)?;
                }
                if parts.next().is_some() {
                    return Err(Error::Malformed);
                }
                self.set(index, Some(&octets))
            }
        }
    }

    // ── Name-resolving forms ───────────────────────────────────

    pub fn get_by_name(&self, name: &str, buf: &mut [u8]) -> Result<usize> {
        self.get(self.schema.index_of(name)?, buf)
    }

    pub fn set_by_name(&mut self, name: &str, value: Option<&[u8]>) -> Result<()> {
        self.set(self.schema.index_of(name)?, value)
    }

    pub fn typed_by_name(&self, name: &str) -> Result<Value<'_>> {
        self.typed(self.schema.index_of(name)?)
    }

    pub fn to_text_by_name(&self, name: &str, out: &mut String, escape: bool) -> Result<()> {
        self.to_text(self.schema.index_of(name)?, out, escape)
    }

    pub fn from_text_by_name(&mut self, name: &str, text: &str) -> Result<()> {
        self.from_text(self.schema.index_of(name)?, text)
    }

    pub fn clear_by_name(&mut self, name: &str) -> Result<()> {
        self.clear(self.schema.index_of(name)?)
    }
}
