//! Bounds-checked tag arenas
//!
//! A tag is read and written as its own byte arena whose offset 0 is the
//! first byte of the type signature. Every access is checked against the
//! arena length, so a bad offset becomes an error instead of a panic.

use crate::color::Xyz;
use crate::error::{Error, Result};
use crate::icc::types::{
    Signature, f64_to_s15_fixed16, f64_to_u8_fixed8, s15_fixed16_to_f64, u8_fixed8_to_f64,
};

/// Cursor over one tag's bytes
#[derive(Debug, Clone)]
pub struct TagReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TagReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::OutOfBounds {
                offset: pos,
                size: 0,
                len: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Check that `offset..offset + size` lies inside the arena
    pub fn check_range(&self, offset: usize, size: usize) -> Result<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(Error::OutOfBounds {
                offset,
                size,
                len: self.data.len(),
            }),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::truncated(self.pos, n, self.remaining()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Skip to the next multiple of four
    pub fn align(&mut self) -> Result<()> {
        let pad = (4 - self.pos % 4) % 4;
        let pad = pad.min(self.remaining());
        self.skip(pad)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.array().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let v = self.array().map(f32::from_be_bytes)?;
        if v.is_nan() || v.abs() > 1e20 {
            return Err(Error::Corrupted(format!("float value {v} out of range")));
        }
        Ok(v)
    }

    pub fn read_signature(&mut self) -> Result<Signature> {
        self.read_u32().map(Signature)
    }

    pub fn read_s15_fixed16(&mut self) -> Result<f64> {
        self.array().map(|b| s15_fixed16_to_f64(i32::from_be_bytes(b)))
    }

    pub fn read_u8_fixed8(&mut self) -> Result<f64> {
        self.read_u16().map(u8_fixed8_to_f64)
    }

    pub fn read_xyz(&mut self) -> Result<Xyz> {
        Ok(Xyz::new(
            self.read_s15_fixed16()?,
            self.read_s15_fixed16()?,
            self.read_s15_fixed16()?,
        ))
    }

    pub fn read_u16_array(&mut self, n: usize) -> Result<Vec<u16>> {
        let bytes = self.read_bytes(n.checked_mul(2).ok_or_else(|| {
            Error::Resource(format!("{n} 16-bit values"))
        })?)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect())
    }

    pub fn read_f32_array(&mut self, n: usize) -> Result<Vec<f32>> {
        if self.remaining() / 4 < n {
            return Err(Error::truncated(self.pos, n * 4, self.remaining()));
        }
        (0..n).map(|_| self.read_f32()).collect()
    }

    /// Fixed-width zero-padded ASCII field
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        let raw = self.read_bytes(n)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(n);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

/// Growable arena for one tag
#[derive(Debug, Default, Clone)]
pub struct TagWriter {
    buf: Vec<u8>,
}

impl TagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_signature(&mut self, sig: Signature) {
        self.write_u32(sig.0);
    }

    pub fn write_s15_fixed16(&mut self, v: f64) {
        self.write_bytes(&f64_to_s15_fixed16(v).to_be_bytes());
    }

    pub fn write_u8_fixed8(&mut self, v: f64) {
        self.write_u16(f64_to_u8_fixed8(v));
    }

    pub fn write_xyz(&mut self, xyz: &Xyz) {
        self.write_s15_fixed16(xyz.x);
        self.write_s15_fixed16(xyz.y);
        self.write_s15_fixed16(xyz.z);
    }

    pub fn write_u16_array(&mut self, values: &[u16]) {
        for &v in values {
            self.write_u16(v);
        }
    }

    pub fn write_fixed_string(&mut self, s: &str, n: usize) {
        let mut field = vec![0u8; n];
        let bytes = s.as_bytes();
        let len = bytes.len().min(n.saturating_sub(1));
        field[..len].copy_from_slice(&bytes[..len]);
        self.write_bytes(&field);
    }

    /// Pad with zeros to the next multiple of four
    pub fn align(&mut self) {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
    }

    /// Overwrite a previously written 32-bit slot
    pub fn patch_u32(&mut self, at: usize, v: u32) -> Result<()> {
        let len = self.buf.len();
        let slot = self.buf.get_mut(at..at + 4).ok_or(Error::OutOfBounds {
            offset: at,
            size: 4,
            len,
        })?;
        slot.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }
}
