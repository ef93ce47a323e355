//! Named color lists

use crate::error::{Error, Result};

/// Longest color name kept by the ncl2 encoding, excluding the terminator
pub const MAX_NAME_LEN: usize = 31;

/// Most device colorants a named color may carry
pub const MAX_COLORANTS: usize = 15;

/// One entry of a named color list
#[derive(Debug, Clone, PartialEq)]
pub struct NamedColor {
    pub name: String,
    /// PCS coordinates in 16-bit encoding
    pub pcs: [u16; 3],
    /// Device coordinates in 16-bit encoding
    pub device: Vec<u16>,
}

/// Ordered list of named colors sharing a prefix, suffix and colorant count
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedColorList {
    pub prefix: String,
    pub suffix: String,
    colorant_count: usize,
    colors: Vec<NamedColor>,
}

impl NamedColorList {
    pub fn new(colorant_count: usize, prefix: &str, suffix: &str) -> Result<Self> {
        if colorant_count > MAX_COLORANTS {
            return Err(Error::ChannelCount {
                count: colorant_count,
                max: MAX_COLORANTS,
            });
        }
        Ok(Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            colorant_count,
            colors: Vec::new(),
        })
    }

    /// Append a color; missing device values are zero, names are truncated
    pub fn push(&mut self, name: &str, pcs: [u16; 3], device: &[u16]) -> Result<()> {
        if device.len() > self.colorant_count {
            return Err(Error::ChannelMismatch {
                expected: self.colorant_count,
                actual: device.len(),
            });
        }
        if self.colors.len() >= u16::MAX as usize {
            return Err(Error::Resource("named color list full".into()));
        }
        let mut values = device.to_vec();
        values.resize(self.colorant_count, 0);
        let name: String = name.chars().take(MAX_NAME_LEN).collect();
        self.colors.push(NamedColor {
            name,
            pcs,
            device: values,
        });
        Ok(())
    }

    pub fn colorant_count(&self) -> usize {
        self.colorant_count
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NamedColor> {
        self.colors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedColor> {
        self.colors.iter()
    }

    /// Index of a color by name, ignoring ASCII case
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.colors
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}
