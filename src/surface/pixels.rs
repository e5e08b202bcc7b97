//! Host image to XRGB8888 conversion

use crate::error::{Error, Result};

/// Bytes per pixel of presentation buffers
pub const BYTES_PER_PIXEL: usize = 4;

/// Channel order of a 3-channel source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Blue, green, red (the host library's native order)
    #[default]
    Bgr,
    /// Red, green, blue
    Rgb,
}

/// Borrowed view of an interleaved 3-channel, 8-bit image
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows
    pub stride: usize,
    pub order: ChannelOrder,
    pub data: &'a [u8],
}

impl<'a> ImageView<'a> {
    /// Tightly packed BGR image
    pub fn bgr(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            stride: width as usize * 3,
            order: ChannelOrder::Bgr,
            data,
        }
    }

    /// Tightly packed RGB image
    pub fn rgb(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            order: ChannelOrder::Rgb,
            ..Self::bgr(width, height, data)
        }
    }

    /// Check dimensions, stride and data length agree
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidImage("zero-sized image"));
        }
        let row = self.width as usize * 3;
        if self.stride < row {
            return Err(Error::InvalidImage("stride shorter than a row"));
        }
        let needed = self
            .stride
            .checked_mul(self.height as usize - 1)
            .and_then(|body| body.checked_add(row))
            .ok_or(Error::InvalidImage("image size out of range"))?;
        if self.data.len() < needed {
            return Err(Error::InvalidImage("pixel data shorter than image"));
        }
        Ok(())
    }

    /// Size of the converted image in bytes
    pub fn presentation_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Convert into XRGB8888 with a zero alpha byte.
    ///
    /// Each destination pixel is the little-endian `u32`
    /// `(0 << 24) | (r << 16) | (g << 8) | b`. `dst` must hold
    /// [`presentation_len`](Self::presentation_len) bytes.
    pub fn write_xrgb8888(&self, dst: &mut [u8]) -> Result<()> {
        self.validate()?;
        if dst.len() < self.presentation_len() {
            return Err(Error::InvalidImage("destination buffer too small"));
        }

        let width = self.width as usize;
        let rows = self.data.chunks(self.stride).take(self.height as usize);
        let dst_rows = dst.chunks_exact_mut(width * BYTES_PER_PIXEL);
        for (src_row, dst_row) in rows.zip(dst_rows) {
            let src_pixels = src_row[..width * 3].chunks_exact(3);
            for (p, out) in src_pixels.zip(dst_row.chunks_exact_mut(BYTES_PER_PIXEL)) {
                let (r, g, b) = match self.order {
                    ChannelOrder::Bgr => (p[2], p[1], p[0]),
                    ChannelOrder::Rgb => (p[0], p[1], p[2]),
                };
                out.copy_from_slice(&pack_xrgb(r, g, b).to_le_bytes());
            }
        }
        Ok(())
    }

    /// Convert into a freshly allocated vector of packed pixels
    pub fn to_xrgb8888(&self) -> Result<Vec<u32>> {
        let mut bytes = vec![0u8; self.presentation_len()];
        self.write_xrgb8888(&mut bytes)?;
        Ok(bytes
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// Pack one pixel, alpha byte zero
pub fn pack_xrgb(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}
