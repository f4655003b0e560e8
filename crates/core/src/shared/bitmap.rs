use crate::shared::error::ContractError;

/// Channel layout of a CPU bitmap, 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8888,
    Bgra8888,
    Rgb888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Bgra8888 => 4,
            PixelFormat::Rgb888 => 3,
        }
    }
}

/// A CPU-side raster image in row-major order.
///
/// Rows may be padded (`stride > width * bytes_per_pixel`). The engine
/// converts every bitmap to tightly packed RGBA8 before upload.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl Bitmap {
    /// Tightly packed bitmap.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * format.bytes_per_pixel(),
            "data length must equal width * height * bytes_per_pixel"
        );
        Self {
            data,
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
        }
    }

    /// Bitmap with explicit row stride in bytes, validated up front.
    pub fn with_stride(
        data: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, ContractError> {
        let bitmap = Self {
            data,
            width,
            height,
            stride,
            format,
        };
        bitmap.validate()?;
        Ok(bitmap)
    }

    /// Uniformly colored RGBA bitmap.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(data, width, height, PixelFormat::Rgba8888)
    }

    pub fn from_rgba_image(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, PixelFormat::Rgba8888)
    }

    pub fn into_rgba_image(self) -> Result<image::RgbaImage, ContractError> {
        let (width, height) = (self.width, self.height);
        let rgba = self.to_rgba()?;
        image::RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| ContractError::InvalidBitmap("pixel buffer too small".into()))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Checks the invariants the GPU upload depends on.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.width == 0 || self.height == 0 {
            return Err(ContractError::InvalidBitmap(format!(
                "empty bitmap ({}x{})",
                self.width, self.height
            )));
        }
        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        if self.stride < row_bytes {
            return Err(ContractError::InvalidBitmap(format!(
                "stride {} is smaller than row size {row_bytes}",
                self.stride
            )));
        }
        let needed = self.stride * (self.height as usize - 1) + row_bytes;
        if self.data.len() < needed {
            return Err(ContractError::InvalidBitmap(format!(
                "buffer holds {} bytes, need {needed}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Tightly packed RGBA8 copy of the pixels.
    pub fn to_rgba(&self) -> Result<Vec<u8>, ContractError> {
        self.validate()?;
        let bpp = self.format.bytes_per_pixel();
        let row_bytes = self.width as usize * bpp;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for row in self.data.chunks(self.stride).take(self.height as usize) {
            let row = &row[..row_bytes];
            match self.format {
                PixelFormat::Rgba8888 => out.extend_from_slice(row),
                PixelFormat::Bgra8888 => {
                    for px in row.chunks_exact(4) {
                        out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                    }
                }
                PixelFormat::Rgb888 => {
                    for px in row.chunks_exact(3) {
                        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                    }
                }
            }
        }
        Ok(out)
    }

    /// RGBA value at `(x, y)` regardless of storage format.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride + x as usize * bpp;
        let px = &self.data[offset..offset + bpp];
        match self.format {
            PixelFormat::Rgba8888 => [px[0], px[1], px[2], px[3]],
            PixelFormat::Bgra8888 => [px[2], px[1], px[0], px[3]],
            PixelFormat::Rgb888 => [px[0], px[1], px[2], 255],
        }
    }
}
