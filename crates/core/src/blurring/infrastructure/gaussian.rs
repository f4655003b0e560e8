use crate::blurring::domain::blur_radius::BlurRadius;

const CHANNELS: usize = 4;

/// Normalized 1D Gaussian weights for `radius`, `2 * taps + 1` long.
///
/// Same kernel the compute shader evaluates: sigma = 0.4 r + 0.6,
/// half-width ceil(r). The outermost tap is faded in by how far `r`
/// reaches past the previous integer, so the kernel is continuous in `r`.
pub fn gaussian_weights(radius: BlurRadius) -> Vec<f32> {
    let r = f64::from(radius.value());
    let sigma = f64::from(radius.sigma());
    let taps = i64::from(radius.taps());
    let coeff = -1.0 / (2.0 * sigma * sigma);
    let weights: Vec<f64> = (-taps..=taps)
        .map(|i| {
            let coverage = (r + 1.0 - i.abs() as f64).clamp(0.0, 1.0);
            (coeff * (i * i) as f64).exp() * coverage
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&w| (w / sum) as f32).collect()
}

/// Blur tightly packed RGBA8 pixels in place.
pub fn blur_rgba(data: &mut [u8], width: usize, height: usize, radius: BlurRadius) {
    let kernel = gaussian_weights(radius);
    let mut temp = Vec::new();
    separable_gaussian_blur_with_kernel(data, width, height, &kernel, &mut temp);
}

/// Two-pass blur with clamp-to-edge sampling, reusing `temp`.
///
/// The intermediate is quantized to 8 bits, matching the GPU path where the
/// horizontal pass writes an RGBA8 texture.
pub fn separable_gaussian_blur_with_kernel(
    data: &mut [u8],
    width: usize,
    height: usize,
    kernel: &[f32],
    temp: &mut Vec<u8>,
) {
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = (kernel.len() / 2) as isize;
    temp.resize(width * height * CHANNELS, 0);

    // Horizontal pass: data → temp
    for y in 0..height {
        for x in 0..width {
            for c in 0..CHANNELS {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                    sum += data[(y * width + sx) * CHANNELS + c] as f32 * w;
                }
                temp[(y * width + x) * CHANNELS + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    // Vertical pass: temp → data
    for y in 0..height {
        for x in 0..width {
            for c in 0..CHANNELS {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy =
                        (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                    sum += temp[(sy * width + x) * CHANNELS + c] as f32 * w;
                }
                data[(y * width + x) * CHANNELS + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Mean squared difference between the pixel at `(x, y)` and its
/// 8-neighborhood, over the RGB channels. Lower means smoother.
#[cfg(test)]
pub fn neighborhood_variance(data: &[u8], width: usize, height: usize, x: usize, y: usize) -> f64 {
    let center = (y * width + x) * CHANNELS;
    let mut total = 0.0;
    let mut count = 0usize;
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                continue;
            }
            let idx = (ny as usize * width + nx as usize) * CHANNELS;
            for c in 0..3 {
                let d = data[idx + c] as f64 - data[center + c] as f64;
                total += d * d;
            }
            count += 3;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
