//! Frame similarity scores.

use image::imageops::{self, FilterType};
use image::GrayImage;
use vnarr_models::{MotionConfig, SimilarityMetric};

use crate::error::{MediaError, MediaResult};

const MAX_SQUARED_ERROR: f64 = 255.0 * 255.0;

fn check_dimensions(a: &GrayImage, b: &GrayImage) -> MediaResult<()> {
    if a.dimensions() != b.dimensions() {
        return Err(MediaError::frame_decode(format!(
            "frame size changed mid-stream: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }
    Ok(())
}

/// Mean absolute luma difference, 0-255.
pub fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> MediaResult<f64> {
    check_dimensions(a, b)?;
    let n = a.as_raw().len();
    if n == 0 {
        return Ok(0.0);
    }
    let sum: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    Ok(sum as f64 / n as f64)
}

fn histogram(frame: &GrayImage) -> [f64; 256] {
    let mut bins = [0.0; 256];
    for &p in frame.as_raw() {
        bins[p as usize] += 1.0;
    }
    bins
}

/// Pearson correlation of 256-bin luma histograms, -1..1.
pub fn histogram_correlation(a: &GrayImage, b: &GrayImage) -> MediaResult<f64> {
    check_dimensions(a, b)?;
    let ha = histogram(a);
    let hb = histogram(b);

    let mean_a = ha.iter().sum::<f64>() / 256.0;
    let mean_b = hb.iter().sum::<f64>() / 256.0;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in ha.iter().zip(hb.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        // Uniform histograms carry no variance to correlate.
        return Ok(if ha == hb { 1.0 } else { 0.0 });
    }
    Ok(cov / denom)
}

/// `1 - mse / 255²`, 0..1 where 1 means identical.
pub fn normalized_mse(a: &GrayImage, b: &GrayImage) -> MediaResult<f64> {
    check_dimensions(a, b)?;
    let n = a.as_raw().len();
    if n == 0 {
        return Ok(1.0);
    }
    let sum: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    Ok(1.0 - (sum / n as f64) / MAX_SQUARED_ERROR)
}

/// Scores consecutive frames with one metric, optionally on downsampled copies.
#[derive(Debug, Clone, Copy)]
pub struct FrameComparator {
    metric: SimilarityMetric,
    compare_size: Option<u32>,
}

impl FrameComparator {
    pub fn new(metric: SimilarityMetric, compare_size: Option<u32>) -> Self {
        Self {
            metric,
            compare_size: compare_size.filter(|s| *s > 0),
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(config.metric, config.compare_size)
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// The frame as it will be compared.
    pub fn prepare(&self, frame: GrayImage) -> GrayImage {
        match self.compare_size {
            Some(size) if frame.dimensions() != (size, size) => {
                imageops::resize(&frame, size, size, FilterType::Triangle)
            }
            _ => frame,
        }
    }

    pub fn score(&self, prev: &GrayImage, current: &GrayImage) -> MediaResult<f64> {
        match self.metric {
            SimilarityMetric::PixelDifference => mean_abs_diff(prev, current),
            SimilarityMetric::HistogramCorrelation => histogram_correlation(prev, current),
            SimilarityMetric::NormalizedMse => normalized_mse(prev, current),
        }
    }

    /// Whether `current` is unchanged relative to `prev` at `threshold`.
    pub fn is_static(&self, prev: &GrayImage, current: &GrayImage, threshold: f64) -> MediaResult<bool> {
        let score = self.score(prev, current)?;
        Ok(self.metric.is_static(score, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn solid(value: u8) -> GrayImage {
        GrayImage::from_pixel(8, 8, Luma([value]))
    }

    fn gradient() -> GrayImage {
        GrayImage::from_fn(16, 16, |x, y| Luma([(x * 16 + y) as u8]))
    }

    #[test]
    fn test_mean_abs_diff() {
        assert_eq!(mean_abs_diff(&solid(10), &solid(10)).unwrap(), 0.0);
        assert!((mean_abs_diff(&solid(10), &solid(30)).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_correlation_identical_frames() {
        let g = gradient();
        assert!((histogram_correlation(&g, &g).unwrap() - 1.0).abs() < 1e-9);
        assert!((histogram_correlation(&solid(5), &solid(5)).unwrap() - 1.0).abs() < 1e-9);
        assert!(histogram_correlation(&solid(5), &solid(200)).unwrap() < 0.5);
    }

    #[test]
    fn test_normalized_mse() {
        assert!((normalized_mse(&solid(0), &solid(0)).unwrap() - 1.0).abs() < 1e-9);
        assert!(normalized_mse(&solid(0), &solid(255)).unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_dimension_mismatch_is_decode_error() {
        let result = mean_abs_diff(&solid(0), &gradient());
        assert!(matches!(result, Err(MediaError::FrameDecode(_))));
    }

    #[test]
    fn test_comparator_downsamples() {
        let cmp = FrameComparator::new(SimilarityMetric::HistogramCorrelation, Some(4));
        let prepared = cmp.prepare(gradient());
        assert_eq!(prepared.dimensions(), (4, 4));

        let cmp = FrameComparator::new(SimilarityMetric::PixelDifference, None);
        assert_eq!(cmp.prepare(gradient()).dimensions(), (16, 16));
    }

    #[test]
    fn test_comparator_direction_per_metric() {
        let pixel = FrameComparator::new(SimilarityMetric::PixelDifference, None);
        assert!(pixel.is_static(&solid(10), &solid(10), 0.1).unwrap());
        assert!(!pixel.is_static(&solid(10), &solid(11), 0.1).unwrap());

        let mse = FrameComparator::new(SimilarityMetric::NormalizedMse, None);
        assert!(mse.is_static(&solid(10), &solid(11), 0.98).unwrap());
        assert!(!mse.is_static(&solid(0), &solid(255), 0.98).unwrap());
    }
}
