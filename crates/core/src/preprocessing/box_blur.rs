use crate::shared::error::PreprocessError;
use crate::shared::frame::Frame;

/// Mean-filter the whole frame in place with a `kernel_size × kernel_size` window.
///
/// Separable: a horizontal pass into a `u64` accumulator buffer, then a
/// vertical pass back into the frame. Borders replicate the edge pixel.
pub fn box_blur(frame: &mut Frame, kernel_size: usize) -> Result<(), PreprocessError> {
    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(PreprocessError::InvalidKernel(kernel_size));
    }
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let channels = frame.channels() as usize;
    if kernel_size == 1 || width == 0 || height == 0 {
        return Ok(());
    }

    let half = (kernel_size / 2) as isize;
    let norm = (kernel_size as u64).pow(2);
    let data = frame.data_mut();
    let mut temp = vec![0u64; width * height * channels];

    // Horizontal pass: data → temp (window sums)
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0u64;
                for k in -half..=half {
                    let sx = (x as isize + k).clamp(0, width as isize - 1) as usize;
                    sum += data[(y * width + sx) * channels + c] as u64;
                }
                temp[(y * width + x) * channels + c] = sum;
            }
        }
    }

    // Vertical pass: temp → data
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0u64;
                for k in -half..=half {
                    let sy = (y as isize + k).clamp(0, height as isize - 1) as usize;
                    sum += temp[(sy * width + x) * channels + c];
                }
                data[(y * width + x) * channels + c] = ((sum + norm / 2) / norm).min(255) as u8;
            }
        }
    }

    Ok(())
}
