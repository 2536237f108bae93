use crate::shared::error::PreprocessError;
use crate::shared::frame::Frame;

/// Median-filter the frame in place with a `kernel_size × kernel_size` window.
///
/// Each channel is filtered independently. Borders replicate the edge pixel,
/// so every window holds exactly `kernel_size²` samples.
pub fn median_blur(frame: &mut Frame, kernel_size: usize) -> Result<(), PreprocessError> {
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
    let source = frame.data().to_vec();
    let data = frame.data_mut();
    let mut window = Vec::with_capacity(kernel_size * kernel_size);

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                window.clear();
                for ky in -half..=half {
                    let sy = (y as isize + ky).clamp(0, height as isize - 1) as usize;
                    for kx in -half..=half {
                        let sx = (x as isize + kx).clamp(0, width as isize - 1) as usize;
                        window.push(source[(sy * width + sx) * channels + c]);
                    }
                }
                let mid = window.len() / 2;
                let (_, median, _) = window.select_nth_unstable(mid);
                data[(y * width + x) * channels + c] = *median;
            }
        }
    }

    Ok(())
}
