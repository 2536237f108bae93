use crate::shared::error::PreprocessError;
use crate::shared::frame::Frame;

/// Linear contrast stretch of a single-channel frame onto [0, 255].
///
/// Each pixel `p` becomes `round(255 * (p - min) / (max - min))`. Constant
/// and empty frames are left untouched.
pub fn gray_normalize(frame: &mut Frame) -> Result<(), PreprocessError> {
    if frame.channels() != 1 {
        return Err(PreprocessError::ChannelCount {
            expected: 1,
            actual: frame.channels(),
        });
    }

    let data = frame.data_mut();
    let (Some(&min), Some(&max)) = (data.iter().min(), data.iter().max()) else {
        return Ok(());
    };
    if min == max {
        return Ok(());
    }

    let range = (max - min) as u32;
    for p in data.iter_mut() {
        let shifted = (*p - min) as u32;
        *p = ((255 * shifted + range / 2) / range) as u8;
    }
    Ok(())
}
