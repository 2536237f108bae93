use ndarray::{ArrayView3, ArrayViewMut3};

use crate::shared::error::PreprocessError;

/// A single image: contiguous pixel bytes in row-major order.
///
/// `channels` is 1 for gray frames and 3 for RGB frames. Format conversion
/// happens at I/O boundaries only; the domain layer treats pixel data as
/// opaque bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, 3)
    }

    pub fn from_gray_image(img: image::GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, 1)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy of this frame as RGB. Gray frames are replicated across channels.
    pub fn to_rgb(&self) -> Result<Frame, PreprocessError> {
        match self.channels {
            3 => Ok(self.clone()),
            1 => {
                let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
                Ok(Frame::new(data, self.width, self.height, 3))
            }
            other => Err(PreprocessError::ChannelCount {
                expected: 3,
                actual: other,
            }),
        }
    }

    pub fn to_rgb_image(&self) -> Result<image::RgbImage, PreprocessError> {
        let rgb = self.to_rgb()?;
        image::RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .ok_or(PreprocessError::ChannelCount {
                expected: 3,
                actual: self.channels,
            })
    }

    pub fn to_gray_image(&self) -> Result<image::GrayImage, PreprocessError> {
        if self.channels != 1 {
            return Err(PreprocessError::ChannelCount {
                expected: 1,
                actual: self.channels,
            });
        }
        image::GrayImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            PreprocessError::ChannelCount {
                expected: 1,
                actual: self.channels,
            },
        )
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
