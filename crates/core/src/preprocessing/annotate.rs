use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::detection_box::DetectionBox;
use crate::shared::error::PreprocessError;
use crate::shared::frame::Frame;

pub const ANNOTATION_COLOR: [u8; 3] = [0, 255, 0];

/// Draw a 1-px outline for every box and a 3×3 dot for every landmark.
///
/// Drawing is clipped at the frame edges.
pub fn annotate(
    frame: &mut Frame,
    boxes: &[DetectionBox],
    landmarks: &[LandmarkSet],
) -> Result<(), PreprocessError> {
    if frame.channels() != 3 {
        return Err(PreprocessError::ChannelCount {
            expected: 3,
            actual: frame.channels(),
        });
    }

    for b in boxes {
        draw_rect(frame, b);
    }
    for set in landmarks {
        for &(x, y) in set.points() {
            let (cx, cy) = (x as i32, y as i32);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    put_pixel(frame, cx + dx, cy + dy);
                }
            }
        }
    }
    Ok(())
}

fn draw_rect(frame: &mut Frame, b: &DetectionBox) {
    let (right, bottom) = (b.right - 1, b.bottom - 1);
    for x in b.left..=right {
        put_pixel(frame, x, b.top);
        put_pixel(frame, x, bottom);
    }
    for y in b.top..=bottom {
        put_pixel(frame, b.left, y);
        put_pixel(frame, right, y);
    }
}

fn put_pixel(frame: &mut Frame, x: i32, y: i32) {
    if x < 0 || y < 0 || x >= frame.width() as i32 || y >= frame.height() as i32 {
        return;
    }
    let offset = (y as usize * frame.width() as usize + x as usize) * 3;
    frame.data_mut()[offset..offset + 3].copy_from_slice(&ANNOTATION_COLOR);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let a = frame.as_ndarray();
        [a[[y, x, 0]], a[[y, x, 1]], a[[y, x, 2]]]
    }

    #[test]
    fn test_box_outline_drawn_interior_untouched() {
        let mut frame = Frame::new(vec![0u8; 20 * 20 * 3], 20, 20, 3);
        annotate(&mut frame, &[DetectionBox::new(2, 3, 12, 13)], &[]).unwrap();

        assert_eq!(pixel(&frame, 2, 3), ANNOTATION_COLOR);
        assert_eq!(pixel(&frame, 11, 12), ANNOTATION_COLOR);
        assert_eq!(pixel(&frame, 7, 3), ANNOTATION_COLOR);
        assert_eq!(pixel(&frame, 7, 8), [0, 0, 0]);
        assert_eq!(pixel(&frame, 12, 13), [0, 0, 0]);
    }

    #[test]
    fn test_landmark_dot() {
        let mut frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3);
        let set = LandmarkSet::new(vec![(5.4, 5.9)]);
        annotate(&mut frame, &[], &[set]).unwrap();
        assert_eq!(pixel(&frame, 5, 5), ANNOTATION_COLOR);
        assert_eq!(pixel(&frame, 4, 6), ANNOTATION_COLOR);
        assert_eq!(pixel(&frame, 7, 5), [0, 0, 0]);
    }

    #[test]
    fn test_drawing_clipped_at_edges() {
        let mut frame = Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, 3);
        let set = LandmarkSet::new(vec![(0.0, 0.0), (-10.0, 50.0)]);
        annotate(&mut frame, &[DetectionBox::new(-5, -5, 20, 20)], &[set]).unwrap();
        assert_eq!(pixel(&frame, 0, 0), ANNOTATION_COLOR);
    }

    #[test]
    fn test_rejects_gray() {
        let mut frame = Frame::new(vec![0u8; 4], 2, 2, 1);
        assert!(annotate(&mut frame, &[], &[]).is_err());
    }
}
