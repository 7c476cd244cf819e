use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip};

/// Per-pixel validity of a detector. `true` marks a pixel whose value can be trusted.
///
/// Calibration files store the inverse (a pixel mask, where any non-zero flag marks a bad
/// pixel), so masks are usually built with [`CalibrationMask::from_pixel_mask`].
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMask {
    valid: Array2<bool>,
}

impl CalibrationMask {
    /// Build a mask from a detector pixel mask. Flagged (non-zero) pixels become invalid.
    pub fn from_pixel_mask(pixel_mask: ArrayView2<u32>) -> Self {
        Self {
            valid: pixel_mask.mapv(|flag| flag == 0),
        }
    }

    pub fn from_valid(valid: Array2<bool>) -> Self {
        Self { valid }
    }

    pub fn valid(&self) -> ArrayView2<'_, bool> {
        self.valid.view()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.valid.dim()
    }

    pub fn n_invalid(&self) -> usize {
        self.valid.iter().filter(|ok| !**ok).count()
    }

    /// Copy of `frame` with every invalid pixel set to zero.
    ///
    /// The frame must have the shape of the mask.
    pub fn apply(&self, frame: ArrayView2<f64>) -> Array2<f64> {
        Zip::from(&frame)
            .and(&self.valid)
            .map_collect(|&value, &ok| if ok { value } else { 0.0 })
    }

    /// Zero every invalid pixel of `frame` in place
    pub fn apply_inplace(&self, mut frame: ArrayViewMut2<f64>) {
        Zip::from(&mut frame).and(&self.valid).for_each(|value, &ok| {
            if !ok {
                *value = 0.0;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pixel_mask_inversion() {
        let pixel_mask = array![[0u32, 1], [4, 0]];
        let mask = CalibrationMask::from_pixel_mask(pixel_mask.view());
        assert_eq!(mask.valid(), array![[true, false], [false, true]]);
        assert_eq!(mask.n_invalid(), 2);
    }

    #[test]
    fn test_masked_pixels_are_zero() {
        let mask = CalibrationMask::from_valid(array![
            [true, false, true],
            [false, false, true]
        ]);
        let frame = array![[1.5, -2.0, 3.0], [f64::NAN, 7.0, 8.0]];
        let masked = mask.apply(frame.view());
        Zip::from(&masked)
            .and(&mask.valid())
            .for_each(|&value, &ok| {
                if !ok {
                    assert_eq!(value, 0.0);
                }
            });
        assert_eq!(masked[[0, 0]], 1.5);
        assert_eq!(masked[[1, 2]], 8.0);

        let mut inplace = frame.clone();
        mask.apply_inplace(inplace.view_mut());
        assert_eq!(inplace[[1, 0]], 0.0);
        assert_eq!(inplace[[0, 1]], 0.0);
        assert_eq!(inplace[[0, 2]], 3.0);
    }
}
