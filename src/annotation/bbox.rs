/// Normalized bounding box: center coordinates plus extent, all in `[0, 1]`
/// relative to the frame dimensions.
///
/// This is the on-disk format (`cx cy w h`). Corner coordinates are derived
/// on demand for overlap computations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    /// Center x, normalized
    pub cx: f32,
    /// Center y, normalized
    pub cy: f32,
    /// Width, normalized
    pub w: f32,
    /// Height, normalized
    pub h: f32,
}

impl BBox {
    #[inline]
    pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    /// Create from corner coordinates (top-left x/y, bottom-right x/y).
    #[inline]
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            cx: (x1 + x2) / 2.0,
            cy: (y1 + y2) / 2.0,
            w: x2 - x1,
            h: y2 - y1,
        }
    }

    /// Convert to corner coordinates: `[x1, y1, x2, y2]`.
    #[inline]
    pub fn to_corners(&self) -> [f32; 4] {
        [
            self.cx - self.w / 2.0,
            self.cy - self.h / 2.0,
            self.cx + self.w / 2.0,
            self.cy + self.h / 2.0,
        ]
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.cx, self.cy)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// True when every component lies in `[0, 1]` and the box has positive
    /// extent. Records failing this are rejected on load.
    pub fn is_normalized(&self) -> bool {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        in_unit(self.cx) && in_unit(self.cy) && in_unit(self.w) && in_unit(self.h)
            && self.w > 0.0
            && self.h > 0.0
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let [ax1, ay1, ax2, ay2] = self.to_corners();
        let [bx1, by1, bx2, by2] = other.to_corners();

        let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        let inter_area = inter_w * inter_h;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Euclidean distance between box centers.
    pub fn center_distance(&self, other: &BBox) -> f32 {
        let dx = self.cx - other.cx;
        let dy = self.cy - other.cy;
        (dx * dx + dy * dy).sqrt()
    }

    /// Component-wise linear interpolation towards `other`.
    ///
    /// `r` = 0 yields `self`, `r` = 1 yields `other`. Pure function of the
    /// two endpoints, so repeated calls with the same ratio are bit-identical.
    pub fn lerp(&self, other: &BBox, r: f32) -> BBox {
        BBox {
            cx: self.cx + r * (other.cx - self.cx),
            cy: self.cy + r * (other.cy - self.cy),
            w: self.w + r * (other.w - self.w),
            h: self.h + r * (other.h - self.h),
        }
    }
}

use ndarray::Array2;

/// Calculate IoU matrix between two sets of boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[BBox], boxes_b: &[BBox]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}
