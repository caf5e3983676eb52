/// Bounding box in the format (x, y, width, height) of the original image resolution
///
#[derive(Clone, Default, Debug, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Pixel-aligned window inside the zoomed working image
///
#[derive(Clone, Default, Debug, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Shifts the box by the top-left corner of the enclosing box
    ///
    pub fn offset(&self, by: &BoundingBox) -> Self {
        Self {
            x: self.x + by.x,
            y: self.y + by.y,
            ..*self
        }
    }

    /// Maps the box into the zoomed image: the box is scaled about its own center,
    /// truncated to whole pixels and clipped to `image_width x image_height`.
    ///
    pub fn zoom(&self, zoom_factor: f32, image_width: usize, image_height: usize) -> PixelWindow {
        let center_x = self.x * zoom_factor + self.width * zoom_factor * 0.5;
        let center_y = self.y * zoom_factor + self.height * zoom_factor * 0.5;

        let width = (self.width * zoom_factor) as i64;
        let height = (self.height * zoom_factor) as i64;
        let left = (center_x - width as f32 * 0.5) as i64;
        let top = (center_y - height as f32 * 0.5) as i64;

        let x0 = left.clamp(0, image_width as i64);
        let y0 = top.clamp(0, image_height as i64);
        let x1 = (left + width).clamp(0, image_width as i64);
        let y1 = (top + height).clamp(0, image_height as i64);

        PixelWindow {
            x: x0 as usize,
            y: y0 as usize,
            width: (x1 - x0).max(0) as usize,
            height: (y1 - y0).max(0) as usize,
        }
    }
}

impl PixelWindow {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Iterates `(u, v)` pixel coordinates row by row
    ///
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |v| (self.x..self.x + self.width).map(move |u| (u, v)))
    }
}
