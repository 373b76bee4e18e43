//! Dirty-region accumulator for partial surface updates.

pub use vhwa_protocol::Rect;

/// Area of a surface changed since the last update.
///
/// Starts [`DirtyRegion::Clean`]. The first `add_rect` makes it dirty; later calls only grow it,
/// and an update without a rectangle degrades it to [`DirtyRegion::Whole`] for good.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DirtyRegion {
    #[default]
    Clean,
    /// Dirty with no usable bounding rectangle; the whole surface must be sent.
    Whole,
    /// Dirty within this bounding rectangle.
    Rect(Rect),
}

impl DirtyRegion {
    pub fn is_valid(&self) -> bool {
        !matches!(self, DirtyRegion::Clean)
    }

    /// Bounding rectangle of the dirty area, if one is known.
    pub fn bounding_rect(&self) -> Option<Rect> {
        match self {
            DirtyRegion::Rect(rect) => Some(*rect),
            _ => None,
        }
    }

    /// Merge one update. `None` means the whole surface changed.
    pub fn add_rect(&mut self, rect: Option<&Rect>) {
        *self = match (*self, rect) {
            (DirtyRegion::Clean, Some(r)) => DirtyRegion::Rect(*r),
            (DirtyRegion::Rect(cur), Some(r)) => DirtyRegion::Rect(cur.union(r)),
            (DirtyRegion::Whole, Some(_)) | (_, None) => DirtyRegion::Whole,
        };
    }

    pub fn unite(&mut self, other: &DirtyRegion) {
        match other {
            DirtyRegion::Clean => {}
            DirtyRegion::Whole => self.add_rect(None),
            DirtyRegion::Rect(r) => self.add_rect(Some(r)),
        }
    }

    pub fn clear(&mut self) {
        *self = DirtyRegion::Clean;
    }
}
