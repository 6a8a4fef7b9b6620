//! Display rotation and the logical/physical dimension mapping.
//!
//! Rotation changes only the extents reported to rendering layers; transfer
//! coordinates always address the panel's native grid.

/// Clockwise display rotation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Whether this rotation swaps the panel's width and height as seen by
    /// a rendering layer.
    pub const fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The extents a rendering layer should use under `rotation`.
    pub const fn rotated(self, rotation: Rotation) -> Self {
        if rotation.swaps_dimensions() {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PANEL: Dimensions = Dimensions::new(480, 1920);

    #[test]
    fn upright_rotations_keep_physical_extents() {
        for rotation in [Rotation::Deg0, Rotation::Deg180] {
            let dims = PANEL.rotated(rotation);
            assert_eq!((dims.width, dims.height), (480, 1920));
        }
    }

    #[test]
    fn sideways_rotations_swap_extents() {
        for rotation in [Rotation::Deg90, Rotation::Deg270] {
            let dims = PANEL.rotated(rotation);
            assert_eq!((dims.width, dims.height), (1920, 480));
        }
    }

    #[test]
    fn default_rotation_is_upright() {
        assert_eq!(Rotation::default(), Rotation::Deg0);
    }
}
