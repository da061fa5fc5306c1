/// A single cell of a [`crate::grid::VoxelGrid`].
///
/// `weight == 0.0` means the voxel is "unseen"; its `distance` is then
/// meaningless and must not be read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    /// Truncated signed distance, normalised to `[-1, 1]`. Negative is
    /// behind the surface (inside the object), positive is in front
    /// (towards the camera), zero is the surface itself.
    pub distance: f32,

    /// Accumulated confidence of `distance`, saturating at the grid's
    /// `w_max`. Zero means unseen.
    pub weight: f32,
}

impl Voxel {
    pub const UNSEEN: Voxel = Voxel {
        distance: 0.0,
        weight: 0.0,
    };

    pub fn is_seen(&self) -> bool {
        self.weight > 0.0
    }
}

impl Default for Voxel {
    fn default() -> Self {
        Voxel::UNSEEN
    }
}
