//! The dense voxel grid storing a truncated signed distance field.

use geo::{Aabb, Vec3};

use crate::error::{Error, Result};
use crate::voxel::Voxel;

/// Grid dimensions in number of voxels along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl Dims {
    pub fn voxel_count(&self) -> usize {
        self.nx as usize * self.ny as usize * self.nz as usize
    }
}

/// A dense, fixed-resolution 3D grid of [`Voxel`]s storing a TSDF.
///
/// Storage is a single flat `Vec<Voxel>` in x-fastest, then y, then z order
/// (`index = i + nx * (j + ny * k)`). `origin` is the world coordinate of the
/// corner (not the centre) of voxel `(0, 0, 0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    dims: Dims,
    size: Vec3,
    voxel_size: Vec3,
    origin: Vec3,
    trunc: f32,
    w_max: f32,
    storage: Vec<Voxel>,
}

impl VoxelGrid {
    /// Create an empty grid (every voxel unseen).
    pub fn new(dims: Dims, size: Vec3, origin: Vec3, trunc: f32, w_max: f32) -> Result<Self> {
        if dims.nx == 0 || dims.ny == 0 || dims.nz == 0 {
            return Err(Error::InvalidArgument(
                "grid dimensions must all be > 0".into(),
            ));
        }
        if size.x <= 0.0 || size.y <= 0.0 || size.z <= 0.0 {
            return Err(Error::InvalidArgument(
                "grid physical size must be positive along every axis".into(),
            ));
        }
        if trunc <= 0.0 {
            return Err(Error::InvalidArgument(
                "truncation distance must be positive".into(),
            ));
        }
        if w_max <= 0.0 {
            return Err(Error::InvalidArgument("w_max must be positive".into()));
        }

        let voxel_size = Vec3::new(
            size.x / dims.nx as f32,
            size.y / dims.ny as f32,
            size.z / dims.nz as f32,
        );

        Ok(VoxelGrid {
            storage: vec![Voxel::UNSEEN; dims.voxel_count()],
            dims,
            size,
            voxel_size,
            origin,
            trunc,
            w_max,
        })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    pub fn voxel_size(&self) -> Vec3 {
        self.voxel_size
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn trunc(&self) -> f32 {
        self.trunc
    }

    pub fn w_max(&self) -> f32 {
        self.w_max
    }

    /// World-space axis-aligned bounding box of the whole grid.
    pub fn aabb(&self) -> Aabb {
        Aabb::from_min_max(self.origin, self.origin + self.size)
    }

    /// Flat storage index for voxel `(i, j, k)`, per the x-fastest ordering
    /// bound in the interface.
    pub fn index(&self, i: u32, j: u32, k: u32) -> usize {
        i as usize + self.dims.nx as usize * (j as usize + self.dims.ny as usize * k as usize)
    }

    pub fn at(&self, i: u32, j: u32, k: u32) -> Voxel {
        debug_assert!(i < self.dims.nx && j < self.dims.ny && k < self.dims.nz);
        self.storage[self.index(i, j, k)]
    }

    pub fn at_mut(&mut self, i: u32, j: u32, k: u32) -> &mut Voxel {
        debug_assert!(i < self.dims.nx && j < self.dims.ny && k < self.dims.nz);
        let idx = self.index(i, j, k);
        &mut self.storage[idx]
    }

    /// Borrow the flat voxel storage, e.g. for a parallel partition.
    pub fn storage(&self) -> &[Voxel] {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut [Voxel] {
        &mut self.storage
    }

    /// World-space centre of voxel `(i, j, k)`.
    pub fn voxel_centre(&self, i: u32, j: u32, k: u32) -> Vec3 {
        self.origin
            + Vec3::new(
                (i as f32 + 0.5) * self.voxel_size.x,
                (j as f32 + 0.5) * self.voxel_size.y,
                (k as f32 + 0.5) * self.voxel_size.z,
            )
    }

    pub fn contains(&self, p: &Vec3) -> bool {
        self.aabb().contains(p)
    }

    /// Continuous grid-space coordinate of `p`, where integer values line up
    /// with voxel centres.
    fn grid_coord(&self, p: &Vec3) -> Vec3 {
        let rel = *p - self.origin;
        Vec3::new(
            rel.x / self.voxel_size.x - 0.5,
            rel.y / self.voxel_size.y - 0.5,
            rel.z / self.voxel_size.z - 0.5,
        )
    }

    /// 8-corner trilinear interpolation of `distance` at `p`. `defined` is
    /// false if `p` falls outside the grid or any of the 8 surrounding
    /// voxels has not yet been observed.
    pub fn trilinear_distance(&self, p: &Vec3) -> (f32, bool) {
        let g = self.grid_coord(p);

        let i0f = g.x.floor();
        let j0f = g.y.floor();
        let k0f = g.z.floor();

        if i0f < 0.0
            || j0f < 0.0
            || k0f < 0.0
            || i0f as i64 + 1 >= self.dims.nx as i64
            || j0f as i64 + 1 >= self.dims.ny as i64
            || k0f as i64 + 1 >= self.dims.nz as i64
        {
            return (0.0, false);
        }

        let i0 = i0f as u32;
        let j0 = j0f as u32;
        let k0 = k0f as u32;

        let tx = g.x - i0f;
        let ty = g.y - j0f;
        let tz = g.z - k0f;

        let c000 = self.at(i0, j0, k0);
        let c100 = self.at(i0 + 1, j0, k0);
        let c010 = self.at(i0, j0 + 1, k0);
        let c110 = self.at(i0 + 1, j0 + 1, k0);
        let c001 = self.at(i0, j0, k0 + 1);
        let c101 = self.at(i0 + 1, j0, k0 + 1);
        let c011 = self.at(i0, j0 + 1, k0 + 1);
        let c111 = self.at(i0 + 1, j0 + 1, k0 + 1);

        if [c000, c100, c010, c110, c001, c101, c011, c111]
            .iter()
            .any(|c| !c.is_seen())
        {
            return (0.0, false);
        }

        let lerp = |a: f32, b: f32, t: f32| a * (1.0 - t) + b * t;

        let c00 = lerp(c000.distance, c100.distance, tx);
        let c10 = lerp(c010.distance, c110.distance, tx);
        let c01 = lerp(c001.distance, c101.distance, tx);
        let c11 = lerp(c011.distance, c111.distance, tx);

        let c0 = lerp(c00, c10, ty);
        let c1 = lerp(c01, c11, ty);

        (lerp(c0, c1, tz), true)
    }

    /// Central-difference gradient of the trilinear distance field at `p`,
    /// unnormalised. Axes where a neighbouring sample is undefined fall back
    /// to a one-sided difference; if neither side is defined the component
    /// is zero.
    pub fn gradient(&self, p: &Vec3) -> Vec3 {
        let axis = |offset: Vec3, step: f32| -> f32 {
            let (plus, plus_ok) = self.trilinear_distance(&(*p + offset));
            let (minus, minus_ok) = self.trilinear_distance(&(*p - offset));

            match (plus_ok, minus_ok) {
                (true, true) => (plus - minus) / (2.0 * step),
                (true, false) => {
                    let (centre, _) = self.trilinear_distance(p);
                    (plus - centre) / step
                }
                (false, true) => {
                    let (centre, _) = self.trilinear_distance(p);
                    (centre - minus) / step
                }
                (false, false) => 0.0,
            }
        };

        Vec3::new(
            axis(Vec3::new(self.voxel_size.x, 0.0, 0.0), self.voxel_size.x),
            axis(Vec3::new(0.0, self.voxel_size.y, 0.0), self.voxel_size.y),
            axis(Vec3::new(0.0, 0.0, self.voxel_size.z), self.voxel_size.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> VoxelGrid {
        VoxelGrid::new(
            Dims { nx: 4, ny: 4, nz: 4 },
            Vec3::new(4.0, 4.0, 4.0),
            Vec3::zero(),
            1.0,
            10.0,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_args() {
        assert!(VoxelGrid::new(
            Dims { nx: 0, ny: 1, nz: 1 },
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::zero(),
            1.0,
            1.0
        )
        .is_err());

        assert!(VoxelGrid::new(
            Dims { nx: 1, ny: 1, nz: 1 },
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::zero(),
            0.0,
            1.0
        )
        .is_err());
    }

    #[test]
    fn test_index_is_x_fastest() {
        let g = small_grid();
        assert_eq!(g.index(0, 0, 0), 0);
        assert_eq!(g.index(1, 0, 0), 1);
        assert_eq!(g.index(0, 1, 0), 4);
        assert_eq!(g.index(0, 0, 1), 16);
    }

    #[test]
    fn test_voxel_centre_is_corner_plus_half_voxel() {
        let g = small_grid();
        assert_eq!(g.voxel_centre(0, 0, 0), Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_trilinear_undefined_when_unseen() {
        let g = small_grid();
        let (_, defined) = g.trilinear_distance(&Vec3::new(2.0, 2.0, 2.0));
        assert!(!defined);
    }

    #[test]
    fn test_trilinear_defined_and_interpolates() {
        let mut g = small_grid();

        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    g.at_mut(i, j, k).weight = 1.0;
                    g.at_mut(i, j, k).distance = if i < 2 { -1.0 } else { 1.0 };
                }
            }
        }

        let (d_left, ok) = g.trilinear_distance(&Vec3::new(1.5, 2.0, 2.0));
        assert!(ok);
        assert!(d_left < 0.0);

        let (d_right, ok) = g.trilinear_distance(&Vec3::new(2.5, 2.0, 2.0));
        assert!(ok);
        assert!(d_right > 0.0);
    }

    #[test]
    fn test_gradient_points_towards_increasing_distance() {
        let mut g = small_grid();
        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    g.at_mut(i, j, k).weight = 1.0;
                    g.at_mut(i, j, k).distance = i as f32;
                }
            }
        }

        let grad = g.gradient(&Vec3::new(2.0, 2.0, 2.0));
        assert!(grad.x > 0.0);
        assert!(grad.y.abs() < 1e-4);
        assert!(grad.z.abs() < 1e-4);
    }
}
