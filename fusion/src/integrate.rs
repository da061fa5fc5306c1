//! TSDF integration: fusing one depth frame into a [`VoxelGrid`].

use geo::Vec3;
use rayon::prelude::*;

use crate::camera::Camera;
use crate::depth::DepthImage;
use crate::error::{Error, Result};
use crate::grid::VoxelGrid;
use crate::voxel::Voxel;

fn check_dims(grid_camera_width: u32, grid_camera_height: u32, depth: &DepthImage) -> Result<()> {
    if depth.width() != grid_camera_width || depth.height() != grid_camera_height {
        return Err(Error::PreconditionViolation(format!(
            "depth image is {}x{} but camera intrinsics are {}x{}",
            depth.width(),
            depth.height(),
            grid_camera_width,
            grid_camera_height
        )));
    }
    Ok(())
}

/// Weighted running-average update of a single voxel given its world centre.
/// Returns the voxel unchanged if the centre doesn't land on a valid,
/// in-range depth measurement.
fn fuse(centre: Vec3, camera: &Camera, depth: &DepthImage, trunc: f32, w_max: f32, voxel: Voxel) -> Voxel {
    let (u, v, z_cam) = camera.world_to_pixel(&centre);
    if z_cam <= 0.0 {
        return voxel;
    }

    let u = u.round();
    let v = v.round();
    if u < 0.0 || v < 0.0 {
        return voxel;
    }

    let d_meas = match depth.at(u as u32, v as u32) {
        Some(0) | None => return voxel,
        Some(d) => d as f32,
    };

    let sdf = d_meas - z_cam;
    if sdf < -trunc {
        return voxel;
    }

    let tsdf = sdf.clamp(-trunc, trunc) / trunc;
    let w_new = 1.0;

    let w_sum = voxel.weight + w_new;
    let distance = if voxel.weight > 0.0 {
        (voxel.weight * voxel.distance + w_new * tsdf) / w_sum
    } else {
        tsdf
    };

    Voxel {
        distance,
        weight: w_sum.min(w_max),
    }
}

/// Fuse `depth`, observed from `camera`, into `grid`.
pub fn integrate(grid: &mut VoxelGrid, depth: &DepthImage, camera: &Camera) -> Result<()> {
    let intrinsics = camera.intrinsics();
    check_dims(intrinsics.width, intrinsics.height, depth)?;

    let dims = grid.dims();
    let trunc = grid.trunc();
    let w_max = grid.w_max();

    for k in 0..dims.nz {
        for j in 0..dims.ny {
            for i in 0..dims.nx {
                let centre = grid.voxel_centre(i, j, k);
                let updated = fuse(centre, camera, depth, trunc, w_max, grid.at(i, j, k));
                *grid.at_mut(i, j, k) = updated;
            }
        }
    }

    Ok(())
}

/// Parallel counterpart of [`integrate`]: partitions the flat voxel storage
/// into per-row chunks with `par_chunks_mut`, mirroring the way a row-major
/// image buffer is split for multi-threaded rendering.
pub fn integrate_parallel(grid: &mut VoxelGrid, depth: &DepthImage, camera: &Camera) -> Result<()> {
    let intrinsics = camera.intrinsics();
    check_dims(intrinsics.width, intrinsics.height, depth)?;

    let dims = grid.dims();
    let origin = grid.origin();
    let voxel_size = grid.voxel_size();
    let trunc = grid.trunc();
    let w_max = grid.w_max();
    let nx = dims.nx as usize;
    let ny = dims.ny as usize;

    grid.storage_mut()
        .par_chunks_mut(nx)
        .enumerate()
        .for_each(|(row_idx, row)| {
            let j = (row_idx % ny) as u32;
            let k = (row_idx / ny) as u32;

            for (i, voxel) in row.iter_mut().enumerate() {
                let centre = origin
                    + Vec3::new(
                        (i as f32 + 0.5) * voxel_size.x,
                        (j as f32 + 0.5) * voxel_size.y,
                        (k as f32 + 0.5) * voxel_size.z,
                    );
                *voxel = fuse(centre, camera, depth, trunc, w_max, *voxel);
            }
        });

    Ok(())
}
