//! Dense raycasting: turning a [`VoxelGrid`] into vertex/normal images from
//! a given [`Camera`] viewpoint.

use geo::Vec3;
use rayon::prelude::*;

use crate::camera::Camera;
use crate::grid::VoxelGrid;

/// Sentinel written for pixels where no surface was hit.
fn miss() -> Vec3 {
    Vec3::new(f32::NAN, f32::NAN, f32::NAN)
}

/// March a single ray through `grid`, returning `(vertex, normal)`, each
/// [`miss`] if the ray never crosses the surface.
fn cast_ray(grid: &VoxelGrid, origin: Vec3, dir: Vec3) -> (Vec3, Vec3) {
    let ray = geo::Ray::new(origin, dir);
    let (t_near, t_far) = grid.aabb().intersect(&ray);

    if t_far <= t_near.max(0.0) {
        return (miss(), miss());
    }

    let voxel_size = grid.voxel_size();
    let step = 0.5 * voxel_size.x.min(voxel_size.y).min(voxel_size.z);

    let mut t = t_near.max(0.0);

    // Skip forward until we find a defined sample to start marching from.
    let mut d_prev = loop {
        if t > t_far {
            return (miss(), miss());
        }
        let (d, defined) = grid.trilinear_distance(&ray.point_at(t));
        if defined {
            break d;
        }
        t += step;
    };

    let mut t_prev = t;
    t += step;

    while t <= t_far {
        let p_curr = ray.point_at(t);
        let (d_curr, defined) = grid.trilinear_distance(&p_curr);

        if !defined {
            t_prev = t;
            t += step;
            d_prev = d_curr;
            continue;
        }

        if d_curr == 0.0 {
            let normal = -grid.gradient(&p_curr).normalized();
            return (p_curr, normal);
        }

        if d_prev > 0.0 && d_curr <= 0.0 {
            let dt = t - t_prev;
            let t_hit = t_prev + dt * d_prev / (d_prev - d_curr);
            let vertex = ray.point_at(t_hit);
            let normal = -grid.gradient(&vertex).normalized();
            return (vertex, normal);
        }

        t_prev = t;
        d_prev = d_curr;
        t += step;
    }

    (miss(), miss())
}

/// Raycast `grid` from `camera`'s viewpoint, producing row-major vertex and
/// normal images sized to the camera's intrinsics.
pub fn raycast(grid: &VoxelGrid, camera: &Camera) -> (Vec<Vec3>, Vec<Vec3>) {
    let intrinsics = camera.intrinsics();
    let n = intrinsics.width as usize * intrinsics.height as usize;

    let mut vertices = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);

    for v in 0..intrinsics.height {
        for u in 0..intrinsics.width {
            let ray = camera.pixel_to_ray(u, v);
            let (vertex, normal) = cast_ray(grid, ray.origin, ray.dir);
            vertices.push(vertex);
            normals.push(normal);
        }
    }

    (vertices, normals)
}

/// Parallel counterpart of [`raycast`]: partitions the output images into
/// per-row chunks with `par_chunks_mut`, mirroring the image-buffer split
/// used by the multi-threaded integrator.
pub fn raycast_parallel(grid: &VoxelGrid, camera: &Camera) -> (Vec<Vec3>, Vec<Vec3>) {
    let intrinsics = camera.intrinsics();
    let width = intrinsics.width as usize;
    let n = width * intrinsics.height as usize;

    let mut vertices = vec![miss(); n];
    let mut normals = vec![miss(); n];

    vertices
        .par_chunks_mut(width)
        .zip(normals.par_chunks_mut(width))
        .enumerate()
        .for_each(|(v, (vert_row, norm_row))| {
            for (u, (vertex, normal)) in vert_row.iter_mut().zip(norm_row.iter_mut()).enumerate() {
                let ray = camera.pixel_to_ray(u as u32, v as u32);
                let (hit_v, hit_n) = cast_ray(grid, ray.origin, ray.dir);
                *vertex = hit_v;
                *normal = hit_n;
            }
        });

    (vertices, normals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Intrinsics, Pose};
    use crate::grid::Dims;
    use crate::voxel::Voxel;
    use geo::Mat3;

    fn small_intrinsics(width: u32, height: u32) -> Intrinsics {
        Intrinsics {
            fx: 50.0,
            fy: 50.0,
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            width,
            height,
        }
    }

    /// A grid that is a ball of negative distance inside radius `r`,
    /// positive outside, centred in the grid.
    fn sphere_grid(r: f32) -> VoxelGrid {
        let dims = Dims {
            nx: 32,
            ny: 32,
            nz: 32,
        };
        let size = Vec3::new(32.0, 32.0, 32.0);
        let origin = Vec3::new(-16.0, -16.0, -16.0);
        let mut grid = VoxelGrid::new(dims, size, origin, 4.0, 10.0).unwrap();

        for k in 0..dims.nz {
            for j in 0..dims.ny {
                for i in 0..dims.nx {
                    let c = grid.voxel_centre(i, j, k);
                    let d = c.norm() - r;
                    *grid.at_mut(i, j, k) = Voxel {
                        distance: d.clamp(-4.0, 4.0) / 4.0,
                        weight: 1.0,
                    };
                }
            }
        }
        grid
    }

    #[test]
    fn test_empty_grid_raycast_is_all_miss() {
        let dims = Dims {
            nx: 4,
            ny: 4,
            nz: 4,
        };
        let grid = VoxelGrid::new(dims, Vec3::new(4.0, 4.0, 4.0), Vec3::zero(), 1.0, 10.0).unwrap();

        let camera = Camera::new(
            small_intrinsics(8, 8),
            Pose::new(Mat3::identity(), Vec3::new(2.0, 2.0, -10.0)),
        );

        let (vertices, normals) = raycast(&grid, &camera);
        assert!(vertices.iter().all(|v| v.x.is_nan()));
        assert!(normals.iter().all(|n| n.x.is_nan()));
    }

    #[test]
    fn test_sphere_raycast_hits_front_surface() {
        let grid = sphere_grid(8.0);
        let camera = Camera::new(
            small_intrinsics(16, 16),
            Pose::new(Mat3::identity(), Vec3::new(0.0, 0.0, -15.0)),
        );

        let (vertices, normals) = raycast(&grid, &camera);

        let centre_idx = 8 * 16 + 8;
        let hit = vertices[centre_idx];
        let normal = normals[centre_idx];

        assert!(!hit.x.is_nan());
        assert!((hit.norm() - 8.0).abs() < 1.0);
        // normal = -normalise(gradient); gradient points radially outward
        // (towards increasing/positive distance), so normal points inward.
        assert!(normal.dot(&hit.normalized()) < -0.9);
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let grid = sphere_grid(8.0);
        let camera = Camera::new(
            small_intrinsics(16, 16),
            Pose::new(Mat3::identity(), Vec3::new(0.0, 0.0, -15.0)),
        );

        let (v_seq, n_seq) = raycast(&grid, &camera);
        let (v_par, n_par) = raycast_parallel(&grid, &camera);

        for (a, b) in v_seq.iter().zip(v_par.iter()) {
            if a.x.is_nan() {
                assert!(b.x.is_nan());
            } else {
                assert!(a.dist(b) < 1e-4);
            }
        }
        for (a, b) in n_seq.iter().zip(n_par.iter()) {
            if a.x.is_nan() {
                assert!(b.x.is_nan());
            } else {
                assert!(a.dist(b) < 1e-4);
            }
        }
    }
}
