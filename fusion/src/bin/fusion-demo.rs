//! Synthesizes a handful of depth frames of a sphere, fuses them into a
//! TSDF grid, raycasts it and extracts a mesh, writing both out to disk.

use clap::Parser;
use geo::Mat3;
use log::info;

use fusion::camera::{Camera, Intrinsics, Pose};
use fusion::depth::DepthImage;
use fusion::error::Result;
use fusion::grid::{Dims, VoxelGrid};
use fusion::{integrate, mc, raycast, serialize};

#[derive(Parser)]
#[command(about = "Fuse synthetic depth frames of a sphere into a TSDF mesh")]
struct Args {
    /// Number of voxels along each grid axis.
    #[arg(long, default_value_t = 64)]
    resolution: u32,

    /// Physical size of the grid along each axis, in millimetres.
    #[arg(long, default_value_t = 2000.0)]
    size_mm: f32,

    /// Truncation distance, in millimetres.
    #[arg(long, default_value_t = 100.0)]
    trunc_mm: f32,

    /// Number of synthetic viewpoints to integrate.
    #[arg(long, default_value_t = 8)]
    frames: u32,

    /// Output path for the binary grid blob.
    #[arg(long, default_value = "grid.tsdf")]
    grid_out: String,

    /// Output path for the extracted ASCII PLY mesh.
    #[arg(long, default_value = "mesh.ply")]
    mesh_out: String,
}

/// A synthetic sphere, radius in millimetres, used as the scene observed by
/// every depth frame.
fn render_sphere_depth(camera: &Camera, radius: f32) -> DepthImage {
    let intrinsics = camera.intrinsics();
    let mut data = vec![0u16; (intrinsics.width * intrinsics.height) as usize];

    for v in 0..intrinsics.height {
        for u in 0..intrinsics.width {
            let ray = camera.pixel_to_ray(u, v);

            // Ray-sphere intersection, sphere centred at the world origin.
            let oc = ray.origin;
            let b = oc.dot(&ray.dir);
            let c = oc.dot(&oc) - radius * radius;
            let disc = b * b - c;

            if disc >= 0.0 {
                let t = -b - disc.sqrt();
                if t > 0.0 {
                    let hit = ray.point_at(t);
                    let (_, _, z_cam) = camera.world_to_pixel(&hit);
                    if z_cam > 0.0 {
                        data[(v * intrinsics.width + u) as usize] = z_cam.round() as u16;
                    }
                }
            }
        }
    }

    DepthImage::new(intrinsics.width, intrinsics.height, data)
}

fn run(args: &Args) -> Result<()> {
    let dims = Dims {
        nx: args.resolution,
        ny: args.resolution,
        nz: args.resolution,
    };
    let half = args.size_mm / 2.0;
    let mut grid = VoxelGrid::new(
        dims,
        geo::Vec3::new(args.size_mm, args.size_mm, args.size_mm),
        geo::Vec3::new(-half, -half, -half),
        args.trunc_mm,
        32.0,
    )?;

    let intrinsics = Intrinsics {
        fx: 525.0,
        fy: 525.0,
        cx: 319.5,
        cy: 239.5,
        width: 640,
        height: 480,
    };

    let radius = args.size_mm * 0.3;
    let orbit_radius = args.size_mm * 0.9;

    for i in 0..args.frames {
        let angle = 2.0 * std::f32::consts::PI * i as f32 / args.frames as f32;
        let position = geo::Vec3::new(
            orbit_radius * angle.cos(),
            0.0,
            orbit_radius * angle.sin(),
        );

        let camera = Camera::new(intrinsics, Camera::look_at(position, geo::Vec3::zero()));
        let depth = render_sphere_depth(&camera, radius);

        info!("integrating frame {i} from {position:?}");
        integrate::integrate(&mut grid, &depth, &camera)?;
    }

    info!("raycasting front view");
    let front_camera = Camera::new(
        intrinsics,
        Pose::new(Mat3::identity(), geo::Vec3::new(0.0, 0.0, -orbit_radius)),
    );
    let (vertices, _normals) = raycast::raycast_parallel(&grid, &front_camera);
    let hits = vertices.iter().filter(|v| !v.x.is_nan()).count();
    info!("raycast produced {hits} surface hits out of {}", vertices.len());

    info!("extracting mesh");
    let triangles = mc::extract_parallel(&grid);
    info!("extracted {} triangles", triangles.len());

    info!("writing grid blob to {}", args.grid_out);
    let grid_file = std::fs::File::create(&args.grid_out)?;
    serialize::save_grid(&grid, std::io::BufWriter::new(grid_file))?;

    info!("writing mesh to {}", args.mesh_out);
    let mesh_file = std::fs::File::create(&args.mesh_out)?;
    serialize::write_ply(&triangles, std::io::BufWriter::new(mesh_file))?;

    Ok(())
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("fusion-demo: {e}");
        std::process::exit(1);
    }
}
