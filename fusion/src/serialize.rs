//! Binary grid persistence and ASCII PLY mesh export.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use geo::Vec3;

use crate::error::{Error, Result};
use crate::grid::{Dims, VoxelGrid};
use crate::mc::Triangle;
use crate::voxel::Voxel;

const MAGIC: &[u8; 4] = b"TSDF";
const VERSION: u8 = 1;

/// Write `grid`'s binary blob: magic, version, dims, size, origin, trunc,
/// `w_max`, then the flat voxel array in x-fastest order.
pub fn save_grid(grid: &VoxelGrid, mut w: impl Write) -> Result<()> {
    w.write_all(MAGIC)?;
    w.write_u8(VERSION)?;

    let dims = grid.dims();
    w.write_u32::<LittleEndian>(dims.nx)?;
    w.write_u32::<LittleEndian>(dims.ny)?;
    w.write_u32::<LittleEndian>(dims.nz)?;

    let write_vec3 = |w: &mut dyn Write, v: Vec3| -> io::Result<()> {
        w.write_f32::<LittleEndian>(v.x)?;
        w.write_f32::<LittleEndian>(v.y)?;
        w.write_f32::<LittleEndian>(v.z)
    };

    write_vec3(&mut w, grid.size())?;
    write_vec3(&mut w, grid.origin())?;

    w.write_f32::<LittleEndian>(grid.trunc())?;
    w.write_f32::<LittleEndian>(grid.w_max())?;

    for voxel in grid.storage() {
        w.write_f32::<LittleEndian>(voxel.distance)?;
        w.write_f32::<LittleEndian>(voxel.weight)?;
    }

    Ok(())
}

/// Read a grid blob written by [`save_grid`]. Returns `io_error` on
/// truncation or a magic mismatch.
pub fn load_grid(mut r: impl Read) -> Result<VoxelGrid> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "bad grid blob magic",
        )));
    }

    let version = r.read_u8()?;
    if version != VERSION {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported grid blob version {version}"),
        )));
    }

    let dims = Dims {
        nx: r.read_u32::<LittleEndian>()?,
        ny: r.read_u32::<LittleEndian>()?,
        nz: r.read_u32::<LittleEndian>()?,
    };

    let read_vec3 = |r: &mut dyn Read| -> io::Result<Vec3> {
        let x = r.read_f32::<LittleEndian>()?;
        let y = r.read_f32::<LittleEndian>()?;
        let z = r.read_f32::<LittleEndian>()?;
        Ok(Vec3::new(x, y, z))
    };

    let size = read_vec3(&mut r)?;
    let origin = read_vec3(&mut r)?;

    let trunc = r.read_f32::<LittleEndian>()?;
    let w_max = r.read_f32::<LittleEndian>()?;

    let mut grid = VoxelGrid::new(dims, size, origin, trunc, w_max)?;

    for voxel in grid.storage_mut() {
        let distance = r.read_f32::<LittleEndian>()?;
        let weight = r.read_f32::<LittleEndian>()?;
        *voxel = Voxel { distance, weight };
    }

    Ok(grid)
}

/// Write `triangles` as an ASCII PLY mesh: a flat, duplicated vertex per
/// triangle corner (no index sharing), each with its own normal.
pub fn write_ply(triangles: &[Triangle], mut w: impl Write) -> io::Result<()> {
    let nvertices = triangles.len() * 3;

    writeln!(w, "ply")?;
    writeln!(w, "format ascii 1.0")?;
    writeln!(w, "element vertex {nvertices}")?;
    writeln!(w, "property float x")?;
    writeln!(w, "property float y")?;
    writeln!(w, "property float z")?;
    writeln!(w, "property float nx")?;
    writeln!(w, "property float ny")?;
    writeln!(w, "property float nz")?;
    writeln!(w, "element face {}", triangles.len())?;
    writeln!(w, "property list uchar int vertex_index")?;
    writeln!(w, "end_header")?;

    for tri in triangles {
        for (v, n) in tri.vertices.iter().zip(tri.normals.iter()) {
            writeln!(w, "{} {} {} {} {} {}", v.x, v.y, v.z, n.x, n.y, n.z)?;
        }
    }

    for (i, _) in triangles.iter().enumerate() {
        let base = i * 3;
        writeln!(w, "3 {} {} {}", base, base + 1, base + 2)?;
    }

    Ok(())
}
