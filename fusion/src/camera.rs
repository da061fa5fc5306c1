//! Pinhole camera model: intrinsics plus a rigid world pose, used to
//! back-project pixels into rays and to project world points into the image
//! plane.

use geo::{Mat3, Ray, Vec3};

/// Pinhole intrinsics: focal lengths, principal point and image size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

/// A rigid transform from camera space to world space, plus its inverse.
///
/// Camera space follows the convention in the module's owning crate: +X
/// right, +Y down, +Z forward (into the scene).
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    rotation: Mat3,
    translation: Vec3,

    rotation_inv: Mat3,
    translation_inv: Vec3,
}

impl Pose {
    /// Build a `Pose` from a camera-to-world rotation and translation.
    pub fn new(rotation: Mat3, translation: Vec3) -> Self {
        let rotation_inv = rotation.transpose();
        let translation_inv = -rotation_inv.apply(&translation);

        Pose {
            rotation,
            translation,
            rotation_inv,
            translation_inv,
        }
    }

    pub fn rotation(&self) -> &Mat3 {
        &self.rotation
    }

    pub fn translation(&self) -> &Vec3 {
        &self.translation
    }

    /// Transform a point from camera space to world space.
    pub fn to_world(&self, p_cam: &Vec3) -> Vec3 {
        self.rotation.apply(p_cam) + self.translation
    }

    /// Transform a point from world space to camera space.
    pub fn to_camera(&self, p_world: &Vec3) -> Vec3 {
        self.rotation_inv.apply(p_world) + self.translation_inv
    }
}

/// A `Camera` backprojects pixels into rays and projects world points back
/// into the image, given fixed intrinsics and a mutable rigid pose.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    intrinsics: Intrinsics,
    pose: Pose,
}

impl Camera {
    pub fn new(intrinsics: Intrinsics, pose: Pose) -> Self {
        Camera { intrinsics, pose }
    }

    /// Position the camera at `position`, pointed towards `target`, using
    /// world +Y as the up vector. Re-establishes orthonormality of the
    /// resulting rotation via Gram-Schmidt.
    pub fn look_at(position: Vec3, target: Vec3) -> Pose {
        let world_up = Vec3::new(0.0, 1.0, 0.0);

        let forward = (target - position).normalized();
        let right = forward.cross(&world_up).normalized();
        let down = forward.cross(&right);

        let rotation = Mat3::from_columns(right, down, forward).orthonormalized();

        Pose::new(rotation, position)
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Reposition the camera without changing its orientation.
    pub fn move_to(&mut self, position: Vec3) {
        self.pose = Pose::new(self.pose.rotation, position);
    }

    /// Re-orient the camera to look at `target` from its current position.
    pub fn look_at_target(&mut self, target: Vec3) {
        self.pose = Camera::look_at(self.pose.translation, target);
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Back-project pixel `(u, v)` into a world-space `Ray` through the
    /// pixel's center.
    pub fn pixel_to_ray(&self, u: u32, v: u32) -> Ray {
        let x = (u as f32 + 0.5 - self.intrinsics.cx) / self.intrinsics.fx;
        let y = (v as f32 + 0.5 - self.intrinsics.cy) / self.intrinsics.fy;

        let dir_cam = Vec3::new(x, y, 1.0).normalized();
        let dir_world = self.pose.rotation.apply(&dir_cam).normalized();

        Ray::new(self.pose.translation, dir_world)
    }

    /// Project a world point into pixel coordinates, also returning its
    /// camera-space depth.
    pub fn world_to_pixel(&self, p_world: &Vec3) -> (f32, f32, f32) {
        let p_cam = self.pose.to_camera(p_world);

        let u = self.intrinsics.fx * p_cam.x / p_cam.z + self.intrinsics.cx;
        let v = self.intrinsics.fy * p_cam.y / p_cam.z + self.intrinsics.cy;

        (u, v, p_cam.z)
    }
}
