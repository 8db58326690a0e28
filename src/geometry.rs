use log::warn;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};

const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Placement of a voxel grid in world space.
///
/// The columns of `direction` are the world-space unit vectors of the i, j
/// and k index axes. Index coordinates map to world coordinates through
/// `translation(origin) * direction * scale(spacing)`.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeGeometry {
    origin: Point3<f64>,
    spacing: Vector3<f64>,
    direction: Matrix3<f64>,
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self {
            origin: Point3::origin(),
            spacing: Vector3::repeat(1.0),
            direction: Matrix3::identity(),
        }
    }
}

impl VolumeGeometry {
    /// Place a grid at `origin` with the given voxel `spacing` and axes.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidParameter`] if a spacing component is not
    /// strictly positive and finite. A direction matrix that is not
    /// orthonormal is accepted with a warning.
    pub fn new(origin: [f64; 3], spacing: [f64; 3], direction: Matrix3<f64>) -> Result<Self> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(VolumeError::InvalidParameter(format!(
                "spacing must be positive, got {spacing:?}"
            )));
        }
        let geometry = Self {
            origin: Point3::from(origin),
            spacing: Vector3::from(spacing),
            direction,
        };
        if !geometry.is_orthonormal() {
            warn!("direction matrix is not orthonormal: {direction}");
        }
        Ok(geometry)
    }

    /// Build from nine direction values read three at a time, each triple
    /// being the world vector of the i, j and k axis in turn.
    pub fn from_direction_values(
        origin: [f64; 3],
        spacing: [f64; 3],
        direction: [f64; 9],
    ) -> Result<Self> {
        Self::new(origin, spacing, Matrix3::from_column_slice(&direction))
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    pub fn direction(&self) -> &Matrix3<f64> {
        &self.direction
    }

    /// The direction matrix as nine values, one axis vector after another.
    pub fn direction_values(&self) -> [f64; 9] {
        let mut values = [0.0; 9];
        values.copy_from_slice(self.direction.as_slice());
        values
    }

    pub fn is_orthonormal(&self) -> bool {
        let gram = self.direction.transpose() * self.direction;
        (gram - Matrix3::identity()).abs().max() < ORTHONORMAL_TOLERANCE
    }

    pub fn index_to_world(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.origin.coords)
            * self.direction.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.spacing)
    }

    pub fn index_to_world_point(&self, index: Point3<f64>) -> Point3<f64> {
        self.origin + self.direction * index.coords.component_mul(&self.spacing)
    }

    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidParameter`] if the direction matrix is
    /// singular.
    pub fn world_to_index(&self) -> Result<Matrix4<f64>> {
        self.index_to_world().try_inverse().ok_or_else(|| {
            VolumeError::InvalidParameter("direction matrix is singular".to_string())
        })
    }

    pub fn world_to_index_point(&self, world: Point3<f64>) -> Result<Point3<f64>> {
        Ok(self.world_to_index()?.transform_point(&world))
    }
}

/// The per-series geometry record stored next to the sample resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryDescriptor {
    pub scale: [f64; 3],
    pub position: [f64; 3],
    pub direction_matrix: [f64; 9],
}

impl GeometryDescriptor {
    /// # Errors
    ///
    /// Returns [`VolumeError::DecodeError`] for malformed JSON or missing
    /// fields.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl TryFrom<&GeometryDescriptor> for VolumeGeometry {
    type Error = VolumeError;

    fn try_from(descriptor: &GeometryDescriptor) -> Result<Self> {
        VolumeGeometry::from_direction_values(
            descriptor.position,
            descriptor.scale,
            descriptor.direction_matrix,
        )
        .map_err(|err| VolumeError::DecodeError(err.to_string()))
    }
}

impl From<&VolumeGeometry> for GeometryDescriptor {
    fn from(geometry: &VolumeGeometry) -> Self {
        Self {
            scale: geometry.spacing.into(),
            position: geometry.origin.coords.into(),
            direction_matrix: geometry.direction_values(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotated() -> VolumeGeometry {
        // i -> +y, j -> -x, k -> +z
        VolumeGeometry::from_direction_values(
            [10.0, -5.0, 2.5],
            [0.5, 2.0, 3.0],
            [0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn index_origin_maps_to_origin() {
        let geometry = rotated();
        let world = geometry
            .index_to_world()
            .transform_point(&Point3::new(0.0, 0.0, 0.0));
        assert_eq!(world, Point3::new(10.0, -5.0, 2.5));
    }

    #[test]
    fn direction_triples_are_axis_columns() {
        let geometry = rotated();
        let world = geometry.index_to_world_point(Point3::new(1.0, 0.0, 0.0));
        assert_eq!(world, Point3::new(10.0, -4.5, 2.5));
        let world = geometry.index_to_world_point(Point3::new(0.0, 1.0, 0.0));
        assert_eq!(world, Point3::new(8.0, -5.0, 2.5));
        let world = geometry.index_to_world_point(Point3::new(0.0, 0.0, 2.0));
        assert_eq!(world, Point3::new(10.0, -5.0, 8.5));
    }

    #[test]
    fn matrix_and_point_paths_agree() {
        let geometry = rotated();
        let index = Point3::new(3.0, 4.0, 5.0);
        let by_matrix = geometry.index_to_world().transform_point(&index);
        let by_point = geometry.index_to_world_point(index);
        assert!((by_matrix - by_point).norm() < 1e-12);
    }

    #[test]
    fn world_to_index_inverts() {
        let geometry = rotated();
        let index = Point3::new(7.0, 1.0, 2.0);
        let world = geometry.index_to_world_point(index);
        let back = geometry.world_to_index_point(world).unwrap();
        assert!((back - index).norm() < 1e-9);
    }

    #[test]
    fn non_positive_spacing_is_rejected() {
        assert!(matches!(
            VolumeGeometry::new([0.0; 3], [1.0, 0.0, 1.0], Matrix3::identity()),
            Err(VolumeError::InvalidParameter(_))
        ));
        assert!(VolumeGeometry::new([0.0; 3], [1.0, 1.0, f64::NAN], Matrix3::identity()).is_err());
    }

    #[test]
    fn skewed_direction_is_accepted_but_flagged() {
        let skewed = Matrix3::new(1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let geometry = VolumeGeometry::new([0.0; 3], [1.0; 3], skewed).unwrap();
        assert!(!geometry.is_orthonormal());
        assert!(VolumeGeometry::default().is_orthonormal());
    }

    #[test]
    fn descriptor_parses_camel_case_fields() {
        let json = br#"{
            "scale": [0.7, 0.7, 2.0],
            "position": [-100.0, -120.5, 30.0],
            "directionMatrix": [1, 0, 0, 0, 1, 0, 0, 0, 1],
            "modality": "CT"
        }"#;
        let descriptor = GeometryDescriptor::from_json(json).unwrap();
        let geometry = VolumeGeometry::try_from(&descriptor).unwrap();
        assert_eq!(geometry.origin(), Point3::new(-100.0, -120.5, 30.0));
        assert_eq!(geometry.spacing(), Vector3::new(0.7, 0.7, 2.0));
        assert_eq!(*geometry.direction(), Matrix3::identity());
        assert_eq!(GeometryDescriptor::from(&geometry), descriptor);
    }

    #[test]
    fn descriptor_with_missing_or_short_fields_fails() {
        let missing = br#"{"scale": [1, 1, 1], "position": [0, 0, 0]}"#;
        assert!(matches!(
            GeometryDescriptor::from_json(missing),
            Err(VolumeError::DecodeError(_))
        ));
        let short = br#"{"scale": [1, 1], "position": [0, 0, 0], "directionMatrix": [1, 0, 0, 0, 1, 0, 0, 0, 1]}"#;
        assert!(GeometryDescriptor::from_json(short).is_err());
    }

    #[test]
    fn descriptor_with_zero_scale_is_a_decode_error() {
        let descriptor = GeometryDescriptor {
            scale: [1.0, 0.0, 1.0],
            position: [0.0; 3],
            direction_matrix: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        assert!(matches!(
            VolumeGeometry::try_from(&descriptor),
            Err(VolumeError::DecodeError(_))
        ));
    }
}
