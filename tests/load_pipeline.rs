//! End-to-end loads through the filesystem fetcher.

use std::fs;
use std::path::PathBuf;

use nalgebra::Point3;
use short_volume::{
    Dimensions, FileSystemFetcher, GeometryDescriptor, Pattern, PatternGenerator,
    RawVolumeDecoder, ScalarGrid, VolumeError, VolumeGeometry, VolumeHandle, VolumeLoader,
};

struct StudyDir {
    path: PathBuf,
}

impl StudyDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("short-volume-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    fn location(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn write_series(&self, series: &str, grid: &ScalarGrid, geometry: &VolumeGeometry) {
        let descriptor = GeometryDescriptor::from(geometry);
        fs::write(
            VolumeLoader::geometry_location(&self.location(), series),
            serde_json::to_vec(&descriptor).unwrap(),
        )
        .unwrap();
        fs::write(
            VolumeLoader::image_location(&self.location(), series),
            RawVolumeDecoder::encode(grid).unwrap(),
        )
        .unwrap();
    }
}

impl Drop for StudyDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn patterned(nx: usize, ny: usize, nz: usize, pattern: Pattern) -> ScalarGrid {
    let mut grid = ScalarGrid::new(Dimensions::new(nx, ny, nz).unwrap());
    PatternGenerator::fill(&mut grid, &pattern).unwrap();
    grid
}

fn oblique_geometry() -> VolumeGeometry {
    VolumeGeometry::from_direction_values(
        [-120.0, -80.5, 42.0],
        [0.8, 0.8, 2.5],
        [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    )
    .unwrap()
}

#[tokio::test]
async fn loads_series_written_to_disk() {
    let study = StudyDir::new("load");
    let grid = patterned(16, 8, 4, Pattern::Checkerboard { num_tiles: 4 });
    let geometry = oblique_geometry();
    study.write_series("1.2.3", &grid, &geometry);

    let mut handle = VolumeHandle::new();
    handle.set_source_location(study.location());
    handle
        .load("1.2.3", &FileSystemFetcher, &RawVolumeDecoder)
        .await
        .unwrap();

    assert_eq!(handle.series_identifier(), "1.2.3");
    assert_eq!(handle.pixels().unwrap(), grid.pixels());
    assert_eq!(handle.geometry().unwrap(), &geometry);
    assert_eq!(handle.extent().unwrap(), [0, 15, 0, 7, 0, 3]);

    let world = handle
        .index_to_world_transform()
        .unwrap()
        .transform_point(&Point3::origin());
    assert_eq!(world, Point3::new(-120.0, -80.5, 42.0));
}

#[tokio::test]
async fn failed_reload_keeps_previous_volume() {
    let study = StudyDir::new("reload-fail");
    let grid = patterned(8, 8, 2, Pattern::AllIntensities);
    study.write_series("a", &grid, &VolumeGeometry::default());

    let mut handle = VolumeHandle::new();
    handle.set_source_location(study.location());
    handle
        .load("a", &FileSystemFetcher, &RawVolumeDecoder)
        .await
        .unwrap();

    let err = handle
        .load("missing", &FileSystemFetcher, &RawVolumeDecoder)
        .await
        .unwrap_err();
    assert!(matches!(err, VolumeError::ResourceUnavailable(_)));
    assert_eq!(handle.series_identifier(), "a");
    assert_eq!(handle.pixels().unwrap(), grid.pixels());
}

#[tokio::test]
async fn missing_samples_fail_at_decode() {
    let study = StudyDir::new("no-samples");
    let grid = patterned(4, 4, 1, Pattern::Constant { intensity: 1 });
    study.write_series("b", &grid, &VolumeGeometry::default());
    fs::remove_file(VolumeLoader::image_location(&study.location(), "b")).unwrap();

    let mut handle = VolumeHandle::new();
    handle.set_source_location(study.location());
    let err = handle
        .load("b", &FileSystemFetcher, &RawVolumeDecoder)
        .await
        .unwrap_err();
    assert!(matches!(err, VolumeError::DecodeError(_)));
    assert!(!handle.is_loaded());
}

#[tokio::test]
async fn reload_replaces_grid_and_geometry() {
    let study = StudyDir::new("reload");
    let first = patterned(6, 6, 3, Pattern::Clock { phase_arm: 2 });
    let second = patterned(10, 4, 2, Pattern::ZGradientSquares);
    study.write_series("first", &first, &oblique_geometry());
    study.write_series("second", &second, &VolumeGeometry::default());

    let mut handle = VolumeHandle::new();
    handle.set_source_location(study.location());
    handle
        .load("first", &FileSystemFetcher, &RawVolumeDecoder)
        .await
        .unwrap();
    handle
        .load("second", &FileSystemFetcher, &RawVolumeDecoder)
        .await
        .unwrap();

    assert_eq!(handle.dimensions().unwrap(), second.dimensions());
    assert_eq!(handle.pixels().unwrap(), second.pixels());
    assert_eq!(handle.geometry().unwrap(), &VolumeGeometry::default());
}

#[tokio::test]
async fn independent_handles_load_concurrently() {
    let study = StudyDir::new("concurrent");
    let left = patterned(5, 5, 5, Pattern::AllIntensities);
    let right = patterned(
        5,
        5,
        5,
        Pattern::DiagonalStripes {
            pixels_per_fill: 2,
            pixels_horizontal_spacing: 1,
            on_value: 40,
            off_value: -40,
        },
    );
    study.write_series("left", &left, &VolumeGeometry::default());
    study.write_series("right", &right, &oblique_geometry());

    let mut first = VolumeHandle::new();
    let mut second = VolumeHandle::new();
    first.set_source_location(study.location());
    second.set_source_location(study.location());

    let (a, b) = tokio::join!(
        first.load("left", &FileSystemFetcher, &RawVolumeDecoder),
        second.load("right", &FileSystemFetcher, &RawVolumeDecoder),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(first.pixels().unwrap(), left.pixels());
    assert_eq!(second.pixels().unwrap(), right.pixels());
}
