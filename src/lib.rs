//! # short-volume
//!
//! An in-memory model for 3D volumes of signed 16-bit samples, the kind of
//! data CT and MRI series are made of, together with the world-space
//! geometry a renderer needs to place them.
//!
//! The crate is organised around three pieces:
//!  - [`ScalarGrid`]: the voxel buffer, addressed row-major with x fastest,
//!    with checked point writes, whole-slice copies and modification events
//!    for downstream caches
//!  - [`PatternGenerator`]: deterministic test patterns (checkerboard,
//!    diagonal stripes, clock hands, constant with sentinels, intensity ramp,
//!    signed gradient squares) for exercising renderers without real data
//!  - [`VolumeHandle`]: a grid plus its [`VolumeGeometry`] (origin, spacing,
//!    direction cosines) and series annotations, loadable asynchronously from
//!    a geometry descriptor and a sample resource
//!
//! Fetching and sample decoding are pluggable through [`ResourceFetcher`]
//! and [`ImageDecoder`]; the crate ships a filesystem fetcher and a decoder
//! for headered raw volumes.
//!
//! # Examples
//!
//! ## Building a test volume
//!
//! ```
//! # use short_volume::{Dimensions, Pattern, PatternGenerator, VolumeHandle};
//! let dims = Dimensions::new(128, 128, 32).expect("dimensions are positive");
//! let mut volume = VolumeHandle::with_dimensions(dims, None);
//! let grid = volume.grid_mut().expect("handle was built with a grid");
//! PatternGenerator::fill(grid, &Pattern::Checkerboard { num_tiles: 8 })
//!     .expect("8 tiles fit a 128 voxel slice");
//! assert_eq!(grid.value(20, 20, 0).unwrap(), 1000);
//! ```
//!
//! ## Loading a series
//!
//! ```no_run
//! # use short_volume::{FileSystemFetcher, RawVolumeDecoder, VolumeHandle};
//! # async fn run() -> short_volume::Result<()> {
//! let mut volume = VolumeHandle::new();
//! volume.set_source_location("study");
//! volume.load("1.2.840.1", &FileSystemFetcher, &RawVolumeDecoder).await?;
//! let index_to_world = volume.index_to_world_transform()?;
//! # Ok(())
//! # }
//! ```

pub mod enums;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod patterns;
pub mod volume;
pub mod volume_loader;

pub use enums::{LoadStage, Orientation, Pattern};
pub use error::{Result, VolumeError};
pub use geometry::{GeometryDescriptor, VolumeGeometry};
pub use grid::{Dimensions, ScalarGrid};
pub use patterns::PatternGenerator;
pub use volume::{Annotation, VolumeHandle, WindowLevel};
pub use volume_loader::{
    FetchResponse, FileSystemFetcher, ImageDecoder, LoadObserver, LoadedVolume, NoopObserver,
    RawVolumeDecoder, ResourceFetcher, VolumeLoader,
};
