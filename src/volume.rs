use crate::enums::Orientation;
use crate::error::{Result, VolumeError};
use crate::geometry::VolumeGeometry;
use crate::grid::{Dimensions, ScalarGrid};
use crate::volume_loader::{
    ImageDecoder, LoadObserver, LoadedVolume, NoopObserver, ResourceFetcher, VolumeLoader,
};

use image::ImageBuffer;
use image::Luma;
use log::debug;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A note attached to a series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "Text", alias = "text")]
    pub text: String,
    #[serde(flatten)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Annotation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            properties: BTreeMap::new(),
        }
    }
}

/// Linear intensity window used when turning samples into 8-bit pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowLevel {
    level: f64,
    window: f64,
}

impl Default for WindowLevel {
    fn default() -> Self {
        Self {
            level: 1000.0,
            window: 2000.0,
        }
    }
}

impl WindowLevel {
    pub fn new(level: f64, window: f64) -> Result<Self> {
        if !window.is_finite() || window <= 0.0 || !level.is_finite() {
            return Err(VolumeError::InvalidParameter(format!(
                "window {window} / level {level} is not a usable intensity window"
            )));
        }
        Ok(Self { level, window })
    }

    #[inline]
    fn normalize_to_u8(&self, value: i16) -> u8 {
        let lower = self.level - self.window / 2.0;
        ((f64::from(value) - lower) / self.window * 255.0).clamp(0.0, 255.0) as u8
    }
}

/// A series: one grid, its world geometry and its annotations.
///
/// A handle starts empty and is filled either directly with
/// [`VolumeHandle::from_parts`] or by [`VolumeHandle::load`]. A failed load
/// leaves the previous grid and geometry in place.
#[derive(Debug, Default)]
pub struct VolumeHandle {
    series_identifier: String,
    source_location: Option<String>,
    annotations: Vec<Annotation>,
    volume: Option<LoadedVolume>,
}

impl VolumeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(grid: ScalarGrid, geometry: VolumeGeometry) -> Self {
        Self {
            volume: Some(LoadedVolume { grid, geometry }),
            ..Self::default()
        }
    }

    /// Allocate a zero-filled grid, placed by `geometry` or at the origin with
    /// unit spacing.
    pub fn with_dimensions(dimensions: Dimensions, geometry: Option<VolumeGeometry>) -> Self {
        Self::from_parts(ScalarGrid::new(dimensions), geometry.unwrap_or_default())
    }

    pub fn series_identifier(&self) -> &str {
        &self.series_identifier
    }

    pub fn source_location(&self) -> Option<&str> {
        self.source_location.as_deref()
    }

    pub fn set_source_location(&mut self, location: impl Into<String>) {
        self.source_location = Some(location.into());
    }

    pub fn is_loaded(&self) -> bool {
        self.volume.is_some()
    }

    /// Load `series_identifier` from the source location, replacing any
    /// previously held grid and geometry once every stage has succeeded.
    pub async fn load<F, D>(
        &mut self,
        series_identifier: &str,
        fetcher: &F,
        decoder: &D,
    ) -> Result<()>
    where
        F: ResourceFetcher,
        D: ImageDecoder,
    {
        self.load_with_observer(series_identifier, fetcher, decoder, &mut NoopObserver)
            .await
    }

    pub async fn load_with_observer<F, D, O>(
        &mut self,
        series_identifier: &str,
        fetcher: &F,
        decoder: &D,
        observer: &mut O,
    ) -> Result<()>
    where
        F: ResourceFetcher,
        D: ImageDecoder,
        O: LoadObserver,
    {
        let loaded = VolumeLoader::load(
            self.source_location.as_deref(),
            series_identifier,
            fetcher,
            decoder,
            observer,
        )
        .await?;
        self.series_identifier = series_identifier.to_string();
        self.volume = Some(loaded);
        Ok(())
    }

    pub fn grid(&self) -> Result<&ScalarGrid> {
        self.loaded().map(|volume| &volume.grid)
    }

    pub fn grid_mut(&mut self) -> Result<&mut ScalarGrid> {
        self.loaded_mut().map(|volume| &mut volume.grid)
    }

    pub fn geometry(&self) -> Result<&VolumeGeometry> {
        self.loaded().map(|volume| &volume.geometry)
    }

    pub fn set_geometry(&mut self, geometry: VolumeGeometry) -> Result<()> {
        self.loaded_mut()?.geometry = geometry;
        Ok(())
    }

    pub fn pixels(&self) -> Result<&[i16]> {
        Ok(self.grid()?.pixels())
    }

    pub fn dimensions(&self) -> Result<Dimensions> {
        Ok(self.grid()?.dimensions())
    }

    pub fn extent(&self) -> Result<[usize; 6]> {
        Ok(self.dimensions()?.extent())
    }

    pub fn origin(&self) -> Result<Point3<f64>> {
        Ok(self.geometry()?.origin())
    }

    pub fn spacing(&self) -> Result<Vector3<f64>> {
        Ok(self.geometry()?.spacing())
    }

    pub fn direction_matrix(&self) -> Result<Matrix3<f64>> {
        Ok(*self.geometry()?.direction())
    }

    pub fn index_to_world_transform(&self) -> Result<Matrix4<f64>> {
        Ok(self.geometry()?.index_to_world())
    }

    /// Notify the grid's subscribers that its samples changed.
    pub fn mark_dirty(&mut self) -> Result<()> {
        self.grid_mut()?.mark_dirty();
        Ok(())
    }

    pub fn copy_slice_from_array(
        &mut self,
        source: &[i16],
        z: usize,
        source_offset: usize,
    ) -> Result<()> {
        self.grid_mut()?
            .copy_slice_from_array(source, z, source_offset)
    }

    pub fn copy_slice_from_grid(&mut self, source: &ScalarGrid, z: usize) -> Result<()> {
        self.grid_mut()?.copy_slice_from_grid(source, z)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
    }

    pub fn dump_annotations(&self, title: &str) {
        debug!("annotations of {title}:");
        for annotation in &self.annotations {
            debug!("  {}", annotation.text);
        }
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Result<ArrayView2<'_, i16>> {
        let data = self.grid()?.data();
        if !Self::is_valid_index(data.dim(), index, orientation) {
            let (nz, ny, nx) = data.dim();
            let requested = match orientation {
                Orientation::Axial => (0, 0, index),
                Orientation::Coronal => (0, index, 0),
                Orientation::Sagittal => (index, 0, 0),
            };
            return Err(VolumeError::IndexOutOfRange {
                index: requested,
                bounds: (nx, ny, nz),
            });
        }
        Ok(match orientation {
            Orientation::Axial => data.slice(s![index, .., ..]),
            Orientation::Coronal => data.slice(s![.., index, ..]),
            Orientation::Sagittal => data.slice(s![.., .., index]),
        })
    }

    /// Render one slice to an 8-bit grayscale image through `window`.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        window: WindowLevel,
    ) -> Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.get_slice_from_axis(index, orientation)?;
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&v| window.normalize_to_u8(v))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data).ok_or_else(|| {
            VolumeError::InvalidParameter(format!("{width}x{height} slice does not fit an image"))
        })
    }

    fn loaded(&self) -> Result<&LoadedVolume> {
        self.volume.as_ref().ok_or(VolumeError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedVolume> {
        self.volume.as_mut().ok_or(VolumeError::NotLoaded)
    }

    fn is_valid_index(dim: (usize, usize, usize), index: usize, orientation: Orientation) -> bool {
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}
