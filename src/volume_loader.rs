use crate::{
    enums::LoadStage,
    error::{Result, VolumeError},
    geometry::{GeometryDescriptor, VolumeGeometry},
    grid::{Dimensions, ScalarGrid},
};

use log::{debug, info};
use std::{future::Future, io::ErrorKind, ops::ControlFlow};
use web_time::Instant;

const RAW_HEADER_LEN: usize = 3 * size_of::<u32>();

/// Body and status of one resource read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub ok: bool,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn success(body: Vec<u8>) -> Self {
        Self {
            ok: true,
            status: 200,
            body,
        }
    }

    pub fn failure(status: u16) -> Self {
        Self {
            ok: false,
            status,
            body: Vec::new(),
        }
    }
}

/// Reads a resource by location.
///
/// A fetch that reaches the resource but is refused (missing file, HTTP
/// error status) should resolve to a [`FetchResponse`] with `ok == false`;
/// `Err` is reserved for transport failures.
pub trait ResourceFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<FetchResponse>> + Send;
}

/// Fetches resources from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSystemFetcher;

impl ResourceFetcher for FileSystemFetcher {
    async fn fetch(&self, location: &str) -> Result<FetchResponse> {
        match tokio::fs::read(location).await {
            Ok(body) => Ok(FetchResponse::success(body)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(FetchResponse::failure(404)),
            Err(err) => Err(VolumeError::ResourceUnavailable(format!("{location}: {err}"))),
        }
    }
}

/// Turns a fetched sample resource into a grid.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ScalarGrid>;
}

/// Headered raw volumes: `nx`, `ny`, `nz` as little-endian u32 followed by
/// `nx * ny * nz` little-endian i16 samples, x fastest.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawVolumeDecoder;

impl RawVolumeDecoder {
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidParameter`] if an extent does not fit
    /// the u32 header fields.
    pub fn encode(grid: &ScalarGrid) -> Result<Vec<u8>> {
        let dims = grid.dimensions();
        let mut bytes = Vec::with_capacity(RAW_HEADER_LEN + 2 * dims.len());
        for extent in [dims.nx, dims.ny, dims.nz] {
            bytes.extend_from_slice(&header_extent(extent)?.to_le_bytes());
        }
        for value in grid.pixels() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Ok(bytes)
    }
}

fn header_extent(extent: usize) -> Result<u32> {
    u32::try_from(extent).map_err(|_| {
        VolumeError::InvalidParameter(format!("extent {extent} does not fit a raw volume header"))
    })
}

impl ImageDecoder for RawVolumeDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ScalarGrid> {
        if bytes.len() < RAW_HEADER_LEN {
            return Err(VolumeError::DecodeError(format!(
                "raw volume of {} bytes has no header",
                bytes.len()
            )));
        }
        let (header, payload) = bytes.split_at(RAW_HEADER_LEN);
        let mut extents = header
            .chunks_exact(size_of::<u32>())
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize);
        let (nx, ny, nz) = (
            extents.next().unwrap_or_default(),
            extents.next().unwrap_or_default(),
            extents.next().unwrap_or_default(),
        );
        let dimensions = Dimensions::new(nx, ny, nz)
            .map_err(|err| VolumeError::DecodeError(err.to_string()))?;

        let expected = dimensions
            .len()
            .checked_mul(size_of::<i16>())
            .ok_or_else(|| {
                VolumeError::DecodeError(format!("raw volume {nx}x{ny}x{nz} is too large"))
            })?;
        if payload.len() != expected {
            return Err(VolumeError::DecodeError(format!(
                "raw volume {nx}x{ny}x{nz} needs {expected} sample bytes, got {}",
                payload.len()
            )));
        }
        let samples = payload
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        ScalarGrid::from_samples(dimensions, samples)
    }
}

/// Hook called before each load stage. Returning [`ControlFlow::Break`]
/// aborts the load with [`VolumeError::LoadAborted`].
pub trait LoadObserver {
    fn stage_started(&mut self, _stage: LoadStage) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Observer that lets every stage run.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl LoadObserver for NoopObserver {}

/// Grid and geometry produced by a successful load.
#[derive(Clone, Debug)]
pub struct LoadedVolume {
    pub grid: ScalarGrid,
    pub geometry: VolumeGeometry,
}

pub struct VolumeLoader;

impl VolumeLoader {
    pub fn geometry_location(source_location: &str, series_identifier: &str) -> String {
        format!("{source_location}/{series_identifier}_geometry.json")
    }

    pub fn image_location(source_location: &str, series_identifier: &str) -> String {
        format!("{source_location}/{series_identifier}_image.vti")
    }

    /// Fetch, parse and assemble one series.
    ///
    /// Stages run strictly in order and the first failure ends the load;
    /// nothing is returned for a partially loaded series.
    ///
    /// # Errors
    ///
    /// - [`VolumeError::ResourceUnavailable`] if `source_location` is unset or
    ///   the geometry descriptor cannot be fetched
    /// - [`VolumeError::DecodeError`] for a malformed descriptor, a refused
    ///   sample fetch or an undecodable sample payload
    /// - [`VolumeError::LoadAborted`] if `observer` stops the load
    pub async fn load<F, D, O>(
        source_location: Option<&str>,
        series_identifier: &str,
        fetcher: &F,
        decoder: &D,
        observer: &mut O,
    ) -> Result<LoadedVolume>
    where
        F: ResourceFetcher,
        D: ImageDecoder,
        O: LoadObserver,
    {
        let started = Instant::now();

        Self::enter(observer, LoadStage::FetchGeometry)?;
        let source_location = source_location
            .filter(|location| !location.is_empty())
            .ok_or_else(|| {
                VolumeError::ResourceUnavailable("no source location set".to_string())
            })?;
        let geometry_location = Self::geometry_location(source_location, series_identifier);
        let response = fetcher.fetch(&geometry_location).await?;
        if !response.ok {
            return Err(VolumeError::ResourceUnavailable(format!(
                "{geometry_location} returned status {}",
                response.status
            )));
        }

        Self::enter(observer, LoadStage::ParseGeometry)?;
        let descriptor = GeometryDescriptor::from_json(&response.body)?;
        let geometry = VolumeGeometry::try_from(&descriptor)?;

        Self::enter(observer, LoadStage::FetchSamples)?;
        let image_location = Self::image_location(source_location, series_identifier);
        let response = fetcher.fetch(&image_location).await?;

        Self::enter(observer, LoadStage::DecodeSamples)?;
        if !response.ok {
            return Err(VolumeError::DecodeError(format!(
                "{image_location} returned status {}",
                response.status
            )));
        }
        let grid = decoder.decode(&response.body)?;

        Self::enter(observer, LoadStage::Assemble)?;
        let dims = grid.dimensions();
        info!(
            "loaded series {series_identifier}: {}x{}x{} voxels, extent {:?}, in {:?}",
            dims.nx,
            dims.ny,
            dims.nz,
            dims.extent(),
            started.elapsed()
        );
        Ok(LoadedVolume { grid, geometry })
    }

    fn enter<O: LoadObserver>(observer: &mut O, stage: LoadStage) -> Result<()> {
        debug!("load stage {stage:?}");
        match observer.stage_started(stage) {
            ControlFlow::Continue(()) => Ok(()),
            ControlFlow::Break(()) => Err(VolumeError::LoadAborted(stage)),
        }
    }
}
