use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use log::debug;
use ndarray::{Array3, ArrayView2, ArrayViewMut2, s};

use crate::error::{Result, VolumeError};

/// Extent of a grid in voxels along x, y and z.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Dimensions {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Result<Self> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(VolumeError::InvalidParameter(format!(
                "grid dimensions must be positive, got ({nx}, {ny}, {nz})"
            )));
        }
        let dimensions = Self { nx, ny, nz };
        if dimensions.checked_len().is_none() {
            return Err(VolumeError::InvalidParameter(format!(
                "grid of ({nx}, {ny}, {nz}) voxels is too large to address"
            )));
        }
        Ok(dimensions)
    }

    /// Voxel count, or `None` if it does not fit an allocation.
    pub fn checked_len(&self) -> Option<usize> {
        self.nx
            .checked_mul(self.ny)?
            .checked_mul(self.nz)
            .filter(|&len| len <= isize::MAX as usize)
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of voxels in one XY plane.
    pub fn slice_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Storage shape as (depth, height, width).
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nz, self.ny, self.nx)
    }

    /// Flat row-major offset of (x, y, z), x fastest.
    pub fn index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        (x < self.nx && y < self.ny && z < self.nz)
            .then(|| z * self.nx * self.ny + y * self.nx + x)
    }

    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    /// Inclusive index bounds `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub fn extent(&self) -> [usize; 6] {
        [
            0,
            self.nx.saturating_sub(1),
            0,
            self.ny.saturating_sub(1),
            0,
            self.nz.saturating_sub(1),
        ]
    }
}

/// A 3D grid of signed 16-bit samples.
///
/// Samples live in an `(nz, ny, nx)` array in standard layout, so the flat
/// buffer returned by [`ScalarGrid::pixels`] is addressed as
/// `z * nx * ny + y * nx + x`. The grid never changes shape after
/// construction.
///
/// Every bulk mutation ends with [`ScalarGrid::mark_dirty`], which bumps the
/// modification stamp and forwards it to all subscribers so that cached
/// render state can be invalidated.
#[derive(Debug)]
pub struct ScalarGrid {
    data: Array3<i16>,
    modified: u64,
    subscribers: Vec<UnboundedSender<u64>>,
}

impl Clone for ScalarGrid {
    /// Clones samples and stamp; subscribers stay with the original.
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            modified: self.modified,
            subscribers: Vec::new(),
        }
    }
}

impl ScalarGrid {
    /// Allocate a zero-filled grid.
    pub fn new(dimensions: Dimensions) -> Self {
        debug!(
            "allocating {}x{}x{} scalar grid",
            dimensions.nx, dimensions.ny, dimensions.nz
        );
        Self {
            data: Array3::zeros(dimensions.shape()),
            modified: 0,
            subscribers: Vec::new(),
        }
    }

    /// Build a grid that takes ownership of `samples`.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::SizeMismatch`] if `samples` does not hold exactly
    /// `nx * ny * nz` values.
    pub fn from_samples(dimensions: Dimensions, samples: Vec<i16>) -> Result<Self> {
        let actual = samples.len();
        let data = Array3::from_shape_vec(dimensions.shape(), samples).map_err(|_| {
            VolumeError::SizeMismatch {
                expected: dimensions.len(),
                actual,
            }
        })?;
        Ok(Self {
            data,
            modified: 0,
            subscribers: Vec::new(),
        })
    }

    /// Get the dimensions of the grid
    pub fn dimensions(&self) -> Dimensions {
        let (nz, ny, nx) = self.data.dim();
        Dimensions { nx, ny, nz }
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    /// The flat sample buffer.
    pub fn pixels(&self) -> &[i16] {
        self.data
            .as_slice()
            .expect("grid storage is always in standard layout")
    }

    /// Mutable flat sample buffer. Call [`ScalarGrid::mark_dirty`] once done.
    pub fn pixels_mut(&mut self) -> &mut [i16] {
        self.data
            .as_slice_mut()
            .expect("grid storage is always in standard layout")
    }

    /// The flat sample buffer as native-endian bytes, ready for upload.
    pub fn pixel_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.pixels())
    }

    /// Replace every sample with `samples`.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::SizeMismatch`] if the length is not
    /// `nx * ny * nz`; the grid is left untouched in that case.
    pub fn load_values_from(&mut self, samples: &[i16]) -> Result<()> {
        let expected = self.dimensions().len();
        if samples.len() != expected {
            return Err(VolumeError::SizeMismatch {
                expected,
                actual: samples.len(),
            });
        }
        self.pixels_mut().copy_from_slice(samples);
        self.mark_dirty();
        Ok(())
    }

    pub(crate) fn load_array(&mut self, data: Array3<i16>) -> Result<()> {
        if data.dim() != self.data.dim() {
            return Err(VolumeError::SizeMismatch {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.data = data;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_all_to(&mut self, value: i16) {
        self.data.fill(value);
        self.mark_dirty();
    }

    /// Read one voxel.
    pub fn value(&self, x: usize, y: usize, z: usize) -> Result<i16> {
        self.check_bounds(x, y, z)?;
        Ok(self.data[[z, y, x]])
    }

    /// Write one voxel.
    ///
    /// Point writes do not notify subscribers; batch them and call
    /// [`ScalarGrid::mark_dirty`] afterwards.
    pub fn set_value(&mut self, x: usize, y: usize, z: usize, value: i16) -> Result<()> {
        self.check_bounds(x, y, z)?;
        self.data[[z, y, x]] = value;
        Ok(())
    }

    /// View of the XY plane at `z`, indexed `[y, x]`.
    pub fn slice(&self, z: usize) -> Result<ArrayView2<'_, i16>> {
        self.check_bounds(0, 0, z)?;
        Ok(self.data.slice(s![z, .., ..]))
    }

    pub fn slice_mut(&mut self, z: usize) -> Result<ArrayViewMut2<'_, i16>> {
        self.check_bounds(0, 0, z)?;
        Ok(self.data.slice_mut(s![z, .., ..]))
    }

    /// Copy `nx * ny` contiguous values of `source`, starting at
    /// `source_offset`, into plane `z`.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::IndexOutOfRange`] if `z >= nz` and
    /// [`VolumeError::SizeMismatch`] if `source` is too short to supply a full
    /// slice from `source_offset`.
    pub fn copy_slice_from_array(
        &mut self,
        source: &[i16],
        z: usize,
        source_offset: usize,
    ) -> Result<()> {
        let dims = self.dimensions();
        self.check_bounds(0, 0, z)?;

        let slice_len = dims.slice_len();
        let end = source_offset.saturating_add(slice_len);
        let values = source
            .get(source_offset..end)
            .ok_or(VolumeError::SizeMismatch {
                expected: end,
                actual: source.len(),
            })?;

        let target = z * slice_len;
        self.pixels_mut()[target..target + slice_len].copy_from_slice(values);
        self.mark_dirty();
        Ok(())
    }

    /// Copy plane `z` of `source` into plane `z` of this grid.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::DimensionMismatch`] if the XY extents differ and
    /// [`VolumeError::IndexOutOfRange`] if `z` is outside either grid.
    pub fn copy_slice_from_grid(&mut self, source: &ScalarGrid, z: usize) -> Result<()> {
        let own = self.dimensions();
        let other = source.dimensions();
        if (own.nx, own.ny) != (other.nx, other.ny) {
            return Err(VolumeError::DimensionMismatch {
                expected: (own.nx, own.ny),
                actual: (other.nx, other.ny),
            });
        }
        source.check_bounds(0, 0, z)?;
        self.copy_slice_from_array(source.pixels(), z, other.slice_len() * z)
    }

    /// Signal that the samples changed.
    pub fn mark_dirty(&mut self) {
        self.modified += 1;
        let stamp = self.modified;
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(stamp).is_ok());
    }

    /// Number of modifications since construction.
    pub fn modified_stamp(&self) -> u64 {
        self.modified
    }

    /// Receive the modification stamp after every [`ScalarGrid::mark_dirty`].
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> UnboundedReceiver<u64> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    fn check_bounds(&self, x: usize, y: usize, z: usize) -> Result<()> {
        let dims = self.dimensions();
        match dims.index(x, y, z) {
            Some(_) => Ok(()),
            None => Err(VolumeError::IndexOutOfRange {
                index: (x, y, z),
                bounds: dims.as_tuple(),
            }),
        }
    }
}
