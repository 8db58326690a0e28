use std::f64::consts::{FRAC_PI_2, TAU};

use log::debug;
use ndarray::{Array3, Zip};

use crate::enums::Pattern;
use crate::error::{Result, VolumeError};
use crate::grid::{Dimensions, ScalarGrid};

const WHITE_TILE: i16 = 1000;
const BLACK_TILE: i16 = 500;
const MARKER: i16 = 2000;
const HUB: i16 = 2000;
const HUB_RADIUS: f64 = 5.0;
const TIP: i16 = 1000;
const TIP_RADIUS: f64 = 3.0;
/// Clock arm positions per full turn.
const CLOCK_STEPS: usize = 35;
const RAMP_PERIOD: usize = 64 * 64;

/// Deterministic test-pattern fills.
///
/// Every generator is a pure function of the grid dimensions and its
/// parameters; [`PatternGenerator::fill`] writes the result into a grid in one
/// step.
pub struct PatternGenerator;

impl PatternGenerator {
    /// Replace the samples of `grid` with `pattern`.
    pub fn fill(grid: &mut ScalarGrid, pattern: &Pattern) -> Result<()> {
        let values = Self::generate(grid.dimensions(), pattern)?;
        grid.load_array(values)
    }

    pub fn generate(dimensions: Dimensions, pattern: &Pattern) -> Result<Array3<i16>> {
        debug!("generating {pattern:?} for {dimensions:?}");
        match *pattern {
            Pattern::Checkerboard { num_tiles } => Self::checkerboard(dimensions, num_tiles),
            Pattern::DiagonalStripes {
                pixels_per_fill,
                pixels_horizontal_spacing,
                on_value,
                off_value,
            } => Self::diagonal_stripes(
                dimensions,
                pixels_per_fill,
                pixels_horizontal_spacing,
                on_value,
                off_value,
            ),
            Pattern::Clock { phase_arm } => Ok(Self::clock(dimensions, phase_arm)),
            Pattern::Constant { intensity } => Ok(Self::constant(dimensions, intensity)),
            Pattern::AllIntensities => Ok(Self::all_intensities(dimensions)),
            Pattern::ZGradientSquares => Ok(Self::z_gradient_squares(dimensions)),
        }
    }

    /// Per-slice checkerboard of `num_tiles` x `num_tiles` tiles.
    ///
    /// Z is not tiled: tile parity is `(tx + ty + z) % 2`, so neighbouring
    /// slices are inverted. Even parity is 1000, odd is 500. Every slice also
    /// gets a 2000 orientation marker in its low corner.
    pub fn checkerboard(dimensions: Dimensions, num_tiles: usize) -> Result<Array3<i16>> {
        let Dimensions { nx, ny, nz } = dimensions;
        if num_tiles == 0 || num_tiles > nx || num_tiles > ny {
            return Err(VolumeError::InvalidParameter(format!(
                "cannot split {nx}x{ny} slices into {num_tiles} tiles per axis"
            )));
        }
        let tile_x = nx / num_tiles;
        let tile_y = ny / num_tiles;

        let mut canvas = Canvas::new(dimensions);
        Zip::indexed(&mut canvas.data).par_for_each(|(z, y, x), value| {
            let (tx, ty) = (x / tile_x, y / tile_y);
            // remainder columns and rows past the last whole tile stay 0
            if tx < num_tiles && ty < num_tiles {
                *value = if (tx + ty + z) % 2 == 0 {
                    WHITE_TILE
                } else {
                    BLACK_TILE
                };
            }
        });

        let marker = tile_x.min(tile_y) as f64 / 8.0;
        for z in 0..nz {
            canvas.fill_square(marker, marker, z, marker, MARKER);
        }
        Ok(canvas.data)
    }

    /// Oblique stripes across all three axes: a voxel is `on_value` when
    /// `(x + y + z) % (pixels_per_fill + pixels_horizontal_spacing)` is below
    /// `pixels_per_fill`.
    pub fn diagonal_stripes(
        dimensions: Dimensions,
        pixels_per_fill: usize,
        pixels_horizontal_spacing: usize,
        on_value: i16,
        off_value: i16,
    ) -> Result<Array3<i16>> {
        let period = pixels_per_fill + pixels_horizontal_spacing;
        if period == 0 {
            return Err(VolumeError::InvalidParameter(
                "stripe period must be positive".into(),
            ));
        }
        let mut data = Array3::zeros(dimensions.shape());
        Zip::indexed(&mut data).par_for_each(|(z, y, x), value| {
            *value = if (x + y + z) % period < pixels_per_fill {
                on_value
            } else {
                off_value
            };
        });
        Ok(data)
    }

    /// Two clock arms per slice around the slice center. The first arm turns
    /// with z, one step per slice; the second is fixed by `phase_arm`.
    pub fn clock(dimensions: Dimensions, phase_arm: usize) -> Array3<i16> {
        let center_x = dimensions.nx as f64 / 2.0;
        let center_y = dimensions.ny as f64 / 2.0;
        let z_arm_length = dimensions.nx as f64 / 4.0;
        let phase_arm_length = dimensions.nx as f64 / 2.5;
        let phase_angle = clock_angle(phase_arm);

        let mut canvas = Canvas::new(dimensions);
        for z in 0..dimensions.nz {
            canvas.draw_arm(center_x, center_y, z, clock_angle(z), z_arm_length);
            canvas.draw_arm(center_x, center_y, z, phase_angle, phase_arm_length);
        }
        canvas.data
    }

    /// Every voxel set to `intensity` except flat indices 10 and 11, which hold
    /// the i16 minimum and maximum.
    pub fn constant(dimensions: Dimensions, intensity: i16) -> Array3<i16> {
        let mut data = Array3::from_elem(dimensions.shape(), intensity);
        if let Some(pixels) = data.as_slice_mut() {
            if let Some(low) = pixels.get_mut(10) {
                *low = i16::MIN;
            }
            if let Some(high) = pixels.get_mut(11) {
                *high = i16::MAX;
            }
        }
        data
    }

    /// A 0..4095 ramp repeating along the flat buffer.
    pub fn all_intensities(dimensions: Dimensions) -> Array3<i16> {
        let Dimensions { nx, ny, .. } = dimensions;
        Array3::from_shape_fn(dimensions.shape(), |(z, y, x)| {
            ((z * nx * ny + y * nx + x) % RAMP_PERIOD) as i16
        })
    }

    /// Per slice, a row of small squares six rows above the center, one per
    /// x in `[0, nx / 4)`. Each column is stamped `-x * 100` and then
    /// overwritten with `x * 100`.
    pub fn z_gradient_squares(dimensions: Dimensions) -> Array3<i16> {
        let row = (dimensions.ny / 2).saturating_sub(6) as f64;
        let columns = (dimensions.nx as f64 / 4.0).ceil() as usize;

        let mut canvas = Canvas::new(dimensions);
        for z in 0..dimensions.nz {
            for x in 0..columns {
                let shade = i16::try_from(x * 100).unwrap_or(i16::MAX);
                let column = ((x + 1) * 2) as f64;
                canvas.fill_square(column, row, z, 1.0, -shade);
                canvas.fill_square(column, row, z, 1.0, shade);
            }
        }
        canvas.data
    }
}

fn clock_angle(step: usize) -> f64 {
    (step % CLOCK_STEPS) as f64 * TAU / CLOCK_STEPS as f64 + FRAC_PI_2
}

/// Scratch volume for the stamp-based patterns. Stamps are clipped to the
/// grid instead of failing, so patterns work on grids of any size.
struct Canvas {
    dimensions: Dimensions,
    data: Array3<i16>,
}

impl Canvas {
    fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            data: Array3::zeros(dimensions.shape()),
        }
    }

    /// Fill the half-open square `[c - radius, c + radius)` on both axes.
    /// Fractional edges round up to the next voxel.
    fn fill_square(&mut self, x: f64, y: f64, z: usize, radius: f64, value: i16) {
        if z >= self.dimensions.nz {
            return;
        }
        let (x0, x1) = clip(x - radius, x + radius, self.dimensions.nx);
        let (y0, y1) = clip(y - radius, y + radius, self.dimensions.ny);
        for iy in y0..y1 {
            for ix in x0..x1 {
                self.data[[z, iy, ix]] = value;
            }
        }
    }

    fn draw_arm(&mut self, x: f64, y: f64, z: usize, radians: f64, length: f64) {
        let tip_x = round_half_up(x + radians.sin() * length);
        let tip_y = round_half_up(y + radians.cos() * length);
        self.fill_square(x, y, z, HUB_RADIUS, HUB);
        self.fill_square(tip_x, tip_y, z, TIP_RADIUS, TIP);
    }
}

fn clip(start: f64, end: f64, len: usize) -> (usize, usize) {
    let lo = start.ceil().max(0.0) as usize;
    let hi = (end.ceil().max(0.0) as usize).min(len);
    (lo.min(hi), hi)
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
