#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

/// Procedural fills understood by [`PatternGenerator::fill`].
///
/// [`PatternGenerator::fill`]: crate::patterns::PatternGenerator::fill
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Checkerboard {
        num_tiles: usize,
    },
    DiagonalStripes {
        pixels_per_fill: usize,
        pixels_horizontal_spacing: usize,
        on_value: i16,
        off_value: i16,
    },
    Clock {
        phase_arm: usize,
    },
    Constant {
        intensity: i16,
    },
    AllIntensities,
    ZGradientSquares,
}

/// The five ordered stages of [`VolumeLoader::load`].
///
/// [`VolumeLoader::load`]: crate::volume_loader::VolumeLoader::load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStage {
    FetchGeometry,
    ParseGeometry,
    FetchSamples,
    DecodeSamples,
    Assemble,
}
