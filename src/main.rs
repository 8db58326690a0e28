use std::env;

use short_volume::{
    Dimensions, FileSystemFetcher, Orientation, Pattern, PatternGenerator, RawVolumeDecoder,
    VolumeHandle, WindowLevel,
};

/// Slice shown by the demo, as in the browser bootstrap.
const SHOWN_SLICE: usize = 12;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let volume = match args.as_slice() {
        [study_dir, series_uid] => {
            let mut volume = VolumeHandle::new();
            volume.set_source_location(study_dir.as_str());
            volume
                .load(series_uid, &FileSystemFetcher, &RawVolumeDecoder)
                .await
                .expect("should have loaded series from study directory");
            volume
        }
        _ => {
            let dims = Dimensions::new(128, 128, 32).expect("demo dimensions are positive");
            let mut volume = VolumeHandle::with_dimensions(dims, None);
            let grid = volume.grid_mut().expect("demo volume owns a grid");
            PatternGenerator::fill(grid, &Pattern::Checkerboard { num_tiles: 8 })
                .expect("should have filled checkerboard");
            volume
        }
    };

    let depth = volume.dimensions().expect("volume is loaded").nz;
    let image = volume
        .get_image_from_axis(
            SHOWN_SLICE.min(depth - 1),
            Orientation::Axial,
            WindowLevel::default(),
        )
        .expect("should have returned image of shown slice");
    image.save("result.png").expect("should have written result.png");
}
