/// Extension of the videos analyzed by the front tracker.
pub const FRONT_VIDEO_EXTENSION: &str = "avi";

/// Extension of the still images analyzed by the bubble detector.
pub const BUBBLE_IMAGE_EXTENSION: &str = "png";

/// File name of the result set persisted inside an analyzed directory.
pub const PROCESSED_DATA_FILE_NAME: &str = "ProcessedData.bin";

/// Prefix of the result set persisted next to a single analyzed image. The image's file stem
/// is appended.
pub const PROCESSED_DATA_FILE_PREFIX: &str = "ProcessedData_";

/// Upper bound on the smoothing rounds of the minimum-of-histogram threshold.
pub const MAX_HISTOGRAM_SMOOTHING_ROUNDS: usize = 10_000;

/// Side of the square neighbourhood in which a distance-map pixel must be maximal to seed a
/// watershed basin.
pub const PEAK_FOOTPRINT: u32 = 10;

/// The ROI of a video is chosen on the frame this many frames before the end.
pub const ROI_FRAME_FROM_END: usize = 10;

/// Default pixel to millimetre scale of the bubble pipeline, in px/mm.
pub const DEFAULT_SCALE_PX_PER_MM: f64 = 1.0;

/// Number of cores left free when fanning videos out over worker threads.
pub const RESERVED_CORES: usize = 1;

/// Watershed seeds must be further apart than this many pixels along at least one axis, and
/// at least this far from the image border.
pub const PEAK_MIN_DISTANCE: u32 = 1;
