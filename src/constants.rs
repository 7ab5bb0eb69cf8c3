//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "plantid";

/// Default square input size (pixels) for both classifiers.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Default number of gate predictions inspected by the heuristic.
pub const DEFAULT_GATE_TOP_K: usize = 5;

/// Default number of species guesses shown to the user.
pub const DEFAULT_SPECIES_TOP_K: usize = 3;

/// Number of color channels fed to the classifiers (RGB).
pub const CHANNELS: usize = 3;

/// Label used for indices that have no entry in the label set.
pub const PLACEHOLDER_LABEL_PREFIX: &str = "class_";

/// Shown when a prediction set is empty.
pub const NO_LABEL: &str = "—";

/// Default asset locations, relative to the working directory.
pub mod assets {
    /// Gate model (MobileNet v2, ImageNet classes).
    pub const GATE_MODEL: &str = "models/gate/mobilenet_v2_1.0_224.onnx";
    /// Gate labels, one per line.
    pub const GATE_LABELS: &str = "models/gate/labels.txt";
    /// Species model.
    pub const SPECIES_MODEL: &str = "models/species/model.onnx";
    /// Species labels, `id,label` rows.
    pub const SPECIES_LABELS: &str = "models/species/labels.csv";
}

/// Thresholds used when deciding whether raw output is already a distribution.
pub mod probability {
    /// Lower bound of the accepted probability sum.
    pub const SUM_MIN: f32 = 0.98;
    /// Upper bound of the accepted probability sum.
    pub const SUM_MAX: f32 = 1.02;
    /// Allowed excursion of a single element outside [0, 1].
    pub const ELEMENT_TOLERANCE: f32 = 1e-3;
    /// Minimum valid probability.
    pub const MIN: f32 = 0.0;
    /// Maximum valid probability.
    pub const MAX: f32 = 1.0;
}

/// Pixel normalization constants.
pub mod pixel {
    /// Largest channel value.
    pub const MAX: f32 = 255.0;
    /// Midpoint used for signed normalization.
    pub const MIDPOINT: f32 = 127.5;
}

/// Gate heuristic defaults, tuned for ImageNet-1k labels.
pub mod gate {
    /// Minimum probability for a plant-like prediction in the strict pass.
    pub const MIN_PROB_ANY: f32 = 0.18;

    /// Minimum probability for the first plant-like prediction in the fallback pass.
    pub const MIN_PROB_TOP: f32 = 0.12;

    /// Label fragments that mark a class as plant-like.
    pub const PLANT_KEYWORDS: &[&str] = &[
        "acorn",
        "acorn squash",
        "anemone",
        "artichoke",
        "banana",
        "bell pepper",
        "broccoli",
        "buckeye",
        "butternut squash",
        "cabbage",
        "cardoon",
        "cauliflower",
        "corn",
        "cucumber",
        "custard apple",
        "daisy",
        "fig",
        "granny smith",
        "hip",
        "jackfruit",
        "lemon",
        "orange",
        "pineapple",
        "pomegranate",
        "potato",
        "rapeseed",
        "sorrel",
        "spaghetti squash",
        "strawberry",
        "vine",
        "yellow lady's slipper",
        "zucchini",
        "pot",
    ];

    /// Label fragments that commonly produce false plant matches.
    pub const NEGATIVE_KEYWORDS: &[&str] =
        &["sea anemone", "coral", "fungus", "mushroom", "jellyfish"];
}
