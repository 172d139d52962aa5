//! Statistics and risk configuration (Immutable Blueprints)

pub struct FitSettings {
    /// Below this many returns the Johnson-SU fit is refused outright.
    pub min_samples: usize,
    pub max_iterations: usize,
    /// Stop when the simplex's function-value spread falls below this (relative to the best value)
    pub f_tolerance: f64,
    /// ...and its largest vertex distance from the best vertex falls below this.
    pub x_tolerance: f64,
}

pub struct AnalysisConfig {
    pub default_confidence_level: f64,
    pub default_histogram_bins: usize,
    /// Points sampled across the return range for density overlays.
    pub curve_points: usize,
    /// Box plot whiskers reach this many IQRs beyond the quartiles.
    pub whisker_iqr: f64,
    pub fit: FitSettings,
}

pub const ANALYSIS: AnalysisConfig = AnalysisConfig {
    default_confidence_level: 0.05,
    default_histogram_bins: 50,
    curve_points: 200,
    whisker_iqr: 1.5,
    fit: FitSettings {
        min_samples: 30,
        max_iterations: 10_000,
        f_tolerance: 1e-10,
        x_tolerance: 1e-6,
    },
};
