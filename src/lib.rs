//! SeisCorr is a CPU-first normalized cross-correlation engine for
//! matched-filter detection on continuous multi-channel data.
//!
//! Templates are correlated with channels in the time domain or with
//! overlap-save FFTs, optionally in parallel via the `rayon` feature. The
//! resulting traces are stacked, thresholded, and reduced to declustered
//! detections.

mod trace;

pub mod candidate;
pub mod correlate;
pub mod detect;
pub mod dispatch;
pub mod fft;
pub mod kernel;
pub mod lowlevel;
pub mod refine;
pub mod signal;
pub mod stats;
pub mod template;
pub mod util;

pub use candidate::{
    decluster, decluster_with, find_peaks, find_peaks_with, multi_find_peaks, DeclusterConfig,
    MultiPeaks, Peak, PeakConfig, Polarity, Threshold,
};
pub use correlate::{
    correlate, multi_normxcorr_fft, multi_normxcorr_fft_with, multi_normxcorr_time,
    multi_normxcorr_time_threaded, normxcorr_fft, normxcorr_fft_main, normxcorr_fft_threaded,
    normxcorr_time, normxcorr_time_threaded, CorrelateConfig, Correlation, CorrelationBlock,
};
pub use detect::{lag_calc, lag_calc_bank, DetectConfig, Detection, Detector, Lag};
pub use dispatch::Parallelism;
pub use kernel::{FftConfig, Method};
pub use signal::SignalBlock;
pub use stats::{Conditioning, Status, ACCEPTED_DIFF, WARN_DIFF};
pub use template::{BankLayout, TemplateBank, TemplatePlan};
pub use util::{SeisCorrError, SeisCorrResult};
