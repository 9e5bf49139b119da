//! Matched-filter detection over multi-channel data.
//!
//! A [`Detector`] correlates its template bank with a block of channels,
//! stacks each template's channel traces, thresholds the stack and
//! declusters the surviving peaks into [`Detection`]s.

use crate::candidate::{
    decluster_with, find_peaks_with, DeclusterConfig, PeakConfig, Polarity, Threshold,
};
use crate::correlate::{multi_normxcorr_fft_with, multi_normxcorr_time_threaded};
use crate::dispatch::{self, Parallelism};
use crate::fft::PlanCache;
use crate::kernel::{FftConfig, Method};
use crate::refine::refine_peak_with;
use crate::signal::SignalBlock;
use crate::template::TemplateBank;
use crate::trace::{trace_event, trace_span};
use crate::util::{SeisCorrError, SeisCorrResult};

pub mod lag;
pub mod stack;

pub use lag::{lag_calc, lag_calc_bank, Lag};
pub use stack::{stack_channels, StackedTraces};

/// Detection pipeline options.
#[derive(Clone, Copy, Debug)]
pub struct DetectConfig {
    /// Correlation method.
    pub method: Method,
    /// Transform sizing for the frequency-domain method.
    pub fft: FftConfig,
    /// Threshold applied to each stacked trace.
    pub threshold: Threshold,
    /// Minimum distance in samples between detections of one template.
    pub min_separation: usize,
    /// Sign convention for peaks.
    pub polarity: Polarity,
    /// Worker count.
    pub parallelism: Parallelism,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            method: Method::Auto,
            fft: FftConfig::default(),
            threshold: Threshold::default(),
            min_separation: 1,
            polarity: Polarity::Positive,
            parallelism: Parallelism::available(),
        }
    }
}

/// A declustered peak of a template's stacked trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Template index in the bank.
    pub template: usize,
    /// Position in the stacked trace.
    pub index: usize,
    /// Stacked correlation at `index`.
    pub value: f32,
    /// Channels that contributed to the stack.
    pub n_channels: usize,
    /// Resolved threshold the value exceeded.
    pub threshold: f32,
    /// `index` refined to sub-sample precision.
    pub refined_index: f32,
}

/// Matched-filter detector for one template bank.
pub struct Detector {
    bank: TemplateBank,
    config: DetectConfig,
    offsets: Option<Vec<usize>>,
    plans: PlanCache,
}

impl Detector {
    /// Creates a detector with the default configuration.
    pub fn new(bank: TemplateBank) -> Self {
        Self {
            bank,
            config: DetectConfig::default(),
            offsets: None,
            plans: PlanCache::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: DetectConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets per-(template, channel) stacking offsets in template-major order.
    pub fn with_offsets(mut self, offsets: Vec<usize>) -> SeisCorrResult<Self> {
        let expected = self.bank.n_templates() * self.bank.n_channels();
        if offsets.len() != expected {
            return Err(SeisCorrError::ShapeMismatch {
                expected,
                got: offsets.len(),
            });
        }
        self.offsets = Some(offsets);
        Ok(self)
    }

    /// Returns the template bank.
    pub fn bank(&self) -> &TemplateBank {
        &self.bank
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Runs the detector over `channels`.
    ///
    /// Detections are ordered by template, then by index. Transform plans are
    /// kept between calls with the same channel length.
    pub fn detect(&mut self, channels: SignalBlock<'_>) -> SeisCorrResult<Vec<Detection>> {
        let _guard = trace_span!(
            "detect",
            n_templates = self.bank.n_templates(),
            n_channels = self.bank.n_channels()
        )
        .entered();
        let config = &self.config;
        let block = match config.method.resolve(self.bank.max_len()) {
            Method::Time => {
                multi_normxcorr_time_threaded(&self.bank, channels, &config.parallelism)?
            }
            _ => multi_normxcorr_fft_with(
                &mut self.plans,
                &self.bank,
                channels,
                &config.fft,
                &config.parallelism,
            )?,
        };
        let stacked = stack_channels(&block, self.offsets.as_deref(), &config.parallelism)?;

        let per_template = dispatch::run(
            &config.parallelism,
            (0..stacked.n_templates()).collect(),
            || Ok(()),
            |_, t: usize| {
                let trace = stacked
                    .trace(t)
                    .ok_or(SeisCorrError::InvalidInput("template index out of range"))?;
                let n_channels = stacked.used_channels(t);
                if n_channels == 0 {
                    return Ok(Vec::new());
                }
                let threshold = config.threshold.resolve(trace, n_channels);
                let peaks = find_peaks_with(
                    trace,
                    threshold,
                    &PeakConfig {
                        polarity: config.polarity,
                    },
                );
                let kept = decluster_with(
                    &peaks,
                    &DeclusterConfig {
                        min_separation: config.min_separation,
                        threshold: None,
                        polarity: config.polarity,
                    },
                );
                Ok(kept
                    .into_iter()
                    .map(|peak| Detection {
                        template: t,
                        index: peak.index,
                        value: peak.value,
                        n_channels,
                        threshold,
                        refined_index: refine_peak_with(trace, peak.index, config.polarity),
                    })
                    .collect::<Vec<_>>())
            },
        )?;

        let detections: Vec<Detection> = per_template.into_iter().flatten().collect();
        trace_event!("detections", count = detections.len());
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::{DetectConfig, Detector};
    use crate::candidate::Threshold;
    use crate::dispatch::Parallelism;
    use crate::signal::SignalBlock;
    use crate::template::TemplateBank;
    use crate::util::SeisCorrError;

    #[test]
    fn offsets_must_cover_every_pair() {
        let data: Vec<f32> = (0..12).map(|v| (v as f32 * 0.7).sin()).collect();
        let bank = TemplateBank::per_channel(SignalBlock::from_slice(&data, 3, 4).unwrap(), 3)
            .unwrap();
        let err = Detector::new(bank).with_offsets(vec![0, 0]).err().unwrap();
        assert_eq!(err, SeisCorrError::ShapeMismatch { expected: 3, got: 2 });
    }

    #[test]
    fn single_channel_detects_embedded_template() {
        let template: Vec<f32> = (0..20)
            .map(|i| (i as f32 * 0.9).sin() * (1.0 + i as f32 * 0.05))
            .collect();
        let mut channel: Vec<f32> = (0..400)
            .map(|i| 0.05 * ((i * 37 % 23) as f32 / 23.0 - 0.5))
            .collect();
        for (dst, &t) in channel[150..170].iter_mut().zip(&template) {
            *dst += t;
        }
        let bank = TemplateBank::single(&template).unwrap();
        let mut detector = Detector::new(bank).with_config(DetectConfig {
            threshold: Threshold::Absolute(0.9),
            min_separation: 10,
            parallelism: Parallelism::sequential(),
            ..DetectConfig::default()
        });
        let detections = detector.detect(SignalBlock::single(&channel).unwrap()).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].index, 150);
        assert_eq!(detections[0].n_channels, 1);
        assert!(detections[0].value > 0.99);
    }
}
