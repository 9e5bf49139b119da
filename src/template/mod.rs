//! Template plans and multi-channel template banks.

use crate::signal::SignalBlock;
use crate::util::{SeisCorrError, SeisCorrResult};

mod plan;

pub use plan::TemplatePlan;

/// How templates map onto channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankLayout {
    /// One waveform per (template, channel) pair; template `t` on channel `c`
    /// is plan `t * n_channels + c`.
    PerChannel,
    /// One waveform per template, correlated against every channel.
    Shared,
}

/// A set of templates prepared for correlation against `n_channels` channels.
#[derive(Clone, Debug)]
pub struct TemplateBank {
    plans: Vec<TemplatePlan>,
    n_templates: usize,
    n_channels: usize,
    layout: BankLayout,
}

impl TemplateBank {
    /// Builds a bank where every template has its own waveform per channel.
    ///
    /// `templates` holds `n_templates * n_channels` signals in template-major
    /// order.
    pub fn per_channel(templates: SignalBlock<'_>, n_channels: usize) -> SeisCorrResult<Self> {
        if n_channels == 0 {
            return Err(SeisCorrError::InvalidDimensions {
                len: templates.len(),
                count: 0,
            });
        }
        if templates.count() % n_channels != 0 {
            return Err(SeisCorrError::ShapeMismatch {
                expected: (templates.count() / n_channels + 1) * n_channels,
                got: templates.count(),
            });
        }
        let plans = templates
            .signals()
            .map(TemplatePlan::new)
            .collect::<SeisCorrResult<Vec<_>>>()?;
        Self::from_plans(plans, n_channels)
    }

    /// Builds a bank where every template is correlated with every channel.
    pub fn shared(templates: SignalBlock<'_>, n_channels: usize) -> SeisCorrResult<Self> {
        if n_channels == 0 {
            return Err(SeisCorrError::InvalidDimensions {
                len: templates.len(),
                count: 0,
            });
        }
        let plans = templates
            .signals()
            .map(TemplatePlan::new)
            .collect::<SeisCorrResult<Vec<_>>>()?;
        Ok(Self {
            n_templates: plans.len(),
            plans,
            n_channels,
            layout: BankLayout::Shared,
        })
    }

    /// Builds a per-channel bank from prepared plans of possibly varying
    /// lengths, in template-major order.
    pub fn from_plans(plans: Vec<TemplatePlan>, n_channels: usize) -> SeisCorrResult<Self> {
        if plans.is_empty() || n_channels == 0 {
            return Err(SeisCorrError::InvalidDimensions {
                len: plans.len(),
                count: n_channels,
            });
        }
        if plans.len() % n_channels != 0 {
            return Err(SeisCorrError::ShapeMismatch {
                expected: (plans.len() / n_channels + 1) * n_channels,
                got: plans.len(),
            });
        }
        Ok(Self {
            n_templates: plans.len() / n_channels,
            plans,
            n_channels,
            layout: BankLayout::PerChannel,
        })
    }

    /// Wraps a single template for a single channel.
    pub fn single(template: &[f32]) -> SeisCorrResult<Self> {
        Self::from_plans(vec![TemplatePlan::new(template)?], 1)
    }

    /// Returns the plan for template `template` on channel `channel`.
    pub fn plan(&self, template: usize, channel: usize) -> Option<&TemplatePlan> {
        if template >= self.n_templates || channel >= self.n_channels {
            return None;
        }
        match self.layout {
            BankLayout::PerChannel => self.plans.get(template * self.n_channels + channel),
            BankLayout::Shared => self.plans.get(template),
        }
    }

    /// Returns the number of templates.
    pub fn n_templates(&self) -> usize {
        self.n_templates
    }

    /// Returns the number of channels the bank expects.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Returns the bank layout.
    pub fn layout(&self) -> BankLayout {
        self.layout
    }

    /// Returns the longest template length.
    pub fn max_len(&self) -> usize {
        self.plans.iter().map(TemplatePlan::len).max().unwrap_or(0)
    }

    /// Returns the distinct template lengths in ascending order.
    pub fn distinct_lens(&self) -> Vec<usize> {
        let mut lens: Vec<usize> = self.plans.iter().map(TemplatePlan::len).collect();
        lens.sort_unstable();
        lens.dedup();
        lens
    }

    /// Returns the distinct template lengths used on `channel`.
    pub(crate) fn lens_for_channel(&self, channel: usize) -> Vec<usize> {
        let mut lens: Vec<usize> = (0..self.n_templates)
            .filter_map(|t| self.plan(t, channel))
            .map(TemplatePlan::len)
            .collect();
        lens.sort_unstable();
        lens.dedup();
        lens
    }
}
