//! Ordered composition of sample transforms.

use cysto_core::Image;
use rand::rngs::StdRng;

use super::sync::{OnChannel, SampleTransform};
use super::transforms::Transform;
use crate::error::Result;

/// Steps applied to a sample in order, all drawing from the same
/// per-sample generator.
#[derive(Debug, Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn SampleTransform>>,
}

impl Pipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step over all channels.
    pub fn then(mut self, step: impl SampleTransform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a step over channel `index` only.
    pub fn on(self, index: usize, transform: impl Transform + 'static) -> Self {
        self.then(OnChannel::new(index, transform))
    }

    /// Append a step over channel `index` if `enabled`.
    pub fn on_if(self, enabled: bool, index: usize, transform: impl Transform + 'static) -> Self {
        if enabled {
            self.on(index, transform)
        } else {
            self
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl SampleTransform for Pipeline {
    fn apply(&self, channels: Vec<Image>, rng: &mut StdRng) -> Result<Vec<Image>> {
        self.steps
            .iter()
            .try_fold(channels, |channels, step| step.apply(channels, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ElementWiseScale, EndoMask, MaskFill, Synchronized};
    use rand::SeedableRng;

    #[test]
    fn test_steps_run_in_order() {
        let pipeline = Pipeline::new()
            .on(1, ElementWiseScale(10.0))
            .then(Synchronized::new(
                EndoMask::fixed(1.0),
                vec![MaskFill::Value(-1.0), MaskFill::Value(0.0)],
            ))
            .on_if(false, 0, ElementWiseScale(0.0));
        assert_eq!(pipeline.len(), 2);

        let out = pipeline
            .apply(
                vec![Image::filled(1, 4, 4, 1.0), Image::filled(1, 4, 4, 1.0)],
                &mut StdRng::seed_from_u64(0),
            )
            .unwrap();
        assert_eq!(out[0].get(0, 0, 0), -1.0);
        assert_eq!(out[0].get(0, 2, 2), 1.0);
        assert_eq!(out[1].get(0, 0, 0), 0.0);
        assert_eq!(out[1].get(0, 2, 2), 10.0);
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let img = vec![Image::filled(3, 2, 2, 0.25)];
        let out = Pipeline::new()
            .apply(img.clone(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(out, img);
    }
}
