//! Explanation assembly
//!
//! Turns a fitted surrogate into ranked segment contributions and a pixel
//! mask over the segmentation map.

use crate::error::{LimeError, Result};
use crate::image::{Image, SegmentIndex, SegmentationMap};
use crate::surrogate::{rank_by_magnitude, SurrogateModel};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Which contribution signs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignFilter {
    /// Segments that push the class score up
    #[default]
    Positive,
    /// Segments that push the class score down
    Negative,
    /// Either sign, ranked by magnitude
    Both,
}

impl SignFilter {
    /// Zero coefficients only pass `Both`
    pub fn accepts(&self, coefficient: f64) -> bool {
        match self {
            SignFilter::Positive => coefficient > 0.0,
            SignFilter::Negative => coefficient < 0.0,
            SignFilter::Both => true,
        }
    }
}

/// Direction in which a segment moves the class score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContributionSign {
    Positive,
    Negative,
    Zero,
}

impl ContributionSign {
    pub fn of(coefficient: f64) -> Self {
        if coefficient > 0.0 {
            ContributionSign::Positive
        } else if coefficient < 0.0 {
            ContributionSign::Negative
        } else {
            ContributionSign::Zero
        }
    }
}

/// One selected segment and its surrogate coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentContribution {
    pub segment_id: usize,
    pub coefficient: f64,
    pub sign: ContributionSign,
}

impl SegmentContribution {
    pub fn new(segment_id: usize, coefficient: f64) -> Self {
        Self {
            segment_id,
            coefficient,
            sign: ContributionSign::of(coefficient),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.sign == ContributionSign::Positive
    }
}

/// Explanation of one class for one image
///
/// Borrows the image and map it was computed for, so the visualization
/// input is always consistent with the mask.
#[derive(Debug, Clone)]
pub struct Explanation<'a> {
    image: &'a Image,
    segmentation: &'a SegmentationMap,
    model: SurrogateModel,
    contributions: Vec<SegmentContribution>,
    mask: Array2<bool>,
}

impl<'a> Explanation<'a> {
    pub fn class_index(&self) -> Option<usize> {
        self.model.class_index
    }

    /// Selected segments, most important first
    pub fn contributions(&self) -> &[SegmentContribution] {
        &self.contributions
    }

    pub fn segment_ids(&self) -> Vec<usize> {
        self.contributions.iter().map(|c| c.segment_id).collect()
    }

    /// Pixels belonging to a selected segment
    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    /// The full surrogate behind this explanation
    pub fn model(&self) -> &SurrogateModel {
        &self.model
    }

    pub fn image(&self) -> &'a Image {
        self.image
    }

    pub fn segmentation(&self) -> &'a SegmentationMap {
        self.segmentation
    }

    /// Everything an overlay renderer needs
    pub fn visualization_input(&self) -> (&'a Image, &'a SegmentationMap, &Array2<bool>) {
        (self.image, self.segmentation, &self.mask)
    }

    /// Owned, serializable view without the image data
    pub fn summary(&self) -> ExplanationSummary {
        ExplanationSummary {
            class_index: self.model.class_index,
            contributions: self.contributions.clone(),
            coefficients: self.model.coefficients.to_vec(),
            intercept: self.model.intercept,
            score: self.model.score,
            local_prediction: self.model.local_prediction,
            masked_pixels: self.mask.iter().filter(|&&m| m).count(),
        }
    }
}

/// Serializable explanation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationSummary {
    pub class_index: Option<usize>,
    pub contributions: Vec<SegmentContribution>,
    /// Coefficient of every segment, indexed by segment id
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub score: f64,
    pub local_prediction: f64,
    pub masked_pixels: usize,
}

impl ExplanationSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Selects segments from a surrogate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Assembler {
    top_k: Option<usize>,
    sign_filter: SignFilter,
    coverage: Option<f64>,
}

impl Assembler {
    pub fn new(top_k: Option<usize>, sign_filter: SignFilter) -> Self {
        Self {
            top_k,
            sign_filter,
            coverage: None,
        }
    }

    /// Keep ranked segments until they cover this fraction of the image.
    /// `top_k` still caps the count.
    pub fn with_coverage(mut self, coverage: f64) -> Self {
        self.coverage = Some(coverage);
        self
    }

    pub fn top_k(&self) -> Option<usize> {
        self.top_k
    }

    pub fn sign_filter(&self) -> SignFilter {
        self.sign_filter
    }

    pub fn coverage(&self) -> Option<f64> {
        self.coverage
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(coverage) = self.coverage {
            if !(coverage > 0.0 && coverage <= 1.0) {
                return Err(LimeError::invalid_parameter(
                    "coverage",
                    coverage,
                    "must be in (0, 1]",
                ));
            }
        }
        Ok(())
    }

    /// Build the explanation for `model` over `segmentation`
    pub fn assemble<'a>(
        &self,
        model: SurrogateModel,
        segmentation: &'a SegmentationMap,
        image: &'a Image,
    ) -> Result<Explanation<'a>> {
        match self.coverage {
            Some(_) => {
                let index = SegmentIndex::new(segmentation);
                self.assemble_indexed(model, segmentation, image, &index)
            }
            None => self.assemble_inner(model, segmentation, image, None),
        }
    }

    /// Same as [`Assembler::assemble`] with a precomputed segment index
    pub fn assemble_indexed<'a>(
        &self,
        model: SurrogateModel,
        segmentation: &'a SegmentationMap,
        image: &'a Image,
        index: &SegmentIndex,
    ) -> Result<Explanation<'a>> {
        if index.num_segments() != segmentation.num_segments() {
            return Err(LimeError::ShapeError {
                expected: format!("{} segments", segmentation.num_segments()),
                actual: format!("segment index with {} segments", index.num_segments()),
            });
        }
        self.assemble_inner(model, segmentation, image, Some(index))
    }

    fn assemble_inner<'a>(
        &self,
        model: SurrogateModel,
        segmentation: &'a SegmentationMap,
        image: &'a Image,
        index: Option<&SegmentIndex>,
    ) -> Result<Explanation<'a>> {
        self.validate()?;
        segmentation.check_matches(image)?;
        if model.num_segments() != segmentation.num_segments() {
            return Err(LimeError::ShapeError {
                expected: format!("{} coefficients", segmentation.num_segments()),
                actual: format!("{}", model.num_segments()),
            });
        }

        let mut in_model = vec![false; model.num_segments()];
        for &id in &model.selected {
            match in_model.get_mut(id) {
                Some(flag) => *flag = true,
                None => {
                    return Err(LimeError::ShapeError {
                        expected: format!("selected ids below {}", model.num_segments()),
                        actual: format!("{}", id),
                    })
                }
            }
        }

        // segments dropped by selection never reach the explanation
        let coefficients = model.coefficients.to_vec();
        let mut ranked: Vec<SegmentContribution> = rank_by_magnitude(&coefficients)
            .into_iter()
            .filter(|&id| in_model[id] && self.sign_filter.accepts(coefficients[id]))
            .map(|id| SegmentContribution::new(id, coefficients[id]))
            .collect();

        if let (Some(coverage), Some(index)) = (self.coverage, index) {
            ranked = select_by_coverage(&ranked, index, coverage);
        }
        if let Some(k) = self.top_k {
            ranked.truncate(k);
        }

        let ids: Vec<usize> = ranked.iter().map(|c| c.segment_id).collect();
        let mask = segmentation.mask_for(&ids);

        Ok(Explanation {
            image,
            segmentation,
            model,
            contributions: ranked,
            mask,
        })
    }
}

/// Build an explanation keeping the `top_k` largest contributions that pass `sign_filter`
pub fn assemble<'a>(
    model: SurrogateModel,
    segmentation: &'a SegmentationMap,
    image: &'a Image,
    top_k: Option<usize>,
    sign_filter: SignFilter,
) -> Result<Explanation<'a>> {
    Assembler::new(top_k, sign_filter).assemble(model, segmentation, image)
}

/// Prefix of `ranked` whose segments first reach `coverage` of the image pixels
pub fn select_by_coverage(
    ranked: &[SegmentContribution],
    index: &SegmentIndex,
    coverage: f64,
) -> Vec<SegmentContribution> {
    let fractions = index.fractions();
    let mut covered = 0.0;
    let mut selected = Vec::new();

    for contribution in ranked {
        if covered >= coverage {
            break;
        }
        covered += fractions[contribution.segment_id];
        selected.push(*contribution);
    }
    selected
}
