//! Discriminated classification of repeating elements into named slices.

use crate::assertion::Assertion;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::schema::ElementSchema;
use crate::state::ValidationState;
use crate::validators::{IssueAssertion, ResultAssertion};
use std::sync::Arc;
use tracing::trace;

/// A named slice: elements satisfying `condition` belong to it and are
/// validated, as a group, against `assertion`
#[derive(Debug, Clone)]
pub struct SliceCase {
    pub name: String,
    pub condition: Assertion,
    pub assertion: Assertion,
}

impl SliceCase {
    pub fn new(name: impl Into<String>, condition: Assertion, assertion: Assertion) -> Self {
        Self {
            name: name.into(),
            condition,
            assertion,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SliceValidator {
    ordered: bool,
    default_at_end: bool,
    default: Box<Assertion>,
    slices: Vec<SliceCase>,
}

impl SliceValidator {
    /// `default` validates the elements no slice claims
    pub fn new(slices: Vec<SliceCase>, default: Assertion) -> Self {
        Self {
            ordered: false,
            default_at_end: false,
            default: Box::new(default),
            slices,
        }
    }

    /// Open slicing: unclaimed elements are accepted
    pub fn open(slices: Vec<SliceCase>) -> Self {
        Self::new(slices, Assertion::Result(ResultAssertion::SUCCESS))
    }

    /// Closed slicing: every unclaimed element is an error
    pub fn closed(slices: Vec<SliceCase>) -> Self {
        let unmatched = IssueAssertion::new(
            IssueCode::SlicingUnmatched,
            "Element does not match any slice and the group is closed",
        );
        let default = ElementSchema::new("#closed-slicing-default", vec![Assertion::Issue(unmatched)]);
        Self::new(slices, default.into())
    }

    /// Elements must appear in the order the slices are declared
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Unclaimed elements may only follow all sliced ones
    pub fn default_at_end(mut self) -> Self {
        self.default_at_end = true;
        self
    }

    pub fn slices(&self) -> &[SliceCase] {
        &self.slices
    }

    pub fn default_assertion(&self) -> &Assertion {
        &self.default
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn is_default_at_end(&self) -> bool {
        self.default_at_end
    }

    pub async fn validate_many(
        &self,
        input: &[Arc<ElementNode>],
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let mut last_matched: Option<usize> = None;
        let mut default_in_use = false;
        let mut buckets: Vec<Vec<Arc<ElementNode>>> = vec![Vec::new(); self.slices.len()];
        let mut default_bucket = Vec::new();
        let mut violations = Vec::new();

        for (index, candidate) in input.iter().enumerate() {
            let element_state = if input.len() > 1 {
                state.with_index(index)
            } else {
                state.clone()
            };

            let mut claimed = None;
            for (slice_index, slice) in self.slices.iter().enumerate() {
                let condition_state = element_state.with_slice(&slice.name);
                let report = slice
                    .condition
                    .validate_one(candidate, context, &condition_state)
                    .await?;
                if report.is_successful() {
                    claimed = Some(slice_index);
                    break;
                }
            }

            let Some(slice_index) = claimed else {
                trace!(index, "element falls into the default slice");
                default_in_use = true;
                default_bucket.push(Arc::clone(candidate));
                continue;
            };
            let slice = &self.slices[slice_index];
            trace!(index, slice = %slice.name, "element claimed by slice");

            match last_matched {
                Some(last) if self.ordered && slice_index < last => violations.push(
                    IssueAssertion::new(
                        IssueCode::SliceOutOfOrder,
                        format!(
                            "Element matches slice '{}', but this is out of order for this group, since a previous element already matched slice '{}'",
                            slice.name, self.slices[last].name
                        ),
                    )
                    .as_result(&element_state),
                ),
                _ => last_matched = Some(slice_index),
            }
            if default_in_use && self.default_at_end {
                violations.push(
                    IssueAssertion::new(
                        IssueCode::SlicingRuleViolated,
                        format!(
                            "Element matched slice '{}', but it appears after a non-matching slice, which is not allowed when unmatched elements must be at the end",
                            slice.name
                        ),
                    )
                    .as_result(&element_state),
                );
            }
            buckets[slice_index].push(Arc::clone(candidate));
        }

        let mut reports = violations;
        for (slice, bucket) in self.slices.iter().zip(&buckets) {
            let slice_state = state.with_slice(&slice.name);
            reports.push(slice.assertion.validate_many(bucket, context, &slice_state).await?);
        }
        reports.push(self.default.validate_many(&default_bucket, context, state).await?);
        Ok(ResultReport::combine(reports))
    }
}
