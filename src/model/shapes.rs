//! Parameter shape inventory
//!
//! Loading a record into a module never fails on its own when tensor shapes
//! or optional sub-modules disagree, so after every weight load the network's
//! parameter inventory is compared against that of a freshly built network of
//! the expected layout.

use burn::{
    nn::{conv::Conv2d, BatchNorm, Linear},
    tensor::backend::Backend,
};

/// Ordered `(path, dims)` pairs for every tensor of a network
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShapeCollector {
    entries: Vec<(String, Vec<usize>)>,
}

impl ShapeCollector {
    pub fn push(&mut self, path: impl Into<String>, dims: &[usize]) {
        self.entries.push((path.into(), dims.to_vec()));
    }

    pub fn conv<B: Backend>(&mut self, prefix: &str, conv: &Conv2d<B>) {
        self.push(format!("{prefix}.weight"), &conv.weight.val().dims());
        if let Some(bias) = &conv.bias {
            self.push(format!("{prefix}.bias"), &bias.val().dims());
        }
    }

    pub fn batch_norm<B: Backend>(&mut self, prefix: &str, bn: &BatchNorm<B>) {
        self.push(format!("{prefix}.weight"), &bn.gamma.val().dims());
        self.push(format!("{prefix}.bias"), &bn.beta.val().dims());
        self.push(
            format!("{prefix}.running_mean"),
            &bn.running_mean.value().dims(),
        );
        self.push(
            format!("{prefix}.running_var"),
            &bn.running_var.value().dims(),
        );
    }

    pub fn linear<B: Backend>(&mut self, prefix: &str, linear: &Linear<B>) {
        self.push(format!("{prefix}.weight"), &linear.weight.val().dims());
        if let Some(bias) = &linear.bias {
            self.push(format!("{prefix}.bias"), &bias.val().dims());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, Vec<usize>)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(String, Vec<usize>)> {
        self.entries
    }

    /// First structural divergence between `self` (expected) and `found`.
    ///
    /// Entries are compared by position; the path is only used for reporting.
    pub fn first_mismatch(&self, found: &ShapeCollector) -> Option<String> {
        for (i, (path, dims)) in self.entries.iter().enumerate() {
            match found.entries.get(i) {
                None => return Some(format!("missing tensor '{path}' (expected {dims:?})")),
                Some((found_path, found_dims)) => {
                    if found_path != path {
                        return Some(format!(
                            "expected tensor '{path}' {dims:?}, found '{found_path}' {found_dims:?}"
                        ));
                    }
                    if found_dims != dims {
                        return Some(format!(
                            "'{path}': expected shape {dims:?}, found {found_dims:?}"
                        ));
                    }
                }
            }
        }

        found
            .entries
            .get(self.entries.len())
            .map(|(path, dims)| format!("unexpected tensor '{path}' {dims:?}"))
    }
}
