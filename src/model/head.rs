//! Classifier heads attached after the backbone

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{activation::relu, backend::Backend, Tensor},
};

use super::shapes::ShapeCollector;
use crate::registry::{HeadLayout, HeadType};

/// Final classification layers for one crop
///
/// - `Linear`: `output` only, `hidden` is `None`
/// - `Mlp`: `hidden -> relu -> dropout -> output`
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub hidden: Option<Linear<B>>,
    pub dropout: Dropout,
    pub output: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    /// Build the head for `head_type` on top of `in_features` backbone features
    pub fn new(
        head_type: HeadType,
        in_features: usize,
        num_classes: usize,
        device: &B::Device,
    ) -> Self {
        match head_type.layout() {
            HeadLayout::Linear => Self {
                hidden: None,
                dropout: DropoutConfig::new(0.0).init(),
                output: LinearConfig::new(in_features, num_classes).init(device),
            },
            HeadLayout::Mlp { hidden, dropout } => Self {
                hidden: Some(LinearConfig::new(in_features, hidden).init(device)),
                dropout: DropoutConfig::new(dropout).init(),
                output: LinearConfig::new(hidden, num_classes).init(device),
            },
        }
    }

    /// `[batch, in_features]` -> `[batch, num_classes]` raw scores
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = match &self.hidden {
            Some(hidden) => self.dropout.forward(relu(hidden.forward(x))),
            None => x,
        };
        self.output.forward(x)
    }

    /// Output width of the head
    pub fn num_classes(&self) -> usize {
        self.output.weight.val().dims()[1]
    }

    pub(crate) fn collect_shapes(&self, prefix: &str, shapes: &mut ShapeCollector) {
        if let Some(hidden) = &self.hidden {
            shapes.linear(&format!("{prefix}.hidden"), hidden);
        }
        shapes.linear(&format!("{prefix}.output"), &self.output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_single_linear_head() {
        let device = Default::default();
        let head = ClassifierHead::<TestBackend>::new(HeadType::SingleLinear, 2048, 3, &device);

        assert!(head.hidden.is_none());
        assert_eq!(head.output.weight.val().dims(), [2048, 3]);
        assert_eq!(head.num_classes(), 3);
    }

    #[test]
    fn test_mlp_heads() {
        let device = Default::default();

        let narrow = ClassifierHead::<TestBackend>::new(HeadType::DeepNarrow, 2048, 4, &device);
        let hidden = narrow.hidden.as_ref().unwrap();
        assert_eq!(hidden.weight.val().dims(), [2048, 512]);
        assert_eq!(narrow.output.weight.val().dims(), [512, 4]);
        assert_eq!(narrow.dropout.prob, 0.3);

        let small = ClassifierHead::<TestBackend>::new(HeadType::DeepSmall, 2048, 3, &device);
        assert_eq!(small.hidden.as_ref().unwrap().weight.val().dims(), [2048, 256]);
        assert_eq!(small.output.weight.val().dims(), [256, 3]);
        assert_eq!(small.dropout.prob, 0.4);
    }

    #[test]
    fn test_dropout_is_inert_without_autodiff() {
        let device = Default::default();
        let head = ClassifierHead::<TestBackend>::new(HeadType::DeepSmall, 16, 3, &device);
        let input = Tensor::<TestBackend, 2>::ones([1, 16], &device);

        let first = head.forward(input.clone()).into_data();
        let second = head.forward(input).into_data();
        assert_eq!(first, second);
    }

    #[test]
    fn test_head_shape_paths() {
        let device = Default::default();
        let head = ClassifierHead::<TestBackend>::new(HeadType::DeepNarrow, 8, 2, &device);
        let mut shapes = ShapeCollector::default();
        head.collect_shapes("head", &mut shapes);

        let paths: Vec<_> = shapes.entries().iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["head.hidden.weight", "head.hidden.bias", "head.output.weight", "head.output.bias"]
        );
    }
}
