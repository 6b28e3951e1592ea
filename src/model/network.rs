//! Backbone + head network for one crop

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use super::head::ClassifierHead;
use super::resnet::{ResNetBackbone, ResNetConfig, FEATURE_WIDTH};
use super::shapes::ShapeCollector;
use crate::registry::HeadType;

/// Full classifier network: shared backbone plus a per-crop head
#[derive(Module, Debug)]
pub struct CropNetwork<B: Backend> {
    pub backbone: ResNetBackbone<B>,
    pub head: ClassifierHead<B>,
}

impl<B: Backend> CropNetwork<B> {
    /// Randomly initialized network
    pub fn new(
        config: &ResNetConfig,
        head_type: HeadType,
        num_classes: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            backbone: config.init(device),
            head: ClassifierHead::new(head_type, FEATURE_WIDTH, num_classes, device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Raw class scores of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward(x))
    }

    /// Every tensor of the network, in structural order
    pub fn parameter_shapes(&self) -> ShapeCollector {
        let mut shapes = ShapeCollector::default();
        self.backbone.collect_shapes("backbone", &mut shapes);
        self.head.collect_shapes("head", &mut shapes);
        shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_forward_output_shape() {
        let device = Default::default();
        let network = CropNetwork::<TestBackend>::new(
            &ResNetConfig::new([1, 1, 1, 1]),
            HeadType::DeepSmall,
            3,
            &device,
        );

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
        assert_eq!(network.forward(input).dims(), [1, 3]);
    }

    #[test]
    fn test_inventory_covers_every_layer() {
        let device = Default::default();
        let network = CropNetwork::<TestBackend>::new(
            &ResNetConfig::new([1, 1, 1, 1]),
            HeadType::SingleLinear,
            4,
            &device,
        );

        // stem: conv + bn(4), each stage's single block: 4 convs + 4 bns, head: weight + bias
        let shapes = network.parameter_shapes();
        assert_eq!(shapes.len(), 5 + 4 * (4 + 4 * 4) + 2);

        let (last_path, last_dims) = shapes.entries().last().unwrap();
        assert_eq!(last_path, "head.output.bias");
        assert_eq!(last_dims, &vec![4]);
    }
}
