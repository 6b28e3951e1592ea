//! ResNet Backbone
//!
//! Bottleneck ResNet (v1.5 layout, stride on the 3x3 convolution) used as the
//! shared feature extractor for every crop. The classification layer is not
//! part of the backbone; see [`super::head`].

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

use super::shapes::ShapeCollector;

/// Channel multiplier of the bottleneck's last 1x1 convolution
pub const EXPANSION: usize = 4;

/// Output width of the backbone (the head's input width)
pub const FEATURE_WIDTH: usize = 512 * EXPANSION;

const STAGE_WIDTHS: [usize; 4] = [64, 128, 256, 512];
const STAGE_STRIDES: [usize; 4] = [1, 2, 2, 2];

/// Backbone depth, expressed as bottleneck blocks per stage
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of bottleneck blocks in each of the four stages
    pub blocks: [usize; 4],
}

impl ResNetConfig {
    /// ResNet-50: `[3, 4, 6, 3]`
    pub fn resnet50() -> Self {
        Self::new([3, 4, 6, 3])
    }

    /// ResNet-101: `[3, 4, 23, 3]`
    pub fn resnet101() -> Self {
        Self::new([3, 4, 23, 3])
    }

    /// ResNet-152: `[3, 8, 36, 3]`
    pub fn resnet152() -> Self {
        Self::new([3, 8, 36, 3])
    }

    /// Build a randomly initialized backbone
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNetBackbone<B> {
        ResNetBackbone::new(self, device)
    }
}

impl Default for ResNetConfig {
    fn default() -> Self {
        Self::resnet50()
    }
}

fn conv<B: Backend>(
    channels: [usize; 2],
    kernel: usize,
    stride: usize,
    padding: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new(channels, [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false)
        .init(device)
}

/// 1x1 projection shortcut
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: conv([in_channels, out_channels], 1, stride, 0, device),
            bn: BatchNormConfig::new(out_channels).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Bottleneck residual block: 1x1 reduce, 3x3, 1x1 expand
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn1: BatchNorm<B>,
    pub conv2: Conv2d<B>,
    pub bn2: BatchNorm<B>,
    pub conv3: Conv2d<B>,
    pub bn3: BatchNorm<B>,
    pub downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    fn new(in_channels: usize, width: usize, stride: usize, device: &B::Device) -> Self {
        let out_channels = width * EXPANSION;
        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample::new(in_channels, out_channels, stride, device))
        } else {
            None
        };

        Self {
            conv1: conv([in_channels, width], 1, 1, 0, device),
            bn1: BatchNormConfig::new(width).init(device),
            conv2: conv([width, width], 3, stride, 1, device),
            bn2: BatchNormConfig::new(width).init(device),
            conv3: conv([width, out_channels], 1, 1, 0, device),
            bn3: BatchNormConfig::new(out_channels).init(device),
            downsample,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = relu(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        relu(out + identity)
    }

    fn collect_shapes(&self, prefix: &str, shapes: &mut ShapeCollector) {
        shapes.conv(&format!("{prefix}.conv1"), &self.conv1);
        shapes.batch_norm(&format!("{prefix}.bn1"), &self.bn1);
        shapes.conv(&format!("{prefix}.conv2"), &self.conv2);
        shapes.batch_norm(&format!("{prefix}.bn2"), &self.bn2);
        shapes.conv(&format!("{prefix}.conv3"), &self.conv3);
        shapes.batch_norm(&format!("{prefix}.bn3"), &self.bn3);
        if let Some(downsample) = &self.downsample {
            shapes.conv(&format!("{prefix}.downsample.conv"), &downsample.conv);
            shapes.batch_norm(&format!("{prefix}.downsample.bn"), &downsample.bn);
        }
    }
}

/// Stem + four bottleneck stages + global average pooling
///
/// Input: `[batch, 3, H, W]`. Output: `[batch, FEATURE_WIDTH]`.
#[derive(Module, Debug)]
pub struct ResNetBackbone<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn1: BatchNorm<B>,
    pub maxpool: MaxPool2d,
    pub layer1: Vec<Bottleneck<B>>,
    pub layer2: Vec<Bottleneck<B>>,
    pub layer3: Vec<Bottleneck<B>>,
    pub layer4: Vec<Bottleneck<B>>,
    pub avgpool: AdaptiveAvgPool2d,
}

impl<B: Backend> ResNetBackbone<B> {
    pub fn new(config: &ResNetConfig, device: &B::Device) -> Self {
        let mut in_channels = 64;
        let mut stage = |idx: usize| {
            let width = STAGE_WIDTHS[idx];
            (0..config.blocks[idx])
                .map(|i| {
                    let stride = if i == 0 { STAGE_STRIDES[idx] } else { 1 };
                    let block = Bottleneck::new(in_channels, width, stride, device);
                    in_channels = width * EXPANSION;
                    block
                })
                .collect::<Vec<_>>()
        };

        let layer1 = stage(0);
        let layer2 = stage(1);
        let layer3 = stage(2);
        let layer4 = stage(3);

        Self {
            conv1: conv([3, 64], 7, 2, 3, device),
            bn1: BatchNormConfig::new(64).init(device),
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(x)));
        let mut x = self.maxpool.forward(x);

        for block in self
            .layer1
            .iter()
            .chain(&self.layer2)
            .chain(&self.layer3)
            .chain(&self.layer4)
        {
            x = block.forward(x);
        }

        // [B, C, 1, 1] -> [B, C]
        let x = self.avgpool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        x.reshape([batch_size, channels])
    }

    /// Blocks per stage, as built
    pub fn blocks(&self) -> [usize; 4] {
        [
            self.layer1.len(),
            self.layer2.len(),
            self.layer3.len(),
            self.layer4.len(),
        ]
    }

    pub(crate) fn collect_shapes(&self, prefix: &str, shapes: &mut ShapeCollector) {
        shapes.conv(&format!("{prefix}.conv1"), &self.conv1);
        shapes.batch_norm(&format!("{prefix}.bn1"), &self.bn1);

        let stages = [&self.layer1, &self.layer2, &self.layer3, &self.layer4];
        for (stage_idx, stage) in stages.iter().enumerate() {
            for (block_idx, block) in stage.iter().enumerate() {
                block.collect_shapes(
                    &format!("{prefix}.layer{}.{}", stage_idx + 1, block_idx),
                    shapes,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_presets() {
        assert_eq!(ResNetConfig::default().blocks, [3, 4, 6, 3]);
        assert_eq!(ResNetConfig::resnet101().blocks, [3, 4, 23, 3]);
        assert_eq!(ResNetConfig::resnet152().blocks, [3, 8, 36, 3]);
    }

    #[test]
    fn test_stage_layout() {
        let device = Default::default();
        let backbone: ResNetBackbone<TestBackend> = ResNetConfig::new([2, 1, 1, 1]).init(&device);

        assert_eq!(backbone.blocks(), [2, 1, 1, 1]);
        // First block of every stage projects the shortcut
        assert!(backbone.layer1[0].downsample.is_some());
        assert!(backbone.layer1[1].downsample.is_none());
        assert!(backbone.layer4[0].downsample.is_some());
    }

    #[test]
    fn test_forward_feature_width() {
        let device = Default::default();
        let backbone: ResNetBackbone<TestBackend> = ResNetConfig::new([1, 1, 1, 1]).init(&device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
        let output = backbone.forward(input);

        assert_eq!(output.dims(), [1, FEATURE_WIDTH]);
    }

    #[test]
    fn test_resnet50_parameter_paths() {
        let device = Default::default();
        let backbone: ResNetBackbone<TestBackend> = ResNetConfig::resnet50().init(&device);

        let mut shapes = ShapeCollector::default();
        backbone.collect_shapes("backbone", &mut shapes);
        let entries = shapes.into_entries();

        let find = |path: &str| {
            entries
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, dims)| dims.clone())
        };
        assert_eq!(find("backbone.conv1.weight"), Some(vec![64, 3, 7, 7]));
        assert_eq!(
            find("backbone.layer3.5.conv2.weight"),
            Some(vec![256, 256, 3, 3])
        );
        assert_eq!(
            find("backbone.layer4.0.downsample.conv.weight"),
            Some(vec![2048, 1024, 1, 1])
        );
        assert_eq!(find("backbone.layer4.2.bn3.running_var"), Some(vec![2048]));
        assert!(find("backbone.layer4.3.conv1.weight").is_none());
    }
}
