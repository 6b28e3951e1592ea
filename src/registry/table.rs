//! Built-in crop table
//!
//! Label order is the output-index order the weights were trained with.
//! Adding a crop means adding a row here and a matching entry in
//! `assets/remedies.json`.

use super::profile::{CropProfile, HeadType};

/// One static row of the crop table
pub struct CropRow {
    pub crop_id: &'static str,
    pub weights_file: &'static str,
    pub head_type: HeadType,
    pub labels: &'static [&'static str],
}

impl CropRow {
    /// Owned profile for this row
    pub fn to_profile(&self) -> CropProfile {
        CropProfile::new(
            self.crop_id,
            self.weights_file,
            self.labels.iter().map(|l| l.to_string()).collect(),
            self.head_type,
        )
    }
}

pub const BUILTIN_CROPS: &[CropRow] = &[
    CropRow {
        crop_id: "Grapes",
        weights_file: "resnet50_grapes.mpk",
        head_type: HeadType::SingleLinear,
        labels: &["Black Rot", "ESCA", "Healthy", "Leaf Blight"],
    },
    CropRow {
        crop_id: "Potato",
        weights_file: "resnet50_potato.mpk",
        head_type: HeadType::SingleLinear,
        labels: &[
            "Potato___Early_blight",
            "Potato___Late_blight",
            "Potato___healthy",
        ],
    },
    CropRow {
        crop_id: "Peanut",
        weights_file: "resnet50_peanut.mpk",
        head_type: HeadType::DeepNarrow,
        labels: &[
            "Peanut_rust",
            "Peanut_nutrition_deficiency",
            "Peanut_leaf_spot",
            "Peanut_healthy_leaf",
        ],
    },
    CropRow {
        crop_id: "Tomato",
        weights_file: "resnet50_tomato.mpk",
        head_type: HeadType::SingleLinear,
        labels: &[
            "Tomato__Tomato_mosaic_virus",
            "Tomato___Bacterial_spot",
            "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
            "Tomato__blight",
        ],
    },
    CropRow {
        crop_id: "Rice",
        weights_file: "resnet50_rice.mpk",
        head_type: HeadType::DeepSmall,
        labels: &["Bacterialblight", "Brownspot", "Leafsmut"],
    },
    CropRow {
        crop_id: "Cashew",
        weights_file: "resnet50_cashew.mpk",
        head_type: HeadType::SingleLinear,
        labels: &[
            "Cashew anthracnose",
            "Cashew gummosis",
            "Cashew healthy",
            "Cashew leaf miner",
            "Cashew red rust",
        ],
    },
];
