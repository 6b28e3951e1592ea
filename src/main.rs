//! CropDoc CLI
//!
//! Diagnose crop leaf diseases from photos, show the static remedy and
//! optionally ask an AI service for advice.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use cropdoc::advice::{clean_markdown, display_label, AdviceOutcome, AdviceSession};
use cropdoc::backend::{backend_name, default_device, InferenceBackend};
use cropdoc::config::{AppConfig, BackboneDepth};
use cropdoc::inference::Prediction;
use cropdoc::pipeline::CropDoctor;
use cropdoc::remedy::{render_lookup, RemedyRecord};
use cropdoc::utils::error::CropDocError;
use cropdoc::utils::logging::{init_logging, LogConfig};
use cropdoc::utils::{format_millis, format_progress_bar};

/// CropDoc crop disease diagnosis
///
/// Classifies a leaf photo with the selected crop's ResNet model and shows
/// treatment advice for the predicted disease.
#[derive(Parser, Debug)]
#[command(name = "cropdoc")]
#[command(author = "Warre Snaet")]
#[command(version)]
#[command(about = "Crop leaf disease diagnosis with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the per-crop weights files
    #[arg(long, global = true)]
    weights_dir: Option<PathBuf>,

    /// Backbone depth (resnet50, resnet101, resnet152)
    #[arg(long, global = true)]
    backbone: Option<BackboneDepth>,

    /// API key for the AI advice service
    #[arg(long, global = true, env = "ADVICE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the supported crops and their disease classes
    Crops,

    /// Diagnose a leaf photo
    Predict {
        /// Crop the photo shows
        #[arg(long)]
        crop: String,

        /// Path to a JPEG or PNG image
        #[arg(short, long)]
        image: PathBuf,

        /// Also ask the AI service for advice
        #[arg(long, default_value = "false")]
        advice: bool,

        /// Print the prediction as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show the static remedy for a crop disease
    Remedy {
        #[arg(long)]
        crop: String,

        /// Disease label, as listed by `cropdoc crops`
        #[arg(short, long)]
        label: String,
    },

    /// Ask the AI service about a crop disease
    Advise {
        #[arg(long)]
        crop: String,

        #[arg(short, long)]
        label: String,

        /// Follow-up question (repeatable, asked in order)
        #[arg(short, long)]
        question: Vec<String>,

        /// Strip markdown from the replies
        #[arg(long, default_value = "false")]
        plain: bool,
    },

    /// Write randomly initialized weights for smoke testing
    InitWeights {
        /// Crop to initialize (all crops when omitted)
        #[arg(long)]
        crop: Option<String>,

        /// Overwrite existing weights files
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(err) = e.downcast_ref::<CropDocError>() {
            eprintln!("  {} {:?}", "Category:".dimmed(), err.category());
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    let _ = init_logging(&LogConfig::from_flags(cli.verbose, cli.quiet, config.log_level));

    let doctor = CropDoctor::<InferenceBackend>::from_config(&config, default_device())?;

    match cli.command {
        Commands::Crops => cmd_crops(&doctor, &config),
        Commands::Predict {
            crop,
            image,
            advice,
            json,
        } => cmd_predict(&doctor, &crop, &image, advice, json).await,
        Commands::Remedy { crop, label } => cmd_remedy(&doctor, &crop, &label),
        Commands::Advise {
            crop,
            label,
            question,
            plain,
        } => cmd_advise(&doctor, &crop, &label, &question, plain).await,
        Commands::InitWeights { crop, force } => cmd_init_weights(&doctor, crop.as_deref(), force),
    }
}

/// Defaults, then the config file, then environment, then flags
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let mut config = config.with_env_overrides();

    if let Some(dir) = &cli.weights_dir {
        config.weights_dir = dir.clone();
    }
    if let Some(backbone) = cli.backbone {
        config.backbone = backbone;
    }
    if let Some(key) = &cli.api_key {
        config.advice.api_key = Some(key.clone());
    }

    Ok(config)
}

fn cmd_crops(doctor: &CropDoctor<InferenceBackend>, config: &AppConfig) -> Result<()> {
    println!("{}", "Supported crops:".cyan().bold());
    println!("  Backbone: {}  Weights: {:?}", config.backbone, config.weights_dir);
    println!();

    for profile in doctor.crops() {
        let weights = profile.resolve_weights_path(&config.weights_dir);
        let status = if weights.exists() {
            "ready".green()
        } else {
            "no weights".yellow()
        };

        println!(
            "{} ({} classes, {} head) [{}]",
            profile.crop_id.bold(),
            profile.num_classes(),
            profile.head_type,
            status
        );
        for (index, label) in profile.labels.iter().enumerate() {
            let marker = if doctor.remedy(&profile.crop_id, label).is_available() {
                " ".normal()
            } else {
                "*".red()
            };
            println!("  {:>2}. {}{}", index, label, marker);
        }
    }

    println!();
    println!("{} {}", "*".red(), "no remedy on file".dimmed());
    Ok(())
}

async fn cmd_predict(
    doctor: &CropDoctor<InferenceBackend>,
    crop: &str,
    image: &Path,
    advice: bool,
    json: bool,
) -> Result<()> {
    info!("Diagnosing {:?} as {}", image, crop);

    if !json {
        println!("{}", "Inference Configuration:".cyan().bold());
        println!("  Crop:    {}", crop);
        println!("  Image:   {}", image.display());
        println!("  Backend: {}", backend_name());
        println!();
        println!("{}", "Loading model and running inference...".cyan());
    }

    let diagnosis = doctor
        .diagnose_file(crop, image)
        .with_context(|| format!("diagnosis of {} failed", image.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diagnosis.prediction)?);
        return Ok(());
    }

    print_prediction(&diagnosis.prediction);
    print_remedy(doctor, &diagnosis.prediction, diagnosis.remedy.as_ref());

    if advice {
        let mut session = doctor.advice_session(&diagnosis.prediction);
        print_advice(&mut session, None, false).await;
    }

    Ok(())
}

fn cmd_remedy(doctor: &CropDoctor<InferenceBackend>, crop: &str, label: &str) -> Result<()> {
    let profile = doctor.registry().resolve(crop)?;
    if !profile.has_label(label) {
        println!(
            "{} '{}' is not a {} class",
            "Warning:".yellow(),
            label,
            crop
        );
    }

    println!("{}", render_lookup(label, &doctor.remedy(crop, label)));
    Ok(())
}

async fn cmd_advise(
    doctor: &CropDoctor<InferenceBackend>,
    crop: &str,
    label: &str,
    questions: &[String],
    plain: bool,
) -> Result<()> {
    let profile = doctor.registry().resolve(crop)?;
    if !profile.has_label(label) {
        bail!("'{}' is not a {} class", label, crop);
    }
    if !doctor.advice().is_enabled() {
        println!(
            "{} AI advice is disabled. Set ADVICE_API_KEY or pass --api-key.",
            "Note:".yellow()
        );
        return Ok(());
    }

    let mut session = doctor.advice().session(crop, label);
    print_advice(&mut session, None, plain).await;
    for question in questions {
        print_advice(&mut session, Some(question.as_str()), plain).await;
    }

    Ok(())
}

fn cmd_init_weights(
    doctor: &CropDoctor<InferenceBackend>,
    crop: Option<&str>,
    force: bool,
) -> Result<()> {
    let profiles = match crop {
        Some(crop) => vec![doctor.registry().resolve(crop)?],
        None => doctor.crops().iter().collect(),
    };
    let builder = doctor.cache().builder();

    println!(
        "{} random weights are for smoke testing only; predictions are meaningless.",
        "Note:".yellow()
    );

    for profile in profiles {
        let path = profile.resolve_weights_path(builder.weights_dir());
        if path.exists() && !force {
            println!(
                "  {} {} ({} exists, use --force)",
                "skip".yellow(),
                profile.crop_id,
                path.display()
            );
            continue;
        }

        let written = builder.write_random_weights(profile)?;
        println!("  {} {} -> {}", "wrote".green(), profile.crop_id, written.display());
    }

    Ok(())
}

fn print_prediction(prediction: &Prediction) {
    println!();
    println!("{}", "Prediction:".green().bold());
    println!(
        "  {} {}",
        display_label(&prediction.predicted_label).bold(),
        format_progress_bar(prediction.confidence as f64, 20)
    );
    println!("  Inference time: {}", format_millis(prediction.inference_time_ms));
    println!();

    println!("{}", "Top predictions:".cyan());
    for (rank, score) in prediction.top_k.iter().enumerate() {
        println!(
            "  {}. {:<40} {:>6.2}%",
            rank + 1,
            score.label,
            score.probability * 100.0
        );
    }
    println!();
}

fn print_remedy(
    doctor: &CropDoctor<InferenceBackend>,
    prediction: &Prediction,
    remedy: Option<&RemedyRecord>,
) {
    if let Some(severity) = remedy.and_then(RemedyRecord::severity) {
        println!("{} {}", "Severity:".yellow().bold(), severity);
    }
    let lookup = doctor.remedy(&prediction.crop_id, &prediction.predicted_label);
    println!("{}", render_lookup(&prediction.predicted_label, &lookup));
}

async fn print_advice(session: &mut AdviceSession, question: Option<&str>, plain: bool) {
    let outcome = match question {
        Some(question) => {
            println!("{} {}", "Q:".cyan().bold(), question);
            session.follow_up(question).await
        }
        None => {
            println!("{}", "AI advice:".cyan().bold());
            session.initial().await
        }
    };

    match outcome {
        AdviceOutcome::Advice(text) => {
            let text = if plain { clean_markdown(&text) } else { text };
            println!("{}", text);
        }
        AdviceOutcome::Unavailable(reason) => {
            println!(
                "{} AI advice unavailable ({}); showing static advice only.",
                "Note:".yellow(),
                reason
            );
        }
        AdviceOutcome::Disabled => {
            println!(
                "{} AI advice is disabled. Set ADVICE_API_KEY to enable it.",
                "Note:".yellow()
            );
        }
    }
    println!();
}
