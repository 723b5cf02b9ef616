//! rerm Command Line Interface
//!
//! Train linear models, estimate their generalization error by resampling
//! and run recursive feature elimination on delimited dataset files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use rerm::core::{Grouper, RermError, Result};
use rerm::data::{DatasetReader, DatasetWriter, DATASET_PATTERN};
use rerm::learner::{LearnerConfig, LinearLearner};
use rerm::loss::LossKind;
use rerm::metrics::DatasetResult;
use rerm::persistence::SerializableModel;
use rerm::resampling::{
    Bootstrap632Error, Bootstrap632PlusError, BootstrapError, CrossValidationError,
    ResamplingConfig, ResamplingError,
};
use rerm::selection::{
    CrossValidatedBlend, GeneralizedMethod, GeneralizedRanking, LambdaSweep, RankMethod, Rfe,
};
use rerm::solver::SolverKind;
use rerm::{Dataset, Learner};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rerm")]
#[command(about = "Regularized empirical risk minimization with resampling and feature selection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "rerm contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a linear model and save it
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Evaluate a model on test data
    Evaluate(EvaluateArgs),
    /// Estimate the generalization error by resampling
    Estimate(EstimateArgs),
    /// Recursive feature elimination
    Select(SelectArgs),
    /// Display model information
    Info(InfoArgs),
}

/// Learner settings shared by the training commands
#[derive(Args, Clone)]
struct LearnerArgs {
    /// JSON file with a learner configuration; flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Loss function name or id
    #[arg(long, default_value = "squared_error")]
    loss: String,

    /// Solver name or id (lbfgs, rprop-minus, owlqn, rprop-plus, ridge)
    #[arg(long)]
    solver: Option<String>,

    /// L2 regularization strength
    #[arg(long)]
    lambda2: Option<f64>,

    /// L1 regularization strength (OWL-QN only)
    #[arg(long)]
    lambda1: Option<f64>,

    /// Average the loss per group, giving group +1 this share
    #[arg(long)]
    w_plus: Option<f64>,

    /// Weight each point's loss by its stored weight
    #[arg(long)]
    use_weights: bool,

    /// Maximum solver iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Scores above this threshold predict group +1
    #[arg(long, default_value = "0.0")]
    threshold: f64,
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    learner: LearnerArgs,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Test data file
    #[arg(long)]
    data: PathBuf,

    /// Show detailed metrics
    #[arg(long)]
    detailed: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum EstimateMethod {
    /// k-fold cross-validation
    #[value(name = "cv")]
    CrossValidation,
    /// Out-of-bag bootstrap error
    #[value(name = "bootstrap")]
    Bootstrap,
    /// .632 bootstrap
    #[value(name = "b632")]
    Bootstrap632,
    /// .632+ bootstrap
    #[value(name = "b632plus")]
    Bootstrap632Plus,
}

#[derive(Args, Clone)]
struct ResamplingArgs {
    /// Number of folds for cross-validation
    #[arg(long, default_value = "10")]
    folds: usize,

    /// Repetitions (cross-validation) or bootstrap samples
    #[arg(long, default_value = "1")]
    rounds: usize,

    /// Seed for reproducible resamples
    #[arg(long)]
    seed: Option<u64>,

    /// Loss used to score predictions (defaults to the training loss)
    #[arg(long)]
    eval_loss: Option<String>,

    /// Average the error of group +1 and the other points separately
    #[arg(long)]
    group_averaged_error: bool,
}

#[derive(Args)]
struct EstimateArgs {
    /// Data file
    #[arg(long)]
    data: PathBuf,

    /// Resampling estimator
    #[arg(long, default_value = "cv")]
    method: EstimateMethod,

    #[command(flatten)]
    resampling: ResamplingArgs,

    #[command(flatten)]
    learner: LearnerArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum CliRankMethod {
    /// Loss increase when a feature's contribution is removed
    #[value(name = "effect")]
    Effect,
    /// Absolute weight
    #[value(name = "weight")]
    Weight,
    /// Loss increase after refitting without the feature
    #[value(name = "retrain")]
    Retrain,
    /// Effects summed over cross-validation folds
    #[value(name = "cv")]
    CrossValidated,
    /// .632-weighted effects over bootstrap samples
    #[value(name = "b632")]
    Bootstrap632,
    /// .632-weighted refitting effects over bootstrap samples
    #[value(name = "b632-retrain")]
    Bootstrap632Retrain,
}

#[derive(Args)]
struct SelectArgs {
    /// Training data file
    #[arg(long)]
    data: PathBuf,

    /// Optional test data file, reduced alongside the training data
    #[arg(long)]
    test: Option<PathBuf>,

    /// Number of features to keep
    #[arg(long)]
    target: usize,

    /// Below this many features, delete one per round
    #[arg(long, default_value = "10")]
    speed: usize,

    /// Feature ranking
    #[arg(long, default_value = "effect")]
    rank: CliRankMethod,

    /// Re-tune lambda2 every round by resampled error
    #[arg(long)]
    sweep: bool,

    /// Blend the ranking with cross-validated effects by this fraction
    #[arg(long)]
    blend: Option<f64>,

    /// Save a model refitted on the selected features
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the reduced training data
    #[arg(long)]
    reduced_data: Option<PathBuf>,

    #[command(flatten)]
    resampling: ResamplingArgs,

    #[command(flatten)]
    learner: LearnerArgs,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Evaluate(args) => evaluate_command(args),
        Commands::Estimate(args) => estimate_command(args),
        Commands::Select(args) => select_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<LearnerConfig> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn build_learner(args: &LearnerArgs) -> Result<LinearLearner> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => LearnerConfig::default(),
    };
    if let Some(solver) = &args.solver {
        config.solver = solver.parse::<SolverKind>()?;
    }
    if let Some(lambda2) = args.lambda2 {
        config.lambda2 = lambda2;
    }
    if let Some(lambda1) = args.lambda1 {
        config.lambda1 = lambda1;
    }
    if let Some(w_plus) = args.w_plus {
        config.group_averaging = true;
        config.w_plus = w_plus;
    }
    if args.use_weights {
        config.use_datapoint_weights = true;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
    config.validate()?;

    let loss = args.loss.parse::<LossKind>()?;
    info!(
        "Learner: loss {loss}, solver {}, lambda2 {}, lambda1 {}",
        config.solver, config.lambda2, config.lambda1
    );
    Ok(LinearLearner::new()
        .with_config(config)
        .with_loss(loss.build()?)
        .with_grouper(Grouper::AboveThreshold(args.threshold)))
}

fn resampling_config(args: &ResamplingArgs, learner: &LinearLearner) -> Result<ResamplingConfig> {
    let loss = match &args.eval_loss {
        Some(name) => name.parse::<LossKind>()?.build()?,
        None => Arc::clone(learner.loss()),
    };
    let mut config = ResamplingConfig::new(loss)
        .with_rounds(args.rounds)
        .with_group_averaging(args.group_averaged_error)
        .with_datapoint_weights(learner.config().use_datapoint_weights);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    Ok(config)
}

fn build_resampler(
    method: EstimateMethod,
    args: &ResamplingArgs,
    learner: &LinearLearner,
) -> Result<Arc<dyn ResamplingError>> {
    let config = resampling_config(args, learner)?;
    Ok(match method {
        EstimateMethod::CrossValidation => Arc::new(CrossValidationError::new(args.folds, config)),
        EstimateMethod::Bootstrap => Arc::new(BootstrapError::new(config)),
        EstimateMethod::Bootstrap632 => Arc::new(Bootstrap632Error::new(config)),
        EstimateMethod::Bootstrap632Plus => Arc::new(Bootstrap632PlusError::new(config)),
    })
}

fn rank_method(rank: CliRankMethod, args: &ResamplingArgs) -> RankMethod {
    let generalized = |method| {
        let ranking = GeneralizedRanking::new(method);
        RankMethod::Generalized(match args.seed {
            Some(seed) => ranking.with_seed(seed),
            None => ranking,
        })
    };
    match rank {
        CliRankMethod::Effect => RankMethod::EffectObjective,
        CliRankMethod::Weight => RankMethod::WeightMagnitude,
        CliRankMethod::Retrain => RankMethod::EffectRetrain,
        CliRankMethod::CrossValidated => generalized(GeneralizedMethod::CrossValidation {
            folds: args.folds,
            rounds: args.rounds,
        }),
        CliRankMethod::Bootstrap632 => generalized(GeneralizedMethod::Bootstrap632 {
            samples: args.rounds,
        }),
        CliRankMethod::Bootstrap632Retrain => generalized(GeneralizedMethod::Bootstrap632Retrain {
            samples: args.rounds,
        }),
    }
}

fn read_dataset(path: &Path) -> Result<Dataset> {
    let dataset = DatasetReader::from_file(path)?;
    info!(
        "Loaded {} points with {} features from {path:?}",
        dataset.len(),
        dataset.num_features()
    );
    Ok(dataset)
}

fn load_model(path: &Path) -> Result<(SerializableModel, LinearLearner)> {
    info!("Loading model from: {path:?}");
    let model = SerializableModel::load_from_file(path)?;
    let learner = model.to_learner()?;
    Ok((model, learner))
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training linear model...");
    let dataset = read_dataset(&args.data)?;
    let mut learner = build_learner(&args.learner)?;
    learner.learn(&dataset)?;
    info!("Training completed successfully");

    let model = SerializableModel::from_learner(&learner, &dataset)?;
    model.save_to_file(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    // Quick evaluation on training data
    let mut predicted = dataset;
    learner.predict(&mut predicted)?;
    let result = DatasetResult::new(&predicted)?;
    info!("Training accuracy: {:.2}%", result.accuracy() * 100.0);
    info!("Training fit: {}", result.regression_summary());
    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    let (model, learner) = load_model(&args.model)?;
    let mut dataset = read_dataset(&args.data)?;
    model.prepare(&mut dataset)?;
    learner.predict(&mut dataset)?;

    let writer = DatasetWriter::predictions();
    match args.output {
        Some(path) => {
            writer.to_file(&dataset, &path)?;
            info!("Predictions saved to: {path:?}");
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writer.to_writer(&dataset, &mut handle)?;
        }
    }
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    let (model, learner) = load_model(&args.model)?;
    let mut dataset = read_dataset(&args.data)?;
    model.prepare(&mut dataset)?;
    learner.predict(&mut dataset)?;
    let result = DatasetResult::new(&dataset)?;

    println!("=== Model Evaluation ===");
    model.print_summary();

    println!("\nTest Results:");
    println!("  Accuracy: {:.2}%", result.accuracy() * 100.0);
    println!("  {}", result.classification_summary());
    println!("  {}", result.regression_summary());

    if args.detailed {
        let counts = result.counts();
        println!("\nDetailed Metrics:");
        println!("  True Positives:  {}", counts.true_positives);
        println!("  True Negatives:  {}", counts.true_negatives);
        println!("  False Positives: {}", counts.false_positives);
        println!("  False Negatives: {}", counts.false_negatives);
        println!("  Precision:       {:.4}", result.precision());
        println!("  Recall:          {:.4}", result.recall());
        println!("  Specificity:     {:.4}", result.specificity());
        println!("  Loss sum:        {:.6}", result.loss_sum(learner.loss().as_ref()));
    }
    Ok(())
}

fn estimate_command(args: EstimateArgs) -> Result<()> {
    let dataset = read_dataset(&args.data)?;
    let mut learner = build_learner(&args.learner)?;
    let resampler = build_resampler(args.method, &args.resampling, &learner)?;
    info!("Estimating error with {}", resampler.describe());

    let error = resampler.error(&mut learner, &dataset)?;
    println!("=== Resampling Estimate ===");
    println!("Data file: {:?}", args.data);
    println!("Estimator: {}", resampler.describe());
    println!("Error: {error:.6}");
    Ok(())
}

fn select_command(args: SelectArgs) -> Result<()> {
    let mut train = read_dataset(&args.data)?;
    let mut test = args.test.as_deref().map(read_dataset).transpose()?;
    let mut learner = build_learner(&args.learner)?;

    let mut rfe = Rfe::new(args.target)
        .with_speed(args.speed)
        .with_rank_method(rank_method(args.rank, &args.resampling));
    if args.sweep {
        let resampler =
            build_resampler(EstimateMethod::CrossValidation, &args.resampling, &learner)?;
        rfe = rfe.with_lambda_sweep(LambdaSweep::new(resampler));
    }
    if let Some(fraction) = args.blend {
        let mut blend = CrossValidatedBlend::new(fraction, args.resampling.folds);
        if let Some(seed) = args.resampling.seed {
            blend = blend.with_seed(seed);
        }
        rfe = rfe.with_cv_blend(blend);
    }

    let rounds = rfe.select(&mut learner, &mut train, test.as_mut())?;

    println!("=== Recursive Feature Elimination ===");
    println!("round  before  after  lambda2     loss        train acc  test acc");
    for (i, round) in rounds.iter().enumerate() {
        let accuracy = |a: Option<f64>| a.map_or("-".to_string(), |a| format!("{:.2}%", a * 100.0));
        println!(
            "{:<6} {:<7} {:<6} {:<11.4e} {:<11.6} {:<10} {}",
            i + 1,
            round.features_before,
            round.remaining,
            round.lambda2,
            round.training_loss,
            accuracy(round.train_accuracy),
            accuracy(round.test_accuracy)
        );
    }
    let names: Vec<String> = match train.feature_names() {
        Some(names) => names.to_vec(),
        None => train.feature_index().iter().map(|i| format!("f{i}")).collect(),
    };
    println!("Selected features: {}", names.join(", "));

    if let Some(path) = &args.output {
        learner.learn(&train)?;
        SerializableModel::from_learner(&learner, &train)?.save_to_file(path)?;
        info!("Model on selected features saved to: {path:?}");
    }
    if let Some(path) = &args.reduced_data {
        DatasetWriter::new(DATASET_PATTERN).to_file(&train, path)?;
        info!("Reduced dataset saved to: {path:?}");
    }
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    let (model, learner) = load_model(&args.model)?;
    if !learner.is_trained() {
        return Err(RermError::ModelNotTrained);
    }
    model.print_summary();
    if let Some(names) = &model.feature_names {
        println!("\nFeature names: {}", names.join(", "));
    }
    println!("\nFeature index: {:?}", model.feature_index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn learner_args() -> LearnerArgs {
        LearnerArgs {
            config: None,
            loss: "squared_error".to_string(),
            solver: Some("ridge".to_string()),
            lambda2: Some(0.2),
            lambda1: None,
            w_plus: Some(0.7),
            use_weights: false,
            max_iterations: None,
            threshold: 0.0,
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, r#"{{"lambda2": 0.5, "max_iterations": 42}}"#).expect("Failed to write");

        let mut args = learner_args();
        args.config = Some(file.path().to_path_buf());
        let learner = build_learner(&args).unwrap();
        let config = learner.config();
        assert_eq!(config.lambda2, 0.2);
        assert_eq!(config.max_iterations, 42);
        assert!(config.group_averaging);
        assert_eq!(config.w_plus, 0.7);
        assert_eq!(config.solver, SolverKind::Ridge);
    }

    #[test]
    fn test_invalid_learner_settings() {
        let mut args = learner_args();
        args.loss = "no_such_loss".to_string();
        assert!(build_learner(&args).is_err());

        let mut args = learner_args();
        args.lambda2 = Some(-1.0);
        assert!(build_learner(&args).is_err());
    }

    #[test]
    fn test_rank_method_mapping() {
        let resampling = ResamplingArgs {
            folds: 4,
            rounds: 3,
            seed: Some(1),
            eval_loss: None,
            group_averaged_error: false,
        };
        assert_eq!(
            rank_method(CliRankMethod::Weight, &resampling),
            RankMethod::WeightMagnitude
        );
        assert_eq!(
            rank_method(CliRankMethod::CrossValidated, &resampling),
            RankMethod::Generalized(
                GeneralizedRanking::new(GeneralizedMethod::CrossValidation { folds: 4, rounds: 3 })
                    .with_seed(1)
            )
        );
    }
}
