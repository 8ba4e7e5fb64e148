use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use face_analyzer::image_input::has_image_extension;
use face_analyzer::{
    create_detector, Actions, CsvFileStore, OnnxAttributeAnalyzer, Pipeline, PipelineOutput,
    RecordSink, Settings,
};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

const DEFAULT_STORE: &str = "people.csv";
const DEFAULT_DETECTOR: &str = "haar";
const DEFAULT_CASCADE: &str = "models/face.xml";
const DEFAULT_SEETA_MODEL: &str = "model/seeta_fd_frontal_v1.0.bin";
const DEFAULT_AGE_GENDER_MODEL: &str = "models/genderage.onnx";

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Detect faces and estimate their age, gender and race")]
struct Args {
    /// JSON settings file; command line flags override its values
    #[clap(long, global = true, value_parser)]
    config: Option<PathBuf>,

    /// CSV record store
    #[clap(long, global = true, value_parser)]
    store: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze an image, or every image below a directory
    Analyze(AnalyzeArgs),
    /// Delete the record store
    Clear,
    /// Print the rows of the record store
    Show,
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Image file or directory of images
    #[clap(value_parser)]
    input: PathBuf,

    /// Label stored in the Name column for every face found
    #[clap(short, long)]
    name: Option<String>,

    /// Do not append results to the record store
    #[clap(long)]
    no_store: bool,

    /// Directory for copies of the images with faces outlined
    #[clap(long, value_parser)]
    annotated_dir: Option<PathBuf>,

    /// Face detector to use (haar, seeta)
    #[clap(long)]
    detector: Option<String>,

    /// OpenCV Haar cascade XML for the haar detector
    #[clap(long, value_parser)]
    cascade: Option<PathBuf>,

    /// SeetaFace model for the seeta detector
    #[clap(long, value_parser)]
    seeta_model: Option<PathBuf>,

    /// ONNX age/gender model
    #[clap(long, value_parser)]
    age_gender_model: Option<PathBuf>,

    /// ONNX race model, needed when race is among the actions
    #[clap(long, value_parser)]
    race_model: Option<PathBuf>,

    /// Step between detection scales (> 1.0)
    #[clap(long)]
    scale_factor: Option<f64>,

    /// Overlapping detections required to keep a face
    #[clap(long)]
    min_neighbors: Option<u32>,

    /// Smallest face side in pixels
    #[clap(long)]
    min_face_size: Option<u32>,

    /// Attributes to estimate, comma separated (age,gender[,race])
    #[clap(long)]
    actions: Option<Actions>,
}

impl AnalyzeArgs {
    /// Flags win over the settings file.
    fn overlay(&self, mut settings: Settings) -> Settings {
        settings.detector = self.detector.clone().or(settings.detector);
        settings.cascade = self.cascade.clone().or(settings.cascade);
        settings.seeta_model = self.seeta_model.clone().or(settings.seeta_model);
        settings.age_gender_model = self.age_gender_model.clone().or(settings.age_gender_model);
        settings.race_model = self.race_model.clone().or(settings.race_model);
        settings.scale_factor = self.scale_factor.or(settings.scale_factor);
        settings.min_neighbors = self.min_neighbors.or(settings.min_neighbors);
        settings.min_face_size = self.min_face_size.or(settings.min_face_size);
        settings.actions = self.actions.map(|a| a.to_list()).or(settings.actions);
        settings
    }
}

/// Collect the images to analyze: the input itself, or every image file
/// below it when it is a directory.
fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_image_extension(e.path()))
        .map(|e| e.path().to_owned())
        .collect();
    paths.sort();
    Ok(paths)
}

fn print_output(path: &Path, output: &PipelineOutput, many: bool) {
    if many {
        println!("{}", path.display());
    }
    for failure in &output.failures {
        println!("Face region {} skipped: {}", failure.region_index, failure.error);
    }
    if output.is_empty() {
        println!("No faces detected");
        return;
    }
    for record in &output.records {
        println!("{record}");
    }
    println!("Total Faces: {}", output.records.len());
}

fn save_annotated(dir: &Path, source: &Path, output: &PipelineOutput) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create annotated output directory: {:?}", dir))?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let target = dir.join(format!("{stem}_annotated.png"));
    output
        .annotated
        .save(&target)
        .with_context(|| format!("Failed to save annotated image to: {:?}", target))?;
    debug!("Saved annotated image to {:?}", target);
    Ok(())
}

fn analyze(args: AnalyzeArgs, settings: Settings, store: PathBuf) -> Result<()> {
    let settings = args.overlay(settings);
    let config = settings.pipeline_config()?;

    let detector_name = settings.detector.as_deref().unwrap_or(DEFAULT_DETECTOR);
    let detector_model = match detector_name.to_lowercase().as_str() {
        "seeta" | "rustface" => settings
            .seeta_model
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SEETA_MODEL)),
        _ => settings
            .cascade
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CASCADE)),
    };

    let race_model = settings.race_model.as_deref();
    if config.actions.contains(face_analyzer::Action::Race) && race_model.is_none() {
        bail!("race estimation requested but no --race-model was given");
    }

    info!("Initializing face detector: {} ({:?})", detector_name, detector_model);
    let detector = create_detector(detector_name, &detector_model)
        .context("Failed to initialize face detector")?;

    let age_gender_model = settings
        .age_gender_model
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_AGE_GENDER_MODEL));
    info!("Loading attribute models: {:?}", age_gender_model);
    let analyzer = OnnxAttributeAnalyzer::new(&age_gender_model, race_model)
        .context("Failed to load attribute models")?;

    let mut pipeline = Pipeline::new(detector, analyzer, config);
    let mut sink = (!args.no_store).then(|| RecordSink::new(CsvFileStore::new(&store)));

    let images = collect_images(&args.input)?;
    if images.is_empty() {
        warn!("No images found in {:?}", args.input);
        return Ok(());
    }
    let many = args.input.is_dir();
    info!("Analyzing {} images", images.len());

    let start_time = Instant::now();
    let mut faces_found = 0;
    let mut failed_images = 0;

    for path in &images {
        let output = match pipeline.run_path(path) {
            Ok(output) => output,
            Err(err) if many => {
                error!("Failed to process {:?}: {}", path, err);
                failed_images += 1;
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to analyze image: {:?}", path));
            }
        };

        print_output(path, &output, many);
        faces_found += output.records.len();

        if let Some(dir) = &args.annotated_dir {
            save_annotated(dir, path, &output)?;
        }

        if let Some(sink) = sink.as_mut() {
            let rows = sink
                .append(&output.records, args.name.as_deref())
                .with_context(|| format!("Failed to append results to {:?}", store))?;
            debug!("Record store now holds {} rows", rows);
        }
    }

    info!(
        "Finished. Analyzed {} faces in {} images ({} failed) in {} seconds",
        faces_found,
        images.len(),
        failed_images,
        start_time.elapsed().as_secs()
    );

    Ok(())
}

/// Main program logic
fn run(args: Args) -> Result<()> {
    // Initialize logger
    env_logger::init();

    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let store = args
        .store
        .clone()
        .or_else(|| settings.store.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE));

    match args.command {
        Command::Analyze(analyze_args) => analyze(analyze_args, settings, store),
        Command::Clear => {
            RecordSink::new(CsvFileStore::new(&store))
                .clear()
                .with_context(|| format!("Failed to clear record store {:?}", store))?;
            info!("Cleared record store {:?}", store);
            Ok(())
        }
        Command::Show => {
            let rows = RecordSink::new(CsvFileStore::new(&store))
                .rows()
                .with_context(|| format!("Failed to read record store {:?}", store))?;
            for row in &rows {
                let name = row.name.as_deref().unwrap_or("-");
                match row.race {
                    Some(race) => println!("{name}: Age - {}, Gender - {}, Race - {race}", row.age, row.gender),
                    None => println!("{name}: Age - {}, Gender - {}", row.age, row.gender),
                }
            }
            println!("Total rows: {}", rows.len());
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    run(args)
}
