use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use log::info;
use log::warn;
use macroape::abc::Dna;
use macroape::bg::BackgroundModel;
use macroape::config::Config;
use macroape::discrete::Discretizer;
use macroape::model::ReverseComplement;
use macroape::model::ScoringModel;
use macroape::pair::Alignment;
use macroape::pair::Orientation;
use macroape::pwm::DiScoringMatrix;
use macroape::pwm::ScoringMatrix;
use macroape::pwm::DEFAULT_EFFECTIVE_COUNT;
use macroape::scan::collect_distance_matrix;
use macroape::scan::CandidateEvaluator;
use macroape::scan::Evaluator;
use macroape::scan::ScanCollection;
use macroape::similarity::CompareModels;
use macroape::threshold::BoundaryType;
use macroape::threshold::Calculator;
use macroape::threshold::FindPvalue;
use macroape::threshold::FindThreshold;
use macroape::threshold::PvalueInfo;
use macroape::threshold::ThresholdTable;
use macroape_io::matrix::DataModel;
use macroape_io::report;

// --- Options -----------------------------------------------------------------

#[derive(Args, Debug, Clone)]
struct MatrixOptions {
    /// the matrices store position counts
    #[arg(long, conflicts_with = "ppm")]
    pcm: bool,
    /// the matrices store position frequencies
    #[arg(long, conflicts_with = "pcm")]
    ppm: bool,
    /// the number of sequences assumed behind frequency matrices
    #[arg(long, default_value_t = DEFAULT_EFFECTIVE_COUNT)]
    effective_count: f64,
    /// the matrices store one line per symbol
    #[arg(long)]
    transpose: bool,
    /// the background, as comma-separated probabilities or `1,1,1,1`
    #[arg(short, long, default_value = "1,1,1,1")]
    background: String,
    /// the matrices are dinucleotide matrices
    #[arg(long)]
    dinucleotide: bool,
    /// build dinucleotide matrices from mononucleotide matrices
    #[arg(long, requires = "dinucleotide")]
    from_mono: bool,
    /// the background converting mononucleotide counts or frequencies
    #[arg(long, requires = "from_mono")]
    mono_background: Option<String>,
}

impl MatrixOptions {
    fn data_model(&self) -> DataModel {
        if self.pcm {
            DataModel::Pcm
        } else if self.ppm {
            DataModel::Ppm
        } else {
            DataModel::Pwm
        }
    }
}

#[derive(Args, Debug, Clone)]
struct LimitOptions {
    /// the maximum number of entries of score distributions
    #[arg(long, default_value_t = 10_000_000)]
    max_hash_size: usize,
    /// the maximum number of entries of joint score distributions
    #[arg(long, default_value_t = 10_000_000)]
    max_pair_hash_size: usize,
}

// --- Commands ----------------------------------------------------------------

#[derive(Args, Debug)]
struct FindThresholdCommand {
    /// the matrix file to load
    matrix: PathBuf,
    /// the p-values to find thresholds for
    #[arg(default_values_t = [0.0005])]
    pvalues: Vec<f64>,
    /// the discretization rate of the scores
    #[arg(short, long, default_value_t = 10000.0)]
    discretization: f64,
    /// the side taken when no threshold hits a p-value exactly
    #[arg(long, default_value = "lower")]
    boundary: BoundaryType,
    #[command(flatten)]
    matrix_options: MatrixOptions,
    #[command(flatten)]
    limits: LimitOptions,
}

#[derive(Args, Debug)]
struct FindPvalueCommand {
    /// the matrix file to load
    matrix: PathBuf,
    /// the thresholds to find p-values for
    #[arg(required = true, allow_negative_numbers = true)]
    thresholds: Vec<f64>,
    /// the discretization rate of the scores
    #[arg(short, long, default_value_t = 10000.0)]
    discretization: f64,
    /// a folder of precomputed threshold tables, named after the matrices
    #[arg(long)]
    precalc: Option<PathBuf>,
    #[command(flatten)]
    matrix_options: MatrixOptions,
    #[command(flatten)]
    limits: LimitOptions,
}

#[derive(Args, Debug)]
struct EvalSimilarityCommand {
    /// the first matrix file to load
    first: PathBuf,
    /// the second matrix file to load
    second: PathBuf,
    /// the p-value both matrices are thresholded at
    #[arg(short, long, default_value_t = 0.0005)]
    pvalue: f64,
    /// the discretization rate of the scores
    #[arg(short, long, default_value_t = 10.0)]
    discretization: f64,
    /// the side taken when no threshold hits the p-value exactly
    #[arg(long, default_value = "lower")]
    boundary: BoundaryType,
    /// the position of the second matrix relative to the first one
    #[arg(long, requires = "orientation", allow_negative_numbers = true)]
    shift: Option<isize>,
    /// the strand of the second matrix, `direct` or `revcomp`
    #[arg(long, requires = "shift")]
    orientation: Option<Orientation>,
    /// the background of the second matrix, if different
    #[arg(long)]
    second_background: Option<String>,
    #[command(flatten)]
    matrix_options: MatrixOptions,
    #[command(flatten)]
    limits: LimitOptions,
}

#[derive(Args, Debug)]
struct ScanCollectionCommand {
    /// the query matrix file to load
    #[arg(required_unless_present = "distance_matrix")]
    query: Option<PathBuf>,
    /// the folder containing the collection matrices
    #[arg(required_unless_present = "distance_matrix")]
    collection: Option<PathBuf>,
    /// the p-value all matrices are thresholded at
    #[arg(short, long, default_value_t = 0.0005)]
    pvalue: f64,
    /// a fixed threshold for the query, instead of the p-value
    #[arg(long, allow_negative_numbers = true)]
    query_threshold: Option<f64>,
    /// the discretization rate of rough comparisons
    #[arg(short, long, default_value_t = 1.0)]
    discretization: f64,
    /// the discretization rate of recalculated comparisons
    #[arg(long, default_value_t = 10.0)]
    precise: f64,
    /// the similarity below which candidates are not reported
    #[arg(long, default_value_t = 0.05)]
    similarity_cutoff: f64,
    /// the rough similarity above which similarities are recalculated
    #[arg(long, default_value_t = 0.05)]
    recalculation_cutoff: f64,
    /// the side taken when no threshold hits the p-value exactly
    #[arg(long, default_value = "lower")]
    boundary: BoundaryType,
    /// a folder of precomputed threshold tables, named after the matrices
    #[arg(long)]
    precalc: Option<PathBuf>,
    /// output the distance matrix of the matrices in a folder instead
    #[arg(
        long,
        value_name = "FOLDER",
        conflicts_with_all = ["query", "collection", "query_threshold", "precalc"]
    )]
    distance_matrix: Option<PathBuf>,
    /// the number of threads to use in parallel
    #[arg(short = 'j', long, default_value_t = 0)]
    jobs: usize,
    #[command(flatten)]
    matrix_options: MatrixOptions,
    #[command(flatten)]
    limits: LimitOptions,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the thresholds of a matrix for some p-values.
    FindThreshold(FindThresholdCommand),
    /// Find the p-values of some thresholds of a matrix.
    FindPvalue(FindPvalueCommand),
    /// Compute the similarity of two matrices.
    EvalSimilarity(EvalSimilarityCommand),
    /// Compare a matrix against a collection of matrices.
    ScanCollection(ScanCollectionCommand),
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Parameters {
    /// increase the verbosity of the logs
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

// --- Models ------------------------------------------------------------------

/// A model type that can be loaded from the command line.
trait LoadModel: ScoringModel + ReverseComplement + Sized {
    fn background(text: &str) -> anyhow::Result<Self::Background>;
    fn load(path: &Path, options: &MatrixOptions, background: &Self::Background)
        -> anyhow::Result<Self>;
}

fn read_raw(path: &Path, options: &MatrixOptions) -> anyhow::Result<macroape_io::matrix::RawMatrix> {
    let file = File::open(path)
        .map(BufReader::new)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let raw = macroape_io::matrix::read(file)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if options.transpose {
        Ok(raw.transposed()?)
    } else {
        Ok(raw)
    }
}

fn read_table(folder: &Path, matrix: &Path, volume: f64) -> anyhow::Result<ThresholdTable> {
    let path = folder.join(format!("{}.thr", file_name(matrix)));
    let file = File::open(&path)
        .map(BufReader::new)
        .with_context(|| format!("failed to open {}", path.display()))?;
    macroape_io::table::read(file, volume)
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl LoadModel for ScoringMatrix<Dna> {
    fn background(text: &str) -> anyhow::Result<Self::Background> {
        Ok(macroape_io::background::parse(text)?)
    }

    fn load(
        path: &Path,
        options: &MatrixOptions,
        background: &Self::Background,
    ) -> anyhow::Result<Self> {
        let raw = read_raw(path, options)?;
        let pwm = raw
            .to_scoring(options.data_model(), background, options.effective_count)
            .with_context(|| format!("invalid matrix in {}", path.display()))?;
        Ok(match raw.name() {
            Some(_) => pwm,
            None => pwm.with_name(file_name(path)),
        })
    }
}

impl LoadModel for DiScoringMatrix<Dna> {
    fn background(text: &str) -> anyhow::Result<Self::Background> {
        Ok(macroape_io::background::parse_di(text)?)
    }

    fn load(
        path: &Path,
        options: &MatrixOptions,
        _background: &Self::Background,
    ) -> anyhow::Result<Self> {
        let raw = read_raw(path, options)?;
        let pwm = if options.from_mono {
            let text = options.mono_background.as_deref().unwrap_or("1,1,1,1");
            let background = macroape_io::background::parse::<Dna>(text)?;
            let mono = raw
                .to_scoring(options.data_model(), &background, options.effective_count)
                .with_context(|| format!("invalid matrix in {}", path.display()))?;
            DiScoringMatrix::from_mono(&mono)
                .with_context(|| format!("invalid matrix in {}", path.display()))?
        } else {
            raw.to_di_scoring(options.data_model())
                .with_context(|| format!("invalid matrix in {}", path.display()))?
        };
        Ok(match raw.name() {
            Some(_) => pwm,
            None => pwm.with_name(file_name(path)),
        })
    }
}

fn model_name<M: ScoringModel>(model: &M) -> &str {
    model.name().unwrap_or("<unnamed>")
}

// --- Subcommands -------------------------------------------------------------

fn find_threshold<M: LoadModel>(cmd: &FindThresholdCommand) -> anyhow::Result<()> {
    let background = M::background(&cmd.matrix_options.background)?;
    let model = M::load(&cmd.matrix, &cmd.matrix_options, &background)?;
    let calc = Calculator::new(&model, &background, Discretizer::new(cmd.discretization)?)?
        .max_entries(Some(cmd.limits.max_hash_size));
    let infos = calc.thresholds_by_pvalues(&cmd.pvalues, cmd.boundary)?;

    let mut out = BufWriter::new(std::io::stdout().lock());
    report::write_parameters(
        &mut out,
        &[
            ("matrix", model_name(&model).to_string()),
            ("discretization", cmd.discretization.to_string()),
            ("boundary", cmd.boundary.to_string()),
        ],
    )?;
    report::write_thresholds(&mut out, &infos)?;
    out.flush()?;
    Ok(())
}

fn pvalues<M: LoadModel>(
    cmd: &FindPvalueCommand,
    model: &M,
    background: &M::Background,
) -> anyhow::Result<Vec<PvalueInfo>> {
    let evaluator: Evaluator<M> = match cmd.precalc.as_ref() {
        Some(folder) => {
            let volume = background.vocabulary_volume(model.word_len());
            read_table(folder, &cmd.matrix, volume)?.into()
        }
        None => Calculator::new(model, background, Discretizer::new(cmd.discretization)?)?
            .max_entries(Some(cmd.limits.max_hash_size))
            .into(),
    };
    Ok(evaluator.pvalues_by_thresholds(&cmd.thresholds)?)
}

fn find_pvalue<M: LoadModel>(cmd: &FindPvalueCommand) -> anyhow::Result<()> {
    let background = M::background(&cmd.matrix_options.background)?;
    let model = M::load(&cmd.matrix, &cmd.matrix_options, &background)?;
    let infos = pvalues(cmd, &model, &background)?;

    let source = match cmd.precalc.as_ref() {
        Some(folder) => folder.display().to_string(),
        None => format!("discretization {}", cmd.discretization),
    };
    let mut out = BufWriter::new(std::io::stdout().lock());
    report::write_parameters(
        &mut out,
        &[
            ("matrix", model_name(&model).to_string()),
            ("source", source),
        ],
    )?;
    report::write_pvalues(&mut out, &infos)?;
    out.flush()?;
    Ok(())
}

fn eval_similarity<M: LoadModel>(cmd: &EvalSimilarityCommand) -> anyhow::Result<()> {
    let first_bg = M::background(&cmd.matrix_options.background)?;
    let second_bg = match cmd.second_background.as_ref() {
        Some(text) => M::background(text)?,
        None => first_bg.clone(),
    };
    let first = M::load(&cmd.first, &cmd.matrix_options, &first_bg)?;
    let second = M::load(&cmd.second, &cmd.matrix_options, &second_bg)?;

    let cmp = CompareModels::new(
        &first,
        &second,
        &first_bg,
        &second_bg,
        Discretizer::new(cmd.discretization)?,
    )?
    .max_entries(Some(cmd.limits.max_hash_size))
    .max_pair_entries(Some(cmd.limits.max_pair_hash_size));

    let t1 = cmp.first().threshold_by_pvalue(cmd.pvalue, cmd.boundary)?;
    let t2 = cmp.second().threshold_by_pvalue(cmd.pvalue, cmd.boundary)?;
    let info = match (cmd.shift, cmd.orientation) {
        (Some(shift), Some(orientation)) => {
            let alignment = Alignment::new(first.len(), second.len(), shift, orientation);
            cmp.jaccard_at(&alignment, t1.threshold, t2.threshold)?
        }
        _ => cmp.jaccard_given(&t1.into(), &t2.into())?,
    };

    let mut out = BufWriter::new(std::io::stdout().lock());
    report::write_parameters(
        &mut out,
        &[
            ("first", model_name(&first).to_string()),
            ("second", model_name(&second).to_string()),
            ("pvalue", cmd.pvalue.to_string()),
            ("discretization", cmd.discretization.to_string()),
            ("boundary", cmd.boundary.to_string()),
        ],
    )?;
    report::write_similarity(&mut out, &info, t1.threshold, t2.threshold)?;
    out.flush()?;
    Ok(())
}

fn load_collection<M: LoadModel>(
    folder: &Path,
    options: &MatrixOptions,
    background: &M::Background,
) -> anyhow::Result<Vec<(PathBuf, M)>> {
    let mut paths = std::fs::read_dir(folder)
        .with_context(|| format!("failed to read {}", folder.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.retain(|p| p.is_file());
    paths.sort();

    let mut models = Vec::with_capacity(paths.len());
    for path in paths {
        match M::load(&path, options, background) {
            Ok(model) => models.push((path, model)),
            Err(e) => warn!("skipping {}: {:#}", path.display(), e),
        }
    }
    info!("loaded {} matrices from {}", models.len(), folder.display());
    Ok(models)
}

fn scan_collection<M: LoadModel>(cmd: &ScanCollectionCommand) -> anyhow::Result<()> {
    if cmd.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cmd.jobs)
            .build_global()?;
    }

    let config = Config {
        rough_discretization: cmd.discretization,
        precise_discretization: cmd.precise,
        max_distribution_entries: Some(cmd.limits.max_hash_size),
        max_pair_entries: Some(cmd.limits.max_pair_hash_size),
        boundary: cmd.boundary,
        pvalue: cmd.pvalue,
        recalculation_cutoff: Some(cmd.recalculation_cutoff),
        similarity_cutoff: Some(cmd.similarity_cutoff),
    };
    let background = M::background(&cmd.matrix_options.background)?;

    let mut out = BufWriter::new(std::io::stdout().lock());
    if let Some(folder) = cmd.distance_matrix.as_ref() {
        let models = load_collection::<M>(folder, &cmd.matrix_options, &background)?
            .into_iter()
            .map(|(_, model)| model)
            .collect::<Vec<_>>();
        let distances = collect_distance_matrix(&models, &background, &config)?;
        let names = models.iter().map(model_name).collect::<Vec<_>>();
        report::write_distance_matrix(&mut out, &names, &distances)?;
        out.flush()?;
        return Ok(());
    }

    let (query, collection) = match (cmd.query.as_ref(), cmd.collection.as_ref()) {
        (Some(query), Some(collection)) => (query, collection),
        _ => bail!("a query and a collection are required"),
    };
    let models = load_collection::<M>(collection, &cmd.matrix_options, &background)?;
    let query = M::load(query, &cmd.matrix_options, &background)?;
    let mut candidates = Vec::with_capacity(models.len());
    for (path, model) in models {
        let name = model_name(&model).to_string();
        let candidate = match cmd.precalc.as_ref() {
            Some(folder) => {
                let volume = background.vocabulary_volume(model.word_len());
                let table = read_table(folder, &path, volume)?;
                let precise = Calculator::new(&model, &background, config.precise_discretizer()?)?
                    .max_entries(config.max_distribution_entries);
                CandidateEvaluator::new(
                    name,
                    model,
                    Evaluator::from(table),
                    Some(Evaluator::from(precise)),
                )
            }
            None => CandidateEvaluator::computed(name, model, &background, &config)?,
        };
        candidates.push(candidate);
    }

    let results = ScanCollection::new(&query, &candidates, &background, &config)
        .query_threshold(cmd.query_threshold)
        .similarity_infos()?;

    report::write_parameters(
        &mut out,
        &[
            ("query", model_name(&query).to_string()),
            ("collection", collection.display().to_string()),
            ("pvalue", cmd.pvalue.to_string()),
            ("discretization", cmd.discretization.to_string()),
            ("precise", cmd.precise.to_string()),
            ("similarity_cutoff", cmd.similarity_cutoff.to_string()),
            ("recalculation_cutoff", cmd.recalculation_cutoff.to_string()),
        ],
    )?;
    report::write_scan(&mut out, &results)?;
    out.flush()?;
    Ok(())
}

// --- Main --------------------------------------------------------------------

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let params = Parameters::parse();
    init_logger(params.verbose);

    match &params.command {
        Command::FindThreshold(cmd) => match cmd.matrix_options.dinucleotide {
            false => find_threshold::<ScoringMatrix<Dna>>(cmd),
            true => find_threshold::<DiScoringMatrix<Dna>>(cmd),
        },
        Command::FindPvalue(cmd) => match cmd.matrix_options.dinucleotide {
            false => find_pvalue::<ScoringMatrix<Dna>>(cmd),
            true => find_pvalue::<DiScoringMatrix<Dna>>(cmd),
        },
        Command::EvalSimilarity(cmd) => {
            if !(0.0..=1.0).contains(&cmd.pvalue) {
                bail!("p-value must be between 0 and 1, got {}", cmd.pvalue);
            }
            match cmd.matrix_options.dinucleotide {
                false => eval_similarity::<ScoringMatrix<Dna>>(cmd),
                true => eval_similarity::<DiScoringMatrix<Dna>>(cmd),
            }
        }
        Command::ScanCollection(cmd) => match cmd.matrix_options.dinucleotide {
            false => scan_collection::<ScoringMatrix<Dna>>(cmd),
            true => scan_collection::<DiScoringMatrix<Dna>>(cmd),
        },
    }
}
