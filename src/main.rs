//! Resize images (or folders of images) from the command line.
use ::std::path::PathBuf;

use ::anyhow::{bail, Result};
use ::clap::{value_parser, CommandFactory, FromArgMatches, Parser};
use ::resampla::{init_logging, Batch, BatchOptions, LogLevel};
use ::resampla_image::{
    scaling::{ScalingCondition, ScalingTarget},
    FilterType, ResizeConfig,
};
use ::tracing::debug;

#[derive(Parser, Debug)]
#[command(
        version = env!("CARGO_PKG_VERSION"),
        author = env!("CARGO_PKG_AUTHORS"),
        about = env!("CARGO_PKG_DESCRIPTION"),
        disable_help_flag = true,
)]
pub struct Args {
    /// Prints help information
    #[arg(short = 'H', long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,
    /// Level of messaging suppression
    #[arg(short, long, action = clap::ArgAction::Count, value_parser = value_parser!(u8).range(0..=3))]
    quiet: u8,
    /// Manually provide the path to the config.toml file
    #[cfg(feature = "config")]
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath, value_parser = parse_file_path)]
    config: Option<PathBuf>,
    /// Image, or folder of images, to resize
    #[arg(required = true, value_name = "INPUT", value_hint = clap::ValueHint::AnyPath, value_parser = parse_existing_path)]
    input: PathBuf,
    /// Where to write the result, a folder if INPUT is one
    #[arg(required = true, value_name = "OUTPUT", value_hint = clap::ValueHint::AnyPath)]
    output: PathBuf,
    /// Target width
    #[arg(short, long, value_name = "WIDTH", value_parser = value_parser!(u32).range(1..))]
    width: Option<u32>,
    /// Target height
    #[arg(short, long, value_name = "HEIGHT", value_parser = value_parser!(u32).range(1..))]
    height: Option<u32>,
    /// Uniform scale factor, used when neither width nor height is given
    #[arg(short, long, value_name = "FACTOR")]
    scale: Option<f64>,
    /// Horizontal sub-pixel offset of the output grid
    #[arg(long, value_name = "PIXELS", allow_hyphen_values = true)]
    offset_x: Option<f64>,
    /// Vertical sub-pixel offset of the output grid
    #[arg(long, value_name = "PIXELS", allow_hyphen_values = true)]
    offset_y: Option<f64>,
    /// The filter used for resizing
    #[arg(short, long, default_value_t = FilterType::Lanczos3, value_enum, ignore_case = true)]
    filter: FilterType,
    /// Pick the filter per image from how much it is scaled
    #[arg(short, long)]
    auto_filter: bool,
    /// How the image is fitted to WIDTH x HEIGHT
    #[arg(long, default_value_t = ScalingTarget::Inside, value_enum, ignore_case = true)]
    fit: ScalingTarget,
    /// When to resize at all
    #[arg(long, default_value_t = ScalingCondition::Always, value_enum, ignore_case = true)]
    condition: ScalingCondition,
    /// Worker threads, 0 for one per core
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
    /// Filter sRGB values directly instead of in linear light
    #[arg(long)]
    ignore_color_space: bool,
    /// Do not premultiply straight alpha while filtering
    #[arg(long)]
    skip_premultiply: bool,
    /// Inputs are already linear light
    #[arg(long)]
    linear: bool,
}

#[cfg(feature = "config")]
impl Args {
    /// Overwrite options the user did not give with values from the config file.
    /// Returns the problems to report once logging is up.
    fn merge_config_file(&mut self, matches: &clap::ArgMatches) -> Vec<String> {
        use ::clap::parser::ValueSource;
        use ::resampla::config::{default_config_path, FileConfig};
        let Some(path) = self.config.clone().or_else(default_config_path) else {
            return Vec::new();
        };
        let file = match FileConfig::load(&path) {
            Ok(file) => file,
            Err(e) => return vec![format!("ignoring config file: {:#}", e)],
        };
        let defaulted = |id: &str| matches!(matches.value_source(id), None | Some(ValueSource::DefaultValue));
        macro_rules! merge {
            ($($name:ident),*) => {$(
                if let Some(v) = file.$name {
                    if defaulted(stringify!($name)) {
                        self.$name = v;
                    }
                }
            )*};
            ($($name:ident?),*) => {$(
                if file.$name.is_some() && defaulted(stringify!($name)) {
                    self.$name = file.$name;
                }
            )*};
        }
        merge!(quiet, filter, auto_filter, fit, condition, threads, ignore_color_space, skip_premultiply, linear);
        merge!(width?, height?, scale?);
        let mut problems = Vec::new();
        if self.quiet > 3 {
            problems.push(format!("{}: quiet must be in range [0, 3]", path.display()));
            self.quiet = 3;
        }
        problems
    }
}

fn parse_file_path(path: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("File does not exist: {}", path.display()))
    }
}

fn parse_existing_path(path: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("Path does not exist: {}", path.display()))
    }
}

fn main() -> Result<()> {
    let mut cmd = Args::command();
    #[cfg(feature = "env")]
    {
        cmd = cmd
            .mut_arg("quiet", |a| a.env("RESAMPLA_QUIET"))
            .mut_arg("filter", |a| a.env("RESAMPLA_FILTER"))
            .mut_arg("auto_filter", |a| a.env("RESAMPLA_AUTO_FILTER"))
            .mut_arg("fit", |a| a.env("RESAMPLA_FIT"))
            .mut_arg("condition", |a| a.env("RESAMPLA_CONDITION"))
            .mut_arg("threads", |a| a.env("RESAMPLA_THREADS"))
            .mut_arg("ignore_color_space", |a| a.env("RESAMPLA_IGNORE_COLOR_SPACE"))
            .mut_arg("skip_premultiply", |a| a.env("RESAMPLA_SKIP_PREMULTIPLY"));
        #[cfg(feature = "config")]
        {
            cmd = cmd.mut_arg("config", |a| a.env("RESAMPLA_CONFIG"));
        }
    }
    let matches = cmd.get_matches();
    #[allow(unused_mut)]
    let mut args = Args::from_arg_matches(&matches)?;
    #[cfg(feature = "config")]
    let problems = args.merge_config_file(&matches);
    init_logging(LogLevel::from(args.quiet));
    #[cfg(feature = "config")]
    for problem in problems {
        ::tracing::error!("{}", problem);
    }
    debug!("parsed args: {:#?}", args);

    let offset = match (args.offset_x, args.offset_y) {
        (None, None) => None,
        (x, y) => Some((x.unwrap_or(0.), y.unwrap_or(0.))),
    };
    let config = ResizeConfig {
        offset,
        num_threads: args.threads,
        ignore_color_space: args.ignore_color_space,
        skip_alpha_premultiply: args.skip_premultiply,
        ..ResizeConfig::default()
    };
    let options = BatchOptions {
        width: args.width.map(|w| w as usize),
        height: args.height.map(|h| h as usize),
        scale: args.scale,
        fit: args.fit,
        condition: args.condition,
        filter: args.filter,
        auto_filter: args.auto_filter,
        linear: args.linear,
    };
    if options.width.is_none() && options.height.is_none() && options.scale.is_none() {
        bail!("one of --width, --height or --scale is required");
    }
    let mut batch = Batch::new(config, options)?;
    // Any errors from here on out are likely to not be the users fault, so we can ask for a bug report
    human_panic::setup_panic!();
    let summary = batch.run(&args.input, &args.output)?;
    if summary.failed > 0 {
        bail!("{} of {} image(s) could not be resized", summary.failed, summary.failed + summary.resized);
    }
    Ok(())
}
