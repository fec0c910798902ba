
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use gumdrop::Options;
use tracing::info;

use cets_convert::config::ConverterConfig;
use cets_convert::convert::TiltSeriesGroupConverter;
use cets_convert::logging::{self, ResultExt};
use cets_convert::output::{self, OutputTarget};


#[derive(Debug, Options)]
struct Args {

	/// print help message
	#[options()]
	help: bool,

	/// settings for log output
	#[options(no_short, default = "cets_convert=info")]
	log: String,

	/// the tilt series group STAR file
	#[options(short = "i", required, parse(try_from_str))]
	input: PathBuf,

	/// convert only this tilt series, can be given more than once
	#[options(short = "t")]
	tilt_series: Vec<String>,

	/// prefix or folder for the output files, print a summary instead if not given
	#[options(short = "o")]
	output: Option<String>,

	/// gain reference file, when the input doesn't come from a motion correction job
	#[options(no_short)]
	gain_reference: Option<String>,

	/// defect file, when the input doesn't come from a motion correction job
	#[options(no_short)]
	defect_file: Option<String>,

	/// TOML file of converter settings
	#[options(no_short, parse(try_from_str))]
	config: Option<PathBuf>,

	/// the RELION project folder, paths in the STAR files are relative to it
	#[options(no_short, parse(try_from_str))]
	project_dir: Option<PathBuf>,

	/// also write a dataset document with every converted tilt series
	#[options(no_short)]
	dataset: Option<String>
}


fn main() -> ExitCode {

	// parse arguments
	let args = Args::parse_args_default_or_exit();

	// init logging
	let Ok(_) = logging::init(&args.log)
		.log_err()
		else { return ExitCode::FAILURE; };

	let Ok(_) = run(args)
		.log_err()
		else { return ExitCode::FAILURE; };

	ExitCode::SUCCESS
}


#[tracing::instrument(skip_all, level = 5, name = "CetsConvert")]
fn run(args: Args) -> Result<()> {

	let config = match &args.config {
		Some(path) => ConverterConfig::read(path)?,
		None => ConverterConfig::default()
	};

	// check the output before doing any work
	let target = args.output
		.as_ref()
		.map(OutputTarget::parse)
		.transpose()?;

	let mut converter = TiltSeriesGroupConverter::new(&args.input, config)
		.with_gain_file(args.gain_reference)
		.with_defect_file(args.defect_file);
	if let Some(project_dir) = args.project_dir {
		converter = converter.with_project_dir(project_dir);
	}

	let names = Some(args.tilt_series)
		.filter(|names| !names.is_empty());
	let conversion = converter.convert(names.as_deref())?;

	match target {
		Some(target) => {
			let paths = output::write(&target, &conversion, args.dataset.as_deref())?;
			for path in paths {
				info!("Wrote: {}", path.to_string_lossy());
			}
		}
		None => {
			for line in output::summary(&conversion) {
				println!("{}", line);
			}
		}
	}

	Ok(())
}
