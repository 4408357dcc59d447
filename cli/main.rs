//! This module contains the main entrypoint to the fairlens cli.

use anyhow::Result;
use clap::Clap;
use colored::Colorize;
use fairlens_core::{Config, Progress};
use std::path::PathBuf;

#[derive(Clap)]
#[clap(
	about = "Evaluate loan application datasets for accuracy and fairness.",
	setting = clap::AppSettings::DisableHelpSubcommand,
)]
enum Options {
	#[clap(name = "analyze")]
	Analyze(AnalyzeOptions),
	#[clap(name = "serve")]
	Serve(ServeOptions),
}

#[derive(Clap)]
#[clap(about = "evaluate a dataset in bulk")]
#[clap(long_about = "train a model on a csv file and print the fairness report as json")]
struct AnalyzeOptions {
	#[clap(short, long, about = "the path to your .csv file")]
	file: PathBuf,
	#[clap(
		short,
		long,
		about = "the model family to fit",
		default_value = "logistic_regression"
	)]
	model: String,
	#[clap(long, about = "evaluate through the legacy biased dataset branch")]
	bias_flag: bool,
	#[clap(short, long, about = "the path to a config file")]
	config: Option<PathBuf>,
}

#[derive(Clap)]
#[clap(about = "run the evaluation server")]
struct ServeOptions {
	#[clap(long, default_value = "0.0.0.0")]
	host: std::net::IpAddr,
	#[clap(long, env = "PORT", default_value = "8080")]
	port: u16,
	#[clap(short, long, about = "the path to a config file")]
	config: Option<PathBuf>,
}

fn main() {
	let options = Options::parse();
	let result = match options {
		Options::Analyze(options) => cli_analyze(options),
		Options::Serve(options) => cli_serve(options),
	};
	if let Err(error) = result {
		eprintln!("{}: {}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
	match config_path {
		Some(config_path) => Config::from_path(config_path),
		None => Ok(Config::default()),
	}
}

fn cli_analyze(options: AnalyzeOptions) -> Result<()> {
	let config = load_config(options.config.as_ref())?;
	let file_bytes = std::fs::read(&options.file)?;
	let (report, _) = fairlens_core::evaluate_bulk(
		&file_bytes,
		&options.model,
		options.bias_flag,
		&config,
		&mut |progress| match progress {
			Progress::Loading(counter) => eprintln!("loading dataset ({} bytes)", counter.total()),
			Progress::ComputingFeatures => eprintln!("computing features"),
			Progress::Training => eprintln!("training model"),
			Progress::Evaluating => eprintln!("evaluating fairness"),
		},
	)?;
	println!("{}", serde_json::to_string_pretty(&report)?);
	Ok(())
}

fn cli_serve(options: ServeOptions) -> Result<()> {
	tracing_subscriber::fmt::init();
	let config = load_config(options.config.as_ref())?;
	fairlens_app::run(
		fairlens_app::Options {
			host: options.host,
			port: options.port,
		},
		config,
	)
}
