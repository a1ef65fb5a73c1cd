use asciigen::ai_client::ProviderChoice;
use asciigen::command_router::CommandRouter;
use asciigen::config::Config;
use asciigen::error::GenError;
use asciigen::generator::GenerateOptions;
use asciigen::prompt_builder::{Mode, Orientation};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn generation_args() -> Vec<Arg> {
    vec![
        Arg::new("provider")
            .long("provider")
            .short('p')
            .help("AI provider to use")
            .value_parser(["gemini", "groq", "auto"])
            .default_value("auto"),
        Arg::new("no-cache")
            .long("no-cache")
            .help("Skip the result cache for this run")
            .action(ArgAction::SetTrue),
        Arg::new("no-colors")
            .long("no-colors")
            .help("Print without terminal colors")
            .action(ArgAction::SetTrue),
        Arg::new("explain")
            .long("explain")
            .help("Ask the provider to explain the result")
            .action(ArgAction::SetTrue),
        Arg::new("live")
            .long("live")
            .help("Reveal the output line by line")
            .action(ArgAction::SetTrue),
    ]
}

fn prompts_arg() -> Arg {
    Arg::new("prompts")
        .help("One or more descriptions; each produces its own result")
        .required(true)
        .num_args(1..)
}

fn cli() -> Command {
    Command::new("ascii-gen")
        .about("Generate ASCII art, charts and diagrams with AI")
        .long_about(
            "ascii-gen turns natural-language prompts into ASCII art, terminal charts and \
             box-drawing diagrams using Gemini or Groq. Results are cached on disk and \
             provider calls are rate limited.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log progress to stderr")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("art")
                .about("Generate ASCII art or an ASCII logo")
                .arg(prompts_arg())
                .arg(
                    Arg::new("logo")
                        .long("logo")
                        .help("Render the text as a wide logo")
                        .action(ArgAction::SetTrue),
                )
                .args(generation_args()),
        )
        .subcommand(
            Command::new("chart")
                .about("Generate a terminal chart from data")
                .arg(prompts_arg())
                .args(generation_args()),
        )
        .subcommand(
            Command::new("diagram")
                .about("Generate a box-drawing flowchart")
                .arg(prompts_arg())
                .arg(
                    Arg::new("orientation")
                        .long("orientation")
                        .short('o')
                        .help("Flow direction: top-to-bottom or left-to-right (ltr)")
                        .default_value("top-to-bottom"),
                )
                .args(generation_args()),
        )
        .subcommand(
            Command::new("codebase")
                .about("Draw an architecture diagram of a source tree")
                .arg(
                    Arg::new("path")
                        .help("Directory to scan")
                        .value_parser(value_parser!(PathBuf))
                        .default_value("."),
                )
                .arg(
                    Arg::new("max-files")
                        .long("max-files")
                        .help("Maximum number of files to list")
                        .value_parser(value_parser!(usize))
                        .default_value("50"),
                )
                .args(generation_args()),
        )
        .subcommand(Command::new("config").about("Show configuration information"))
        .subcommand(
            Command::new("cache")
                .about("Inspect or clear the result cache")
                .subcommand_required(true)
                .subcommand(Command::new("clear").about("Delete every cached result"))
                .subcommand(Command::new("stats").about("Show cache size and age")),
        )
}

fn generate_options(matches: &ArgMatches) -> Result<GenerateOptions, GenError> {
    let provider = matches
        .get_one::<String>("provider")
        .map(|p| p.parse::<ProviderChoice>())
        .transpose()
        .map_err(GenError::Configuration)?
        .unwrap_or_default();
    let orientation = match matches.try_get_one::<String>("orientation") {
        Ok(Some(value)) => value
            .parse::<Orientation>()
            .map_err(GenError::Configuration)?,
        _ => Orientation::TopToBottom,
    };
    let flag = |name: &str| matches.try_get_one::<bool>(name).ok().flatten().copied().unwrap_or(false);

    Ok(GenerateOptions {
        provider,
        live: flag("live"),
        explain: flag("explain"),
        colors: !flag("no-colors"),
        orientation,
        logo: flag("logo"),
        no_cache: flag("no-cache"),
        max_files: matches
            .try_get_one::<usize>("max-files")
            .ok()
            .flatten()
            .copied()
            .unwrap_or(50),
    })
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let config = Config::load()?;

    let router = CommandRouter::new(config)?;
    match matches.subcommand() {
        Some((name @ ("art" | "chart" | "diagram"), sub)) => {
            let mode: Mode = name.parse().map_err(GenError::Configuration)?;
            let prompts: Vec<String> = sub
                .get_many::<String>("prompts")
                .unwrap_or_default()
                .cloned()
                .collect();
            let options = generate_options(sub)?;
            info!("Processing {} request: {:?}", mode, prompts);
            router.process_prompts(mode, &prompts, &options).await
        }
        Some(("codebase", sub)) => {
            let path = sub
                .get_one::<PathBuf>("path")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("."));
            let options = generate_options(sub)?;
            router.process_codebase(&path, &options).await
        }
        Some(("config", _)) => router.config().show_config_info(),
        Some(("cache", sub)) => match sub.subcommand() {
            Some(("clear", _)) => router.clear_cache().await,
            _ => router.show_cache_stats(),
        },
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match run(matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<GenError>() {
                Some(gen_error) => {
                    eprintln!("❌ {}", gen_error);
                    gen_error.exit_code()
                }
                None => {
                    eprintln!("❌ {:#}", e);
                    1
                }
            };
            ExitCode::from(code as u8)
        }
    }
}
