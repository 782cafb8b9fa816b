//! layr - layered shell script runner
//!
//! Runs namespaced shell scripts with:
//! - Layered TOML configuration (dist, main, local override)
//! - Constant, dotenv and command-computed placeholders
//! - Template rendering
//! - Live, per-command output

use std::process::ExitCode;

use clap::Parser;
use console::style;

mod catalog;
mod cli;
mod command;
mod config;
mod error;
mod executor;
mod loader;
mod logger;
mod merge;
mod placeholder;
mod runtime;
mod shell;
mod template;

use catalog::{Script, ScriptCatalog};
use cli::{split_script_names, Cli, Commands, EffectiveCommand, ListFormat};
use error::Result;
use loader::ConfigLayers;
use logger::TerminalLogger;
use runtime::{parse_params, Runtime};

#[tokio::main]
async fn main() -> ExitCode {
    // Set up panic handler for nice error messages
    miette::set_panic_hook();

    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:?}", style("error").red().bold(), miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Change working directory if specified
    if let Some(cwd) = &cli.cwd {
        std::env::set_current_dir(cwd)?;
    }

    let runtime = load_runtime(&cli)?;

    match cli.effective_command() {
        EffectiveCommand::Subcommand(Commands::Run { scripts }) => {
            print_header(&runtime);
            run_scripts(&runtime, &split_script_names(scripts)).await
        }
        EffectiveCommand::Subcommand(Commands::List { format, all }) => {
            if matches!(format, ListFormat::Table) {
                print_header(&runtime);
            }
            print_script_list(&runtime, format.clone(), *all);
            Ok(())
        }
        EffectiveCommand::Subcommand(Commands::Check) => {
            let environments = runtime.config().environments().len();
            let scripts = runtime.catalog().all().len();
            println!(
                "{} {} is valid ({} environments, {} scripts)",
                style("✓").green(),
                runtime.root().display(),
                environments,
                scripts
            );
            Ok(())
        }
        EffectiveCommand::RunScripts(scripts) => {
            print_header(&runtime);
            run_scripts(&runtime, &split_script_names(scripts)).await
        }
        EffectiveCommand::None => {
            print_header(&runtime);
            print_script_list(&runtime, ListFormat::Table, false);
            Ok(())
        }
    }
}

fn load_runtime(cli: &Cli) -> Result<Runtime> {
    let cwd = std::env::current_dir()?;
    let layers = ConfigLayers::discover(&cwd, cli.config.as_deref())?;
    let config = layers.load()?;
    let params = parse_params(&cli.params)?;

    Ok(Runtime::new(config, layers.root)?.with_params(params))
}

async fn run_scripts(runtime: &Runtime, names: &[String]) -> Result<()> {
    match runtime.run(names, TerminalLogger::new()).await {
        Ok(summaries) => {
            let ignored: usize = summaries.iter().map(|s| s.ignored_failures).sum();
            println!();
            println!(
                "{} All commands successfully executed{}",
                style("✓").green().bold(),
                if ignored > 0 {
                    format!(" ({} ignored failures)", ignored)
                } else {
                    String::new()
                }
            );
            Ok(())
        }
        Err(e) => {
            println!();
            println!(
                "{} Execution aborted, a subcommand failed!",
                style("✗").red().bold()
            );
            Err(e)
        }
    }
}

fn print_header(runtime: &Runtime) {
    println!("{}", style("###################").green().bold());
    let header = runtime.config().header();
    if !header.is_empty() {
        println!("{}", header);
    }
    println!();
}

fn print_script_list(runtime: &Runtime, format: ListFormat, show_hidden: bool) {
    let scripts: Vec<Script> = runtime
        .catalog()
        .all()
        .into_iter()
        .filter(|script| show_hidden || !script.is_hidden())
        .collect();

    match format {
        ListFormat::Table => {
            println!("{}", style("Available scripts:").bold());
            println!();

            if scripts.is_empty() {
                println!("  {}", style("-> Currently no scripts available").yellow());
            }

            let max_name_len = scripts
                .iter()
                .map(|s| s.full_name().len())
                .max()
                .unwrap_or(0);

            let mut current_env: Option<&str> = None;
            for script in &scripts {
                if current_env != Some(script.environment()) {
                    current_env = Some(script.environment());
                    println!("{}", style(format!("[{}]", script.environment())).dim());
                }

                let name = script.full_name();
                println!(
                    "  {}{}  {}",
                    style(&name).cyan().bold(),
                    " ".repeat(max_name_len - name.len()),
                    style(script.description().unwrap_or("")).dim()
                );
            }

            println!();
            println!(
                "{}",
                style(format!("{} script(s) available", scripts.len())).green().bold()
            );
        }

        ListFormat::Json => {
            let entries: Vec<serde_json::Value> = scripts
                .iter()
                .map(|script| {
                    serde_json::json!({
                        "name": script.full_name(),
                        "environment": script.environment(),
                        "path": script.path(),
                        "description": script.description(),
                        "hidden": script.is_hidden(),
                    })
                })
                .collect();
            match serde_json::to_string_pretty(&entries) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("{}: {}", style("error").red().bold(), e),
            }
        }

        ListFormat::Plain => {
            for script in &scripts {
                println!("{}", script.full_name());
            }
        }
    }
}
