mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use oxidized_rulecov::corpus::{self, Corpus};
use oxidized_rulecov::engine::normalize::NormalizeOptions;
use oxidized_rulecov::engine::replay::ReplayEngine;
use oxidized_rulecov::engine::{self, Engine};
use oxidized_rulecov::report::CoverageReport;
use oxidized_rulecov::{baseline, config, harness, output};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check {
            corpus: root,
            config: config_path,
        } => {
            let config = load_config(config_path.as_deref());
            let corpus = load_corpus(&root, &config);

            println!("{}", "Corpus".bold().underline());
            println!();
            for (provider, files) in corpus.by_provider() {
                let expectations: usize = files.iter().map(|f| f.expectations.len()).sum();
                let regions: usize = files.iter().map(|f| f.negative_regions.len()).sum();
                println!(
                    "  {provider:<20} {n:>4} files  {expectations:>5} expectations  {regions:>4} negative regions",
                    n = files.len(),
                );
            }
            let categories = corpus.by_category();
            if !categories.is_empty() {
                println!();
                for (category, files) in categories {
                    println!("  category {category:<11} {n:>4} files", n = files.len());
                }
            }
            println!();
            println!(
                "  {} {} files, {} expectations, {} rules",
                "OK".green().bold(),
                corpus.len(),
                corpus.expectation_count(),
                corpus.rule_ids().len()
            );
        }

        Commands::Scan {
            corpus: root,
            format,
            output: output_path,
            config: config_path,
            matches,
            baseline: baseline_path,
            workers,
            deadline,
        } => {
            let mut config = load_config(config_path.as_deref());
            if let Some(n) = workers {
                config.run.workers = n.max(1);
            }

            // Read the baseline first so a bad path fails before the scan runs.
            let previous = baseline_path.map(|p| {
                CoverageReport::read(&p).unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                })
            });

            let corpus = load_corpus(&root, &config);

            let engine: Box<dyn Engine> = match matches {
                Some(path) => {
                    let opts = NormalizeOptions {
                        line_base: config.engine.line_base,
                        rule_id_style: config.engine.rule_id_style,
                    };
                    let replay = ReplayEngine::from_file(&path, &opts).unwrap_or_else(|e| {
                        eprintln!("Error: {}: {e}", path.display());
                        std::process::exit(2);
                    });
                    Box::new(replay.bind(&corpus))
                }
                None => engine::from_config(&config),
            };
            if !engine.is_available() {
                eprintln!(
                    "Error: engine '{}' is not available (see 'oxidized-rulecov check-engine')",
                    engine.name()
                );
                std::process::exit(2);
            }

            let cancel = harness::CancelToken::new();
            if let Some(secs) = deadline {
                cancel.cancel_after(Duration::from_secs(secs));
            }

            let options = harness::RunOptions::from_config(&config);
            let report = match harness::run(&corpus, engine.as_ref(), &options, &cancel) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                }
            };

            let formatted = output::format_report(&report, &format);
            if let Some(out_path) = output_path {
                std::fs::write(&out_path, &formatted).unwrap_or_else(|e| {
                    eprintln!("Error writing output: {e}");
                    std::process::exit(2);
                });
                eprintln!("Output written to {}", out_path.display());
            } else {
                print!("{formatted}");
            }

            let mut ok = report.passed();
            if let Some(previous) = previous {
                let regressions = baseline::diff(&previous, &report).unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                });
                eprint!(
                    "{}",
                    output::format_regressions(&regressions, &output::DiffFormat::Pretty)
                );
                ok &= regressions.is_empty();
            }

            std::process::exit(if ok { 0 } else { 1 });
        }

        Commands::Report { report, format } => {
            let report = CoverageReport::read(&report).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(2);
            });
            print!("{}", output::format_report(&report, &format));
            std::process::exit(if report.passed() { 0 } else { 1 });
        }

        Commands::Diff {
            baseline: baseline_path,
            current,
            format,
        } => {
            let read = |p: &Path| {
                CoverageReport::read(p).unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                })
            };
            let previous = read(&baseline_path);
            let current = read(&current);

            match baseline::diff(&previous, &current) {
                Ok(regressions) => {
                    print!("{}", output::format_regressions(&regressions, &format));
                    std::process::exit(if regressions.is_empty() { 0 } else { 1 });
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                }
            }
        }

        Commands::Rules {
            corpus: root,
            config: config_path,
        } => {
            let config = load_config(config_path.as_deref());
            let corpus = load_corpus(&root, &config);

            // rule id -> provider -> expectation count
            let mut table: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
            for file in corpus.files() {
                for exp in &file.expectations {
                    *table
                        .entry(exp.rule_id.as_str())
                        .or_default()
                        .entry(file.provider.as_str())
                        .or_default() += 1;
                }
            }
            for rule in &config.rules.catalog {
                table.entry(rule.as_str()).or_default();
            }

            println!("{}", "Rules".bold().underline());
            println!();
            for (rule, providers) in &table {
                let total: usize = providers.values().sum();
                let detail = if providers.is_empty() {
                    "untested".dimmed().to_string()
                } else {
                    providers
                        .iter()
                        .map(|(p, n)| format!("{p}:{n}"))
                        .collect::<Vec<_>>()
                        .join(" ")
                };
                println!("  {rule:<40} {total:>4}  {detail}");
            }
            println!();
            println!("  Total: {} rules", table.len());
        }

        Commands::CheckEngine {
            config: config_path,
        } => {
            let config = load_config(config_path.as_deref());
            let engine = engine::from_config(&config);

            println!("{}", "Engine Availability".bold().underline());
            println!();
            let status = if engine.is_available() {
                "READY".green().bold().to_string()
            } else {
                "NOT AVAILABLE".red().to_string()
            };
            println!(
                "  [{status}] {name:<20} {program}",
                name = engine.name(),
                program = config.engine.program,
            );
            if !engine.is_available() {
                std::process::exit(1);
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("RULECOV_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> config::Config {
    config::Config::load(path).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(2);
    })
}

/// Discovers and loads the corpus, exiting with status 2 on any structural
/// error.
fn load_corpus(root: &Path, config: &config::Config) -> Corpus {
    if !root.is_dir() {
        eprintln!("Error: corpus directory does not exist: {}", root.display());
        std::process::exit(2);
    }

    let syntax = config.annotation_syntax().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(2);
    });

    let files = corpus::discover(root, &config.corpus.extensions);
    if files.is_empty() {
        eprintln!(
            "Error: no fixture files with extensions [{}] under '{}'",
            config.corpus.extensions.join(", "),
            root.display()
        );
        std::process::exit(2);
    }

    Corpus::load(root, &files, &syntax).unwrap_or_else(|e| {
        if let Some(first) = e.first() {
            eprintln!("Error: {first}");
        }
        if e.errors.len() > 1 {
            eprintln!("  ({} more error(s))", e.errors.len() - 1);
        }
        std::process::exit(2);
    })
}
