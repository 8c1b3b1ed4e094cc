//! sqlkiln — command-line front end for the statement pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Compile for Postgres, binding one positional value
//! sqlkiln compile "SELECT id FROM users WHERE email = ? LIMIT 1" --bind bob@example.com
//!
//! # Cross-style: named input, qmark output for SQLite
//! sqlkiln compile "SELECT * FROM t WHERE id = :id" -d sqlite -t qmark --named id=7
//!
//! # Show every finding, blocking or not
//! sqlkiln validate "DELETE FROM users"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sqlkiln::params::ParameterDescriptor;
use sqlkiln::prelude::*;
use sqlkiln::validator::{self, ValidationReport};

#[derive(Parser)]
#[command(name = "sqlkiln")]
#[command(version)]
#[command(about = "Parse, validate and compile SQL for any dialect", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlkiln compile 'SELECT id FROM t WHERE x = ? LIMIT 5' --bind 5
    sqlkiln compile 'SELECT id FROM t WHERE x = :x' -d oracle -t positional_colon --named x=5
    sqlkiln validate 'SELECT * FROM users WHERE id = 1 OR 1=1'
    sqlkiln extract 'SELECT :a, :b FROM dual' -d oracle")]
struct Cli {
    /// Config file (defaults to <config dir>/sqlkiln/config.toml)
    #[arg(short, long, global = true, env = "SQLKILN_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a statement and bind its parameters
    Compile {
        sql: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Positional parameter values
        #[arg(short, long, value_delimiter = ',')]
        bind: Vec<String>,

        /// Named parameter values (name=value)
        #[arg(short, long, value_delimiter = ',')]
        named: Vec<String>,

        /// Lift literals into parameters
        #[arg(long)]
        literals: bool,
    },
    /// Run every validator and report all findings
    Validate {
        sql: String,

        /// Source dialect
        #[arg(short, long)]
        dialect: Option<Dialect>,
    },
    /// List the placeholders found in a statement
    Extract {
        sql: String,

        /// Source dialect
        #[arg(short, long)]
        dialect: Option<Dialect>,
    },
    /// List supported dialects and their parameter styles
    Dialects,
}

#[derive(clap::Args)]
struct TargetArgs {
    /// Dialect of the input and output SQL
    #[arg(short, long)]
    dialect: Option<Dialect>,

    /// Placeholder style of the output
    #[arg(short, long)]
    target_style: Option<ParameterStyle>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if let Some(KilnError::Validation { findings }) = e.downcast_ref::<KilnError>() {
                for finding in findings {
                    eprintln!("  {}", finding.to_string().red());
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sqlkiln=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => Settings::load_default()?,
    };

    match &cli.command {
        Commands::Compile {
            sql,
            target,
            bind,
            named,
            literals,
        } => {
            let mut config = settings.statement;
            if let Some(dialect) = target.dialect {
                config.dialect = dialect;
            }
            if let Some(style) = target.target_style {
                config.target_parameter_style = Some(style);
            }
            config.literal_parameterization |= *literals;
            config.validate()?;

            let params = parse_params(bind, named)?;
            let pipeline = Pipeline::new(CacheService::shared(settings.cache));
            let out = pipeline.compile(&Statement::sql(sql.as_str(), config).bind(params))?;
            print_compiled(&out, cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { sql, dialect } => {
            let dialect = dialect.unwrap_or(settings.statement.dialect);
            let parsed = sqlkiln::parse(sql, dialect)?;
            let report = validator::validate(
                &parsed.statement,
                &parsed.comments,
                dialect,
                &settings.statement.validators,
            );
            print_report(&report, cli.format)?;
            Ok(if report.has_blocking() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Extract { sql, dialect } => {
            let dialect = dialect.unwrap_or(settings.statement.dialect);
            let descriptors = settings.statement.extractor(dialect).extract(sql);
            print_descriptors(&descriptors, cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Dialects => {
            print_dialects(cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Values parse as integer, float, boolean, null, then text.
fn parse_params(bind: &[String], named: &[String]) -> anyhow::Result<Params> {
    match (bind.is_empty(), named.is_empty()) {
        (true, true) => Ok(Params::None),
        (false, true) => Ok(Params::positional(bind.iter().map(|raw| Value::infer(raw)))),
        (true, false) => {
            let mut values = Vec::with_capacity(named.len());
            for pair in named {
                let Some((name, raw)) = pair.split_once('=') else {
                    bail!("named parameter '{}' is not in name=value form", pair);
                };
                values.push((name.trim().to_string(), Value::infer(raw)));
            }
            Ok(Params::named(values))
        }
        (false, false) => bail!("use either --bind or --named, not both"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_compiled(out: &CompiledStatement, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(out);
    }

    println!("{}", "Compiled SQL:".green().bold());
    println!("  {}", out.sql.white());
    println!(
        "  {} {} / {}",
        "target:".dimmed(),
        out.dialect.to_string().cyan(),
        out.style.to_string().cyan()
    );

    if !out.parameters.is_empty() {
        println!();
        println!("{}", "Parameters:".cyan());
        match &out.parameters {
            Parameters::Positional(values) => {
                for (i, value) in values.iter().enumerate() {
                    println!("  {} = {}", format!("#{}", i + 1).dimmed(), value.to_string().yellow());
                }
            }
            Parameters::Named(values) => {
                for (name, value) in values {
                    println!("  {} = {}", name.dimmed(), value.to_string().yellow());
                }
            }
        }
    }

    if !out.findings.is_empty() {
        println!();
        println!("{}", "Advisories:".yellow());
        for finding in &out.findings {
            println!("  {}", finding);
        }
    }
    Ok(())
}

fn print_report(report: &ValidationReport, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(report);
    }
    if report.findings.is_empty() {
        println!("{} no findings", "✓".green());
        return Ok(());
    }
    for finding in &report.findings {
        let line = finding.to_string();
        if finding.is_blocking() {
            println!("{} {}", "✗".red(), line.red());
        } else {
            println!("{} {}", "!".yellow(), line);
        }
    }
    Ok(())
}

fn print_descriptors(descriptors: &[ParameterDescriptor], format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(descriptors);
    }
    if descriptors.is_empty() {
        println!("{}", "(no placeholders)".dimmed());
        return Ok(());
    }
    for d in descriptors {
        println!(
            "  {:>3}  {:<16} {:<12} {}..{}",
            d.ordinal,
            d.style.to_string().cyan(),
            d.key().to_string().white(),
            d.span.start,
            d.span.end
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct DialectInfo {
    name: &'static str,
    default_style: ParameterStyle,
    styles: Vec<ParameterStyle>,
}

fn print_dialects(format: OutputFormat) -> anyhow::Result<()> {
    let infos: Vec<DialectInfo> = Dialect::ALL
        .iter()
        .map(|d| DialectInfo {
            name: d.name(),
            default_style: d.default_parameter_style(),
            styles: d.recognized_parameter_styles().to_vec(),
        })
        .collect();

    if let OutputFormat::Json = format {
        return print_json(&infos);
    }
    for info in infos {
        let styles = info
            .styles
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {:<12} {:<16} {}",
            info.name.white().bold(),
            info.default_style.to_string().cyan(),
            styles.dimmed()
        );
    }
    Ok(())
}
