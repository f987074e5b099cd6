use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mimalloc::MiMalloc;
use serde::Serialize;

use beankit::bean::{
    BeanEnvironment, CreationalContext, ManagedBean, Producer, ProducerBean, RuntimeClass, Scope,
};
use beankit::compute_instance_type;
use beankit::types::{parse_type, ClassTable, HierarchyDiscovery, RawClass, Type};
use beankit_bootstrap::{config_base_dir, AppConfig, CliArgs};

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// BeanKit Inspector - type closures and passivation rules of a class model
#[derive(Parser)]
#[command(name = "beankit-inspect")]
#[command(about = "BeanKit Inspector - type closures and passivation rules of a class model")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// YAML class model (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Resolver recursion limit (overrides config)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the type closure of a type expression, e.g. `List<String>`
    Closure {
        expr: String,
        /// Treat the root as a raw type without generic information
        #[arg(long)]
        raw: bool,
    },
    /// Print the class a proxy for the type would extend
    InstanceType { expr: String },
    /// Check whether a producer bean of the type may live in a scope
    Passivation {
        expr: String,
        #[arg(short, long, default_value = "Dependent")]
        scope: String,
    },
    /// Validate configuration and class model
    Check,
}

#[derive(Serialize)]
struct ClosureReport {
    root: String,
    instance_type: String,
    types: Vec<String>,
}

#[derive(Serialize)]
struct PassivationReport {
    bean: String,
    scope: String,
    passivation_capable_bean: bool,
    passivation_capable_dependency: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        model: cli.model.clone(),
        max_depth: cli.max_depth,
        verbose: cli.verbose,
    };

    // 1) defaults -> 2) YAML (if provided) -> 3) env (BEANKIT__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);
    let base_dir = config_base_dir(cli.config.as_deref())?;

    let logging_config = config.logging.clone().unwrap_or_default();
    beankit_bootstrap::init_logging(&logging_config, &base_dir);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let table = Arc::new(config.load_class_table(&base_dir)?);
    let env = BeanEnvironment::new(table.clone()).with_resolver(config.resolver);
    tracing::debug!(
        classes = table.len(),
        max_depth = config.resolver.max_depth,
        "inspector ready"
    );

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Closure { expr, raw } => {
            let report = closure_report(&env, &table, &expr, raw)?;
            match cli.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                Format::Text => {
                    println!("{} (instance type: {})", report.root, report.instance_type);
                    for ty in &report.types {
                        println!("  {ty}");
                    }
                }
            }
        }
        Commands::InstanceType { expr } => {
            let report = closure_report(&env, &table, &expr, false)?;
            match cli.format {
                Format::Json => println!("{}", serde_json::to_string(&report.instance_type)?),
                Format::Text => println!("{}", report.instance_type),
            }
        }
        Commands::Passivation { expr, scope } => {
            let report = passivation_report(&env, &expr, &scope)?;
            match cli.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                Format::Text => println!(
                    "{} @{}: passivation capable bean = {}, passivation capable dependency = {}",
                    report.bean,
                    report.scope,
                    report.passivation_capable_bean,
                    report.passivation_capable_dependency
                ),
            }
        }
        Commands::Check => check(&config, &table, &base_dir)?,
    }
    Ok(())
}

fn closure_report(
    env: &BeanEnvironment,
    table: &ClassTable,
    expr: &str,
    raw: bool,
) -> Result<ClosureReport> {
    let parsed = parse_type(expr, &[]).with_context(|| format!("Invalid type '{expr}'"))?;
    let root = match (raw, parsed) {
        (true, Type::Class(class)) => Type::Raw(class),
        (true, Type::Parameterized(p)) => Type::Raw(p.raw.clone()),
        (_, other) => other,
    };

    let closure = HierarchyDiscovery::new(table, root.clone())
        .with_config(env.resolver)
        .discover()
        .with_context(|| format!("Failed to resolve the type closure of '{root}'"))?;

    Ok(ClosureReport {
        root: root.to_string(),
        instance_type: compute_instance_type(&closure, table).to_string(),
        types: closure.iter().map(ToString::to_string).collect(),
    })
}

/// Placeholder product: the inspector never produces instances.
struct Unproduced;

impl RuntimeClass for Unproduced {
    fn runtime_class(&self) -> RawClass {
        RawClass::object()
    }
}

struct NoProducer;

impl Producer<Unproduced> for NoProducer {
    fn produce(&self, _ctx: &CreationalContext) -> Result<Option<Unproduced>> {
        Ok(None)
    }

    fn dispose(&self, _instance: Unproduced, _ctx: &CreationalContext) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "inspector".to_owned()
    }
}

fn passivation_report(env: &BeanEnvironment, expr: &str, scope: &str) -> Result<PassivationReport> {
    let declared = parse_type(expr, &[]).with_context(|| format!("Invalid type '{expr}'"))?;
    let scope: Scope = scope.parse()?;
    let declaring = Arc::new(ManagedBean::new(
        RawClass::object(),
        Scope::APPLICATION,
        env.clone(),
    ));
    let bean = ProducerBean::new(declaring, declared, scope, NoProducer, env.clone());
    bean.initialize()
        .with_context(|| format!("Bean '{expr}' failed initialization"))?;

    let flags = bean
        .flags()
        .context("initialized bean has no passivation flags")?;
    Ok(PassivationReport {
        bean: bean.declared_type().to_string(),
        scope: bean.scope().to_string(),
        passivation_capable_bean: flags.capable_bean,
        passivation_capable_dependency: flags.capable_dependency,
    })
}

fn check(config: &AppConfig, table: &ClassTable, base_dir: &Path) -> Result<()> {
    tracing::info!("Checking configuration…");
    match config.model_path(base_dir) {
        Some(path) => println!("Class model {} is valid ({} classes)", path.display(), table.len()),
        None => println!("No class model configured ({} builtin classes)", table.len()),
    }
    println!("{}", config.to_yaml()?);
    Ok(())
}
