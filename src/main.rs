//! Prism CLI
//!
//! A small driver around the lowering pipeline: build one of the built-in
//! demo pipelines and print the IR it lowers to. Doubles as a smoke test of
//! the whole driver.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use prism::prelude::*;
use prism::VERSION;

#[derive(Parser)]
#[command(name = "prism")]
#[command(author, version, about = "Lowering pipeline for an image-processing DSL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v announces passes, -vv dumps IR after each pass)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in demo pipelines
    List,

    /// Lower a demo pipeline and print the resulting IR
    Lower {
        /// The demo pipeline name (see `prism list`)
        name: String,
    },

    /// Print version information
    Version,
}

const DEMOS: &[(&str, &str)] = &[
    ("pointwise", "f(x, y) = x + y, default schedule"),
    ("two-stage", "g inlined into f"),
    ("stencil", "g stored per row of f, computed per pixel of f"),
    ("tiled", "x split by 4, inner vectorized, y parallel"),
    ("sum", "reduction over an input image, promoted to root"),
];

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::List => {
            for (name, description) in DEMOS {
                println!("{:<12} {}", name, description);
            }
        }
        Commands::Lower { name } => {
            let f = build_demo(&name)?;
            let stmt = lower(&f).with_context(|| format!("lowering demo '{}'", name))?;
            print!("{}", stmt);
        }
        Commands::Version => {
            println!("prism {}", VERSION);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "prism=warn",
        1 => "prism=debug",
        _ => "prism=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_demo(name: &str) -> anyhow::Result<Function> {
    let (x, y) = (Expr::var("x"), Expr::var("y"));
    match name {
        "pointwise" => Ok(Function::new("f", ["x", "y"], x + y)),
        "two-stage" => {
            let g = Function::new("g", ["x"], x.clone() * 2);
            Ok(Function::new("f", ["x"], g.call(vec![x]) + 1))
        }
        "stencil" => {
            let g = Function::new("g", ["x", "y"], x.clone() - y.clone());
            let f = Function::new(
                "f",
                ["x", "y"],
                g.call(vec![x.clone(), y.clone()]) + g.call(vec![x.clone(), y.clone() - 1]),
            );
            g.store_at(&f, "y").compute_at(&f, "x");
            Ok(f)
        }
        "tiled" => {
            let f = Function::new("f", ["x", "y"], x * y);
            f.split("x", "xo", "xi", 4)?.vectorize("xi")?.parallel("y")?;
            Ok(f)
        }
        "sum" => {
            let total = Function::new("total", ["x"], Expr::int(0));
            let dom = ReductionDomain::single("r", Expr::int(0), Expr::int(100));
            let r = dom.var(0);
            let input = Expr::image(Type::int(32), "input", vec![r.clone()]);
            total.define_reduction(
                vec![Expr::var("x")],
                total.call(vec![Expr::var("x")]) + input,
                dom,
            );
            Ok(total)
        }
        other => bail!(
            "unknown demo '{}'; run `prism list` to see what's available",
            other
        ),
    }
}
