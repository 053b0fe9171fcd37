mod cli;

use hotref::report::Report;
use hotref::source::FileSystem;
use hotref::validator::{parse_overrides, Options, Validator};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("HOTREF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    if let Err(e) = validate(cli) {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

/// Validation problems are part of the output, only fatal errors end up here
pub fn validate(cli: cli::Cli) -> anyhow::Result<()> {
    let options = Options::new(cli.file, cli.environments, parse_overrides(&cli.parameters)?);

    let forest = Validator::new(&FileSystem).validate(&options)?;
    let report = Report::new(&forest, &std::env::current_dir()?);

    match cli.format {
        cli::OutputFormat::Text => {
            print!("{}", report.render_text(cli.unused));
            if cli.print_tree {
                println!();
                println!("Structure:");
                print!("{}", report.render_tree());
            }
        }
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &report)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), &report)?,
    };

    Ok(())
}
