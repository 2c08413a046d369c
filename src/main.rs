use clap::Parser;
use wafercut::{init_logging, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;
    tracing::debug!("wafercut {} built {}", wafercut::VERSION, wafercut::BUILD_DATE);

    wafercut::run(&cli)?;
    Ok(())
}
