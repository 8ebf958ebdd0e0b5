use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::command::{Cli, Commands, LogFormat};
use cli::epochs::cmd_epochs;
use cli::events::cmd_events;
use cli::extract::cmd_extract;
use cli::info::cmd_info;
use cli::mda::cmd_mda;
use cli::trace::cmd_trace;

mod cli;
mod groups;
mod report;
pub(crate) mod timestamp;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let base_level = cli.loglevel.to_level_filter();

    let multi = MultiProgress::new();

    let mut env_builder = env_logger::Builder::from_default_env();
    env_builder.filter_level(base_level);
    match cli.log_format {
        LogFormat::Plain => {
            env_builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            env_builder.format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "{{\"ts\":{},\"lvl\":\"{}\",\"target\":\"{}\",\"msg\":{:?}}}",
                    buf.timestamp(),
                    record.level(),
                    record.target(),
                    record.args().to_string()
                )
            });
        }
    }

    let pb = if cli.progress {
        let logger = env_builder.build();
        LogWrapper::new(multi.clone(), logger).try_init()?;
        Some(&multi)
    } else {
        env_builder.try_init()?;
        None
    };

    match cli.command {
        Commands::Extract(ref args) => cmd_extract(args, &cli, pb)?,
        Commands::Epochs(ref args) => cmd_epochs(args, &cli, pb)?,
        Commands::Mda(ref args) => cmd_mda(args, &cli, pb)?,
        Commands::Trace(ref args) => cmd_trace(args)?,
        Commands::Events(ref args) => cmd_events(args)?,
        Commands::Info(ref args) => cmd_info(args, &cli, pb)?,
    }

    Ok(())
}
