mod args;
mod commands;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = args::Cli::parse();

    match &cli.command {
        args::Commands::Generate(gen_args) => commands::generate::execute(gen_args),
        args::Commands::Tokenize(tok_args) => commands::tokenize::execute(tok_args),
        args::Commands::Info(info_args) => commands::info::execute(info_args),
    }
}
