pub mod cli;
pub mod math;
pub mod model;
pub mod plugin;
pub mod runtime;
pub mod sequence;

pub fn run_cli() -> runtime::Result<()> {
    cli::run_cli()
}
