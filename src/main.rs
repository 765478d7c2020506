use clap::Parser;

use ulx_prog::cli::{self, Args};

fn main() {
    let args = Args::parse();
    if let Err(e) = cli::run(&args) {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
