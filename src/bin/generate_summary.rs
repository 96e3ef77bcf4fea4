//! Summary phase on its own: `generate_summary [catalog] [mode] [--date YYYY-MM-DD]`.
//! Same as `cci-verify summarize`.

use std::env;
use std::process;

use cci_verify::cli::{init_tracing, run_with_args};

fn main() {
    init_tracing();
    let mut args: Vec<String> = env::args().collect();
    args.insert(args.len().min(1), "summarize".to_string());
    process::exit(run_with_args(&args));
}
