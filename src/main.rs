//! Binary entry point: logging bootstrap, argument parsing, dispatch.
//!
//! Grounded on the teacher's `main.rs` (`env_logger::init()` first, then
//! `Command::parse()`, then a single `run()` call whose error is logged and
//! turned into a non-zero exit).

fn main() {
    env_logger::init();

    if let Err(e) = untangle::cli::run(untangle::cli::read_params()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
