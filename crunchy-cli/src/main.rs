use std::process;

fn main() {
    process::exit(crunchy_cli::dispatcher::execute());
}
