use std::process;

fn main() {
    if let Err(err) = shopfloor_store::app::run() {
        eprintln!("fatal: {err:#}");
        process::exit(1);
    }
}
