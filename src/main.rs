//! scrivener worker binary.
//!
//! All logic lives in the library; main.rs only invokes `cli::run()` and
//! maps its result to a process exit.

#[tokio::main]
async fn main() {
    if let Err(error) = scrivener::run().await {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
