//! Refkeep admin CLI.
//!
//! Runs cascade deletes, orphan scans and counter repair against a store
//! snapshot. See `refkeep --help`.

mod cli;

use refkeep::commands::CmdMessage;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::commands::run().await {
        let message = CmdMessage::error(format!("Error: {:#}", e));
        eprint!("{}", cli::render::render_messages(&[message]));
        std::process::exit(1);
    }
}
