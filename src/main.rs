// src/main.rs

use buildgraph::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("buildgraph error: {err:?}");
        std::process::exit(1);
    }

    let code = match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("buildgraph error: {err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}
