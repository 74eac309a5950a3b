use clap::Parser;
use log::error;
use tokio::time::Instant;

mod crypto;
mod cursor;
mod dump;
mod error;
mod log_init;
mod ncm;
mod tag;

/// Multithreaded ncm container decoder
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing *.ncm files
    #[arg(short, long, default_value_t = String::from("."))]
    ncm_dir: String,
    /// Output directory for the decoded media files
    #[arg(short, long, default_value_t = String::from("music"))]
    out_dir: String,
    /// Number of worker threads
    #[arg(short, long, default_value_t = 4)]
    threads: u8,
}

fn main() {
    log_init::init_logger_with_default();
    let args = Args::parse();
    let instant = Instant::now();
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.threads as usize)
        .build()
        .expect("failed to build the tokio runtime")
        .block_on(async {
            if let Err(e) = dump::dump_dir(&args.ncm_dir, &args.out_dir).await {
                error!("{e:#}");
            }
        });
    println!("total elapsed: {}ms", instant.elapsed().as_millis());
}
