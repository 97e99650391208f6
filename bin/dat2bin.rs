use clap::{CommandFactory, Parser};
use log::{info, LevelFilter};
use std::fs;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use ucode_rs::dat;

/// Convert an Intel microcode .dat file into a binary image
#[derive(Parser, Debug)]
#[command(name = "dat2bin", author, version, about, long_about = None)]
struct Args {
    /// Print verbosely
    #[arg(short, long)]
    verbose: bool,

    /// .dat file to read; the image is written next to it as .bin
    #[arg(index = 1)]
    file: Option<String>,
}

fn fail(msg: String) -> io::Error {
    io::Error::other(msg)
}

fn run(args: Args) -> io::Result<()> {
    let Some(file) = args.file else {
        Args::command().print_help()?;
        return Ok(());
    };

    let input = Path::new(&file);
    if input.extension().and_then(|e| e.to_str()) != Some("dat") {
        return Err(fail(format!("File {file} is not an Intel ascii .dat file")));
    }
    let output = input.with_extension("bin");
    if output.exists() {
        let o = output.display();
        return Err(fail(format!("File {o} exists. I will not overwrite this!")));
    }
    if !input.exists() {
        return Err(fail(format!("Cannot locate microcode file {file}")));
    }

    let text = fs::read_to_string(input)?;
    let image = dat::parse(&text).map_err(|e| fail(format!("{file}: {e}")))?;
    fs::write(&output, &image)?;
    info!("wrote {} bytes to {}", image.len(), output.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
