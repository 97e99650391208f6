use clap::{CommandFactory, Parser};
use log::{info, LevelFilter};
use std::fs;
use std::io;
use std::process::ExitCode;
use ucode_rs::hexdump::HexDump;
use ucode_rs::{walk, ExtendedHeader, PrimaryHeader, SignatureTable, UpdateRecord, WalkOptions};

/// Dump the headers of Intel microcode updates
#[derive(Parser, Debug)]
#[command(name = "ucode", author, version, about, long_about = None)]
struct Args {
    /// Dump update data (encrypted)
    #[arg(short, long)]
    dump: bool,

    /// Print verbosely
    #[arg(short, long)]
    verbose: bool,

    /// Microcode file to read
    #[arg(index = 1)]
    file: Option<String>,
}

fn print_header(h: &PrimaryHeader, num: usize) {
    println!("-- Header ({num}) --");
    println!("Header Version : {:#x}", h.version);
    println!("Update Revision: {}", h.revision);
    println!("Date           : {}", h.date);
    println!("CPU Signature  : {:#x} ({})", h.processor_signature, h.cpu());
    println!("Checksum       : {:#x}", h.checksum);
    println!("Loader Revision: {:#x}", h.loader_revision);
    println!("CPU Flags      : {:#x}", h.processor_flags);
    println!("Data Size      : {:#x}", h.data_size);
    println!("Total Size     : {:#x}", h.total_size);
    println!("------------");
}

fn print_ext_header(h: &ExtendedHeader, table: &SignatureTable) {
    println!("-- Extended Header --");
    println!("Extended Header Count                : {}", h.signature_count);
    println!("Extended CPU Signature Table Checksum: {:#x}", h.checksum);
    for (i, s) in table.signatures.iter().enumerate() {
        println!("[{i}] Processor Signature: {s:#x}");
    }
    for (i, f) in table.flags.iter().enumerate() {
        println!("[{i}] Processor Flags    : {f:#x}");
    }
    for (i, c) in table.checksums.iter().enumerate() {
        println!("[{i}] Checksum           : {c:#x}");
    }
}

fn print_update(u: &UpdateRecord) {
    print_header(&u.header, u.index + 1);
    if let Some(data) = u.payload {
        println!("-- Data --");
        let d = HexDump(data).to_string();
        if d.ends_with('\n') {
            print!("{d}");
        } else {
            println!("{d}");
        }
    }
    if let (Some(h), Some(t)) = (&u.extended_header, &u.signatures) {
        print_ext_header(h, t);
    }
}

fn run(args: Args) -> io::Result<()> {
    let Some(file) = args.file else {
        Args::command().print_help()?;
        return Ok(());
    };

    let data = fs::read(&file)
        .map_err(|e| io::Error::new(e.kind(), format!("could not open {file}: {e}")))?;
    info!("{file}: {} bytes", data.len());

    let opts = WalkOptions {
        include_payload: args.dump,
    };
    for u in walk(&data, opts) {
        let u = u.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{file}: {e}")))?;
        print_update(&u);
    }
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
