#[macro_use]
extern crate clap;

use binfile::Format;
use clap::Arg;
use masm::ListingLine;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Debug)]
enum IOErrorContext {
    WriteOutput,
    WriteListing,
    WriteSymbols,
}

#[derive(Debug)]
enum Error {
    Masm(masm::Error),
    Io(std::io::Error, IOErrorContext, PathBuf),
    BadFormat(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => writeln!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IOErrorContext::WriteOutput => "Writing output",
                    IOErrorContext::WriteListing => "Writing listing",
                    IOErrorContext::WriteSymbols => "Writing symbol",
                },
                path.display(),
                err
            ),
            Error::Masm(err) => write!(f, "{}", err),
            Error::BadFormat(name) => write!(
                f,
                "Unknown output format \"{}\" (expected flat, dragondos or coco)",
                name
            ),
        }
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to assemble")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Sets the output file to write to"),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .takes_value(true)
                .value_name("FORMAT")
                .help("Sets the output format: flat, dragondos or coco"),
        )
        .arg(
            Arg::with_name("listing")
                .short("l")
                .long("listing")
                .takes_value(true)
                .value_name("LISTING")
                .help("Sets the file to write the listing to"),
        )
        .arg(
            Arg::with_name("symbols")
                .short("s")
                .long("symbols")
                .takes_value(true)
                .value_name("SYMBOLS")
                .help("Sets the file to write exported symbols to"),
        )
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("output");
    let format = matches.value_of("format");
    let listing = matches.value_of("listing");
    let symbols = matches.value_of("symbols");

    if let Err(err) = run(input, output, format, listing, symbols) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run(
    input: &str,
    output: Option<&str>,
    format: Option<&str>,
    listing: Option<&str>,
    symbols: Option<&str>,
) -> Result<(), Error> {
    let format = match format.unwrap_or("flat") {
        "flat" => Format::Flat,
        "dragondos" => Format::DragonDos,
        "coco" => Format::Coco,
        other => return Err(Error::BadFormat(other.to_owned())),
    };

    let result = masm::assemble_file(input).map_err(Error::Masm)?;

    let input_path = Path::new(input);
    let output_path: PathBuf = output
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.with_extension("bin"));

    binfile::write_file(&output_path, &result.image, format)
        .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, output_path))?;

    if let Some(listing_path_str) = listing {
        let listing_path = PathBuf::from(listing_path_str);
        write_listing(&result.listing[..], &listing_path)
            .map_err(|err| Error::Io(err, IOErrorContext::WriteListing, listing_path))?;
    }

    if let Some(symbols_path_str) = symbols {
        let symbols_path = PathBuf::from(symbols_path_str);
        write_symbols(&result.exports[..], &symbols_path)
            .map_err(|err| Error::Io(err, IOErrorContext::WriteSymbols, symbols_path))?;
    }
    Ok(())
}

fn write_listing(listing: &[ListingLine], path: &PathBuf) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in listing.iter() {
        let address = match line.address {
            Some(address) => format!("{:04X}", address),
            None => "    ".to_owned(),
        };
        let bytes: Vec<String> = line.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        writeln!(
            writer,
            "{}  {:<12} {}",
            address,
            bytes.join(" "),
            line.source
        )?;
    }
    Ok(())
}

fn write_symbols(exports: &[(String, i64)], path: &PathBuf) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (name, value) in exports.iter() {
        writeln!(writer, "{:<16} EQU ${:04X}", name, *value as u16)?;
    }
    Ok(())
}
