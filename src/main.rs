use framestate::class_graph::{ClassGraph, ClassGraphArenas, LoaderId};
use framestate::stackmap;

use clap::{value_parser, Arg, Command};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

fn main() -> Result<(), stackmap::Error> {
    env_logger::init();

    let matches = Command::new("Frame descriptor builder")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Replays a method's stack map and prints the frame descriptor at every join point")
        .arg(
            Arg::new("INPUT")
                .help("Text listing of the method's stack map")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Also write the binary descriptors to this file"),
        )
        .arg(
            Arg::new("loader")
                .long("loader")
                .value_name("ID")
                .value_parser(value_parser!(u32).range(1..))
                .default_value("1")
                .help("Loader defining the declared classes"),
        )
        .get_matches();

    let input = matches
        .get_one::<PathBuf>("INPUT")
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing input file"))?;
    let loader = LoaderId(matches.get_one::<u32>("loader").copied().unwrap_or(1));

    log::info!("Reading '{}'", input.display());
    let source = fs::read_to_string(input)?;
    let listing = stackmap::parse_table(&source)?;

    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types();
    class_graph.add_loader(loader, LoaderId::BOOTSTRAP);
    listing.declare_classes(&class_graph, loader)?;

    let mut table = listing.frame_table()?;
    let changed = listing.apply_merges(&mut table, |name| class_graph.lookup(name, loader))?;
    log::info!(
        "Applied {} merges, {} changed a frame",
        listing.merges.len(),
        changed
    );

    for (bci, descriptor) in table.descriptors() {
        println!("{:>5}: {}", bci, descriptor);
    }

    if let Some(output) = matches.get_one::<PathBuf>("output") {
        log::info!("Writing descriptors to '{}'", output.display());
        let mut writer = BufWriter::new(File::create(output)?);
        table.write_descriptors(&mut writer)?;
        writer.flush()?;
    }

    Ok(())
}
