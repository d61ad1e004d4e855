use clap::Parser;
use std::{fs::File, path::PathBuf};
use thiserror::Error;
use wbfs_reader::WbfsReader;

#[derive(Debug, Parser)]
#[clap(about = "Utility to inspect wbfs images")]
enum Commands {
    #[clap(about = "show the geometry and the discs of the image")]
    Info { filename: PathBuf },
    #[clap(about = "list the partitions of a disc")]
    Partitions {
        filename: PathBuf,
        #[clap(long, default_value_t = 0)]
        slot: usize,
    },
}

#[derive(Error, Debug)]
enum MyError {
    #[error("IO Error: {io_error}")]
    IOError {
        #[from]
        io_error: std::io::Error,
    },
    #[error("WBFS error: {error}")]
    WbfsError {
        #[from]
        error: wbfs_reader::WbfsError,
    },
}

fn main() -> Result<(), MyError> {
    let args = Commands::parse();
    match args {
        Commands::Info { filename } => {
            let mut f = File::open(filename)?;
            let mut wbfs = WbfsReader::open(&mut f)?;
            println!(
                "host sectors: {} bytes, wbfs sectors: {} bytes, {} wbfs sectors per disc",
                wbfs.hd_sector_size(),
                wbfs.wbfs_sector_size(),
                wbfs.wbfs_sectors_per_disc()
            );
            let slots: Vec<usize> = wbfs.occupied_slots().collect();
            for slot in slots {
                let mut disc = wbfs.open_disc(slot)?;
                let header = disc.read_disc_header()?;
                println!(
                    "slot {}: {} {}",
                    slot,
                    String::from_utf8_lossy(&header.game_id),
                    header.game_title
                );
            }
        }
        Commands::Partitions { filename, slot } => {
            let mut f = File::open(filename)?;
            let mut wbfs = WbfsReader::open(&mut f)?;
            let mut disc = wbfs.open_disc(slot)?;
            for partition in disc.read_partitions()? {
                println!("{:?}: {:X}", partition.part_type, *partition.offset);
            }
        }
    }
    Ok(())
}
