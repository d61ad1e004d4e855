//! Library for reading WBFS images.
//!
//! WBFS files store one or more Wii discs in large, possibly scrambled
//! sectors. This crate decodes the container header, presents every stored
//! disc as a logically contiguous [`Read`](std::io::Read) +
//! [`Seek`](std::io::Seek) view and parses the partition metadata needed to
//! decrypt partition content.
//!
//! ```no_run
//! use std::fs::File;
//!
//! let mut f = File::open("game.wbfs")?;
//! let mut wbfs = wbfs_reader::WbfsReader::open(&mut f)?;
//! let slot = wbfs.occupied_slots().next().unwrap();
//! let mut disc = wbfs.open_disc(slot)?;
//! for partition in disc.read_partitions()? {
//!     println!("{:?} at {:#x}", partition.part_type, *partition.offset);
//! }
//! # Ok::<(), wbfs_reader::WbfsError>(())
//! ```

use std::io;

use thiserror::Error;

pub mod aes;
pub mod crypto;
mod disc;
pub mod structs;
mod wbfs;

pub use disc::{HoleMode, WbfsDisc};
pub use wbfs::WbfsReader;

/// Size of a Wii disc sector, the unit the disc hardware reads.
pub const WII_SECTOR_SIZE: u64 = 0x8000;
/// Wii sectors on a dual layer disc, the largest disc a WBFS can hold.
pub const WII_DUAL_LAYER_SECTORS: u64 = 260_620;
/// Offset of the partition info entries, local to the start of a disc.
pub const PARTITION_INFO_OFFSET: u64 = 0x40000;
/// Bytes of the Wii disc header that are copied in front of every disc's
/// sector lookup table.
pub const DISC_HEADER_COPY_SIZE: usize = 0x100;
/// Offset of the encrypted title key, local to the start of a partition.
pub const TITLE_KEY_OFFSET: u64 = 0x1BF;
/// Offset of the title id, local to the start of a partition.
pub const TITLE_ID_OFFSET: u64 = 0x1DC;

#[derive(Error, Debug)]
pub enum WbfsError {
    #[error("the first 4 bytes are not \"WBFS\", this is not a WBFS file")]
    BadMagic,
    #[error("the file ends in the middle of the structure being read")]
    Truncated,
    #[error("implausible sector geometry: {0}")]
    BadGeometry(&'static str),
    #[error("WBFS version {0} is not supported, only version 0 exists")]
    UnsupportedVersion(u8),
    #[error("the disc table has no disc at slot {0}")]
    NoSuchDisc(usize),
    #[error("wbfs sector {0} of this disc is a hole with no backing data")]
    SparseHole(u64),
    #[error("read of {len} bytes at {offset:#x} goes past the end of the disc")]
    OutOfRange { offset: u64, len: u64 },
    #[error("AES keys are 16, 24 or 32 bytes long, got {0}")]
    BadKeyLength(usize),
    #[error("malformed structure: {0}")]
    Parse(binrw::Error),
    #[error("io error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for WbfsError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            WbfsError::Truncated
        } else {
            WbfsError::Io(err)
        }
    }
}

impl From<binrw::Error> for WbfsError {
    fn from(err: binrw::Error) -> Self {
        if err.is_eof() {
            WbfsError::Truncated
        } else {
            WbfsError::Parse(err)
        }
    }
}

pub type Result<T, E = WbfsError> = core::result::Result<T, E>;
