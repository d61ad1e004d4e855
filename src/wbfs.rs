use std::io::{Read, Seek, SeekFrom};

use binrw::BinReaderExt;

use crate::{
    disc::WbfsDisc, structs::WbfsHeader, Result, WbfsError, WII_DUAL_LAYER_SECTORS,
    WII_SECTOR_SIZE,
};

/// Header size in bytes, the disc table fills the rest of the first host
/// sector.
const HEADER_SIZE: u64 = 12;

pub struct WbfsReader<RS: Read + Seek> {
    pub(crate) file: RS,
    header: WbfsHeader,
    disc_table: Vec<u8>,
    file_size: u64,
    hd_sector_size: u64,
    wbfs_sector_size: u64,
    wbfs_sectors_per_disc: u64,
}

impl<RS: Read + Seek> WbfsReader<RS> {
    /// Reads and validates the first host sector of a WBFS file.
    ///
    /// The file is only borrowed for reading, pass a `&mut File` to keep
    /// using it after the reader is dropped.
    pub fn open(mut file: RS) -> Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        let header: WbfsHeader = file.read_be()?;
        if &header.magic != b"WBFS" {
            return Err(WbfsError::BadMagic);
        }
        if !(6..=16).contains(&header.hd_sector_shift) {
            return Err(WbfsError::BadGeometry("host sector shift out of range"));
        }
        if header.wbfs_sector_shift <= header.hd_sector_shift || header.wbfs_sector_shift > 30 {
            return Err(WbfsError::BadGeometry(
                "wbfs sectors must be larger than host sectors",
            ));
        }
        if header.version != 0 {
            return Err(WbfsError::UnsupportedVersion(header.version));
        }
        let hd_sector_size = 1u64 << header.hd_sector_shift;
        let wbfs_sector_size = 1u64 << header.wbfs_sector_shift;
        let wbfs_sectors_per_disc =
            (WII_DUAL_LAYER_SECTORS * WII_SECTOR_SIZE).div_ceil(wbfs_sector_size);

        let mut disc_table = vec![0; (hd_sector_size - HEADER_SIZE) as usize];
        file.read_exact(&mut disc_table)?;
        let file_size = file.seek(SeekFrom::End(0))?;
        log::debug!(
            "opened WBFS: {} byte host sectors, {} byte wbfs sectors, {} wbfs sectors per disc",
            hd_sector_size,
            wbfs_sector_size,
            wbfs_sectors_per_disc
        );
        Ok(WbfsReader {
            file,
            header,
            disc_table,
            file_size,
            hd_sector_size,
            wbfs_sector_size,
            wbfs_sectors_per_disc,
        })
    }

    pub fn header(&self) -> &WbfsHeader {
        &self.header
    }

    pub fn hd_sector_size(&self) -> u64 {
        self.hd_sector_size
    }

    pub fn wbfs_sector_size(&self) -> u64 {
        self.wbfs_sector_size
    }

    /// How many wbfs sectors a full dual layer disc occupies, this is also
    /// the length of every disc's sector lookup table.
    pub fn wbfs_sectors_per_disc(&self) -> u64 {
        self.wbfs_sectors_per_disc
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The raw disc table, one byte per slot, nonzero means occupied.
    pub fn disc_table(&self) -> &[u8] {
        &self.disc_table
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        self.disc_table.get(slot).is_some_and(|b| *b != 0)
    }

    /// Iterates over the slots that contain a disc.
    pub fn occupied_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.disc_table
            .iter()
            .enumerate()
            .filter(|(_, occupied)| **occupied != 0)
            .map(|(slot, _)| slot)
    }

    pub fn disc_count(&self) -> usize {
        self.occupied_slots().count()
    }

    /// Opens the disc at the given slot, reading its sector lookup table.
    /// The disc borrows this reader, open discs one at a time.
    pub fn open_disc(&mut self, slot: usize) -> Result<WbfsDisc<'_, RS>> {
        WbfsDisc::open(self, slot)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinWriterExt;

    use super::*;

    fn minimal_image(hd_sector_shift: u8, wbfs_sector_shift: u8, version: u8) -> Vec<u8> {
        // the header always fits, even when the claimed sector size doesn't
        let hd_sector_size = (1usize << hd_sector_shift).max(12);
        let mut image = vec![0u8; hd_sector_size];
        let header = WbfsHeader {
            magic: *b"WBFS",
            hd_sector_count: 1,
            hd_sector_shift,
            wbfs_sector_shift,
            version,
            padding: 0,
        };
        Cursor::new(image.as_mut_slice()).write_be(&header).unwrap();
        image
    }

    #[test]
    fn open_derives_geometry() {
        let mut image = minimal_image(9, 21, 0);
        image[0x0C] = 1;
        let wbfs = WbfsReader::open(Cursor::new(image)).unwrap();
        assert_eq!(wbfs.hd_sector_size(), 512);
        assert_eq!(wbfs.wbfs_sector_size(), 2 * 1024 * 1024);
        assert_eq!(wbfs.wbfs_sectors_per_disc(), 4073);
        assert_eq!(wbfs.disc_table().len(), 500);
        assert!(wbfs.is_occupied(0));
        assert_eq!(wbfs.occupied_slots().collect::<Vec<_>>(), [0]);
        assert_eq!(wbfs.disc_count(), 1);
    }

    #[test]
    fn any_nonzero_slot_byte_is_occupied() {
        let mut image = minimal_image(9, 21, 0);
        image[0x0C + 3] = 1;
        image[0x0C + 7] = 0xFF;
        let wbfs = WbfsReader::open(Cursor::new(image)).unwrap();
        assert_eq!(wbfs.occupied_slots().collect::<Vec<_>>(), [3, 7]);
        assert!(!wbfs.is_occupied(0));
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut image = minimal_image(9, 21, 0);
        image[1] = b'X';
        assert!(matches!(
            WbfsReader::open(Cursor::new(image)),
            Err(WbfsError::BadMagic)
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let image = minimal_image(9, 21, 1);
        assert!(matches!(
            WbfsReader::open(Cursor::new(image)),
            Err(WbfsError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn rejects_implausible_geometry() {
        // wbfs sectors not larger than host sectors
        let image = minimal_image(9, 9, 0);
        assert!(matches!(
            WbfsReader::open(Cursor::new(image)),
            Err(WbfsError::BadGeometry(_))
        ));
        let image = minimal_image(2, 21, 0);
        assert!(matches!(
            WbfsReader::open(Cursor::new(image)),
            Err(WbfsError::BadGeometry(_))
        ));
    }

    #[test]
    fn rejects_short_file() {
        let image = minimal_image(9, 21, 0);
        // header survives but the disc table is cut off
        assert!(matches!(
            WbfsReader::open(Cursor::new(&image[..100])),
            Err(WbfsError::Truncated)
        ));
        assert!(matches!(
            WbfsReader::open(Cursor::new(&image[..5])),
            Err(WbfsError::Truncated)
        ));
    }
}
