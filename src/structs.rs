use std::ops::Deref;

use binrw::{binrw, BinRead, NullString};

/// Offsets above 4GiB don't fit into an u32, so several of them are stored
/// shifted right by 2 (they are all 4 byte aligned anyways). Wrapping the
/// shifted value in its own type makes sure a stored offset can't be confused
/// with a byte offset.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShiftedU64(
    #[br(map = |x: u32| (x as u64) << 2)]
    #[bw(map = |x: &u64| (*x >> 2) as u32)]
    pub u64,
);

impl Deref for ShiftedU64 {
    type Target = u64;

    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl From<u64> for ShiftedU64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The raw header in the first bytes of a WBFS file, everything else in the
/// first host sector is the disc table.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbfsHeader {
    pub magic: [u8; 4],
    /// how many host sectors the whole file needs
    pub hd_sector_count: u32,
    /// 2 ^ shift is the sector size of the host partition
    pub hd_sector_shift: u8,
    /// 2 ^ shift is the sector size inside the WBFS file
    pub wbfs_sector_shift: u8,
    pub version: u8,
    pub padding: u8,
}

/// One of the 4 partition info entries at 0x40000, pointing to a group of
/// partition table entries.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfoEntry {
    pub count: u32,
    pub offset: ShiftedU64,
}

#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiiPartType {
    #[brw(magic = 0u32)]
    Data,
    #[brw(magic = 1u32)]
    Update,
    #[brw(magic = 2u32)]
    Channel,
    /// anything else, kept as is
    Reserved(u32),
}

/// Entry of a partition table, pointing to the partition itself.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiiPartTableEntry {
    pub offset: ShiftedU64,
    pub part_type: WiiPartType,
}

/// The part of the Wii disc header that gets copied in front of each disc's
/// sector lookup table.
#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(big)]
pub struct DiscHeader {
    pub game_id: [u8; 6],
    pub disc_num: u8,
    pub disc_version: u8,
    pub audio_streaming: u8,
    pub audio_stream_buf_size: u8,
    #[br(pad_before(14))]
    /// 0x5D1C9EA3 for Wii discs
    pub wii_magic: u32,
    /// 0xC2339F3D for GameCube discs
    pub gcn_magic: u32,
    #[br(pad_size_to(64), map = |x: NullString| x.to_string())]
    pub game_title: String,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinReaderExt, BinWriterExt};

    use super::*;

    #[test]
    fn shifted_offsets_decode_with_shift() {
        let entry: PartitionInfoEntry = Cursor::new([0, 0, 0, 4, 0, 1, 0, 0])
            .read_be()
            .unwrap();
        assert_eq!(entry.count, 4);
        assert_eq!(*entry.offset, 0x10000 << 2);

        let mut buf = Cursor::new(Vec::new());
        buf.write_be(&entry).unwrap();
        assert_eq!(buf.into_inner(), [0, 0, 0, 4, 0, 1, 0, 0]);
    }

    #[test]
    fn part_type_keeps_unknown_values() {
        let entry: WiiPartTableEntry = Cursor::new([0, 0, 0, 1, 0, 0, 0, 2])
            .read_be()
            .unwrap();
        assert_eq!(entry.part_type, WiiPartType::Channel);
        let entry: WiiPartTableEntry = Cursor::new([0, 0, 0, 1, 0, 0, 0, 7])
            .read_be()
            .unwrap();
        assert_eq!(entry.part_type, WiiPartType::Reserved(7));
    }

    #[test]
    fn wbfs_header_roundtrip() {
        let header = WbfsHeader {
            magic: *b"WBFS",
            hd_sector_count: 0x1234_5678,
            hd_sector_shift: 9,
            wbfs_sector_shift: 21,
            version: 0,
            padding: 0,
        };
        let mut buf = Cursor::new(Vec::new());
        buf.write_be(&header).unwrap();
        assert_eq!(
            buf.get_ref().as_slice(),
            [b'W', b'B', b'F', b'S', 0x12, 0x34, 0x56, 0x78, 9, 21, 0, 0]
        );
        buf.set_position(0);
        let read_back: WbfsHeader = buf.read_be().unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn disc_header_parses_title() {
        let mut raw = vec![0u8; 0x100];
        raw[..6].copy_from_slice(b"RSBE01");
        raw[0x18..0x1C].copy_from_slice(&0x5D1C9EA3u32.to_be_bytes());
        raw[0x20..0x25].copy_from_slice(b"Brawl");
        let header: DiscHeader = Cursor::new(&raw).read_be().unwrap();
        assert_eq!(&header.game_id, b"RSBE01");
        assert_eq!(header.wii_magic, 0x5D1C9EA3);
        assert_eq!(header.game_title, "Brawl");
    }
}
