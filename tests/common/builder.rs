//! Synthetic image builders.

const SECTOR: usize = 2048;
const RAW_SECTOR: usize = 2352;
/// Root directory block; files follow it.
const ROOT_BLOCK: u32 = 20;

const CD_SYNC: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// Minimal single-directory ISO-9660 volume.
pub struct IsoBuilder {
    system_id: String,
    volume_id: String,
    publisher: String,
    files: Vec<(String, Vec<u8>)>,
}

impl IsoBuilder {
    pub fn new() -> Self {
        Self {
            system_id: String::new(),
            volume_id: "TESTDISC".to_owned(),
            publisher: String::new(),
            files: Vec::new(),
        }
    }

    pub fn system_id(mut self, id: &str) -> Self {
        self.system_id = id.to_owned();
        self
    }

    pub fn volume_id(mut self, id: &str) -> Self {
        self.volume_id = id.to_owned();
        self
    }

    pub fn publisher(mut self, name: &str) -> Self {
        self.publisher = name.to_owned();
        self
    }

    /// Add a root file. `name` is stored as given (include `;1` if wanted).
    pub fn file(mut self, name: &str, content: &[u8]) -> Self {
        self.files.push((name.to_owned(), content.to_vec()));
        self
    }

    /// Cooked 2048-byte sector image.
    pub fn build(self) -> Vec<u8> {
        let mut next = ROOT_BLOCK + 1;
        let mut placed = Vec::new();
        for (name, content) in &self.files {
            placed.push((name, content, next));
            next += content.len().div_ceil(SECTOR).max(1) as u32;
        }
        let total = next as usize;
        let mut img = vec![0u8; total * SECTOR];

        let pvd = &mut img[16 * SECTOR..17 * SECTOR];
        pvd[0] = 1;
        pvd[1..6].copy_from_slice(b"CD001");
        pvd[6] = 1;
        pad(&mut pvd[8..40], &self.system_id);
        pad(&mut pvd[40..72], &self.volume_id);
        both_u32(&mut pvd[80..88], total as u32);
        pvd[128..130].copy_from_slice(&(SECTOR as u16).to_le_bytes());
        pvd[130..132].copy_from_slice(&(SECTOR as u16).to_be_bytes());
        pvd[156..190].copy_from_slice(&record(b"\0", ROOT_BLOCK, SECTOR as u32, 0x02));
        pad(&mut pvd[318..446], &self.publisher);
        pvd[813..830].copy_from_slice(b"1999120112000000\0");

        let term = &mut img[17 * SECTOR..18 * SECTOR];
        term[0] = 0xFF;
        term[1..6].copy_from_slice(b"CD001");
        term[6] = 1;

        let mut dir = record(b"\0", ROOT_BLOCK, SECTOR as u32, 0x02);
        dir.extend(record(b"\x01", ROOT_BLOCK, SECTOR as u32, 0x02));
        for (name, content, block) in &placed {
            dir.extend(record(name.as_bytes(), *block, content.len() as u32, 0));
            let at = *block as usize * SECTOR;
            img[at..at + content.len()].copy_from_slice(content);
        }
        let root = ROOT_BLOCK as usize * SECTOR;
        img[root..root + dir.len()].copy_from_slice(&dir);
        img
    }
}

fn pad(dst: &mut [u8], s: &str) {
    dst.fill(b' ');
    dst[..s.len()].copy_from_slice(s.as_bytes());
}

fn both_u32(dst: &mut [u8], v: u32) {
    dst[..4].copy_from_slice(&v.to_le_bytes());
    dst[4..8].copy_from_slice(&v.to_be_bytes());
}

fn record(name: &[u8], block: u32, size: u32, flags: u8) -> Vec<u8> {
    let len = 33 + name.len() + (name.len() + 1) % 2;
    let mut rec = vec![0u8; len];
    rec[0] = len as u8;
    both_u32(&mut rec[2..10], block);
    both_u32(&mut rec[10..18], size);
    rec[25] = flags;
    rec[32] = name.len() as u8;
    rec[33..33 + name.len()].copy_from_slice(name);
    rec
}

/// Re-wrap a cooked image as raw 2352-byte sectors (Mode 1 or Mode 2 Form 1).
pub fn to_raw2352(cooked: &[u8], mode2: bool) -> Vec<u8> {
    let mut raw = Vec::with_capacity(cooked.len() / SECTOR * RAW_SECTOR);
    for chunk in cooked.chunks(SECTOR) {
        let mut sector = vec![0u8; RAW_SECTOR];
        sector[..12].copy_from_slice(&CD_SYNC);
        sector[15] = if mode2 { 2 } else { 1 };
        let data = if mode2 { 24 } else { 16 };
        sector[data..data + chunk.len()].copy_from_slice(chunk);
        raw.extend(sector);
    }
    raw
}

/// SC block with `flag` icon frames; frame `n` uses palette index `n + 1`.
fn sc_block(flag: u8, title: &[u8]) -> Vec<u8> {
    let mut sc = vec![0u8; 0x200];
    sc[..2].copy_from_slice(b"SC");
    sc[2] = flag;
    sc[3] = 1;
    sc[4..4 + title.len()].copy_from_slice(title);
    for (i, c) in [0x001Fu16, 0x03E0, 0x7C00].iter().enumerate() {
        let at = 0x60 + (i + 1) * 2;
        sc[at..at + 2].copy_from_slice(&c.to_le_bytes());
    }
    for frame in 0..3 {
        let at = 0x80 + frame * 128;
        sc[at..at + 128].fill(((frame + 1) * 0x11) as u8);
    }
    sc
}

/// 1024-byte PSV save.
pub fn psv_save(flag: u8, filename: &str, title: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 0x84];
    buf[..8].copy_from_slice(b"\0VSP\0\0\0\0");
    buf[0x64..0x64 + filename.len()].copy_from_slice(filename.as_bytes());
    buf.extend(sc_block(flag, title));
    buf.resize(1024, 0);
    buf
}

/// Headerless save of `blocks` memory-card blocks.
pub fn raw_save(flag: u8, title: &[u8], blocks: usize) -> Vec<u8> {
    let mut buf = sc_block(flag, title);
    buf.resize(blocks * 8192, 0);
    buf
}
