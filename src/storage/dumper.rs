// Package storage provides dump/load of partitions for persistence across restarts.

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use crc32fast::Hasher;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::CacheStorage;
use crate::config::Persistence;
use crate::model::{CacheKey, ResponseSnapshot};

const DUMP_BUFFER_SIZE: usize = 512 * 1024; // 512 KiB
const MAGIC: &[u8; 4] = b"SHCD";
const FORMAT_VERSION: u16 = 1;
/// Frame lengths are not checksummed; anything larger is treated as corruption.
const MAX_RECORD_BYTES: usize = 256 << 20; // 256 MiB
const EXT: &str = ".dump";
const EXT_GZ: &str = ".dump.gz";

/// Counters reported by a dump or load run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DumpStats {
    pub partitions: usize,
    pub entries: usize,
    /// Records or files that could not be written or restored.
    pub skipped: usize,
}

/// Trait for persistence operations.
#[async_trait::async_trait]
pub trait Dumper: Send + Sync {
    /// Writes every partition to disk.
    async fn dump(&self, ctx: CancellationToken) -> Result<DumpStats>;

    /// Restores partitions from the dump directory.
    async fn load(&self, ctx: CancellationToken) -> Result<DumpStats>;
}

/// One file per partition: a header carrying the partition name, then
/// `[len: u32][crc: u32][record]` frames.
#[derive(Clone)]
pub struct PartitionDumper {
    dir: PathBuf,
    gzip: bool,
    crc32_control: bool,
    storage: Arc<dyn CacheStorage>,
}

impl PartitionDumper {
    pub fn new(cfg: &Persistence, storage: Arc<dyn CacheStorage>) -> Result<Arc<Self>> {
        let dir = cfg
            .dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| anyhow::anyhow!("persistence dir not configured"))?;

        Ok(Arc::new(Self {
            dir: PathBuf::from(dir),
            gzip: cfg.gzip,
            crc32_control: cfg.crc32_control,
            storage,
        }))
    }

    fn dump_blocking(&self, ctx: &CancellationToken) -> Result<DumpStats> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create dump dir: {}", self.dir.display()))?;

        let mut stats = DumpStats::default();
        let mut written: Vec<PathBuf> = Vec::new();

        for name in self.storage.names() {
            if ctx.is_cancelled() {
                break;
            }

            let ext = if self.gzip { EXT_GZ } else { EXT };
            let path = self.dir.join(format!("{}{}", file_stem(&name), ext));
            let tmp = PathBuf::from(format!("{}.tmp", path.display()));

            match self.write_partition(&name, &tmp) {
                Ok(n) => {
                    if let Err(e) = fs::rename(&tmp, &path) {
                        error!(file = %tmp.display(), error = %e, "[dump] rename error");
                        stats.skipped += 1;
                        continue;
                    }
                    stats.partitions += 1;
                    stats.entries += n;
                    written.push(path);
                }
                Err(e) => {
                    error!(partition = %name, file = %tmp.display(), error = %e, "[dump] write error");
                    let _ = fs::remove_file(&tmp);
                    stats.skipped += 1;
                }
            }
        }

        // Files left from partitions that no longer exist would resurrect them on load.
        for stale in dump_files(&self.dir)?.into_iter().filter(|f| !written.contains(f)) {
            if let Err(e) = fs::remove_file(&stale) {
                warn!(file = %stale.display(), error = %e, "[dump] failed to remove stale dump file");
            }
        }

        Ok(stats)
    }

    fn write_partition(&self, name: &str, tmp: &Path) -> io::Result<usize> {
        let file = fs::File::create(tmp)?;
        if self.gzip {
            let mut w = BufWriter::with_capacity(
                DUMP_BUFFER_SIZE,
                GzEncoder::new(file, Compression::default()),
            );
            let n = self.write_records(name, &mut w)?;
            w.into_inner().map_err(|e| e.into_error())?.finish()?;
            Ok(n)
        } else {
            let mut w = BufWriter::with_capacity(DUMP_BUFFER_SIZE, file);
            let n = self.write_records(name, &mut w)?;
            w.flush()?;
            Ok(n)
        }
    }

    fn write_records<W: Write>(&self, name: &str, w: &mut W) -> io::Result<usize> {
        w.write_all(MAGIC)?;
        w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        w.write_u16::<LittleEndian>(name.len() as u16)?;
        w.write_all(name.as_bytes())?;

        let mut n = 0;
        for (key, response) in self.storage.entries(name) {
            let data = encode_record(&key, &response)?;
            if data.len() > MAX_RECORD_BYTES {
                warn!(partition = %name, key = %key, size = data.len(), "[dump] record too large, skipped");
                continue;
            }
            let crc = if self.crc32_control { checksum(&data) } else { 0 };
            w.write_u32::<LittleEndian>(data.len() as u32)?;
            w.write_u32::<LittleEndian>(crc)?;
            w.write_all(&data)?;
            n += 1;
        }
        Ok(n)
    }

    fn load_blocking(&self, ctx: &CancellationToken) -> Result<DumpStats> {
        let mut stats = DumpStats::default();
        if !self.dir.exists() {
            info!(dir = %self.dir.display(), "[load] no dump dir, starting cold");
            return Ok(stats);
        }

        for path in dump_files(&self.dir)? {
            if ctx.is_cancelled() {
                break;
            }
            match self.read_partition(&path, ctx, &mut stats) {
                Ok(()) => stats.partitions += 1,
                Err(e) => {
                    error!(file = %path.display(), error = %e, "[load] unreadable dump file");
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }

    fn read_partition(&self, path: &Path, ctx: &CancellationToken, stats: &mut DumpStats) -> io::Result<()> {
        let file = fs::File::open(path)?;
        let mut reader: Box<dyn Read> = if path.to_string_lossy().ends_with(".gz") {
            Box::new(BufReader::with_capacity(DUMP_BUFFER_SIZE, GzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(DUMP_BUFFER_SIZE, file))
        };

        let name = read_header(&mut reader)?;
        self.storage.open(&name);

        loop {
            if ctx.is_cancelled() {
                return Ok(());
            }

            let len = match reader.read_u32::<LittleEndian>() {
                Ok(len) => len as usize,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };
            if len > MAX_RECORD_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("record length {} exceeds {} bytes", len, MAX_RECORD_BYTES),
                ));
            }
            let expected = reader.read_u32::<LittleEndian>()?;
            let mut data = vec![0u8; len];
            reader.read_exact(&mut data)?;

            if self.crc32_control && checksum(&data) != expected {
                warn!(file = %path.display(), "[load] crc mismatch, record skipped");
                stats.skipped += 1;
                continue;
            }

            let (key, response) = match decode_record(&data) {
                Ok(rec) => rec,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "[load] record decode error");
                    stats.skipped += 1;
                    continue;
                }
            };

            match self.storage.put(&name, key, response) {
                Ok(()) => stats.entries += 1,
                Err(e) => {
                    warn!(partition = %name, error = %e, "[load] record rejected by store");
                    stats.skipped += 1;
                }
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Dumper for PartitionDumper {
    async fn dump(&self, ctx: CancellationToken) -> Result<DumpStats> {
        let start = Instant::now();
        let this = self.clone();
        let stats = tokio::task::spawn_blocking(move || this.dump_blocking(&ctx))
            .await
            .context("dump task panicked")??;

        info!(
            partitions = stats.partitions,
            written = stats.entries,
            fails = stats.skipped,
            elapsed = ?start.elapsed(),
            "dumping finished"
        );
        if stats.skipped > 0 {
            anyhow::bail!("dump finished with {} errors", stats.skipped);
        }
        Ok(stats)
    }

    async fn load(&self, ctx: CancellationToken) -> Result<DumpStats> {
        let start = Instant::now();
        let this = self.clone();
        let stats = tokio::task::spawn_blocking(move || this.load_blocking(&ctx))
            .await
            .context("load task panicked")??;

        info!(
            partitions = stats.partitions,
            restored = stats.entries,
            skipped = stats.skipped,
            elapsed = ?start.elapsed(),
            "restoring dump"
        );
        Ok(stats)
    }
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Maps a partition name onto a safe file stem. The real name lives in the file header.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

fn dump_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dump dir: {}", dir.display()))? {
        let path = entry?.path();
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if name.ends_with(EXT) || name.ends_with(EXT_GZ) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_header<R: Read>(r: &mut R) -> io::Result<String> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad dump magic"));
    }
    let version = r.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported dump format version {}", version),
        ));
    }
    let name = read_string(r, r_len_u16)?;
    if name.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "empty partition name"));
    }
    Ok(name)
}

fn r_len_u16<R: Read>(r: &mut R) -> io::Result<usize> {
    Ok(r.read_u16::<LittleEndian>()? as usize)
}

fn r_len_u32<R: Read>(r: &mut R) -> io::Result<usize> {
    Ok(r.read_u32::<LittleEndian>()? as usize)
}

fn read_string<R: Read>(r: &mut R, len: fn(&mut R) -> io::Result<usize>) -> io::Result<String> {
    let n = len(r)?;
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Record layout: key, status, headers, body.
fn encode_record(key: &CacheKey, response: &ResponseSnapshot) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(key.as_str().len() + response.size() + 16);
    buf.write_u32::<LittleEndian>(key.as_str().len() as u32)?;
    buf.write_all(key.as_str().as_bytes())?;
    buf.write_u16::<LittleEndian>(response.status)?;
    buf.write_u16::<LittleEndian>(response.headers.len() as u16)?;
    for (name, value) in &response.headers {
        buf.write_u16::<LittleEndian>(name.len() as u16)?;
        buf.write_all(name.as_bytes())?;
        buf.write_u32::<LittleEndian>(value.len() as u32)?;
        buf.write_all(value.as_bytes())?;
    }
    buf.write_u32::<LittleEndian>(response.body.len() as u32)?;
    buf.write_all(&response.body)?;
    Ok(buf)
}

fn decode_record(data: &[u8]) -> io::Result<(CacheKey, ResponseSnapshot)> {
    let mut r = io::Cursor::new(data);
    let key = read_string(&mut r, r_len_u32)?;
    let status = r.read_u16::<LittleEndian>()?;
    let count = r.read_u16::<LittleEndian>()? as usize;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_string(&mut r, r_len_u16)?;
        let value = read_string(&mut r, r_len_u32)?;
        headers.push((name, value));
    }
    let body_len = r.read_u32::<LittleEndian>()? as usize;
    let mut body = vec![0u8; body_len];
    r.read_exact(&mut body)?;
    if (r.position() as usize) != data.len() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "trailing bytes in record"));
    }
    Ok((
        CacheKey::from_raw(key),
        ResponseSnapshot::new(status, headers, Bytes::from(body)),
    ))
}
