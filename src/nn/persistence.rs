//! Binary `.netw` files.
//!
//! Layout (little-endian):
//!
//! ```text
//! b"nn"                 magic, no terminator
//! i32                   number of widths (L + 1)
//! i32 * (L + 1)         widths
//! L times:
//!   weights             width_i rows of width_{i+1} f32, '\n' after each row
//!   bias                1 row of width_{i+1} f32, '\n'
//! ```
//!
//! Loading parses and validates the whole file before any parameter of the
//! destination network is overwritten.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{NetError, Result};
use crate::matrix::Matrix;

use super::network::Network;

/// Magic bytes at the start of every network file.
pub const FILE_MAGIC: &[u8; 2] = b"nn";

/// Extension appended by [`NetworkStore`].
pub const FILE_EXTENSION: &str = "netw";

/// Encode the architecture and parameters of `net`.
///
/// Fails with `InvalidInput` if a width or the width count does not fit
/// the file's `i32` fields.
pub fn write_network<W: Write>(net: &Network, writer: &mut W) -> io::Result<()> {
    let arch = net.architecture();
    writer.write_all(FILE_MAGIC)?;
    writer.write_all(&encode_i32(arch.widths().len())?)?;
    for &w in arch.widths() {
        writer.write_all(&encode_i32(w)?)?;
    }
    for layer in net.layers() {
        layer.weights.write_rows(writer)?;
        layer.bias.write_rows(writer)?;
    }
    Ok(())
}

/// Save `net` to `path`, refusing to overwrite an existing file.
pub fn save(net: &Network, path: &Path) -> Result<()> {
    let mut bytes = Vec::new();
    write_network(net, &mut bytes)?;

    fill_new_file(path, |file| {
        file.write_all(&bytes)?;
        file.sync_all()
    })?;

    info!("saved network {} to {}", net.architecture(), path.display());
    Ok(())
}

/// Create `path` (which must not exist) and run `write` on it. If `write`
/// fails the partial file is removed.
fn fill_new_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => NetError::FileAlreadyExists(path.to_path_buf()),
            _ => NetError::Io(e),
        })?;

    if let Err(e) = write(&mut file) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            warn!("could not remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(NetError::Io(e));
    }
    Ok(())
}

/// Little-endian `i32` field, or `InvalidInput` if `value` overflows it.
fn encode_i32(value: usize) -> io::Result<[u8; 4]> {
    i32::try_from(value)
        .map(i32::to_le_bytes)
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not fit an i32 header field", value),
            )
        })
}

/// Load parameters from `path` into `net`.
///
/// The file's widths must equal the network's exactly. On any error `net`
/// is left unmodified.
pub fn load(net: &mut Network, path: &Path) -> Result<()> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => NetError::FileNotFound(path.to_path_buf()),
        _ => NetError::Io(e),
    })?;
    read_network(net, &bytes, path)?;
    info!("loaded network {} from {}", net.architecture(), path.display());
    Ok(())
}

/// Decode `bytes` into `net`. `path` is only used for error reporting.
pub fn read_network(net: &mut Network, bytes: &[u8], path: &Path) -> Result<()> {
    let corrupt = |reason: String| NetError::CorruptFile {
        path: path.to_path_buf(),
        reason,
    };

    let mut cursor = bytes;
    let mut magic = [0u8; 2];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| corrupt("missing magic header".into()))?;
    if &magic != FILE_MAGIC {
        return Err(corrupt(format!("bad magic header {:?}", magic)));
    }

    let count = read_i32(&mut cursor).map_err(|_| corrupt("truncated width count".into()))?;
    let count = usize::try_from(count)
        .map_err(|_| corrupt(format!("negative width count {}", count)))?;
    if cursor.len() < count * 4 {
        return Err(corrupt(format!("width table of {} entries is truncated", count)));
    }
    let mut widths = Vec::with_capacity(count);
    for i in 0..count {
        let w = read_i32(&mut cursor).map_err(|_| corrupt("truncated width table".into()))?;
        let w = usize::try_from(w).map_err(|_| corrupt(format!("width {} is negative", i)))?;
        widths.push(w);
    }

    let expected = net.architecture();
    if widths != expected.widths() {
        return Err(NetError::InvalidArchitecture(format!(
            "file {} holds {:?} but network is {}",
            path.display(),
            widths,
            expected
        )));
    }

    let mut parsed = Vec::with_capacity(net.layer_count());
    for (i, layer) in net.layers().iter().enumerate() {
        let mut weights = Matrix::new(layer.in_width(), layer.out_width());
        weights
            .read_rows(&mut cursor)
            .map_err(|e| corrupt(format!("weights {}: {}", i, e)))?;
        let mut bias = Matrix::new(1, layer.out_width());
        bias.read_rows(&mut cursor)
            .map_err(|e| corrupt(format!("bias {}: {}", i, e)))?;
        parsed.push((weights, bias));
    }
    if !cursor.is_empty() {
        return Err(corrupt(format!("{} trailing bytes", cursor.len())));
    }

    for (layer, (weights, bias)) in net.layers_mut().iter_mut().zip(parsed) {
        layer.weights = weights;
        layer.bias = bias;
    }
    Ok(())
}

fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Directory of named network files.
///
/// Resolves `name` to `<dir>/<name>.netw`; the directory is always supplied
/// by the caller.
#[derive(Clone, Debug)]
pub struct NetworkStore {
    dir: PathBuf,
}

impl NetworkStore {
    /// Store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path for a network name.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, FILE_EXTENSION))
    }

    /// True if a file for `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    /// Save under `name`; fails if that file already exists.
    pub fn save(&self, name: &str, net: &Network) -> Result<PathBuf> {
        let path = self.path_for(name);
        save(net, &path)?;
        Ok(path)
    }

    /// Load `name` into `net`.
    pub fn load(&self, name: &str, net: &mut Network) -> Result<PathBuf> {
        let path = self.path_for(name);
        load(net, &path)?;
        Ok(path)
    }
}
