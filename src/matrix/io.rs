//! Binary row encoding shared by the network file format.
//!
//! Each row is `cols` little-endian IEEE-754 `f32` values followed by a
//! single [`ROW_DELIMITER`] byte.

use std::io::{self, Read, Write};

use super::{Matrix, MatrixView};

/// Byte written after every matrix row.
pub const ROW_DELIMITER: u8 = b'\n';

impl<'a> MatrixView<'a> {
    /// Write every row followed by the delimiter byte.
    pub fn write_rows<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for row in self.row_slices() {
            for &x in row {
                writer.write_all(&x.to_le_bytes())?;
            }
            writer.write_all(&[ROW_DELIMITER])?;
        }
        Ok(())
    }
}

impl Matrix {
    /// Write the matrix in the row-delimited binary encoding.
    pub fn write_rows<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.view().write_rows(writer)
    }

    /// Encoded size in bytes of a `rows x cols` matrix.
    #[must_use]
    pub fn encoded_len(rows: usize, cols: usize) -> usize {
        rows * (cols * std::mem::size_of::<f32>() + 1)
    }

    /// Read a matrix of this shape from the row-delimited encoding.
    ///
    /// Returns `UnexpectedEof` on truncation and `InvalidData` on a wrong
    /// delimiter. `self` is only overwritten after every row decoded.
    pub fn read_rows<R: Read>(&mut self, reader: &mut R) -> io::Result<()> {
        let mut data = Vec::with_capacity(self.len());
        let mut word = [0u8; 4];
        let mut delimiter = [0u8; 1];

        for i in 0..self.rows() {
            for _ in 0..self.cols() {
                reader.read_exact(&mut word)?;
                data.push(f32::from_le_bytes(word));
            }
            reader.read_exact(&mut delimiter)?;
            if delimiter[0] != ROW_DELIMITER {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("row {} ends with byte {:#04x}", i, delimiter[0]),
                ));
            }
        }

        self.as_mut_slice().copy_from_slice(&data);
        Ok(())
    }
}
