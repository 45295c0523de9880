//! Assembled-image container and the machine-code file formats the
//! assembler can write: a flat binary, a DragonDOS binary and a CoCo
//! Disk Extended Color BASIC binary.

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use util::Endian;

const DRAGONDOS_LEAD: u8 = 0x55;
const DRAGONDOS_TRAIL: u8 = 0xAA;
const DRAGONDOS_FILETYPE_BINARY: u8 = 0x02;
const DECB_SEGMENT: u8 = 0x00;
const DECB_TRAILER: u8 = 0xFF;

/// Output file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Flat,
    DragonDos,
    Coco,
}

/// An assembled memory image: contiguous bytes placed at `origin`, with an
/// entry point `exec`.
#[derive(Debug, PartialEq)]
pub struct Image {
    origin: u16,
    exec: u16,
    data: Vec<u8>,
}

impl Image {
    pub fn from(origin: u16, exec: u16, data: Vec<u8>) -> Image {
        Image { origin, exec, data }
    }

    pub fn copy_from(origin: u16, exec: u16, data: &[u8]) -> Image {
        Image {
            origin,
            exec,
            data: Vec::from(data),
        }
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn exec(&self) -> u16 {
        self.exec
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
}

pub fn write<W: Write>(writer: &mut W, image: &Image, format: Format) -> std::io::Result<()> {
    match format {
        Format::Flat => writer.write_all(&image.data[..]),
        Format::DragonDos => {
            writer.write_u8(DRAGONDOS_LEAD)?;
            writer.write_u8(DRAGONDOS_FILETYPE_BINARY)?;
            writer.write_u16::<Endian>(image.origin)?;
            writer.write_u16::<Endian>(image.data.len() as u16)?;
            writer.write_u16::<Endian>(image.exec)?;
            writer.write_u8(DRAGONDOS_TRAIL)?;
            writer.write_all(&image.data[..])
        }
        Format::Coco => {
            writer.write_u8(DECB_SEGMENT)?;
            writer.write_u16::<Endian>(image.data.len() as u16)?;
            writer.write_u16::<Endian>(image.origin)?;
            writer.write_all(&image.data[..])?;
            writer.write_u8(DECB_TRAILER)?;
            writer.write_u16::<Endian>(0)?;
            writer.write_u16::<Endian>(image.exec)
        }
    }
}

/// Reads a DragonDOS binary back into an [`Image`]. Only the binary
/// filetype is accepted.
pub fn read_dragondos<R: Read>(reader: &mut R) -> std::io::Result<Image> {
    let lead = reader.read_u8()?;
    let filetype = reader.read_u8()?;
    if lead != DRAGONDOS_LEAD || filetype != DRAGONDOS_FILETYPE_BINARY {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "not a DragonDOS binary",
        ));
    }
    let origin = reader.read_u16::<Endian>()?;
    let length = reader.read_u16::<Endian>()?;
    let exec = reader.read_u16::<Endian>()?;
    let trail = reader.read_u8()?;
    if trail != DRAGONDOS_TRAIL {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad DragonDOS header trailer",
        ));
    }
    let mut data = vec![0; length as usize];
    reader.read_exact(&mut data)?;
    Ok(Image::from(origin, exec, data))
}

pub trait WriteImageExt: Write + Sized {
    fn write_image(&mut self, image: &Image, format: Format) -> std::io::Result<()> {
        write(self, image, format)
    }
}

impl<W: Write + Sized> WriteImageExt for W {}

pub trait ReadImageExt: Read + Sized {
    fn read_dragondos(&mut self) -> std::io::Result<Image> {
        read_dragondos(self)
    }
}

impl<R: Read + Sized> ReadImageExt for R {}

pub fn read_dragondos_file<P: AsRef<Path>>(path: P) -> std::io::Result<Image> {
    BufReader::new(File::open(path)?).read_dragondos()
}

pub fn write_file<P: AsRef<Path>>(path: P, image: &Image, format: Format) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_image(image, format)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Image {
        Image::from(0x1000, 0x1000, vec![0x86, 0x42, 0x39])
    }

    #[test]
    fn flat_is_just_the_data() {
        let mut out = Vec::new();
        write(&mut out, &sample(), Format::Flat).unwrap();
        assert_eq!(out, vec![0x86, 0x42, 0x39]);
    }

    #[test]
    fn dragondos_header_layout() {
        let mut out = Vec::new();
        write(&mut out, &sample(), Format::DragonDos).unwrap();
        assert_eq!(
            out,
            vec![0x55, 0x02, 0x10, 0x00, 0x00, 0x03, 0x10, 0x00, 0xAA, 0x86, 0x42, 0x39]
        );
    }

    #[test]
    fn coco_segment_and_trailer() {
        let mut out = Vec::new();
        write(&mut out, &sample(), Format::Coco).unwrap();
        assert_eq!(
            out,
            vec![
                0x00, 0x00, 0x03, 0x10, 0x00, 0x86, 0x42, 0x39, 0xFF, 0x00, 0x00, 0x10, 0x00
            ]
        );
    }

    #[test]
    fn dragondos_round_trip() {
        let mut out = Vec::new();
        write(&mut out, &sample(), Format::DragonDos).unwrap();
        let image = read_dragondos(&mut &out[..]).unwrap();
        assert_eq!(image, sample());
    }

    #[test]
    fn dragondos_rejects_other_filetypes() {
        let mut out = Vec::new();
        write(&mut out, &sample(), Format::DragonDos).unwrap();
        out[1] = 0x01;
        assert!(read_dragondos(&mut &out[..]).is_err());
    }
}
