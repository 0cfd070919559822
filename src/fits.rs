//! FITS reader
//!
//! Reads the first 2-D plane of the primary image, scaled with `BSCALE` and
//! `BZERO`, and the numeric columns of binary table extensions. Gzip
//! compressed files are detected from their magic bytes.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::OnceLock,
};

use flate2::read::GzDecoder;
use nalgebra::DMatrix;
use regex::Regex;

/// FITS block size in bytes
pub const BLOCK_SIZE: usize = 2880;
/// FITS header card size in bytes
pub const CARD_SIZE: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    #[error("failed to read the FITS file {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to decompress the FITS file")]
    Decompress(#[from] io::Error),
    #[error("the FITS header has no END card")]
    TruncatedHeader,
    #[error("the file is not a FITS file (SIMPLE = T missing)")]
    NotSimple,
    #[error("missing keyword {0}")]
    MissingKeyword(String),
    #[error("invalid value for keyword {0}: {1}")]
    InvalidKeyword(String, String),
    #[error("unsupported BITPIX: {0}")]
    Bitpix(i64),
    #[error("expected a 2-D image, found NAXIS = {0}")]
    NotAnImage(i64),
    #[error("the data unit is truncated: {expected} bytes expected, {found} found")]
    TruncatedData { expected: usize, found: usize },
    #[error("no {0} extension")]
    MissingExtension(String),
    #[error("no column {0} in the table")]
    MissingColumn(String),
}
type Result<T> = std::result::Result<T, FitsError>;

/// Header keyword value
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}
impl HeaderValue {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(text) = value.strip_prefix('\'') {
            let end = text.rfind('\'')?;
            return Some(HeaderValue::Text(
                text[..end].replace("''", "'").trim_end().to_string(),
            ));
        }
        match value {
            "" => None,
            "T" => Some(HeaderValue::Logical(true)),
            "F" => Some(HeaderValue::Logical(false)),
            _ => value
                .parse::<i64>()
                .map(HeaderValue::Integer)
                .or_else(|_| value.replace(['D', 'd'], "E").parse::<f64>().map(HeaderValue::Real))
                .ok(),
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Integer(i) => Some(*i as f64),
            HeaderValue::Real(x) => Some(*x),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Header keywords of an HDU
#[derive(Debug, Clone, Default)]
pub struct FitsHeader(BTreeMap<String, HeaderValue>);
impl FitsHeader {
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.0.get(key)
    }
    pub fn insert(&mut self, key: impl ToString, value: HeaderValue) {
        self.0.insert(key.to_string(), value);
    }
    /// Integer keyword value
    pub fn integer(&self, key: &str) -> Result<i64> {
        let value = self
            .get(key)
            .ok_or_else(|| FitsError::MissingKeyword(key.to_string()))?;
        value
            .as_i64()
            .ok_or_else(|| FitsError::InvalidKeyword(key.to_string(), format!("{:?}", value)))
    }
    /// Real keyword value, integers are converted
    pub fn real(&self, key: &str) -> Result<f64> {
        let value = self
            .get(key)
            .ok_or_else(|| FitsError::MissingKeyword(key.to_string()))?;
        value
            .as_f64()
            .ok_or_else(|| FitsError::InvalidKeyword(key.to_string(), format!("{:?}", value)))
    }
    /// Real keyword value or `default` if the keyword is missing
    pub fn real_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.get(key) {
            Some(_) => self.real(key),
            None => Ok(default),
        }
    }
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }
    /// Length of the axis `NAXISk`
    pub fn axis(&self, k: i64) -> Result<usize> {
        let key = format!("NAXIS{}", k);
        let n = self.integer(&key)?;
        usize::try_from(n).map_err(|_| FitsError::InvalidKeyword(key, n.to_string()))
    }
    /// Size in bytes of the data unit without the block padding
    pub fn data_size(&self) -> Result<usize> {
        let naxis = self.integer("NAXIS")?;
        if naxis == 0 {
            return Ok(0);
        }
        let overflow = || FitsError::InvalidKeyword("NAXIS".to_string(), naxis.to_string());
        let mut n = (1..=naxis).try_fold(1usize, |n, k| {
            n.checked_mul(self.axis(k)?).ok_or_else(overflow)
        })?;
        let pcount = self.integer("PCOUNT").unwrap_or(0);
        let gcount = self.integer("GCOUNT").unwrap_or(1);
        n = usize::try_from(pcount)
            .ok()
            .and_then(|p| n.checked_add(p))
            .and_then(|n| usize::try_from(gcount).ok().and_then(|g| n.checked_mul(g)))
            .ok_or_else(overflow)?;
        let bitpix = self.integer("BITPIX")?;
        n.checked_mul(bitpix.unsigned_abs() as usize / 8)
            .ok_or_else(overflow)
    }
    /// Parses the header cards, returns the header and its size in bytes
    fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        static CARD: OnceLock<Regex> = OnceLock::new();
        let card_regex = CARD.get_or_init(|| {
            Regex::new(r"^([A-Z0-9_-]{1,8}) *= *('(?:[^']|'')*'|[^/]*)").expect("valid card regex")
        });
        let mut header = FitsHeader::default();
        for (i, card) in bytes.chunks(CARD_SIZE).enumerate() {
            if card.len() < CARD_SIZE {
                break;
            }
            let card = String::from_utf8_lossy(card);
            if card.starts_with("END") && card[3..].trim().is_empty() {
                let n_block = (i + 1) * CARD_SIZE / BLOCK_SIZE
                    + usize::from((i + 1) * CARD_SIZE % BLOCK_SIZE > 0);
                return Ok((header, n_block * BLOCK_SIZE));
            }
            if let Some(caps) = card_regex.captures(&card) {
                if let Some(value) = HeaderValue::parse(&caps[2]) {
                    header.insert(&caps[1], value);
                }
            }
        }
        Err(FitsError::TruncatedHeader)
    }
}

/// Primary HDU image
#[derive(Debug, Clone)]
pub struct FitsImage {
    pub header: FitsHeader,
    /// the pixels, rows along `NAXIS2` and columns along `NAXIS1`
    pub data: DMatrix<f64>,
}
impl FitsImage {
    /// Reads the primary HDU of a FITS file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&read_file(path.as_ref())?)
    }
    /// Parses the primary HDU from the content of a FITS file
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(&inflate(bytes)?)
    }
    fn parse(bytes: &[u8]) -> Result<Self> {
        let (header, offset) = FitsHeader::parse(bytes)?;
        if header.get("SIMPLE") != Some(&HeaderValue::Logical(true)) {
            return Err(FitsError::NotSimple);
        }
        let bitpix = header.integer("BITPIX")?;
        let naxis = header.integer("NAXIS")?;
        if naxis < 2 {
            return Err(FitsError::NotAnImage(naxis));
        }
        let axis = |k: i64| header.axis(k);
        let (nx, ny) = (axis(1)?, axis(2)?);
        if nx == 0 || ny == 0 {
            return Err(FitsError::NotAnImage(naxis));
        }
        for k in 3..=naxis {
            if axis(k)? > 1 {
                log::warn!("only the first plane of the {}-D image is read", naxis);
                break;
            }
        }
        let bscale = header.real_or("BSCALE", 1.)?;
        let bzero = header.real_or("BZERO", 0.)?;

        let size = match bitpix {
            8 | 16 | 32 | 64 | -32 | -64 => bitpix.unsigned_abs() as usize / 8,
            _ => return Err(FitsError::Bitpix(bitpix)),
        };
        let expected = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(size))
            .ok_or_else(|| {
                FitsError::InvalidKeyword("NAXIS1".to_string(), format!("{} x {} pixels", nx, ny))
            })?;
        let data = offset
            .checked_add(expected)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(FitsError::TruncatedData {
                expected,
                found: bytes.len().saturating_sub(offset),
            })?;
        let pixels: Vec<f64> = data
            .chunks_exact(size)
            .map(|b| {
                let raw = match bitpix {
                    8 => b[0] as f64,
                    16 => i16::from_be_bytes([b[0], b[1]]) as f64,
                    32 => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                    64 => i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                        as f64,
                    -32 => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                    _ => f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                };
                raw * bscale + bzero
            })
            .collect();
        Ok(Self {
            header,
            data: DMatrix::from_row_slice(ny, nx, &pixels),
        })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(|e| FitsError::Io(e, path.to_path_buf()))?;
    Ok(bytes)
}

fn inflate(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut inflated = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut inflated)?;
        Ok(Cow::Owned(inflated))
    } else {
        Ok(Cow::Borrowed(bytes))
    }
}

/// Binary table column element types that can be read as numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    tform: String,
    kind: Option<ColumnType>,
    /// offset of the column within a row
    offset: usize,
    scale: f64,
    zero: f64,
}

/// Parses a `TFORMn` value into the element type and the column width in bytes
fn parse_tform(tform: &str) -> Option<(Option<ColumnType>, usize)> {
    let tform = tform.trim();
    let n_digit = tform.bytes().take_while(u8::is_ascii_digit).count();
    let repeat = match &tform[..n_digit] {
        "" => 1,
        digits => digits.parse::<usize>().ok()?,
    };
    let code = tform[n_digit..].chars().next()?;
    let (kind, size) = match code {
        'L' | 'A' => (None, 1),
        'X' => return Some((None, repeat.div_ceil(8))),
        'B' => (Some(ColumnType::U8), 1),
        'I' => (Some(ColumnType::I16), 2),
        'J' => (Some(ColumnType::I32), 4),
        'K' => (Some(ColumnType::I64), 8),
        'E' => (Some(ColumnType::F32), 4),
        'D' => (Some(ColumnType::F64), 8),
        'C' | 'P' => (None, 8),
        'M' | 'Q' => (None, 16),
        _ => return None,
    };
    Some((kind.filter(|_| repeat > 0), repeat.checked_mul(size)?))
}

/// Binary table extension
///
/// Only the first element of the numeric columns is read, scaled with
/// `TSCALn` and `TZEROn`.
#[derive(Debug, Clone)]
pub struct FitsTable {
    pub header: FitsHeader,
    n_rows: usize,
    row_size: usize,
    columns: Vec<Column>,
    data: Vec<u8>,
}
impl FitsTable {
    /// Reads the binary table extension named `extname` of a FITS file
    pub fn from_path<P: AsRef<Path>>(path: P, extname: &str) -> Result<Self> {
        Self::from_bytes(&read_file(path.as_ref())?, extname)
    }
    /// Parses the binary table extension named `extname` from the content of a FITS file
    pub fn from_bytes(bytes: &[u8], extname: &str) -> Result<Self> {
        let bytes = inflate(bytes)?;
        let mut offset = 0;
        while offset < bytes.len() {
            let (header, header_size) = FitsHeader::parse(&bytes[offset..])?;
            if offset == 0 && header.get("SIMPLE") != Some(&HeaderValue::Logical(true)) {
                return Err(FitsError::NotSimple);
            }
            let data_size = header.data_size()?;
            let start = offset + header_size;
            if offset > 0
                && header.text("XTENSION") == Some("BINTABLE")
                && header
                    .text("EXTNAME")
                    .is_some_and(|name| name.eq_ignore_ascii_case(extname))
            {
                let data = start
                    .checked_add(data_size)
                    .and_then(|end| bytes.get(start..end))
                    .ok_or(FitsError::TruncatedData {
                        expected: data_size,
                        found: bytes.len().saturating_sub(start),
                    })?;
                return Self::new(header, data.to_vec());
            }
            offset = data_size
                .div_ceil(BLOCK_SIZE)
                .checked_mul(BLOCK_SIZE)
                .and_then(|size| start.checked_add(size))
                .ok_or(FitsError::TruncatedData {
                    expected: data_size,
                    found: bytes.len().saturating_sub(start),
                })?;
        }
        Err(FitsError::MissingExtension(extname.to_string()))
    }
    fn new(header: FitsHeader, data: Vec<u8>) -> Result<Self> {
        let row_size = header.axis(1)?;
        let n_rows = header.axis(2)?;
        let n_field = header.integer("TFIELDS")?;
        let mut columns = vec![];
        let mut offset = 0usize;
        for k in 1..=n_field {
            let key = format!("TFORM{}", k);
            let tform = header
                .text(&key)
                .ok_or_else(|| FitsError::MissingKeyword(key.clone()))?
                .to_string();
            let (kind, width) =
                parse_tform(&tform).ok_or_else(|| FitsError::InvalidKeyword(key, tform.clone()))?;
            columns.push(Column {
                name: header
                    .text(&format!("TTYPE{}", k))
                    .unwrap_or_default()
                    .to_string(),
                tform,
                kind,
                offset,
                scale: header.real_or(&format!("TSCAL{}", k), 1.)?,
                zero: header.real_or(&format!("TZERO{}", k), 0.)?,
            });
            offset = offset.saturating_add(width);
        }
        if offset > row_size {
            return Err(FitsError::InvalidKeyword(
                "NAXIS1".to_string(),
                format!("{} bytes per row, the columns need {}", row_size, offset),
            ));
        }
        Ok(Self {
            header,
            n_rows,
            row_size,
            columns,
            data,
        })
    }
    /// Number of rows
    pub fn len(&self) -> usize {
        self.n_rows
    }
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }
    /// Column names
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
    /// Values of the numeric column `name`, the name is case insensitive
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| FitsError::MissingColumn(name.to_string()))?;
        let kind = column.kind.ok_or_else(|| {
            FitsError::InvalidKeyword(format!("TFORM of {}", name), column.tform.clone())
        })?;
        (0..self.n_rows)
            .map(|i| {
                let b = &self.data[i * self.row_size + column.offset..];
                let raw = match kind {
                    ColumnType::U8 => b[0] as f64,
                    ColumnType::I16 => i16::from_be_bytes([b[0], b[1]]) as f64,
                    ColumnType::I32 => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                    ColumnType::I64 => {
                        i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64
                    }
                    ColumnType::F32 => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                    ColumnType::F64 => {
                        f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                    }
                };
                Ok(raw * column.scale + column.zero)
            })
            .collect()
    }
}

#[cfg(test)]
fn header_bytes(cards: Vec<(&str, String)>) -> Vec<u8> {
    let mut bytes: Vec<u8> = cards
        .into_iter()
        .map(|(key, value)| format!("{:<8}= {:>20}", key, value))
        .chain(Some("END".to_string()))
        .flat_map(|card| format!("{:<80}", card).into_bytes())
        .collect();
    bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, b' ');
    bytes
}

/// Encodes a primary HDU with `BITPIX = -64`
#[cfg(test)]
pub(crate) fn to_bytes(cards: &[(&str, &str)], data: &DMatrix<f64>) -> Vec<u8> {
    let (ny, nx) = data.shape();
    let mut header = vec![
        ("SIMPLE", "T".to_string()),
        ("BITPIX", "-64".to_string()),
        ("NAXIS", "2".to_string()),
        ("NAXIS1", nx.to_string()),
        ("NAXIS2", ny.to_string()),
    ];
    header.extend(cards.iter().map(|(k, v)| (*k, v.to_string())));
    let mut bytes = header_bytes(header);
    for j in 0..ny {
        for i in 0..nx {
            bytes.extend(data[(j, i)].to_be_bytes());
        }
    }
    bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
    bytes
}

/// Encodes an empty primary HDU followed by the binary table `extname`
///
/// The columns are given by their name, their `TFORM` (`D`, `E` or `J`) and their values.
#[cfg(test)]
pub(crate) fn table_to_bytes(
    extname: &str,
    cards: &[(&str, &str)],
    columns: &[(&str, &str, Vec<f64>)],
) -> Vec<u8> {
    let mut bytes = header_bytes(vec![
        ("SIMPLE", "T".to_string()),
        ("BITPIX", "8".to_string()),
        ("NAXIS", "0".to_string()),
    ]);
    let width = |tform: &str| if tform == "D" { 8 } else { 4 };
    let row_size: usize = columns.iter().map(|(_, tform, _)| width(tform)).sum();
    let n_rows = columns.first().map_or(0, |(_, _, values)| values.len());
    let keys: Vec<_> = (1..=columns.len())
        .map(|k| (format!("TTYPE{}", k), format!("TFORM{}", k)))
        .collect();
    let mut header = vec![
        ("XTENSION", "'BINTABLE'".to_string()),
        ("BITPIX", "8".to_string()),
        ("NAXIS", "2".to_string()),
        ("NAXIS1", row_size.to_string()),
        ("NAXIS2", n_rows.to_string()),
        ("PCOUNT", "0".to_string()),
        ("GCOUNT", "1".to_string()),
        ("TFIELDS", columns.len().to_string()),
        ("EXTNAME", format!("'{}'", extname)),
    ];
    for ((ttype, tform), (name, format, _)) in keys.iter().zip(columns) {
        header.push((ttype.as_str(), format!("'{}'", name)));
        header.push((tform.as_str(), format!("'{}'", format)));
    }
    header.extend(cards.iter().map(|(k, v)| (*k, v.to_string())));
    bytes.extend(header_bytes(header));
    for i in 0..n_rows {
        for (_, tform, values) in columns {
            match *tform {
                "D" => bytes.extend(values[i].to_be_bytes()),
                "E" => bytes.extend((values[i] as f32).to_be_bytes()),
                _ => bytes.extend((values[i] as i32).to_be_bytes()),
            }
        }
    }
    bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
    bytes
}
