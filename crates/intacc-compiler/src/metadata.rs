//! Binary module format.
//!
//! The emitted artifact and the reference inputs share one deterministic,
//! little-endian layout:
//!
//! ```text
//! magic "IACM" | format version u16 | module name | target u8 | flags u32
//! | grant list | define list | exported type table | xxh64 checksum
//! ```
//!
//! Strings are length-prefixed UTF-8; lists are count-prefixed. Grant and
//! define lists are sorted by the writer, so identical inputs always
//! produce identical bytes. All tag bytes decode through
//! `num_enum::TryFromPrimitive`; an unknown tag is a format error, never a
//! silent default.

use bitflags::bitflags;
use thiserror::Error;
use xxhash_rust::xxh64::xxh64;

use intacc_core::{Accessibility, Span, TargetKind, TypeKind};

/// File magic, first four bytes of every module.
pub const MAGIC: [u8; 4] = *b"IACM";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Seed for the trailing checksum.
const CHECKSUM_SEED: u64 = 0;

bitflags! {
    /// Module-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModuleFlags: u32 {
        /// Compiled with `--unsafe`.
        const ALLOW_UNSAFE = 1 << 0;
        /// Release optimization level.
        const OPTIMIZED = 1 << 1;
        /// Exported types carry source spans.
        const HAS_DEBUG_SPANS = 1 << 2;
    }
}

/// Errors produced while decoding a module file.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not a module file (bad magic)")]
    BadMagic,
    #[error("unsupported format version {found} (expected {FORMAT_VERSION})")]
    UnsupportedVersion { found: u16 },
    #[error("module file is truncated")]
    Truncated,
    #[error("checksum mismatch, module file is corrupt")]
    Checksum,
    #[error("invalid {what} tag {value:#04x}")]
    InvalidTag { what: &'static str, value: u8 },
    #[error("module file contains invalid UTF-8")]
    InvalidUtf8,
    #[error("trailing bytes after module payload")]
    TrailingBytes,
}

/// One type a module exports.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedType {
    /// Qualified name, `Namespace.Type`.
    pub name: String,
    pub kind: TypeKind,
    pub accessibility: Accessibility,
    /// Declaration site; present only with `HAS_DEBUG_SPANS`.
    pub span: Option<Span>,
}

impl ExportedType {
    /// Whether a compilation named `importer` can see this type, given the
    /// owning module's grant list.
    pub fn visible_to(&self, grants: &[String], importer: &str) -> bool {
        match self.accessibility {
            Accessibility::Public => true,
            _ => grants.iter().any(|g| g == importer),
        }
    }
}

/// Everything a module file records.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleMetadata {
    pub name: String,
    pub target: TargetKind,
    pub flags: ModuleFlags,
    /// Assembly names granted internal access, sorted.
    pub grants: Vec<String>,
    /// Preprocessor defines active at compile time, sorted.
    pub defines: Vec<String>,
    pub types: Vec<ExportedType>,
}

impl ModuleMetadata {
    /// Serialize to the wire format, checksum included.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&MAGIC);
        w.u16(FORMAT_VERSION);
        w.str(&self.name);
        w.u8(self.target as u8);
        w.u32(self.flags.bits());

        w.u32(self.grants.len() as u32);
        for grant in &self.grants {
            w.str(grant);
        }
        w.u32(self.defines.len() as u32);
        for define in &self.defines {
            w.str(define);
        }

        w.u32(self.types.len() as u32);
        for ty in &self.types {
            w.str(&ty.name);
            w.u8(ty.kind as u8);
            w.u8(ty.accessibility as u8);
            match ty.span {
                Some(span) => {
                    w.u8(1);
                    w.u32(span.line);
                    w.u32(span.col);
                    w.u32(span.len);
                }
                None => w.u8(0),
            }
        }

        let checksum = xxh64(&w.buf, CHECKSUM_SEED);
        w.u64(checksum);
        w.buf
    }

    /// Decode a module file, validating magic, version, and checksum.
    pub fn decode(bytes: &[u8]) -> Result<Self, MetadataError> {
        if bytes.len() < MAGIC.len() + 2 + 8 {
            return Err(MetadataError::Truncated);
        }
        if bytes[..4] != MAGIC {
            return Err(MetadataError::BadMagic);
        }

        let (payload, tail) = bytes.split_at(bytes.len() - 8);
        let stored = u64::from_le_bytes(tail.try_into().expect("8-byte tail"));
        if xxh64(payload, CHECKSUM_SEED) != stored {
            return Err(MetadataError::Checksum);
        }

        let mut r = Reader::new(&payload[4..]);
        let version = r.u16()?;
        if version != FORMAT_VERSION {
            return Err(MetadataError::UnsupportedVersion { found: version });
        }

        let name = r.str()?;
        let target = r.tag::<TargetKind>("target kind")?;
        let flags = ModuleFlags::from_bits(r.u32()?).ok_or(MetadataError::InvalidTag {
            what: "module flags",
            value: 0,
        })?;

        let grants = r.str_list()?;
        let defines = r.str_list()?;

        let count = r.u32()? as usize;
        let mut types = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let name = r.str()?;
            let kind = r.tag::<TypeKind>("type kind")?;
            let accessibility = r.tag::<Accessibility>("accessibility")?;
            let span = match r.u8()? {
                0 => None,
                1 => Some(Span::new(r.u32()?, r.u32()?, r.u32()?)),
                value => {
                    return Err(MetadataError::InvalidTag {
                        what: "span presence",
                        value,
                    });
                }
            };
            types.push(ExportedType {
                name,
                kind,
                accessibility,
                span,
            });
        }

        if !r.is_at_end() {
            return Err(MetadataError::TrailingBytes);
        }

        Ok(Self {
            name,
            target,
            flags,
            grants,
            defines,
            types,
        })
    }

    /// The exported types a compilation named `importer` can see.
    pub fn exports_to<'a>(&'a self, importer: &'a str) -> impl Iterator<Item = &'a ExportedType> {
        self.types
            .iter()
            .filter(move |ty| ty.visible_to(&self.grants, importer))
    }
}

/// Little-endian byte writer.
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn str(&mut self, value: &str) {
        self.u32(value.len() as u32);
        self.bytes(value.as_bytes());
    }
}

/// Bounds-checked little-endian reader over the payload.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MetadataError> {
        let end = self.pos.checked_add(n).ok_or(MetadataError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(MetadataError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, MetadataError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, MetadataError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().expect("2 bytes")))
    }

    fn u32(&mut self) -> Result<u32, MetadataError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn str(&mut self) -> Result<String, MetadataError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| MetadataError::InvalidUtf8)
    }

    fn str_list(&mut self) -> Result<Vec<String>, MetadataError> {
        let count = self.u32()? as usize;
        let mut out = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            out.push(self.str()?);
        }
        Ok(out)
    }

    fn tag<T>(&mut self, what: &'static str) -> Result<T, MetadataError>
    where
        T: num_enum::TryFromPrimitive<Primitive = u8>,
    {
        let value = self.u8()?;
        T::try_from_primitive(value).map_err(|_| MetadataError::InvalidTag { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModuleMetadata {
        ModuleMetadata {
            name: "Widgets".to_string(),
            target: TargetKind::Library,
            flags: ModuleFlags::OPTIMIZED,
            grants: vec!["Consumer".to_string()],
            defines: vec!["RELEASE".to_string()],
            types: vec![
                ExportedType {
                    name: "Acme.Open".to_string(),
                    kind: TypeKind::Class,
                    accessibility: Accessibility::Public,
                    span: None,
                },
                ExportedType {
                    name: "Acme.Shut".to_string(),
                    kind: TypeKind::Struct,
                    accessibility: Accessibility::Internal,
                    span: None,
                },
            ],
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let module = sample();
        let decoded = ModuleMetadata::decode(&module.encode()).unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(sample().encode(), sample().encode());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample().encode();
        bytes[0] = b'X';
        assert!(matches!(
            ModuleMetadata::decode(&bytes),
            Err(MetadataError::BadMagic)
        ));
    }

    #[test]
    fn corruption_fails_the_checksum() {
        let mut bytes = sample().encode();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        assert!(matches!(
            ModuleMetadata::decode(&bytes),
            Err(MetadataError::Checksum)
        ));
    }

    #[test]
    fn truncation_is_detected() {
        let bytes = sample().encode();
        assert!(matches!(
            ModuleMetadata::decode(&bytes[..bytes.len() - 9]),
            Err(MetadataError::Checksum) | Err(MetadataError::Truncated)
        ));
        assert!(matches!(
            ModuleMetadata::decode(&bytes[..3]),
            Err(MetadataError::Truncated)
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut module = sample();
        module.types.clear();
        let mut bytes = module.encode();
        // Forge the version, then repair the checksum so only the version
        // check can fire.
        bytes[4] = 0xFE;
        bytes[5] = 0xFF;
        let tail = bytes.len() - 8;
        let checksum = xxh64(&bytes[..tail], CHECKSUM_SEED);
        bytes[tail..].copy_from_slice(&checksum.to_le_bytes());
        assert!(matches!(
            ModuleMetadata::decode(&bytes),
            Err(MetadataError::UnsupportedVersion { found: 0xFFFE })
        ));
    }

    #[test]
    fn internal_types_visible_only_to_granted_importers() {
        let module = sample();
        let to_consumer: Vec<&str> = module
            .exports_to("Consumer")
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(to_consumer, vec!["Acme.Open", "Acme.Shut"]);

        let to_stranger: Vec<&str> = module
            .exports_to("Stranger")
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(to_stranger, vec!["Acme.Open"]);
    }

    #[test]
    fn spans_survive_when_present() {
        let mut module = sample();
        module.flags |= ModuleFlags::HAS_DEBUG_SPANS;
        module.types[0].span = Some(Span::new(3, 14, 5));
        let decoded = ModuleMetadata::decode(&module.encode()).unwrap();
        assert_eq!(decoded.types[0].span, Some(Span::new(3, 14, 5)));
    }
}
