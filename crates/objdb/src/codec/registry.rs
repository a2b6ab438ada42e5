//! Resolves the codec name recorded in a field's schema XML (e.g. `"int"`,
//! `"String"`, `"java.util.UUID"`) to a concrete, byte-level codec.
//!
//! The schema model only ever needs to encode/decode/compare/validate raw
//! bytes — it never needs the codec's associated Rust `Value` type — so the
//! registry is built around [`ByteCodec`], an object-safe adapter over any
//! [`Codec`]. This is what lets a single `HashMap<String, Arc<dyn
//! ByteCodec>>` hold codecs of unrelated value types side by side.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use super::primitives::{
    BoolCodec, CharCodec, DateMillisCodec, F32Codec, F64Codec, I16Codec, I32Codec, I64Codec,
    I8Codec,
};
use super::string::StringCodec;
use super::uuid::UuidCodec;
use super::Codec;
use crate::error::CodecError;

/// An object-safe, byte-oriented view of a [`Codec`].
pub trait ByteCodec: Send + Sync + std::fmt::Debug {
    /// Validates that `bytes` is a well-formed, fully-consumed encoding.
    fn validate_bytes(&self, bytes: &[u8]) -> Result<(), CodecError>;

    /// Compares two encodings by decoding and applying the codec's
    /// semantic order (not byte-wise `Ord`, which callers should prefer
    /// directly on the raw key bytes whenever they don't need this).
    fn compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<Ordering, CodecError>;

    /// The encoding of this codec's default value.
    fn default_encoding(&self) -> Vec<u8>;

    fn may_start_with_00(&self) -> bool;
    fn may_start_with_ff(&self) -> bool;
}

#[derive(Debug)]
struct Adapter<C>(C);

impl<C: Codec> ByteCodec for Adapter<C> {
    fn validate_bytes(&self, bytes: &[u8]) -> Result<(), CodecError> {
        let mut cursor = Cursor::new(bytes);
        let value = self.0.read(&mut cursor)?;
        if cursor.position() as usize != bytes.len() {
            return Err(CodecError::InvalidLength {
                expected: cursor.position() as usize,
                got: bytes.len(),
            });
        }
        self.0.validate(value).map(|_| ())
    }

    fn compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<Ordering, CodecError> {
        let mut ca = Cursor::new(a);
        let mut cb = Cursor::new(b);
        let va = self.0.read(&mut ca)?;
        let vb = self.0.read(&mut cb)?;
        Ok(self.0.compare(&va, &vb))
    }

    fn default_encoding(&self) -> Vec<u8> {
        Codec::default_encoding(&self.0)
    }

    fn may_start_with_00(&self) -> bool {
        self.0.may_start_with_00()
    }

    fn may_start_with_ff(&self) -> bool {
        self.0.may_start_with_ff()
    }
}

/// Maps schema-recorded codec names to [`ByteCodec`] implementations.
///
/// Pre-populated with the built-in primitive codecs; callers may register
/// additional names (e.g. a user-defined enum's ordinal codec) with
/// [`CodecRegistry::register`].
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ByteCodec>>,
}

impl CodecRegistry {
    /// Builds a registry containing only the built-in primitive codecs.
    pub fn with_builtins() -> Self {
        let mut codecs: HashMap<String, Arc<dyn ByteCodec>> = HashMap::new();
        codecs.insert("boolean".into(), Arc::new(Adapter(BoolCodec)));
        codecs.insert("byte".into(), Arc::new(Adapter(I8Codec)));
        codecs.insert("short".into(), Arc::new(Adapter(I16Codec)));
        codecs.insert("char".into(), Arc::new(Adapter(CharCodec)));
        codecs.insert("int".into(), Arc::new(Adapter(I32Codec)));
        codecs.insert("long".into(), Arc::new(Adapter(I64Codec)));
        codecs.insert("float".into(), Arc::new(Adapter(F32Codec)));
        codecs.insert("double".into(), Arc::new(Adapter(F64Codec)));
        codecs.insert("java.lang.String".into(), Arc::new(Adapter(StringCodec)));
        codecs.insert("java.util.UUID".into(), Arc::new(Adapter(UuidCodec)));
        codecs.insert("java.util.Date".into(), Arc::new(Adapter(DateMillisCodec)));
        CodecRegistry { codecs }
    }

    /// Registers (or replaces) the codec for `name`.
    pub fn register(&mut self, name: impl Into<String>, codec: Arc<dyn ByteCodec>) {
        self.codecs.insert(name.into(), codec);
    }

    /// Looks up the codec recorded under `name`.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ByteCodec>> {
        self.codecs.get(name).cloned()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    #[test]
    fn resolves_builtin_names() {
        let registry = CodecRegistry::with_builtins();
        assert!(registry.resolve("int").is_some());
        assert!(registry.resolve("java.lang.String").is_some());
        assert!(registry.resolve("no.such.Type").is_none());
    }

    #[test]
    fn byte_codec_validates_and_compares() {
        let registry = CodecRegistry::with_builtins();
        let int_codec = registry.resolve("int").unwrap();
        let a = encode(&I32Codec, &1);
        let b = encode(&I32Codec, &2);
        assert!(int_codec.validate_bytes(&a).is_ok());
        assert_eq!(int_codec.compare_bytes(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn custom_codec_can_be_registered() {
        let mut registry = CodecRegistry::with_builtins();
        registry.register("app.Color", Arc::new(Adapter(I32Codec)));
        assert!(registry.resolve("app.Color").is_some());
    }
}
