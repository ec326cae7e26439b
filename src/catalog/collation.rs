//! Collating sequences and the registry that resolves them by name.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Text encodings a collating sequence may be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    Utf16le,
    Utf16be,
}

impl TextEncoding {
    /// Order in which encodings are tried when the preferred one has no
    /// registration: the preferred encoding first, then the others.
    fn search_order(self) -> [TextEncoding; 3] {
        match self {
            TextEncoding::Utf8 => [TextEncoding::Utf8, TextEncoding::Utf16le, TextEncoding::Utf16be],
            TextEncoding::Utf16le => {
                [TextEncoding::Utf16le, TextEncoding::Utf16be, TextEncoding::Utf8]
            }
            TextEncoding::Utf16be => {
                [TextEncoding::Utf16be, TextEncoding::Utf16le, TextEncoding::Utf8]
            }
        }
    }
}

pub type CompareFn = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// A named comparison function for text.
#[derive(Clone)]
pub struct CollSeq {
    pub name: String,
    pub encoding: TextEncoding,
    compare: CompareFn,
}

impl CollSeq {
    pub fn new(name: &str, encoding: TextEncoding, compare: CompareFn) -> Self {
        Self {
            name: name.to_string(),
            encoding,
            compare,
        }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        (self.compare)(a, b)
    }

    pub fn is_binary(&self) -> bool {
        self.name.eq_ignore_ascii_case("BINARY")
    }
}

impl fmt::Debug for CollSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollSeq")
            .field("name", &self.name)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl PartialEq for CollSeq {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.encoding == other.encoding
    }
}

/// Callback invoked once when a collation name cannot be resolved. It may
/// register the missing sequence through the registry it is handed.
pub type CollationFactory = Arc<dyn Fn(&CollationRegistry, &str, TextEncoding) + Send + Sync>;

pub fn binary_compare(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

pub fn nocase_compare(a: &str, b: &str) -> Ordering {
    let a = a.bytes().map(|c| c.to_ascii_lowercase());
    let b = b.bytes().map(|c| c.to_ascii_lowercase());
    a.cmp(b)
}

pub fn rtrim_compare(a: &str, b: &str) -> Ordering {
    binary_compare(a.trim_end_matches(' '), b.trim_end_matches(' '))
}

/// Registered collating sequences keyed by upper-cased name and encoding.
pub struct CollationRegistry {
    sequences: RwLock<HashMap<(String, TextEncoding), Arc<CollSeq>>>,
    factory: RwLock<Option<CollationFactory>>,
}

impl CollationRegistry {
    /// Create a registry holding the built-in BINARY, NOCASE and RTRIM
    /// sequences for UTF-8.
    pub fn new() -> Self {
        let registry = Self {
            sequences: RwLock::new(HashMap::new()),
            factory: RwLock::new(None),
        };
        registry.register("BINARY", TextEncoding::Utf8, Arc::new(binary_compare));
        registry.register("NOCASE", TextEncoding::Utf8, Arc::new(nocase_compare));
        registry.register("RTRIM", TextEncoding::Utf8, Arc::new(rtrim_compare));
        registry
    }

    pub fn register(&self, name: &str, encoding: TextEncoding, compare: CompareFn) {
        let seq = Arc::new(CollSeq::new(name, encoding, compare));
        self.sequences
            .write()
            .insert((name.to_ascii_uppercase(), encoding), seq);
    }

    pub fn set_factory(&self, factory: CollationFactory) {
        *self.factory.write() = Some(factory);
    }

    /// Look a sequence up without invoking the factory, substituting a
    /// registration for an equivalent encoding when the preferred one is
    /// missing.
    pub fn get(&self, name: &str, encoding: TextEncoding) -> Option<Arc<CollSeq>> {
        let key = name.to_ascii_uppercase();
        let sequences = self.sequences.read();
        encoding
            .search_order()
            .into_iter()
            .find_map(|enc| sequences.get(&(key.clone(), enc)).cloned())
    }

    /// Resolve a sequence by name, giving the factory one chance to register
    /// it. `None` means the name is unknown.
    pub fn resolve(&self, name: &str, encoding: TextEncoding) -> Option<Arc<CollSeq>> {
        if let Some(seq) = self.get(name, encoding) {
            return Some(seq);
        }
        let factory = self.factory.read().clone();
        if let Some(factory) = factory {
            log::debug!("invoking collation factory for {}", name);
            factory(self, name, encoding);
            return self.get(name, encoding);
        }
        None
    }
}

impl Default for CollationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
