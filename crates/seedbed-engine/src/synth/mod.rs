//! Value synthesis seam.

mod faker;

use async_trait::async_trait;
use serde_json::Value;

use seedbed_core::FieldDescriptor;

use crate::errors::Result;

pub use faker::FakerSynthesizer;

/// Where a value is being synthesized.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisContext<'a> {
    pub collection: &'a str,
    /// Dot-separated path of the field within the record.
    pub field_path: &'a str,
    pub seed_hint: Option<&'a str>,
    /// Index of the record being seeded.
    pub index: u64,
}

/// Produces a value for one field descriptor.
///
/// Implementations own their timeout and retry policy; the engine never
/// retries a failed call.
#[async_trait]
pub trait ValueSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        field: &FieldDescriptor,
        ctx: &SynthesisContext<'_>,
    ) -> Result<Value>;
}

/// FNV-style mix of a base seed with a key.
pub(crate) fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub(crate) fn hash_row_seed(base: u64, index: u64) -> u64 {
    let hash = base ^ index.wrapping_mul(0x9e3779b97f4a7c15);
    hash.wrapping_mul(0x100000001b3)
}
