use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use fake::Fake;
use fake::faker::address::en::{CityName, CountryName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{DomainSuffix, SafeEmail, Username};
use fake::faker::lorem::en::{Paragraph, Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::uuid::UUIDv4;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Number, Value};

use seedbed_core::{FieldDescriptor, FieldKind};

use super::{SynthesisContext, ValueSynthesizer, hash_row_seed, hash_seed};
use crate::errors::Result;

const MAX_ARRAY_LEN: usize = 3;
const DATE_SPAN_DAYS: i64 = 730;

/// Deterministic Faker-backed synthesizer.
///
/// Every value is drawn from a ChaCha8 stream seeded by the collection,
/// field path and record index, so the same seed reproduces the same data.
#[derive(Debug, Clone)]
pub struct FakerSynthesizer {
    seed: u64,
    base_date: NaiveDate,
}

impl FakerSynthesizer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }

    fn rng_for(&self, ctx: &SynthesisContext<'_>) -> ChaCha8Rng {
        let key = format!("{}.{}", ctx.collection, ctx.field_path);
        ChaCha8Rng::seed_from_u64(hash_row_seed(hash_seed(self.seed, &key), ctx.index))
    }

    fn generate(&self, field: &FieldDescriptor, rng: &mut dyn RngCore) -> Value {
        match field.kind {
            FieldKind::Primitive => self.primitive(&field.field_type, rng),
            FieldKind::Object => {
                let mut map = Map::new();
                for (name, child) in &field.children {
                    map.insert(name.clone(), self.generate(child, rng));
                }
                Value::Object(map)
            }
            FieldKind::Array => {
                let element = field.element();
                let len = rng.random_range(1..=MAX_ARRAY_LEN);
                Value::Array((0..len).map(|_| self.generate(&element, rng)).collect())
            }
        }
    }

    fn primitive(&self, field_type: &str, rng: &mut dyn RngCore) -> Value {
        if let Some(choices) = field_type.strip_prefix("enum:") {
            let options: Vec<&str> = choices.split('|').filter(|item| !item.is_empty()).collect();
            return options
                .choose(rng)
                .map(|item| Value::String(item.to_string()))
                .unwrap_or(Value::Null);
        }

        let text = |value: String| Value::String(value);
        match field_type.to_ascii_lowercase().as_str() {
            "uuid" | "id" => {
                let id: uuid::Uuid = UUIDv4.fake_with_rng(rng);
                text(id.to_string())
            }
            "email" => text(SafeEmail().fake_with_rng(rng)),
            "name" | "fullname" => text(Name().fake_with_rng(rng)),
            "firstname" => text(FirstName().fake_with_rng(rng)),
            "lastname" => text(LastName().fake_with_rng(rng)),
            "username" => text(Username().fake_with_rng(rng)),
            "phone" => text(PhoneNumber().fake_with_rng(rng)),
            "city" => text(CityName().fake_with_rng(rng)),
            "country" => text(CountryName().fake_with_rng(rng)),
            "street" => text(StreetName().fake_with_rng(rng)),
            "zip" | "zipcode" | "postcode" => text(ZipCode().fake_with_rng(rng)),
            "company" => text(CompanyName().fake_with_rng(rng)),
            "url" => {
                let host: String = Word().fake_with_rng(rng);
                let suffix: String = DomainSuffix().fake_with_rng(rng);
                text(format!("https://{host}.{suffix}"))
            }
            "word" => text(Word().fake_with_rng(rng)),
            "sentence" | "title" => text(Sentence(3..8).fake_with_rng(rng)),
            "paragraph" | "text" | "description" => text(Paragraph(1..3).fake_with_rng(rng)),
            "boolean" | "bool" => Value::Bool(rng.random_bool(0.5)),
            "integer" | "int" | "number" => Value::from(rng.random_range(0..=1000_i64)),
            "age" => Value::from(rng.random_range(18..=90_i64)),
            "quantity" => Value::from(rng.random_range(1..=20_i64)),
            "float" | "decimal" => cents(rng.random_range(0..=100_000_i64)),
            "price" | "amount" => cents(rng.random_range(100..=100_000_i64)),
            "date" => {
                let date = self.base_date - Duration::days(rng.random_range(0..DATE_SPAN_DAYS));
                text(date.format("%Y-%m-%d").to_string())
            }
            "datetime" | "timestamp" => {
                let base = NaiveDateTime::new(self.base_date, NaiveTime::MIN);
                let offset = rng.random_range(0..DATE_SPAN_DAYS * 86_400);
                let value = (base - Duration::seconds(offset)).and_utc();
                text(value.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            _ => {
                let words: Vec<String> = Words(1..3).fake_with_rng(rng);
                text(words.join(" "))
            }
        }
    }
}

impl Default for FakerSynthesizer {
    fn default() -> Self {
        Self::new(42)
    }
}

fn cents(value: i64) -> Value {
    Number::from_f64(value as f64 / 100.0)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[async_trait]
impl ValueSynthesizer for FakerSynthesizer {
    async fn synthesize(
        &self,
        field: &FieldDescriptor,
        ctx: &SynthesisContext<'_>,
    ) -> Result<Value> {
        let mut rng = self.rng_for(ctx);
        Ok(self.generate(field, &mut rng))
    }
}
