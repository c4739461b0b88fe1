//! Field descriptors for the admin forms.
//!
//! Each config document and collection declares its fields once as an
//! [`EntitySchema`]. Keys a schema does not declare are classified from the
//! value's shape by [`infer_field_kind`], so documents carrying extra fields
//! still render. Input coming back from a form is coerced through the kind.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::Value;

use super::sanitize::sanitize_html;
use crate::errors::AppError;
use crate::models::{CollectionName, ConfigKey, Document};

/// Choices for the leadership `type` field.
pub const LEADER_TYPES: [&str; 3] = ["Presidency", "Secretariat", "Executive"];

/// Strings longer than this get a multi-line input.
const LONG_TEXT_THRESHOLD: usize = 80;

/// Keys that are never shown in a form.
const HIDDEN_KEYS: [&str; 2] = ["id", "order"];

/// Editing widget category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "options", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    LongText,
    RichText,
    Image,
    Date,
    Time,
    Toggle,
    StringList,
    ObjectList,
    Select(Vec<String>),
}

/// Classify a key from the shape of its value, in priority order.
///
/// Returns `None` for keys that are never rendered.
pub fn infer_field_kind(key: &str, value: &Value, siblings: &Document) -> Option<FieldKind> {
    if HIDDEN_KEYS.contains(&key) {
        return None;
    }
    let lower = key.to_ascii_lowercase();

    if lower.contains("type")
        && (siblings.contains_key("dcccId") || siblings.contains_key("tenureYears"))
    {
        return Some(leader_select());
    }
    if ["imageurl", "coverimage", "logo"]
        .iter()
        .any(|pattern| lower.contains(pattern))
    {
        return Some(FieldKind::Image);
    }
    if key == "date" {
        return Some(FieldKind::Date);
    }
    if key == "time" || lower.contains("time24") {
        return Some(FieldKind::Time);
    }
    if value.is_boolean() {
        return Some(FieldKind::Toggle);
    }
    if lower.contains("desc") || lower.contains("text") || key == "bio" {
        return Some(FieldKind::RichText);
    }
    if let Value::Array(items) = value {
        if items.iter().all(Value::is_string) {
            return Some(FieldKind::StringList);
        }
        if items.iter().all(Value::is_object) {
            return Some(FieldKind::ObjectList);
        }
    }
    match value {
        Value::String(s) if s.chars().count() > LONG_TEXT_THRESHOLD => Some(FieldKind::LongText),
        _ => Some(FieldKind::Text),
    }
}

fn leader_select() -> FieldKind {
    FieldKind::Select(LEADER_TYPES.iter().map(|s| s.to_string()).collect())
}

/// `tenureYears` -> `Tenure Years`.
pub fn humanize_label(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 4);
    let mut prev: Option<char> = None;
    for c in key.chars() {
        if c == '_' {
            label.push(' ');
        } else if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
            label.push(' ');
            label.push(c);
        } else {
            label.push(c);
        }
        prev = Some(c);
    }
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => label,
    }
}

/// Blank a value for a fresh copy of a record: strings, booleans and arrays
/// are emptied, anything else is kept.
pub fn blank_like(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(String::new()),
        Value::Bool(_) => Value::Bool(false),
        Value::Array(_) => Value::Array(Vec::new()),
        other => other.clone(),
    }
}

/// Append a row to an object list, shaped like the first row.
pub fn add_row(rows: &mut Vec<Value>) {
    let row = match rows.first() {
        Some(Value::Object(first)) => Value::Object(
            first
                .iter()
                .map(|(k, v)| (k.clone(), blank_like(v)))
                .collect(),
        ),
        _ => Value::Object(Document::new()),
    };
    rows.push(row);
}

pub fn remove_row(rows: &mut Vec<Value>, index: usize) -> Result<Value, AppError> {
    if index >= rows.len() {
        return Err(AppError::Validation(format!(
            "Row {} does not exist ({} rows)",
            index,
            rows.len()
        )));
    }
    Ok(rows.remove(index))
}

/// Calendar-date form (`YYYY-MM-DD`) of a date or timestamp string.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive().format("%Y-%m-%d").to_string());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date().format("%Y-%m-%d").to_string())
}

/// 24-hour `HH:MM` form of a time string.
pub fn normalize_time(raw: &str) -> Option<String> {
    let raw = raw.trim();
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.format("%H:%M").to_string())
}

fn split_lines(raw: &str) -> Vec<Value> {
    raw.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| Value::String(line.to_string()))
        .collect()
}

fn invalid(key: &str, expected: &str) -> AppError {
    AppError::Validation(format!("Field {} expects {}", key, expected))
}

impl FieldKind {
    /// Turn form input into the stored value.
    pub fn coerce(&self, key: &str, input: Value) -> Result<Value, AppError> {
        match (self, input) {
            (FieldKind::Text | FieldKind::LongText, v @ (Value::String(_) | Value::Number(_))) => {
                Ok(v)
            }
            (FieldKind::Text | FieldKind::LongText | FieldKind::Image | FieldKind::RichText, Value::Null) => {
                Ok(Value::String(String::new()))
            }
            (FieldKind::Image, Value::String(url)) => Ok(Value::String(url.trim().to_string())),
            (FieldKind::RichText, Value::String(html)) => Ok(Value::String(sanitize_html(&html))),
            (FieldKind::Date, Value::String(raw)) if raw.trim().is_empty() => {
                Ok(Value::String(String::new()))
            }
            (FieldKind::Date, Value::String(raw)) => normalize_date(&raw)
                .map(Value::String)
                .ok_or_else(|| invalid(key, "a date (YYYY-MM-DD)")),
            (FieldKind::Time, Value::String(raw)) if raw.trim().is_empty() => {
                Ok(Value::String(String::new()))
            }
            (FieldKind::Time, Value::String(raw)) => normalize_time(&raw)
                .map(Value::String)
                .ok_or_else(|| invalid(key, "a time (HH:MM)")),
            (FieldKind::Toggle, Value::Bool(b)) => Ok(Value::Bool(b)),
            (FieldKind::Toggle, Value::String(s)) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid(key, "true or false")),
            },
            (FieldKind::StringList, Value::String(raw)) => Ok(Value::Array(split_lines(&raw))),
            (FieldKind::StringList, Value::Array(items)) => items
                .into_iter()
                .filter(|item| item.as_str().map_or(true, |s| !s.trim().is_empty()))
                .map(|item| match item {
                    Value::String(s) => Ok(Value::String(s)),
                    _ => Err(invalid(key, "a list of strings")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (FieldKind::ObjectList, Value::Array(rows)) if rows.iter().all(Value::is_object) => {
                Ok(Value::Array(rows))
            }
            (FieldKind::Select(options), Value::String(choice)) if options.contains(&choice) => {
                Ok(Value::String(choice))
            }
            (FieldKind::Select(options), _) => Err(invalid(key, &format!("one of {}", options.join(", ")))),
            (FieldKind::ObjectList, _) => Err(invalid(key, "a list of objects")),
            (FieldKind::StringList, _) => Err(invalid(key, "text or a list of strings")),
            (FieldKind::Toggle, _) => Err(invalid(key, "true or false")),
            _ => Err(invalid(key, "text")),
        }
    }

    /// Value as the widget shows it.
    pub fn display(&self, value: &Value) -> Value {
        match (self, value) {
            (FieldKind::Date, Value::String(raw)) => {
                Value::String(normalize_date(raw).unwrap_or_else(|| raw.clone()))
            }
            (FieldKind::StringList, Value::Array(items)) => Value::String(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => value.clone(),
        }
    }
}

/// One declared or inferred form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDescriptor {
    fn new(key: &str, kind: FieldKind) -> Self {
        Self {
            key: key.to_string(),
            label: humanize_label(key),
            kind,
        }
    }
}

/// A field ready for display: descriptor plus its current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    #[serde(flatten)]
    pub descriptor: FieldDescriptor,
    pub value: Value,
}

/// Declared fields of one document type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySchema {
    pub fields: Vec<FieldDescriptor>,
}

macro_rules! schema {
    ($($key:literal => $kind:expr),* $(,)?) => {
        EntitySchema {
            fields: vec![$(FieldDescriptor::new($key, $kind)),*],
        }
    };
}

impl EntitySchema {
    pub fn for_config(key: ConfigKey) -> Self {
        use FieldKind::*;
        match key {
            ConfigKey::Hero => schema! {
                "title" => Text,
                "subtitle" => Text,
                "description" => RichText,
                "backgroundImageUrl" => Image,
                "ctaText" => Text,
                "ctaLink" => Text,
            },
            ConfigKey::About => schema! {
                "title" => Text,
                "foundedYear" => Text,
                "description" => RichText,
                "missionText" => RichText,
                "highlights" => StringList,
                "stats" => ObjectList,
                "coverImage" => Image,
            },
            ConfigKey::Join => schema! {
                "title" => Text,
                "description" => RichText,
                "formUrl" => Text,
                "isOpen" => Toggle,
                "benefits" => StringList,
            },
            ConfigKey::Footer => schema! {
                "email" => Text,
                "phone" => Text,
                "address" => LongText,
                "copyrightText" => Text,
                "socialLinks" => ObjectList,
            },
            ConfigKey::Theme => schema! {
                "primaryColor" => Text,
                "secondaryColor" => Text,
                "logo" => Image,
                "darkMode" => Toggle,
            },
            ConfigKey::General => schema! {
                "siteName" => Text,
                "tagline" => Text,
                "featuredEventIds" => StringList,
                "maintenanceMode" => Toggle,
            },
        }
    }

    pub fn for_collection(name: CollectionName) -> Self {
        use FieldKind::*;
        match name {
            CollectionName::Departments => schema! {
                "name" => Text,
                "description" => RichText,
                "imageUrl" => Image,
                "activities" => StringList,
            },
            CollectionName::Events => schema! {
                "title" => Text,
                "date" => Date,
                "time" => Time,
                "venue" => Text,
                "description" => RichText,
                "coverImage" => Image,
                "isUpcoming" => Toggle,
            },
            CollectionName::Achievements => schema! {
                "title" => Text,
                "date" => Date,
                "description" => RichText,
                "imageUrl" => Image,
                "winners" => ObjectList,
            },
            CollectionName::Moderators => schema! {
                "name" => Text,
                "designation" => Text,
                "department" => Text,
                "imageUrl" => Image,
                "bio" => RichText,
            },
            CollectionName::CurrentExecutives => schema! {
                "name" => Text,
                "position" => Text,
                "type" => leader_select(),
                "dcccId" => Text,
                "imageUrl" => Image,
                "bio" => RichText,
                "socialLinks" => ObjectList,
            },
            CollectionName::PastExecutives => schema! {
                "name" => Text,
                "position" => Text,
                "type" => leader_select(),
                "tenureYears" => Text,
                "imageUrl" => Image,
            },
        }
    }

    pub fn declared(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Kind for `key` in `doc`: the declared one, else inferred from `value`.
    pub fn kind_for(&self, key: &str, value: &Value, doc: &Document) -> Option<FieldKind> {
        if HIDDEN_KEYS.contains(&key) {
            return None;
        }
        match self.declared(key) {
            Some(field) => Some(field.kind.clone()),
            None => infer_field_kind(key, value, doc),
        }
    }

    /// Coerce one form input for `doc`. An undeclared key keeps the kind of
    /// its current value; only a brand-new key is inferred from the input.
    pub fn coerce(&self, key: &str, input: Value, doc: &Document) -> Result<Value, AppError> {
        let shape = doc.get(key).unwrap_or(&input);
        let kind = self
            .kind_for(key, shape, doc)
            .ok_or_else(|| AppError::Validation(format!("Field {} is not editable", key)))?;
        kind.coerce(key, input)
    }

    /// The object-list rows under `field`, created empty when absent.
    pub fn rows_mut<'a>(
        &self,
        doc: &'a mut Document,
        field: &str,
    ) -> Result<&'a mut Vec<Value>, AppError> {
        let not_rows = || AppError::Validation(format!("Field {} is not a list of rows", field));
        let current = doc
            .get(field)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        if self.kind_for(field, &current, doc) != Some(FieldKind::ObjectList) {
            return Err(not_rows());
        }
        match doc.entry(field.to_string()).or_insert(current) {
            Value::Array(rows) => Ok(rows),
            _ => Err(not_rows()),
        }
    }

    /// Form for a document: declared fields in order, then any extra keys
    /// the document carries.
    pub fn render(&self, doc: &Document) -> Vec<FormField> {
        let declared = self.fields.iter().map(|field| {
            let value = doc.get(&field.key).cloned().unwrap_or(Value::Null);
            FormField {
                value: field.kind.display(&value),
                descriptor: field.clone(),
            }
        });

        let extra = doc
            .iter()
            .filter(|(key, _)| self.declared(key).is_none())
            .filter_map(|(key, value)| {
                infer_field_kind(key, value, doc).map(|kind| FormField {
                    value: kind.display(value),
                    descriptor: FieldDescriptor::new(key, kind),
                })
            });

        declared.chain(extra).collect()
    }
}
