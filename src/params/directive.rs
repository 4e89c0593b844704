use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::error::EncodeError;

/// Where an encoded field ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Container {
    #[default]
    Query,
    Json,
    FormData,
    /// Never emitted.
    Excluded,
}

impl Container {
    pub fn as_str(self) -> &'static str {
        match self {
            Container::Query => "query",
            Container::Json => "json",
            Container::FormData => "form-data",
            Container::Excluded => "-",
        }
    }
}

/// Parsed form of one field's tag, e.g. `"query,field=tb,default=1"`.
///
/// Tag grammar, comma separated:
///
/// | Token | Meaning |
/// |---|---|
/// | `-` | the whole tag; field is never emitted |
/// | `query` / `json` / `form-data` | target container (default `query`) |
/// | `field=<name>` | output key, used verbatim |
/// | `default=<value>` | emitted when the field holds its zero value |
/// | `omitempty` | drop the field when it holds its zero value and has no default |
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldDirective {
    pub container: Container,
    pub name: Option<String>,
    pub default: Option<String>,
    pub omit_empty: bool,
}

static UNTAGGED: FieldDirective = FieldDirective {
    container: Container::Query,
    name: None,
    default: None,
    omit_empty: false,
};

impl FieldDirective {
    pub fn parse(field: &str, tag: &str) -> Result<Self, EncodeError> {
        let mut directive = FieldDirective::default();
        if tag.trim() == "-" {
            directive.container = Container::Excluded;
            return Ok(directive);
        }

        for token in tag.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.split_once('=') {
                Some(("field", name)) => directive.name = Some(name.to_string()),
                Some(("default", value)) => directive.default = Some(value.to_string()),
                None if token == "query" => directive.container = Container::Query,
                None if token == "json" => directive.container = Container::Json,
                None if token == "form-data" => directive.container = Container::FormData,
                None if token == "omitempty" => directive.omit_empty = true,
                _ => {
                    return Err(EncodeError::Directive {
                        field: field.to_string(),
                        token: token.to_string(),
                    });
                }
            }
        }
        Ok(directive)
    }

    /// Output key for a field serialized under `field_name`.
    pub fn key(&self, field_name: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => to_snake_case(field_name),
        }
    }
}

/// Single-pass camel-case to snake-case: every uppercase letter after the first character
/// gets a `_` prefix, and all uppercase letters are lowercased. Runs of capitals are not
/// treated specially (`IDsA` becomes `i_ds_a`).
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() * 2);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Directives of one request type, keyed by serialized field name.
#[derive(Debug, Default)]
pub(crate) struct Shape {
    fields: HashMap<&'static str, FieldDirective>,
}

impl Shape {
    pub(crate) fn parse(table: &'static [(&'static str, &'static str)]) -> Result<Self, EncodeError> {
        let mut fields = HashMap::with_capacity(table.len());
        for (field, tag) in table {
            fields.insert(*field, FieldDirective::parse(field, tag)?);
        }
        Ok(Self { fields })
    }

    pub(crate) fn directive(&self, field: &str) -> &FieldDirective {
        self.fields.get(field).unwrap_or(&UNTAGGED)
    }
}

static SHAPES: LazyLock<RwLock<HashMap<TypeId, Arc<Shape>>>> = LazyLock::new(Default::default);

/// Parsed directives for `P`, memoized per type.
///
/// Two threads may parse the same table concurrently; the first insert wins and both get
/// identical shapes.
pub(crate) fn shape_of<P: super::RequestParams + ?Sized + 'static>() -> Result<Arc<Shape>, EncodeError> {
    let id = TypeId::of::<P>();
    if let Some(shape) = SHAPES.read().get(&id) {
        return Ok(Arc::clone(shape));
    }

    let shape = Arc::new(Shape::parse(P::DIRECTIVES)?);
    let mut shapes = SHAPES.write();
    Ok(Arc::clone(shapes.entry(id).or_insert(shape)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_tag() {
        let d = FieldDirective::parse("test_b", "query,field=tb,default=1").unwrap();
        assert_eq!(d.container, Container::Query);
        assert_eq!(d.name.as_deref(), Some("tb"));
        assert_eq!(d.default.as_deref(), Some("1"));
        assert!(!d.omit_empty);
    }

    #[test]
    fn parses_containers_and_flags() {
        assert_eq!(
            FieldDirective::parse("a", "json,omitempty").unwrap(),
            FieldDirective {
                container: Container::Json,
                omit_empty: true,
                ..Default::default()
            }
        );
        assert_eq!(
            FieldDirective::parse("a", "form-data").unwrap().container,
            Container::FormData
        );
        assert_eq!(FieldDirective::parse("a", "-").unwrap().container, Container::Excluded);
        assert_eq!(FieldDirective::parse("a", "").unwrap(), FieldDirective::default());
    }

    #[test]
    fn rejects_unknown_token() {
        let err = FieldDirective::parse("a", "query,omitEmpty").unwrap_err();
        assert_eq!(
            err,
            EncodeError::Directive {
                field: "a".to_string(),
                token: "omitEmpty".to_string(),
            }
        );
        assert!(FieldDirective::parse("a", "query,-").is_err());
    }

    #[test]
    fn snake_case_is_single_pass() {
        assert_eq!(to_snake_case("TestA"), "test_a");
        assert_eq!(to_snake_case("IDsA"), "i_ds_a");
        assert_eq!(to_snake_case("AccessKey"), "access_key");
        assert_eq!(to_snake_case("pageSize"), "page_size");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn key_prefers_explicit_name() {
        let d = FieldDirective::parse("TestB", "field=tb").unwrap();
        assert_eq!(d.key("TestB"), "tb");
        assert_eq!(FieldDirective::default().key("TestB"), "test_b");
    }
}
