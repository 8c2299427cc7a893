//! Wire-document access.
//!
//! Remote manifests, indexes and descriptors are loosely-typed TOML trees.
//! [`Document`] and [`Section`] wrap them in a typed accessor layer that
//! returns an explicit error naming the offending key for every missing or
//! mistyped field — a field is either present with the right type, absent,
//! or an error; it never silently defaults to a wrong type.

pub mod loader;

use crate::error::{Result, UpdateError};

/// A parsed wire document with a name for error context.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    root: toml::Table,
}

impl Document {
    /// Parses TOML bytes. `name` (usually the source URL) prefixes every
    /// error this document later produces.
    pub fn parse(name: &str, data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| UpdateError::Malformed(format!("{name}: not valid UTF-8")))?;
        let root: toml::Table = text
            .parse()
            .map_err(|e| UpdateError::Malformed(format!("{name}: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            root,
        })
    }

    /// The top-level section of this document.
    pub fn root(&self) -> Section<'_> {
        Section {
            doc: &self.name,
            path: "",
            table: &self.root,
        }
    }
}

/// A typed view over one table of a document.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    doc: &'a str,
    path: &'a str,
    table: &'a toml::Table,
}

impl<'a> Section<'a> {
    /// A view over a table found inside one of this section's array values.
    pub fn element(&self, table: &'a toml::Table) -> Section<'a> {
        Section {
            doc: self.doc,
            path: self.path,
            table,
        }
    }

    fn locate(&self, key: &str) -> String {
        if self.path.is_empty() {
            format!("{}: `{}`", self.doc, key)
        } else {
            format!("{}: `{}.{}`", self.doc, self.path, key)
        }
    }

    fn missing(&self, key: &str) -> UpdateError {
        UpdateError::Malformed(format!("{} is missing", self.locate(key)))
    }

    fn mistyped(&self, key: &str, expected: &str) -> UpdateError {
        UpdateError::Malformed(format!("{} is not {expected}", self.locate(key)))
    }

    /// A required string field.
    pub fn str(&self, key: &str) -> Result<&'a str> {
        self.opt_str(key)?.ok_or_else(|| self.missing(key))
    }

    /// An optional string field.
    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.mistyped(key, "a string")),
        }
    }

    /// A required integer field.
    pub fn int(&self, key: &str) -> Result<i64> {
        match self.table.get(key) {
            None => Err(self.missing(key)),
            Some(toml::Value::Integer(v)) => Ok(*v),
            Some(_) => Err(self.mistyped(key, "an integer")),
        }
    }

    /// An optional boolean field with a default for absence.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.table.get(key) {
            None => Ok(default),
            Some(toml::Value::Boolean(v)) => Ok(*v),
            Some(_) => Err(self.mistyped(key, "a boolean")),
        }
    }

    /// A required sub-table.
    pub fn table(&self, key: &'a str) -> Result<Section<'a>> {
        self.opt_table(key)?.ok_or_else(|| self.missing(key))
    }

    /// An optional sub-table.
    pub fn opt_table(&self, key: &'a str) -> Result<Option<Section<'a>>> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Table(t)) => Ok(Some(Section {
                doc: self.doc,
                path: key,
                table: t,
            })),
            Some(_) => Err(self.mistyped(key, "a table")),
        }
    }

    /// An array of tables; absence reads as empty.
    pub fn tables(&self, key: &'a str) -> Result<Vec<Section<'a>>> {
        match self.table.get(key) {
            None => Ok(Vec::new()),
            Some(toml::Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    toml::Value::Table(t) => Ok(Section {
                        doc: self.doc,
                        path: key,
                        table: t,
                    }),
                    _ => Err(self.mistyped(key, "an array of tables")),
                })
                .collect(),
            Some(_) => Err(self.mistyped(key, "an array of tables")),
        }
    }

    /// Raw values of an array field; absence reads as empty.
    pub fn values(&self, key: &str) -> Result<&'a [toml::Value]> {
        match self.table.get(key) {
            None => Ok(&[]),
            Some(toml::Value::Array(values)) => Ok(values),
            Some(_) => Err(self.mistyped(key, "an array")),
        }
    }

    /// A field holding either one string or an array of strings.
    pub fn str_or_array(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(toml::Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    toml::Value::String(s) => Ok(s.clone()),
                    _ => Err(self.mistyped(key, "a string or array of strings")),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(_) => Err(self.mistyped(key, "a string or array of strings")),
        }
    }

    /// Table-valued entries of this section, in document order. Entries of
    /// other types are skipped, matching how group/metafile declaration
    /// tables have always been read.
    pub fn subtables(&self) -> Vec<(&'a str, Section<'a>)> {
        self.table
            .iter()
            .filter_map(|(key, value)| match value {
                toml::Value::Table(t) => Some((
                    key.as_str(),
                    Section {
                        doc: self.doc,
                        path: key,
                        table: t,
                    },
                )),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::parse("test.toml", text.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_rejects_invalid_toml() {
        assert!(Document::parse("x", b"not = = toml").is_err());
        assert!(Document::parse("x", &[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_required_str() {
        let d = doc(r#"name = "pack""#);
        assert_eq!(d.root().str("name").unwrap(), "pack");
        let err = d.root().str("missing").unwrap_err();
        assert!(err.to_string().contains("`missing`"));
    }

    #[test]
    fn test_mistyped_field_errors_instead_of_defaulting() {
        let d = doc("name = 42");
        let err = d.root().str("name").unwrap_err();
        assert!(err.to_string().contains("not a string"));
        assert!(d.root().opt_str("name").is_err());
    }

    #[test]
    fn test_bool_or_default_only_for_absence() {
        let d = doc("flag = true");
        assert!(d.root().bool_or("flag", false).unwrap());
        assert!(!d.root().bool_or("other", false).unwrap());
        let d = doc(r#"flag = "yes""#);
        assert!(d.root().bool_or("flag", false).is_err());
    }

    #[test]
    fn test_nested_table_and_error_path() {
        let d = doc("[index]\nfile = \"index.toml\"");
        let section = d.root().table("index").unwrap();
        assert_eq!(section.str("file").unwrap(), "index.toml");
        let err = section.str("hash").unwrap_err();
        assert!(err.to_string().contains("`index.hash`"));
    }

    #[test]
    fn test_array_of_tables() {
        let d = doc("[[files]]\nfile = \"a\"\n[[files]]\nfile = \"b\"");
        let files = d.root().tables("files").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].str("file").unwrap(), "b");
        assert!(doc("x = 1").root().tables("files").unwrap().is_empty());
    }

    #[test]
    fn test_str_or_array() {
        let d = doc(r#"flavors = "a""#);
        assert_eq!(
            d.root().str_or_array("flavors").unwrap(),
            Some(vec!["a".to_string()])
        );
        let d = doc(r#"flavors = ["a", "b"]"#);
        assert_eq!(
            d.root().str_or_array("flavors").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(doc("x = 1").root().str_or_array("flavors").unwrap(), None);
        assert!(doc("flavors = [1]").root().str_or_array("flavors").is_err());
    }

    #[test]
    fn test_subtables_skip_non_tables() {
        let d = doc("note = \"x\"\n[alpha]\nname = \"A\"\n[beta]\nname = \"B\"");
        let subs = d.root().subtables();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].0, "alpha");
        assert_eq!(subs[1].1.str("name").unwrap(), "B");
    }
}
