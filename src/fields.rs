//! Display fields produced by parsers.
//!
//! A [`RomFields`] is an ordered list of labelled, typed values grouped into
//! named tabs. Parsers append to it once; consumers only read it.

use chrono::NaiveDateTime;

/// Display base for numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Dec,
    Hex,
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Numeric {
        value: u64,
        base: Base,
        /// Minimum digit count when rendering (zero-padded).
        digits: u8,
    },
    DateTime(NaiveDateTime),
    /// Set bits of `value`, labelled by `names` (bit 0 first).
    Bitfield {
        names: &'static [&'static str],
        value: u32,
    },
    /// Rows of columns, e.g. a section table.
    ListData {
        headers: &'static [&'static str],
        rows: Vec<Vec<String>>,
    },
}

impl FieldValue {
    /// Render for plain-text consumers.
    pub fn display(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Numeric {
                value,
                base: Base::Dec,
                digits,
            } => format!("{value:0width$}", width = *digits as usize),
            FieldValue::Numeric {
                value,
                base: Base::Hex,
                digits,
            } => format!("0x{value:0width$X}", width = *digits as usize),
            FieldValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            FieldValue::Bitfield { names, value } => names
                .iter()
                .enumerate()
                .filter(|(i, _)| value & (1 << i) != 0)
                .map(|(_, n)| *n)
                .collect::<Vec<_>>()
                .join(", "),
            FieldValue::ListData { rows, .. } => rows
                .iter()
                .map(|r| r.join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One labelled field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Index into [`RomFields::tabs`].
    pub tab: usize,
    pub value: FieldValue,
}

/// Ordered field list with tabs.
#[derive(Debug, Clone, Default)]
pub struct RomFields {
    tabs: Vec<String>,
    fields: Vec<Field>,
    current_tab: usize,
}

impl RomFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the current tab.
    pub fn set_tab_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self.tabs.get_mut(self.current_tab) {
            Some(t) => *t = name,
            None => {
                self.tabs.resize(self.current_tab, String::new());
                self.tabs.push(name);
            }
        }
    }

    /// Start a new tab; later fields go into it.
    pub fn add_tab(&mut self, name: impl Into<String>) -> usize {
        if self.tabs.is_empty() {
            self.tabs.push(String::new());
        }
        self.tabs.push(name.into());
        self.current_tab = self.tabs.len() - 1;
        self.current_tab
    }

    fn push(&mut self, name: &str, value: FieldValue) {
        self.fields.push(Field {
            name: name.to_owned(),
            tab: self.current_tab,
            value,
        });
    }

    /// Add a string field. Empty strings are skipped.
    pub fn add_string(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.push(name, FieldValue::String(value));
        }
    }

    pub fn add_dec(&mut self, name: &str, value: u64) {
        self.push(
            name,
            FieldValue::Numeric {
                value,
                base: Base::Dec,
                digits: 0,
            },
        );
    }

    pub fn add_hex(&mut self, name: &str, value: u64, digits: u8) {
        self.push(
            name,
            FieldValue::Numeric {
                value,
                base: Base::Hex,
                digits,
            },
        );
    }

    /// Add a date/time field. `None` is skipped.
    pub fn add_datetime(&mut self, name: &str, value: Option<NaiveDateTime>) {
        if let Some(dt) = value {
            self.push(name, FieldValue::DateTime(dt));
        }
    }

    pub fn add_bitfield(&mut self, name: &str, names: &'static [&'static str], value: u32) {
        self.push(name, FieldValue::Bitfield { names, value });
    }

    pub fn add_list(
        &mut self,
        name: &str,
        headers: &'static [&'static str],
        rows: Vec<Vec<String>>,
    ) {
        self.push(name, FieldValue::ListData { headers, rows });
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Tab names; the first tab may be unnamed.
    pub fn tabs(&self) -> &[String] {
        &self.tabs
    }

    /// First field with this label.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Convenience accessor for string fields.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}
