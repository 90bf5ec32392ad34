//! Tabular dataset loading
//!
//! Supports ARFF (`@relation` / `@attribute` / `@data`) and CSV with a
//! header row. The last column is always the class label.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

/// Attribute type
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    Numeric,
    /// Nominal attribute with its values in declaration order
    Nominal(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, AttributeKind::Numeric)
    }

    /// Values of a nominal attribute (empty for numeric ones)
    pub fn values(&self) -> &[String] {
        match &self.kind {
            AttributeKind::Nominal(values) => values,
            AttributeKind::Numeric => &[],
        }
    }
}

/// A single cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Numeric(f64),
    /// Index into the attribute's nominal values
    Nominal(usize),
    Missing,
}

/// Loaded dataset with the class as the last attribute
#[derive(Debug, Clone)]
pub struct Dataset {
    pub relation: String,
    pub attributes: Vec<Attribute>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Load a dataset, choosing the format from the file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        let relation = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("arff") => Self::parse_arff(&content),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::parse_csv(&relation, &content),
            other => bail!(
                "Unsupported dataset format '{}' (expected .arff or .csv)",
                other.unwrap_or("")
            ),
        };
        parsed.with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    /// Index of the class attribute
    pub fn class_index(&self) -> usize {
        self.attributes.len().saturating_sub(1)
    }

    pub fn class_attribute(&self) -> &Attribute {
        &self.attributes[self.class_index()]
    }

    pub fn num_classes(&self) -> usize {
        self.class_attribute().values().len()
    }

    /// Class of a row, or `None` when the label is missing
    pub fn class_of(&self, row: &[Value]) -> Option<usize> {
        match row.get(self.class_index()) {
            Some(Value::Nominal(c)) => Some(*c),
            _ => None,
        }
    }

    /// Rows re-encoded against another header with the same attribute names.
    ///
    /// Nominal values are matched by label, so a CSV file whose values
    /// appear in a different order still lines up. Cells that cannot be
    /// expressed in the other header become [`Value::Missing`].
    pub fn rows_for(&self, attributes: &[Attribute]) -> Result<Vec<Vec<Value>>> {
        if self.attributes.len() != attributes.len() {
            bail!(
                "expected {} attributes, found {}",
                attributes.len(),
                self.attributes.len()
            );
        }
        for (ours, theirs) in self.attributes.iter().zip(attributes) {
            if ours.name != theirs.name {
                bail!("attribute '{}' does not match '{}'", ours.name, theirs.name);
            }
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.attributes.iter().zip(attributes))
                    .map(|(value, (ours, theirs))| conform(*value, ours, theirs))
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    fn check(self) -> Result<Self> {
        if self.attributes.len() < 2 {
            bail!("dataset needs at least one feature and a class attribute");
        }
        if self.class_attribute().is_numeric() {
            bail!(
                "class attribute '{}' must be nominal",
                self.class_attribute().name
            );
        }
        if self.rows.is_empty() {
            bail!("dataset has no instances");
        }
        Ok(self)
    }

    /// Parse ARFF text
    pub fn parse_arff(content: &str) -> Result<Self> {
        let mut relation = String::new();
        let mut attributes = Vec::new();
        let mut rows = Vec::new();
        let mut in_data = false;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            let at = |msg: String| anyhow!("line {}: {}", lineno + 1, msg);

            if in_data {
                if line.starts_with('{') {
                    return Err(at("sparse ARFF data is not supported".into()));
                }
                let cells = split_row(line);
                rows.push(parse_row(&attributes, &cells).map_err(|e| at(e.to_string()))?);
                continue;
            }

            let lower = line.to_ascii_lowercase();
            if lower.starts_with("@relation") {
                relation = unquote(line["@relation".len()..].trim()).to_string();
            } else if lower.starts_with("@attribute") {
                let rest = line["@attribute".len()..].trim();
                attributes.push(parse_attribute(rest).map_err(|e| at(e.to_string()))?);
            } else if lower.starts_with("@data") {
                in_data = true;
            } else {
                return Err(at(format!("unexpected header line '{}'", line)));
            }
        }

        if !in_data {
            bail!("missing @data section");
        }

        Self {
            relation,
            attributes,
            rows,
        }
        .check()
    }

    /// Parse CSV text with a header row.
    ///
    /// Feature columns whose values all parse as numbers are numeric; the
    /// rest (and always the class column) are nominal, with values in order
    /// of first appearance.
    pub fn parse_csv(relation: &str, content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate();

        let (_, header) = lines.next().ok_or_else(|| anyhow!("empty CSV file"))?;
        let names: Vec<String> = split_row(header);

        let mut cells: Vec<Vec<String>> = Vec::new();
        for (i, line) in lines {
            let row = split_row(line);
            if row.len() != names.len() {
                bail!(
                    "row {}: expected {} columns, found {}",
                    i + 1,
                    names.len(),
                    row.len()
                );
            }
            cells.push(row);
        }

        let class_col = names.len().saturating_sub(1);
        let attributes: Vec<Attribute> = names
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let column = cells.iter().map(|r| r[col].as_str()).filter(|v| *v != "?");
                let numeric = col != class_col && column.clone().all(|v| v.parse::<f64>().is_ok());
                let kind = if numeric {
                    AttributeKind::Numeric
                } else {
                    let mut values: Vec<String> = Vec::new();
                    for v in column {
                        if !values.iter().any(|seen| seen == v) {
                            values.push(v.to_string());
                        }
                    }
                    AttributeKind::Nominal(values)
                };
                Attribute {
                    name: name.clone(),
                    kind,
                }
            })
            .collect();

        let rows = cells
            .iter()
            .enumerate()
            .map(|(i, r)| parse_row(&attributes, r).with_context(|| format!("row {}", i + 1)))
            .collect::<Result<Vec<_>>>()?;

        Self {
            relation: relation.to_string(),
            attributes,
            rows,
        }
        .check()
    }
}

/// Express a cell of attribute `ours` in terms of attribute `theirs`
fn conform(value: Value, ours: &Attribute, theirs: &Attribute) -> Value {
    let label = match value {
        Value::Missing => return Value::Missing,
        Value::Numeric(v) if theirs.is_numeric() => return Value::Numeric(v),
        Value::Numeric(v) => v.to_string(),
        Value::Nominal(i) => match ours.values().get(i) {
            Some(label) => label.clone(),
            None => return Value::Missing,
        },
    };

    if theirs.is_numeric() {
        label.parse().map_or(Value::Missing, Value::Numeric)
    } else {
        theirs
            .values()
            .iter()
            .position(|v| *v == label)
            .map_or(Value::Missing, Value::Nominal)
    }
}

fn parse_attribute(decl: &str) -> Result<Attribute> {
    let (name, rest) = take_name(decl)?;
    let rest = rest.trim();

    let kind = if rest.starts_with('{') {
        let inner = rest
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .ok_or_else(|| anyhow!("unterminated nominal specification for '{}'", name))?;
        let values: Vec<String> = split_row(inner)
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            bail!("nominal attribute '{}' has no values", name);
        }
        AttributeKind::Nominal(values)
    } else {
        match rest.to_ascii_lowercase().as_str() {
            "numeric" | "real" | "integer" => AttributeKind::Numeric,
            other => bail!("attribute '{}' has unsupported type '{}'", name, other),
        }
    };

    Ok(Attribute { name, kind })
}

/// Split an attribute name (possibly quoted) from the rest of the line
fn take_name(decl: &str) -> Result<(String, &str)> {
    let mut chars = decl.char_indices();
    match chars.next() {
        Some((_, q @ ('\'' | '"'))) => {
            let end = decl[1..]
                .find(q)
                .ok_or_else(|| anyhow!("unterminated quoted attribute name"))?;
            Ok((decl[1..end + 1].to_string(), &decl[end + 2..]))
        }
        Some(_) => {
            let end = decl.find(char::is_whitespace).unwrap_or(decl.len());
            Ok((decl[..end].to_string(), &decl[end..]))
        }
        None => bail!("attribute declaration without a name"),
    }
}

fn parse_row(attributes: &[Attribute], cells: &[String]) -> Result<Vec<Value>> {
    if cells.len() != attributes.len() {
        bail!(
            "expected {} values, found {}",
            attributes.len(),
            cells.len()
        );
    }

    attributes
        .iter()
        .zip(cells)
        .map(|(attr, cell)| {
            if cell == "?" {
                return Ok(Value::Missing);
            }
            match &attr.kind {
                AttributeKind::Numeric => cell
                    .parse::<f64>()
                    .map(Value::Numeric)
                    .map_err(|_| anyhow!("'{}' is not numeric for '{}'", cell, attr.name)),
                AttributeKind::Nominal(values) => values
                    .iter()
                    .position(|v| v == cell)
                    .map(Value::Nominal)
                    .ok_or_else(|| {
                        anyhow!("'{}' is not a declared value of '{}'", cell, attr.name)
                    }),
            }
        })
        .collect()
}

/// Split a comma-separated line, honouring single and double quotes
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"')
}

#[cfg(test)]
pub(crate) const WEATHER_ARFF: &str = "\
% Classic weather data
@relation weather

@attribute outlook {sunny, overcast, rainy}
@attribute temperature numeric
@attribute humidity numeric
@attribute windy {TRUE, FALSE}
@attribute play {yes, no}

@data
sunny,85,85,FALSE,no
sunny,80,90,TRUE,no
overcast,83,86,FALSE,yes
rainy,70,96,FALSE,yes
rainy,68,80,FALSE,yes
rainy,65,70,TRUE,no
overcast,64,65,TRUE,yes
sunny,72,95,FALSE,no
sunny,69,70,FALSE,yes
rainy,75,80,FALSE,yes
sunny,75,70,TRUE,yes
overcast,72,90,TRUE,yes
overcast,81,75,FALSE,yes
rainy,71,91,TRUE,no
";

/// Two well separated numeric groups
#[cfg(test)]
pub(crate) const SCORES_CSV: &str = "\
score,grade
1,fail
2,fail
3,fail
8,pass
9,pass
10,pass
";
