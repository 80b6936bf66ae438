//! Vector recipes: compact selectors such as `"mel;mfcc=1-19"`
//!
//! Overall format is `[item];[item];...` where an item is one of
//! - `label` - every row of stream 0
//! - `label=2` - every row of stream 2
//! - `label=1-19` - rows 1..=19 of stream 0
//! - `label=1,4,5` - rows 1, 4 and 5 of stream 0
//! - `label=1:0-9` / `label=1:3,4` / `label=1:7` - the same, from stream 1

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which rows of a stream a selector picks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSelection {
    All,
    /// Inclusive on both ends
    Range { start: usize, stop: usize },
    List(Vec<usize>),
}

impl IndexSelection {
    /// Resolve to concrete row indices for a stream with `vector_length` rows.
    pub fn indices(&self, vector_length: usize) -> Result<Vec<usize>> {
        let indices: Vec<usize> = match self {
            IndexSelection::All => return Ok((0..vector_length).collect()),
            IndexSelection::Range { start, stop } => (*start..=*stop).collect(),
            IndexSelection::List(list) => list.clone(),
        };
        if let Some(bad) = indices.iter().find(|&&idx| idx >= vector_length) {
            return Err(Error::shape(format!(
                "row index {} out of range for vector length {}",
                bad, vector_length
            )));
        }
        Ok(indices)
    }
}

/// One recipe item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub label: String,
    /// Stream id, `None` means the default stream
    #[serde(default)]
    pub stream: Option<usize>,
    #[serde(default = "default_selection")]
    pub selection: IndexSelection,
}

fn default_selection() -> IndexSelection {
    IndexSelection::All
}

impl Selector {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stream: None,
            selection: IndexSelection::All,
        }
    }

    pub fn with_stream(mut self, stream: usize) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_selection(mut self, selection: IndexSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn stream_or(&self, default_stream: usize) -> usize {
        self.stream.unwrap_or(default_stream)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let prefix = match self.stream {
            Some(stream) => format!("{}:", stream),
            None => String::new(),
        };
        match (&self.selection, self.stream) {
            (IndexSelection::All, None) => write!(f, "{}", self.label),
            (IndexSelection::All, Some(stream)) => write!(f, "{}={}", self.label, stream),
            (IndexSelection::Range { start, stop }, _) => {
                write!(f, "{}={}{}-{}", self.label, prefix, start, stop)
            }
            (IndexSelection::List(list), _) if list.len() == 1 => {
                write!(f, "{}={}{}-{}", self.label, prefix, list[0], list[0])
            }
            (IndexSelection::List(list), _) => {
                let joined: Vec<String> = list.iter().map(usize::to_string).collect();
                write!(f, "{}={}{}", self.label, prefix, joined.join(","))
            }
        }
    }
}

/// Ordered selector list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecipeRepr", into = "String")]
pub struct Recipe {
    selectors: Vec<Selector>,
}

impl Recipe {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }

    /// Parse with the default delimiters.
    pub fn parse(recipe: &str) -> Result<Self> {
        RecipeParser::default().parse(recipe)
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.selectors.iter()
    }
}

impl Display for Recipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (idx, selector) in self.selectors.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}

impl FromStr for Recipe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Recipe::parse(s)
    }
}

impl From<Recipe> for String {
    fn from(recipe: Recipe) -> Self {
        recipe.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeRepr {
    Text(String),
    Parsed(Vec<Selector>),
}

impl TryFrom<RecipeRepr> for Recipe {
    type Error = Error;

    fn try_from(repr: RecipeRepr) -> Result<Self> {
        match repr {
            RecipeRepr::Text(text) => Recipe::parse(&text),
            RecipeRepr::Parsed(selectors) => Ok(Recipe::new(selectors)),
        }
    }
}

/// Accepts either raw recipe text or an already parsed [`Recipe`].
pub trait IntoRecipe {
    fn into_recipe(self) -> Result<Recipe>;
}

impl IntoRecipe for Recipe {
    fn into_recipe(self) -> Result<Recipe> {
        Ok(self)
    }
}

impl IntoRecipe for &Recipe {
    fn into_recipe(self) -> Result<Recipe> {
        Ok(self.clone())
    }
}

impl IntoRecipe for &str {
    fn into_recipe(self) -> Result<Recipe> {
        Recipe::parse(self)
    }
}

impl IntoRecipe for String {
    fn into_recipe(self) -> Result<Recipe> {
        Recipe::parse(&self)
    }
}

/// Delimiter set used by [`RecipeParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub block: char,
    pub detail: char,
    pub dimension: char,
    pub segment: char,
    pub vector: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            block: ';',
            detail: '=',
            dimension: ':',
            segment: '-',
            vector: ',',
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecipeParser {
    delimiters: Delimiters,
}

impl RecipeParser {
    pub fn with_delimiters(delimiters: Delimiters) -> Self {
        Self { delimiters }
    }

    pub fn parse(&self, recipe: &str) -> Result<Recipe> {
        let selectors = recipe
            .split(self.delimiters.block)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| self.parse_item(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Recipe::new(selectors))
    }

    fn parse_item(&self, item: &str) -> Result<Selector> {
        let mut parts = item.split(self.delimiters.detail);
        let label = parts.next().unwrap_or_default().trim();
        if label.is_empty() {
            return Err(invalid(item, item, "missing label"));
        }
        let detail = match parts.next() {
            Some(detail) => detail.trim(),
            None => return Ok(Selector::new(label)),
        };
        if parts.next().is_some() {
            return Err(invalid(item, item, "more than one detail delimiter"));
        }
        if detail.is_empty() {
            return Err(invalid(item, detail, "empty index specification"));
        }

        let (stream, index_spec) = match detail.split_once(self.delimiters.dimension) {
            Some((stream, rest)) => (Some(parse_index(item, stream)?), rest.trim()),
            None => (None, detail),
        };
        if index_spec.is_empty() {
            return Err(invalid(item, detail, "empty index specification"));
        }

        let selection = if let Some((start, stop)) = index_spec.split_once(self.delimiters.segment)
        {
            let start = parse_index(item, start)?;
            let stop = parse_index(item, stop)?;
            if stop < start {
                return Err(invalid(item, index_spec, "descending range"));
            }
            IndexSelection::Range { start, stop }
        } else if index_spec.contains(self.delimiters.vector) {
            let list = index_spec
                .split(self.delimiters.vector)
                .map(|token| parse_index(item, token))
                .collect::<Result<Vec<_>>>()?;
            IndexSelection::List(list)
        } else {
            let value = parse_index(item, index_spec)?;
            return Ok(match stream {
                // A bare number names the stream.
                None => Selector::new(label).with_stream(value),
                Some(stream) => Selector::new(label)
                    .with_stream(stream)
                    .with_selection(IndexSelection::Range {
                        start: value,
                        stop: value,
                    }),
            });
        };

        Ok(Selector {
            label: label.to_string(),
            stream,
            selection,
        })
    }
}

fn parse_index(item: &str, token: &str) -> Result<usize> {
    let token = token.trim();
    token
        .parse::<usize>()
        .map_err(|_| invalid(item, token, "expected a non-negative integer"))
}

fn invalid(item: &str, token: &str, reason: &str) -> Error {
    Error::config(format!(
        "invalid recipe token '{}' in item '{}': {}",
        token, item, reason
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_label() {
        let recipe = Recipe::parse("mel").unwrap();
        assert_eq!(recipe.len(), 1);
        assert_eq!(recipe.selectors()[0], Selector::new("mel"));
    }

    #[test]
    fn bare_number_selects_stream() {
        let recipe = Recipe::parse("mel=0;mfcc=1").unwrap();
        assert_eq!(recipe.selectors()[0].stream, Some(0));
        assert_eq!(recipe.selectors()[1].stream, Some(1));
        assert_eq!(recipe.selectors()[1].selection, IndexSelection::All);
    }

    #[test]
    fn parses_inclusive_range() {
        let recipe = Recipe::parse("mel=1-20").unwrap();
        let selector = &recipe.selectors()[0];
        assert_eq!(selector.stream, None);
        assert_eq!(
            selector.selection,
            IndexSelection::Range { start: 1, stop: 20 }
        );
        assert_eq!(selector.selection.indices(40).unwrap().len(), 20);
    }

    #[test]
    fn parses_discrete_list() {
        let recipe = Recipe::parse("mel=1,2,4,5").unwrap();
        assert_eq!(
            recipe.selectors()[0].selection,
            IndexSelection::List(vec![1, 2, 4, 5])
        );
    }

    #[test]
    fn parses_stream_and_range() {
        let recipe = Recipe::parse("mel=1:1-20").unwrap();
        let selector = &recipe.selectors()[0];
        assert_eq!(selector.stream, Some(1));
        assert_eq!(
            selector.selection,
            IndexSelection::Range { start: 1, stop: 20 }
        );
    }

    #[test]
    fn ignores_whitespace_and_empty_items() {
        let spaced = Recipe::parse(" mel ; mfcc = 1 : 2 - 4 ;").unwrap();
        let compact = Recipe::parse("mel;mfcc=1:2-4").unwrap();
        assert_eq!(spaced, compact);
    }

    #[test]
    fn empty_string_yields_empty_recipe() {
        assert!(Recipe::parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_tokens() {
        let err = Recipe::parse("mel=a-3").unwrap_err().to_string();
        assert!(err.contains("'a'"), "{}", err);
        let err = Recipe::parse("mel=9-3").unwrap_err().to_string();
        assert!(err.contains("descending"), "{}", err);
        assert!(Recipe::parse("=1").is_err());
        assert!(Recipe::parse("mel=1:").is_err());
    }

    #[test]
    fn text_round_trip_preserves_structure() {
        for text in [
            "mel",
            "mel;mfcc=1-19",
            "mel=2",
            "mel=1:3,4,9;zcr",
            "mfcc=0:7",
            "a=1-1;b=2:0-0",
        ] {
            let parsed = Recipe::parse(text).unwrap();
            let reparsed = Recipe::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "round trip of {}", text);
        }
    }

    #[test]
    fn serde_accepts_text_or_parsed_form() {
        let from_text: Recipe = serde_json::from_str("\"mel;mfcc=1-19\"").unwrap();
        let parsed_json = serde_json::json!([
            {"label": "mel"},
            {"label": "mfcc", "selection": {"range": {"start": 1, "stop": 19}}}
        ]);
        let from_parsed: Recipe = serde_json::from_value(parsed_json).unwrap();
        assert_eq!(from_text, from_parsed);
        assert_eq!(
            serde_json::to_string(&from_text).unwrap(),
            "\"mel;mfcc=1-19\""
        );
    }

    #[test]
    fn already_parsed_recipe_passes_through() {
        let recipe = Recipe::parse("mel;mfcc=1-19").unwrap();
        assert_eq!((&recipe).into_recipe().unwrap(), recipe);
        assert_eq!("mel;mfcc=1-19".into_recipe().unwrap(), recipe);
    }

    #[test]
    fn custom_delimiters() {
        let parser = RecipeParser::with_delimiters(Delimiters {
            block: '|',
            ..Delimiters::default()
        });
        let recipe = parser.parse("mel|mfcc=0-3").unwrap();
        assert_eq!(recipe.len(), 2);
    }
}
