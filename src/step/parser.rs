//! ISO 10303-21 (STEP) exchange file reader
//!
//! Reads the entity instances of a STEP file into generic records, then
//! extracts the handful of kinds needed to reconstruct an assembly: products,
//! points, directions, axis placements and assembly usage occurrences, plus
//! the product-definition and shape-representation entities that link them.
//!
//! References are resolved by id after the whole file has been read, so
//! forward references work. Malformed statements are skipped and dangling
//! references leave the corresponding field unset; parsing never fails.

use glam::DVec3;
use serde::Serialize;
use std::collections::BTreeMap;

/// A parameter of an entity instance
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Ref(u64),
    Number(f64),
    /// Enumeration literal such as `.T.` (stored without dots)
    Enum(String),
    List(Vec<Param>),
    /// Typed value such as `LENGTH_MEASURE(1.0)`
    Typed(String, Vec<Param>),
    /// `$` or `*`
    Omitted,
}

impl Param {
    pub fn as_ref_id(&self) -> Option<u64> {
        match self {
            Param::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Param::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One `#id = ...;` statement
///
/// Simple instances have a single part; complex instances
/// (`#id = ( A(..) B(..) );`) have one part per listed type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: u64,
    pub parts: Vec<(String, Vec<Param>)>,
}

impl EntityRecord {
    /// Type name of a simple instance (first part of a complex one)
    pub fn kind(&self) -> &str {
        self.parts.first().map(|(k, _)| k.as_str()).unwrap_or("")
    }

    /// Parameters of the part with the given type name
    pub fn part(&self, kind: &str) -> Option<&[Param]> {
        self.parts
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, params)| params.as_slice())
    }

    pub fn has_part(&self, kind: &str) -> bool {
        self.parts.iter().any(|(k, _)| k == kind)
    }

    /// Parameters of a simple instance
    pub fn params(&self) -> &[Param] {
        self.parts.first().map(|(_, p)| p.as_slice()).unwrap_or(&[])
    }

    /// Entity references among the top-level parameters, in order
    pub fn refs(&self) -> Vec<u64> {
        self.params().iter().filter_map(Param::as_ref_id).collect()
    }
}

/// A product declared in the file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: u64,
    /// The product's identifier attribute
    pub product_id: String,
    /// Display name (the identifier when the name attribute is empty)
    pub name: String,
}

/// An axis placement with its resolved vectors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementFrame {
    pub id: u64,
    pub location_ref: Option<u64>,
    pub axis_ref: Option<u64>,
    pub ref_direction_ref: Option<u64>,
    pub origin: Option<DVec3>,
    pub z: Option<DVec3>,
    pub x: Option<DVec3>,
}

/// A parent/child assembly link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Usage {
    pub id: u64,
    /// Occurrence identifier attribute
    pub occurrence: String,
    pub parent_product: Option<u64>,
    pub child_product: Option<u64>,
    /// Placement of the child in the parent's frame
    pub placement: Option<u64>,
}

/// Classification of an exchange file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Assembly,
    Part,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Assembly => write!(f, "assembly"),
            FileKind::Part => write!(f, "part"),
        }
    }
}

/// Typed view of an exchange file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Assembly {
    pub products: BTreeMap<u64, Product>,
    pub points: BTreeMap<u64, DVec3>,
    pub directions: BTreeMap<u64, DVec3>,
    pub placements: BTreeMap<u64, PlacementFrame>,
    /// Usage occurrences in entity id order
    pub usages: Vec<Usage>,
    /// Number of entity instances read
    pub entity_count: usize,
}

impl Assembly {
    pub fn kind(&self) -> FileKind {
        if !self.usages.is_empty() || self.products.len() > 1 {
            FileKind::Assembly
        } else {
            FileKind::Part
        }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn product_name(&self, id: u64) -> Option<&str> {
        self.products.get(&id).map(|p| p.name.as_str())
    }
}

/// Parse STEP text into an [`Assembly`]
pub fn parse(text: &str) -> Assembly {
    let records = read_entities(text);
    tracing::debug!("read {} STEP entity instances", records.len());
    build_assembly(&records)
}

/// Read every entity instance statement, keyed by id
pub fn read_entities(text: &str) -> BTreeMap<u64, EntityRecord> {
    let tokens = Lexer::new(text).collect::<Vec<_>>();
    let mut parser = StatementParser { tokens, pos: 0 };
    let mut records = BTreeMap::new();

    while parser.pos < parser.tokens.len() {
        let start = parser.pos;
        match parser.statement() {
            Some(record) => {
                records.insert(record.id, record);
            }
            None => {
                parser.pos = start;
                parser.skip_statement();
            }
        }
    }

    records
}

fn build_assembly(records: &BTreeMap<u64, EntityRecord>) -> Assembly {
    let mut assembly = Assembly {
        entity_count: records.len(),
        ..Default::default()
    };

    for record in records.values() {
        match record.kind() {
            "PRODUCT" => {
                let params = record.params();
                let product_id = params.first().and_then(Param::as_str).unwrap_or("").to_string();
                let name = params
                    .get(1)
                    .and_then(Param::as_str)
                    .filter(|n| !n.trim().is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| product_id.clone());
                assembly.products.insert(
                    record.id,
                    Product {
                        id: record.id,
                        product_id,
                        name,
                    },
                );
            }
            "CARTESIAN_POINT" => {
                if let Some(v) = coordinates(record.params()) {
                    assembly.points.insert(record.id, v);
                }
            }
            "DIRECTION" => {
                if let Some(v) = coordinates(record.params()) {
                    assembly.directions.insert(record.id, v);
                }
            }
            _ => {}
        }
    }

    for record in records.values().filter(|r| r.kind() == "AXIS2_PLACEMENT_3D") {
        let params = record.params();
        let location_ref = params.get(1).and_then(Param::as_ref_id);
        let axis_ref = params.get(2).and_then(Param::as_ref_id);
        let ref_direction_ref = params.get(3).and_then(Param::as_ref_id);
        assembly.placements.insert(
            record.id,
            PlacementFrame {
                id: record.id,
                location_ref,
                axis_ref,
                ref_direction_ref,
                origin: location_ref.and_then(|r| assembly.points.get(&r).copied()),
                z: axis_ref.and_then(|r| assembly.directions.get(&r).copied()),
                x: ref_direction_ref.and_then(|r| assembly.directions.get(&r).copied()),
            },
        );
    }

    let links = Links::index(records);
    for record in records
        .values()
        .filter(|r| r.kind() == "NEXT_ASSEMBLY_USAGE_OCCURRENCE")
    {
        let params = record.params();
        let refs = record.refs();
        assembly.usages.push(Usage {
            id: record.id,
            occurrence: params.first().and_then(Param::as_str).unwrap_or("").to_string(),
            parent_product: refs.first().and_then(|pd| links.product_of(*pd)),
            child_product: refs.get(1).and_then(|pd| links.product_of(*pd)),
            placement: links.usage_placement(record.id),
        });
    }

    assembly
}

/// Up to three numbers from the coordinate list parameter; missing ones are zero
fn coordinates(params: &[Param]) -> Option<DVec3> {
    let list = params.iter().find_map(|p| match p {
        Param::List(items) => Some(items),
        _ => None,
    })?;
    let nums: Vec<f64> = list.iter().filter_map(Param::as_number).collect();
    if nums.is_empty() {
        return None;
    }
    let at = |i: usize| nums.get(i).copied().unwrap_or(0.0);
    Some(DVec3::new(at(0), at(1), at(2)))
}

/// Index over the linkage entities between usages, products and placements
struct Links<'a> {
    records: &'a BTreeMap<u64, EntityRecord>,
    /// PRODUCT_DEFINITION_SHAPE id by the definition it describes
    shape_by_definition: BTreeMap<u64, u64>,
    /// CONTEXT_DEPENDENT_SHAPE_REPRESENTATION relationship by shape id
    relationship_by_shape: BTreeMap<u64, u64>,
}

impl<'a> Links<'a> {
    fn index(records: &'a BTreeMap<u64, EntityRecord>) -> Self {
        let mut shape_by_definition = BTreeMap::new();
        let mut relationship_by_shape = BTreeMap::new();

        for record in records.values() {
            match record.kind() {
                "PRODUCT_DEFINITION_SHAPE" => {
                    if let Some(def) = record.refs().first() {
                        shape_by_definition.entry(*def).or_insert(record.id);
                    }
                }
                "CONTEXT_DEPENDENT_SHAPE_REPRESENTATION" => {
                    let refs = record.refs();
                    if let (Some(rel), Some(shape)) = (refs.first(), refs.get(1)) {
                        relationship_by_shape.entry(*shape).or_insert(*rel);
                    }
                }
                _ => {}
            }
        }

        Self {
            records,
            shape_by_definition,
            relationship_by_shape,
        }
    }

    /// PRODUCT_DEFINITION -> formation -> PRODUCT
    fn product_of(&self, definition: u64) -> Option<u64> {
        let pd = self.records.get(&definition)?;
        if pd.kind() != "PRODUCT_DEFINITION" {
            return None;
        }
        let formation = self.records.get(pd.refs().first()?)?;
        if !formation.kind().starts_with("PRODUCT_DEFINITION_FORMATION") {
            return None;
        }
        let product = *formation.refs().first()?;
        self.records
            .get(&product)
            .filter(|r| r.kind() == "PRODUCT")
            .map(|r| r.id)
    }

    /// Usage -> shape -> context dependent representation -> transformation -> item_2
    fn usage_placement(&self, usage: u64) -> Option<u64> {
        let shape = self.shape_by_definition.get(&usage)?;
        let relationship = self.records.get(self.relationship_by_shape.get(shape)?)?;
        let transform_ref = relationship
            .part("REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION")?
            .iter()
            .find_map(Param::as_ref_id)?;
        let transform = self.records.get(&transform_ref)?;
        if transform.kind() != "ITEM_DEFINED_TRANSFORMATION" {
            return None;
        }
        let item_2 = *transform.refs().get(1)?;
        self.records
            .get(&item_2)
            .filter(|r| r.kind() == "AXIS2_PLACEMENT_3D")
            .map(|r| r.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hash(u64),
    Ident(String),
    Str(String),
    Number(f64),
    Enum(String),
    Omitted,
    LParen,
    RParen,
    Comma,
    Eq,
    Semi,
    Other,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }

    fn take_while(&mut self, first: Option<char>, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        if let Some(c) = first {
            out.push(c);
        }
        while let Some(&c) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn skip_comment(&mut self) {
        let mut prev = '\0';
        for c in self.chars.by_ref() {
            if prev == '*' && c == '/' {
                return;
            }
            prev = c;
        }
    }

    fn string(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.chars.next() {
            if c == '\'' {
                // '' is an escaped quote
                if self.chars.peek() == Some(&'\'') {
                    self.chars.next();
                    out.push('\'');
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn number(&mut self, first: char) -> Token {
        let mut text = String::new();
        text.push(first);
        let mut prev = first;
        while let Some(&c) = self.chars.peek() {
            let exponent_sign = (c == '-' || c == '+') && (prev == 'E' || prev == 'e');
            if c.is_ascii_digit() || c == '.' || c == 'E' || c == 'e' || exponent_sign {
                text.push(c);
                prev = c;
                self.chars.next();
            } else {
                break;
            }
        }
        text.parse().map(Token::Number).unwrap_or(Token::Other)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let c = self.chars.next()?;
            let token = match c {
                c if c.is_whitespace() => continue,
                '/' if self.chars.peek() == Some(&'*') => {
                    self.chars.next();
                    self.skip_comment();
                    continue;
                }
                '#' => {
                    let digits = self.take_while(None, |c| c.is_ascii_digit());
                    digits.parse().map(Token::Hash).unwrap_or(Token::Other)
                }
                '\'' => Token::Str(self.string()),
                '.' if self.chars.peek().map_or(false, |c| c.is_ascii_alphabetic()) => {
                    let name = self.take_while(None, |c| c.is_ascii_alphanumeric() || c == '_');
                    if self.chars.peek() == Some(&'.') {
                        self.chars.next();
                    }
                    Token::Enum(name)
                }
                c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(c),
                c if c.is_ascii_alphabetic() || c == '_' => Token::Ident(
                    self.take_while(Some(c), |c| c.is_ascii_alphanumeric() || c == '_'),
                ),
                '$' | '*' => Token::Omitted,
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                '=' => Token::Eq,
                ';' => Token::Semi,
                _ => Token::Other,
            };
            return Some(token);
        }
    }
}

struct StatementParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl StatementParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> Option<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    /// Advance past the next top-level `;`
    fn skip_statement(&mut self) {
        while let Some(token) = self.bump() {
            if token == Token::Semi {
                return;
            }
        }
    }

    /// `#id = TYPE(params);` or `#id = ( A(params) B(params) );`
    fn statement(&mut self) -> Option<EntityRecord> {
        let id = match self.bump()? {
            Token::Hash(id) => id,
            _ => return None,
        };
        self.eat(&Token::Eq)?;

        let parts = match self.bump()? {
            Token::Ident(kind) => {
                self.eat(&Token::LParen)?;
                vec![(kind, self.param_list()?)]
            }
            Token::LParen => {
                let mut parts = Vec::new();
                while let Some(Token::Ident(kind)) = self.peek().cloned() {
                    self.pos += 1;
                    self.eat(&Token::LParen)?;
                    parts.push((kind, self.param_list()?));
                }
                self.eat(&Token::RParen)?;
                if parts.is_empty() {
                    return None;
                }
                parts
            }
            _ => return None,
        };

        self.eat(&Token::Semi)?;
        Some(EntityRecord { id, parts })
    }

    /// Parameters up to and including the closing parenthesis
    fn param_list(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if self.eat(&Token::RParen).is_some() {
            return Some(params);
        }
        loop {
            params.push(self.param()?);
            match self.bump()? {
                Token::Comma => continue,
                Token::RParen => return Some(params),
                _ => return None,
            }
        }
    }

    fn param(&mut self) -> Option<Param> {
        let param = match self.bump()? {
            Token::Str(s) => Param::Str(s),
            Token::Hash(id) => Param::Ref(id),
            Token::Number(n) => Param::Number(n),
            Token::Enum(e) => Param::Enum(e),
            Token::Omitted => Param::Omitted,
            Token::LParen => Param::List(self.param_list()?),
            Token::Ident(name) => {
                self.eat(&Token::LParen)?;
                Param::Typed(name, self.param_list()?)
            }
            _ => return None,
        };
        Some(param)
    }
}
