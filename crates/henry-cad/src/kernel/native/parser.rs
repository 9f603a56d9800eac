//! Entity table parser for STEP physical files.
//!
//! Produces a flat map from instance name to entity record; references stay
//! unresolved until the topology walk asks for them.

use std::collections::BTreeMap;

use glam::DVec3;

use super::lexer::{Lexer, SpannedToken, Token};
use crate::kernel::{CadError, CadResult, EntityId};

/// Deepest nesting of lists and typed parameters accepted
const MAX_NESTING: usize = 64;

/// An attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Derived,
    Integer(i64),
    Real(f64),
    String(String),
    Enumeration(String),
    Binary(String),
    Ref(u64),
    List(Vec<Param>),
    /// Typed parameter such as `LENGTH_MEASURE(1.E-03)`
    Typed(String, Box<Param>),
}

impl Param {
    /// Strip any type wrapper
    pub fn untyped(&self) -> &Param {
        match self {
            Param::Typed(_, inner) => inner.untyped(),
            other => other,
        }
    }

    pub fn as_entity(&self) -> Option<EntityId> {
        match self.untyped() {
            Param::Ref(id) => Some(EntityId(*id)),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self.untyped() {
            Param::Real(value) => Some(*value),
            Param::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Param]> {
        match self.untyped() {
            Param::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.untyped() {
            Param::Enumeration(value) if value == "T" => Some(true),
            Param::Enumeration(value) if value == "F" => Some(false),
            _ => None,
        }
    }

    /// Three reals as a vector; 2-D coordinates get z = 0
    pub fn as_vec3(&self) -> Option<DVec3> {
        let coords = self
            .as_list()?
            .iter()
            .map(Param::as_real)
            .collect::<Option<Vec<f64>>>()?;
        match coords.as_slice() {
            [x, y] => Some(DVec3::new(*x, *y, 0.0)),
            [x, y, z, ..] => Some(DVec3::new(*x, *y, *z)),
            _ => None,
        }
    }

    /// References in a list attribute, ignoring anything else
    pub fn refs(&self) -> Vec<EntityId> {
        self.as_list()
            .map(|items| items.iter().filter_map(Param::as_entity).collect())
            .unwrap_or_default()
    }

    /// Every reference in this parameter, nested lists included
    pub fn collect_refs(&self, out: &mut Vec<EntityId>) {
        match self {
            Param::Ref(id) => out.push(EntityId(*id)),
            Param::List(items) => items.iter().for_each(|item| item.collect_refs(out)),
            Param::Typed(_, inner) => inner.collect_refs(out),
            _ => {}
        }
    }
}

/// One `KEYWORD(params)` record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub params: Vec<Param>,
}

impl Record {
    pub fn param(&self, index: usize) -> Option<&Param> {
        self.params.get(index)
    }
}

/// An entity instance, either a simple record or a complex (multi-record) one.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    Simple(Record),
    Complex(Vec<Record>),
}

impl Instance {
    /// The record with the given entity name, if this instance has one
    pub fn record(&self, name: &str) -> Option<&Record> {
        match self {
            Instance::Simple(record) if record.name == name => Some(record),
            Instance::Simple(_) => None,
            Instance::Complex(records) => records.iter().find(|r| r.name == name),
        }
    }

    /// The entity name used for dispatch (the first record of a complex instance)
    pub fn name(&self) -> &str {
        match self {
            Instance::Simple(record) => &record.name,
            Instance::Complex(records) => records.first().map(|r| r.name.as_str()).unwrap_or(""),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.record(name).is_some()
    }

    pub fn records(&self) -> &[Record] {
        match self {
            Instance::Simple(record) => std::slice::from_ref(record),
            Instance::Complex(records) => records,
        }
    }
}

/// A parsed STEP physical file.
#[derive(Debug, Clone, Default)]
pub struct StepFile {
    /// Schema names from the FILE_SCHEMA header entity
    pub schemas: Vec<String>,
    /// Instances of all DATA sections, keyed by instance name
    pub instances: BTreeMap<u64, Instance>,
}

impl StepFile {
    /// Parse a complete exchange structure
    pub fn parse(input: &str) -> CadResult<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
        .parse_file()
    }

    pub fn get(&self, id: EntityId) -> CadResult<&Instance> {
        self.instances.get(&id.0).ok_or(CadError::MissingEntity(id))
    }
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn parse_file(&mut self) -> CadResult<StepFile> {
        self.expect_keyword("ISO-10303-21")?;
        self.expect(Token::Semicolon)?;

        let mut file = StepFile::default();
        self.expect_keyword("HEADER")?;
        self.expect(Token::Semicolon)?;
        while !self.at_keyword("ENDSEC") {
            let record = self.parse_record()?;
            self.expect(Token::Semicolon)?;
            if record.name == "FILE_SCHEMA" {
                file.schemas = record
                    .params
                    .first()
                    .and_then(Param::as_list)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|p| match p {
                                Param::String(s) => Some(s.clone()),
                                _ => None,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
            }
        }
        self.expect_keyword("ENDSEC")?;
        self.expect(Token::Semicolon)?;

        while self.at_keyword("DATA") {
            self.pos += 1;
            // Edition 3 allows DATA('name', ('schema'));
            if self.peek() == Some(&Token::LParen) {
                self.parse_param_list()?;
            }
            self.expect(Token::Semicolon)?;

            while !self.at_keyword("ENDSEC") {
                let (id, instance) = self.parse_instance()?;
                if file.instances.insert(id, instance).is_some() {
                    return Err(self.error(format!("duplicate instance #{}", id)));
                }
            }
            self.expect_keyword("ENDSEC")?;
            self.expect(Token::Semicolon)?;
        }

        self.expect_keyword("END-ISO-10303-21")?;
        self.expect(Token::Semicolon)?;
        Ok(file)
    }

    fn parse_instance(&mut self) -> CadResult<(u64, Instance)> {
        let id = match self.next() {
            Some(Token::InstanceName(id)) => id,
            other => return Err(self.unexpected("instance name", other)),
        };
        self.expect(Token::Equals)?;

        let instance = if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let mut records = Vec::new();
            while self.peek() != Some(&Token::RParen) {
                records.push(self.parse_record()?);
            }
            self.expect(Token::RParen)?;
            Instance::Complex(records)
        } else {
            Instance::Simple(self.parse_record()?)
        };
        self.expect(Token::Semicolon)?;
        Ok((id, instance))
    }

    fn parse_record(&mut self) -> CadResult<Record> {
        let name = match self.next() {
            Some(Token::Keyword(name)) => name,
            other => return Err(self.unexpected("entity keyword", other)),
        };
        let params = self.parse_param_list()?;
        Ok(Record { name, params })
    }

    fn parse_param_list(&mut self) -> CadResult<Vec<Param>> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(params);
        }
        loop {
            params.push(self.parse_param()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(params),
                other => return Err(self.unexpected("',' or ')'", other)),
            }
        }
    }

    fn parse_param(&mut self) -> CadResult<Param> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("parameters nested deeper than {}", MAX_NESTING)));
        }
        self.depth += 1;
        let param = self.parse_value();
        self.depth -= 1;
        param
    }

    fn parse_value(&mut self) -> CadResult<Param> {
        if self.peek() == Some(&Token::LParen) {
            return Ok(Param::List(self.parse_param_list()?));
        }
        let param = match self.next() {
            Some(Token::Dollar) => Param::Null,
            Some(Token::Star) => Param::Derived,
            Some(Token::Integer(v)) => Param::Integer(v),
            Some(Token::Real(v)) => Param::Real(v),
            Some(Token::String(s)) => Param::String(s),
            Some(Token::Enumeration(e)) => Param::Enumeration(e),
            Some(Token::Binary(b)) => Param::Binary(b),
            Some(Token::InstanceName(id)) => Param::Ref(id),
            Some(Token::Keyword(name)) => {
                self.expect(Token::LParen)?;
                let inner = self.parse_param()?;
                self.expect(Token::RParen)?;
                Param::Typed(name, Box::new(inner))
            }
            other => return Err(self.unexpected("parameter", other)),
        };
        Ok(param)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Keyword(k)) if k == keyword)
    }

    fn expect_keyword(&mut self, keyword: &str) -> CadResult<()> {
        match self.next() {
            Some(Token::Keyword(k)) if k == keyword => Ok(()),
            other => Err(self.unexpected(keyword, other)),
        }
    }

    fn expect(&mut self, expected: Token) -> CadResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(self.unexpected(&format!("{:?}", expected), other)),
        }
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn unexpected(&self, expected: &str, found: Option<Token>) -> CadError {
        match found {
            Some(token) => self.error(format!("expected {}, found {:?}", expected, token)),
            None => self.error(format!("expected {}, found end of file", expected)),
        }
    }

    fn error(&self, message: String) -> CadError {
        CadError::InvalidFormat(format!("line {}: {}", self.current_line(), message))
    }
}
