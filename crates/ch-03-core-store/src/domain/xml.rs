//! XML document codec
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <lst>
//!   <str name="theme">dark</str>
//!   <int name="font_size">14</int>
//!   <float name="ratio">0.5</float>
//!   <bool name="notify">true</bool>
//!   <arr name="tags">
//!     <str>a</str>
//!   </arr>
//!   <lst name="window">
//!     <int name="width">800</int>
//!   </lst>
//! </lst>
//! ```
//!
//! Floats are written in their shortest round-trip form, so `NaN`, `inf`
//! and `-inf` load back as they were saved. Empty strings are written as
//! `<str/>` and string content is never trimmed.

use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use shared_types::{NamedList, Value};

use crate::error::{StoreError, StoreResult};

const LIST: &str = "lst";
const ARRAY: &str = "arr";
const NAME_ATTR: &str = "name";

fn document_error(path: &str, message: impl fmt::Display) -> StoreError {
    StoreError::Document {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// Serialize `doc` to its persisted XML form. `path` is error context.
pub fn encode_document(path: &str, doc: &NamedList) -> StoreResult<Vec<u8>> {
    let mut out = DocWriter {
        path,
        inner: Writer::new_with_indent(Vec::new(), b' ', 2),
    };
    out.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.list(None, doc)?;
    let mut bytes = out.inner.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

struct DocWriter<'p> {
    path: &'p str,
    inner: Writer<Vec<u8>>,
}

impl DocWriter<'_> {
    fn emit(&mut self, event: Event<'_>) -> StoreResult<()> {
        self.inner
            .write_event(event)
            .map_err(|e| document_error(self.path, e))
    }

    fn list(&mut self, name: Option<&str>, list: &NamedList) -> StoreResult<()> {
        let start = element(LIST, name);
        if list.is_empty() {
            return self.emit(Event::Empty(start));
        }
        self.emit(Event::Start(start))?;
        for (entry, value) in list.iter() {
            self.value(Some(entry), value)?;
        }
        self.emit(Event::End(BytesEnd::new(LIST)))
    }

    fn value(&mut self, name: Option<&str>, value: &Value) -> StoreResult<()> {
        match value {
            Value::Str(s) => self.scalar("str", name, s),
            Value::Int(i) => self.scalar("int", name, &i.to_string()),
            Value::Float(f) => self.scalar("float", name, &f.to_string()),
            Value::Bool(b) => self.scalar("bool", name, if *b { "true" } else { "false" }),
            Value::Map(list) => self.list(name, list),
            Value::List(items) => {
                let start = element(ARRAY, name);
                if items.is_empty() {
                    return self.emit(Event::Empty(start));
                }
                self.emit(Event::Start(start))?;
                for item in items {
                    self.value(None, item)?;
                }
                self.emit(Event::End(BytesEnd::new(ARRAY)))
            }
        }
    }

    fn scalar(&mut self, tag: &str, name: Option<&str>, text: &str) -> StoreResult<()> {
        let start = element(tag, name);
        if text.is_empty() {
            return self.emit(Event::Empty(start));
        }
        self.emit(Event::Start(start))?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.emit(Event::End(BytesEnd::new(tag)))
    }
}

fn element<'a>(tag: &'a str, name: Option<&'a str>) -> BytesStart<'a> {
    let start = BytesStart::new(tag);
    match name {
        Some(name) => start.with_attributes([(NAME_ATTR, name)]),
        None => start,
    }
}

/// Parse the persisted XML form. The root must be a `<lst>`.
pub fn decode_document(path: &str, bytes: &[u8]) -> StoreResult<NamedList> {
    let mut reader = DocReader {
        path,
        inner: Reader::from_reader(bytes),
    };
    loop {
        match reader.next()? {
            Event::Start(e) if e.name().as_ref() == LIST.as_bytes() => {
                return reader.named_list();
            }
            Event::Empty(e) if e.name().as_ref() == LIST.as_bytes() => {
                return Ok(NamedList::new());
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Text(t) if is_blank(&t) => {}
            Event::Eof => return Err(document_error(path, "missing <lst> root element")),
            other => return Err(document_error(path, format!("unexpected {other:?} before root"))),
        }
    }
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

struct DocReader<'p, 'i> {
    path: &'p str,
    inner: Reader<&'i [u8]>,
}

impl<'i> DocReader<'_, 'i> {
    fn next(&mut self) -> StoreResult<Event<'i>> {
        self.inner
            .read_event()
            .map_err(|e| document_error(self.path, e))
    }

    fn fail(&self, message: impl fmt::Display) -> StoreError {
        document_error(self.path, message)
    }

    fn named_list(&mut self) -> StoreResult<NamedList> {
        let mut list = NamedList::new();
        for (name, value) in self.children()? {
            let name = name.ok_or_else(|| self.fail("<lst> entry without a name"))?;
            list.add(name, value);
        }
        Ok(list)
    }

    /// Child elements up to the parent's end tag. End tag names are
    /// checked by the reader.
    fn children(&mut self) -> StoreResult<Vec<(Option<String>, Value)>> {
        let mut out = Vec::new();
        loop {
            match self.next()? {
                Event::Start(e) => {
                    let name = self.name_of(&e)?;
                    let value = self.element_value(e.name().as_ref())?;
                    out.push((name, value));
                }
                Event::Empty(e) => {
                    let name = self.name_of(&e)?;
                    let value = self.empty_value(e.name().as_ref())?;
                    out.push((name, value));
                }
                Event::End(_) => return Ok(out),
                Event::Text(t) if is_blank(&t) => {}
                Event::Comment(_) => {}
                Event::Eof => return Err(self.fail("document ends inside an element")),
                other => return Err(self.fail(format!("unexpected {other:?}"))),
            }
        }
    }

    fn name_of(&self, start: &BytesStart<'_>) -> StoreResult<Option<String>> {
        let attr = start
            .try_get_attribute(NAME_ATTR)
            .map_err(|e| self.fail(e))?;
        attr.map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .map_err(|e| self.fail(e))
        })
        .transpose()
    }

    fn element_value(&mut self, tag: &[u8]) -> StoreResult<Value> {
        match tag {
            b"lst" => Ok(Value::Map(self.named_list()?)),
            b"arr" => Ok(Value::List(
                self.children()?.into_iter().map(|(_, v)| v).collect(),
            )),
            _ => {
                let text = self.text()?;
                self.scalar(tag, text)
            }
        }
    }

    fn empty_value(&self, tag: &[u8]) -> StoreResult<Value> {
        match tag {
            b"lst" => Ok(Value::Map(NamedList::new())),
            b"arr" => Ok(Value::List(Vec::new())),
            _ => self.scalar(tag, String::new()),
        }
    }

    fn text(&mut self) -> StoreResult<String> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Event::Text(t) => text.push_str(&t.unescape().map_err(|e| self.fail(e))?),
                Event::CData(c) => {
                    text.push_str(std::str::from_utf8(&c).map_err(|e| self.fail(e))?);
                }
                Event::Comment(_) => {}
                Event::End(_) => return Ok(text),
                Event::Eof => return Err(self.fail("document ends inside a value")),
                other => return Err(self.fail(format!("unexpected {other:?} inside a value"))),
            }
        }
    }

    fn scalar(&self, tag: &[u8], text: String) -> StoreResult<Value> {
        match tag {
            b"str" => Ok(Value::Str(text)),
            b"int" => text
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| self.fail(format!("bad int '{text}': {e}"))),
            b"float" => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| self.fail(format!("bad float '{text}': {e}"))),
            b"bool" => match text.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(self.fail(format!("bad bool '{other}'"))),
            },
            other => Err(self.fail(format!(
                "unknown element <{}>",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}
