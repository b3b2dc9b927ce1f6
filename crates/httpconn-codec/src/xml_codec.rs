//! Dynamic XML encoder/decoder driven entirely by schema XML hints
//! (§4.1.3). There is no generated binding per object type: every object
//! is walked through its [`httpconn_schema::ObjectType`] at encode/decode
//! time, the same way the JSON and parameter codecs work off the schema
//! rather than native structs.

use std::collections::BTreeMap;
use std::io::Cursor;

use httpconn_schema::{FieldHttpHints, HttpSchema, ObjectType, TypeRef, Value, XmlHints};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{CodecError, CodecResult, FieldPath};
use crate::scalar_codec::{coerce_scalar, stringify_scalar};

const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

// ---------------------------------------------------------------- encode

struct XmlElem {
    name: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlElem>,
}

fn qualify(local: &str, hints: Option<&XmlHints>) -> String {
    match hints.and_then(|h| h.prefix.as_deref()) {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn element_name(field_name: &str, hints: Option<&XmlHints>) -> String {
    let local = hints.and_then(|h| h.name.as_deref()).unwrap_or(field_name);
    qualify(local, hints)
}

/// Best-effort singularization for unwrapped array item names when the
/// schema didn't supply an explicit item hint name.
fn singularize(field_name: &str) -> String {
    field_name.strip_suffix('s').unwrap_or(field_name).to_string()
}

/// Encode one field's value into zero, one, or many sibling elements. An
/// unwrapped array yields one element per item; everything else yields at
/// most one.
fn build_elements(
    schema: &HttpSchema,
    field_name: &str,
    type_ref: &TypeRef,
    value: &Value,
    hints: Option<&FieldHttpHints>,
    path: &FieldPath,
) -> CodecResult<Vec<XmlElem>> {
    match type_ref {
        TypeRef::Nullable(inner) => {
            if value.is_null() {
                Ok(vec![])
            } else {
                build_elements(schema, field_name, inner, value, hints, path)
            }
        }
        TypeRef::Array(inner) => {
            let items = value
                .as_array()
                .ok_or_else(|| CodecError::invalid(path.clone(), "expected an array value"))?;
            let field_xml = hints.and_then(|h| h.xml.as_ref());
            let item_hints = hints.and_then(|h| h.items.as_deref());
            let item_name = item_hints
                .and_then(|h| h.xml.as_ref())
                .and_then(|x| x.name.clone())
                .unwrap_or_else(|| singularize(field_name));

            let mut item_elems = vec![];
            for (i, item) in items.iter().enumerate() {
                item_elems.extend(build_elements(
                    schema,
                    &item_name,
                    inner,
                    item,
                    item_hints,
                    &path.index(i),
                )?);
            }

            if field_xml.is_some_and(|x| x.wrapped) {
                let wrapper_name = element_name(field_name, field_xml);
                Ok(vec![XmlElem {
                    name: wrapper_name,
                    attrs: vec![],
                    text: None,
                    children: item_elems,
                }])
            } else {
                Ok(item_elems)
            }
        }
        TypeRef::Named(name) => build_named(schema, field_name, name, value, hints, path),
        TypeRef::Predicate(_) => Ok(vec![XmlElem {
            name: field_name.to_string(),
            attrs: vec![],
            text: Some(value.stringify()),
            children: vec![],
        }]),
    }
}

fn build_named(
    schema: &HttpSchema,
    field_name: &str,
    type_name: &str,
    value: &Value,
    hints: Option<&FieldHttpHints>,
    path: &FieldPath,
) -> CodecResult<Vec<XmlElem>> {
    let field_xml = hints.and_then(|h| h.xml.as_ref());
    let name = element_name(field_name, field_xml);

    if let Some(scalar) = schema.scalar_type(type_name) {
        let text = stringify_scalar(&scalar.representation, value, path)?;
        return Ok(vec![XmlElem {
            name,
            attrs: vec![],
            text: Some(text),
            children: vec![],
        }]);
    }

    if let Some(object) = schema.object_type(type_name) {
        let fields = value
            .as_object()
            .ok_or_else(|| CodecError::invalid(path.clone(), format!("expected an object for type {type_name}")))?;

        let mut attrs = vec![];
        let mut text: Option<String> = None;
        let mut children = vec![];

        let text_field = single_text_field(object);

        for (fname, fspec) in &object.fields {
            let Some(fvalue) = fields.get(fname) else { continue };
            if fvalue.is_null() {
                continue;
            }
            let fxml = fspec.http.as_ref().and_then(|h| h.xml.as_ref());
            if fxml.is_some_and(|x| x.attribute) {
                let rendered = match fvalue {
                    Value::Object(_) | Value::Array(_) => {
                        serde_json::to_string(&fvalue.to_json()).unwrap_or_default()
                    }
                    other => other.stringify(),
                };
                attrs.push((element_name(fname, fxml), rendered));
                continue;
            }
            if text_field.as_deref() == Some(fname.as_str()) {
                text = Some(fvalue.stringify());
                continue;
            }
            children.extend(build_elements(
                schema,
                fname,
                &fspec.field_type,
                fvalue,
                fspec.http.as_ref(),
                &path.field(fname),
            )?);
        }

        if let Some(ns) = object.xml.as_ref().and_then(|x| x.namespace.as_ref()) {
            let attr_name = match object.xml.as_ref().and_then(|x| x.prefix.as_deref()) {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            attrs.push((attr_name, ns.clone()));
        }

        return Ok(vec![XmlElem { name, attrs, text, children }]);
    }

    Ok(vec![XmlElem {
        name,
        attrs: vec![],
        text: Some(value.stringify()),
        children: vec![],
    }])
}

/// An object with exactly one non-attribute field marked `text=true`
/// serializes that field as character data instead of a child element.
fn single_text_field(object: &ObjectType) -> Option<String> {
    let mut candidate = None;
    for (name, spec) in &object.fields {
        let xml = spec.http.as_ref().and_then(|h| h.xml.as_ref());
        if xml.is_some_and(|x| x.attribute) {
            continue;
        }
        if xml.is_some_and(|x| x.text) {
            if candidate.is_some() {
                return None;
            }
            candidate = Some(name.clone());
        }
    }
    candidate
}

fn write_elem(writer: &mut Writer<Cursor<Vec<u8>>>, elem: &XmlElem) -> CodecResult<()> {
    let mut start = BytesStart::new(elem.name.clone());
    for (k, v) in &elem.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if elem.children.is_empty() {
        match &elem.text {
            Some(text) => {
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
                writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
                writer
                    .write_event(Event::End(BytesEnd::new(elem.name.clone())))
                    .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
            }
            None => {
                writer
                    .write_event(Event::Empty(start))
                    .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
            }
        }
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
    for child in &elem.children {
        write_elem(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(elem.name.clone())))
        .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
    Ok(())
}

/// Encode `value` (declared as `type_ref`, named `root_field`) to an XML
/// document. The root element name prefers the root object type's own
/// `xml.name` hint over `root_field`.
pub fn encode_xml(schema: &HttpSchema, type_ref: &TypeRef, root_field: &str, value: &Value) -> CodecResult<Vec<u8>> {
    let root_name = match type_ref.underlying().root_name().and_then(|n| schema.object_type(n)) {
        Some(object) => object.xml.as_ref().and_then(|x| x.name.clone()).unwrap_or_else(|| root_field.to_string()),
        None => root_field.to_string(),
    };
    let elems = build_elements(schema, &root_name, type_ref, value, None, &FieldPath::root())?;
    let elem = elems.into_iter().next().ok_or_else(|| CodecError::DecodeFailed("empty XML body".to_string()))?;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_elem(&mut writer, &elem)?;
    let body = writer.into_inner().into_inner();

    let mut out = Vec::with_capacity(XML_PROLOG.len() + body.len());
    out.extend_from_slice(XML_PROLOG.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

// ---------------------------------------------------------------- decode

#[derive(Debug, Clone, Default)]
struct XmlBlock {
    attrs: Vec<(String, String)>,
    char_data: String,
    fields: BTreeMap<String, Vec<XmlBlock>>,
}

fn local_name(qname: QName<'_>) -> String {
    String::from_utf8_lossy(qname.local_name().as_ref()).to_string()
}

struct Frame {
    block: XmlBlock,
    name: String,
}

/// Flatten a byte stream into an in-memory tree (§4.1.3 decoder rules).
fn parse_block(bytes: &[u8]) -> CodecResult<XmlBlock> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = vec![];
    let mut root: Option<XmlBlock> = None;

    loop {
        match reader.read_event().map_err(|e| CodecError::DecodeFailed(e.to_string()))? {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Start(start) => {
                let mut block = XmlBlock::default();
                for attr in start.attributes().flatten() {
                    let key = local_name(attr.key);
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    block.attrs.push((key, value));
                }
                stack.push(Frame { block, name: local_name(start.name()) });
            }
            Event::Empty(start) => {
                let mut block = XmlBlock::default();
                for attr in start.attributes().flatten() {
                    let key = local_name(attr.key);
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    block.attrs.push((key, value));
                }
                let name = local_name(start.name());
                push_child(&mut stack, &mut root, name, block);
            }
            Event::Text(text) | Event::CData(text) => {
                let decoded = text.unescape().map(|c| c.to_string()).unwrap_or_default();
                if let Some(frame) = stack.last_mut() {
                    frame.block.char_data.push_str(&decoded);
                }
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or_else(|| CodecError::DecodeFailed("unbalanced XML".to_string()))?;
                push_child(&mut stack, &mut root, frame.name, frame.block);
            }
            Event::Eof => break,
        }
    }

    root.ok_or_else(|| CodecError::DecodeFailed("empty XML document".to_string()))
}

fn push_child(stack: &mut [Frame], root: &mut Option<XmlBlock>, name: String, block: XmlBlock) {
    if let Some(parent) = stack.last_mut() {
        parent.block.fields.entry(name).or_default().push(block);
    } else {
        *root = Some(block);
    }
}

fn decode_scalar(repr: &httpconn_schema::ScalarRepresentation, block: &XmlBlock, path: &FieldPath) -> CodecResult<Value> {
    coerce_scalar(repr, Value::String(block.char_data.clone()), path)
}

fn decode_named(schema: &HttpSchema, type_name: &str, block: &XmlBlock, path: &FieldPath) -> CodecResult<Value> {
    if let Some(scalar) = schema.scalar_type(type_name) {
        return decode_scalar(&scalar.representation, block, path);
    }
    if let Some(object) = schema.object_type(type_name) {
        let mut out = BTreeMap::new();
        let text_field = single_text_field(object);

        for (fname, fspec) in &object.fields {
            let fxml = fspec.http.as_ref().and_then(|h| h.xml.as_ref());
            if fxml.is_some_and(|x| x.attribute) {
                let attr_name = fxml.and_then(|x| x.name.as_deref()).unwrap_or(fname);
                if let Some((_, v)) = block.attrs.iter().find(|(k, _)| k == attr_name) {
                    let child_type = fspec.field_type.underlying().clone();
                    let coerced = match &child_type {
                        TypeRef::Named(n) if schema.scalar_type(n).is_some() => {
                            decode_scalar(&schema.scalar_type(n).unwrap().representation, &XmlBlock { char_data: v.clone(), ..Default::default() }, &path.field(fname))?
                        }
                        _ => Value::String(v.clone()),
                    };
                    out.insert(fname.clone(), coerced);
                }
                continue;
            }
            if text_field.as_deref() == Some(fname.as_str()) {
                out.insert(fname.clone(), Value::String(block.char_data.clone()));
                continue;
            }
            let decoded = decode_field(schema, &fspec.field_type, fname, fxml, block, &path.field(fname))?;
            out.insert(fname.clone(), decoded);
        }
        return Ok(Value::Object(out));
    }
    Ok(Value::String(block.char_data.clone()))
}

fn decode_field(
    schema: &HttpSchema,
    type_ref: &TypeRef,
    field_name: &str,
    hints: Option<&XmlHints>,
    parent: &XmlBlock,
    path: &FieldPath,
) -> CodecResult<Value> {
    match type_ref {
        TypeRef::Nullable(inner) => {
            let decoded = decode_field(schema, inner, field_name, hints, parent, path)?;
            Ok(decoded)
        }
        TypeRef::Array(inner) => {
            let xml_name = hints.and_then(|h| h.name.as_deref()).unwrap_or(field_name);
            if hints.is_some_and(|h| h.wrapped) {
                let Some(wrapper) = parent.fields.get(xml_name).and_then(|v| v.first()) else {
                    return Ok(Value::Array(vec![]));
                };
                let mut items = vec![];
                for (_, blocks) in wrapper.fields.iter() {
                    for (i, b) in blocks.iter().enumerate() {
                        items.push(decode_element(schema, inner, b, &path.index(i))?);
                    }
                }
                Ok(Value::Array(items))
            } else {
                let item_name = singularize(xml_name);
                let blocks = parent.fields.get(&item_name).or_else(|| parent.fields.get(xml_name));
                match blocks {
                    Some(blocks) => {
                        let mut items = vec![];
                        for (i, b) in blocks.iter().enumerate() {
                            items.push(decode_element(schema, inner, b, &path.index(i))?);
                        }
                        Ok(Value::Array(items))
                    }
                    None => Ok(Value::Array(vec![])),
                }
            }
        }
        TypeRef::Named(name) => {
            let xml_name = hints.and_then(|h| h.name.as_deref()).unwrap_or(field_name);
            match parent.fields.get(xml_name).and_then(|v| v.first()) {
                Some(block) => decode_named(schema, name, block, path),
                None => Ok(Value::Null),
            }
        }
        TypeRef::Predicate(_) => Ok(Value::Null),
    }
}

fn decode_element(schema: &HttpSchema, type_ref: &TypeRef, block: &XmlBlock, path: &FieldPath) -> CodecResult<Value> {
    match type_ref {
        TypeRef::Nullable(inner) => decode_element(schema, inner, block, path),
        TypeRef::Array(_) => Ok(Value::Null),
        TypeRef::Named(name) => decode_named(schema, name, block, path),
        TypeRef::Predicate(_) => Ok(Value::String(block.char_data.clone())),
    }
}

/// Decode a full document against a declared type, at the root.
pub fn decode_xml(schema: &HttpSchema, type_ref: &TypeRef, bytes: &[u8]) -> CodecResult<Value> {
    let root = parse_block(bytes)?;
    let inner = type_ref.underlying();
    match inner {
        TypeRef::Array(item_ty) => {
            let mut items = vec![];
            for (_, blocks) in root.fields.iter() {
                for (i, b) in blocks.iter().enumerate() {
                    items.push(decode_element(schema, item_ty, b, &FieldPath::root().index(i))?);
                }
            }
            Ok(Value::Array(items))
        }
        TypeRef::Named(name) => decode_named(schema, name, &root, &FieldPath::root()),
        _ => decode_block_arbitrary(&root),
    }
}

/// Arbitrary (schema-less) XML-to-JSON decode (§4.1.3): elements with
/// neither attributes nor children collapse to their text; elements with
/// attributes or children emit a structured object.
pub fn decode_block_arbitrary(block: &XmlBlock) -> CodecResult<Value> {
    if block.attrs.is_empty() && block.fields.is_empty() {
        return Ok(Value::String(block.char_data.clone()));
    }
    let mut out = BTreeMap::new();
    if !block.attrs.is_empty() {
        let attrs = block
            .attrs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        out.insert("attributes".to_string(), Value::Object(attrs));
    }
    if !block.char_data.trim().is_empty() {
        out.insert("content".to_string(), Value::String(block.char_data.clone()));
    }
    for (name, blocks) in &block.fields {
        let value = if blocks.len() == 1 {
            decode_block_arbitrary(&blocks[0])?
        } else {
            let mut items = vec![];
            for b in blocks {
                items.push(decode_block_arbitrary(b)?);
            }
            Value::Array(items)
        };
        out.insert(name.clone(), value);
    }
    Ok(Value::Object(out))
}

/// Public entry point for decoding an XML error/response body with no
/// declared schema type (used by the dispatch engine for error details).
pub fn decode_xml_arbitrary(bytes: &[u8]) -> CodecResult<Value> {
    let block = parse_block(bytes)?;
    decode_block_arbitrary(&block)
}
