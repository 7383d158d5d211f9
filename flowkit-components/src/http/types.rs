//! Shared HTTP wire vocabulary: content types, headers, body codecs.
//!
//! Request bodies are decoded into JSON-like values by content type so the
//! rest of the graph never sees raw bytes; response bodies go the other way.

use bytes::Bytes;
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::borrow::Cow;

/// `application/json`
pub const MIME_APPLICATION_JSON: &str = "application/json";
/// `application/xml`
pub const MIME_APPLICATION_XML: &str = "application/xml";
/// `text/xml`
pub const MIME_TEXT_XML: &str = "text/xml";
/// `text/plain`
pub const MIME_TEXT_PLAIN: &str = "text/plain";
/// `text/html`
pub const MIME_TEXT_HTML: &str = "text/html";
/// `application/x-www-form-urlencoded`
pub const MIME_APPLICATION_FORM: &str = "application/x-www-form-urlencoded";
/// `multipart/form-data`
pub const MIME_MULTIPART_FORM: &str = "multipart/form-data";

/// A response content type.
///
/// Carries its own schema: the editor offers exactly the types a response
/// can be serialized as, defaulting to JSON. Unknown values fall back to
/// plain text at serialization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(pub String);

impl Default for ContentType {
    fn default() -> Self {
        Self(MIME_APPLICATION_JSON.to_string())
    }
}

impl ContentType {
    /// The content type as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl JsonSchema for ContentType {
    fn schema_name() -> Cow<'static, str> {
        "Contenttype".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "title": "Content Type",
            "description": "Content type of the response",
            "enum": [
                MIME_APPLICATION_JSON,
                MIME_APPLICATION_XML,
                MIME_TEXT_HTML,
                MIME_TEXT_PLAIN,
            ],
            "default": MIME_APPLICATION_JSON,
        })
    }
}

/// One HTTP header as it travels through the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Header name.
    #[schemars(title = "Key", extend("colSpan" = "col-span-6"))]
    pub key: String,
    /// Header value.
    #[schemars(title = "Value", extend("colSpan" = "col-span-6"))]
    pub value: String,
}

/// Decode a request body into a graph value according to its content type.
///
/// JSON becomes a free-form value, XML a nested map, form and multipart
/// bodies a multi-map (`name` → list of values); anything else is kept as a
/// raw string.
pub fn parse_body(content_type: &str, body: &[u8]) -> Result<Value, String> {
    match content_type {
        t if t.starts_with(MIME_APPLICATION_JSON) => {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(body).map_err(|e| format!("malformed JSON body: {}", e))
        }
        t if t.starts_with(MIME_APPLICATION_XML) || t.starts_with(MIME_TEXT_XML) => {
            xml_to_value(&String::from_utf8_lossy(body))
        }
        t if t.starts_with(MIME_APPLICATION_FORM) => {
            form_multimap(String::from_utf8_lossy(body).as_ref())
        }
        t if t.starts_with(MIME_MULTIPART_FORM) => {
            let boundary = t
                .split(';')
                .filter_map(|p| p.trim().strip_prefix("boundary="))
                .next()
                .ok_or_else(|| "multipart body without boundary".to_string())?
                .trim_matches('"');
            multipart_multimap(boundary, &String::from_utf8_lossy(body))
        }
        _ => Ok(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// Decode a query string into a multi-map value.
pub fn query_multimap(query: &str) -> Value {
    form_multimap(query).unwrap_or(Value::Object(Map::new()))
}

fn form_multimap(body: &str) -> Result<Value, String> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(body).map_err(|e| format!("malformed form body: {}", e))?;

    let mut map = Map::new();
    for (key, value) in pairs {
        match map.entry(key).or_insert_with(|| json!([])) {
            Value::Array(values) => values.push(Value::String(value)),
            _ => unreachable!(),
        }
    }
    Ok(Value::Object(map))
}

// Text fields only; file parts are skipped. No crate in our stack parses
// multipart, and the graph has nowhere to put file payloads anyway.
fn multipart_multimap(boundary: &str, body: &str) -> Result<Value, String> {
    let delimiter = format!("--{}", boundary);
    let mut map = Map::new();

    for part in body.split(delimiter.as_str()).skip(1) {
        let part = part.strip_prefix("\r\n").unwrap_or(part);
        if part.starts_with("--") || part.trim().is_empty() {
            continue;
        }
        let Some((headers, content)) = part.split_once("\r\n\r\n") else {
            continue;
        };

        let disposition = headers
            .lines()
            .find(|line| line.to_ascii_lowercase().starts_with("content-disposition:"));
        let Some(disposition) = disposition else {
            continue;
        };
        if disposition.contains("filename=") {
            continue;
        }
        let Some(name) = disposition
            .split(';')
            .filter_map(|p| p.trim().strip_prefix("name="))
            .next()
        else {
            continue;
        };
        let name = name.trim_matches('"').to_string();
        let value = content.strip_suffix("\r\n").unwrap_or(content).to_string();

        match map.entry(name).or_insert_with(|| json!([])) {
            Value::Array(values) => values.push(Value::String(value)),
            _ => unreachable!(),
        }
    }
    Ok(Value::Object(map))
}

/// Parse an XML document into a JSON-like nested map.
///
/// Elements become objects, repeated element names become arrays, attributes
/// become string fields, and leaf text becomes a string.
pub fn xml_to_value(input: &str) -> Result<Value, String> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    // (element name, attribute/child fields, pending text)
    let mut stack: Vec<(String, Map<String, Value>, String)> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let mut fields = Map::new();
                for attr in start.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map_err(|e| format!("malformed XML attribute: {}", e))?;
                    fields.insert(key, Value::String(value.into_owned()));
                }
                stack.push((name, fields, String::new()));
            }
            Ok(Event::Empty(empty)) => {
                let name = String::from_utf8_lossy(empty.name().as_ref()).into_owned();
                match stack.last_mut() {
                    Some((_, fields, _)) => insert_multi(fields, name, Value::Null),
                    None => root = Some((name, Value::Null)),
                }
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| format!("malformed XML text: {}", e))?;
                if let Some((_, _, pending)) = stack.last_mut() {
                    pending.push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                let Some((name, fields, text)) = stack.pop() else {
                    return Err("unbalanced XML document".to_string());
                };
                let value = if fields.is_empty() {
                    Value::String(text)
                } else {
                    Value::Object(fields)
                };
                match stack.last_mut() {
                    Some((_, parent, _)) => insert_multi(parent, name, value),
                    None => root = Some((name, value)),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("malformed XML body: {}", e)),
        }
    }

    match root {
        Some((name, value)) => {
            let mut doc = Map::new();
            doc.insert(name, value);
            Ok(Value::Object(doc))
        }
        None => Err("empty XML document".to_string()),
    }
}

fn insert_multi(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = json!([first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Serialize a response body according to the requested content type.
///
/// Returns the bytes and the `Content-Type` header value. Unknown content
/// types render like plain text.
pub fn render_body(content_type: &ContentType, body: &Value) -> (Bytes, &'static str) {
    match content_type.as_str() {
        MIME_APPLICATION_JSON => (
            Bytes::from(serde_json::to_vec(body).unwrap_or_default()),
            MIME_APPLICATION_JSON,
        ),
        MIME_APPLICATION_XML => (
            Bytes::from(value_to_xml("response", body)),
            MIME_APPLICATION_XML,
        ),
        MIME_TEXT_HTML => (Bytes::from(text_repr(body)), MIME_TEXT_HTML),
        _ => (Bytes::from(text_repr(body)), MIME_TEXT_PLAIN),
    }
}

fn text_repr(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_xml(root: &str, value: &Value) -> String {
    let mut out = String::new();
    write_xml(&mut out, root, value);
    out
}

fn write_xml(out: &mut String, name: &str, value: &Value) {
    use quick_xml::escape::escape;

    match value {
        Value::Array(items) => {
            for item in items {
                write_xml(out, name, item);
            }
        }
        Value::Object(fields) => {
            out.push_str(&format!("<{}>", name));
            for (key, field) in fields {
                write_xml(out, key, field);
            }
            out.push_str(&format!("</{}>", name));
        }
        Value::Null => out.push_str(&format!("<{}/>", name)),
        Value::String(s) => {
            out.push_str(&format!("<{}>{}</{}>", name, escape(s.as_str()), name));
        }
        other => out.push_str(&format!("<{}>{}</{}>", name, other, name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_type_schema_offers_response_types() {
        let schema = flowkit_core::schema::schema_of::<ContentType>();
        assert_eq!(schema["default"], MIME_APPLICATION_JSON);
        let options = schema["enum"].as_array().unwrap();
        assert_eq!(options.len(), 4);
        assert!(options.contains(&json!(MIME_TEXT_HTML)));
    }

    #[test]
    fn parses_json_body() {
        let value = parse_body(MIME_APPLICATION_JSON, br#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(parse_body(MIME_APPLICATION_JSON, b"").unwrap(), Value::Null);
        assert!(parse_body(MIME_APPLICATION_JSON, b"{nope").is_err());
    }

    #[test]
    fn parses_xml_body() {
        let value = parse_body(
            "application/xml; charset=utf-8",
            b"<root><name>Alice</name><age>30</age></root>",
        )
        .unwrap();
        assert_eq!(value, json!({"root": {"name": "Alice", "age": "30"}}));
    }

    #[test]
    fn repeated_xml_elements_become_arrays() {
        let value = xml_to_value("<r><item>a</item><item>b</item></r>").unwrap();
        assert_eq!(value, json!({"r": {"item": ["a", "b"]}}));
    }

    #[test]
    fn xml_attributes_become_fields() {
        let value = xml_to_value(r#"<r kind="x"><v>1</v></r>"#).unwrap();
        assert_eq!(value, json!({"r": {"kind": "x", "v": "1"}}));
    }

    #[test]
    fn parses_form_body_as_multimap() {
        let value = parse_body(MIME_APPLICATION_FORM, b"a=1&b=2&a=3").unwrap();
        assert_eq!(value, json!({"a": ["1", "3"], "b": ["2"]}));
    }

    #[test]
    fn parses_multipart_text_fields() {
        let body = "--XX\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--XX\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n2\r\n--XX\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x.bin\"\r\n\r\nskip\r\n--XX--\r\n";
        let value = parse_body("multipart/form-data; boundary=XX", body.as_bytes()).unwrap();
        assert_eq!(value, json!({"a": ["1", "2"]}));
    }

    #[test]
    fn unknown_content_type_is_raw_string() {
        let value = parse_body("application/octet-stream", b"raw bytes").unwrap();
        assert_eq!(value, json!("raw bytes"));
    }

    #[test]
    fn query_string_multimap() {
        assert_eq!(
            query_multimap("x=1&y=a&y=b"),
            json!({"x": ["1"], "y": ["a", "b"]})
        );
        assert_eq!(query_multimap(""), json!({}));
    }

    #[test]
    fn renders_json_and_plain_bodies() {
        let (bytes, mime) = render_body(&ContentType::default(), &json!({"ok": true}));
        assert_eq!(mime, MIME_APPLICATION_JSON);
        assert_eq!(bytes.as_ref(), br#"{"ok":true}"#);

        let (bytes, mime) = render_body(&ContentType::from(MIME_TEXT_PLAIN), &json!("hello"));
        assert_eq!(mime, MIME_TEXT_PLAIN);
        assert_eq!(bytes.as_ref(), b"hello");

        let (bytes, mime) = render_body(&ContentType::from("application/unknown"), &json!(42));
        assert_eq!(mime, MIME_TEXT_PLAIN);
        assert_eq!(bytes.as_ref(), b"42");
    }

    #[test]
    fn renders_xml_body() {
        let (bytes, mime) = render_body(
            &ContentType::from(MIME_APPLICATION_XML),
            &json!({"name": "Alice", "tags": ["a", "b"]}),
        );
        assert_eq!(mime, MIME_APPLICATION_XML);
        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            "<response><name>Alice</name><tags>a</tags><tags>b</tags></response>"
        );
    }
}
