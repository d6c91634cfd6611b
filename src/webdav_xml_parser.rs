use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use std::str;
use tracing::debug;

use crate::errors::{PlayerError, PlayerResult};

/// One `<d:response>` element of a Multi-Status body, as found on the wire.
/// `href` is still percent-encoded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PropFindResponse {
    pub href: String,
    pub is_collection: bool,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl PropFindResponse {
    /// Directories are marked by a trailing slash on the href, or by a
    /// `collection` resource type
    pub fn is_directory(&self) -> bool {
        self.is_collection || self.href.ends_with('/')
    }
}

/// Parses a PROPFIND Multi-Status body into its response elements, in
/// document order. Elements are matched by local name, so any namespace
/// prefix for `DAV:` is accepted.
pub fn parse_propfind_response(xml_text: &str) -> PlayerResult<Vec<PropFindResponse>> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut responses = Vec::new();
    let mut current_response: Option<PropFindResponse> = None;
    let mut last_modified_raw: Option<String> = None;
    let mut current_element = String::new();
    let mut in_resourcetype = false;
    let mut saw_multistatus = false;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = get_local_name(&e)?;

                match name.as_str() {
                    "multistatus" => {
                        saw_multistatus = true;
                    }
                    "response" => {
                        current_response = Some(PropFindResponse::default());
                        last_modified_raw = None;
                    }
                    "resourcetype" => {
                        in_resourcetype = true;
                    }
                    "collection" if in_resourcetype => {
                        if let Some(ref mut resp) = current_response {
                            resp.is_collection = true;
                        }
                    }
                    _ => {
                        current_element = name;
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = get_local_name(&e)?;

                match name.as_str() {
                    "multistatus" => {
                        saw_multistatus = true;
                    }
                    "collection" if in_resourcetype => {
                        if let Some(ref mut resp) = current_response {
                            resp.is_collection = true;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| PlayerError::malformed(format!("Invalid text content: {}", e)))?;
                let text = text.trim();

                if let Some(ref mut resp) = current_response {
                    if !text.is_empty() {
                        match current_element.as_str() {
                            "href" => {
                                resp.href = text.to_string();
                            }
                            "getcontentlength" => {
                                resp.content_length = text.parse().ok();
                            }
                            "getcontenttype" => {
                                resp.content_type = Some(text.to_string());
                            }
                            "getlastmodified" => {
                                last_modified_raw = Some(text.to_string());
                            }
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = get_local_name_from_end(&e)?;

                match name.as_str() {
                    "response" => {
                        if let Some(mut resp) = current_response.take() {
                            if resp.href.is_empty() {
                                return Err(PlayerError::malformed("response element without href"));
                            }
                            resp.last_modified = last_modified_raw
                                .take()
                                .and_then(|raw| parse_http_date(&raw));
                            debug!("Found link: {}", resp.href);
                            responses.push(resp);
                        }
                    }
                    "resourcetype" => {
                        in_resourcetype = false;
                    }
                    _ => {}
                }

                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PlayerError::malformed(format!("XML parsing error: {}", e))),
            _ => {}
        }

        buf.clear();
    }

    if !saw_multistatus {
        return Err(PlayerError::malformed("missing multistatus root element"));
    }
    if current_response.is_some() {
        return Err(PlayerError::malformed("document ends inside a response element"));
    }

    Ok(responses)
}

fn get_local_name(e: &BytesStart) -> PlayerResult<String> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|e| PlayerError::malformed(format!("Invalid UTF-8 in element name: {}", e)))?;
    Ok(name.to_string())
}

fn get_local_name_from_end(e: &BytesEnd) -> PlayerResult<String> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|e| PlayerError::malformed(format!("Invalid UTF-8 in element name: {}", e)))?;
    Ok(name.to_string())
}

fn parse_http_date(date_str: &str) -> Option<DateTime<Utc>> {
    // RFC 2822 is what WebDAV servers send in getlastmodified
    DateTime::parse_from_rfc2822(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            DateTime::parse_from_rfc3339(date_str)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%a, %d %b %Y %H:%M:%S GMT")
                .ok()
                .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        })
}
