//! XML encoding and decoding for the multipart REST surface.

use crate::error::{ResponseError, S3Error, S3ErrorResponse};
use crate::types::*;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Simplified view of the events the parsers care about.
enum Node<'a> {
    Open(&'a str),
    Text(&'a str, String),
    Close(&'a str),
}

/// Walk `xml`, calling `visit` for each element open/close and each text
/// node (paired with its enclosing element name).
fn walk<F>(xml: &str, mut visit: F) -> Result<(), S3Error>
where
    F: FnMut(Node<'_>),
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                visit(Node::Open(&name));
                stack.push(name);
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(xml_error)?.to_string();
                if let Some(current) = stack.last() {
                    visit(Node::Text(current, text));
                }
            }
            Ok(Event::End(_)) => {
                if let Some(name) = stack.pop() {
                    visit(Node::Close(&name));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(())
}

fn xml_error(e: impl std::fmt::Display) -> S3Error {
    S3Error::Response(ResponseError::XmlParseError {
        message: e.to_string(),
    })
}

/// Parse an S3 `<Error>` document.
pub fn parse_error_response(xml: &str) -> Result<S3ErrorResponse, S3Error> {
    let mut response = S3ErrorResponse::default();

    walk(xml, |node| {
        if let Node::Text(element, text) = node {
            match element {
                "Code" => response.code = text,
                "Message" => response.message = text,
                "BucketName" | "Bucket" => response.bucket = Some(text),
                "Key" => response.key = Some(text),
                "UploadId" => response.upload_id = Some(text),
                "RequestId" => response.request_id = Some(text),
                "HostId" => response.host_id = Some(text),
                _ => {}
            }
        }
    })?;

    if response.code.is_empty() {
        return Err(S3Error::Response(ResponseError::MissingField {
            field: "Code".to_string(),
        }));
    }
    Ok(response)
}

/// Parse `InitiateMultipartUploadResult`, returning the upload ID.
pub fn parse_initiate_multipart_upload(xml: &str) -> Result<String, S3Error> {
    let mut upload_id = String::new();

    walk(xml, |node| {
        if let Node::Text("UploadId", text) = node {
            upload_id = text;
        }
    })?;

    if upload_id.is_empty() {
        return Err(S3Error::Response(ResponseError::MissingField {
            field: "UploadId".to_string(),
        }));
    }
    Ok(upload_id)
}

/// Parse `CompleteMultipartUploadResult`.
///
/// S3 can answer a completion with 200 OK and an `<Error>` body; that case
/// is returned as the mapped error.
pub fn parse_complete_multipart_upload(xml: &str) -> Result<CompleteMultipartUploadOutput, S3Error> {
    let mut output = CompleteMultipartUploadOutput::default();
    let mut is_error = false;

    walk(xml, |node| match node {
        Node::Open("Error") => is_error = true,
        Node::Text(element, text) => match element {
            "Bucket" => output.bucket = Some(text),
            "Key" => output.key = Some(text),
            "ETag" => output.e_tag = Some(text),
            "Location" => output.location = Some(text),
            _ => {}
        },
        _ => {}
    })?;

    if is_error {
        let response = parse_error_response(xml)?;
        return Err(crate::error::map_s3_error_code(&response.code.clone(), Some(response)));
    }
    Ok(output)
}

/// Parse one page of `ListPartsResult`.
pub fn parse_list_parts(xml: &str) -> Result<ListPartsOutput, S3Error> {
    let mut output = ListPartsOutput::default();
    let mut current: Option<Part> = None;

    walk(xml, |node| match node {
        Node::Open("Part") => current = Some(Part::new(0, "", 0)),
        Node::Close("Part") => {
            if let Some(part) = current.take() {
                output.parts.push(part);
            }
        }
        Node::Text(element, text) => {
            if let Some(part) = current.as_mut() {
                match element {
                    "PartNumber" => part.part_number = text.parse().unwrap_or(0),
                    "ETag" => part.e_tag = text,
                    "Size" => part.size = text.parse().unwrap_or(0),
                    "LastModified" => part.last_modified = Some(text),
                    _ => {}
                }
            } else {
                match element {
                    "Bucket" => output.bucket = Some(text),
                    "Key" => output.key = Some(text),
                    "UploadId" => output.upload_id = Some(text),
                    "PartNumberMarker" => output.part_number_marker = text.parse().ok(),
                    "NextPartNumberMarker" => output.next_part_number_marker = text.parse().ok(),
                    "MaxParts" => output.max_parts = text.parse().ok(),
                    "IsTruncated" => output.is_truncated = text == "true",
                    _ => {}
                }
            }
        }
        _ => {}
    })?;

    Ok(output)
}

/// Parse one page of `ListMultipartUploadsResult`.
pub fn parse_list_multipart_uploads(xml: &str) -> Result<ListMultipartUploadsOutput, S3Error> {
    let mut output = ListMultipartUploadsOutput::default();
    let mut current: Option<MultipartUpload> = None;
    let mut in_common_prefixes = false;

    walk(xml, |node| match node {
        Node::Open("Upload") => {
            current = Some(MultipartUpload {
                key: String::new(),
                upload_id: String::new(),
                initiated: None,
            })
        }
        Node::Close("Upload") => {
            if let Some(upload) = current.take() {
                output.uploads.push(upload);
            }
        }
        Node::Open("CommonPrefixes") => in_common_prefixes = true,
        Node::Close("CommonPrefixes") => in_common_prefixes = false,
        Node::Text(element, text) => {
            if let Some(upload) = current.as_mut() {
                match element {
                    "Key" => upload.key = text,
                    "UploadId" => upload.upload_id = text,
                    "Initiated" => upload.initiated = Some(text),
                    _ => {}
                }
            } else if in_common_prefixes {
                if element == "Prefix" {
                    output.common_prefixes.push(text);
                }
            } else {
                match element {
                    "Bucket" => output.bucket = Some(text),
                    "Prefix" => output.prefix = Some(text),
                    "Delimiter" => output.delimiter = Some(text),
                    "KeyMarker" => output.key_marker = Some(text),
                    "UploadIdMarker" => output.upload_id_marker = Some(text),
                    "NextKeyMarker" => output.next_key_marker = Some(text),
                    "NextUploadIdMarker" => output.next_upload_id_marker = Some(text),
                    "MaxUploads" => output.max_uploads = text.parse().ok(),
                    "IsTruncated" => output.is_truncated = text == "true",
                    _ => {}
                }
            }
        }
        _ => {}
    })?;

    Ok(output)
}

/// Build the `CompleteMultipartUpload` request body.
pub fn build_complete_multipart_xml(parts: &[CompletedPart]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<CompleteMultipartUpload xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">");

    for part in parts {
        xml.push_str("<Part>");
        xml.push_str(&format!("<PartNumber>{}</PartNumber>", part.part_number));
        xml.push_str(&format!("<ETag>{}</ETag>", escape_xml(&part.e_tag)));
        xml.push_str("</Part>");
    }

    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Escape special characters for XML.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
