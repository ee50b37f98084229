//! S3 REST implementation of [`MultipartApi`].

use super::MultipartApi;
use crate::config::S3Config;
use crate::error::{map_http_status, map_s3_error_code, RequestError, S3Error};
use crate::signing::{uri_encode, AwsSigner};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::*;
use crate::xml;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Multipart operations over signed HTTP requests.
pub struct S3MultipartApi {
    config: Arc<S3Config>,
    transport: Arc<dyn HttpTransport>,
    signer: Arc<dyn AwsSigner>,
}

/// Names attached to a server error that does not carry them itself.
struct ErrorContext<'a> {
    bucket: &'a str,
    key: Option<&'a str>,
    upload_id: Option<&'a str>,
}

impl S3MultipartApi {
    /// Create a new multipart API client.
    pub fn new(
        config: Arc<S3Config>,
        transport: Arc<dyn HttpTransport>,
        signer: Arc<dyn AwsSigner>,
    ) -> Self {
        Self {
            config,
            transport,
            signer,
        }
    }

    fn build_url(&self, bucket: &str, key: Option<&str>, query: Option<&str>) -> Result<Url, S3Error> {
        let endpoint = self.config.resolve_endpoint(Some(bucket))?;
        let encoded_key = key.map(|k| k.split('/').map(uri_encode).collect::<Vec<_>>().join("/"));
        let path = self.config.build_path(bucket, encoded_key.as_deref());

        let url_str = match query {
            Some(q) => format!("{}{}?{}", endpoint.as_str().trim_end_matches('/'), path, q),
            None => format!("{}{}", endpoint.as_str().trim_end_matches('/'), path),
        };

        Url::parse(&url_str).map_err(|e| {
            S3Error::Request(RequestError::Validation {
                message: format!("Invalid URL: {}", e),
            })
        })
    }

    async fn execute(
        &self,
        method: &str,
        url: Url,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
        context: ErrorContext<'_>,
    ) -> Result<HttpResponse, S3Error> {
        let signed = self
            .signer
            .sign(method, &url, &headers, body.as_deref())
            .await?;

        let mut http_request =
            HttpRequest::new(method, signed.url.as_str()).with_headers(signed.headers);
        if let Some(body) = body {
            http_request = http_request.with_body(body);
        }

        debug!(method = method, url = %url, "Sending request");
        let response = self.transport.send(http_request).await?;

        if !response.is_success() {
            return Err(self.parse_error(&response, context));
        }

        Ok(response)
    }

    fn parse_error(&self, response: &HttpResponse, context: ErrorContext<'_>) -> S3Error {
        let request_id = response.request_id().map(String::from);
        if response.body.is_empty() {
            return map_http_status(response.status, request_id);
        }

        let body_str = String::from_utf8_lossy(&response.body);
        match xml::parse_error_response(&body_str) {
            Ok(mut error_response) => {
                error_response.bucket.get_or_insert_with(|| context.bucket.to_string());
                if let Some(key) = context.key {
                    error_response.key.get_or_insert_with(|| key.to_string());
                }
                if let Some(upload_id) = context.upload_id {
                    error_response.upload_id.get_or_insert_with(|| upload_id.to_string());
                }
                if error_response.request_id.is_none() {
                    error_response.request_id = request_id;
                }
                let code = error_response.code.clone();
                map_s3_error_code(&code, Some(error_response))
            }
            Err(_) => map_http_status(response.status, request_id),
        }
    }
}

fn body_text(response: &HttpResponse) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(&response.body)
}

#[async_trait]
impl MultipartApi for S3MultipartApi {
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, S3Error> {
        let url = self.build_url(bucket, Some(key), Some("uploads"))?;

        let mut headers = HashMap::new();
        if let Some(content_type) = content_type {
            headers.insert("content-type".to_string(), content_type.to_string());
        }

        let context = ErrorContext {
            bucket,
            key: Some(key),
            upload_id: None,
        };
        let response = self.execute("POST", url, headers, None, context).await?;

        xml::parse_initiate_multipart_upload(&body_text(&response))
    }

    async fn upload_part(&self, request: UploadPartRequest) -> Result<String, S3Error> {
        let query = format!(
            "partNumber={}&uploadId={}",
            request.part_number,
            uri_encode(&request.upload_id)
        );
        let url = self.build_url(&request.bucket, Some(&request.key), Some(&query))?;

        let mut headers = HashMap::new();
        headers.insert("content-length".to_string(), request.body.len().to_string());
        headers.insert("content-md5".to_string(), request.content_md5.clone());

        let context = ErrorContext {
            bucket: &request.bucket,
            key: Some(&request.key),
            upload_id: Some(&request.upload_id),
        };
        let response = self
            .execute("PUT", url, headers, Some(request.body.clone()), context)
            .await?;

        response.etag().map(String::from).ok_or_else(|| {
            S3Error::Response(crate::error::ResponseError::MissingField {
                field: "ETag".to_string(),
            })
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompleteMultipartUploadOutput, S3Error> {
        let query = format!("uploadId={}", uri_encode(upload_id));
        let url = self.build_url(bucket, Some(key), Some(&query))?;

        let body = Bytes::from(xml::build_complete_multipart_xml(parts));

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/xml".to_string());
        headers.insert("content-length".to_string(), body.len().to_string());

        let context = ErrorContext {
            bucket,
            key: Some(key),
            upload_id: Some(upload_id),
        };
        let response = self.execute("POST", url, headers, Some(body), context).await?;

        let mut output = xml::parse_complete_multipart_upload(&body_text(&response))?;
        output.version_id = response.get_header("x-amz-version-id").map(String::from);
        output.request_id = response.request_id().map(String::from);

        Ok(output)
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3Error> {
        let query = format!("uploadId={}", uri_encode(upload_id));
        let url = self.build_url(bucket, Some(key), Some(&query))?;

        let context = ErrorContext {
            bucket,
            key: Some(key),
            upload_id: Some(upload_id),
        };
        self.execute("DELETE", url, HashMap::new(), None, context)
            .await?;

        Ok(())
    }

    async fn list_parts(&self, request: ListPartsRequest) -> Result<ListPartsOutput, S3Error> {
        let mut query_params = vec![format!("uploadId={}", uri_encode(&request.upload_id))];
        if let Some(max_parts) = request.max_parts {
            query_params.push(format!("max-parts={}", max_parts));
        }
        if let Some(marker) = request.part_number_marker {
            query_params.push(format!("part-number-marker={}", marker));
        }

        let url = self.build_url(
            &request.bucket,
            Some(&request.key),
            Some(&query_params.join("&")),
        )?;

        let context = ErrorContext {
            bucket: &request.bucket,
            key: Some(&request.key),
            upload_id: Some(&request.upload_id),
        };
        let response = self.execute("GET", url, HashMap::new(), None, context).await?;

        let mut output = xml::parse_list_parts(&body_text(&response))?;
        output.request_id = response.request_id().map(String::from);

        Ok(output)
    }

    async fn list_multipart_uploads(
        &self,
        request: ListMultipartUploadsRequest,
    ) -> Result<ListMultipartUploadsOutput, S3Error> {
        let mut query_params = vec!["uploads".to_string()];
        if let Some(delimiter) = &request.delimiter {
            query_params.push(format!("delimiter={}", uri_encode(delimiter)));
        }
        if let Some(key_marker) = &request.key_marker {
            query_params.push(format!("key-marker={}", uri_encode(key_marker)));
        }
        if let Some(max_uploads) = request.max_uploads {
            query_params.push(format!("max-uploads={}", max_uploads));
        }
        if let Some(prefix) = &request.prefix {
            query_params.push(format!("prefix={}", uri_encode(prefix)));
        }
        if let Some(upload_id_marker) = &request.upload_id_marker {
            query_params.push(format!("upload-id-marker={}", uri_encode(upload_id_marker)));
        }

        let url = self.build_url(&request.bucket, None, Some(&query_params.join("&")))?;

        let context = ErrorContext {
            bucket: &request.bucket,
            key: None,
            upload_id: None,
        };
        let response = self.execute("GET", url, HashMap::new(), None, context).await?;

        let mut output = xml::parse_list_multipart_uploads(&body_text(&response))?;
        output.request_id = response.request_id().map(String::from);

        Ok(output)
    }

    async fn put_object_single_part(
        &self,
        request: PutObjectRequest,
    ) -> Result<PutObjectOutput, S3Error> {
        let url = self.build_url(&request.bucket, Some(&request.key), None)?;

        let mut headers = HashMap::new();
        headers.insert("content-length".to_string(), request.body.len().to_string());
        headers.insert("content-md5".to_string(), request.content_md5.clone());
        if let Some(content_type) = &request.content_type {
            headers.insert("content-type".to_string(), content_type.clone());
        }

        let context = ErrorContext {
            bucket: &request.bucket,
            key: Some(&request.key),
            upload_id: None,
        };
        let response = self
            .execute("PUT", url, headers, Some(request.body.clone()), context)
            .await?;

        Ok(PutObjectOutput {
            e_tag: response.etag().map(String::from),
            version_id: response.get_header("x-amz-version-id").map(String::from),
            request_id: response.request_id().map(String::from),
        })
    }
}

impl std::fmt::Debug for S3MultipartApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3MultipartApi")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MultipartError, ResponseError};
    use crate::mocks::{MockResponse, MockSigner, MockTransport, TestFixtures};

    fn api(transport: Arc<MockTransport>) -> S3MultipartApi {
        let config = S3Config::builder()
            .region("us-east-1")
            .endpoint("http://localhost:9000")
            .unwrap()
            .path_style(true)
            .build()
            .unwrap();
        S3MultipartApi::new(Arc::new(config), transport, Arc::new(MockSigner::new()))
    }

    #[tokio::test]
    async fn test_initiate_sends_uploads_query() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::ok_with_body(TestFixtures::initiate_multipart_xml()),
        ]));
        let api = api(transport.clone());

        let upload_id = api
            .initiate_multipart_upload("test-bucket", "dir/a b.bin", Some("text/plain"))
            .await
            .unwrap();

        assert_eq!(upload_id, "upload-id-12345");
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "http://localhost:9000/test-bucket/dir/a%20b.bin?uploads");
        assert_eq!(request.headers.get("content-type").map(String::as_str), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_upload_part_sends_md5_and_returns_etag() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::ok().with_header("ETag", "\"etag-1\""),
        ]));
        let api = api(transport.clone());

        let request = UploadPartRequest::new("test-bucket", "key", "u-1", 3, "hello", "XUFAKrxLKna5cZ2REBfFkg==");
        let e_tag = api.upload_part(request).await.unwrap();

        assert_eq!(e_tag, "\"etag-1\"");
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.method, "PUT");
        assert_eq!(sent.url, "http://localhost:9000/test-bucket/key?partNumber=3&uploadId=u-1");
        assert_eq!(
            sent.headers.get("content-md5").map(String::as_str),
            Some("XUFAKrxLKna5cZ2REBfFkg==")
        );
        assert_eq!(sent.body, Some(Bytes::from("hello")));
    }

    #[tokio::test]
    async fn test_upload_part_without_etag_is_an_error() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok()]));
        let api = api(transport);

        let request = UploadPartRequest::new("test-bucket", "key", "u-1", 1, "x", "md5");
        let err = api.upload_part(request).await.unwrap_err();

        assert!(matches!(err, S3Error::Response(ResponseError::MissingField { .. })));
    }

    #[tokio::test]
    async fn test_no_such_upload_carries_context() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::error(
            404,
            TestFixtures::error_xml("NoSuchUpload", "The specified upload does not exist"),
        )]));
        let api = api(transport);

        let err = api
            .abort_multipart_upload("test-bucket", "key", "u-9")
            .await
            .unwrap_err();

        match err {
            S3Error::Multipart(MultipartError::UploadNotFound {
                bucket,
                key,
                upload_id,
                request_id,
            }) => {
                assert_eq!(bucket, "test-bucket");
                assert_eq!(key, "key");
                assert_eq!(upload_id, "u-9");
                assert_eq!(request_id.as_deref(), Some("test-request-id"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_error_body_maps_status() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::error(403, "")]));
        let api = api(transport);

        let err = api
            .list_parts(ListPartsRequest::new("test-bucket", "key", "u-1"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(403));
        assert!(err.is_protocol_error());
    }

    #[tokio::test]
    async fn test_list_uploads_query_is_encoded() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_with_body(
            TestFixtures::list_multipart_uploads_xml(&[("logs/a b", "u-1")], None, false),
        )]));
        let api = api(transport.clone());

        let request = ListMultipartUploadsRequest::new("test-bucket")
            .with_prefix("logs/a b")
            .with_max_uploads(1000);
        let output = api.list_multipart_uploads(request).await.unwrap();

        assert_eq!(output.uploads.len(), 1);
        let sent = transport.last_request().unwrap();
        assert_eq!(
            sent.url,
            "http://localhost:9000/test-bucket?uploads&max-uploads=1000&prefix=logs%2Fa%20b"
        );
    }

    #[tokio::test]
    async fn test_put_object_single_part() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok()
            .with_header("ETag", "\"5d41402abc4b2a76b9719d911017c592\"")
            .with_header("x-amz-request-id", "req-7")]));
        let api = api(transport.clone());

        let request = PutObjectRequest::new("test-bucket", "key", "hello", "XUFAKrxLKna5cZ2REBfFkg==")
            .with_content_type(Some("text/plain".to_string()));
        let output = api.put_object_single_part(request).await.unwrap();

        assert_eq!(output.e_tag.as_deref(), Some("\"5d41402abc4b2a76b9719d911017c592\""));
        assert_eq!(output.request_id.as_deref(), Some("req-7"));
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "http://localhost:9000/test-bucket/key");
        assert_eq!(sent.headers.get("content-type").map(String::as_str), Some("text/plain"));
    }
}
