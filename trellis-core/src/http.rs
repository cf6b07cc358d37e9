// HTTP request and response types

use crate::headers::HeaderMap;
use bytes::Bytes;
use http::Method;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

// ============================================================================
// Stream
// ============================================================================

/// In-memory, seekable message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stream {
    inner: Cursor<Vec<u8>>,
}

impl Stream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream over existing bytes, positioned at zero.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Cursor::new(bytes.into()),
        }
    }

    /// Current read/write position.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn rewind(&mut self) {
        self.inner.set_position(0);
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    /// Read everything from the current position to the end.
    pub fn contents(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// The whole buffer, independent of the current position.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.get_ref()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

// ============================================================================
// Server parameters
// ============================================================================

/// A server/environment parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl ServerValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ServerValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ServerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerValue::Text(s) => f.write_str(s),
            ServerValue::Int(i) => write!(f, "{}", i),
            ServerValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for ServerValue {
    fn from(value: &str) -> Self {
        ServerValue::Text(value.to_string())
    }
}

impl From<String> for ServerValue {
    fn from(value: String) -> Self {
        ServerValue::Text(value)
    }
}

impl From<&String> for ServerValue {
    fn from(value: &String) -> Self {
        ServerValue::Text(value.clone())
    }
}

impl From<i64> for ServerValue {
    fn from(value: i64) -> Self {
        ServerValue::Int(value)
    }
}

impl From<i32> for ServerValue {
    fn from(value: i32) -> Self {
        ServerValue::Int(i64::from(value))
    }
}

impl From<u16> for ServerValue {
    fn from(value: u16) -> Self {
        ServerValue::Int(i64::from(value))
    }
}

impl From<usize> for ServerValue {
    fn from(value: usize) -> Self {
        ServerValue::Int(value as i64)
    }
}

impl From<f64> for ServerValue {
    fn from(value: f64) -> Self {
        ServerValue::Float(value)
    }
}

/// Flat server/environment parameters, ordered by key.
pub type ServerParams = BTreeMap<String, ServerValue>;

// ============================================================================
// URI
// ============================================================================

/// Request target split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl Uri {
    fn is_default_port(&self) -> bool {
        matches!(
            (self.scheme.as_str(), self.port),
            ("http", Some(80)) | ("https", Some(443)) | (_, None)
        )
    }
}

impl Default for Uri {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: String::new(),
            port: None,
            path: "/".to_string(),
            query: String::new(),
            fragment: String::new(),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.host.is_empty() {
            write!(f, "{}://{}", self.scheme, self.host)?;
            if let (false, Some(port)) = (self.is_default_port(), self.port) {
                write!(f, ":{}", port)?;
            }
        }
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

// ============================================================================
// Uploaded files
// ============================================================================

/// A file received through a multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Temporary storage location of the upload
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Upload status code, 0 when the upload succeeded
    pub error: u8,
    /// Filename sent by the client
    pub client_filename: Option<String>,
    /// Media type sent by the client
    pub client_media_type: Option<String>,
}

impl UploadedFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            error: 0,
            client_filename: None,
            client_media_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.client_filename = Some(filename.into());
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.client_media_type = Some(media_type.into());
        self
    }

    pub fn with_error(mut self, error: u8) -> Self {
        self.error = error;
        self
    }
}

/// Node of the uploaded-file tree; nested form field names become groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNode {
    File(UploadedFile),
    Group(BTreeMap<String, FileNode>),
}

impl FileNode {
    pub fn get(&self, key: &str) -> Option<&FileNode> {
        match self {
            FileNode::Group(children) => children.get(key),
            FileNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            FileNode::File(file) => Some(file),
            FileNode::Group(_) => None,
        }
    }
}

/// Uploaded files keyed by top-level form field name.
pub type UploadedFiles = BTreeMap<String, FileNode>;

// ============================================================================
// Request
// ============================================================================

/// Decoded request payload; exactly one representation is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedBody {
    /// Form-encoded field/value pairs
    Form(BTreeMap<String, String>),
    /// Raw bytes for payloads the application decodes itself
    Raw(Vec<u8>),
}

/// Everything needed to assemble a [`Request`].
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub server_params: ServerParams,
    pub query_params: BTreeMap<String, String>,
    pub parsed_body: Option<ParsedBody>,
    pub body: Stream,
    pub cookies: BTreeMap<String, String>,
    pub uploaded_files: UploadedFiles,
    pub protocol_version: String,
}

/// Server-side HTTP request.
///
/// Built once, then handed down the middleware pipeline. Stages that need
/// to change something derive a new request through the `with_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    server_params: ServerParams,
    query_params: BTreeMap<String, String>,
    parsed_body: Option<ParsedBody>,
    body: Stream,
    cookies: BTreeMap<String, String>,
    uploaded_files: UploadedFiles,
    protocol_version: String,
    attributes: BTreeMap<String, String>,
}

impl Request {
    /// Create a bare request for the given method and path.
    pub fn new(method: Method, path: &str) -> Self {
        Self::from_parts(RequestParts {
            method,
            uri: Uri {
                path: path.to_string(),
                ..Uri::default()
            },
            protocol_version: "1.1".to_string(),
            ..RequestParts::default()
        })
    }

    pub fn from_parts(parts: RequestParts) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            server_params: parts.server_params,
            query_params: parts.query_params,
            parsed_body: parts.parsed_body,
            body: parts.body,
            cookies: parts.cookies,
            uploaded_files: parts.uploaded_files,
            protocol_version: parts.protocol_version,
            attributes: BTreeMap::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        &self.uri.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn server_params(&self) -> &ServerParams {
        &self.server_params
    }

    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query_params
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn parsed_body(&self) -> Option<&ParsedBody> {
        self.parsed_body.as_ref()
    }

    pub fn body(&self) -> &Stream {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Stream {
        &mut self.body
    }

    /// Whole body as text, regardless of the stream position.
    pub fn body_string(&self) -> String {
        self.body.to_string_lossy()
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::Error> {
        Ok(serde_json::from_slice(self.body.as_bytes())?)
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.uploaded_files
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Derive a request with the header replaced.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Derive a request carrying an extra attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// Response
// ============================================================================

/// The capability set assertion code relies on.
///
/// Anything that can report a status, expose its headers, and hand out
/// its body bytes can be inspected by the testing crate.
pub trait ResponseParts {
    fn status(&self) -> u16;
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;
    fn body(&self) -> &[u8];
}

/// HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// Empty-bodied response with the given status.
    pub fn empty(status: u16) -> Self {
        Self::new(status)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(body.into())
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, crate::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::ok()
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Temporary (302) redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302).with_header("Location", location)
    }

    /// Permanent (301) redirect.
    pub fn redirect_permanent(location: impl Into<String>) -> Self {
        Self::new(301).with_header("Location", location)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header value without replacing existing ones.
    pub fn with_added_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl ResponseParts for Response {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}
