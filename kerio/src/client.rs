//! The protocol engine: one blocking round trip per call.
//!
//! Every call runs the same steps with no caching between them: frame the
//! request, exchange it over a fresh connection, check the status line,
//! update the session, decode the JSON-RPC reply.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kerio_proto::{Envelope, Method, Reply, Request, Response, RpcError};
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::config::{self, Application, JsonRpc};
use crate::error::{Error, Result};
use crate::profile::{Control, Profile, Upload};
use crate::session::Session;
use crate::transport::{TcpTransport, Transport};

/// Status code every exchange must return.
const HTTP_OK: u16 = 200;

/// Default connect timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// File name used when a download target has none.
const DEFAULT_FILE_NAME: &str = "file.bin";

/// Sent as `User-Agent` on JSON-RPC calls.
const USER_AGENT: &str = concat!("Kerio API Client Library for Rust/", env!("CARGO_PKG_VERSION"));

/// Builder for a [`Client`].
///
/// Defaults: endpoint from the profile, 10 s timeout, TLS on, server
/// certificates not verified.
#[must_use = "a ClientBuilder does nothing until .build() is called"]
pub struct ClientBuilder<P> {
    /// Product hooks.
    profile: P,
    /// Identity sent at login.
    application: Application,
    /// Endpoint override.
    json_rpc: Option<JsonRpc>,
    /// Connect timeout.
    timeout: Duration,
    /// Wrap connections in TLS.
    encryption: bool,
    /// Verify server certificates against webpki roots.
    verify: bool,
    /// Transport override.
    transport: Option<Box<dyn Transport>>,
}

impl<P: std::fmt::Debug> std::fmt::Debug for ClientBuilder<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("profile", &self.profile)
            .field("application", &self.application)
            .field("json_rpc", &self.json_rpc)
            .field("timeout", &self.timeout)
            .field("encryption", &self.encryption)
            .field("verify", &self.verify)
            .finish_non_exhaustive()
    }
}

impl<P: Profile> ClientBuilder<P> {
    /// Starts a builder for `profile`.
    pub fn new(profile: P) -> Self {
        Self {
            profile,
            application: Application::default(),
            json_rpc: None,
            timeout: DEFAULT_TIMEOUT,
            encryption: true,
            verify: false,
            transport: None,
        }
    }

    /// Sets the application identity (required).
    pub fn application(
        mut self,
        name: impl Into<String>,
        vendor: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.application = Application::new(name, vendor, version);
        self
    }

    /// Overrides the profile's endpoint settings.
    pub fn json_rpc(mut self, json_rpc: JsonRpc) -> Self {
        self.json_rpc = Some(json_rpc);
        self
    }

    /// Sets the connect timeout (default: 10 s).
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables TLS (default: enabled).
    pub const fn encryption(mut self, enable: bool) -> Self {
        self.encryption = enable;
        self
    }

    /// Enables or disables server certificate verification (default: off).
    pub const fn verify_certificates(mut self, enable: bool) -> Self {
        self.verify = enable;
        self
    }

    /// Replaces the socket transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Checks the configuration and creates the client.
    ///
    /// Fails with [`Error::Config`] when the application or the endpoint
    /// is undefined, or the timeout is zero.
    pub fn build(self) -> Result<Client<P>> {
        self.application.validate()?;
        let json_rpc = self.json_rpc.unwrap_or_else(|| self.profile.json_rpc());
        json_rpc.validate()?;
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be positive".into()));
        }

        let transport: Box<dyn Transport> = match self.transport {
            Some(t) => t,
            None if self.encryption => Box::new(TcpTransport::tls(self.timeout, self.verify)?),
            None => Box::new(TcpTransport::plain(self.timeout)),
        };

        let app = &self.application;
        debug!(
            "Registering application '{}' by '{}' version '{}'",
            app.name, app.vendor, app.version
        );
        debug!("Registering {json_rpc}");

        Ok(Client {
            profile: self.profile,
            application: self.application,
            json_rpc,
            hostname: String::new(),
            session: Session::new(),
            request_id: 0,
            transport,
        })
    }
}

/// Payload of one exchange.
#[derive(Debug, Clone, Copy)]
enum Body<'a> {
    /// Encoded JSON-RPC envelope.
    Rpc(&'a [u8]),
    /// Request-line target of a raw fetch.
    Fetch(&'a str),
    /// File upload.
    Upload(Upload<'a>),
}

impl Body<'_> {
    /// Request kind of this payload.
    const fn method(&self) -> Method {
        match self {
            Self::Rpc(_) => Method::Post,
            Self::Fetch(_) => Method::Get,
            Self::Upload(_) => Method::Put,
        }
    }
}

/// Outcome of a successful exchange.
#[derive(Debug)]
struct Exchange {
    /// Response body.
    body: Vec<u8>,
    /// Decoded reply; `None` for raw fetches.
    reply: Option<Reply>,
}

impl Exchange {
    /// Returns `result` of the reply, or `null`.
    fn into_result(self) -> Value {
        self.reply.map(Reply::into_result).unwrap_or_default()
    }
}

/// JSON-RPC client for one server.
///
/// Holds the endpoint, the session and the request-id counter. Calls take
/// `&mut self`, so one client serves one call at a time; use one client per
/// thread for concurrent work.
///
/// # Example
///
/// ```no_run
/// use kerio::{Client, Control};
/// use serde_json::json;
///
/// let mut api = Client::builder(Control)
///     .application("Sample application", "Company Ltd.", "1.0")
///     .build()?;
///
/// api.login("firewall.company.tld", "admin", "SecretPassword")?;
/// let users = api.send_request("Users.get", json!({"query": {"limit": 10}}))?;
/// api.logout()?;
/// # Ok::<(), kerio::Error>(())
/// ```
pub struct Client<P = Control> {
    /// Product hooks.
    profile: P,
    /// Identity sent at login.
    application: Application,
    /// Endpoint settings.
    json_rpc: JsonRpc,
    /// Server hostname; empty until login.
    hostname: String,
    /// Token and cookies.
    session: Session,
    /// Last request id handed out.
    request_id: u64,
    /// Socket transport.
    transport: Box<dyn Transport>,
}

impl<P: std::fmt::Debug> std::fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("profile", &self.profile)
            .field("json_rpc", &self.json_rpc)
            .field("hostname", &self.hostname)
            .field("request_id", &self.request_id)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl<P: Profile> Client<P> {
    /// Returns a builder for `profile`.
    pub fn builder(profile: P) -> ClientBuilder<P> {
        ClientBuilder::new(profile)
    }

    /// Returns the product profile.
    pub const fn profile(&self) -> &P {
        &self.profile
    }

    /// Returns the application identity.
    pub const fn application(&self) -> &Application {
        &self.application
    }

    /// Returns the endpoint settings.
    pub const fn json_rpc(&self) -> &JsonRpc {
        &self.json_rpc
    }

    /// Reconfigures the endpoint.
    pub fn set_json_rpc(&mut self, json_rpc: JsonRpc) -> Result<()> {
        json_rpc.validate()?;
        debug!("Registering {json_rpc}");
        self.json_rpc = json_rpc;
        Ok(())
    }

    /// Returns the current hostname.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Sets the hostname from `host[:port]`; a port overrides the endpoint port.
    pub fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        let (host, port) = config::split_host(hostname)?;
        host.clone_into(&mut self.hostname);
        if let Some(port) = port {
            self.json_rpc.port = port;
            debug!("Registering {}", self.json_rpc);
        }
        Ok(())
    }

    /// Returns the session state.
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session token, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.session.token()
    }

    /// Logs in with `Session.login` and returns the login `result`.
    ///
    /// Any previous session is discarded first.
    pub fn login(&mut self, hostname: &str, username: &str, password: &str) -> Result<Value> {
        self.clean();

        if hostname.is_empty() {
            return Err(Error::Config("Cannot login. Hostname not set.".into()));
        }
        if username.is_empty() {
            return Err(Error::Config("Cannot login. Username not set.".into()));
        }
        self.set_hostname(hostname)?;

        let params = json!({
            "userName": username,
            "password": password,
            "application": self.profile.login_application(&self.application),
        });
        let result = self.send_request("Session.login", params)?;
        self.profile.after_login(&result, &mut self.json_rpc);
        Ok(result)
    }

    /// Logs out with `Session.logout`.
    ///
    /// The session is cleared even when the call fails.
    pub fn logout(&mut self) -> Result<Value> {
        let result = self.send_request("Session.logout", Value::Null);
        self.clean();
        self.profile.after_logout(&mut self.json_rpc);
        result
    }

    /// Drops token, cookies and hostname.
    pub fn clean(&mut self) {
        self.session.reset();
        self.hostname.clear();
    }

    /// Calls `method` and returns its `result` (or `null`).
    ///
    /// `params` is omitted from the envelope when `null` or empty.
    pub fn send_request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id();
        let envelope = Envelope::new(self.json_rpc.version.as_str(), id, method)
            .token(self.session.token())
            .params(params);
        let json = envelope.to_vec()?;
        Ok(self.send(Body::Rpc(&json))?.into_result())
    }

    /// Sends a caller-built JSON-RPC document and returns the raw response body.
    pub fn send_request_json(&mut self, json: &str) -> Result<Vec<u8>> {
        Ok(self.send(Body::Rpc(json.as_bytes()))?.body)
    }

    /// Returns `result.apiVersion` of `Version.getApiVersion`.
    pub fn api_version(&mut self) -> Result<Value> {
        let mut result = self.send_request("Version.getApiVersion", Value::Null)?;
        Ok(result
            .get_mut("apiVersion")
            .map(Value::take)
            .unwrap_or_default())
    }

    /// Fetches `url` (a server path) and returns the raw body.
    pub fn get_file(&mut self, url: &str) -> Result<Vec<u8>> {
        Ok(self.send(Body::Fetch(url))?.body)
    }

    /// Fetches `url` and writes it to `directory/filename`.
    ///
    /// An empty `filename` saves as `file.bin`. Returns the written path.
    pub fn download_file(
        &mut self,
        url: &str,
        directory: impl AsRef<Path>,
        filename: &str,
    ) -> Result<PathBuf> {
        let name = if filename.is_empty() {
            DEFAULT_FILE_NAME
        } else {
            filename
        };
        let save_as = directory.as_ref().join(name);

        let data = self.get_file(url)?;
        debug!("Saving file {}", save_as.display());
        fs::write(&save_as, data).map_err(|source| Error::File {
            action: "Unable to save file",
            path: save_as.clone(),
            source,
        })?;
        Ok(save_as)
    }

    /// Reads `path` and uploads it; returns the upload `result`.
    ///
    /// `parent` is the item the file belongs to, for products that use one.
    pub fn upload_file(&mut self, path: impl AsRef<Path>, parent: Option<u64>) -> Result<Value> {
        let path = path.as_ref();
        let open_err = |source| Error::File {
            action: "Unable to open file",
            path: path.to_owned(),
            source,
        };

        let data = fs::read(path).map_err(open_err)?;
        if data.is_empty() {
            return Err(open_err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "file is empty",
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match parent {
            Some(id) => debug!("Uploading file {} to item {id}", path.display()),
            None => debug!("Uploading file {}", path.display()),
        }
        self.upload(Upload::new(&name, parent, &data))
    }

    /// Uploads in-memory content; returns the upload `result`.
    pub fn upload(&mut self, upload: Upload<'_>) -> Result<Value> {
        Ok(self.send(Body::Upload(upload))?.into_result())
    }

    /// Hands out the next request id, starting at 1.
    const fn next_id(&mut self) -> u64 {
        self.request_id += 1;
        self.request_id
    }

    /// Fully qualified endpoint URL, for error messages.
    fn remote(&self) -> String {
        let scheme = if self.transport.is_encrypted() {
            "https"
        } else {
            "http"
        };
        format!(
            "{scheme}://{}:{}{}",
            self.hostname, self.json_rpc.port, self.json_rpc.path
        )
    }

    /// Runs one exchange.
    fn send(&mut self, body: Body<'_>) -> Result<Exchange> {
        if self.hostname.is_empty() {
            return Err(Error::NotLoggedIn);
        }

        let method = body.method();
        let (request, payload) = match body {
            Body::Rpc(data) => (
                Request::rpc(&self.json_rpc.path, data, USER_AGENT),
                String::from_utf8_lossy(data).into_owned(),
            ),
            Body::Fetch(target) => (Request::fetch(target), target.to_owned()),
            Body::Upload(upload) => (
                self.profile.upload_request(&self.json_rpc, &upload),
                String::from_utf8_lossy(upload.data).into_owned(),
            ),
        };

        let raw_request = request.finish(&self.hostname, self.json_rpc.port, self.session.replay());
        trace!("→ Raw request:\n{}", String::from_utf8_lossy(&raw_request));

        let raw = self
            .transport
            .round_trip(&self.hostname, self.json_rpc.port, &raw_request)?;
        trace!("← Raw response:\n{}", String::from_utf8_lossy(&raw));

        let response = Response::parse(&raw)?;
        response.expect_status(HTTP_OK, &self.remote())?;

        let reply = match method {
            Method::Get => None,
            _ => Some(Reply::parse(response.body())?),
        };
        self.session.observe(&response, reply.as_ref());

        if let Some(fault) = reply.as_ref().and_then(Reply::fault) {
            let body = String::from_utf8_lossy(response.body()).into_owned();
            return Err(RpcError::new(fault, payload, body).into());
        }

        Ok(Exchange {
            body: response.into_body(),
            reply,
        })
    }
}

impl Client<Control> {
    /// Returns `result.constants` of `Server.getNamedConstantList`.
    pub fn constants(&mut self) -> Result<Value> {
        let mut result = self.send_request("Server.getNamedConstantList", Value::Null)?;
        Ok(result
            .get_mut("constants")
            .map(Value::take)
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kerio_proto::RpcCode;

    use super::*;
    use crate::mock::Scripted;
    use crate::profile::Samepage;

    fn control(mock: &Scripted) -> Client<Control> {
        Client::builder(Control)
            .application("Test", "Acme", "1.0")
            .transport(mock.clone())
            .build()
            .unwrap()
    }

    fn envelope(request: &str) -> Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body.trim_end()).unwrap()
    }

    #[test]
    fn builder_rejects_missing_application() {
        let err = Client::builder(Control).transport(Scripted::new()).build().unwrap_err();
        assert!(matches!(err, Error::Config(m) if m == "Application not defined."));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = Client::builder(Control)
            .application("a", "b", "c")
            .timeout(Duration::ZERO)
            .transport(Scripted::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn send_before_login_fails_without_io() {
        let mock = Scripted::new();
        let mut api = control(&mock);
        assert!(matches!(api.send_request("Foo.bar", Value::Null), Err(Error::NotLoggedIn)));
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn login_validates_arguments() {
        let mock = Scripted::new();
        let mut api = control(&mock);
        let err = api.login("", "admin", "pw").unwrap_err();
        assert_eq!(err.to_string(), "Cannot login. Hostname not set.");
        let err = api.login("fw", "", "pw").unwrap_err();
        assert_eq!(err.to_string(), "Cannot login. Username not set.");
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn login_token_is_replayed() {
        let mock = Scripted::new();
        mock.reply(
            "HTTP/1.1 200 OK\r\nSet-Cookie: SESSION_CONTROL_WEBADMIN=abc; path=/\r\n\r\n\
             {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"token\":\"T1\"}}",
        );
        mock.ok(r#"{"result":{"list":[]}}"#);
        let mut api = control(&mock);

        let result = api.login("host", "admin", "pw").unwrap();
        assert_eq!(result, json!({"token": "T1"}));
        assert_eq!(api.token(), Some("T1"));

        api.send_request("Users.get", json!({"query": {}})).unwrap();
        let sent = mock.sent();
        assert!(!sent[0].contains("X-Token"));
        assert!(sent[1].contains("X-Token: T1\r\n"));
        assert!(sent[1].contains("Cookie:  SESSION_CONTROL_WEBADMIN=abc;\r\n"));

        let login = envelope(&sent[0]);
        assert_eq!(login["method"], "Session.login");
        assert_eq!(login["params"]["userName"], "admin");
        assert_eq!(login["params"]["application"]["vendor"], "Acme");
        assert!(login.get("token").is_none());

        let call = envelope(&sent[1]);
        assert_eq!(call["token"], "T1");
        assert_eq!(call["params"], json!({"query": {}}));
    }

    #[test]
    fn request_ids_increase_from_one() {
        let mock = Scripted::new();
        for _ in 0..3 {
            mock.ok(r#"{"result":{}}"#);
        }
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();
        for _ in 0..3 {
            api.send_request("Foo.bar", Value::Null).unwrap();
        }

        let ids: Vec<u64> = mock
            .sent()
            .iter()
            .map(|r| envelope(r)["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn rpc_error_is_rendered() {
        let mock = Scripted::new();
        mock.ok(
            r#"{"error":{"message":"Bad value %0 for %1","code":-32602,
                "data":{"messageParameters":{"positionalParameters":["42","field"]}}}}"#,
        );
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let err = api.send_request("Foo.set", json!({"field": 42})).unwrap_err();
        let Error::Rpc(rpc) = err else {
            panic!("expected Rpc, got {err:?}");
        };
        assert_eq!(rpc.message(), "Bad value 42 for field");
        assert_eq!(rpc.code(), &RpcCode::Int(-32602));
        assert!(rpc.request().contains("\"method\":\"Foo.set\""));
        assert!(rpc.response().contains("positionalParameters"));
    }

    #[test]
    fn result_errors_are_rpc_errors() {
        let mock = Scripted::new();
        mock.ok(r#"{"result":{"errors":[{"message":"Item %0 locked","code":1000,"messageParameters":{"positionalParameters":["x"]}}]}}"#);
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let err = api.send_request("Foo.set", Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "Item x locked");
    }

    #[test]
    fn non_json_reply_is_invalid_response() {
        let mock = Scripted::new();
        mock.ok("<html>maintenance</html>");
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();
        assert!(matches!(
            api.send_request("Foo.bar", Value::Null),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn http_status_names_remote() {
        let mock = Scripted::new();
        mock.reply("HTTP/1.1 404 Not Found\r\n\r\n");
        let mut api = control(&mock);
        api.set_hostname("fw.example.com").unwrap();

        let err = api.send_request("Foo.bar", Value::Null).unwrap_err();
        assert!(matches!(err, Error::Protocol(kerio_proto::Error::HttpStatus { code: 404, .. })));
        assert_eq!(
            err.to_string(),
            "404 - Not Found on remote server https://fw.example.com:4081/admin/api/jsonrpc/"
        );
    }

    #[test]
    fn http_status_names_plain_remote() {
        let mock = Scripted::plain();
        mock.reply("HTTP/1.1 502 Bad Gateway\r\n\r\n");
        let mut api = control(&mock);
        api.set_hostname("fw:8080").unwrap();

        let err = api.send_request("Foo.bar", Value::Null).unwrap_err();
        assert_eq!(
            err.to_string(),
            "502 - Bad Gateway on remote server http://fw:8080/admin/api/jsonrpc/"
        );
    }

    #[test]
    fn hostname_port_overrides_endpoint() {
        let mock = Scripted::new();
        mock.ok(r#"{"result":{"apiVersion":6}}"#);
        let mut api = control(&mock);
        api.set_hostname("fw:4040").unwrap();

        assert_eq!(api.api_version().unwrap(), json!(6));
        assert_eq!(api.json_rpc().port, 4040);
        assert!(mock.sent()[0].contains("Host: fw:4040\r\n"));
    }

    #[test]
    fn logout_clears_session_even_on_failure() {
        let mock = Scripted::new();
        mock.ok(r#"{"result":{"token":"T1"}}"#);
        mock.reply("HTTP/1.1 500 Internal Server Error\r\n\r\n");
        let mut api = control(&mock);
        api.login("fw", "admin", "pw").unwrap();

        assert!(api.logout().is_err());
        assert_eq!(api.token(), None);
        assert_eq!(api.hostname(), "");
        assert!(matches!(api.send_request("Foo.bar", Value::Null), Err(Error::NotLoggedIn)));
    }

    #[test]
    fn constants_are_extracted() {
        let mock = Scripted::new();
        mock.ok(r#"{"result":{"constants":[{"name":"maxUsers","value":100}]}}"#);
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();
        assert_eq!(
            api.constants().unwrap(),
            json!([{"name": "maxUsers", "value": 100}])
        );
        assert_eq!(envelope(&mock.sent()[0])["method"], "Server.getNamedConstantList");
    }

    #[test]
    fn send_request_json_passes_body_through() {
        let mock = Scripted::new();
        mock.ok(r#"{"result":{"ok":true}}"#);
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let body = api
            .send_request_json("{\"jsonrpc\":\"2.0\",\n\"id\":9,\"method\":\"X.y\"}")
            .unwrap();
        assert_eq!(body, br#"{"result":{"ok":true}}"#);
        assert!(mock.sent()[0].ends_with("\r\n\r\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"X.y\"}\r\n"));
    }

    #[test]
    fn get_file_skips_json_decoding() {
        let mock = Scripted::new();
        mock.reply(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
        );
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        assert_eq!(api.get_file("/export/log.txt").unwrap(), b"Wikipedia");
        assert!(mock.sent()[0].starts_with("GET /export/log.txt HTTP/1.1\r\nAccept: */*\r\n"));
    }

    #[test]
    fn download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Scripted::new();
        mock.reply("HTTP/1.1 200 OK\r\n\r\nreport-bytes");
        mock.reply("HTTP/1.1 200 OK\r\n\r\nmore");
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let path = api.download_file("/dl/report", dir.path(), "report.csv").unwrap();
        assert_eq!(path, dir.path().join("report.csv"));
        assert_eq!(fs::read(&path).unwrap(), b"report-bytes");

        let path = api.download_file("/dl/other", dir.path(), "").unwrap();
        assert_eq!(path, dir.path().join("file.bin"));
    }

    #[test]
    fn download_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Scripted::new();
        mock.reply("HTTP/1.1 200 OK\r\n\r\ndata");
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let err = api
            .download_file("/dl", dir.path().join("missing"), "x.bin")
            .unwrap_err();
        assert!(matches!(err, Error::File { action: "Unable to save file", .. }));
    }

    #[test]
    fn upload_frames_single_multipart_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ten.bin");
        fs::write(&path, b"0123456789").unwrap();

        let mock = Scripted::new();
        mock.ok(r#"{"result":{"fileUpload":{"id":"upl-1"}}}"#);
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let result = api.upload_file(&path, None).unwrap();
        assert_eq!(result["fileUpload"]["id"], "upl-1");

        let sent = &mock.sent()[0];
        assert!(sent.starts_with("POST /admin/api/jsonrpc/upload/ HTTP/1.1\r\n"));
        let (head, body) = sent.split_once("\r\n\r\n").unwrap();
        assert!(head.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert_eq!(body.matches("Content-Disposition: form-data").count(), 1);
        assert!(body.contains("\r\n\r\n0123456789\r\n--"));
    }

    #[test]
    fn upload_rejection_keeps_payload() {
        let mock = Scripted::new();
        mock.ok(r#"{"result":{"errors":[{"message":"Quota of %0 exceeded","code":"quota","messageParameters":{"positionalParameters":["1 MB"]}}]}}"#);
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let err = api
            .upload(Upload::new("big.txt", None, b"payload-bytes"))
            .unwrap_err();
        let Error::Rpc(rpc) = err else {
            panic!("expected Rpc, got {err:?}");
        };
        assert_eq!(rpc.message(), "Quota of 1 MB exceeded");
        assert_eq!(rpc.code(), &RpcCode::Text("quota".into()));
        assert_eq!(rpc.request(), "payload-bytes");
        assert!(rpc.response().contains("Quota of %0 exceeded"));
    }

    #[test]
    fn upload_of_missing_or_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.bin");
        fs::write(&empty, b"").unwrap();

        let mock = Scripted::new();
        let mut api = control(&mock);
        api.set_hostname("fw").unwrap();

        let err = api.upload_file(dir.path().join("nope.bin"), None).unwrap_err();
        assert!(err.to_string().starts_with("Unable to open file "));
        assert!(api.upload_file(&empty, None).is_err());
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn samepage_tenant_scopes_calls() {
        let mock = Scripted::new();
        mock.ok(r#"{"result":{"token":"T9","tenant":"acme"}}"#);
        mock.ok(r#"{"result":{"items":[]}}"#);
        mock.ok(r#"{"result":{}}"#);
        let mut api = Client::builder(Samepage::new())
            .application("Test", "Acme", "1.0")
            .transport(mock.clone())
            .build()
            .unwrap();

        api.login("samepage.io", "user@acme.tld", "pw").unwrap();
        assert_eq!(api.profile().tenant(), Some("acme"));
        api.send_request("Items.get", Value::Null).unwrap();
        api.logout().unwrap();

        let sent = mock.sent();
        assert!(sent[0].starts_with("POST /server/data HTTP/1.1\r\n"));
        assert!(sent[0].contains("Host: samepage.io\r\n"));
        assert_eq!(envelope(&sent[0])["params"]["application"], "CLIENT");
        assert!(sent[1].starts_with("POST /acme/server/data HTTP/1.1\r\n"));
        assert_eq!(api.json_rpc().path, "/server/data");
        assert_eq!(api.profile().tenant(), None);
    }

    #[test]
    fn samepage_upload_uses_query_framing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();

        let mock = Scripted::new();
        mock.ok(r#"{"result":{"id":5}}"#);
        let mut api = Client::builder(Samepage::new())
            .application("Test", "Acme", "1.0")
            .transport(mock.clone())
            .build()
            .unwrap();
        api.set_hostname("samepage.io").unwrap();

        assert_eq!(api.upload_file(&path, Some(12)).unwrap(), json!({"id": 5}));
        let sent = &mock.sent()[0];
        assert!(sent.starts_with(
            "POST /server/data?method=Files.create&filename=notes.txt&parentId=12&lenght=5 HTTP/1.1\r\n"
        ));
        assert!(sent.ends_with("\r\n\r\nhello"));
    }
}
