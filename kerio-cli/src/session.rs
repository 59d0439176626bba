//! Connection flags and the login/act/logout cycle.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use kerio::{Client, Control, Profile, Samepage};
use serde_json::Value;
use tracing::warn;

/// Product behind the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Product {
    /// Kerio Control firewall.
    #[default]
    Control,
    /// Samepage collaboration platform.
    Samepage,
}

/// Where and how to connect.
#[derive(Debug, clap::Args)]
pub struct Connection {
    /// Server hostname, optionally with `:port`.
    #[arg(long, env = "KERIO_HOST", global = true)]
    pub host: Option<String>,

    /// Login name.
    #[arg(long, env = "KERIO_USER", global = true)]
    pub user: Option<String>,

    /// Login password.
    #[arg(long, env = "KERIO_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Target product.
    #[arg(long, env = "KERIO_PRODUCT", value_enum, default_value_t, global = true)]
    pub product: Product,

    /// JSON-RPC port (default: product default).
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Connect timeout in seconds.
    #[arg(long, default_value_t = 10, global = true)]
    pub timeout: u64,

    /// Talk plain HTTP instead of HTTPS.
    #[arg(long, global = true)]
    pub insecure_http: bool,
}

/// One unit of work done between login and logout.
#[derive(Debug)]
pub enum Action {
    Call { method: String, params: Value },
    ApiVersion,
    Constants,
    Download { url: String, dir: PathBuf, name: String },
    Upload { path: PathBuf, parent: Option<u64> },
}

impl Connection {
    /// Logs in, performs `action`, logs out and returns what to print.
    pub fn run(&self, action: Action) -> Result<Value> {
        match self.product {
            Product::Control => self.session(Control, |api| match action {
                Action::Constants => api.constants(),
                other => perform(api, other),
            }),
            Product::Samepage => {
                if matches!(action, Action::Constants) {
                    bail!("constants is only available with --product control");
                }
                self.session(Samepage::new(), |api| perform(api, action))
            }
        }
    }

    fn session<P: Profile>(
        &self,
        profile: P,
        f: impl FnOnce(&mut Client<P>) -> kerio::Result<Value>,
    ) -> Result<Value> {
        let host = self
            .host
            .as_deref()
            .context("no host given (use --host or KERIO_HOST)")?;
        let user = self
            .user
            .as_deref()
            .context("no user given (use --user or KERIO_USER)")?;

        let mut json_rpc = profile.json_rpc();
        if let Some(port) = self.port {
            json_rpc.port = port;
        }
        let mut api = Client::builder(profile)
            .application("kerio-cli", "qntx", env!("CARGO_PKG_VERSION"))
            .json_rpc(json_rpc)
            .timeout(Duration::from_secs(self.timeout))
            .encryption(!self.insecure_http)
            .build()?;

        api.login(host, user, self.password.as_deref().unwrap_or_default())
            .with_context(|| format!("login to {host} failed"))?;
        let outcome = f(&mut api);
        if let Err(e) = api.logout() {
            warn!("logout failed: {e}");
        }
        Ok(outcome?)
    }
}

/// Runs a product-independent action.
fn perform<P: Profile>(api: &mut Client<P>, action: Action) -> kerio::Result<Value> {
    match action {
        Action::Call { method, params } => api.send_request(&method, params),
        Action::ApiVersion => api.api_version(),
        Action::Download { url, dir, name } => {
            let path = api.download_file(&url, dir, &name)?;
            Ok(Value::from(path.display().to_string()))
        }
        Action::Upload { path, parent } => api.upload_file(path, parent),
        Action::Constants => Err(kerio::Error::Config(
            "constants is only available for Kerio Control".into(),
        )),
    }
}
