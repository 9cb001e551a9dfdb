use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbor_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider kinds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Closed set of catalog providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Airflow,
    Datahub,
    Dbt,
    Looker,
    Redash,
    S3,
    Datazone,
    Jira,
    AzureBlob,
    AzureDataFactory,
    Atlan,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Airflow => "airflow",
            Self::Datahub => "datahub",
            Self::Dbt => "dbt",
            Self::Looker => "looker",
            Self::Redash => "redash",
            Self::S3 => "s3",
            Self::Datazone => "datazone",
            Self::Jira => "jira",
            Self::AzureBlob => "azure_blob",
            Self::AzureDataFactory => "azure_data_factory",
            Self::Atlan => "atlan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "airflow" => Some(Self::Airflow),
            "datahub" => Some(Self::Datahub),
            "dbt" => Some(Self::Dbt),
            "looker" => Some(Self::Looker),
            "redash" => Some(Self::Redash),
            "s3" => Some(Self::S3),
            "datazone" => Some(Self::Datazone),
            "jira" => Some(Self::Jira),
            "azure_blob" => Some(Self::AzureBlob),
            "azure_data_factory" => Some(Self::AzureDataFactory),
            "atlan" => Some(Self::Atlan),
            _ => None,
        }
    }

    /// Config keys the constructor requires for this provider.
    fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Airflow => &["base_url", "username", "password"],
            Self::Datahub => &["base_url", "token"],
            Self::Dbt => &["base_url", "account_id", "token"],
            Self::Looker => &["base_url", "client_id", "client_secret"],
            Self::Redash => &["base_url", "api_key"],
            Self::S3 => &["bucket"],
            Self::Datazone => &["domain_id", "region"],
            Self::Jira => &["base_url", "email", "api_token"],
            Self::AzureBlob => &["account_name", "container"],
            Self::AzureDataFactory => &["subscription_id", "resource_group", "factory_name"],
            Self::Atlan => &["base_url", "api_key"],
        }
    }

    /// Enumerated operations and their HTTP mapping. Anything outside this
    /// table is rejected at the module boundary.
    fn operation_route(self, operation: &str) -> Option<(reqwest::Method, &'static str)> {
        use reqwest::Method;
        match (self, operation) {
            (Self::Airflow, "list_dags") => Some((Method::GET, "/api/v1/dags")),
            (Self::Airflow, "get_dag") => Some((Method::GET, "/api/v1/dags/{dag_id}")),
            (Self::Airflow, "list_dag_runs") => {
                Some((Method::GET, "/api/v1/dags/{dag_id}/dagRuns"))
            }
            (Self::Datahub, "search") => Some((Method::POST, "/api/graphql")),
            (Self::Datahub, "get_entity") => Some((Method::GET, "/entities/{urn}")),
            (Self::Dbt, "list_jobs") => Some((Method::GET, "/api/v2/accounts/{account_id}/jobs/")),
            (Self::Dbt, "get_run") => {
                Some((Method::GET, "/api/v2/accounts/{account_id}/runs/{run_id}/"))
            }
            (Self::Looker, "list_dashboards") => Some((Method::GET, "/api/4.0/dashboards")),
            (Self::Looker, "run_query") => {
                Some((Method::POST, "/api/4.0/queries/run/json"))
            }
            (Self::Redash, "list_queries") => Some((Method::GET, "/api/queries")),
            (Self::Redash, "run_query") => {
                Some((Method::POST, "/api/queries/{query_id}/results"))
            }
            (Self::S3, "list_objects") => Some((Method::GET, "/{bucket}")),
            (Self::Datazone, "list_assets") => Some((Method::GET, "/domains/{domain_id}/assets")),
            (Self::Jira, "search_issues") => Some((Method::GET, "/rest/api/3/search")),
            (Self::Jira, "get_issue") => Some((Method::GET, "/rest/api/3/issue/{issue_key}")),
            (Self::AzureBlob, "list_blobs") => Some((Method::GET, "/{container}")),
            (Self::AzureDataFactory, "list_pipelines") => Some((
                Method::GET,
                "/subscriptions/{subscription_id}/resourceGroups/{resource_group}\
                 /providers/Microsoft.DataFactory/factories/{factory_name}/pipelines",
            )),
            (Self::Atlan, "search_assets") => Some((Method::POST, "/api/meta/search/indexsearch")),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A live connection to one provider for one project. Uniform contract:
/// `initialize`, `call(operation, args)`, `cleanup`.
#[derive(Debug)]
pub struct ProviderClient {
    kind: ProviderKind,
    config: Value,
    http: reqwest::Client,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl ProviderClient {
    /// Construct a client, validating the provider's required config keys.
    pub fn new(kind: ProviderKind, config: Value) -> Result<Self> {
        let missing: Vec<&str> = kind
            .required_fields()
            .iter()
            .copied()
            .filter(|field| {
                config
                    .get(field)
                    .and_then(Value::as_str)
                    .map(str::is_empty)
                    .unwrap_or(true)
            })
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "{kind} config missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(Self {
            kind,
            config,
            http: reqwest::Client::new(),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Prepare the client for calls.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Other(format!("{} client is closed", self.kind)));
        }
        self.initialized.store(true, Ordering::Release);
        tracing::debug!(provider = %self.kind, "provider client initialized");
        Ok(())
    }

    /// Dispatch one enumerated operation. Path parameters are filled from
    /// `args` (falling back to config values); POST operations send the
    /// remaining args as the JSON body.
    pub async fn call(&self, operation: &str, args: &Value) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::Other(format!("{} client is closed", self.kind)));
        }
        if !self.is_initialized() {
            return Err(Error::Other(format!(
                "{} client used before initialize",
                self.kind
            )));
        }
        let (method, path_template) = self.kind.operation_route(operation).ok_or_else(|| {
            Error::Validation(format!(
                "operation '{operation}' is not supported by provider {}",
                self.kind
            ))
        })?;

        let path = self.fill_path(path_template, args)?;
        let base = self
            .config
            .get("base_url")
            .and_then(Value::as_str)
            .unwrap_or("");
        let url = format!("{}{}", base.trim_end_matches('/'), path);

        let mut request = self.http.request(method.clone(), &url);
        request = self.apply_auth(request);
        if method == reqwest::Method::POST {
            request = request.json(args);
        }

        tracing::debug!(provider = %self.kind, operation, %url, "provider call");
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}:{operation}: {e}", self.kind)))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or_else(|_| Value::Object(Default::default()));
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "{}:{operation} returned {status}",
                self.kind
            )));
        }
        Ok(body)
    }

    /// Release the connection. Safe to call repeatedly.
    pub fn cleanup(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(provider = %self.kind, "provider client cleaned up");
        }
    }

    fn fill_path(&self, template: &str, args: &Value) -> Result<String> {
        let mut path = String::new();
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            let end = rest[start..]
                .find('}')
                .map(|i| start + i)
                .ok_or_else(|| Error::Other("malformed operation route".into()))?;
            path.push_str(&rest[..start]);
            let param = &rest[start + 1..end];
            let value = args
                .get(param)
                .or_else(|| self.config.get(param))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::Validation(format!("missing '{param}' argument for provider call"))
                })?;
            path.push_str(value);
            rest = &rest[end + 1..];
        }
        path.push_str(rest);
        Ok(path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let get = |key: &str| self.config.get(key).and_then(Value::as_str);
        if let Some(token) = get("token").or_else(|| get("api_key")).or_else(|| get("api_token")) {
            return request.bearer_auth(token);
        }
        if let (Some(user), Some(pass)) = (
            get("username").or_else(|| get("email")).or_else(|| get("client_id")),
            get("password").or_else(|| get("client_secret")),
        ) {
            return request.basic_auth(user, Some(pass));
        }
        request
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
