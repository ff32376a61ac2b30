//! Crest demo runner.
//!
//! Mounts an in-memory `users` collection and executes a JSON-lines
//! request script against it, one outcome per output line.
//!
//! ```text
//! {"type":"create","path":"users","content":{"name":"alice"},"id":"alice"}
//! {"type":"read","path":"users/alice","fields":["/name"]}
//! {"type":"query","path":"users","filter":"/name sw \"a\"","sort":"-/name","pageSize":2}
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crest_router::config::{load_config, CrestConfig};
use crest_router::filter::{Filter, FilterChain, TracingFilter};
use crest_router::handler::dispatch;
use crest_router::json::{PatchOperation, QueryFilter, SortKey};
use crest_router::observability::{logging, metrics};
use crest_router::request::{
    ActionRequest, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, ReadRequest, Request,
    RequestType, ResourceRequest, UpdateRequest,
};
use crest_router::response::{CountPolicy, ResourceResponse};
use crest_router::{
    new_internal_connection, Context, InternalConnection, MemoryBackend, ResourceError,
    ResourcePath, ResourceResult, Router, Version,
};

#[derive(Parser)]
#[command(name = "crest")]
#[command(about = "Run a request script against an in-memory resource router", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines request script; stdin if omitted
    #[arg(short, long)]
    script: Option<PathBuf>,
}

/// One request of a script.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptLine {
    #[serde(rename = "type")]
    request_type: RequestType,
    path: String,
    #[serde(default)]
    content: Value,
    id: Option<String>,
    revision: Option<String>,
    action: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
    version: Option<String>,
    #[serde(default)]
    operations: Vec<PatchOperation>,
    filter: Option<String>,
    sort: Option<String>,
    #[serde(default)]
    page_size: usize,
    cookie: Option<String>,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    count: CountPolicy,
}

impl ScriptLine {
    fn into_request(self) -> ResourceResult<Request> {
        let path = ResourcePath::parse(&self.path)?;
        let mut request: Request = match self.request_type {
            RequestType::Action => {
                let action = self.action.ok_or_else(|| {
                    ResourceError::BadRequest("Action requests need an action".into())
                })?;
                ActionRequest::new(path, action).with_content(self.content).into()
            }
            RequestType::Create => {
                let mut create = CreateRequest::new(path, self.content);
                if let Some(id) = self.id {
                    create = create.with_new_resource_id(id);
                }
                create.into()
            }
            RequestType::Read => ReadRequest::new(path).into(),
            RequestType::Update => {
                let mut update = UpdateRequest::new(path, self.content);
                update.revision = self.revision;
                update.into()
            }
            RequestType::Delete => {
                let mut delete = DeleteRequest::new(path);
                delete.revision = self.revision;
                delete.into()
            }
            RequestType::Patch => {
                let mut patch = PatchRequest::new(path, self.operations);
                patch.revision = self.revision;
                patch.into()
            }
            RequestType::Query => {
                let mut query = QueryRequest::new(path)
                    .with_page_size(self.page_size)
                    .with_paged_results_offset(self.offset)
                    .with_total_paged_results_policy(self.count);
                if let Some(filter) = self.filter.as_deref() {
                    query.query_filter = Some(QueryFilter::parse(filter)?);
                }
                if let Some(sort) = self.sort.as_deref() {
                    query.sort_keys = SortKey::parse_list(sort)?;
                }
                query.paged_results_cookie = self.cookie;
                query.into()
            }
        };
        let base = request.as_resource_request_mut();
        for field in &self.fields {
            base.add_field(field.as_str().into());
        }
        if let Some(version) = self.version.as_deref() {
            base.set_resource_version(Some(Version::parse(version)?));
        }
        Ok(request)
    }
}

async fn execute(connection: &InternalConnection, line: &str) -> Value {
    let request = match serde_json::from_str::<ScriptLine>(line) {
        Ok(parsed) => parsed.into_request(),
        Err(e) => Err(ResourceError::BadRequest(format!("Malformed script line: {e}"))),
    };
    let request = match request {
        Ok(request) => request,
        Err(e) => return json!({ "error": e.to_json() }),
    };

    let mut resources = Vec::new();
    let mut collect = |resource: ResourceResponse| {
        resources.push(resource.to_json());
        true
    };
    match dispatch(connection.handler().as_ref(), &Context::root(), request, &mut collect).await {
        Ok(response) if resources.is_empty() => json!({ "result": response.to_json() }),
        Ok(response) => json!({ "result": response.to_json(), "resources": resources }),
        Err(e) => json!({ "error": e.to_json() }),
    }
}

async fn run_script<R>(connection: &InternalConnection, input: R) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut executed = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        println!("{}", execute(connection, line).await);
        executed += 1;
    }
    Ok(executed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CrestConfig::default(),
    };
    logging::init_logging(&config.observability);
    metrics::set_enabled(config.observability.metrics_enabled);

    tracing::info!(
        log_level = %config.observability.log_level,
        page_size_limit = config.backend.page_size_limit,
        "Configuration loaded"
    );

    let router = Router::new();
    router.set_default_version_behaviour(config.versioning.default_behaviour);
    router.add_collection("users", MemoryBackend::from_config(&config.backend))?;
    let chain = FilterChain::new(router, vec![Arc::new(TracingFilter::new()) as Arc<dyn Filter>]);
    let connection = new_internal_connection(chain).with_config(&config.connection);

    let executed = match &cli.script {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            run_script(&connection, BufReader::new(file)).await?
        }
        None => run_script(&connection, BufReader::new(tokio::io::stdin())).await?,
    };

    tracing::info!(executed, "Script complete");
    Ok(())
}
