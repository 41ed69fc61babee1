use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, anyhow, bail};
use apichain::assertion::{AssertOperator, Assertion};
use apichain::chain::{ChainEngine, ChainReporter, EngineOptions, ExtractRule, RequestChain};
use apichain::definition::RequestDefinition;
use apichain::http::{Auth, Client, HttpExecutor, Method};
use apichain::metrics::{MetricsSink, MetricsStorage, PerformanceMetric, printer};
use apichain::store::{JsonFileStore, RecordStore};
use apichain::utils::{ResponseFormat, ResponseFormatter};
use apichain::variable::{AppConfig, ConfigLoader, VariableContext};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use serde_json::{Map, Value};
use tracing::debug;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

const REQUESTS_FILE: &str = "requests.json";
const CHAINS_FILE: &str = "chains.json";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Environment from apichain.toml to seed variables from
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Variable override, `key=value` (repeatable)
    #[arg(long = "var", global = true, value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Show response headers and full bodies
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send an ad hoc request: `[METHOD] URL [Header:value] [key=value] [key:=json] [q==value]`
    Send {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
    /// Save a named request
    Save(SaveArgs),
    /// List saved requests
    List,
    /// Print a saved request as JSON
    Show { name: String },
    /// Execute a saved request
    Run { name: String },
    /// Delete a saved request
    Delete { name: String },
    /// Manage and run request chains
    #[command(subcommand)]
    Chain(ChainCommands),
    /// Inspect recorded performance metrics
    #[command(subcommand)]
    Metrics(MetricsCommands),
}

#[derive(Args)]
pub struct SaveArgs {
    pub name: String,
    pub method: Method,
    pub url: String,

    /// Header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Query parameter, `key=value` (repeatable)
    #[arg(short = 'q', long = "param", value_parser = parse_var)]
    pub params: Vec<(String, String)>,

    #[arg(short = 'd', long)]
    pub body: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, conflicts_with_all = ["basic", "api_key"])]
    pub bearer: Option<String>,

    /// `username:password`
    #[arg(long, conflicts_with = "api_key")]
    pub basic: Option<String>,

    /// `Header:value`
    #[arg(long)]
    pub api_key: Option<String>,

    /// `FIELD OPERATOR [EXPECTED]`, e.g. `status equals 200` (repeatable)
    #[arg(long = "assert", value_parser = parse_assertion)]
    pub assertions: Vec<Assertion>,
}

#[derive(Subcommand)]
pub enum ChainCommands {
    /// Create or replace a chain
    Create {
        name: String,
        /// Request names, in execution order
        requests: Vec<String>,
        /// `STEP:PATH=VARIABLE`, e.g. `0:data.id=uid` (repeatable)
        #[arg(short = 'x', long = "extract", value_parser = parse_extract_rule)]
        extract: Vec<ExtractRule>,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Show { name: String },
    Run { name: String },
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum MetricsCommands {
    /// Most recent metrics, newest first
    Show {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Aggregate response times and success rate
    Stats {
        /// Only metrics for this request name
        #[arg(long)]
        endpoint: Option<String>,
    },
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn parse_header(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", s))
}

fn parse_extract_rule(s: &str) -> std::result::Result<ExtractRule, String> {
    let err = || format!("expected STEP:PATH=VARIABLE, got '{}'", s);
    let (step, rest) = s.split_once(':').ok_or_else(err)?;
    let (path, variable) = rest.split_once('=').ok_or_else(err)?;
    let step = step.trim().parse::<usize>().map_err(|_| err())?;
    if path.trim().is_empty() || variable.trim().is_empty() {
        return Err(err());
    }
    Ok(ExtractRule::new(step, path.trim(), variable.trim()))
}

fn parse_assertion(s: &str) -> std::result::Result<Assertion, String> {
    let mut parts = s.splitn(3, char::is_whitespace).filter(|p| !p.is_empty());
    let field = parts.next().ok_or("empty assertion")?;
    let op = parts.next().ok_or_else(|| format!("missing operator in '{}'", s))?;
    let operator =
        AssertOperator::parse(op).ok_or_else(|| format!("unknown operator '{}'", op))?;
    let expected = parts.next().map(|raw| {
        let raw = raw.trim();
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    });
    Ok(Assertion::new(field, operator, expected))
}

/// 命令执行所需的上下文，从配置构建一次
struct Workspace {
    config: AppConfig,
    variables: VariableContext,
    requests: Arc<JsonFileStore<RequestDefinition>>,
    metrics: Arc<MetricsStorage>,
    client: Client,
    engine: ChainEngine<Client>,
    reporter: ChainReporter,
    verbose: bool,
}

impl Workspace {
    fn open(cli: &Cli) -> Result<Self> {
        let config = ConfigLoader::find_and_load()?;
        let variables = ConfigLoader::build_context(&config, cli.env.as_deref(), &cli.vars)?;
        let data_dir = config.settings.data_dir.clone();
        debug!(data_dir = %data_dir.display(), "opening workspace");

        let requests: Arc<JsonFileStore<RequestDefinition>> =
            Arc::new(JsonFileStore::in_dir(&data_dir, REQUESTS_FILE));
        let chains: Arc<JsonFileStore<RequestChain>> =
            Arc::new(JsonFileStore::in_dir(&data_dir, CHAINS_FILE));
        let metrics = Arc::new(MetricsStorage::in_dir(&data_dir));
        let client = Client::new();

        let engine = ChainEngine::new(requests.clone(), chains, client.clone(), metrics.clone())
            .with_options(EngineOptions::from(&config.settings));

        Ok(Self {
            config,
            variables,
            requests,
            metrics,
            client,
            engine,
            reporter: ChainReporter::new(cli.verbose),
            verbose: cli.verbose,
        })
    }

    async fn send(&self, args: Vec<String>) -> Result<()> {
        let definition = parse_httpie(args)?;
        let request = definition.resolve(&self.variables);

        let start = Instant::now();
        let response = self
            .client
            .execute(&request, self.config.settings.timeout())
            .await;
        let elapsed = start.elapsed();

        let (status, size) = match &response {
            Ok(r) => (r.status.code(), Some(r.size())),
            Err(_) => (0, None),
        };
        self.metrics.record(
            PerformanceMetric::new(&request.url, status, elapsed.as_secs_f64())
                .with_sizes(Some(request.size()), size),
        );

        let response = response?;
        let format = if self.verbose {
            ResponseFormat::Verbose
        } else {
            ResponseFormat::Compact
        };
        println!("{}", ResponseFormatter::new(format).format(&response));
        Ok(())
    }

    fn save(&self, args: SaveArgs) -> Result<()> {
        let mut definition = RequestDefinition::new(&args.name, args.method, &args.url);
        for (k, v) in args.headers {
            definition = definition.with_header(k, v);
        }
        for (k, v) in args.params {
            definition = definition.with_param(k, v);
        }
        if let Some(body) = args.body {
            definition = definition.with_body(body);
        }
        if let Some(description) = args.description {
            definition = definition.with_description(description);
        }
        if let Some(auth) = auth_from_args(args.bearer, args.basic, args.api_key)? {
            definition = definition.with_auth(auth);
        }
        for assertion in args.assertions {
            definition = definition.with_assertion(assertion);
        }

        self.requests.put(definition)?;
        println!("{} Saved request '{}'", "✓".green(), args.name);
        Ok(())
    }

    fn list(&self) -> Result<()> {
        let requests = self.requests.list()?;
        if requests.is_empty() {
            println!("No saved requests");
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Name", "Method", "URL", "Description"]);
        for r in requests {
            table.add_row(vec![
                r.name,
                r.method.to_string(),
                r.url,
                r.description.unwrap_or_default(),
            ]);
        }
        println!("{}", table);
        Ok(())
    }

    fn show(&self, name: &str) -> Result<()> {
        let definition = self
            .requests
            .get(name)?
            .ok_or_else(|| anyhow!("request '{}' not found", name))?;
        println!("{}", serde_json::to_string_pretty(&definition)?);
        Ok(())
    }

    async fn run(&self, name: &str) -> Result<()> {
        let run = self.engine.run_request(name, &self.variables).await?;
        self.reporter.print_request_run(&run);
        if run.result.assertions.iter().any(|a| !a.passed) {
            bail!("assertions failed for '{}'", name);
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        if !self.requests.delete(name)? {
            bail!("request '{}' not found", name);
        }
        println!("{} Deleted request '{}'", "✓".green(), name);
        Ok(())
    }

    async fn chain(&self, command: ChainCommands) -> Result<()> {
        match command {
            ChainCommands::Create {
                name,
                requests,
                extract,
                description,
            } => {
                let chain = self.engine.create_chain(&name, requests, extract, description)?;
                println!(
                    "{} Chain '{}' saved with {} requests",
                    "✓".green(),
                    chain.name,
                    chain.requests.len()
                );
            }
            ChainCommands::List => {
                let chains = self.engine.list_chains()?;
                if chains.is_empty() {
                    println!("No chains");
                    return Ok(());
                }
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_header(vec!["Name", "Requests", "Extract Rules", "Description"]);
                for c in chains {
                    table.add_row(vec![
                        c.name,
                        c.requests.join(" → "),
                        c.extract_rules.len().to_string(),
                        c.description.unwrap_or_default(),
                    ]);
                }
                println!("{}", table);
            }
            ChainCommands::Show { name } => {
                let chain = self
                    .engine
                    .get_chain(&name)?
                    .ok_or_else(|| anyhow!("chain '{}' not found", name))?;
                println!("{}", serde_json::to_string_pretty(&chain)?);
            }
            ChainCommands::Run { name } => {
                let steps = self.engine.get_chain(&name)?.map_or(0, |c| c.requests.len());
                self.reporter.print_header(&name, steps);
                let execution = self
                    .engine
                    .execute_chain_with(&name, &self.variables)
                    .await?;
                self.reporter.print_execution(&execution);
                if let Some(reason) = execution.status.reason() {
                    bail!("chain '{}' did not complete: {}", name, reason);
                }
            }
            ChainCommands::Delete { name } => {
                if !self.engine.delete_chain(&name)? {
                    bail!("chain '{}' not found", name);
                }
                println!("{} Deleted chain '{}'", "✓".green(), name);
            }
        }
        Ok(())
    }

    fn metrics(&self, command: MetricsCommands) -> Result<()> {
        let log = self.metrics.load()?;
        match command {
            MetricsCommands::Show { limit } => printer::print_metrics(&log, limit),
            MetricsCommands::Stats { endpoint } => {
                printer::print_stats(&log.stats(endpoint.as_deref()), endpoint.as_deref())
            }
        }
        Ok(())
    }
}

fn auth_from_args(
    bearer: Option<String>,
    basic: Option<String>,
    api_key: Option<String>,
) -> Result<Option<Auth>> {
    if let Some(token) = bearer {
        return Ok(Some(Auth::Bearer { token }));
    }
    if let Some(basic) = basic {
        let (username, password) = basic
            .split_once(':')
            .context("--basic expects username:password")?;
        return Ok(Some(Auth::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }));
    }
    if let Some(api_key) = api_key {
        let (header, value) = parse_header(&api_key).map_err(|e| anyhow!(e))?;
        return Ok(Some(Auth::ApiKey { header, value }));
    }
    Ok(None)
}

/// 判断参数是否为键值对参数（headers, query, body）
/// URL 格式不算键值对：`http://`、`:/path`、`:port`、`host:port`
fn is_key_value_param(arg: &str) -> bool {
    if arg.contains("://") || arg.starts_with(":/") {
        return false;
    }
    if let Some(port) = arg.strip_prefix(':')
        && !port.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }
    if let Some((host, port)) = arg.rsplit_once(':')
        && !host.is_empty()
        && !port.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }

    arg.contains('=') || arg.contains(':')
}

/// 解析 httpie 风格参数：`==` 查询参数，`:=` JSON 字段，`=` 字符串字段，
/// `:` 请求头。有 body 字段时默认方法由 GET 变为 POST
fn parse_httpie(args: Vec<String>) -> Result<RequestDefinition> {
    let mut args = args.into_iter().peekable();

    let mut method = None;
    if let Some(first) = args.peek()
        && let Ok(m) = first.parse::<Method>()
    {
        method = Some(m);
        args.next();
    }

    let url = match args.next_if(|a| !is_key_value_param(a)) {
        Some(url) => url,
        None => bail!("URL is required"),
    };

    let mut definition = RequestDefinition::new("adhoc", Method::Get, url);
    let mut body = Map::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once("==") {
            definition = definition.with_param(key, value);
        } else if let Some((key, value)) = arg.split_once(":=") {
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
            body.insert(key.to_string(), value);
        } else if let Some((key, value)) = arg.split_once('=') {
            body.insert(key.to_string(), Value::String(value.to_string()));
        } else if let Some((key, value)) = arg.split_once(':') {
            definition = definition.with_header(key.trim(), value.trim());
        } else {
            bail!("unrecognized request item '{}'", arg);
        }
    }

    definition.method = match method {
        Some(m) => m,
        None if !body.is_empty() => Method::Post,
        None => Method::Get,
    };
    if !body.is_empty() {
        definition = definition.with_body(Value::Object(body).to_string());
    }

    Ok(definition)
}

pub async fn run(cli: Cli) -> Result<()> {
    let workspace = Workspace::open(&cli)?;

    match cli.command {
        Commands::Send { args } => workspace.send(args).await,
        Commands::Save(args) => workspace.save(args),
        Commands::List => workspace.list(),
        Commands::Show { name } => workspace.show(&name),
        Commands::Run { name } => workspace.run(&name).await,
        Commands::Delete { name } => workspace.delete(&name),
        Commands::Chain(command) => workspace.chain(command).await,
        Commands::Metrics(command) => workspace.metrics(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_httpie() {
        let def = parse_httpie(args(&[
            "POST",
            "example.com",
            "id:=1",
            "name=foo",
            "token:123",
            "q==search",
        ]))
        .unwrap();
        assert_eq!(def.method, Method::Post);
        assert_eq!(def.url, "example.com");
        assert_eq!(def.headers.get("token").map(String::as_str), Some("123"));
        assert_eq!(def.params.get("q").map(String::as_str), Some("search"));
        assert_eq!(def.body.as_deref(), Some(r#"{"id":1,"name":"foo"}"#));
    }

    #[test]
    fn test_parse_httpie_implicit_method() {
        let def = parse_httpie(args(&["example.com", "name=foo"])).unwrap();
        assert_eq!(def.method, Method::Post);

        let def = parse_httpie(args(&[":3000/health"])).unwrap();
        assert_eq!(def.method, Method::Get);
        assert!(def.body.is_none());

        let def = parse_httpie(args(&["DELETE", "localhost:8080/items/1", "x:=1"])).unwrap();
        assert_eq!(def.method, Method::Delete);
    }

    #[test]
    fn test_parse_httpie_requires_url() {
        assert!(parse_httpie(args(&["GET", "name=foo"])).is_err());
        assert!(parse_httpie(vec![]).is_err());
    }

    #[test]
    fn test_is_key_value_param() {
        assert!(!is_key_value_param("http://example.com"));
        assert!(!is_key_value_param("https://example.com/api"));
        assert!(!is_key_value_param(":/api/users"));
        assert!(!is_key_value_param(":3000"));
        assert!(!is_key_value_param("localhost:3000"));
        assert!(!is_key_value_param("192.168.1.1:9000"));

        assert!(is_key_value_param("key=value"));
        assert!(is_key_value_param("q==search"));
        assert!(is_key_value_param("id:=123"));
        assert!(is_key_value_param("Content-Type:application/json"));
    }

    #[test]
    fn test_parse_extract_rule() {
        assert_eq!(
            parse_extract_rule("0:data.id=uid").unwrap(),
            ExtractRule::new(0, "data.id", "uid")
        );
        assert_eq!(
            parse_extract_rule("2:items.0.token=tok").unwrap(),
            ExtractRule::new(2, "items.0.token", "tok")
        );
        assert!(parse_extract_rule("x:data=uid").is_err());
        assert!(parse_extract_rule("0:data.id").is_err());
        assert!(parse_extract_rule("0:=uid").is_err());
    }

    #[test]
    fn test_parse_assertion() {
        let a = parse_assertion("status equals 200").unwrap();
        assert_eq!(a.field, "status");
        assert_eq!(a.operator, AssertOperator::Equals);
        assert_eq!(a.expected, Some(Value::from(200)));

        let a = parse_assertion("data.name contains bob smith").unwrap();
        assert_eq!(a.expected, Some(Value::String("bob smith".to_string())));

        let a = parse_assertion("data.id exists").unwrap();
        assert_eq!(a.expected, None);

        assert!(parse_assertion("status").is_err());
        assert!(parse_assertion("status approx 200").is_err());
    }

    #[test]
    fn test_auth_from_args() {
        assert_eq!(
            auth_from_args(None, Some("u:p".into()), None).unwrap(),
            Some(Auth::Basic {
                username: "u".into(),
                password: "p".into()
            })
        );
        assert_eq!(
            auth_from_args(None, None, Some("X-Api-Key: k".into())).unwrap(),
            Some(Auth::ApiKey {
                header: "X-Api-Key".into(),
                value: "k".into()
            })
        );
        assert!(auth_from_args(None, Some("nopass".into()), None).is_err());
        assert_eq!(auth_from_args(None, None, None).unwrap(), None);
    }

    #[test]
    fn test_cli_parses_chain_create() {
        let cli = Cli::try_parse_from([
            "apichain",
            "--var",
            "base=http://h",
            "chain",
            "create",
            "signup",
            "create-user",
            "get-user",
            "-x",
            "0:data.id=uid",
        ])
        .unwrap();
        assert_eq!(cli.vars, vec![("base".to_string(), "http://h".to_string())]);
        match cli.command {
            Commands::Chain(ChainCommands::Create {
                name,
                requests,
                extract,
                ..
            }) => {
                assert_eq!(name, "signup");
                assert_eq!(requests, vec!["create-user", "get-user"]);
                assert_eq!(extract, vec![ExtractRule::new(0, "data.id", "uid")]);
            }
            _ => panic!("expected chain create"),
        }
    }
}
