use anyhow::{Context, Result};
use cellatlas_core::{
    AtlasConfig, DirectorySink, MeasurementClient, PlotState, PlotStateResolver, PublishOutcome,
    ResolveRequest, Session, TemplateAnswers, TurnOutcome,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("cellatlas")
        .version(cellatlas_core::VERSION)
        .about("Resolve classified chat turns into cell atlas plot states")
        .long_about(
            "Reads one classified request per line from stdin, e.g.\n  \
             {\"intent\":\"average.geneExpression\",\"params\":{\"organism\":\"h_sapiens\",\"organ\":\"lung\",\"features\":\"SFTPC,AGER\"}}\n\
             and prints the reply for each turn.",
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Measurement service base URL"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(u64))
                .help("Per-request timeout in seconds"),
        )
        .arg(
            Arg::new("top-n")
                .long("top-n")
                .value_parser(value_parser!(usize))
                .help("Cell types listed by highest-measurement requests"),
        )
        .arg(
            Arg::new("markers")
                .long("markers")
                .value_parser(value_parser!(usize))
                .help("Markers fetched per cell type"),
        )
        .arg(
            Arg::new("export-dir")
                .long("export-dir")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory downloads are written to"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print each turn as a JSON object including the plot state"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
}

fn load_config(matches: &ArgMatches) -> Result<AtlasConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => AtlasConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AtlasConfig::new(),
    };
    if let Some(url) = matches.get_one::<String>("api-url") {
        config = config.with_api_base_url(url.clone());
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config = config.with_timeout_secs(*secs);
    }
    if let Some(top_n) = matches.get_one::<usize>("top-n") {
        config = config.with_top_n(*top_n);
    }
    if let Some(count) = matches.get_one::<usize>("markers") {
        config = config.with_marker_count(*count);
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn render(outcome: &TurnOutcome, state: Option<&PlotState>, json: bool) -> Result<String> {
    if json {
        let value = serde_json::json!({
            "message": outcome.message,
            "published": outcome.published,
            "reset": outcome.reset,
            "downloadAvailable": outcome.download_available,
            "plotState": state,
        });
        return Ok(serde_json::to_string(&value)?);
    }

    let mut text = outcome.message.clone();
    if let (PublishOutcome::Applied, Some(state)) = (outcome.published, state) {
        text.push_str(&format!("\n  [{}: {}]", state.plot_type, state.features));
    }
    Ok(text)
}

/// Drive `session` with one request per input line; returns handled turns
async fn run<C, R, W>(session: &Session<C>, input: R, mut output: W, json: bool) -> Result<usize>
where
    C: MeasurementClient,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut turns = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: ResolveRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Skipping malformed request: {}", e);
                continue;
            }
        };

        let outcome = session.handle(&request).await;
        let state = session.current().await;
        let rendered = render(&outcome, state.as_ref(), json)?;
        output.write_all(rendered.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        turns += 1;
    }

    Ok(turns)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = load_config(&matches)?;
    let export_dir = matches
        .get_one::<PathBuf>("export-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));

    let client = cellatlas_client::connect(&config)?;
    let answers = Arc::new(TemplateAnswers::new(config.reference_link.clone()));
    let sink = Arc::new(DirectorySink::new(export_dir));
    let session = Session::new(PlotStateResolver::with_config(client, config), answers, sink);

    let stdin = BufReader::new(tokio::io::stdin());
    let turns = run(&session, stdin, tokio::io::stdout(), matches.get_flag("json")).await?;
    tracing::info!("Conversation ended after {} turns", turns);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellatlas_test_utils::{RecordingSink, ScriptedClient};

    fn session() -> Session<ScriptedClient> {
        Session::new(
            PlotStateResolver::new(ScriptedClient::atlas()),
            Arc::new(TemplateAnswers::default()),
            Arc::new(RecordingSink::new()),
        )
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atlas.toml");
        std::fs::write(&path, "api_base_url = \"https://file.example/v1\"\ntop_n = 5\n").unwrap();

        let matches = cli()
            .try_get_matches_from([
                "cellatlas",
                "--config",
                path.to_str().unwrap(),
                "--api-url",
                "http://localhost:9000",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();

        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn depth_flags_override_defaults() {
        let matches = cli()
            .try_get_matches_from(["cellatlas", "--top-n", "3", "--markers", "7"])
            .unwrap();
        let config = load_config(&matches).unwrap();

        assert_eq!(config.top_n, 3);
        assert_eq!(config.marker_count, 7);
    }

    #[test]
    fn zero_top_n_rejected() {
        let matches = cli()
            .try_get_matches_from(["cellatlas", "--top-n", "0"])
            .unwrap();
        assert!(load_config(&matches).is_err());
    }

    #[tokio::test]
    async fn json_lines_drive_session() {
        let session = session();
        let input = concat!(
            r#"{"intent":"average.geneExpression","params":{"organism":"h_sapiens","organ":"lung","features":"SFTPC"}}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"intent":"add.gene","params":{"features":"AGER"}}"#,
            "\n",
        );
        let mut output = Vec::new();

        let turns = run(&session, BufReader::new(input.as_bytes()), &mut output, true)
            .await
            .unwrap();
        assert_eq!(turns, 2);

        let text = String::from_utf8(output).unwrap();
        let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
        assert_eq!(last["published"], "applied");
        assert_eq!(last["plotState"]["features"], "SFTPC,AGER");
        assert_eq!(last["plotState"]["plotType"], "heatmap");
    }

    #[tokio::test]
    async fn text_output_names_plot() {
        let session = session();
        let input = "{\"intent\":\"organisms\"}\n";
        let mut output = Vec::new();

        run(&session, BufReader::new(input.as_bytes()), &mut output, false)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("[showOrganisms: ]"));
    }
}
