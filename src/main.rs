// src/main.rs

use anyhow::{anyhow, Context, Result};
use arrow::{json::LineDelimitedWriter, util::pretty::pretty_format_batches};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pulsedash::{
    config::PulseConfig,
    geo::{self, Boundaries},
    pipeline::{
        bounds, distinct, AggSpec, FilterContext, Outcome, Query, QueryResult, Rank, Ratio,
        Selection, TopChart, Value,
    },
    schema::{Category, Dimension},
    source, Session,
};
use reqwest::Client;
use std::{io::Write, path::PathBuf, sync::Arc};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "pulsedash", about = "Filter, aggregate and rank payment-platform record tables.")]
struct Cli {
    /// YAML config file. Defaults to `pulsedash.yaml` when present.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

/// Dimension selections. Each takes `All`, a value, `a,b,c` or `lo..hi`.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    quarter: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    transaction_type: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    pincode: Option<String>,
}

impl FilterArgs {
    fn context(&self) -> FilterContext {
        let given = [
            (Dimension::Year, &self.year),
            (Dimension::Quarter, &self.quarter),
            (Dimension::State, &self.state),
            (Dimension::TransactionType, &self.transaction_type),
            (Dimension::District, &self.district),
            (Dimension::Brand, &self.brand),
            (Dimension::Pincode, &self.pincode),
        ];
        given
            .into_iter()
            .filter_map(|(dim, text)| text.as_deref().map(|t| (dim, Selection::parse(t))))
            .fold(FilterContext::new(), |ctx, (dim, sel)| ctx.with(dim, sel))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run an explicit filter → ratio → group → ratio → rank chain.
    Query {
        category: Category,
        #[command(flatten)]
        filters: FilterArgs,
        /// Group key columns, comma separated.
        #[arg(long, value_delimiter = ',')]
        group_by: Vec<String>,
        /// `column:op[:alias]`, op one of sum, mean, count, nunique. Repeatable.
        #[arg(long = "agg")]
        aggs: Vec<AggSpec>,
        /// Row-level ratio `A/B[:name]`, computed before grouping.
        #[arg(long)]
        ratio: Option<Ratio>,
        /// Group-level ratio `A/B[:name]`, computed after grouping.
        #[arg(long)]
        group_ratio: Option<Ratio>,
        #[arg(long, conflicts_with = "bottom")]
        top: Option<usize>,
        #[arg(long)]
        bottom: Option<usize>,
        /// Column to rank by. Defaults to the last aggregate.
        #[arg(long)]
        rank_by: Option<String>,
    },
    /// Per-category overview, or the drill-down view once one state is selected.
    Explore {
        category: Category,
        #[command(flatten)]
        filters: FilterArgs,
        /// Group by the drill-down key even without a single state.
        #[arg(long)]
        drill_down: bool,
    },
    /// Range and distinct values of a column over the whole table.
    Bounds { category: Category, column: String },
    /// One of the ten top-chart questions (1-10).
    Chart {
        question: usize,
        #[command(flatten)]
        filters: FilterArgs,
        /// Rows per ranked panel. Defaults to the configured `top_n`.
        #[arg(long)]
        n: Option<usize>,
    },
    /// State totals keyed by canonical region name.
    Regions {
        category: Category,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Rows with usable coordinates, for point maps.
    Points {
        category: Category,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Fetch the boundary set and list names the region table cannot match.
    Boundaries {
        #[arg(long)]
        url: Option<Url>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PulseConfig::load(cli.config.as_deref())?;

    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!(source = ?config.source, "startup");

    let session = Arc::new(Session::new(source::open(&config.source)));
    let format = cli.format;

    match cli.command {
        Command::Query {
            category,
            filters,
            group_by,
            aggs,
            ratio,
            group_ratio,
            top,
            bottom,
            rank_by,
        } => {
            let descriptor = category.descriptor();
            let mut query = Query::new().filters(filters.context().predicates_for(&descriptor));
            if let Some(r) = ratio {
                query = query.row_ratio(r);
            }
            if !group_by.is_empty() || !aggs.is_empty() {
                let aggs = if aggs.is_empty() {
                    descriptor
                        .measures()
                        .map(|m| AggSpec::new(m.name(), m.default_op()))
                        .collect()
                } else {
                    aggs
                };
                query = query.group_by(group_by, aggs);
            }
            let rank_column = rank_by.or_else(|| {
                group_ratio
                    .as_ref()
                    .map(|r| r.output.clone())
                    .or_else(|| {
                        query
                            .aggregation
                            .as_ref()
                            .and_then(|a| a.specs.last())
                            .map(|s| s.output_name().to_string())
                    })
            });
            if let Some(r) = group_ratio {
                query = query.group_ratio(r);
            }
            if let Some((n, top)) = top.map(|n| (n, true)).or(bottom.map(|n| (n, false))) {
                let column = rank_column
                    .ok_or_else(|| anyhow!("--top/--bottom needs --rank-by without --agg"))?;
                query = query.rank(if top {
                    Rank::top(column, n)
                } else {
                    Rank::bottom(column, n)
                });
            }
            load(&session, vec![category]).await?;
            let result = session.query(category, &query)?;
            emit(format, None, &result)?;
        }

        Command::Explore {
            category,
            filters,
            drill_down,
        } => {
            let descriptor = category.descriptor();
            let ctx = filters.context();
            let query = if drill_down || ctx.single_state().is_some() {
                Query::drill_down(&descriptor, &ctx)
            } else {
                Query::overview(&descriptor, &ctx)
            };
            load(&session, vec![category]).await?;
            let result = session.query(category, &query)?;
            emit(format, Some(category.table_name()), &result)?;
        }

        Command::Bounds { category, column } => {
            load(&session, vec![category]).await?;
            let table = session.table(category)?;
            let range = bounds(table.batch(), &column)?;
            let values = distinct(table.batch(), &column)?;
            print_bounds(format, &column, range, &values)?;
        }

        Command::Chart {
            question,
            filters,
            n,
        } => {
            let chart = TopChart::from_number(question)
                .ok_or_else(|| anyhow!("question must be 1-10, got {}", question))?;
            let category = chart.category();
            let descriptor = category.descriptor();
            let mut ctx = filters.context();
            let state = ctx.single_state().map(ToString::to_string);
            if chart.needs_state() {
                // the panels carry the state themselves
                ctx = ctx.with(Dimension::State, Selection::All);
            }
            let panels = chart.panels(state.as_deref(), n.unwrap_or(config.top_n))?;

            load(&session, vec![category]).await?;
            println!("{}", chart);
            for panel in panels {
                let query = panel.query.filters(ctx.predicates_for(&descriptor));
                let result = session.query(category, &query)?;
                emit(format, Some(&panel.heading), &result)?;
            }
        }

        Command::Regions { category, filters } => {
            let descriptor = category.descriptor();
            let specs: Vec<AggSpec> = descriptor
                .measures()
                .map(|m| AggSpec::new(m.name(), m.default_op()))
                .collect();
            let query = Query::new().filters(filters.context().predicates_for(&descriptor));
            load(&session, vec![category]).await?;
            let filtered = session.query(category, &query)?;
            let rows = filtered.outcome.into_batch();
            let mut result = geo::region_totals(&rows, Dimension::State.name(), &specs)?;
            result.notices.splice(0..0, filtered.notices);
            emit(format, None, &result)?;
        }

        Command::Points { category, filters } => {
            let descriptor = category.descriptor();
            let query = Query::new().filters(filters.context().predicates_for(&descriptor));
            load(&session, vec![category]).await?;
            let filtered = session.query(category, &query)?.outcome.into_batch();
            let result = geo::map_points(&filtered)?;
            emit(format, None, &result)?;
        }

        Command::Boundaries { url } => {
            let (url, property) = match (url, &config.boundary) {
                (Some(url), b) => (
                    url,
                    b.as_ref()
                        .map_or_else(|| "ST_NM".to_string(), |b| b.name_property.clone()),
                ),
                (None, Some(b)) => (b.url.clone(), b.name_property.clone()),
                (None, None) => {
                    return Err(anyhow!("no boundary url: pass --url or set `boundary.url`"))
                }
            };
            let client = Client::new();
            let boundaries = Boundaries::fetch(&client, &url, &property)
                .await
                .with_context(|| format!("fetching boundaries from {}", url))?;
            let mut out = std::io::stdout().lock();
            for (name, region) in boundaries.regions() {
                match region {
                    Some(r) => writeln!(out, "{}\t{}", r.code, name)?,
                    None => writeln!(out, "??\t{}", name)?,
                }
            }
            for name in boundaries.unmatched() {
                warn!(%name, "boundary name has no region");
            }
        }
    }

    Ok(())
}

/// Load tables on the blocking pool; the pipeline itself stays synchronous.
async fn load(session: &Arc<Session>, categories: Vec<Category>) -> Result<()> {
    let start = Instant::now();
    let session = Arc::clone(session);
    let source = session.source().describe();
    tokio::task::spawn_blocking(move || session.preload(&categories))
        .await
        .context("loader task panicked")?
        .with_context(|| format!("loading from {}", source))?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "tables loaded");
    Ok(())
}

fn emit(format: OutputFormat, heading: Option<&str>, result: &QueryResult) -> Result<()> {
    for notice in &result.notices {
        warn!(%notice, "notice");
    }
    let mut out = std::io::stdout().lock();
    match format {
        OutputFormat::Text => {
            if let Some(h) = heading {
                writeln!(out, "== {} ==", h)?;
            }
            match &result.outcome {
                Outcome::Rows(batch) => {
                    writeln!(out, "{}", pretty_format_batches(std::slice::from_ref(batch))?)?
                }
                Outcome::Empty(_) => writeln!(out, "No data for the selected filters.")?,
            }
            for notice in &result.notices {
                writeln!(out, "note: {}", notice)?;
            }
        }
        OutputFormat::Json => {
            if let Outcome::Rows(batch) = &result.outcome {
                let mut writer = LineDelimitedWriter::new(&mut out);
                writer.write_batches(&[batch])?;
                writer.finish()?;
            }
        }
    }
    Ok(())
}

fn to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Int(i) => serde_json::json!(i),
        Value::Float(f) => serde_json::json!(f),
        Value::Str(s) => serde_json::json!(s),
    }
}

fn print_bounds(
    format: OutputFormat,
    column: &str,
    range: Option<(Value, Value)>,
    values: &[Value],
) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match format {
        OutputFormat::Text => {
            match &range {
                Some((lo, hi)) => writeln!(out, "{}: {}..{}", column, lo, hi)?,
                None => writeln!(out, "{}: no values", column)?,
            }
            for v in values {
                writeln!(out, "  {}", v)?;
            }
        }
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "column": column,
                "min": range.as_ref().map(|(lo, _)| to_json(lo)),
                "max": range.as_ref().map(|(_, hi)| to_json(hi)),
                "values": values.iter().map(to_json).collect::<Vec<_>>(),
            });
            serde_json::to_writer(&mut out, &doc)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
