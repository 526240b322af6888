mod cli;

use clap::Parser;
use exn::ResultExt;
use stacks::error::{ErrorKind, Result};
use stacks::{ArchiveIdentifier, Config, MetaData, Service};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::from(2);
        },
    };
    tracing_subscriber::fmt().with_max_level(cli.log_level(config.log.level.into())).with_writer(std::io::stderr).init();

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    let service = Service::from_config(config);
    let mut out = std::io::stdout().lock();

    match &cli.command {
        Command::Info { file } => {
            let metadata = service.metadata_for_location(file).or_raise(|| ErrorKind::Command("info"))?;
            write_metadata(&mut out, &metadata).or_raise(|| ErrorKind::Output)?;
        },
        Command::Ls { file } => {
            let id = open(&service, file)?;
            for path in service.list_paths(id).or_raise(|| ErrorKind::Command("ls"))? {
                writeln!(out, "{path}").or_raise(|| ErrorKind::Output)?;
            }
        },
        Command::Resolve { file, path } => {
            let id = open(&service, file)?;
            let resolved = service.redirected_path(id, path).or_raise(|| ErrorKind::Command("resolve"))?;
            writeln!(out, "{resolved}").or_raise(|| ErrorKind::Output)?;
        },
        Command::Cat { file, path, range } => {
            let id = open(&service, file)?;
            let data = match range {
                Some((start, end)) => {
                    let range =
                        service.content_span(id, path, Some(*start..=*end)).or_raise(|| ErrorKind::Command("cat"))?;
                    tracing::info!(path = %range.path, start = range.start, end = range.end, total = range.total, "read range");
                    range.data
                },
                None => {
                    let content = service.content(id, path).or_raise(|| ErrorKind::Command("cat"))?;
                    tracing::info!(path = %content.path, mime = %content.mime, size = content.data.len(), "read content");
                    content.data
                },
            };
            out.write_all(&data).or_raise(|| ErrorKind::Output)?;
        },
        Command::MainPage { file } => {
            let id = open(&service, file)?;
            let main_page = service.main_page(id).or_raise(|| ErrorKind::Command("main-page"))?;
            writeln!(out, "{main_page}").or_raise(|| ErrorKind::Output)?;
        },
        Command::Random { file } => {
            let id = open(&service, file)?;
            let page = service.random_page(id).or_raise(|| ErrorKind::Command("random"))?;
            writeln!(out, "{page}").or_raise(|| ErrorKind::Output)?;
        },
    }
    out.flush().or_raise(|| ErrorKind::Output)
}

fn open(service: &Service, file: &Path) -> Result<ArchiveIdentifier> {
    let id = service.open(file).or_raise(|| ErrorKind::Command("open"))?;
    tracing::debug!(%id, "archive open");
    Ok(id)
}

fn write_metadata(out: &mut impl Write, metadata: &MetaData) -> std::io::Result<()> {
    writeln!(out, "Title:        {}", metadata.title)?;
    writeln!(out, "Description:  {}", metadata.description)?;
    if let Some(long) = &metadata.long_description {
        writeln!(out, "              {long}")?;
    }
    writeln!(out, "Languages:    {}", metadata.languages.join(", "))?;
    writeln!(out, "Creator:      {}", metadata.creator)?;
    writeln!(out, "Publisher:    {}", metadata.publisher)?;
    writeln!(out, "Name:         {}", metadata.name)?;
    writeln!(out, "Flavor:       {}", metadata.flavor.as_deref().unwrap_or("-"))?;
    writeln!(out, "Category:     {}", metadata.category)?;
    writeln!(out, "Tags:         {}", metadata.tags)?;
    writeln!(out, "Articles:     {}", metadata.article_count())?;
    writeln!(out, "Media:        {}", metadata.media_count())?;
    match metadata.created {
        Some(created) => writeln!(out, "Created:      {created}")?,
        None => writeln!(out, "Created:      -")?,
    }
    writeln!(out, "UUID:         {}", metadata.uuid.as_deref().unwrap_or("-"))?;
    writeln!(out, "Favicon:      {}", metadata.favicon.as_ref().map_or("-", |favicon| favicon.mime.as_str()))?;
    writeln!(
        out,
        "Features:     details={} pictures={} videos={} service-workers={}",
        metadata.has_details(),
        metadata.has_pictures(),
        metadata.has_videos(),
        metadata.requires_service_workers(),
    )
}
